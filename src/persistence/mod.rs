//! Token persistence for crash recovery.
//!
//! The scheduler only ever calls `load_latest` once at startup and `store`
//! after every successful fetch, without waiting for the result.

pub mod sqlite;

use crate::cache::token::Token;
use crate::error::TokenError;

pub use sqlite::SqliteTokenStore;

pub trait TokenPersistence: Send + Sync + 'static {
    /// Newest persisted token, fresh or not
    fn load_latest(&self) -> impl std::future::Future<Output = Result<Option<Token>, TokenError>> + Send;

    fn store(&self, token: Token) -> impl std::future::Future<Output = Result<(), TokenError>> + Send;
}
