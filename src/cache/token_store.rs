use std::sync::Arc;
use tokio::sync::RwLock;

use crate::cache::token::Token;

/// Holder of the single live token.
///
/// Writes replace the whole record under the write lock, so a reader sees
/// either the previous token or the new one, never a mix of both.
#[derive(Debug, Clone, Default)]
pub struct TokenStore {
    inner: Arc<RwLock<Token>>,
}

impl TokenStore {
    pub fn new() -> Self {
        Self { inner: Arc::new(RwLock::new(Token::empty())) }
    }

    /// Consistent snapshot of the current token
    pub async fn read(&self) -> Token {
        self.inner.read().await.clone()
    }

    /// Replace the held token, last write wins
    pub async fn write(&self, token: Token) {
        let mut guard = self.inner.write().await;
        *guard = token;
    }

    pub async fn is_fresh(&self, now: i64) -> bool {
        self.inner.read().await.is_fresh(now)
    }

    pub async fn expires_at(&self) -> i64 {
        self.inner.read().await.expires_at
    }
}
