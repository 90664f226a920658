//! # Token Keeper Library
//!
//! Keeps one access token for a client-credential endpoint fresh: fetches it,
//! stores it in memory and SQLite, and refreshes it ahead of expiry.
//!
//! Modules:
//! - `config`: service configuration, loading and validation
//! - `cache`: the token record and its in-memory store
//! - `sources`: the HTTP token fetcher
//! - `parser`: classification of endpoint responses
//! - `scheduler`: freshness decisions and the foreign/background drivers
//! - `persistence`: SQLite crash-recovery storage

pub mod cache;
pub mod config;
pub mod error;
pub mod helpers;
pub mod observability;
pub mod parser;
pub mod persistence;
pub mod resilience;
pub mod scheduler;
pub mod server;
pub mod sinks;
pub mod sources;
pub mod utils;

#[cfg(test)]
mod tests;

pub use crate::error::TokenError;
pub use crate::scheduler::{EnsureOutcome, RefreshScheduler};
