use std::sync::Arc;

use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;
use tracing::debug;

use crate::cache::token_store::TokenStore;
use crate::helpers::time::{format_unix_ts, Clock};
use crate::server::server::AppState;

pub const STATUS_PATH: &str = "/status";

/// What `GET /status` exposes about the held token. Never the raw value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenStatus {
    pub fresh: bool,
    pub token: Option<String>,
    pub expires_at: i64,
    pub expires_at_rfc3339: Option<String>,
    pub seconds_left: i64,
}

#[derive(Clone)]
pub struct StatusState {
    store: TokenStore,
    clock: Arc<dyn Clock>,
    prefix_len: usize,
}

impl StatusState {
    pub fn new(store: TokenStore, clock: Arc<dyn Clock>, prefix_len: usize) -> Self {
        Self { store, clock, prefix_len }
    }

    pub async fn snapshot(&self) -> TokenStatus {
        let token = self.store.read().await;
        let now = self.clock.now();

        if token.is_empty() {
            return TokenStatus {
                fresh: false,
                token: None,
                expires_at: token.expires_at,
                expires_at_rfc3339: None,
                seconds_left: 0,
            };
        }

        TokenStatus {
            fresh: token.is_fresh(now),
            token: Some(token.masked(self.prefix_len)),
            expires_at: token.expires_at,
            expires_at_rfc3339: Some(format_unix_ts(token.expires_at)),
            seconds_left: (token.expires_at - now).max(0),
        }
    }

    pub fn router(&self) -> Router<AppState> {
        Router::new().route(STATUS_PATH, get(handle_status))
    }
}

async fn handle_status(State(state): State<AppState>) -> impl IntoResponse {
    let status = state.status_state.snapshot().await;
    debug!("status requested, fresh: {}", status.fresh);
    Json(status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::token::Token;

    struct FixedClock(i64);

    impl Clock for FixedClock {
        fn now(&self) -> i64 {
            self.0
        }
    }

    #[tokio::test]
    async fn empty_store_reports_not_fresh() {
        let state = StatusState::new(TokenStore::new(), Arc::new(FixedClock(1_000)), 6);
        let status = state.snapshot().await;
        assert!(!status.fresh);
        assert_eq!(status.token, None);
        assert_eq!(status.seconds_left, 0);
    }

    #[tokio::test]
    async fn masks_value_and_counts_down() {
        let store = TokenStore::new();
        store.write(Token::new("tok123456789".into(), 1_600)).await;
        let state = StatusState::new(store, Arc::new(FixedClock(1_000)), 6);

        let status = state.snapshot().await;
        assert!(status.fresh);
        assert_eq!(status.token.as_deref(), Some("tok123****"));
        assert_eq!(status.seconds_left, 600);
    }

    #[tokio::test]
    async fn expired_token_has_no_time_left() {
        let store = TokenStore::new();
        store.write(Token::new("tok123456789".into(), 900)).await;
        let state = StatusState::new(store, Arc::new(FixedClock(1_000)), 6);

        let status = state.snapshot().await;
        assert!(!status.fresh);
        assert_eq!(status.seconds_left, 0);
    }
}
