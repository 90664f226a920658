/// Errors produced while obtaining, storing or recovering the access token.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    // ── Fetch errors (retried by the scheduler) ─────────────────────────
    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("credential endpoint rejected the request: {code} - {message}")]
    Remote { code: i64, message: String },

    // ── Persistence (logged, never escalated) ───────────────────────────
    #[error("persistence error: {0}")]
    Persistence(String),

    // ── Retry budget exhausted ──────────────────────────────────────────
    #[error("no valid access token after {attempts} attempts, last error: {last}")]
    FatalNoCredential {
        attempts: u32,
        #[source]
        last: Box<TokenError>,
    },
}

impl TokenError {
    /// Short label used for the `reason` metric label and structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            TokenError::Transport(_) => "transport",
            TokenError::Malformed(_) => "malformed",
            TokenError::Remote { .. } => "remote",
            TokenError::Persistence(_) => "persistence",
            TokenError::FatalNoCredential { .. } => "fatal",
        }
    }
}

impl From<reqwest::Error> for TokenError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TokenError::Transport(format!("request timed out: {e}"))
        } else {
            TokenError::Transport(e.to_string())
        }
    }
}

impl From<rusqlite::Error> for TokenError {
    fn from(e: rusqlite::Error) -> Self {
        TokenError::Persistence(e.to_string())
    }
}
