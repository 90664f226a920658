// tests/common/mod.rs
pub use axum::Router;
pub use tokio::task::JoinHandle;

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::cache::token::Token;
use crate::config::sources::AppCredentials;
use crate::error::TokenError;
use crate::helpers::time::Clock;
use crate::parser::response::FetchedCredential;
use crate::persistence::TokenPersistence;
use crate::resilience::retry::RetrySettings;
use crate::scheduler::refresh::SchedulerSettings;
use crate::sources::fetch::FetchToken;

/// 2023-11-14T22:13:20Z
pub const T0: i64 = 1_700_000_000;

/// Spawn an Axum router on an ephemeral port and return (JoinHandle, SocketAddr)
pub async fn spawn_axum(router: Router) -> (JoinHandle<()>, SocketAddr) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind failed");
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.expect("server failed");
    });
    (handle, addr)
}

/// margin 300s, 3 retries 2s apart, 60s foreign floor, 30s background fallback
pub fn test_settings() -> SchedulerSettings {
    SchedulerSettings {
        safety_margin_seconds: 300,
        default_delay: Duration::from_secs(60),
        background_retry_delay: Duration::from_secs(30),
        mask_prefix_len: 6,
        retry: RetrySettings { max_retries: 3, delay: Duration::from_secs(2), abort_on_remote_error: false },
    }
}

pub fn credentials() -> AppCredentials {
    AppCredentials::new("wx-app", "wx-secret")
}

pub fn ok(value: &str, lifetime_seconds: i64) -> Result<FetchedCredential, TokenError> {
    Ok(FetchedCredential { value: value.to_owned(), lifetime_seconds })
}

pub fn transport_err() -> Result<FetchedCredential, TokenError> {
    Err(TokenError::Transport("connection refused".into()))
}

/// Wall clock frozen until the test moves it.
#[derive(Debug, Clone)]
pub struct ManualClock(Arc<AtomicI64>);

impl ManualClock {
    pub fn at(now: i64) -> Self {
        Self(Arc::new(AtomicI64::new(now)))
    }

    pub fn set(&self, now: i64) {
        self.0.store(now, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// Wall clock that follows tokio's (paused) clock, starting at `origin`.
#[derive(Debug, Clone)]
pub struct PausedClock {
    origin: i64,
    start: tokio::time::Instant,
}

impl PausedClock {
    pub fn starting_at(origin: i64) -> Self {
        Self { origin, start: tokio::time::Instant::now() }
    }
}

impl Clock for PausedClock {
    fn now(&self) -> i64 {
        self.origin + self.start.elapsed().as_secs() as i64
    }
}

/// Plays back canned fetch results in order, then keeps failing.
pub struct ScriptedFetcher {
    script: Mutex<VecDeque<Result<FetchedCredential, TokenError>>>,
    calls: Arc<AtomicU32>,
}

impl ScriptedFetcher {
    pub fn new(script: Vec<Result<FetchedCredential, TokenError>>) -> (Self, Arc<AtomicU32>) {
        let calls = Arc::new(AtomicU32::new(0));
        let fetcher = Self { script: Mutex::new(script.into()), calls: calls.clone() };
        (fetcher, calls)
    }
}

impl FetchToken for ScriptedFetcher {
    async fn fetch(&self, _credentials: &AppCredentials) -> Result<FetchedCredential, TokenError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TokenError::Transport("script exhausted".into())))
    }
}

/// In-memory persistence, clones share the same rows.
#[derive(Debug, Clone, Default)]
pub struct MemoryPersistence {
    rows: Arc<Mutex<Vec<Token>>>,
    fail_load: bool,
    fail_store: bool,
}

impl MemoryPersistence {
    pub fn with_rows(rows: Vec<Token>) -> Self {
        Self { rows: Arc::new(Mutex::new(rows)), ..Default::default() }
    }

    pub fn failing_load() -> Self {
        Self { fail_load: true, ..Default::default() }
    }

    pub fn failing_store() -> Self {
        Self { fail_store: true, ..Default::default() }
    }

    pub fn rows(&self) -> Vec<Token> {
        self.rows.lock().unwrap().clone()
    }
}

impl TokenPersistence for MemoryPersistence {
    async fn load_latest(&self) -> Result<Option<Token>, TokenError> {
        if self.fail_load {
            return Err(TokenError::Persistence("database is locked".into()));
        }
        Ok(self.rows.lock().unwrap().last().cloned())
    }

    async fn store(&self, token: Token) -> Result<(), TokenError> {
        if self.fail_store {
            return Err(TokenError::Persistence("disk I/O error".into()));
        }
        self.rows.lock().unwrap().push(token);
        Ok(())
    }
}

/// Collects every callback invocation.
pub fn recording_callback() -> (Arc<Mutex<Vec<(String, i64)>>>, impl Fn(&str, i64) + Send + Sync + 'static) {
    let seen: Arc<Mutex<Vec<(String, i64)>>> = Arc::default();
    let sink = seen.clone();
    let callback = move |masked: &str, expires_at: i64| sink.lock().unwrap().push((masked.to_owned(), expires_at));
    (seen, callback)
}
