use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::cache::token::Token;
use crate::cache::token_store::TokenStore;
use crate::config::settings::SettingsConfig;
use crate::config::sources::AppCredentials;
use crate::error::TokenError;
use crate::helpers::time::{format_unix_ts, get_instant, Clock, SystemClock};
use crate::observability::metrics::get_metrics;
use crate::parser::response::FetchedCredential;
use crate::persistence::TokenPersistence;
use crate::resilience::retry::RetrySettings;
use crate::sinks::subscription::Subscription;
use crate::sources::fetch::{compute_expires_at, FetchToken};

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub safety_margin_seconds: u64,
    /// foreign mode floor for a non-positive delay
    pub default_delay: Duration,
    /// background mode wait after a failed cycle
    pub background_retry_delay: Duration,
    pub mask_prefix_len: usize,
    pub retry: RetrySettings,
}

impl From<&SettingsConfig> for SchedulerSettings {
    fn from(settings: &SettingsConfig) -> Self {
        Self {
            safety_margin_seconds: settings.safety_margin_seconds,
            default_delay: Duration::from_millis(settings.default_delay_ms),
            background_retry_delay: Duration::from_millis(settings.background_retry_delay_ms),
            mask_prefix_len: settings.mask_prefix_len,
            retry: RetrySettings::from(&settings.retry),
        }
    }
}

/// Result of one `ensure_valid` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnsureOutcome {
    /// a new token was fetched and installed
    pub refreshed: bool,
    /// raw `max(0, expires_at - now)` in milliseconds
    pub next_fetch_delay_ms: i64,
}

/// `max(0, (expires_at - now) * 1000)`
pub fn fetch_delay_ms(expires_at: i64, now: i64) -> i64 {
    expires_at.saturating_sub(now).saturating_mul(1000).max(0)
}

/// Owns the decision of when to call the fetcher and what to do with the result.
///
/// Both drive modes go through [`RefreshScheduler::ensure_valid`]; they only
/// differ in how they wait between calls and in how they treat exhaustion.
pub struct RefreshScheduler<F, P> {
    credentials: AppCredentials,
    fetcher: F,
    persistence: Arc<P>,
    store: TokenStore,
    clock: Arc<dyn Clock>,
    settings: SchedulerSettings,
    subscription: Subscription,
    /// detached persistence writes, awaited only by `flush`
    pending_stores: Mutex<JoinSet<()>>,
}

impl<F, P> RefreshScheduler<F, P>
where
    F: FetchToken,
    P: TokenPersistence,
{
    pub fn new(credentials: AppCredentials, fetcher: F, persistence: P, settings: SchedulerSettings) -> Self {
        let subscription = Subscription::new(settings.mask_prefix_len);
        Self {
            credentials,
            fetcher,
            persistence: Arc::new(persistence),
            store: TokenStore::new(),
            clock: Arc::new(SystemClock),
            settings,
            subscription,
            pending_stores: Mutex::new(JoinSet::new()),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Share an existing store, e.g. with the status server.
    pub fn with_store(mut self, store: TokenStore) -> Self {
        self.store = store;
        self
    }

    /// Registers the single update handler; it receives the masked value.
    pub fn with_token_update_callback<C>(mut self, callback: C) -> Self
    where
        C: Fn(&str, i64) + Send + Sync + 'static,
    {
        self.subscription.set(callback);
        debug!("token update callback registered");
        self
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    pub fn settings(&self) -> &SchedulerSettings {
        &self.settings
    }

    /// Install a token obtained outside the fetch path (startup recovery).
    pub async fn set_current_token(&self, token: Token) {
        debug!("setting current token (expires at {})", token.expires_at);
        get_metrics().await.token_expiry_unix.set(token.expires_at);
        self.store.write(token).await;
    }

    /// Try to reuse the newest persisted token instead of a network round trip.
    ///
    /// Returns `true` when a still-fresh token was installed.
    pub async fn recover(&self) -> bool {
        match self.persistence.load_latest().await {
            Ok(Some(token)) if token.is_fresh(self.clock.now()) => {
                info!(
                    "loaded valid token {} from database, expires at {}",
                    token.masked(self.settings.mask_prefix_len),
                    format_unix_ts(token.expires_at)
                );
                self.set_current_token(token).await;
                true
            }
            Ok(Some(token)) => {
                info!("persisted token expired at {}, ignoring it", format_unix_ts(token.expires_at));
                false
            }
            Ok(None) => {
                debug!("no persisted token to recover");
                false
            }
            Err(e) => {
                warn!("cannot load persisted token: {}", e);
                get_metrics().await.persistence_failures.with_label_values(&["load"]).inc();
                false
            }
        }
    }

    /// Make sure a fresh token is held, fetching (with retries) if needed.
    pub async fn ensure_valid(&self) -> Result<EnsureOutcome, TokenError> {
        if self.store.is_fresh(self.clock.now()).await {
            debug!("token still fresh, no fetch needed");
            return Ok(EnsureOutcome {
                refreshed: false,
                next_fetch_delay_ms: self.next_fetch_delay_ms().await,
            });
        }

        info!("token missing or stale, fetching a new one");
        let credential = self.settings.retry.run_with_retry(move || self.fetch_once()).await?;

        let fetched_at = self.clock.now();
        let token = Token::new(
            credential.value,
            compute_expires_at(fetched_at, credential.lifetime_seconds, self.settings.safety_margin_seconds),
        );

        info!(
            "fetched token {} (lifetime: {}s, refresh due at {})",
            token.masked(self.settings.mask_prefix_len),
            credential.lifetime_seconds,
            format_unix_ts(token.expires_at)
        );
        if !token.is_fresh(fetched_at) {
            warn!(
                "fetched token is already stale: lifetime {}s does not exceed safety margin {}s",
                credential.lifetime_seconds, self.settings.safety_margin_seconds
            );
        }

        self.install(token).await;

        Ok(EnsureOutcome {
            refreshed: true,
            next_fetch_delay_ms: self.next_fetch_delay_ms().await,
        })
    }

    /// Raw delay until the held token stops being fresh, 0 if it already has.
    pub async fn next_fetch_delay_ms(&self) -> i64 {
        let delay = fetch_delay_ms(self.store.expires_at().await, self.clock.now());
        debug!("next fetch delay: {}ms", delay);
        delay
    }

    /// Foreign-mode sleep: the raw delay, or the default floor when it is not positive.
    pub fn recommended_delay(&self, raw_delay_ms: i64) -> Duration {
        if raw_delay_ms <= 0 {
            warn!(
                "invalid delay {}ms, using default {}s",
                raw_delay_ms,
                self.settings.default_delay.as_secs()
            );
            return self.settings.default_delay;
        }
        Duration::from_millis(raw_delay_ms as u64)
    }

    /// Wait for every persistence write started so far.
    pub async fn flush(&self) {
        let mut pending = self.pending_stores.lock().await;
        while let Some(joined) = pending.join_next().await {
            if let Err(e) = joined {
                warn!("persistence task did not complete: {}", e);
            }
        }
    }

    async fn fetch_once(&self) -> Result<FetchedCredential, TokenError> {
        let metrics = get_metrics().await;
        let start = get_instant();
        metrics.fetch_requests.inc();

        let result = self.fetcher.fetch(&self.credentials).await;
        metrics.fetch_duration.observe(start.elapsed().as_secs_f64());

        if let Err(e) = &result {
            warn!("token fetch failed: {}", e);
            metrics.fetch_failures.with_label_values(&[e.kind()]).inc();
        }
        result
    }

    /// Store write, then fire-and-forget persistence, then the subscriber.
    async fn install(&self, token: Token) {
        self.store.write(token.clone()).await;

        let metrics = get_metrics().await;
        metrics.token_refreshes.inc();
        metrics.token_expiry_unix.set(token.expires_at);

        let persistence = self.persistence.clone();
        let persisted = token.clone();
        {
            let mut pending = self.pending_stores.lock().await;
            while pending.try_join_next().is_some() {}
            pending.spawn(async move {
                if let Err(e) = persistence.store(persisted).await {
                    warn!("failed to persist token, continuing with in-memory token: {}", e);
                    get_metrics().await.persistence_failures.with_label_values(&["store"]).inc();
                }
            });
        }

        self.subscription.notify(&token);
    }
}

impl<F, P> Drop for RefreshScheduler<F, P> {
    fn drop(&mut self) {
        // outstanding writes outlive the scheduler
        self.pending_stores.get_mut().detach_all();
    }
}
