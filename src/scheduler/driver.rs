use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::error::TokenError;
use crate::observability::metrics::get_metrics;
use crate::persistence::TokenPersistence;
use crate::scheduler::refresh::{EnsureOutcome, RefreshScheduler};
use crate::sources::fetch::FetchToken;

/// Recover once, then ensure a fresh token exactly one time.
///
/// Returns only after the fetched token, if any, has been persisted.
pub async fn run_once<F, P>(scheduler: &RefreshScheduler<F, P>) -> Result<EnsureOutcome, TokenError>
where
    F: FetchToken,
    P: TokenPersistence,
{
    scheduler.recover().await;
    let outcome = scheduler.ensure_valid().await?;
    scheduler.flush().await;
    Ok(outcome)
}

/// Foreign mode: the caller owns the loop and sleeps the recommended delay.
///
/// Only returns on retry exhaustion; the process is expected to exit then.
pub async fn run_foreign<F, P>(scheduler: &RefreshScheduler<F, P>) -> Result<(), TokenError>
where
    F: FetchToken,
    P: TokenPersistence,
{
    scheduler.recover().await;

    loop {
        let outcome = scheduler.ensure_valid().await.inspect_err(|e| {
            error!("no token could be obtained: {}", e);
        })?;
        let delay = scheduler.recommended_delay(outcome.next_fetch_delay_ms);
        info!("next token check in {}s", delay.as_secs());
        sleep(delay).await;
    }
}

/// Background mode: a self-rescheduling task that never gives up.
pub fn spawn_background<F, P>(scheduler: Arc<RefreshScheduler<F, P>>) -> JoinHandle<()>
where
    F: FetchToken,
    P: TokenPersistence,
{
    tokio::spawn(async move {
        scheduler.recover().await;
        info!("background refresh started");

        loop {
            let delay = background_cycle(&scheduler).await;
            info!("next background refresh in {}s", delay.as_secs());
            sleep(delay).await;
        }
    })
}

/// One background cycle, returns how long to wait before the next one.
pub async fn background_cycle<F, P>(scheduler: &RefreshScheduler<F, P>) -> Duration
where
    F: FetchToken,
    P: TokenPersistence,
{
    let fallback = scheduler.settings().background_retry_delay;

    match scheduler.ensure_valid().await {
        Ok(outcome) if outcome.next_fetch_delay_ms > 0 => Duration::from_millis(outcome.next_fetch_delay_ms as u64),
        Ok(_) => {
            warn!("token expires immediately, retrying in {}s", fallback.as_secs());
            fallback
        }
        Err(e) => {
            error!("background refresh failed: {}, retrying in {}s", e, fallback.as_secs());
            get_metrics().await.background_cycle_failures.inc();
            fallback
        }
    }
}
