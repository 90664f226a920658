use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use token_keeper::cache::TokenStore;
use token_keeper::config::settings::RefreshMode;
use token_keeper::helpers::time::{format_unix_ts, Clock, SystemClock};
use token_keeper::observability::metrics::get_metrics;
use token_keeper::persistence::SqliteTokenStore;
use token_keeper::scheduler::{run_foreign, run_once, spawn_background, RefreshScheduler, SchedulerSettings};
use token_keeper::server::server::{self, AppState};
use token_keeper::sources::fetch::HttpTokenFetcher;
use token_keeper::utils::config_loader;
use token_keeper::utils::logging::{self, LogLevel};
use tracing::{error, info};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, env = "CONFIG", default_value = "token-keeper.yaml")]
    config: String,
    #[arg(long, env = "LOG_LEVEL", value_enum)]
    log_level: Option<LogLevel>,
    /// overrides `settings.mode`
    #[arg(long, env = "TOKEN_MODE", value_enum)]
    mode: Option<RefreshMode>,
    /// ensure a valid token once and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // -------------------------------
    // 1. Load YAML config, start logging
    // -------------------------------

    let args = Args::parse();
    let service_config = config_loader::run(&args.config).await?;
    let _log_guard = logging::run(&service_config, args.log_level);
    let settings = &service_config.settings;
    let mode = args.mode.unwrap_or(settings.mode);
    info!("token keeper starting, mode: {:?}", mode);

    // -------------------------------
    // 2. Connect to the token database
    // -------------------------------

    let persistence = SqliteTokenStore::connect_with_retry(&service_config.persistence).await?;

    // -------------------------------
    // 3. Build fetcher and scheduler
    // -------------------------------

    let fetcher = HttpTokenFetcher::new(service_config.endpoint.clone())?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store = TokenStore::new();

    let scheduler = RefreshScheduler::new(
        service_config.credentials.clone(),
        fetcher,
        persistence,
        SchedulerSettings::from(settings),
    )
    .with_clock(clock.clone())
    .with_store(store.clone())
    .with_token_update_callback(|masked, expires_at| {
        info!("token updated: {} (expires at {})", masked, format_unix_ts(expires_at));
    });

    if args.once {
        let outcome = run_once(&scheduler).await.inspect_err(|e| error!("{}", e))?;
        info!("token valid, refreshed: {}, next check in {}ms", outcome.refreshed, outcome.next_fetch_delay_ms);
        return Ok(());
    }

    // -------------------------------
    // 4. Optional status/metrics server
    // -------------------------------

    let metrics = get_metrics().await;
    metrics.up.set(1);
    if let Some(server_config) = settings.server.clone() {
        let state = AppState::new(metrics, store, clock, settings.mask_prefix_len);
        let metrics_config = settings.metrics.clone();
        tokio::spawn(async move {
            if let Err(e) = server::start(&server_config, &metrics_config, state).await {
                error!("{:#}", e);
            }
        });
    }

    // -------------------------------
    // 5. Drive refreshes
    // -------------------------------

    match mode {
        RefreshMode::Foreign => {
            run_foreign(&scheduler).await?;
        }
        RefreshMode::Background => {
            let refresher = spawn_background(Arc::new(scheduler));
            tokio::select! {
                joined = refresher => joined?,
                signal = tokio::signal::ctrl_c() => {
                    signal?;
                    info!("shutdown requested");
                }
            }
        }
    }

    metrics.up.set(0);
    Ok(())
}
