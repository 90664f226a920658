use prometheus::{HistogramOpts, Histogram, IntCounter, IntCounterVec, IntGauge, Opts, Registry};
use tracing::info;
use std::sync::Arc;
use tokio::sync::OnceCell;


// Declare the static OnceCell to hold the Metrics.
static METRICS_INSTANCE: OnceCell<Arc<Metrics>> = OnceCell::const_new();

/// Asynchronously initializes and gets a reference to the static `Metrics`.
pub async fn get_metrics() -> &'static Arc<Metrics> {
    METRICS_INSTANCE.get_or_init(|| async {
        info!("Initializing Metrics ...");
        Metrics::new()}
    ).await
}


#[derive(Clone)]
pub struct Metrics {
    pub registry: Registry,

    // Fetch metrics
    pub fetch_requests: IntCounter,
    pub fetch_failures: IntCounterVec,
    pub fetch_duration: Histogram,

    // Token metrics
    pub token_refreshes: IntCounter,
    pub token_expiry_unix: IntGauge,

    // Persistence / scheduling
    pub persistence_failures: IntCounterVec,
    pub background_cycle_failures: IntCounter,

    // Config/runtime
    pub config_validation_errors: IntCounter,
    pub up: IntGauge,
}

impl Metrics {
    fn new() -> Arc<Self> {
        // metric names and help texts are static, construction cannot fail
        let registry = Registry::new_custom(Some("tokenkeeper".into()), None).unwrap();

        let metrics: Arc<Metrics> = Arc::new(Self {
            // Fetch
            fetch_requests: IntCounter::new("fetch_requests_total", "Total credential endpoint requests").unwrap(),
            fetch_failures: IntCounterVec::new(Opts::new("fetch_failures_total", "Fetch failures by reason"),&["reason"],).unwrap(),
            fetch_duration: Histogram::with_opts(HistogramOpts::new("fetch_duration_seconds", "Fetch duration seconds").buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0])).unwrap(),

            // Token
            token_refreshes: IntCounter::new("token_refreshes_total", "Tokens installed after a successful fetch").unwrap(),
            token_expiry_unix: IntGauge::new("token_expiry_unix_seconds", "Effective expiry of the current token").unwrap(),

            // Persistence / scheduling
            persistence_failures: IntCounterVec::new(Opts::new("persistence_failures_total", "Persistence failures by operation"),&["operation"],).unwrap(),
            background_cycle_failures: IntCounter::new("background_cycle_failures_total", "Background refresh cycles that exhausted their retries").unwrap(),

            // Config/runtime
            config_validation_errors: IntCounter::new("config_validation_errors_total","Validation errors during startup",).unwrap(),
            up: IntGauge::new("up", "1 if service is healthy").unwrap(),

            registry,
        });

        // Register all metrics in the registry
        let reg = &metrics.registry;
        reg.register(Box::new(metrics.fetch_requests.clone())).unwrap();
        reg.register(Box::new(metrics.fetch_failures.clone())).unwrap();
        reg.register(Box::new(metrics.fetch_duration.clone())).unwrap();
        reg.register(Box::new(metrics.token_refreshes.clone())).unwrap();
        reg.register(Box::new(metrics.token_expiry_unix.clone())).unwrap();
        reg.register(Box::new(metrics.persistence_failures.clone())).unwrap();
        reg.register(Box::new(metrics.background_cycle_failures.clone())).unwrap();
        reg.register(Box::new(metrics.config_validation_errors.clone())).unwrap();
        reg.register(Box::new(metrics.up.clone())).unwrap();

        metrics
    }
}
