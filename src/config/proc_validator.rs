//! Configuration validation with aggregated errors.
//! - Aggregates all issues into Vec<String>
//! - Checks credentials, endpoint, scheduling, logging and server invariants

use tracing::{error, info};

use crate::config::settings::{PersistenceConfig, RetryConfig, SettingsConfig};
use crate::config::sources::{AppCredentials, EndpointConfig, ServiceConfig};
use crate::observability::metrics::get_metrics;

/// Public entrypoint: returns Ok(()) or Err(Vec<String>) containing all issues.
pub async fn validate_service_config(cfg: &ServiceConfig) -> Result<(), Vec<String>> {
    let mut errors: Vec<String> = Vec::new();

    validate_credentials(&cfg.credentials, &mut errors);
    validate_endpoint(&cfg.endpoint, &mut errors);
    validate_settings(&cfg.settings, &mut errors);
    validate_persistence(&cfg.persistence, &mut errors);

    if errors.is_empty() {
        info!("config valid");
        Ok(())
    } else {
        error!("configuration validation errors ({}):", errors.len());
        for e in &errors {
            error!(" - {}", e);
        }
        get_metrics().await.config_validation_errors.inc();
        Err(errors)
    }
}

fn validate_credentials(credentials: &AppCredentials, errors: &mut Vec<String>) {
    if credentials.app_id.trim().is_empty() {
        errors.push("credentials.app_id cannot be empty".to_string());
    }
    if credentials.app_secret.trim().is_empty() {
        errors.push("credentials.app_secret cannot be empty".to_string());
    }
}

fn validate_endpoint(endpoint: &EndpointConfig, errors: &mut Vec<String>) {
    let url = endpoint.url.trim();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        errors.push(format!(
            "endpoint.url '{}' must start with http:// or https://",
            endpoint.url
        ));
    }
    if endpoint.grant_type.trim().is_empty() {
        errors.push("endpoint.grant_type cannot be empty".to_string());
    }
    if endpoint.timeout_ms == 0 {
        errors.push("endpoint.timeout_ms must be > 0".to_string());
    }

    let params = [
        ("endpoint.params.grant_type", &endpoint.params.grant_type),
        ("endpoint.params.app_id", &endpoint.params.app_id),
        ("endpoint.params.app_secret", &endpoint.params.app_secret),
        ("endpoint.fields.access_token", &endpoint.fields.access_token),
        ("endpoint.fields.expires_in", &endpoint.fields.expires_in),
        ("endpoint.fields.error_code", &endpoint.fields.error_code),
        ("endpoint.fields.error_message", &endpoint.fields.error_message),
    ];
    for (path, value) in params {
        if value.trim().is_empty() {
            errors.push(format!("{} cannot be empty", path));
        }
    }
}

/// SETTINGS VALIDATION
fn validate_settings(settings: &SettingsConfig, errors: &mut Vec<String>) {
    validate_retry("settings.retry", &settings.retry, errors);

    if settings.safety_margin_seconds == 0 {
        errors.push("settings.safety_margin_seconds must be > 0".to_string());
    }
    if settings.safety_margin_seconds > 60 * 60 * 24 {
        errors.push(format!(
            "settings.safety_margin_seconds ({}) is unreasonably large",
            settings.safety_margin_seconds
        ));
    }
    if settings.mask_prefix_len == 0 {
        errors.push("settings.mask_prefix_len must be > 0".to_string());
    }
    if settings.default_delay_ms == 0 {
        errors.push("settings.default_delay_ms must be > 0".to_string());
    }
    if settings.background_retry_delay_ms == 0 {
        errors.push("settings.background_retry_delay_ms must be > 0".to_string());
    }

    if let Some(server) = &settings.server {
        if server.host.is_empty() {
            errors.push("settings.server.host cannot be empty".to_string());
        }
        if server.port == 0 {
            errors.push("settings.server.port must be > 0".to_string());
        }
    }

    // metrics endpoint start with '/'
    let metrics = &settings.metrics;
    if !metrics.path.starts_with('/') {
        errors.push(format!(
            "settings.metrics.path '{}' must start with '/'",
            metrics.path
        ));
    }

    // logging level
    if let Some(logging) = &settings.logging {
        let valid = ["trace", "debug", "info", "warn", "error"];
        if !valid.contains(&logging.level.to_lowercase().as_str()) {
            errors.push(format!(
                "settings.logging.level '{}' invalid; allowed: {:?}",
                logging.level, valid
            ));
        }
        if let Some(file) = &logging.file {
            if file.trim().is_empty() {
                errors.push("settings.logging.file cannot be empty when present".to_string());
            }
        }
    }
}

fn validate_retry(path: &str, retry: &RetryConfig, errors: &mut Vec<String>) {
    if retry.delay_ms == 0 {
        errors.push(format!("{}.delay_ms must be > 0", path));
    }
}

fn validate_persistence(persistence: &PersistenceConfig, errors: &mut Vec<String>) {
    if persistence.path.trim().is_empty() {
        errors.push("persistence.path cannot be empty".to_string());
    }
    if persistence.connect_retry_ms == 0 {
        errors.push("persistence.connect_retry_ms must be > 0".to_string());
    }
}
