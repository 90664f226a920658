use serde::Deserialize;
use std::fmt;

use crate::config::settings::{PersistenceConfig, SettingsConfig};

/// ================================
/// Full service configuration
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    pub credentials: AppCredentials,
    #[serde(default)]
    pub endpoint: EndpointConfig,
    #[serde(default)]
    pub settings: SettingsConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

/// Application id and secret sent to the credential endpoint.
#[derive(Deserialize, Clone)]
pub struct AppCredentials {
    pub app_id: String,
    pub app_secret: String,
}

impl AppCredentials {
    pub fn new(app_id: impl Into<String>, app_secret: impl Into<String>) -> Self {
        Self { app_id: app_id.into(), app_secret: app_secret.into() }
    }
}

// the secret must never reach logs
impl fmt::Debug for AppCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppCredentials")
            .field("app_id", &self.app_id)
            .field("app_secret", &"****")
            .finish()
    }
}

/// ================================
/// Credential endpoint
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct EndpointConfig {
    #[serde(default = "default_url")]
    pub url: String,
    /// literal sent as the grant type parameter
    #[serde(default = "default_grant_type")]
    pub grant_type: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub params: RequestParams,
    #[serde(default)]
    pub fields: ResponseFields,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            grant_type: default_grant_type(),
            timeout_ms: default_timeout_ms(),
            params: RequestParams::default(),
            fields: ResponseFields::default(),
        }
    }
}

/// Query parameter names
#[derive(Debug, Deserialize, Clone)]
pub struct RequestParams {
    #[serde(default = "default_grant_type_param")]
    pub grant_type: String,
    #[serde(default = "default_app_id_param")]
    pub app_id: String,
    #[serde(default = "default_app_secret_param")]
    pub app_secret: String,
}

impl Default for RequestParams {
    fn default() -> Self {
        Self {
            grant_type: default_grant_type_param(),
            app_id: default_app_id_param(),
            app_secret: default_app_secret_param(),
        }
    }
}

/// JSON field names of the two response layouts
#[derive(Debug, Deserialize, Clone)]
pub struct ResponseFields {
    #[serde(default = "default_access_token_field")]
    pub access_token: String,
    #[serde(default = "default_expires_in_field")]
    pub expires_in: String,
    #[serde(default = "default_error_code_field")]
    pub error_code: String,
    #[serde(default = "default_error_message_field")]
    pub error_message: String,
}

impl Default for ResponseFields {
    fn default() -> Self {
        Self {
            access_token: default_access_token_field(),
            expires_in: default_expires_in_field(),
            error_code: default_error_code_field(),
            error_message: default_error_message_field(),
        }
    }
}

fn default_url() -> String {
    "https://api.weixin.qq.com/cgi-bin/token".to_string()
}

fn default_grant_type() -> String {
    "client_credential".to_string()
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_grant_type_param() -> String {
    "grant_type".to_string()
}

fn default_app_id_param() -> String {
    "appid".to_string()
}

fn default_app_secret_param() -> String {
    "secret".to_string()
}

fn default_access_token_field() -> String {
    "access_token".to_string()
}

fn default_expires_in_field() -> String {
    "expires_in".to_string()
}

fn default_error_code_field() -> String {
    "errcode".to_string()
}

fn default_error_message_field() -> String {
    "errmsg".to_string()
}
