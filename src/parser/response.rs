use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::config::sources::ResponseFields;
use crate::error::TokenError;

/// Upper bound accepted for a reported lifetime (one year).
pub const MAX_LIFETIME_SECONDS: i64 = 365 * 24 * 60 * 60;

/// Credential as reported by the endpoint, before the safety margin is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedCredential {
    pub value: String,
    pub lifetime_seconds: i64,
}

/// Classify a credential endpoint body.
///
/// Checks, in order: well-formed JSON object, explicit error code,
/// then the token value and lifetime fields.
pub fn parse_credential_response(body: &str, fields: &ResponseFields) -> Result<FetchedCredential, TokenError> {
    let json: Value = serde_json::from_str(body).map_err(|e| {
        warn!("credential response is not valid JSON: {}", e);
        TokenError::Malformed(format!("body is not valid JSON: {}", e))
    })?;

    let object = json
        .as_object()
        .ok_or_else(|| TokenError::Malformed("body is not a JSON object".to_owned()))?;

    if let Some(code) = object.get(&fields.error_code) {
        return Err(remote_error(code, object, fields));
    }

    let value = object
        .get(&fields.access_token)
        .and_then(Value::as_str)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| TokenError::Malformed(format!("field '{}' is missing or not a non-empty string", fields.access_token)))?;

    let lifetime_seconds = object
        .get(&fields.expires_in)
        .and_then(Value::as_i64)
        .ok_or_else(|| TokenError::Malformed(format!("field '{}' is missing or not an integer", fields.expires_in)))?;

    if !(1..=MAX_LIFETIME_SECONDS).contains(&lifetime_seconds) {
        warn!("credential lifetime {}s is out of range", lifetime_seconds);
        return Err(TokenError::Malformed(format!(
            "field '{}' must be between 1 and {} seconds, got {}",
            fields.expires_in, MAX_LIFETIME_SECONDS, lifetime_seconds
        )));
    }

    debug!("credential parsed, lifetime {}s", lifetime_seconds);
    Ok(FetchedCredential { value: value.to_owned(), lifetime_seconds })
}

fn remote_error(code: &Value, object: &Map<String, Value>, fields: &ResponseFields) -> TokenError {
    let Some(code) = code.as_i64() else {
        return TokenError::Malformed(format!("field '{}' is not an integer", fields.error_code));
    };
    let message = object
        .get(&fields.error_message)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned();
    TokenError::Remote { code, message }
}
