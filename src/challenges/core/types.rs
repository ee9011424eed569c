//! Core data structures shared across classification, polling, and extraction.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use http::HeaderMap;
use http::header::CONTENT_TYPE;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;
use url::Url;

use super::analysis::token_endpoint;

const DEFAULT_CLIENT_ID: &str = "android";
const DEFAULT_OTP_METHOD: &str = "sms";
const GRANT_TYPE: &str = "password";
const SCOPE: &str = "API_CUSTOMER";

/// Failures while reading the login payload.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("failed to read input payload: {0}")]
    Read(#[from] std::io::Error),
    #[error("input payload is empty")]
    Empty,
    #[error("input payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("base_url must be an absolute http(s) URL with a host: {0}")]
    UnsupportedBaseUrl(Url),
}

/// Password-grant login parameters, parsed once from the caller's JSON payload.
#[derive(Clone, Deserialize)]
pub struct ChallengeRequest {
    base_url: Url,
    email: String,
    password: String,
    client_secret: String,
    device_id: String,
    #[serde(default)]
    client_id: Option<String>,
    #[serde(default)]
    otp_method: Option<String>,
    #[serde(default)]
    otp_code: Option<String>,
    #[serde(default)]
    mfa_token: Option<String>,
    #[serde(default, deserialize_with = "lenient_millis")]
    timeout_millis: Option<u64>,
}

impl ChallengeRequest {
    /// Parse and validate a JSON payload. Surrounding whitespace is ignored.
    pub fn from_json(raw: &str) -> Result<Self, InputError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(InputError::Empty);
        }

        let request: Self = serde_json::from_str(raw)?;
        if !matches!(request.base_url.scheme(), "http" | "https")
            || request.base_url.host_str().is_none()
        {
            return Err(InputError::UnsupportedBaseUrl(request.base_url));
        }

        Ok(request)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn client_id(&self) -> &str {
        non_empty(&self.client_id).unwrap_or(DEFAULT_CLIENT_ID)
    }

    pub fn otp_method(&self) -> &str {
        non_empty(&self.otp_method).unwrap_or(DEFAULT_OTP_METHOD)
    }

    pub fn otp_code(&self) -> Option<&str> {
        non_empty(&self.otp_code)
    }

    pub fn mfa_token(&self) -> Option<&str> {
        non_empty(&self.mfa_token)
    }

    /// Timeout as requested by the caller, before the poller applies its floor.
    pub fn requested_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_millis.unwrap_or(0))
    }

    /// Build the token-exchange request the rendered session should issue.
    pub fn token_exchange(&self) -> SessionRequest {
        let form_fields = vec![
            ("username".to_string(), self.email.clone()),
            ("password".to_string(), self.password.clone()),
            ("grant_type".to_string(), GRANT_TYPE.to_string()),
            ("client_secret".to_string(), self.client_secret.clone()),
            ("scope".to_string(), SCOPE.to_string()),
            ("client_id".to_string(), self.client_id().to_string()),
        ];

        let mut headers = vec![
            ("Accept".to_string(), "application/json".to_string()),
            ("X-Device".to_string(), self.device_id.clone()),
            ("X-OTP-Method".to_string(), self.otp_method().to_string()),
        ];
        if let Some(code) = self.otp_code() {
            headers.push(("X-OTP".to_string(), code.to_string()));
        }
        if let Some(token) = self.mfa_token() {
            headers.push(("X-Mfa-Token".to_string(), token.to_string()));
        }

        SessionRequest {
            method: http::Method::POST,
            url: token_endpoint(&self.base_url),
            form_fields,
            headers,
        }
    }
}

impl fmt::Debug for ChallengeRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChallengeRequest")
            .field("base_url", &self.base_url.as_str())
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("client_secret", &"<redacted>")
            .field("device_id", &self.device_id)
            .field("client_id", &self.client_id())
            .field("otp_method", &self.otp_method())
            .field("otp_code", &self.otp_code().map(|_| "<redacted>"))
            .field("mfa_token", &self.mfa_token().map(|_| "<redacted>"))
            .field("timeout_millis", &self.timeout_millis)
            .finish()
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Form request issued through a rendered session. Field and header order is
/// preserved on the wire.
#[derive(Debug, Clone)]
pub struct SessionRequest {
    pub method: http::Method,
    pub url: Url,
    pub form_fields: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
}

/// HTTP response as observed by the rendered session.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, headers: HeaderMap, body: impl Into<String>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    /// Lower-cased `content-type`, or an empty string when absent.
    pub fn content_type(&self) -> String {
        content_type(&self.headers)
    }
}

pub(crate) fn content_type(headers: &HeaderMap) -> String {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_ascii_lowercase())
        .unwrap_or_default()
}

/// Cookie as enumerated by the session's jar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
}

impl SessionCookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Credentials lifted from a cleared session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionCredentials {
    pub cookie_header: String,
    pub user_agent: String,
}

/// Artifact handed back to the caller once the gate lets the exchange through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearanceResult {
    pub status: u16,
    pub body: String,
    pub headers: BTreeMap<String, String>,
    pub cookie_header: String,
    pub user_agent: String,
}

impl ClearanceResult {
    pub fn new(response: RawResponse, credentials: SessionCredentials) -> Self {
        Self {
            status: response.status,
            body: response.body,
            headers: header_object(&response.headers),
            cookie_header: credentials.cookie_header,
            user_agent: credentials.user_agent,
        }
    }
}

/// Accept whatever number-like value the caller sends for a timeout. Negative,
/// non-numeric and non-finite values count as 0; fractions are truncated.
fn lenient_millis<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let millis = match value {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(number)) => number.as_f64(),
        Some(Value::String(text)) => text.trim().parse::<f64>().ok(),
        Some(Value::Bool(flag)) => Some(if flag { 1.0 } else { 0.0 }),
        Some(Value::Array(_) | Value::Object(_)) => None,
    };

    Ok(Some(match millis {
        Some(millis) if millis.is_finite() && millis > 0.0 => millis.trunc() as u64,
        _ => 0,
    }))
}

/// Flatten a header map into name/value pairs; repeated headers are joined with `", "`.
fn header_object(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut object: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        object
            .entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert(value);
    }
    object
}
