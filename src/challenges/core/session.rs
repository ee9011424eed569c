//! Rendered-session capability.
//!
//! The poller never talks to a browser library directly. Everything it needs
//! from the session (navigation, the token request, the cookie jar, the user
//! agent, and release) goes through [`RenderedSession`], so any automation
//! backend can sit behind it.

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

use super::types::{RawResponse, SessionCookie, SessionRequest};

/// Contract implemented by browser-automation backends.
///
/// Implementations must issue [`RenderedSession::request`] through the same
/// cookie jar and fingerprint the page uses, so whatever clearance the page has
/// earned applies to the request.
#[async_trait]
pub trait RenderedSession: Send {
    /// Load `url` in the session's page.
    async fn navigate(&mut self, url: &Url) -> Result<(), SessionError>;

    /// Issue a form request and read the full response body.
    async fn request(&mut self, request: &SessionRequest) -> Result<RawResponse, SessionError>;

    /// Cookies the jar holds for `origin`, in the jar's own order.
    async fn cookies(&mut self, origin: &Url) -> Result<Vec<SessionCookie>, SessionError>;

    /// User agent the session reports.
    async fn user_agent(&mut self) -> Result<String, SessionError>;

    /// Release the underlying browser resources.
    async fn close(&mut self) -> Result<(), SessionError>;
}

/// Acquires a fresh rendered session for one login run.
#[async_trait]
pub trait SessionLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn RenderedSession>, SessionError>;
}

/// Transport-level failures raised by session backends.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to launch browser session: {0}")]
    Launch(String),
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },
    #[error("request to {url} failed: {reason}")]
    Request { url: String, reason: String },
    #[error("failed to read cookies: {0}")]
    Cookies(String),
    #[error("failed to read user agent: {0}")]
    UserAgent(String),
    #[error("failed to close browser session: {0}")]
    Close(String),
    #[error("session already closed")]
    Closed,
}

impl SessionError {
    pub fn navigation(url: &Url, reason: impl ToString) -> Self {
        Self::Navigation {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn request(url: &Url, reason: impl ToString) -> Self {
        Self::Request {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }
}
