//! Reqwest-backed implementation of the `RenderedSession` trait.
//!
//! Provides a browserless session: a `reqwest::Client` sharing one cookie jar
//! between navigations and the token exchange. It cannot run challenge
//! scripts, so it only clears gates that let a plain client through, but it
//! satisfies the same contract as the Chromium backend.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::{Client, RequestBuilder, Response};
use url::Url;

use super::session::{RenderedSession, SessionError, SessionLauncher};
use super::types::{RawResponse, SessionCookie, SessionRequest};

/// User agent sent when none is configured.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Browserless session over a cookie-preserving reqwest client.
pub struct HttpSession {
    client: Client,
    jar: Arc<Jar>,
    user_agent: String,
    closed: bool,
}

impl HttpSession {
    pub fn new() -> Result<Self, SessionError> {
        Self::with_user_agent(DEFAULT_USER_AGENT)
    }

    pub fn with_user_agent(user_agent: impl Into<String>) -> Result<Self, SessionError> {
        let user_agent = user_agent.into();
        let jar = Arc::new(Jar::default());
        let client = Client::builder()
            .cookie_provider(jar.clone())
            .user_agent(user_agent.clone())
            .build()
            .map_err(|err| SessionError::Launch(err.to_string()))?;

        Ok(Self {
            client,
            jar,
            user_agent,
            closed: false,
        })
    }

    /// Seed the jar, e.g. with cookies carried over from an earlier clearance.
    pub fn add_cookie(&self, cookie: &str, url: &Url) {
        self.jar.add_cookie_str(cookie, url);
    }

    fn ensure_open(&self) -> Result<(), SessionError> {
        if self.closed {
            Err(SessionError::Closed)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RenderedSession for HttpSession {
    async fn navigate(&mut self, url: &Url) -> Result<(), SessionError> {
        self.ensure_open()?;

        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|err| SessionError::navigation(url, err))?;
        log::debug!("navigated to {} -> {}", url, response.status());

        // Drain the body so any Set-Cookie on a streamed page lands in the jar.
        response
            .bytes()
            .await
            .map_err(|err| SessionError::navigation(url, err))?;
        Ok(())
    }

    async fn request(&mut self, request: &SessionRequest) -> Result<RawResponse, SessionError> {
        self.ensure_open()?;

        let response = form_request(&self.client, request)
            .send()
            .await
            .map_err(|err| SessionError::request(&request.url, err))?;
        read_response(response, &request.url).await
    }

    async fn cookies(&mut self, origin: &Url) -> Result<Vec<SessionCookie>, SessionError> {
        self.ensure_open()?;

        let Some(header) = self.jar.cookies(origin) else {
            return Ok(Vec::new());
        };
        let header = header
            .to_str()
            .map_err(|err| SessionError::Cookies(err.to_string()))?;

        Ok(header
            .split("; ")
            .filter(|pair| !pair.is_empty())
            .map(|pair| match pair.split_once('=') {
                Some((name, value)) => SessionCookie::new(name, value),
                None => SessionCookie::new(pair, ""),
            })
            .collect())
    }

    async fn user_agent(&mut self) -> Result<String, SessionError> {
        self.ensure_open()?;
        Ok(self.user_agent.clone())
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        self.ensure_open()?;
        self.closed = true;
        Ok(())
    }
}

/// Form request for `request`, headers in their original order.
pub(crate) fn form_request(client: &Client, request: &SessionRequest) -> RequestBuilder {
    let mut builder = client
        .request(request.method.clone(), request.url.as_str())
        .form(&request.form_fields);
    for (name, value) in &request.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}

/// Read status, headers and the full body.
pub(crate) async fn read_response(response: Response, url: &Url) -> Result<RawResponse, SessionError> {
    let status = response.status().as_u16();
    let headers = response.headers().clone();
    let body = response
        .text()
        .await
        .map_err(|err| SessionError::request(url, err))?;

    Ok(RawResponse::new(status, headers, body))
}

/// Launches [`HttpSession`]s with a fixed user agent.
#[derive(Debug, Clone)]
pub struct HttpSessionLauncher {
    user_agent: String,
}

impl HttpSessionLauncher {
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
        }
    }
}

impl Default for HttpSessionLauncher {
    fn default() -> Self {
        Self::new(DEFAULT_USER_AGENT)
    }
}

#[async_trait]
impl SessionLauncher for HttpSessionLauncher {
    async fn launch(&self) -> Result<Box<dyn RenderedSession>, SessionError> {
        Ok(Box::new(HttpSession::with_user_agent(self.user_agent.clone())?))
    }
}
