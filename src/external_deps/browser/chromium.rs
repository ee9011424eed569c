//! Chromium-backed rendered session using chromiumoxide.
//!
//! The page is only used to render: seeding, challenge pages and hint
//! navigations all happen there. The token exchange goes out through reqwest
//! with the browser's cookies and user agent attached, and any cookies the
//! response sets are written back into the browser. That keeps the exchange
//! working wherever the page currently is, including mid-reload.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{
    CookieParam, CookieSameSite, GetCookiesParams, SetCookiesParams, TimeSinceEpoch,
};
use chromiumoxide::page::Page;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use http::header::{COOKIE, SET_COOKIE, USER_AGENT};
use reqwest::Client;
use tokio::task::JoinHandle;
use url::Url;

use crate::challenges::core::http_session::{form_request, read_response};
use crate::challenges::core::{
    RawResponse, RenderedSession, SessionCookie, SessionError, SessionLauncher, SessionRequest,
    origin_from_url,
};
use crate::challenges::extractor::cookie_header;

/// Launch options for [`ChromiumLauncher`].
#[derive(Debug, Clone)]
pub struct ChromiumOptions {
    /// Headed by default: a person may have to solve the challenge.
    pub headless: bool,
    /// Chromium binary; chromiumoxide's detection is used when absent.
    pub executable: Option<PathBuf>,
    /// Applies to page loads and to the token exchange alike.
    pub navigation_timeout: Duration,
}

impl Default for ChromiumOptions {
    fn default() -> Self {
        Self {
            headless: false,
            executable: None,
            navigation_timeout: Duration::from_secs(30),
        }
    }
}

/// Launches a fresh Chromium with one blank page per run.
#[derive(Debug, Clone, Default)]
pub struct ChromiumLauncher {
    options: ChromiumOptions,
}

impl ChromiumLauncher {
    pub fn new(options: ChromiumOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl SessionLauncher for ChromiumLauncher {
    async fn launch(&self) -> Result<Box<dyn RenderedSession>, SessionError> {
        let client = Client::builder()
            .timeout(self.options.navigation_timeout)
            .build()
            .map_err(|err| SessionError::Launch(err.to_string()))?;

        let mut builder = BrowserConfig::builder();
        if !self.options.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &self.options.executable {
            builder = builder.chrome_executable(path);
        }
        let config = builder.build().map_err(SessionError::Launch)?;

        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|err| SessionError::Launch(err.to_string()))?;

        // Spawn the handler task
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(err) => {
                let _ = browser.close().await;
                let _ = browser.wait().await;
                handler.abort();
                return Err(SessionError::Launch(format!("failed to open page: {err}")));
            }
        };

        let user_agent = match browser.user_agent().await {
            Ok(user_agent) => Some(user_agent),
            Err(err) => {
                log::debug!("browser did not report a user agent at launch: {err}");
                None
            }
        };

        log::debug!(
            "launched chromium ({})",
            if self.options.headless { "headless" } else { "headed" }
        );

        Ok(Box::new(ChromiumSession {
            browser,
            page,
            handler,
            client,
            user_agent,
            navigation_timeout: self.options.navigation_timeout,
            closed: false,
        }))
    }
}

/// A single Chromium page owned by one login run.
pub struct ChromiumSession {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
    /// Cookie-less client; the browser's jar is the only cookie store.
    client: Client,
    user_agent: Option<String>,
    navigation_timeout: Duration,
    closed: bool,
}

impl ChromiumSession {
    fn ensure_open(&self) -> Result<(), SessionError> {
        if self.closed {
            Err(SessionError::Closed)
        } else {
            Ok(())
        }
    }

    async fn browser_cookies(&self, url: &Url) -> Result<Vec<SessionCookie>, SessionError> {
        let params = GetCookiesParams {
            urls: Some(vec![url.to_string()]),
        };
        let response = self
            .page
            .execute(params)
            .await
            .map_err(|err| SessionError::Cookies(err.to_string()))?;

        Ok(response
            .result
            .cookies
            .into_iter()
            .map(|cookie| SessionCookie::new(cookie.name, cookie.value))
            .collect())
    }

    /// Copy cookies set by an exchange response into the browser's jar.
    async fn store_cookies(&self, set_cookies: &[String], url: &Url) {
        let params: Vec<CookieParam> = set_cookies
            .iter()
            .filter_map(|header| parse_set_cookie(header, url, Utc::now()))
            .collect();
        if params.is_empty() {
            return;
        }

        let count = params.len();
        match self.page.execute(SetCookiesParams::new(params)).await {
            Ok(_) => log::debug!("stored {count} cookie(s) from {url} in the browser"),
            Err(err) => log::warn!("failed to store cookies from {url} in the browser: {err}"),
        }
    }
}

#[async_trait]
impl RenderedSession for ChromiumSession {
    async fn navigate(&mut self, url: &Url) -> Result<(), SessionError> {
        self.ensure_open()?;

        match tokio::time::timeout(self.navigation_timeout, self.page.goto(url.as_str())).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(err)) => Err(SessionError::navigation(url, err)),
            Err(_) => Err(SessionError::navigation(
                url,
                format!("timed out after {:?}", self.navigation_timeout),
            )),
        }
    }

    async fn request(&mut self, request: &SessionRequest) -> Result<RawResponse, SessionError> {
        self.ensure_open()?;

        let cookies = self.browser_cookies(&request.url).await?;
        let user_agent = match self.user_agent().await {
            Ok(user_agent) => Some(user_agent),
            Err(err) => {
                log::debug!("sending exchange without browser user agent: {err}");
                None
            }
        };

        let mut builder = form_request(&self.client, request);
        if !cookies.is_empty() {
            builder = builder.header(COOKIE, cookie_header(&cookies));
        }
        if let Some(user_agent) = user_agent {
            builder = builder.header(USER_AGENT, user_agent);
        }

        let response = builder
            .send()
            .await
            .map_err(|err| SessionError::request(&request.url, err))?;
        let set_cookies: Vec<String> = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok().map(str::to_string))
            .collect();

        let raw = read_response(response, &request.url).await?;
        self.store_cookies(&set_cookies, &request.url).await;
        Ok(raw)
    }

    async fn cookies(&mut self, origin: &Url) -> Result<Vec<SessionCookie>, SessionError> {
        self.ensure_open()?;

        let origin = Url::parse(&origin_from_url(origin))
            .map_err(|err| SessionError::Cookies(err.to_string()))?;
        self.browser_cookies(&origin).await
    }

    async fn user_agent(&mut self) -> Result<String, SessionError> {
        self.ensure_open()?;

        if let Some(user_agent) = &self.user_agent {
            return Ok(user_agent.clone());
        }

        let user_agent = self
            .page
            .evaluate("navigator.userAgent")
            .await
            .map_err(|err| SessionError::UserAgent(err.to_string()))?
            .into_value::<String>()
            .map_err(|err| SessionError::UserAgent(err.to_string()))?;
        self.user_agent = Some(user_agent.clone());
        Ok(user_agent)
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        self.ensure_open()?;
        self.closed = true;

        let result = self
            .browser
            .close()
            .await
            .map(|_| ())
            .map_err(|err| SessionError::Close(err.to_string()));
        if let Err(err) = self.browser.wait().await {
            log::debug!("chromium did not exit cleanly: {err}");
        }
        self.handler.abort();
        result
    }
}

/// Translate one `Set-Cookie` header into a CDP cookie scoped to `url`.
/// `Max-Age` wins over `Expires`; without either the cookie lives for the
/// browser session.
fn parse_set_cookie(header: &str, url: &Url, now: DateTime<Utc>) -> Option<CookieParam> {
    let mut parts = header.split(';');
    let (name, value) = parts.next()?.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }

    let mut builder = CookieParam::builder()
        .name(name)
        .value(value.trim())
        .url(url.as_str());
    let mut max_age = None;
    let mut expires = None;

    for attribute in parts {
        let (key, val) = match attribute.split_once('=') {
            Some((key, val)) => (key.trim(), val.trim()),
            None => (attribute.trim(), ""),
        };
        match key.to_ascii_lowercase().as_str() {
            "domain" if !val.is_empty() => builder = builder.domain(val),
            "path" if val.starts_with('/') => builder = builder.path(val),
            "secure" => builder = builder.secure(true),
            "httponly" => builder = builder.http_only(true),
            "samesite" => match val.to_ascii_lowercase().as_str() {
                "strict" => builder = builder.same_site(CookieSameSite::Strict),
                "lax" => builder = builder.same_site(CookieSameSite::Lax),
                "none" => builder = builder.same_site(CookieSameSite::None),
                _ => {}
            },
            "max-age" => max_age = val.parse::<i64>().ok(),
            "expires" => {
                expires = DateTime::parse_from_rfc2822(val)
                    .ok()
                    .map(|date| date.timestamp());
            }
            _ => {}
        }
    }

    if let Some(at) = max_age.map(|secs| now.timestamp().saturating_add(secs)).or(expires) {
        builder = builder.expires(TimeSinceEpoch::new(at as f64));
    }

    builder.build().ok()
}
