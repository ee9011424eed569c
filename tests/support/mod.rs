//! Scripted rendered session shared by the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use browserauth::modules::events::{ClearanceEvent, EventHandler};
use browserauth::{
    RawResponse, RenderedSession, SessionCookie, SessionError, SessionLauncher, SessionRequest,
};
use http::HeaderMap;
use http::HeaderValue;
use http::header::CONTENT_TYPE;
use url::Url;

pub const CF_INTERSTITIAL: &str = r#"<!DOCTYPE html>
<html lang="en-US"><head><title>Just a moment...</title></head>
<body><div id="challenge-stage"></div></body></html>"#;

pub const TOKEN_BODY: &str = r#"{"access_token":"at-123","refresh_token":"rt-456","expires_in":3600}"#;

pub fn login_payload(timeout_millis: u64) -> String {
    format!(
        r#"{{
            "base_url": "https://api.example.com/api/v5/",
            "email": "user@example.com",
            "password": "hunter2",
            "client_secret": "s3cret",
            "device_id": "device-1",
            "timeout_millis": {timeout_millis}
        }}"#
    )
}

pub fn response(status: u16, content_type: &'static str, body: &str) -> RawResponse {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    RawResponse::new(status, headers, body)
}

pub fn html_block() -> Step {
    Step::Respond(response(403, "text/html; charset=UTF-8", CF_INTERSTITIAL))
}

pub fn token_ok() -> Step {
    Step::Respond(response(200, "application/json", TOKEN_BODY))
}

pub fn px_block(body: &str) -> Step {
    Step::Respond(response(403, "application/json", body))
}

/// One scripted answer to a token-exchange request.
#[derive(Debug, Clone)]
pub enum Step {
    Respond(RawResponse),
    Fail(String),
}

/// Everything the scripted session observed, shared with the test body.
#[derive(Debug, Default)]
pub struct SessionLog {
    pub navigations: Vec<Url>,
    pub requests: Vec<SessionRequest>,
    pub closes: usize,
    pub launches: usize,
}

#[derive(Debug, Clone)]
pub struct Script {
    /// Answers in order; the last one repeats once the queue runs dry.
    pub steps: Vec<Step>,
    pub cookies: Vec<SessionCookie>,
    pub user_agent: Option<String>,
    pub failing_navigations: bool,
    pub failing_cookies: bool,
    pub failing_close: bool,
}

impl Script {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps,
            cookies: vec![
                SessionCookie::new("__cf_bm", "abc"),
                SessionCookie::new("_px3", "def"),
            ],
            user_agent: Some("Mozilla/5.0 (X11; Linux x86_64) ScriptedBrowser/1.0".into()),
            failing_navigations: false,
            failing_cookies: false,
            failing_close: false,
        }
    }
}

pub struct ScriptedSession {
    steps: VecDeque<Step>,
    script: Script,
    log: Arc<Mutex<SessionLog>>,
}

impl ScriptedSession {
    pub fn new(script: Script) -> (Self, Arc<Mutex<SessionLog>>) {
        let log = Arc::new(Mutex::new(SessionLog::default()));
        (Self::with_log(script, log.clone()), log)
    }

    fn with_log(script: Script, log: Arc<Mutex<SessionLog>>) -> Self {
        Self {
            steps: script.steps.iter().cloned().collect(),
            script,
            log,
        }
    }

    fn next_step(&mut self) -> Step {
        if self.steps.len() > 1 {
            self.steps.pop_front().expect("queue is non-empty")
        } else {
            self.steps.front().cloned().expect("script has no steps")
        }
    }
}

#[async_trait]
impl RenderedSession for ScriptedSession {
    async fn navigate(&mut self, url: &Url) -> Result<(), SessionError> {
        self.log.lock().unwrap().navigations.push(url.clone());
        if self.script.failing_navigations {
            return Err(SessionError::navigation(url, "net::ERR_ABORTED"));
        }
        Ok(())
    }

    async fn request(&mut self, request: &SessionRequest) -> Result<RawResponse, SessionError> {
        self.log.lock().unwrap().requests.push(request.clone());
        match self.next_step() {
            Step::Respond(response) => Ok(response),
            Step::Fail(reason) => Err(SessionError::request(&request.url, reason)),
        }
    }

    async fn cookies(&mut self, _origin: &Url) -> Result<Vec<SessionCookie>, SessionError> {
        if self.script.failing_cookies {
            return Err(SessionError::Cookies("target crashed".into()));
        }
        Ok(self.script.cookies.clone())
    }

    async fn user_agent(&mut self) -> Result<String, SessionError> {
        self.script
            .user_agent
            .clone()
            .ok_or_else(|| SessionError::UserAgent("page crashed".into()))
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        self.log.lock().unwrap().closes += 1;
        if self.script.failing_close {
            return Err(SessionError::Close("browser already gone".into()));
        }
        Ok(())
    }
}

/// Hands out [`ScriptedSession`]s that all report into one log.
pub struct ScriptedLauncher {
    script: Script,
    log: Arc<Mutex<SessionLog>>,
}

impl ScriptedLauncher {
    pub fn new(script: Script) -> (Arc<Self>, Arc<Mutex<SessionLog>>) {
        let log = Arc::new(Mutex::new(SessionLog::default()));
        let launcher = Arc::new(Self {
            script,
            log: log.clone(),
        });
        (launcher, log)
    }
}

#[async_trait]
impl SessionLauncher for ScriptedLauncher {
    async fn launch(&self) -> Result<Box<dyn RenderedSession>, SessionError> {
        self.log.lock().unwrap().launches += 1;
        Ok(Box::new(ScriptedSession::with_log(
            self.script.clone(),
            self.log.clone(),
        )))
    }
}

/// Records every dispatched event.
#[derive(Default)]
pub struct EventLog {
    events: Mutex<Vec<ClearanceEvent>>,
}

impl EventLog {
    pub fn events(&self) -> Vec<ClearanceEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn waiting_count(&self) -> usize {
        self.count(|event| matches!(event, ClearanceEvent::Waiting(_)))
    }

    pub fn blocked_count(&self) -> usize {
        self.count(|event| matches!(event, ClearanceEvent::Blocked { .. }))
    }

    pub fn hint_navigation_count(&self) -> usize {
        self.count(|event| matches!(event, ClearanceEvent::HintNavigation(_)))
    }

    fn count(&self, predicate: impl Fn(&ClearanceEvent) -> bool) -> usize {
        self.events.lock().unwrap().iter().filter(|e| predicate(e)).count()
    }
}

impl EventHandler for EventLog {
    fn handle(&self, event: &ClearanceEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}
