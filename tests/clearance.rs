mod support;

use std::sync::Arc;
use std::time::Duration;

use browserauth::modules::events::{ClearanceEvent, EventDispatcher};
use browserauth::{ChallengeRequest, ClearancePoller, PollError, SessionError};
use tokio::time::Instant;
use url::Url;

use support::{
    EventLog, Script, ScriptedSession, Step, TOKEN_BODY, html_block, login_payload, px_block,
    response, token_ok,
};

fn poller() -> (ClearancePoller, Arc<EventLog>) {
    let log = Arc::new(EventLog::default());
    let mut events = EventDispatcher::new();
    events.register_handler(log.clone());
    (ClearancePoller::new(Arc::new(events)), log)
}

fn request(timeout_millis: u64) -> ChallengeRequest {
    ChallengeRequest::from_json(&login_payload(timeout_millis)).unwrap()
}

fn origin() -> Url {
    Url::parse("https://api.example.com/").unwrap()
}

#[tokio::test(start_paused = true)]
async fn immediate_success_returns_first_response() {
    let (poller, events) = poller();
    let (mut session, log) = ScriptedSession::new(Script::new(vec![token_ok()]));

    let result = poller.run(&request(0), &mut session).await.unwrap();

    assert_eq!(result.status, 200);
    assert_eq!(result.body, TOKEN_BODY);
    assert_eq!(result.headers["content-type"], "application/json");
    assert_eq!(result.cookie_header, "__cf_bm=abc; _px3=def");
    assert!(result.user_agent.contains("ScriptedBrowser"));

    let log = log.lock().unwrap();
    assert_eq!(log.requests.len(), 1);
    assert_eq!(log.navigations, vec![origin()]);
    assert_eq!(log.closes, 0, "poller must not release the session");
    assert_eq!(events.waiting_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn clears_after_two_html_blocks() {
    let (poller, events) = poller();
    let (mut session, log) =
        ScriptedSession::new(Script::new(vec![html_block(), html_block(), token_ok()]));
    let started = Instant::now();

    let result = poller.run(&request(0), &mut session).await.unwrap();

    assert_eq!(result.status, 200);
    assert_eq!(result.body, TOKEN_BODY);
    assert_eq!(events.blocked_count(), 2);
    assert_eq!(events.waiting_count(), 1);
    // Two backoffs between three probes.
    assert_eq!(started.elapsed(), Duration::from_millis(3_000));

    let log = log.lock().unwrap();
    assert_eq!(log.requests.len(), 3);
    // HTML interstitials carry no hint, so only the seed navigation happens.
    assert_eq!(log.navigations, vec![origin()]);
}

#[tokio::test(start_paused = true)]
async fn non_success_status_is_still_terminal() {
    let (poller, _events) = poller();
    let unauthorized = response(401, "application/json", r#"{"error":"invalid_grant"}"#);
    let (mut session, log) = ScriptedSession::new(Script::new(vec![Step::Respond(unauthorized)]));

    let result = poller.run(&request(0), &mut session).await.unwrap();

    assert_eq!(result.status, 401);
    assert_eq!(result.body, r#"{"error":"invalid_grant"}"#);
    assert_eq!(log.lock().unwrap().requests.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn perimeterx_block_navigates_to_resolved_script() {
    let (poller, events) = poller();
    let block = r#"{"appId":"PXabc123","blockScript":"/px/captcha.js?uuid=1"}"#;
    let (mut session, log) = ScriptedSession::new(Script::new(vec![px_block(block), token_ok()]));

    poller.run(&request(0), &mut session).await.unwrap();

    assert_eq!(events.hint_navigation_count(), 1);
    let log = log.lock().unwrap();
    assert_eq!(
        log.navigations,
        vec![
            origin(),
            Url::parse("https://api.example.com/px/captcha.js?uuid=1").unwrap()
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn malformed_block_script_keeps_polling_without_navigation() {
    let (poller, events) = poller();
    let block = r#"{"app_id":"PXabc123","blockScript":"captcha.js","altBlockScript":"ftp://x"}"#;
    let (mut session, log) =
        ScriptedSession::new(Script::new(vec![px_block(block), px_block(block), token_ok()]));

    let result = poller.run(&request(0), &mut session).await.unwrap();

    assert_eq!(result.status, 200);
    assert_eq!(events.blocked_count(), 2);
    assert_eq!(events.hint_navigation_count(), 0);
    let log = log.lock().unwrap();
    assert_eq!(log.requests.len(), 3);
    assert_eq!(log.navigations, vec![origin()]);
}

#[tokio::test(start_paused = true)]
async fn tiny_timeout_is_floored_to_ten_seconds() {
    let (poller, events) = poller();
    let (mut session, log) = ScriptedSession::new(Script::new(vec![html_block()]));
    let started = Instant::now();

    let err = poller.run(&request(1), &mut session).await.unwrap_err();

    match err {
        PollError::TimedOut { attempts, elapsed } => {
            // Probes at 0, 1.5, ..., 9.0 s; the check at 10.5 s is past the deadline.
            assert_eq!(attempts, 7);
            assert!(elapsed >= Duration::from_secs(10));
        }
        other => panic!("expected timeout, got {other:?}"),
    }
    assert!(started.elapsed() >= Duration::from_secs(10));
    assert_eq!(log.lock().unwrap().requests.len(), 7);
    assert!(
        events
            .events()
            .iter()
            .any(|event| matches!(event, ClearanceEvent::TimedOut(_)))
    );
}

#[tokio::test(start_paused = true)]
async fn waiting_notifications_are_throttled() {
    let (poller, events) = poller();
    let (mut session, _log) = ScriptedSession::new(Script::new(vec![html_block()]));

    let _ = poller.run(&request(0), &mut session).await;

    // Blocks at 0..=9 s every 1.5 s: notices at 0 s and 6 s only.
    assert_eq!(events.blocked_count(), 7);
    assert_eq!(events.waiting_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn larger_timeout_is_honoured() {
    let (poller, _events) = poller();
    let (mut session, log) = ScriptedSession::new(Script::new(vec![html_block()]));

    let err = poller.run(&request(20_000), &mut session).await.unwrap_err();

    assert!(matches!(err, PollError::TimedOut { attempts: 14, .. }));
    assert_eq!(log.lock().unwrap().requests.len(), 14);
}

#[tokio::test(start_paused = true)]
async fn navigation_failures_are_swallowed() {
    let (poller, events) = poller();
    let block = r#"{"appId":"PXabc123","altBlockScript":"https://captcha.px-cdn.net/block"}"#;
    let mut script = Script::new(vec![px_block(block), token_ok()]);
    script.failing_navigations = true;
    let (mut session, log) = ScriptedSession::new(script);

    let result = poller.run(&request(0), &mut session).await.unwrap();

    assert_eq!(result.status, 200);
    assert_eq!(log.lock().unwrap().navigations.len(), 2);
    let failed: Vec<_> = events
        .events()
        .into_iter()
        .filter_map(|event| match event {
            ClearanceEvent::SeedNavigation(nav) | ClearanceEvent::HintNavigation(nav) => nav.error,
            _ => None,
        })
        .collect();
    assert_eq!(failed.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn request_failure_is_fatal() {
    let (poller, _events) = poller();
    let (mut session, log) = ScriptedSession::new(Script::new(vec![
        html_block(),
        Step::Fail("connection reset".into()),
    ]));

    let err = poller.run(&request(0), &mut session).await.unwrap_err();

    assert!(matches!(
        err,
        PollError::Transport(SessionError::Request { .. })
    ));
    assert_eq!(log.lock().unwrap().requests.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn cookie_read_failure_is_reported_as_extraction() {
    let (poller, _events) = poller();
    let mut script = Script::new(vec![token_ok()]);
    script.failing_cookies = true;
    let (mut session, _log) = ScriptedSession::new(script);

    let err = poller.run(&request(0), &mut session).await.unwrap_err();

    assert!(matches!(
        err,
        PollError::Extraction(SessionError::Cookies(_))
    ));
    assert!(!err.to_string().contains("token exchange"));
}

#[tokio::test(start_paused = true)]
async fn missing_user_agent_yields_empty_string() {
    let (poller, _events) = poller();
    let mut script = Script::new(vec![token_ok()]);
    script.user_agent = None;
    script.cookies.clear();
    let (mut session, _log) = ScriptedSession::new(script);

    let result = poller.run(&request(0), &mut session).await.unwrap();

    assert_eq!(result.user_agent, "");
    assert_eq!(result.cookie_header, "");
}

#[tokio::test(start_paused = true)]
async fn token_exchange_carries_form_and_headers() {
    let (poller, _events) = poller();
    let (mut session, log) = ScriptedSession::new(Script::new(vec![token_ok()]));

    poller.run(&request(0), &mut session).await.unwrap();

    let log = log.lock().unwrap();
    let exchange = &log.requests[0];
    assert_eq!(exchange.method, http::Method::POST);
    assert_eq!(
        exchange.url.as_str(),
        "https://api.example.com/api/v5/oauth2/token"
    );
    let fields: Vec<&str> = exchange.form_fields.iter().map(|(k, _)| k.as_str()).collect();
    assert_eq!(
        fields,
        [
            "username",
            "password",
            "grant_type",
            "client_secret",
            "scope",
            "client_id"
        ]
    );
    assert!(
        exchange
            .headers
            .iter()
            .any(|(name, value)| name == "X-Device" && value == "device-1")
    );
    assert!(!exchange.headers.iter().any(|(name, _)| name == "X-OTP"));
}
