//! Clearance polling loop.
//!
//! Drives one login run through three phases: `Probing` issues the token
//! exchange through the rendered session and classifies the answer, `Cleared`
//! lifts the session credentials and returns, `TimedOut` gives up once the
//! deadline passes. Blocked probes never end a run; they hand over to the
//! [`ChallengeNavigator`] and back off before the next probe.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio::time::{Instant, sleep};
use url::Url;

use crate::challenges::core::{
    ChallengeRequest, ClearanceResult, PROBE_BACKOFF, RawResponse, RenderedSession, SessionError,
    deadline_from,
};
use crate::challenges::detectors::{ClassificationOutcome, ResponseClassifier};
use crate::challenges::extractor::SessionExtractor;
use crate::challenges::navigator::ChallengeNavigator;
use crate::modules::events::{
    ClearanceEvent, ClearedEvent, EventDispatcher, NavigationEvent, ProbeEvent, TimedOutEvent,
};

/// Failures that end a poll run without a result.
#[derive(Debug, Error)]
pub enum PollError {
    #[error("timeout waiting for browser clearance after {attempts} probe(s) in {elapsed:?}")]
    TimedOut { attempts: u32, elapsed: Duration },
    #[error("token exchange failed: {0}")]
    Transport(#[from] SessionError),
    #[error("failed to read credentials from the cleared session: {0}")]
    Extraction(SessionError),
}

/// Loop-local bookkeeping for one run.
#[derive(Debug, Clone)]
pub struct PollState {
    pub started: Instant,
    pub deadline: Instant,
    pub attempts: u32,
}

impl PollState {
    /// Start a run at `started`; the requested timeout is floored.
    pub fn new(started: Instant, requested_timeout: Duration) -> Self {
        Self {
            started,
            deadline: deadline_from(started, requested_timeout),
            attempts: 0,
        }
    }

    pub fn expired(&self, now: Instant) -> bool {
        now >= self.deadline
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

/// Phases of a run. `Cleared` and `TimedOut` are terminal.
#[derive(Debug)]
enum PollPhase {
    Probing,
    Cleared(RawResponse),
    TimedOut,
}

/// Polls the token endpoint until the gate clears or the deadline passes.
pub struct ClearancePoller {
    events: Arc<EventDispatcher>,
    extractor: SessionExtractor,
}

impl ClearancePoller {
    pub fn new(events: Arc<EventDispatcher>) -> Self {
        Self {
            events,
            extractor: SessionExtractor::new(),
        }
    }

    /// Run the loop against `session`. The session is borrowed, not released:
    /// the caller owns its lifetime.
    pub async fn run(
        &self,
        request: &ChallengeRequest,
        session: &mut dyn RenderedSession,
    ) -> Result<ClearanceResult, PollError> {
        let mut state = PollState::new(Instant::now(), request.requested_timeout());
        let classifier = ResponseClassifier::new(request.base_url());
        let origin = classifier.origin().clone();
        let mut navigator = ChallengeNavigator::new(self.events.clone());
        let exchange = request.token_exchange();

        log::debug!(
            "polling {} until {:?} from now",
            exchange.url,
            state.deadline.saturating_duration_since(state.started)
        );
        self.seed(session, &origin).await;

        let mut phase = PollPhase::Probing;
        loop {
            phase = match phase {
                PollPhase::Probing if state.expired(Instant::now()) => PollPhase::TimedOut,
                PollPhase::Probing => {
                    state.attempts += 1;
                    let probe_started = Instant::now();
                    let response = session.request(&exchange).await?;
                    let status = response.status;
                    let outcome = classifier.classify(response);

                    self.events.dispatch(ClearanceEvent::Probe(ProbeEvent {
                        attempt: state.attempts,
                        status,
                        outcome: outcome.label(),
                        latency: probe_started.elapsed(),
                        timestamp: Utc::now(),
                    }));

                    match outcome {
                        ClassificationOutcome::Success(response)
                        | ClassificationOutcome::Other(response) => PollPhase::Cleared(response),
                        blocked => {
                            navigator.on_blocked(&blocked, session, &state).await;
                            sleep(PROBE_BACKOFF).await;
                            PollPhase::Probing
                        }
                    }
                }
                PollPhase::Cleared(response) => {
                    let credentials = self
                        .extractor
                        .extract(session, &origin)
                        .await
                        .map_err(PollError::Extraction)?;
                    self.events.dispatch(ClearanceEvent::Cleared(ClearedEvent {
                        status: response.status,
                        attempts: state.attempts,
                        elapsed: state.elapsed(),
                        timestamp: Utc::now(),
                    }));
                    return Ok(ClearanceResult::new(response, credentials));
                }
                PollPhase::TimedOut => {
                    let elapsed = state.elapsed();
                    self.events.dispatch(ClearanceEvent::TimedOut(TimedOutEvent {
                        attempts: state.attempts,
                        elapsed,
                        timestamp: Utc::now(),
                    }));
                    return Err(PollError::TimedOut {
                        attempts: state.attempts,
                        elapsed,
                    });
                }
            };
        }
    }

    /// Open the site origin once so the vendor's client-side script can run and
    /// seed cookies. Failures are reported and otherwise ignored.
    async fn seed(&self, session: &mut dyn RenderedSession, origin: &Url) {
        let error = session.navigate(origin).await.err().map(|err| err.to_string());
        self.events.dispatch(ClearanceEvent::SeedNavigation(NavigationEvent {
            url: origin.clone(),
            error,
            timestamp: Utc::now(),
        }));
    }
}
