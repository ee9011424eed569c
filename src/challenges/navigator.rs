//! Reaction to blocked probes.
//!
//! Surfaces the block page to the rendered session when the gate told us where
//! it lives, and keeps the "still waiting" notice from flooding observers.

use std::sync::Arc;

use chrono::Utc;
use tokio::time::Instant;

use crate::challenges::core::{NotificationThrottle, RenderedSession};
use crate::challenges::detectors::{ChallengeType, ClassificationOutcome};
use crate::challenges::poller::PollState;
use crate::modules::events::{ClearanceEvent, EventDispatcher, NavigationEvent, WaitingEvent};

/// Handles blocked outcomes for one poll run.
pub struct ChallengeNavigator {
    throttle: NotificationThrottle,
    events: Arc<EventDispatcher>,
}

impl ChallengeNavigator {
    pub fn new(events: Arc<EventDispatcher>) -> Self {
        Self::with_throttle(events, NotificationThrottle::default())
    }

    pub fn with_throttle(events: Arc<EventDispatcher>, throttle: NotificationThrottle) -> Self {
        Self { throttle, events }
    }

    /// Notify observers (throttled) and open the navigation hint, if any.
    ///
    /// Navigation is best-effort: the session may already be mid-challenge, so
    /// a failed load is reported as an event and otherwise ignored.
    pub async fn on_blocked(
        &mut self,
        outcome: &ClassificationOutcome,
        session: &mut dyn RenderedSession,
        state: &PollState,
    ) {
        let Some(challenge) = outcome.challenge_type() else {
            return;
        };

        self.events.dispatch(ClearanceEvent::Blocked {
            attempt: state.attempts,
            challenge: challenge_name(challenge),
        });

        let now = Instant::now();
        if self.throttle.try_acquire(now) {
            self.events.dispatch(ClearanceEvent::Waiting(WaitingEvent {
                attempt: state.attempts,
                remaining: state.deadline.saturating_duration_since(now),
                timestamp: Utc::now(),
            }));
        }

        if let Some(url) = outcome.navigation_url() {
            let error = session.navigate(url).await.err().map(|err| err.to_string());
            self.events.dispatch(ClearanceEvent::HintNavigation(NavigationEvent {
                url: url.clone(),
                error,
                timestamp: Utc::now(),
            }));
        }
    }
}

fn challenge_name(challenge: ChallengeType) -> &'static str {
    match challenge {
        ChallengeType::HtmlInterstitial => "html interstitial",
        ChallengeType::PerimeterXBlock => "perimeterx block",
    }
}
