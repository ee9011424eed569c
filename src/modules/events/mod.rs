//! Event system for the clearance loop.
//!
//! Provides hooks for logging and custom observers around probe, navigation,
//! and terminal activity.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Best-effort navigation issued by the loop.
#[derive(Debug, Clone)]
pub struct NavigationEvent {
    pub url: Url,
    /// Error text when the navigation failed. Failures never abort the run.
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// One token-exchange attempt and how it was classified.
#[derive(Debug, Clone)]
pub struct ProbeEvent {
    pub attempt: u32,
    pub status: u16,
    pub outcome: &'static str,
    pub latency: Duration,
    pub timestamp: DateTime<Utc>,
}

/// Throttled notice that the loop is still waiting on the gate.
#[derive(Debug, Clone)]
pub struct WaitingEvent {
    pub attempt: u32,
    pub remaining: Duration,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ClearedEvent {
    pub status: u16,
    pub attempts: u32,
    pub elapsed: Duration,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct TimedOutEvent {
    pub attempts: u32,
    pub elapsed: Duration,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub enum ClearanceEvent {
    SeedNavigation(NavigationEvent),
    Probe(ProbeEvent),
    Blocked { attempt: u32, challenge: &'static str },
    Waiting(WaitingEvent),
    HintNavigation(NavigationEvent),
    Cleared(ClearedEvent),
    TimedOut(TimedOutEvent),
}

/// Trait implemented by event handlers.
pub trait EventHandler: Send + Sync {
    fn handle(&self, event: &ClearanceEvent);
}

/// Dispatcher that broadcasts events to registered handlers.
#[derive(Default)]
pub struct EventDispatcher {
    handlers: Vec<Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self { handlers: Vec::new() }
    }

    /// Dispatcher with a [`LoggingHandler`] already registered.
    pub fn with_logging() -> Self {
        let mut dispatcher = Self::new();
        dispatcher.register_handler(Arc::new(LoggingHandler));
        dispatcher
    }

    pub fn register_handler(&mut self, handler: Arc<dyn EventHandler>) {
        self.handlers.push(handler);
    }

    pub fn dispatch(&self, event: ClearanceEvent) {
        for handler in &self.handlers {
            handler.handle(&event);
        }
    }
}

/// Logs events using the `log` crate.
#[derive(Debug)]
pub struct LoggingHandler;

impl EventHandler for LoggingHandler {
    fn handle(&self, event: &ClearanceEvent) {
        match event {
            ClearanceEvent::SeedNavigation(nav) => match &nav.error {
                None => log::debug!("seeded session at {}", nav.url),
                Some(error) => log::warn!("seed navigation to {} failed: {}", nav.url, error),
            },
            ClearanceEvent::Probe(probe) => {
                log::debug!(
                    "probe #{} -> {} {} ({:.2}s)",
                    probe.attempt,
                    probe.status,
                    probe.outcome,
                    probe.latency.as_secs_f64()
                );
            }
            ClearanceEvent::Blocked { attempt, challenge } => {
                log::debug!("probe #{attempt} blocked by {challenge}");
            }
            ClearanceEvent::Waiting(waiting) => {
                log::info!(
                    "waiting for browser clearance (solve the challenge in the opened window)... {:.0}s left",
                    waiting.remaining.as_secs_f64()
                );
            }
            ClearanceEvent::HintNavigation(nav) => match &nav.error {
                None => log::debug!("opened block page {}", nav.url),
                Some(error) => log::debug!("block page {} did not load: {}", nav.url, error),
            },
            ClearanceEvent::Cleared(cleared) => {
                log::info!(
                    "cleared after {} probe(s) in {:.1}s (status {})",
                    cleared.attempts,
                    cleared.elapsed.as_secs_f64(),
                    cleared.status
                );
            }
            ClearanceEvent::TimedOut(timed_out) => {
                log::warn!(
                    "timeout waiting for browser clearance after {} probe(s) in {:.1}s",
                    timed_out.attempts,
                    timed_out.elapsed.as_secs_f64()
                );
            }
        }
    }
}
