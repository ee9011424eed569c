//! Core utilities shared by the classifier, the poller, and session backends.

pub mod analysis;
pub mod http_session;
pub mod session;
pub mod timing;
pub mod types;

pub use analysis::{origin_from_url, origin_url, resolve_block_script, token_endpoint};
pub use http_session::{DEFAULT_USER_AGENT, HttpSession, HttpSessionLauncher};
pub use session::{RenderedSession, SessionError, SessionLauncher};
pub use timing::{
    MIN_CLEARANCE_TIMEOUT, NOTIFY_INTERVAL, NotificationThrottle, PROBE_BACKOFF, deadline_from,
    effective_timeout,
};
pub use types::{
    ChallengeRequest, ClearanceResult, InputError, RawResponse, SessionCookie,
    SessionCredentials, SessionRequest,
};
