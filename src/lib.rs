//! # browserauth-rs
//!
//! Password-grant token exchange for APIs that sit behind a Cloudflare or
//! PerimeterX challenge gate.
//!
//! A plain HTTP client cannot get past those gates, so the exchange is issued
//! from inside a rendered browser session instead. When the gate answers with a
//! challenge, the session is pointed at the challenge page and a person solves
//! it in the opened window; the exchange is retried until it gets through or
//! the deadline passes. The response, the session cookies and the browser's
//! user agent are then written out as one JSON artifact.
//!
//! ## Example
//!
//! ```no_run
//! use browserauth::{BrowserLogin, LoginConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = LoginConfig::builder()
//!         .with_output_path("/tmp/clearance.json")
//!         .build();
//!     let login = BrowserLogin::new(config);
//!     let result = login
//!         .run(r#"{"base_url":"https://api.example.com/api/v5/","email":"me@example.com",
//!                  "password":"secret","client_secret":"cs","device_id":"dev-1"}"#)
//!         .await?;
//!     println!("cleared with status {}", result.status);
//!     Ok(())
//! }
//! ```

mod browserauth;

pub mod challenges;
pub mod config;
pub mod external_deps;
pub mod modules;

pub use crate::browserauth::{BrowserLogin, BrowserLoginBuilder, LoginError, LoginResult};

pub use crate::challenges::core::{
    ChallengeRequest,
    ClearanceResult,
    HttpSession,
    HttpSessionLauncher,
    InputError,
    RawResponse,
    RenderedSession,
    SessionCookie,
    SessionCredentials,
    SessionError,
    SessionLauncher,
    SessionRequest,
};

pub use crate::challenges::detectors::{
    ChallengeType,
    ClassificationOutcome,
    ResponseClassifier,
};

pub use crate::challenges::poller::{ClearancePoller, PollError};

pub use crate::config::{ConfigError, LoginConfig, LoginConfigBuilder, SessionBackend};

pub use crate::external_deps::browser::{ChromiumLauncher, ChromiumOptions};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
