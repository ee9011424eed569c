//! Integrations that rely on third-party automation stacks.
//!
//! This module groups the adapters that bridge the clearance loop with a real
//! browser, keeping the core agnostic of any specific automation library.

pub mod browser;

pub use browser::{ChromiumLauncher, ChromiumOptions, ChromiumSession};
