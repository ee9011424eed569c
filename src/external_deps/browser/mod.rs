//! Browser-automation backends for the rendered session.
//!
//! Currently Chromium via chromiumoxide.

pub mod chromium;

pub use chromium::{ChromiumLauncher, ChromiumOptions, ChromiumSession};
