//! Settings and configuration module
//!
//! Provides the login runner's configuration with:
//! - Builder pattern
//! - Environment fallbacks for the output sink
//! - Session backend selection

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

/// Primary variable naming the output artifact path.
pub const OUTPUT_PATH_ENV: &str = "FOODCLI_OUTPUT_PATH";
/// Older name for [`OUTPUT_PATH_ENV`], still honoured.
pub const LEGACY_OUTPUT_PATH_ENV: &str = "FOODORACLI_OUTPUT_PATH";
/// Optional Chromium executable override.
pub const CHROME_PATH_ENV: &str = "BROWSERAUTH_CHROME_PATH";

const DEFAULT_NAVIGATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Required configuration that is absent or unusable.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("FOODCLI_OUTPUT_PATH missing")]
    MissingOutputPath,
}

/// Which rendered-session backend a run uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionBackend {
    /// Chromium driven over CDP.
    Chromium {
        headless: bool,
        executable: Option<PathBuf>,
    },
    /// Plain HTTP client with a cookie jar; cannot run challenge scripts.
    HttpOnly,
}

impl Default for SessionBackend {
    fn default() -> Self {
        Self::Chromium {
            headless: false,
            executable: None,
        }
    }
}

/// Runner configuration.
#[derive(Debug, Clone)]
pub struct LoginConfig {
    output_path: Option<PathBuf>,
    pub backend: SessionBackend,
    pub navigation_timeout: Duration,
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self {
            output_path: None,
            backend: SessionBackend::default(),
            navigation_timeout: DEFAULT_NAVIGATION_TIMEOUT,
        }
    }
}

impl LoginConfig {
    pub fn builder() -> LoginConfigBuilder {
        LoginConfigBuilder::default()
    }

    /// Configuration read from the process environment alone.
    pub fn from_env() -> Self {
        Self::builder().build()
    }

    /// Where the artifact goes. Checked before any browser is launched.
    pub fn output_path(&self) -> Result<&Path, ConfigError> {
        self.output_path
            .as_deref()
            .ok_or(ConfigError::MissingOutputPath)
    }
}

/// Fluent builder for [`LoginConfig`]. Unset values fall back to the
/// environment, then to defaults.
#[derive(Debug, Default)]
pub struct LoginConfigBuilder {
    output_path: Option<PathBuf>,
    backend: Option<SessionBackend>,
    navigation_timeout: Option<Duration>,
    ignore_environment: bool,
}

impl LoginConfigBuilder {
    pub fn with_output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = Some(path.into());
        self
    }

    pub fn with_backend(mut self, backend: SessionBackend) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn with_navigation_timeout(mut self, timeout: Duration) -> Self {
        self.navigation_timeout = Some(timeout);
        self
    }

    /// Skip the environment fallbacks; only explicitly set values count.
    pub fn ignore_environment(mut self) -> Self {
        self.ignore_environment = true;
        self
    }

    pub fn build(self) -> LoginConfig {
        let use_env = !self.ignore_environment;
        let output_path = self
            .output_path
            .or_else(|| use_env.then(output_path_from_env).flatten());
        let backend = self.backend.unwrap_or_else(|| SessionBackend::Chromium {
            headless: false,
            executable: use_env.then(|| env_path(CHROME_PATH_ENV)).flatten(),
        });

        LoginConfig {
            output_path,
            backend,
            navigation_timeout: self
                .navigation_timeout
                .unwrap_or(DEFAULT_NAVIGATION_TIMEOUT),
        }
    }
}

fn output_path_from_env() -> Option<PathBuf> {
    env_path(OUTPUT_PATH_ENV).or_else(|| env_path(LEGACY_OUTPUT_PATH_ENV))
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var_os(key)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}
