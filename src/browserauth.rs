//! High level login orchestration.
//!
//! Wires the configuration, the session backend, and the clearance poller into
//! a single run: validate configuration, parse the payload, acquire a rendered
//! session, poll until cleared, write the artifact, and release the session
//! exactly once whatever happened in between.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use crate::challenges::core::{
	ChallengeRequest, ClearanceResult, HttpSessionLauncher, InputError, RenderedSession,
	SessionError, SessionLauncher,
};
use crate::challenges::poller::{ClearancePoller, PollError};
use crate::config::{ConfigError, LoginConfig, SessionBackend};
use crate::external_deps::browser::{ChromiumLauncher, ChromiumOptions};
use crate::modules::events::{EventDispatcher, EventHandler, LoggingHandler};

/// Result alias used across the orchestration layer.
pub type LoginResult<T> = Result<T, LoginError>;

/// High-level error surfaced by the runner.
#[derive(Debug, Error)]
pub enum LoginError {
	#[error(transparent)]
	Config(#[from] ConfigError),
	#[error("invalid input: {0}")]
	Input(#[from] InputError),
	#[error("timeout waiting for browser clearance ({attempts} probe(s) in {elapsed:?})")]
	ChallengeTimeout {
		attempts: u32,
		elapsed: std::time::Duration,
	},
	#[error("browser session failed: {0}")]
	Transport(SessionError),
	#[error("failed to serialize clearance result: {0}")]
	Serialize(#[from] serde_json::Error),
	#[error("failed to write clearance result to {path}: {source}")]
	Output {
		path: PathBuf,
		source: std::io::Error,
	},
	#[error("failed to release browser session: {0}")]
	Cleanup(SessionError),
}

impl From<PollError> for LoginError {
	fn from(err: PollError) -> Self {
		match err {
			PollError::TimedOut { attempts, elapsed } => {
				LoginError::ChallengeTimeout { attempts, elapsed }
			}
			PollError::Transport(err) | PollError::Extraction(err) => LoginError::Transport(err),
		}
	}
}

impl LoginError {
	/// Process exit code for this failure.
	pub fn exit_code(&self) -> i32 {
		match self {
			LoginError::Config(_) => 2,
			LoginError::ChallengeTimeout { .. } => 3,
			_ => 1,
		}
	}
}

/// Fluent builder for [`BrowserLogin`].
pub struct BrowserLoginBuilder {
	config: LoginConfig,
	launcher: Option<Arc<dyn SessionLauncher>>,
	handlers: Vec<Arc<dyn EventHandler>>,
	logging: bool,
}

impl BrowserLoginBuilder {
	pub fn new(config: LoginConfig) -> Self {
		Self {
			config,
			launcher: None,
			handlers: Vec::new(),
			logging: true,
		}
	}

	/// Use a custom session backend instead of the one named by the config.
	pub fn with_launcher(mut self, launcher: Arc<dyn SessionLauncher>) -> Self {
		self.launcher = Some(launcher);
		self
	}

	pub fn with_event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
		self.handlers.push(handler);
		self
	}

	pub fn disable_logging(mut self) -> Self {
		self.logging = false;
		self
	}

	pub fn build(self) -> BrowserLogin {
		let launcher = self
			.launcher
			.unwrap_or_else(|| launcher_for(&self.config));

		let mut events = EventDispatcher::new();
		if self.logging {
			events.register_handler(Arc::new(LoggingHandler));
		}
		for handler in self.handlers {
			events.register_handler(handler);
		}

		BrowserLogin {
			config: self.config,
			launcher,
			poller: ClearancePoller::new(Arc::new(events)),
		}
	}
}

/// Runs one credential exchange through a rendered session.
pub struct BrowserLogin {
	config: LoginConfig,
	launcher: Arc<dyn SessionLauncher>,
	poller: ClearancePoller,
}

impl BrowserLogin {
	/// Runner with the session backend named by `config`.
	pub fn new(config: LoginConfig) -> Self {
		BrowserLoginBuilder::new(config).build()
	}

	pub fn builder(config: LoginConfig) -> BrowserLoginBuilder {
		BrowserLoginBuilder::new(config)
	}

	/// Parse `raw_input` and run the login, writing the artifact on success.
	///
	/// Configuration and input are validated before any session is launched.
	pub async fn run(&self, raw_input: &str) -> LoginResult<ClearanceResult> {
		let output_path = self.config.output_path()?;
		let request = ChallengeRequest::from_json(raw_input)?;
		self.run_request(&request, output_path).await
	}

	/// Run the login for an already-parsed request.
	pub async fn run_request(
		&self,
		request: &ChallengeRequest,
		output_path: &Path,
	) -> LoginResult<ClearanceResult> {
		log::info!("starting browser login against {}", request.base_url());

		let mut session = self
			.launcher
			.launch()
			.await
			.map_err(LoginError::Transport)?;

		let outcome = self
			.clear_and_write(request, session.as_mut(), output_path)
			.await;
		let released = session.close().await;

		settle(outcome, released)
	}

	async fn clear_and_write(
		&self,
		request: &ChallengeRequest,
		session: &mut dyn RenderedSession,
		output_path: &Path,
	) -> LoginResult<ClearanceResult> {
		let result = self.poller.run(request, session).await?;
		write_result(output_path, &result).await?;
		log::info!(
			"wrote clearance result (status {}) to {}",
			result.status,
			output_path.display()
		);
		Ok(result)
	}
}

/// Combine the run outcome with the release outcome. A release failure only
/// surfaces when nothing failed before it.
fn settle(
	outcome: LoginResult<ClearanceResult>,
	released: Result<(), SessionError>,
) -> LoginResult<ClearanceResult> {
	match (outcome, released) {
		(Ok(result), Ok(())) => Ok(result),
		(Ok(_), Err(err)) => Err(LoginError::Cleanup(err)),
		(Err(err), Ok(())) => Err(err),
		(Err(err), Err(cleanup)) => {
			log::warn!("failed to release browser session: {cleanup}");
			Err(err)
		}
	}
}

async fn write_result(path: &Path, result: &ClearanceResult) -> LoginResult<()> {
	let payload = serde_json::to_vec(result)?;
	tokio::fs::write(path, payload)
		.await
		.map_err(|source| LoginError::Output {
			path: path.to_path_buf(),
			source,
		})
}

fn launcher_for(config: &LoginConfig) -> Arc<dyn SessionLauncher> {
	match &config.backend {
		SessionBackend::Chromium {
			headless,
			executable,
		} => Arc::new(ChromiumLauncher::new(ChromiumOptions {
			headless: *headless,
			executable: executable.clone(),
			navigation_timeout: config.navigation_timeout,
		})),
		SessionBackend::HttpOnly => Arc::new(HttpSessionLauncher::default()),
	}
}
