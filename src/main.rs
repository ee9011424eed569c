//! browserauth: runs one password-grant login through a rendered browser.
//!
//! Reads the login payload as JSON on stdin and writes the clearance artifact
//! to the configured output path.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tokio::io::AsyncReadExt;

use browserauth::config::CHROME_PATH_ENV;
use browserauth::{BrowserLogin, InputError, LoginConfig, LoginError, SessionBackend};

#[derive(Parser)]
#[command(
    name = "browserauth",
    about = "Password-grant token exchange cleared through a rendered browser session",
    version
)]
struct Cli {
    /// Where to write the clearance artifact.
    /// Falls back to FOODCLI_OUTPUT_PATH, then FOODORACLI_OUTPUT_PATH.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Run Chromium without a window.
    #[arg(long)]
    headless: bool,

    /// Chromium executable to launch.
    #[arg(long, env = CHROME_PATH_ENV)]
    chrome: Option<PathBuf>,

    /// Use a plain HTTP session instead of Chromium. Cannot solve challenges.
    #[arg(long, conflicts_with_all = ["headless", "chrome"])]
    http_only: bool,

    /// Seconds allowed for a single page navigation.
    #[arg(long, default_value_t = 30)]
    navigation_timeout: u64,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Cli {
    fn config(&self) -> LoginConfig {
        let backend = if self.http_only {
            SessionBackend::HttpOnly
        } else {
            SessionBackend::Chromium {
                headless: self.headless,
                executable: self.chrome.clone(),
            }
        };

        let mut builder = LoginConfig::builder()
            .with_backend(backend)
            .with_navigation_timeout(Duration::from_secs(self.navigation_timeout));
        if let Some(path) = &self.output {
            builder = builder.with_output_path(path);
        }
        builder.build()
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err}");
            ExitCode::from(err.exit_code() as u8)
        }
    }
}

async fn run(cli: &Cli) -> Result<(), LoginError> {
    let config = cli.config();
    config.output_path()?;
    let login = BrowserLogin::new(config);

    let mut raw = String::new();
    tokio::io::stdin()
        .read_to_string(&mut raw)
        .await
        .map_err(InputError::Read)?;

    login.run(&raw).await.map(|_| ())
}
