mod config;
mod errors;
mod models;
mod repl;
mod service_client;
mod session;
mod speech;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::models::resume::ResumeFile;
use crate::service_client::ServiceClient;
use crate::session::config::{validate_seconds, InterviewConfig};
use crate::session::controller::{Collaborators, SessionController};
use crate::session::state::Command;
use crate::speech::console::{ConsoleNarrator, UnsupportedRecognizer};

/// Mock-interview coach: questions generated from your resume, answers scored
/// by the interview service.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Base URL of the interview service (overrides INTERVIEW_SERVICE_URL)
    #[arg(long)]
    service_url: Option<String>,

    /// Resume to pre-select (.pdf, .docx or .txt)
    #[arg(long)]
    resume: Option<PathBuf>,

    /// Read questions aloud
    #[arg(long)]
    voice: bool,

    /// Enable the per-question timer with this many seconds
    #[arg(long, value_name = "SECONDS")]
    timer: Option<u32>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::from_env()?;

    // Logs go to stderr so they never interleave with the interview on stdout
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Starting interview coach v{}", env!("CARGO_PKG_VERSION"));

    let mut interview = InterviewConfig {
        voice_enabled: args.voice,
        ..InterviewConfig::default()
    };
    if let Some(seconds) = args.timer {
        validate_seconds(seconds)?;
        interview.timer_enabled = true;
        interview.seconds_per_question = seconds;
    }

    let service_url = args.service_url.unwrap_or(config.service_url);
    let service = ServiceClient::new(service_url);
    info!("Interview service at {}", service.base_url());

    let handle = SessionController::spawn(
        interview,
        Collaborators {
            service: Arc::new(service),
            synthesizer: Arc::new(ConsoleNarrator::new(config.speech_words_per_minute)),
            recognizer: Arc::new(UnsupportedRecognizer),
        },
    );

    if let Some(path) = args.resume {
        let file = ResumeFile::load(&path)
            .await
            .with_context(|| format!("Failed to load resume {}", path.display()))?;
        info!("Pre-selected resume {}", file.file_name);
        handle.send(Command::SelectFile(file))?;
    }

    repl::run(handle).await
}
