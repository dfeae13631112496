//! Command-line interface: run the API server or submit a track and poll it.

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::info;

use crate::api::job_routes;
use crate::client::{HttpJobClient, PollOutcome, Poller};
use crate::config::{ClientConfig, EngineConfig, ServerConfig};
use crate::error::{Error, Result};
use crate::jobs::{JobService, JobStatus};

#[derive(Debug, Parser)]
#[command(name = "trackgen", version, about = "Music generation job engine")]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the job API server.
    Serve {
        /// Port to listen on (overrides TRACKGEN_PORT).
        #[arg(long)]
        port: Option<u16>,
    },
    /// Create a new music track from a prompt and wait for it.
    Create {
        /// Natural language description of the music to generate.
        #[arg(long)]
        prompt: String,
        /// URL of an audio file to analyze for style.
        #[arg(long)]
        reference_track_url: Option<String>,
        /// Base URL of the job API (overrides ORCHESTRATOR_URL).
        #[arg(long)]
        orchestrator_url: Option<String>,
        /// Seconds between status queries.
        #[arg(long)]
        poll_interval_secs: Option<u64>,
    },
}

/// Run the API server until it stops.
pub async fn serve(config: ServerConfig, engine: EngineConfig) -> Result<()> {
    let service = Arc::new(JobService::new(&engine)?);
    let app = job_routes(service);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    info!(
        port = config.port,
        failure_probability = engine.failure_probability,
        stage_time_scale = engine.stage_time_scale,
        "Job API server started"
    );
    axum::serve(listener, app).await?;
    Ok(())
}

/// Submit a prompt, poll until terminal, and report the result.
///
/// Returns the terminal status; the caller decides the exit code.
pub async fn create(
    config: ClientConfig,
    prompt: &str,
    reference_track_url: Option<&str>,
) -> Result<JobStatus> {
    let client = Arc::new(HttpJobClient::new(&config)?);

    eprintln!("[*] Submitting job to {}/create-track...", client.base_url());
    let created = client.create_track(prompt, reference_track_url).await?;
    eprintln!("[+] Job created. Job ID: {}", created.job_id);

    let poller = Poller::new(Arc::clone(&client), config.poll_interval);
    let mut last_status: Option<JobStatus> = None;
    let mut last_step = String::new();
    let outcome = poller
        .poll_until_terminal(&created.job_id, |job| {
            if last_status != Some(job.status) {
                eprintln!("[*] Job status changed to: {}", job.status);
                last_status = Some(job.status);
            }
            if job.status.is_active() && job.result.step != last_step {
                eprintln!("    {} ({}%)", job.result.step, job.result.progress);
                last_step = job.result.step.clone();
            }
        })
        .await;

    match outcome {
        PollOutcome::Finished(job) if job.status == JobStatus::Success => {
            eprintln!("[+] Job completed!");
            match &job.result.final_track_url {
                Some(url) => println!("Final Track Location: {url}"),
                None => println!("No output URL provided in the result."),
            }
            for (name, url) in job.result.stems.iter().flatten() {
                println!("  {name}: {url}");
            }
            Ok(job.status)
        }
        PollOutcome::Finished(job) => {
            let reason = job
                .result
                .error
                .as_deref()
                .unwrap_or("No specific error details provided.");
            eprintln!("[!] Job failed. Reason: {reason}");
            Ok(job.status)
        }
        PollOutcome::Aborted { error, .. } => {
            eprintln!("[!] Failed to poll job status: {error}");
            Err(Error::Client(error))
        }
    }
}

/// Resolve client settings: CLI flags win over the environment.
pub fn client_config(
    orchestrator_url: Option<String>,
    poll_interval_secs: Option<u64>,
) -> Result<ClientConfig> {
    let mut config = ClientConfig::from_env()?;
    if let Some(url) = orchestrator_url {
        config.orchestrator_url = url;
    }
    if let Some(secs) = poll_interval_secs {
        config.poll_interval = Duration::from_secs(secs);
    }
    Ok(config)
}
