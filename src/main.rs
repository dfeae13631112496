use clap::Parser;

use trackgen::cli::{self, Args, Command};
use trackgen::config::{EngineConfig, ServerConfig};
use trackgen::jobs::JobStatus;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let server_config = ServerConfig::from_env()?;

    let _log_guard = trackgen::logging::init(server_config.log_dir.as_deref());

    match args.command {
        Command::Serve { port } => {
            let mut config = server_config;
            if let Some(port) = port {
                config.port = port;
            }
            let engine = EngineConfig::from_env()?;
            eprintln!("🎵 trackgen v{}", env!("CARGO_PKG_VERSION"));
            eprintln!("   Submit: POST http://0.0.0.0:{}/create-track", config.port);
            eprintln!("   Status: GET  http://0.0.0.0:{}/jobs/{{job_id}}", config.port);
            Ok(cli::serve(config, engine).await?)
        }
        Command::Create {
            prompt,
            reference_track_url,
            orchestrator_url,
            poll_interval_secs,
        } => {
            let config = cli::client_config(orchestrator_url, poll_interval_secs)?;
            let status = cli::create(config, &prompt, reference_track_url.as_deref()).await?;
            if status == JobStatus::Failure {
                std::process::exit(1);
            }
            Ok(())
        }
    }
}
