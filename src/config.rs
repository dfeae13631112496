//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;
use crate::jobs::StagePlan;

/// Default failure probability for the terminal-outcome draw.
pub const DEFAULT_FAILURE_PROBABILITY: f64 = 0.10;

/// Job engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Admission gap between submission and the driver starting.
    pub start_delay: Duration,
    /// Pause before each stage's update is applied.
    pub stage_gap: Duration,
    /// Multiplier applied to every stage duration.
    pub stage_time_scale: f64,
    /// Probability that a job ends in FAILURE.
    pub failure_probability: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            start_delay: Duration::from_millis(1000),
            stage_gap: Duration::from_millis(100),
            stage_time_scale: 1.0,
            failure_probability: DEFAULT_FAILURE_PROBABILITY,
        }
    }
}

impl EngineConfig {
    /// Build config from environment variables, falling back to defaults for
    /// anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let start_delay = env_parse::<u64>("TRACKGEN_START_DELAY_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.start_delay);

        let stage_gap = env_parse::<u64>("TRACKGEN_STAGE_GAP_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.stage_gap);

        let stage_time_scale =
            env_parse::<f64>("TRACKGEN_STAGE_TIME_SCALE")?.unwrap_or(defaults.stage_time_scale);

        let failure_probability = env_parse::<f64>("TRACKGEN_FAILURE_PROBABILITY")?
            .unwrap_or(defaults.failure_probability);

        let config = Self {
            start_delay,
            stage_gap,
            stage_time_scale,
            failure_probability,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.failure_probability) {
            return Err(ConfigError::InvalidValue {
                key: "failure_probability".to_string(),
                message: format!("{} is not within [0, 1]", self.failure_probability),
            });
        }
        StagePlan::scaled(self.stage_time_scale)?;
        Ok(())
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Directory for rolling log files (None = stderr only).
    pub log_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            log_dir: None,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = env_parse::<u16>("TRACKGEN_PORT")?.unwrap_or(8000);
        let log_dir = std::env::var("TRACKGEN_LOG_DIR")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);
        Ok(Self { port, log_dir })
    }
}

/// Client-side configuration for submitting and polling over HTTP.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the job API.
    pub orchestrator_url: String,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            orchestrator_url: "http://127.0.0.1:8000".to_string(),
            poll_interval: Duration::from_secs(3),
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let orchestrator_url =
            std::env::var("ORCHESTRATOR_URL").unwrap_or(defaults.orchestrator_url);
        let poll_interval = env_parse::<u64>("TRACKGEN_POLL_INTERVAL_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.poll_interval);
        Ok(Self {
            orchestrator_url,
            poll_interval,
            request_timeout: defaults.request_timeout,
        })
    }
}

/// Read and parse an optional environment variable. Unset or blank values
/// yield `None`; unparsable values are an error.
fn env_parse<T>(key: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::ParseError(format!("{key}={raw}: {e}"))),
        _ => Ok(None),
    }
}
