//! Error types for trackgen.

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Job error: {0}")]
    Job(#[from] JobError),

    #[error("Client error: {0}")]
    Client(#[from] ClientError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),
}

/// Job lifecycle errors.
///
/// Simulated processing failures are not represented here: they are a normal
/// terminal state of the job record.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Invalid submission: {reason}")]
    Validation { reason: String },

    #[error("Job {id} not found")]
    NotFound { id: String },

    #[error("Job {id} already exists")]
    DuplicateId { id: String },

    #[error("Job {id} already in state {state}, cannot transition to {target}")]
    InvalidTransition {
        id: String,
        state: String,
        target: String,
    },
}

/// Errors raised by the HTTP client and pollers.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Job {id} not found")]
    NotFound { id: String },

    #[error("Server responded with status {status}: {detail}")]
    Status { status: u16, detail: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid orchestrator URL {url}: {message}")]
    InvalidUrl { url: String, message: String },
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;
