//! trackgen: asynchronous music generation job engine.

pub mod api;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod jobs;
pub mod logging;
