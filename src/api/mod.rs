//! HTTP surface over the job service.

pub mod routes;
pub mod schemas;

pub use routes::{ApiState, job_routes};
