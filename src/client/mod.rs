//! Client side of the job API: HTTP client and status poller.

pub mod http;
pub mod poller;

pub use http::HttpJobClient;
pub use poller::{JobStatusSource, PollHandle, PollOutcome, Poller};
