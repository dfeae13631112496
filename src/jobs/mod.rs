//! Job lifecycle engine.
//!
//! - `model`: Job record and status state machine (PENDING → PROCESSING → SUCCESS/FAILURE)
//! - `stages`: Ordered stage table with conditional stages
//! - `store`: In-memory store with copy-on-read snapshots and per-job writers
//! - `driver`: Per-job stage driver and terminal-outcome draw
//! - `service`: Submission, id generation, driver launch, status queries

pub mod driver;
pub mod model;
pub mod service;
pub mod stages;
pub mod store;

pub use driver::{FailureInjector, JobDriver};
pub use model::{Job, JobResult, JobStatus};
pub use service::JobService;
pub use stages::{Stage, StagePlan};
pub use store::{JobStore, JobWriter, StoreSummary};
