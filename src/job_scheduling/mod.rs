//! Job scheduling subsystem
//!
//! - `JobQueue`: job storage with key deduplication and priority ordering
//! - `JobQueueRunner`: drains the queue within concurrency limits
//! - `JobHandler`: the work itself, injected by the caller
//! - `JobExecutor`: the crate's handler for rehash and maintenance jobs

pub mod job_executor;
pub mod job_queue;
pub mod job_queue_runner;
pub mod types;

pub use job_executor::JobExecutor;
pub use job_queue::{JobQueue, JobQueueStats};
pub use job_queue_runner::{JobHandler, JobQueueRunner};
pub use types::*;
