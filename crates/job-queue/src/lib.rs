//!
//! # Job Queue
//!
//! Background job runner used by the feed sync core.
//!
//! Bring your own unified error type and enqueue some jobs, the queue will run each of them on
//! its own tokio task and report back through a [`JobHandle`]. Aside from that:
//! - Jobs enqueued with a [`UniqueWork`] key are deduplicated, at most one job per key is active;
//! - [`ExistingWorkPolicy::Replace`] cancels the current holder and starts the new job only once
//!   the old one has stopped, [`ExistingWorkPolicy::Keep`] refuses the new job;
//! - Jobs are canceled cooperatively through the [`Interrupter`] they receive;
//! - Every job that didn't finish yet has a [`JobReport`] carrying its parameters and state.
//!
//! ## Basic example
//!
//! ```
//! use feedsync_job_queue::{ExecStatus, Interrupter, Job, JobQueue, JobStatus};
//! use async_trait::async_trait;
//! use thiserror::Error;
//!
//! #[derive(Debug, Error)]
//! pub enum SampleError {
//!     #[error("Sample error")]
//!     SampleError,
//! }
//!
//! #[derive(Debug)]
//! pub struct ReadyJob;
//!
//! #[async_trait]
//! impl Job<SampleError> for ReadyJob {
//!     fn name(&self) -> &'static str {
//!         "ready"
//!     }
//!
//!     async fn run(&mut self, _interrupter: &Interrupter) -> Result<ExecStatus, SampleError> {
//!         Ok(ExecStatus::Done)
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let queue = JobQueue::<SampleError>::new();
//!
//!     let handle = queue.enqueue(ReadyJob).await.unwrap();
//!
//!     assert!(matches!(handle.await, Ok(JobStatus::Done)));
//!
//!     queue.shutdown().await;
//! }
//! ```

#![warn(
	clippy::all,
	clippy::pedantic,
	clippy::correctness,
	clippy::perf,
	clippy::style,
	clippy::suspicious,
	clippy::complexity,
	clippy::nursery,
	clippy::unwrap_used,
	unused_qualifications,
	rust_2018_idioms,
	trivial_casts,
	trivial_numeric_casts,
	unused_allocation,
	clippy::unnecessary_cast,
	clippy::cast_lossless,
	clippy::cast_possible_truncation,
	clippy::cast_possible_wrap,
	clippy::cast_precision_loss,
	clippy::cast_sign_loss,
	clippy::dbg_macro,
	clippy::deprecated_cfg_attr,
	clippy::separated_literal_suffix,
	deprecated
)]
#![forbid(deprecated_in_future)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

mod error;
mod handle;
mod job;
mod queue;
mod runner;

pub use error::{JobQueueError, RunError};
pub use handle::JobHandle;
pub use job::{
	ExecStatus, ExistingWorkPolicy, IntoJob, Interrupter, InterrupterFuture, Job, JobId, JobReport,
	JobState, JobStatus, UniqueWork,
};
pub use queue::JobQueue;
