use thiserror::Error;

use super::job::JobId;

/// Unified error type that every job dispatched to a [`JobQueue`](crate::JobQueue) must return.
pub trait RunError: std::error::Error + Send + Sync + 'static {}

impl<T: std::error::Error + Send + Sync + 'static> RunError for T {}

#[derive(Debug, Error)]
pub enum JobQueueError {
	#[error("job not found: <id='{0}'>")]
	NotFound(JobId),
	#[error("job already queued: <key='{key}', new_id='{new_id}', existing_id='{existing_id}'>")]
	AlreadyQueued {
		key: String,
		new_id: JobId,
		existing_id: JobId,
	},
	#[error("internal job panic! <id='{0}'>")]
	Panic(JobId),
	#[error("job queue is shutting down or was already shutdown")]
	Shutdown,
}
