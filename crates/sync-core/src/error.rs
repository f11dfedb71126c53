use std::{io, path::PathBuf};

use feedsync_job_queue::JobQueueError;

use super::feeds::FetchError;

/// Error type carried by every sync job.
#[derive(thiserror::Error, Debug)]
pub enum SyncError {
	#[error("feed sync failed: {0}")]
	Fetch(#[from] FetchError),
	#[error(transparent)]
	Queue(#[from] JobQueueError),
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
	#[error("failed to {action} sync settings at <path='{}'>: {source}", .path.display())]
	Io {
		action: &'static str,
		path: PathBuf,
		source: io::Error,
	},
	#[error("malformed sync settings at <path='{}'>: {source}", .path.display())]
	Json {
		path: PathBuf,
		source: serde_json::Error,
	},
}

impl ConfigError {
	pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
		let path = path.into();
		move |source| Self::Io {
			action,
			path,
			source,
		}
	}

	pub(crate) fn json(path: impl Into<PathBuf>) -> impl FnOnce(serde_json::Error) -> Self {
		let path = path.into();
		move |source| Self::Json { path, source }
	}
}
