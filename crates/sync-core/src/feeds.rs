use async_trait::async_trait;

use super::request::SyncRequest;

/// Failure reported by the feed fetching layer, surfaced as-is through the job status.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct FetchError {
	pub message: String,
}

impl FetchError {
	pub fn new(message: impl Into<String>) -> Self {
		Self {
			message: message.into(),
		}
	}
}

/// Fetches and stores feeds, the heavy lifting behind every sync job.
///
/// Staleness filtering (`min_feed_age_minutes`) and parallelism are up to the implementation, the
/// dispatcher only forwards them.
#[async_trait]
pub trait FeedSyncer: Send + Sync + 'static {
	async fn sync_feeds(&self, request: &SyncRequest) -> Result<(), FetchError>;
}

/// Told about every sync that completed successfully, e.g. to show new article notifications.
#[async_trait]
pub trait SyncNotifier: Send + Sync + 'static {
	async fn on_sync_success(&self, request: &SyncRequest);
}

/// Notifier for hosts that don't notify.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

#[async_trait]
impl SyncNotifier for NoopNotifier {
	async fn on_sync_success(&self, _request: &SyncRequest) {}
}
