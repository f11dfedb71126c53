use std::{fmt, sync::Arc};

use async_trait::async_trait;
use feedsync_job_queue::{ExecStatus, Interrupter, Job};
use tokio::select;
use tracing::{debug, info, warn};

use super::{
	error::SyncError,
	feeds::{FeedSyncer, SyncNotifier},
	refresh::RefreshState,
	request::SyncRequest,
};

/// What made a sync job get enqueued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTrigger {
	Manual,
	Periodic,
}

impl SyncTrigger {
	#[must_use]
	pub const fn job_name(self) -> &'static str {
		match self {
			Self::Manual => "manual-feed-sync",
			Self::Periodic => "periodic-feed-sync",
		}
	}
}

/// The unit of work enqueued by the [`SyncDispatcher`](crate::SyncDispatcher).
pub(crate) struct SyncJob {
	pub(crate) request: SyncRequest,
	pub(crate) trigger: SyncTrigger,
	pub(crate) syncer: Arc<dyn FeedSyncer>,
	pub(crate) notifier: Arc<dyn SyncNotifier>,
	pub(crate) refresh: RefreshState,
}

impl fmt::Debug for SyncJob {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SyncJob")
			.field("request", &self.request)
			.field("trigger", &self.trigger)
			.finish_non_exhaustive()
	}
}

#[async_trait]
impl Job<SyncError> for SyncJob {
	fn name(&self) -> &'static str {
		self.trigger.job_name()
	}

	fn params(&self) -> serde_json::Value {
		serde_json::to_value(&self.request).unwrap_or_else(|e| {
			warn!(?e, request = ?self.request, "Failed to serialize sync request as job params;");
			serde_json::Value::Null
		})
	}

	async fn run(&mut self, interrupter: &Interrupter) -> Result<ExecStatus, SyncError> {
		let _refreshing = self.refresh.begin();

		debug!(request = ?self.request, "Feed sync started");

		let res = select! {
			biased;

			() = interrupter.canceled() => {
				info!(trigger = ?self.trigger, "Feed sync canceled");
				return Ok(ExecStatus::Canceled);
			}

			res = self.syncer.sync_feeds(&self.request) => res,
		};

		if let Err(e) = res {
			warn!(?e, trigger = ?self.trigger, "Feed sync failed;");
			return Err(e.into());
		}

		self.notifier.on_sync_success(&self.request).await;

		info!(trigger = ?self.trigger, "Feed sync completed");

		Ok(ExecStatus::Done)
	}
}
