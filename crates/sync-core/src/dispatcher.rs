use std::{fmt, sync::Arc};

use feedsync_job_queue::{JobHandle, JobId, JobQueue, JobQueueError, UniqueWork};
use tokio::sync::watch;
use tracing::{debug, instrument, trace, warn};

use super::{
	conditions::{is_ok_to_sync_automatically, DeviceProbe, PolicySource, SyncPolicy},
	error::SyncError,
	feeds::{FeedSyncer, SyncNotifier},
	job::{SyncJob, SyncTrigger},
	refresh::RefreshState,
	request::SyncRequest,
	settings::{ManualSyncPolicy, SyncSettings},
};

/// Unique key held by the periodic sync job.
pub const PERIODIC_SYNC_KEY: &str = "periodic-feed-sync";

/// Collaborators the dispatcher works with, provided by the host application.
#[derive(Clone)]
pub struct SyncDeps {
	pub syncer: Arc<dyn FeedSyncer>,
	pub notifier: Arc<dyn SyncNotifier>,
	pub probe: Arc<dyn DeviceProbe>,
	/// Live policy owned by the host, takes precedence over the policy persisted in
	/// [`SyncSettings`].
	pub policy: Option<Arc<dyn PolicySource>>,
}

impl fmt::Debug for SyncDeps {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SyncDeps")
			.field("conditions", &self.probe.conditions())
			.field("policy", &self.policy.as_ref().map(|source| source.policy()))
			.finish_non_exhaustive()
	}
}

/// Outcome of a sync request.
#[derive(Debug)]
pub enum SyncDispatch {
	/// A job was enqueued, its handle resolves when it finishes.
	Enqueued(JobHandle<SyncError>),
	/// Device conditions or user policy don't allow an automatic sync right now.
	GateDenied,
	/// A periodic sync with the same scope is already active, no new job was needed.
	Coalesced(JobId),
}

impl SyncDispatch {
	#[must_use]
	pub fn into_handle(self) -> Option<JobHandle<SyncError>> {
		match self {
			Self::Enqueued(handle) => Some(handle),
			Self::GateDenied | Self::Coalesced(_) => None,
		}
	}

	#[must_use]
	pub const fn is_enqueued(&self) -> bool {
		matches!(self, Self::Enqueued(_))
	}
}

/// Decides whether feed syncs should run and enqueues them on the job queue.
pub struct SyncDispatcher {
	queue: JobQueue<SyncError>,
	syncer: Arc<dyn FeedSyncer>,
	notifier: Arc<dyn SyncNotifier>,
	probe: Arc<dyn DeviceProbe>,
	policy: Arc<dyn PolicySource>,
	// Set when the gate follows the settings policy instead of a host provided source
	settings_policy_tx: Option<watch::Sender<SyncPolicy>>,
	refresh: RefreshState,
	manual_sync: ManualSyncPolicy,
}

impl fmt::Debug for SyncDispatcher {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SyncDispatcher")
			.field("refreshing", &self.refresh.is_refreshing())
			.field("policy", &self.policy.policy())
			.field("manual_sync", &self.manual_sync)
			.finish_non_exhaustive()
	}
}

impl SyncDispatcher {
	#[must_use]
	pub fn new(queue: JobQueue<SyncError>, deps: SyncDeps, settings: &SyncSettings) -> Self {
		let SyncDeps {
			syncer,
			notifier,
			probe,
			policy,
		} = deps;

		let (policy, settings_policy_tx) = match policy {
			Some(policy) => (policy, None),
			None => {
				let (policy_tx, policy_rx) = watch::channel(settings.policy);
				(
					Arc::new(policy_rx) as Arc<dyn PolicySource>,
					Some(policy_tx),
				)
			}
		};

		Self {
			queue,
			syncer,
			notifier,
			probe,
			policy,
			settings_policy_tx,
			refresh: RefreshState::new(),
			manual_sync: settings.manual_sync,
		}
	}

	/// Policy the sync gate currently enforces.
	#[must_use]
	pub fn policy(&self) -> SyncPolicy {
		self.policy.policy()
	}

	/// Updates the settings policy after the user changed it, returning `false` when a host
	/// provided [`PolicySource`] is in charge and the update has no effect.
	pub fn set_policy(&self, policy: SyncPolicy) -> bool {
		let Some(policy_tx) = &self.settings_policy_tx else {
			warn!(?policy, "Sync policy is provided by the host, ignoring settings update");
			return false;
		};

		policy_tx.send_replace(policy);
		debug!(?policy, "Sync policy updated");

		true
	}

	/// Refresh state raised by every sync job this dispatcher enqueues.
	#[must_use]
	pub const fn refresh_state(&self) -> &RefreshState {
		&self.refresh
	}

	#[must_use]
	pub const fn queue(&self) -> &JobQueue<SyncError> {
		&self.queue
	}

	/// User initiated sync, never gated by device conditions.
	#[instrument(skip(self), err)]
	pub async fn request_sync(&self, request: SyncRequest) -> Result<SyncDispatch, SyncError> {
		if self.manual_sync == ManualSyncPolicy::CoalesceWithPeriodic {
			if let Some(periodic_id) = self.active_periodic_with_scope(&request).await? {
				debug!(%periodic_id, "Manual sync coalesced with the active periodic sync");
				return Ok(SyncDispatch::Coalesced(periodic_id));
			}
		}

		let handle = self
			.queue
			.enqueue(self.job(request, SyncTrigger::Manual))
			.await?;

		trace!(job_id = %handle.id(), "Manual sync enqueued");

		Ok(SyncDispatch::Enqueued(handle))
	}

	/// Automatic sync, replacing any periodic sync still pending or running.
	///
	/// Unless `force_network` is set, it only goes ahead when the device conditions satisfy the
	/// user policy.
	#[instrument(skip(self), err)]
	pub async fn request_periodic_sync(
		&self,
		request: SyncRequest,
	) -> Result<SyncDispatch, SyncError> {
		if !request.force_network {
			let conditions = self.probe.conditions();
			let policy = self.policy.policy();

			if !is_ok_to_sync_automatically(conditions, policy) {
				debug!(?conditions, ?policy, "Periodic sync denied by sync gate");
				return Ok(SyncDispatch::GateDenied);
			}
		}

		let handle = self
			.queue
			.enqueue_unique(
				UniqueWork::replace(PERIODIC_SYNC_KEY),
				self.job(request, SyncTrigger::Periodic),
			)
			.await?;

		trace!(job_id = %handle.id(), "Periodic sync enqueued");

		Ok(SyncDispatch::Enqueued(handle))
	}

	/// Shutdown the underlying job queue, canceling every sync in progress.
	pub async fn shutdown(&self) {
		self.queue.shutdown().await;
	}

	async fn active_periodic_with_scope(
		&self,
		request: &SyncRequest,
	) -> Result<Option<JobId>, JobQueueError> {
		let Some(report) = self.queue.unique_job(PERIODIC_SYNC_KEY).await? else {
			return Ok(None);
		};

		if !report.state.is_active() {
			return Ok(None);
		}

		Ok(serde_json::from_value::<SyncRequest>(report.params)
			.ok()
			.filter(|periodic| periodic.same_scope(request))
			.map(|_| report.id))
	}

	fn job(&self, request: SyncRequest, trigger: SyncTrigger) -> SyncJob {
		SyncJob {
			request,
			trigger,
			syncer: Arc::clone(&self.syncer),
			notifier: Arc::clone(&self.notifier),
			refresh: self.refresh.clone(),
		}
	}
}
