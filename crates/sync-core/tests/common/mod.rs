#![allow(dead_code)]

use std::sync::{
	atomic::{AtomicBool, AtomicUsize, Ordering},
	Arc, Mutex, OnceLock,
};

use async_trait::async_trait;
use feedsync_core::{
	DeviceConditions, FeedSyncer, FetchError, RefreshWatcher, SyncDeps, SyncNotifier, SyncPolicy,
	SyncRequest,
};
use tokio::sync::{mpsc, Barrier, Semaphore};

pub const ONLINE: DeviceConditions = DeviceConditions {
	connected: true,
	charging: true,
	unmetered: true,
};

pub const OFFLINE: DeviceConditions = DeviceConditions {
	connected: false,
	charging: true,
	unmetered: true,
};

#[derive(Debug)]
pub struct FakeSyncer {
	calls: Mutex<Vec<SyncRequest>>,
	running: AtomicUsize,
	max_running: AtomicUsize,
	fail: AtomicBool,
	release: Option<Arc<Semaphore>>,
	barrier: Option<Barrier>,
	started_tx: mpsc::UnboundedSender<SyncRequest>,
	refresh: OnceLock<RefreshWatcher>,
	observed_refreshing: Mutex<Vec<bool>>,
}

impl FakeSyncer {
	pub fn new() -> (Self, mpsc::UnboundedReceiver<SyncRequest>) {
		let (started_tx, started_rx) = mpsc::unbounded_channel();

		(
			Self {
				calls: Mutex::default(),
				running: AtomicUsize::new(0),
				max_running: AtomicUsize::new(0),
				fail: AtomicBool::new(false),
				release: None,
				barrier: None,
				started_tx,
				refresh: OnceLock::new(),
				observed_refreshing: Mutex::default(),
			},
			started_rx,
		)
	}

	/// Every sync waits for a permit released with [`FakeSyncer::release`].
	pub fn gated(mut self) -> Self {
		self.release = Some(Arc::new(Semaphore::new(0)));
		self
	}

	/// Every sync waits until `n` syncs reached the barrier.
	pub fn with_barrier(mut self, n: usize) -> Self {
		self.barrier = Some(Barrier::new(n));
		self
	}

	pub fn release(&self, permits: usize) {
		if let Some(release) = &self.release {
			release.add_permits(permits);
		}
	}

	pub fn set_failing(&self, fail: bool) {
		self.fail.store(fail, Ordering::SeqCst);
	}

	pub fn watch(&self, watcher: RefreshWatcher) {
		self.refresh.set(watcher).unwrap();
	}

	pub fn calls(&self) -> Vec<SyncRequest> {
		self.calls.lock().unwrap().clone()
	}

	pub fn max_running(&self) -> usize {
		self.max_running.load(Ordering::SeqCst)
	}

	pub fn observed_refreshing(&self) -> Vec<bool> {
		self.observed_refreshing.lock().unwrap().clone()
	}
}

struct RunningGuard<'a>(&'a AtomicUsize);

impl Drop for RunningGuard<'_> {
	fn drop(&mut self) {
		self.0.fetch_sub(1, Ordering::SeqCst);
	}
}

#[async_trait]
impl FeedSyncer for FakeSyncer {
	async fn sync_feeds(&self, request: &SyncRequest) -> Result<(), FetchError> {
		if let Some(watcher) = self.refresh.get() {
			self.observed_refreshing
				.lock()
				.unwrap()
				.push(watcher.is_refreshing());
		}
		self.calls.lock().unwrap().push(request.clone());

		let running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
		self.max_running.fetch_max(running, Ordering::SeqCst);
		let _running = RunningGuard(&self.running);

		self.started_tx.send(request.clone()).ok();

		if let Some(barrier) = &self.barrier {
			barrier.wait().await;
		}

		if let Some(release) = &self.release {
			release.acquire().await.unwrap().forget();
		}

		if self.fail.load(Ordering::SeqCst) {
			Err(FetchError::new("feed server unreachable"))
		} else {
			Ok(())
		}
	}
}

#[derive(Debug, Default)]
pub struct FakeNotifier {
	successes: Mutex<Vec<SyncRequest>>,
	refresh: OnceLock<RefreshWatcher>,
	observed_refreshing: Mutex<Vec<bool>>,
}

impl FakeNotifier {
	pub fn watch(&self, watcher: RefreshWatcher) {
		self.refresh.set(watcher).unwrap();
	}

	pub fn successes(&self) -> Vec<SyncRequest> {
		self.successes.lock().unwrap().clone()
	}

	pub fn observed_refreshing(&self) -> Vec<bool> {
		self.observed_refreshing.lock().unwrap().clone()
	}
}

#[async_trait]
impl SyncNotifier for FakeNotifier {
	async fn on_sync_success(&self, request: &SyncRequest) {
		if let Some(watcher) = self.refresh.get() {
			self.observed_refreshing
				.lock()
				.unwrap()
				.push(watcher.is_refreshing());
		}
		self.successes.lock().unwrap().push(request.clone());
	}
}

/// Dependencies leaving the sync policy to the settings.
pub fn settings_deps(
	syncer: &Arc<FakeSyncer>,
	notifier: &Arc<FakeNotifier>,
	conditions: DeviceConditions,
) -> SyncDeps {
	SyncDeps {
		syncer: Arc::clone(syncer) as Arc<dyn FeedSyncer>,
		notifier: Arc::clone(notifier) as Arc<dyn SyncNotifier>,
		probe: Arc::new(conditions),
		policy: None,
	}
}

pub fn deps(
	syncer: &Arc<FakeSyncer>,
	notifier: &Arc<FakeNotifier>,
	conditions: DeviceConditions,
	policy: SyncPolicy,
) -> SyncDeps {
	SyncDeps {
		syncer: Arc::clone(syncer) as Arc<dyn FeedSyncer>,
		notifier: Arc::clone(notifier) as Arc<dyn SyncNotifier>,
		probe: Arc::new(conditions),
		policy: Some(Arc::new(policy)),
	}
}
