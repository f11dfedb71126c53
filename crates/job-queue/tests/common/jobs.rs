use feedsync_job_queue::{ExecStatus, Interrupter, Job};

use async_trait::async_trait;
use serde_json::json;
use thiserror::Error;
use tokio::sync::{oneshot, Semaphore};
use tracing::info;

use std::sync::{
	atomic::{AtomicUsize, Ordering},
	Arc,
};

#[derive(Debug, Error)]
pub enum SampleError {
	#[error("Sample error")]
	SampleError,
}

#[derive(Debug, Default)]
pub struct ReadyJob;

#[async_trait]
impl Job<SampleError> for ReadyJob {
	fn name(&self) -> &'static str {
		"ready"
	}

	async fn run(&mut self, _interrupter: &Interrupter) -> Result<ExecStatus, SampleError> {
		Ok(ExecStatus::Done)
	}
}

#[derive(Debug, Default)]
pub struct BogusJob;

#[async_trait]
impl Job<SampleError> for BogusJob {
	fn name(&self) -> &'static str {
		"bogus"
	}

	async fn run(&mut self, _interrupter: &Interrupter) -> Result<ExecStatus, SampleError> {
		Err(SampleError::SampleError)
	}
}

#[derive(Debug, Default)]
pub struct PanicJob;

#[async_trait]
impl Job<SampleError> for PanicJob {
	fn name(&self) -> &'static str {
		"panic"
	}

	async fn run(&mut self, _interrupter: &Interrupter) -> Result<ExecStatus, SampleError> {
		panic!("PanicJob always panics");
	}
}

/// Waits forever, only a cancel request gets it out of `run`.
#[derive(Debug)]
pub struct NeverJob {
	began_tx: Option<oneshot::Sender<()>>,
}

impl NeverJob {
	pub fn new() -> (Self, oneshot::Receiver<()>) {
		let (began_tx, began_rx) = oneshot::channel();
		(
			Self {
				began_tx: Some(began_tx),
			},
			began_rx,
		)
	}
}

#[async_trait]
impl Job<SampleError> for NeverJob {
	fn name(&self) -> &'static str {
		"never"
	}

	fn params(&self) -> serde_json::Value {
		json!({ "forever": true })
	}

	async fn run(&mut self, interrupter: &Interrupter) -> Result<ExecStatus, SampleError> {
		if let Some(began_tx) = self.began_tx.take() {
			began_tx.send(()).ok();
		}

		interrupter.await;
		info!("Canceling NeverJob");

		Ok(ExecStatus::Canceled)
	}
}

/// Holds a permit of `release` to finish, tracking how many instances run at the same time.
#[derive(Debug)]
pub struct GatedJob {
	release: Arc<Semaphore>,
	running: Arc<AtomicUsize>,
	max_running: Arc<AtomicUsize>,
}

#[derive(Debug, Clone)]
pub struct Gate {
	pub release: Arc<Semaphore>,
	pub running: Arc<AtomicUsize>,
	pub max_running: Arc<AtomicUsize>,
}

impl Gate {
	pub fn new() -> Self {
		Self {
			release: Arc::new(Semaphore::new(0)),
			running: Arc::new(AtomicUsize::new(0)),
			max_running: Arc::new(AtomicUsize::new(0)),
		}
	}

	pub fn job(&self) -> GatedJob {
		GatedJob {
			release: Arc::clone(&self.release),
			running: Arc::clone(&self.running),
			max_running: Arc::clone(&self.max_running),
		}
	}

	pub fn max_running(&self) -> usize {
		self.max_running.load(Ordering::SeqCst)
	}
}

struct RunningGuard<'a>(&'a AtomicUsize);

impl Drop for RunningGuard<'_> {
	fn drop(&mut self) {
		self.0.fetch_sub(1, Ordering::SeqCst);
	}
}

#[async_trait]
impl Job<SampleError> for GatedJob {
	fn name(&self) -> &'static str {
		"gated"
	}

	async fn run(&mut self, interrupter: &Interrupter) -> Result<ExecStatus, SampleError> {
		let now_running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
		let _guard = RunningGuard(&self.running);
		self.max_running.fetch_max(now_running, Ordering::SeqCst);

		tokio::select! {
			biased;
			() = interrupter.canceled() => Ok(ExecStatus::Canceled),
			permit = self.release.acquire() => {
				permit.expect("semaphore closed").forget();
				Ok(ExecStatus::Done)
			}
		}
	}
}

/// Like [`GatedJob`], but deaf to cancel requests, so it only stops once released.
#[derive(Debug)]
pub struct StubbornJob(GatedJob);

impl Gate {
	pub fn stubborn_job(&self) -> StubbornJob {
		StubbornJob(self.job())
	}
}

#[async_trait]
impl Job<SampleError> for StubbornJob {
	fn name(&self) -> &'static str {
		"stubborn"
	}

	async fn run(&mut self, _interrupter: &Interrupter) -> Result<ExecStatus, SampleError> {
		let GatedJob {
			release,
			running,
			max_running,
		} = &self.0;

		let now_running = running.fetch_add(1, Ordering::SeqCst) + 1;
		let _guard = RunningGuard(running);
		max_running.fetch_max(now_running, Ordering::SeqCst);

		release.acquire().await.expect("semaphore closed").forget();

		Ok(ExecStatus::Done)
	}
}
