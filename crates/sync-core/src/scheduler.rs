use std::{panic, sync::Arc, time::Duration};

use async_channel as chan;
use tokio::{
	select, spawn,
	task::JoinHandle,
	time::{interval_at, timeout, Instant, MissedTickBehavior},
};
use tracing::{debug, error, info, warn};

use super::{
	dispatcher::{SyncDispatch, SyncDispatcher},
	settings::SyncSettings,
};

const ONE_MINUTE: Duration = Duration::from_secs(60);

/// Background loop requesting a periodic sync on every interval tick.
///
/// The first tick fires one full interval after starting.
#[derive(Debug)]
pub struct PeriodicSyncScheduler {
	stop_tx: chan::Sender<()>,
	handle: JoinHandle<()>,
}

impl PeriodicSyncScheduler {
	/// Must be called from within a tokio runtime.
	#[must_use]
	pub fn start(dispatcher: Arc<SyncDispatcher>, settings: &SyncSettings) -> Self {
		let (stop_tx, stop_rx) = chan::bounded(1);
		let period = settings.periodic_interval();
		let request = settings.periodic_request();

		let handle = spawn(async move {
			let mut ticker = interval_at(Instant::now() + period, period);
			ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

			info!(?period, "Periodic sync scheduler started");

			loop {
				select! {
					_ = stop_rx.recv() => break,

					_ = ticker.tick() => {
						match dispatcher.request_periodic_sync(request.clone()).await {
							Ok(SyncDispatch::Enqueued(handle)) => {
								debug!(job_id = %handle.id(), "Periodic sync requested");
							}
							Ok(SyncDispatch::GateDenied) => {
								debug!("Skipping periodic sync tick, sync gate denied it");
							}
							Ok(SyncDispatch::Coalesced(_)) => {}
							Err(e) => {
								error!(?e, "Failed to request periodic sync;");
							}
						}
					}
				}
			}

			info!("Periodic sync scheduler stopped");
		});

		Self { stop_tx, handle }
	}

	/// Signals the loop to stop and waits for it, aborting it if it takes too long.
	///
	/// # Panics
	/// Resumes the panic of the scheduler loop, if it panicked.
	pub async fn stop(self) {
		if self.stop_tx.send(()).await.is_err() {
			warn!("Periodic sync scheduler was already gone");
		}

		let abort_handle = self.handle.abort_handle();

		match timeout(ONE_MINUTE, self.handle).await {
			Ok(Ok(())) => {}
			Ok(Err(e)) => {
				if e.is_panic() {
					error!("Periodic sync scheduler unexpectedly panicked, we will pop up the panic!");
					panic::resume_unwind(e.into_panic());
				}
				error!(?e, "Periodic sync scheduler failed while stopping;");
			}
			Err(_) => {
				error!("Periodic sync scheduler failed to stop in the allotted time, will force abortion");
				abort_handle.abort();
			}
		}
	}
}
