use std::sync::Arc;

use futures::{Stream, StreamExt};
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tracing::trace;

/// Whether a feed sync is in progress, observed by the presentation layer to show a loading
/// indicator.
///
/// Manual and periodic syncs may overlap, so we count the in-flight ones and report
/// "refreshing" while at least one is running. Only the dispatcher raises it, through
/// [`RefreshGuard`]s, which lower it on every exit path when dropped.
#[derive(Debug, Clone)]
pub struct RefreshState {
	in_flight_tx: Arc<watch::Sender<usize>>,
}

impl Default for RefreshState {
	fn default() -> Self {
		Self::new()
	}
}

impl RefreshState {
	#[must_use]
	pub fn new() -> Self {
		Self {
			in_flight_tx: Arc::new(watch::Sender::new(0)),
		}
	}

	pub(crate) fn begin(&self) -> RefreshGuard {
		self.in_flight_tx.send_modify(|in_flight| *in_flight += 1);

		RefreshGuard {
			in_flight_tx: Arc::clone(&self.in_flight_tx),
		}
	}

	#[must_use]
	pub fn is_refreshing(&self) -> bool {
		*self.in_flight_tx.borrow() > 0
	}

	#[must_use]
	pub fn in_flight(&self) -> usize {
		*self.in_flight_tx.borrow()
	}

	#[must_use]
	pub fn watcher(&self) -> RefreshWatcher {
		RefreshWatcher(self.in_flight_tx.subscribe())
	}

	/// Stream of the refreshing flag, starting with the current value.
	pub fn subscribe(&self) -> impl Stream<Item = bool> + Send + Unpin + 'static {
		WatchStream::new(self.in_flight_tx.subscribe()).map(|in_flight| in_flight > 0)
	}
}

/// Keeps the refresh state raised for as long as it lives.
#[derive(Debug)]
#[must_use = "dropping the guard immediately ends the refresh"]
pub struct RefreshGuard {
	in_flight_tx: Arc<watch::Sender<usize>>,
}

impl Drop for RefreshGuard {
	fn drop(&mut self) {
		self.in_flight_tx
			.send_modify(|in_flight| *in_flight = in_flight.saturating_sub(1));
	}
}

/// Read side of the [`RefreshState`].
#[derive(Debug, Clone)]
pub struct RefreshWatcher(watch::Receiver<usize>);

impl RefreshWatcher {
	#[must_use]
	pub fn is_refreshing(&self) -> bool {
		*self.0.borrow() > 0
	}

	/// Waits for the next change of the in-flight count, returning the refreshing flag after it.
	pub async fn changed(&mut self) -> bool {
		// The sender lives as long as the dispatcher, after that nothing changes anymore
		if self.0.changed().await.is_err() {
			trace!("Refresh state is gone, no more changes to watch");
		}

		self.is_refreshing()
	}

	/// Waits until the refreshing flag matches `refreshing`.
	pub async fn wait_for(&mut self, refreshing: bool) {
		self.0
			.wait_for(|in_flight| (*in_flight > 0) == refreshing)
			.await
			.ok();
	}
}
