use std::{
	fmt,
	future::{Future, IntoFuture},
	pin::Pin,
	task::{Context, Poll},
};

use async_channel as chan;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::trace;
use uuid::Uuid;

use super::error::RunError;

/// A unique identifier for a job using the [`uuid`](https://docs.rs/uuid) crate.
pub type JobId = Uuid;

/// Represents how a [`Job::run`] invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecStatus {
	Done,
	Canceled,
}

/// All possible outcomes for a job, delivered through its [`JobHandle`](crate::JobHandle).
#[derive(Debug)]
pub enum JobStatus<E: RunError> {
	/// The job finished successfully.
	Done,
	/// The job was canceled, either explicitly or because another job replaced it.
	Canceled,
	/// The job returned an error, we give it back so the user can handle it appropriately.
	Failed(E),
}

/// Lifecycle of a job inside the queue.
///
/// `Canceling` means a cancel request was delivered to a running job that didn't reach a terminal
/// state yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
	Pending,
	Running,
	Canceling,
	Succeeded,
	Failed,
	Canceled,
}

impl JobState {
	/// Pending and running jobs are the ones holding a slot in the queue.
	#[must_use]
	pub const fn is_active(self) -> bool {
		matches!(self, Self::Pending | Self::Running)
	}

	#[must_use]
	pub const fn is_terminal(self) -> bool {
		matches!(self, Self::Succeeded | Self::Failed | Self::Canceled)
	}
}

/// The main trait that represents a job that can be enqueued on the [`JobQueue`](crate::JobQueue).
///
/// We're currently using the [`async_trait`](https://docs.rs/async-trait) crate to allow dyn async traits.
#[async_trait]
pub trait Job<E: RunError>: Send + Sync + 'static {
	/// Human readable name, used on reports and logs.
	fn name(&self) -> &'static str;

	/// Parameters carried by this job, exposed on its [`JobReport`].
	fn params(&self) -> serde_json::Value {
		serde_json::Value::Null
	}

	/// The actual work. The [`Interrupter`] resolves when the queue wants this job to stop, so
	/// the implementation can pick a safe point to return [`ExecStatus::Canceled`].
	async fn run(&mut self, interrupter: &Interrupter) -> Result<ExecStatus, E>;
}

impl<E: RunError> fmt::Debug for Box<dyn Job<E>> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "<Job name='{}'>", self.name())
	}
}

/// A helper trait to convert any type that implements [`Job<E>`] into a [`Box<dyn Job<E>>`], boxing it.
pub trait IntoJob<E>: Send {
	fn into_job(self) -> Box<dyn Job<E>>;
}

impl<T: Job<E>, E: RunError> IntoJob<E> for T {
	fn into_job(self) -> Box<dyn Job<E>> {
		Box::new(self)
	}
}

/// What to do when a job is enqueued under a key that another job still holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExistingWorkPolicy {
	/// Cancel the current holder, the new job only starts after the old one has stopped.
	#[default]
	Replace,
	/// Keep the current holder and refuse the new job.
	Keep,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueWork {
	pub key: String,
	pub policy: ExistingWorkPolicy,
}

impl UniqueWork {
	pub fn replace(key: impl Into<String>) -> Self {
		Self {
			key: key.into(),
			policy: ExistingWorkPolicy::Replace,
		}
	}

	pub fn keep(key: impl Into<String>) -> Self {
		Self {
			key: key.into(),
			policy: ExistingWorkPolicy::Keep,
		}
	}
}

/// Bookkeeping entry kept by the queue for every job that didn't finish yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobReport {
	pub id: JobId,
	pub name: String,
	pub unique_key: Option<String>,
	pub params: serde_json::Value,
	pub state: JobState,
	pub created_at: DateTime<Utc>,
	pub started_at: Option<DateTime<Utc>>,
}

pin_project_lite::pin_project! {
	/// Resolves once the queue requested the job to be canceled.
	#[must_use = "`InterrupterFuture` does nothing unless polled"]
	pub struct InterrupterFuture<'recv> {
		#[pin]
		fut: chan::Recv<'recv, ()>,
	}
}

impl Future for InterrupterFuture<'_> {
	type Output = ();

	fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		let this = self.project();

		match this.fut.poll(cx) {
			// Cancellation is signalled by closing the channel, nothing is ever sent on it
			Poll::Ready(Ok(())) | Poll::Ready(Err(chan::RecvError)) => {
				trace!("Running job received cancel request");
				Poll::Ready(())
			}
			Poll::Pending => Poll::Pending,
		}
	}
}

impl<'recv> IntoFuture for &'recv Interrupter {
	type Output = ();

	type IntoFuture = InterrupterFuture<'recv>;

	fn into_future(self) -> Self::IntoFuture {
		self.canceled()
	}
}

/// Handed to [`Job::run`], so the job can check or await for a cancel request.
#[derive(Debug)]
pub struct Interrupter {
	cancel_rx: chan::Receiver<()>,
}

impl Interrupter {
	pub(crate) const fn new(cancel_rx: chan::Receiver<()>) -> Self {
		Self { cancel_rx }
	}

	/// Non-blocking check for a cancel request.
	#[must_use]
	pub fn is_canceled(&self) -> bool {
		self.cancel_rx.is_closed()
	}

	pub fn canceled(&self) -> InterrupterFuture<'_> {
		InterrupterFuture {
			fut: self.cancel_rx.recv(),
		}
	}
}
