use std::{
	fmt,
	future::Future,
	pin::Pin,
	task::{Context, Poll},
};

use async_channel as chan;
use tokio::sync::{oneshot, watch};
use tracing::instrument;

use super::{
	error::{JobQueueError, RunError},
	job::{JobId, JobState, JobStatus},
	runner::{request, RunnerMessage},
};

/// A handle returned when a job is enqueued, it can be used to follow its state, cancel it,
/// or wait until it gets completed.
///
/// Dropping the handle doesn't cancel the job.
pub struct JobHandle<E: RunError> {
	pub(crate) id: JobId,
	pub(crate) done_rx: oneshot::Receiver<Result<JobStatus<E>, JobQueueError>>,
	pub(crate) state_rx: watch::Receiver<JobState>,
	pub(crate) msgs_tx: chan::Sender<RunnerMessage<E>>,
}

impl<E: RunError> fmt::Debug for JobHandle<E> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("JobHandle")
			.field("id", &self.id)
			.field("state", &*self.state_rx.borrow())
			.finish_non_exhaustive()
	}
}

impl<E: RunError> Future for JobHandle<E> {
	type Output = Result<JobStatus<E>, JobQueueError>;

	fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		Pin::new(&mut self.done_rx)
			.poll(cx)
			.map(|res| res.unwrap_or(Err(JobQueueError::Shutdown)))
	}
}

impl<E: RunError> JobHandle<E> {
	#[must_use]
	pub const fn id(&self) -> JobId {
		self.id
	}

	/// Last state published by the queue for this job.
	#[must_use]
	pub fn state(&self) -> JobState {
		*self.state_rx.borrow()
	}

	/// Waits until the job reaches the desired state, or any terminal state.
	pub async fn wait_for_state(&mut self, state: JobState) -> JobState {
		let reached = match self
			.state_rx
			.wait_for(|current| *current == state || current.is_terminal())
			.await
		{
			Ok(current) => Some(*current),
			// The runner dropped the sender, the last published state is all we'll ever get
			Err(_) => None,
		};

		reached.unwrap_or_else(|| *self.state_rx.borrow())
	}

	/// Asks the queue to cancel this job. A running job is interrupted at the next safe point
	/// it defines, a parked job is canceled right away.
	#[instrument(skip(self), fields(job_id = %self.id), err)]
	pub async fn cancel(&self) -> Result<(), JobQueueError> {
		let id = self.id;
		request(&self.msgs_tx, |ack_tx| RunnerMessage::Cancel { id, ack_tx }).await?
	}
}
