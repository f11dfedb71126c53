use std::{collections::HashMap, sync::Arc, time::Duration};

use async_channel as chan;
use tokio::{
	spawn,
	sync::{oneshot, watch, Mutex},
	task::JoinHandle,
	time::timeout,
};
use tracing::{error, info, instrument, trace, warn};

use super::{
	error::{JobQueueError, RunError},
	handle::JobHandle,
	job::{IntoJob, Job, JobId, JobReport, JobState, UniqueWork},
	runner::{request, run, JobQueueRunner, RunnerMessage},
};

const ONE_MINUTE: Duration = Duration::from_secs(60);

/// The central unit that runs every job enqueued by the application.
///
/// Each job runs on its own tokio task. Jobs enqueued through [`JobQueue::enqueue_unique`] are
/// tracked by key, so at most one job per key is ever active.
pub struct JobQueue<E: RunError> {
	msgs_tx: chan::Sender<RunnerMessage<E>>,
	runner_handle: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl<E: RunError> Clone for JobQueue<E> {
	fn clone(&self) -> Self {
		Self {
			msgs_tx: self.msgs_tx.clone(),
			runner_handle: Arc::clone(&self.runner_handle),
		}
	}
}

impl<E: RunError> Default for JobQueue<E> {
	fn default() -> Self {
		Self::new()
	}
}

impl<E: RunError> JobQueue<E> {
	/// Spawn the job queue runner, must be called from within a tokio runtime.
	#[must_use]
	pub fn new() -> Self {
		let (msgs_tx, msgs_rx) = chan::bounded(8);
		let (job_done_tx, job_done_rx) = chan::unbounded();

		let runner_handle = spawn(async move {
			trace!("Job queue runner starting...");
			// keep trying to spawn the runner (tokio) task until it exits gracefully
			while let Err(e) = spawn({
				let msgs_rx = msgs_rx.clone();
				let job_done_tx = job_done_tx.clone();
				let job_done_rx = job_done_rx.clone();

				async move { run(JobQueueRunner::new(job_done_tx), msgs_rx, job_done_rx).await }
			})
			.await
			{
				if e.is_panic() {
					error!(?e, "Job queue runner panicked;");
				} else {
					trace!("Job queue runner was cancelled and will exit...");
					break;
				}
				trace!("Restarting job queue runner...");
			}

			info!("Job queue runner gracefully shutdown");
		});

		Self {
			msgs_tx,
			runner_handle: Arc::new(Mutex::new(Some(runner_handle))),
		}
	}

	/// Enqueue a job without any uniqueness constraint, it starts running right away.
	pub async fn enqueue(&self, job: impl IntoJob<E>) -> Result<JobHandle<E>, JobQueueError> {
		self.dispatch(job.into_job(), None).await
	}

	/// Enqueue a job under a unique key, following the [`ExistingWorkPolicy`](crate::ExistingWorkPolicy)
	/// when another job already holds that key.
	pub async fn enqueue_unique(
		&self,
		unique: UniqueWork,
		job: impl IntoJob<E>,
	) -> Result<JobHandle<E>, JobQueueError> {
		self.dispatch(job.into_job(), Some(unique)).await
	}

	#[instrument(skip(self, job), fields(job_name = %job.name()), err)]
	async fn dispatch(
		&self,
		job: Box<dyn Job<E>>,
		unique: Option<UniqueWork>,
	) -> Result<JobHandle<E>, JobQueueError> {
		let id = JobId::new_v4();
		let (done_tx, done_rx) = oneshot::channel();
		let (state_tx, state_rx) = watch::channel(JobState::Pending);

		request(&self.msgs_tx, |ack_tx| RunnerMessage::NewJob {
			id,
			job,
			unique,
			done_tx,
			state_tx,
			ack_tx,
		})
		.await??;

		trace!(job_id = %id, "Job enqueued");

		Ok(JobHandle {
			id,
			done_rx,
			state_rx,
			msgs_tx: self.msgs_tx.clone(),
		})
	}

	pub async fn cancel(&self, id: JobId) -> Result<(), JobQueueError> {
		request(&self.msgs_tx, |ack_tx| RunnerMessage::Cancel { id, ack_tx }).await?
	}

	/// Report of a job that didn't finish yet.
	pub async fn report(&self, id: JobId) -> Result<Option<JobReport>, JobQueueError> {
		request(&self.msgs_tx, |ack_tx| RunnerMessage::GetReport { id, ack_tx }).await
	}

	/// Report of the job currently holding the unique key, if any.
	pub async fn unique_job(&self, key: &str) -> Result<Option<JobReport>, JobQueueError> {
		let key = key.to_string();
		request(&self.msgs_tx, |ack_tx| RunnerMessage::GetUniqueJob { key, ack_tx }).await
	}

	/// Get a map of all reports of jobs that didn't finish yet, with their respective job ids
	pub async fn active_reports(&self) -> Result<HashMap<JobId, JobReport>, JobQueueError> {
		request(&self.msgs_tx, |ack_tx| RunnerMessage::GetActiveReports {
			ack_tx,
		})
		.await
	}

	/// Shutdown the job queue, canceling every job and waiting for the running ones to stop.
	pub async fn shutdown(&self) {
		let Some(handle) = self.runner_handle.lock().await.take() else {
			warn!("Trying to shutdown the job queue that was already shutdown");
			return;
		};

		let abort_handle = handle.abort_handle();

		match timeout(
			ONE_MINUTE,
			request(&self.msgs_tx, |ack_tx| RunnerMessage::Shutdown { ack_tx }),
		)
		.await
		{
			Ok(Ok(())) => {
				if let Err(e) = handle.await {
					error!(?e, "Job queue failed to shutdown on handle await;");
				}
				info!("Job queue gracefully shutdown");
			}
			Ok(Err(e)) => {
				error!(?e, "Job queue runner was gone before shutdown;");
			}
			Err(_) => {
				error!("Jobs failed to stop in the allotted time, leaving them behind");
				abort_handle.abort();
			}
		}
	}
}
