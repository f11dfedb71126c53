use std::{
	collections::{hash_map::Entry, HashMap},
	panic::AssertUnwindSafe,
	pin::pin,
};

use async_channel as chan;
use chrono::Utc;
use futures::{FutureExt, StreamExt};
use futures_concurrency::stream::Merge;
use tokio::{
	spawn,
	sync::{oneshot, watch},
};
use tracing::{debug, error, info, trace, warn, Instrument};

use super::{
	error::{JobQueueError, RunError},
	job::{
		ExecStatus, ExistingWorkPolicy, Interrupter, Job, JobId, JobReport, JobState, JobStatus,
		UniqueWork,
	},
};

const JOBS_INITIAL_CAPACITY: usize = 16;

pub(crate) type DoneTx<E> = oneshot::Sender<Result<JobStatus<E>, JobQueueError>>;

/// Outcome sent back by a job task, the outer error means the job panicked.
pub(crate) type JobResult<E> = Result<Result<ExecStatus, E>, JobQueueError>;

pub(crate) enum RunnerMessage<E: RunError> {
	NewJob {
		id: JobId,
		job: Box<dyn Job<E>>,
		unique: Option<UniqueWork>,
		done_tx: DoneTx<E>,
		state_tx: watch::Sender<JobState>,
		ack_tx: oneshot::Sender<Result<(), JobQueueError>>,
	},
	Cancel {
		id: JobId,
		ack_tx: oneshot::Sender<Result<(), JobQueueError>>,
	},
	GetReport {
		id: JobId,
		ack_tx: oneshot::Sender<Option<JobReport>>,
	},
	GetUniqueJob {
		key: String,
		ack_tx: oneshot::Sender<Option<JobReport>>,
	},
	GetActiveReports {
		ack_tx: oneshot::Sender<HashMap<JobId, JobReport>>,
	},
	Shutdown {
		ack_tx: oneshot::Sender<()>,
	},
}

/// Sends a message to the runner and waits for its answer.
pub(crate) async fn request<E: RunError, T>(
	msgs_tx: &chan::Sender<RunnerMessage<E>>,
	make_msg: impl FnOnce(oneshot::Sender<T>) -> RunnerMessage<E> + Send,
) -> Result<T, JobQueueError> {
	let (ack_tx, ack_rx) = oneshot::channel();

	msgs_tx
		.send(make_msg(ack_tx))
		.await
		.map_err(|_| JobQueueError::Shutdown)?;

	ack_rx.await.map_err(|_| JobQueueError::Shutdown)
}

struct JobEntry<E: RunError> {
	report: JobReport,
	state_tx: watch::Sender<JobState>,
	done_tx: Option<DoneTx<E>>,
	cancel_tx: chan::Sender<()>,
	// Set while the job waits for the job it replaced to stop
	parked: Option<(Box<dyn Job<E>>, Interrupter)>,
}

impl<E: RunError> JobEntry<E> {
	fn set_state(&mut self, state: JobState) {
		self.report.state = state;
		self.state_tx.send_replace(state);
	}

	fn request_cancel(&mut self) {
		if self.report.state == JobState::Running {
			self.set_state(JobState::Canceling);
		}
		self.cancel_tx.close();
	}

	fn resolve(mut self, state: JobState, status: Result<JobStatus<E>, JobQueueError>) {
		self.set_state(state);

		if let Some(done_tx) = self.done_tx.take() {
			if done_tx.send(status).is_err() {
				trace!(job_id = %self.report.id, "Job handle dropped before receiving the job status");
			}
		}
	}
}

pub(crate) struct JobQueueRunner<E: RunError> {
	jobs: HashMap<JobId, JobEntry<E>>,
	unique_keys: HashMap<String, JobId>,
	keys_by_id: HashMap<JobId, String>,
	// Running job being canceled -> job parked until it stops
	waiting_on: HashMap<JobId, JobId>,
	job_done_tx: chan::Sender<(JobId, JobResult<E>)>,
	shutdown_acks: Vec<oneshot::Sender<()>>,
}

impl<E: RunError> JobQueueRunner<E> {
	pub(crate) fn new(job_done_tx: chan::Sender<(JobId, JobResult<E>)>) -> Self {
		Self {
			jobs: HashMap::with_capacity(JOBS_INITIAL_CAPACITY),
			unique_keys: HashMap::with_capacity(JOBS_INITIAL_CAPACITY),
			keys_by_id: HashMap::with_capacity(JOBS_INITIAL_CAPACITY),
			waiting_on: HashMap::new(),
			job_done_tx,
			shutdown_acks: Vec::new(),
		}
	}

	fn is_shutting_down(&self) -> bool {
		!self.shutdown_acks.is_empty()
	}

	fn new_job(
		&mut self,
		id: JobId,
		job: Box<dyn Job<E>>,
		unique: Option<UniqueWork>,
		done_tx: DoneTx<E>,
		state_tx: watch::Sender<JobState>,
	) -> Result<(), JobQueueError> {
		if self.is_shutting_down() {
			return Err(JobQueueError::Shutdown);
		}

		let mut blocker = None;

		if let Some(UniqueWork { key, policy }) = &unique {
			if let Some(&existing_id) = self.unique_keys.get(key) {
				match policy {
					ExistingWorkPolicy::Keep => {
						return Err(JobQueueError::AlreadyQueued {
							key: key.clone(),
							new_id: id,
							existing_id,
						});
					}
					ExistingWorkPolicy::Replace => {
						debug!(%key, %existing_id, new_id = %id, "Replacing unique job;");
						blocker = self.supersede(existing_id);
					}
				}
			}

			self.unique_keys.insert(key.clone(), id);
			self.keys_by_id.insert(id, key.clone());
		}

		let (cancel_tx, cancel_rx) = chan::bounded(1);
		let interrupter = Interrupter::new(cancel_rx);

		let report = JobReport {
			id,
			name: job.name().to_string(),
			unique_key: unique.map(|UniqueWork { key, .. }| key),
			params: job.params(),
			state: JobState::Pending,
			created_at: Utc::now(),
			started_at: None,
		};

		self.jobs.insert(
			id,
			JobEntry {
				report,
				state_tx,
				done_tx: Some(done_tx),
				cancel_tx,
				parked: None,
			},
		);

		if let Some(blocker_id) = blocker {
			trace!(job_id = %id, %blocker_id, "Parking job until the replaced job stops");
			if let Some(entry) = self.jobs.get_mut(&id) {
				entry.parked = Some((job, interrupter));
			}
			self.waiting_on.insert(blocker_id, id);
		} else {
			self.spawn_job(id, job, interrupter);
		}

		Ok(())
	}

	/// Takes the unique slot away from `existing_id`, returning the job that must stop before
	/// the replacement can start.
	fn supersede(&mut self, existing_id: JobId) -> Option<JobId> {
		self.keys_by_id.remove(&existing_id);

		let Some(entry) = self.jobs.get_mut(&existing_id) else {
			warn!(%existing_id, "Unique key pointed to a job that doesn't exist anymore;");
			return None;
		};

		if entry.parked.is_some() {
			// It never started, so the replacement inherits what it was waiting for
			let blocker = self.unpark(existing_id);
			if let Some(entry) = self.jobs.remove(&existing_id) {
				entry.resolve(JobState::Canceled, Ok(JobStatus::Canceled));
			}
			blocker
		} else {
			entry.request_cancel();
			Some(existing_id)
		}
	}

	/// Removes the parked job from the waiting list, returning the job it was waiting on.
	fn unpark(&mut self, parked_id: JobId) -> Option<JobId> {
		let blocker = self
			.waiting_on
			.iter()
			.find_map(|(&blocker, &parked)| (parked == parked_id).then_some(blocker));

		if let Some(blocker) = blocker {
			self.waiting_on.remove(&blocker);
		}

		blocker
	}

	fn spawn_job(&mut self, id: JobId, mut job: Box<dyn Job<E>>, interrupter: Interrupter) {
		let Some(entry) = self.jobs.get_mut(&id) else {
			error!(job_id = %id, "Tried to spawn a job without a queue entry;");
			return;
		};

		entry.report.started_at = Some(Utc::now());
		entry.set_state(JobState::Running);

		let job_done_tx = self.job_done_tx.clone();

		spawn(
			async move {
				trace!("Job started");

				let res = AssertUnwindSafe(job.run(&interrupter))
					.catch_unwind()
					.await
					.map_err(|_| JobQueueError::Panic(id));

				if job_done_tx.send((id, res)).await.is_err() {
					error!("Job queue runner is gone, job result will be lost");
				}
			}
			.instrument(tracing::info_span!("job", job_id = %id, name = %entry.report.name)),
		);
	}

	fn process_done(&mut self, id: JobId, res: JobResult<E>) {
		let Some(entry) = self.jobs.remove(&id) else {
			warn!(job_id = %id, "Received result for an unknown job;");
			return;
		};

		if let Some(key) = self.keys_by_id.remove(&id) {
			if let Entry::Occupied(holder) = self.unique_keys.entry(key) {
				if *holder.get() == id {
					holder.remove();
				}
			}
		}

		match res {
			Ok(Ok(ExecStatus::Done)) => {
				debug!(job_id = %id, "Job completed;");
				entry.resolve(JobState::Succeeded, Ok(JobStatus::Done));
			}
			Ok(Ok(ExecStatus::Canceled)) => {
				debug!(job_id = %id, "Job canceled;");
				entry.resolve(JobState::Canceled, Ok(JobStatus::Canceled));
			}
			Ok(Err(e)) => {
				warn!(job_id = %id, ?e, "Job failed;");
				entry.resolve(JobState::Failed, Ok(JobStatus::Failed(e)));
			}
			Err(e) => {
				error!(job_id = %id, "Job panicked;");
				entry.resolve(JobState::Failed, Err(e));
			}
		}

		if let Some(parked_id) = self.waiting_on.remove(&id) {
			self.start_parked(parked_id);
		}
	}

	fn start_parked(&mut self, id: JobId) {
		let Some((job, interrupter)) = self.jobs.get_mut(&id).and_then(|entry| entry.parked.take())
		else {
			warn!(job_id = %id, "Parked job vanished before being started;");
			return;
		};

		self.spawn_job(id, job, interrupter);
	}

	fn cancel(&mut self, id: JobId) -> Result<(), JobQueueError> {
		let Some(entry) = self.jobs.get_mut(&id) else {
			return Err(JobQueueError::NotFound(id));
		};

		if entry.parked.is_none() {
			entry.request_cancel();
			return Ok(());
		}

		let blocker = self.unpark(id);

		if let Some(key) = self.keys_by_id.remove(&id) {
			// Hand the slot back to the job still stopping, so the next replacement waits for it
			if let Some(blocker_id) = blocker {
				self.unique_keys.insert(key.clone(), blocker_id);
				self.keys_by_id.insert(blocker_id, key);
			} else {
				self.unique_keys.remove(&key);
			}
		}

		if let Some(entry) = self.jobs.remove(&id) {
			entry.resolve(JobState::Canceled, Ok(JobStatus::Canceled));
		}

		Ok(())
	}

	fn report(&self, id: JobId) -> Option<JobReport> {
		self.jobs.get(&id).map(|entry| entry.report.clone())
	}

	fn unique_job(&self, key: &str) -> Option<JobReport> {
		self.unique_keys.get(key).and_then(|id| self.report(*id))
	}

	fn active_reports(&self) -> HashMap<JobId, JobReport> {
		self.jobs
			.iter()
			.map(|(id, entry)| (*id, entry.report.clone()))
			.collect()
	}

	fn begin_shutdown(&mut self, ack_tx: oneshot::Sender<()>) {
		self.shutdown_acks.push(ack_tx);

		let parked_ids = self
			.jobs
			.iter()
			.filter_map(|(id, entry)| entry.parked.is_some().then_some(*id))
			.collect::<Vec<_>>();

		for id in parked_ids {
			if let Err(e) = self.cancel(id) {
				warn!(?e, "Failed to cancel parked job on shutdown;");
			}
		}

		for entry in self.jobs.values_mut() {
			entry.request_cancel();
		}

		info!(running_jobs = self.jobs.len(), "Job queue shutting down;");
	}

	fn finish_shutdown(&mut self) {
		self.unique_keys.clear();
		self.keys_by_id.clear();

		for ack_tx in self.shutdown_acks.drain(..) {
			if ack_tx.send(()).is_err() {
				warn!("Shutdown requester dropped before receiving the ack");
			}
		}
	}
}

enum StreamMessage<E: RunError> {
	Runner(RunnerMessage<E>),
	JobDone((JobId, JobResult<E>)),
}

pub(crate) async fn run<E: RunError>(
	mut runner: JobQueueRunner<E>,
	msgs_rx: chan::Receiver<RunnerMessage<E>>,
	job_done_rx: chan::Receiver<(JobId, JobResult<E>)>,
) {
	let mut msg_stream = pin!((
		msgs_rx.map(StreamMessage::Runner),
		job_done_rx.map(StreamMessage::JobDone),
	)
		.merge());

	while let Some(msg) = msg_stream.next().await {
		match msg {
			StreamMessage::Runner(RunnerMessage::NewJob {
				id,
				job,
				unique,
				done_tx,
				state_tx,
				ack_tx,
			}) => {
				let res = runner.new_job(id, job, unique, done_tx, state_tx);
				if ack_tx.send(res).is_err() {
					warn!(job_id = %id, "Enqueue requester dropped before receiving the ack");
				}
			}

			StreamMessage::Runner(RunnerMessage::Cancel { id, ack_tx }) => {
				if ack_tx.send(runner.cancel(id)).is_err() {
					warn!(job_id = %id, "Cancel requester dropped before receiving the ack");
				}
			}

			StreamMessage::Runner(RunnerMessage::GetReport { id, ack_tx }) => {
				if ack_tx.send(runner.report(id)).is_err() {
					warn!("Report requester dropped before receiving the response");
				}
			}

			StreamMessage::Runner(RunnerMessage::GetUniqueJob { key, ack_tx }) => {
				if ack_tx.send(runner.unique_job(&key)).is_err() {
					warn!("Unique job requester dropped before receiving the response");
				}
			}

			StreamMessage::Runner(RunnerMessage::GetActiveReports { ack_tx }) => {
				if ack_tx.send(runner.active_reports()).is_err() {
					warn!("Active reports requester dropped before receiving the response");
				}
			}

			StreamMessage::Runner(RunnerMessage::Shutdown { ack_tx }) => {
				runner.begin_shutdown(ack_tx);
			}

			StreamMessage::JobDone((id, res)) => runner.process_done(id, res),
		}

		if runner.is_shutting_down() && runner.jobs.is_empty() {
			runner.finish_shutdown();
			break;
		}
	}
}
