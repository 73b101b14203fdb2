// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Asynchronous batch import jobs.
//!
//! A [`BatchJob`] accumulates request records, submits them as a server-side
//! import job and polls the job until it reaches a terminal status. Callers
//! observe progress through callbacks registered with the `on_*` methods;
//! observers registered after the fact are replayed the events they missed.
//!
//! The job owns a single background task per execution. Status polls run on a
//! fixed interval and are never issued concurrently: if a poll outlasts the
//! interval, the missed ticks are skipped rather than queued.
//!
//! Observers must not register further observers from inside a callback; the
//! callback list lock is not reentrant.

use crate::error::{ImportError, Result};
use async_trait::async_trait;
use loom_common_http::{
	retry, with_delay, RetryConfig, RetryError, RetryableError, MAX_BACKOFF_DELAY,
};
use loom_import_core::{ImportStatusResponse, JobMetadata, JobStatus};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

/// Default wait between consecutive status polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Default number of attempts before a failing operation aborts the job.
pub const DEFAULT_MAX_RETRY: u32 = 3;

/// Issues the HTTP requests a [`BatchJob`] needs over its lifecycle.
///
/// Implementations exist per resource type; the job itself is generic over
/// the record shapes a requester works with.
#[async_trait]
pub trait BatchRequester: Send + Sync + 'static {
	/// Record submitted for import.
	type Request: Clone + Send + Sync + 'static;
	/// Record as echoed back for a successful import.
	type Imported: Clone + Send + Sync + 'static;
	/// Record the server rejected, with the reason attached.
	type Failed: Clone + Send + Sync + 'static;

	/// Submits the accumulated records as a new import job.
	async fn create_job(&self, requests: Vec<Self::Request>) -> Result<JobMetadata>;

	/// Fetches the current status of a job.
	async fn job_status(&self, job_id: &str) -> Result<ImportStatusResponse>;

	/// Fetches every successfully imported record of a finished job.
	async fn imports(&self, job_id: &str) -> Result<Vec<Self::Imported>>;

	/// Fetches every failed record of a finished job.
	async fn import_errors(&self, job_id: &str) -> Result<Vec<Self::Failed>>;
}

/// Tuning knobs for a [`BatchJob`].
#[derive(Debug, Clone)]
pub struct BatchJobOptions {
	/// Wait between consecutive status polls.
	pub poll_interval: Duration,
	/// Attempts before a failing create, or a run of consecutive failing
	/// polls, aborts the job.
	pub max_retry: u32,
}

impl Default for BatchJobOptions {
	fn default() -> Self {
		Self {
			poll_interval: DEFAULT_POLL_INTERVAL,
			max_retry: DEFAULT_MAX_RETRY,
		}
	}
}

/// Client-side lifecycle of a [`BatchJob`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStatus {
	/// The job has not been submitted; records can still be added.
	NotStarted,
	/// The job is submitted (or submitting) and being polled.
	Pending,
	/// The job reached a terminal server status and results were fetched.
	Completed,
	/// The job gave up, either through errors or cancellation.
	Aborted,
}

type CreatedFn = Box<dyn Fn(&JobMetadata) + Send>;
type ProcessingFn = Box<dyn Fn(&JobMetadata) + Send>;
type DoneFn<Rq> = Box<
	dyn Fn(&[<Rq as BatchRequester>::Imported], &[<Rq as BatchRequester>::Failed]) + Send,
>;
type ErrorFn = Box<dyn Fn(&ImportError) + Send>;
type AbortFn = Box<dyn Fn(&[Arc<ImportError>]) + Send>;

struct Callbacks<Rq: BatchRequester> {
	created: Vec<CreatedFn>,
	processing: Vec<ProcessingFn>,
	done: Vec<DoneFn<Rq>>,
	error: Vec<ErrorFn>,
	abort: Vec<AbortFn>,
}

impl<Rq: BatchRequester> Default for Callbacks<Rq> {
	fn default() -> Self {
		Self {
			created: Vec::new(),
			processing: Vec::new(),
			done: Vec::new(),
			error: Vec::new(),
			abort: Vec::new(),
		}
	}
}

struct JobState<Rq: BatchRequester> {
	requests: Vec<Rq::Request>,
	metadata: JobMetadata,
	imports: Vec<Rq::Imported>,
	failed_imports: Vec<Rq::Failed>,
	errors: Vec<Arc<ImportError>>,
	execution_status: ExecutionStatus,
	task: Option<JoinHandle<()>>,
}

struct JobInner<Rq: BatchRequester> {
	options: BatchJobOptions,
	requester: Arc<Rq>,
	state: Mutex<JobState<Rq>>,
	callbacks: Mutex<Callbacks<Rq>>,
}

/// A batch import job.
///
/// Cheap to clone; all clones share the same state and observers. Must be
/// driven inside a Tokio runtime since [`execute`](BatchJob::execute) spawns
/// the background polling task.
pub struct BatchJob<Rq: BatchRequester> {
	inner: Arc<JobInner<Rq>>,
}

impl<Rq: BatchRequester> Clone for BatchJob<Rq> {
	fn clone(&self) -> Self {
		Self {
			inner: Arc::clone(&self.inner),
		}
	}
}

impl<Rq: BatchRequester> BatchJob<Rq> {
	pub fn new(requester: Rq, requests: Vec<Rq::Request>, options: BatchJobOptions) -> Self {
		Self {
			inner: Arc::new(JobInner {
				options,
				requester: Arc::new(requester),
				state: Mutex::new(JobState {
					requests,
					metadata: JobMetadata::default(),
					imports: Vec::new(),
					failed_imports: Vec::new(),
					errors: Vec::new(),
					execution_status: ExecutionStatus::NotStarted,
					task: None,
				}),
				callbacks: Mutex::new(Callbacks::default()),
			}),
		}
	}

	/// Adds a record to the job.
	///
	/// Returns [`ImportError::JobAlreadyExecuted`] once the job has started;
	/// the set of records is frozen at submission.
	pub fn add(&self, request: Rq::Request) -> Result<()> {
		let mut state = self.lock_state();
		if state.execution_status != ExecutionStatus::NotStarted {
			return Err(ImportError::JobAlreadyExecuted);
		}
		state.requests.push(request);
		Ok(())
	}

	/// Submits the job and starts polling it in the background.
	///
	/// Idempotent: calling again while the job is running or after it has
	/// finished does nothing.
	pub fn execute(&self) {
		{
			let mut state = self.lock_state();
			if state.execution_status != ExecutionStatus::NotStarted {
				return;
			}
			state.execution_status = ExecutionStatus::Pending;
		}
		self.spawn_run(true);
	}

	/// Stops the background task and aborts the job.
	///
	/// The server-side job keeps running; cancellation only abandons the
	/// client-side tracking. A [`ImportError::Cancelled`] error is recorded
	/// and the abort observers fire. No-op once the job has finished.
	pub fn cancel(&self) {
		let task = {
			let mut state = self.lock_state();
			match state.execution_status {
				ExecutionStatus::Completed | ExecutionStatus::Aborted => return,
				_ => {}
			}
			state.task.take()
		};
		if let Some(task) = task {
			task.abort();
		}
		self.record_error(Arc::new(ImportError::Cancelled));
		self.abort();
	}

	/// Resumes an aborted job.
	///
	/// If the job was already created server-side, polling resumes against
	/// the known id without re-submitting the records. Otherwise the job is
	/// submitted from scratch. No-op while the job is running or after it
	/// completed.
	pub fn restart(&self) -> Result<()> {
		self.restart_inner(None)
	}

	/// Resumes tracking against a known server-side job id.
	///
	/// Useful for re-attaching to a job created by an earlier process.
	/// Returns [`ImportError::JobIdMismatch`] if the job already carries a
	/// different id.
	pub fn restart_with_id(&self, id: &str) -> Result<()> {
		self.restart_inner(Some(id))
	}

	fn restart_inner(&self, id: Option<&str>) -> Result<()> {
		let resume = {
			let mut state = self.lock_state();
			match state.execution_status {
				ExecutionStatus::Pending | ExecutionStatus::Completed => return Ok(()),
				_ => {}
			}
			if let Some(id) = id {
				if !state.metadata.id.is_empty() && state.metadata.id != id {
					return Err(ImportError::JobIdMismatch {
						current: state.metadata.id.clone(),
						received: id.to_string(),
					});
				}
				state.metadata.id = id.to_string();
			}
			if state.metadata.id.is_empty() {
				state.execution_status = ExecutionStatus::NotStarted;
				false
			} else {
				state.execution_status = ExecutionStatus::Pending;
				true
			}
		};
		if resume {
			self.spawn_run(false);
		} else {
			self.execute();
		}
		Ok(())
	}

	/// Server-side id of the job, empty until the job has been created.
	pub fn id(&self) -> String {
		self.lock_state().metadata.id.clone()
	}

	/// Last known server-side status.
	pub fn status(&self) -> JobStatus {
		self.lock_state().metadata.status
	}

	/// Last known server-side metadata.
	pub fn metadata(&self) -> JobMetadata {
		self.lock_state().metadata.clone()
	}

	/// Client-side lifecycle state.
	pub fn execution_status(&self) -> ExecutionStatus {
		self.lock_state().execution_status
	}

	/// Records queued or submitted, in insertion order.
	pub fn requests(&self) -> Vec<Rq::Request> {
		self.lock_state().requests.clone()
	}

	/// Successfully imported records fetched after completion.
	pub fn imports(&self) -> Vec<Rq::Imported> {
		self.lock_state().imports.clone()
	}

	/// Rejected records fetched after completion.
	pub fn failed_imports(&self) -> Vec<Rq::Failed> {
		self.lock_state().failed_imports.clone()
	}

	/// Every error encountered so far, in order of occurrence.
	pub fn errors(&self) -> Vec<Arc<ImportError>> {
		self.lock_state().errors.clone()
	}

	pub fn options(&self) -> BatchJobOptions {
		self.inner.options.clone()
	}

	/// Registers an observer for job creation.
	///
	/// Fires once the server has accepted the job and assigned it an id. If
	/// that already happened, the observer is invoked immediately.
	pub fn on_created(&self, f: impl Fn(&JobMetadata) + Send + 'static) -> &Self {
		let replay = {
			let state = self.lock_state();
			if state.metadata.id.is_empty() {
				None
			} else {
				Some(state.metadata.clone())
			}
		};
		let mut callbacks = self.lock_callbacks();
		callbacks.created.push(Box::new(f));
		if let Some(metadata) = replay {
			let cb = callbacks.created.last().expect("just pushed");
			invoke_observer(|| cb(&metadata));
		}
		self
	}

	/// Registers an observer for each poll that finds the job still
	/// processing. Not replayed.
	pub fn on_processing(&self, f: impl Fn(&JobMetadata) + Send + 'static) -> &Self {
		self.lock_callbacks().processing.push(Box::new(f));
		self
	}

	/// Registers an observer for successful completion, invoked with the
	/// imported and failed records. If the job already completed, the
	/// observer is invoked immediately.
	pub fn on_done(
		&self,
		f: impl Fn(&[Rq::Imported], &[Rq::Failed]) + Send + 'static,
	) -> &Self {
		let replay = {
			let state = self.lock_state();
			if state.execution_status == ExecutionStatus::Completed {
				Some((state.imports.clone(), state.failed_imports.clone()))
			} else {
				None
			}
		};
		let mut callbacks = self.lock_callbacks();
		callbacks.done.push(Box::new(f));
		if let Some((imports, failed)) = replay {
			let cb = callbacks.done.last().expect("just pushed");
			invoke_observer(|| cb(&imports, &failed));
		}
		self
	}

	/// Registers an observer invoked once for every error the job records.
	/// Errors recorded before registration are replayed one by one.
	pub fn on_error(&self, f: impl Fn(&ImportError) + Send + 'static) -> &Self {
		let errors = self.lock_state().errors.clone();
		let mut callbacks = self.lock_callbacks();
		callbacks.error.push(Box::new(f));
		let cb = callbacks.error.last().expect("just pushed");
		for error in &errors {
			invoke_observer(|| cb(error.as_ref()));
		}
		self
	}

	/// Registers an observer for the job giving up, invoked once with every
	/// error recorded over its lifetime. If the job already aborted, the
	/// observer is invoked immediately.
	pub fn on_abort(&self, f: impl Fn(&[Arc<ImportError>]) + Send + 'static) -> &Self {
		let replay = {
			let state = self.lock_state();
			if state.execution_status == ExecutionStatus::Aborted {
				Some(state.errors.clone())
			} else {
				None
			}
		};
		let mut callbacks = self.lock_callbacks();
		callbacks.abort.push(Box::new(f));
		if let Some(errors) = replay {
			let cb = callbacks.abort.last().expect("just pushed");
			invoke_observer(|| cb(&errors));
		}
		self
	}

	fn spawn_run(&self, create_first: bool) {
		let job = self.clone();
		let handle = tokio::spawn(async move {
			if create_first && !job.run_create().await {
				return;
			}
			job.run_poll_loop().await;
		});
		self.lock_state().task = Some(handle);
	}

	/// Submits the job, retrying retryable failures up to `max_retry`
	/// attempts. Returns whether polling should begin.
	async fn run_create(&self) -> bool {
		if self.execution_status() != ExecutionStatus::Pending {
			return false;
		}
		let requests = self.lock_state().requests.clone();
		let requester = Arc::clone(&self.inner.requester);
		let config = RetryConfig {
			max_attempts: self.inner.options.max_retry.max(1),
			initial_delay: Duration::ZERO,
		};
		let result = retry(
			&config,
			|e: &Arc<ImportError>| self.record_error(Arc::clone(e)),
			|| {
				let requester = Arc::clone(&requester);
				let requests = requests.clone();
				async move { requester.create_job(requests).await.map_err(Arc::new) }
			},
		)
		.await;

		match result {
			Ok(metadata) => {
				// Cancelled while the create request was in flight.
				if self.execution_status() != ExecutionStatus::Pending {
					return false;
				}
				if metadata.id.is_empty() {
					self.record_error(Arc::new(ImportError::MissingJobId));
					self.abort();
					return false;
				}
				debug!(job_id = %metadata.id, "import job created");
				if let Err(e) = self.set_metadata(metadata) {
					self.record_error(Arc::new(e));
					self.abort();
					return false;
				}
				self.dispatch_created();
				true
			}
			Err(RetryError::MaxAttemptsExceeded { attempts, last }) => {
				self.record_error(Arc::new(ImportError::MaxRetryExceeded {
					attempts,
					last,
				}));
				self.abort();
				false
			}
			Err(RetryError::Permanent(_)) => {
				// Already recorded via on_error.
				self.abort();
				false
			}
		}
	}

	async fn run_poll_loop(&self) {
		let mut interval = tokio::time::interval(self.inner.options.poll_interval);
		interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
		// First tick resolves immediately; the first poll waits a full
		// interval after submission.
		interval.tick().await;

		let mut backoff = Duration::ZERO;
		let mut consecutive_failures = 0u32;
		loop {
			interval.tick().await;
			// Cancelled between ticks.
			if self.execution_status() != ExecutionStatus::Pending {
				return;
			}
			let job_id = self.id();
			let requester = Arc::clone(&self.inner.requester);
			let result = with_delay(backoff, || async move {
				requester.job_status(&job_id).await
			})
			.await;

			match result {
				Ok(response) => {
					consecutive_failures = 0;
					backoff = Duration::ZERO;
					let metadata = response.job.unwrap_or_default();
					let status = metadata.status;
					if let Err(e) = self.set_metadata(metadata) {
						self.record_error(Arc::new(e));
						self.abort();
						return;
					}
					match status {
						JobStatus::Processing => self.dispatch_processing(),
						JobStatus::Completed | JobStatus::Failed => {
							self.finish(status).await;
							return;
						}
						JobStatus::Unknown => {
							self.record_error(Arc::new(ImportError::UnknownJobStatus(
								status.to_string(),
							)));
							self.abort();
							return;
						}
					}
				}
				Err(e) => {
					let e = Arc::new(e);
					self.record_error(Arc::clone(&e));
					if !e.is_retryable() {
						self.abort();
						return;
					}
					consecutive_failures += 1;
					if consecutive_failures >= self.inner.options.max_retry {
						self.abort();
						return;
					}
					backoff = next_poll_delay(e.retry_after().unwrap_or_default(), backoff);
				}
			}
		}
	}

	/// Fetches the terminal results and settles the job.
	async fn finish(&self, status: JobStatus) {
		let job_id = self.id();
		let fetched = match status {
			JobStatus::Completed => self
				.inner
				.requester
				.imports(&job_id)
				.await
				.map(|imports| (imports, Vec::new())),
			_ => self
				.inner
				.requester
				.import_errors(&job_id)
				.await
				.map(|failed| (Vec::new(), failed)),
		};
		match fetched {
			Ok((imports, failed)) => {
				debug!(job_id = %job_id, status = %status, "import job finished");
				let (imports, failed) = {
					let mut state = self.lock_state();
					// A cancel that raced the fetch settled the job first.
					if state.execution_status != ExecutionStatus::Pending {
						return;
					}
					state.imports.extend(imports);
					state.failed_imports.extend(failed);
					state.execution_status = ExecutionStatus::Completed;
					(state.imports.clone(), state.failed_imports.clone())
				};
				self.dispatch_done(&imports, &failed);
			}
			Err(e) => {
				self.record_error(Arc::new(e));
				self.abort();
			}
		}
	}

	/// Applies freshly polled metadata.
	///
	/// The known id wins over an empty one in the response (some servers drop
	/// it from status responses); a conflicting non-empty id is an error.
	fn set_metadata(&self, metadata: JobMetadata) -> Result<()> {
		let mut state = self.lock_state();
		let current = state.metadata.id.clone();
		if !current.is_empty() && !metadata.id.is_empty() && current != metadata.id {
			return Err(ImportError::JobIdMismatch {
				current,
				received: metadata.id,
			});
		}
		state.metadata = metadata;
		if state.metadata.id.is_empty() {
			state.metadata.id = current;
		}
		Ok(())
	}

	fn record_error(&self, error: Arc<ImportError>) {
		warn!(error = %error, "import job error");
		self.lock_state().errors.push(Arc::clone(&error));
		let callbacks = self.lock_callbacks();
		for cb in &callbacks.error {
			invoke_observer(|| cb(error.as_ref()));
		}
	}

	/// Settles the job as aborted and notifies observers. Idempotent; a job
	/// that already completed stays completed.
	fn abort(&self) {
		let errors = {
			let mut state = self.lock_state();
			if state.execution_status == ExecutionStatus::Aborted
				|| state.execution_status == ExecutionStatus::Completed
			{
				return;
			}
			state.execution_status = ExecutionStatus::Aborted;
			state.errors.clone()
		};
		let callbacks = self.lock_callbacks();
		for cb in &callbacks.abort {
			invoke_observer(|| cb(&errors));
		}
	}

	fn dispatch_created(&self) {
		let metadata = self.lock_state().metadata.clone();
		let callbacks = self.lock_callbacks();
		for cb in &callbacks.created {
			invoke_observer(|| cb(&metadata));
		}
	}

	fn dispatch_processing(&self) {
		let metadata = self.lock_state().metadata.clone();
		let callbacks = self.lock_callbacks();
		for cb in &callbacks.processing {
			invoke_observer(|| cb(&metadata));
		}
	}

	fn dispatch_done(&self, imports: &[Rq::Imported], failed: &[Rq::Failed]) {
		let callbacks = self.lock_callbacks();
		for cb in &callbacks.done {
			invoke_observer(|| cb(imports, failed));
		}
	}

	fn lock_state(&self) -> MutexGuard<'_, JobState<Rq>> {
		self.inner
			.state
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
	}

	fn lock_callbacks(&self) -> MutexGuard<'_, Callbacks<Rq>> {
		self.inner
			.callbacks
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
	}
}

/// A panicking observer must not take the polling task down with it.
fn invoke_observer<F: FnOnce()>(f: F) {
	if catch_unwind(AssertUnwindSafe(f)).is_err() {
		warn!("import job observer panicked");
	}
}

// Saturating: the server-advised wait comes straight off the wire and must
// not be able to overflow the addition.
fn next_poll_delay(retry_after: Duration, previous: Duration) -> Duration {
	retry_after
		.saturating_add(previous.saturating_mul(2))
		.min(MAX_BACKOFF_DELAY)
}
