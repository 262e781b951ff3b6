use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use chrono::Utc;
use log::{debug, error, info, warn};
use secrecy::SecretString;

use super::events::{BatchSummary, EventSink, JobOutcome, RunEvent};
use crate::config::Settings;
use crate::error::RunnerError;
use crate::job::{Job, JobQueue};
use crate::tracker::{ApiError, ApiMap, GazelleClient, Tracker, TrackerApi};
use crate::transplanter::Transplanter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    Idle,
    Running,
    /// A stop was requested; the current job is finishing.
    Stopping,
    Finished,
}

type ApiFactory = dyn Fn(&Settings) -> Result<ApiMap, ApiError> + Send + Sync;

/// One HTTP client per tracker, keyed from the settings.
pub fn gazelle_clients(settings: &Settings) -> Result<ApiMap, ApiError> {
    let mut apis = ApiMap::new();
    for tracker in Tracker::ALL {
        let key = SecretString::from(settings.api_key(tracker).to_string());
        let client: Arc<dyn TrackerApi> = Arc::new(GazelleClient::new(tracker, key)?);
        apis.insert(tracker, client);
    }
    Ok(apis)
}

/// Requests a cooperative stop. The runner checks it between jobs only; a job
/// that is already running always completes or fails on its own.
#[derive(Clone)]
pub struct StopHandle {
    flag: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Processes a queue snapshot one job at a time.
///
/// Clones share state, so a clone can be moved to a background thread while
/// the original is used to stop it or read its state.
#[derive(Clone)]
pub struct JobRunner {
    state: Arc<Mutex<RunnerState>>,
    stop: Arc<AtomicBool>,
    api_factory: Arc<ApiFactory>,
}

impl Default for JobRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl JobRunner {
    pub fn new() -> Self {
        Self::with_api_factory(gazelle_clients)
    }

    pub fn with_api_factory<F>(factory: F) -> Self
    where
        F: Fn(&Settings) -> Result<ApiMap, ApiError> + Send + Sync + 'static,
    {
        Self {
            state: Arc::new(Mutex::new(RunnerState::Idle)),
            stop: Arc::new(AtomicBool::new(false)),
            api_factory: Arc::new(factory),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, RunnerState> {
        match self.state.lock() {
            Ok(g) => g,
            Err(poisoned) => {
                warn!("Runner state lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn set_state(&self, state: RunnerState) {
        *self.lock_state() = state;
    }

    pub fn state(&self) -> RunnerState {
        *self.lock_state()
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            flag: Arc::clone(&self.stop),
        }
    }

    /// Runs a batch over a snapshot of `queue` on the calling thread.
    ///
    /// Settings and client construction are checked first; if either fails
    /// nothing runs and the runner returns to idle. A stop requested at any
    /// point before a job starts leaves that job and the rest untouched.
    /// Per-job failures, including panics, are reported as events and never
    /// end the batch.
    pub fn run(
        &self,
        queue: &JobQueue,
        settings: Arc<Settings>,
        sink: &dyn EventSink,
    ) -> Result<BatchSummary, RunnerError> {
        {
            let mut state = self.lock_state();
            if *state != RunnerState::Idle {
                return Err(RunnerError::AlreadyRunning);
            }
            *state = RunnerState::Running;
        }
        let _idle = IdleOnDrop(self);

        settings.check_ready()?;
        let apis = (self.api_factory)(&settings)?;
        let transplanter = Transplanter::from_settings(apis, settings)?;

        let snapshot = queue.snapshot();
        let mut summary = BatchSummary {
            total: snapshot.len(),
            ..BatchSummary::default()
        };
        info!("Starting batch of {} job(s)", snapshot.len());
        sink.emit(RunEvent::BatchStarted {
            at: Utc::now(),
            jobs: snapshot.len(),
        });

        for (index, job) in snapshot.iter().enumerate() {
            if self.stop.load(Ordering::Relaxed) {
                self.set_state(RunnerState::Stopping);
                summary.stopped = true;
                summary.not_attempted = snapshot.len() - index;
                info!(
                    "Stop requested, leaving {} job(s) untouched",
                    summary.not_attempted
                );
                break;
            }

            let (outcome, name) = if queue.contains(&job.id) {
                sink.emit(RunEvent::JobStarted {
                    job_id: job.id.clone(),
                    name: job.label(),
                });
                self.run_one(&transplanter, queue, job)
            } else {
                warn!("Removed from the list, skipping: {}", job.label());
                (JobOutcome::SkippedRemoved, job.label())
            };

            summary.record(&outcome);
            sink.emit(RunEvent::JobFinished {
                job_id: job.id.clone(),
                name,
                outcome,
            });
        }

        if !summary.stopped {
            self.set_state(RunnerState::Finished);
        }
        info!(
            "Batch finished: {} uploaded, {} already present, {} failed, {} skipped",
            summary.uploaded, summary.already_exists, summary.failed, summary.skipped
        );
        sink.emit(RunEvent::BatchFinished {
            at: Utc::now(),
            summary: summary.clone(),
        });

        Ok(summary)
    }

    /// Processes a copy of `job` and writes the result back to the live queue.
    fn run_one(
        &self,
        transplanter: &Transplanter,
        queue: &JobQueue,
        job: &Job,
    ) -> (JobOutcome, String) {
        let mut working = job.clone();
        let result = panic::catch_unwind(AssertUnwindSafe(|| transplanter.process(&mut working)));
        let name = working.label();

        let outcome = match result {
            Ok(Ok(outcome)) => JobOutcome::from(outcome),
            Ok(Err(e)) => {
                error!("'{}': {}", name, e);
                JobOutcome::Failed {
                    message: e.to_string(),
                }
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!("'{}' panicked: {}", name, message);
                JobOutcome::Failed {
                    message: format!("internal error: {}", message),
                }
            }
        };

        if working.upload_succeeded {
            queue.remove(&working.id);
        } else if !queue.update(&working) {
            debug!("'{}' left the queue while it was processed", name);
        }

        (outcome, name)
    }

    /// Runs [`JobRunner::run`] on a new thread.
    pub fn spawn<S>(
        &self,
        queue: JobQueue,
        settings: Arc<Settings>,
        sink: S,
    ) -> Result<JoinHandle<Result<BatchSummary, RunnerError>>, RunnerError>
    where
        S: EventSink + 'static,
    {
        if self.state() != RunnerState::Idle {
            return Err(RunnerError::AlreadyRunning);
        }
        let runner = self.clone();
        thread::Builder::new()
            .name("transplant-batch".to_string())
            .spawn(move || runner.run(&queue, settings, &sink))
            .map_err(|e| RunnerError::SpawnFailed(e.to_string()))
    }
}

/// Returns the runner to idle however the batch ends, with the stop flag
/// cleared for the next run.
struct IdleOnDrop<'a>(&'a JobRunner);

impl Drop for IdleOnDrop<'_> {
    fn drop(&mut self) {
        self.0.stop.store(false, Ordering::Relaxed);
        self.0.set_state(RunnerState::Idle);
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
