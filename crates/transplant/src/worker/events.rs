use chrono::{DateTime, Utc};
use crossbeam_channel::Sender;
use serde::Serialize;

use crate::transplanter::TransplantOutcome;

/// Result of one job within a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobOutcome {
    Uploaded { url: String },
    AlreadyExists { url: String },
    Failed { message: String },
    /// The job was removed from the queue after the batch started.
    SkippedRemoved,
}

impl From<TransplantOutcome> for JobOutcome {
    fn from(outcome: TransplantOutcome) -> Self {
        match outcome {
            TransplantOutcome::Uploaded { url } => JobOutcome::Uploaded { url },
            TransplantOutcome::AlreadyExists { url } => JobOutcome::AlreadyExists { url },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub uploaded: usize,
    pub already_exists: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Jobs left untouched because a stop was requested.
    pub not_attempted: usize,
    pub stopped: bool,
}

impl BatchSummary {
    pub(crate) fn record(&mut self, outcome: &JobOutcome) {
        match outcome {
            JobOutcome::Uploaded { .. } => self.uploaded += 1,
            JobOutcome::AlreadyExists { .. } => self.already_exists += 1,
            JobOutcome::Failed { .. } => self.failed += 1,
            JobOutcome::SkippedRemoved => self.skipped += 1,
        }
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunEvent {
    BatchStarted {
        at: DateTime<Utc>,
        jobs: usize,
    },
    JobStarted {
        job_id: String,
        name: String,
    },
    JobFinished {
        job_id: String,
        name: String,
        outcome: JobOutcome,
    },
    BatchFinished {
        at: DateTime<Utc>,
        summary: BatchSummary,
    },
}

/// Receives run events. Implementations must not block the runner.
pub trait EventSink: Send {
    fn emit(&self, event: RunEvent);
}

/// Unbounded channels never block; events sent after the receiver is gone are dropped.
impl EventSink for Sender<RunEvent> {
    fn emit(&self, event: RunEvent) {
        let _ = self.send(event);
    }
}

pub struct NoopSink;

impl EventSink for NoopSink {
    fn emit(&self, _event: RunEvent) {}
}
