//! Batch processing: the runner that walks the queue on a background thread
//! and the events it reports.

pub mod events;
pub mod runner;

pub use events::{BatchSummary, EventSink, JobOutcome, NoopSink, RunEvent};
pub use runner::{gazelle_clients, JobRunner, RunnerState, StopHandle};

// Re-export crossbeam_channel so front ends can build event channels
pub use crossbeam_channel;
