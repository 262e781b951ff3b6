pub mod config;
pub mod error;
pub mod job;
pub mod rehost;
pub mod sanitize;
pub mod storage;
pub mod torrent;
pub mod tracker;
pub mod transplanter;
pub mod worker;

pub use config::{default_config_path, load_settings, load_settings_from_str, Settings};
pub use error::{ConfigError, JobError, RunnerError, StorageError};
pub use job::{Job, JobQueue, JobSpec};
pub use rehost::{HostKind, ImageHost, RehostChain, RehostEntry};
pub use torrent::{InfoHash, Metainfo};
pub use tracker::{ApiError, ApiMap, GazelleClient, Tracker, TrackerApi};
pub use transplanter::{TransplantError, TransplantOutcome, Transplanter};
pub use worker::{BatchSummary, EventSink, JobOutcome, JobRunner, NoopSink, RunEvent, StopHandle};
