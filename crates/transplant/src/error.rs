use std::path::PathBuf;
use thiserror::Error;

use crate::rehost::RehostError;
use crate::torrent::TorrentError;
use crate::tracker::ApiError;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },

    #[error("Settings are not ready for a run: {}", .problems.join("; "))]
    NotReady { problems: Vec<String> },
}

/// Rejections raised while turning user input into a [`crate::job::Job`].
#[derive(Error, Debug)]
pub enum JobError {
    #[error("No job source given (need a torrent id, a url or a torrent file)")]
    NoIdentity,

    #[error("Ambiguous job source: {0}")]
    AmbiguousIdentity(String),

    #[error("Torrent id must be numeric, got '{0}'")]
    InvalidTorrentId(String),

    #[error("Domain '{0}' does not belong to a supported tracker")]
    UnknownDomain(String),

    #[error("Could not determine the source tracker of '{0}'")]
    UnknownTracker(PathBuf),

    #[error("Not a .torrent file: '{0}'")]
    NotATorrentFile(PathBuf),

    #[error("Failed to read torrent file '{path}': {source}")]
    ReadTorrent {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid torrent file '{path}': {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: TorrentError,
    },
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to remove file '{path}': {source}")]
    RemoveFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("File already exists: {0}")]
    FileExists(PathBuf),
}

#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("A batch is already running")]
    AlreadyRunning,

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to set up tracker clients: {0}")]
    ApiSetup(#[from] ApiError),

    #[error("Failed to set up image hosts: {0}")]
    RehostSetup(#[from] RehostError),

    #[error("Failed to spawn worker: {0}")]
    SpawnFailed(String),
}
