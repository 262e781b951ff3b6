use std::fmt;

use thiserror::Error;

use super::verify::VerifyError;
use crate::error::StorageError;
use crate::torrent::TorrentError;
use crate::tracker::{ApiError, Tracker};

/// Pipeline stage a job failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Resolve,
    CheckExisting,
    FileCheck,
    Prepare,
    PostCompare,
    Save,
    Submit,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::Resolve => "resolving source listing",
            Step::CheckExisting => "checking destination for duplicates",
            Step::FileCheck => "checking local files",
            Step::Prepare => "preparing torrent",
            Step::PostCompare => "comparing torrent with source",
            Step::Save => "saving torrent",
            Step::Submit => "uploading",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum Cause {
    #[error("no API client for {0}")]
    MissingApi(Tracker),

    #[error("job has neither a torrent id nor a torrent file")]
    NoSource,

    #[error("data directory is not set")]
    NoDataDir,

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Torrent(#[from] TorrentError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Verify(#[from] VerifyError),
}

/// A job failure together with the step it happened in.
#[derive(Error, Debug)]
#[error("{step} failed: {cause}")]
pub struct TransplantError {
    pub step: Step,
    #[source]
    pub cause: Cause,
}

impl TransplantError {
    pub fn new(step: Step, cause: impl Into<Cause>) -> Self {
        Self {
            step,
            cause: cause.into(),
        }
    }
}

/// Tags an error with the step it occurred in.
pub(crate) trait AtStep<T> {
    fn at(self, step: Step) -> Result<T, TransplantError>;
}

impl<T, E: Into<Cause>> AtStep<T> for Result<T, E> {
    fn at(self, step: Step) -> Result<T, TransplantError> {
        self.map_err(|e| TransplantError::new(step, e))
    }
}
