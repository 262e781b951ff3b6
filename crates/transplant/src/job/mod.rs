//! Jobs: one torrent to transplant, how they are created from user input, and
//! the live queue shared between the front end and the batch worker.

pub mod input;
pub mod queue;

use std::path::{Path, PathBuf};

use crate::error::JobError;
use crate::torrent::{InfoHash, Metainfo};
use crate::tracker::Tracker;

pub use input::{jobs_from_paths, parse_paste, scan_directory};
pub use queue::{DeleteReport, JobQueue};

/// Raw identity fields as supplied by an input producer, before validation.
#[derive(Debug, Clone, Default)]
pub struct JobSpec {
    pub tracker: Option<Tracker>,
    pub tor_id: Option<String>,
    pub src_domain: Option<String>,
    pub torrent_path: Option<PathBuf>,
    pub scanned: bool,
}

#[derive(Debug, Clone)]
pub struct Job {
    pub id: String,
    pub src_tracker: Tracker,
    pub tor_id: Option<u64>,
    /// Domain the job was pasted from, if it came from a url.
    pub src_domain: Option<String>,
    pub torrent_path: Option<PathBuf>,
    /// Found by a directory scan. Only scanned files are ever deleted.
    pub scanned: bool,
    pub info_hash: Option<InfoHash>,
    pub display_name: Option<String>,
    /// Existing destination group to upload into.
    pub dest_group: Option<u64>,
    /// Rebuild the torrent from local content instead of rewriting it.
    pub new_torrent: bool,
    pub upload_succeeded: bool,
}

impl Job {
    /// Validates `spec` and builds a job from exactly one identity source.
    pub fn new(spec: JobSpec) -> Result<Self, JobError> {
        let JobSpec {
            tracker,
            tor_id,
            src_domain,
            torrent_path,
            scanned,
        } = spec;

        if let Some(path) = torrent_path {
            if tor_id.is_some() || src_domain.is_some() {
                return Err(JobError::AmbiguousIdentity(
                    "a torrent file cannot be combined with an id or url".to_string(),
                ));
            }
            return Self::from_torrent_file(path, scanned);
        }

        let tor_id = match tor_id {
            Some(raw) => parse_tor_id(&raw)?,
            None => return Err(JobError::NoIdentity),
        };

        match (src_domain, tracker) {
            (Some(domain), tracker) => {
                let job = Self::from_url(&domain, tor_id)?;
                match tracker {
                    Some(t) if t != job.src_tracker => Err(JobError::AmbiguousIdentity(format!(
                        "domain '{}' belongs to {}, not {}",
                        domain, job.src_tracker, t
                    ))),
                    _ => Ok(job),
                }
            }
            (None, Some(tracker)) => Ok(Self::from_id(tracker, tor_id)),
            (None, None) => Err(JobError::NoIdentity),
        }
    }

    fn blank(src_tracker: Tracker) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            src_tracker,
            tor_id: None,
            src_domain: None,
            torrent_path: None,
            scanned: false,
            info_hash: None,
            display_name: None,
            dest_group: None,
            new_torrent: false,
            upload_succeeded: false,
        }
    }

    pub fn from_id(tracker: Tracker, tor_id: u64) -> Self {
        Self {
            tor_id: Some(tor_id),
            ..Self::blank(tracker)
        }
    }

    pub fn from_url(domain: &str, tor_id: u64) -> Result<Self, JobError> {
        let tracker =
            Tracker::from_domain(domain).ok_or_else(|| JobError::UnknownDomain(domain.to_string()))?;
        Ok(Self {
            tor_id: Some(tor_id),
            src_domain: Some(domain.to_string()),
            ..Self::blank(tracker)
        })
    }

    /// Parses the torrent file right away. The source tracker comes from the
    /// announce url, falling back to the `source` flag of the info dictionary.
    pub fn from_torrent_file(path: impl Into<PathBuf>, scanned: bool) -> Result<Self, JobError> {
        let path = path.into();
        if !has_torrent_extension(&path) {
            return Err(JobError::NotATorrentFile(path));
        }

        let bytes = std::fs::read(&path).map_err(|e| JobError::ReadTorrent {
            path: path.clone(),
            source: e,
        })?;
        let meta = Metainfo::parse(&bytes).map_err(|e| JobError::Malformed {
            path: path.clone(),
            source: e,
        })?;

        let tracker = meta
            .announce()
            .and_then(Tracker::from_announce)
            .or_else(|| {
                meta.info()
                    .source
                    .as_deref()
                    .and_then(Tracker::from_source_flag)
            })
            .ok_or_else(|| JobError::UnknownTracker(path.clone()))?;

        Ok(Self {
            torrent_path: Some(path),
            scanned,
            info_hash: Some(meta.info_hash()),
            display_name: Some(meta.info().name.clone()),
            ..Self::blank(tracker)
        })
    }

    pub fn dest_tracker(&self) -> Tracker {
        self.src_tracker.other()
    }

    /// Duplicate detection: same source tracker and the same torrent id, or the
    /// same info hash when either side has no id.
    pub fn same_identity(&self, other: &Job) -> bool {
        if self.src_tracker != other.src_tracker {
            return false;
        }
        match (self.tor_id, other.tor_id) {
            (Some(a), Some(b)) => a == b,
            _ => matches!((self.info_hash, other.info_hash), (Some(a), Some(b)) if a == b),
        }
    }

    /// Name to show for this job before and after it is resolved.
    pub fn label(&self) -> String {
        if let Some(name) = &self.display_name {
            return name.clone();
        }
        match (self.tor_id, &self.torrent_path) {
            (Some(id), _) => format!("{} {}", self.src_tracker, id),
            (None, Some(path)) => path.display().to_string(),
            (None, None) => self.id.clone(),
        }
    }
}

impl PartialEq for Job {
    fn eq(&self, other: &Self) -> bool {
        self.same_identity(other)
    }
}

fn parse_tor_id(raw: &str) -> Result<u64, JobError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(JobError::InvalidTorrentId(raw.to_string()));
    }
    trimmed
        .parse()
        .map_err(|_| JobError::InvalidTorrentId(raw.to_string()))
}

pub(crate) fn has_torrent_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("torrent"))
}
