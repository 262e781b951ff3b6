use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use reqwest::Url;
use walkdir::WalkDir;

use super::{has_torrent_extension, Job};
use crate::tracker::Tracker;

/// Host and raw `torrentid` query value of an http(s) tracker url.
fn torrent_url(entry: &str) -> Option<(String, String)> {
    let url = Url::parse(entry).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    let host = url.host_str()?.to_string();
    let (_, id) = url.query_pairs().find(|(key, _)| key == "torrentid")?;
    Some((host, id.into_owned()))
}

/// Turns a pasted blob into jobs. Each whitespace-separated entry may be a
/// bare torrent id (for `selected`), a tracker url with `torrentid=<n>`, or a
/// path to a `.torrent` file. Anything else is skipped.
pub fn parse_paste(blob: &str, selected: Tracker) -> Vec<Job> {
    let mut jobs = Vec::new();

    for entry in blob.split_whitespace() {
        if entry.bytes().all(|b| b.is_ascii_digit()) {
            match entry.parse() {
                Ok(id) => jobs.push(Job::from_id(selected, id)),
                Err(_) => warn!("Skipping out-of-range torrent id: {}", entry),
            }
            continue;
        }

        if let Some((domain, id)) = torrent_url(entry) {
            let parsed = id.parse().ok().map(|id| Job::from_url(&domain, id));
            match parsed {
                Some(Ok(job)) => jobs.push(job),
                Some(Err(e)) => warn!("Skipping {}: {}", entry, e),
                None => warn!("Skipping invalid torrent id in {}", entry),
            }
            continue;
        }

        let path = Path::new(entry);
        if has_torrent_extension(path) {
            match Job::from_torrent_file(path, false) {
                Ok(job) => jobs.push(job),
                Err(e) => warn!("Skipping {}: {}", entry, e),
            }
            continue;
        }

        debug!("Ignoring unrecognized input: {}", entry);
    }

    jobs
}

/// Creates a job per torrent file. Files that cannot be used are skipped.
pub fn jobs_from_paths<I, P>(paths: I, scanned: bool) -> Vec<Job>
where
    I: IntoIterator<Item = P>,
    P: Into<PathBuf>,
{
    paths
        .into_iter()
        .filter_map(|path| {
            let path = path.into();
            match Job::from_torrent_file(&path, scanned) {
                Ok(job) => Some(job),
                Err(e) => {
                    warn!("Skipping {}: {}", path.display(), e);
                    None
                }
            }
        })
        .collect()
}

/// Jobs for every `.torrent` file at the top level of `dir`, marked as scanned.
pub fn scan_directory(dir: &Path) -> Vec<Job> {
    let mut paths: Vec<PathBuf> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && has_torrent_extension(e.path()))
        .map(|e| e.into_path())
        .collect();
    paths.sort();

    let jobs = jobs_from_paths(paths, true);
    info!("Scanned {} torrent(s) in {}", jobs.len(), dir.display());
    jobs
}
