//! Local content checks.
//!
//! The file check looks for the torrent's content under the data directory
//! and requires every declared file to exist with its declared size. The post
//! compare runs after the destination torrent is prepared: a rebuilt torrent
//! must produce the source's piece hashes, a rewritten one must re-parse to
//! the same info hash and file list.

use std::path::{Path, PathBuf};

use log::debug;
use thiserror::Error;
use walkdir::WalkDir;

use crate::torrent::{FileEntry, Info, InfoHash, Metainfo, TorrentError};
use crate::tracker::ListedFile;

#[derive(Error, Debug)]
pub enum VerifyError {
    #[error("content '{name}' not found in {}", .root.display())]
    ContentNotFound { name: String, root: PathBuf },

    #[error("missing file '{}'", .0.display())]
    MissingFile(PathBuf),

    #[error("'{}' is {actual} bytes, torrent declares {expected}", .path.display())]
    SizeMismatch {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },

    #[error("info hash changed from {before} to {after}")]
    HashChanged { before: InfoHash, after: InfoHash },

    #[error("file list differs from the source torrent")]
    FilesChanged,

    #[error("{mismatched} of {total} pieces differ from the source torrent")]
    PieceMismatch { mismatched: usize, total: usize },

    #[error("prepared torrent does not parse: {0}")]
    Reparse(#[from] TorrentError),
}

/// Every declared file exists under `content_root` with the declared size.
pub fn check_files(content_root: &Path, files: &[FileEntry]) -> Result<(), VerifyError> {
    for entry in files {
        let path = entry.path_under(content_root);
        let actual = match std::fs::metadata(&path) {
            Ok(meta) if meta.is_file() => meta.len(),
            _ => return Err(VerifyError::MissingFile(path)),
        };
        if actual != entry.length {
            return Err(VerifyError::SizeMismatch {
                path,
                expected: entry.length,
                actual,
            });
        }
    }
    Ok(())
}

/// Finds the content of `info` below `data_dir` and checks its files.
///
/// `<data_dir>/<name>` is tried first. With `deep_search` every entry named
/// `<name>` further down is tried too, and the first one whose files check
/// out wins. When nothing matches, the first candidate's problem is reported.
pub fn locate_content(
    data_dir: &Path,
    info: &Info,
    deep_search: bool,
) -> Result<PathBuf, VerifyError> {
    let wants_dir = !info.is_single_file();
    let mut first_error = None;

    let top = data_dir.join(&info.name);
    let deep = deep_search
        .then(|| {
            WalkDir::new(data_dir)
                .min_depth(2)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_name().to_str() == Some(info.name.as_str()))
                .filter(|e| e.file_type().is_dir() == wants_dir)
                .map(|e| e.into_path())
        })
        .into_iter()
        .flatten();
    let candidates = std::iter::once(top).chain(deep);

    for candidate in candidates {
        if !candidate.exists() {
            continue;
        }
        match check_files(&candidate, &info.files) {
            Ok(()) => {
                debug!("Found content at {}", candidate.display());
                return Ok(candidate);
            }
            Err(e) => {
                debug!("Rejected {}: {}", candidate.display(), e);
                first_error.get_or_insert(e);
            }
        }
    }

    Err(first_error.unwrap_or_else(|| VerifyError::ContentNotFound {
        name: info.name.clone(),
        root: data_dir.to_path_buf(),
    }))
}

/// A rebuilt torrent must hash to the same pieces over the same files.
pub fn compare_rebuilt(source: &Info, rebuilt: &Info) -> Result<(), VerifyError> {
    if source.files != rebuilt.files {
        return Err(VerifyError::FilesChanged);
    }
    let total = source.pieces.len().max(rebuilt.pieces.len());
    let matching = source
        .pieces
        .iter()
        .zip(&rebuilt.pieces)
        .filter(|(a, b)| a == b)
        .count();
    if matching != total {
        return Err(VerifyError::PieceMismatch {
            mismatched: total - matching,
            total,
        });
    }
    Ok(())
}

/// Whether the tracker's file list names the same files and sizes as `info`.
/// Order is ignored. An empty list means the tracker sent none and matches.
pub fn listed_files_match(info: &Info, listed: &[ListedFile]) -> bool {
    if listed.is_empty() {
        return true;
    }
    let mut declared: Vec<(String, u64)> = info
        .files
        .iter()
        .map(|f| {
            let path = if f.path.is_empty() {
                info.name.clone()
            } else {
                f.display_path()
            };
            (path, f.length)
        })
        .collect();
    let mut listed: Vec<(String, u64)> = listed.iter().map(|f| (f.path.clone(), f.size)).collect();
    declared.sort();
    listed.sort();
    declared == listed
}

/// A rewritten torrent must keep the info hash and file list of its source.
pub fn compare_rewritten(source: &Metainfo, rewritten: &[u8]) -> Result<(), VerifyError> {
    let reparsed = Metainfo::parse(rewritten)?;
    if reparsed.info_hash() != source.info_hash() {
        return Err(VerifyError::HashChanged {
            before: source.info_hash(),
            after: reparsed.info_hash(),
        });
    }
    if reparsed.info().files != source.info().files {
        return Err(VerifyError::FilesChanged);
    }
    Ok(())
}
