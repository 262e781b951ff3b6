use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::StorageError;

const MAX_NAME_CHARS: usize = 200;

/// `<name>.torrent` with characters that are unsafe in file names replaced.
pub fn torrent_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .take(MAX_NAME_CHARS)
        .collect();
    let cleaned = cleaned.trim().trim_matches('.');

    if cleaned.is_empty() {
        "torrent.torrent".to_string()
    } else {
        format!("{}.torrent", cleaned)
    }
}

/// Writes new torrent files into the configured save directory.
pub struct TorrentStore {
    save_directory: PathBuf,
}

impl TorrentStore {
    pub fn new<P: AsRef<Path>>(save_directory: P) -> Self {
        Self {
            save_directory: save_directory.as_ref().to_path_buf(),
        }
    }

    pub fn save_directory(&self) -> &Path {
        &self.save_directory
    }

    /// Saves `content` as `file_name`, or as `stem_2.torrent`, `stem_3.torrent`
    /// and so on when that name is taken. Existing files are never overwritten.
    pub fn save(&self, file_name: &str, content: &[u8]) -> Result<PathBuf, StorageError> {
        if !self.save_directory.exists() {
            std::fs::create_dir_all(&self.save_directory).map_err(|e| {
                StorageError::CreateDirectory {
                    path: self.save_directory.clone(),
                    source: e,
                }
            })?;
        }

        let (stem, ext) = match file_name.rfind('.') {
            Some(dot) if dot > 0 => (&file_name[..dot], Some(&file_name[dot..])),
            _ => (file_name, None),
        };

        for counter in 1..=1000 {
            let candidate = match (counter, ext) {
                (1, _) => file_name.to_string(),
                (n, Some(ext)) => format!("{}_{}{}", stem, n, ext),
                (n, None) => format!("{}_{}", stem, n),
            };
            let path = self.save_directory.join(&candidate);

            match std::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
            {
                Ok(mut file) => {
                    file.write_all(content)
                        .map_err(|e| StorageError::WriteFile {
                            path: path.clone(),
                            source: e,
                        })?;
                    return Ok(path);
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(StorageError::WriteFile { path, source: e }),
            }
        }

        Err(StorageError::FileExists(self.save_directory.join(file_name)))
    }
}

/// Removes a scanned torrent file. A file that is already gone is not an error.
pub fn remove_scanned(path: &Path) -> Result<(), StorageError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StorageError::RemoveFile {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}
