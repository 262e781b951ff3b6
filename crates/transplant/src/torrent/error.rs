use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TorrentError {
    #[error("Malformed torrent data: {0}")]
    Malformed(String),

    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl TorrentError {
    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        Self::Malformed(msg.into())
    }
}
