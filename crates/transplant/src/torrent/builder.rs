use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use log::debug;

use super::bencode::{self, Dict, Value};
use super::error::TorrentError;
use super::metainfo::{check_piece_length, sha1_digest, FileEntry, Info, Metainfo};

pub const CREATED_BY: &str = concat!("transplant/", env!("CARGO_PKG_VERSION"));

/// Rebuild a torrent from the files under `content_root`, following the file
/// layout and piece length of `template`.
///
/// The new info dictionary is private and carries `source_flag`, so its info
/// hash differs from the template's. Every file must exist and be exactly the
/// declared size.
pub fn build_from_content(
    content_root: &Path,
    template: &Info,
    source_flag: &str,
    announce: &str,
) -> Result<Metainfo, TorrentError> {
    debug!(
        "Hashing {} file(s), {} bytes, piece length {}",
        template.files.len(),
        template.total_length(),
        template.piece_length
    );

    let pieces = hash_pieces(content_root, &template.files, template.piece_length)?;

    let info = Info {
        name: template.name.clone(),
        piece_length: template.piece_length,
        pieces,
        files: template.files.clone(),
        private: true,
        source: Some(source_flag.to_string()),
    };

    let mut root = Dict::new();
    root.insert(b"announce".to_vec(), Value::from(announce));
    root.insert(b"created by".to_vec(), Value::from(CREATED_BY));
    root.insert(
        b"creation date".to_vec(),
        Value::Int(chrono::Utc::now().timestamp()),
    );
    root.insert(b"info".to_vec(), Value::Dict(info.to_dict()));

    Metainfo::parse(&bencode::encode(&Value::Dict(root)))
}

/// SHA-1 of every `piece_length` chunk of the concatenated files.
fn hash_pieces(
    content_root: &Path,
    files: &[FileEntry],
    piece_length: u64,
) -> Result<Vec<[u8; 20]>, TorrentError> {
    check_piece_length(i64::try_from(piece_length).unwrap_or(i64::MAX))?;
    let piece_length = piece_length as usize;
    let mut pieces = Vec::new();
    // Grows with the data read.
    let mut buffer = Vec::new();
    let mut chunk = vec![0u8; 64 * 1024];

    for entry in files {
        let path = entry.path_under(content_root);
        let io_err = |source: std::io::Error| TorrentError::Io {
            path: path.clone(),
            source,
        };

        let file = File::open(&path).map_err(io_err)?;
        let actual = file.metadata().map_err(io_err)?.len();
        if actual != entry.length {
            return Err(io_err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("expected {} bytes, found {}", entry.length, actual),
            )));
        }
        let mut reader = BufReader::new(file).take(entry.length);
        let mut read_total: u64 = 0;

        loop {
            let want = chunk.len().min(piece_length - buffer.len());
            let n = reader.read(&mut chunk[..want]).map_err(io_err)?;
            if n == 0 {
                break;
            }
            read_total += n as u64;
            buffer.extend_from_slice(&chunk[..n]);
            if buffer.len() == piece_length {
                pieces.push(sha1_digest(&buffer));
                buffer.clear();
            }
        }

        if read_total != entry.length {
            return Err(io_err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("expected {} bytes, found {}", entry.length, read_total),
            )));
        }
    }

    if !buffer.is_empty() {
        pieces.push(sha1_digest(&buffer));
    }

    Ok(pieces)
}
