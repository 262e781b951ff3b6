use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use sha1::{Digest, Sha1};

use super::bencode::{self, Dict, Value};
use super::error::TorrentError;

/// SHA-1 of the bencoded `info` dictionary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InfoHash([u8; 20]);

impl InfoHash {
    pub fn of(info_bytes: &[u8]) -> Self {
        Self(sha1_digest(info_bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Gazelle trackers index torrents by the uppercase form.
    pub fn to_upper_hex(&self) -> String {
        hex::encode_upper(self.0)
    }
}

impl fmt::Display for InfoHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for InfoHash {
    type Err = TorrentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut out = [0u8; 20];
        hex::decode_to_slice(s.trim(), &mut out)
            .map_err(|e| TorrentError::malformed(format!("invalid info hash '{}': {}", s, e)))?;
        Ok(Self(out))
    }
}

pub(crate) fn sha1_digest(bytes: &[u8]) -> [u8; 20] {
    let digest = Sha1::digest(bytes);
    let mut out = [0u8; 20];
    out.copy_from_slice(&digest);
    out
}

/// One file of the torrent payload. `path` is empty for single-file torrents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub path: Vec<String>,
    pub length: u64,
}

impl FileEntry {
    /// Location of this file when the torrent's content lives at `content_root`.
    pub fn path_under(&self, content_root: &Path) -> PathBuf {
        self.path
            .iter()
            .fold(content_root.to_path_buf(), |acc, part| acc.join(part))
    }

    /// Slash-joined relative path, as trackers list it.
    pub fn display_path(&self) -> String {
        self.path.join("/")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Info {
    pub name: String,
    pub piece_length: u64,
    pub pieces: Vec<[u8; 20]>,
    pub files: Vec<FileEntry>,
    pub private: bool,
    pub source: Option<String>,
}

impl Info {
    pub fn is_single_file(&self) -> bool {
        self.files.len() == 1 && self.files[0].path.is_empty()
    }

    pub fn total_length(&self) -> u64 {
        self.files.iter().map(|f| f.length).sum()
    }

    fn from_dict(dict: &Dict) -> Result<Self, TorrentError> {
        let field = |key: &str| dict.get(key.as_bytes());

        let name = field("name")
            .and_then(Value::as_bytes)
            .map(|b| String::from_utf8_lossy(b).into_owned())
            .ok_or_else(|| TorrentError::malformed("info.name missing"))?;
        check_path_part(&name, "info.name")?;

        let piece_length = field("piece length")
            .and_then(Value::as_int)
            .ok_or_else(|| TorrentError::malformed("info.piece length missing"))?;
        check_piece_length(piece_length)?;
        let piece_length = piece_length as u64;

        let raw_pieces = field("pieces")
            .and_then(Value::as_bytes)
            .ok_or_else(|| TorrentError::malformed("info.pieces missing"))?;
        if raw_pieces.len() % 20 != 0 {
            return Err(TorrentError::malformed(format!(
                "info.pieces length {} is not a multiple of 20",
                raw_pieces.len()
            )));
        }
        let pieces = raw_pieces
            .chunks_exact(20)
            .map(|chunk| {
                let mut piece = [0u8; 20];
                piece.copy_from_slice(chunk);
                piece
            })
            .collect();

        let files = match (field("length"), field("files")) {
            (Some(length), None) => vec![FileEntry {
                path: Vec::new(),
                length: non_negative(length, "info.length")?,
            }],
            (None, Some(files)) => parse_files(files)?,
            (Some(_), Some(_)) => {
                return Err(TorrentError::malformed(
                    "info has both 'length' and 'files'",
                ))
            }
            (None, None) => {
                return Err(TorrentError::malformed(
                    "info has neither 'length' nor 'files'",
                ))
            }
        };

        Ok(Self {
            name,
            piece_length,
            pieces,
            files,
            private: field("private").and_then(Value::as_int) == Some(1),
            source: field("source").and_then(Value::as_str).map(str::to_string),
        })
    }

    /// Bencode dictionary for this info block.
    pub fn to_dict(&self) -> Dict {
        let mut dict = Dict::new();
        dict.insert(b"name".to_vec(), Value::from(self.name.as_str()));
        dict.insert(
            b"piece length".to_vec(),
            Value::Int(self.piece_length as i64),
        );
        dict.insert(b"pieces".to_vec(), Value::Bytes(self.pieces.concat()));
        if self.is_single_file() {
            dict.insert(b"length".to_vec(), Value::Int(self.files[0].length as i64));
        } else {
            let files = self
                .files
                .iter()
                .map(|f| {
                    let mut entry = Dict::new();
                    entry.insert(b"length".to_vec(), Value::Int(f.length as i64));
                    entry.insert(
                        b"path".to_vec(),
                        Value::List(f.path.iter().map(|p| Value::from(p.as_str())).collect()),
                    );
                    Value::Dict(entry)
                })
                .collect();
            dict.insert(b"files".to_vec(), Value::List(files));
        }
        if self.private {
            dict.insert(b"private".to_vec(), Value::Int(1));
        }
        if let Some(source) = &self.source {
            dict.insert(b"source".to_vec(), Value::from(source.as_str()));
        }
        dict
    }
}

/// Largest piece length accepted from a torrent file.
pub const MAX_PIECE_LENGTH: u64 = 64 * 1024 * 1024;

pub(crate) fn check_piece_length(piece_length: i64) -> Result<(), TorrentError> {
    let valid = piece_length > 0
        && (piece_length as u64).is_power_of_two()
        && piece_length as u64 <= MAX_PIECE_LENGTH;
    if valid {
        Ok(())
    } else {
        Err(TorrentError::malformed(format!(
            "info.piece length {} is not a power of two up to {}",
            piece_length, MAX_PIECE_LENGTH
        )))
    }
}

/// A name or path part must stay inside the directory it is joined to.
fn check_path_part(part: &str, what: &str) -> Result<(), TorrentError> {
    let unsafe_part = part.is_empty()
        || part == "."
        || part == ".."
        || part.contains(['/', '\\', '\0'])
        || Path::new(part).has_root();
    if unsafe_part {
        Err(TorrentError::malformed(format!(
            "{} '{}' is not a plain file name",
            what, part
        )))
    } else {
        Ok(())
    }
}

fn non_negative(value: &Value, what: &str) -> Result<u64, TorrentError> {
    value
        .as_int()
        .filter(|&n| n >= 0)
        .map(|n| n as u64)
        .ok_or_else(|| TorrentError::malformed(format!("{} must be a non-negative integer", what)))
}

fn parse_files(value: &Value) -> Result<Vec<FileEntry>, TorrentError> {
    let list = value
        .as_list()
        .filter(|l| !l.is_empty())
        .ok_or_else(|| TorrentError::malformed("info.files must be a non-empty list"))?;

    list.iter()
        .map(|entry| {
            let length = entry
                .get("length")
                .ok_or_else(|| TorrentError::malformed("file entry without length"))
                .and_then(|v| non_negative(v, "file length"))?;
            let path = entry
                .get("path")
                .and_then(Value::as_list)
                .filter(|p| !p.is_empty())
                .ok_or_else(|| TorrentError::malformed("file entry without path"))?
                .iter()
                .map(|part| {
                    let part = part
                        .as_bytes()
                        .map(|b| String::from_utf8_lossy(b).into_owned())
                        .ok_or_else(|| TorrentError::malformed("file path part is not a string"))?;
                    check_path_part(&part, "file path part")?;
                    Ok(part)
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(FileEntry { path, length })
        })
        .collect()
}

/// Top-level fields to set when preparing a torrent for another tracker.
#[derive(Debug, Clone, Default)]
pub struct RewriteFields {
    pub announce: String,
    pub comment: Option<String>,
    pub created_by: Option<String>,
    /// Entries to set inside `info`. Any override changes the info hash.
    pub info_overrides: Dict,
}

/// A parsed torrent file.
#[derive(Debug, Clone)]
pub struct Metainfo {
    root: Dict,
    raw_info: Vec<u8>,
    info: Info,
    info_hash: InfoHash,
}

impl Metainfo {
    pub fn parse(bytes: &[u8]) -> Result<Self, TorrentError> {
        let (root, spans) = bencode::parse_dict_with_spans(bytes)?;

        let info_dict = root
            .get(b"info".as_slice())
            .and_then(Value::as_dict)
            .ok_or_else(|| TorrentError::malformed("missing info dictionary"))?;
        let info = Info::from_dict(info_dict)?;

        let span = spans
            .get(b"info".as_slice())
            .cloned()
            .ok_or_else(|| TorrentError::malformed("missing info dictionary"))?;
        let raw_info = bytes[span].to_vec();
        let info_hash = InfoHash::of(&raw_info);

        Ok(Self {
            root,
            raw_info,
            info,
            info_hash,
        })
    }

    pub fn from_file(path: &Path) -> Result<Self, TorrentError> {
        let bytes = std::fs::read(path).map_err(|e| TorrentError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(&bytes)
    }

    pub fn info(&self) -> &Info {
        &self.info
    }

    pub fn info_hash(&self) -> InfoHash {
        self.info_hash
    }

    pub fn raw_info(&self) -> &[u8] {
        &self.raw_info
    }

    pub fn announce(&self) -> Option<&str> {
        self.root.get(b"announce".as_slice()).and_then(Value::as_str)
    }

    pub fn comment(&self) -> Option<&str> {
        self.root.get(b"comment".as_slice()).and_then(Value::as_str)
    }

    /// Serialize a copy of this torrent with destination fields applied.
    ///
    /// Without info overrides the info dictionary is emitted byte-for-byte as
    /// it was parsed, so the info hash is unchanged.
    pub fn rewrite(&self, fields: &RewriteFields) -> Vec<u8> {
        let mut top = self.root.clone();
        let info_value = top.remove(b"info".as_slice());
        top.remove(b"announce-list".as_slice());
        top.insert(b"announce".to_vec(), Value::from(fields.announce.as_str()));
        if let Some(comment) = &fields.comment {
            top.insert(b"comment".to_vec(), Value::from(comment.as_str()));
        }
        if let Some(created_by) = &fields.created_by {
            top.insert(b"created by".to_vec(), Value::from(created_by.as_str()));
        }

        let info_bytes = match info_value {
            Some(Value::Dict(mut info)) if !fields.info_overrides.is_empty() => {
                for (key, value) in &fields.info_overrides {
                    info.insert(key.clone(), value.clone());
                }
                bencode::encode(&Value::Dict(info))
            }
            _ => self.raw_info.clone(),
        };

        let mut out = Vec::with_capacity(info_bytes.len() + 256);
        out.push(b'd');
        let mut info_written = false;
        for (key, value) in &top {
            if !info_written && key.as_slice() > b"info".as_slice() {
                write_info(&mut out, &info_bytes);
                info_written = true;
            }
            bencode::encode_into(&Value::Bytes(key.clone()), &mut out);
            bencode::encode_into(value, &mut out);
        }
        if !info_written {
            write_info(&mut out, &info_bytes);
        }
        out.push(b'e');
        out
    }
}

fn write_info(out: &mut Vec<u8>, info_bytes: &[u8]) {
    bencode::encode_into(&Value::from("info"), out);
    out.extend_from_slice(info_bytes);
}
