//! Torrent metadata handling: the bencode wire format, structured metainfo,
//! destination rewrites and reconstruction from local content.

pub mod bencode;
pub mod builder;
pub mod error;
pub mod metainfo;

pub use bencode::Value;
pub use builder::build_from_content;
pub use error::TorrentError;
pub use metainfo::{FileEntry, Info, InfoHash, Metainfo, RewriteFields};

#[cfg(test)]
pub(crate) mod fixtures {
    use super::bencode::{self, Dict, Value};
    use super::Info;

    /// Bencoded torrent wrapping `info`, with an announce-list and a comment.
    pub(crate) fn sample_torrent(info: &Info, announce: &str) -> Vec<u8> {
        let mut root = Dict::new();
        root.insert(b"announce".to_vec(), Value::from(announce));
        root.insert(
            b"announce-list".to_vec(),
            Value::List(vec![Value::List(vec![Value::from(announce)])]),
        );
        root.insert(b"comment".to_vec(), Value::from("original"));
        root.insert(b"info".to_vec(), Value::Dict(info.to_dict()));
        bencode::encode(&Value::Dict(root))
    }
}
