pub mod torrent_store;

pub use torrent_store::{remove_scanned, torrent_file_name, TorrentStore};
