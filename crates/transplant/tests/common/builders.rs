//! Builders for listings, torrents and settings used across integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use transplant::config::schema::{ApiKeys, Settings};
use transplant::torrent::{build_from_content, FileEntry, Info, Metainfo, RewriteFields};
use transplant::tracker::{ArtistCredit, Edition, Listing, Tracker};

/// Builder for `Listing` values as a fake tracker would report them.
pub struct ListingBuilder {
    listing: Listing,
}

impl ListingBuilder {
    pub fn new(tracker: Tracker, torrent_id: u64) -> Self {
        Self {
            listing: Listing {
                tracker,
                torrent_id,
                group_id: torrent_id + 1000,
                category_id: 1,
                title: "Test Album".to_string(),
                year: 2001,
                release_type: 1,
                record_label: "Label".to_string(),
                catalogue_number: "CAT-1".to_string(),
                artists: vec![ArtistCredit {
                    name: "Test Artist".to_string(),
                    importance: 1,
                }],
                tags: vec!["rock".to_string()],
                image: None,
                album_description: "An album.".to_string(),
                edition: Edition::default(),
                media: "CD".to_string(),
                format: "FLAC".to_string(),
                encoding: "Lossless".to_string(),
                scene: false,
                has_log: false,
                release_description: "Ripped with care.".to_string(),
                uploader_id: 42,
                uploader_name: "uploader".to_string(),
                file_path: String::new(),
                files: Vec::new(),
                info_hash: None,
            },
        }
    }

    pub fn title(mut self, title: &str) -> Self {
        self.listing.title = title.to_string();
        self
    }

    pub fn uploader(mut self, id: u64, name: &str) -> Self {
        self.listing.uploader_id = id;
        self.listing.uploader_name = name.to_string();
        self
    }

    pub fn image(mut self, url: &str) -> Self {
        self.listing.image = Some(url.to_string());
        self
    }

    pub fn album_description(mut self, text: &str) -> Self {
        self.listing.album_description = text.to_string();
        self
    }

    pub fn release_description(mut self, text: &str) -> Self {
        self.listing.release_description = text.to_string();
        self
    }

    pub fn has_log(mut self, has_log: bool) -> Self {
        self.listing.has_log = has_log;
        self
    }

    pub fn build(self) -> Listing {
        self.listing
    }
}

/// Builder for a multi-file torrent together with its content.
pub struct TorrentBuilder {
    name: String,
    files: Vec<(String, Vec<u8>)>,
    piece_length: u64,
    source: Tracker,
    passkey: String,
}

impl TorrentBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            files: Vec::new(),
            piece_length: 16 * 1024,
            source: Tracker::Red,
            passkey: "srcpasskey".to_string(),
        }
    }

    /// Adds a file; `path` is relative to the torrent folder and uses `/`.
    pub fn file(mut self, path: &str, content: &[u8]) -> Self {
        self.files.push((path.to_string(), content.to_vec()));
        self
    }

    pub fn source(mut self, tracker: Tracker) -> Self {
        self.source = tracker;
        self
    }

    pub fn piece_length(mut self, piece_length: u64) -> Self {
        self.piece_length = piece_length;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Writes the content to `parent/<name>/...` and returns the torrent folder.
    pub fn write_content(&self, parent: &Path) -> PathBuf {
        let root = parent.join(&self.name);
        for (path, content) in &self.files {
            let full = path.split('/').fold(root.clone(), |acc, part| acc.join(part));
            if let Some(dir) = full.parent() {
                std::fs::create_dir_all(dir).expect("Failed to create content directory");
            }
            std::fs::write(&full, content).expect("Failed to write content file");
        }
        root
    }

    fn layout(&self) -> Info {
        Info {
            name: self.name.clone(),
            piece_length: self.piece_length,
            pieces: Vec::new(),
            files: self
                .files
                .iter()
                .map(|(path, content)| FileEntry {
                    path: path.split('/').map(str::to_string).collect(),
                    length: content.len() as u64,
                })
                .collect(),
            private: true,
            source: None,
        }
    }

    /// Writes the content under `parent` and returns the source torrent bytes,
    /// announcing to the source tracker.
    pub fn build_in(&self, parent: &Path) -> Vec<u8> {
        let root = self.write_content(parent);
        let announce = self.source.announce_url(&self.passkey);
        let torrent = build_from_content(&root, &self.layout(), self.source.source_flag(), &announce)
            .expect("Failed to hash test content");
        torrent.rewrite(&RewriteFields {
            announce,
            comment: Some(self.source.torrent_url(1)),
            ..RewriteFields::default()
        })
    }
}

pub fn parse(bytes: &[u8]) -> Metainfo {
    Metainfo::parse(bytes).expect("Test torrent should parse")
}

/// Writes torrent bytes to `dir/file_name`.
pub fn write_torrent_file(dir: &Path, file_name: &str, bytes: &[u8]) -> PathBuf {
    std::fs::create_dir_all(dir).expect("Failed to create torrent directory");
    let path = dir.join(file_name);
    std::fs::write(&path, bytes).expect("Failed to write torrent file");
    path
}

/// Settings that pass the readiness check with `data_dir` as the content root.
pub fn ready_settings(data_dir: &Path) -> Settings {
    Settings {
        api_keys: ApiKeys {
            red: "red-key".to_string(),
            ops: "ops-key".to_string(),
        },
        data_dir: Some(data_dir.to_path_buf()),
        file_check: false,
        ..Settings::default()
    }
}
