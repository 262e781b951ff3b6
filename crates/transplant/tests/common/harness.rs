//! Test harness with fake trackers and image hosts at the trait seams.
//!
//! `TestHarness` owns a temporary directory with data, scan and save
//! subdirectories and one `FakeTracker` per supported tracker.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use secrecy::SecretString;
use tempfile::TempDir;

use transplant::config::Settings;
use transplant::rehost::{HostKind, ImageHost, RehostError};
use transplant::torrent::{InfoHash, Metainfo};
use transplant::tracker::{
    AccountInfo, ApiError, ApiMap, Listing, ListingRef, Tracker, TrackerApi, UploadRequest,
    UploadResponse,
};
use transplant::{JobRunner, Transplanter};

use super::builders::{ready_settings, TorrentBuilder};

type Hook = Box<dyn Fn(&UploadRequest) + Send>;

/// In-memory tracker. Listings are registered up front; submissions are recorded.
pub struct FakeTracker {
    tracker: Tracker,
    account: AccountInfo,
    listings: Mutex<Vec<(Listing, Vec<u8>, InfoHash)>>,
    existing: Mutex<HashMap<InfoHash, u64>>,
    submitted: Mutex<Vec<UploadRequest>>,
    reject_with: Mutex<Option<String>>,
    panic_on_id: Mutex<Option<u64>>,
    on_submit: Mutex<Option<Hook>>,
    next_id: AtomicU64,
}

impl FakeTracker {
    pub fn new(tracker: Tracker) -> Arc<Self> {
        Arc::new(Self {
            tracker,
            account: AccountInfo {
                id: 7,
                username: format!("me-on-{}", tracker),
                passkey: format!("{}passkey", tracker.source_flag().to_lowercase()),
            },
            listings: Mutex::new(Vec::new()),
            existing: Mutex::new(HashMap::new()),
            submitted: Mutex::new(Vec::new()),
            reject_with: Mutex::new(None),
            panic_on_id: Mutex::new(None),
            on_submit: Mutex::new(None),
            next_id: AtomicU64::new(9000),
        })
    }

    pub fn account_id(&self) -> u64 {
        self.account.id
    }

    pub fn passkey(&self) -> &str {
        &self.account.passkey
    }

    pub fn add_listing(&self, mut listing: Listing, torrent: Vec<u8>) {
        let info_hash = Metainfo::parse(&torrent)
            .expect("Fake listing torrent should parse")
            .info_hash();
        listing.info_hash = Some(info_hash);
        self.listings.lock().unwrap().push((listing, torrent, info_hash));
    }

    /// Makes `find_existing` report `info_hash` as already listed.
    pub fn add_existing(&self, info_hash: InfoHash, torrent_id: u64) {
        self.existing.lock().unwrap().insert(info_hash, torrent_id);
    }

    pub fn reject_uploads(&self, message: &str) {
        *self.reject_with.lock().unwrap() = Some(message.to_string());
    }

    pub fn panic_on_fetch(&self, torrent_id: u64) {
        *self.panic_on_id.lock().unwrap() = Some(torrent_id);
    }

    /// Runs `hook` after each accepted submission.
    pub fn on_submit<F>(&self, hook: F)
    where
        F: Fn(&UploadRequest) + Send + 'static,
    {
        *self.on_submit.lock().unwrap() = Some(Box::new(hook));
    }

    pub fn submitted(&self) -> Vec<UploadRequest> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn submit_count(&self) -> usize {
        self.submitted.lock().unwrap().len()
    }
}

impl TrackerApi for FakeTracker {
    fn tracker(&self) -> Tracker {
        self.tracker
    }

    fn account(&self) -> Result<AccountInfo, ApiError> {
        Ok(self.account.clone())
    }

    fn fetch_listing(&self, reference: ListingRef) -> Result<Listing, ApiError> {
        if let ListingRef::Id(id) = reference {
            if *self.panic_on_id.lock().unwrap() == Some(id) {
                panic!("fake tracker blew up on {}", id);
            }
        }
        let listings = self.listings.lock().unwrap();
        listings
            .iter()
            .find(|(listing, _, hash)| match reference {
                ListingRef::Id(id) => listing.torrent_id == id,
                ListingRef::Hash(h) => *hash == h,
            })
            .map(|(listing, _, _)| listing.clone())
            .ok_or_else(|| ApiError::NotFound(format!("{:?}", reference)))
    }

    fn download_torrent(&self, torrent_id: u64) -> Result<Vec<u8>, ApiError> {
        let listings = self.listings.lock().unwrap();
        listings
            .iter()
            .find(|(listing, _, _)| listing.torrent_id == torrent_id)
            .map(|(_, torrent, _)| torrent.clone())
            .ok_or_else(|| ApiError::NotFound(torrent_id.to_string()))
    }

    fn find_existing(&self, info_hash: &InfoHash) -> Result<Option<u64>, ApiError> {
        Ok(self.existing.lock().unwrap().get(info_hash).copied())
    }

    fn submit(&self, request: &UploadRequest) -> Result<UploadResponse, ApiError> {
        if let Some(message) = self.reject_with.lock().unwrap().clone() {
            return Err(ApiError::Rejected(message));
        }
        self.submitted.lock().unwrap().push(request.clone());
        let torrent_id = self.next_id.fetch_add(1, Ordering::SeqCst);
        if let Some(hook) = self.on_submit.lock().unwrap().as_ref() {
            hook(request);
        }
        Ok(UploadResponse {
            torrent_id,
            group_id: request.group_id.unwrap_or(torrent_id + 1),
            url: self.tracker.torrent_url(torrent_id),
        })
    }
}

/// Image host that either always fails or returns a numbered ptpimg link.
pub struct FakeHost {
    kind: HostKind,
    fails: bool,
    calls: Arc<AtomicUsize>,
}

impl FakeHost {
    pub fn working(kind: HostKind) -> Self {
        Self {
            kind,
            fails: false,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing(kind: HostKind) -> Self {
        Self {
            fails: true,
            ..Self::working(kind)
        }
    }

    /// Shared counter of upload attempts.
    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

impl ImageHost for FakeHost {
    fn kind(&self) -> HostKind {
        self.kind
    }

    fn upload(&self, link: &str, _credential: Option<&SecretString>) -> Result<String, RehostError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fails {
            return Err(RehostError::Network {
                host: self.kind,
                message: format!("cannot fetch {}", link),
            });
        }
        Ok(format!("https://ptpimg.me/{}-{}.png", self.kind, n))
    }
}

/// Isolated environment for transplant tests.
pub struct TestHarness {
    temp_dir: TempDir,
    pub data_dir: PathBuf,
    pub scan_dir: PathBuf,
    pub save_dir: PathBuf,
    /// Content of torrents whose files are not meant to be found.
    pub elsewhere_dir: PathBuf,
    pub red: Arc<FakeTracker>,
    pub ops: Arc<FakeTracker>,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();
        let data_dir = base.join("data");
        let scan_dir = base.join("scan");
        let save_dir = base.join("save");
        let elsewhere_dir = base.join("elsewhere");
        for dir in [&data_dir, &scan_dir, &save_dir, &elsewhere_dir] {
            std::fs::create_dir_all(dir).expect("Failed to create test directory");
        }

        Self {
            temp_dir,
            data_dir,
            scan_dir,
            save_dir,
            elsewhere_dir,
            red: FakeTracker::new(Tracker::Red),
            ops: FakeTracker::new(Tracker::Ops),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn settings(&self) -> Settings {
        ready_settings(&self.data_dir)
    }

    pub fn fake(&self, tracker: Tracker) -> &Arc<FakeTracker> {
        match tracker {
            Tracker::Red => &self.red,
            Tracker::Ops => &self.ops,
        }
    }

    pub fn apis(&self) -> ApiMap {
        let mut apis = ApiMap::new();
        apis.insert(Tracker::Red, Arc::clone(&self.red) as Arc<dyn TrackerApi>);
        apis.insert(Tracker::Ops, Arc::clone(&self.ops) as Arc<dyn TrackerApi>);
        apis
    }

    pub fn transplanter(&self, settings: Settings) -> Transplanter {
        Transplanter::new(self.apis(), Arc::new(settings))
    }

    pub fn runner(&self) -> JobRunner {
        let apis = self.apis();
        JobRunner::with_api_factory(move |_| Ok(apis.clone()))
    }

    /// Registers a release on its source tracker and returns its torrent bytes.
    /// With `content` the files are written into the data directory.
    pub fn add_release(
        &self,
        listing: Listing,
        torrent: &TorrentBuilder,
        content: bool,
    ) -> Vec<u8> {
        let parent = if content {
            &self.data_dir
        } else {
            &self.elsewhere_dir
        };
        let bytes = torrent.build_in(parent);
        self.fake(listing.tracker).add_listing(listing, bytes.clone());
        bytes
    }

    /// A RED release with id `torrent_id` and two small files.
    pub fn simple_release(&self, torrent_id: u64, content: bool) -> Vec<u8> {
        let name = format!("Test Artist - Album {}", torrent_id);
        let torrent = TorrentBuilder::new(&name)
            .file("01 - Intro.flac", format!("intro of {}", torrent_id).as_bytes())
            .file("02 - Outro.flac", &vec![torrent_id as u8; 40_000]);
        let listing = super::builders::ListingBuilder::new(Tracker::Red, torrent_id)
            .title(&format!("Album {}", torrent_id))
            .build();
        self.add_release(listing, &torrent, content)
    }
}
