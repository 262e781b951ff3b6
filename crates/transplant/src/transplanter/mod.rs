//! Moves one job from its source tracker to the other tracker.

pub mod error;
pub mod verify;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, info_span, warn};
use walkdir::WalkDir;

use crate::config::{Settings, TemplateEngine, TemplateVars};
use crate::job::Job;
use crate::rehost::{needs_rehost, RehostChain, RehostError};
use crate::sanitize;
use crate::storage::{remove_scanned, torrent_file_name, TorrentStore};
use crate::torrent::{build_from_content, Metainfo, RewriteFields};
use crate::tracker::{ApiMap, Listing, ListingRef, Tracker, TrackerApi, UploadRequest};

use error::AtStep;
pub use error::{Cause, Step, TransplantError};
pub use verify::VerifyError;

/// How a job ended when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransplantOutcome {
    Uploaded { url: String },
    /// The destination already has this torrent. Nothing was submitted.
    AlreadyExists { url: String },
}

impl TransplantOutcome {
    pub fn is_uploaded(&self) -> bool {
        matches!(self, TransplantOutcome::Uploaded { .. })
    }

    pub fn url(&self) -> &str {
        match self {
            TransplantOutcome::Uploaded { url } | TransplantOutcome::AlreadyExists { url } => url,
        }
    }
}

struct Source {
    listing: Listing,
    torrent: Metainfo,
}

struct Prepared {
    bytes: Vec<u8>,
    /// Set when the torrent was rebuilt from local content.
    rebuilt: Option<Metainfo>,
}

pub struct Transplanter {
    apis: ApiMap,
    settings: Arc<Settings>,
    rehost: Option<RehostChain>,
}

impl Transplanter {
    /// A transplanter that never rehosts images.
    pub fn new(apis: ApiMap, settings: Arc<Settings>) -> Self {
        Self {
            apis,
            settings,
            rehost: None,
        }
    }

    /// Builds the rehost chain from settings when rehosting is enabled.
    pub fn from_settings(apis: ApiMap, settings: Arc<Settings>) -> Result<Self, RehostError> {
        let rehost = if settings.rehost.enabled {
            let chain = RehostChain::from_settings(&settings.rehost)?;
            if chain.has_enabled_hosts() {
                Some(chain)
            } else {
                warn!("Image rehosting is on but every image host is disabled");
                None
            }
        } else {
            None
        };
        Ok(Self {
            apis,
            settings,
            rehost,
        })
    }

    pub fn with_rehost_chain(mut self, chain: RehostChain) -> Self {
        self.rehost = Some(chain);
        self
    }

    fn api(&self, tracker: Tracker) -> Result<&dyn TrackerApi, Cause> {
        self.apis
            .get(&tracker)
            .map(|api| &**api)
            .ok_or(Cause::MissingApi(tracker))
    }

    /// Runs every step for one job. Resolved fields and `upload_succeeded` are
    /// written into `job` as they become known, also when a later step fails.
    pub fn process(&self, job: &mut Job) -> Result<TransplantOutcome, TransplantError> {
        let file = job
            .torrent_path
            .as_deref()
            .map(sanitize::redact_path)
            .unwrap_or_default();
        let _span = info_span!("transplant",
            job_id = %job.id,
            name = %job.label(),
            file = %file,
            from = %job.src_tracker,
            to = %job.dest_tracker(),
        )
        .entered();

        let src = self.api(job.src_tracker).at(Step::Resolve)?;
        let dest = self.api(job.dest_tracker()).at(Step::CheckExisting)?;

        // Step 1: Resolve the source listing and torrent
        let source = {
            let _step = info_span!("resolve").entered();
            self.resolve(src, job).at(Step::Resolve)?
        };
        info!("Resolved {}", source.listing.display_name());

        // Step 2: Skip torrents the destination already has
        {
            let _step = info_span!("check_existing").entered();
            let info_hash = source.torrent.info_hash();
            if let Some(existing) = dest.find_existing(&info_hash).at(Step::CheckExisting)? {
                let url = dest.tracker().torrent_url(existing);
                info!(%info_hash, %url, "Already on {}, skipping upload", dest.tracker());
                return Ok(TransplantOutcome::AlreadyExists { url });
            }
        }

        // Step 3: Find and check local content
        let content_root = {
            let _step = info_span!("file_check").entered();
            self.find_content(job, &source).at(Step::FileCheck)?
        };

        // Step 4: Rewrite or rebuild the torrent for the destination
        let prepared = {
            let _step = info_span!("prepare", rebuild = job.new_torrent).entered();
            self.prepare(dest, job, &source, content_root.as_deref())
                .at(Step::Prepare)?
        };

        // Step 5: Compare the prepared torrent with the source
        if self.settings.post_compare {
            let _step = info_span!("post_compare").entered();
            let compared = match &prepared.rebuilt {
                Some(rebuilt) => verify::compare_rebuilt(source.torrent.info(), rebuilt.info()),
                None => verify::compare_rewritten(&source.torrent, &prepared.bytes),
            };
            compared.at(Step::PostCompare)?;
            debug!("Prepared torrent matches its source");
        }

        // Step 6: Keep a copy of the new torrent
        let file_name = torrent_file_name(&source.torrent.info().name);
        if self.settings.save_torrents {
            let _step = info_span!("save").entered();
            self.save(&file_name, &prepared.bytes).at(Step::Save)?;
        }

        // Step 7: Description, rehosting images on the way
        let request = {
            let _step = info_span!("describe").entered();
            self.build_request(src, job, &source, prepared.bytes, file_name, content_root.as_deref())
        };

        // Step 8: Upload
        let response = {
            let _step = info_span!("submit").entered();
            dest.submit(&request).at(Step::Submit)?
        };
        job.upload_succeeded = true;
        info!(url = %response.url, "Uploaded to {}", dest.tracker());

        if self.settings.delete_scanned && job.scanned {
            if let Some(path) = &job.torrent_path {
                match remove_scanned(path) {
                    Ok(()) => info!("Deleted scanned torrent {}", sanitize::redact_path(path)),
                    Err(e) => warn!(error = %e, "Could not delete scanned torrent"),
                }
            }
        }

        Ok(TransplantOutcome::Uploaded { url: response.url })
    }

    fn resolve(&self, api: &dyn TrackerApi, job: &mut Job) -> Result<Source, Cause> {
        let (listing, torrent) = match (&job.torrent_path, job.tor_id) {
            (Some(path), _) => {
                let torrent = Metainfo::from_file(path)?;
                let listing = api.fetch_listing(ListingRef::Hash(torrent.info_hash()))?;
                (listing, torrent)
            }
            (None, Some(id)) => {
                let listing = api.fetch_listing(ListingRef::Id(id))?;
                let bytes = api.download_torrent(listing.torrent_id)?;
                (listing, Metainfo::parse(&bytes)?)
            }
            (None, None) => return Err(Cause::NoSource),
        };

        if let Some(listed) = listing.info_hash {
            if listed != torrent.info_hash() {
                warn!(%listed, actual = %torrent.info_hash(), "Listing reports a different info hash");
            }
        }
        if !verify::listed_files_match(torrent.info(), &listing.files) {
            warn!(
                listed = listing.files.len(),
                actual = torrent.info().files.len(),
                "Listing reports a different file list"
            );
        }

        job.info_hash = Some(torrent.info_hash());
        job.display_name = Some(listing.display_name());
        Ok(Source { listing, torrent })
    }

    /// Content root of the torrent, when it is needed or useful. A failed
    /// lookup is an error only if the file check is on or a rebuild was asked for.
    fn find_content(&self, job: &Job, source: &Source) -> Result<Option<PathBuf>, Cause> {
        let required = self.settings.file_check || job.new_torrent;
        if !required && !source.listing.has_log {
            return Ok(None);
        }

        let data_dir = match self.settings.data_dir() {
            Some(dir) => dir,
            None if required => return Err(Cause::NoDataDir),
            None => return Ok(None),
        };

        match verify::locate_content(data_dir, source.torrent.info(), self.settings.deep_search) {
            Ok(root) => {
                debug!("Content found at {}", root.display());
                Ok(Some(root))
            }
            Err(e) if required => Err(e.into()),
            Err(e) => {
                debug!("Content not found, uploading without logs: {}", e);
                Ok(None)
            }
        }
    }

    fn prepare(
        &self,
        dest: &dyn TrackerApi,
        job: &Job,
        source: &Source,
        content_root: Option<&Path>,
    ) -> Result<Prepared, Cause> {
        let passkey = dest.account()?.passkey;
        let announce = dest.tracker().announce_url(&passkey);
        debug!(announce = %sanitize::redact_announce(&announce), "Destination announce");

        let fields = RewriteFields {
            announce: announce.clone(),
            ..RewriteFields::default()
        };

        if !job.new_torrent {
            return Ok(Prepared {
                bytes: source.torrent.rewrite(&fields),
                rebuilt: None,
            });
        }

        let root = content_root.ok_or(Cause::NoDataDir)?;
        let rebuilt = build_from_content(
            root,
            source.torrent.info(),
            dest.tracker().source_flag(),
            &announce,
        )?;
        info!(info_hash = %rebuilt.info_hash(), "Rebuilt torrent from local content");
        Ok(Prepared {
            bytes: rebuilt.rewrite(&fields),
            rebuilt: Some(rebuilt),
        })
    }

    fn save(&self, file_name: &str, bytes: &[u8]) -> Result<(), Cause> {
        match self.settings.torrent_save_dir.as_deref() {
            Some(dir) => {
                let path = TorrentStore::new(dir).save(file_name, bytes)?;
                info!("Saved {}", sanitize::redact_path(&path));
            }
            None => warn!("Saving torrents is enabled but no save directory is set"),
        }
        Ok(())
    }

    fn build_request(
        &self,
        src: &dyn TrackerApi,
        job: &Job,
        source: &Source,
        torrent: Vec<u8>,
        file_name: String,
        content_root: Option<&Path>,
    ) -> UploadRequest {
        let listing = &source.listing;
        let own_upload = match src.account() {
            Ok(account) => account.id == listing.uploader_id,
            Err(e) => {
                warn!(error = %e, "Could not look up own account, using the regular template");
                false
            }
        };

        let mut vars = TemplateVars::from_listing(listing);
        let mut request = UploadRequest::from_listing(listing, torrent, file_name);
        request.group_id = job.dest_group;

        if let Some(chain) = &self.rehost {
            vars.src_descr = chain.rehost_description(&vars.src_descr);
            if request.group_id.is_none() {
                request.album_description = chain.rehost_description(&request.album_description);
                request.image = request.image.take().map(|cover| {
                    if needs_rehost(&cover, chain.whitelist()) {
                        chain.rehost(&cover).unwrap_or(cover)
                    } else {
                        cover
                    }
                });
            }
        }

        request.release_description =
            TemplateEngine::new(&self.settings.descriptions).release_description(&vars, own_upload);

        if listing.has_log {
            if let Some(root) = content_root {
                request.log_files = collect_logs(root);
                debug!("Attaching {} log file(s)", request.log_files.len());
            }
        }

        request
    }
}

/// Every `.log` file under `root`, ordered by path.
fn collect_logs(root: &Path) -> Vec<(String, Vec<u8>)> {
    let mut paths: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("log"))
        })
        .collect();
    paths.sort();

    paths
        .into_iter()
        .filter_map(|path| {
            let name = path.file_name()?.to_string_lossy().into_owned();
            match std::fs::read(&path) {
                Ok(bytes) => Some((name, bytes)),
                Err(e) => {
                    warn!(error = %e, "Could not read log {}", name);
                    None
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_outcome_contract() {
        let uploaded = TransplantOutcome::Uploaded {
            url: "https://x/1".to_string(),
        };
        let existing = TransplantOutcome::AlreadyExists {
            url: "https://x/2".to_string(),
        };
        assert!(uploaded.is_uploaded());
        assert!(!existing.is_uploaded());
        assert_eq!(existing.url(), "https://x/2");
    }

    #[test]
    fn test_rehosting_without_enabled_hosts_is_off() {
        let mut settings = Settings::default();
        settings.rehost.enabled = true;

        let transplanter = Transplanter::from_settings(ApiMap::new(), Arc::new(settings)).unwrap();
        assert!(transplanter.rehost.is_none());

        let mut settings = Settings::default();
        settings.rehost.enabled = true;
        settings.rehost.backends[1].enabled = true;
        let transplanter = Transplanter::from_settings(ApiMap::new(), Arc::new(settings)).unwrap();
        assert!(transplanter.rehost.is_some());
    }

    #[test]
    fn test_collect_logs() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join("CD2")).unwrap();
        std::fs::write(temp.path().join("b.LOG"), b"two").unwrap();
        std::fs::write(temp.path().join("CD2/a.log"), b"three").unwrap();
        std::fs::write(temp.path().join("01.flac"), b"audio").unwrap();

        let logs = collect_logs(temp.path());
        let names: Vec<&str> = logs.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["a.log", "b.LOG"]);
        assert_eq!(logs[1].1, b"two");
    }

    #[test]
    fn test_missing_api_is_reported_at_resolve() {
        let transplanter = Transplanter::new(ApiMap::new(), Arc::new(Settings::default()));
        let mut job = Job::from_id(Tracker::Red, 1);
        let err = transplanter.process(&mut job).unwrap_err();
        assert_eq!(err.step, Step::Resolve);
        assert!(matches!(err.cause, Cause::MissingApi(Tracker::Red)));
        assert!(!job.upload_succeeded);
    }
}
