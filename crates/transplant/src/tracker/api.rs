use std::num::NonZeroU32;
use std::sync::OnceLock;
use std::time::Duration;

use governor::clock::{Clock, DefaultClock};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::AUTHORIZATION;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use super::error::ApiError;
use super::models::{
    classify_failure, AccountInfo, Envelope, Listing, ListingRef, RawAccount, RawTorrentResponse,
    RawUpload, UploadRequest, UploadResponse,
};
use super::Tracker;
use crate::torrent::InfoHash;

/// Requests allowed in a burst before pacing kicks in.
const REQUESTS_PER_WINDOW: u32 = 5;
const WINDOW: Duration = Duration::from_secs(10);

const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
const USER_AGENT: &str = concat!("transplant/", env!("CARGO_PKG_VERSION"));

/// Operations the transplanter needs from a tracker.
pub trait TrackerApi: Send + Sync {
    fn tracker(&self) -> Tracker;

    /// The account owning the API key.
    fn account(&self) -> Result<AccountInfo, ApiError>;

    fn fetch_listing(&self, reference: ListingRef) -> Result<Listing, ApiError>;

    fn download_torrent(&self, torrent_id: u64) -> Result<Vec<u8>, ApiError>;

    /// Id of a torrent already listed with this info hash, if any.
    fn find_existing(&self, info_hash: &InfoHash) -> Result<Option<u64>, ApiError> {
        match self.fetch_listing(ListingRef::Hash(*info_hash)) {
            Ok(listing) => Ok(Some(listing.torrent_id)),
            Err(ApiError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn submit(&self, request: &UploadRequest) -> Result<UploadResponse, ApiError>;
}

/// Blocks callers so that at most a burst of requests goes out per window.
pub(crate) struct Pacer {
    limiter: DefaultDirectRateLimiter,
    clock: DefaultClock,
}

impl Pacer {
    pub(crate) fn new(requests: u32, window: Duration) -> Self {
        let burst = NonZeroU32::new(requests).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::with_period(window / burst.get())
            .unwrap_or_else(|| Quota::per_second(burst))
            .allow_burst(burst);
        let clock = DefaultClock::default();
        Self {
            limiter: RateLimiter::direct_with_clock(quota, &clock),
            clock,
        }
    }

    pub(crate) fn wait(&self) {
        while let Err(not_until) = self.limiter.check() {
            let delay = not_until.wait_time_from(self.clock.now());
            debug!(delay_ms = delay.as_millis() as u64, "Pacing tracker request");
            std::thread::sleep(delay);
        }
    }
}

/// JSON API client for one Gazelle tracker.
pub struct GazelleClient {
    tracker: Tracker,
    base_url: String,
    api_key: SecretString,
    http: Client,
    pacer: Pacer,
    account: OnceLock<AccountInfo>,
}

impl GazelleClient {
    pub fn new(tracker: Tracker, api_key: SecretString) -> Result<Self, ApiError> {
        Self::with_base_url(tracker, api_key, tracker.site_url())
    }

    pub fn with_base_url(
        tracker: Tracker,
        api_key: SecretString,
        base_url: impl Into<String>,
    ) -> Result<Self, ApiError> {
        let http = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ApiError::Client(e.to_string()))?;

        Ok(Self {
            tracker,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            http,
            pacer: Pacer::new(REQUESTS_PER_WINDOW, WINDOW),
            account: OnceLock::new(),
        })
    }

    fn ajax(&self, builder: fn(&Client, String) -> RequestBuilder, action: &str) -> RequestBuilder {
        builder(&self.http, format!("{}/ajax.php", self.base_url))
            .query(&[("action", action)])
            .header(
                AUTHORIZATION,
                self.tracker.auth_header(self.api_key.expose_secret()),
            )
    }

    /// Sends a request and unwraps the Gazelle status envelope.
    fn send_json<T: serde::de::DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, ApiError> {
        let (status, body) = self.send(request)?;
        match serde_json::from_slice::<Envelope>(&body) {
            Ok(envelope) => envelope.into_result(),
            Err(_) if !status.is_success() => Err(ApiError::Network(format!("HTTP {}", status))),
            Err(e) => Err(ApiError::BadResponse(e.to_string())),
        }
    }

    fn send(&self, request: RequestBuilder) -> Result<(StatusCode, Vec<u8>), ApiError> {
        self.pacer.wait();
        let response = request.send()?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ApiError::Auth(format!(
                "{} answered HTTP {}",
                self.tracker, status
            )));
        }
        let body = response.bytes()?.to_vec();
        Ok((status, body))
    }
}

impl TrackerApi for GazelleClient {
    fn tracker(&self) -> Tracker {
        self.tracker
    }

    fn account(&self) -> Result<AccountInfo, ApiError> {
        if let Some(account) = self.account.get() {
            return Ok(account.clone());
        }
        debug!(tracker = %self.tracker, "Fetching account info");
        let raw: RawAccount = self.send_json(self.ajax(Client::get, "index"))?;
        let account = AccountInfo {
            id: raw.id,
            username: raw.username,
            passkey: raw.passkey,
        };
        let _ = self.account.set(account.clone());
        Ok(account)
    }

    fn fetch_listing(&self, reference: ListingRef) -> Result<Listing, ApiError> {
        let request = self.ajax(Client::get, "torrent");
        let request = match reference {
            ListingRef::Id(id) => request.query(&[("id", id.to_string())]),
            ListingRef::Hash(hash) => request.query(&[("hash", hash.to_upper_hex())]),
        };
        debug!(tracker = %self.tracker, ?reference, "Fetching listing");
        let raw: RawTorrentResponse = self.send_json(request)?;
        Ok(Listing::from_raw(self.tracker, raw))
    }

    fn download_torrent(&self, torrent_id: u64) -> Result<Vec<u8>, ApiError> {
        debug!(tracker = %self.tracker, torrent_id, "Downloading torrent file");
        let request = self
            .ajax(Client::get, "download")
            .query(&[("id", torrent_id.to_string())]);
        let (status, body) = self.send(request)?;

        if body.first() == Some(&b'd') {
            return Ok(body);
        }
        match serde_json::from_slice::<Envelope>(&body) {
            Ok(envelope) if envelope.status != "success" => Err(classify_failure(
                envelope.error.unwrap_or_else(|| "download failed".to_string()),
            )),
            _ if !status.is_success() => Err(ApiError::Network(format!("HTTP {}", status))),
            _ => Err(ApiError::BadResponse(
                "download did not return a torrent file".to_string(),
            )),
        }
    }

    fn submit(&self, request: &UploadRequest) -> Result<UploadResponse, ApiError> {
        let torrent_part = Part::bytes(request.torrent.clone())
            .file_name(request.torrent_file_name.clone())
            .mime_str("application/x-bittorrent")?;

        let mut form = Form::new().part("file_input", torrent_part);
        for (name, value) in request.form_fields() {
            form = form.text(name, value);
        }
        for (name, bytes) in &request.log_files {
            form = form.part(
                "logfiles[]",
                Part::bytes(bytes.clone()).file_name(name.clone()),
            );
        }

        debug!(
            tracker = %self.tracker,
            group_id = ?request.group_id,
            logs = request.log_files.len(),
            "Submitting upload"
        );
        let raw: RawUpload = self.send_json(self.ajax(Client::post, "upload").multipart(form))?;

        Ok(UploadResponse {
            torrent_id: raw.torrentid,
            group_id: raw.groupid,
            url: self.tracker.group_torrent_url(raw.groupid, raw.torrentid),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_pacer_allows_initial_burst() {
        let pacer = Pacer::new(3, Duration::from_secs(60));
        let start = Instant::now();
        for _ in 0..3 {
            pacer.wait();
        }
        assert!(start.elapsed() < Duration::from_secs(5));
        assert!(pacer.limiter.check().is_err());
    }

    #[test]
    fn test_client_construction() {
        let client = GazelleClient::with_base_url(
            Tracker::Ops,
            SecretString::from("key".to_string()),
            "http://127.0.0.1:9/",
        )
        .unwrap();
        assert_eq!(client.tracker(), Tracker::Ops);
        assert_eq!(client.base_url, "http://127.0.0.1:9");
    }

    #[test]
    fn test_unreachable_tracker_is_network_error() {
        let client = GazelleClient::with_base_url(
            Tracker::Red,
            SecretString::from("key".to_string()),
            "http://127.0.0.1:9",
        )
        .unwrap();
        let err = client.fetch_listing(ListingRef::Id(1)).unwrap_err();
        assert!(matches!(err, ApiError::Network(_)), "got {:?}", err);
    }
}
