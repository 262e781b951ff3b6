//! Gazelle tracker identities and their JSON API.

pub mod api;
pub mod error;
pub mod models;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub use api::{GazelleClient, TrackerApi};
pub use error::ApiError;
pub use models::{
    AccountInfo, ArtistCredit, Edition, ListedFile, Listing, ListingRef, UploadRequest,
    UploadResponse,
};

/// One client per supported tracker, shared by the transplanter.
pub type ApiMap = HashMap<Tracker, Arc<dyn TrackerApi>>;

/// The supported trackers. Every job moves a torrent from one to the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Tracker {
    Red,
    Ops,
}

impl Tracker {
    pub const ALL: [Tracker; 2] = [Tracker::Red, Tracker::Ops];

    /// The destination when transplanting away from `self`.
    pub fn other(self) -> Tracker {
        match self {
            Tracker::Red => Tracker::Ops,
            Tracker::Ops => Tracker::Red,
        }
    }

    pub fn site_url(self) -> &'static str {
        match self {
            Tracker::Red => "https://redacted.sh",
            Tracker::Ops => "https://orpheus.network",
        }
    }

    pub fn domains(self) -> &'static [&'static str] {
        match self {
            Tracker::Red => &["redacted.sh", "redacted.ch"],
            Tracker::Ops => &["orpheus.network"],
        }
    }

    fn announce_host(self) -> &'static str {
        match self {
            Tracker::Red => "flacsfor.me",
            Tracker::Ops => "home.opsfet.ch",
        }
    }

    /// Personal announce url for the account owning `passkey`.
    pub fn announce_url(self, passkey: &str) -> String {
        format!("https://{}/{}/announce", self.announce_host(), passkey)
    }

    /// Value of the `source` flag in the info dictionary of torrents made for this tracker.
    pub fn source_flag(self) -> &'static str {
        match self {
            Tracker::Red => "RED",
            Tracker::Ops => "OPS",
        }
    }

    fn known_source_flags(self) -> &'static [&'static str] {
        match self {
            Tracker::Red => &["RED", "PTH"],
            Tracker::Ops => &["OPS", "APL"],
        }
    }

    pub fn from_domain(domain: &str) -> Option<Tracker> {
        let domain = domain.trim().to_ascii_lowercase();
        let domain = domain.strip_prefix("www.").unwrap_or(&domain);
        Self::ALL
            .into_iter()
            .find(|t| t.domains().contains(&domain))
    }

    /// Tracker whose announce host appears in `announce`.
    pub fn from_announce(announce: &str) -> Option<Tracker> {
        let host = reqwest::Url::parse(announce).ok()?.host_str()?.to_ascii_lowercase();
        Self::ALL.into_iter().find(|t| t.announce_host() == host)
    }

    pub fn from_source_flag(flag: &str) -> Option<Tracker> {
        let flag = flag.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|t| t.known_source_flags().contains(&flag.as_str()))
    }

    pub fn torrent_url(self, torrent_id: u64) -> String {
        format!("{}/torrents.php?torrentid={}", self.site_url(), torrent_id)
    }

    pub fn group_torrent_url(self, group_id: u64, torrent_id: u64) -> String {
        format!(
            "{}/torrents.php?id={}&torrentid={}",
            self.site_url(),
            group_id,
            torrent_id
        )
    }

    /// Value of the `Authorization` header for an API key.
    pub fn auth_header(self, key: &str) -> String {
        match self {
            Tracker::Red => key.to_string(),
            Tracker::Ops => format!("token {}", key),
        }
    }
}

impl fmt::Display for Tracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.source_flag())
    }
}

impl FromStr for Tracker {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "RED" => Ok(Tracker::Red),
            "OPS" => Ok(Tracker::Ops),
            other => Err(format!("unknown tracker '{}'", other)),
        }
    }
}
