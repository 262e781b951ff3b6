//! Listing metadata, upload forms and the raw JSON shapes of the Gazelle API.

use serde::{Deserialize, Deserializer};

use super::error::ApiError;
use super::Tracker;
use crate::torrent::InfoHash;

/// How to look up a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingRef {
    Id(u64),
    Hash(InfoHash),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountInfo {
    pub id: u64,
    pub username: String,
    pub passkey: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtistCredit {
    pub name: String,
    /// Gazelle role code: 1 main, 2 guest, 3 remixer, 4 composer, 5 conductor,
    /// 6 DJ/compiler, 7 producer.
    pub importance: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedFile {
    pub path: String,
    pub size: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Edition {
    pub remastered: bool,
    pub year: u32,
    pub title: String,
    pub record_label: String,
    pub catalogue_number: String,
}

/// A torrent listing as reported by a tracker.
#[derive(Debug, Clone)]
pub struct Listing {
    pub tracker: Tracker,
    pub torrent_id: u64,
    pub group_id: u64,
    pub category_id: u32,
    pub title: String,
    pub year: u32,
    pub release_type: u32,
    pub record_label: String,
    pub catalogue_number: String,
    pub artists: Vec<ArtistCredit>,
    pub tags: Vec<String>,
    pub image: Option<String>,
    pub album_description: String,
    pub edition: Edition,
    pub media: String,
    pub format: String,
    pub encoding: String,
    pub scene: bool,
    pub has_log: bool,
    pub release_description: String,
    pub uploader_id: u64,
    pub uploader_name: String,
    pub file_path: String,
    pub files: Vec<ListedFile>,
    pub info_hash: Option<InfoHash>,
}

impl Listing {
    pub fn url(&self) -> String {
        self.tracker.group_torrent_url(self.group_id, self.torrent_id)
    }

    /// "Artist - Title (Year) [Media Format Encoding]"
    pub fn display_name(&self) -> String {
        let main: Vec<&str> = self
            .artists
            .iter()
            .filter(|a| a.importance == 1)
            .map(|a| a.name.as_str())
            .collect();
        let artist = match main.len() {
            0 => String::new(),
            1 | 2 => format!("{} - ", main.join(" & ")),
            _ => "Various Artists - ".to_string(),
        };
        let year = if self.edition.remastered && self.edition.year > 0 {
            self.edition.year
        } else {
            self.year
        };
        let spec: Vec<&str> = [&self.media, &self.format, &self.encoding]
            .into_iter()
            .map(String::as_str)
            .filter(|s| !s.is_empty())
            .collect();

        let mut name = format!("{}{}", artist, self.title);
        if year > 0 {
            name.push_str(&format!(" ({})", year));
        }
        if !spec.is_empty() {
            name.push_str(&format!(" [{}]", spec.join(" ")));
        }
        name
    }

    pub(crate) fn from_raw(tracker: Tracker, raw: RawTorrentResponse) -> Self {
        let RawTorrentResponse { group, torrent } = raw;

        let artists = group
            .music_info
            .map(|m| m.credits())
            .unwrap_or_default();

        Self {
            tracker,
            torrent_id: torrent.id,
            group_id: group.id,
            category_id: group.category_id,
            title: unescape_html(&group.name),
            year: group.year,
            release_type: group.release_type,
            record_label: unescape_html(&group.record_label),
            catalogue_number: unescape_html(&group.catalogue_number),
            artists,
            tags: group.tags,
            image: Some(group.wiki_image).filter(|s| !s.trim().is_empty()),
            album_description: group.bb_body,
            edition: Edition {
                remastered: torrent.remastered,
                year: torrent.remaster_year,
                title: unescape_html(&torrent.remaster_title),
                record_label: unescape_html(&torrent.remaster_record_label),
                catalogue_number: unescape_html(&torrent.remaster_catalogue_number),
            },
            media: torrent.media,
            format: torrent.format,
            encoding: torrent.encoding,
            scene: torrent.scene,
            has_log: torrent.has_log,
            release_description: torrent.description,
            uploader_id: torrent.user_id,
            uploader_name: torrent.username,
            file_path: unescape_html(&torrent.file_path),
            files: parse_file_list(&torrent.file_list),
            info_hash: torrent.info_hash.parse().ok(),
        }
    }
}

/// Parses Gazelle's `name{{{size}}}|||name{{{size}}}` file list.
pub fn parse_file_list(raw: &str) -> Vec<ListedFile> {
    raw.split("|||")
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| {
            let (name, rest) = entry.rsplit_once("{{{")?;
            let size = rest.strip_suffix("}}}")?.parse().ok()?;
            Some(ListedFile {
                path: unescape_html(name),
                size,
            })
        })
        .collect()
}

/// Gazelle escapes text fields for HTML output.
pub fn unescape_html(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let decoded = rest.find(';').filter(|&end| end <= 10).and_then(|end| {
            let entity = &rest[1..end];
            let ch = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                _ => entity
                    .strip_prefix("#x")
                    .or_else(|| entity.strip_prefix("#X"))
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .or_else(|| entity.strip_prefix('#').and_then(|d| d.parse().ok()))
                    .and_then(char::from_u32),
            };
            ch.map(|c| (c, end))
        });
        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &rest[end + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

const KNOWN_BITRATES: &[&str] = &[
    "192",
    "APS (VBR)",
    "V2 (VBR)",
    "V1 (VBR)",
    "256",
    "APX (VBR)",
    "V0 (VBR)",
    "320",
    "Lossless",
    "24bit Lossless",
];

/// A new listing to submit to the destination tracker.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub torrent_file_name: String,
    pub torrent: Vec<u8>,
    /// Existing destination group to add the torrent to. When set the group
    /// metadata fields are not sent.
    pub group_id: Option<u64>,
    pub category_id: u32,
    pub title: String,
    pub artists: Vec<ArtistCredit>,
    pub year: u32,
    pub release_type: u32,
    pub record_label: String,
    pub catalogue_number: String,
    pub tags: Vec<String>,
    pub image: Option<String>,
    pub album_description: String,
    pub edition: Edition,
    pub media: String,
    pub format: String,
    pub encoding: String,
    pub scene: bool,
    pub release_description: String,
    pub log_files: Vec<(String, Vec<u8>)>,
}

impl UploadRequest {
    /// Copies the listing's metadata. Descriptions are left for the caller.
    pub fn from_listing(listing: &Listing, torrent: Vec<u8>, torrent_file_name: String) -> Self {
        Self {
            torrent_file_name,
            torrent,
            group_id: None,
            category_id: listing.category_id,
            title: listing.title.clone(),
            artists: listing.artists.clone(),
            year: listing.year,
            release_type: listing.release_type,
            record_label: listing.record_label.clone(),
            catalogue_number: listing.catalogue_number.clone(),
            tags: listing.tags.clone(),
            image: listing.image.clone(),
            album_description: listing.album_description.clone(),
            edition: listing.edition.clone(),
            media: listing.media.clone(),
            format: listing.format.clone(),
            encoding: listing.encoding.clone(),
            scene: listing.scene,
            release_description: String::new(),
            log_files: Vec::new(),
        }
    }

    /// Text fields of the `action=upload` multipart form.
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![("type", self.category_id.saturating_sub(1).to_string())];

        match self.group_id {
            Some(group_id) => fields.push(("groupid", group_id.to_string())),
            None => {
                for artist in &self.artists {
                    fields.push(("artists[]", artist.name.clone()));
                    fields.push(("importance[]", artist.importance.to_string()));
                }
                fields.push(("title", self.title.clone()));
                fields.push(("year", self.year.to_string()));
                fields.push(("releasetype", self.release_type.to_string()));
                if !self.record_label.is_empty() {
                    fields.push(("record_label", self.record_label.clone()));
                }
                if !self.catalogue_number.is_empty() {
                    fields.push(("catalogue_number", self.catalogue_number.clone()));
                }
                fields.push(("tags", self.tags.join(",")));
                if let Some(image) = &self.image {
                    fields.push(("image", image.clone()));
                }
                fields.push(("album_desc", self.album_description.clone()));
            }
        }

        if self.edition.remastered {
            fields.push(("remaster", "1".to_string()));
            fields.push(("remaster_year", self.edition.year.to_string()));
            fields.push(("remaster_title", self.edition.title.clone()));
            fields.push(("remaster_record_label", self.edition.record_label.clone()));
            fields.push((
                "remaster_catalogue_number",
                self.edition.catalogue_number.clone(),
            ));
        }

        fields.push(("media", self.media.clone()));
        fields.push(("format", self.format.clone()));
        if KNOWN_BITRATES.contains(&self.encoding.as_str()) {
            fields.push(("bitrate", self.encoding.clone()));
        } else {
            fields.push(("bitrate", "Other".to_string()));
            fields.push(("other_bitrate", self.encoding.clone()));
        }
        if self.scene {
            fields.push(("scene", "1".to_string()));
        }
        fields.push(("release_desc", self.release_description.clone()));
        fields
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadResponse {
    pub torrent_id: u64,
    pub group_id: u64,
    pub url: String,
}

// Raw API shapes below.

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// `{"status": "success", "response": ...}` or `{"status": "failure", "error": ...}`
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope {
    pub status: String,
    #[serde(default)]
    pub response: serde_json::Value,
    #[serde(default)]
    pub error: Option<String>,
}

impl Envelope {
    pub fn into_result<T: serde::de::DeserializeOwned>(self) -> Result<T, ApiError> {
        if self.status != "success" {
            let message = self.error.unwrap_or_else(|| "unknown error".to_string());
            return Err(classify_failure(message));
        }
        serde_json::from_value(self.response).map_err(|e| ApiError::BadResponse(e.to_string()))
    }
}

/// Maps a tracker failure message onto an error kind, keeping the message.
pub(crate) fn classify_failure(message: String) -> ApiError {
    let lower = message.to_ascii_lowercase();
    if lower.contains("bad id parameter")
        || lower.contains("bad hash parameter")
        || lower.contains("bad parameters")
        || lower.contains("not found")
    {
        ApiError::NotFound(message)
    } else if lower.contains("bad credentials")
        || lower.contains("not logged in")
        || lower.contains("invalid token")
    {
        ApiError::Auth(message)
    } else {
        ApiError::Rejected(message)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawTorrentResponse {
    pub group: RawGroup,
    pub torrent: RawTorrent,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawGroup {
    pub id: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub year: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub record_label: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub catalogue_number: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub release_type: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub category_id: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub wiki_image: String,
    #[serde(default, alias = "wikiBBcode", deserialize_with = "null_as_default")]
    pub bb_body: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub music_info: Option<RawMusicInfo>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawArtist {
    pub name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawMusicInfo {
    #[serde(default, deserialize_with = "null_as_default")]
    pub artists: Vec<RawArtist>,
    #[serde(default, rename = "with", deserialize_with = "null_as_default")]
    pub guests: Vec<RawArtist>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub remixed_by: Vec<RawArtist>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub composers: Vec<RawArtist>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub conductor: Vec<RawArtist>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub dj: Vec<RawArtist>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub producer: Vec<RawArtist>,
}

impl RawMusicInfo {
    fn credits(self) -> Vec<ArtistCredit> {
        let roles = [
            (1, self.artists),
            (2, self.guests),
            (3, self.remixed_by),
            (4, self.composers),
            (5, self.conductor),
            (6, self.dj),
            (7, self.producer),
        ];
        roles
            .into_iter()
            .flat_map(|(importance, names)| {
                names.into_iter().map(move |a| ArtistCredit {
                    name: unescape_html(&a.name),
                    importance,
                })
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawTorrent {
    pub id: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub info_hash: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub media: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub format: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub encoding: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub remastered: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub remaster_year: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub remaster_title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub remaster_record_label: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub remaster_catalogue_number: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub scene: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub has_log: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub file_list: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub file_path: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub user_id: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub username: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawAccount {
    pub id: u64,
    pub username: String,
    pub passkey: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawUpload {
    #[serde(alias = "torrentId")]
    pub torrentid: u64,
    #[serde(alias = "groupId")]
    pub groupid: u64,
}
