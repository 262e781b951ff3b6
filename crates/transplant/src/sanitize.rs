//! Helpers for sanitizing data before it enters log lines and span attributes.
//!
//! Announce urls carry the user's passkey and torrent paths reveal the
//! directory layout, so neither is logged as is.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

static RE_ANNOUNCE_PASSKEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(https?://[^/]+/)[^/]+(/announce.*)$").unwrap());

/// Returns only the filename component of a path (no directory).
pub fn redact_path(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unknown>")
        .to_string()
}

/// Masks the passkey segment of an announce url.
///
/// - `https://flacsfor.me/abc123/announce` → `https://flacsfor.me/****/announce`
/// - anything that does not look like a passkey url is returned unchanged
pub fn redact_announce(url: &str) -> String {
    RE_ANNOUNCE_PASSKEY.replace(url, "${1}****${2}").into_owned()
}
