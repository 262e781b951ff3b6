use std::sync::{Arc, LazyLock};

use regex::{Captures, Regex};
use secrecy::SecretString;
use tracing::{debug, info, warn};

use super::error::RehostError;
use super::hosts::{HttpImageHost, ImageHost};
use crate::config::schema::RehostSettings;

static RE_IMG_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\[img\]\s*(\S+?)\s*\[/img\]|\[img=(\S+?)\]").unwrap());

/// One configured backend.
pub struct RehostEntry {
    pub host: Arc<dyn ImageHost>,
    pub enabled: bool,
    pub credential: Option<SecretString>,
    pub priority: u32,
}

/// Enabled-or-not image hosts in the order they are tried.
pub struct RehostChain {
    entries: Vec<RehostEntry>,
    whitelist: Vec<String>,
}

impl RehostChain {
    /// Orders entries by priority; equal priorities keep their given order.
    pub fn new(mut entries: Vec<RehostEntry>, whitelist: Vec<String>) -> Self {
        entries.sort_by_key(|e| e.priority);
        Self { entries, whitelist }
    }

    pub fn from_settings(settings: &RehostSettings) -> Result<Self, RehostError> {
        let entries = settings
            .backends
            .iter()
            .map(|backend| -> Result<RehostEntry, RehostError> {
                let key = backend.key.trim();
                Ok(RehostEntry {
                    host: Arc::new(HttpImageHost::new(backend.host)?) as Arc<dyn ImageHost>,
                    enabled: backend.enabled,
                    credential: (!key.is_empty()).then(|| SecretString::from(key.to_string())),
                    priority: backend.priority,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(entries, settings.whitelist.clone()))
    }

    pub fn has_enabled_hosts(&self) -> bool {
        self.entries.iter().any(|e| e.enabled)
    }

    pub fn whitelist(&self) -> &[String] {
        &self.whitelist
    }

    /// Tries each enabled host once, lowest priority first. `None` when every
    /// host failed or none is enabled.
    pub fn rehost(&self, link: &str) -> Option<String> {
        for entry in self.entries.iter().filter(|e| e.enabled) {
            let kind = entry.host.kind();
            match entry.host.upload(link, entry.credential.as_ref()) {
                Ok(url) => {
                    info!(host = %kind, "Rehosted image");
                    return Some(url);
                }
                Err(e) => debug!(host = %kind, error = %e, "Image host failed, trying next"),
            }
        }
        warn!("Could not rehost image {}", link);
        None
    }

    /// Rehosts every `[img]` link in a BBCode text whose host is not whitelisted.
    /// Links that fail to rehost are left unchanged.
    pub fn rehost_description(&self, text: &str) -> String {
        RE_IMG_TAG
            .replace_all(text, |caps: &Captures| {
                let whole = &caps[0];
                let link = match caps.get(1).or_else(|| caps.get(2)) {
                    Some(m) => m.as_str(),
                    None => return whole.to_string(),
                };
                if !needs_rehost(link, &self.whitelist) {
                    return whole.to_string();
                }
                match self.rehost(link) {
                    Some(new_link) => whole.replace(link, &new_link),
                    None => whole.to_string(),
                }
            })
            .into_owned()
    }
}

/// True when `link` is a web url whose host is neither a whitelisted domain
/// nor a subdomain of one.
pub fn needs_rehost(link: &str, whitelist: &[String]) -> bool {
    let host = match reqwest::Url::parse(link.trim()) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => match url.host_str() {
            Some(host) => host.to_ascii_lowercase(),
            None => return false,
        },
        _ => return false,
    };
    !whitelist.iter().any(|allowed| {
        let allowed = allowed.trim().to_ascii_lowercase();
        !allowed.is_empty() && (host == allowed || host.ends_with(&format!(".{}", allowed)))
    })
}
