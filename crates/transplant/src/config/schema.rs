use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::rehost::HostKind;
use crate::tracker::Tracker;

/// Placeholder that the source description template must contain.
pub const SOURCE_DESCRIPTION_MARKER: &str = "%src_descr%";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub version: String,
    #[serde(default)]
    pub api_keys: ApiKeys,
    #[serde(default = "default_source")]
    pub default_source: Tracker,
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    /// Search the whole data directory tree for content instead of only its top level.
    #[serde(default)]
    pub deep_search: bool,
    #[serde(default)]
    pub scan_dir: Option<PathBuf>,
    #[serde(default)]
    pub torrent_save_dir: Option<PathBuf>,
    #[serde(default)]
    pub save_torrents: bool,
    #[serde(default)]
    pub delete_scanned: bool,
    #[serde(default = "default_true")]
    pub file_check: bool,
    #[serde(default)]
    pub post_compare: bool,
    #[serde(default)]
    pub descriptions: DescriptionSettings,
    #[serde(default)]
    pub rehost: RehostSettings,
}

fn default_source() -> Tracker {
    Tracker::Red
}

fn default_true() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            api_keys: ApiKeys::default(),
            default_source: default_source(),
            data_dir: None,
            deep_search: false,
            scan_dir: None,
            torrent_save_dir: None,
            save_torrents: false,
            delete_scanned: false,
            file_check: true,
            post_compare: false,
            descriptions: DescriptionSettings::default(),
            rehost: RehostSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiKeys {
    #[serde(default)]
    pub red: String,
    #[serde(default)]
    pub ops: String,
}

impl ApiKeys {
    pub fn get(&self, tracker: Tracker) -> &str {
        match tracker {
            Tracker::Red => &self.red,
            Tracker::Ops => &self.ops,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescriptionSettings {
    #[serde(default = "default_release_template")]
    pub release: String,
    /// Used instead of `release` when the source uploader is the API key's own account.
    #[serde(default = "default_release_own_template")]
    pub release_own: String,
    #[serde(default = "default_true")]
    pub add_source: bool,
    #[serde(default = "default_source_template")]
    pub source: String,
}

fn default_release_template() -> String {
    "Transplanted from [url=%src_url%torrents.php?torrentid=%tor_id%]%src_id%[/url], \
     thanks to the original uploader [url=%src_url%user.php?id=%upl_id%]%ori_upl%[/url]."
        .to_string()
}

fn default_release_own_template() -> String {
    "Transplanted from [url=%src_url%torrents.php?torrentid=%tor_id%]%src_id%[/url].".to_string()
}

fn default_source_template() -> String {
    "[hide=source description][quote]%src_descr%[/quote][/hide]".to_string()
}

impl Default for DescriptionSettings {
    fn default() -> Self {
        Self {
            release: default_release_template(),
            release_own: default_release_own_template(),
            add_source: true,
            source: default_source_template(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RehostSettings {
    #[serde(default)]
    pub enabled: bool,
    /// Image hosts whose links are kept as they are.
    #[serde(default = "default_whitelist")]
    pub whitelist: Vec<String>,
    #[serde(default = "default_backends")]
    pub backends: Vec<BackendSettings>,
}

fn default_whitelist() -> Vec<String> {
    vec!["ptpimg.me".to_string(), "thesungod.xyz".to_string()]
}

fn default_backends() -> Vec<BackendSettings> {
    [HostKind::Ra, HostKind::PtpImg, HostKind::ImgBb]
        .into_iter()
        .enumerate()
        .map(|(i, host)| BackendSettings {
            host,
            enabled: false,
            key: String::new(),
            priority: i as u32,
        })
        .collect()
}

impl Default for RehostSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            whitelist: default_whitelist(),
            backends: default_backends(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendSettings {
    pub host: HostKind,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub key: String,
    /// Lower is tried first.
    #[serde(default)]
    pub priority: u32,
}

impl Settings {
    pub fn api_key(&self, tracker: Tracker) -> &str {
        self.api_keys.get(tracker)
    }

    /// Checks everything a batch run depends on and reports all problems at once.
    pub fn check_ready(&self) -> Result<(), ConfigError> {
        let mut problems = Vec::new();

        for tracker in Tracker::ALL {
            let key = self.api_key(tracker);
            if key.is_empty() {
                problems.push(format!("API key for {} is missing", tracker));
            } else if key.trim() != key {
                problems.push(format!(
                    "API key for {} has leading or trailing whitespace",
                    tracker
                ));
            }
        }

        match &self.data_dir {
            None => problems.push("data directory is not set".to_string()),
            Some(dir) if !dir.is_dir() => problems.push(format!(
                "data directory '{}' does not exist",
                dir.display()
            )),
            Some(_) => {}
        }

        if let Some(dir) = &self.scan_dir {
            if !dir.is_dir() {
                problems.push(format!("scan directory '{}' does not exist", dir.display()));
            }
        }

        if self.save_torrents {
            match self.torrent_save_dir.as_deref() {
                Some(dir) if dir.is_dir() => {}
                Some(dir) => problems.push(format!(
                    "torrent save directory '{}' does not exist",
                    dir.display()
                )),
                None => problems
                    .push("saving torrents is enabled but no save directory is set".to_string()),
            }
        }

        if self.rehost.enabled {
            let usable = self
                .rehost
                .backends
                .iter()
                .any(|b| b.enabled && !b.key.trim().is_empty());
            if !usable {
                problems.push(
                    "image rehosting is enabled but no enabled host has an API key".to_string(),
                );
            }
            for backend in &self.rehost.backends {
                if !backend.key.is_empty() && backend.key.trim() != backend.key {
                    problems.push(format!(
                        "API key for image host {} has leading or trailing whitespace",
                        backend.host
                    ));
                }
            }
        }

        if self.descriptions.add_source
            && !self
                .descriptions
                .source
                .contains(SOURCE_DESCRIPTION_MARKER)
        {
            problems.push(format!(
                "source description template must contain {}",
                SOURCE_DESCRIPTION_MARKER
            ));
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::NotReady { problems })
        }
    }

    /// Directory that holds the content of downloaded torrents.
    pub fn data_dir(&self) -> Option<&Path> {
        self.data_dir.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn ready_settings(dir: &Path) -> Settings {
        Settings {
            api_keys: ApiKeys {
                red: "red-key".to_string(),
                ops: "ops-key".to_string(),
            },
            data_dir: Some(dir.to_path_buf()),
            ..Settings::default()
        }
    }

    fn problems(settings: &Settings) -> Vec<String> {
        match settings.check_ready() {
            Ok(()) => vec![],
            Err(ConfigError::NotReady { problems }) => problems,
            Err(other) => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_defaults_are_consistent() {
        let settings = Settings::default();
        assert!(settings.file_check);
        assert!(settings.descriptions.add_source);
        assert!(settings
            .descriptions
            .source
            .contains(SOURCE_DESCRIPTION_MARKER));
        assert_eq!(settings.rehost.backends.len(), 3);
    }

    #[test]
    fn test_ready_settings_pass() {
        let temp = TempDir::new().unwrap();
        assert!(problems(&ready_settings(temp.path())).is_empty());
    }

    #[test]
    fn test_all_problems_are_collected() {
        let settings = Settings {
            api_keys: ApiKeys {
                red: " padded".to_string(),
                ops: String::new(),
            },
            data_dir: Some(PathBuf::from("/definitely/not/here")),
            scan_dir: Some(PathBuf::from("/also/not/here")),
            save_torrents: true,
            ..Settings::default()
        };
        let found = problems(&settings);
        assert_eq!(found.len(), 5, "{:?}", found);
        assert!(found.iter().any(|p| p.contains("RED") && p.contains("whitespace")));
        assert!(found.iter().any(|p| p.contains("OPS") && p.contains("missing")));
    }

    #[test]
    fn test_missing_source_marker() {
        let temp = TempDir::new().unwrap();
        let mut settings = ready_settings(temp.path());
        settings.descriptions.source = "no marker here".to_string();
        assert_eq!(problems(&settings).len(), 1);

        settings.descriptions.add_source = false;
        assert!(problems(&settings).is_empty());
    }

    #[test]
    fn test_rehost_needs_a_keyed_backend() {
        let temp = TempDir::new().unwrap();
        let mut settings = ready_settings(temp.path());
        settings.rehost.enabled = true;
        settings.rehost.backends[1].enabled = true;
        assert_eq!(problems(&settings).len(), 1);

        settings.rehost.backends[1].key = "ptpimg-key".to_string();
        assert!(problems(&settings).is_empty());
    }
}
