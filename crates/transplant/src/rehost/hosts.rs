use std::time::Duration;

use reqwest::blocking::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;

use super::error::RehostError;
use super::HostKind;

const UPLOAD_TIMEOUT: Duration = Duration::from_secs(60);

/// Something that can copy an image from a link onto itself.
pub trait ImageHost: Send + Sync {
    fn kind(&self) -> HostKind;

    /// Returns the new image url.
    fn upload(&self, link: &str, credential: Option<&SecretString>) -> Result<String, RehostError>;
}

/// Form-POST image host. The hosts differ only in field names and response shape.
pub struct HttpImageHost {
    kind: HostKind,
    endpoint: String,
    http: Client,
}

impl HttpImageHost {
    pub fn new(kind: HostKind) -> Result<Self, RehostError> {
        Self::with_endpoint(kind, kind.endpoint())
    }

    pub fn with_endpoint(kind: HostKind, endpoint: impl Into<String>) -> Result<Self, RehostError> {
        let http = Client::builder()
            .timeout(UPLOAD_TIMEOUT)
            .build()
            .map_err(|e| RehostError::Client(e.to_string()))?;
        Ok(Self {
            kind,
            endpoint: endpoint.into(),
            http,
        })
    }
}

fn form_fields(kind: HostKind, link: &str, key: &str) -> [(&'static str, String); 2] {
    match kind {
        HostKind::Ra => [("api_key", key.to_string()), ("link", link.to_string())],
        HostKind::PtpImg => [("api_key", key.to_string()), ("link-upload", link.to_string())],
        HostKind::ImgBb => [("key", key.to_string()), ("image", link.to_string())],
    }
}

/// Pulls the rehosted url out of a host's JSON answer.
pub(crate) fn parse_response(kind: HostKind, json: &Value) -> Result<String, RehostError> {
    let url = match kind {
        HostKind::Ra => json.get("link").and_then(Value::as_str).map(str::to_string),
        HostKind::PtpImg => json.get(0).and_then(|first| {
            let code = first.get("code")?.as_str()?;
            let ext = first.get("ext")?.as_str()?;
            Some(format!("https://ptpimg.me/{}.{}", code, ext))
        }),
        HostKind::ImgBb => json
            .get("data")
            .and_then(|d| d.get("url"))
            .and_then(Value::as_str)
            .map(str::to_string),
    };
    url.filter(|u| !u.is_empty())
        .ok_or_else(|| RehostError::BadResponse {
            host: kind,
            message: "no image url in response".to_string(),
        })
}

impl ImageHost for HttpImageHost {
    fn kind(&self) -> HostKind {
        self.kind
    }

    fn upload(&self, link: &str, credential: Option<&SecretString>) -> Result<String, RehostError> {
        let key = credential.ok_or(RehostError::MissingCredential(self.kind))?;
        let network = |e: reqwest::Error| RehostError::Network {
            host: self.kind,
            message: e.without_url().to_string(),
        };

        let response = self
            .http
            .post(&self.endpoint)
            .form(&form_fields(self.kind, link, key.expose_secret()))
            .send()
            .map_err(network)?
            .error_for_status()
            .map_err(network)?;

        let json: Value = response.json().map_err(|e| RehostError::BadResponse {
            host: self.kind,
            message: e.to_string(),
        })?;
        parse_response(self.kind, &json)
    }
}
