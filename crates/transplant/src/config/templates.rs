use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::config::schema::DescriptionSettings;
use crate::tracker::Listing;

static RE_PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"%([a-z_]+)%").unwrap());

/// Values available to description templates.
#[derive(Debug, Clone, Default)]
pub struct TemplateVars {
    /// Source tracker id, e.g. `RED`.
    pub src_id: String,
    /// Source site url with a trailing slash.
    pub src_url: String,
    pub tor_id: String,
    pub gr_id: String,
    pub ori_upl: String,
    pub upl_id: String,
    pub src_descr: String,
}

impl TemplateVars {
    pub fn from_listing(listing: &Listing) -> Self {
        Self {
            src_id: listing.tracker.to_string(),
            src_url: format!("{}/", listing.tracker.site_url()),
            tor_id: listing.torrent_id.to_string(),
            gr_id: listing.group_id.to_string(),
            ori_upl: listing.uploader_name.clone(),
            upl_id: listing.uploader_id.to_string(),
            src_descr: listing.release_description.clone(),
        }
    }

    fn lookup(&self, name: &str) -> Option<&str> {
        let value = match name {
            "src_id" => &self.src_id,
            "src_url" => &self.src_url,
            "tor_id" => &self.tor_id,
            "gr_id" => &self.gr_id,
            "ori_upl" => &self.ori_upl,
            "upl_id" => &self.upl_id,
            "src_descr" => &self.src_descr,
            _ => return None,
        };
        Some(value.as_str())
    }
}

/// Substitutes `%name%` placeholders in one pass. Unknown placeholders are
/// kept, and substituted values are never expanded again.
pub fn render(template: &str, vars: &TemplateVars) -> String {
    RE_PLACEHOLDER
        .replace_all(template, |caps: &Captures| {
            vars.lookup(&caps[1])
                .map(str::to_string)
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

pub struct TemplateEngine<'a> {
    descriptions: &'a DescriptionSettings,
}

impl<'a> TemplateEngine<'a> {
    pub fn new(descriptions: &'a DescriptionSettings) -> Self {
        Self { descriptions }
    }

    /// Release description for the destination upload. `own_upload` selects
    /// the template for torrents the API account uploaded itself.
    pub fn release_description(&self, vars: &TemplateVars, own_upload: bool) -> String {
        let template = if own_upload {
            &self.descriptions.release_own
        } else {
            &self.descriptions.release
        };
        let mut description = render(template, vars);

        if self.descriptions.add_source && !vars.src_descr.trim().is_empty() {
            let source = render(&self.descriptions.source, vars);
            if !description.is_empty() {
                description.push_str("\n\n");
            }
            description.push_str(&source);
        }

        description
    }
}
