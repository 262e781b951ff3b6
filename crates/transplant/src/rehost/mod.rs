//! Image rehosting: moves cover and description images to hosts the
//! destination tracker accepts.

pub mod chain;
pub mod error;
pub mod hosts;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use chain::{needs_rehost, RehostChain, RehostEntry};
pub use error::RehostError;
pub use hosts::{HttpImageHost, ImageHost};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostKind {
    Ra,
    PtpImg,
    ImgBb,
}

impl HostKind {
    pub fn endpoint(self) -> &'static str {
        match self {
            HostKind::Ra => "https://thesungod.xyz/api/image/rehost_new",
            HostKind::PtpImg => "https://ptpimg.me/upload.php",
            HostKind::ImgBb => "https://api.imgbb.com/1/upload",
        }
    }
}

impl fmt::Display for HostKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HostKind::Ra => "Ra",
            HostKind::PtpImg => "PTPimg",
            HostKind::ImgBb => "ImgBB",
        })
    }
}
