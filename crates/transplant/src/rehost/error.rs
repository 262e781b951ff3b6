use thiserror::Error;

use super::HostKind;

#[derive(Error, Debug)]
pub enum RehostError {
    #[error("{0} needs an API key")]
    MissingCredential(HostKind),

    #[error("{host} request failed: {message}")]
    Network { host: HostKind, message: String },

    #[error("{host} returned an unexpected response: {message}")]
    BadResponse { host: HostKind, message: String },

    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}
