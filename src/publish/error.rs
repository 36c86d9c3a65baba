//! Error types for release publishing.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for publish operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while talking to a release host.
#[derive(Error, Debug)]
pub enum Error {
    /// Credential missing, invalid or lacking permission
    #[error("authentication failed ({status}): {message}")]
    Auth {
        /// HTTP status code
        status: u16,
        /// Message returned by the host
        message: String,
    },

    /// The host answered with an unexpected status
    #[error("{method} {url} returned {status}: {message}")]
    Api {
        /// HTTP method
        method: &'static str,
        /// Request URL
        url: String,
        /// HTTP status code
        status: u16,
        /// Message returned by the host
        message: String,
    },

    /// Transport failure
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The host's response could not be understood
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Bad host configuration
    #[error("invalid release host configuration: {0}")]
    Config(String),

    /// The release exists and updates are disabled
    #[error("release {tag} already exists and updates are not allowed")]
    ReleaseExists {
        /// Release tag
        tag: String,
    },

    /// An artifact no longer matches its recorded checksum
    #[error("{} changed after its checksum was recorded", path.display())]
    ChecksumMismatch {
        /// Sidecar that failed verification
        path: PathBuf,
    },

    /// Title/body template failed to render
    #[error("release template error: {0}")]
    Template(String),

    /// Local file failure
    #[error("{context} {}: {error}", path.display())]
    Fs {
        /// What was being done
        context: &'static str,
        /// Path involved
        path: PathBuf,
        /// Underlying error
        error: std::io::Error,
    },

    /// Release record (de)serialization failure
    #[error("release record error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether the failure is an authentication problem.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth { .. })
    }

    pub(crate) fn fs(context: &'static str, path: &std::path::Path, error: std::io::Error) -> Self {
        Self::Fs {
            context,
            path: path.to_path_buf(),
            error,
        }
    }
}
