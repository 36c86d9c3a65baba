//! Error types for release pipeline operations.
//!
//! Every stage failure maps to one variant of [`ReleaseError`] carrying the
//! stage name and the underlying tool output, with recovery suggestions for
//! the human re-triggering the pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for release operations
pub type Result<T> = std::result::Result<T, ReleaseError>;

/// Main error type for all release operations
#[derive(Error, Debug)]
pub enum ReleaseError {
    /// The tag could not be turned into a version
    #[error("[{stage}] invalid tag format '{tag}': {reason}")]
    InvalidTagFormat {
        /// Stage that failed
        stage: &'static str,
        /// Tag as received
        tag: String,
        /// Reason for the error
        reason: String,
    },

    /// The build backend failed
    #[error("[{stage}] build failed: {source}")]
    BuildFailed {
        /// Stage that failed
        stage: &'static str,
        /// Underlying bundler error
        #[source]
        source: crate::bundler::Error,
    },

    /// A file the pipeline depends on does not exist
    #[error("[{stage}] file not found: {}", path.display())]
    FileNotFound {
        /// Stage that failed
        stage: &'static str,
        /// Missing path
        path: PathBuf,
    },

    /// The release host rejected or could not be reached
    #[error("[{stage}] publish failed: {source}")]
    PublishFailed {
        /// Stage that failed
        stage: &'static str,
        /// Underlying publish error
        #[source]
        source: crate::publish::Error,
    },

    /// Configuration or argument errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO errors outside of a specific stage contract
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Invalid argument or config value
    #[error("Invalid arguments: {reason}")]
    InvalidArguments {
        /// Reason for the error
        reason: String,
    },

    /// Missing required argument
    #[error("Missing required argument: {argument}")]
    MissingArgument {
        /// Argument name
        argument: String,
    },

    /// Config file could not be read or parsed
    #[error("Failed to load {}: {reason}", path.display())]
    File {
        /// Config file path
        path: PathBuf,
        /// Reason for the error
        reason: String,
    },
}

impl ReleaseError {
    /// Name of the pipeline stage this error belongs to, if any
    pub fn stage(&self) -> Option<&'static str> {
        match self {
            Self::InvalidTagFormat { stage, .. }
            | Self::BuildFailed { stage, .. }
            | Self::FileNotFound { stage, .. }
            | Self::PublishFailed { stage, .. } => Some(stage),
            Self::Config(_) | Self::Io(_) => None,
        }
    }

    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 2,
            _ => 1,
        }
    }

    /// Get actionable recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            Self::InvalidTagFormat { .. } => vec![
                "Push a tag of the form vX.Y.Z (for example v1.2.3)".to_string(),
                "Delete the malformed tag so it does not trigger again".to_string(),
            ],
            Self::BuildFailed { .. } => vec![
                "Check the build output above for the failing step".to_string(),
                "Re-run the pipeline for the same tag after fixing the cause".to_string(),
            ],
            Self::FileNotFound { .. } => vec![
                "The build backend reported success without writing its output file".to_string(),
                "Verify the build command writes to $MOD_OUTPUT_FILE".to_string(),
            ],
            Self::PublishFailed { source, .. } if source.is_auth() => vec![
                "Check that the token is set and has contents:write permission".to_string(),
            ],
            Self::PublishFailed { .. } => vec![
                "Re-run the pipeline; re-uploading the same tag overwrites existing assets"
                    .to_string(),
            ],
            Self::Config(_) => vec!["Run with --help to see required arguments".to_string()],
            Self::Io(_) => vec!["Check the error message above for specific details".to_string()],
        }
    }
}
