//! Error types for build backends.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type alias for build operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while producing a build output.
#[derive(Error, Debug)]
pub enum Error {
    /// Free-form failure
    #[error("{0}")]
    GenericError(String),

    /// Bare IO failure
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// IO failure with the operation and path it happened on
    #[error("{context} {}: {error}", path.display())]
    Fs {
        /// What was being done
        context: &'static str,
        /// Path involved
        path: PathBuf,
        /// Underlying error
        error: std::io::Error,
    },

    /// The build tool could not be started
    #[error("failed to run `{command}`: {error}")]
    CommandFailed {
        /// Command that failed
        command: String,
        /// Underlying error
        error: std::io::Error,
    },

    /// The build tool ran and reported failure
    #[error("`{command}` exited with {status}\n{stderr}")]
    CommandExit {
        /// Command that failed
        command: String,
        /// Exit status description
        status: String,
        /// Captured stderr tail
        stderr: String,
    },

    /// The build tool is not installed
    #[error("build tool `{tool}` not found in PATH: {reason}")]
    ToolNotFound {
        /// Tool name
        tool: String,
        /// Lookup failure
        reason: String,
    },

    /// The mod name cannot be used in an output file name
    #[error("invalid mod name {name:?}: {reason}")]
    InvalidModName {
        /// Name as given
        name: String,
        /// Reason for the error
        reason: &'static str,
    },

    /// An exclude pattern failed to compile
    #[error("invalid exclude pattern {pattern:?}: {error}")]
    Pattern {
        /// Pattern as given
        pattern: String,
        /// Compile error
        error: glob::PatternError,
    },

    /// Zip writer failure
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Directory traversal failure
    #[error("walking source directory: {0}")]
    WalkDir(#[from] walkdir::Error),

    /// A blocking build task panicked or was cancelled
    #[error("build task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Attaches the operation and path to IO errors.
pub trait ErrorExt<T> {
    /// Wraps an IO error as [`Error::Fs`].
    fn fs_context(self, context: &'static str, path: &Path) -> Result<T>;
}

impl<T> ErrorExt<T> for std::result::Result<T, std::io::Error> {
    fn fs_context(self, context: &'static str, path: &Path) -> Result<T> {
        self.map_err(|error| Error::Fs {
            context,
            path: path.to_path_buf(),
            error,
        })
    }
}

/// Returns early with a [`Error::GenericError`] built from a format string.
#[macro_export]
macro_rules! bail {
    ($($arg:tt)*) => {
        return Err($crate::bundler::Error::GenericError(format!($($arg)*)))
    };
}
