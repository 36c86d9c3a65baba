//! Build backends producing the mod archive.
//!
//! The pipeline only knows the [`ModBuilder`] capability: given a mod name
//! and a version, produce `<output>/<name>-<version>.<ext>` and return its
//! path. Two backends implement it:
//!
//! - [`ArchiveBuilder`] - packages a source directory as zip or tar.gz
//! - [`CommandBuilder`] - runs an external build tool
//!
//! [`BuildBackend`] selects one of them from configuration.

mod archive;
mod command;
pub mod error;
mod naming;

pub use archive::{ArchiveBuilder, ArchiveFormat};
pub use command::CommandBuilder;
pub use error::{Error, Result};
pub use naming::{ModName, output_file_name, output_path};

use crate::version::ResolvedVersion;
use std::future::Future;
use std::path::PathBuf;

/// Capability to build a mod archive for a given version.
///
/// On success the returned path names the produced file. Implementations do
/// not retry; any failure is final for the run.
pub trait ModBuilder {
    /// Builds `name` at `version` and returns the output path.
    fn build(
        &self,
        name: &ModName,
        version: &ResolvedVersion,
    ) -> impl Future<Output = Result<PathBuf>> + Send;
}

/// Build backend chosen at runtime.
#[derive(Debug, Clone)]
pub enum BuildBackend {
    /// Package a directory natively
    Archive(ArchiveBuilder),
    /// Run an external command
    Command(CommandBuilder),
}

impl ModBuilder for BuildBackend {
    async fn build(&self, name: &ModName, version: &ResolvedVersion) -> Result<PathBuf> {
        match self {
            Self::Archive(builder) => builder.build(name, version).await,
            Self::Command(builder) => builder.build(name, version).await,
        }
    }
}
