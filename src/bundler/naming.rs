//! Mod name validation and output file naming.

use super::{Error, Result};
use crate::checksum::{SIDECAR_EXTENSION, sidecar_path};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

/// A validated mod name, safe to embed in an output file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModName(String);

impl ModName {
    /// Validates a mod name.
    ///
    /// The name must be non-empty, must not contain path separators,
    /// whitespace or control characters, and must not be `.` or `..`.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let reason = if name.is_empty() {
            Some("name is empty")
        } else if name == "." || name == ".." {
            Some("name cannot be a relative path component")
        } else if name.contains(['/', '\\']) {
            Some("name cannot contain path separators")
        } else if name.chars().any(|c| c.is_whitespace() || c.is_control()) {
            Some("name cannot contain whitespace or control characters")
        } else {
            None
        };

        match reason {
            Some(reason) => Err(Error::InvalidModName { name, reason }),
            None => Ok(Self(name)),
        }
    }

    /// The name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// `<name>-<version>.<extension>`
pub fn output_file_name(name: &ModName, version: &str, extension: &str) -> String {
    format!("{name}-{version}.{extension}")
}

/// Full path of the build output inside `output_dir`.
pub fn output_path(output_dir: &Path, name: &ModName, version: &str, extension: &str) -> PathBuf {
    output_dir.join(output_file_name(name, version, extension))
}

/// Whether `file_name` looks like an output of this tool for `name`: a
/// package, its checksum sidecar, or an abandoned staging file.
pub(crate) fn is_build_output(name: &ModName, file_name: &str, extensions: &[&str]) -> bool {
    let package = format!("{name}-");
    let staging = format!(".{name}-");
    if file_name.starts_with(&staging) && file_name.ends_with(".partial") {
        return true;
    }
    if !file_name.starts_with(&package) {
        return false;
    }
    let file_name = file_name
        .strip_suffix(SIDECAR_EXTENSION)
        .and_then(|rest| rest.strip_suffix('.'))
        .unwrap_or(file_name);
    extensions
        .iter()
        .any(|ext| file_name.strip_suffix(ext).is_some_and(|rest| rest.ends_with('.')))
}

/// Removes a previous run's output at `path` and its checksum sidecar, so a
/// build that writes nothing cannot hand an old file to the next stage.
pub(crate) async fn remove_previous_output(path: &Path) -> Result<()> {
    for stale in [path.to_path_buf(), sidecar_path(path)] {
        match tokio::fs::remove_file(&stale).await {
            Ok(()) => log::debug!("Removed previous output {}", stale.display()),
            Err(error) if error.kind() == io::ErrorKind::NotFound => {}
            Err(error) => {
                return Err(Error::Fs {
                    context: "removing previous output",
                    path: stale,
                    error,
                });
            }
        }
    }
    Ok(())
}
