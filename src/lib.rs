//! Tag-driven mod packaging and release publishing.
//!
//! A release run turns a version tag into a published release in four
//! stages:
//!
//! - [`version`]: derive the version from a `v*` tag
//! - [`bundler`]: package the mod into `output/<name>-<version>.<ext>`
//! - [`checksum`]: write a SHA-256 sidecar next to the package
//! - [`publish`]: attach both files to the release for the tag
//!
//! [`pipeline::Pipeline`] sequences the stages; [`cli`] wires it to the
//! command line. It can be used both as a CLI tool and as a library dependency.

pub mod bundler;
pub mod checksum;
pub mod cli;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod publish;
pub mod version;

// Re-export commonly used types
pub use error::{ConfigError, ReleaseError, Result};
pub use pipeline::{Pipeline, RunReport, Stage};
pub use version::{ResolvedVersion, resolve_version};
