//! Version resolution from source control tags.
//!
//! A tag like `v1.2.3` (or the full ref `refs/tags/v1.2.3`) becomes the
//! version `1.2.3`, which names the build output and identifies the release.

use crate::error::{ReleaseError, Result};
use std::fmt;

const STAGE: &str = "resolve-version";

const TAG_REF_PREFIX: &str = "refs/tags/";

/// A tag together with the version derived from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedVersion {
    tag: String,
    version: String,
    semver: Option<semver::Version>,
}

impl ResolvedVersion {
    /// The tag the version was derived from (ref prefix removed).
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Normalized version string, e.g. `1.2.3`.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Parsed semantic version when the version is valid semver.
    pub fn semver(&self) -> Option<&semver::Version> {
        self.semver.as_ref()
    }
}

impl fmt::Display for ResolvedVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.version)
    }
}

/// Strips a leading `refs/tags/` from a full ref.
pub fn tag_from_ref(reference: &str) -> &str {
    reference.strip_prefix(TAG_REF_PREFIX).unwrap_or(reference)
}

/// Resolves a tag (or full tag ref) into its version.
///
/// # Errors
///
/// Returns [`ReleaseError::InvalidTagFormat`] when the tag is empty, lacks a
/// `v` prefix, has nothing after the prefix, or contains characters that
/// cannot appear in a version or file name.
pub fn resolve_version(raw: &str) -> Result<ResolvedVersion> {
    let tag = tag_from_ref(raw.trim());

    if tag.is_empty() {
        return Err(invalid(raw, "tag is empty"));
    }

    let Some(version) = tag.strip_prefix('v') else {
        return Err(invalid(raw, "tag must start with 'v'"));
    };

    if version.is_empty() {
        return Err(invalid(raw, "no version after the 'v' prefix"));
    }

    if !version.starts_with(|c: char| c.is_ascii_digit()) {
        return Err(invalid(raw, "version must start with a digit"));
    }

    if let Some(bad) = version
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '+' | '_')))
    {
        return Err(invalid(raw, &format!("illegal character {bad:?} in version")));
    }

    let semver = semver::Version::parse(version).ok();
    if semver.is_none() {
        log::debug!("Version '{}' is not valid semver, using it verbatim", version);
    }

    Ok(ResolvedVersion {
        tag: tag.to_string(),
        version: version.to_string(),
        semver,
    })
}

fn invalid(tag: &str, reason: &str) -> ReleaseError {
    ReleaseError::InvalidTagFormat {
        stage: STAGE,
        tag: tag.to_string(),
        reason: reason.to_string(),
    }
}
