//! Release publishing.
//!
//! [`Publisher`] attaches the build output and its checksum sidecar to the
//! release for a tag. Hosts implement [`ReleaseHost`]:
//!
//! - [`GitHubHost`] - GitHub REST API
//! - [`DirectoryHost`] - a local directory tree, for offline runs
//!
//! Publishing is idempotent per tag: a same-named asset is replaced, other
//! assets are left alone, and an existing release keeps its title and body.

mod directory;
mod error;
mod github;
mod notes;

pub use directory::DirectoryHost;
pub use error::{Error, Result};
pub use github::{DEFAULT_API_URL, GitHubHost};
pub use notes::{DEFAULT_BODY_TEMPLATE, DEFAULT_TITLE_TEMPLATE, ReleaseNotes};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::{Path, PathBuf};

/// An asset attached to a release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseAsset {
    /// Host-assigned id
    pub id: u64,
    /// File name
    pub name: String,
    /// Size in bytes
    pub size: u64,
}

/// A release as known by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    /// Host-assigned id
    pub id: u64,
    /// Tag the release is keyed by
    pub tag: String,
    /// Title
    pub name: Option<String>,
    /// Description
    pub body: Option<String>,
    /// Prerelease flag
    pub prerelease: bool,
    /// Creation time, when the host reports it
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Attached assets
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
    /// Asset upload endpoint, for hosts that use one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_url: Option<String>,
}

impl Release {
    /// Finds an attached asset by file name.
    pub fn asset(&self, name: &str) -> Option<&ReleaseAsset> {
        self.assets.iter().find(|asset| asset.name == name)
    }
}

/// Fields for a release that does not exist yet.
#[derive(Debug, Clone)]
pub struct NewRelease<'a> {
    /// Tag to create the release for
    pub tag: &'a str,
    /// Title
    pub name: &'a str,
    /// Description
    pub body: &'a str,
    /// Prerelease flag
    pub prerelease: bool,
}

/// A release platform that accepts artifacts for a tag.
///
/// The credential, if any, belongs to the host instance.
pub trait ReleaseHost {
    /// Looks up the release for `tag`.
    fn find_release(&self, tag: &str) -> impl Future<Output = Result<Option<Release>>> + Send;

    /// Creates a release.
    fn create_release(&self, release: &NewRelease<'_>) -> impl Future<Output = Result<Release>> + Send;

    /// Replaces the title and/or body of an existing release.
    fn update_release(
        &self,
        release: &Release,
        name: Option<&str>,
        body: Option<&str>,
    ) -> impl Future<Output = Result<Release>> + Send;

    /// Removes an asset from a release.
    fn delete_asset(&self, release: &Release, asset: &ReleaseAsset) -> impl Future<Output = Result<()>> + Send;

    /// Uploads `file` as an asset named `name`.
    fn upload_asset(
        &self,
        release: &Release,
        name: &str,
        file: &Path,
    ) -> impl Future<Output = Result<ReleaseAsset>> + Send;
}

/// Release host chosen at runtime.
#[derive(Debug)]
pub enum HostBackend {
    /// GitHub Releases
    GitHub(GitHubHost),
    /// Local directory
    Directory(DirectoryHost),
}

impl ReleaseHost for HostBackend {
    async fn find_release(&self, tag: &str) -> Result<Option<Release>> {
        match self {
            Self::GitHub(host) => host.find_release(tag).await,
            Self::Directory(host) => host.find_release(tag).await,
        }
    }

    async fn create_release(&self, release: &NewRelease<'_>) -> Result<Release> {
        match self {
            Self::GitHub(host) => host.create_release(release).await,
            Self::Directory(host) => host.create_release(release).await,
        }
    }

    async fn update_release(&self, release: &Release, name: Option<&str>, body: Option<&str>) -> Result<Release> {
        match self {
            Self::GitHub(host) => host.update_release(release, name, body).await,
            Self::Directory(host) => host.update_release(release, name, body).await,
        }
    }

    async fn delete_asset(&self, release: &Release, asset: &ReleaseAsset) -> Result<()> {
        match self {
            Self::GitHub(host) => host.delete_asset(release, asset).await,
            Self::Directory(host) => host.delete_asset(release, asset).await,
        }
    }

    async fn upload_asset(&self, release: &Release, name: &str, file: &Path) -> Result<ReleaseAsset> {
        match self {
            Self::GitHub(host) => host.upload_asset(release, name, file).await,
            Self::Directory(host) => host.upload_asset(release, name, file).await,
        }
    }
}

/// What to publish, mirroring the release contract of the CI step this tool
/// replaces.
#[derive(Debug, Clone)]
pub struct ReleaseRequest {
    /// Release tag
    pub tag: String,
    /// Title for a newly created release
    pub name: String,
    /// Body for a newly created release
    pub body: String,
    /// Files to attach
    pub artifacts: Vec<PathBuf>,
    /// Whether an existing release may receive the artifacts
    pub allow_updates: bool,
    /// Prerelease flag for a newly created release
    pub prerelease: bool,
    /// Keep the existing title when updating
    pub omit_name_during_update: bool,
    /// Keep the existing body when updating
    pub omit_body_during_update: bool,
}

impl ReleaseRequest {
    /// A request with the defaults used for tag releases: updates allowed,
    /// not a prerelease, existing title and body preserved.
    pub fn new(tag: impl Into<String>, name: String, body: String, artifacts: Vec<PathBuf>) -> Self {
        Self {
            tag: tag.into(),
            name,
            body,
            artifacts,
            allow_updates: true,
            prerelease: false,
            omit_name_during_update: true,
            omit_body_during_update: true,
        }
    }
}

/// Result of a successful publish.
#[derive(Debug, Clone)]
pub struct PublishOutcome {
    /// Final release state
    pub release: Release,
    /// Whether the release was created by this run
    pub created: bool,
    /// Assets uploaded by this run
    pub uploaded: Vec<ReleaseAsset>,
    /// Names of same-named assets that were replaced
    pub replaced: Vec<String>,
}

/// Publishes artifacts to a [`ReleaseHost`].
#[derive(Debug)]
pub struct Publisher<H> {
    host: H,
}

impl<H: ReleaseHost> Publisher<H> {
    /// Creates a publisher for `host`.
    pub fn new(host: H) -> Self {
        Self { host }
    }

    /// The underlying host.
    pub fn host(&self) -> &H {
        &self.host
    }

    /// Creates or updates the release for `request.tag` and attaches the
    /// artifacts.
    ///
    /// Not retried: a failure part-way leaves already uploaded assets in
    /// place, and a re-run replaces them.
    pub async fn publish(&self, request: &ReleaseRequest) -> Result<PublishOutcome> {
        let artifacts = request
            .artifacts
            .iter()
            .map(|path| {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .ok_or_else(|| Error::Config(format!("artifact has no file name: {}", path.display())))?;
                Ok((name, path.as_path()))
            })
            .collect::<Result<Vec<_>>>()?;

        let (mut release, created) = match self.host.find_release(&request.tag).await? {
            Some(existing) if !request.allow_updates => {
                log::debug!("Release {} exists (id {})", existing.tag, existing.id);
                return Err(Error::ReleaseExists {
                    tag: request.tag.clone(),
                });
            }
            Some(existing) => {
                log::info!("Updating existing release {}", existing.tag);
                let name = (!request.omit_name_during_update).then_some(request.name.as_str());
                let body = (!request.omit_body_during_update).then_some(request.body.as_str());
                let release = if name.is_some() || body.is_some() {
                    self.host.update_release(&existing, name, body).await?
                } else {
                    existing
                };
                (release, false)
            }
            None => {
                log::info!("Creating release {}", request.tag);
                let release = self
                    .host
                    .create_release(&NewRelease {
                        tag: &request.tag,
                        name: &request.name,
                        body: &request.body,
                        prerelease: request.prerelease,
                    })
                    .await?;
                (release, true)
            }
        };

        let mut uploaded = Vec::with_capacity(artifacts.len());
        let mut replaced = Vec::new();
        for (name, path) in artifacts {
            if let Some(existing) = release.asset(&name).cloned() {
                log::info!("Replacing existing asset {}", name);
                self.host.delete_asset(&release, &existing).await?;
                release.assets.retain(|asset| asset.id != existing.id);
                replaced.push(name.clone());
            }

            log::info!("Uploading {}", name);
            let asset = self.host.upload_asset(&release, &name, path).await?;
            release.assets.push(asset.clone());
            uploaded.push(asset);
        }

        Ok(PublishOutcome {
            release,
            created,
            uploaded,
            replaced,
        })
    }
}
