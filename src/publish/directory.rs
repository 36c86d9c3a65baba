//! Local directory release host.
//!
//! Mirrors release semantics on disk:
//!
//! ```text
//! <root>/<tag>/release.json
//! <root>/<tag>/assets/<asset-name>
//! ```

use super::{Error, NewRelease, Release, ReleaseAsset, ReleaseHost, Result};
use std::io;
use std::path::{Path, PathBuf};

const RECORD_FILE: &str = "release.json";
const ASSETS_DIR: &str = "assets";

/// Publishes releases into a directory tree.
#[derive(Debug, Clone)]
pub struct DirectoryHost {
    root: PathBuf,
}

impl DirectoryHost {
    /// Creates a host rooted at `root`; the directory is created on first use.
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn release_dir(&self, tag: &str) -> PathBuf {
        self.root.join(tag)
    }

    fn record_path(&self, tag: &str) -> PathBuf {
        self.release_dir(tag).join(RECORD_FILE)
    }

    /// Path an asset of `release` is stored at.
    pub fn asset_path(&self, tag: &str, name: &str) -> PathBuf {
        self.release_dir(tag).join(ASSETS_DIR).join(name)
    }

    async fn load(&self, tag: &str) -> Result<Option<Release>> {
        let path = self.record_path(tag);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::fs("reading release record", &path, e)),
        }
    }

    async fn save(&self, release: &Release) -> Result<()> {
        let dir = self.release_dir(&release.tag);
        tokio::fs::create_dir_all(dir.join(ASSETS_DIR))
            .await
            .map_err(|e| Error::fs("creating release directory", &dir, e))?;

        let path = self.record_path(&release.tag);
        let json = serde_json::to_vec_pretty(release)?;
        tokio::fs::write(&path, json)
            .await
            .map_err(|e| Error::fs("writing release record", &path, e))
    }

    async fn load_existing(&self, tag: &str) -> Result<Release> {
        self.load(tag)
            .await?
            .ok_or_else(|| Error::InvalidResponse(format!("release {tag} disappeared")))
    }
}

fn validate_component(value: &str, what: &str) -> Result<()> {
    let path = Path::new(value);
    let single = path.components().count() == 1
        && matches!(path.components().next(), Some(std::path::Component::Normal(_)));
    if value.is_empty() || !single {
        return Err(Error::Config(format!("{what} '{value}' is not a plain file name")));
    }
    Ok(())
}

impl ReleaseHost for DirectoryHost {
    async fn find_release(&self, tag: &str) -> Result<Option<Release>> {
        validate_component(tag, "tag")?;
        self.load(tag).await
    }

    async fn create_release(&self, release: &NewRelease<'_>) -> Result<Release> {
        validate_component(release.tag, "tag")?;
        let created = Release {
            id: chrono::Utc::now().timestamp_millis().unsigned_abs(),
            tag: release.tag.to_string(),
            name: Some(release.name.to_string()),
            body: Some(release.body.to_string()),
            prerelease: release.prerelease,
            created_at: Some(chrono::Utc::now()),
            assets: Vec::new(),
            upload_url: None,
        };
        self.save(&created).await?;
        log::debug!("Created release record {}", self.record_path(release.tag).display());
        Ok(created)
    }

    async fn update_release(&self, release: &Release, name: Option<&str>, body: Option<&str>) -> Result<Release> {
        let mut stored = self.load_existing(&release.tag).await?;
        if let Some(name) = name {
            stored.name = Some(name.to_string());
        }
        if let Some(body) = body {
            stored.body = Some(body.to_string());
        }
        self.save(&stored).await?;
        Ok(stored)
    }

    async fn delete_asset(&self, release: &Release, asset: &ReleaseAsset) -> Result<()> {
        let mut stored = self.load_existing(&release.tag).await?;
        let path = self.asset_path(&release.tag, &asset.name);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(Error::fs("removing asset", &path, e)),
        }
        stored.assets.retain(|a| a.id != asset.id);
        self.save(&stored).await
    }

    async fn upload_asset(&self, release: &Release, name: &str, file: &Path) -> Result<ReleaseAsset> {
        validate_component(name, "asset name")?;
        let mut stored = self.load_existing(&release.tag).await?;

        let destination = self.asset_path(&release.tag, name);
        let size = tokio::fs::copy(file, &destination)
            .await
            .map_err(|e| Error::fs("copying asset", file, e))?;

        stored.assets.retain(|a| a.name != name);
        let id = stored.assets.iter().map(|a| a.id).max().unwrap_or(0) + 1;
        let asset = ReleaseAsset {
            id,
            name: name.to_string(),
            size,
        };
        stored.assets.push(asset.clone());
        self.save(&stored).await?;
        Ok(asset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publish::{Publisher, ReleaseRequest};

    #[tokio::test]
    async fn publishes_and_republishes_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("example-mod-2.0.0.zip");
        std::fs::write(&artifact, b"first build").unwrap();

        let host = DirectoryHost::new(dir.path().join("releases"));
        let publisher = Publisher::new(host.clone());
        let request = ReleaseRequest::new("v2.0.0", "example-mod 2.0.0".into(), String::new(), vec![artifact.clone()]);

        let first = publisher.publish(&request).await.unwrap();
        assert!(first.created);

        std::fs::write(&artifact, b"second build").unwrap();
        let second = publisher.publish(&request).await.unwrap();
        assert!(!second.created);
        assert_eq!(second.release.assets.len(), 1);

        let stored = host.find_release("v2.0.0").await.unwrap().unwrap();
        assert_eq!(stored.assets.len(), 1);
        assert_eq!(stored.name.as_deref(), Some("example-mod 2.0.0"));
        assert_eq!(
            std::fs::read(host.asset_path("v2.0.0", "example-mod-2.0.0.zip")).unwrap(),
            b"second build"
        );
    }

    #[tokio::test]
    async fn unknown_tag_has_no_release() {
        let dir = tempfile::tempdir().unwrap();
        let host = DirectoryHost::new(dir.path().to_path_buf());
        assert!(host.find_release("v9.9.9").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn rejects_path_like_tags() {
        let dir = tempfile::tempdir().unwrap();
        let host = DirectoryHost::new(dir.path().to_path_buf());
        assert!(host.find_release("../escape").await.is_err());
        assert!(host.find_release("..").await.is_err());
    }
}
