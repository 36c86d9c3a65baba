//! GitHub Releases host.
//!
//! Talks to the REST API (`/repos/{owner}/{repo}/releases`) with a bearer
//! token. Assets are streamed from disk to the release's `upload_url`.

use super::{Error, NewRelease, Release, ReleaseAsset, ReleaseHost, Result};
use chrono::{DateTime, Utc};
use reqwest::{Client, ClientBuilder, Response, StatusCode, header};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio_util::io::ReaderStream;
use url::Url;

/// Public GitHub API endpoint.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

const API_VERSION: &str = "2022-11-28";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Deserialize)]
struct GitHubAsset {
    id: u64,
    name: String,
    size: u64,
}

#[derive(Deserialize)]
struct GitHubRelease {
    id: u64,
    tag_name: String,
    name: Option<String>,
    body: Option<String>,
    prerelease: bool,
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    assets: Vec<GitHubAsset>,
    upload_url: String,
}

#[derive(Deserialize)]
struct GitHubMessage {
    message: Option<String>,
}

#[derive(Serialize)]
struct CreateRelease<'a> {
    tag_name: &'a str,
    name: &'a str,
    body: &'a str,
    draft: bool,
    prerelease: bool,
}

#[derive(Serialize)]
struct EditRelease<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<&'a str>,
}

impl From<GitHubAsset> for ReleaseAsset {
    fn from(asset: GitHubAsset) -> Self {
        Self {
            id: asset.id,
            name: asset.name,
            size: asset.size,
        }
    }
}

impl From<GitHubRelease> for Release {
    fn from(release: GitHubRelease) -> Self {
        Self {
            id: release.id,
            tag: release.tag_name,
            name: release.name,
            body: release.body,
            prerelease: release.prerelease,
            created_at: release.created_at,
            assets: release.assets.into_iter().map(Into::into).collect(),
            upload_url: Some(release.upload_url),
        }
    }
}

/// GitHub Releases for one repository.
pub struct GitHubHost {
    client: Client,
    api_base: String,
    owner: String,
    repo: String,
    token: String,
}

impl std::fmt::Debug for GitHubHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubHost")
            .field("api_base", &self.api_base)
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .field("token", &"<redacted>")
            .finish()
    }
}

impl GitHubHost {
    /// Creates a host for `repository` (`owner/repo`).
    ///
    /// # Arguments
    ///
    /// * `api_url` - API base URL, e.g. [`DEFAULT_API_URL`] or a GitHub
    ///   Enterprise `https://host/api/v3`
    /// * `repository` - `owner/repo`
    /// * `token` - Token with `contents: write` permission
    pub fn new(api_url: &str, repository: &str, token: String) -> Result<Self> {
        Self::with_client(api_url, repository, token, Client::builder())
    }

    /// Like [`GitHubHost::new`], finishing the given client builder.
    pub fn with_client(api_url: &str, repository: &str, token: String, client: ClientBuilder) -> Result<Self> {
        let parsed = Url::parse(api_url).map_err(|e| Error::Config(format!("invalid API URL '{api_url}': {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::Config(format!("API URL must be http(s): {api_url}")));
        }

        let (owner, repo) = repository
            .split_once('/')
            .filter(|(owner, repo)| !owner.is_empty() && !repo.is_empty() && !repo.contains('/'))
            .ok_or_else(|| Error::Config(format!("repository must be 'owner/repo', got '{repository}'")))?;

        if token.trim().is_empty() {
            return Err(Error::Config("GitHub token is empty".to_string()));
        }

        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "x-github-api-version",
            header::HeaderValue::from_static(API_VERSION),
        );

        let client = client
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            api_base: api_url.trim_end_matches('/').to_string(),
            owner: owner.to_string(),
            repo: repo.to_string(),
            token,
        })
    }

    fn releases_url(&self) -> String {
        format!("{}/repos/{}/{}/releases", self.api_base, self.owner, self.repo)
    }

    /// Asset upload URL for `release`, with the `{?name,label}` template removed.
    fn upload_url(&self, release: &Release, name: &str) -> Result<Url> {
        let base = match release.upload_url.as_deref() {
            Some(template) => template
                .split_once('{')
                .map_or(template, |(base, _)| base)
                .to_string(),
            None => format!("{}/{}/assets", self.releases_url(), release.id),
        };
        let mut url = Url::parse(&base).map_err(|e| Error::InvalidResponse(format!("bad upload_url '{base}': {e}")))?;
        url.query_pairs_mut().append_pair("name", name);
        Ok(url)
    }
}

/// Maps non-success responses to [`Error`].
async fn check(response: Response, method: &'static str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let url = response.url().to_string();
    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<GitHubMessage>(&text)
        .ok()
        .and_then(|m| m.message)
        .unwrap_or(text);

    if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
        return Err(Error::Auth {
            status: status.as_u16(),
            message,
        });
    }

    Err(Error::Api {
        method,
        url,
        status: status.as_u16(),
        message,
    })
}

impl ReleaseHost for GitHubHost {
    async fn find_release(&self, tag: &str) -> Result<Option<Release>> {
        let url = format!("{}/tags/{}", self.releases_url(), tag);
        log::debug!("GET {}", url);

        let response = self.client.get(&url).bearer_auth(&self.token).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let release: GitHubRelease = check(response, "GET").await?.json().await?;
        Ok(Some(release.into()))
    }

    async fn create_release(&self, release: &NewRelease<'_>) -> Result<Release> {
        let url = self.releases_url();
        log::debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&CreateRelease {
                tag_name: release.tag,
                name: release.name,
                body: release.body,
                draft: false,
                prerelease: release.prerelease,
            })
            .send()
            .await?;

        let created: GitHubRelease = check(response, "POST").await?.json().await?;
        Ok(created.into())
    }

    async fn update_release(&self, release: &Release, name: Option<&str>, body: Option<&str>) -> Result<Release> {
        let url = format!("{}/{}", self.releases_url(), release.id);
        log::debug!("PATCH {}", url);

        let response = self
            .client
            .patch(&url)
            .bearer_auth(&self.token)
            .json(&EditRelease { name, body })
            .send()
            .await?;

        let updated: GitHubRelease = check(response, "PATCH").await?.json().await?;
        Ok(updated.into())
    }

    async fn delete_asset(&self, _release: &Release, asset: &ReleaseAsset) -> Result<()> {
        let url = format!("{}/assets/{}", self.releases_url(), asset.id);
        log::debug!("DELETE {}", url);

        let response = self.client.delete(&url).bearer_auth(&self.token).send().await?;
        // Already gone counts as deleted
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        check(response, "DELETE").await?;
        Ok(())
    }

    async fn upload_asset(&self, release: &Release, name: &str, file: &Path) -> Result<ReleaseAsset> {
        let url = self.upload_url(release, name)?;
        log::debug!("POST {}", url);

        let handle = tokio::fs::File::open(file)
            .await
            .map_err(|e| Error::fs("opening asset", file, e))?;
        let size = handle
            .metadata()
            .await
            .map_err(|e| Error::fs("reading asset metadata", file, e))?
            .len();

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.token)
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .header(header::CONTENT_LENGTH, size)
            .body(reqwest::Body::wrap_stream(ReaderStream::new(handle)))
            .send()
            .await?;

        let asset: GitHubAsset = check(response, "POST").await?.json().await?;
        Ok(asset.into())
    }
}
