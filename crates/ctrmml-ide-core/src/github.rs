//! Release lookup and asset download against the GitHub API

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::ProvisionError;
use crate::{SERVER_REPO, USER_AGENT};

const GITHUB_API_URL: &str = "https://api.github.com";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const METADATA_TIMEOUT: Duration = Duration::from_secs(30);

/// Release metadata from the GitHub API. Fields beyond the few the
/// provisioner consumes are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct Release {
    pub tag_name: String,
    pub assets: Vec<ReleaseAsset>,
}

/// A downloadable artifact attached to a release.
#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseAsset {
    pub name: String,
    pub browser_download_url: String,
}

/// Where release metadata and assets come from.
///
/// The provisioner is written against this seam so tests can supply
/// releases without a network.
#[async_trait]
pub trait ReleaseSource: Send + Sync {
    /// Fetch the latest release descriptor.
    async fn latest_release(&self) -> Result<Release, ProvisionError>;

    /// Download one asset to `dest`, following redirects.
    async fn download(&self, url: &str, dest: &Path) -> Result<(), ProvisionError>;
}

/// Release source backed by the GitHub releases API.
pub struct GithubReleases {
    client: reqwest::Client,
    api_base: String,
    repo: String,
}

impl GithubReleases {
    /// Source for the server's release repository.
    pub fn new() -> Result<Self, ProvisionError> {
        Self::with_base(GITHUB_API_URL, SERVER_REPO)
    }

    /// Source against an explicit API base and repository; used by tests.
    pub fn with_base(api_base: &str, repo: &str) -> Result<Self, ProvisionError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|err| ProvisionError::Network(err.to_string()))?;
        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            repo: repo.to_string(),
        })
    }
}

#[async_trait]
impl ReleaseSource for GithubReleases {
    async fn latest_release(&self) -> Result<Release, ProvisionError> {
        let url = format!("{}/repos/{}/releases/latest", self.api_base, self.repo);
        debug!("fetching latest release from {url}");

        let mut request = self.client.get(&url).timeout(METADATA_TIMEOUT);
        // A token lifts the anonymous rate limit when the environment has one.
        if let Ok(token) = std::env::var("GITHUB_TOKEN") {
            request = request.header("Authorization", format!("Bearer {token}"));
        }

        let response = request
            .send()
            .await
            .map_err(|err| ProvisionError::Network(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProvisionError::Network(format!("HTTP {status} from {url}")));
        }
        response
            .json()
            .await
            .map_err(|err| ProvisionError::Network(err.to_string()))
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<(), ProvisionError> {
        debug!("downloading {url} to {}", dest.display());

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| ProvisionError::Download(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProvisionError::Download(format!("HTTP {status} from {url}")));
        }

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|err| ProvisionError::Download(err.to_string()))?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|err| ProvisionError::Download(err.to_string()))?;
            file.write_all(&chunk)
                .await
                .map_err(|err| ProvisionError::Download(err.to_string()))?;
        }
        file.flush()
            .await
            .map_err(|err| ProvisionError::Download(err.to_string()))
    }
}
