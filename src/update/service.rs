use std::path::PathBuf;
use std::time::Duration;

use reqwest::Client;
use semver::Version;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::time::sleep;

use log::{debug, info};

use super::{FirmwareRelease, ReleaseAsset, UpdateError, UpdateResult, VersionStatus};
use crate::protocol::Command;
use crate::session::DeviceSession;

/// The protocol has no request/response correlation; after asking for the
/// version we wait for the reply to land in the mirror.
const VERSION_SETTLE_DELAY: Duration = Duration::from_secs(2);

/// Firmware images published for this device.
const BINARY_ASSET_EXTENSION: &str = ".bin";

pub struct UpdateChecker {
    client: Client,
    github_api_base: String,
    repo_owner: String,
    repo_name: String,
}

impl UpdateChecker {
    pub fn new(repo_owner: String, repo_name: String) -> Self {
        Self {
            client: Client::new(),
            github_api_base: "https://api.github.com".to_string(),
            repo_owner,
            repo_name,
        }
    }

    /// Ask the device for its firmware version, then read the mirror after
    /// a fixed settle delay.
    pub async fn get_current_version(
        &self,
        session: &DeviceSession,
    ) -> crate::protocol::Result<String> {
        session.send_command(Command::GetFirmwareVersion).await?;
        sleep(VERSION_SETTLE_DELAY).await;
        Ok(session.mirror().firmware_version())
    }

    /// Fetch the latest release from the registry.
    pub async fn fetch_latest(&self) -> UpdateResult<FirmwareRelease> {
        let url = format!(
            "{}/repos/{}/{}/releases/latest",
            self.github_api_base, self.repo_owner, self.repo_name
        );

        debug!("Fetching latest release from: {}", url);

        let response = self
            .client
            .get(&url)
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", "handlink/0.3")
            .send()
            .await?
            .error_for_status()?;

        let release_data: Value = response.json().await?;
        parse_github_release(&release_data)
    }

    /// Fetch the latest release and compare it against the device's
    /// reported version string.
    pub async fn check_for_updates(
        &self,
        current: &str,
    ) -> UpdateResult<(VersionStatus, FirmwareRelease)> {
        let release = self.fetch_latest().await?;
        let status = compare(current, &release.version.to_string())?;

        info!(
            "Version check complete - current: {}, latest: {}",
            current, release.version
        );
        Ok((status, release))
    }

    /// Download the release's firmware image to a fresh temporary
    /// location and return its path. The image digest is logged so an
    /// operator can cross-check what was fetched.
    pub async fn download(&self, release: &FirmwareRelease) -> UpdateResult<PathBuf> {
        let asset = release
            .assets
            .iter()
            .find(|asset| asset.name.ends_with(BINARY_ASSET_EXTENSION))
            .ok_or(UpdateError::NoBinaryAsset)?;

        info!("Downloading firmware from: {}", asset.browser_download_url);

        let response = self
            .client
            .get(&asset.browser_download_url)
            .header("User-Agent", "handlink/0.3")
            .send()
            .await?
            .error_for_status()?;

        let dir = tempfile::Builder::new()
            .prefix("handlink_fw_")
            .tempdir()?
            .into_path();
        let path = dir.join(&asset.name);

        let mut file = File::create(&path).await?;
        let mut hasher = Sha256::new();
        let mut downloaded = 0u64;
        let mut stream = response.bytes_stream();

        while let Some(chunk_result) = futures_util::StreamExt::next(&mut stream).await {
            let chunk = chunk_result.map_err(UpdateError::Network)?;
            hasher.update(&chunk);
            file.write_all(&chunk).await?;
            downloaded += chunk.len() as u64;
        }
        file.flush().await?;

        info!(
            "Firmware downloaded: {} ({} bytes, sha256 {:x})",
            path.display(),
            downloaded,
            hasher.finalize()
        );
        Ok(path)
    }
}

/// Semantic-version comparison of the device's reported version against a
/// release tag (leading `v` tolerated). `"Unknown"` short-circuits.
pub fn compare(current: &str, latest: &str) -> UpdateResult<VersionStatus> {
    let latest = Version::parse(latest.strip_prefix('v').unwrap_or(latest))?;

    if current == "Unknown" {
        return Ok(VersionStatus::Unknown { latest });
    }

    let current = Version::parse(current.strip_prefix('v').unwrap_or(current))?;
    if current < latest {
        Ok(VersionStatus::UpdateAvailable { current, latest })
    } else {
        Ok(VersionStatus::UpToDate { current })
    }
}

/// Parse the registry's release JSON into a [`FirmwareRelease`].
fn parse_github_release(data: &Value) -> UpdateResult<FirmwareRelease> {
    let tag_name = data["tag_name"]
        .as_str()
        .ok_or_else(|| anyhow::anyhow!("Missing tag_name in release"))?;

    // Remove 'v' prefix if present
    let version_str = tag_name.strip_prefix('v').unwrap_or(tag_name);
    let version = Version::parse(version_str)?;

    let name = data["name"].as_str().unwrap_or(tag_name).to_string();
    let changelog = data["body"].as_str().unwrap_or("").to_string();

    let published_at_str = data["published_at"]
        .as_str()
        .ok_or_else(|| anyhow::anyhow!("Missing published_at in release"))?;
    let published_at = chrono::DateTime::parse_from_rfc3339(published_at_str)
        .map_err(|e| anyhow::anyhow!("Date parse error: {}", e))?
        .with_timezone(&chrono::Utc);

    let assets = data["assets"]
        .as_array()
        .ok_or_else(|| anyhow::anyhow!("Missing assets in release"))?
        .iter()
        .filter_map(|asset| {
            Some(ReleaseAsset {
                name: asset["name"].as_str()?.to_string(),
                size: asset["size"].as_u64().unwrap_or(0),
                browser_download_url: asset["browser_download_url"].as_str()?.to_string(),
            })
        })
        .collect();

    Ok(FirmwareRelease {
        version,
        name,
        changelog,
        published_at,
        assets,
    })
}
