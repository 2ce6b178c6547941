pub mod service;

pub use service::UpdateChecker;

use semver::Version;
use serde::{Deserialize, Serialize};

/// One downloadable file attached to a release.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseAsset {
    pub name: String,
    pub size: u64,
    pub browser_download_url: String,
}

/// A published firmware release from the release registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirmwareRelease {
    pub version: Version,
    pub name: String,
    pub changelog: String,
    pub published_at: chrono::DateTime<chrono::Utc>,
    pub assets: Vec<ReleaseAsset>,
}

/// Outcome of comparing the device's reported version to the latest
/// release. An unreported (`"Unknown"`) device version short-circuits to
/// `Unknown`; no comparison is attempted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum VersionStatus {
    UpdateAvailable { current: Version, latest: Version },
    UpToDate { current: Version },
    Unknown { latest: Version },
}

#[derive(Debug, thiserror::Error)]
pub enum UpdateError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Version parsing error: {0}")]
    Version(#[from] semver::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] anyhow::Error),

    #[error("No firmware binary found in release")]
    NoBinaryAsset,
}

pub type UpdateResult<T> = Result<T, UpdateError>;
