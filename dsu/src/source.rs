//! Installation sources.

use serde::{Deserialize, Serialize};

/// Partition name a single raw image is installed as.
pub const SINGLE_IMAGE_PARTITION: &str = "system";

/// One partition payload in a multi-image installation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImagePartition {
    pub partition_name: String,
    /// Opaque locator handed to the stream provider.
    pub locator: String,
    /// Uncompressed size in bytes, `0` when unknown.
    pub byte_size: u64,
}

impl ImagePartition {
    pub fn new(
        partition_name: impl Into<String>,
        locator: impl Into<String>,
        byte_size: u64,
    ) -> Self {
        Self {
            partition_name: partition_name.into(),
            locator: locator.into(),
            byte_size,
        }
    }
}

/// Where the partition payloads come from.
///
/// Immutable once handed to the installer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InstallationSource {
    /// A raw (optionally gzip-compressed) system image.
    SingleImage { locator: String, byte_size: u64 },
    /// Separate images, one per partition, installed in order.
    MultipleImages { images: Vec<ImagePartition> },
    /// A zip bundle of `<partition>.img` entries.
    Package { locator: String },
    /// A zip bundle fetched from a remote location.
    RemoteUrl { locator: String },
}

impl InstallationSource {
    /// Short label for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            InstallationSource::SingleImage { .. } => "single_image",
            InstallationSource::MultipleImages { .. } => "multiple_images",
            InstallationSource::Package { .. } => "package",
            InstallationSource::RemoteUrl { .. } => "remote_url",
        }
    }
}

/// Whether the locator names a gzip-compressed image.
pub fn is_gzip_locator(locator: &str) -> bool {
    let path = locator.split(['?', '#']).next().unwrap_or(locator);
    path.to_ascii_lowercase().ends_with(".gz")
}
