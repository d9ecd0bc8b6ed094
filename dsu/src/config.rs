//! Installer configuration.

use crate::operator::CommandSet;
use dsu_shared::errors::{DsuError, DsuResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default size of the dynamic system's userdata partition (8 GiB).
pub const DEFAULT_USERDATA_SIZE: u64 = 8 * 1024 * 1024 * 1024;

/// Marker directory that exists while a previous installation is present.
pub const DEFAULT_INSTALLATION_DIR: &str = "/data/gsi/dsu";

/// Staging fallback when the platform has no cache directory.
const FALLBACK_STAGING_DIR: &str = "/data/local/tmp/dsu";

/// Logging configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingOptions {
    /// Also write logs to `dsu-install.log` in this directory.
    pub log_dir: Option<PathBuf>,
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: Option<String>,
}

/// Options for one installer instance.
///
/// Loadable from JSON; every field has a default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallerOptions {
    /// Size of the userdata partition, in bytes.
    pub userdata_size: u64,
    /// Where partition payloads are staged before the privileged write.
    pub staging_dir: PathBuf,
    /// Presence of this path means an earlier installation must be discarded.
    pub installation_dir: PathBuf,
    pub commands: CommandSet,
    pub logging: LoggingOptions,
}

impl Default for InstallerOptions {
    fn default() -> Self {
        let staging_dir = dirs::cache_dir()
            .map(|dir| dir.join("dsu-installer").join("staging"))
            .unwrap_or_else(|| PathBuf::from(FALLBACK_STAGING_DIR));
        Self {
            userdata_size: DEFAULT_USERDATA_SIZE,
            staging_dir,
            installation_dir: PathBuf::from(DEFAULT_INSTALLATION_DIR),
            commands: CommandSet::default(),
            logging: LoggingOptions::default(),
        }
    }
}

impl InstallerOptions {
    /// Load options from a JSON file.
    pub fn from_file(path: &Path) -> DsuResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            DsuError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&raw)
            .map_err(|e| DsuError::Config(format!("invalid config {}: {}", path.display(), e)))
    }

    /// Validate before any work starts.
    pub fn sanitize(&self) -> DsuResult<()> {
        if self.userdata_size == 0 {
            return Err(DsuError::Config("userdata_size must be greater than 0".into()));
        }
        if self.staging_dir.as_os_str().is_empty() {
            return Err(DsuError::Config("staging_dir must be set".into()));
        }
        if self.installation_dir.as_os_str().is_empty() {
            return Err(DsuError::Config("installation_dir must be set".into()));
        }
        if self.staging_dir.starts_with(&self.installation_dir) {
            return Err(DsuError::Config(format!(
                "staging_dir {} must not live inside installation_dir {}",
                self.staging_dir.display(),
                self.installation_dir.display()
            )));
        }
        self.commands.sanitize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let options = InstallerOptions::default();
        assert_eq!(options.userdata_size, DEFAULT_USERDATA_SIZE);
        assert!(options.sanitize().is_ok());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let options: InstallerOptions =
            serde_json::from_str(r#"{"userdata_size": 4096, "commands": {"shell": "bash"}}"#)
                .unwrap();
        assert_eq!(options.userdata_size, 4096);
        assert_eq!(options.commands.shell, "bash");
        assert_eq!(options.commands.enable_dynamic_os, CommandSet::default().enable_dynamic_os);
        assert_eq!(options.installation_dir, PathBuf::from(DEFAULT_INSTALLATION_DIR));
    }

    #[test]
    fn test_zero_userdata_rejected() {
        let options = InstallerOptions {
            userdata_size: 0,
            ..Default::default()
        };
        assert!(matches!(options.sanitize(), Err(DsuError::Config(_))));
    }

    #[test]
    fn test_staging_inside_installation_dir_rejected() {
        let options = InstallerOptions {
            staging_dir: PathBuf::from("/data/gsi/dsu/tmp"),
            ..Default::default()
        };
        assert!(options.sanitize().is_err());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dsu.json");
        std::fs::write(&path, r#"{"staging_dir": "/tmp/dsu-staging"}"#).unwrap();
        let options = InstallerOptions::from_file(&path).unwrap();
        assert_eq!(options.staging_dir, PathBuf::from("/tmp/dsu-staging"));

        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            InstallerOptions::from_file(&path),
            Err(DsuError::Config(_))
        ));
    }
}
