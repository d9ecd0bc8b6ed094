//! Collaborator boundaries of the installer.
//!
//! ## Architecture
//!
//! - **PrivilegedOperator**: partition table and activation operations that need
//!   elevated rights
//! - **StreamProvider**: turns opaque locators (paths, content URIs, URLs) into bytes
//! - **SystemProperties**: read-only device state
//!
//! The installer only talks to these traits. `CommandOperator`, `GetpropProperties`
//! and `FileStreamProvider` are the implementations the `dsu-install` binary uses.

mod command;
mod file_stream;

use dsu_shared::DsuResult;
use std::io::Read;
use std::path::Path;

pub use command::{CommandOperator, CommandSet, GetpropProperties};
pub use file_stream::FileStreamProvider;

/// A readable payload stream.
pub type ByteStream = Box<dyn Read + Send>;

/// Privileged partition and activation operations.
///
/// Every call is blocking and not cancellable once issued. Failures are never
/// retried by the installer.
pub trait PrivilegedOperator: Send + Sync {
    /// Allow dynamic partitions to be created on this device.
    fn set_dynamic_partition_property(&self) -> DsuResult<()>;

    /// Stop any running component that would race with the installation.
    fn force_stop_conflicting_component(&self) -> DsuResult<()>;

    /// Create an empty partition of `size_bytes`.
    fn create_partition(&self, name: &str, size_bytes: u64) -> DsuResult<()>;

    /// Write a staged image into the partition `name`.
    fn install_partition_image(&self, staged_file: &Path, name: &str) -> DsuResult<()>;

    /// Boot into the installed image on next restart.
    fn enable_dynamic_os(&self) -> DsuResult<()>;

    /// Undo activation of a partially installed image.
    fn disable_dynamic_os(&self) -> DsuResult<()>;
}

/// Resolves locators into byte streams.
pub trait StreamProvider: Send + Sync {
    fn open_stream(&self, locator: &str) -> DsuResult<ByteStream>;
}

/// Device system property queries.
pub trait SystemProperties: Send + Sync {
    fn is_dynamic_os_image_running(&self) -> DsuResult<bool>;
}
