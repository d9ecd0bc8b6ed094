//! DSU installer.
//!
//! Installs a dynamic, removable system image by streaming partition images
//! into freshly created partitions and enabling the result for the next boot.
//!
//! ```text
//! Installer (preflight → userdata → install source → finalize)
//!     ├── policy            which partitions may be written
//!     ├── PartitionWriter   stage bytes locally, then privileged write
//!     └── PackageStreamExtractor  zip entries → PartitionWriter
//! ```
//!
//! Privileged operations, stream resolution and device properties are
//! injected through the traits in [`operator`].

pub mod cancel;
pub mod config;
pub mod installer;
pub mod listener;
mod logging;
pub mod metrics;
pub mod operator;
pub mod package;
mod pipeline;
pub mod policy;
pub mod progress;
pub mod source;
pub mod staging;
mod util;
pub mod writer;

#[cfg(test)]
mod test_support;

pub use cancel::CancellationToken;
pub use config::{InstallerOptions, LoggingOptions};
pub use dsu_shared::{DsuError, DsuResult};
pub use installer::{Collaborators, InstallState, Installer};
pub use listener::{InstallListener, InstallationStep, TracingListener};
pub use logging::init_logging;
pub use source::{ImagePartition, InstallationSource};
