//! Host-facing installation callbacks.

use dsu_shared::DsuError;
use std::fmt;

/// Coarse phase reported to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstallationStep {
    CheckingPreconditions,
    CreatingUserdata,
    InstallingPartition,
    Enabling,
}

impl fmt::Display for InstallationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            InstallationStep::CheckingPreconditions => "checking preconditions",
            InstallationStep::CreatingUserdata => "creating userdata",
            InstallationStep::InstallingPartition => "installing partition",
            InstallationStep::Enabling => "enabling",
        };
        f.write_str(label)
    }
}

/// Receives installation events.
///
/// Callbacks run synchronously on the installer's worker thread; implementations
/// marshal to their own threads if needed. Every run ends with exactly one of
/// `on_success` or `on_error`, unless it was cancelled, in which case neither fires.
pub trait InstallListener: Send + Sync {
    fn on_error(&self, step: InstallationStep, error: &DsuError);

    fn on_progress(&self, fraction: f32, partition: &str);

    fn on_partition_created(&self, partition: &str);

    fn on_step_changed(&self, step: InstallationStep);

    fn on_success(&self);
}

/// Listener that only logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingListener;

impl InstallListener for TracingListener {
    fn on_error(&self, step: InstallationStep, error: &DsuError) {
        tracing::error!(step = %step, error = %error, "Installation failed");
    }

    fn on_progress(&self, fraction: f32, partition: &str) {
        tracing::trace!(partition = %partition, fraction, "Progress");
    }

    fn on_partition_created(&self, partition: &str) {
        tracing::info!(partition = %partition, "Partition created");
    }

    fn on_step_changed(&self, step: InstallationStep) {
        tracing::info!(step = %step, "Step changed");
    }

    fn on_success(&self) {
        tracing::info!("Installation succeeded");
    }
}
