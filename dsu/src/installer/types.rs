//! Type definitions for the installation pipeline.

use crate::cancel::CancellationToken;
use crate::listener::{InstallListener, InstallationStep};
use crate::operator::{PrivilegedOperator, StreamProvider, SystemProperties};
use crate::source::InstallationSource;
use crate::staging::{StagingArea, StagingGuard};
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use ulid::Ulid;

/// Where a run is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstallState {
    Idle,
    PreflightChecking,
    AllocatingUserdata,
    InstallingSource,
    Finalizing,
    Succeeded,
    Failed,
    Cancelled,
}

impl InstallState {
    /// Whether the run has ended.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            InstallState::Succeeded | InstallState::Failed | InstallState::Cancelled
        )
    }
}

impl fmt::Display for InstallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// External collaborators an installer drives.
#[derive(Clone)]
pub struct Collaborators {
    pub operator: Arc<dyn PrivilegedOperator>,
    pub streams: Arc<dyn StreamProvider>,
    pub properties: Arc<dyn SystemProperties>,
    pub listener: Arc<dyn InstallListener>,
}

/// Shared installation pipeline context.
///
/// Stores inputs, collaborators and progress markers across all tasks.
pub struct InstallContext {
    pub run_id: Ulid,
    pub userdata_size: u64,
    pub source: InstallationSource,
    pub collaborators: Collaborators,
    pub staging: StagingArea,
    pub cancel: CancellationToken,
    /// Removes leftover staged payloads unless the run succeeds.
    pub guard: StagingGuard,
    /// Last step announced to the listener; errors are reported against it.
    pub step: InstallationStep,
    /// Set once the rollback call has been issued.
    pub rolled_back: bool,
    state_tx: watch::Sender<InstallState>,
}

impl InstallContext {
    pub fn new(
        run_id: Ulid,
        userdata_size: u64,
        source: InstallationSource,
        collaborators: Collaborators,
        staging: StagingArea,
        cancel: CancellationToken,
        state_tx: watch::Sender<InstallState>,
    ) -> Self {
        Self {
            run_id,
            userdata_size,
            source,
            collaborators,
            staging,
            cancel,
            guard: StagingGuard::new(),
            step: InstallationStep::CheckingPreconditions,
            rolled_back: false,
            state_tx,
        }
    }

    /// Publish a state transition.
    pub fn set_state(&self, state: InstallState) {
        tracing::debug!(run_id = %self.run_id, state = %state, "State transition");
        self.state_tx.send_replace(state);
    }

    /// Announce a step to the listener and remember it for error reporting.
    pub fn enter_step(&mut self, step: InstallationStep) {
        self.step = step;
        self.collaborators.listener.on_step_changed(step);
    }
}
