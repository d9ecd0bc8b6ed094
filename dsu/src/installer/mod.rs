//! Installation orchestration.
//!
//! ## Architecture
//!
//! A run is a table-driven pipeline of sequential stages:
//!
//! ```text
//! 1. Preflight        (refuse if a DSU is running or a stale install exists)
//! 2. Userdata         (create the userdata partition)
//! 3. InstallSource    (stage + write every partition of the source)
//! 4. Finalize         (enable the installed image)
//! ```
//!
//! State transitions:
//!
//! ```text
//! Idle → PreflightChecking → AllocatingUserdata → InstallingSource → Finalizing
//!                                                                   ↘
//!                                                   Succeeded | Failed | Cancelled
//! ```
//!
//! The first error ends the run as `Failed` and is reported once through the
//! listener. Cancellation ends it as `Cancelled` with no callback; activation is
//! rolled back once, whichever task observes it. `StagingGuard` removes staged
//! payloads left behind by a run that did not succeed.

mod tasks;
mod types;

pub use types::{Collaborators, InstallContext, InstallState};

use crate::cancel::CancellationToken;
use crate::config::InstallerOptions;
use crate::metrics::InstallMetrics;
use crate::pipeline::{
    BoxedTask, ExecutionPlan, PipelineBuilder, PipelineExecutor, PipelineFailure, Stage,
};
use crate::source::InstallationSource;
use crate::staging::StagingArea;
use dsu_shared::errors::DsuResult;
use std::sync::Arc;
use tokio::sync::{Mutex, watch};
use tracing::Instrument;
use ulid::Ulid;

use tasks::{FinalizeTask, InstallCtx, InstallSourceTask, PreflightTask, UserdataTask};

pub use tasks::USERDATA_PARTITION;

// ============================================================================
// EXECUTION PLAN
// ============================================================================

fn get_execution_plan() -> ExecutionPlan<InstallCtx> {
    let stages: Vec<Stage<BoxedTask<InstallCtx>>> = vec![
        Stage::single(Box::new(PreflightTask)),
        // Unconditional, whatever the source kind
        Stage::single(Box::new(UserdataTask)),
        Stage::single(Box::new(InstallSourceTask)),
        Stage::single(Box::new(FinalizeTask)),
    ];

    ExecutionPlan::new(stages)
}

/// Installs one `InstallationSource` as a dynamic system.
///
/// # Example
///
/// ```ignore
/// let installer = Installer::new(&options, source, cancel.clone(), collaborators)?;
/// let mut state = installer.subscribe_state();
/// installer.run().await;
/// assert!(state.borrow_and_update().is_terminal());
/// ```
pub struct Installer {
    run_id: Ulid,
    userdata_size: u64,
    source: InstallationSource,
    staging: StagingArea,
    cancel: CancellationToken,
    collaborators: Collaborators,
    state_tx: watch::Sender<InstallState>,
}

impl Installer {
    /// Create an installer after validating `options`.
    pub fn new(
        options: &InstallerOptions,
        source: InstallationSource,
        cancel: CancellationToken,
        collaborators: Collaborators,
    ) -> DsuResult<Self> {
        options.sanitize()?;

        let (state_tx, _) = watch::channel(InstallState::Idle);
        Ok(Self {
            run_id: Ulid::new(),
            userdata_size: options.userdata_size,
            source,
            staging: StagingArea::new(&options.staging_dir, &options.installation_dir),
            cancel,
            collaborators,
            state_tx,
        })
    }

    pub fn run_id(&self) -> Ulid {
        self.run_id
    }

    /// Observe state transitions of this installer.
    pub fn subscribe_state(&self) -> watch::Receiver<InstallState> {
        self.state_tx.subscribe()
    }

    /// Run the installation to completion.
    ///
    /// All outcomes are reported through the listener.
    pub async fn run(self) {
        let span = tracing::info_span!(
            "dsu_install",
            run_id = %self.run_id,
            source = self.source.kind()
        );
        self.run_inner().instrument(span).await
    }

    async fn run_inner(self) {
        let Installer {
            run_id,
            userdata_size,
            source,
            staging,
            cancel,
            collaborators,
            state_tx,
        } = self;

        tracing::info!(userdata_size, "Starting installation");

        let ctx = InstallContext::new(
            run_id,
            userdata_size,
            source,
            collaborators,
            staging,
            cancel,
            state_tx,
        );
        let ctx: InstallCtx = Arc::new(Mutex::new(ctx));

        let pipeline = PipelineBuilder::from_plan(get_execution_plan());
        let result = PipelineExecutor::execute(pipeline, Arc::clone(&ctx)).await;

        let mut ctx = ctx.lock().await;
        let pipeline_metrics = match result {
            Ok(metrics) => {
                ctx.guard.disarm();
                ctx.set_state(InstallState::Succeeded);
                ctx.collaborators.listener.on_success();
                metrics
            }
            Err(PipelineFailure { error, metrics, .. }) if error.is_cancelled() => {
                ctx.set_state(InstallState::Cancelled);
                tracing::info!("Installation cancelled");
                metrics
            }
            Err(PipelineFailure {
                task,
                error,
                metrics,
            }) => {
                ctx.set_state(InstallState::Failed);
                tracing::error!(task = %task, error = %error, "Installation failed");
                ctx.collaborators.listener.on_error(ctx.step, &error);
                metrics
            }
        };

        InstallMetrics::from_pipeline(&pipeline_metrics).log_stages();
    }
}
