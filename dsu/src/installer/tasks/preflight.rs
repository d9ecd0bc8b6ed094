//! Task: Preflight checks.
//!
//! Refuses to run while a dynamic system is booted or an earlier installation
//! still exists, then stops components that would race with the install.

use super::{InstallCtx, blocking, log_task_error, task_start};
use crate::installer::types::InstallState;
use crate::listener::InstallationStep;
use crate::pipeline::PipelineTask;
use async_trait::async_trait;
use dsu_shared::errors::{DsuError, DsuResult};

pub struct PreflightTask;

#[async_trait]
impl PipelineTask<InstallCtx> for PreflightTask {
    async fn run(self: Box<Self>, ctx: InstallCtx) -> DsuResult<()> {
        let task_name = self.name();
        let run_id = task_start(&ctx, task_name).await;

        let (operator, properties, staging) = {
            let mut ctx = ctx.lock().await;
            ctx.set_state(InstallState::PreflightChecking);
            ctx.enter_step(InstallationStep::CheckingPreconditions);
            (
                ctx.collaborators.operator.clone(),
                ctx.collaborators.properties.clone(),
                ctx.staging.clone(),
            )
        };

        blocking(move || {
            if let Err(e) = operator.set_dynamic_partition_property() {
                tracing::warn!(error = %e, "Failed to set dynamic partition property");
            }

            if properties.is_dynamic_os_image_running()? {
                return Err(DsuError::AlreadyRunning);
            }

            if staging.has_stale_installation() {
                return Err(DsuError::RequiresDiscard(
                    staging.installation_dir().to_path_buf(),
                ));
            }

            if let Err(e) = operator.force_stop_conflicting_component() {
                tracing::warn!(error = %e, "Failed to stop conflicting component");
            }

            Ok(())
        })
        .await
        .inspect_err(|e| log_task_error(&run_id, task_name, e))
    }

    fn name(&self) -> &str {
        "preflight"
    }
}
