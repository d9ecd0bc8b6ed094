//! Task: Enable the installed image.

use super::{InstallCtx, blocking, log_task_error, rollback, task_start};
use crate::installer::types::InstallState;
use crate::listener::InstallationStep;
use crate::pipeline::PipelineTask;
use async_trait::async_trait;
use dsu_shared::errors::{DsuError, DsuResult};

pub struct FinalizeTask;

#[async_trait]
impl PipelineTask<InstallCtx> for FinalizeTask {
    async fn run(self: Box<Self>, ctx: InstallCtx) -> DsuResult<()> {
        let task_name = self.name();
        let run_id = task_start(&ctx, task_name).await;

        // Cancelled after the last partition landed but before activation
        if ctx.lock().await.cancel.is_cancelled() {
            rollback(&ctx).await;
            let err = DsuError::Cancelled;
            log_task_error(&run_id, task_name, &err);
            return Err(err);
        }

        let operator = {
            let mut ctx = ctx.lock().await;
            ctx.set_state(InstallState::Finalizing);
            ctx.enter_step(InstallationStep::Enabling);
            ctx.collaborators.operator.clone()
        };

        blocking(move || {
            operator
                .enable_dynamic_os()
                .map_err(|e| DsuError::Activation(e.to_string()))
        })
        .await
        .inspect_err(|e| log_task_error(&run_id, task_name, e))
    }

    fn name(&self) -> &str {
        "finalize"
    }
}
