//! Task: Userdata allocation.

use super::{InstallCtx, blocking, log_task_error, task_start};
use crate::installer::types::InstallState;
use crate::listener::InstallationStep;
use crate::pipeline::PipelineTask;
use async_trait::async_trait;
use dsu_shared::errors::{DsuError, DsuResult};

/// Partition name of the dynamic system's writable data.
pub const USERDATA_PARTITION: &str = "userdata";

pub struct UserdataTask;

#[async_trait]
impl PipelineTask<InstallCtx> for UserdataTask {
    async fn run(self: Box<Self>, ctx: InstallCtx) -> DsuResult<()> {
        let task_name = self.name();
        let run_id = task_start(&ctx, task_name).await;

        let (operator, size, listener) = {
            let mut ctx = ctx.lock().await;
            ctx.set_state(InstallState::AllocatingUserdata);
            ctx.enter_step(InstallationStep::CreatingUserdata);
            (
                ctx.collaborators.operator.clone(),
                ctx.userdata_size,
                ctx.collaborators.listener.clone(),
            )
        };

        tracing::info!(size, "Creating userdata partition");
        blocking(move || {
            operator
                .create_partition(USERDATA_PARTITION, size)
                .map_err(|e| {
                    tracing::error!(error = %e, "Userdata creation failed");
                    DsuError::PartitionCreation(USERDATA_PARTITION.to_string())
                })?;
            listener.on_partition_created(USERDATA_PARTITION);
            Ok(())
        })
        .await
        .inspect_err(|e| log_task_error(&run_id, task_name, e))
    }

    fn name(&self) -> &str {
        "userdata"
    }
}
