//! Installation tasks.
//!
//! Each task owns one phase of the run and records its outcome in the shared
//! `InstallContext`. Blocking collaborator calls run on the blocking pool.

mod finalize;
mod install_source;
mod preflight;
mod userdata;

pub use finalize::FinalizeTask;
pub use install_source::InstallSourceTask;
pub use preflight::PreflightTask;
pub use userdata::{USERDATA_PARTITION, UserdataTask};

use super::types::InstallContext;
use crate::operator::PrivilegedOperator;
use dsu_shared::errors::{DsuError, DsuResult};
use std::sync::Arc;
use tokio::sync::Mutex;
use ulid::Ulid;

pub type InstallCtx = Arc<Mutex<InstallContext>>;

async fn task_start(ctx: &InstallCtx, task_name: &str) -> Ulid {
    let run_id = ctx.lock().await.run_id;
    tracing::debug!(run_id = %run_id, task = task_name, "Task starting");
    run_id
}

fn log_task_error(run_id: &Ulid, task_name: &str, error: &DsuError) {
    if error.is_cancelled() {
        tracing::info!(run_id = %run_id, task = task_name, "Task stopped by cancellation");
    } else {
        tracing::error!(run_id = %run_id, task = task_name, error = %error, "Task failed");
    }
}

/// Run blocking collaborator work off the async runtime.
async fn blocking<T, F>(f: F) -> DsuResult<T>
where
    F: FnOnce() -> DsuResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| DsuError::Internal(format!("blocking task failed: {}", e)))?
}

/// Disable the partially installed image, at most once per run.
///
/// A failing disable is logged; the run still ends as cancelled.
async fn rollback(ctx: &InstallCtx) {
    let operator: Arc<dyn PrivilegedOperator> = {
        let mut ctx = ctx.lock().await;
        if ctx.rolled_back {
            return;
        }
        ctx.rolled_back = true;
        Arc::clone(&ctx.collaborators.operator)
    };

    tracing::info!("Rolling back: disabling dynamic system");
    if let Err(e) = blocking(move || operator.disable_dynamic_os()).await {
        tracing::warn!(error = %e, "Failed to disable dynamic system during rollback");
    }
}
