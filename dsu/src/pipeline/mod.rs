//! Generic table-driven pipeline execution framework.
//!
//! ## Architecture
//!
//! ```text
//! Pipeline → Stages → Tasks
//!
//! - Pipeline: Orchestrates execution of all stages
//! - Stage: Groups related tasks, run one after another
//! - Task: Atomic unit of work
//! ```
//!
//! Execution is strictly sequential. The first failing task ends the run and
//! is reported together with the timings collected so far.

mod metrics;
#[allow(clippy::module_inception)]
mod pipeline;
mod stage;
mod task;

pub use metrics::{PipelineMetrics, StageMetrics, TaskMetrics};
pub use pipeline::{ExecutionPlan, PipelineBuilder, PipelineExecutor, PipelineFailure};
pub use stage::Stage;
pub use task::{BoxedTask, PipelineTask};
