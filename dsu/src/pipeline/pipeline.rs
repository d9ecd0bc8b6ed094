//! Generic pipeline execution framework.
//!
//! Provides a table-driven executor that runs stages in order and stops at the
//! first failing task.

use super::metrics::{PipelineMetrics, StageMetrics, TaskMetrics};
use super::stage::Stage;
use super::task::BoxedTask;
use dsu_shared::errors::DsuError;
use std::time::Instant;

pub struct ExecutionPlan<Ctx> {
    stages: Vec<Stage<BoxedTask<Ctx>>>,
}

impl<Ctx> ExecutionPlan<Ctx> {
    pub fn new(stages: Vec<Stage<BoxedTask<Ctx>>>) -> Self {
        Self { stages }
    }

    pub fn stages(self) -> Vec<Stage<BoxedTask<Ctx>>> {
        self.stages
    }
}

pub struct Pipeline<Ctx> {
    stages: Vec<Stage<BoxedTask<Ctx>>>,
}

impl<Ctx> Pipeline<Ctx> {
    pub fn new(stages: Vec<Stage<BoxedTask<Ctx>>>) -> Self {
        Self { stages }
    }
}

pub struct PipelineBuilder;

impl PipelineBuilder {
    pub fn from_plan<Ctx>(plan: ExecutionPlan<Ctx>) -> Pipeline<Ctx> {
        Pipeline::new(plan.stages())
    }
}

/// A task failed; later stages were not run.
#[derive(Debug)]
pub struct PipelineFailure {
    /// Name of the failing task.
    pub task: String,
    pub error: DsuError,
    /// Timings of everything that ran, the failing task included.
    pub metrics: PipelineMetrics,
}

/// Pipeline executor framework.
///
/// This provides the generic infrastructure for executing a table-driven pipeline.
/// The actual task execution logic is provided by task implementations.
pub struct PipelineExecutor;

impl PipelineExecutor {
    /// Execute a pipeline.
    ///
    /// Iterates through stages and runs each stage's tasks in order. Timings are
    /// kept for the tasks that ran, also when one of them fails.
    ///
    /// Generic over:
    /// - `Ctx`: Shared pipeline context (use interior mutability for writes)
    pub async fn execute<Ctx>(
        pipeline: Pipeline<Ctx>,
        ctx: Ctx,
    ) -> Result<PipelineMetrics, PipelineFailure>
    where
        Ctx: Clone,
    {
        let total_start = Instant::now();
        let mut metrics = PipelineMetrics::default();

        for (index, stage) in pipeline.stages.into_iter().enumerate() {
            let stage_start = Instant::now();
            let mut task_metrics = Vec::with_capacity(stage.tasks.len());
            let mut failure = None;

            for task in stage.tasks {
                let name = task.name().to_string();
                let task_start = Instant::now();
                tracing::trace!(stage = index, task = %name, "Running task");
                let result = task.run(ctx.clone()).await;
                task_metrics.push(TaskMetrics {
                    name: name.clone(),
                    duration_ms: task_start.elapsed().as_millis(),
                });
                if let Err(error) = result {
                    failure = Some((name, error));
                    break;
                }
            }

            let stage_metrics = StageMetrics {
                index,
                duration_ms: stage_start.elapsed().as_millis(),
                tasks: task_metrics,
            };
            tracing::debug!(
                stage = stage_metrics.index,
                duration_ms = stage_metrics.duration_ms as u64,
                "Stage finished"
            );
            metrics.stages.push(stage_metrics);

            if let Some((task, error)) = failure {
                metrics.total_duration_ms = total_start.elapsed().as_millis();
                return Err(PipelineFailure {
                    task,
                    error,
                    metrics,
                });
            }
        }

        metrics.total_duration_ms = total_start.elapsed().as_millis();
        Ok(metrics)
    }
}
