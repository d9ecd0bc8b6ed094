//! Installation timing.

use crate::pipeline::PipelineMetrics;

/// Per-stage durations of one installation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallMetrics {
    pub preflight_ms: Option<u128>,
    pub userdata_ms: Option<u128>,
    pub install_source_ms: Option<u128>,
    pub finalize_ms: Option<u128>,
    pub total_ms: u128,
}

impl InstallMetrics {
    pub(crate) fn from_pipeline(pipeline_metrics: &PipelineMetrics) -> Self {
        Self {
            preflight_ms: pipeline_metrics.task_duration_ms("preflight"),
            userdata_ms: pipeline_metrics.task_duration_ms("userdata"),
            install_source_ms: pipeline_metrics.task_duration_ms("install_source"),
            finalize_ms: pipeline_metrics.task_duration_ms("finalize"),
            total_ms: pipeline_metrics.total_duration_ms,
        }
    }

    /// Log stage timings. Stages that never ran are omitted.
    pub fn log_stages(&self) {
        tracing::info!(
            preflight_ms = ?self.preflight_ms,
            userdata_ms = ?self.userdata_ms,
            install_source_ms = ?self.install_source_ms,
            finalize_ms = ?self.finalize_ms,
            total_ms = self.total_ms,
            "Installation stage timings"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{StageMetrics, TaskMetrics};

    #[test]
    fn test_missing_stages_are_none() {
        let pipeline = PipelineMetrics {
            total_duration_ms: 12,
            stages: vec![StageMetrics {
                index: 0,
                duration_ms: 5,
                tasks: vec![TaskMetrics {
                    name: "preflight".into(),
                    duration_ms: 5,
                }],
            }],
        };

        let metrics = InstallMetrics::from_pipeline(&pipeline);
        assert_eq!(metrics.preflight_ms, Some(5));
        assert_eq!(metrics.finalize_ms, None);
        assert_eq!(metrics.total_ms, 12);
    }
}
