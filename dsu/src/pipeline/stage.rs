//! Stage definition for table-driven pipeline execution.

/// A stage groups tasks that run one after another.
///
/// Stages run in plan order. A stage never starts while an earlier one is
/// still running or after one has failed.
#[derive(Debug, Clone)]
pub struct Stage<T> {
    pub tasks: Vec<T>,
}

impl<T> Stage<T> {
    /// Create a stage whose tasks execute sequentially.
    #[cfg(test)]
    pub fn sequential(tasks: Vec<T>) -> Self {
        Self { tasks }
    }

    /// Create a stage holding a single task.
    pub fn single(task: T) -> Self {
        Self { tasks: vec![task] }
    }
}
