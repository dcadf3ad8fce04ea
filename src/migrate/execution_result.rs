use crate::migrate::change::Change;
use crate::migrate::Direction;
use crate::Error;

/// The outcome of a single migration step.
#[derive(Debug)]
pub struct ExecutionResult {
    pub version: i64,
    pub direction: Direction,
    /// Declared changes, in the order they were handed to the processor.
    pub changes: Vec<Change>,
    pub errors: Vec<Error>,
    pub executed_at: chrono::DateTime<chrono::Utc>,
    pub execution_time: i64,
}

impl ExecutionResult {
    pub fn is_successful(&self) -> bool {
        self.errors.is_empty()
    }
}
