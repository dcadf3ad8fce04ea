use crate::migrate::change_set::ChangeSet;
use crate::migrate::execution_result::ExecutionResult;
use crate::migrate::migration::Migration;
use crate::migrate::process::ChangeProcessor;
use crate::migrate::Direction;
use crate::{Connection, Result};
use log::{error, info};

/// Runs a single migration step: hooks first, then the recorded changes.
pub struct Executor<'conn> {
    processor: ChangeProcessor<'conn>,
}

impl<'conn> Executor<'conn> {
    pub fn new(connection: &'conn dyn Connection) -> Self {
        Self {
            processor: ChangeProcessor::new(connection),
        }
    }

    pub fn get_processor(&self) -> &ChangeProcessor<'conn> {
        &self.processor
    }

    /// Executes the migration in the given direction.
    ///
    /// Failures never abort the step. A failing pre hook skips the body and
    /// the change processing; a failing body discards its declarations. Each
    /// change is processed independently, and the post hook always runs. Every
    /// failure ends up in the returned result.
    pub async fn execute(&self, migration: &Migration, version: i64, direction: Direction) -> ExecutionResult {
        info!(target: "strata::migrate", "++ {} {} ({})", if direction == Direction::Up {
            "migrating"
        } else {
            "reverting"
        }, version, migration.get_description());

        let start = chrono::Utc::now();
        let mut errors = vec![];
        let mut changes = ChangeSet::new(direction);
        let mut applied = vec![];

        match self.record(migration, direction, &mut changes) {
            Ok(reverse) => {
                applied = changes.get_changes().to_vec();
                if reverse {
                    applied.reverse();
                }

                for change in applied.iter() {
                    if let Err(e) = self.processor.process(change).await {
                        error!(target: "strata::migrate", "Error while processing \"{}\" change of migration {}: {}", change.get_type(), version, e);
                        errors.push(e);
                    }
                }
            }
            Err(e) => {
                error!(target: "strata::migrate", "Error while executing migration {}: {}", version, e);
                errors.push(e);
            }
        }

        if let Some(post) = migration.get_post_hook(direction) {
            if let Err(e) = post(&changes) {
                error!(target: "strata::migrate", "Error in post-{} hook of migration {}: {}", direction, version, e);
                errors.push(e);
            }
        }

        let diff = chrono::Utc::now() - start;

        ExecutionResult {
            version,
            direction,
            changes: applied,
            errors,
            executed_at: chrono::Utc::now(),
            execution_time: diff.num_milliseconds(),
        }
    }

    /// Runs the pre hook and the body, returning whether the recorded changes
    /// must be applied in reverse order.
    fn record(&self, migration: &Migration, direction: Direction, changes: &mut ChangeSet) -> Result<bool> {
        if let Some(pre) = migration.get_pre_hook(direction) {
            pre(changes)?;
        }

        let declared = changes.num_changes();
        let result = if let Some(body) = migration.get_hook(direction) {
            body(changes).map(|_| false)
        } else if let Some(body) = migration.get_migrate_hook() {
            body(changes, direction).map(|_| direction == Direction::Down)
        } else {
            Ok(false)
        };

        if result.is_err() {
            changes.truncate(declared);
        }

        result
    }
}
