mod change;
mod change_set;
mod definition;
mod execution_result;
mod executor;
mod migration;
mod process;
mod registry;
mod version_storage;

pub use change::{Change, ChangeType, Operation};
pub use change_set::ChangeSet;
pub use definition::{load_file, MigrationDefinition};
pub use execution_result::ExecutionResult;
pub use executor::Executor;
pub use migration::{HookFn, MigrateFn, Migration, PostHookFn};
pub use process::ChangeProcessor;
pub use registry::{version_hint, DirectoryCache, Registry};
pub use strata_macros::migrations;
pub use version_storage::{TableVersionStorage, VersionStorage};

use crate::configuration::Configuration;
use crate::{Connection, Error, Result};
use log::{error, info, warn};
use std::fmt::{Display, Formatter};
use std::sync::Arc;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Direction {
    Up,
    Down,
}

impl Display for Direction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Up => "up",
                Self::Down => "down",
            }
        )
    }
}

/// Moves a database between schema versions.
///
/// A run goes from the current version to the target one, executing every
/// intermediate migration in a single transaction. Errors raised by the steps
/// are collected instead of stopping the run: if any was collected the
/// transaction is rolled back and the version left untouched.
pub struct Migrator<'conn> {
    connection: &'conn dyn Connection,
    registry: Registry,
    version_storage: Box<dyn VersionStorage + 'conn>,
    errors: Vec<Error>,
    execution_results: Vec<ExecutionResult>,
}

impl<'conn> Migrator<'conn> {
    pub fn new(connection: &'conn dyn Connection, registry: Registry) -> Self {
        Self {
            connection,
            registry,
            version_storage: Box::new(TableVersionStorage::new(connection)),
            errors: vec![],
            execution_results: vec![],
        }
    }

    /// Creates a migrator loading the configured directories.
    pub fn from_configuration(
        connection: &'conn dyn Connection,
        configuration: &Configuration,
        cache: Option<Arc<DirectoryCache>>,
    ) -> Result<Self> {
        let mut registry = match cache {
            Some(cache) => Registry::with_cache(cache),
            None => Registry::new(),
        };

        registry.load(configuration.get_directories())?;
        Self::new(connection, registry).with_table_name(configuration.get_table_name())
    }

    pub fn with_table_name(mut self, table_name: &str) -> Result<Self> {
        self.version_storage =
            Box::new(TableVersionStorage::new(self.connection).with_table_name(table_name)?);
        Ok(self)
    }

    pub fn with_version_storage<V: VersionStorage + 'conn>(mut self, version_storage: V) -> Self {
        self.version_storage = Box::new(version_storage);
        self
    }

    pub fn get_connection(&self) -> &'conn dyn Connection {
        self.connection
    }

    pub fn get_registry(&self) -> &Registry {
        &self.registry
    }

    pub fn get_registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    /// Registers a migration under the next available version.
    pub fn register(&mut self, migration: Migration) -> i64 {
        self.registry.register(migration, None)
    }

    pub async fn get_current_version(&self) -> Result<i64> {
        self.version_storage.get_current_version().await
    }

    pub async fn has_migrated(&self) -> Result<bool> {
        self.version_storage.has_migrated().await
    }

    /// Records the given version without running any migration.
    pub async fn set_current_version(&self, version: i64) -> Result<()> {
        self.version_storage.set_current_version(version).await
    }

    pub fn get_latest_version(&self) -> i64 {
        self.registry.get_latest_version()
    }

    pub fn get_next_version(&self) -> i64 {
        self.registry.get_next_version()
    }

    pub fn get_errors(&self) -> &[Error] {
        &self.errors
    }

    pub fn get_num_errors(&self) -> usize {
        self.errors.len()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn clear_errors(&mut self) {
        self.errors.clear();
    }

    pub fn add_error(&mut self, error: Error) {
        self.errors.push(error);
    }

    /// Results of the steps executed by the last run.
    pub fn get_execution_results(&self) -> &[ExecutionResult] {
        &self.execution_results
    }

    /// Migrates to the given version, or to the latest one.
    ///
    /// Returns the version the database is now at. When any step fails, the
    /// whole run is rolled back and the collected errors are returned as a
    /// single aggregate error.
    pub async fn migrate(&mut self, to: Option<i64>) -> Result<i64> {
        let start = chrono::Utc::now();
        let to = self.run(to).await?;

        if self.has_errors() {
            self.roll_back_quietly().await;
            return Err(Error::aggregate(&self.errors));
        }

        if let Err(e) = self.connection.commit().await {
            warn!(target: "strata::migrate", "Unable to commit migration transaction: {}", e);
        }

        self.version_storage.set_current_version(to).await?;

        let total_time = chrono::Utc::now() - start;
        let changes_count = self
            .execution_results
            .iter()
            .map(|r| r.changes.len())
            .sum::<usize>();
        info!(target: "strata::migrate", "Migrated database to version {} in {}ms, {} migrations executed, {} changes", to, total_time.num_milliseconds(), self.execution_results.len(), changes_count);

        Ok(to)
    }

    /// Runs the migration and always rolls it back.
    ///
    /// Returns the version the database would be at, or `None` when the run
    /// collected errors (inspect them with [`Migrator::get_errors`]).
    pub async fn migrate_dry_run(&mut self, to: Option<i64>) -> Result<Option<i64>> {
        let to = self.run(to).await?;
        self.roll_back_quietly().await;

        if self.has_errors() {
            info!(target: "strata::migrate", "Dry run to version {} failed with {} error(s)", to, self.errors.len());
            Ok(None)
        } else {
            Ok(Some(to))
        }
    }

    /// Opens the transaction and executes every step, leaving the transaction
    /// open. Returns the target version.
    async fn run(&mut self, to: Option<i64>) -> Result<i64> {
        self.clear_errors();
        self.execution_results.clear();

        self.version_storage.ensure_initialized().await?;
        self.connection.begin_transaction().await?;

        let to = to.unwrap_or_else(|| self.get_latest_version());
        if let Err(e) = self.execute_steps(to).await {
            error!(target: "strata::migrate", "{}", e);
            self.add_error(e);
        }

        Ok(to)
    }

    async fn execute_steps(&mut self, to: i64) -> Result<()> {
        let from = self.version_storage.get_current_version().await?;
        if from == to {
            return Err(Error::already_at_version(to));
        }

        let direction = if from < to { Direction::Up } else { Direction::Down };
        let versions = match direction {
            Direction::Up => (from + 1..=to).collect::<Vec<_>>(),
            Direction::Down => (to + 1..=from).rev().collect::<Vec<_>>(),
        };

        info!(target: "strata::migrate", "Migrating {} from {} to {}", direction, from, to);

        let executor = Executor::new(self.connection);
        for version in versions {
            let migration = match self.registry.get(version) {
                Ok(migration) => migration,
                Err(e) => {
                    error!(target: "strata::migrate", "{}", e);
                    self.add_error(e);
                    continue;
                }
            };

            let result = executor.execute(&migration, version, direction).await;
            self.errors.extend(
                result
                    .errors
                    .iter()
                    .map(|e| Error::new(e.kind(), e.to_string())),
            );
            self.execution_results.push(result);
        }

        Ok(())
    }

    async fn roll_back_quietly(&self) {
        if let Err(e) = self.connection.roll_back().await {
            warn!(target: "strata::migrate", "Unable to roll back migration transaction: {}", e);
        }
    }
}
