use crate::configuration::DEFAULT_TABLE_NAME;
use crate::schema::{validate_identifier, Column, ColumnType, Table};
use crate::{AsyncResult, Connection, Result, Value};
use log::debug;
use std::sync::atomic::{AtomicBool, Ordering};

/// Persists the schema version a database has been migrated to.
pub trait VersionStorage: Send + Sync {
    /// Makes sure the storage exists. Failures are swallowed: the storage may
    /// already exist, and any real problem surfaces on the next read.
    fn ensure_initialized(&self) -> AsyncResult<'_, bool>;

    /// The current version, 0 when nothing has been recorded yet.
    fn get_current_version(&self) -> AsyncResult<'_, i64>;

    /// Whether a version has ever been recorded.
    fn has_migrated(&self) -> AsyncResult<'_, bool>;

    fn set_current_version(&self, version: i64) -> AsyncResult<'_, ()>;
}

/// Stores the version in a single-row, single-column table.
pub struct TableVersionStorage<'conn> {
    connection: &'conn dyn Connection,
    table_created: AtomicBool,
    table_name: String,
    version_column_name: String,
}

impl<'conn> TableVersionStorage<'conn> {
    pub fn new(connection: &'conn dyn Connection) -> Self {
        Self {
            connection,
            table_created: AtomicBool::new(false),
            table_name: DEFAULT_TABLE_NAME.to_string(),
            version_column_name: "version".to_string(),
        }
    }

    pub fn with_table_name(mut self, table_name: &str) -> Result<Self> {
        self.table_name = validate_identifier(table_name)?.to_string();
        Ok(self)
    }

    pub fn get_table_name(&self) -> &str {
        &self.table_name
    }

    fn get_expected_table(&self) -> Table {
        let mut table = Table::new(&self.table_name);
        table.add_column(Column::new(&self.version_column_name, ColumnType::Integer));

        table
    }

    async fn fetch_version(&self) -> Result<Option<Value>> {
        self.ensure_initialized().await?;
        let values = self
            .connection
            .fetch_column(&self.table_name, &self.version_column_name)
            .await?;

        Ok(values.into_iter().next().filter(|v| !v.is_null()))
    }
}

impl VersionStorage for TableVersionStorage<'_> {
    fn ensure_initialized(&self) -> AsyncResult<'_, bool> {
        Box::pin(async move {
            if self.table_created.swap(true, Ordering::SeqCst) {
                return Ok(true);
            }

            let schema_manager = self.connection.create_schema_manager();
            match schema_manager.create_table(&self.get_expected_table()).await {
                Ok(()) => Ok(true),
                Err(e) => {
                    debug!(target: "strata::migrate", "Version table \"{}\" not created: {}", self.table_name, e);
                    Ok(false)
                }
            }
        })
    }

    fn get_current_version(&self) -> AsyncResult<'_, i64> {
        Box::pin(async move {
            Ok(self
                .fetch_version()
                .await?
                .and_then(|v| v.as_i64())
                .unwrap_or(0))
        })
    }

    fn has_migrated(&self) -> AsyncResult<'_, bool> {
        Box::pin(async move { Ok(self.fetch_version().await?.is_some()) })
    }

    fn set_current_version(&self, version: i64) -> AsyncResult<'_, ()> {
        Box::pin(async move {
            let column = self.version_column_name.as_str();
            if self.has_migrated().await? {
                self.connection
                    .update(&self.table_name, vec![(column, Value::Int(version))])
                    .await?;
            } else {
                self.connection
                    .insert(&self.table_name, vec![(column, Value::Int(version))])
                    .await?;
            }

            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{TableVersionStorage, VersionStorage};
    use crate::driver::memory::MemoryConnection;
    use crate::error::ErrorKind;
    use crate::schema::SchemaManager;
    use crate::Connection;

    #[tokio::test]
    async fn starts_at_version_zero() {
        let connection = MemoryConnection::new();
        let storage = TableVersionStorage::new(&connection);

        assert_eq!(storage.get_current_version().await.unwrap(), 0);
        assert!(!storage.has_migrated().await.unwrap());

        let schema_manager = connection.create_schema_manager();
        assert!(
            schema_manager
                .tables_exist(&["migration_version"])
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn inserts_then_updates_a_single_row() {
        let connection = MemoryConnection::new();
        let storage = TableVersionStorage::new(&connection);

        storage.set_current_version(3).await.unwrap();
        assert!(storage.has_migrated().await.unwrap());
        assert_eq!(storage.get_current_version().await.unwrap(), 3);

        storage.set_current_version(1).await.unwrap();
        assert_eq!(storage.get_current_version().await.unwrap(), 1);

        let values = connection
            .fetch_column("migration_version", "version")
            .await
            .unwrap();
        assert_eq!(values.len(), 1);
    }

    #[tokio::test]
    async fn table_creation_is_attempted_once() {
        let connection = MemoryConnection::new();
        let storage = TableVersionStorage::new(&connection)
            .with_table_name("schema_version")
            .unwrap();

        assert!(storage.ensure_initialized().await.unwrap());
        storage.set_current_version(2).await.unwrap();

        // a second storage on the same database fails creating the table, silently
        let other = TableVersionStorage::new(&connection)
            .with_table_name("schema_version")
            .unwrap();
        assert!(!other.ensure_initialized().await.unwrap());
        assert_eq!(other.get_current_version().await.unwrap(), 2);
    }

    #[test]
    fn table_name_must_be_an_identifier() {
        let connection = MemoryConnection::new();
        let err = TableVersionStorage::new(&connection)
            .with_table_name("drop table; --")
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidIdentifier);
    }
}
