use crate::migrate::change::{Change, Operation};
use crate::schema::SchemaManager;
use crate::{Connection, Result};
use log::debug;

/// Applies declared changes through the connection's schema manager.
pub struct ChangeProcessor<'conn> {
    schema_manager: Box<dyn SchemaManager + 'conn>,
}

impl<'conn> ChangeProcessor<'conn> {
    pub fn new(connection: &'conn dyn Connection) -> Self {
        Self {
            schema_manager: connection.create_schema_manager(),
        }
    }

    pub fn get_schema_manager(&self) -> &dyn SchemaManager {
        self.schema_manager.as_ref()
    }

    /// Resolves the change type, decodes its payload and applies it.
    pub async fn process(&self, change: &Change) -> Result<()> {
        let operation = change.resolve()?;
        debug!(target: "strata::migrate", "processing \"{}\" change", operation.get_type());

        self.apply(&operation).await
    }

    pub async fn apply(&self, operation: &Operation) -> Result<()> {
        let schema_manager = self.schema_manager.as_ref();
        match operation {
            Operation::CreateTable { table } => schema_manager.create_table(table).await,
            Operation::DropTable { table_name } => schema_manager.drop_table(table_name).await,
            Operation::RenameTable {
                old_table_name,
                new_table_name,
            } => {
                schema_manager
                    .rename_table(old_table_name, new_table_name)
                    .await
            }
            Operation::AddColumn { table_name, column } => {
                schema_manager.add_column(table_name, column).await
            }
            Operation::RemoveColumn {
                table_name,
                column_name,
            } => schema_manager.drop_column(table_name, column_name).await,
            Operation::RenameColumn {
                table_name,
                old_column_name,
                new_column_name,
            } => {
                schema_manager
                    .rename_column(table_name, old_column_name, new_column_name)
                    .await
            }
            Operation::ChangeColumn { table_name, column } => {
                schema_manager.change_column(table_name, column).await
            }
            Operation::AddIndex { table_name, index } => {
                schema_manager.create_index(table_name, index).await
            }
            Operation::RemoveIndex {
                table_name,
                index_name,
            } => schema_manager.drop_index(table_name, index_name).await,
            Operation::CreateForeignKey {
                table_name,
                foreign_key,
            } => {
                schema_manager
                    .create_foreign_key(table_name, foreign_key)
                    .await
            }
            Operation::DropForeignKey {
                table_name,
                foreign_key_name,
            } => {
                schema_manager
                    .drop_foreign_key(table_name, foreign_key_name)
                    .await
            }
            Operation::CreateConstraint {
                table_name,
                constraint,
            } => {
                schema_manager
                    .create_constraint(table_name, constraint)
                    .await
            }
            Operation::DropConstraint {
                table_name,
                constraint_name,
                primary,
            } => {
                schema_manager
                    .drop_constraint(table_name, constraint_name, *primary)
                    .await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ChangeProcessor;
    use crate::driver::memory::MemoryConnection;
    use crate::error::ErrorKind;
    use crate::migrate::change::{Change, Operation};
    use crate::schema::{Column, ColumnType, ForeignKeyConstraint, Index, Table};
    use serde_json::json;

    fn users_table() -> Table {
        let mut table = Table::new("users");
        table
            .add_column(Column::new("id", ColumnType::Integer).set_notnull(true))
            .add_column(Column::new("name", ColumnType::String).set_length(255));
        table
    }

    #[tokio::test]
    async fn applies_every_change_type() {
        let connection = MemoryConnection::new();
        let processor = ChangeProcessor::new(&connection);

        let mut groups = Table::new("groups");
        groups.add_column(Column::new("id", ColumnType::Integer));
        groups.set_primary_key(&["id"]).unwrap();

        let operations = vec![
            Operation::CreateTable { table: groups },
            Operation::CreateTable {
                table: users_table(),
            },
            Operation::RenameTable {
                old_table_name: "users".to_string(),
                new_table_name: "members".to_string(),
            },
            Operation::AddColumn {
                table_name: "members".to_string(),
                column: Column::new("group_id", ColumnType::Integer),
            },
            Operation::RenameColumn {
                table_name: "members".to_string(),
                old_column_name: "name".to_string(),
                new_column_name: "full_name".to_string(),
            },
            Operation::ChangeColumn {
                table_name: "members".to_string(),
                column: Column::new("full_name", ColumnType::Text),
            },
            Operation::AddIndex {
                table_name: "members".to_string(),
                index: Index::new("members_full_name", &["full_name"], false, false),
            },
            Operation::CreateForeignKey {
                table_name: "members".to_string(),
                foreign_key: ForeignKeyConstraint::new(
                    "members_group",
                    &["group_id"],
                    "groups",
                    &["id"],
                ),
            },
            Operation::CreateConstraint {
                table_name: "members".to_string(),
                constraint: Index::primary(&["id"]),
            },
            Operation::DropConstraint {
                table_name: "members".to_string(),
                constraint_name: "primary".to_string(),
                primary: true,
            },
            Operation::DropForeignKey {
                table_name: "members".to_string(),
                foreign_key_name: "members_group".to_string(),
            },
            Operation::RemoveIndex {
                table_name: "members".to_string(),
                index_name: "members_full_name".to_string(),
            },
            Operation::RemoveColumn {
                table_name: "members".to_string(),
                column_name: "group_id".to_string(),
            },
        ];

        for operation in operations {
            let change = Change::from(operation);
            processor
                .process(&change)
                .await
                .unwrap_or_else(|e| panic!("{} failed: {}", change.get_type(), e));
        }

        let members = processor
            .get_schema_manager()
            .introspect_table("members")
            .await
            .unwrap()
            .unwrap();
        assert!(members.has_column("full_name"));
        assert!(!members.has_column("group_id"));
        assert_eq!(
            members.get_column("full_name").unwrap().get_type(),
            ColumnType::Text
        );
        assert!(members.get_indices().is_empty());
        assert!(members.get_foreign_keys().is_empty());

        let drop = Change::from(Operation::DropTable {
            table_name: "members".to_string(),
        });
        processor.process(&drop).await.unwrap();
        assert_eq!(
            processor.get_schema_manager().list_table_names().await.unwrap(),
            ["groups"]
        );
    }

    #[tokio::test]
    async fn unknown_change_types_are_rejected() {
        let connection = MemoryConnection::new();
        let processor = ChangeProcessor::new(&connection);

        let change: Change = serde_json::from_value(json!({
            "type": "frobnicate",
            "table_name": "users"
        }))
        .unwrap();

        let err = processor.process(&change).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidChangeType);
    }

    #[tokio::test]
    async fn schema_failures_are_reported() {
        let connection = MemoryConnection::new();
        let processor = ChangeProcessor::new(&connection);

        let change = Change::from(Operation::RemoveColumn {
            table_name: "users".to_string(),
            column_name: "email".to_string(),
        });

        let err = processor.process(&change).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaOperationError);
    }
}
