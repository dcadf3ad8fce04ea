use crate::schema::{Column, ForeignKeyConstraint, Index, Table};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::fmt::{Display, Formatter};

/// The kinds of structural change a migration can declare.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ChangeType {
    CreateTable,
    DropTable,
    RenameTable,
    AddColumn,
    RemoveColumn,
    RenameColumn,
    ChangeColumn,
    AddIndex,
    RemoveIndex,
    CreateForeignKey,
    DropForeignKey,
    CreateConstraint,
    DropConstraint,
}

impl ChangeType {
    pub const ALL: [ChangeType; 13] = [
        ChangeType::CreateTable,
        ChangeType::DropTable,
        ChangeType::RenameTable,
        ChangeType::AddColumn,
        ChangeType::RemoveColumn,
        ChangeType::RenameColumn,
        ChangeType::ChangeColumn,
        ChangeType::AddIndex,
        ChangeType::RemoveIndex,
        ChangeType::CreateForeignKey,
        ChangeType::DropForeignKey,
        ChangeType::CreateConstraint,
        ChangeType::DropConstraint,
    ];

    pub fn get_name(&self) -> &'static str {
        match self {
            ChangeType::CreateTable => "createTable",
            ChangeType::DropTable => "dropTable",
            ChangeType::RenameTable => "renameTable",
            ChangeType::AddColumn => "addColumn",
            ChangeType::RemoveColumn => "removeColumn",
            ChangeType::RenameColumn => "renameColumn",
            ChangeType::ChangeColumn => "changeColumn",
            ChangeType::AddIndex => "addIndex",
            ChangeType::RemoveIndex => "removeIndex",
            ChangeType::CreateForeignKey => "createForeignKey",
            ChangeType::DropForeignKey => "dropForeignKey",
            ChangeType::CreateConstraint => "createConstraint",
            ChangeType::DropConstraint => "dropConstraint",
        }
    }

    /// Resolves a declared change type to the operation handling it.
    ///
    /// Names are compared in their classified form, ignoring case, so
    /// `create_table`, `createTable`, `CREATE_TABLE` and `CreateTable` all
    /// resolve to [`ChangeType::CreateTable`].
    pub fn resolve(change_type: &str) -> Result<ChangeType> {
        let classified = classify(change_type);
        Self::ALL
            .into_iter()
            .find(|t| classify(t.get_name()).eq_ignore_ascii_case(&classified))
            .ok_or_else(|| Error::invalid_change_type(change_type))
    }
}

impl Display for ChangeType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.get_name())
    }
}

/// Converts `create_table`, `create-table` or `create table` into `CreateTable`.
fn classify(word: &str) -> String {
    word.split(['_', '-', ' '])
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

/// A typed structural operation, decoded from a declared change.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Operation {
    CreateTable {
        table: Table,
    },
    DropTable {
        table_name: String,
    },
    RenameTable {
        old_table_name: String,
        new_table_name: String,
    },
    AddColumn {
        table_name: String,
        column: Column,
    },
    RemoveColumn {
        table_name: String,
        column_name: String,
    },
    RenameColumn {
        table_name: String,
        old_column_name: String,
        new_column_name: String,
    },
    ChangeColumn {
        table_name: String,
        column: Column,
    },
    AddIndex {
        table_name: String,
        index: Index,
    },
    RemoveIndex {
        table_name: String,
        index_name: String,
    },
    CreateForeignKey {
        table_name: String,
        foreign_key: ForeignKeyConstraint,
    },
    DropForeignKey {
        table_name: String,
        foreign_key_name: String,
    },
    CreateConstraint {
        table_name: String,
        constraint: Index,
    },
    DropConstraint {
        table_name: String,
        constraint_name: String,
        #[serde(default)]
        primary: bool,
    },
}

impl Operation {
    pub fn get_type(&self) -> ChangeType {
        match self {
            Operation::CreateTable { .. } => ChangeType::CreateTable,
            Operation::DropTable { .. } => ChangeType::DropTable,
            Operation::RenameTable { .. } => ChangeType::RenameTable,
            Operation::AddColumn { .. } => ChangeType::AddColumn,
            Operation::RemoveColumn { .. } => ChangeType::RemoveColumn,
            Operation::RenameColumn { .. } => ChangeType::RenameColumn,
            Operation::ChangeColumn { .. } => ChangeType::ChangeColumn,
            Operation::AddIndex { .. } => ChangeType::AddIndex,
            Operation::RemoveIndex { .. } => ChangeType::RemoveIndex,
            Operation::CreateForeignKey { .. } => ChangeType::CreateForeignKey,
            Operation::DropForeignKey { .. } => ChangeType::DropForeignKey,
            Operation::CreateConstraint { .. } => ChangeType::CreateConstraint,
            Operation::DropConstraint { .. } => ChangeType::DropConstraint,
        }
    }

    /// Returns the operation undoing this one.
    ///
    /// Destructive operations carry no definition to restore from and cannot
    /// be inverted.
    pub fn inverse(&self) -> Result<Operation> {
        Ok(match self {
            Operation::CreateTable { table } => Operation::DropTable {
                table_name: table.get_name().to_string(),
            },
            Operation::RenameTable {
                old_table_name,
                new_table_name,
            } => Operation::RenameTable {
                old_table_name: new_table_name.clone(),
                new_table_name: old_table_name.clone(),
            },
            Operation::AddColumn { table_name, column } => Operation::RemoveColumn {
                table_name: table_name.clone(),
                column_name: column.get_name().to_string(),
            },
            Operation::RenameColumn {
                table_name,
                old_column_name,
                new_column_name,
            } => Operation::RenameColumn {
                table_name: table_name.clone(),
                old_column_name: new_column_name.clone(),
                new_column_name: old_column_name.clone(),
            },
            Operation::AddIndex { table_name, index } => Operation::RemoveIndex {
                table_name: table_name.clone(),
                index_name: index.get_name().to_string(),
            },
            Operation::CreateForeignKey {
                table_name,
                foreign_key,
            } => Operation::DropForeignKey {
                table_name: table_name.clone(),
                foreign_key_name: foreign_key.get_name().to_string(),
            },
            Operation::CreateConstraint {
                table_name,
                constraint,
            } => Operation::DropConstraint {
                table_name: table_name.clone(),
                constraint_name: constraint.get_name().to_string(),
                primary: constraint.is_primary(),
            },
            Operation::DropTable { .. }
            | Operation::RemoveColumn { .. }
            | Operation::ChangeColumn { .. }
            | Operation::RemoveIndex { .. }
            | Operation::DropForeignKey { .. }
            | Operation::DropConstraint { .. } => {
                return Err(Error::irreversible_migration(format!(
                    "Change \"{}\" cannot be reverted automatically",
                    self.get_type()
                )));
            }
        })
    }
}

/// A change as declared by a migration: a type name and its payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Change {
    #[serde(rename = "type")]
    change_type: String,
    #[serde(flatten)]
    payload: Map<String, JsonValue>,
}

impl Change {
    pub fn new<S: Into<String>>(change_type: S, payload: Map<String, JsonValue>) -> Self {
        Self {
            change_type: change_type.into(),
            payload,
        }
    }

    pub fn get_type(&self) -> &str {
        &self.change_type
    }

    pub fn get_payload(&self) -> &Map<String, JsonValue> {
        &self.payload
    }

    /// Resolves the change type and decodes the payload into an [`Operation`].
    pub fn resolve(&self) -> Result<Operation> {
        let change_type = ChangeType::resolve(&self.change_type)?;

        let mut object = self.payload.clone();
        object.insert(
            "type".to_string(),
            JsonValue::String(change_type.get_name().to_string()),
        );

        serde_json::from_value(JsonValue::Object(object))
            .map_err(|e| Error::invalid_change_payload(&self.change_type, e))
    }
}

impl From<Operation> for Change {
    fn from(operation: Operation) -> Self {
        let change_type = operation.get_type().get_name();
        let mut payload = match serde_json::to_value(operation) {
            Ok(JsonValue::Object(payload)) => payload,
            _ => unreachable!("operations always serialize to an object"),
        };

        payload.remove("type");
        Change::new(change_type, payload)
    }
}
