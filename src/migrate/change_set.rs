use crate::migrate::change::{Change, Operation};
use crate::migrate::Direction;
use crate::schema::{Column, ForeignKeyConstraint, Index, Table};
use crate::Result;
use serde_json::{Map, Value as JsonValue};

/// Records the changes a migration declares while one of its hooks runs.
///
/// Nothing is applied to the database while recording: the executor hands the
/// recorded list to the change processor once the hooks are done.
#[derive(Clone, Debug)]
pub struct ChangeSet {
    direction: Direction,
    changes: Vec<Change>,
}

impl ChangeSet {
    pub fn new(direction: Direction) -> Self {
        Self {
            direction,
            changes: vec![],
        }
    }

    pub fn get_direction(&self) -> Direction {
        self.direction
    }

    pub fn get_changes(&self) -> &[Change] {
        &self.changes
    }

    pub fn num_changes(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Records a change by type name. The type is resolved only when the
    /// change is processed, so unknown names surface as processing errors.
    pub fn add_change<S: Into<String>>(&mut self, change_type: S, payload: Map<String, JsonValue>) -> &mut Self {
        self.push(Change::new(change_type, payload))
    }

    pub(crate) fn truncate(&mut self, len: usize) {
        self.changes.truncate(len);
    }

    pub fn push(&mut self, change: Change) -> &mut Self {
        self.changes.push(change);
        self
    }

    pub fn add(&mut self, operation: Operation) -> &mut Self {
        self.push(operation.into())
    }

    pub fn create_table(&mut self, table: Table) -> &mut Self {
        self.add(Operation::CreateTable { table })
    }

    pub fn drop_table(&mut self, table_name: &str) -> &mut Self {
        self.add(Operation::DropTable {
            table_name: table_name.to_string(),
        })
    }

    pub fn rename_table(&mut self, old_table_name: &str, new_table_name: &str) -> &mut Self {
        self.add(Operation::RenameTable {
            old_table_name: old_table_name.to_string(),
            new_table_name: new_table_name.to_string(),
        })
    }

    pub fn add_column(&mut self, table_name: &str, column: Column) -> &mut Self {
        self.add(Operation::AddColumn {
            table_name: table_name.to_string(),
            column,
        })
    }

    pub fn remove_column(&mut self, table_name: &str, column_name: &str) -> &mut Self {
        self.add(Operation::RemoveColumn {
            table_name: table_name.to_string(),
            column_name: column_name.to_string(),
        })
    }

    pub fn rename_column(&mut self, table_name: &str, old_column_name: &str, new_column_name: &str) -> &mut Self {
        self.add(Operation::RenameColumn {
            table_name: table_name.to_string(),
            old_column_name: old_column_name.to_string(),
            new_column_name: new_column_name.to_string(),
        })
    }

    pub fn change_column(&mut self, table_name: &str, column: Column) -> &mut Self {
        self.add(Operation::ChangeColumn {
            table_name: table_name.to_string(),
            column,
        })
    }

    pub fn add_index(&mut self, table_name: &str, index: Index) -> &mut Self {
        self.add(Operation::AddIndex {
            table_name: table_name.to_string(),
            index,
        })
    }

    pub fn remove_index(&mut self, table_name: &str, index_name: &str) -> &mut Self {
        self.add(Operation::RemoveIndex {
            table_name: table_name.to_string(),
            index_name: index_name.to_string(),
        })
    }

    pub fn create_foreign_key(&mut self, table_name: &str, foreign_key: ForeignKeyConstraint) -> &mut Self {
        self.add(Operation::CreateForeignKey {
            table_name: table_name.to_string(),
            foreign_key,
        })
    }

    pub fn drop_foreign_key(&mut self, table_name: &str, foreign_key_name: &str) -> &mut Self {
        self.add(Operation::DropForeignKey {
            table_name: table_name.to_string(),
            foreign_key_name: foreign_key_name.to_string(),
        })
    }

    pub fn create_constraint(&mut self, table_name: &str, constraint: Index) -> &mut Self {
        self.add(Operation::CreateConstraint {
            table_name: table_name.to_string(),
            constraint,
        })
    }

    pub fn drop_constraint(&mut self, table_name: &str, constraint_name: &str, primary: bool) -> &mut Self {
        self.add(Operation::DropConstraint {
            table_name: table_name.to_string(),
            constraint_name: constraint_name.to_string(),
            primary,
        })
    }

    /// Records an operation written in its "up" form.
    ///
    /// When recording the down direction the inverse operation is recorded
    /// instead. The executor applies down changes in reverse declaration order,
    /// so a single declaration list serves both directions.
    pub fn declare(&mut self, operation: Operation) -> Result<&mut Self> {
        let operation = match self.direction {
            Direction::Up => operation,
            Direction::Down => operation.inverse()?,
        };

        Ok(self.add(operation))
    }

    /// Same as [`ChangeSet::declare`], for an untyped change.
    pub fn declare_change(&mut self, change: &Change) -> Result<&mut Self> {
        match self.direction {
            Direction::Up => Ok(self.push(change.clone())),
            Direction::Down => {
                let operation = change.resolve()?;
                self.declare(operation)
            }
        }
    }

    pub fn table(&mut self, table: Table) -> Result<&mut Self> {
        self.declare(Operation::CreateTable { table })
    }

    pub fn column(&mut self, table_name: &str, column: Column) -> Result<&mut Self> {
        self.declare(Operation::AddColumn {
            table_name: table_name.to_string(),
            column,
        })
    }

    pub fn index(&mut self, table_name: &str, index: Index) -> Result<&mut Self> {
        self.declare(Operation::AddIndex {
            table_name: table_name.to_string(),
            index,
        })
    }

    pub fn foreign_key(&mut self, table_name: &str, foreign_key: ForeignKeyConstraint) -> Result<&mut Self> {
        self.declare(Operation::CreateForeignKey {
            table_name: table_name.to_string(),
            foreign_key,
        })
    }

    pub fn constraint(&mut self, table_name: &str, constraint: Index) -> Result<&mut Self> {
        self.declare(Operation::CreateConstraint {
            table_name: table_name.to_string(),
            constraint,
        })
    }
}
