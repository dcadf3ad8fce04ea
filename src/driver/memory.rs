use crate::connection::Connection;
use crate::schema::{
    validate_identifier, Column, ForeignKeyConstraint, Index, SchemaManager, Table,
};
use crate::sync::{Mutex, MutexGuard};
use crate::{AsyncResult, Error, Result, Value};
use log::debug;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

type Row = BTreeMap<String, Value>;

#[derive(Clone, Debug)]
struct MemoryTable {
    definition: Table,
    rows: Vec<Row>,
}

#[derive(Clone, Debug, Default)]
struct Database {
    tables: BTreeMap<String, MemoryTable>,
}

impl Database {
    fn table(&self, name: &str) -> Result<&MemoryTable> {
        self.tables
            .get(&name.to_lowercase())
            .ok_or_else(|| Error::table_not_found(name))
    }

    fn table_mut(&mut self, name: &str) -> Result<&mut MemoryTable> {
        self.tables
            .get_mut(&name.to_lowercase())
            .ok_or_else(|| Error::table_not_found(name))
    }

    fn has_table(&self, name: &str) -> bool {
        self.tables.contains_key(&name.to_lowercase())
    }

    fn check_foreign_key(&self, table: &Table, foreign_key: &ForeignKeyConstraint) -> Result<()> {
        validate_identifier(foreign_key.get_name())?;
        for column in foreign_key.get_local_columns() {
            if !table.has_column(column) {
                return Err(Error::column_not_found(table.get_name(), column));
            }
        }

        let foreign_table_name = foreign_key.get_foreign_table_name();
        let foreign_table = if foreign_table_name.eq_ignore_ascii_case(table.get_name()) {
            table
        } else {
            &self.table(foreign_table_name)?.definition
        };

        for column in foreign_key.get_foreign_columns() {
            if !foreign_table.has_column(column) {
                return Err(Error::column_not_found(foreign_table_name, column));
            }
        }

        if foreign_key.get_local_columns().len() != foreign_key.get_foreign_columns().len() {
            return Err(Error::schema_operation(format!(
                "Foreign key \"{}\" must reference as many columns as it declares",
                foreign_key.get_name()
            )));
        }

        Ok(())
    }
}

fn check_index(table: &Table, index: &Index) -> Result<()> {
    validate_identifier(index.get_name())?;
    if index.get_columns().is_empty() {
        return Err(Error::schema_operation(format!(
            "Index \"{}\" must span at least one column",
            index.get_name()
        )));
    }

    if table.has_index(index.get_name()) {
        return Err(Error::schema_operation(format!(
            "Index \"{}\" already exists on table \"{}\"",
            index.get_name(),
            table.get_name()
        )));
    }

    if index.is_primary() && table.get_primary_key().is_some() {
        return Err(Error::schema_operation(format!(
            "Table \"{}\" already has a primary key",
            table.get_name()
        )));
    }

    for column in index.get_columns() {
        if !table.has_column(column) {
            return Err(Error::column_not_found(table.get_name(), column));
        }
    }

    Ok(())
}

fn check_new_table(database: &Database, table: &Table) -> Result<()> {
    validate_identifier(table.get_name())?;
    if database.has_table(table.get_name()) {
        return Err(Error::table_already_exists(table.get_name()));
    }

    if table.get_columns().is_empty() {
        return Err(Error::schema_operation(format!(
            "Table \"{}\" must have at least one column",
            table.get_name()
        )));
    }

    let mut seen = Table::new(table.get_name());
    for column in table.get_columns() {
        validate_identifier(column.get_name())?;
        if seen.has_column(column.get_name()) {
            return Err(Error::column_already_exists(table.get_name(), column.get_name()));
        }

        seen.add_column(column.clone());
    }

    for index in table.get_indices() {
        check_index(&seen, index)?;
        seen.add_index(index.clone());
    }

    for foreign_key in table.get_foreign_keys() {
        database.check_foreign_key(table, foreign_key)?;
    }

    Ok(())
}

#[derive(Default)]
struct State {
    database: Database,
    snapshots: Vec<Database>,
}

/// A connection to an in-process schema.
///
/// Every transaction level takes a snapshot of the whole schema, rolling back
/// restores it. Structural operations are validated the same way a database
/// server would, so failures surface as schema operation errors.
#[derive(Default)]
pub struct MemoryConnection {
    state: Mutex<State>,
    transaction_nesting_level: AtomicUsize,
}

impl MemoryConnection {
    pub fn new() -> Self {
        Self::default()
    }

    async fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().await
    }
}

impl Connection for MemoryConnection {
    fn begin_transaction(&self) -> AsyncResult<'_, ()> {
        Box::pin(async move {
            let mut state = self.state().await;
            let snapshot = state.database.clone();
            state.snapshots.push(snapshot);

            let level = self.transaction_nesting_level.fetch_add(1, Ordering::SeqCst) + 1;
            debug!(target: "strata::driver", "Beginning transaction (level {})", level);

            Ok(())
        })
    }

    fn commit(&self) -> AsyncResult<'_, ()> {
        Box::pin(async move {
            let mut state = self.state().await;
            if state.snapshots.pop().is_none() {
                return Err(Error::transaction("There is no active transaction"));
            }

            self.transaction_nesting_level.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        })
    }

    fn roll_back(&self) -> AsyncResult<'_, ()> {
        Box::pin(async move {
            let mut state = self.state().await;
            let Some(snapshot) = state.snapshots.pop() else {
                return Err(Error::transaction("There is no active transaction"));
            };

            state.database = snapshot;
            self.transaction_nesting_level.fetch_sub(1, Ordering::SeqCst);
            debug!(target: "strata::driver", "Transaction rolled back");

            Ok(())
        })
    }

    fn is_transaction_active(&self) -> bool {
        self.transaction_nesting_level.load(Ordering::SeqCst) > 0
    }

    fn create_schema_manager(&self) -> Box<dyn SchemaManager + '_> {
        Box::new(MemorySchemaManager { connection: self })
    }

    fn fetch_column<'a>(&'a self, table: &'a str, column: &'a str) -> AsyncResult<'a, Vec<Value>> {
        Box::pin(async move {
            let state = self.state().await;
            let table = state.database.table(table)?;
            let Some(column) = table.definition.get_column(column) else {
                return Err(Error::column_not_found(table.definition.get_name(), column));
            };

            let key = column.get_name().to_lowercase();
            Ok(table
                .rows
                .iter()
                .map(|row| row.get(&key).cloned().unwrap_or_default())
                .collect())
        })
    }

    fn insert<'a>(&'a self, table: &'a str, values: Vec<(&'a str, Value)>) -> AsyncResult<'a, usize> {
        Box::pin(async move {
            let mut state = self.state().await;
            let table = state.database.table_mut(table)?;

            let mut row: Row = table
                .definition
                .get_columns()
                .iter()
                .map(|c| (c.get_name().to_lowercase(), c.get_default().clone()))
                .collect();

            for (column, value) in values {
                if !table.definition.has_column(column) {
                    return Err(Error::column_not_found(table.definition.get_name(), column));
                }

                row.insert(column.to_lowercase(), value);
            }

            for column in table.definition.get_columns() {
                if column.is_notnull() && row[&column.get_name().to_lowercase()].is_null() {
                    return Err(Error::schema_operation(format!(
                        "Column \"{}\" of table \"{}\" cannot be null",
                        column.get_name(),
                        table.definition.get_name()
                    )));
                }
            }

            table.rows.push(row);
            Ok(1)
        })
    }

    fn update<'a>(&'a self, table: &'a str, values: Vec<(&'a str, Value)>) -> AsyncResult<'a, usize> {
        Box::pin(async move {
            let mut state = self.state().await;
            let table = state.database.table_mut(table)?;
            for (column, _) in values.iter() {
                if !table.definition.has_column(column) {
                    return Err(Error::column_not_found(table.definition.get_name(), column));
                }
            }

            for row in table.rows.iter_mut() {
                for (column, value) in values.iter() {
                    row.insert(column.to_lowercase(), value.clone());
                }
            }

            Ok(table.rows.len())
        })
    }
}

pub struct MemorySchemaManager<'conn> {
    connection: &'conn MemoryConnection,
}

impl SchemaManager for MemorySchemaManager<'_> {
    fn create_table<'a>(&'a self, table: &'a Table) -> AsyncResult<'a, ()> {
        Box::pin(async move {
            let mut state = self.connection.state().await;
            check_new_table(&state.database, table)?;

            state.database.tables.insert(
                table.get_name().to_lowercase(),
                MemoryTable {
                    definition: table.clone(),
                    rows: vec![],
                },
            );

            Ok(())
        })
    }

    fn drop_table<'a>(&'a self, name: &'a str) -> AsyncResult<'a, ()> {
        Box::pin(async move {
            let mut state = self.connection.state().await;
            let key = name.to_lowercase();
            let referenced_by = state.database.tables.iter().find(|(k, t)| {
                **k != key
                    && t.definition
                        .get_foreign_keys()
                        .iter()
                        .any(|fk| fk.get_foreign_table_name().eq_ignore_ascii_case(name))
            });

            if let Some((_, table)) = referenced_by {
                return Err(Error::schema_operation(format!(
                    "Table \"{}\" is referenced by a foreign key on table \"{}\"",
                    name,
                    table.definition.get_name()
                )));
            }

            state
                .database
                .tables
                .remove(&key)
                .map(|_| ())
                .ok_or_else(|| Error::table_not_found(name))
        })
    }

    fn rename_table<'a>(&'a self, old_name: &'a str, new_name: &'a str) -> AsyncResult<'a, ()> {
        Box::pin(async move {
            let mut state = self.connection.state().await;
            validate_identifier(new_name)?;
            if state.database.has_table(new_name) {
                return Err(Error::table_already_exists(new_name));
            }

            let Some(mut table) = state.database.tables.remove(&old_name.to_lowercase()) else {
                return Err(Error::table_not_found(old_name));
            };

            table.definition.set_name(new_name);
            state.database.tables.insert(new_name.to_lowercase(), table);

            for other in state.database.tables.values_mut() {
                let definition = &mut other.definition;
                let foreign_keys = definition
                    .get_foreign_keys()
                    .iter()
                    .filter(|fk| fk.get_foreign_table_name().eq_ignore_ascii_case(old_name))
                    .map(|fk| fk.get_name().to_string())
                    .collect::<Vec<_>>();

                for name in foreign_keys {
                    if let Some(fk) = definition.remove_foreign_key(&name) {
                        let mut renamed = ForeignKeyConstraint::new(
                            fk.get_name(),
                            fk.get_local_columns(),
                            new_name,
                            fk.get_foreign_columns(),
                        );
                        renamed.on_delete = fk.on_delete;
                        renamed.on_update = fk.on_update;
                        definition.add_foreign_key(renamed);
                    }
                }
            }

            Ok(())
        })
    }

    fn add_column<'a>(&'a self, table: &'a str, column: &'a Column) -> AsyncResult<'a, ()> {
        Box::pin(async move {
            let mut state = self.connection.state().await;
            let table = state.database.table_mut(table)?;
            validate_identifier(column.get_name())?;

            let table_name = table.definition.get_name().to_string();
            if table.definition.has_column(column.get_name()) {
                return Err(Error::column_already_exists(&table_name, column.get_name()));
            }

            if column.is_notnull() && column.get_default().is_null() && !table.rows.is_empty() {
                return Err(Error::schema_operation(format!(
                    "Cannot add NOT NULL column \"{}\" without a default value to non-empty table \"{}\"",
                    column.get_name(),
                    table_name
                )));
            }

            table.definition.add_column(column.clone());
            let key = column.get_name().to_lowercase();
            for row in table.rows.iter_mut() {
                row.insert(key.clone(), column.get_default().clone());
            }

            Ok(())
        })
    }

    fn drop_column<'a>(&'a self, table: &'a str, column: &'a str) -> AsyncResult<'a, ()> {
        Box::pin(async move {
            let mut state = self.connection.state().await;
            let table = state.database.table_mut(table)?;
            let table_name = table.definition.get_name().to_string();

            if let Some(index) = table
                .definition
                .get_indices()
                .iter()
                .find(|i| i.spans_column(column))
            {
                return Err(Error::schema_operation(format!(
                    "Column \"{}\" of table \"{}\" is used by index \"{}\"",
                    column,
                    table_name,
                    index.get_name()
                )));
            }

            if table.definition.remove_column(column).is_none() {
                return Err(Error::column_not_found(&table_name, column));
            }

            let key = column.to_lowercase();
            for row in table.rows.iter_mut() {
                row.remove(&key);
            }

            Ok(())
        })
    }

    fn rename_column<'a>(
        &'a self,
        table: &'a str,
        old_name: &'a str,
        new_name: &'a str,
    ) -> AsyncResult<'a, ()> {
        Box::pin(async move {
            let mut state = self.connection.state().await;
            let table = state.database.table_mut(table)?;
            let table_name = table.definition.get_name().to_string();
            validate_identifier(new_name)?;

            if table.definition.has_column(new_name) {
                return Err(Error::column_already_exists(&table_name, new_name));
            }

            if table
                .definition
                .get_indices()
                .iter()
                .any(|i| i.spans_column(old_name))
            {
                return Err(Error::schema_operation(format!(
                    "Column \"{}\" of table \"{}\" is used by an index and cannot be renamed",
                    old_name, table_name
                )));
            }

            let Some(column) = table.definition.get_column_mut(old_name) else {
                return Err(Error::column_not_found(&table_name, old_name));
            };

            column.set_name(new_name);

            let (old_key, new_key) = (old_name.to_lowercase(), new_name.to_lowercase());
            for row in table.rows.iter_mut() {
                if let Some(value) = row.remove(&old_key) {
                    row.insert(new_key.clone(), value);
                }
            }

            Ok(())
        })
    }

    fn change_column<'a>(&'a self, table: &'a str, column: &'a Column) -> AsyncResult<'a, ()> {
        Box::pin(async move {
            let mut state = self.connection.state().await;
            let table = state.database.table_mut(table)?;
            let table_name = table.definition.get_name().to_string();

            if !table.definition.has_column(column.get_name()) {
                return Err(Error::column_not_found(&table_name, column.get_name()));
            }

            let key = column.get_name().to_lowercase();
            if column.is_notnull()
                && table
                    .rows
                    .iter()
                    .any(|r| r.get(&key).is_none_or(Value::is_null))
            {
                return Err(Error::schema_operation(format!(
                    "Column \"{}\" of table \"{}\" contains null values",
                    column.get_name(),
                    table_name
                )));
            }

            let Some(existing) = table.definition.get_column_mut(column.get_name()) else {
                return Err(Error::column_not_found(&table_name, column.get_name()));
            };

            *existing = column.clone();
            Ok(())
        })
    }

    fn create_index<'a>(&'a self, table: &'a str, index: &'a Index) -> AsyncResult<'a, ()> {
        Box::pin(async move {
            let mut state = self.connection.state().await;
            let table = state.database.table_mut(table)?;
            check_index(&table.definition, index)?;
            table.definition.add_index(index.clone());

            Ok(())
        })
    }

    fn drop_index<'a>(&'a self, table: &'a str, name: &'a str) -> AsyncResult<'a, ()> {
        Box::pin(async move {
            let mut state = self.connection.state().await;
            let table = state.database.table_mut(table)?;
            let table_name = table.definition.get_name().to_string();

            table
                .definition
                .remove_index(name)
                .map(|_| ())
                .ok_or_else(|| {
                    Error::schema_operation(format!(
                        "Index \"{}\" does not exist on table \"{}\"",
                        name, table_name
                    ))
                })
        })
    }

    fn create_foreign_key<'a>(
        &'a self,
        table: &'a str,
        foreign_key: &'a ForeignKeyConstraint,
    ) -> AsyncResult<'a, ()> {
        Box::pin(async move {
            let mut state = self.connection.state().await;
            let definition = state.database.table(table)?.definition.clone();
            if definition.has_foreign_key(foreign_key.get_name()) {
                return Err(Error::schema_operation(format!(
                    "Foreign key \"{}\" already exists on table \"{}\"",
                    foreign_key.get_name(),
                    definition.get_name()
                )));
            }

            state.database.check_foreign_key(&definition, foreign_key)?;
            state
                .database
                .table_mut(table)?
                .definition
                .add_foreign_key(foreign_key.clone());

            Ok(())
        })
    }

    fn drop_foreign_key<'a>(&'a self, table: &'a str, name: &'a str) -> AsyncResult<'a, ()> {
        Box::pin(async move {
            let mut state = self.connection.state().await;
            let table = state.database.table_mut(table)?;
            let table_name = table.definition.get_name().to_string();

            table
                .definition
                .remove_foreign_key(name)
                .map(|_| ())
                .ok_or_else(|| {
                    Error::schema_operation(format!(
                        "Foreign key \"{}\" does not exist on table \"{}\"",
                        name, table_name
                    ))
                })
        })
    }

    fn create_constraint<'a>(&'a self, table: &'a str, constraint: &'a Index) -> AsyncResult<'a, ()> {
        if !constraint.is_unique() {
            return Box::pin(async move {
                Err(Error::schema_operation(format!(
                    "Constraint \"{}\" must be either unique or primary",
                    constraint.get_name()
                )))
            });
        }

        self.create_index(table, constraint)
    }

    fn drop_constraint<'a>(
        &'a self,
        table: &'a str,
        name: &'a str,
        primary: bool,
    ) -> AsyncResult<'a, ()> {
        Box::pin(async move {
            let mut state = self.connection.state().await;
            let table = state.database.table_mut(table)?;
            let table_name = table.definition.get_name().to_string();

            let index_name = if primary {
                table
                    .definition
                    .get_primary_key()
                    .map(|i| i.get_name().to_string())
            } else {
                table
                    .definition
                    .get_index(name)
                    .filter(|i| i.is_unique())
                    .map(|i| i.get_name().to_string())
            };

            let Some(index_name) = index_name else {
                return Err(Error::schema_operation(format!(
                    "Constraint \"{}\" does not exist on table \"{}\"",
                    name, table_name
                )));
            };

            table.definition.remove_index(&index_name);
            Ok(())
        })
    }

    fn list_table_names(&self) -> AsyncResult<'_, Vec<String>> {
        Box::pin(async move {
            let state = self.connection.state().await;
            Ok(state
                .database
                .tables
                .values()
                .map(|t| t.definition.get_name().to_string())
                .collect())
        })
    }

    fn introspect_table<'a>(&'a self, name: &'a str) -> AsyncResult<'a, Option<Table>> {
        Box::pin(async move {
            let state = self.connection.state().await;
            Ok(state
                .database
                .tables
                .get(&name.to_lowercase())
                .map(|t| t.definition.clone()))
        })
    }
}
