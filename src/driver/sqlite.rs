use crate::connection::Connection;
use crate::schema::{validate_identifier, Column, ColumnType, Index, SchemaManager, Table};
use crate::sync::{Mutex, MutexGuard};
use crate::{AsyncResult, Error, Result, Value};
use itertools::Itertools;
use log::debug;
use rusqlite::types::{ToSqlOutput, Value as SqliteValue};
use rusqlite::ToSql;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::NULL => ToSqlOutput::from(rusqlite::types::Null),
            Value::Boolean(value) => ToSqlOutput::from(*value),
            Value::Int(value) => ToSqlOutput::from(*value),
            Value::Float(value) => ToSqlOutput::from(*value),
            Value::String(value) => ToSqlOutput::from(value.as_str()),
        })
    }
}

impl From<SqliteValue> for Value {
    fn from(value: SqliteValue) -> Self {
        match value {
            SqliteValue::Null => Value::NULL,
            SqliteValue::Integer(value) => Value::Int(value),
            SqliteValue::Real(value) => Value::Float(value),
            SqliteValue::Text(value) => Value::String(value),
            SqliteValue::Blob(value) => Value::String(String::from_utf8_lossy(&value).into_owned()),
        }
    }
}

fn quote_identifier(name: &str) -> Result<String> {
    Ok(format!("\"{}\"", validate_identifier(name)?))
}

fn quote_identifiers(names: &[String]) -> Result<String> {
    Ok(names
        .iter()
        .map(|n| quote_identifier(n))
        .collect::<Result<Vec<_>>>()?
        .join(", "))
}

fn get_type_declaration_sql(column: &Column) -> String {
    match column.get_type() {
        ColumnType::Integer => "INTEGER".to_string(),
        ColumnType::BigInt => "BIGINT".to_string(),
        ColumnType::SmallInt => "SMALLINT".to_string(),
        ColumnType::Boolean => "BOOLEAN".to_string(),
        ColumnType::Float => "DOUBLE PRECISION".to_string(),
        ColumnType::Decimal => "NUMERIC".to_string(),
        ColumnType::String => format!("VARCHAR({})", column.get_length().unwrap_or(255)),
        ColumnType::Text => "CLOB".to_string(),
        ColumnType::Blob => "BLOB".to_string(),
        ColumnType::Date => "DATE".to_string(),
        ColumnType::DateTime => "DATETIME".to_string(),
        ColumnType::Time => "TIME".to_string(),
    }
}

fn get_column_type_from_declaration(declaration: &str) -> ColumnType {
    let declaration = declaration.to_uppercase();
    match declaration.as_str() {
        d if d.starts_with("BIGINT") => ColumnType::BigInt,
        d if d.starts_with("SMALLINT") => ColumnType::SmallInt,
        d if d.contains("INT") => ColumnType::Integer,
        d if d.starts_with("BOOLEAN") => ColumnType::Boolean,
        d if d.starts_with("DOUBLE") || d.starts_with("FLOAT") || d.starts_with("REAL") => {
            ColumnType::Float
        }
        d if d.starts_with("NUMERIC") || d.starts_with("DECIMAL") => ColumnType::Decimal,
        d if d.starts_with("VARCHAR") || d.starts_with("CHAR") => ColumnType::String,
        d if d.starts_with("BLOB") => ColumnType::Blob,
        d if d.starts_with("DATETIME") || d.starts_with("TIMESTAMP") => ColumnType::DateTime,
        d if d.starts_with("DATE") => ColumnType::Date,
        d if d.starts_with("TIME") => ColumnType::Time,
        _ => ColumnType::Text,
    }
}

fn get_default_value_sql(value: &Value) -> Option<String> {
    match value {
        Value::NULL => None,
        Value::Boolean(value) => Some(if *value { "1" } else { "0" }.to_string()),
        Value::Int(value) => Some(value.to_string()),
        Value::Float(value) => Some(value.to_string()),
        Value::String(value) => Some(format!("'{}'", value.replace('\'', "''"))),
    }
}

fn get_column_declaration_sql(column: &Column, inline_primary_key: bool) -> Result<String> {
    let mut sql = format!(
        "{} {}",
        quote_identifier(column.get_name())?,
        get_type_declaration_sql(column)
    );

    if inline_primary_key {
        sql.push_str(" PRIMARY KEY AUTOINCREMENT");
    }

    if column.is_notnull() {
        sql.push_str(" NOT NULL");
    }

    if let Some(default) = get_default_value_sql(column.get_default()) {
        sql.push_str(" DEFAULT ");
        sql.push_str(&default);
    }

    Ok(sql)
}

fn get_create_index_sql(table: &str, index: &Index) -> Result<String> {
    if index.is_primary() {
        return Err(Error::platform_feature_unsupported(
            "SQLite cannot add a primary key to an existing table",
        ));
    }

    Ok(format!(
        "CREATE {}INDEX {} ON {} ({})",
        if index.is_unique() { "UNIQUE " } else { "" },
        quote_identifier(index.get_name())?,
        quote_identifier(table)?,
        quote_identifiers(index.get_columns())?
    ))
}

fn get_create_table_sql(table: &Table) -> Result<Vec<String>> {
    let primary_key = table.get_primary_key();
    let inline_column = primary_key.and_then(|pk| {
        let [column] = pk.get_columns() else {
            return None;
        };

        table
            .get_column(column)
            .filter(|c| c.is_autoincrement())
            .map(|c| c.get_name().to_string())
    });

    let mut definitions = table
        .get_columns()
        .iter()
        .map(|c| get_column_declaration_sql(c, inline_column.as_deref() == Some(c.get_name())))
        .collect::<Result<Vec<_>>>()?;

    if let (Some(primary_key), None) = (primary_key, &inline_column) {
        definitions.push(format!(
            "PRIMARY KEY ({})",
            quote_identifiers(primary_key.get_columns())?
        ));
    }

    for foreign_key in table.get_foreign_keys() {
        let mut definition = format!(
            "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
            quote_identifier(foreign_key.get_name())?,
            quote_identifiers(foreign_key.get_local_columns())?,
            quote_identifier(foreign_key.get_foreign_table_name())?,
            quote_identifiers(foreign_key.get_foreign_columns())?
        );

        if let Some(action) = foreign_key.on_delete {
            definition.push_str(&format!(" ON DELETE {}", action));
        }

        if let Some(action) = foreign_key.on_update {
            definition.push_str(&format!(" ON UPDATE {}", action));
        }

        definitions.push(definition);
    }

    let mut sql = vec![format!(
        "CREATE TABLE {} ({})",
        quote_identifier(table.get_name())?,
        definitions.join(", ")
    )];

    for index in table.get_indices().iter().filter(|i| !i.is_primary()) {
        sql.push(get_create_index_sql(table.get_name(), index)?);
    }

    Ok(sql)
}

/// A connection to a SQLite database.
pub struct SqliteConnection {
    connection: Mutex<rusqlite::Connection>,
    transaction_nesting_level: AtomicUsize,
}

impl SqliteConnection {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::from_connection(rusqlite::Connection::open(path)?))
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::from_connection(rusqlite::Connection::open_in_memory()?))
    }

    pub fn from_connection(connection: rusqlite::Connection) -> Self {
        Self {
            connection: Mutex::new(connection),
            transaction_nesting_level: AtomicUsize::new(0),
        }
    }

    async fn lock(&self) -> MutexGuard<'_, rusqlite::Connection> {
        self.connection.lock().await
    }

    async fn execute_statements(&self, sql: Vec<String>) -> Result<()> {
        let connection = self.lock().await;
        for statement in sql {
            debug!(target: "strata::driver", "{}", statement);
            connection
                .execute(&statement, [])
                .map_err(|e| Error::schema_operation(e.to_string()))?;
        }

        Ok(())
    }

    fn get_savepoint_name(level: usize) -> String {
        format!("STRATA_SAVEPOINT_{}", level)
    }
}

impl Connection for SqliteConnection {
    fn begin_transaction(&self) -> AsyncResult<'_, ()> {
        Box::pin(async move {
            let connection = self.lock().await;
            let level = self.transaction_nesting_level.load(Ordering::SeqCst);
            if level == 0 {
                connection.execute_batch("BEGIN")?;
            } else {
                connection.execute_batch(&format!(
                    "SAVEPOINT {}",
                    Self::get_savepoint_name(level)
                ))?;
            }

            self.transaction_nesting_level.store(level + 1, Ordering::SeqCst);
            Ok(())
        })
    }

    fn commit(&self) -> AsyncResult<'_, ()> {
        Box::pin(async move {
            let connection = self.lock().await;
            let level = self.transaction_nesting_level.load(Ordering::SeqCst);
            match level {
                0 => return Err(Error::transaction("There is no active transaction")),
                1 => connection.execute_batch("COMMIT")?,
                _ => connection.execute_batch(&format!(
                    "RELEASE SAVEPOINT {}",
                    Self::get_savepoint_name(level - 1)
                ))?,
            }

            self.transaction_nesting_level.store(level - 1, Ordering::SeqCst);
            Ok(())
        })
    }

    fn roll_back(&self) -> AsyncResult<'_, ()> {
        Box::pin(async move {
            let connection = self.lock().await;
            let level = self.transaction_nesting_level.load(Ordering::SeqCst);
            match level {
                0 => return Err(Error::transaction("There is no active transaction")),
                1 => connection.execute_batch("ROLLBACK")?,
                _ => {
                    let savepoint = Self::get_savepoint_name(level - 1);
                    connection.execute_batch(&format!(
                        "ROLLBACK TO SAVEPOINT {0}; RELEASE SAVEPOINT {0}",
                        savepoint
                    ))?
                }
            }

            self.transaction_nesting_level.store(level - 1, Ordering::SeqCst);
            Ok(())
        })
    }

    fn is_transaction_active(&self) -> bool {
        self.transaction_nesting_level.load(Ordering::SeqCst) > 0
    }

    fn create_schema_manager(&self) -> Box<dyn SchemaManager + '_> {
        Box::new(SqliteSchemaManager { connection: self })
    }

    fn fetch_column<'a>(&'a self, table: &'a str, column: &'a str) -> AsyncResult<'a, Vec<Value>> {
        Box::pin(async move {
            let sql = format!(
                "SELECT {} FROM {}",
                quote_identifier(column)?,
                quote_identifier(table)?
            );

            let connection = self.lock().await;
            let mut statement = connection.prepare(&sql)?;
            let values = statement
                .query_map([], |row| row.get::<_, SqliteValue>(0))?
                .map_ok(Value::from)
                .collect::<rusqlite::Result<Vec<_>>>()?;

            Ok(values)
        })
    }

    fn insert<'a>(&'a self, table: &'a str, values: Vec<(&'a str, Value)>) -> AsyncResult<'a, usize> {
        Box::pin(async move {
            let columns = values
                .iter()
                .map(|(c, _)| quote_identifier(c))
                .collect::<Result<Vec<_>>>()?;
            let sql = format!(
                "INSERT INTO {} ({}) VALUES ({})",
                quote_identifier(table)?,
                columns.join(", "),
                values.iter().map(|_| "?").join(", ")
            );

            let connection = self.lock().await;
            let affected = connection.execute(
                &sql,
                rusqlite::params_from_iter(values.iter().map(|(_, v)| v)),
            )?;

            Ok(affected)
        })
    }

    fn update<'a>(&'a self, table: &'a str, values: Vec<(&'a str, Value)>) -> AsyncResult<'a, usize> {
        Box::pin(async move {
            let assignments = values
                .iter()
                .map(|(c, _)| quote_identifier(c).map(|c| format!("{} = ?", c)))
                .collect::<Result<Vec<_>>>()?;
            let sql = format!(
                "UPDATE {} SET {}",
                quote_identifier(table)?,
                assignments.join(", ")
            );

            let connection = self.lock().await;
            let affected = connection.execute(
                &sql,
                rusqlite::params_from_iter(values.iter().map(|(_, v)| v)),
            )?;

            Ok(affected)
        })
    }
}

pub struct SqliteSchemaManager<'conn> {
    connection: &'conn SqliteConnection,
}

impl SchemaManager for SqliteSchemaManager<'_> {
    fn create_table<'a>(&'a self, table: &'a Table) -> AsyncResult<'a, ()> {
        Box::pin(async move {
            let sql = get_create_table_sql(table)?;
            self.connection.execute_statements(sql).await
        })
    }

    fn drop_table<'a>(&'a self, name: &'a str) -> AsyncResult<'a, ()> {
        Box::pin(async move {
            let sql = format!("DROP TABLE {}", quote_identifier(name)?);
            self.connection.execute_statements(vec![sql]).await
        })
    }

    fn rename_table<'a>(&'a self, old_name: &'a str, new_name: &'a str) -> AsyncResult<'a, ()> {
        Box::pin(async move {
            let sql = format!(
                "ALTER TABLE {} RENAME TO {}",
                quote_identifier(old_name)?,
                quote_identifier(new_name)?
            );
            self.connection.execute_statements(vec![sql]).await
        })
    }

    fn add_column<'a>(&'a self, table: &'a str, column: &'a Column) -> AsyncResult<'a, ()> {
        Box::pin(async move {
            let sql = format!(
                "ALTER TABLE {} ADD COLUMN {}",
                quote_identifier(table)?,
                get_column_declaration_sql(column, false)?
            );
            self.connection.execute_statements(vec![sql]).await
        })
    }

    fn drop_column<'a>(&'a self, table: &'a str, column: &'a str) -> AsyncResult<'a, ()> {
        Box::pin(async move {
            let sql = format!(
                "ALTER TABLE {} DROP COLUMN {}",
                quote_identifier(table)?,
                quote_identifier(column)?
            );
            self.connection.execute_statements(vec![sql]).await
        })
    }

    fn rename_column<'a>(
        &'a self,
        table: &'a str,
        old_name: &'a str,
        new_name: &'a str,
    ) -> AsyncResult<'a, ()> {
        Box::pin(async move {
            let sql = format!(
                "ALTER TABLE {} RENAME COLUMN {} TO {}",
                quote_identifier(table)?,
                quote_identifier(old_name)?,
                quote_identifier(new_name)?
            );
            self.connection.execute_statements(vec![sql]).await
        })
    }

    fn create_index<'a>(&'a self, table: &'a str, index: &'a Index) -> AsyncResult<'a, ()> {
        Box::pin(async move {
            let sql = get_create_index_sql(table, index)?;
            self.connection.execute_statements(vec![sql]).await
        })
    }

    fn drop_index<'a>(&'a self, _: &'a str, name: &'a str) -> AsyncResult<'a, ()> {
        Box::pin(async move {
            let sql = format!("DROP INDEX {}", quote_identifier(name)?);
            self.connection.execute_statements(vec![sql]).await
        })
    }

    fn create_constraint<'a>(&'a self, table: &'a str, constraint: &'a Index) -> AsyncResult<'a, ()> {
        Box::pin(async move {
            if !constraint.is_unique() {
                return Err(Error::schema_operation(format!(
                    "Constraint \"{}\" must be either unique or primary",
                    constraint.get_name()
                )));
            }

            let sql = get_create_index_sql(table, constraint)?;
            self.connection.execute_statements(vec![sql]).await
        })
    }

    fn drop_constraint<'a>(
        &'a self,
        table: &'a str,
        name: &'a str,
        primary: bool,
    ) -> AsyncResult<'a, ()> {
        if primary {
            return Box::pin(async {
                Err(Error::platform_feature_unsupported(
                    "SQLite cannot drop the primary key of an existing table",
                ))
            });
        }

        self.drop_index(table, name)
    }

    fn list_table_names(&self) -> AsyncResult<'_, Vec<String>> {
        Box::pin(async move {
            let connection = self.connection.lock().await;
            let mut statement = connection.prepare(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
            )?;

            let names = statement
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            Ok(names)
        })
    }

    fn introspect_table<'a>(&'a self, name: &'a str) -> AsyncResult<'a, Option<Table>> {
        Box::pin(async move {
            let sql = format!("PRAGMA table_info({})", quote_identifier(name)?);
            let connection = self.connection.lock().await;
            let mut statement = connection.prepare(&sql)?;

            let rows = statement
                .query_map([], |row| {
                    Ok((
                        row.get::<_, String>("name")?,
                        row.get::<_, String>("type")?,
                        row.get::<_, bool>("notnull")?,
                        row.get::<_, i64>("pk")?,
                    ))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            if rows.is_empty() {
                return Ok(None);
            }

            let mut table = Table::new(name);
            let mut primary_key = vec![];
            for (column_name, declaration, notnull, pk) in rows.into_iter() {
                table.add_column(
                    Column::new(&column_name, get_column_type_from_declaration(&declaration))
                        .set_notnull(notnull),
                );

                if pk > 0 {
                    primary_key.push((pk, column_name));
                }
            }

            if !primary_key.is_empty() {
                let columns = primary_key
                    .into_iter()
                    .sorted()
                    .map(|(_, c)| c)
                    .collect::<Vec<_>>();
                table.set_primary_key(&columns)?;
            }

            Ok(Some(table))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{get_create_table_sql, SqliteConnection};
    use crate::connection::Connection;
    use crate::error::ErrorKind;
    use crate::schema::{Column, ColumnType, ForeignKeyConstraint, Index, ReferentialAction, Table};
    use crate::Value;

    fn users() -> Table {
        let mut table = Table::new("users");
        table
            .add_column(
                Column::new("id", ColumnType::Integer)
                    .set_notnull(true)
                    .set_autoincrement(true),
            )
            .add_column(Column::new("email", ColumnType::String).set_length(180))
            .add_column(Column::new("active", ColumnType::Boolean).set_default(true))
            .add_index(Index::unique("users_email_uniq", &["email"]));
        table.set_primary_key(&["id"]).unwrap();

        table
    }

    #[test]
    fn generates_create_table_sql() {
        let sql = get_create_table_sql(&users()).unwrap();
        assert_eq!(
            sql,
            vec![
                r#"CREATE TABLE "users" ("id" INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL, "email" VARCHAR(180), "active" BOOLEAN DEFAULT 1)"#,
                r#"CREATE UNIQUE INDEX "users_email_uniq" ON "users" ("email")"#,
            ]
        );

        let mut posts = Table::new("posts");
        posts
            .add_column(Column::new("id", ColumnType::Integer))
            .add_column(Column::new("user_id", ColumnType::Integer))
            .add_foreign_key(
                ForeignKeyConstraint::new("posts_user_fk", &["user_id"], "users", &["id"])
                    .set_on_delete(ReferentialAction::Cascade),
            );
        posts.set_primary_key(&["id"]).unwrap();

        assert_eq!(
            get_create_table_sql(&posts).unwrap(),
            vec![
                r#"CREATE TABLE "posts" ("id" INTEGER, "user_id" INTEGER, PRIMARY KEY ("id"), CONSTRAINT "posts_user_fk" FOREIGN KEY ("user_id") REFERENCES "users" ("id") ON DELETE CASCADE)"#,
            ]
        );
    }

    #[test]
    fn refuses_invalid_identifiers() {
        let table = Table::new("users; DROP TABLE x");
        let err = get_create_table_sql(&table).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidIdentifier);
    }

    #[tokio::test]
    async fn can_alter_a_live_schema() {
        let connection = SqliteConnection::open_in_memory().unwrap();
        let schema_manager = connection.create_schema_manager();

        schema_manager.create_table(&users()).await.unwrap();
        schema_manager
            .add_column("users", &Column::new("name", ColumnType::String))
            .await
            .unwrap();
        schema_manager
            .rename_column("users", "name", "full_name")
            .await
            .unwrap();

        let table = schema_manager.introspect_table("users").await.unwrap().unwrap();
        assert!(table.has_column("full_name"));
        assert_eq!(table.get_column("email").unwrap().get_type(), ColumnType::String);
        assert_eq!(table.get_primary_key().unwrap().get_columns(), ["id"]);

        schema_manager.drop_column("users", "full_name").await.unwrap();
        schema_manager.rename_table("users", "members").await.unwrap();
        assert_eq!(
            schema_manager.list_table_names().await.unwrap(),
            vec!["members".to_string()]
        );

        let err = schema_manager
            .change_column("members", &Column::new("email", ColumnType::Text))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PlatformFeatureUnsupported);
    }

    #[tokio::test]
    async fn roll_back_reverts_structural_changes() {
        let connection = SqliteConnection::open_in_memory().unwrap();
        let schema_manager = connection.create_schema_manager();

        connection.begin_transaction().await.unwrap();
        schema_manager.create_table(&users()).await.unwrap();
        connection.begin_transaction().await.unwrap();
        schema_manager.drop_table("users").await.unwrap();
        connection.roll_back().await.unwrap();
        assert!(schema_manager.tables_exist(&["users"]).await.unwrap());
        connection.roll_back().await.unwrap();

        assert!(!connection.is_transaction_active());
        assert!(!schema_manager.tables_exist(&["users"]).await.unwrap());
    }

    #[tokio::test]
    async fn can_read_and_write_rows() {
        let connection = SqliteConnection::open_in_memory().unwrap();
        let schema_manager = connection.create_schema_manager();
        let mut table = Table::new("migration_version");
        table.add_column(Column::new("version", ColumnType::Integer));
        schema_manager.create_table(&table).await.unwrap();

        connection
            .insert("migration_version", vec![("version", Value::Int(1))])
            .await
            .unwrap();
        let affected = connection
            .update("migration_version", vec![("version", Value::Int(4))])
            .await
            .unwrap();

        assert_eq!(affected, 1);
        assert_eq!(
            connection
                .fetch_column("migration_version", "version")
                .await
                .unwrap(),
            vec![Value::Int(4)]
        );
    }
}
