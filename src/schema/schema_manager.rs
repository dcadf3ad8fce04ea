use crate::schema::{Column, ForeignKeyConstraint, Index, Table};
use crate::{AsyncResult, Error};

/// Structural operations on a live schema.
///
/// Every operation validates its input against the current state of the
/// schema and fails with a schema operation error when it cannot be applied.
pub trait SchemaManager {
    /// Creates a table with the given columns, indexes and foreign keys.
    fn create_table<'a>(&'a self, table: &'a Table) -> AsyncResult<'a, ()>;

    fn drop_table<'a>(&'a self, name: &'a str) -> AsyncResult<'a, ()>;

    fn rename_table<'a>(&'a self, old_name: &'a str, new_name: &'a str) -> AsyncResult<'a, ()>;

    fn add_column<'a>(&'a self, table: &'a str, column: &'a Column) -> AsyncResult<'a, ()>;

    fn drop_column<'a>(&'a self, table: &'a str, column: &'a str) -> AsyncResult<'a, ()>;

    fn rename_column<'a>(
        &'a self,
        table: &'a str,
        old_name: &'a str,
        new_name: &'a str,
    ) -> AsyncResult<'a, ()>;

    /// Replaces the definition of an existing column.
    #[allow(unused_variables)]
    fn change_column<'a>(&'a self, table: &'a str, column: &'a Column) -> AsyncResult<'a, ()> {
        Box::pin(async {
            Err(Error::platform_feature_unsupported(
                "Changing a column definition is not supported by this platform",
            ))
        })
    }

    fn create_index<'a>(&'a self, table: &'a str, index: &'a Index) -> AsyncResult<'a, ()>;

    fn drop_index<'a>(&'a self, table: &'a str, name: &'a str) -> AsyncResult<'a, ()>;

    #[allow(unused_variables)]
    fn create_foreign_key<'a>(
        &'a self,
        table: &'a str,
        foreign_key: &'a ForeignKeyConstraint,
    ) -> AsyncResult<'a, ()> {
        Box::pin(async {
            Err(Error::platform_feature_unsupported(
                "Adding foreign keys to existing tables is not supported by this platform",
            ))
        })
    }

    #[allow(unused_variables)]
    fn drop_foreign_key<'a>(&'a self, table: &'a str, name: &'a str) -> AsyncResult<'a, ()> {
        Box::pin(async {
            Err(Error::platform_feature_unsupported(
                "Dropping foreign keys is not supported by this platform",
            ))
        })
    }

    /// Creates a unique or primary key constraint.
    #[allow(unused_variables)]
    fn create_constraint<'a>(&'a self, table: &'a str, constraint: &'a Index) -> AsyncResult<'a, ()> {
        Box::pin(async {
            Err(Error::platform_feature_unsupported(
                "Adding constraints to existing tables is not supported by this platform",
            ))
        })
    }

    #[allow(unused_variables)]
    fn drop_constraint<'a>(
        &'a self,
        table: &'a str,
        name: &'a str,
        primary: bool,
    ) -> AsyncResult<'a, ()> {
        Box::pin(async {
            Err(Error::platform_feature_unsupported(
                "Dropping constraints is not supported by this platform",
            ))
        })
    }

    fn list_table_names(&self) -> AsyncResult<'_, Vec<String>>;

    /// Returns the table definition, if the table exists.
    fn introspect_table<'a>(&'a self, name: &'a str) -> AsyncResult<'a, Option<Table>>;

    /// Whether all the given tables exist.
    fn tables_exist<'a>(&'a self, names: &'a [&'a str]) -> AsyncResult<'a, bool> {
        Box::pin(async move {
            let tables = self.list_table_names().await?;
            Ok(names
                .iter()
                .all(|name| tables.iter().any(|t| t.eq_ignore_ascii_case(name))))
        })
    }
}
