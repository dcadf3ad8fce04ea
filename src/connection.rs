use crate::schema::SchemaManager;
use crate::{AsyncResult, Value};

/// A live database connection the migrator works against.
///
/// The connection is owned by the caller. The migrator only borrows it for
/// the duration of a run and brackets its work in a single transaction.
pub trait Connection: Send + Sync {
    fn begin_transaction(&self) -> AsyncResult<'_, ()>;

    fn commit(&self) -> AsyncResult<'_, ()>;

    fn roll_back(&self) -> AsyncResult<'_, ()>;

    /// Whether a transaction is currently active.
    fn is_transaction_active(&self) -> bool;

    /// Creates a schema manager operating on this connection.
    fn create_schema_manager(&self) -> Box<dyn SchemaManager + '_>;

    /// Fetches every value of the given column, in row order.
    fn fetch_column<'a>(&'a self, table: &'a str, column: &'a str) -> AsyncResult<'a, Vec<Value>>;

    /// Inserts a row, returning the number of affected rows.
    fn insert<'a>(&'a self, table: &'a str, values: Vec<(&'a str, Value)>) -> AsyncResult<'a, usize>;

    /// Sets the given values on every row of the table, returning the number
    /// of affected rows.
    fn update<'a>(&'a self, table: &'a str, values: Vec<(&'a str, Value)>) -> AsyncResult<'a, usize>;
}
