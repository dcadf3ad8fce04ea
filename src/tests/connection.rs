use crate::connection::Connection;
use crate::driver::memory::MemoryConnection;
use crate::schema::SchemaManager;
use crate::sync::Mutex;
use crate::tests::MockSchemaManager;
use crate::{AsyncResult, Error, Value};
use std::fmt::{Debug, Formatter};

/// An in-memory connection recording every schema operation, with
/// injectable transaction failures.
#[derive(Default)]
pub struct MockConnection {
    inner: MemoryConnection,
    operations: Mutex<Vec<String>>,
    fail_commit: bool,
    fail_roll_back: bool,
}

impl MockConnection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_failing_commit(mut self, fail: bool) -> Self {
        self.fail_commit = fail;
        self
    }

    pub fn with_failing_roll_back(mut self, fail: bool) -> Self {
        self.fail_roll_back = fail;
        self
    }

    pub async fn get_operations(&self) -> Vec<String> {
        self.operations.lock().await.clone()
    }
}

impl Debug for MockConnection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockConnection").finish()
    }
}

impl Connection for MockConnection {
    fn begin_transaction(&self) -> AsyncResult<'_, ()> {
        self.inner.begin_transaction()
    }

    fn commit(&self) -> AsyncResult<'_, ()> {
        if self.fail_commit {
            return Box::pin(async { Err(Error::transaction("commit failed")) });
        }

        self.inner.commit()
    }

    fn roll_back(&self) -> AsyncResult<'_, ()> {
        if self.fail_roll_back {
            return Box::pin(async { Err(Error::transaction("roll back failed")) });
        }

        self.inner.roll_back()
    }

    fn is_transaction_active(&self) -> bool {
        self.inner.is_transaction_active()
    }

    fn create_schema_manager(&self) -> Box<dyn SchemaManager + '_> {
        Box::new(MockSchemaManager::new(
            self.inner.create_schema_manager(),
            &self.operations,
        ))
    }

    fn fetch_column<'a>(&'a self, table: &'a str, column: &'a str) -> AsyncResult<'a, Vec<Value>> {
        self.inner.fetch_column(table, column)
    }

    fn insert<'a>(&'a self, table: &'a str, values: Vec<(&'a str, Value)>) -> AsyncResult<'a, usize> {
        self.inner.insert(table, values)
    }

    fn update<'a>(&'a self, table: &'a str, values: Vec<(&'a str, Value)>) -> AsyncResult<'a, usize> {
        self.inner.update(table, values)
    }
}
