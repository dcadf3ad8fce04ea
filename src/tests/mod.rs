mod connection;

pub use connection::MockConnection;
pub use schema_manager::MockSchemaManager;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}
