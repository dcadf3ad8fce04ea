use serial_test::serial;
use std::path::PathBuf;
use std::sync::Arc;
use strata::error::ErrorKind;
use strata::migrate::{migrations, DirectoryCache, Migration, Migrator, Registry};
use strata::schema::SchemaManager;
use strata::{Configuration, Connection};

migrations!(register_migrations, "tests/migrations");

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn definitions_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/definitions")
}

async fn user_tables(connection: &dyn Connection) -> Vec<String> {
    connection
        .create_schema_manager()
        .list_table_names()
        .await
        .unwrap()
        .into_iter()
        .filter(|name| name != "migration_version")
        .collect()
}

#[tokio::test]
async fn embedded_migrations_run_both_ways() {
    init_logger();
    let connection = strata::connect("memory://").unwrap();

    let mut registry = Registry::new();
    assert_eq!(register_migrations(&mut registry), [1, 2]);
    assert_eq!(
        registry.get(1).unwrap().get_description(),
        "create users table"
    );

    let mut migrator = Migrator::new(connection.as_ref(), registry);
    assert_eq!(migrator.migrate(None).await.unwrap(), 2);

    let users = connection
        .create_schema_manager()
        .introspect_table("users")
        .await
        .unwrap()
        .unwrap();
    assert!(users.has_column("email"));
    assert!(users.has_index("users_email"));

    assert_eq!(migrator.migrate(Some(1)).await.unwrap(), 1);
    let users = connection
        .create_schema_manager()
        .introspect_table("users")
        .await
        .unwrap()
        .unwrap();
    assert!(!users.has_column("email"));

    assert_eq!(migrator.migrate(Some(0)).await.unwrap(), 0);
    assert!(user_tables(connection.as_ref()).await.is_empty());
}

#[cfg(feature = "sqlite")]
#[tokio::test]
async fn embedded_migrations_run_on_sqlite() {
    init_logger();
    let connection = strata::connect("sqlite::memory:").unwrap();

    let mut registry = Registry::new();
    register_migrations(&mut registry);

    let mut migrator = Migrator::new(connection.as_ref(), registry);
    assert_eq!(migrator.migrate(None).await.unwrap(), 2);
    assert_eq!(migrator.get_current_version().await.unwrap(), 2);
    assert_eq!(user_tables(connection.as_ref()).await, ["users"]);

    assert_eq!(migrator.migrate(Some(0)).await.unwrap(), 0);
    assert!(user_tables(connection.as_ref()).await.is_empty());
    assert_eq!(migrator.get_current_version().await.unwrap(), 0);
}

#[tokio::test]
async fn definition_files_are_ordered_by_prefix() {
    init_logger();
    let connection = strata::connect("memory://").unwrap();
    let configuration = Configuration::new().add_directory(definitions_dir());

    let mut migrator = Migrator::from_configuration(connection.as_ref(), &configuration, None).unwrap();
    let descriptions = migrator
        .get_registry()
        .get_migrations()
        .iter()
        .map(|(v, m)| (*v, m.get_description().to_string()))
        .collect::<Vec<_>>();
    assert_eq!(
        descriptions,
        [
            (1, "create groups table".to_string()),
            (2, "rename group name".to_string()),
            (3, "010_add_group_description".to_string()),
        ]
    );

    assert_eq!(migrator.migrate(None).await.unwrap(), 3);
    let groups = connection
        .create_schema_manager()
        .introspect_table("groups")
        .await
        .unwrap()
        .unwrap();
    assert!(groups.has_column("title"));
    assert!(groups.has_column("description"));
    assert!(groups.has_index("groups_title"));

    assert_eq!(migrator.migrate(Some(1)).await.unwrap(), 1);
    let groups = connection
        .create_schema_manager()
        .introspect_table("groups")
        .await
        .unwrap()
        .unwrap();
    assert!(groups.has_column("name"));
    assert!(!groups.has_column("description"));
}

#[test]
fn shared_cache_keeps_versions_stable() {
    let cache = Arc::new(DirectoryCache::new());

    let mut first = Registry::with_cache(cache.clone());
    first.register(Migration::new("unrelated"), None);
    first.load(&[definitions_dir()]).unwrap();
    assert_eq!(first.get_latest_version(), 4);

    let mut second = Registry::with_cache(cache.clone());
    second.load(&[definitions_dir()]).unwrap();
    assert_eq!(second.get_latest_version(), 4);
    assert_eq!(
        second.get(2).unwrap().get_description(),
        "create groups table"
    );
}

#[tokio::test]
async fn dry_run_reports_the_target_version() {
    let connection = strata::connect("memory://").unwrap();
    let configuration = Configuration::new().add_directory(definitions_dir());
    let mut migrator = Migrator::from_configuration(connection.as_ref(), &configuration, None).unwrap();

    assert_eq!(migrator.migrate_dry_run(Some(2)).await.unwrap(), Some(2));
    assert_eq!(migrator.get_current_version().await.unwrap(), 0);
    assert!(user_tables(connection.as_ref()).await.is_empty());
}

#[tokio::test]
#[serial]
async fn configuration_can_come_from_env() {
    unsafe {
        std::env::set_var("MIGRATION_TABLE_NAME", "schema_history");
        std::env::set_var("MIGRATION_DIRECTORIES", definitions_dir());
    }

    let configuration = Configuration::from_env();

    unsafe {
        std::env::remove_var("MIGRATION_TABLE_NAME");
        std::env::remove_var("MIGRATION_DIRECTORIES");
    }

    let configuration = configuration.unwrap();
    let connection = strata::connect("memory://").unwrap();
    let mut migrator = Migrator::from_configuration(connection.as_ref(), &configuration, None).unwrap();
    migrator.migrate(None).await.unwrap();

    let schema_manager = connection.create_schema_manager();
    assert!(schema_manager.tables_exist(&["schema_history"]).await.unwrap());
}

#[tokio::test]
async fn invalid_dsn_is_rejected() {
    let err = strata::connect("oracle://localhost").err().unwrap();
    assert_eq!(err.kind(), ErrorKind::InvalidDsn);
}
