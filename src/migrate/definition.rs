use crate::migrate::change::Change;
use crate::migrate::migration::Migration;
use crate::{Error, Result};
use serde::Deserialize;
use std::path::Path;

/// A migration declared in a JSON file.
///
/// ```json
/// {
///     "name": "create users",
///     "up": [{ "type": "createTable", "table": { "name": "users", "columns": [...] } }],
///     "down": [{ "type": "dropTable", "table_name": "users" }]
/// }
/// ```
///
/// `migrate` can replace both `up` and `down`: its changes are written in
/// their "up" form and inverted when reverting.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MigrationDefinition {
    pub name: Option<String>,
    pub up: Option<Vec<Change>>,
    pub down: Option<Vec<Change>>,
    pub migrate: Option<Vec<Change>>,
}

impl MigrationDefinition {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::discovery(path.display(), e))?;
        let definition: MigrationDefinition =
            serde_json::from_str(&content).map_err(|e| Error::discovery(path.display(), e))?;

        definition.validate().map_err(|e| Error::discovery(path.display(), e))?;
        Ok(definition)
    }

    fn validate(&self) -> Result<()> {
        if self.up.is_none() && self.down.is_none() && self.migrate.is_none() {
            return Err(Error::schema_operation("no \"up\", \"down\" or \"migrate\" changes declared"));
        }

        Ok(())
    }

    /// Builds the migration, naming it after `default_name` when the
    /// definition carries no name.
    pub fn into_migration(self, default_name: &str) -> Migration {
        let mut migration = Migration::new(self.name.unwrap_or_else(|| default_name.to_string()));

        if let Some(up) = self.up {
            migration = migration.up(move |changes| {
                for change in up.iter() {
                    changes.push(change.clone());
                }

                Ok(())
            });
        }

        if let Some(down) = self.down {
            migration = migration.down(move |changes| {
                for change in down.iter() {
                    changes.push(change.clone());
                }

                Ok(())
            });
        }

        if let Some(declared) = self.migrate {
            migration = migration.migrate(move |changes, _| {
                for change in declared.iter() {
                    changes.declare_change(change)?;
                }

                Ok(())
            });
        }

        migration
    }
}

/// Loads the migration declared in the given file.
pub fn load_file(path: &Path) -> Result<Migration> {
    let default_name = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();

    Ok(MigrationDefinition::from_file(path)?.into_migration(&default_name))
}

#[cfg(test)]
mod tests {
    use super::load_file;
    use crate::error::ErrorKind;
    use crate::migrate::{ChangeSet, Direction};
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn loads_directional_definitions() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "001_create_users.json",
            r#"{
                "up": [
                    { "type": "createTable", "table": { "name": "users", "columns": [{ "name": "id", "type": "integer" }] } }
                ],
                "down": [
                    { "type": "drop_table", "table_name": "users" }
                ]
            }"#,
        );

        let migration = load_file(&path).unwrap();
        assert_eq!(migration.get_description(), "001_create_users");

        let mut changes = ChangeSet::new(Direction::Down);
        (migration.get_hook(Direction::Down).unwrap())(&mut changes).unwrap();
        assert_eq!(changes.get_changes()[0].get_type(), "drop_table");
    }

    #[test]
    fn migrate_definitions_are_inverted_going_down() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "002_add_email.json",
            r#"{
                "name": "add email",
                "migrate": [
                    { "type": "addColumn", "table_name": "users", "column": { "name": "email", "type": "string" } }
                ]
            }"#,
        );

        let migration = load_file(&path).unwrap();
        assert_eq!(migration.get_description(), "add email");
        assert!(migration.get_hook(Direction::Up).is_none());

        let mut changes = ChangeSet::new(Direction::Down);
        (migration.get_migrate_hook().unwrap())(&mut changes, Direction::Down).unwrap();
        assert_eq!(changes.get_changes()[0].get_type(), "removeColumn");
    }

    #[test]
    fn rejects_invalid_definitions() {
        let dir = tempfile::tempdir().unwrap();

        let path = write(&dir, "003_empty.json", "{}");
        assert_eq!(load_file(&path).unwrap_err().kind(), ErrorKind::DiscoveryError);

        let path = write(&dir, "004_broken.json", "{ \"up\": ");
        assert_eq!(load_file(&path).unwrap_err().kind(), ErrorKind::DiscoveryError);

        let path = write(&dir, "005_typo.json", r#"{ "upp": [] }"#);
        assert_eq!(load_file(&path).unwrap_err().kind(), ErrorKind::DiscoveryError);
    }

    #[test]
    fn change_types_are_kept_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "006_unknown.json",
            r#"{ "up": [{ "type": "frobnicate", "table_name": "users" }] }"#,
        );

        let migration = load_file(&path).unwrap();
        let mut changes = ChangeSet::new(Direction::Up);
        (migration.get_hook(Direction::Up).unwrap())(&mut changes).unwrap();
        assert_eq!(changes.get_changes()[0].get_type(), "frobnicate");
    }
}
