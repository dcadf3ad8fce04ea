use crate::schema::validate_identifier;
use crate::Result;
use std::path::PathBuf;

pub const DEFAULT_TABLE_NAME: &str = "migration_version";

const TABLE_NAME_ENV: &str = "MIGRATION_TABLE_NAME";
const DIRECTORIES_ENV: &str = "MIGRATION_DIRECTORIES";

#[derive(Clone, Debug)]
pub struct Configuration {
    table_name: String,
    directories: Vec<PathBuf>,
}

impl Configuration {
    pub fn new() -> Self {
        Self {
            table_name: DEFAULT_TABLE_NAME.to_string(),
            directories: vec![],
        }
    }

    /// Builds a configuration from `MIGRATION_TABLE_NAME` and
    /// `MIGRATION_DIRECTORIES` (a path list, separated as `PATH` is).
    pub fn from_env() -> Result<Self> {
        let mut configuration = Self::new();
        if let Ok(table_name) = std::env::var(TABLE_NAME_ENV) {
            configuration = configuration.with_table_name(&table_name)?;
        }

        if let Some(directories) = std::env::var_os(DIRECTORIES_ENV) {
            configuration = configuration.with_directories(std::env::split_paths(&directories));
        }

        Ok(configuration)
    }

    pub fn with_table_name(mut self, table_name: &str) -> Result<Self> {
        self.table_name = validate_identifier(table_name)?.to_string();
        Ok(self)
    }

    pub fn with_directories<I, P>(mut self, directories: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.directories = directories.into_iter().map(Into::into).collect();
        self
    }

    pub fn add_directory<P: Into<PathBuf>>(mut self, directory: P) -> Self {
        self.directories.push(directory.into());
        self
    }

    pub fn get_table_name(&self) -> &str {
        &self.table_name
    }

    pub fn get_directories(&self) -> &[PathBuf] {
        &self.directories
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Configuration::new()
    }
}
