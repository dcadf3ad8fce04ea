use crate::migrate::definition;
use crate::migrate::migration::Migration;
use crate::{Error, Result};
use dashmap::DashMap;
use log::{debug, warn};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

const DEFINITION_EXTENSION: &str = "json";

#[derive(Clone)]
struct CachedMigration {
    path: PathBuf,
    migration: Arc<Migration>,
}

/// Remembers which version every discovered migration file got, per
/// directory.
///
/// Share one cache between registries (or keep it for the whole process) to
/// make repeated scans of the same directories assign the same versions.
#[derive(Default)]
pub struct DirectoryCache {
    directories: DashMap<PathBuf, BTreeMap<i64, CachedMigration>>,
}

impl DirectoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached directories.
    pub fn len(&self) -> usize {
        self.directories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.directories.is_empty()
    }

    pub fn contains<P: AsRef<Path>>(&self, directory: P) -> bool {
        self.directories.contains_key(directory.as_ref())
    }

    pub fn clear(&self) {
        self.directories.clear();
    }

    fn insert(&self, directory: PathBuf, version: i64, cached: CachedMigration) {
        self.directories
            .entry(directory)
            .or_default()
            .insert(version, cached);
    }

    /// Cached migrations found in the given directory or below it.
    fn entries_under(&self, root: &Path) -> Vec<(i64, CachedMigration)> {
        self.directories
            .iter()
            .filter(|entry| entry.key().starts_with(root))
            .flat_map(|entry| {
                entry
                    .value()
                    .iter()
                    .map(|(version, cached)| (*version, cached.clone()))
                    .collect::<Vec<_>>()
            })
            .collect()
    }
}

/// Ordered mapping from version number to migration.
///
/// Versions are assigned, never read from file names: every newly discovered
/// migration gets the current maximum plus one, in order of the numeric
/// prefix of its file name. The prefix only orders files; gaps or duplicates
/// in it have no effect on the resulting contiguous versions.
pub struct Registry {
    migrations: BTreeMap<i64, Arc<Migration>>,
    cache: Arc<DirectoryCache>,
}

impl Registry {
    pub fn new() -> Self {
        Self::with_cache(Arc::new(DirectoryCache::new()))
    }

    pub fn with_cache(cache: Arc<DirectoryCache>) -> Self {
        Self {
            migrations: BTreeMap::new(),
            cache,
        }
    }

    pub fn get_cache(&self) -> &Arc<DirectoryCache> {
        &self.cache
    }

    /// Discovers the migration definition files in the given directories,
    /// recursively.
    ///
    /// Files already in the cache keep the version they were given the first
    /// time. Files whose name does not start with a number, and files that do
    /// not hold a valid definition, are logged and skipped.
    ///
    /// Cached versions are reused as they are: if the cache was filled by a
    /// registry that had other migrations registered first, a fresh registry
    /// loading the same directory will not start at version 1 and runs
    /// through the missing versions fail with `MigrationNotFound`.
    pub fn load<P: AsRef<Path>>(&mut self, directories: &[P]) -> Result<()> {
        let mut candidates = vec![];
        for directory in directories {
            let directory = directory.as_ref();
            let root = directory
                .canonicalize()
                .map_err(|e| Error::discovery(directory.display(), e))?;

            let mut known = HashSet::new();
            for (version, cached) in self.cache.entries_under(&root) {
                known.insert(cached.path);
                self.migrations.insert(version, cached.migration);
            }

            let files = collect_files(&root)?;

            for path in files {
                if known.contains(&path)
                    || path.extension().is_none_or(|ext| ext != DEFINITION_EXTENSION)
                {
                    continue;
                }

                match version_hint(&path) {
                    Some(hint) => candidates.push((hint, path)),
                    None => {
                        warn!(target: "strata::registry", "Skipping \"{}\": file name does not start with a number", path.display())
                    }
                }
            }
        }

        candidates.sort();
        candidates.dedup_by(|a, b| a.1 == b.1);

        for (_, path) in candidates {
            match definition::load_file(&path) {
                Ok(migration) => {
                    self.register(migration, Some(&path));
                }
                Err(e) => warn!(target: "strata::registry", "Skipping migration: {}", e),
            }
        }

        Ok(())
    }

    /// Registers a migration under the next available version.
    ///
    /// When `source` is given, the migration is cached under its parent
    /// directory so later scans of that directory reuse it.
    pub fn register(&mut self, migration: Migration, source: Option<&Path>) -> i64 {
        let version = self.get_next_version();
        let migration = Arc::new(migration);
        debug!(target: "strata::registry", "Registered migration {} ({})", version, migration.get_description());

        if let Some(path) = source {
            let directory = path.parent().map(Path::to_path_buf).unwrap_or_default();
            self.cache.insert(
                directory,
                version,
                CachedMigration {
                    path: path.to_path_buf(),
                    migration: migration.clone(),
                },
            );
        }

        self.migrations.insert(version, migration);
        version
    }

    /// Registers migrations read from source files, in order of the number
    /// their file names start with (then by path).
    ///
    /// Returns the assigned versions, in registration order.
    pub fn register_sources<'a, I>(&mut self, sources: I) -> Vec<i64>
    where
        I: IntoIterator<Item = (Migration, &'a Path)>,
    {
        let mut sources = sources.into_iter().collect::<Vec<_>>();
        sources.sort_by(|(_, a), (_, b)| (version_hint(a), a).cmp(&(version_hint(b), b)));

        sources
            .into_iter()
            .map(|(migration, path)| self.register(migration, Some(path)))
            .collect()
    }

    pub fn get_migrations(&self) -> &BTreeMap<i64, Arc<Migration>> {
        &self.migrations
    }

    pub fn get(&self, version: i64) -> Result<Arc<Migration>> {
        self.migrations
            .get(&version)
            .cloned()
            .ok_or_else(|| Error::migration_not_found(version))
    }

    pub fn has(&self, version: i64) -> bool {
        self.migrations.contains_key(&version)
    }

    pub fn get_latest_version(&self) -> i64 {
        self.migrations.keys().next_back().copied().unwrap_or(0)
    }

    pub fn get_next_version(&self) -> i64 {
        self.get_latest_version() + 1
    }

    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

/// The number a file name starts with, as in `20240110_create_users.json`.
pub fn version_hint(path: &Path) -> Option<u64> {
    let stem = path.file_stem()?.to_str()?;
    let digits = stem
        .split('_')
        .next()?
        .chars()
        .take_while(char::is_ascii_digit)
        .collect::<String>();

    digits.parse().ok()
}

fn collect_files(root: &Path) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(Error::discovery(root.display(), "not a directory"));
    }

    let mut files = vec![];
    for entry in WalkDir::new(root).follow_links(true) {
        match entry {
            Ok(entry) if entry.file_type().is_file() => files.push(entry.into_path()),
            Ok(_) => {}
            Err(e) if e.depth() == 0 => return Err(Error::discovery(root.display(), e)),
            Err(e) => {
                let path = e.path().map(|p| p.display().to_string()).unwrap_or_default();
                warn!(target: "strata::registry", "Unable to read \"{}\": {}", path, e)
            }
        }
    }

    Ok(files)
}
