use itertools::Itertools;
use std::backtrace::Backtrace;
use std::fmt::{Debug, Display, Formatter};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    DiscoveryError = 1,
    InvalidChangeType = 2,
    InvalidChangePayload = 3,
    SchemaOperationError = 4,
    PlatformFeatureUnsupported = 5,
    InvalidIdentifier = 6,

    AlreadyAtVersion = 101,
    MigrationNotFound = 102,
    IrreversibleMigration = 103,
    AggregateMigration = 104,

    TransactionError = 201,
    InvalidDsn = 202,

    UnknownError = -1,
}

pub struct Error {
    kind: ErrorKind,
    inner: Box<dyn std::error::Error + Send + Sync>,
    backtrace: Backtrace,
}

pub struct StdError(Error);

impl Display for StdError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0.to_string(), f)
    }
}

impl Debug for StdError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0.to_string(), f)
    }
}

impl std::error::Error for StdError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.0.inner.as_ref())
    }
}

impl From<Error> for StdError {
    fn from(e: Error) -> Self {
        StdError(e)
    }
}

impl Error {
    pub fn new<E>(kind: ErrorKind, error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Error {
            kind,
            inner: error.into(),
            backtrace: Backtrace::capture(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }

    pub fn discovery<P: Display, E: Display>(path: P, reason: E) -> Self {
        Self::new(
            ErrorKind::DiscoveryError,
            format!("Unable to load migration from \"{}\": {}", path, reason),
        )
    }

    pub fn invalid_change_type(change_type: &str) -> Self {
        Self::new(
            ErrorKind::InvalidChangeType,
            format!("Invalid migration change type: {}", change_type),
        )
    }

    pub fn invalid_change_payload<E: Display>(change_type: &str, reason: E) -> Self {
        Self::new(
            ErrorKind::InvalidChangePayload,
            format!("Invalid payload for change \"{}\": {}", change_type, reason),
        )
    }

    pub fn schema_operation<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorKind::SchemaOperationError, message.into())
    }

    pub fn table_not_found(table: &str) -> Self {
        Self::schema_operation(format!("Table \"{}\" does not exist", table))
    }

    pub fn table_already_exists(table: &str) -> Self {
        Self::schema_operation(format!("Table \"{}\" already exists", table))
    }

    pub fn column_not_found(table: &str, column: &str) -> Self {
        Self::schema_operation(format!(
            "Column \"{}\" does not exist on table \"{}\"",
            column, table
        ))
    }

    pub fn column_already_exists(table: &str, column: &str) -> Self {
        Self::schema_operation(format!(
            "Column \"{}\" already exists on table \"{}\"",
            column, table
        ))
    }

    pub fn platform_feature_unsupported<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorKind::PlatformFeatureUnsupported, message.into())
    }

    pub fn invalid_identifier(identifier: &str) -> Self {
        Self::new(
            ErrorKind::InvalidIdentifier,
            format!("\"{}\" is not a valid identifier", identifier),
        )
    }

    pub fn already_at_version(version: i64) -> Self {
        Self::new(
            ErrorKind::AlreadyAtVersion,
            format!("Already at version # {}", version),
        )
    }

    pub fn migration_not_found(version: i64) -> Self {
        Self::new(
            ErrorKind::MigrationNotFound,
            format!(
                "Could not find migration for migration step: {}",
                version
            ),
        )
    }

    pub fn irreversible_migration<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorKind::IrreversibleMigration, message.into())
    }

    pub fn transaction<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorKind::TransactionError, message.into())
    }

    pub fn invalid_dsn(dsn: &str) -> Self {
        Self::new(
            ErrorKind::InvalidDsn,
            format!("Unable to create a connection from DSN \"{}\"", dsn),
        )
    }

    /// Bundles all the errors collected during a migration run into a single error.
    pub fn aggregate(errors: &[Error]) -> Self {
        let title = format!("{} error(s) encountered during migration", errors.len());
        let messages = errors
            .iter()
            .enumerate()
            .map(|(i, e)| format!(" Error #{} - {}", i + 1, e))
            .join("\n");

        Self::new(
            ErrorKind::AggregateMigration,
            format!("{}\n{}\n{}", title, "=".repeat(title.len()), messages),
        )
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.inner)
    }
}

impl Debug for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}\nBacktrace:\n{}", self.inner, self.backtrace)
    }
}

impl<T> From<T> for Error
where
    T: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    fn from(err: T) -> Self {
        crate::error::Error::new(ErrorKind::UnknownError, err)
    }
}

#[cfg(test)]
mod tests {
    use super::{Error, ErrorKind};

    #[test]
    fn aggregate_lists_every_error_with_its_index() {
        let errors = vec![
            Error::already_at_version(3),
            Error::invalid_change_type("frobnicate"),
        ];

        let aggregate = Error::aggregate(&errors);
        assert_eq!(aggregate.kind(), ErrorKind::AggregateMigration);

        let message = aggregate.to_string();
        let mut lines = message.lines();
        assert_eq!(
            lines.next(),
            Some("2 error(s) encountered during migration")
        );
        assert_eq!(lines.next(), Some("=".repeat(39).as_str()));
        assert_eq!(lines.next(), Some(" Error #1 - Already at version # 3"));
        assert_eq!(
            lines.next(),
            Some(" Error #2 - Invalid migration change type: frobnicate")
        );
    }

    #[test]
    fn foreign_errors_are_unknown() {
        let err: Error = std::io::Error::other("boom").into();
        assert_eq!(err.kind(), ErrorKind::UnknownError);
        assert_eq!(err.to_string(), "boom");
    }
}
