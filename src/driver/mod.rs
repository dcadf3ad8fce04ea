pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;

use crate::connection::Connection;
use crate::{Error, Result};
use log::debug;
#[cfg(feature = "sqlite")]
use url::Url;

/// Creates a connection from a DSN.
///
/// Supported forms are `memory://`, `sqlite::memory:`, `sqlite://:memory:`,
/// `sqlite:///absolute/path.db` and `sqlite://relative.db`.
pub fn connect(dsn: &str) -> Result<Box<dyn Connection>> {
    let scheme = dsn.split(':').next().unwrap_or_default();
    debug!(target: "strata::driver", "Creating {} connection", scheme);

    match scheme {
        "memory" => Ok(Box::new(memory::MemoryConnection::new())),
        #[cfg(feature = "sqlite")]
        "sqlite" => {
            if dsn == "sqlite::memory:" || dsn.starts_with("sqlite://:memory:") {
                return Ok(Box::new(sqlite::SqliteConnection::open_in_memory()?));
            }

            let url = Url::parse(dsn).map_err(|_| Error::invalid_dsn(dsn))?;
            let target = match url.host_str() {
                Some(host) if !host.is_empty() => format!("{}{}", host, url.path()),
                _ => url.path().to_string(),
            };

            if target.is_empty() || target == "/" {
                return Err(Error::invalid_dsn(dsn));
            }

            Ok(Box::new(sqlite::SqliteConnection::open(target)?))
        }
        _ => Err(Error::invalid_dsn(dsn)),
    }
}
