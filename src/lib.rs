extern crate self as strata;

pub mod configuration;
mod connection;
pub mod driver;
pub mod error;
pub mod migrate;
mod result;
pub mod schema;
pub mod sync;
mod value;

#[cfg(test)]
mod tests;

pub use configuration::Configuration;
pub use connection::Connection;
pub use driver::connect;
pub use error::Error;
pub use result::{AsyncResult, Result};
pub use value::Value;
