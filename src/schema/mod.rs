mod column;
mod foreign_key_constraint;
mod identifier;
mod index;
mod schema_manager;
mod table;

pub use column::{Column, ColumnType};
pub use foreign_key_constraint::{ForeignKeyConstraint, ReferentialAction};
pub use identifier::{is_valid_identifier, validate_identifier};
pub use index::Index;
pub use schema_manager::SchemaManager;
pub use table::Table;
