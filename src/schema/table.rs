use crate::schema::{Column, ForeignKeyConstraint, Index};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Table {
    name: String,
    columns: Vec<Column>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    indexes: Vec<Index>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    foreign_keys: Vec<ForeignKeyConstraint>,
}

impl Table {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            columns: vec![],
            indexes: vec![],
            foreign_keys: vec![],
        }
    }

    pub fn get_name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_name<S: Into<String>>(&mut self, name: S) {
        self.name = name.into();
    }

    pub fn get_columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn add_column(&mut self, column: Column) -> &mut Self {
        self.columns.push(column);
        self
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.get_column(name).is_some()
    }

    pub fn get_column(&self, name: &str) -> Option<&Column> {
        self.columns
            .iter()
            .find(|c| c.get_name().eq_ignore_ascii_case(name))
    }

    pub(crate) fn get_column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns
            .iter_mut()
            .find(|c| c.get_name().eq_ignore_ascii_case(name))
    }

    pub(crate) fn remove_column(&mut self, name: &str) -> Option<Column> {
        let pos = self
            .columns
            .iter()
            .position(|c| c.get_name().eq_ignore_ascii_case(name))?;

        Some(self.columns.remove(pos))
    }

    pub fn set_primary_key<C: AsRef<str>>(&mut self, columns: &[C]) -> Result<&mut Self> {
        if self.get_primary_key().is_some() {
            return Err(Error::schema_operation(format!(
                "Table \"{}\" already has a primary key",
                self.name
            )));
        }

        for column in columns {
            if !self.has_column(column.as_ref()) {
                return Err(Error::column_not_found(&self.name, column.as_ref()));
            }
        }

        self.indexes.push(Index::primary(columns));
        Ok(self)
    }

    pub fn get_primary_key(&self) -> Option<&Index> {
        self.indexes.iter().find(|i| i.is_primary())
    }

    pub fn add_index(&mut self, index: Index) -> &mut Self {
        self.indexes.push(index);
        self
    }

    pub fn get_indices(&self) -> &[Index] {
        &self.indexes
    }

    pub fn has_index(&self, name: &str) -> bool {
        self.get_index(name).is_some()
    }

    pub fn get_index(&self, name: &str) -> Option<&Index> {
        self.indexes
            .iter()
            .find(|i| i.get_name().eq_ignore_ascii_case(name))
    }

    pub(crate) fn remove_index(&mut self, name: &str) -> Option<Index> {
        let pos = self
            .indexes
            .iter()
            .position(|i| i.get_name().eq_ignore_ascii_case(name))?;

        Some(self.indexes.remove(pos))
    }

    pub fn add_foreign_key(&mut self, foreign_key: ForeignKeyConstraint) -> &mut Self {
        self.foreign_keys.push(foreign_key);
        self
    }

    pub fn get_foreign_keys(&self) -> &[ForeignKeyConstraint] {
        &self.foreign_keys
    }

    pub fn has_foreign_key(&self, name: &str) -> bool {
        self.foreign_keys
            .iter()
            .any(|f| f.get_name().eq_ignore_ascii_case(name))
    }

    pub(crate) fn remove_foreign_key(&mut self, name: &str) -> Option<ForeignKeyConstraint> {
        let pos = self
            .foreign_keys
            .iter()
            .position(|f| f.get_name().eq_ignore_ascii_case(name))?;

        Some(self.foreign_keys.remove(pos))
    }
}

#[cfg(test)]
mod tests {
    use crate::error::ErrorKind;
    use crate::schema::{Column, ColumnType, Index, Table};

    fn users() -> Table {
        let mut table = Table::new("users");
        table
            .add_column(Column::new("id", ColumnType::Integer).set_notnull(true))
            .add_column(Column::new("email", ColumnType::String).set_length(255));

        table
    }

    #[test]
    fn column_lookup_is_case_insensitive() {
        let table = users();
        assert!(table.has_column("EMAIL"));
        assert_eq!(table.get_column("Id").unwrap().get_type(), ColumnType::Integer);
        assert!(!table.has_column("name"));
    }

    #[test]
    fn primary_key_requires_existing_columns() {
        let mut table = users();
        let err = table.set_primary_key(&["uuid"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaOperationError);

        table.set_primary_key(&["id"]).unwrap();
        assert_eq!(table.get_primary_key().unwrap().get_columns(), ["id"]);

        let err = table.set_primary_key(&["email"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaOperationError);
    }

    #[test]
    fn serializes_to_json_and_back() {
        let mut table = users();
        table.add_index(Index::unique("users_email_uniq", &["email"]));

        let json = serde_json::to_value(&table).unwrap();
        assert_eq!(json["columns"][1]["type"], "string");
        assert_eq!(json["columns"][1]["length"], 255);

        let decoded: Table = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, table);
    }
}
