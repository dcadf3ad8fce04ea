use crate::Value;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Integer,
    BigInt,
    SmallInt,
    Boolean,
    Float,
    Decimal,
    String,
    Text,
    Blob,
    Date,
    DateTime,
    Time,
}

impl Display for ColumnType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ColumnType::Integer => "integer",
            ColumnType::BigInt => "big_int",
            ColumnType::SmallInt => "small_int",
            ColumnType::Boolean => "boolean",
            ColumnType::Float => "float",
            ColumnType::Decimal => "decimal",
            ColumnType::String => "string",
            ColumnType::Text => "text",
            ColumnType::Blob => "blob",
            ColumnType::Date => "date",
            ColumnType::DateTime => "date_time",
            ColumnType::Time => "time",
        };

        write!(f, "{}", name)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Column {
    name: String,
    #[serde(rename = "type")]
    column_type: ColumnType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    length: Option<usize>,
    #[serde(default)]
    notnull: bool,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    default: Value,
    #[serde(default)]
    autoincrement: bool,
}

impl Column {
    pub fn new<S: Into<String>>(name: S, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            length: None,
            notnull: false,
            default: Value::NULL,
            autoincrement: false,
        }
    }

    pub fn get_name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_name<S: Into<String>>(&mut self, name: S) {
        self.name = name.into();
    }

    pub fn get_type(&self) -> ColumnType {
        self.column_type
    }

    pub fn get_length(&self) -> Option<usize> {
        self.length
    }

    pub fn is_notnull(&self) -> bool {
        self.notnull
    }

    pub fn get_default(&self) -> &Value {
        &self.default
    }

    pub fn is_autoincrement(&self) -> bool {
        self.autoincrement
    }

    pub fn set_length(mut self, length: usize) -> Self {
        self.length = Some(length);
        self
    }

    pub fn set_notnull(mut self, notnull: bool) -> Self {
        self.notnull = notnull;
        self
    }

    pub fn set_default<V: Into<Value>>(mut self, default: V) -> Self {
        self.default = default.into();
        self
    }

    pub fn set_autoincrement(mut self, autoincrement: bool) -> Self {
        self.autoincrement = autoincrement;
        self
    }
}
