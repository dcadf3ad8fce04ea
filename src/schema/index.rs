use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Index {
    name: String,
    columns: Vec<String>,
    #[serde(default)]
    unique: bool,
    #[serde(default)]
    primary: bool,
}

impl Index {
    pub fn new<N, C>(name: N, columns: &[C], unique: bool, primary: bool) -> Self
    where
        N: Into<String>,
        C: AsRef<str>,
    {
        Self {
            name: name.into(),
            columns: columns.iter().map(|c| c.as_ref().to_string()).collect(),
            unique: unique || primary,
            primary,
        }
    }

    pub fn unique<N: Into<String>, C: AsRef<str>>(name: N, columns: &[C]) -> Self {
        Self::new(name, columns, true, false)
    }

    pub fn primary<C: AsRef<str>>(columns: &[C]) -> Self {
        Self::new("primary", columns, true, true)
    }

    pub fn get_name(&self) -> &str {
        &self.name
    }

    pub fn get_columns(&self) -> &[String] {
        &self.columns
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }

    pub fn is_primary(&self) -> bool {
        self.primary
    }

    /// Whether the index spans the given column.
    pub fn spans_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c.eq_ignore_ascii_case(column))
    }
}
