use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferentialAction {
    Cascade,
    SetNull,
    NoAction,
    Restrict,
    SetDefault,
}

impl Display for ReferentialAction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ReferentialAction::Cascade => "CASCADE",
            ReferentialAction::SetNull => "SET NULL",
            ReferentialAction::NoAction => "NO ACTION",
            ReferentialAction::Restrict => "RESTRICT",
            ReferentialAction::SetDefault => "SET DEFAULT",
        })
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ForeignKeyConstraint {
    name: String,
    local_columns: Vec<String>,
    foreign_table: String,
    foreign_columns: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_update: Option<ReferentialAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_delete: Option<ReferentialAction>,
}

impl ForeignKeyConstraint {
    pub fn new<N, LC, FT, FC>(
        name: N,
        local_columns: &[LC],
        foreign_table: FT,
        foreign_columns: &[FC],
    ) -> Self
    where
        N: Into<String>,
        LC: AsRef<str>,
        FT: Into<String>,
        FC: AsRef<str>,
    {
        Self {
            name: name.into(),
            local_columns: local_columns.iter().map(|c| c.as_ref().to_string()).collect(),
            foreign_table: foreign_table.into(),
            foreign_columns: foreign_columns
                .iter()
                .map(|c| c.as_ref().to_string())
                .collect(),
            on_update: None,
            on_delete: None,
        }
    }

    pub fn get_name(&self) -> &str {
        &self.name
    }

    pub fn get_local_columns(&self) -> &[String] {
        &self.local_columns
    }

    pub fn get_foreign_table_name(&self) -> &str {
        &self.foreign_table
    }

    pub fn get_foreign_columns(&self) -> &[String] {
        &self.foreign_columns
    }

    pub fn set_on_delete(mut self, action: ReferentialAction) -> Self {
        self.on_delete = Some(action);
        self
    }

    pub fn set_on_update(mut self, action: ReferentialAction) -> Self {
        self.on_update = Some(action);
        self
    }
}
