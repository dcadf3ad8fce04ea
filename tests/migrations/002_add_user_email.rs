use strata::migrate::{ChangeSet, Direction};
use strata::schema::{Column, ColumnType, Index};

fn description() -> &'static str {
    "add email to users"
}

fn migrate(changes: &mut ChangeSet, _direction: Direction) -> strata::Result<()> {
    changes.column(
        "users",
        Column::new("email", ColumnType::String).set_length(180),
    )?;
    changes.index("users", Index::unique("users_email", &["email"]))?;

    Ok(())
}

fn post_up(changes: &ChangeSet) -> strata::Result<()> {
    if changes.num_changes() != 2 {
        return Err(strata::Error::schema_operation("email changes were not recorded"));
    }

    Ok(())
}
