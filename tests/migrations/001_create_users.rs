use strata::migrate::ChangeSet;
use strata::schema::{Column, ColumnType, Table};

fn description() -> &'static str {
    "create users table"
}

fn up(changes: &mut ChangeSet) -> strata::Result<()> {
    let mut table = Table::new("users");
    table
        .add_column(
            Column::new("id", ColumnType::Integer)
                .set_notnull(true)
                .set_autoincrement(true),
        )
        .add_column(Column::new("name", ColumnType::String).set_length(255));
    table.set_primary_key(&["id"])?;

    changes.create_table(table);
    Ok(())
}

fn down(changes: &mut ChangeSet) -> strata::Result<()> {
    changes.drop_table("users");
    Ok(())
}
