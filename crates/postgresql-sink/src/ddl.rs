//! PostgreSQL DDL generation from table schemas.

use sync_core::{Column, ColumnType, TableSchema};

pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn column_type_sql(column: &Column) -> String {
    match column.column_type {
        ColumnType::Integer => "BIGINT".to_string(),
        ColumnType::String => match column.max_length {
            Some(length) => format!("VARCHAR({length})"),
            None => "TEXT".to_string(),
        },
        ColumnType::Float => "DOUBLE PRECISION".to_string(),
        ColumnType::Boolean => "BOOLEAN".to_string(),
        ColumnType::Timestamp => "TIMESTAMPTZ".to_string(),
    }
}

pub(crate) fn create_table_sql(schema: &TableSchema) -> String {
    let columns: Vec<String> = schema
        .columns()
        .iter()
        .map(|column| {
            let mut def = format!("{} {}", quote_ident(&column.name), column_type_sql(column));
            if column.primary_key {
                def.push_str(" NOT NULL PRIMARY KEY");
            }
            def
        })
        .collect();

    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        quote_ident(schema.name()),
        columns.join(", ")
    )
}

pub(crate) fn insert_sql<'a>(table: &str, columns: impl Iterator<Item = &'a str>) -> String {
    let mut names = Vec::new();
    let mut placeholders = Vec::new();
    for (idx, column) in columns.enumerate() {
        names.push(quote_ident(column));
        placeholders.push(format!("${}", idx + 1));
    }
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(table),
        names.join(", "),
        placeholders.join(", ")
    )
}
