//! Schema loading from JSON metadata or DDL files.

use anyhow::{bail, Context, Result};
use colscope_core::{
    parse_sql_with_dialect, ColumnSchema, Dialect, SchemaMetadata, SchemaTable, SchemaView,
};
use sqlparser::ast::{ObjectName, Statement};
use std::path::Path;

/// Load schema metadata from `path`.
///
/// `.json` files (or any file whose content starts with `{`) are read as a
/// serialized [`SchemaMetadata`]. Anything else is treated as DDL.
pub fn load_schema(path: &Path, dialect: Dialect) -> Result<SchemaMetadata> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read schema file: {}", path.display()))?;

    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
        || content.trim_start().starts_with('{');
    if is_json {
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse schema JSON: {}", path.display()))
    } else {
        parse_schema_ddl(&content, dialect)
    }
}

/// Collect tables from `CREATE TABLE` and views from `CREATE VIEW`.
///
/// View bodies are kept as SQL and expanded at analysis time, so a view may
/// refer to tables declared later in the file.
fn parse_schema_ddl(content: &str, dialect: Dialect) -> Result<SchemaMetadata> {
    let statements = parse_sql_with_dialect(content, dialect)
        .map_err(|e| anyhow::anyhow!("Failed to parse schema DDL: {e}"))?;

    let mut schema = SchemaMetadata::default();
    for statement in &statements {
        match statement {
            Statement::CreateTable(create) if create.query.is_none() => {
                let (catalog, schema_name, name) = split_name(&create.name)?;
                schema.tables.push(SchemaTable {
                    catalog,
                    schema: schema_name,
                    name,
                    columns: create
                        .columns
                        .iter()
                        .map(|column| {
                            ColumnSchema::typed(&column.name.value, column.data_type.to_string())
                        })
                        .collect(),
                });
            }
            Statement::CreateView {
                name,
                columns,
                query,
                ..
            } => {
                let (catalog, schema_name, name) = split_name(name)?;
                let sql = if columns.is_empty() {
                    query.to_string()
                } else {
                    let aliases = columns
                        .iter()
                        .map(|column| column.name.to_string())
                        .collect::<Vec<_>>()
                        .join(", ");
                    format!("SELECT * FROM ({query}) AS view_body({aliases})")
                };
                schema.views.push(SchemaView {
                    catalog,
                    schema: schema_name,
                    name,
                    sql,
                    dialect,
                });
            }
            other => {
                let text = other.to_string();
                let keyword = text.split_whitespace().take(2).collect::<Vec<_>>().join(" ");
                bail!("Schema DDL may only contain CREATE TABLE and CREATE VIEW, found {keyword}");
            }
        }
    }

    if schema.tables.is_empty() && schema.views.is_empty() {
        bail!("Schema DDL produced no table definitions");
    }
    Ok(schema)
}

fn split_name(name: &ObjectName) -> Result<(Option<String>, Option<String>, String)> {
    let mut parts = name
        .0
        .iter()
        .map(|part| {
            part.as_ident()
                .map(|ident| ident.value.clone())
                .with_context(|| format!("Unsupported object name: {name}"))
        })
        .collect::<Result<Vec<_>>>()?;

    let Some(object) = parts.pop() else {
        bail!("Empty object name");
    };
    let schema = parts.pop();
    let catalog = parts.pop();
    if !parts.is_empty() {
        bail!("Object name has too many parts: {name}");
    }
    Ok((catalog, schema, object))
}
