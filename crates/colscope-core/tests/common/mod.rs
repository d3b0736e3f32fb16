#![allow(dead_code)]

use colscope_core::{analyze, AnalyzeRequest, AnalyzeResult, Dialect, SchemaMetadata};
use std::path::PathBuf;

pub fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
}

/// Load a schema JSON fixture by name
pub fn load_schema_fixture(name: &str) -> SchemaMetadata {
    let path = fixtures_dir().join("schemas").join(name);
    let content = std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("Failed to load schema {path:?}: {e}"));
    serde_json::from_str(&content)
        .unwrap_or_else(|e| panic!("Failed to parse schema {path:?}: {e}"))
}

pub fn warehouse() -> SchemaMetadata {
    load_schema_fixture("warehouse.json")
}

pub fn run_analysis(sql: &str) -> AnalyzeResult {
    run_analysis_with_dialect(sql, Dialect::Generic)
}

pub fn run_analysis_with_dialect(sql: &str, dialect: Dialect) -> AnalyzeResult {
    let request = AnalyzeRequest::new(sql)
        .with_dialect(dialect)
        .with_schema(warehouse());
    analyze(&request)
}

/// `(name, ["schema.table.column", ...])` for each output column of the
/// statement at `index`.
pub fn column_lineage(result: &AnalyzeResult, index: usize) -> Vec<(String, Vec<String>)> {
    let statement = result
        .statement(index)
        .unwrap_or_else(|| panic!("statement {index} failed: {:?}", result.issues));
    statement
        .columns
        .iter()
        .map(|column| {
            (
                column.name.clone(),
                column.sources.iter().map(ToString::to_string).collect(),
            )
        })
        .collect()
}

pub fn sources_of(result: &AnalyzeResult, index: usize, name: &str) -> Vec<String> {
    column_lineage(result, index)
        .into_iter()
        .find(|(column, _)| column == name)
        .map(|(_, sources)| sources)
        .unwrap_or_else(|| panic!("no output column {name}"))
}

/// Codes of all issues, in reporting order.
pub fn issue_codes(result: &AnalyzeResult) -> Vec<&str> {
    result.issues.iter().map(|issue| issue.code.as_str()).collect()
}

/// Clears positions and sorts issues so snapshots only track lineage and
/// issue identity.
pub fn prepare_for_snapshot(mut result: AnalyzeResult) -> AnalyzeResult {
    for issue in &mut result.issues {
        issue.position = None;
    }
    result.issues.sort_by(|a, b| {
        a.statement_index
            .cmp(&b.statement_index)
            .then_with(|| a.code.cmp(&b.code))
            .then_with(|| a.message.cmp(&b.message))
    });
    result
}
