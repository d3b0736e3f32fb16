//! Reduces a finished [`Analysis`] into column lineage.
//!
//! Nothing here resolves names again: the statement driver already recorded,
//! per projected column, every base-table column that fed it.

use crate::analyzer::{Analysis, StatementAnalysis};
use crate::types::{OutputColumn, StatementLineage, TableColumns};

/// One [`OutputColumn`] per projected expression, in projection order.
pub fn output_columns(analysis: &Analysis) -> Vec<OutputColumn> {
    analysis
        .output_columns()
        .iter()
        .map(|column| OutputColumn::new(column.name.clone(), column.sources.iter().cloned()))
        .collect()
}

/// Every base-table column read anywhere in the statement, grouped by table
/// in first-reference order.
pub fn table_columns(analysis: &Analysis) -> Vec<TableColumns> {
    analysis
        .table_column_references()
        .iter()
        .map(|(table, columns)| TableColumns {
            table: table.clone(),
            columns: columns.iter().cloned().collect(),
        })
        .collect()
}

pub fn project(
    analyzed: &StatementAnalysis,
    statement_index: usize,
    source_name: Option<String>,
) -> StatementLineage {
    StatementLineage {
        statement_index,
        statement_type: analyzed.statement.kind().to_string(),
        source_name,
        target: analyzed.analysis.target().cloned(),
        columns: output_columns(&analyzed.analysis),
        table_column_references: table_columns(&analyzed.analysis),
    }
}
