//! Response types for the column lineage analysis API.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::common::{Issue, QualifiedObjectName, SourceColumn, Summary};

/// The result of analyzing SQL for column lineage.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeResult {
    /// Lineage of every statement that analyzed successfully
    pub statements: Vec<StatementLineage>,

    /// All issues encountered during analysis
    pub issues: Vec<Issue>,

    /// Summary statistics
    pub summary: Summary,
}

impl AnalyzeResult {
    /// Looks up the lineage of the statement at `index` in the input.
    pub fn statement(&self, index: usize) -> Option<&StatementLineage> {
        self.statements
            .iter()
            .find(|statement| statement.statement_index == index)
    }
}

/// Lineage information for a single SQL statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatementLineage {
    /// Zero-based index of the statement in the input SQL
    pub statement_index: usize,

    /// Type of SQL statement (`SELECT`, `INSERT`, `CREATE_VIEW`, `CREATE_TABLE_AS`)
    pub statement_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_name: Option<String>,

    /// Written table or view, for statements that have one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<QualifiedObjectName>,

    /// One entry per projected column, in projection order
    pub columns: Vec<OutputColumn>,

    /// Every base-table column the statement reads, anywhere in the statement
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub table_column_references: Vec<TableColumns>,
}

/// One projected column and the base-table columns it derives from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OutputColumn {
    pub name: String,
    pub sources: BTreeSet<SourceColumn>,
}

impl OutputColumn {
    pub fn new(name: impl Into<String>, sources: impl IntoIterator<Item = SourceColumn>) -> Self {
        Self {
            name: name.into(),
            sources: sources.into_iter().collect(),
        }
    }
}

/// Columns of one table referenced by a statement, in first-reference order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TableColumns {
    pub table: QualifiedObjectName,
    pub columns: Vec<String>,
}
