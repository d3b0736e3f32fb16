//! Types for the column lineage analysis API.
//!
//! Requests carry SQL text, a dialect and optional schema metadata; responses
//! carry per-statement output columns with the base-table columns they derive
//! from, plus any issues raised along the way.

mod common;
mod request;
mod response;

pub use common::{
    issue_codes, Issue, IssueCount, QualifiedObjectName, Severity, SourceColumn, SourcePosition,
    Summary,
};
pub use request::{
    AnalysisOptions, AnalyzeRequest, ColumnSchema, Dialect, SchemaMetadata, SchemaTable,
    SchemaView, DEFAULT_MAX_DEPTH,
};
pub use response::{AnalyzeResult, OutputColumn, StatementLineage, TableColumns};
