//! Semantic analysis of lowered statements.
//!
//! [`analyze`] is the request-level entry point: it parses a script, analyzes
//! every statement on its own and projects each successful analysis into
//! column lineage. Failures never abort the script; they become [`Issue`]s
//! attached to the statement that raised them.

mod analysis;
mod context;
mod data_type;
mod expression;
mod field;
mod pattern;
mod scope;
mod statement;
mod window;

#[cfg(test)]
mod tests;

pub use analysis::{Analysis, LabelDereference, OutputColumnSpec, ResolvedWindow};
pub use context::{Context, CorrelationSupport};
pub use data_type::{RowField, Type};
pub use expression::{ExpressionAnalyzer, NoSubqueries, QueryAnalyzer};
pub use field::{Field, FieldId, RelationId, RelationType};
pub use pattern::{analyze_pattern, PatternAnalysis};
pub use scope::{NamedQuery, ResolvedField, Scope, ScopeBuilder, ScopeId};
pub use statement::StatementAnalyzer;

use crate::ast::{Ast, Statement};
use crate::error::{AnalysisError, ParseError, ParseErrorKind};
use crate::lineage;
use crate::metadata::{MetadataService, SchemaMetadataService};
use crate::parser::{parse_statements, LoweredStatement};
use crate::types::{
    issue_codes, AnalyzeRequest, AnalyzeResult, Issue, IssueCount, Severity, SourcePosition,
    StatementLineage, Summary,
};
use std::sync::Arc;
#[cfg(feature = "tracing")]
use tracing::{debug, info_span};

/// Everything known about one analyzed statement.
#[derive(Debug)]
pub struct StatementAnalysis {
    pub ast: Ast,
    pub statement: Statement,
    pub analysis: Analysis,
    /// Output scope of the statement's query.
    pub scope: Arc<Scope>,
}

/// Analyzes one lowered statement against `metadata`.
pub fn analyze_statement(
    lowered: LoweredStatement,
    metadata: &dyn MetadataService,
    max_depth: usize,
) -> Result<StatementAnalysis, AnalysisError> {
    let LoweredStatement {
        ast,
        statement,
        location,
    } = lowered;
    let mut analysis = Analysis::new(max_depth);
    let scope = StatementAnalyzer::new(&ast, metadata)
        .analyze(&statement, &mut analysis)
        .map_err(|e| e.at(location))?;
    Ok(StatementAnalysis {
        ast,
        statement,
        analysis,
        scope,
    })
}

/// Main entry point for SQL analysis
pub fn analyze(request: &AnalyzeRequest) -> AnalyzeResult {
    #[cfg(feature = "tracing")]
    let _span = info_span!(
        "analyze_request",
        dialect = ?request.dialect,
        source = request.source_name.as_deref().unwrap_or("inline")
    )
    .entered();

    let metadata = SchemaMetadataService::new(request.schema.clone().unwrap_or_default());
    let max_depth = request.max_depth();
    let mut statements = Vec::new();
    let mut issues = Vec::new();

    let lowered = match parse_statements(&request.sql, request.dialect, max_depth) {
        Ok(lowered) => lowered,
        Err(error) => {
            issues.push(parse_issue(&error, request.source_name.clone()));
            return build_result(0, statements, issues);
        }
    };
    let statement_count = lowered.len();

    for (index, lowered) in lowered.into_iter().enumerate() {
        #[cfg(feature = "tracing")]
        let _statement_span = info_span!("analyze_statement", index).entered();

        let outcome = match lowered {
            Ok(lowered) => analyze_statement(lowered, &metadata, max_depth).map_err(|error| {
                #[cfg(feature = "tracing")]
                debug!(code = error.code(), %error, "statement analysis failed");
                analysis_issue(&error, request.source_name.clone())
            }),
            Err(error) => Err(parse_issue(&error, request.source_name.clone())),
        };

        match outcome {
            Ok(analyzed) => statements.push(lineage::project(
                &analyzed,
                index,
                request.source_name.clone(),
            )),
            Err(issue) => issues.push(issue.with_statement(index)),
        }
    }

    build_result(statement_count, statements, issues)
}

fn parse_issue(error: &ParseError, source_name: Option<String>) -> Issue {
    let code = match error.kind {
        ParseErrorKind::UnsupportedFeature => issue_codes::UNSUPPORTED_SYNTAX,
        ParseErrorKind::InputTooLarge => issue_codes::INPUT_TOO_LARGE,
        _ => issue_codes::PARSE_ERROR,
    };
    Issue::error(code, error.message.clone())
        .with_position(error.position.map(SourcePosition::from))
        .with_source_name(source_name)
}

fn analysis_issue(error: &AnalysisError, source_name: Option<String>) -> Issue {
    Issue::error(error.code(), error.kind.to_string())
        .with_position(error.location.map(SourcePosition::from))
        .with_source_name(source_name)
}

fn build_result(
    statement_count: usize,
    statements: Vec<StatementLineage>,
    issues: Vec<Issue>,
) -> AnalyzeResult {
    let mut issue_count = IssueCount::default();
    for issue in &issues {
        match issue.severity {
            Severity::Error => issue_count.errors += 1,
            Severity::Warning => issue_count.warnings += 1,
            Severity::Info => issue_count.infos += 1,
        }
    }
    let summary = Summary {
        statement_count,
        column_count: statements.iter().map(|s| s.columns.len()).sum(),
        has_errors: issue_count.errors > 0,
        issue_count,
    };
    AnalyzeResult {
        statements,
        issues,
        summary,
    }
}
