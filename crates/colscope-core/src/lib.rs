//! Column-level lineage for SQL.
//!
//! ```no_run
//! use colscope_core::{analyze, AnalyzeRequest};
//!
//! let result = analyze(&AnalyzeRequest::new("SELECT a.x FROM t a"));
//! for statement in &result.statements {
//!     for column in &statement.columns {
//!         println!("{} <- {:?}", column.name, column.sources);
//!     }
//! }
//! ```

pub mod analyzer;
pub mod ast;
pub mod error;
pub mod lineage;
pub mod metadata;
pub mod parser;
pub mod types;

// Re-export main types and functions
pub use analyzer::{analyze, analyze_statement, StatementAnalysis};
pub use error::{AnalysisError, ErrorKind, Location, ParseError, ParseErrorKind};
pub use metadata::{MetadataService, SchemaMetadataService, TableSchema, ViewDefinition};
pub use parser::{
    install_parser_cache, parse_sql, parse_sql_with_dialect, parse_statements,
    refresh_parser_caches, ParserCache,
};

// Re-export types explicitly
pub use types::{
    // Issue codes
    issue_codes,
    // Request types
    AnalysisOptions,
    AnalyzeRequest,
    // Response types
    AnalyzeResult,
    ColumnSchema,
    Dialect,
    Issue,
    IssueCount,
    OutputColumn,
    QualifiedObjectName,
    SchemaMetadata,
    SchemaTable,
    SchemaView,
    Severity,
    SourceColumn,
    SourcePosition,
    StatementLineage,
    Summary,
    TableColumns,
    DEFAULT_MAX_DEPTH,
};
