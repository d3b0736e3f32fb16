//! Error types for SQL parsing and semantic analysis.
//!
//! # Error Handling Strategy
//!
//! Two error types cover the two phases a statement goes through:
//!
//! - [`ParseError`]: the SQL text could not be turned into the analyzer's AST,
//!   either because `sqlparser` rejected it or because lowering met a construct
//!   the analyzer does not model.
//!
//! - [`AnalysisError`]: a semantic error found while resolving names, checking
//!   window frames or pattern-recognition rules. Every analysis error aborts the
//!   current statement; no partial lineage is produced for it.
//!
//! The batch entry point [`crate::analyze`] converts both into
//! [`crate::types::Issue`] values so one failing statement does not hide the
//! lineage of the others.
//!
//! Internal invariant violations (for example a node resolved twice to two
//! different fields) are defects and panic instead of producing an error value.

use crate::types::Dialect;
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::OnceLock;
use thiserror::Error;
#[cfg(feature = "tracing")]
use tracing::trace;

/// Line/column location in the source SQL (both 1-indexed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

impl Location {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}:{}", self.line, self.column)
    }
}

/// Error encountered while parsing or lowering SQL.
#[derive(Debug, Clone)]
pub struct ParseError {
    /// Human-readable error message.
    pub message: String,
    /// Where the error occurred, if known.
    pub position: Option<Location>,
    /// The SQL dialect being parsed when the error occurred.
    pub dialect: Option<Dialect>,
    /// The specific category of parse error.
    pub kind: ParseErrorKind,
}

/// Category of parse error for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseErrorKind {
    /// Unexpected token or character in input.
    #[default]
    SyntaxError,
    /// Invalid or unexpected end of input.
    UnexpectedEof,
    /// Parsed fine, but the analyzer has no model for the construct.
    UnsupportedFeature,
    /// Lexer/tokenization error.
    LexerError,
    /// Nesting exceeded the configured depth bound.
    InputTooLarge,
}

impl ParseError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            position: None,
            dialect: None,
            kind: ParseErrorKind::SyntaxError,
        }
    }

    /// Creates an error for a construct lowering does not support.
    pub fn unsupported(what: impl fmt::Display) -> Self {
        Self::new(format!("unsupported construct: {what}"))
            .with_kind(ParseErrorKind::UnsupportedFeature)
    }

    pub fn with_position(mut self, position: Option<Location>) -> Self {
        self.position = position;
        self
    }

    /// Adds dialect context to the error.
    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = Some(dialect);
        self
    }

    pub fn with_kind(mut self, kind: ParseErrorKind) -> Self {
        self.kind = kind;
        self
    }

    /// Parses position from sqlparser error message format.
    ///
    /// sqlparser reports positions as "... at Line: X, Column: Y". This couples
    /// us to its message format, so a miss degrades to `None`.
    fn parse_position_from_message(message: &str) -> Option<Location> {
        static POSITION_REGEX: OnceLock<Regex> = OnceLock::new();
        let re = POSITION_REGEX.get_or_init(|| {
            Regex::new(r"Line:\s*(\d+)\s*,\s*Column:\s*(\d+)").expect("Invalid regex pattern")
        });

        let result = re.captures(message).and_then(|caps| {
            let line: usize = caps.get(1)?.as_str().parse().ok()?;
            let column: usize = caps.get(2)?.as_str().parse().ok()?;
            Some(Location { line, column })
        });

        #[cfg(feature = "tracing")]
        if result.is_none() && message.contains("Line") {
            trace!("no position found in parser message: {}", message);
        }

        result
    }

    fn infer_kind_from_message(message: &str) -> ParseErrorKind {
        let lower = message.to_lowercase();
        if lower.contains("recursion limit") {
            ParseErrorKind::InputTooLarge
        } else if lower.contains("unexpected end") || lower.contains("eof") {
            ParseErrorKind::UnexpectedEof
        } else if lower.contains("not supported") || lower.contains("unsupported") {
            ParseErrorKind::UnsupportedFeature
        } else if lower.contains("tokenizer") || lower.contains("lexer") {
            ParseErrorKind::LexerError
        } else {
            ParseErrorKind::SyntaxError
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Parse error")?;

        if let Some(dialect) = self.dialect {
            write!(f, " ({dialect:?})")?;
        }

        if let Some(pos) = self.position {
            write!(f, " at line {}, column {}", pos.line, pos.column)?;
        }

        write!(f, ": {}", self.message)
    }
}

impl std::error::Error for ParseError {}

impl From<sqlparser::parser::ParserError> for ParseError {
    fn from(err: sqlparser::parser::ParserError) -> Self {
        let message = err.to_string();
        let position = Self::parse_position_from_message(&message);
        let kind = Self::infer_kind_from_message(&message);

        Self {
            message,
            position,
            dialect: None,
            kind,
        }
    }
}

/// A semantic error raised while analyzing one statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisError {
    pub kind: ErrorKind,
    pub location: Option<Location>,
}

impl AnalysisError {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            location: None,
        }
    }

    /// Attaches a location unless one is already present.
    pub fn at(mut self, location: Option<Location>) -> Self {
        if self.location.is_none() {
            self.location = location;
        }
        self
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.location {
            Some(location) => write!(f, "{location}: {}", self.kind),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for AnalysisError {}

impl From<ErrorKind> for AnalysisError {
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}

/// Semantic error kinds.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ErrorKind {
    // Resolution
    #[error("Column '{0}' cannot be resolved")]
    ColumnNotFound(String),
    #[error("Column '{0}' is ambiguous")]
    AmbiguousColumn(String),
    #[error("Expression of type {0} is not of type ROW")]
    NotARowType(String),
    #[error("Ambiguous row field reference: {0}")]
    AmbiguousRowField(String),
    #[error("Row field '{0}' not found")]
    FieldNotFound(String),
    #[error("Table '{0}' does not exist")]
    TableNotFound(String),
    #[error("Relation '{0}' not found")]
    RelationNotFound(String),

    // Correlation and lambdas
    #[error("Reference to column '{0}' from outer scope not allowed in this context")]
    CorrelationNotAllowed(String),
    #[error("Lambda expression cannot contain subqueries")]
    LambdaCannotContainSubquery,

    // Windows
    #[error("No resolved window for window function or measure")]
    UnresolvedWindow,
    #[error("Window '{0}' is not defined")]
    WindowNotFound(String),
    #[error("Measure {0} is not defined in the corresponding window")]
    MeasureNotFound(String),
    #[error("Measure {0} is defined more than once")]
    AmbiguousMeasure(String),
    #[error("Cannot nest window functions or row pattern measures inside window specification")]
    NestedWindowNotAllowed,
    #[error("Invalid reference to named window: {0}")]
    InvalidWindowReference(String),
    #[error("{ty} is not comparable, and therefore cannot be used in {clause}")]
    NotComparable { ty: String, clause: &'static str },
    #[error("{ty} is not orderable, and therefore cannot be used in {clause}")]
    NotOrderable { ty: String, clause: &'static str },
    #[error("Window frame start cannot be UNBOUNDED FOLLOWING")]
    InvalidFrameStart,
    #[error("Window frame end cannot be UNBOUNDED PRECEDING")]
    InvalidFrameEnd,
    #[error("Window frame starting from {start} cannot end with {end}")]
    InvalidFrameBounds {
        start: &'static str,
        end: &'static str,
    },
    #[error("Window frame of type RANGE PRECEDING or FOLLOWING requires ORDER BY")]
    RangeRequiresOrderBy,
    #[error("Window frame of type RANGE PRECEDING or FOLLOWING requires single sort item in ORDER BY (actual: {0})")]
    RangeRequiresSingleSortKey(usize),
    #[error("Window frame of type GROUPS PRECEDING or FOLLOWING requires ORDER BY")]
    GroupsRequiresOrderBy,
    #[error("Pattern recognition requires DEFINE clause")]
    PatternRequiresDefine,
    #[error("Pattern recognition requires ROWS frame type")]
    PatternRequiresRows,
    #[error("Pattern recognition requires frame specified as BETWEEN CURRENT ROW AND ...")]
    PatternRequiresCurrentRowStart,
    #[error("Row pattern measures require PATTERN clause")]
    MeasuresRequirePattern,
    #[error("AFTER MATCH SKIP clause requires PATTERN clause")]
    AfterMatchSkipRequiresPattern,
    #[error("{0} modifier requires PATTERN clause")]
    SearchModeRequiresPattern(&'static str),
    #[error("Union variable definitions require PATTERN clause")]
    SubsetsRequirePattern,
    #[error("Primary pattern variable definitions require PATTERN clause")]
    DefinitionsRequirePattern,
    #[error("Anchor pattern syntax is not allowed in window")]
    AnchorNotAllowedInWindowPattern,
    #[error("MATCH_NUMBER function is not supported in window")]
    MatchNumberNotAllowedInWindow,

    // Pattern recognition
    #[error("Cannot use OVER with {0} pattern recognition function")]
    PatternFunctionCannotUseOver(String),
    #[error("Cannot use FILTER with {0} pattern recognition function")]
    PatternFunctionCannotUseFilter(String),
    #[error("Cannot use ORDER BY with {0} pattern recognition function")]
    PatternFunctionCannotUseOrderBy(String),
    #[error("Cannot use DISTINCT with {0} pattern recognition function")]
    PatternFunctionCannotUseDistinct(String),
    #[error("{mode} semantics is not supported with {function} pattern recognition function")]
    ProcessingModeNotAllowed { mode: &'static str, function: String },
    #[error("{function} pattern recognition function requires {expected} arguments, got {actual}")]
    InvalidArgumentCount {
        function: String,
        expected: &'static str,
        actual: usize,
    },
    #[error("{0} pattern recognition navigation function requires a non-negative integer offset")]
    OffsetMustBeNonNegativeInteger(String),
    #[error("The second argument of {0} pattern recognition navigation function must not exceed 2147483647")]
    OffsetTooLarge(String),
    #[error("CLASSIFIER function argument should be primary pattern variable or subset name")]
    InvalidClassifierArgument,
    #[error("{0} is not a primary pattern variable or subset name")]
    UnknownPatternLabel(String),
    #[error("Pattern variable {0} is defined more than once")]
    DuplicatePatternLabel(String),
    #[error("Measure {0} is defined more than once in MEASURES")]
    DuplicateMeasure(String),
    #[error("Invalid label reference: {0}")]
    InvalidLabelReference(String),
    #[error("{0}.* is not allowed in this context")]
    QualifiedAllFieldsNotAllowed(String),

    // Row subscripts
    #[error("Subscript expression on ROW requires a constant index")]
    RowSubscriptMustBeConstant,
    #[error("Invalid subscript index: {0}. ROW indices start at 1")]
    RowSubscriptMustBePositive(i64),
    #[error("Subscript index out of bounds: {index}, max value is {size}")]
    RowSubscriptOutOfBounds { index: i64, size: usize },

    // Statement level
    #[error("{clause} cannot contain aggregations or window functions")]
    AggregateNotAllowed { clause: &'static str },
    #[error("{clause} position {position} is not in select list")]
    InvalidOrdinal { clause: &'static str, position: i64 },
    #[error("Column count mismatch: expected {expected}, found {actual}")]
    ColumnCountMismatch { expected: usize, actual: usize },
    #[error("View '{0}' is recursive")]
    RecursiveView(String),
    #[error("Unsupported construct: {0}")]
    UnsupportedConstruct(String),
    #[error("View '{name}' could not be parsed: {message}")]
    InvalidView { name: String, message: String },

    #[error("Statement is too large (nesting exceeds {0} levels)")]
    InputTooLarge(usize),
}

impl ErrorKind {
    /// Wraps the kind into an error located at `location`.
    pub fn at(self, location: Option<Location>) -> AnalysisError {
        AnalysisError::new(self).at(location)
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ColumnNotFound(_) => "COLUMN_NOT_FOUND",
            Self::AmbiguousColumn(_) => "AMBIGUOUS_COLUMN",
            Self::NotARowType(_) => "NOT_A_ROW_TYPE",
            Self::AmbiguousRowField(_) => "AMBIGUOUS_ROW_FIELD",
            Self::FieldNotFound(_) => "FIELD_NOT_FOUND",
            Self::TableNotFound(_) => "TABLE_NOT_FOUND",
            Self::RelationNotFound(_) => "RELATION_NOT_FOUND",
            Self::CorrelationNotAllowed(_) => "CORRELATION_NOT_ALLOWED",
            Self::LambdaCannotContainSubquery => "LAMBDA_CANNOT_CONTAIN_SUBQUERY",
            Self::UnresolvedWindow => "UNRESOLVED_WINDOW",
            Self::WindowNotFound(_) => "WINDOW_NOT_FOUND",
            Self::MeasureNotFound(_) => "MEASURE_NOT_FOUND",
            Self::AmbiguousMeasure(_) => "AMBIGUOUS_MEASURE",
            Self::NestedWindowNotAllowed => "NESTED_WINDOW",
            Self::InvalidWindowReference(_) => "INVALID_WINDOW_REFERENCE",
            Self::NotComparable { .. } => "NOT_COMPARABLE",
            Self::NotOrderable { .. } => "NOT_ORDERABLE",
            Self::InvalidFrameStart | Self::InvalidFrameEnd | Self::InvalidFrameBounds { .. } => {
                "INVALID_WINDOW_FRAME"
            }
            Self::RangeRequiresOrderBy => "RANGE_REQUIRES_ORDER_BY",
            Self::RangeRequiresSingleSortKey(_) => "RANGE_REQUIRES_SINGLE_SORT_KEY",
            Self::GroupsRequiresOrderBy => "GROUPS_REQUIRES_ORDER_BY",
            Self::PatternRequiresDefine => "PATTERN_REQUIRES_DEFINE",
            Self::PatternRequiresRows => "PATTERN_REQUIRES_ROWS",
            Self::PatternRequiresCurrentRowStart => "PATTERN_REQUIRES_CURRENT_ROW_START",
            Self::MeasuresRequirePattern
            | Self::AfterMatchSkipRequiresPattern
            | Self::SearchModeRequiresPattern(_)
            | Self::SubsetsRequirePattern
            | Self::DefinitionsRequirePattern => "MISSING_ROW_PATTERN",
            Self::AnchorNotAllowedInWindowPattern => "ANCHOR_IN_WINDOW_PATTERN",
            Self::MatchNumberNotAllowedInWindow => "MATCH_NUMBER_IN_WINDOW",
            Self::PatternFunctionCannotUseOver(_)
            | Self::PatternFunctionCannotUseFilter(_)
            | Self::PatternFunctionCannotUseOrderBy(_)
            | Self::PatternFunctionCannotUseDistinct(_) => "INVALID_PATTERN_FUNCTION_CALL",
            Self::ProcessingModeNotAllowed { .. } => "INVALID_PROCESSING_MODE",
            Self::InvalidArgumentCount { .. } => "INVALID_ARGUMENT_COUNT",
            Self::OffsetMustBeNonNegativeInteger(_) => "INVALID_NAVIGATION_OFFSET",
            Self::OffsetTooLarge(_) => "NAVIGATION_OFFSET_TOO_LARGE",
            Self::InvalidClassifierArgument => "INVALID_CLASSIFIER_ARGUMENT",
            Self::UnknownPatternLabel(_) => "UNKNOWN_PATTERN_LABEL",
            Self::DuplicatePatternLabel(_) => "DUPLICATE_PATTERN_LABEL",
            Self::DuplicateMeasure(_) => "DUPLICATE_MEASURE",
            Self::InvalidLabelReference(_) => "INVALID_LABEL_REFERENCE",
            Self::QualifiedAllFieldsNotAllowed(_) => "QUALIFIED_ALL_FIELDS_NOT_ALLOWED",
            Self::RowSubscriptMustBeConstant => "ROW_SUBSCRIPT_NOT_CONSTANT",
            Self::RowSubscriptMustBePositive(_) => "ROW_SUBSCRIPT_NOT_POSITIVE",
            Self::RowSubscriptOutOfBounds { .. } => "ROW_SUBSCRIPT_OUT_OF_BOUNDS",
            Self::AggregateNotAllowed { .. } => "AGGREGATE_NOT_ALLOWED",
            Self::InvalidOrdinal { .. } => "INVALID_ORDINAL",
            Self::ColumnCountMismatch { .. } => "COLUMN_COUNT_MISMATCH",
            Self::RecursiveView(_) => "RECURSIVE_VIEW",
            Self::UnsupportedConstruct(_) => "UNSUPPORTED_SYNTAX",
            Self::InvalidView { .. } => "INVALID_VIEW",
            Self::InputTooLarge(_) => "INPUT_TOO_LARGE",
        }
    }
}

/// Result alias used throughout the analyzer.
pub type Result<T, E = AnalysisError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_position_from_message() {
        let msg = "Expected SELECT, found 'INSERT' at Line: 1, Column: 5";
        let pos = ParseError::parse_position_from_message(msg);
        assert_eq!(pos, Some(Location::new(1, 5)));
    }

    #[test]
    fn test_parse_position_tolerates_whitespace() {
        let pos = ParseError::parse_position_from_message("Error at Line:  42 ,  Column:   99");
        assert_eq!(pos, Some(Location::new(42, 99)));
        assert_eq!(ParseError::parse_position_from_message("Error at Column: 5, Line: 1"), None);
        assert_eq!(ParseError::parse_position_from_message("Unexpected token"), None);
    }

    #[test]
    fn test_infer_kind() {
        assert_eq!(
            ParseError::infer_kind_from_message("sql parser error: recursion limit exceeded"),
            ParseErrorKind::InputTooLarge
        );
        assert_eq!(
            ParseError::infer_kind_from_message("Expected expression, found: EOF"),
            ParseErrorKind::UnexpectedEof
        );
        assert_eq!(
            ParseError::infer_kind_from_message("Something went wrong"),
            ParseErrorKind::SyntaxError
        );
    }

    #[test]
    fn test_parse_error_display() {
        let err = ParseError::new("Bad syntax")
            .with_position(Some(Location::new(1, 5)))
            .with_dialect(Dialect::Snowflake);
        assert_eq!(
            err.to_string(),
            "Parse error (Snowflake) at line 1, column 5: Bad syntax"
        );
    }

    #[test]
    fn test_unsupported_sets_kind() {
        let err = ParseError::unsupported("LATERAL VIEW");
        assert_eq!(err.kind, ParseErrorKind::UnsupportedFeature);
        assert!(err.message.contains("LATERAL VIEW"));
    }

    #[test]
    fn test_analysis_error_display_includes_location() {
        let err = AnalysisError::new(ErrorKind::ColumnNotFound("x".into()))
            .at(Some(Location::new(3, 14)));
        assert_eq!(err.to_string(), "line 3:14: Column 'x' cannot be resolved");
        assert_eq!(err.code(), "COLUMN_NOT_FOUND");
    }

    #[test]
    fn test_at_keeps_innermost_location() {
        let err = AnalysisError::new(ErrorKind::InvalidFrameStart)
            .at(Some(Location::new(1, 1)))
            .at(Some(Location::new(9, 9)));
        assert_eq!(err.location, Some(Location::new(1, 1)));
    }
}
