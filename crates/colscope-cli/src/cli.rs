//! CLI argument parsing using clap.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// colscope - SQL column lineage analyzer
#[derive(Parser, Debug)]
#[command(name = "colscope")]
#[command(about = "Trace every output column of a SQL statement back to base-table columns", long_about = None)]
#[command(version)]
pub struct Args {
    /// SQL files to analyze (reads from stdin if none provided)
    #[arg(value_name = "FILES")]
    pub files: Vec<PathBuf>,

    /// SQL dialect
    #[arg(short, long, default_value = "generic", value_enum)]
    pub dialect: DialectArg,

    /// Output format
    #[arg(short, long, default_value = "table", value_enum)]
    pub format: OutputFormat,

    /// Schema file: JSON schema metadata, or DDL with CREATE TABLE / CREATE VIEW
    #[arg(short, long, value_name = "FILE")]
    pub schema: Option<PathBuf>,

    /// Output file (defaults to stdout)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Maximum expression and query nesting per statement
    #[arg(long, value_name = "DEPTH")]
    pub max_depth: Option<usize>,

    /// Suppress issues on stderr
    #[arg(short, long)]
    pub quiet: bool,

    /// Compact JSON output (no pretty-printing)
    #[arg(short, long)]
    pub compact: bool,
}

/// SQL dialect options
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DialectArg {
    Generic,
    Ansi,
    Bigquery,
    Clickhouse,
    Databricks,
    Duckdb,
    Hive,
    Mssql,
    Mysql,
    Postgres,
    Redshift,
    Snowflake,
    Sqlite,
}

impl From<DialectArg> for colscope_core::Dialect {
    fn from(d: DialectArg) -> Self {
        match d {
            DialectArg::Generic => colscope_core::Dialect::Generic,
            DialectArg::Ansi => colscope_core::Dialect::Ansi,
            DialectArg::Bigquery => colscope_core::Dialect::Bigquery,
            DialectArg::Clickhouse => colscope_core::Dialect::Clickhouse,
            DialectArg::Databricks => colscope_core::Dialect::Databricks,
            DialectArg::Duckdb => colscope_core::Dialect::Duckdb,
            DialectArg::Hive => colscope_core::Dialect::Hive,
            DialectArg::Mssql => colscope_core::Dialect::Mssql,
            DialectArg::Mysql => colscope_core::Dialect::Mysql,
            DialectArg::Postgres => colscope_core::Dialect::Postgres,
            DialectArg::Redshift => colscope_core::Dialect::Redshift,
            DialectArg::Snowflake => colscope_core::Dialect::Snowflake,
            DialectArg::Sqlite => colscope_core::Dialect::Sqlite,
        }
    }
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable lineage table
    Table,
    /// JSON `AnalyzeResult`
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialect_conversion() {
        let dialect: colscope_core::Dialect = DialectArg::Postgres.into();
        assert_eq!(dialect, colscope_core::Dialect::Postgres);
    }

    #[test]
    fn test_parse_minimal_args() {
        let args = Args::parse_from(["colscope", "test.sql"]);
        assert_eq!(args.files.len(), 1);
        assert_eq!(args.dialect, DialectArg::Generic);
        assert_eq!(args.format, OutputFormat::Table);
        assert!(args.schema.is_none());
        assert!(args.max_depth.is_none());
    }

    #[test]
    fn test_parse_full_args() {
        let args = Args::parse_from([
            "colscope",
            "-d",
            "postgres",
            "-f",
            "json",
            "-s",
            "schema.json",
            "-o",
            "output.json",
            "--max-depth",
            "40",
            "--quiet",
            "--compact",
            "file1.sql",
            "file2.sql",
        ]);
        assert_eq!(args.dialect, DialectArg::Postgres);
        assert_eq!(args.format, OutputFormat::Json);
        assert_eq!(args.schema.unwrap().to_str().unwrap(), "schema.json");
        assert_eq!(args.output.unwrap().to_str().unwrap(), "output.json");
        assert_eq!(args.max_depth, Some(40));
        assert!(args.quiet);
        assert!(args.compact);
        assert_eq!(args.files.len(), 2);
    }

    #[test]
    fn test_unknown_format_is_rejected() {
        let result = Args::try_parse_from(["colscope", "-f", "mermaid", "test.sql"]);
        assert!(result.is_err());
    }
}
