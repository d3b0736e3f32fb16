//! SQL front end: sqlparser parsing, lowering to the analyzer AST, and the
//! process-wide parse cache used for view bodies.

mod cache;
mod lower;

pub use cache::{install_parser_cache, parse_cached, refresh_parser_caches, ParserCache};
pub use lower::{lower_statement, LoweredStatement};

use crate::error::ParseError;
use crate::types::Dialect;
use sqlparser::ast::Statement;
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;

/// Parse SQL using the specified dialect
pub fn parse_sql_with_dialect(sql: &str, dialect: Dialect) -> Result<Vec<Statement>, ParseError> {
    let sqlparser_dialect = dialect.to_sqlparser_dialect();
    match Parser::parse_sql(sqlparser_dialect.as_ref(), sql) {
        Ok(statements) => Ok(statements),
        Err(primary_err) => {
            // Generic rejects Postgres-only operators (`::`, `->>`, `?`) that
            // show up in warehouse SQL.
            if matches!(dialect, Dialect::Generic) && looks_like_postgres_syntax(sql) {
                let postgres = PostgreSqlDialect {};
                if let Ok(statements) = Parser::parse_sql(&postgres, sql) {
                    return Ok(statements);
                }
            }
            Err(ParseError::from(primary_err).with_dialect(dialect))
        }
    }
}

fn looks_like_postgres_syntax(sql: &str) -> bool {
    sql.contains("::")
        || sql.contains("->")
        || sql.contains("?|")
        || sql.contains("?&")
        || sql.contains(" ? ")
        || sql.contains(" ?\n")
        || sql.contains("? '")
        || sql.contains("?\t")
}

/// Parse SQL using the generic dialect
pub fn parse_sql(sql: &str) -> Result<Vec<Statement>, ParseError> {
    parse_sql_with_dialect(sql, Dialect::Generic)
}

/// Parses a script and lowers each statement independently.
///
/// The outer error means the script did not parse at all; an inner error
/// means one statement parsed but could not be lowered.
pub fn parse_statements(
    sql: &str,
    dialect: Dialect,
    max_depth: usize,
) -> Result<Vec<Result<LoweredStatement, ParseError>>, ParseError> {
    let statements = parse_sql_with_dialect(sql, dialect)?;
    Ok(statements
        .iter()
        .map(|statement| {
            lower_statement(statement, max_depth).map_err(|e| e.with_dialect(dialect))
        })
        .collect())
}
