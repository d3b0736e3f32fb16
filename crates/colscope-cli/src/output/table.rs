//! Human-readable table output formatting.

use colscope_core::{AnalyzeResult, Issue, Severity, StatementLineage};
use is_terminal::IsTerminal;
use owo_colors::OwoColorize;
use std::fmt::{self, Write};
use tabled::settings::Style;
use tabled::{Table, Tabled};

#[derive(Tabled)]
struct ColumnRow {
    #[tabled(rename = "Column")]
    name: String,
    #[tabled(rename = "Sources")]
    sources: String,
}

/// Format the analysis result as human-readable text with optional colors.
pub fn format_table(
    result: &AnalyzeResult,
    quiet: bool,
    use_colors: bool,
) -> Result<String, fmt::Error> {
    let colored = use_colors && std::io::stdout().is_terminal();
    let mut out = String::new();

    write_header(&mut out, colored)?;
    for statement in &result.statements {
        write_statement(&mut out, statement, colored)?;
    }
    if !quiet {
        write_issues(&mut out, &result.issues, colored)?;
    }
    write_summary(&mut out, result, colored)?;

    Ok(out)
}

fn write_header(out: &mut String, colored: bool) -> fmt::Result {
    let title = "colscope lineage";
    let line = "═".repeat(50);

    if colored {
        writeln!(out, "{}", title.bold())?;
        writeln!(out, "{}", line.dimmed())?;
    } else {
        writeln!(out, "{title}")?;
        writeln!(out, "{line}")?;
    }
    writeln!(out)
}

fn write_statement(out: &mut String, statement: &StatementLineage, colored: bool) -> fmt::Result {
    let mut heading = format!(
        "#{} {}",
        statement.statement_index, statement.statement_type
    );
    if let Some(target) = &statement.target {
        write!(heading, " → {target}")?;
    }
    if let Some(source) = &statement.source_name {
        write!(heading, " ({source})")?;
    }

    if colored {
        writeln!(out, "{}", heading.cyan().bold())?;
    } else {
        writeln!(out, "{heading}")?;
    }

    let rows = statement.columns.iter().map(|column| ColumnRow {
        name: column.name.clone(),
        sources: if column.sources.is_empty() {
            "-".to_string()
        } else {
            column
                .sources
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("\n")
        },
    });
    let mut table = Table::new(rows);
    table.with(Style::sharp());
    writeln!(out, "{table}")?;

    if !statement.table_column_references.is_empty() {
        writeln!(out, "Reads:")?;
        for reference in &statement.table_column_references {
            writeln!(out, "  {}: {}", reference.table, reference.columns.join(", "))?;
        }
    }
    writeln!(out)
}

fn write_issues(out: &mut String, issues: &[Issue], colored: bool) -> fmt::Result {
    if issues.is_empty() {
        return Ok(());
    }

    let header = format!("Issues ({}):", issues.len());
    if colored {
        writeln!(out, "{}", header.bold())?;
    } else {
        writeln!(out, "{header}")?;
    }

    for issue in issues {
        let severity = match (issue.severity, colored) {
            (Severity::Error, true) => "ERROR".red().to_string(),
            (Severity::Warning, true) => "WARN".yellow().to_string(),
            (Severity::Info, true) => "INFO".blue().to_string(),
            (Severity::Error, false) => "ERROR".to_string(),
            (Severity::Warning, false) => "WARN".to_string(),
            (Severity::Info, false) => "INFO".to_string(),
        };
        writeln!(out, "  [{severity}] {}", describe_issue(issue))?;
    }
    writeln!(out)
}

/// `source:line:column statement N: [CODE] message`, omitting unknown parts.
pub fn describe_issue(issue: &Issue) -> String {
    let mut location = issue.source_name.clone().unwrap_or_default();
    if let Some(position) = issue.position {
        if !location.is_empty() {
            location.push(':');
        }
        location.push_str(&format!("{}:{}", position.line, position.column));
    }
    if let Some(index) = issue.statement_index {
        if !location.is_empty() {
            location.push(' ');
        }
        location.push_str(&format!("statement {index}"));
    }

    if location.is_empty() {
        format!("[{}] {}", issue.code, issue.message)
    } else {
        format!("{location}: [{}] {}", issue.code, issue.message)
    }
}

fn write_summary(out: &mut String, result: &AnalyzeResult, colored: bool) -> fmt::Result {
    let summary = &result.summary;
    let stats = format!(
        "Summary: {} statements | {} analyzed | {} columns | {} errors",
        summary.statement_count,
        result.statements.len(),
        summary.column_count,
        summary.issue_count.errors
    );

    if colored {
        if summary.has_errors {
            writeln!(out, "{}", stats.red())
        } else {
            writeln!(out, "{}", stats.green())
        }
    } else {
        writeln!(out, "{stats}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use colscope_core::{analyze, AnalyzeRequest, ColumnSchema, SchemaMetadata, SchemaTable};

    fn schema() -> SchemaMetadata {
        SchemaMetadata {
            default_schema: Some("default".into()),
            tables: vec![SchemaTable::new(
                "test",
                vec![ColumnSchema::new("col1"), ColumnSchema::new("col2")],
            )],
            ..Default::default()
        }
    }

    #[test]
    fn test_format_table_lists_sources() {
        let result = analyze(
            &AnalyzeRequest::new("SELECT col1 || col2 AS both_cols FROM test").with_schema(schema()),
        );

        let output = format_table(&result, false, false).unwrap();
        assert!(output.contains("colscope lineage"));
        assert!(output.contains("both_cols"));
        assert!(output.contains("default.test.col1"));
        assert!(output.contains("default.test: col1, col2"));
        assert!(output.contains("Summary: 1 statements"));
    }

    #[test]
    fn test_format_table_quiet_hides_issues() {
        let result =
            analyze(&AnalyzeRequest::new("SELECT missing FROM test").with_schema(schema()));

        let quiet = format_table(&result, true, false).unwrap();
        let verbose = format_table(&result, false, false).unwrap();
        assert!(!quiet.contains("COLUMN_NOT_FOUND"));
        assert!(verbose.contains("statement 0: [COLUMN_NOT_FOUND]"));
    }

    #[test]
    fn test_describe_issue_without_location() {
        let issue = Issue::error("PARSE_ERROR", "boom");
        assert_eq!(describe_issue(&issue), "[PARSE_ERROR] boom");
    }
}
