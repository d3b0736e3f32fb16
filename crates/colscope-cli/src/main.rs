//! colscope CLI - SQL column lineage analyzer

use colscope_cli::cli;
use colscope_cli::input::{self, SqlSource};
use colscope_cli::output;
use colscope_cli::schema;

use anyhow::{Context, Result};
use clap::Parser;
use colscope_core::{analyze, AnalysisOptions, AnalyzeRequest, AnalyzeResult, SchemaMetadata};
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use cli::{Args, OutputFormat};
use output::table::describe_issue;
use output::{format_json, format_table};

/// At least one statement failed to analyze.
const EXIT_FAILURE: u8 = 1;
/// Configuration error (unreadable input, bad schema file, unwritable output).
const EXIT_CONFIG_ERROR: u8 = 66;

fn main() -> ExitCode {
    let args = Args::parse();

    match run(args) {
        Ok(has_errors) => {
            if has_errors {
                ExitCode::from(EXIT_FAILURE)
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            eprintln!("colscope: error: {e:#}");
            ExitCode::from(EXIT_CONFIG_ERROR)
        }
    }
}

fn run(args: Args) -> Result<bool> {
    let dialect = args.dialect.into();
    let schema_metadata = args
        .schema
        .as_ref()
        .map(|path| schema::load_schema(path, dialect))
        .transpose()
        .context("Failed to load schema")?;

    let named = !args.files.is_empty();
    let sources = input::read_input(&args.files)?;

    let results = sources
        .into_iter()
        .map(|source| {
            let request = build_request(source, named, dialect, &schema_metadata, args.max_depth);
            analyze(&request)
        })
        .collect();
    let result = merge_results(results);

    let output_str = match args.format {
        OutputFormat::Json => format_json(&result, args.compact)?,
        OutputFormat::Table => {
            format_table(&result, args.quiet, args.output.is_none()).context("Failed to format table")?
        }
    };

    write_output(&args.output, &output_str)?;

    if !args.quiet && args.format == OutputFormat::Json {
        print_issues_to_stderr(&result);
    }

    Ok(result.summary.has_errors)
}

fn build_request(
    source: SqlSource,
    named: bool,
    dialect: colscope_core::Dialect,
    schema: &Option<SchemaMetadata>,
    max_depth: Option<usize>,
) -> AnalyzeRequest {
    let mut request = AnalyzeRequest::new(source.content).with_dialect(dialect);
    if named {
        request.source_name = Some(source.name);
    }
    if let Some(schema) = schema {
        request = request.with_schema(schema.clone());
    }
    if max_depth.is_some() {
        request.options = Some(AnalysisOptions { max_depth });
    }
    request
}

/// Concatenates per-file results. Statement indexes stay file-relative; the
/// source name tells them apart.
fn merge_results(results: Vec<AnalyzeResult>) -> AnalyzeResult {
    let mut merged = AnalyzeResult::default();
    for result in results {
        let summary = &mut merged.summary;
        summary.statement_count += result.summary.statement_count;
        summary.column_count += result.summary.column_count;
        summary.issue_count.errors += result.summary.issue_count.errors;
        summary.issue_count.warnings += result.summary.issue_count.warnings;
        summary.issue_count.infos += result.summary.issue_count.infos;
        summary.has_errors |= result.summary.has_errors;
        merged.statements.extend(result.statements);
        merged.issues.extend(result.issues);
    }
    merged
}

fn write_output(path: &Option<PathBuf>, content: &str) -> Result<()> {
    if let Some(path) = path {
        fs::write(path, content)
            .with_context(|| format!("Failed to write to {}", path.display()))?;
    } else {
        io::stdout()
            .write_all(content.as_bytes())
            .context("Failed to write to stdout")?;
        // Ensure newline at end for terminal output
        if !content.ends_with('\n') {
            println!();
        }
    }
    Ok(())
}

fn print_issues_to_stderr(result: &AnalyzeResult) {
    use colscope_core::Severity;

    for issue in &result.issues {
        let level = match issue.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        };
        eprintln!("colscope: {level}: {}", describe_issue(issue));
    }
}
