//! JSON output formatting.

use anyhow::{Context, Result};
use colscope_core::AnalyzeResult;

/// Format the analysis result as JSON.
///
/// If `compact` is true, outputs minified JSON without whitespace.
pub fn format_json(result: &AnalyzeResult, compact: bool) -> Result<String> {
    let json = if compact {
        serde_json::to_string(result)
    } else {
        serde_json::to_string_pretty(result)
    };
    json.context("Failed to serialize analysis result")
}

#[cfg(test)]
mod tests {
    use super::*;
    use colscope_core::{analyze, AnalyzeRequest};

    #[test]
    fn test_json_pretty() {
        let result = analyze(&AnalyzeRequest::new("SELECT 1 AS one"));

        let json = format_json(&result, false).unwrap();
        assert!(json.contains('\n'));
        assert!(json.contains("\"statementType\": \"SELECT\""));
    }

    #[test]
    fn test_json_compact_round_trips() {
        let result = analyze(&AnalyzeRequest::new("SELECT 1 AS one"));

        let json = format_json(&result, true).unwrap();
        assert!(!json.contains('\n'));
        let parsed: AnalyzeResult = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.statements, result.statements);
    }
}
