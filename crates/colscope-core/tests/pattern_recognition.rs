mod common;

use common::*;
use rstest::rstest;

fn match_recognize(body: &str) -> String {
    format!("SELECT * FROM events MATCH_RECOGNIZE ({body}) AS m")
}

#[test]
fn one_row_per_match_projects_partitions_and_measures() {
    let result = run_analysis(&match_recognize(
        "PARTITION BY k ORDER BY ts \
         MEASURES FIRST(a.ts) AS started, LAST(b.v) AS peak, MATCH_NUMBER() AS mn \
         ONE ROW PER MATCH \
         PATTERN (a b+) \
         DEFINE b AS b.v > PREV(b.v)",
    ));
    let lineage = column_lineage(&result, 0);
    let names: Vec<_> = lineage.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(names, ["k", "started", "peak", "mn"]);
    assert_eq!(lineage[0].1, ["default.events.k"]);
    assert_eq!(lineage[1].1, ["default.events.ts"]);
    assert_eq!(lineage[2].1, ["default.events.v"]);
    assert!(lineage[3].1.is_empty());
}

#[test]
fn all_rows_per_match_keeps_input_columns() {
    let result = run_analysis(&match_recognize(
        "PARTITION BY k ORDER BY ts \
         MEASURES CLASSIFIER() AS label \
         ALL ROWS PER MATCH \
         PATTERN (a b*) \
         DEFINE b AS b.v > a.v",
    ));
    let names: Vec<_> = column_lineage(&result, 0)
        .into_iter()
        .map(|(name, _)| name)
        .collect();
    assert_eq!(names, ["k", "ts", "v", "doc", "payload", "label"]);
}

#[test]
fn subsets_are_labels() {
    let result = run_analysis(&match_recognize(
        "ORDER BY ts \
         MEASURES LAST(u.v) AS last_v, CLASSIFIER(u) AS which \
         AFTER MATCH SKIP TO LAST u \
         PATTERN (a b) \
         SUBSET u = (a, b) \
         DEFINE a AS a.v > 0",
    ));
    assert_eq!(sources_of(&result, 0, "last_v"), ["default.events.v"]);
}

#[test]
fn outer_query_reads_measures_through_the_alias() {
    let result = run_analysis(
        "SELECT m.k, m.total * 2 AS doubled FROM events MATCH_RECOGNIZE (\
           PARTITION BY k ORDER BY ts \
           MEASURES SUM(b.v) AS total \
           PATTERN (a b+) \
           DEFINE b AS b.v > 0\
         ) AS m",
    );
    assert_eq!(sources_of(&result, 0, "doubled"), ["default.events.v"]);
}

#[rstest]
#[case::define_unknown_label(
    "ORDER BY ts MEASURES LAST(a.v) AS x PATTERN (a) DEFINE z AS z.v > 0",
    "UNKNOWN_PATTERN_LABEL"
)]
#[case::define_twice(
    "ORDER BY ts MEASURES LAST(a.v) AS x PATTERN (a) DEFINE a AS a.v > 0, a AS a.v < 9",
    "DUPLICATE_PATTERN_LABEL"
)]
#[case::measure_twice(
    "ORDER BY ts MEASURES LAST(a.v) AS x, FIRST(a.v) AS x PATTERN (a) DEFINE a AS a.v > 0",
    "DUPLICATE_MEASURE"
)]
#[case::skip_to_unknown(
    "ORDER BY ts MEASURES LAST(a.v) AS x AFTER MATCH SKIP TO LAST q PATTERN (a) DEFINE a AS a.v > 0",
    "UNKNOWN_PATTERN_LABEL"
)]
#[case::negative_offset(
    "ORDER BY ts MEASURES PREV(a.v, -1) AS x PATTERN (a) DEFINE a AS a.v > 0",
    "INVALID_NAVIGATION_OFFSET"
)]
#[case::huge_offset(
    "ORDER BY ts MEASURES PREV(a.v, 3000000000) AS x PATTERN (a) DEFINE a AS a.v > 0",
    "NAVIGATION_OFFSET_TOO_LARGE"
)]
#[case::navigation_arity(
    "ORDER BY ts MEASURES PREV(a.v, 1, 2) AS x PATTERN (a) DEFINE a AS a.v > 0",
    "INVALID_ARGUMENT_COUNT"
)]
#[case::classifier_unknown_label(
    "ORDER BY ts MEASURES CLASSIFIER(z) AS x PATTERN (a) DEFINE a AS a.v > 0",
    "UNKNOWN_PATTERN_LABEL"
)]
#[case::match_number_arguments(
    "ORDER BY ts MEASURES MATCH_NUMBER(a) AS x PATTERN (a) DEFINE a AS a.v > 0",
    "INVALID_ARGUMENT_COUNT"
)]
#[case::navigation_with_over(
    "ORDER BY ts MEASURES LAST(a.v) OVER (ORDER BY ts) AS x PATTERN (a) DEFINE a AS a.v > 0",
    "INVALID_PATTERN_FUNCTION_CALL"
)]
#[case::navigation_with_distinct(
    "ORDER BY ts MEASURES FIRST(DISTINCT a.v) AS x PATTERN (a) DEFINE a AS a.v > 0",
    "INVALID_PATTERN_FUNCTION_CALL"
)]
#[case::label_column_missing(
    "ORDER BY ts MEASURES LAST(a.zz) AS x PATTERN (a) DEFINE a AS a.v > 0",
    "COLUMN_NOT_FOUND"
)]
#[case::partition_by_json(
    "PARTITION BY doc ORDER BY ts MEASURES LAST(a.v) AS x PATTERN (a) DEFINE a AS a.v > 0",
    "NOT_COMPARABLE"
)]
#[case::order_by_json(
    "ORDER BY doc MEASURES LAST(a.v) AS x PATTERN (a) DEFINE a AS a.v > 0",
    "NOT_ORDERABLE"
)]
fn invalid_pattern_recognition(#[case] body: &str, #[case] code: &str) {
    let result = run_analysis(&match_recognize(body));
    assert_eq!(issue_codes(&result), [code], "{body}");
}

#[test]
fn labels_are_not_columns_outside_pattern_recognition() {
    let result = run_analysis("SELECT a.v FROM events");
    assert!(!result.summary.has_errors);
    assert!(sources_of(&result, 0, "v").is_empty());
}
