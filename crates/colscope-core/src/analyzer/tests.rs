use super::*;
use crate::ast::{
    Anchor, ComparisonOperator, Expr, ExprId, FrameBound, FrameBoundKind, FrameType,
    FunctionCall, Identifier, Literal, MeasureDefinition, PatternSearchMode, ProcessingMode,
    QualifiedName, RowPattern, SkipTo, SortItem, SubsetDefinition, VariableDefinition,
    WindowFrame, WindowRef,
};
use crate::error::ErrorKind;
use crate::types::{
    ColumnSchema, Dialect, QualifiedObjectName, SchemaMetadata, SchemaTable, SchemaView,
};
use rstest::rstest;

fn table(name: &str, columns: &[(&str, &str)]) -> SchemaTable {
    SchemaTable::new(
        name,
        columns
            .iter()
            .map(|(column, ty)| ColumnSchema::typed(*column, *ty))
            .collect(),
    )
}

fn view(name: &str, sql: &str) -> SchemaView {
    SchemaView {
        catalog: None,
        schema: None,
        name: name.to_string(),
        sql: sql.to_string(),
        dialect: Dialect::Generic,
    }
}

fn schema() -> SchemaMetadata {
    let mut customers = table(
        "customers",
        &[("id", "bigint"), ("name", "varchar"), ("region", "varchar")],
    );
    let mut rowid = ColumnSchema::typed("_rowid", "bigint");
    rowid.hidden = true;
    customers.columns.push(rowid);

    SchemaMetadata {
        default_schema: Some("default".into()),
        tables: vec![
            table(
                "test",
                &[("col1", "varchar"), ("col2", "varchar"), ("n", "bigint")],
            ),
            table(
                "orders",
                &[
                    ("id", "bigint"),
                    ("customer_id", "bigint"),
                    ("amount", "double"),
                    ("placed_at", "timestamp"),
                ],
            ),
            customers,
            table(
                "events",
                &[
                    ("k", "varchar"),
                    ("ts", "timestamp"),
                    ("v", "bigint"),
                    ("tags", "array(varchar)"),
                    ("attrs", "map(varchar, varchar)"),
                    ("payload", "row(a bigint, b varchar)"),
                ],
            ),
        ],
        views: vec![
            view(
                "big_orders",
                "SELECT id, amount FROM orders WHERE amount > 100",
            ),
            view("loop_a", "SELECT * FROM loop_b"),
            view("loop_b", "SELECT * FROM loop_a"),
        ],
        ..Default::default()
    }
}

fn analyze_with_dialect(sql: &str, dialect: Dialect) -> Result<StatementAnalysis, AnalysisError> {
    let metadata = SchemaMetadataService::new(schema());
    let mut lowered = parse_statements(sql, dialect, 100).expect("script should parse");
    assert_eq!(lowered.len(), 1, "expected a single statement");
    let lowered = lowered.remove(0).expect("statement should lower");
    analyze_statement(lowered, &metadata, 100)
}

fn analyze_one(sql: &str) -> Result<StatementAnalysis, AnalysisError> {
    analyze_with_dialect(sql, Dialect::Generic)
}

/// `(output name, sorted "schema.table.column" sources)` per output column.
fn lineage(sql: &str) -> Vec<(String, Vec<String>)> {
    let analyzed = analyze_one(sql).unwrap_or_else(|e| panic!("{sql}: {e}"));
    lineage::output_columns(&analyzed.analysis)
        .into_iter()
        .map(|column| {
            let sources = column.sources.iter().map(ToString::to_string).collect();
            (column.name, sources)
        })
        .collect()
}

fn column(name: &str, sources: &[&str]) -> (String, Vec<String>) {
    (
        name.to_string(),
        sources.iter().map(|s| s.to_string()).collect(),
    )
}

fn error(sql: &str) -> ErrorKind {
    match analyze_one(sql) {
        Ok(_) => panic!("expected {sql} to fail"),
        Err(error) => error.kind,
    }
}

fn qualified(name: &str) -> QualifiedObjectName {
    QualifiedObjectName::new(None, Some("default".into()), name)
}

// Resolution

#[test]
fn simple_projection_traces_each_column() {
    assert_eq!(
        lineage("SELECT col1, n AS total FROM test"),
        vec![
            column("col1", &["default.test.col1"]),
            column("total", &["default.test.n"]),
        ]
    );
}

#[test]
fn star_skips_hidden_columns() {
    let columns = lineage("SELECT * FROM customers");
    let names: Vec<_> = columns.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(names, ["id", "name", "region"]);
}

#[test]
fn hidden_column_still_resolves_by_name() {
    assert_eq!(
        lineage("SELECT _rowid FROM customers"),
        vec![column("_rowid", &["default.customers._rowid"])]
    );
}

#[test]
fn alias_qualifies_columns() {
    assert_eq!(
        lineage("SELECT c.name FROM customers c"),
        vec![column("name", &["default.customers.name"])]
    );
}

#[test]
fn unknown_qualifier_is_left_untraced() {
    // The table is only reachable through its alias; the stale qualifier
    // produces an untyped column instead of an error.
    assert_eq!(
        lineage("SELECT customers.name FROM customers c"),
        vec![column("name", &[])]
    );
}

#[test]
fn missing_column_under_known_alias_fails() {
    assert_eq!(
        error("SELECT c.missing FROM customers c"),
        ErrorKind::ColumnNotFound("c.missing".into())
    );
}

#[test]
fn unqualified_missing_column_fails() {
    assert_eq!(
        error("SELECT nope FROM test"),
        ErrorKind::ColumnNotFound("nope".into())
    );
}

#[test]
fn join_columns_must_be_unambiguous() {
    assert_eq!(
        error("SELECT id FROM orders o JOIN customers c ON o.customer_id = c.id"),
        ErrorKind::AmbiguousColumn("id".into())
    );
}

#[test]
fn unknown_table_fails() {
    assert_eq!(
        error("SELECT a FROM nowhere"),
        ErrorKind::TableNotFound("nowhere".into())
    );
}

#[test]
fn row_field_access_traces_the_row_column() {
    let analyzed = analyze_one("SELECT payload.a AS a FROM events").unwrap();
    let columns = lineage::output_columns(&analyzed.analysis);
    let sources: Vec<_> = columns[0].sources.iter().map(|s| s.column.as_str()).collect();
    assert_eq!(sources, ["payload"]);
    assert_eq!(
        analyzed.scope.relation_type().field(0).ty(),
        &Type::Bigint
    );
}

// Expressions

#[test]
fn derived_expressions_merge_their_sources() {
    assert_eq!(
        lineage("SELECT concat(col1, '-', col2) AS label, n + 1 FROM test"),
        vec![
            column("label", &["default.test.col1", "default.test.col2"]),
            column("_col1", &["default.test.n"]),
        ]
    );
}

#[test]
fn literal_projection_has_no_sources() {
    assert_eq!(lineage("SELECT 1 AS one FROM test"), vec![column("one", &[])]);
}

#[test]
fn correlated_subquery_contributes_its_projection() {
    let analyzed = analyze_one(
        "SELECT c.name, \
           (SELECT max(o.amount) FROM orders o WHERE o.customer_id = c.id) AS top \
         FROM customers c",
    )
    .unwrap();
    let columns = lineage::output_columns(&analyzed.analysis);
    assert_eq!(columns[1].name, "top");
    let sources: Vec<_> = columns[1].sources.iter().map(ToString::to_string).collect();
    assert_eq!(sources, ["default.orders.amount"]);

    let tables = lineage::table_columns(&analyzed.analysis);
    assert_eq!(tables[0].table, qualified("customers"));
    assert_eq!(tables[0].columns, ["name", "id"]);
    assert_eq!(tables[1].table, qualified("orders"));
    assert_eq!(tables[1].columns, ["customer_id", "amount"]);
    assert_eq!(analyzed.analysis.subqueries().len(), 1);
}

#[test]
fn exists_subquery_is_recorded() {
    let analyzed = analyze_one(
        "SELECT c.name FROM customers c \
         WHERE EXISTS (SELECT 1 FROM orders o WHERE o.customer_id = c.id)",
    )
    .unwrap();
    assert_eq!(analyzed.analysis.exists_subqueries().len(), 1);
}

#[test]
fn aggregate_in_where_is_rejected() {
    assert_eq!(
        error("SELECT col1 FROM test WHERE sum(n) > 1"),
        ErrorKind::AggregateNotAllowed { clause: "WHERE" }
    );
}

#[test]
fn aggregates_are_recorded() {
    let analyzed = analyze_one("SELECT col1, sum(n) FROM test GROUP BY col1").unwrap();
    assert_eq!(analyzed.analysis.aggregates().len(), 1);
}

#[test]
fn order_by_prefers_output_names() {
    assert_eq!(
        lineage("SELECT col2 AS n FROM test ORDER BY n"),
        vec![column("n", &["default.test.col2"])]
    );
}

#[test]
fn order_by_map_is_not_orderable() {
    assert!(matches!(
        error("SELECT k FROM events ORDER BY attrs"),
        ErrorKind::NotOrderable {
            clause: "ORDER BY",
            ..
        }
    ));
}

#[test]
fn ordinals_must_point_into_the_select_list() {
    assert!(analyze_one("SELECT col1, n FROM test GROUP BY 1 ORDER BY 2").is_ok());
    assert_eq!(
        error("SELECT col1 FROM test ORDER BY 3"),
        ErrorKind::InvalidOrdinal {
            clause: "ORDER BY",
            position: 3,
        }
    );
    assert_eq!(
        error("SELECT col1 FROM test GROUP BY 0"),
        ErrorKind::InvalidOrdinal {
            clause: "GROUP BY",
            position: 0,
        }
    );
}

#[test]
fn lambda_arguments_resolve_to_their_declaration() {
    let mut ast = Ast::new();
    let tags = ast.column("tags");
    let mut body_ref = None;
    let lambda = ast.lambda(&["x"], |ast| {
        let x = ast.identifier("x");
        body_ref = Some(x);
        ast.call("upper", vec![x])
    });
    let call = ast.call("transform", vec![tags, lambda]);
    let x = body_ref.unwrap();
    let Expr::Lambda { arguments, .. } = ast.expr(lambda) else {
        panic!("expected lambda");
    };
    let declaration = arguments[0];

    let events = qualified("events");
    let scope = Scope::builder()
        .with_relation_type(
            RelationId::anonymous(),
            RelationType::new(vec![Field::base_column(
                QualifiedName::parse("events"),
                events.clone(),
                "tags",
                Type::parse("array(varchar)"),
                false,
            )]),
        )
        .build();

    let metadata = SchemaMetadataService::empty();
    let mut analysis = Analysis::new(100);
    let sources: Vec<_> = {
        let mut analyzer =
            ExpressionAnalyzer::new(&ast, &mut analysis, &metadata, &NoSubqueries);
        analyzer.analyze(call, &scope).unwrap();
        analyzer.source_columns().into_iter().collect()
    };
    assert_eq!(sources.len(), 1);
    assert_eq!(sources[0].table, events);
    assert_eq!(sources[0].column, "tags");

    assert_eq!(analysis.lambda_argument_reference(x), Some(declaration));
    assert!(analysis.column_reference(x).is_none());
}

// Relations

#[test]
fn cte_lineage_flows_through() {
    assert_eq!(
        lineage(
            "WITH big AS (SELECT customer_id, amount * 2 AS doubled FROM orders) \
             SELECT b.doubled FROM big b"
        ),
        vec![column("doubled", &["default.orders.amount"])]
    );
}

#[test]
fn cte_column_list_renames() {
    assert_eq!(
        lineage("WITH t(x) AS (SELECT col1 FROM test) SELECT x FROM t"),
        vec![column("x", &["default.test.col1"])]
    );
    assert_eq!(
        error("WITH t(x, y) AS (SELECT col1 FROM test) SELECT x FROM t"),
        ErrorKind::ColumnCountMismatch {
            expected: 2,
            actual: 1,
        }
    );
}

#[test]
fn derived_table_with_column_aliases() {
    assert_eq!(
        lineage("SELECT d.a FROM (SELECT col1, col2 FROM test) AS d(a, b)"),
        vec![column("a", &["default.test.col1"])]
    );
}

#[test]
fn union_merges_sources_per_position() {
    assert_eq!(
        lineage("SELECT col1 FROM test UNION ALL SELECT name FROM customers"),
        vec![column(
            "col1",
            &["default.customers.name", "default.test.col1"]
        )]
    );
    assert!(matches!(
        error("SELECT col1 FROM test UNION SELECT id, name FROM customers"),
        ErrorKind::ColumnCountMismatch { .. }
    ));
}

#[test]
fn values_rows_have_no_sources() {
    assert_eq!(
        lineage("SELECT v.n FROM (VALUES (1, 'a'), (2, 'b')) AS v(n, s)"),
        vec![column("n", &[])]
    );
}

#[test]
fn views_expand_to_base_columns() {
    let analyzed = analyze_one("SELECT v.amount FROM big_orders v").unwrap();
    let columns = lineage::output_columns(&analyzed.analysis);
    let sources: Vec<_> = columns[0].sources.iter().map(ToString::to_string).collect();
    assert_eq!(sources, ["default.orders.amount"]);

    let tables = lineage::table_columns(&analyzed.analysis);
    assert_eq!(tables.len(), 1);
    assert_eq!(tables[0].table, qualified("orders"));
    assert_eq!(tables[0].columns, ["amount", "id"]);
}

#[test]
fn recursive_views_are_detected() {
    assert!(matches!(
        error("SELECT * FROM loop_a"),
        ErrorKind::RecursiveView(_)
    ));
}

// Statements

#[test]
fn insert_without_columns_uses_output_names() {
    let analyzed = analyze_one(
        "INSERT INTO demo SELECT CONCAT(a.col1, '-', a.col2), SUM(a.n) FROM test a GROUP BY a.n",
    )
    .unwrap();
    assert_eq!(analyzed.analysis.target(), Some(&qualified("demo")));
    let columns = lineage::output_columns(&analyzed.analysis);
    assert_eq!(columns.len(), 2);
    assert_eq!(columns[0].name, "_col0");
    assert_eq!(columns[1].name, "_col1");
    assert!(columns[1].sources.iter().all(|s| s.column == "n"));
    assert_eq!(columns[1].sources.len(), 1);
}

#[test]
fn insert_into_known_table_takes_its_column_names() {
    assert_eq!(
        lineage("INSERT INTO test SELECT name, region, id FROM customers"),
        vec![
            column("col1", &["default.customers.name"]),
            column("col2", &["default.customers.region"]),
            column("n", &["default.customers.id"]),
        ]
    );
}

#[test]
fn insert_column_list_wins_and_must_match() {
    assert_eq!(
        lineage("INSERT INTO test (n) SELECT id FROM customers"),
        vec![column("n", &["default.customers.id"])]
    );
    assert_eq!(
        error("INSERT INTO test (col1, col2) SELECT id FROM customers"),
        ErrorKind::ColumnCountMismatch {
            expected: 2,
            actual: 1,
        }
    );
}

#[test]
fn create_view_records_target_and_names() {
    let analyzed =
        analyze_one("CREATE VIEW recent (who, spent) AS SELECT c.name, o.amount FROM orders o JOIN customers c ON o.customer_id = c.id")
            .unwrap();
    assert_eq!(analyzed.analysis.target(), Some(&qualified("recent")));
    let names: Vec<_> = analyzed
        .analysis
        .output_columns()
        .iter()
        .map(|c| c.name.as_str())
        .collect();
    assert_eq!(names, ["who", "spent"]);
}

// Windows

#[test]
fn window_function_reads_partition_and_order_columns() {
    let analyzed = analyze_one(
        "SELECT k, sum(v) OVER (PARTITION BY k ORDER BY ts ROWS BETWEEN 1 PRECEDING AND CURRENT ROW) AS running FROM events",
    )
    .unwrap();
    assert_eq!(analyzed.analysis.window_functions().len(), 1);
    let columns = lineage::output_columns(&analyzed.analysis);
    let sources: Vec<_> = columns[1]
        .sources
        .iter()
        .map(|s| s.column.as_str())
        .collect();
    assert_eq!(sources, ["k", "ts", "v"]);
}

#[test]
fn named_window_in_order_by_uses_source_rows() {
    assert!(analyze_one(
        "SELECT col1 AS n FROM test WINDOW w AS (PARTITION BY n) ORDER BY rank() OVER w"
    )
    .is_ok());
}

#[test]
fn undefined_named_window_fails() {
    assert_eq!(
        error("SELECT rank() OVER w FROM test"),
        ErrorKind::WindowNotFound("w".into())
    );
}

#[test]
fn range_offset_requires_order_by() {
    assert_eq!(
        error("SELECT sum(n) OVER (RANGE BETWEEN 1 PRECEDING AND CURRENT ROW) FROM test"),
        ErrorKind::RangeRequiresOrderBy
    );
}

#[test]
fn frame_cannot_start_unbounded_following() {
    assert_eq!(
        error("SELECT sum(n) OVER (ORDER BY n ROWS BETWEEN UNBOUNDED FOLLOWING AND CURRENT ROW) FROM test"),
        ErrorKind::InvalidFrameStart
    );
}

// MATCH_RECOGNIZE

#[test]
fn match_recognize_one_row_per_match() {
    let analyzed = analyze_one(
        "SELECT m.k, m.last_v FROM events MATCH_RECOGNIZE (\
           PARTITION BY k ORDER BY ts \
           MEASURES LAST(b.v) AS last_v \
           ONE ROW PER MATCH \
           AFTER MATCH SKIP PAST LAST ROW \
           PATTERN (a b+) \
           DEFINE b AS b.v > PREV(b.v)\
         ) AS m",
    )
    .unwrap();
    let columns = lineage::output_columns(&analyzed.analysis);
    let names: Vec<_> = columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["k", "last_v"]);
    let sources: Vec<_> = columns[1].sources.iter().map(|s| s.column.as_str()).collect();
    assert_eq!(sources, ["v"]);
}

#[test]
fn match_recognize_rejects_unknown_labels() {
    assert_eq!(
        error(
            "SELECT * FROM events MATCH_RECOGNIZE (\
               ORDER BY ts MEASURES LAST(b.v) AS x PATTERN (a b+) DEFINE c AS c.v > 0\
             ) AS m"
        ),
        ErrorKind::UnknownPatternLabel("c".into())
    );
}

// Driver

#[test]
fn analyze_reports_failures_per_statement() {
    let request = AnalyzeRequest::new("SELECT a FROM nowhere; SELECT col1 FROM test")
        .with_schema(schema());
    let result = analyze(&request);

    assert_eq!(result.summary.statement_count, 2);
    assert_eq!(result.statements.len(), 1);
    assert_eq!(result.statements[0].statement_index, 1);
    assert_eq!(result.statements[0].statement_type, "SELECT");
    assert_eq!(result.issues.len(), 1);
    assert_eq!(result.issues[0].code, "TABLE_NOT_FOUND");
    assert_eq!(result.issues[0].statement_index, Some(0));
    assert!(result.issues[0].position.is_some());
    assert!(result.summary.has_errors);
    assert_eq!(result.summary.column_count, 1);
}

#[test]
fn analyze_reports_script_parse_errors_once() {
    let result = analyze(&AnalyzeRequest::new("SELECT FROM WHERE"));
    assert!(result.statements.is_empty());
    assert_eq!(result.issues.len(), 1);
    assert_eq!(result.issues[0].code, issue_codes::PARSE_ERROR);
    assert_eq!(result.summary.statement_count, 0);
}

#[test]
fn analyze_reports_unsupported_syntax() {
    let request =
        AnalyzeRequest::new("SELECT 1 FROM test a JOIN test b USING (n)").with_schema(schema());
    let result = analyze(&request);
    assert_eq!(result.issues[0].code, issue_codes::UNSUPPORTED_SYNTAX);
    assert_eq!(result.summary.statement_count, 1);
}

#[test]
fn analyze_carries_source_name() {
    let mut request = AnalyzeRequest::new("SELECT col1 FROM test").with_schema(schema());
    request.source_name = Some("models/test.sql".into());
    let result = analyze(&request);
    assert_eq!(
        result.statements[0].source_name.as_deref(),
        Some("models/test.sql")
    );
}

// Resolution properties

fn scope_of(alias: &str, columns: &[(&str, &str)]) -> RelationType {
    RelationType::new(
        columns
            .iter()
            .map(|(name, ty)| {
                Field::base_column(
                    QualifiedName::parse(alias),
                    qualified(alias),
                    name,
                    Type::parse(ty),
                    false,
                )
            })
            .collect(),
    )
}

#[test]
fn correlation_support_decides_outer_references() {
    let outer = Scope::builder()
        .with_relation_type(RelationId::anonymous(), scope_of("o", &[("outer_v", "bigint")]))
        .build();
    let inner = Scope::builder()
        .with_outer_query_parent(Arc::clone(&outer))
        .with_relation_type(RelationId::anonymous(), scope_of("i", &[("v", "bigint")]))
        .build();

    let mut ast = Ast::new();
    let reference = ast.identifier("outer_v");
    let metadata = SchemaMetadataService::empty();

    let mut analysis = Analysis::new(100);
    let disallowed =
        Context::new(Arc::clone(&inner)).with_correlation(CorrelationSupport::Disallowed);
    let err = ExpressionAnalyzer::new(&ast, &mut analysis, &metadata, &NoSubqueries)
        .analyze_in_context(reference, &disallowed)
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::CorrelationNotAllowed("outer_v".into()));

    let mut analysis = Analysis::new(100);
    let ty = ExpressionAnalyzer::new(&ast, &mut analysis, &metadata, &NoSubqueries)
        .analyze(reference, &inner)
        .unwrap();
    assert_eq!(ty, Type::Bigint);
    let resolved = analysis.column_reference(reference).expect("recorded");
    assert!(!resolved.is_local());
}

#[test]
fn qualified_and_bare_references_agree_until_ambiguous() {
    let analyzed = analyze_one("SELECT t.n, n FROM test t").unwrap();
    let references: Vec<_> = analyzed.analysis.column_references().values().collect();
    assert_eq!(references.len(), 2);
    assert_eq!(references[0], references[1]);

    assert_eq!(
        error("SELECT n FROM test t JOIN test u ON t.n = u.n"),
        ErrorKind::AmbiguousColumn("n".into())
    );
}

#[test]
fn repeated_analysis_is_deterministic() {
    let scope = Scope::builder()
        .with_relation_type(
            RelationId::anonymous(),
            scope_of("e", &[("v", "bigint"), ("payload", "row(a bigint, b varchar)")]),
        )
        .build();
    let mut ast = Ast::new();
    let v = ast.column("e.v");
    let a = ast.column("payload.a");
    let sum = ast.call("coalesce", vec![v, a]);
    let metadata = SchemaMetadataService::empty();

    let run = || {
        let mut analysis = Analysis::new(100);
        let ty = ExpressionAnalyzer::new(&ast, &mut analysis, &metadata, &NoSubqueries)
            .analyze(sum, &scope)
            .unwrap();
        let references: Vec<_> = analysis.column_references().values().cloned().collect();
        (ty, references)
    };
    let first = run();
    let second = run();
    assert_eq!(first.0, Type::Bigint);
    assert_eq!(first, second);
}

#[test]
fn duplicate_row_field_names_are_ambiguous() {
    let scope = Scope::builder()
        .with_relation_type(
            RelationId::anonymous(),
            scope_of("t", &[("r", "row(a bigint, a varchar, b bigint)")]),
        )
        .build();
    let metadata = SchemaMetadataService::empty();

    let mut ast = Ast::new();
    let ambiguous = ast.column("r.a");
    let fine = ast.column("r.b");
    let missing = ast.column("r.c");

    let mut analysis = Analysis::new(100);
    let mut analyzer = ExpressionAnalyzer::new(&ast, &mut analysis, &metadata, &NoSubqueries);
    assert_eq!(analyzer.analyze(fine, &scope).unwrap(), Type::Bigint);
    assert_eq!(
        analyzer.analyze(ambiguous, &scope).unwrap_err().kind,
        ErrorKind::AmbiguousRowField("a".into())
    );
    assert_eq!(
        analyzer.analyze(missing, &scope).unwrap_err().kind,
        ErrorKind::FieldNotFound("c".into())
    );
}

#[test]
fn scalar_subquery_exposes_its_single_column_type() {
    let analyzed =
        analyze_one("SELECT (SELECT t2.n FROM test t2 WHERE t2.col1 = 'x') AS m FROM test").unwrap();
    let subquery = *analyzed
        .analysis
        .subqueries()
        .first()
        .expect("subquery recorded");
    assert_eq!(analyzed.analysis.get_type(subquery), Some(&Type::Bigint));
    assert_eq!(analyzed.scope.relation_type().field(0).ty(), &Type::Bigint);
}

#[test]
fn navigation_offsets_are_bounded() {
    let sql = |offset: &str| {
        format!(
            "SELECT * FROM events MATCH_RECOGNIZE (ORDER BY ts \
             MEASURES FIRST(a.v, {offset}) AS x PATTERN (a) DEFINE a AS a.v > 0) AS m"
        )
    };

    let analyzed = analyze_one(&sql("3")).unwrap();
    let x = analyzed
        .scope
        .relation_type()
        .fields()
        .iter()
        .find(|field| field.name() == Some("x"))
        .expect("measure column");
    assert_eq!(x.ty(), &Type::Bigint);

    assert!(matches!(
        error(&sql("-1")),
        ErrorKind::OffsetMustBeNonNegativeInteger(_)
    ));
    assert!(matches!(
        error(&sql("2147483648")),
        ErrorKind::OffsetTooLarge(_)
    ));
}

// Window frames with row pattern recognition

fn events_scope() -> Arc<Scope> {
    Scope::builder()
        .with_relation_type(
            RelationId::anonymous(),
            scope_of("e", &[("k", "varchar"), ("ts", "timestamp"), ("v", "bigint")]),
        )
        .build()
}

fn last_of_a(ast: &mut Ast) -> ExprId {
    let value = ast.column("a.v");
    ast.call("last", vec![value])
}

fn measure(ast: &mut Ast, name: &str) -> MeasureDefinition {
    MeasureDefinition {
        name: Identifier::new(name),
        expression: last_of_a(ast),
    }
}

/// `ROWS BETWEEN CURRENT ROW AND UNBOUNDED FOLLOWING PATTERN (a) DEFINE a AS a.v > 0`
fn pattern_frame(ast: &mut Ast) -> WindowFrame {
    let mut frame = WindowFrame::new(
        FrameType::Rows,
        FrameBound::new(FrameBoundKind::CurrentRow),
        Some(FrameBound::new(FrameBoundKind::UnboundedFollowing)),
    );
    let value = ast.column("a.v");
    let zero = ast.long(0);
    let condition = ast.add_expr(Expr::Comparison {
        op: ComparisonOperator::GreaterThan,
        left: value,
        right: zero,
    });
    frame.pattern = Some(RowPattern::Label(Identifier::new("a")));
    frame.variable_definitions.push(VariableDefinition {
        name: Identifier::new("a"),
        expression: condition,
    });
    frame
}

fn check_window(ast: &Ast, window: &ResolvedWindow) -> Result<(), AnalysisError> {
    let metadata = SchemaMetadataService::empty();
    let mut analysis = Analysis::new(100);
    ExpressionAnalyzer::new(ast, &mut analysis, &metadata, &NoSubqueries)
        .analyze_window(window, &Context::new(events_scope()))
}

fn keep(_: &mut Ast, _: &mut WindowFrame) {}

fn measure_x(ast: &mut Ast, frame: &mut WindowFrame) {
    frame.measures.push(measure(ast, "x"));
}

fn without_define(_: &mut Ast, frame: &mut WindowFrame) {
    frame.variable_definitions.clear();
}

fn range_frame(_: &mut Ast, frame: &mut WindowFrame) {
    frame.frame_type = FrameType::Range;
}

fn starts_preceding(ast: &mut Ast, frame: &mut WindowFrame) {
    frame.start = FrameBound::preceding(ast.long(1));
}

fn without_end(_: &mut Ast, frame: &mut WindowFrame) {
    frame.end = None;
}

fn anchored(_: &mut Ast, frame: &mut WindowFrame) {
    frame.pattern = Some(RowPattern::Concatenation(vec![
        RowPattern::Anchor(Anchor::PartitionStart),
        RowPattern::Label(Identifier::new("a")),
    ]));
}

fn match_number_measure(ast: &mut Ast, frame: &mut WindowFrame) {
    let call = ast.call("match_number", vec![]);
    frame.measures.push(MeasureDefinition {
        name: Identifier::new("m"),
        expression: call,
    });
}

fn measures_without_pattern(ast: &mut Ast, frame: &mut WindowFrame) {
    frame.pattern = None;
    frame.variable_definitions.clear();
    frame.measures.push(measure(ast, "m"));
}

fn skip_without_pattern(_: &mut Ast, frame: &mut WindowFrame) {
    frame.pattern = None;
    frame.variable_definitions.clear();
    frame.after_match_skip = Some(SkipTo::PastLastRow);
}

fn seek_without_pattern(_: &mut Ast, frame: &mut WindowFrame) {
    frame.pattern = None;
    frame.variable_definitions.clear();
    frame.search_mode = Some(PatternSearchMode::Seek);
}

fn subsets_without_pattern(_: &mut Ast, frame: &mut WindowFrame) {
    frame.pattern = None;
    frame.variable_definitions.clear();
    frame.subsets.push(SubsetDefinition {
        name: Identifier::new("u"),
        members: vec![Identifier::new("a")],
    });
}

fn definitions_without_pattern(_: &mut Ast, frame: &mut WindowFrame) {
    frame.pattern = None;
}

#[rstest]
#[case::well_formed(keep, None)]
#[case::with_measure(measure_x, None)]
#[case::no_define(without_define, Some(ErrorKind::PatternRequiresDefine))]
#[case::range(range_frame, Some(ErrorKind::PatternRequiresRows))]
#[case::start_not_current_row(starts_preceding, Some(ErrorKind::PatternRequiresCurrentRowStart))]
#[case::no_end(without_end, Some(ErrorKind::PatternRequiresCurrentRowStart))]
#[case::anchor(anchored, Some(ErrorKind::AnchorNotAllowedInWindowPattern))]
#[case::match_number(match_number_measure, Some(ErrorKind::MatchNumberNotAllowedInWindow))]
#[case::measures(measures_without_pattern, Some(ErrorKind::MeasuresRequirePattern))]
#[case::after_match_skip(skip_without_pattern, Some(ErrorKind::AfterMatchSkipRequiresPattern))]
#[case::search_mode(seek_without_pattern, Some(ErrorKind::SearchModeRequiresPattern("SEEK")))]
#[case::subsets(subsets_without_pattern, Some(ErrorKind::SubsetsRequirePattern))]
#[case::definitions(definitions_without_pattern, Some(ErrorKind::DefinitionsRequirePattern))]
fn window_pattern_frame_rules(
    #[case] edit: fn(&mut Ast, &mut WindowFrame),
    #[case] expected: Option<ErrorKind>,
) {
    let mut ast = Ast::new();
    let mut frame = pattern_frame(&mut ast);
    edit(&mut ast, &mut frame);
    let window = ResolvedWindow::new(vec![], vec![], Some(frame));

    let result = check_window(&ast, &window);
    assert_eq!(result.err().map(|e| e.kind), expected);
}

fn measure_over_window(ast: &mut Ast, name: &str) -> ExprId {
    ast.add_expr(Expr::WindowOperation {
        name: Identifier::new(name),
        window: WindowRef::Named(Identifier::new("w")),
    })
}

#[test]
fn measure_over_window_resolves_against_the_frame() {
    let mut ast = Ast::new();
    let mut frame = pattern_frame(&mut ast);
    frame.measures.push(measure(&mut ast, "x"));
    let window = ResolvedWindow::new(vec![], vec![], Some(frame));
    let found = measure_over_window(&mut ast, "x");
    let missing = measure_over_window(&mut ast, "y");
    let unresolved = measure_over_window(&mut ast, "x");

    let metadata = SchemaMetadataService::empty();
    let scope = events_scope();
    let mut analysis = Analysis::new(100);
    analysis.set_window(found, window.clone());
    analysis.set_window(missing, window);
    let mut analyzer = ExpressionAnalyzer::new(&ast, &mut analysis, &metadata, &NoSubqueries);

    assert_eq!(analyzer.analyze(found, &scope).unwrap(), Type::Bigint);
    assert_eq!(
        analyzer.analyze(missing, &scope).unwrap_err().kind,
        ErrorKind::MeasureNotFound("y".into())
    );
    assert_eq!(
        analyzer.analyze(unresolved, &scope).unwrap_err().kind,
        ErrorKind::UnresolvedWindow
    );
    drop(analyzer);
    assert!(analysis.window_measures().contains(&found));
}

#[test]
fn measure_over_window_must_be_unique_and_framed() {
    let mut ast = Ast::new();
    let mut frame = pattern_frame(&mut ast);
    frame.measures.push(measure(&mut ast, "x"));
    frame.measures.push(measure(&mut ast, "x"));
    let duplicated = ResolvedWindow::new(vec![], vec![], Some(frame));
    let unframed = ResolvedWindow::new(vec![], vec![], None);
    let ambiguous = measure_over_window(&mut ast, "x");
    let no_frame = measure_over_window(&mut ast, "x");

    let metadata = SchemaMetadataService::empty();
    let scope = events_scope();
    let mut analysis = Analysis::new(100);
    analysis.set_window(ambiguous, duplicated);
    analysis.set_window(no_frame, unframed);
    let mut analyzer = ExpressionAnalyzer::new(&ast, &mut analysis, &metadata, &NoSubqueries);

    assert_eq!(
        analyzer.analyze(ambiguous, &scope).unwrap_err().kind,
        ErrorKind::AmbiguousMeasure("x".into())
    );
    assert_eq!(
        analyzer.analyze(no_frame, &scope).unwrap_err().kind,
        ErrorKind::MeasureNotFound("x".into())
    );
}

// Pattern recognition function calls

fn with_over(_: &mut Ast, call: &mut FunctionCall) {
    call.window = Some(WindowRef::Named(Identifier::new("w")));
}

fn with_filter(ast: &mut Ast, call: &mut FunctionCall) {
    call.filter = Some(ast.add_expr(Expr::Literal(Literal::Boolean(true))));
}

fn with_order_by(ast: &mut Ast, call: &mut FunctionCall) {
    call.order_by = vec![SortItem::new(ast.column("a.ts"))];
}

fn with_distinct(_: &mut Ast, call: &mut FunctionCall) {
    call.distinct = true;
}

fn running(_: &mut Ast, call: &mut FunctionCall) {
    call.processing_mode = Some(ProcessingMode::Running);
}

fn final_mode(_: &mut Ast, call: &mut FunctionCall) {
    call.processing_mode = Some(ProcessingMode::Final);
}

fn plain(_: &mut Ast, _: &mut FunctionCall) {}

#[rstest]
#[case::plain_prev("prev", plain, None)]
#[case::over("last", with_over, Some(ErrorKind::PatternFunctionCannotUseOver("LAST".into())))]
#[case::filter("first", with_filter, Some(ErrorKind::PatternFunctionCannotUseFilter("FIRST".into())))]
#[case::order_by("next", with_order_by, Some(ErrorKind::PatternFunctionCannotUseOrderBy("NEXT".into())))]
#[case::distinct("prev", with_distinct, Some(ErrorKind::PatternFunctionCannotUseDistinct("PREV".into())))]
#[case::running_last("last", running, None)]
#[case::final_first("first", final_mode, None)]
#[case::final_prev(
    "prev",
    final_mode,
    Some(ErrorKind::ProcessingModeNotAllowed { mode: "FINAL", function: "PREV".into() })
)]
#[case::running_next(
    "next",
    running,
    Some(ErrorKind::ProcessingModeNotAllowed { mode: "RUNNING", function: "NEXT".into() })
)]
fn pattern_function_call_rules(
    #[case] name: &str,
    #[case] edit: fn(&mut Ast, &mut FunctionCall),
    #[case] expected: Option<ErrorKind>,
) {
    let mut ast = Ast::new();
    let value = ast.column("a.v");
    let mut call = FunctionCall::new(QualifiedName::parse(name), vec![value]);
    edit(&mut ast, &mut call);
    let call = ast.add_expr(Expr::FunctionCall(call));

    let metadata = SchemaMetadataService::empty();
    let mut analysis = Analysis::new(100);
    let labels = ["a".to_string()].into_iter().collect();
    let result = ExpressionAnalyzer::new(&ast, &mut analysis, &metadata, &NoSubqueries)
        .analyze_pattern_recognition(call, &events_scope(), &labels);

    match expected {
        None => assert_eq!(result.unwrap(), Type::Bigint),
        Some(kind) => assert_eq!(result.unwrap_err().kind, kind),
    }
}

#[test]
fn processing_mode_outside_pattern_recognition_is_rejected() {
    let mut ast = Ast::new();
    let value = ast.column("e.v");
    let mut call = FunctionCall::new(QualifiedName::parse("max"), vec![value]);
    call.processing_mode = Some(ProcessingMode::Running);
    let call = ast.add_expr(Expr::FunctionCall(call));

    let metadata = SchemaMetadataService::empty();
    let mut analysis = Analysis::new(100);
    let err = ExpressionAnalyzer::new(&ast, &mut analysis, &metadata, &NoSubqueries)
        .analyze(call, &events_scope())
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_PROCESSING_MODE");
}
