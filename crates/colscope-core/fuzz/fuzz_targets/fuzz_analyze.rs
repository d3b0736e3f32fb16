//! Fuzz target for the lineage analyzer.
//!
//! `analyze()` must never panic; every failure is reported as an issue.

#![no_main]

use arbitrary::Arbitrary;
use colscope_core::{
    analyze, AnalysisOptions, AnalyzeRequest, ColumnSchema, Dialect, SchemaMetadata, SchemaTable,
    SchemaView,
};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    sql: String,
    dialect_idx: u8,
    max_depth: u8,
}

impl FuzzInput {
    fn dialect(&self) -> Dialect {
        match self.dialect_idx % 5 {
            0 => Dialect::Generic,
            1 => Dialect::Postgres,
            2 => Dialect::Snowflake,
            3 => Dialect::Bigquery,
            _ => Dialect::Duckdb,
        }
    }
}

fn schema() -> SchemaMetadata {
    SchemaMetadata {
        default_schema: Some("default".into()),
        tables: vec![
            SchemaTable::new(
                "t",
                vec![
                    ColumnSchema::typed("a", "bigint"),
                    ColumnSchema::typed("b", "varchar"),
                    ColumnSchema::typed("r", "row(x bigint, y array(varchar))"),
                ],
            ),
            SchemaTable::new("u", vec![ColumnSchema::new("a"), ColumnSchema::new("c")]),
        ],
        views: vec![SchemaView {
            catalog: None,
            schema: None,
            name: "v".into(),
            sql: "SELECT t.a, u.c FROM t JOIN u ON t.a = u.a".into(),
            dialect: Dialect::Generic,
        }],
        ..Default::default()
    }
}

fuzz_target!(|input: FuzzInput| {
    let dialect = input.dialect();
    let max_depth = usize::from(input.max_depth.max(1));
    let mut request = AnalyzeRequest::new(input.sql)
        .with_dialect(dialect)
        .with_schema(schema());
    request.options = Some(AnalysisOptions {
        max_depth: Some(max_depth),
    });

    let _result = analyze(&request);
});
