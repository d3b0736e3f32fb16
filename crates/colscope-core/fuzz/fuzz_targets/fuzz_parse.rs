//! Fuzz target for parsing and lowering.
//!
//! `parse_statements()` must return errors, never panic, including on deeply
//! nested input.

#![no_main]

use arbitrary::Arbitrary;
use colscope_core::{parse_statements, Dialect};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    sql: String,
    dialect_idx: u8,
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

fuzz_target!(|input: FuzzInput| {
    let dialect = input.dialect();
    let _result = parse_statements(&input.sql, dialect, 64);
});
