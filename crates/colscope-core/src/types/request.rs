//! Request types for the column lineage analysis API.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Default bound on expression and query nesting.
pub const DEFAULT_MAX_DEPTH: usize = 100;

/// A request to analyze SQL for column-level lineage.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    /// The SQL code to analyze (UTF-8 string, multi-statement supported)
    pub sql: String,

    /// SQL dialect
    #[serde(default)]
    pub dialect: Dialect,

    /// Optional source name (file path or script identifier) for grouping
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_name: Option<String>,

    /// Optional analysis options
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<AnalysisOptions>,

    /// Tables, views and defaults used for name resolution
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<SchemaMetadata>,
}

impl AnalyzeRequest {
    /// A request for `sql` in the generic dialect with no schema.
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            dialect: Dialect::Generic,
            source_name: None,
            options: None,
            schema: None,
        }
    }

    pub fn with_schema(mut self, schema: SchemaMetadata) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn max_depth(&self) -> usize {
        self.options
            .as_ref()
            .and_then(|options| options.max_depth)
            .unwrap_or(DEFAULT_MAX_DEPTH)
    }
}

/// SQL dialect for parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
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

impl Dialect {
    /// Convert to sqlparser dialect.
    pub fn to_sqlparser_dialect(&self) -> Box<dyn sqlparser::dialect::Dialect> {
        use sqlparser::dialect::{
            AnsiDialect, BigQueryDialect, ClickHouseDialect, DatabricksDialect, DuckDbDialect,
            GenericDialect, HiveDialect, MsSqlDialect, MySqlDialect, PostgreSqlDialect,
            RedshiftSqlDialect, SQLiteDialect, SnowflakeDialect,
        };
        match self {
            Self::Generic => Box::new(GenericDialect {}),
            Self::Ansi => Box::new(AnsiDialect {}),
            Self::Bigquery => Box::new(BigQueryDialect {}),
            Self::Clickhouse => Box::new(ClickHouseDialect {}),
            Self::Databricks => Box::new(DatabricksDialect {}),
            Self::Duckdb => Box::new(DuckDbDialect {}),
            Self::Hive => Box::new(HiveDialect {}),
            Self::Mssql => Box::new(MsSqlDialect {}),
            Self::Mysql => Box::new(MySqlDialect {}),
            Self::Postgres => Box::new(PostgreSqlDialect {}),
            Self::Redshift => Box::new(RedshiftSqlDialect {}),
            Self::Snowflake => Box::new(SnowflakeDialect {}),
            Self::Sqlite => Box::new(SQLiteDialect {}),
        }
    }
}

/// Options controlling the analysis behavior.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisOptions {
    /// Maximum expression/query nesting before a statement is rejected as too
    /// large (default 100)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<usize>,
}

/// Schema metadata used for name resolution.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct SchemaMetadata {
    /// Default catalog applied to unqualified table names
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_catalog: Option<String>,

    /// Default schema applied to unqualified table names
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_schema: Option<String>,

    #[serde(default)]
    pub tables: Vec<SchemaTable>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub views: Vec<SchemaView>,

    /// Aggregate functions in addition to the built-in list
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aggregate_functions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SchemaTable {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    pub name: String,
    #[serde(default)]
    pub columns: Vec<ColumnSchema>,
}

impl SchemaTable {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnSchema>) -> Self {
        Self {
            catalog: None,
            schema: None,
            name: name.into(),
            columns,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ColumnSchema {
    pub name: String,
    /// Textual SQL type such as `bigint`, `array(varchar)` or `row(a int)`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
    /// Hidden columns resolve by name but are skipped by `*`
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub hidden: bool,
}

impl ColumnSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: None,
            hidden: false,
        }
    }

    pub fn typed(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            data_type: Some(data_type.into()),
            ..Self::new(name)
        }
    }
}

/// A view whose definition is expanded during analysis.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SchemaView {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    pub name: String,
    /// The view's defining query
    pub sql: String,
    /// Dialect of `sql` (defaults to generic)
    #[serde(default)]
    pub dialect: Dialect,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analyze_request_serialization() {
        let request = AnalyzeRequest::new("SELECT * FROM users").with_dialect(Dialect::Postgres);
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"dialect\":\"postgres\""));

        let deserialized: AnalyzeRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.dialect, Dialect::Postgres);
        assert_eq!(deserialized.max_depth(), DEFAULT_MAX_DEPTH);
    }

    #[test]
    fn test_schema_metadata_deserialization() {
        let json = r#"{
            "defaultSchema": "default",
            "tables": [
                {
                    "name": "test",
                    "columns": [
                        { "name": "col1" },
                        { "name": "n", "dataType": "bigint" },
                        { "name": "_rowid", "hidden": true }
                    ]
                }
            ],
            "views": [{ "name": "v", "sql": "SELECT col1 FROM test" }]
        }"#;

        let schema: SchemaMetadata = serde_json::from_str(json).unwrap();
        assert_eq!(schema.default_schema.as_deref(), Some("default"));
        assert_eq!(schema.tables[0].columns.len(), 3);
        assert_eq!(schema.tables[0].columns[1], ColumnSchema::typed("n", "bigint"));
        assert!(schema.tables[0].columns[2].hidden);
        assert_eq!(schema.views[0].dialect, Dialect::Generic);
    }

    #[test]
    fn test_max_depth_override() {
        let mut request = AnalyzeRequest::new("SELECT 1");
        request.options = Some(AnalysisOptions {
            max_depth: Some(8),
        });
        assert_eq!(request.max_depth(), 8);
    }
}
