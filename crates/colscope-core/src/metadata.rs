//! Catalog access for the analyzer.
//!
//! The analyzer never reads schema files or connects to databases itself; it
//! asks a [`MetadataService`]. [`SchemaMetadataService`] implements it over
//! the serializable [`SchemaMetadata`] carried in an analyze request.

use crate::ast::QualifiedName;
use crate::types::{ColumnSchema, Dialect, QualifiedObjectName, SchemaMetadata};
use std::collections::HashSet;

/// Column layout of a base table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSchema {
    pub name: QualifiedObjectName,
    pub columns: Vec<ColumnSchema>,
}

/// Stored SQL text of a view.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewDefinition {
    pub name: QualifiedObjectName,
    pub sql: String,
    pub dialect: Dialect,
}

pub trait MetadataService {
    fn table_schema(&self, name: &QualifiedObjectName) -> Option<TableSchema>;

    fn view_definition(&self, name: &QualifiedObjectName) -> Option<ViewDefinition>;

    fn is_aggregation_function(&self, name: &QualifiedName) -> bool;

    fn default_catalog(&self) -> Option<String> {
        None
    }

    fn default_schema(&self) -> Option<String> {
        None
    }

    /// Fills missing catalog and schema parts of a written table name from
    /// the session defaults. Names with more than three parts keep their last
    /// three.
    fn resolve_object_name(&self, name: &QualifiedName) -> QualifiedObjectName {
        let parts: Vec<&str> = name.parts().iter().map(|p| p.value.as_str()).collect();
        match parts.as_slice() {
            [table] => QualifiedObjectName::new(
                self.default_catalog(),
                self.default_schema(),
                *table,
            ),
            [schema, table] => {
                QualifiedObjectName::new(self.default_catalog(), Some(schema.to_string()), *table)
            }
            [.., catalog, schema, table] => QualifiedObjectName::new(
                Some(catalog.to_string()),
                Some(schema.to_string()),
                *table,
            ),
            [] => QualifiedObjectName::bare(""),
        }
    }
}

/// Aggregates recognized when the schema does not list its own.
pub const BUILTIN_AGGREGATE_FUNCTIONS: &[&str] = &[
    "any_value",
    "approx_distinct",
    "approx_percentile",
    "approx_set",
    "arbitrary",
    "array_agg",
    "avg",
    "bit_and",
    "bit_or",
    "bool_and",
    "bool_or",
    "checksum",
    "corr",
    "count",
    "count_if",
    "covar_pop",
    "covar_samp",
    "every",
    "geometric_mean",
    "group_concat",
    "histogram",
    "json_agg",
    "kurtosis",
    "listagg",
    "map_agg",
    "max",
    "max_by",
    "median",
    "min",
    "min_by",
    "multimap_agg",
    "regr_intercept",
    "regr_slope",
    "skewness",
    "stddev",
    "stddev_pop",
    "stddev_samp",
    "string_agg",
    "sum",
    "var_pop",
    "var_samp",
    "variance",
];

/// [`MetadataService`] backed by an in-memory [`SchemaMetadata`].
#[derive(Debug, Clone)]
pub struct SchemaMetadataService {
    schema: SchemaMetadata,
    aggregates: HashSet<String>,
}

impl SchemaMetadataService {
    pub fn new(schema: SchemaMetadata) -> Self {
        let aggregates = BUILTIN_AGGREGATE_FUNCTIONS
            .iter()
            .map(|name| name.to_string())
            .chain(schema.aggregate_functions.iter().map(|f| f.to_lowercase()))
            .collect();
        Self { schema, aggregates }
    }

    pub fn empty() -> Self {
        Self::new(SchemaMetadata::default())
    }

    fn qualify(&self, catalog: &Option<String>, schema: &Option<String>, name: &str) -> QualifiedObjectName {
        QualifiedObjectName::new(
            catalog.clone().or_else(|| self.schema.default_catalog.clone()),
            schema.clone().or_else(|| self.schema.default_schema.clone()),
            name,
        )
    }
}

impl Default for SchemaMetadataService {
    fn default() -> Self {
        Self::empty()
    }
}

/// Exact match first; otherwise parts missing on either side act as wildcards.
fn name_matches(candidate: &QualifiedObjectName, wanted: &QualifiedObjectName) -> bool {
    fn part(a: &Option<String>, b: &Option<String>) -> bool {
        match (a, b) {
            (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
            _ => true,
        }
    }
    candidate.name.eq_ignore_ascii_case(&wanted.name)
        && part(&candidate.schema, &wanted.schema)
        && part(&candidate.catalog, &wanted.catalog)
}

fn find_best<'a, T>(
    items: impl Iterator<Item = (QualifiedObjectName, &'a T)>,
    wanted: &QualifiedObjectName,
) -> Option<(QualifiedObjectName, &'a T)> {
    let mut fallback = None;
    for (name, item) in items {
        if &name == wanted {
            return Some((name, item));
        }
        if fallback.is_none() && name_matches(&name, wanted) {
            fallback = Some((name, item));
        }
    }
    fallback
}

impl MetadataService for SchemaMetadataService {
    fn table_schema(&self, name: &QualifiedObjectName) -> Option<TableSchema> {
        let tables = self
            .schema
            .tables
            .iter()
            .map(|t| (self.qualify(&t.catalog, &t.schema, &t.name), t));
        find_best(tables, name).map(|(name, table)| TableSchema {
            name,
            columns: table.columns.clone(),
        })
    }

    fn view_definition(&self, name: &QualifiedObjectName) -> Option<ViewDefinition> {
        let views = self
            .schema
            .views
            .iter()
            .map(|v| (self.qualify(&v.catalog, &v.schema, &v.name), v));
        find_best(views, name).map(|(name, view)| ViewDefinition {
            name,
            sql: view.sql.clone(),
            dialect: view.dialect,
        })
    }

    fn is_aggregation_function(&self, name: &QualifiedName) -> bool {
        self.aggregates.contains(&name.suffix().value.to_lowercase())
    }

    fn default_catalog(&self) -> Option<String> {
        self.schema.default_catalog.clone()
    }

    fn default_schema(&self) -> Option<String> {
        self.schema.default_schema.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SchemaTable;

    fn service() -> SchemaMetadataService {
        let mut table = SchemaTable::new("Orders", vec![ColumnSchema::new("id")]);
        table.schema = Some("sales".into());
        SchemaMetadataService::new(SchemaMetadata {
            default_schema: Some("sales".into()),
            tables: vec![table, SchemaTable::new("loose", vec![])],
            aggregate_functions: vec!["My_Agg".into()],
            ..Default::default()
        })
    }

    #[test]
    fn resolves_tables_with_session_defaults() {
        let service = service();
        let name = service.resolve_object_name(&QualifiedName::parse("orders"));
        assert_eq!(name.schema.as_deref(), Some("sales"));
        let table = service.table_schema(&name).unwrap();
        assert_eq!(table.name.name, "Orders");
        assert!(service
            .table_schema(&service.resolve_object_name(&QualifiedName::parse("other.orders")))
            .is_none());
    }

    #[test]
    fn catalog_less_lookup_falls_back_to_partial_match() {
        let service = service();
        let wanted = QualifiedObjectName::new(Some("cat".into()), Some("sales".into()), "orders");
        assert!(service.table_schema(&wanted).is_some());
    }

    #[test]
    fn aggregate_lookup_is_case_insensitive() {
        let service = service();
        assert!(service.is_aggregation_function(&QualifiedName::parse("SUM")));
        assert!(service.is_aggregation_function(&QualifiedName::parse("my_agg")));
        assert!(!service.is_aggregation_function(&QualifiedName::parse("concat")));
    }
}
