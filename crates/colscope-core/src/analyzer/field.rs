//! Fields, relation shapes and their identities.

use super::data_type::Type;
use crate::ast::{ExprId, Identifier, QualifiedName, QueryId, RelationRef};
use crate::types::{QualifiedObjectName, SourceColumn};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_ANONYMOUS_RELATION: AtomicU64 = AtomicU64::new(0);

/// Identity of a relation: the AST node that produced it, or a fresh
/// anonymous id for synthesized relations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RelationId(RelationSource);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum RelationSource {
    Relation(RelationRef),
    Query(QueryId),
    Expression(ExprId),
    Anonymous(u64),
}

impl RelationId {
    pub fn of_relation(relation: RelationRef) -> Self {
        Self(RelationSource::Relation(relation))
    }

    pub fn of_query(query: QueryId) -> Self {
        Self(RelationSource::Query(query))
    }

    /// Relation introduced by an expression, e.g. a lambda's arguments.
    pub fn of_expr(expr: ExprId) -> Self {
        Self(RelationSource::Expression(expr))
    }

    /// Never equal to any other id.
    pub fn anonymous() -> Self {
        Self(RelationSource::Anonymous(
            NEXT_ANONYMOUS_RELATION.fetch_add(1, Ordering::Relaxed),
        ))
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self.0, RelationSource::Anonymous(_))
    }
}

/// A field's position within a relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldId {
    pub relation: RelationId,
    pub index: usize,
}

impl FieldId {
    pub fn new(relation: RelationId, index: usize) -> Self {
        Self { relation, index }
    }
}

/// A column of a relation.
///
/// `origin_table`/`origin_column` are set when the field is a direct
/// pass-through of a base table column. `sources` is the set of base columns
/// the field's value derives from, carried through derived tables, CTEs,
/// views and set operations.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    relation_alias: Option<QualifiedName>,
    name: Option<String>,
    ty: Type,
    hidden: bool,
    origin_table: Option<QualifiedObjectName>,
    origin_column: Option<String>,
    aliased: bool,
    sources: BTreeSet<SourceColumn>,
}

impl Field {
    pub fn new_unqualified(name: Option<String>, ty: Type) -> Self {
        Self {
            relation_alias: None,
            name,
            ty,
            hidden: false,
            origin_table: None,
            origin_column: None,
            aliased: false,
            sources: BTreeSet::new(),
        }
    }

    pub fn new_qualified(relation_alias: QualifiedName, name: Option<String>, ty: Type) -> Self {
        Self {
            relation_alias: Some(relation_alias),
            ..Self::new_unqualified(name, ty)
        }
    }

    /// A base-table column; its only source is itself.
    pub fn base_column(
        relation_alias: QualifiedName,
        table: QualifiedObjectName,
        column: &str,
        ty: Type,
        hidden: bool,
    ) -> Self {
        let source = SourceColumn::new(table.clone(), column);
        Self {
            relation_alias: Some(relation_alias),
            name: Some(column.to_string()),
            ty,
            hidden,
            origin_table: Some(table),
            origin_column: Some(column.to_string()),
            aliased: false,
            sources: BTreeSet::from([source]),
        }
    }

    pub fn with_origin(mut self, table: QualifiedObjectName, column: impl Into<String>) -> Self {
        self.origin_table = Some(table);
        self.origin_column = Some(column.into());
        self
    }

    pub fn with_sources(mut self, sources: impl IntoIterator<Item = SourceColumn>) -> Self {
        self.sources.extend(sources);
        self
    }

    pub fn with_aliased(mut self, aliased: bool) -> Self {
        self.aliased = aliased;
        self
    }

    pub fn with_hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    /// Same field seen through a different relation alias and optional new name.
    pub fn realias(&self, relation_alias: Option<QualifiedName>, name: Option<String>) -> Self {
        Self {
            relation_alias,
            name: name.or_else(|| self.name.clone()),
            ..self.clone()
        }
    }

    pub fn relation_alias(&self) -> Option<&QualifiedName> {
        self.relation_alias.as_ref()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn ty(&self) -> &Type {
        &self.ty
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn origin_table(&self) -> Option<&QualifiedObjectName> {
        self.origin_table.as_ref()
    }

    pub fn origin_column(&self) -> Option<&str> {
        self.origin_column.as_deref()
    }

    pub fn is_aliased(&self) -> bool {
        self.aliased
    }

    pub fn sources(&self) -> &BTreeSet<SourceColumn> {
        &self.sources
    }

    /// Both origin table and column are known.
    pub fn is_traceable(&self) -> bool {
        self.origin_table.is_some() && self.origin_column.is_some()
    }

    /// True when this field's relation alias ends with `prefix`.
    pub fn matches_prefix(&self, prefix: &QualifiedName) -> bool {
        self.relation_alias
            .as_ref()
            .is_some_and(|alias| alias.has_suffix(prefix))
    }

    /// True when `name` (optionally qualified) designates this field.
    pub fn can_resolve(&self, name: &QualifiedName) -> bool {
        let Some(own) = &self.name else {
            return false;
        };
        if !name.suffix().matches(own) {
            return false;
        }
        match name.prefix() {
            Some(prefix) => self.matches_prefix(&prefix),
            None => true,
        }
    }
}

/// Ordered list of fields exposed by a relation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelationType {
    fields: Vec<Field>,
}

impl RelationType {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(&self, index: usize) -> &Field {
        &self.fields[index]
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn visible_fields(&self) -> impl Iterator<Item = (usize, &Field)> {
        self.fields
            .iter()
            .enumerate()
            .filter(|(_, field)| !field.is_hidden())
    }

    pub fn visible_count(&self) -> usize {
        self.visible_fields().count()
    }

    /// Every field `name` designates, hidden ones included.
    pub fn resolve_fields(&self, name: &QualifiedName) -> Vec<(usize, &Field)> {
        self.fields
            .iter()
            .enumerate()
            .filter(|(_, field)| field.can_resolve(name))
            .collect()
    }

    pub fn can_resolve(&self, name: &QualifiedName) -> bool {
        self.fields.iter().any(|field| field.can_resolve(name))
    }

    /// True when some field's relation alias ends with `prefix`.
    pub fn has_relation(&self, prefix: &QualifiedName) -> bool {
        self.fields.iter().any(|field| field.matches_prefix(prefix))
    }

    /// Concatenation used for joins.
    pub fn join(&self, other: &RelationType) -> RelationType {
        let mut fields = self.fields.clone();
        fields.extend(other.fields.iter().cloned());
        Self { fields }
    }

    /// Re-qualifies every field with `alias`; visible fields are renamed by
    /// `columns` in order when column aliases are given.
    pub fn with_alias(&self, alias: &Identifier, columns: &[Identifier]) -> RelationType {
        let alias = QualifiedName::single(alias.clone());
        let mut renames = columns.iter();
        let fields = self
            .fields
            .iter()
            .map(|field| {
                let name = if field.is_hidden() {
                    None
                } else {
                    renames.next().map(|column| column.value.clone())
                };
                field.realias(Some(alias.clone()), name)
            })
            .collect();
        Self { fields }
    }

    /// Qualifies every field with `alias`, keeping names.
    pub fn with_relation_alias(&self, alias: QualifiedName) -> RelationType {
        Self {
            fields: self
                .fields
                .iter()
                .map(|field| field.realias(Some(alias.clone()), None))
                .collect(),
        }
    }

    /// Drops hidden fields, as seen by an enclosing query.
    pub fn with_only_visible_fields(&self) -> RelationType {
        Self {
            fields: self
                .fields
                .iter()
                .filter(|field| !field.is_hidden())
                .cloned()
                .collect(),
        }
    }
}
