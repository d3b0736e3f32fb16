//! Lexical scopes for name resolution.
//!
//! Scopes form a chain through `parent`. A scope marked as a query boundary
//! separates a subquery from the query that encloses it: a field found by
//! walking past a boundary is an outer (correlated) reference and is reported
//! with `local == false`.

use super::data_type::Type;
use super::field::{Field, FieldId, RelationId, RelationType};
use crate::ast::{Identifier, QualifiedName, QueryId};
use crate::error::{ErrorKind, Result};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_SCOPE_ID: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(u64);

/// A CTE visible from a scope.
#[derive(Debug, Clone)]
pub struct NamedQuery {
    pub name: Identifier,
    pub query: QueryId,
    pub relation_type: RelationType,
}

pub struct Scope {
    id: ScopeId,
    parent: Option<Arc<Scope>>,
    query_boundary: bool,
    relation_id: RelationId,
    relation_type: RelationType,
    named_queries: HashMap<String, NamedQuery>,
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("id", &self.id)
            .field("query_boundary", &self.query_boundary)
            .field("fields", &self.relation_type.len())
            .field("parent", &self.parent.as_ref().map(|p| p.id))
            .finish()
    }
}

#[derive(Default)]
pub struct ScopeBuilder {
    parent: Option<Arc<Scope>>,
    query_boundary: bool,
    relation: Option<(RelationId, RelationType)>,
    named_queries: HashMap<String, NamedQuery>,
}

impl ScopeBuilder {
    /// Parent within the same query.
    pub fn with_parent(mut self, parent: Arc<Scope>) -> Self {
        self.parent = Some(parent);
        self.query_boundary = false;
        self
    }

    /// Parent in an enclosing query.
    pub fn with_outer_query_parent(mut self, parent: Arc<Scope>) -> Self {
        self.parent = Some(parent);
        self.query_boundary = true;
        self
    }

    pub fn with_relation_type(mut self, id: RelationId, relation_type: RelationType) -> Self {
        self.relation = Some((id, relation_type));
        self
    }

    pub fn with_named_query(mut self, named: NamedQuery) -> Self {
        self.named_queries.insert(named.name.canonical(), named);
        self
    }

    pub fn build(self) -> Arc<Scope> {
        let (relation_id, relation_type) = self
            .relation
            .unwrap_or_else(|| (RelationId::anonymous(), RelationType::empty()));
        Arc::new(Scope {
            id: ScopeId(NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed)),
            parent: self.parent,
            query_boundary: self.query_boundary,
            relation_id,
            relation_type,
            named_queries: self.named_queries,
        })
    }
}

/// A field resolved from a name, together with the scope that owns it.
#[derive(Debug, Clone)]
pub struct ResolvedField {
    scope: Arc<Scope>,
    field_id: FieldId,
    field: Field,
    local: bool,
}

impl ResolvedField {
    pub fn scope(&self) -> &Arc<Scope> {
        &self.scope
    }

    pub fn field_id(&self) -> FieldId {
        self.field_id
    }

    pub fn field(&self) -> &Field {
        &self.field
    }

    pub fn ty(&self) -> &Type {
        self.field.ty()
    }

    /// False when resolution crossed a query boundary.
    pub fn is_local(&self) -> bool {
        self.local
    }
}

impl PartialEq for ResolvedField {
    fn eq(&self, other: &Self) -> bool {
        self.scope.id == other.scope.id
            && self.field_id == other.field_id
            && self.local == other.local
    }
}

impl Eq for ResolvedField {}

impl Scope {
    pub fn builder() -> ScopeBuilder {
        ScopeBuilder::default()
    }

    /// An empty root scope.
    pub fn create() -> Arc<Scope> {
        Self::builder().build()
    }

    pub fn id(&self) -> ScopeId {
        self.id
    }

    pub fn parent(&self) -> Option<&Arc<Scope>> {
        self.parent.as_ref()
    }

    pub fn is_query_boundary(&self) -> bool {
        self.query_boundary
    }

    pub fn relation_id(&self) -> RelationId {
        self.relation_id
    }

    pub fn relation_type(&self) -> &RelationType {
        &self.relation_type
    }

    /// Parent scope within the same query, if any.
    pub fn local_parent(&self) -> Option<&Arc<Scope>> {
        if self.query_boundary {
            None
        } else {
            self.parent.as_ref()
        }
    }

    /// First scope of the enclosing query.
    pub fn outer_query_parent(&self) -> Option<&Arc<Scope>> {
        let mut current = self;
        loop {
            if current.query_boundary {
                return current.parent.as_ref();
            }
            current = current.parent.as_deref()?;
        }
    }

    /// Finds a CTE by name in this scope or any ancestor.
    pub fn named_query(&self, name: &Identifier) -> Option<&NamedQuery> {
        let key = name.canonical();
        let mut current = Some(self);
        while let Some(scope) = current {
            if let Some(named) = scope.named_queries.get(&key) {
                return Some(named);
            }
            current = scope.parent.as_deref();
        }
        None
    }

    /// Resolves `name`, failing with `ColumnNotFound` when nothing matches.
    pub fn resolve_field(self: &Arc<Self>, name: &QualifiedName) -> Result<ResolvedField> {
        self.try_resolve_field(name)?
            .ok_or_else(|| ErrorKind::ColumnNotFound(name.to_string()).into())
    }

    /// Resolves `name` against this scope, then against ancestors.
    ///
    /// Stops without error when the name is not found here but some prefix of
    /// it names a field of this scope (a row field access on that column).
    /// More than one match in the first scope that matches at all is an
    /// `AmbiguousColumn` error.
    pub fn try_resolve_field(
        self: &Arc<Self>,
        name: &QualifiedName,
    ) -> Result<Option<ResolvedField>> {
        let mut current = Arc::clone(self);
        let mut local = true;
        loop {
            let matches = current.relation_type.resolve_fields(name);
            match matches.as_slice() {
                [(index, field)] => {
                    let resolved = ResolvedField {
                        field_id: FieldId::new(current.relation_id, *index),
                        field: (*field).clone(),
                        scope: Arc::clone(&current),
                        local,
                    };
                    return Ok(Some(resolved));
                }
                [_, _, ..] => return Err(ErrorKind::AmbiguousColumn(name.to_string()).into()),
                [] => {}
            }
            if has_field_prefix(&current.relation_type, name) {
                return Ok(None);
            }
            let Some(parent) = current.parent.clone() else {
                return Ok(None);
            };
            local = local && !current.query_boundary;
            current = parent;
        }
    }

    /// Positional resolution used for [`crate::ast::Expr::FieldReference`].
    pub fn resolve_field_by_index(self: &Arc<Self>, index: usize) -> ResolvedField {
        ResolvedField {
            field_id: FieldId::new(self.relation_id, index),
            field: self.relation_type.field(index).clone(),
            scope: Arc::clone(self),
            local: true,
        }
    }

    /// True when `name` could denote a column in this scope chain: some
    /// prefix of it names a field (row access) or a relation alias, even if
    /// the column itself does not exist.
    pub fn is_column_reference(&self, name: &QualifiedName) -> bool {
        let mut current = Some(self);
        while let Some(scope) = current {
            let mut prefix = name.prefix();
            while let Some(p) = prefix {
                if scope.relation_type.can_resolve(&p) || scope.relation_type.has_relation(&p) {
                    return true;
                }
                prefix = p.prefix();
            }
            current = scope.parent.as_deref();
        }
        false
    }

    /// True when some prefix of `name` resolves to a field anywhere in the
    /// chain.
    pub fn has_field_prefix(&self, name: &QualifiedName) -> bool {
        let mut current = Some(self);
        while let Some(scope) = current {
            if has_field_prefix(&scope.relation_type, name) {
                return true;
            }
            current = scope.parent.as_deref();
        }
        false
    }

    /// True when `other` is reachable from this scope without crossing a
    /// query boundary.
    pub fn is_local_scope(&self, other: &Scope) -> bool {
        let mut current = Some(self);
        while let Some(scope) = current {
            if scope.id == other.id {
                return true;
            }
            current = scope.local_parent().map(Arc::as_ref);
        }
        false
    }
}

fn has_field_prefix(relation: &RelationType, name: &QualifiedName) -> bool {
    let mut prefix = name.prefix();
    while let Some(p) = prefix {
        if relation.can_resolve(&p) {
            return true;
        }
        prefix = p.prefix();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::QualifiedObjectName;

    fn table_scope(parent: Option<(Arc<Scope>, bool)>, table: &str, columns: &[&str]) -> Arc<Scope> {
        let fields = columns
            .iter()
            .map(|column| {
                Field::base_column(
                    QualifiedName::parse(table),
                    QualifiedObjectName::bare(table),
                    column,
                    Type::Unknown,
                    false,
                )
            })
            .collect();
        let mut builder = Scope::builder();
        builder = match parent {
            Some((parent, true)) => builder.with_outer_query_parent(parent),
            Some((parent, false)) => builder.with_parent(parent),
            None => builder,
        };
        builder
            .with_relation_type(RelationId::anonymous(), RelationType::new(fields))
            .build()
    }

    #[test]
    fn outer_references_are_not_local() {
        let outer = table_scope(None, "a", &["x", "y"]);
        let inner = table_scope(Some((outer.clone(), true)), "b", &["z"]);

        let own = inner.resolve_field(&QualifiedName::parse("z")).unwrap();
        assert!(own.is_local());

        let outer_ref = inner.resolve_field(&QualifiedName::parse("a.x")).unwrap();
        assert!(!outer_ref.is_local());
        assert_eq!(outer_ref.scope().id(), outer.id());
        assert!(Arc::ptr_eq(inner.outer_query_parent().unwrap(), &outer));
    }

    #[test]
    fn same_query_parent_keeps_locality() {
        let base = table_scope(None, "a", &["x"]);
        let child = table_scope(Some((base, false)), "b", &["y"]);
        assert!(child
            .resolve_field(&QualifiedName::parse("x"))
            .unwrap()
            .is_local());
    }

    #[test]
    fn duplicate_unqualified_name_is_ambiguous() {
        let left = table_scope(None, "a", &["id"]);
        let right = table_scope(None, "b", &["id"]);
        let joined = Scope::builder()
            .with_relation_type(
                RelationId::anonymous(),
                left.relation_type().join(right.relation_type()),
            )
            .build();
        let err = joined.resolve_field(&QualifiedName::parse("id")).unwrap_err();
        assert_eq!(err.kind, ErrorKind::AmbiguousColumn("id".into()));
        assert!(joined
            .resolve_field(&QualifiedName::parse("b.id"))
            .is_ok());
    }

    #[test]
    fn column_reference_detection_uses_relation_aliases() {
        let scope = table_scope(None, "t", &["c"]);
        assert!(scope.is_column_reference(&QualifiedName::parse("t.missing")));
        assert!(!scope.is_column_reference(&QualifiedName::parse("u.c")));
        assert!(!scope.has_field_prefix(&QualifiedName::parse("t.missing")));
        assert!(scope.has_field_prefix(&QualifiedName::parse("c.f")));
        assert_eq!(
            scope
                .try_resolve_field(&QualifiedName::parse("u.c"))
                .unwrap(),
            None
        );
    }
}
