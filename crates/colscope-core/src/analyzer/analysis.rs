//! Side tables filled while analyzing one statement.

use super::data_type::Type;
use super::field::{Field, FieldId};
use super::scope::{ResolvedField, Scope};
use crate::ast::{ExprId, QueryId, SortItem, WindowFrame};
use crate::error::{ErrorKind, Location, Result};
use crate::types::{QualifiedObjectName, SourceColumn};
use indexmap::{IndexMap, IndexSet};
use std::collections::HashMap;
use std::sync::Arc;
#[cfg(feature = "tracing")]
use tracing::debug;

/// Window definition after merging a referenced named window.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedWindow {
    pub partition_by: Vec<ExprId>,
    pub order_by: Vec<SortItem>,
    pub frame: Option<WindowFrame>,
    pub partition_by_inherited: bool,
    pub order_by_inherited: bool,
    pub frame_inherited: bool,
    /// Fields read by the inherited parts when the named window was defined.
    pub inherited_fields: Vec<Field>,
}

impl ResolvedWindow {
    /// A window with nothing inherited from a named window.
    pub fn new(partition_by: Vec<ExprId>, order_by: Vec<SortItem>, frame: Option<WindowFrame>) -> Self {
        Self {
            partition_by,
            order_by,
            frame,
            partition_by_inherited: false,
            order_by_inherited: false,
            frame_inherited: false,
            inherited_fields: Vec::new(),
        }
    }
}

/// `label.column` inside a pattern-recognition context.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelDereference {
    pub label: String,
    pub field: ResolvedField,
}

/// One projected column of the statement, in output order.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputColumnSpec {
    pub id: FieldId,
    pub name: String,
    pub sources: IndexSet<SourceColumn>,
}

#[derive(Debug, Default)]
pub struct Analysis {
    max_depth: usize,
    depth: usize,
    expression_types: HashMap<ExprId, Type>,
    coercions: HashMap<ExprId, Type>,
    subqueries: IndexSet<ExprId>,
    exists_subqueries: IndexSet<ExprId>,
    in_subqueries: IndexSet<ExprId>,
    window_functions: IndexSet<ExprId>,
    window_measures: IndexSet<ExprId>,
    aggregates: IndexSet<ExprId>,
    pattern_recognition_functions: IndexSet<ExprId>,
    column_references: IndexMap<ExprId, ResolvedField>,
    lambda_argument_references: IndexMap<ExprId, ExprId>,
    label_dereferences: IndexMap<ExprId, LabelDereference>,
    windows: HashMap<ExprId, ResolvedWindow>,
    table_column_references: IndexMap<QualifiedObjectName, IndexSet<String>>,
    expression_sources: IndexMap<ExprId, IndexSet<SourceColumn>>,
    scopes: HashMap<QueryId, Arc<Scope>>,
    target: Option<QualifiedObjectName>,
    output_columns: Vec<OutputColumnSpec>,
}

impl Analysis {
    pub fn new(max_depth: usize) -> Self {
        Self {
            max_depth,
            ..Self::default()
        }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Enters one level of nesting, failing once `max_depth` is exceeded.
    /// Every successful call must be paired with [`Analysis::leave`].
    pub fn enter(&mut self, location: Option<Location>) -> Result<()> {
        if self.depth >= self.max_depth {
            #[cfg(feature = "tracing")]
            debug!(max_depth = self.max_depth, "nesting limit reached");
            return Err(crate::error::AnalysisError::new(ErrorKind::InputTooLarge(
                self.max_depth,
            ))
            .at(location));
        }
        self.depth += 1;
        Ok(())
    }

    pub fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    pub fn set_type(&mut self, expr: ExprId, ty: Type) {
        self.expression_types.insert(expr, ty);
    }

    pub fn get_type(&self, expr: ExprId) -> Option<&Type> {
        self.expression_types.get(&expr)
    }

    pub fn add_coercion(&mut self, expr: ExprId, ty: Type) {
        self.coercions.insert(expr, ty);
    }

    pub fn coercion(&self, expr: ExprId) -> Option<&Type> {
        self.coercions.get(&expr)
    }

    /// Records the field `expr` resolved to.
    ///
    /// # Panics
    ///
    /// When `expr` was already recorded with a different field. Re-recording
    /// the same field is allowed.
    pub fn add_column_reference(&mut self, expr: ExprId, field: ResolvedField) {
        if let Some(previous) = self.column_references.get(&expr) {
            assert!(
                previous == &field,
                "expression {expr:?} already resolved to a different field"
            );
            return;
        }
        self.column_references.insert(expr, field);
    }

    pub fn column_reference(&self, expr: ExprId) -> Option<&ResolvedField> {
        self.column_references.get(&expr)
    }

    pub fn column_references(&self) -> &IndexMap<ExprId, ResolvedField> {
        &self.column_references
    }

    pub fn add_lambda_argument_reference(&mut self, expr: ExprId, declaration: ExprId) {
        self.lambda_argument_references.insert(expr, declaration);
    }

    pub fn lambda_argument_reference(&self, expr: ExprId) -> Option<ExprId> {
        self.lambda_argument_references.get(&expr).copied()
    }

    pub fn add_label_dereference(&mut self, expr: ExprId, label: String, field: ResolvedField) {
        self.label_dereferences
            .insert(expr, LabelDereference { label, field });
    }

    pub fn label_dereference(&self, expr: ExprId) -> Option<&LabelDereference> {
        self.label_dereferences.get(&expr)
    }

    pub fn add_subquery(&mut self, expr: ExprId) {
        self.subqueries.insert(expr);
    }

    pub fn add_exists_subquery(&mut self, expr: ExprId) {
        self.exists_subqueries.insert(expr);
    }

    pub fn add_in_subquery(&mut self, expr: ExprId) {
        self.in_subqueries.insert(expr);
    }

    pub fn subqueries(&self) -> &IndexSet<ExprId> {
        &self.subqueries
    }

    pub fn exists_subqueries(&self) -> &IndexSet<ExprId> {
        &self.exists_subqueries
    }

    pub fn in_subqueries(&self) -> &IndexSet<ExprId> {
        &self.in_subqueries
    }

    pub fn set_window(&mut self, expr: ExprId, window: ResolvedWindow) {
        self.windows.insert(expr, window);
    }

    pub fn window(&self, expr: ExprId) -> Option<&ResolvedWindow> {
        self.windows.get(&expr)
    }

    pub fn add_window_function(&mut self, expr: ExprId) {
        self.window_functions.insert(expr);
    }

    pub fn window_functions(&self) -> &IndexSet<ExprId> {
        &self.window_functions
    }

    pub fn add_window_measure(&mut self, expr: ExprId) {
        self.window_measures.insert(expr);
    }

    pub fn window_measures(&self) -> &IndexSet<ExprId> {
        &self.window_measures
    }

    pub fn add_aggregate(&mut self, expr: ExprId) {
        self.aggregates.insert(expr);
    }

    pub fn aggregates(&self) -> &IndexSet<ExprId> {
        &self.aggregates
    }

    pub fn add_pattern_recognition_function(&mut self, expr: ExprId) {
        self.pattern_recognition_functions.insert(expr);
    }

    pub fn is_pattern_recognition_function(&self, expr: ExprId) -> bool {
        self.pattern_recognition_functions.contains(&expr)
    }

    pub fn add_table_column_reference(&mut self, table: QualifiedObjectName, column: &str) {
        self.table_column_references
            .entry(table)
            .or_default()
            .insert(column.to_string());
    }

    pub fn table_column_references(&self) -> &IndexMap<QualifiedObjectName, IndexSet<String>> {
        &self.table_column_references
    }

    /// Base columns that flowed into `expr`, as collected by the expression
    /// analyzer for a top-level expression.
    pub fn add_expression_sources(
        &mut self,
        expr: ExprId,
        sources: impl IntoIterator<Item = SourceColumn>,
    ) {
        self.expression_sources
            .entry(expr)
            .or_default()
            .extend(sources);
    }

    pub fn expression_sources(&self, expr: ExprId) -> Option<&IndexSet<SourceColumn>> {
        self.expression_sources.get(&expr)
    }

    pub fn set_scope(&mut self, query: QueryId, scope: Arc<Scope>) {
        self.scopes.insert(query, scope);
    }

    pub fn scope(&self, query: QueryId) -> Option<&Arc<Scope>> {
        self.scopes.get(&query)
    }

    pub fn set_target(&mut self, target: QualifiedObjectName) {
        self.target = Some(target);
    }

    pub fn target(&self) -> Option<&QualifiedObjectName> {
        self.target.as_ref()
    }

    pub fn add_output_column(&mut self, column: OutputColumnSpec) {
        self.output_columns.push(column);
    }

    pub fn output_columns(&self) -> &[OutputColumnSpec] {
        &self.output_columns
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::field::{Field, RelationId, RelationType};
    use crate::ast::{Ast, QualifiedName};

    fn scope_with(columns: &[&str]) -> Arc<Scope> {
        let fields = columns
            .iter()
            .map(|c| Field::new_unqualified(Some(c.to_string()), Type::Unknown))
            .collect();
        Scope::builder()
            .with_relation_type(RelationId::anonymous(), RelationType::new(fields))
            .build()
    }

    #[test]
    fn depth_limit_is_enforced() {
        let mut analysis = Analysis::new(2);
        analysis.enter(None).unwrap();
        analysis.enter(None).unwrap();
        let err = analysis.enter(None).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InputTooLarge(2));
        analysis.leave();
        assert!(analysis.enter(None).is_ok());
    }

    #[test]
    fn rerecording_same_column_reference_is_allowed() {
        let mut ast = Ast::new();
        let expr = ast.identifier("a");
        let scope = scope_with(&["a"]);
        let field = scope.resolve_field(&QualifiedName::parse("a")).unwrap();
        let mut analysis = Analysis::new(10);
        analysis.add_column_reference(expr, field.clone());
        analysis.add_column_reference(expr, field);
        assert_eq!(analysis.column_references().len(), 1);
    }

    #[test]
    #[should_panic(expected = "already resolved to a different field")]
    fn conflicting_column_reference_panics() {
        let mut ast = Ast::new();
        let expr = ast.identifier("a");
        let scope = scope_with(&["a", "b"]);
        let mut analysis = Analysis::new(10);
        analysis.add_column_reference(
            expr,
            scope.resolve_field(&QualifiedName::parse("a")).unwrap(),
        );
        analysis.add_column_reference(
            expr,
            scope.resolve_field(&QualifiedName::parse("b")).unwrap(),
        );
    }
}
