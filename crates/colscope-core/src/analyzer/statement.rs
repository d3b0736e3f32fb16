//! Statement driver: FROM, SELECT, set operations, CTEs and views.
//!
//! Builds the scope chain for each query, hands every expression to an
//! [`ExpressionAnalyzer`] and turns the fields each projected expression read
//! into output columns.

use super::analysis::{Analysis, OutputColumnSpec, ResolvedWindow};
use super::context::Context;
use super::data_type::Type;
use super::expression::{ExpressionAnalyzer, QueryAnalyzer};
use super::field::{Field, FieldId, RelationId, RelationType};
use super::pattern::analyze_pattern;
use super::scope::{NamedQuery, Scope};
use crate::ast::{
    Ast, Expr, ExprId, Literal, MatchRecognize, QualifiedName, Query, QueryBody, QueryId,
    Relation, RelationRef, RowsPerMatch, Select, SelectItem, SortItem, Statement, TableAlias,
    WindowRef, WindowSpecification, WithQuery,
};
use crate::error::{ErrorKind, Result};
use crate::metadata::{MetadataService, ViewDefinition};
use crate::types::{QualifiedObjectName, SourceColumn};
use indexmap::{IndexMap, IndexSet};
use std::sync::Arc;
#[cfg(feature = "tracing")]
use tracing::debug;

/// A `WINDOW` clause entry with the fields its definition read.
struct NamedWindow {
    window: ResolvedWindow,
    fields: Vec<Field>,
}

type NamedWindows = IndexMap<String, NamedWindow>;

pub struct StatementAnalyzer<'a> {
    ast: &'a Ast,
    metadata: &'a dyn MetadataService,
    /// Views currently being expanded, outermost first.
    view_path: Vec<QualifiedObjectName>,
}

impl QueryAnalyzer for StatementAnalyzer<'_> {
    fn analyze_subquery(
        &self,
        query: QueryId,
        scope: &Arc<Scope>,
        analysis: &mut Analysis,
    ) -> Result<Arc<Scope>> {
        self.analyze_query(query, Some(scope), analysis)
    }
}

impl<'a> StatementAnalyzer<'a> {
    pub fn new(ast: &'a Ast, metadata: &'a dyn MetadataService) -> Self {
        Self {
            ast,
            metadata,
            view_path: Vec::new(),
        }
    }

    /// Analyzes `statement` and records its output columns in `analysis`.
    pub fn analyze(&self, statement: &Statement, analysis: &mut Analysis) -> Result<Arc<Scope>> {
        let scope = self.analyze_query(statement.query(), None, analysis)?;
        let fields: Vec<(usize, &Field)> = scope.relation_type().visible_fields().collect();

        let names = match statement {
            Statement::Query(_) => output_names(&fields),
            Statement::Insert {
                target, columns, ..
            } => {
                let target = self.metadata.resolve_object_name(target);
                let names = if !columns.is_empty() {
                    columns.iter().map(|c| c.value.clone()).collect()
                } else if let Some(table) = self.metadata.table_schema(&target) {
                    table
                        .columns
                        .iter()
                        .filter(|c| !c.hidden)
                        .map(|c| c.name.clone())
                        .collect()
                } else {
                    output_names(&fields)
                };
                analysis.set_target(target);
                names
            }
            Statement::CreateView { name, columns, .. }
            | Statement::CreateTableAsSelect { name, columns, .. } => {
                analysis.set_target(self.metadata.resolve_object_name(name));
                if columns.is_empty() {
                    output_names(&fields)
                } else {
                    columns.iter().map(|c| c.value.clone()).collect()
                }
            }
        };

        if names.len() != fields.len() {
            return Err(ErrorKind::ColumnCountMismatch {
                expected: names.len(),
                actual: fields.len(),
            }
            .into());
        }
        for ((index, field), name) in fields.into_iter().zip(names) {
            analysis.add_output_column(OutputColumnSpec {
                id: FieldId::new(scope.relation_id(), index),
                name,
                sources: field.sources().iter().cloned().collect(),
            });
        }
        Ok(scope)
    }

    fn expression_analyzer<'s>(&'s self, analysis: &'s mut Analysis) -> ExpressionAnalyzer<'s> {
        ExpressionAnalyzer::new(self.ast, analysis, self.metadata, self)
    }

    /// Analyzes one top-level expression, returning its type and the base
    /// columns it reads.
    fn analyze_expression(
        &self,
        expr: ExprId,
        scope: &Arc<Scope>,
        analysis: &mut Analysis,
    ) -> Result<(Type, IndexSet<SourceColumn>)> {
        let mut analyzer = self.expression_analyzer(analysis);
        let ty = analyzer.analyze(expr, scope)?;
        let sources = analyzer.source_columns();
        analysis.add_expression_sources(expr, sources.iter().cloned());
        Ok((ty, sources))
    }

    fn analyze_query(
        &self,
        id: QueryId,
        outer: Option<&Arc<Scope>>,
        analysis: &mut Analysis,
    ) -> Result<Arc<Scope>> {
        let location = self.ast.query_location(id);
        analysis.enter(location)?;
        let result = self
            .analyze_query_body(id, outer, analysis)
            .map_err(|e| e.at(location));
        analysis.leave();
        let scope = result?;
        analysis.set_scope(id, Arc::clone(&scope));
        Ok(scope)
    }

    fn analyze_query_body(
        &self,
        id: QueryId,
        outer: Option<&Arc<Scope>>,
        analysis: &mut Analysis,
    ) -> Result<Arc<Scope>> {
        let query: &Query = self.ast.query(id);
        let with_scope = self.analyze_with(&query.with, outer, analysis)?;

        let output = match &query.body {
            QueryBody::Select(select) => {
                self.analyze_select(select, &query.order_by, &with_scope, analysis)?
            }
            body => {
                let output = self.analyze_body(body, &with_scope, analysis)?;
                self.analyze_order_by(
                    &query.order_by,
                    &output,
                    &with_scope,
                    &NamedWindows::new(),
                    analysis,
                )?;
                output
            }
        };

        Ok(Scope::builder()
            .with_parent(with_scope)
            .with_relation_type(RelationId::of_query(id), output)
            .build())
    }

    fn analyze_with(
        &self,
        with: &[WithQuery],
        outer: Option<&Arc<Scope>>,
        analysis: &mut Analysis,
    ) -> Result<Arc<Scope>> {
        let mut builder = Scope::builder();
        if let Some(outer) = outer {
            builder = builder.with_outer_query_parent(Arc::clone(outer));
        }
        let mut current = builder.build();

        for cte in with {
            let cte_scope = self.analyze_query(cte.query, Some(&current), analysis)?;
            let mut relation_type = cte_scope.relation_type().with_only_visible_fields();
            if !cte.column_names.is_empty() {
                if cte.column_names.len() != relation_type.len() {
                    return Err(ErrorKind::ColumnCountMismatch {
                        expected: cte.column_names.len(),
                        actual: relation_type.len(),
                    }
                    .into());
                }
                relation_type = relation_type.with_alias(&cte.name, &cte.column_names);
            }
            #[cfg(feature = "tracing")]
            debug!(cte = %cte.name, columns = relation_type.len(), "registered CTE");
            current = Scope::builder()
                .with_parent(current)
                .with_named_query(NamedQuery {
                    name: cte.name.clone(),
                    query: cte.query,
                    relation_type,
                })
                .build();
        }
        Ok(current)
    }

    /// Set operations, VALUES and parenthesized queries.
    fn analyze_body(
        &self,
        body: &QueryBody,
        scope: &Arc<Scope>,
        analysis: &mut Analysis,
    ) -> Result<RelationType> {
        match body {
            QueryBody::Select(select) => self.analyze_select(select, &[], scope, analysis),
            QueryBody::Query(query) => {
                let nested = self.analyze_query(*query, Some(scope), analysis)?;
                Ok(nested.relation_type().with_only_visible_fields())
            }
            QueryBody::SetOperation { left, right, .. } => {
                let left = self.analyze_body(left, scope, analysis)?;
                let right = self.analyze_body(right, scope, analysis)?;
                let left_fields: Vec<&Field> = left.visible_fields().map(|(_, f)| f).collect();
                let right_fields: Vec<&Field> = right.visible_fields().map(|(_, f)| f).collect();
                if left_fields.len() != right_fields.len() {
                    return Err(ErrorKind::ColumnCountMismatch {
                        expected: left_fields.len(),
                        actual: right_fields.len(),
                    }
                    .into());
                }
                let fields = left_fields
                    .into_iter()
                    .zip(right_fields)
                    .map(|(l, r)| {
                        let ty = if l.ty().is_unknown() { r.ty() } else { l.ty() };
                        Field::new_unqualified(l.name().map(str::to_string), ty.clone())
                            .with_sources(l.sources().iter().cloned())
                            .with_sources(r.sources().iter().cloned())
                    })
                    .collect();
                Ok(RelationType::new(fields))
            }
            QueryBody::Values(rows) => self.analyze_values(rows, scope, analysis),
        }
    }

    fn analyze_values(
        &self,
        rows: &[ExprId],
        scope: &Arc<Scope>,
        analysis: &mut Analysis,
    ) -> Result<RelationType> {
        let mut columns: Vec<(Type, IndexSet<SourceColumn>)> = Vec::new();
        for (row_index, &row) in rows.iter().enumerate() {
            let items = match self.ast.expr(row) {
                Expr::Row(items) => items.clone(),
                _ => vec![row],
            };
            if row_index == 0 {
                columns = vec![(Type::Unknown, IndexSet::new()); items.len()];
            } else if items.len() != columns.len() {
                return Err(ErrorKind::ColumnCountMismatch {
                    expected: columns.len(),
                    actual: items.len(),
                }
                .at(self.ast.location(row)));
            }
            for (column, item) in columns.iter_mut().zip(items) {
                let (ty, sources) = self.analyze_expression(item, scope, analysis)?;
                if column.0.is_unknown() {
                    column.0 = ty;
                }
                column.1.extend(sources);
            }
        }
        Ok(RelationType::new(
            columns
                .into_iter()
                .map(|(ty, sources)| Field::new_unqualified(None, ty).with_sources(sources))
                .collect(),
        ))
    }

    fn analyze_select(
        &self,
        select: &Select,
        order_by: &[SortItem],
        scope: &Arc<Scope>,
        analysis: &mut Analysis,
    ) -> Result<RelationType> {
        let source = self.analyze_from(&select.from, scope, analysis)?;
        let windows = self.analyze_window_definitions(select, &source, analysis)?;

        if let Some(selection) = select.selection {
            self.reject_aggregates(selection, "WHERE")?;
            self.analyze_expression(selection, &source, analysis)?;
        }

        let mut output = Vec::with_capacity(select.items.len());
        for item in &select.items {
            match item {
                SelectItem::AllColumns => {
                    for (_, field) in source.relation_type().visible_fields() {
                        self.record_expansion(field, analysis);
                        output.push(field.realias(None, None));
                    }
                }
                SelectItem::QualifiedAllColumns(prefix) => {
                    let relation = source.relation_type();
                    if !relation.has_relation(prefix) {
                        return Err(ErrorKind::RelationNotFound(prefix.to_string()).into());
                    }
                    for (_, field) in relation.visible_fields() {
                        if field.matches_prefix(prefix) {
                            self.record_expansion(field, analysis);
                            output.push(field.realias(None, None));
                        }
                    }
                }
                SelectItem::Expression { expr, alias } => {
                    self.register_windows(*expr, &windows, analysis)?;
                    let (ty, sources) = self.analyze_expression(*expr, &source, analysis)?;
                    let name = alias
                        .as_ref()
                        .map(|alias| alias.value.clone())
                        .or_else(|| self.derived_name(*expr));
                    let mut field = Field::new_unqualified(name, ty)
                        .with_sources(sources)
                        .with_aliased(alias.is_some());
                    if let Some(resolved) = analysis.column_reference(*expr) {
                        let origin = resolved.field();
                        if let (Some(table), Some(column)) =
                            (origin.origin_table(), origin.origin_column())
                        {
                            field = field.with_origin(table.clone(), column);
                        }
                    }
                    output.push(field);
                }
            }
        }

        for &expr in &select.group_by {
            if let Expr::Literal(Literal::Long(position)) = self.ast.expr(expr) {
                check_ordinal("GROUP BY", *position, output.len())
                    .map_err(|e| e.at(self.ast.location(expr)))?;
                continue;
            }
            self.reject_aggregates(expr, "GROUP BY")?;
            self.analyze_expression(expr, &source, analysis)?;
        }

        if let Some(having) = select.having {
            self.register_windows(having, &windows, analysis)?;
            self.analyze_expression(having, &source, analysis)?;
        }

        let output = RelationType::new(output);
        self.analyze_order_by(order_by, &output, &source, &windows, analysis)?;
        Ok(output)
    }

    fn record_expansion(&self, field: &Field, analysis: &mut Analysis) {
        if let (Some(table), Some(column)) = (field.origin_table(), field.origin_column()) {
            analysis.add_table_column_reference(table.clone(), column);
        }
    }

    /// Output names resolve first, then the columns of the source relation.
    fn analyze_order_by(
        &self,
        order_by: &[SortItem],
        output: &RelationType,
        source: &Arc<Scope>,
        windows: &NamedWindows,
        analysis: &mut Analysis,
    ) -> Result<()> {
        if order_by.is_empty() {
            return Ok(());
        }
        let scope = Scope::builder()
            .with_parent(Arc::clone(source))
            .with_relation_type(RelationId::anonymous(), output.clone())
            .build();
        for item in order_by {
            let location = self.ast.location(item.key);
            if let Expr::Literal(Literal::Long(position)) = self.ast.expr(item.key) {
                check_ordinal("ORDER BY", *position, output.visible_count())
                    .map_err(|e| e.at(location))?;
                continue;
            }
            self.register_windows(item.key, windows, analysis)?;
            // Window functions are evaluated over the source rows.
            let key_scope = if self.contains_window(item.key) {
                source
            } else {
                &scope
            };
            let (ty, _) = self.analyze_expression(item.key, key_scope, analysis)?;
            if !ty.is_orderable() {
                return Err(ErrorKind::NotOrderable {
                    ty: ty.to_string(),
                    clause: "ORDER BY",
                }
                .at(location));
            }
        }
        Ok(())
    }

    fn derived_name(&self, expr: ExprId) -> Option<String> {
        match self.ast.expr(expr) {
            Expr::Identifier(ident) => Some(ident.value.clone()),
            Expr::Dereference { field, .. } => Some(field.value.clone()),
            _ => None,
        }
    }

    fn contains_window(&self, expr: ExprId) -> bool {
        self.ast
            .find(expr, |node| match node {
                Expr::FunctionCall(call) => call.window.is_some(),
                Expr::WindowOperation { .. } => true,
                _ => false,
            })
            .is_some()
    }

    fn reject_aggregates(&self, expr: ExprId, clause: &'static str) -> Result<()> {
        let found = self.ast.find(expr, |node| match node {
            Expr::FunctionCall(call) => {
                call.window.is_some() || self.metadata.is_aggregation_function(&call.name)
            }
            Expr::WindowOperation { .. } => true,
            _ => false,
        });
        match found {
            Some(node) => Err(ErrorKind::AggregateNotAllowed { clause }.at(self.ast.location(node))),
            None => Ok(()),
        }
    }

    // Windows

    fn analyze_window_definitions(
        &self,
        select: &Select,
        source: &Arc<Scope>,
        analysis: &mut Analysis,
    ) -> Result<NamedWindows> {
        let mut named = NamedWindows::new();
        for definition in &select.windows {
            let key = definition.name.canonical();
            if named.contains_key(&key) {
                return Err(ErrorKind::InvalidWindowReference(format!(
                    "{} is already defined",
                    definition.name
                ))
                .into());
            }
            let window = resolve_specification(&definition.specification, &named)?;
            let context = Context::new(Arc::clone(source));
            let mut analyzer = self.expression_analyzer(analysis);
            analyzer.analyze_window(&window, &context)?;
            let fields = analyzer.into_source_fields();
            named.insert(key, NamedWindow { window, fields });
        }
        Ok(named)
    }

    /// Resolves the window of every window function and measure under
    /// `root` and records it for the expression analyzer.
    fn register_windows(
        &self,
        root: ExprId,
        named: &NamedWindows,
        analysis: &mut Analysis,
    ) -> Result<()> {
        let mut found: Vec<(ExprId, WindowRef)> = Vec::new();
        self.ast.walk(root, &mut |id, expr| match expr {
            Expr::FunctionCall(call) => {
                if let Some(window) = &call.window {
                    found.push((id, window.clone()));
                }
            }
            Expr::WindowOperation { window, .. } => found.push((id, window.clone())),
            _ => {}
        });
        for (id, window) in found {
            let resolved = match &window {
                WindowRef::Named(name) => {
                    let NamedWindow { window: base, fields } = named
                        .get(&name.canonical())
                        .ok_or_else(|| ErrorKind::WindowNotFound(name.value.clone()))?;
                    ResolvedWindow {
                        partition_by: base.partition_by.clone(),
                        order_by: base.order_by.clone(),
                        frame: base.frame.clone(),
                        partition_by_inherited: !base.partition_by.is_empty(),
                        order_by_inherited: !base.order_by.is_empty(),
                        frame_inherited: base.frame.is_some(),
                        inherited_fields: fields.clone(),
                    }
                }
                WindowRef::Inline(spec) => resolve_specification(spec, named)?,
            };
            analysis.set_window(id, resolved);
        }
        Ok(())
    }

    // FROM

    fn analyze_from(
        &self,
        from: &[RelationRef],
        scope: &Arc<Scope>,
        analysis: &mut Analysis,
    ) -> Result<Arc<Scope>> {
        match from {
            [] => Ok(Scope::builder().with_parent(Arc::clone(scope)).build()),
            [single] => self.analyze_relation(*single, scope, analysis),
            many => {
                let mut relation_type = RelationType::empty();
                for &relation in many {
                    let analyzed = self.analyze_relation(relation, scope, analysis)?;
                    relation_type = relation_type.join(analyzed.relation_type());
                }
                Ok(Scope::builder()
                    .with_parent(Arc::clone(scope))
                    .with_relation_type(RelationId::anonymous(), relation_type)
                    .build())
            }
        }
    }

    fn analyze_relation(
        &self,
        relation: RelationRef,
        scope: &Arc<Scope>,
        analysis: &mut Analysis,
    ) -> Result<Arc<Scope>> {
        let location = self.ast.relation_location(relation);
        let relation_type = self
            .relation_type(relation, scope, analysis)
            .map_err(|e| e.at(location))?;
        Ok(Scope::builder()
            .with_parent(Arc::clone(scope))
            .with_relation_type(RelationId::of_relation(relation), relation_type)
            .build())
    }

    fn relation_type(
        &self,
        relation: RelationRef,
        scope: &Arc<Scope>,
        analysis: &mut Analysis,
    ) -> Result<RelationType> {
        match self.ast.relation(relation) {
            Relation::Table { name, alias } => {
                self.table_relation(name, alias.as_ref(), scope, analysis)
            }
            Relation::Derived { query, alias } => {
                let nested = self.analyze_query(*query, Some(scope), analysis)?;
                let relation_type = nested.relation_type().with_only_visible_fields();
                match alias {
                    Some(alias) => apply_alias(relation_type, alias),
                    None => Ok(relation_type),
                }
            }
            Relation::Join {
                left,
                right,
                criteria,
                ..
            } => {
                let left = self.analyze_relation(*left, scope, analysis)?;
                let right = self.analyze_relation(*right, scope, analysis)?;
                let joined = left.relation_type().join(right.relation_type());
                if let Some(criteria) = criteria {
                    let join_scope = Scope::builder()
                        .with_parent(Arc::clone(scope))
                        .with_relation_type(RelationId::of_relation(relation), joined.clone())
                        .build();
                    self.reject_aggregates(*criteria, "JOIN")?;
                    self.analyze_expression(*criteria, &join_scope, analysis)?;
                }
                Ok(joined)
            }
            Relation::MatchRecognize(match_recognize) => {
                self.analyze_match_recognize(match_recognize, scope, analysis)
            }
        }
    }

    /// CTE, then view, then base table.
    fn table_relation(
        &self,
        name: &QualifiedName,
        alias: Option<&TableAlias>,
        scope: &Arc<Scope>,
        analysis: &mut Analysis,
    ) -> Result<RelationType> {
        if name.len() == 1 {
            if let Some(named) = scope.named_query(name.first()) {
                let relation_type = named
                    .relation_type
                    .with_relation_alias(QualifiedName::single(named.name.clone()));
                return match alias {
                    Some(alias) => apply_alias(relation_type, alias),
                    None => Ok(relation_type),
                };
            }
        }

        let object = self.metadata.resolve_object_name(name);
        if let Some(view) = self.metadata.view_definition(&object) {
            let relation_type = self
                .analyze_view(&view, analysis)?
                .with_relation_alias(name.clone());
            return match alias {
                Some(alias) => apply_alias(relation_type, alias),
                None => Ok(relation_type),
            };
        }

        let Some(table) = self.metadata.table_schema(&object) else {
            return Err(ErrorKind::TableNotFound(name.to_string()).into());
        };
        let relation_alias = match alias {
            Some(alias) => QualifiedName::single(alias.name.clone()),
            None => name.clone(),
        };
        let fields = table
            .columns
            .iter()
            .map(|column| {
                let ty = column
                    .data_type
                    .as_deref()
                    .map_or(Type::Unknown, Type::parse);
                Field::base_column(
                    relation_alias.clone(),
                    table.name.clone(),
                    &column.name,
                    ty,
                    column.hidden,
                )
            })
            .collect();
        let relation_type = RelationType::new(fields);
        match alias {
            Some(alias) if !alias.columns.is_empty() => apply_alias(relation_type, alias),
            _ => Ok(relation_type),
        }
    }

    /// Expands a view from its stored SQL. The view body is analyzed in its
    /// own [`Analysis`]; only its output fields and the base columns it
    /// reads are carried back. View columns have no origin of their own, so
    /// table column references only ever name base tables.
    fn analyze_view(&self, view: &ViewDefinition, analysis: &mut Analysis) -> Result<RelationType> {
        if self.view_path.contains(&view.name) {
            return Err(ErrorKind::RecursiveView(view.name.to_string()).into());
        }
        let invalid = |message: String| ErrorKind::InvalidView {
            name: view.name.to_string(),
            message,
        };

        let statements = crate::parser::parse_cached(&view.sql, view.dialect)
            .map_err(|e| invalid(e.to_string()))?;
        let [statement] = statements.as_slice() else {
            return Err(invalid("expected exactly one statement".into()).into());
        };
        let lowered = crate::parser::lower_statement(statement, analysis.max_depth())
            .map_err(|e| invalid(e.to_string()))?;
        let Statement::Query(query) = &lowered.statement else {
            return Err(invalid("view body is not a query".into()).into());
        };

        #[cfg(feature = "tracing")]
        debug!(view = %view.name, depth = self.view_path.len(), "expanding view");

        let mut view_path = self.view_path.clone();
        view_path.push(view.name.clone());
        let nested = StatementAnalyzer {
            ast: &lowered.ast,
            metadata: self.metadata,
            view_path,
        };
        let mut view_analysis = Analysis::new(analysis.max_depth());
        let output = nested.analyze_query(*query, None, &mut view_analysis)?;

        for (table, columns) in view_analysis.table_column_references() {
            for column in columns {
                analysis.add_table_column_reference(table.clone(), column);
            }
        }

        let fields = output
            .relation_type()
            .visible_fields()
            .map(|(_, field)| {
                Field::new_unqualified(field.name().map(str::to_string), field.ty().clone())
                    .with_sources(field.sources().iter().cloned())
            })
            .collect();
        Ok(RelationType::new(fields))
    }

    fn analyze_match_recognize(
        &self,
        match_recognize: &MatchRecognize,
        scope: &Arc<Scope>,
        analysis: &mut Analysis,
    ) -> Result<RelationType> {
        let input = self.analyze_relation(match_recognize.input, scope, analysis)?;

        let mut partition_fields = Vec::with_capacity(match_recognize.partition_by.len());
        for &expr in &match_recognize.partition_by {
            let (ty, sources) = self.analyze_expression(expr, &input, analysis)?;
            if !ty.is_comparable() {
                return Err(ErrorKind::NotComparable {
                    ty: ty.to_string(),
                    clause: "MATCH_RECOGNIZE PARTITION BY",
                }
                .at(self.ast.location(expr)));
            }
            let field = match analysis.column_reference(expr) {
                Some(resolved) => resolved.field().realias(None, None),
                None => Field::new_unqualified(None, ty).with_sources(sources),
            };
            partition_fields.push(field);
        }
        for item in &match_recognize.order_by {
            let (ty, _) = self.analyze_expression(item.key, &input, analysis)?;
            if !ty.is_orderable() {
                return Err(ErrorKind::NotOrderable {
                    ty: ty.to_string(),
                    clause: "MATCH_RECOGNIZE ORDER BY",
                }
                .at(self.ast.location(item.key)));
            }
        }

        let labels = analyze_pattern(
            &match_recognize.subsets,
            &match_recognize.variable_definitions,
            &match_recognize.measures,
            &match_recognize.pattern,
            match_recognize.after_match_skip.as_ref(),
        )?
        .all_labels;

        for definition in &match_recognize.variable_definitions {
            self.expression_analyzer(analysis).analyze_pattern_recognition(
                definition.expression,
                &input,
                &labels,
            )?;
        }

        let mut measure_fields = Vec::with_capacity(match_recognize.measures.len());
        for measure in &match_recognize.measures {
            let mut analyzer = self.expression_analyzer(analysis);
            let ty =
                analyzer.analyze_pattern_recognition(measure.expression, &input, &labels)?;
            let sources = analyzer.source_columns();
            measure_fields.push(
                Field::new_unqualified(Some(measure.name.value.clone()), ty).with_sources(sources),
            );
        }

        let mut fields = match match_recognize.rows_per_match {
            RowsPerMatch::One => partition_fields,
            RowsPerMatch::All => input
                .relation_type()
                .visible_fields()
                .map(|(_, field)| field.realias(None, None))
                .collect(),
        };
        fields.extend(measure_fields);
        let relation_type = RelationType::new(fields);
        match &match_recognize.alias {
            Some(alias) => apply_alias(relation_type, alias),
            None => Ok(relation_type),
        }
    }
}

fn output_names(fields: &[(usize, &Field)]) -> Vec<String> {
    fields
        .iter()
        .enumerate()
        .map(|(position, (_, field))| {
            field
                .name()
                .map_or_else(|| format!("_col{position}"), str::to_string)
        })
        .collect()
}

fn check_ordinal(clause: &'static str, position: i64, width: usize) -> Result<()> {
    let in_range = usize::try_from(position).is_ok_and(|p| (1..=width).contains(&p));
    if in_range {
        Ok(())
    } else {
        Err(ErrorKind::InvalidOrdinal { clause, position }.into())
    }
}

fn apply_alias(relation_type: RelationType, alias: &TableAlias) -> Result<RelationType> {
    let visible = relation_type.visible_count();
    if !alias.columns.is_empty() && alias.columns.len() != visible {
        return Err(ErrorKind::ColumnCountMismatch {
            expected: visible,
            actual: alias.columns.len(),
        }
        .into());
    }
    Ok(relation_type.with_alias(&alias.name, &alias.columns))
}

/// Merges an inline specification with the named window it references.
fn resolve_specification(
    spec: &WindowSpecification,
    named: &NamedWindows,
) -> Result<ResolvedWindow> {
    let Some(base_name) = &spec.existing_window_name else {
        return Ok(ResolvedWindow::new(
            spec.partition_by.clone(),
            spec.order_by.clone(),
            spec.frame.clone(),
        ));
    };
    let NamedWindow { window: base, fields } = named
        .get(&base_name.canonical())
        .ok_or_else(|| ErrorKind::WindowNotFound(base_name.value.clone()))?;
    if !spec.partition_by.is_empty() {
        return Err(ErrorKind::InvalidWindowReference(format!(
            "{base_name} cannot be combined with PARTITION BY"
        ))
        .into());
    }
    if !spec.order_by.is_empty() && !base.order_by.is_empty() {
        return Err(ErrorKind::InvalidWindowReference(format!(
            "{base_name} already specifies ORDER BY"
        ))
        .into());
    }
    if base.frame.is_some() {
        return Err(ErrorKind::InvalidWindowReference(format!(
            "{base_name} contains a frame specification"
        ))
        .into());
    }
    let (order_by, order_by_inherited) = if spec.order_by.is_empty() {
        (base.order_by.clone(), !base.order_by.is_empty())
    } else {
        (spec.order_by.clone(), false)
    };
    Ok(ResolvedWindow {
        partition_by: base.partition_by.clone(),
        partition_by_inherited: !base.partition_by.is_empty(),
        order_by,
        order_by_inherited,
        frame: spec.frame.clone(),
        frame_inherited: false,
        // A base window never has a frame, so everything it read is inherited.
        inherited_fields: fields.clone(),
    })
}
