//! Recursive expression analysis.
//!
//! [`ExpressionAnalyzer`] visits one expression tree, resolves every column
//! reference against a [`Scope`], computes a type for each node and records
//! what it finds in the shared [`Analysis`]. It also accumulates the fields
//! the expression read, which the statement driver turns into lineage.

use super::analysis::Analysis;
use super::context::{Context, CorrelationSupport};
use super::data_type::{RowField, Type};
use super::field::{Field, FieldId, RelationId, RelationType};
use super::pattern::is_pattern_recognition_function;
use super::scope::{ResolvedField, Scope};
use crate::ast::{Ast, Expr, ExprId, FunctionCall, Identifier, Literal, QualifiedName, QueryId};
use crate::error::{ErrorKind, Result};
use crate::metadata::MetadataService;
use crate::types::SourceColumn;
use indexmap::IndexSet;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
#[cfg(feature = "tracing")]
use tracing::trace;

/// Analyzes nested queries on behalf of the expression analyzer.
pub trait QueryAnalyzer {
    /// Analyzes `query` as a subquery of an expression evaluated in `scope`
    /// and returns the scope describing its output.
    fn analyze_subquery(
        &self,
        query: QueryId,
        scope: &Arc<Scope>,
        analysis: &mut Analysis,
    ) -> Result<Arc<Scope>>;
}

/// Rejects every subquery. For analyzing standalone expressions.
pub struct NoSubqueries;

impl QueryAnalyzer for NoSubqueries {
    fn analyze_subquery(&self, _: QueryId, _: &Arc<Scope>, _: &mut Analysis) -> Result<Arc<Scope>> {
        Err(ErrorKind::UnsupportedConstruct("subquery in standalone expression".into()).into())
    }
}

pub struct ExpressionAnalyzer<'a> {
    pub(super) ast: &'a Ast,
    pub(super) analysis: &'a mut Analysis,
    pub(super) metadata: &'a dyn MetadataService,
    queries: &'a dyn QueryAnalyzer,
    pub(super) expression_types: HashMap<ExprId, Type>,
    pub(super) source_fields: Vec<Field>,
}

impl<'a> ExpressionAnalyzer<'a> {
    pub fn new(
        ast: &'a Ast,
        analysis: &'a mut Analysis,
        metadata: &'a dyn MetadataService,
        queries: &'a dyn QueryAnalyzer,
    ) -> Self {
        Self {
            ast,
            analysis,
            metadata,
            queries,
            expression_types: HashMap::new(),
            source_fields: Vec::new(),
        }
    }

    /// Analyzes `expr` in `scope` with outer references allowed.
    pub fn analyze(&mut self, expr: ExprId, scope: &Arc<Scope>) -> Result<Type> {
        self.process(expr, &Context::new(Arc::clone(scope)))
    }

    pub fn analyze_in_context(&mut self, expr: ExprId, context: &Context) -> Result<Type> {
        self.process(expr, context)
    }

    /// Analyzes a MEASURES or DEFINE expression. `labels` holds the canonical
    /// names of all pattern variables.
    pub fn analyze_pattern_recognition(
        &mut self,
        expr: ExprId,
        scope: &Arc<Scope>,
        labels: &BTreeSet<String>,
    ) -> Result<Type> {
        let context = Context::new(Arc::clone(scope)).with_labels(labels.clone());
        self.process(expr, &context)
    }

    pub fn expression_type(&self, expr: ExprId) -> Option<&Type> {
        self.expression_types.get(&expr)
    }

    pub fn set_expression_type(&mut self, expr: ExprId, ty: Type) -> Type {
        self.expression_types.insert(expr, ty.clone());
        self.analysis.set_type(expr, ty.clone());
        ty
    }

    /// Fields read so far, in encounter order. Repeats are kept.
    pub fn source_fields(&self) -> &[Field] {
        &self.source_fields
    }

    pub fn into_source_fields(self) -> Vec<Field> {
        self.source_fields
    }

    /// Deduplicated base columns behind [`Self::source_fields`].
    pub fn source_columns(&self) -> IndexSet<SourceColumn> {
        self.source_fields
            .iter()
            .flat_map(|field| field.sources().iter().cloned())
            .collect()
    }

    pub(super) fn process(&mut self, id: ExprId, context: &Context) -> Result<Type> {
        if let Some(ty) = self.expression_types.get(&id) {
            return Ok(ty.clone());
        }
        let location = self.ast.location(id);
        self.analysis.enter(location)?;
        let result = self.visit(id, context).map_err(|e| e.at(location));
        self.analysis.leave();
        let ty = result?;
        Ok(self.set_expression_type(id, ty))
    }

    fn visit(&mut self, id: ExprId, context: &Context) -> Result<Type> {
        let ast = self.ast;
        match ast.expr(id) {
            Expr::Identifier(ident) => {
                let name = QualifiedName::single(ident.clone());
                let resolved = context.scope().resolve_field(&name)?;
                self.handle_resolved_field(id, resolved, context)
            }
            Expr::Dereference { base, field } => self.visit_dereference(id, *base, field, context),
            Expr::FieldReference(index) => {
                let scope = context.scope();
                if *index >= scope.relation_type().len() {
                    return Err(ErrorKind::ColumnNotFound(format!("#{index}")).into());
                }
                let resolved = scope.resolve_field_by_index(*index);
                self.handle_resolved_field(id, resolved, context)
            }
            Expr::Literal(literal) => Ok(literal_type(literal)),
            Expr::Comparison { op, left, right } => {
                for operand in [*left, *right] {
                    let ty = self.process(operand, context)?;
                    if op.requires_order() && !ty.is_orderable() {
                        return Err(ErrorKind::NotOrderable {
                            ty: ty.to_string(),
                            clause: "comparison",
                        }
                        .into());
                    }
                    if !ty.is_comparable() {
                        return Err(ErrorKind::NotComparable {
                            ty: ty.to_string(),
                            clause: "comparison",
                        }
                        .into());
                    }
                }
                Ok(Type::Boolean)
            }
            Expr::Arithmetic { left, right, .. } => {
                let left = self.process(*left, context)?;
                let right = self.process(*right, context)?;
                Ok(Type::arithmetic_result(&left, &right))
            }
            Expr::ArithmeticUnary { value, .. } => self.process(*value, context),
            Expr::Logical { terms, .. } => {
                for term in terms {
                    self.process(*term, context)?;
                }
                Ok(Type::Boolean)
            }
            Expr::Not(value) | Expr::IsNull(value) | Expr::IsNotNull(value) => {
                self.process(*value, context)?;
                Ok(Type::Boolean)
            }
            Expr::Between { value, low, high } => {
                for operand in [*value, *low, *high] {
                    self.process(operand, context)?;
                }
                Ok(Type::Boolean)
            }
            Expr::Like {
                value,
                pattern,
                escape,
            } => {
                self.process(*value, context)?;
                self.process(*pattern, context)?;
                if let Some(escape) = escape {
                    self.process(*escape, context)?;
                }
                Ok(Type::Boolean)
            }
            Expr::InList { value, list } => {
                self.process(*value, context)?;
                for item in list {
                    self.process(*item, context)?;
                }
                Ok(Type::Boolean)
            }
            Expr::InSubquery { value, subquery } => {
                self.process(*value, context)?;
                self.analyze_subquery(*subquery, context)?;
                self.analysis.add_in_subquery(id);
                Ok(Type::Boolean)
            }
            Expr::Exists(subquery) => {
                self.analyze_subquery(*subquery, context)?;
                self.analysis.add_exists_subquery(id);
                Ok(Type::Boolean)
            }
            Expr::Subquery(subquery) => {
                let ty = self.analyze_subquery(*subquery, context)?;
                self.analysis.add_subquery(id);
                Ok(ty)
            }
            Expr::Cast { expr, type_name } => {
                self.process(*expr, context)?;
                Ok(Type::parse(type_name))
            }
            Expr::SearchedCase { whens, default } => {
                let mut results = Vec::with_capacity(whens.len() + 1);
                for when in whens {
                    self.process(when.operand, context)?;
                    results.push(self.process(when.result, context)?);
                }
                if let Some(default) = default {
                    results.push(self.process(*default, context)?);
                }
                Ok(first_known(results))
            }
            Expr::SimpleCase {
                operand,
                whens,
                default,
            } => {
                self.process(*operand, context)?;
                let mut results = Vec::with_capacity(whens.len() + 1);
                for when in whens {
                    self.process(when.operand, context)?;
                    results.push(self.process(when.result, context)?);
                }
                if let Some(default) = default {
                    results.push(self.process(*default, context)?);
                }
                Ok(first_known(results))
            }
            Expr::If {
                condition,
                then,
                otherwise,
            } => {
                self.process(*condition, context)?;
                let mut results = vec![self.process(*then, context)?];
                if let Some(otherwise) = otherwise {
                    results.push(self.process(*otherwise, context)?);
                }
                Ok(first_known(results))
            }
            Expr::NullIf { first, second } => {
                let ty = self.process(*first, context)?;
                self.process(*second, context)?;
                Ok(ty)
            }
            Expr::Coalesce(items) => {
                let mut types = Vec::with_capacity(items.len());
                for item in items {
                    types.push(self.process(*item, context)?);
                }
                Ok(first_known(types))
            }
            Expr::Row(items) => {
                let mut fields = Vec::with_capacity(items.len());
                for item in items {
                    fields.push(RowField::new(None, self.process(*item, context)?));
                }
                Ok(Type::Row(fields))
            }
            Expr::Array(items) => {
                let mut types = Vec::with_capacity(items.len());
                for item in items {
                    types.push(self.process(*item, context)?);
                }
                Ok(Type::Array(Box::new(first_known(types))))
            }
            Expr::Subscript { base, index } => self.visit_subscript(*base, *index, context),
            Expr::FunctionCall(call) => self.visit_function_call(id, call, context),
            Expr::WindowOperation { name, .. } => self.visit_window_operation(id, name, context),
            Expr::Lambda { arguments, body } => self.visit_lambda(id, arguments, *body, context),
            Expr::LambdaArgument(_) => Ok(self
                .expression_types
                .get(&id)
                .cloned()
                .unwrap_or(Type::Unknown)),
            Expr::Bind { values, function } => {
                for value in values {
                    self.process(*value, context)?;
                }
                self.process(*function, context)?;
                Ok(Type::Unknown)
            }
            Expr::AllFields(prefix) => {
                Err(ErrorKind::QualifiedAllFieldsNotAllowed(prefix.to_string()).into())
            }
        }
    }

    fn handle_resolved_field(
        &mut self,
        id: ExprId,
        resolved: ResolvedField,
        context: &Context,
    ) -> Result<Type> {
        if !resolved.is_local() && context.correlation() == CorrelationSupport::Disallowed {
            let name = self
                .ast
                .qualified_name(id)
                .map(|name| name.to_string())
                .or_else(|| resolved.field().name().map(str::to_string))
                .unwrap_or_default();
            return Err(ErrorKind::CorrelationNotAllowed(name).into());
        }

        if let Some(arguments) = context.lambda_arguments() {
            if let Some(&declaration) = arguments.get(&resolved.field_id()) {
                let ty = self
                    .expression_types
                    .get(&declaration)
                    .cloned()
                    .unwrap_or(Type::Unknown);
                self.analysis.add_lambda_argument_reference(id, declaration);
                return Ok(ty);
            }
        }

        let field = resolved.field();
        if let (Some(table), Some(column)) = (field.origin_table(), field.origin_column()) {
            self.analysis
                .add_table_column_reference(table.clone(), column);
        }
        if !field.sources().is_empty() {
            self.source_fields.push(field.clone());
        }
        let ty = field.ty().clone();
        self.analysis.add_column_reference(id, resolved);
        Ok(ty)
    }

    fn visit_dereference(
        &mut self,
        id: ExprId,
        base: ExprId,
        field: &Identifier,
        context: &Context,
    ) -> Result<Type> {
        let name = self.ast.qualified_name(id);

        if let Some(name) = name.as_ref().filter(|_| context.is_pattern_recognition()) {
            let label = name.first().canonical();
            if context.is_label(&label) {
                if name.len() > 2 {
                    return Err(ErrorKind::InvalidLabelReference(name.to_string()).into());
                }
                let column = QualifiedName::single(field.clone());
                let resolved = context.scope().resolve_field(&column)?;
                let strict = context.with_correlation(CorrelationSupport::Disallowed);
                let ty = self.handle_resolved_field(id, resolved.clone(), &strict)?;
                self.analysis.add_label_dereference(id, label, resolved);
                return Ok(ty);
            }
        }

        if let Some(name) = name {
            let scope = context.scope();
            if let Some(resolved) = scope.try_resolve_field(&name)? {
                return self.handle_resolved_field(id, resolved, context);
            }
            if !scope.is_column_reference(&name) {
                #[cfg(feature = "tracing")]
                trace!(name = %name, "dereference does not name a column; leaving untyped");
                return Ok(Type::Unknown);
            }
            if !scope.has_field_prefix(&name) {
                return Err(ErrorKind::ColumnNotFound(name.to_string()).into());
            }
        }

        let base_type = self.process(base, context)?;
        row_field_type(&base_type, field)
    }

    fn visit_subscript(&mut self, base: ExprId, index: ExprId, context: &Context) -> Result<Type> {
        let base_type = self.process(base, context)?;
        if let Type::Row(fields) = &base_type {
            let Some(position) = self.ast.long_value(index) else {
                return Err(ErrorKind::RowSubscriptMustBeConstant.into());
            };
            self.process(index, context)?;
            if position <= 0 {
                return Err(ErrorKind::RowSubscriptMustBePositive(position).into());
            }
            return match usize::try_from(position)
                .ok()
                .and_then(|p| fields.get(p - 1))
            {
                Some(field) => Ok(field.ty.clone()),
                None => Err(ErrorKind::RowSubscriptOutOfBounds {
                    index: position,
                    size: fields.len(),
                }
                .into()),
            };
        }
        self.process(index, context)?;
        Ok(match base_type {
            Type::Array(element) => *element,
            Type::Map(_, value) => *value,
            _ => Type::Unknown,
        })
    }

    fn visit_function_call(
        &mut self,
        id: ExprId,
        call: &FunctionCall,
        context: &Context,
    ) -> Result<Type> {
        if context.is_pattern_recognition() && is_pattern_recognition_function(call) {
            return self.analyze_pattern_recognition_function(id, call, context);
        }
        if let Some(mode) = call.processing_mode {
            return Err(ErrorKind::ProcessingModeNotAllowed {
                mode: mode.keyword(),
                function: call.name.to_string(),
            }
            .into());
        }

        if call.window.is_some() {
            let window = self
                .analysis
                .window(id)
                .cloned()
                .ok_or(ErrorKind::UnresolvedWindow)?;
            self.analyze_window(&window, context)?;
            self.analysis.add_window_function(id);
        }

        if let Some(filter) = call.filter {
            self.process(filter, context)?;
        }
        let argument_types = self.analyze_call_arguments(&call.arguments, context)?;
        for item in &call.order_by {
            let ty = self.process(item.key, context)?;
            if !ty.is_orderable() {
                return Err(ErrorKind::NotOrderable {
                    ty: ty.to_string(),
                    clause: "aggregate ORDER BY",
                }
                .at(self.ast.location(item.key)));
            }
        }

        if call.window.is_none() && self.metadata.is_aggregation_function(&call.name) {
            self.analysis.add_aggregate(id);
        }
        Ok(function_return_type(call, &argument_types))
    }

    fn analyze_call_arguments(
        &mut self,
        arguments: &[ExprId],
        context: &Context,
    ) -> Result<Vec<Type>> {
        let ast = self.ast;
        let mut types = Vec::with_capacity(arguments.len());
        for &argument in arguments {
            match ast.expr(argument) {
                Expr::Lambda { .. } | Expr::Bind { .. } => {
                    let ty = self.analyze_lambda_argument(argument, context)?;
                    self.expression_types.insert(argument, ty.clone());
                    types.push(ty);
                }
                Expr::AllFields(prefix) => {
                    if context.is_pattern_recognition() {
                        let known = prefix.len() == 1 && context.is_label(&prefix.first().canonical());
                        if !known {
                            return Err(ErrorKind::UnknownPatternLabel(prefix.to_string())
                                .at(ast.location(argument)));
                        }
                    }
                    types.push(Type::Unknown);
                }
                _ => types.push(self.process(argument, context)?),
            }
        }
        Ok(types)
    }

    /// Lambdas passed to a function get their own analyzer, seeded with the
    /// types of any enclosing lambda's arguments. Its fields flow back here.
    fn analyze_lambda_argument(&mut self, argument: ExprId, context: &Context) -> Result<Type> {
        let seeded: Vec<(ExprId, Type)> = context
            .lambda_arguments()
            .map(|arguments| {
                arguments
                    .values()
                    .map(|declaration| {
                        let ty = self
                            .expression_types
                            .get(declaration)
                            .cloned()
                            .unwrap_or(Type::Unknown);
                        (*declaration, ty)
                    })
                    .collect()
            })
            .unwrap_or_default();

        let mut inner =
            ExpressionAnalyzer::new(self.ast, &mut *self.analysis, self.metadata, self.queries);
        for (declaration, ty) in seeded {
            inner.set_expression_type(declaration, ty);
        }
        let ty = inner.process(argument, context)?;
        let fields = inner.into_source_fields();
        self.source_fields.extend(fields);
        Ok(ty)
    }

    fn visit_lambda(
        &mut self,
        id: ExprId,
        arguments: &[ExprId],
        body: ExprId,
        context: &Context,
    ) -> Result<Type> {
        let ast = self.ast;
        let relation_id = RelationId::of_expr(id);
        let mut fields = Vec::with_capacity(arguments.len());
        let mut declarations = context.lambda_arguments().cloned().unwrap_or_default();
        for (index, &argument) in arguments.iter().enumerate() {
            let Expr::LambdaArgument(name) = ast.expr(argument) else {
                return Err(ErrorKind::UnsupportedConstruct(
                    "lambda argument must be an identifier".into(),
                )
                .at(ast.location(argument)));
            };
            let ty = self
                .expression_types
                .get(&argument)
                .cloned()
                .unwrap_or(Type::Unknown);
            self.set_expression_type(argument, ty.clone());
            fields.push(Field::new_unqualified(Some(name.value.clone()), ty));
            declarations.insert(FieldId::new(relation_id, index), argument);
        }

        let scope = Scope::builder()
            .with_parent(Arc::clone(context.scope()))
            .with_relation_type(relation_id, RelationType::new(fields))
            .build();
        self.process(body, &context.in_lambda(scope, declarations))?;
        Ok(Type::Unknown)
    }

    fn analyze_subquery(&mut self, query: QueryId, context: &Context) -> Result<Type> {
        if context.is_in_lambda() {
            return Err(ErrorKind::LambdaCannotContainSubquery.into());
        }
        let scope = self
            .queries
            .analyze_subquery(query, context.scope(), self.analysis)?;

        let mut fields = Vec::new();
        for (_, field) in scope.relation_type().visible_fields() {
            if !field.sources().is_empty() {
                self.source_fields.push(field.clone());
            }
            fields.push(RowField::new(
                field.name().map(str::to_string),
                field.ty().clone(),
            ));
        }
        Ok(if fields.len() == 1 {
            fields.remove(0).ty
        } else {
            Type::Row(fields)
        })
    }
}

fn literal_type(literal: &Literal) -> Type {
    match literal {
        Literal::Long(value) if i32::try_from(*value).is_ok() => Type::Integer,
        Literal::Long(_) => Type::Bigint,
        Literal::Double(_) => Type::Double,
        Literal::Decimal(_) => Type::Decimal,
        Literal::String(_) => Type::Varchar,
        Literal::Boolean(_) => Type::Boolean,
        Literal::Null => Type::Unknown,
    }
}

fn first_known(types: impl IntoIterator<Item = Type>) -> Type {
    types
        .into_iter()
        .find(|ty| !ty.is_unknown())
        .unwrap_or(Type::Unknown)
}

fn row_field_type(base: &Type, field: &Identifier) -> Result<Type> {
    match base {
        Type::Row(fields) => {
            let mut matches = fields
                .iter()
                .filter(|f| f.name.as_deref().is_some_and(|name| field.matches(name)));
            match (matches.next(), matches.next()) {
                (Some(found), None) => Ok(found.ty.clone()),
                (Some(_), Some(_)) => Err(ErrorKind::AmbiguousRowField(field.value.clone()).into()),
                (None, _) => Err(ErrorKind::FieldNotFound(field.value.clone()).into()),
            }
        }
        Type::Unknown => Ok(Type::Unknown),
        other => Err(ErrorKind::NotARowType(other.to_string()).into()),
    }
}

/// Return types for the few functions whose result does not depend on the
/// function registry; everything else is unknown.
fn function_return_type(call: &FunctionCall, arguments: &[Type]) -> Type {
    match call.simple_name().as_deref() {
        Some("count" | "count_if" | "approx_distinct" | "row_number" | "rank" | "dense_rank") => {
            Type::Bigint
        }
        Some("concat" | "lower" | "upper" | "trim" | "substr" | "substring") => Type::Varchar,
        Some("min" | "max" | "arbitrary" | "any_value" | "first_value" | "last_value" | "lag"
        | "lead") => arguments.first().cloned().unwrap_or(Type::Unknown),
        _ => Type::Unknown,
    }
}
