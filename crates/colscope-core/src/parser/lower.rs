//! Lowering from the `sqlparser` AST into the analyzer's arena [`Ast`].
//!
//! Lowering is purely syntactic: names are not resolved and nothing is
//! validated beyond shape. Constructs the analyzer does not model fail with
//! [`ParseErrorKind::UnsupportedFeature`] instead of being silently dropped,
//! since a dropped expression would drop lineage with it.

use crate::ast::{
    Anchor, ArithmeticOperator, Ast, ComparisonOperator, Expr, ExprId, FrameBound, FrameBoundKind,
    FrameType, FunctionCall, Identifier, JoinKind, Literal, LogicalOperator, MatchRecognize,
    MeasureDefinition, NamedWindow, QualifiedName, Query, QueryBody, QueryId, Relation,
    RelationRef, RowPattern, RowsPerMatch, Select, SelectItem, SetOperator, Sign, SkipTo,
    SortItem, Statement, TableAlias, VariableDefinition, WhenClause, WindowFrame, WindowRef,
    WindowSpecification, WithQuery,
};
use crate::error::{Location, ParseError, ParseErrorKind};
use sqlparser::ast::{
    self as sql, AccessExpr, AfterMatchSkip, BinaryOperator, DuplicateTreatment,
    FunctionArgumentClause, FunctionArguments, GroupByExpr, JoinConstraint, JoinOperator,
    MatchRecognizePattern, MatchRecognizeSymbol, NamedWindowExpr, ObjectName, OrderByKind,
    SelectItemQualifiedWildcardKind, SetQuantifier, Spanned, TableFactor, TableObject,
    UnaryOperator, Value, WindowFrameBound, WindowFrameUnits, WindowType,
};
use sqlparser::tokenizer::Span;

type Result<T> = std::result::Result<T, ParseError>;

/// One statement in analyzer form.
#[derive(Debug, Clone)]
pub struct LoweredStatement {
    pub ast: Ast,
    pub statement: Statement,
    pub location: Option<Location>,
}

/// Lowers one parsed statement. `max_depth` bounds expression and query
/// nesting; deeper input fails with [`ParseErrorKind::InputTooLarge`].
pub fn lower_statement(statement: &sql::Statement, max_depth: usize) -> Result<LoweredStatement> {
    let mut lowerer = Lowerer {
        ast: Ast::new(),
        depth: 0,
        max_depth,
    };
    let location = span_location(statement.span());
    let lowered = lowerer
        .statement(statement)
        .map_err(|e| match e.position {
            Some(_) => e,
            None => e.with_position(location),
        })?;
    Ok(LoweredStatement {
        ast: lowerer.ast,
        statement: lowered,
        location,
    })
}

fn span_location(span: Span) -> Option<Location> {
    if span.start.line == 0 {
        return None;
    }
    Some(Location::new(
        usize::try_from(span.start.line).ok()?,
        usize::try_from(span.start.column).ok()?,
    ))
}

fn unsupported(what: impl std::fmt::Display, span: Span) -> ParseError {
    ParseError::unsupported(what).with_position(span_location(span))
}

fn identifier(ident: &sql::Ident) -> Identifier {
    if ident.quote_style.is_some() {
        Identifier::delimited(ident.value.clone())
    } else {
        Identifier::new(ident.value.clone())
    }
}

fn qualified_name(name: &ObjectName) -> Result<QualifiedName> {
    let parts = name
        .0
        .iter()
        .map(|part| {
            part.as_ident()
                .map(identifier)
                .ok_or_else(|| unsupported(format!("name part {part}"), name.span()))
        })
        .collect::<Result<Vec<_>>>()?;
    if parts.is_empty() {
        return Err(unsupported("empty object name", name.span()));
    }
    Ok(QualifiedName::new(parts))
}

fn table_alias(alias: &sql::TableAlias) -> TableAlias {
    TableAlias {
        name: identifier(&alias.name),
        columns: alias.columns.iter().map(|c| identifier(&c.name)).collect(),
    }
}

fn number_literal(text: &str, negative: bool) -> Literal {
    let signed = if negative {
        format!("-{text}")
    } else {
        text.to_string()
    };
    if let Ok(value) = signed.parse::<i64>() {
        Literal::Long(value)
    } else if text.contains(['e', 'E']) {
        Literal::Double(signed)
    } else {
        Literal::Decimal(signed)
    }
}

struct Lowerer {
    ast: Ast,
    depth: usize,
    max_depth: usize,
}

impl Lowerer {
    fn enter(&mut self, span: Span) -> Result<()> {
        if self.depth >= self.max_depth {
            return Err(ParseError::new(format!(
                "nesting exceeds the maximum depth of {}",
                self.max_depth
            ))
            .with_kind(ParseErrorKind::InputTooLarge)
            .with_position(span_location(span)));
        }
        self.depth += 1;
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn statement(&mut self, statement: &sql::Statement) -> Result<Statement> {
        match statement {
            sql::Statement::Query(query) => Ok(Statement::Query(self.query(query)?)),
            sql::Statement::Insert(insert) => {
                let TableObject::TableName(target) = &insert.table else {
                    return Err(unsupported("INSERT INTO FUNCTION", statement.span()));
                };
                let Some(source) = &insert.source else {
                    return Err(unsupported("INSERT without a query", statement.span()));
                };
                Ok(Statement::Insert {
                    target: qualified_name(target)?,
                    columns: insert.columns.iter().map(identifier).collect(),
                    query: self.query(source)?,
                })
            }
            sql::Statement::CreateView {
                name,
                columns,
                query,
                or_replace,
                ..
            } => Ok(Statement::CreateView {
                name: qualified_name(name)?,
                columns: columns.iter().map(|c| identifier(&c.name)).collect(),
                query: self.query(query)?,
                replace: *or_replace,
            }),
            sql::Statement::CreateTable(create) => {
                let Some(query) = &create.query else {
                    return Err(unsupported("CREATE TABLE without AS", statement.span()));
                };
                Ok(Statement::CreateTableAsSelect {
                    name: qualified_name(&create.name)?,
                    columns: create.columns.iter().map(|c| identifier(&c.name)).collect(),
                    query: self.query(query)?,
                })
            }
            other => {
                let text = other.to_string();
                let keyword = text.split_whitespace().take(2).collect::<Vec<_>>().join(" ");
                Err(unsupported(format!("statement {keyword}"), other.span()))
            }
        }
    }

    fn query(&mut self, query: &sql::Query) -> Result<QueryId> {
        let span = query.span();
        self.enter(span)?;
        let result = self.query_inner(query);
        self.leave();
        let lowered = result?;
        Ok(self.ast.add_query_at(lowered, span_location(span)))
    }

    fn query_inner(&mut self, query: &sql::Query) -> Result<Query> {
        let mut with = Vec::new();
        if let Some(clause) = &query.with {
            if clause.recursive {
                return Err(unsupported("WITH RECURSIVE", query.span()));
            }
            for cte in &clause.cte_tables {
                with.push(WithQuery {
                    name: identifier(&cte.alias.name),
                    column_names: cte.alias.columns.iter().map(|c| identifier(&c.name)).collect(),
                    query: self.query(&cte.query)?,
                });
            }
        }

        let body = self.query_body(&query.body)?;
        let order_by = match &query.order_by {
            None => Vec::new(),
            Some(order_by) => match &order_by.kind {
                OrderByKind::Expressions(items) => self.sort_items(items)?,
                OrderByKind::All(_) => return Err(unsupported("ORDER BY ALL", query.span())),
            },
        };
        Ok(Query {
            with,
            body,
            order_by,
        })
    }

    fn query_body(&mut self, body: &sql::SetExpr) -> Result<QueryBody> {
        match body {
            sql::SetExpr::Select(select) => Ok(QueryBody::Select(Box::new(self.select(select)?))),
            sql::SetExpr::Query(query) => Ok(QueryBody::Query(self.query(query)?)),
            sql::SetExpr::SetOperation {
                op,
                set_quantifier,
                left,
                right,
            } => {
                let op = match op {
                    sql::SetOperator::Union => SetOperator::Union,
                    sql::SetOperator::Intersect => SetOperator::Intersect,
                    sql::SetOperator::Except | sql::SetOperator::Minus => SetOperator::Except,
                };
                Ok(QueryBody::SetOperation {
                    op,
                    all: matches!(set_quantifier, SetQuantifier::All | SetQuantifier::AllByName),
                    left: Box::new(self.query_body(left)?),
                    right: Box::new(self.query_body(right)?),
                })
            }
            sql::SetExpr::Values(values) => {
                let mut rows = Vec::with_capacity(values.rows.len());
                for row in &values.rows {
                    let row_id = match row.as_slice() {
                        [single] => self.expr(single)?,
                        items => {
                            let lowered = self.exprs(items)?;
                            let span = items.first().map_or(Span::empty(), |item| item.span());
                            self.ast.add_expr_at(Expr::Row(lowered), span_location(span))
                        }
                    };
                    rows.push(row_id);
                }
                Ok(QueryBody::Values(rows))
            }
            other => Err(unsupported(format!("query body {other}"), other.span())),
        }
    }

    fn select(&mut self, select: &sql::Select) -> Result<Select> {
        if let Some(qualify) = &select.qualify {
            return Err(unsupported("QUALIFY", qualify.span()));
        }
        if !select.lateral_views.is_empty() {
            return Err(unsupported("LATERAL VIEW", select.span()));
        }

        let mut from = Vec::with_capacity(select.from.len());
        for table in &select.from {
            from.push(self.table_with_joins(table)?);
        }

        let mut items = Vec::with_capacity(select.projection.len());
        for item in &select.projection {
            items.push(self.select_item(item)?);
        }

        let selection = select.selection.as_ref().map(|e| self.expr(e)).transpose()?;

        let group_by = match &select.group_by {
            GroupByExpr::Expressions(exprs, modifiers) => {
                if !modifiers.is_empty() {
                    return Err(unsupported("GROUP BY modifiers", select.span()));
                }
                self.exprs(exprs)?
            }
            GroupByExpr::All(_) => return Err(unsupported("GROUP BY ALL", select.span())),
        };

        let having = select.having.as_ref().map(|e| self.expr(e)).transpose()?;

        let mut windows = Vec::with_capacity(select.named_window.len());
        for definition in &select.named_window {
            let specification = match &definition.1 {
                NamedWindowExpr::NamedWindow(base) => WindowSpecification {
                    existing_window_name: Some(identifier(base)),
                    ..WindowSpecification::default()
                },
                NamedWindowExpr::WindowSpec(spec) => self.window_spec(spec, select.span())?,
            };
            windows.push(NamedWindow {
                name: identifier(&definition.0),
                specification,
            });
        }

        Ok(Select {
            distinct: select.distinct.is_some(),
            items,
            from,
            selection,
            group_by,
            having,
            windows,
        })
    }

    fn select_item(&mut self, item: &sql::SelectItem) -> Result<SelectItem> {
        match item {
            sql::SelectItem::UnnamedExpr(expr) => Ok(SelectItem::Expression {
                expr: self.expr(expr)?,
                alias: None,
            }),
            sql::SelectItem::ExprWithAlias { expr, alias } => Ok(SelectItem::Expression {
                expr: self.expr(expr)?,
                alias: Some(identifier(alias)),
            }),
            sql::SelectItem::Wildcard(options) => {
                check_wildcard_options(options, item.span())?;
                Ok(SelectItem::AllColumns)
            }
            sql::SelectItem::QualifiedWildcard(kind, options) => {
                check_wildcard_options(options, item.span())?;
                match kind {
                    SelectItemQualifiedWildcardKind::ObjectName(name) => {
                        Ok(SelectItem::QualifiedAllColumns(qualified_name(name)?))
                    }
                    SelectItemQualifiedWildcardKind::Expr(expr) => {
                        Err(unsupported(format!("wildcard over {expr}"), item.span()))
                    }
                }
            }
        }
    }

    // FROM

    fn table_with_joins(&mut self, table: &sql::TableWithJoins) -> Result<RelationRef> {
        let mut left = self.table_factor(&table.relation)?;
        for join in &table.joins {
            let right = self.table_factor(&join.relation)?;
            let (kind, constraint) = match &join.join_operator {
                JoinOperator::Join(c) | JoinOperator::Inner(c) => (JoinKind::Inner, c),
                JoinOperator::Left(c) | JoinOperator::LeftOuter(c) => (JoinKind::Left, c),
                JoinOperator::Right(c) | JoinOperator::RightOuter(c) => (JoinKind::Right, c),
                JoinOperator::FullOuter(c) => (JoinKind::Full, c),
                JoinOperator::CrossJoin(c) => (JoinKind::Cross, c),
                other => {
                    return Err(unsupported(
                        format!("join operator {other:?}"),
                        join.relation.span(),
                    ))
                }
            };
            let criteria = match constraint {
                JoinConstraint::On(expr) => Some(self.expr(expr)?),
                JoinConstraint::None => None,
                JoinConstraint::Using(_) => {
                    return Err(unsupported("JOIN ... USING", join.relation.span()))
                }
                JoinConstraint::Natural => {
                    return Err(unsupported("NATURAL JOIN", join.relation.span()))
                }
            };
            let span = join.relation.span();
            left = self.ast.add_relation_at(
                Relation::Join {
                    kind,
                    left,
                    right,
                    criteria,
                },
                span_location(span),
            );
        }
        Ok(left)
    }

    fn table_factor(&mut self, factor: &TableFactor) -> Result<RelationRef> {
        let span = factor.span();
        let relation = match factor {
            TableFactor::Table {
                name, alias, args, ..
            } => {
                if args.is_some() {
                    return Err(unsupported(format!("table function {name}"), span));
                }
                Relation::Table {
                    name: qualified_name(name)?,
                    alias: alias.as_ref().map(table_alias),
                }
            }
            TableFactor::Derived {
                lateral,
                subquery,
                alias,
                ..
            } => {
                if *lateral {
                    return Err(unsupported("LATERAL derived table", span));
                }
                Relation::Derived {
                    query: self.query(subquery)?,
                    alias: alias.as_ref().map(table_alias),
                }
            }
            TableFactor::NestedJoin {
                table_with_joins,
                alias,
                ..
            } => {
                if alias.is_some() {
                    return Err(unsupported("aliased nested join", span));
                }
                return self.table_with_joins(table_with_joins);
            }
            TableFactor::MatchRecognize {
                table,
                partition_by,
                order_by,
                measures,
                rows_per_match,
                after_match_skip,
                pattern,
                symbols,
                alias,
                ..
            } => {
                let input = self.table_factor(table)?;
                let partition_by = self.exprs(partition_by)?;
                let order_by = self.sort_items(order_by)?;
                let mut lowered_measures = Vec::with_capacity(measures.len());
                for measure in measures {
                    lowered_measures.push(MeasureDefinition {
                        name: identifier(&measure.alias),
                        expression: self.expr(&measure.expr)?,
                    });
                }
                let mut variable_definitions = Vec::with_capacity(symbols.len());
                for symbol in symbols {
                    variable_definitions.push(VariableDefinition {
                        name: identifier(&symbol.symbol),
                        expression: self.expr(&symbol.definition)?,
                    });
                }
                Relation::MatchRecognize(Box::new(MatchRecognize {
                    input,
                    partition_by,
                    order_by,
                    measures: lowered_measures,
                    rows_per_match: match rows_per_match {
                        Some(sql::RowsPerMatch::AllRows(_)) => RowsPerMatch::All,
                        _ => RowsPerMatch::One,
                    },
                    after_match_skip: after_match_skip.as_ref().map(|skip| match skip {
                        AfterMatchSkip::PastLastRow => SkipTo::PastLastRow,
                        AfterMatchSkip::ToNextRow => SkipTo::NextRow,
                        AfterMatchSkip::ToFirst(label) => SkipTo::First(identifier(label)),
                        AfterMatchSkip::ToLast(label) => SkipTo::Last(identifier(label)),
                    }),
                    pattern: row_pattern(pattern),
                    subsets: Vec::new(),
                    variable_definitions,
                    alias: alias.as_ref().map(table_alias),
                }))
            }
            other => return Err(unsupported(format!("FROM item {other}"), span)),
        };
        Ok(self.ast.add_relation_at(relation, span_location(span)))
    }

    // Expressions

    fn exprs(&mut self, exprs: &[sql::Expr]) -> Result<Vec<ExprId>> {
        exprs.iter().map(|e| self.expr(e)).collect()
    }

    fn sort_items(&mut self, items: &[sql::OrderByExpr]) -> Result<Vec<SortItem>> {
        items
            .iter()
            .map(|item| {
                Ok(SortItem {
                    key: self.expr(&item.expr)?,
                    descending: item.options.asc == Some(false),
                })
            })
            .collect()
    }

    fn expr(&mut self, expr: &sql::Expr) -> Result<ExprId> {
        let span = expr.span();
        self.enter(span)?;
        let result = self.expr_inner(expr, span);
        self.leave();
        result
    }

    fn add(&mut self, expr: Expr, span: Span) -> ExprId {
        self.ast.add_expr_at(expr, span_location(span))
    }

    fn call(&mut self, name: &str, arguments: Vec<ExprId>, span: Span) -> ExprId {
        let call = FunctionCall::new(QualifiedName::single(Identifier::new(name)), arguments);
        self.add(Expr::FunctionCall(call), span)
    }

    fn negate(&mut self, inner: ExprId, negated: bool, span: Span) -> ExprId {
        if negated {
            self.add(Expr::Not(inner), span)
        } else {
            inner
        }
    }

    fn expr_inner(&mut self, expr: &sql::Expr, span: Span) -> Result<ExprId> {
        use sql::Expr as E;

        let lowered = match expr {
            E::Identifier(ident) => Expr::Identifier(identifier(ident)),
            E::CompoundIdentifier(parts) => {
                let Some((first, rest)) = parts.split_first() else {
                    return Err(unsupported("empty compound identifier", span));
                };
                let mut base = self.add(Expr::Identifier(identifier(first)), first.span);
                for part in rest {
                    base = self.add(
                        Expr::Dereference {
                            base,
                            field: identifier(part),
                        },
                        part.span,
                    );
                }
                return Ok(base);
            }
            E::Value(value) => Expr::Literal(self.value(&value.value, span)?),
            E::TypedString(typed) => {
                let text = self.add(Expr::Literal(Literal::String(expr.to_string())), span);
                Expr::Cast {
                    expr: text,
                    type_name: typed.data_type.to_string(),
                }
            }
            E::Interval(_) => Expr::Literal(Literal::String(expr.to_string())),
            E::Nested(inner) => return self.expr(inner),
            E::Collate { expr: inner, .. } => return self.expr(inner),
            E::BinaryOp { left, op, right } => return self.binary(left, op, right, span),
            E::UnaryOp { op, expr: inner } => match op {
                UnaryOperator::Minus => {
                    if let E::Value(value) = inner.as_ref() {
                        if let Value::Number(text, _) = &value.value {
                            return Ok(self.add(Expr::Literal(number_literal(text, true)), span));
                        }
                    }
                    Expr::ArithmeticUnary {
                        sign: Sign::Minus,
                        value: self.expr(inner)?,
                    }
                }
                UnaryOperator::Plus => Expr::ArithmeticUnary {
                    sign: Sign::Plus,
                    value: self.expr(inner)?,
                },
                UnaryOperator::Not => Expr::Not(self.expr(inner)?),
                other => {
                    let value = self.expr(inner)?;
                    let name = QualifiedName::single(Identifier::delimited(other.to_string()));
                    Expr::FunctionCall(FunctionCall::new(name, vec![value]))
                }
            },
            E::IsNull(inner) | E::IsUnknown(inner) => Expr::IsNull(self.expr(inner)?),
            E::IsNotNull(inner) | E::IsNotUnknown(inner) => Expr::IsNotNull(self.expr(inner)?),
            E::IsTrue(inner) | E::IsNotTrue(inner) | E::IsFalse(inner) | E::IsNotFalse(inner) => {
                let op = if matches!(expr, E::IsTrue(_) | E::IsFalse(_)) {
                    ComparisonOperator::IsNotDistinctFrom
                } else {
                    ComparisonOperator::IsDistinctFrom
                };
                let truth = matches!(expr, E::IsTrue(_) | E::IsNotTrue(_));
                let left = self.expr(inner)?;
                let right = self.add(Expr::Literal(Literal::Boolean(truth)), span);
                Expr::Comparison { op, left, right }
            }
            E::IsDistinctFrom(left, right) | E::IsNotDistinctFrom(left, right) => {
                let op = if matches!(expr, E::IsDistinctFrom(..)) {
                    ComparisonOperator::IsDistinctFrom
                } else {
                    ComparisonOperator::IsNotDistinctFrom
                };
                Expr::Comparison {
                    op,
                    left: self.expr(left)?,
                    right: self.expr(right)?,
                }
            }
            E::InList {
                expr: value,
                list,
                negated,
            } => {
                let value = self.expr(value)?;
                let list = self.exprs(list)?;
                let inner = self.add(Expr::InList { value, list }, span);
                return Ok(self.negate(inner, *negated, span));
            }
            E::InSubquery {
                expr: value,
                subquery,
                negated,
            } => {
                let value = self.expr(value)?;
                let subquery = self.query(subquery)?;
                let inner = self.add(Expr::InSubquery { value, subquery }, span);
                return Ok(self.negate(inner, *negated, span));
            }
            E::Exists { subquery, negated } => {
                let query = self.query(subquery)?;
                let inner = self.add(Expr::Exists(query), span);
                return Ok(self.negate(inner, *negated, span));
            }
            E::Subquery(query) => Expr::Subquery(self.query(query)?),
            E::Between {
                expr: value,
                negated,
                low,
                high,
            } => {
                let value = self.expr(value)?;
                let low = self.expr(low)?;
                let high = self.expr(high)?;
                let inner = self.add(Expr::Between { value, low, high }, span);
                return Ok(self.negate(inner, *negated, span));
            }
            E::Like {
                negated,
                expr: value,
                pattern,
                ..
            }
            | E::ILike {
                negated,
                expr: value,
                pattern,
                ..
            } => {
                let value = self.expr(value)?;
                let pattern = self.expr(pattern)?;
                let inner = self.add(
                    Expr::Like {
                        value,
                        pattern,
                        escape: None,
                    },
                    span,
                );
                return Ok(self.negate(inner, *negated, span));
            }
            E::Cast {
                expr: inner,
                data_type,
                ..
            } => Expr::Cast {
                expr: self.expr(inner)?,
                type_name: data_type.to_string(),
            },
            E::Case {
                operand,
                conditions,
                else_result,
                ..
            } => {
                let operand = operand.as_ref().map(|e| self.expr(e)).transpose()?;
                let mut whens = Vec::with_capacity(conditions.len());
                for when in conditions {
                    whens.push(WhenClause {
                        operand: self.expr(&when.condition)?,
                        result: self.expr(&when.result)?,
                    });
                }
                let default = else_result.as_ref().map(|e| self.expr(e)).transpose()?;
                match operand {
                    Some(operand) => Expr::SimpleCase {
                        operand,
                        whens,
                        default,
                    },
                    None => Expr::SearchedCase { whens, default },
                }
            }
            E::Tuple(items) => Expr::Row(self.exprs(items)?),
            E::Array(array) => Expr::Array(self.exprs(&array.elem)?),
            E::CompoundFieldAccess { root, access_chain } => {
                let mut base = self.expr(root)?;
                for access in access_chain {
                    base = match access {
                        AccessExpr::Dot(sql::Expr::Identifier(field)) => self.add(
                            Expr::Dereference {
                                base,
                                field: identifier(field),
                            },
                            span,
                        ),
                        AccessExpr::Subscript(sql::Subscript::Index { index }) => {
                            let index = self.expr(index)?;
                            self.add(Expr::Subscript { base, index }, span)
                        }
                        other => {
                            return Err(unsupported(format!("field access {other:?}"), span));
                        }
                    };
                }
                return Ok(base);
            }
            E::Function(function) => return self.function(function, span),
            E::Extract { expr: inner, .. }
            | E::Ceil { expr: inner, .. }
            | E::Floor { expr: inner, .. }
            | E::Trim { expr: inner, .. } => {
                let name = match expr {
                    E::Extract { .. } => "extract",
                    E::Ceil { .. } => "ceil",
                    E::Floor { .. } => "floor",
                    _ => "trim",
                };
                let argument = self.expr(inner)?;
                return Ok(self.call(name, vec![argument], span));
            }
            E::Substring {
                expr: inner,
                substring_from,
                substring_for,
                ..
            } => {
                let mut arguments = vec![self.expr(inner)?];
                if let Some(from) = substring_from {
                    arguments.push(self.expr(from)?);
                }
                if let Some(length) = substring_for {
                    arguments.push(self.expr(length)?);
                }
                return Ok(self.call("substring", arguments, span));
            }
            E::Position { expr: needle, r#in } => {
                let arguments = vec![self.expr(needle)?, self.expr(r#in)?];
                return Ok(self.call("position", arguments, span));
            }
            E::AtTimeZone {
                timestamp,
                time_zone,
            } => {
                let arguments = vec![self.expr(timestamp)?, self.expr(time_zone)?];
                return Ok(self.call("at_timezone", arguments, span));
            }
            E::Lambda(lambda) => {
                let arguments: Vec<ExprId> = lambda
                    .params
                    .iter()
                    .map(|param| self.add(Expr::LambdaArgument(identifier(param)), param.span))
                    .collect();
                Expr::Lambda {
                    arguments,
                    body: self.expr(&lambda.body)?,
                }
            }
            other => return Err(unsupported(format!("expression {other}"), span)),
        };
        Ok(self.add(lowered, span))
    }

    fn value(&mut self, value: &Value, span: Span) -> Result<Literal> {
        match value {
            Value::Number(text, _) => Ok(number_literal(text, false)),
            Value::Boolean(value) => Ok(Literal::Boolean(*value)),
            Value::Null => Ok(Literal::Null),
            Value::Placeholder(name) => Err(unsupported(format!("placeholder {name}"), span)),
            Value::SingleQuotedString(text)
            | Value::DoubleQuotedString(text)
            | Value::NationalStringLiteral(text)
            | Value::EscapedStringLiteral(text) => Ok(Literal::String(text.clone())),
            Value::DollarQuotedString(quoted) => Ok(Literal::String(quoted.value.clone())),
            other => Ok(Literal::String(other.to_string())),
        }
    }

    fn binary(
        &mut self,
        left: &sql::Expr,
        op: &BinaryOperator,
        right: &sql::Expr,
        span: Span,
    ) -> Result<ExprId> {
        let logical = match op {
            BinaryOperator::And => Some(LogicalOperator::And),
            BinaryOperator::Or => Some(LogicalOperator::Or),
            _ => None,
        };
        if let Some(logical) = logical {
            let mut terms = Vec::new();
            self.flatten_logical(left, op, &mut terms)?;
            self.flatten_logical(right, op, &mut terms)?;
            return Ok(self.add(Expr::Logical { op: logical, terms }, span));
        }

        let lhs = self.expr(left)?;
        let rhs = self.expr(right)?;
        let comparison = match op {
            BinaryOperator::Eq => Some(ComparisonOperator::Equal),
            BinaryOperator::NotEq => Some(ComparisonOperator::NotEqual),
            BinaryOperator::Lt => Some(ComparisonOperator::LessThan),
            BinaryOperator::LtEq => Some(ComparisonOperator::LessThanOrEqual),
            BinaryOperator::Gt => Some(ComparisonOperator::GreaterThan),
            BinaryOperator::GtEq => Some(ComparisonOperator::GreaterThanOrEqual),
            _ => None,
        };
        if let Some(op) = comparison {
            return Ok(self.add(
                Expr::Comparison {
                    op,
                    left: lhs,
                    right: rhs,
                },
                span,
            ));
        }
        let arithmetic = match op {
            BinaryOperator::Plus => Some(ArithmeticOperator::Add),
            BinaryOperator::Minus => Some(ArithmeticOperator::Subtract),
            BinaryOperator::Multiply => Some(ArithmeticOperator::Multiply),
            BinaryOperator::Divide => Some(ArithmeticOperator::Divide),
            BinaryOperator::Modulo => Some(ArithmeticOperator::Modulus),
            _ => None,
        };
        if let Some(op) = arithmetic {
            return Ok(self.add(
                Expr::Arithmetic {
                    op,
                    left: lhs,
                    right: rhs,
                },
                span,
            ));
        }
        if matches!(op, BinaryOperator::StringConcat) {
            return Ok(self.call("concat", vec![lhs, rhs], span));
        }
        // Any other operator reads both operands; model it as a function
        // named by its symbol.
        let name = QualifiedName::single(Identifier::delimited(op.to_string()));
        Ok(self.add(
            Expr::FunctionCall(FunctionCall::new(name, vec![lhs, rhs])),
            span,
        ))
    }

    fn flatten_logical(
        &mut self,
        expr: &sql::Expr,
        op: &BinaryOperator,
        terms: &mut Vec<ExprId>,
    ) -> Result<()> {
        match expr {
            sql::Expr::BinaryOp {
                left,
                op: inner,
                right,
            } if inner == op => {
                self.enter(expr.span())?;
                let result = self
                    .flatten_logical(left, op, terms)
                    .and_then(|()| self.flatten_logical(right, op, terms));
                self.leave();
                result
            }
            _ => {
                terms.push(self.expr(expr)?);
                Ok(())
            }
        }
    }

    fn function(&mut self, function: &sql::Function, span: Span) -> Result<ExprId> {
        let name = qualified_name(&function.name)?;
        if !matches!(function.parameters, FunctionArguments::None) {
            return Err(unsupported(format!("parametric function {name}"), span));
        }

        let mut arguments = Vec::new();
        let mut distinct = false;
        let mut order_by = Vec::new();
        match &function.args {
            FunctionArguments::None => {}
            FunctionArguments::Subquery(_) => {
                return Err(unsupported(format!("subquery argument to {name}"), span));
            }
            FunctionArguments::List(list) => {
                distinct = list.duplicate_treatment == Some(DuplicateTreatment::Distinct);
                for argument in &list.args {
                    let argument = match argument {
                        sql::FunctionArg::Unnamed(argument) => argument,
                        sql::FunctionArg::Named { arg, .. }
                        | sql::FunctionArg::ExprNamed { arg, .. } => arg,
                    };
                    match argument {
                        sql::FunctionArgExpr::Expr(expr) => arguments.push(self.expr(expr)?),
                        // count(*) takes no input column.
                        sql::FunctionArgExpr::Wildcard => {}
                        sql::FunctionArgExpr::QualifiedWildcard(prefix) => {
                            let prefix = qualified_name(prefix)?;
                            arguments.push(self.add(Expr::AllFields(prefix), span));
                        }
                    }
                }
                for clause in &list.clauses {
                    if let FunctionArgumentClause::OrderBy(items) = clause {
                        order_by.extend(self.sort_items(items)?);
                    }
                }
            }
        }
        order_by.extend(self.sort_items(&function.within_group)?);

        let filter = function
            .filter
            .as_ref()
            .map(|e| self.expr(e))
            .transpose()?;
        let window = match &function.over {
            None => None,
            Some(WindowType::NamedWindow(window)) => Some(WindowRef::Named(identifier(window))),
            Some(WindowType::WindowSpec(spec)) => {
                Some(WindowRef::Inline(self.window_spec(spec, span)?))
            }
        };

        let plain = window.is_none() && filter.is_none() && !distinct && order_by.is_empty();
        let simple = match name.parts() {
            [only] if !only.delimited => Some(only.value.to_lowercase()),
            _ => None,
        };
        if plain {
            let special = match (simple.as_deref(), arguments.as_slice()) {
                (Some("coalesce"), [_, ..]) => Some(Expr::Coalesce(arguments.clone())),
                (Some("nullif"), [first, second]) => Some(Expr::NullIf {
                    first: *first,
                    second: *second,
                }),
                (Some("if"), [condition, then]) => Some(Expr::If {
                    condition: *condition,
                    then: *then,
                    otherwise: None,
                }),
                (Some("if"), [condition, then, otherwise]) => Some(Expr::If {
                    condition: *condition,
                    then: *then,
                    otherwise: Some(*otherwise),
                }),
                _ => None,
            };
            if let Some(special) = special {
                return Ok(self.add(special, span));
            }
        }

        let call = FunctionCall {
            name,
            arguments,
            distinct,
            filter,
            order_by,
            window,
            processing_mode: None,
        };
        Ok(self.add(Expr::FunctionCall(call), span))
    }

    fn window_spec(&mut self, spec: &sql::WindowSpec, span: Span) -> Result<WindowSpecification> {
        let partition_by = self.exprs(&spec.partition_by)?;
        let order_by = self.sort_items(&spec.order_by)?;
        let frame = match &spec.window_frame {
            None => None,
            Some(frame) => {
                let frame_type = match frame.units {
                    WindowFrameUnits::Rows => FrameType::Rows,
                    WindowFrameUnits::Range => FrameType::Range,
                    WindowFrameUnits::Groups => FrameType::Groups,
                };
                let start = self.frame_bound(&frame.start_bound)?;
                let end = frame
                    .end_bound
                    .as_ref()
                    .map(|bound| self.frame_bound(bound))
                    .transpose()?;
                let mut lowered = WindowFrame::new(frame_type, start, end);
                lowered.location = span_location(span);
                Some(lowered)
            }
        };
        Ok(WindowSpecification {
            existing_window_name: spec.window_name.as_ref().map(identifier),
            partition_by,
            order_by,
            frame,
        })
    }

    fn frame_bound(&mut self, bound: &WindowFrameBound) -> Result<FrameBound> {
        Ok(match bound {
            WindowFrameBound::CurrentRow => FrameBound::new(FrameBoundKind::CurrentRow),
            WindowFrameBound::Preceding(None) => FrameBound::new(FrameBoundKind::UnboundedPreceding),
            WindowFrameBound::Preceding(Some(offset)) => FrameBound::preceding(self.expr(offset)?),
            WindowFrameBound::Following(None) => FrameBound::new(FrameBoundKind::UnboundedFollowing),
            WindowFrameBound::Following(Some(offset)) => FrameBound::following(self.expr(offset)?),
        })
    }
}

fn check_wildcard_options(options: &sql::WildcardAdditionalOptions, span: Span) -> Result<()> {
    let modified = options.opt_exclude.is_some()
        || options.opt_except.is_some()
        || options.opt_replace.is_some()
        || options.opt_rename.is_some()
        || options.opt_ilike.is_some();
    if modified {
        Err(unsupported("wildcard modifiers", span))
    } else {
        Ok(())
    }
}

fn row_pattern(pattern: &MatchRecognizePattern) -> RowPattern {
    fn symbol(symbol: &MatchRecognizeSymbol) -> RowPattern {
        match symbol {
            MatchRecognizeSymbol::Named(label) => RowPattern::Label(identifier(label)),
            MatchRecognizeSymbol::Start => RowPattern::Anchor(Anchor::PartitionStart),
            MatchRecognizeSymbol::End => RowPattern::Anchor(Anchor::PartitionEnd),
        }
    }

    match pattern {
        MatchRecognizePattern::Symbol(s) => symbol(s),
        MatchRecognizePattern::Exclude(s) => RowPattern::Exclusion(Box::new(symbol(s))),
        MatchRecognizePattern::Permute(symbols) => {
            RowPattern::Permutation(symbols.iter().map(symbol).collect())
        }
        MatchRecognizePattern::Concat(items) => {
            RowPattern::Concatenation(items.iter().map(row_pattern).collect())
        }
        MatchRecognizePattern::Group(inner) => row_pattern(inner),
        MatchRecognizePattern::Alternation(items) => {
            RowPattern::Alternation(items.iter().map(row_pattern).collect())
        }
        MatchRecognizePattern::Repetition(inner, quantifier) => RowPattern::Quantified {
            pattern: Box::new(row_pattern(inner)),
            quantifier: quantifier.to_string(),
        },
    }
}
