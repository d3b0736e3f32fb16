//! Arena-allocated statement tree consumed by the analyzer.
//!
//! Every expression, query and FROM-clause relation lives in an [`Ast`] and is
//! addressed by a small copyable id. The analyzer keys all of its side tables
//! on these ids, so two syntactically identical expressions at different
//! positions stay distinct.

mod expr;
mod name;
mod query;
mod window;

pub use expr::{
    ArithmeticOperator, ComparisonOperator, Expr, FunctionCall, Literal, LogicalOperator,
    ProcessingMode, Sign, SortItem, WhenClause,
};
pub use name::{Identifier, QualifiedName};
pub use query::{
    JoinKind, MatchRecognize, Query, QueryBody, Relation, RowsPerMatch, Select, SelectItem,
    SetOperator, Statement, TableAlias, WithQuery,
};
pub use window::{
    Anchor, FrameBound, FrameBoundKind, FrameType, MeasureDefinition, NamedWindow,
    PatternSearchMode, RowPattern, SkipTo, SubsetDefinition, VariableDefinition, WindowFrame,
    WindowRef, WindowSpecification,
};

use crate::error::Location;
use serde::Serialize;

macro_rules! arena_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        pub struct $name(u32);

        impl $name {
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

arena_id!(
    /// Identity of an expression node.
    ExprId
);
arena_id!(
    /// Identity of a query node.
    QueryId
);
arena_id!(
    /// Identity of a FROM-clause relation.
    RelationRef
);

#[derive(Debug, Clone, Serialize)]
struct Node<T> {
    value: T,
    location: Option<Location>,
}

/// Owner of all nodes of one statement.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Ast {
    exprs: Vec<Node<Expr>>,
    queries: Vec<Node<Query>>,
    relations: Vec<Node<Relation>>,
}

fn next_id(len: usize) -> u32 {
    u32::try_from(len).unwrap_or_else(|_| panic!("AST arena exceeded {} nodes", u32::MAX))
}

impl Ast {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_expr(&mut self, expr: Expr) -> ExprId {
        self.add_expr_at(expr, None)
    }

    pub fn add_expr_at(&mut self, expr: Expr, location: Option<Location>) -> ExprId {
        let id = ExprId(next_id(self.exprs.len()));
        self.exprs.push(Node {
            value: expr,
            location,
        });
        id
    }

    pub fn expr(&self, id: ExprId) -> &Expr {
        &self.exprs[id.index()].value
    }

    pub fn location(&self, id: ExprId) -> Option<Location> {
        self.exprs[id.index()].location
    }

    pub fn add_query(&mut self, query: Query) -> QueryId {
        self.add_query_at(query, None)
    }

    pub fn add_query_at(&mut self, query: Query, location: Option<Location>) -> QueryId {
        let id = QueryId(next_id(self.queries.len()));
        self.queries.push(Node {
            value: query,
            location,
        });
        id
    }

    pub fn query(&self, id: QueryId) -> &Query {
        &self.queries[id.index()].value
    }

    pub fn query_location(&self, id: QueryId) -> Option<Location> {
        self.queries[id.index()].location
    }

    pub fn add_relation(&mut self, relation: Relation) -> RelationRef {
        self.add_relation_at(relation, None)
    }

    pub fn add_relation_at(
        &mut self,
        relation: Relation,
        location: Option<Location>,
    ) -> RelationRef {
        let id = RelationRef(next_id(self.relations.len()));
        self.relations.push(Node {
            value: relation,
            location,
        });
        id
    }

    pub fn relation(&self, id: RelationRef) -> &Relation {
        &self.relations[id.index()].value
    }

    pub fn relation_location(&self, id: RelationRef) -> Option<Location> {
        self.relations[id.index()].location
    }

    pub fn expr_count(&self) -> usize {
        self.exprs.len()
    }

    /// Direct child expressions of `id`, including those inside an inline
    /// window. Subqueries are not entered.
    pub fn children(&self, id: ExprId) -> Vec<ExprId> {
        let mut out = Vec::new();
        match self.expr(id) {
            Expr::Identifier(_)
            | Expr::FieldReference(_)
            | Expr::Literal(_)
            | Expr::LambdaArgument(_)
            | Expr::AllFields(_)
            | Expr::Exists(_)
            | Expr::Subquery(_) => {}
            Expr::Dereference { base, .. } => out.push(*base),
            Expr::Comparison { left, right, .. } | Expr::Arithmetic { left, right, .. } => {
                out.extend([*left, *right]);
            }
            Expr::ArithmeticUnary { value, .. }
            | Expr::Not(value)
            | Expr::IsNull(value)
            | Expr::IsNotNull(value)
            | Expr::InSubquery { value, .. }
            | Expr::Cast { expr: value, .. } => out.push(*value),
            Expr::Logical { terms, .. } => out.extend(terms),
            Expr::Between { value, low, high } => out.extend([*value, *low, *high]),
            Expr::Like {
                value,
                pattern,
                escape,
            } => {
                out.extend([*value, *pattern]);
                out.extend(escape);
            }
            Expr::InList { value, list } => {
                out.push(*value);
                out.extend(list);
            }
            Expr::SearchedCase { whens, default } => {
                for when in whens {
                    out.extend([when.operand, when.result]);
                }
                out.extend(default);
            }
            Expr::SimpleCase {
                operand,
                whens,
                default,
            } => {
                out.push(*operand);
                for when in whens {
                    out.extend([when.operand, when.result]);
                }
                out.extend(default);
            }
            Expr::If {
                condition,
                then,
                otherwise,
            } => {
                out.extend([*condition, *then]);
                out.extend(otherwise);
            }
            Expr::NullIf { first, second } => out.extend([*first, *second]),
            Expr::Coalesce(items) | Expr::Row(items) | Expr::Array(items) => out.extend(items),
            Expr::Subscript { base, index } => out.extend([*base, *index]),
            Expr::FunctionCall(call) => {
                out.extend(&call.arguments);
                out.extend(call.filter);
                out.extend(call.order_by.iter().map(|item| item.key));
                if let Some(WindowRef::Inline(spec)) = &call.window {
                    window_children(spec, &mut out);
                }
            }
            Expr::WindowOperation { window, .. } => {
                if let WindowRef::Inline(spec) = window {
                    window_children(spec, &mut out);
                }
            }
            Expr::Lambda { arguments, body } => {
                out.extend(arguments);
                out.push(*body);
            }
            Expr::Bind { values, function } => {
                out.extend(values);
                out.push(*function);
            }
        }
        out
    }

    /// Pre-order walk over `root` and its descendants, not entering subqueries.
    pub fn walk(&self, root: ExprId, f: &mut impl FnMut(ExprId, &Expr)) {
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            f(id, self.expr(id));
            let children = self.children(id);
            stack.extend(children.into_iter().rev());
        }
    }

    /// Finds the first node under `root` matching `predicate`.
    pub fn find(&self, root: ExprId, predicate: impl Fn(&Expr) -> bool) -> Option<ExprId> {
        let mut found = None;
        self.walk(root, &mut |id, expr| {
            if found.is_none() && predicate(expr) {
                found = Some(id);
            }
        });
        found
    }

    /// The dotted name spelled by an identifier or a chain of dereferences
    /// over identifiers.
    pub fn qualified_name(&self, id: ExprId) -> Option<QualifiedName> {
        let mut parts = Vec::new();
        let mut current = id;
        loop {
            match self.expr(current) {
                Expr::Identifier(ident) => {
                    parts.push(ident.clone());
                    parts.reverse();
                    return Some(QualifiedName::new(parts));
                }
                Expr::Dereference { base, field } => {
                    parts.push(field.clone());
                    current = *base;
                }
                _ => return None,
            }
        }
    }

    /// Integer value of a literal, treating unary minus on a literal as a
    /// negative literal.
    pub fn long_value(&self, id: ExprId) -> Option<i64> {
        match self.expr(id) {
            Expr::Literal(Literal::Long(value)) => Some(*value),
            Expr::ArithmeticUnary { sign, value } => {
                let inner = self.long_value(*value)?;
                match sign {
                    Sign::Plus => Some(inner),
                    Sign::Minus => inner.checked_neg(),
                }
            }
            _ => None,
        }
    }

    // Builder shorthands used by the lowering pass and tests.

    pub fn identifier(&mut self, name: &str) -> ExprId {
        self.add_expr(Expr::Identifier(Identifier::new(name)))
    }

    /// `a.b.c` as a dereference chain.
    pub fn column(&mut self, dotted: &str) -> ExprId {
        let mut parts = dotted.split('.');
        let first = parts.next().unwrap_or_default();
        let mut id = self.identifier(first);
        for part in parts {
            id = self.add_expr(Expr::Dereference {
                base: id,
                field: Identifier::new(part),
            });
        }
        id
    }

    pub fn long(&mut self, value: i64) -> ExprId {
        self.add_expr(Expr::Literal(Literal::Long(value)))
    }

    pub fn string(&mut self, value: &str) -> ExprId {
        self.add_expr(Expr::Literal(Literal::String(value.to_string())))
    }

    pub fn call(&mut self, name: &str, arguments: Vec<ExprId>) -> ExprId {
        self.add_expr(Expr::FunctionCall(FunctionCall::new(
            QualifiedName::parse(name),
            arguments,
        )))
    }

    pub fn lambda(&mut self, arguments: &[&str], body: impl FnOnce(&mut Self) -> ExprId) -> ExprId {
        let arguments = arguments
            .iter()
            .map(|name| self.add_expr(Expr::LambdaArgument(Identifier::new(*name))))
            .collect();
        let body = body(self);
        self.add_expr(Expr::Lambda { arguments, body })
    }
}

fn window_children(spec: &WindowSpecification, out: &mut Vec<ExprId>) {
    out.extend(&spec.partition_by);
    out.extend(spec.order_by.iter().map(|item| item.key));
    if let Some(frame) = &spec.frame {
        out.extend(frame.start.value);
        out.extend(frame.end.and_then(|end| end.value));
        out.extend(frame.measures.iter().map(|m| m.expression));
        out.extend(frame.variable_definitions.iter().map(|d| d.expression));
    }
}
