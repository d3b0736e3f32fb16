use super::{ExprId, Identifier, QualifiedName, QueryId, WindowRef};
use serde::Serialize;

/// Expression node kinds.
///
/// Negated predicates (`NOT IN`, `NOT LIKE`, `NOT BETWEEN`, `NOT EXISTS`) are
/// represented as [`Expr::Not`] around the positive form.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Expr {
    Identifier(Identifier),
    /// `base.field`, either a qualified column reference or a row field access.
    Dereference {
        base: ExprId,
        field: Identifier,
    },
    /// Positional reference into the current scope's relation, produced by
    /// rewrites rather than by the parser.
    FieldReference(usize),
    Literal(Literal),
    Comparison {
        op: ComparisonOperator,
        left: ExprId,
        right: ExprId,
    },
    Arithmetic {
        op: ArithmeticOperator,
        left: ExprId,
        right: ExprId,
    },
    ArithmeticUnary {
        sign: Sign,
        value: ExprId,
    },
    Logical {
        op: LogicalOperator,
        terms: Vec<ExprId>,
    },
    Not(ExprId),
    IsNull(ExprId),
    IsNotNull(ExprId),
    Between {
        value: ExprId,
        low: ExprId,
        high: ExprId,
    },
    Like {
        value: ExprId,
        pattern: ExprId,
        escape: Option<ExprId>,
    },
    InList {
        value: ExprId,
        list: Vec<ExprId>,
    },
    InSubquery {
        value: ExprId,
        subquery: QueryId,
    },
    Exists(QueryId),
    Subquery(QueryId),
    Cast {
        expr: ExprId,
        type_name: String,
    },
    SearchedCase {
        whens: Vec<WhenClause>,
        default: Option<ExprId>,
    },
    SimpleCase {
        operand: ExprId,
        whens: Vec<WhenClause>,
        default: Option<ExprId>,
    },
    If {
        condition: ExprId,
        then: ExprId,
        otherwise: Option<ExprId>,
    },
    NullIf {
        first: ExprId,
        second: ExprId,
    },
    Coalesce(Vec<ExprId>),
    Row(Vec<ExprId>),
    Array(Vec<ExprId>),
    Subscript {
        base: ExprId,
        index: ExprId,
    },
    FunctionCall(FunctionCall),
    /// A row pattern measure evaluated over a window: `measure OVER w`.
    WindowOperation {
        name: Identifier,
        window: WindowRef,
    },
    /// `(x, y) -> body`. Arguments are [`Expr::LambdaArgument`] declarations.
    Lambda {
        arguments: Vec<ExprId>,
        body: ExprId,
    },
    LambdaArgument(Identifier),
    /// Partially applies `function` to `values`.
    Bind {
        values: Vec<ExprId>,
        function: ExprId,
    },
    /// `prefix.*` used as an expression, e.g. `count(A.*)`.
    AllFields(QualifiedName),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Literal {
    Long(i64),
    /// Kept as source text; the analyzer only needs the type.
    Double(String),
    Decimal(String),
    String(String),
    Boolean(bool),
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ComparisonOperator {
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    IsDistinctFrom,
    IsNotDistinctFrom,
}

impl ComparisonOperator {
    /// Ordering comparisons need orderable operands, the rest comparable ones.
    pub fn requires_order(self) -> bool {
        matches!(
            self,
            Self::LessThan | Self::LessThanOrEqual | Self::GreaterThan | Self::GreaterThanOrEqual
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ArithmeticOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Sign {
    Plus,
    Minus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LogicalOperator {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WhenClause {
    pub operand: ExprId,
    pub result: ExprId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SortItem {
    pub key: ExprId,
    pub descending: bool,
}

impl SortItem {
    pub fn new(key: ExprId) -> Self {
        Self {
            key,
            descending: false,
        }
    }
}

/// `RUNNING` / `FINAL` semantics on `FIRST` and `LAST`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProcessingMode {
    Running,
    Final,
}

impl ProcessingMode {
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Running => "RUNNING",
            Self::Final => "FINAL",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionCall {
    pub name: QualifiedName,
    pub arguments: Vec<ExprId>,
    pub distinct: bool,
    pub filter: Option<ExprId>,
    pub order_by: Vec<SortItem>,
    pub window: Option<WindowRef>,
    pub processing_mode: Option<ProcessingMode>,
}

impl FunctionCall {
    pub fn new(name: QualifiedName, arguments: Vec<ExprId>) -> Self {
        Self {
            name,
            arguments,
            distinct: false,
            filter: None,
            order_by: Vec::new(),
            window: None,
            processing_mode: None,
        }
    }

    /// Lower-cased name when the call is an unqualified, unquoted identifier.
    pub fn simple_name(&self) -> Option<String> {
        match self.name.parts() {
            [only] if !only.delimited => Some(only.value.to_lowercase()),
            _ => None,
        }
    }
}
