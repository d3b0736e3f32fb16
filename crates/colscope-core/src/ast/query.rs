use super::{
    ExprId, Identifier, MeasureDefinition, NamedWindow, QualifiedName, QueryId, RelationRef,
    RowPattern, SkipTo, SortItem, SubsetDefinition, VariableDefinition,
};
use serde::Serialize;

/// Top-level statements the analyzer understands.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Statement {
    Query(QueryId),
    Insert {
        target: QualifiedName,
        columns: Vec<Identifier>,
        query: QueryId,
    },
    CreateView {
        name: QualifiedName,
        columns: Vec<Identifier>,
        query: QueryId,
        replace: bool,
    },
    CreateTableAsSelect {
        name: QualifiedName,
        columns: Vec<Identifier>,
        query: QueryId,
    },
}

impl Statement {
    pub fn query(&self) -> QueryId {
        match self {
            Self::Query(query)
            | Self::Insert { query, .. }
            | Self::CreateView { query, .. }
            | Self::CreateTableAsSelect { query, .. } => *query,
        }
    }

    /// Statement type label reported in lineage output.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Query(_) => "SELECT",
            Self::Insert { .. } => "INSERT",
            Self::CreateView { .. } => "CREATE_VIEW",
            Self::CreateTableAsSelect { .. } => "CREATE_TABLE_AS",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Query {
    pub with: Vec<WithQuery>,
    pub body: QueryBody,
    pub order_by: Vec<SortItem>,
}

impl Query {
    pub fn new(body: QueryBody) -> Self {
        Self {
            with: Vec::new(),
            body,
            order_by: Vec::new(),
        }
    }
}

/// One CTE.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WithQuery {
    pub name: Identifier,
    pub column_names: Vec<Identifier>,
    pub query: QueryId,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum QueryBody {
    Select(Box<Select>),
    /// Parenthesized query used as a set operation operand.
    Query(QueryId),
    SetOperation {
        op: SetOperator,
        all: bool,
        left: Box<QueryBody>,
        right: Box<QueryBody>,
    },
    /// Each row is either a single expression or an [`super::Expr::Row`].
    Values(Vec<ExprId>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SetOperator {
    Union,
    Intersect,
    Except,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Select {
    pub distinct: bool,
    pub items: Vec<SelectItem>,
    /// Comma-separated FROM entries, joined implicitly.
    pub from: Vec<RelationRef>,
    pub selection: Option<ExprId>,
    pub group_by: Vec<ExprId>,
    pub having: Option<ExprId>,
    pub windows: Vec<NamedWindow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SelectItem {
    Expression {
        expr: ExprId,
        alias: Option<Identifier>,
    },
    /// `*`
    AllColumns,
    /// `t.*`
    QualifiedAllColumns(QualifiedName),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableAlias {
    pub name: Identifier,
    pub columns: Vec<Identifier>,
}

impl TableAlias {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Identifier::new(name),
            columns: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Full,
    Cross,
}

/// FROM-clause items.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Relation {
    Table {
        name: QualifiedName,
        alias: Option<TableAlias>,
    },
    Derived {
        query: QueryId,
        alias: Option<TableAlias>,
    },
    Join {
        kind: JoinKind,
        left: RelationRef,
        right: RelationRef,
        criteria: Option<ExprId>,
    },
    MatchRecognize(Box<MatchRecognize>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RowsPerMatch {
    One,
    All,
}

/// `input MATCH_RECOGNIZE (...)`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchRecognize {
    pub input: RelationRef,
    pub partition_by: Vec<ExprId>,
    pub order_by: Vec<SortItem>,
    pub measures: Vec<MeasureDefinition>,
    pub rows_per_match: RowsPerMatch,
    pub after_match_skip: Option<SkipTo>,
    pub pattern: RowPattern,
    pub subsets: Vec<SubsetDefinition>,
    pub variable_definitions: Vec<VariableDefinition>,
    pub alias: Option<TableAlias>,
}
