use super::{ExprId, Identifier, SortItem};
use crate::error::Location;
use serde::Serialize;

/// Window attached to a function call or measure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum WindowRef {
    /// `OVER (...)`
    Inline(WindowSpecification),
    /// `OVER w`
    Named(Identifier),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WindowSpecification {
    pub existing_window_name: Option<Identifier>,
    pub partition_by: Vec<ExprId>,
    pub order_by: Vec<SortItem>,
    pub frame: Option<WindowFrame>,
}

/// `WINDOW name AS (...)` entry of a SELECT.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NamedWindow {
    pub name: Identifier,
    pub specification: WindowSpecification,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FrameType {
    Rows,
    Range,
    Groups,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FrameBoundKind {
    UnboundedPreceding,
    Preceding,
    CurrentRow,
    Following,
    UnboundedFollowing,
}

impl FrameBoundKind {
    pub fn keyword(self) -> &'static str {
        match self {
            Self::UnboundedPreceding => "UNBOUNDED PRECEDING",
            Self::Preceding => "PRECEDING",
            Self::CurrentRow => "CURRENT ROW",
            Self::Following => "FOLLOWING",
            Self::UnboundedFollowing => "UNBOUNDED FOLLOWING",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FrameBound {
    pub kind: FrameBoundKind,
    /// Offset for `n PRECEDING` / `n FOLLOWING`.
    pub value: Option<ExprId>,
}

impl FrameBound {
    pub fn new(kind: FrameBoundKind) -> Self {
        Self { kind, value: None }
    }

    pub fn preceding(offset: ExprId) -> Self {
        Self {
            kind: FrameBoundKind::Preceding,
            value: Some(offset),
        }
    }

    pub fn following(offset: ExprId) -> Self {
        Self {
            kind: FrameBoundKind::Following,
            value: Some(offset),
        }
    }

    pub fn has_offset(&self) -> bool {
        matches!(
            self.kind,
            FrameBoundKind::Preceding | FrameBoundKind::Following
        )
    }
}

/// Frame clause, optionally carrying row pattern recognition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowFrame {
    pub frame_type: FrameType,
    pub start: FrameBound,
    /// `None` means `CURRENT ROW`.
    pub end: Option<FrameBound>,
    pub measures: Vec<MeasureDefinition>,
    pub after_match_skip: Option<SkipTo>,
    pub search_mode: Option<PatternSearchMode>,
    pub pattern: Option<RowPattern>,
    pub subsets: Vec<SubsetDefinition>,
    pub variable_definitions: Vec<VariableDefinition>,
    pub location: Option<Location>,
}

impl WindowFrame {
    pub fn new(frame_type: FrameType, start: FrameBound, end: Option<FrameBound>) -> Self {
        Self {
            frame_type,
            start,
            end,
            measures: Vec::new(),
            after_match_skip: None,
            search_mode: None,
            pattern: None,
            subsets: Vec::new(),
            variable_definitions: Vec::new(),
            location: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeasureDefinition {
    pub name: Identifier,
    pub expression: ExprId,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariableDefinition {
    pub name: Identifier,
    pub expression: ExprId,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubsetDefinition {
    pub name: Identifier,
    pub members: Vec<Identifier>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SkipTo {
    PastLastRow,
    NextRow,
    First(Identifier),
    Last(Identifier),
}

impl SkipTo {
    pub fn label(&self) -> Option<&Identifier> {
        match self {
            Self::First(label) | Self::Last(label) => Some(label),
            Self::PastLastRow | Self::NextRow => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PatternSearchMode {
    Initial,
    Seek,
}

impl PatternSearchMode {
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Initial => "INITIAL",
            Self::Seek => "SEEK",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Anchor {
    /// `^`
    PartitionStart,
    /// `$`
    PartitionEnd,
}

/// Row pattern syntax tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum RowPattern {
    Label(Identifier),
    Anchor(Anchor),
    Empty,
    Exclusion(Box<RowPattern>),
    Permutation(Vec<RowPattern>),
    Concatenation(Vec<RowPattern>),
    Alternation(Vec<RowPattern>),
    Quantified {
        pattern: Box<RowPattern>,
        quantifier: String,
    },
}

impl RowPattern {
    /// Pre-order traversal.
    pub fn walk<'p>(&'p self, f: &mut impl FnMut(&'p RowPattern)) {
        f(self);
        match self {
            Self::Exclusion(inner) | Self::Quantified { pattern: inner, .. } => inner.walk(f),
            Self::Permutation(items) | Self::Concatenation(items) | Self::Alternation(items) => {
                for item in items {
                    item.walk(f);
                }
            }
            Self::Label(_) | Self::Anchor(_) | Self::Empty => {}
        }
    }
}
