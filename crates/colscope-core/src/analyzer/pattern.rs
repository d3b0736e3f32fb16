//! Row pattern recognition: label bookkeeping and pattern function rules.

use super::context::Context;
use super::data_type::Type;
use super::expression::ExpressionAnalyzer;
use crate::ast::{
    Expr, ExprId, FunctionCall, MeasureDefinition, RowPattern, SkipTo, SubsetDefinition,
    VariableDefinition,
};
use crate::error::{ErrorKind, Result};
use indexmap::IndexSet;
use std::collections::BTreeSet;

const PATTERN_RECOGNITION_FUNCTIONS: [&str; 6] =
    ["first", "last", "prev", "next", "match_number", "classifier"];

/// True for `FIRST`, `LAST`, `PREV`, `NEXT`, `MATCH_NUMBER` and `CLASSIFIER`
/// written as a plain unquoted name.
pub fn is_pattern_recognition_function(call: &FunctionCall) -> bool {
    call.simple_name()
        .is_some_and(|name| PATTERN_RECOGNITION_FUNCTIONS.contains(&name.as_str()))
}

/// Labels declared by a pattern and its SUBSET clause, canonicalized.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatternAnalysis {
    pub primary_labels: IndexSet<String>,
    pub subset_labels: IndexSet<String>,
    pub all_labels: BTreeSet<String>,
}

/// Checks the label declarations of a MATCH_RECOGNIZE or window pattern.
pub fn analyze_pattern(
    subsets: &[SubsetDefinition],
    definitions: &[VariableDefinition],
    measures: &[MeasureDefinition],
    pattern: &RowPattern,
    skip_to: Option<&SkipTo>,
) -> Result<PatternAnalysis> {
    let mut primary_labels = IndexSet::new();
    pattern.walk(&mut |node| {
        if let RowPattern::Label(label) = node {
            primary_labels.insert(label.canonical());
        }
    });

    let mut subset_labels = IndexSet::new();
    for subset in subsets {
        let name = subset.name.canonical();
        if primary_labels.contains(&name) || !subset_labels.insert(name) {
            return Err(ErrorKind::DuplicatePatternLabel(subset.name.value.clone()).into());
        }
        for member in &subset.members {
            if !primary_labels.contains(&member.canonical()) {
                return Err(ErrorKind::UnknownPatternLabel(member.value.clone()).into());
            }
        }
    }

    let mut defined = IndexSet::new();
    for definition in definitions {
        let label = definition.name.canonical();
        if !primary_labels.contains(&label) {
            return Err(ErrorKind::UnknownPatternLabel(definition.name.value.clone()).into());
        }
        if !defined.insert(label) {
            return Err(ErrorKind::DuplicatePatternLabel(definition.name.value.clone()).into());
        }
    }

    let mut measure_names = IndexSet::new();
    for measure in measures {
        if !measure_names.insert(measure.name.canonical()) {
            return Err(ErrorKind::DuplicateMeasure(measure.name.value.clone()).into());
        }
    }

    if let Some(label) = skip_to.and_then(SkipTo::label) {
        let canonical = label.canonical();
        if !primary_labels.contains(&canonical) && !subset_labels.contains(&canonical) {
            return Err(ErrorKind::UnknownPatternLabel(label.value.clone()).into());
        }
    }

    let all_labels = primary_labels
        .iter()
        .chain(subset_labels.iter())
        .cloned()
        .collect();
    Ok(PatternAnalysis {
        primary_labels,
        subset_labels,
        all_labels,
    })
}

/// `^` and `$` are only meaningful in MATCH_RECOGNIZE partitions.
pub fn validate_no_pattern_anchors(pattern: &RowPattern) -> Result<()> {
    let mut anchored = false;
    pattern.walk(&mut |node| anchored |= matches!(node, RowPattern::Anchor(_)));
    if anchored {
        Err(ErrorKind::AnchorNotAllowedInWindowPattern.into())
    } else {
        Ok(())
    }
}

impl ExpressionAnalyzer<'_> {
    pub(super) fn analyze_pattern_recognition_function(
        &mut self,
        id: ExprId,
        call: &FunctionCall,
        context: &Context,
    ) -> Result<Type> {
        let name = call.simple_name().unwrap_or_default();
        let display = name.to_uppercase();

        if call.window.is_some() {
            return Err(ErrorKind::PatternFunctionCannotUseOver(display).into());
        }
        if call.filter.is_some() {
            return Err(ErrorKind::PatternFunctionCannotUseFilter(display).into());
        }
        if !call.order_by.is_empty() {
            return Err(ErrorKind::PatternFunctionCannotUseOrderBy(display).into());
        }
        if call.distinct {
            return Err(ErrorKind::PatternFunctionCannotUseDistinct(display).into());
        }
        if let Some(mode) = call.processing_mode {
            if name != "first" && name != "last" {
                return Err(ErrorKind::ProcessingModeNotAllowed {
                    mode: mode.keyword(),
                    function: display,
                }
                .into());
            }
        }

        let arguments = &call.arguments;
        let ty = match name.as_str() {
            "first" | "last" | "prev" | "next" => {
                if !(1..=2).contains(&arguments.len()) {
                    return Err(ErrorKind::InvalidArgumentCount {
                        function: display,
                        expected: "1 or 2",
                        actual: arguments.len(),
                    }
                    .into());
                }
                let ty = self.process(arguments[0], context)?;
                if let Some(&offset) = arguments.get(1) {
                    match self.ast.long_value(offset) {
                        Some(value) if value < 0 => {
                            return Err(ErrorKind::OffsetMustBeNonNegativeInteger(display)
                                .at(self.ast.location(offset)))
                        }
                        Some(value) if value > i64::from(i32::MAX) => {
                            return Err(ErrorKind::OffsetTooLarge(display)
                                .at(self.ast.location(offset)))
                        }
                        Some(_) => {}
                        None => {
                            return Err(ErrorKind::OffsetMustBeNonNegativeInteger(display)
                                .at(self.ast.location(offset)))
                        }
                    }
                    self.process(offset, context)?;
                }
                ty
            }
            "match_number" => {
                if !arguments.is_empty() {
                    return Err(ErrorKind::InvalidArgumentCount {
                        function: display,
                        expected: "0",
                        actual: arguments.len(),
                    }
                    .into());
                }
                Type::Bigint
            }
            _ => {
                if arguments.len() > 1 {
                    return Err(ErrorKind::InvalidArgumentCount {
                        function: display,
                        expected: "0 or 1",
                        actual: arguments.len(),
                    }
                    .into());
                }
                if let Some(&argument) = arguments.first() {
                    let Expr::Identifier(label) = self.ast.expr(argument) else {
                        return Err(
                            ErrorKind::InvalidClassifierArgument.at(self.ast.location(argument))
                        );
                    };
                    if !context.is_label(&label.canonical()) {
                        return Err(ErrorKind::UnknownPatternLabel(label.value.clone())
                            .at(self.ast.location(argument)));
                    }
                }
                Type::Varchar
            }
        };

        self.analysis.add_pattern_recognition_function(id);
        Ok(ty)
    }
}
