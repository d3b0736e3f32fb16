//! Window specification and frame legality.

use super::analysis::ResolvedWindow;
use super::context::Context;
use super::data_type::Type;
use super::expression::ExpressionAnalyzer;
use super::pattern::{analyze_pattern, validate_no_pattern_anchors};
use crate::ast::{Expr, ExprId, FrameBoundKind, FrameType, Identifier, SortItem, WindowFrame};
use crate::error::{ErrorKind, Result};

impl ExpressionAnalyzer<'_> {
    /// `measure OVER w`: the measure must be defined exactly once in the
    /// frame of the resolved window.
    pub(super) fn visit_window_operation(
        &mut self,
        id: ExprId,
        name: &Identifier,
        context: &Context,
    ) -> Result<Type> {
        let window = self
            .analysis
            .window(id)
            .cloned()
            .ok_or(ErrorKind::UnresolvedWindow)?;
        let Some(frame) = &window.frame else {
            return Err(ErrorKind::MeasureNotFound(name.value.clone()).into());
        };
        let mut matching = frame.measures.iter().filter(|m| m.name == *name);
        let measure = match (matching.next(), matching.next()) {
            (Some(measure), None) => measure.expression,
            (Some(_), Some(_)) => {
                return Err(ErrorKind::AmbiguousMeasure(name.value.clone()).into())
            }
            (None, _) => return Err(ErrorKind::MeasureNotFound(name.value.clone()).into()),
        };

        self.analyze_window(&window, context)?;
        self.analysis.add_window_measure(id);
        Ok(self
            .expression_types
            .get(&measure)
            .or_else(|| self.analysis.get_type(measure))
            .cloned()
            .unwrap_or(Type::Unknown))
    }

    /// Validates a resolved window and analyzes the expressions it owns.
    ///
    /// Parts inherited from a named window were analyzed where the named
    /// window was defined; only the fields they read are carried over.
    pub fn analyze_window(&mut self, window: &ResolvedWindow, context: &Context) -> Result<()> {
        self.check_no_nested_windows(window)?;
        self.source_fields
            .extend_from_slice(&window.inherited_fields);

        if !window.partition_by_inherited {
            for &expr in &window.partition_by {
                let ty = self.process(expr, context)?;
                if !ty.is_comparable() {
                    return Err(ErrorKind::NotComparable {
                        ty: ty.to_string(),
                        clause: "window function PARTITION BY",
                    }
                    .at(self.ast.location(expr)));
                }
            }
        }
        let own_order: &[SortItem] = if window.order_by_inherited {
            &[]
        } else {
            &window.order_by
        };
        for item in own_order {
            let ty = self.process(item.key, context)?;
            if !ty.is_orderable() {
                return Err(ErrorKind::NotOrderable {
                    ty: ty.to_string(),
                    clause: "window function ORDER BY",
                }
                .at(self.ast.location(item.key)));
            }
        }

        match &window.frame {
            Some(frame) if !window.frame_inherited => self
                .analyze_frame(frame, window, context)
                .map_err(|e| e.at(frame.location)),
            _ => Ok(()),
        }
    }

    fn analyze_frame(
        &mut self,
        frame: &WindowFrame,
        window: &ResolvedWindow,
        context: &Context,
    ) -> Result<()> {
        let start = frame.start.kind;
        let end = frame.end.map_or(FrameBoundKind::CurrentRow, |end| end.kind);

        if let Some(pattern) = &frame.pattern {
            if frame.variable_definitions.is_empty() {
                return Err(ErrorKind::PatternRequiresDefine.into());
            }
            if frame.frame_type != FrameType::Rows {
                return Err(ErrorKind::PatternRequiresRows.into());
            }
            if start != FrameBoundKind::CurrentRow || frame.end.is_none() {
                return Err(ErrorKind::PatternRequiresCurrentRowStart.into());
            }
            let labels = analyze_pattern(
                &frame.subsets,
                &frame.variable_definitions,
                &frame.measures,
                pattern,
                frame.after_match_skip.as_ref(),
            )?
            .all_labels;
            validate_no_pattern_anchors(pattern)?;

            let pattern_context = context.with_labels(labels);
            for definition in &frame.variable_definitions {
                self.process(definition.expression, &pattern_context)?;
            }
            for measure in &frame.measures {
                self.process(measure.expression, &pattern_context)?;
            }
            self.check_no_match_number(frame)?;
        } else {
            if !frame.measures.is_empty() {
                return Err(ErrorKind::MeasuresRequirePattern.into());
            }
            if frame.after_match_skip.is_some() {
                return Err(ErrorKind::AfterMatchSkipRequiresPattern.into());
            }
            if let Some(mode) = frame.search_mode {
                return Err(ErrorKind::SearchModeRequiresPattern(mode.keyword()).into());
            }
            if !frame.subsets.is_empty() {
                return Err(ErrorKind::SubsetsRequirePattern.into());
            }
            if !frame.variable_definitions.is_empty() {
                return Err(ErrorKind::DefinitionsRequirePattern.into());
            }
        }

        check_frame_bounds(start, end)?;

        let offsets = [frame.start.value, frame.end.and_then(|end| end.value)];
        for offset in offsets.into_iter().flatten() {
            match frame.frame_type {
                FrameType::Rows => {}
                FrameType::Range => {
                    if window.order_by.is_empty() {
                        return Err(ErrorKind::RangeRequiresOrderBy.into());
                    }
                    if window.order_by.len() != 1 {
                        return Err(
                            ErrorKind::RangeRequiresSingleSortKey(window.order_by.len()).into()
                        );
                    }
                }
                FrameType::Groups => {
                    if window.order_by.is_empty() {
                        return Err(ErrorKind::GroupsRequiresOrderBy.into());
                    }
                }
            }
            self.process(offset, context)?;
        }
        Ok(())
    }

    fn check_no_nested_windows(&self, window: &ResolvedWindow) -> Result<()> {
        let mut roots: Vec<ExprId> = Vec::new();
        if !window.partition_by_inherited {
            roots.extend(&window.partition_by);
        }
        if !window.order_by_inherited {
            roots.extend(window.order_by.iter().map(|item| item.key));
        }
        if let Some(frame) = window.frame.as_ref().filter(|_| !window.frame_inherited) {
            roots.extend(frame.start.value);
            roots.extend(frame.end.and_then(|end| end.value));
            roots.extend(frame.measures.iter().map(|m| m.expression));
            roots.extend(frame.variable_definitions.iter().map(|d| d.expression));
        }

        for root in roots {
            let nested = self.ast.find(root, |expr| match expr {
                Expr::FunctionCall(call) => call.window.is_some(),
                Expr::WindowOperation { .. } => true,
                _ => false,
            });
            if let Some(nested) = nested {
                return Err(ErrorKind::NestedWindowNotAllowed.at(self.ast.location(nested)));
            }
        }
        Ok(())
    }

    /// Runs after MEASURES and DEFINE are analyzed so pattern functions are
    /// already recorded.
    fn check_no_match_number(&self, frame: &WindowFrame) -> Result<()> {
        let roots = frame
            .measures
            .iter()
            .map(|m| m.expression)
            .chain(frame.variable_definitions.iter().map(|d| d.expression));
        for root in roots {
            let mut found = None;
            self.ast.walk(root, &mut |id, expr| {
                if found.is_some() || !self.analysis.is_pattern_recognition_function(id) {
                    return;
                }
                if let Expr::FunctionCall(call) = expr {
                    if call.simple_name().as_deref() == Some("match_number") {
                        found = Some(id);
                    }
                }
            });
            if let Some(id) = found {
                return Err(ErrorKind::MatchNumberNotAllowedInWindow.at(self.ast.location(id)));
            }
        }
        Ok(())
    }
}

fn check_frame_bounds(start: FrameBoundKind, end: FrameBoundKind) -> Result<()> {
    use crate::ast::FrameBoundKind::*;

    if start == UnboundedFollowing {
        return Err(ErrorKind::InvalidFrameStart.into());
    }
    if end == UnboundedPreceding {
        return Err(ErrorKind::InvalidFrameEnd.into());
    }
    match (start, end) {
        (CurrentRow, Preceding) | (Following, Preceding) | (Following, CurrentRow) => {
            Err(ErrorKind::InvalidFrameBounds {
                start: start.keyword(),
                end: end.keyword(),
            }
            .into())
        }
        _ => Ok(()),
    }
}
