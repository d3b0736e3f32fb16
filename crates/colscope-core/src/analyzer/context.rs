use super::field::FieldId;
use super::scope::Scope;
use crate::ast::ExprId;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// Whether references to fields of enclosing queries are permitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrelationSupport {
    Allowed,
    Disallowed,
}

/// Immutable per-visit state threaded through expression analysis.
///
/// Derived contexts are created with the `with_*` methods; the original is
/// never modified, so sibling subtrees see the same state.
#[derive(Debug, Clone)]
pub struct Context {
    scope: Arc<Scope>,
    lambda_arguments: Option<Arc<HashMap<FieldId, ExprId>>>,
    labels: Option<Arc<BTreeSet<String>>>,
    correlation: CorrelationSupport,
}

impl Context {
    pub fn new(scope: Arc<Scope>) -> Self {
        Self {
            scope,
            lambda_arguments: None,
            labels: None,
            correlation: CorrelationSupport::Allowed,
        }
    }

    /// Context for a lambda body. The argument map covers the arguments of
    /// this lambda and of any enclosing one.
    pub fn in_lambda(&self, scope: Arc<Scope>, arguments: HashMap<FieldId, ExprId>) -> Self {
        Self {
            scope,
            lambda_arguments: Some(Arc::new(arguments)),
            ..self.clone()
        }
    }

    /// Pattern-recognition context: `labels` are the canonical names of all
    /// primary and union variables. Outer references are disallowed.
    pub fn with_labels(&self, labels: BTreeSet<String>) -> Self {
        Self {
            labels: Some(Arc::new(labels)),
            correlation: CorrelationSupport::Disallowed,
            ..self.clone()
        }
    }

    pub fn with_correlation(&self, correlation: CorrelationSupport) -> Self {
        Self {
            correlation,
            ..self.clone()
        }
    }

    pub fn scope(&self) -> &Arc<Scope> {
        &self.scope
    }

    pub fn is_in_lambda(&self) -> bool {
        self.lambda_arguments.is_some()
    }

    pub fn lambda_arguments(&self) -> Option<&HashMap<FieldId, ExprId>> {
        self.lambda_arguments.as_deref()
    }

    pub fn labels(&self) -> Option<&BTreeSet<String>> {
        self.labels.as_deref()
    }

    pub fn is_pattern_recognition(&self) -> bool {
        self.labels.is_some()
    }

    pub fn is_label(&self, canonical: &str) -> bool {
        self.labels
            .as_ref()
            .is_some_and(|labels| labels.contains(canonical))
    }

    pub fn correlation(&self) -> CorrelationSupport {
        self.correlation
    }
}
