//! Reusable compiled expressions
//!
//! `compile` runs the parser once; the resulting artifact holds the
//! immutable AST and can be evaluated any number of times, including
//! concurrently from multiple threads against disjoint contexts.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::ast::Expr;
use crate::context::Context;
use crate::error::Result;
use crate::eval::Evaluator;
use crate::value::Value;

/// A parsed expression, ready for repeated evaluation.
#[derive(Debug, Clone)]
pub struct CompiledExpression {
    source: String,
    root: Arc<Expr>,
}

impl CompiledExpression {
    pub(crate) fn new(source: impl Into<String>, root: Arc<Expr>) -> Self {
        Self {
            source: source.into(),
            root,
        }
    }

    /// The source text this expression was compiled from
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The parsed tree
    pub fn ast(&self) -> &Expr {
        &self.root
    }

    /// Evaluate against a context, sampling `now` from the wall clock.
    pub fn evaluate(&self, context: &Context) -> Result<Value> {
        Evaluator::new(context).eval(&self.root)
    }

    /// Evaluate with an explicit `now` instant.
    ///
    /// Every `$now`/`$today` and date window in the expression observes the
    /// given instant, which makes date logic deterministic under test.
    pub fn evaluate_at(&self, context: &Context, now: DateTime<Utc>) -> Result<Value> {
        Evaluator::with_now(context, now).eval(&self.root)
    }
}
