//! Expression evaluator interface.
//!
//! The expression language runtime lives outside the dispatch core. Condition
//! selectors consume it through [`ExpressionEvaluator`].

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use thiserror::Error;

use crate::context::ExecutionContext;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvaluationError {
    #[error("expression '{expression}' is invalid: {reason}")]
    Invalid { expression: String, reason: String },

    #[error("expression '{expression}' did not evaluate to a boolean")]
    NotBoolean { expression: String },

    #[error("expression evaluation is disabled")]
    Disabled,
}

/// Evaluates boolean expressions against a request context.
pub trait ExpressionEvaluator: Send + Sync + std::fmt::Debug {
    fn eval_bool<'a>(
        &'a self,
        expression: &'a str,
        ctx: &'a ExecutionContext,
    ) -> BoxFuture<'a, Result<bool, EvaluationError>>;
}

/// Evaluator for deployments without an expression runtime. Every
/// evaluation errors, so condition selectors never match.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledEvaluator;

impl ExpressionEvaluator for DisabledEvaluator {
    fn eval_bool<'a>(
        &'a self,
        _expression: &'a str,
        _ctx: &'a ExecutionContext,
    ) -> BoxFuture<'a, Result<bool, EvaluationError>> {
        async { Err(EvaluationError::Disabled) }.boxed()
    }
}
