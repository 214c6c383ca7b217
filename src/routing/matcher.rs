//! Flow selector matching.
//!
//! # Responsibilities
//! - Model the two selector kinds (HTTP method/path, boolean condition)
//! - Decide per kind whether a flow applies to the current request
//!
//! # Design Decisions
//! - Closed set of selector variants, one filter per kind
//! - A flow without a selector of a kind passes that kind's filter
//! - Empty method set = any method
//! - Condition errors exclude the flow (fail-closed) and are logged

use std::collections::HashSet;
use std::sync::Arc;

use axum::http::Method;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;

use crate::config::PathOperator;
use crate::context::ExecutionContext;
use crate::el::ExpressionEvaluator;
use crate::routing::flow::Flow;
use crate::routing::pattern::CompiledPattern;

/// Selector kinds. A flow holds at most one selector per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SelectorKind {
    Http,
    Condition,
}

impl SelectorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectorKind::Http => "http",
            SelectorKind::Condition => "condition",
        }
    }
}

/// A predicate gating whether a flow applies to a request.
#[derive(Debug, Clone)]
pub enum Selector {
    Http(HttpSelector),
    Condition(ConditionSelector),
}

impl Selector {
    pub fn kind(&self) -> SelectorKind {
        match self {
            Selector::Http(_) => SelectorKind::Http,
            Selector::Condition(_) => SelectorKind::Condition,
        }
    }
}

/// Matches the request method and path.
#[derive(Debug, Clone)]
pub struct HttpSelector {
    methods: HashSet<Method>,
    operator: PathOperator,
    pattern: Arc<CompiledPattern>,
}

impl HttpSelector {
    pub fn new(methods: HashSet<Method>, operator: PathOperator, pattern: Arc<CompiledPattern>) -> Self {
        Self {
            methods,
            operator,
            pattern,
        }
    }

    pub fn methods(&self) -> &HashSet<Method> {
        &self.methods
    }

    pub fn path(&self) -> &str {
        self.pattern.path()
    }

    pub fn operator(&self) -> PathOperator {
        self.operator
    }

    pub fn pattern(&self) -> &Arc<CompiledPattern> {
        &self.pattern
    }

    /// Returns true if the method is accepted and the path passes the pattern test.
    pub fn matches(&self, method: &Method, path_info: &str) -> bool {
        (self.methods.is_empty() || self.methods.contains(method))
            && self.pattern.matches(path_info, self.operator)
    }
}

/// Matches when a boolean expression evaluates to true.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionSelector {
    expression: String,
}

impl ConditionSelector {
    pub fn new(expression: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
        }
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }
}

/// Per-kind flow filter.
pub trait SelectorFilter: Send + Sync + std::fmt::Debug {
    /// Returns true if `flow` passes this filter for the request in `ctx`.
    fn filter<'a>(&'a self, ctx: &'a ExecutionContext, flow: &'a Flow) -> BoxFuture<'a, bool>;
}

/// Filters flows on their HTTP selector.
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpSelectorFilter;

impl SelectorFilter for HttpSelectorFilter {
    fn filter<'a>(&'a self, ctx: &'a ExecutionContext, flow: &'a Flow) -> BoxFuture<'a, bool> {
        let matched = flow.http_selector().map_or(true, |selector| {
            let request = ctx.request();
            selector.matches(request.method(), request.path_info())
        });
        futures_util::future::ready(matched).boxed()
    }
}

/// Filters flows on their condition selector.
#[derive(Debug, Clone)]
pub struct ConditionSelectorFilter {
    evaluator: Arc<dyn ExpressionEvaluator>,
}

impl ConditionSelectorFilter {
    pub fn new(evaluator: Arc<dyn ExpressionEvaluator>) -> Self {
        Self { evaluator }
    }
}

impl SelectorFilter for ConditionSelectorFilter {
    fn filter<'a>(&'a self, ctx: &'a ExecutionContext, flow: &'a Flow) -> BoxFuture<'a, bool> {
        async move {
            let Some(selector) = flow.condition_selector() else {
                return true;
            };
            match self.evaluator.eval_bool(selector.expression(), ctx).await {
                Ok(matched) => matched,
                Err(e) => {
                    tracing::warn!(
                        request_id = %ctx.request_id(),
                        flow = %flow.name(),
                        expression = %selector.expression(),
                        error = %e,
                        "Condition evaluation failed, flow excluded"
                    );
                    false
                }
            }
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::GatewayRequest;
    use crate::el::EvaluationError;
    use crate::routing::pattern::PathPatternCache;

    #[derive(Debug)]
    struct Fixed(Result<bool, EvaluationError>);

    impl ExpressionEvaluator for Fixed {
        fn eval_bool<'a>(
            &'a self,
            _expression: &'a str,
            _ctx: &'a ExecutionContext,
        ) -> BoxFuture<'a, Result<bool, EvaluationError>> {
            futures_util::future::ready(self.0.clone()).boxed()
        }
    }

    fn http_selector(methods: &[Method], path: &str, operator: PathOperator) -> HttpSelector {
        let cache = PathPatternCache::new();
        HttpSelector::new(
            methods.iter().cloned().collect(),
            operator,
            cache.get_or_create(path).unwrap(),
        )
    }

    fn context(method: Method, path: &str) -> ExecutionContext {
        ExecutionContext::new(GatewayRequest::new(method, path))
    }

    #[test]
    fn test_http_selector_equals() {
        let selector = http_selector(&[Method::GET], "/orders", PathOperator::Equals);
        assert!(selector.matches(&Method::GET, "/orders"));
        assert!(!selector.matches(&Method::GET, "/orders/1"));
        assert!(!selector.matches(&Method::POST, "/orders"));
    }

    #[test]
    fn test_http_selector_starts_with_any_method() {
        let selector = http_selector(&[], "/orders", PathOperator::StartsWith);
        assert!(selector.matches(&Method::GET, "/orders/1"));
        assert!(selector.matches(&Method::DELETE, "/orders"));
        assert!(!selector.matches(&Method::GET, "/customers"));
    }

    #[tokio::test]
    async fn test_http_filter() {
        let flow = Flow::new(
            "orders",
            vec![Selector::Http(http_selector(&[Method::GET], "/orders", PathOperator::Equals))],
        )
        .unwrap();
        let filter = HttpSelectorFilter;

        assert!(filter.filter(&context(Method::GET, "/orders"), &flow).await);
        assert!(!filter.filter(&context(Method::GET, "/orders/1"), &flow).await);
        assert!(!filter.filter(&context(Method::PUT, "/orders"), &flow).await);
    }

    #[tokio::test]
    async fn test_condition_filter_outcomes() {
        let flow = Flow::new(
            "gold",
            vec![Selector::Condition(ConditionSelector::new("{#tier == 'gold'}"))],
        )
        .unwrap();
        let ctx = context(Method::GET, "/");

        let accept = ConditionSelectorFilter::new(Arc::new(Fixed(Ok(true))));
        let reject = ConditionSelectorFilter::new(Arc::new(Fixed(Ok(false))));
        let broken = ConditionSelectorFilter::new(Arc::new(Fixed(Err(EvaluationError::NotBoolean {
            expression: "{#tier}".into(),
        }))));

        assert!(accept.filter(&ctx, &flow).await);
        assert!(!reject.filter(&ctx, &flow).await);
        assert!(!broken.filter(&ctx, &flow).await);
    }

    #[tokio::test]
    async fn test_flow_without_selectors_passes_every_filter() {
        let flow = Flow::new("catch-all", Vec::new()).unwrap();
        let ctx = context(Method::PATCH, "/anything");

        assert!(HttpSelectorFilter.filter(&ctx, &flow).await);
        let condition = ConditionSelectorFilter::new(Arc::new(Fixed(Ok(false))));
        assert!(condition.filter(&ctx, &flow).await);
    }
}
