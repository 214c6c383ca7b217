//! Flow resolution.
//!
//! # Responsibilities
//! - Run every selector filter over the API's flows
//! - Return the flows that pass all filters, in declaration order
//!
//! # Design Decisions
//! - Flow lists are immutable after deployment (shared without locks)
//! - Cheap HTTP filter runs before the condition filter
//! - No match is an empty list, not an error

use std::sync::Arc;

use crate::context::ExecutionContext;
use crate::el::ExpressionEvaluator;
use crate::observability::metrics;
use crate::routing::flow::Flow;
use crate::routing::matcher::{ConditionSelectorFilter, HttpSelectorFilter, SelectorFilter};

#[derive(Debug)]
pub struct FlowResolver {
    filters: Vec<Box<dyn SelectorFilter>>,
}

impl FlowResolver {
    /// Resolver with the HTTP filter followed by the condition filter.
    pub fn new(evaluator: Arc<dyn ExpressionEvaluator>) -> Self {
        Self::with_filters(vec![
            Box::new(HttpSelectorFilter),
            Box::new(ConditionSelectorFilter::new(evaluator)),
        ])
    }

    pub fn with_filters(filters: Vec<Box<dyn SelectorFilter>>) -> Self {
        Self { filters }
    }

    /// Flows applying to the request, in the order of `flows`.
    pub async fn resolve(&self, ctx: &ExecutionContext, flows: &[Arc<Flow>]) -> Vec<Arc<Flow>> {
        if ctx.is_interrupted() {
            return Vec::new();
        }

        let mut resolved = Vec::new();
        for flow in flows {
            if flow.is_enabled() && self.accepts(ctx, flow).await {
                resolved.push(flow.clone());
            }
        }

        tracing::debug!(
            request_id = %ctx.request_id(),
            candidates = flows.len(),
            resolved = resolved.len(),
            "Flows resolved"
        );
        metrics::record_flows_resolved(resolved.len());
        resolved
    }

    async fn accepts(&self, ctx: &ExecutionContext, flow: &Flow) -> bool {
        for filter in &self.filters {
            if !filter.filter(ctx, flow).await {
                tracing::trace!(request_id = %ctx.request_id(), flow = %flow.name(), "Flow excluded");
                return false;
            }
        }
        true
    }
}
