//! Routing subsystem: flow resolution.
//!
//! # Data Flow
//! ```text
//! Deployment:
//!     FlowConfig[]
//!     → flow.rs (build flows, compile selector paths via pattern.rs)
//!     → Freeze as immutable Vec<Arc<Flow>>
//!
//! Per request:
//!     ExecutionContext (method, path-info, attributes)
//!     → router.rs (walk flows in declaration order)
//!     → matcher.rs (HTTP filter, then condition filter)
//!     → Return: matching flows, possibly empty
//! ```
//!
//! # Design Decisions
//! - Patterns compiled at deploy time, shared between flows
//! - Deterministic: same input always resolves the same flows
//! - Every selector kind present on a flow must match (AND)

pub mod flow;
pub mod matcher;
pub mod pattern;
pub mod router;

pub use flow::Flow;
pub use matcher::{
    ConditionSelector, ConditionSelectorFilter, HttpSelector, HttpSelectorFilter, Selector,
    SelectorFilter, SelectorKind,
};
pub use pattern::{CompiledPattern, PathPatternCache};
pub use router::FlowResolver;
