//! Flow model.
//!
//! A flow is built once at deployment from its definition and never mutated.
//! Redeploying an API replaces its flows wholesale.

use std::collections::HashSet;

use axum::http::Method;

use crate::config::{FlowConfig, SelectorConfig, StepConfig};
use crate::error::DispatchError;
use crate::routing::matcher::{ConditionSelector, HttpSelector, Selector};
use crate::routing::pattern::PathPatternCache;

/// A named bundle of policy steps bound to selectors.
#[derive(Debug, Clone)]
pub struct Flow {
    name: String,
    enabled: bool,
    selectors: Vec<Selector>,
    request: Vec<StepConfig>,
    response: Vec<StepConfig>,
}

impl Flow {
    /// Create an enabled flow without policy steps.
    pub fn new(name: impl Into<String>, selectors: Vec<Selector>) -> Result<Self, DispatchError> {
        let name = name.into();
        let mut seen = HashSet::new();
        for selector in &selectors {
            if !seen.insert(selector.kind()) {
                return Err(DispatchError::DuplicateSelector {
                    flow: name,
                    kind: selector.kind().as_str(),
                });
            }
        }

        Ok(Self {
            name,
            enabled: true,
            selectors,
            request: Vec::new(),
            response: Vec::new(),
        })
    }

    /// Build a flow from its definition, compiling path patterns through `patterns`.
    pub fn from_config(config: &FlowConfig, patterns: &PathPatternCache) -> Result<Self, DispatchError> {
        let selectors = config
            .selectors
            .iter()
            .map(|selector| match selector {
                SelectorConfig::Http {
                    methods,
                    path,
                    operator,
                } => {
                    let methods = methods
                        .iter()
                        .map(|m| {
                            Method::from_bytes(m.to_ascii_uppercase().as_bytes()).map_err(|_| {
                                DispatchError::InvalidMethod {
                                    flow: config.name.clone(),
                                    method: m.clone(),
                                }
                            })
                        })
                        .collect::<Result<HashSet<_>, _>>()?;
                    let pattern = patterns.get_or_create(path)?;
                    Ok(Selector::Http(HttpSelector::new(methods, *operator, pattern)))
                }
                SelectorConfig::Condition { condition } => {
                    Ok(Selector::Condition(ConditionSelector::new(condition.clone())))
                }
            })
            .collect::<Result<Vec<_>, DispatchError>>()?;

        let mut flow = Self::new(config.name.clone(), selectors)?;
        flow.enabled = config.enabled;
        flow.request = config.request.clone();
        flow.response = config.response.clone();
        Ok(flow)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn selectors(&self) -> &[Selector] {
        &self.selectors
    }

    pub fn http_selector(&self) -> Option<&HttpSelector> {
        self.selectors.iter().find_map(|s| match s {
            Selector::Http(http) => Some(http),
            _ => None,
        })
    }

    pub fn condition_selector(&self) -> Option<&ConditionSelector> {
        self.selectors.iter().find_map(|s| match s {
            Selector::Condition(condition) => Some(condition),
            _ => None,
        })
    }

    /// Request-phase policy steps, opaque to dispatch.
    pub fn request_steps(&self) -> &[StepConfig] {
        &self.request
    }

    /// Response-phase policy steps, opaque to dispatch.
    pub fn response_steps(&self) -> &[StepConfig] {
        &self.response
    }
}
