//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Reject selectors that cannot be compiled at request time
//! - Validate value ranges (weights, window sizes, durations)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: config → Result<(), Vec<ValidationError>>
//! - Runs before a definition is deployed

use std::collections::HashSet;

use thiserror::Error;

use crate::config::schema::{ApiDefinition, GatewayConfig, SelectorConfig};

/// A single semantic problem in a definition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("api id must not be empty")]
    EmptyApiId,

    #[error("api '{0}' is declared more than once")]
    DuplicateApi(String),

    #[error("api '{api}': endpoint '{endpoint}' is declared more than once")]
    DuplicateEndpoint { api: String, endpoint: String },

    #[error("api '{api}': endpoint '{endpoint}' has weight 0 with a weighted load balancer")]
    ZeroWeight { api: String, endpoint: String },

    #[error("api '{api}': flow '{flow}' has a path '{path}' not starting with '/'")]
    InvalidPath { api: String, flow: String, path: String },

    #[error("api '{api}': flow '{flow}' has an unknown method '{method}'")]
    InvalidMethod { api: String, flow: String, method: String },

    #[error("api '{api}': flow '{flow}' has an empty condition")]
    EmptyCondition { api: String, flow: String },

    #[error("api '{api}': flow '{flow}' declares more than one {kind} selector")]
    DuplicateSelector { api: String, flow: String, kind: &'static str },

    #[error("api '{0}': failover max_failures must be greater than 0")]
    ZeroMaxFailures(String),

    #[error("api '{0}': failover slow_call_duration_ms must be greater than 0")]
    ZeroSlowCallDuration(String),
}

/// Validate every API of a gateway configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let mut ids = HashSet::new();

    for api in &config.apis {
        if !api.id.is_empty() && !ids.insert(api.id.as_str()) {
            errors.push(ValidationError::DuplicateApi(api.id.clone()));
        }
        collect_api_errors(api, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate a single API definition.
pub fn validate_api(api: &ApiDefinition) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    collect_api_errors(api, &mut errors);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn collect_api_errors(api: &ApiDefinition, errors: &mut Vec<ValidationError>) {
    if api.id.is_empty() {
        errors.push(ValidationError::EmptyApiId);
    }

    let mut names = HashSet::new();
    for endpoint in api.endpoint_groups.iter().flat_map(|g| g.endpoints.iter()) {
        if !names.insert(endpoint.name.as_str()) {
            errors.push(ValidationError::DuplicateEndpoint {
                api: api.id.clone(),
                endpoint: endpoint.name.clone(),
            });
        }
        if endpoint.weight == 0 && api.load_balancer.is_weighted() {
            errors.push(ValidationError::ZeroWeight {
                api: api.id.clone(),
                endpoint: endpoint.name.clone(),
            });
        }
    }

    for flow in &api.flows {
        let mut http = 0;
        let mut condition = 0;
        for selector in &flow.selectors {
            match selector {
                SelectorConfig::Http { methods, path, .. } => {
                    http += 1;
                    if !path.starts_with('/') {
                        errors.push(ValidationError::InvalidPath {
                            api: api.id.clone(),
                            flow: flow.name.clone(),
                            path: path.clone(),
                        });
                    }
                    for method in methods {
                        if axum::http::Method::from_bytes(method.as_bytes()).is_err() {
                            errors.push(ValidationError::InvalidMethod {
                                api: api.id.clone(),
                                flow: flow.name.clone(),
                                method: method.clone(),
                            });
                        }
                    }
                }
                SelectorConfig::Condition { condition: expr } => {
                    condition += 1;
                    if expr.trim().is_empty() {
                        errors.push(ValidationError::EmptyCondition {
                            api: api.id.clone(),
                            flow: flow.name.clone(),
                        });
                    }
                }
            }
        }
        for (count, kind) in [(http, "http"), (condition, "condition")] {
            if count > 1 {
                errors.push(ValidationError::DuplicateSelector {
                    api: api.id.clone(),
                    flow: flow.name.clone(),
                    kind,
                });
            }
        }
    }

    if let Some(failover) = &api.failover {
        if failover.max_failures == 0 {
            errors.push(ValidationError::ZeroMaxFailures(api.id.clone()));
        }
        if failover.slow_call_duration_ms == 0 {
            errors.push(ValidationError::ZeroSlowCallDuration(api.id.clone()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{
        EndpointConfig, EndpointGroupConfig, FailoverConfig, FlowConfig, LoadBalancerType,
        PathOperator,
    };

    fn endpoint(name: &str, weight: u32) -> EndpointConfig {
        EndpointConfig {
            name: name.into(),
            target: "http://localhost:3000".into(),
            weight,
            backup: false,
            tenants: vec![],
        }
    }

    fn api() -> ApiDefinition {
        ApiDefinition {
            id: "api-1".into(),
            endpoint_groups: vec![EndpointGroupConfig {
                name: "default".into(),
                endpoints: vec![endpoint("a", 1), endpoint("b", 2)],
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_api() {
        assert!(validate_api(&api()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut api = api();
        api.load_balancer = LoadBalancerType::WeightedRoundRobin;
        api.endpoint_groups[0].endpoints.push(endpoint("a", 0));
        api.failover = Some(FailoverConfig {
            max_failures: 0,
            ..Default::default()
        });
        api.flows.push(FlowConfig {
            name: "f".into(),
            enabled: true,
            selectors: vec![
                SelectorConfig::Http {
                    methods: vec!["GET".into()],
                    path: "orders".into(),
                    operator: PathOperator::Equals,
                },
                SelectorConfig::Http {
                    methods: vec![],
                    path: "/".into(),
                    operator: PathOperator::StartsWith,
                },
                SelectorConfig::Condition {
                    condition: "  ".into(),
                },
            ],
            request: vec![],
            response: vec![],
        });

        let errors = validate_api(&api).unwrap_err();
        assert!(errors.contains(&ValidationError::DuplicateEndpoint {
            api: "api-1".into(),
            endpoint: "a".into()
        }));
        assert!(errors.contains(&ValidationError::ZeroWeight {
            api: "api-1".into(),
            endpoint: "a".into()
        }));
        assert!(errors.contains(&ValidationError::ZeroMaxFailures("api-1".into())));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::InvalidPath { .. })));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::EmptyCondition { .. })));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::DuplicateSelector { kind: "http", .. })));
    }

    #[test]
    fn test_duplicate_api_ids() {
        let config = GatewayConfig {
            apis: vec![api(), api()],
            ..Default::default()
        };
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors, vec![ValidationError::DuplicateApi("api-1".into())]);
    }
}
