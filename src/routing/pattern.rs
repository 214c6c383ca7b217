//! Path pattern compilation and cache.
//!
//! # Responsibilities
//! - Compile selector paths into anchored regexes
//! - Memoize compiled patterns by their literal path string
//!
//! # Pattern Syntax
//! ```text
//! /orders/:id/items    `:id` matches one non-empty segment
//! /orders//items       repeated slashes collapse to one
//! /orders/             trailing slash optional on both sides
//! ```
//!
//! # Design Decisions
//! - Compiled at deploy time; a malformed path fails the deployment
//! - Prefix matches end on a segment boundary (`/orders` does not match `/ordersX`)
//! - At most one compilation per path string, even under concurrent lookups

use std::sync::Arc;

use dashmap::DashMap;
use regex::Regex;

use crate::config::PathOperator;
use crate::error::DispatchError;

/// A selector path compiled for both operators.
#[derive(Debug)]
pub struct CompiledPattern {
    path: String,
    exact: Regex,
    prefix: Regex,
    params: Vec<String>,
}

impl CompiledPattern {
    pub fn compile(path: &str) -> Result<Self, DispatchError> {
        let invalid = |reason: &str| DispatchError::InvalidPattern {
            path: path.to_string(),
            reason: reason.to_string(),
        };

        if !path.starts_with('/') {
            return Err(invalid("must start with '/'"));
        }

        let mut body = String::new();
        let mut params = Vec::new();

        for segment in path.split('/').filter(|s| !s.is_empty()) {
            body.push('/');
            match segment.strip_prefix(':') {
                Some(name) => {
                    if name.is_empty() {
                        return Err(invalid("empty parameter name"));
                    }
                    if params.iter().any(|p| p == name) {
                        return Err(invalid("duplicate parameter name"));
                    }
                    params.push(name.to_string());
                    body.push_str("([^/]+)");
                }
                None => body.push_str(&regex::escape(segment)),
            }
        }

        let exact = Regex::new(&format!("^{body}/?$")).map_err(|e| invalid(&e.to_string()))?;
        let prefix = Regex::new(&format!("^{body}(?:/|$)")).map_err(|e| invalid(&e.to_string()))?;

        Ok(Self {
            path: path.to_string(),
            exact,
            prefix,
            params,
        })
    }

    /// The literal path the pattern was compiled from.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }

    pub fn matches(&self, path_info: &str, operator: PathOperator) -> bool {
        match operator {
            PathOperator::Equals => self.exact.is_match(path_info),
            PathOperator::StartsWith => self.prefix.is_match(path_info),
        }
    }

    /// Path parameters captured from `path_info`, in declaration order.
    pub fn captures(&self, path_info: &str, operator: PathOperator) -> Option<Vec<(String, String)>> {
        let regex = match operator {
            PathOperator::Equals => &self.exact,
            PathOperator::StartsWith => &self.prefix,
        };
        let captures = regex.captures(path_info)?;
        Some(
            self.params
                .iter()
                .zip(captures.iter().skip(1))
                .filter_map(|(name, value)| Some((name.clone(), value?.as_str().to_string())))
                .collect(),
        )
    }
}

/// Memoizing cache of compiled patterns, one per API deployment.
#[derive(Debug, Default)]
pub struct PathPatternCache {
    patterns: DashMap<String, Arc<CompiledPattern>>,
}

impl PathPatternCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compiled pattern for `path`, compiling it on first use.
    pub fn get_or_create(&self, path: &str) -> Result<Arc<CompiledPattern>, DispatchError> {
        if let Some(pattern) = self.patterns.get(path) {
            return Ok(pattern.clone());
        }
        let entry = self
            .patterns
            .entry(path.to_string())
            .or_try_insert_with(|| CompiledPattern::compile(path).map(Arc::new))?;
        Ok(entry.clone())
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn clear(&self) {
        self.patterns.clear();
    }
}
