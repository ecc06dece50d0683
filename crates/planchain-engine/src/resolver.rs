//! Symbolic reference resolution
//!
//! A parameter value is a reference when it is a string wrapped in `{{ }}`.
//! The inner expression is one of:
//!
//! - `output_from_previous` / `previous_result`: the latest recorded result
//! - `result_<i>`: the result of call `i`
//! - `result_<i>.<path>`: a dotted walk into the serialized result of call `i`
//! - anything else: substring match over `result_<i>` keys, when enabled
//!
//! Whole-result lookups prefer the `data` field when present.

use crate::context::ExecutionContext;
use planchain_core::ResolverConfig;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    Previous,
    Result(usize),
    Path { index: usize, path: Vec<String> },
    Named(String),
}

impl Reference {
    /// Parse a parameter value. Returns `None` for literals.
    pub fn parse(value: &Value) -> Option<Self> {
        let s = value.as_str()?;
        let inner = s.strip_prefix("{{")?.strip_suffix("}}")?;
        Some(Self::parse_expr(inner.trim()))
    }

    fn parse_expr(expr: &str) -> Self {
        if expr == "output_from_previous" || expr == "previous_result" {
            return Self::Previous;
        }
        if let Some(rest) = expr.strip_prefix("result_") {
            let (head, tail) = match rest.split_once('.') {
                Some((h, t)) => (h, Some(t)),
                None => (rest, None),
            };
            if let Some(index) = parse_index(head) {
                return match tail {
                    None => Self::Result(index),
                    Some(t) => Self::Path {
                        index,
                        path: t.split('.').map(String::from).collect(),
                    },
                };
            }
        }
        Self::Named(expr.to_string())
    }
}

/// Canonical decimal index: digits only, no leading zeros, no sign.
fn parse_index(s: &str) -> Option<usize> {
    let canonical = !s.is_empty()
        && s.bytes().all(|b| b.is_ascii_digit())
        && (s == "0" || !s.starts_with('0'));
    if canonical {
        s.parse().ok()
    } else {
        None
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolutionFailure {
    #[error("no previous result to reference")]
    NoPreviousResult,

    #[error("no result recorded for call {0}")]
    MissingResult(usize),

    #[error("result_{index} has no field at '{path}'")]
    MissingPath { index: usize, path: String },

    #[error("unrecognized reference '{0}'")]
    Unrecognized(String),

    #[error("no context entry matches '{0}'")]
    NoMatch(String),
}

/// Resolves references against an [`ExecutionContext`].
#[derive(Debug, Clone, Default)]
pub struct Resolver {
    fuzzy_fallback: bool,
}

impl Resolver {
    pub fn new(config: &ResolverConfig) -> Self {
        Self {
            fuzzy_fallback: config.fuzzy_fallback,
        }
    }

    pub fn with_fuzzy_fallback(mut self, enabled: bool) -> Self {
        self.fuzzy_fallback = enabled;
        self
    }

    /// Resolve one parameter value. Literals come back unchanged.
    pub fn resolve(
        &self,
        value: &Value,
        ctx: &ExecutionContext,
    ) -> Result<Value, ResolutionFailure> {
        match Reference::parse(value) {
            Some(reference) => self.resolve_reference(&reference, ctx),
            None => Ok(value.clone()),
        }
    }

    pub fn resolve_reference(
        &self,
        reference: &Reference,
        ctx: &ExecutionContext,
    ) -> Result<Value, ResolutionFailure> {
        match reference {
            Reference::Previous => ctx
                .latest()
                .map(|r| r.chain_value())
                .ok_or(ResolutionFailure::NoPreviousResult),
            Reference::Result(index) => ctx
                .get(*index)
                .map(|r| r.chain_value())
                .ok_or(ResolutionFailure::MissingResult(*index)),
            Reference::Path { index, path } => {
                let result = ctx
                    .get(*index)
                    .ok_or(ResolutionFailure::MissingResult(*index))?;
                walk(&result.to_value(), path).ok_or_else(|| ResolutionFailure::MissingPath {
                    index: *index,
                    path: path.join("."),
                })
            }
            Reference::Named(name) => {
                if !self.fuzzy_fallback || name.is_empty() {
                    return Err(ResolutionFailure::Unrecognized(name.clone()));
                }
                ctx.entries()
                    .find(|(key, _)| key.contains(name.as_str()))
                    .map(|(_, r)| r.chain_value())
                    .ok_or_else(|| ResolutionFailure::NoMatch(name.clone()))
            }
        }
    }
}

/// Follow object keys; numeric segments also index arrays.
fn walk(root: &Value, path: &[String]) -> Option<Value> {
    let mut current = root;
    for segment in path {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current.clone())
}
