//! Parameter extraction helpers shared by the builtin operations.
//!
//! A null value counts as missing: unresolved references arrive as null.

use planchain_core::{Error, Params, Result};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

fn present<'a>(params: &'a Params, key: &str) -> Option<&'a Value> {
    params.get(key).filter(|v| !v.is_null())
}

fn missing(op: &str, key: &str, params: &Params) -> Error {
    let reason = if params.contains_key(key) {
        "value is null (unresolved reference?)"
    } else {
        "missing required parameter"
    };
    Error::invalid_parameter(op, key, reason)
}

pub(crate) fn require<'a>(op: &str, params: &'a Params, key: &str) -> Result<&'a Value> {
    present(params, key).ok_or_else(|| missing(op, key, params))
}

pub(crate) fn require_str<'a>(op: &str, params: &'a Params, key: &str) -> Result<&'a str> {
    require(op, params, key)?
        .as_str()
        .ok_or_else(|| Error::invalid_parameter(op, key, "expected a string"))
}

pub(crate) fn optional_str<'a>(params: &'a Params, key: &str) -> Option<&'a str> {
    present(params, key).and_then(|v| v.as_str())
}

pub(crate) fn require_array<'a>(op: &str, params: &'a Params, key: &str) -> Result<&'a Vec<Value>> {
    require(op, params, key)?
        .as_array()
        .ok_or_else(|| Error::invalid_parameter(op, key, "expected an array"))
}

/// An array of row objects, the shape `read_csv` and friends produce.
pub(crate) fn require_rows<'a>(
    op: &str,
    params: &'a Params,
    key: &str,
) -> Result<Vec<&'a Map<String, Value>>> {
    require_array(op, params, key)?
        .iter()
        .map(|row| {
            row.as_object()
                .ok_or_else(|| Error::invalid_parameter(op, key, "expected an array of objects"))
        })
        .collect()
}

pub(crate) fn bool_or(params: &Params, key: &str, default: bool) -> bool {
    match present(params, key) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => match s.to_lowercase().as_str() {
            "true" | "yes" | "1" => true,
            "false" | "no" | "0" => false,
            _ => default,
        },
        _ => default,
    }
}

pub(crate) fn u64_or(params: &Params, key: &str, default: u64) -> u64 {
    match present(params, key) {
        Some(v) => v
            .as_u64()
            .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
            .unwrap_or(default),
        None => default,
    }
}

/// Numbers and numeric strings both count; CSV cells and LLM output mix them.
pub(crate) fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Resolves operation paths: `~/` against home, relative paths against the workspace root.
#[derive(Clone, Debug, Default)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resolve(&self, path: &str) -> PathBuf {
        if let Some(rest) = path.strip_prefix("~/") {
            return dirs::home_dir().unwrap_or_default().join(rest);
        }
        let p = Path::new(path);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.root.join(p)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(v: Value) -> Params {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn null_is_reported_as_unresolved() {
        let p = params(json!({"data": null}));
        let err = require("summarize_data", &p, "data").unwrap_err();
        assert!(err.to_string().contains("unresolved"));
    }

    #[test]
    fn absent_is_reported_as_missing() {
        let p = params(json!({}));
        let err = require_str("read_csv", &p, "file_path").unwrap_err();
        assert!(err.to_string().contains("missing required parameter"));
    }

    #[test]
    fn numeric_strings_are_numbers() {
        assert_eq!(as_f64(&json!("12.5")), Some(12.5));
        assert_eq!(as_f64(&json!(3)), Some(3.0));
        assert_eq!(as_f64(&json!("abc")), None);
    }

    #[test]
    fn loose_booleans() {
        let p = params(json!({"a": "false", "b": true}));
        assert!(!bool_or(&p, "a", true));
        assert!(bool_or(&p, "b", false));
        assert!(bool_or(&p, "c", true));
    }

    #[test]
    fn workspace_resolves_relative_paths() {
        let ws = Workspace::new("/srv/data");
        assert_eq!(ws.resolve("a.csv"), PathBuf::from("/srv/data/a.csv"));
        assert_eq!(ws.resolve("/tmp/b.csv"), PathBuf::from("/tmp/b.csv"));
    }
}
