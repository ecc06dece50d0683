//! Core types for planchain: schemas, plans, and results

use crate::error::{Error, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Named parameters passed to an operation.
pub type Params = Map<String, Value>;

/// Declared type of an operation parameter
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
    Any,
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
            Self::Any => "any",
        };
        f.write_str(s)
    }
}

/// One parameter in an operation schema
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ParamDef {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: ParamType,
    #[serde(default)]
    pub description: String,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl ParamDef {
    pub fn required(
        name: impl Into<String>,
        param_type: ParamType,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            param_type,
            description: description.into(),
            required: true,
            default: None,
        }
    }

    pub fn optional(
        name: impl Into<String>,
        param_type: ParamType,
        description: impl Into<String>,
        default: impl Into<Value>,
    ) -> Self {
        Self {
            name: name.into(),
            param_type,
            description: description.into(),
            required: false,
            default: Some(default.into()),
        }
    }
}

/// Declared interface of a registered operation. Immutable once registered.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct OperationSchema {
    pub name: String,
    pub description: String,
    pub category: String,
    pub parameters: Vec<ParamDef>,
    #[serde(default)]
    pub returns: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<String>,
}

impl OperationSchema {
    pub fn new(
        name: impl Into<String>,
        category: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            category: category.into(),
            parameters: Vec::new(),
            returns: String::new(),
            examples: Vec::new(),
        }
    }

    pub fn param(mut self, def: ParamDef) -> Self {
        self.parameters.push(def);
        self
    }

    pub fn returns(mut self, returns: impl Into<String>) -> Self {
        self.returns = returns.into();
        self
    }

    pub fn example(mut self, example: impl Into<String>) -> Self {
        self.examples.push(example.into());
        self
    }

    pub fn get_param(&self, name: &str) -> Option<&ParamDef> {
        self.parameters.iter().find(|p| p.name == name)
    }

    pub fn required_params(&self) -> impl Iterator<Item = &ParamDef> {
        self.parameters.iter().filter(|p| p.required)
    }

    /// One-line signature, e.g. `read_csv(file_path: string, delimiter?: string)`.
    pub fn signature(&self) -> String {
        let params: Vec<String> = self
            .parameters
            .iter()
            .map(|p| {
                let marker = if p.required { "" } else { "?" };
                format!("{}{}: {}", p.name, marker, p.param_type)
            })
            .collect();
        format!("{}({})", self.name, params.join(", "))
    }
}

/// A single requested invocation within a plan.
///
/// `function_name` and `parameters` are optional on the wire so that a
/// malformed planner response still parses and is reported by validation.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct CallSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Params>,
    #[serde(default)]
    pub description: String,
}

impl CallSpec {
    pub fn new(function_name: impl Into<String>, parameters: Value) -> Self {
        let parameters = match parameters {
            Value::Object(map) => map,
            _ => Params::new(),
        };
        Self {
            function_name: Some(function_name.into()),
            parameters: Some(parameters),
            description: String::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Operation name, or `""` when absent.
    pub fn name(&self) -> &str {
        self.function_name.as_deref().unwrap_or("")
    }
}

/// An ordered list of calls plus a human-readable description.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Plan {
    #[serde(default)]
    pub plan: String,
    #[serde(default)]
    pub function_calls: Vec<CallSpec>,
}

impl Plan {
    pub fn new(description: impl Into<String>, calls: Vec<CallSpec>) -> Self {
        Self {
            plan: description.into(),
            function_calls: calls,
        }
    }

    /// Parse a plan from raw planner JSON. Shape errors become `InvalidPlan`.
    pub fn from_value(value: Value) -> Result<Self> {
        if !value.is_object() {
            return Err(Error::InvalidPlan("plan must be a JSON object".into()));
        }
        serde_json::from_value(value).map_err(|e| Error::InvalidPlan(e.to_string()))
    }

    pub fn is_empty(&self) -> bool {
        self.function_calls.is_empty()
    }

    pub fn len(&self) -> usize {
        self.function_calls.len()
    }
}

/// What an operation hands back to the engine: a success flag plus payload.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OperationOutput {
    pub success: bool,
    pub error: Option<String>,
    pub fields: Params,
}

impl OperationOutput {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
            fields: Params::new(),
        }
    }

    /// Successful output carrying a chainable `data` field.
    pub fn data(value: impl Into<Value>) -> Self {
        Self::ok().with("data", value)
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            fields: Params::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn is_error(&self) -> bool {
        !self.success
    }
}

/// Keys the engine owns on a `CallResult`; operation payloads may not shadow them.
pub const RESERVED_RESULT_KEYS: &[&str] = &[
    "success",
    "error",
    "function_name",
    "call_index",
    "description",
    "parameters_used",
];

/// Recorded outcome of one call. Immutable once recorded.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CallResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub payload: Params,
    pub function_name: String,
    pub call_index: usize,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parameters_used: Params,
}

impl CallResult {
    pub fn from_output(
        output: OperationOutput,
        call: &CallSpec,
        call_index: usize,
        parameters_used: Params,
    ) -> Self {
        let mut payload = output.fields;
        payload.retain(|k, _| !RESERVED_RESULT_KEYS.contains(&k.as_str()));
        Self {
            success: output.success,
            error: output.error,
            payload,
            function_name: call.name().to_string(),
            call_index,
            description: call.description.clone(),
            parameters_used,
        }
    }

    pub fn failed(
        call: &CallSpec,
        call_index: usize,
        error: impl Into<String>,
        parameters_used: Params,
    ) -> Self {
        Self::from_output(
            OperationOutput::failure(error),
            call,
            call_index,
            parameters_used,
        )
    }

    pub fn data(&self) -> Option<&Value> {
        self.payload.get("data")
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// The value downstream references see: `data` when present, else the whole result.
    pub fn chain_value(&self) -> Value {
        match self.data() {
            Some(data) => data.clone(),
            None => self.to_value(),
        }
    }
}

/// Run-level counts. successful + failed == total == results.len()
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ExecutionSummary {
    pub total_functions: usize,
    pub successful_functions: usize,
    pub failed_functions: usize,
    pub execution_time: String,
    #[serde(default)]
    pub elapsed_ms: u64,
}

impl ExecutionSummary {
    pub fn from_results(results: &[CallResult], elapsed_ms: u64) -> Self {
        let successful = results.iter().filter(|r| r.success).count();
        Self {
            total_functions: results.len(),
            successful_functions: successful,
            failed_functions: results.len() - successful,
            execution_time: Utc::now().to_rfc3339(),
            elapsed_ms,
        }
    }
}

/// Final output of one plan run.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ExecutionResult {
    pub success: bool,
    pub message: String,
    pub plan: Plan,
    pub results: Vec<CallResult>,
    pub execution_summary: ExecutionSummary,
}

impl ExecutionResult {
    pub fn new(
        plan: Plan,
        results: Vec<CallResult>,
        message: impl Into<String>,
        success: bool,
        elapsed_ms: u64,
    ) -> Self {
        let execution_summary = ExecutionSummary::from_results(&results, elapsed_ms);
        Self {
            success,
            message: message.into(),
            plan,
            results,
            execution_summary,
        }
    }

    /// A failed result with no recorded calls.
    pub fn failure(plan: Plan, message: impl Into<String>) -> Self {
        Self::new(plan, Vec::new(), message, false, 0)
    }

    /// Output of the first call to `function_name`, `data` preferred.
    pub fn function_output(&self, function_name: &str) -> Option<Value> {
        self.results
            .iter()
            .find(|r| r.function_name == function_name)
            .map(|r| r.chain_value())
    }

    /// True when fewer calls were recorded than the plan requested.
    pub fn is_partial(&self) -> bool {
        self.results.len() < self.plan.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn call_result_flattens_payload() {
        let call = CallSpec::new("read_csv", json!({"file_path": "a.csv"}));
        let out = OperationOutput::data(json!([1, 2])).with("row_count", 2);
        let result = CallResult::from_output(out, &call, 0, Params::new());
        let v = result.to_value();
        assert_eq!(v["data"], json!([1, 2]));
        assert_eq!(v["row_count"], 2);
        assert_eq!(v["function_name"], "read_csv");
        assert!(v.get("error").is_none());
    }

    #[test]
    fn chain_value_falls_back_to_whole_result() {
        let call = CallSpec::new("get_system_info", json!({}));
        let out = OperationOutput::ok().with("system_info", json!({"os": "linux"}));
        let result = CallResult::from_output(out, &call, 3, Params::new());
        let chained = result.chain_value();
        assert_eq!(chained["system_info"]["os"], "linux");
        assert_eq!(chained["call_index"], 3);
    }

    #[test]
    fn plan_from_value_rejects_non_object() {
        let err = Plan::from_value(json!([1, 2])).unwrap_err();
        assert!(matches!(err, Error::InvalidPlan(_)));
    }

    #[test]
    fn plan_from_value_tolerates_missing_fields() {
        let plan = Plan::from_value(json!({
            "plan": "p",
            "function_calls": [{"description": "no name"}]
        }))
        .unwrap();
        assert_eq!(plan.len(), 1);
        assert!(plan.function_calls[0].function_name.is_none());
        assert!(plan.function_calls[0].parameters.is_none());
    }

    #[test]
    fn schema_signature_marks_optional() {
        let schema = OperationSchema::new("read_csv", "data_processing", "Read CSV")
            .param(ParamDef::required("file_path", ParamType::String, "path"))
            .param(ParamDef::optional("delimiter", ParamType::String, "sep", ","));
        assert_eq!(
            schema.signature(),
            "read_csv(file_path: string, delimiter?: string)"
        );
        assert_eq!(schema.required_params().count(), 1);
    }
}
