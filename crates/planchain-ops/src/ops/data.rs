//! Data processing operations: CSV ingestion, filtering, sorting, aggregation

use crate::params::{as_f64, bool_or, optional_str, require, require_rows, require_str, Workspace};
use crate::registry::Operation;
use planchain_core::{OperationOutput, OperationSchema, ParamDef, ParamType, Params, Result};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use tracing::debug;

const CATEGORY: &str = "data_processing";

/// Parse a CSV cell the way a dataframe loader would: integers, then floats, then text.
fn parse_cell(cell: &str) -> Value {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return Value::from(i);
    }
    if let Ok(f) = trimmed.parse::<f64>() {
        if f.is_finite() {
            return Value::from(f);
        }
    }
    Value::from(cell)
}

pub struct ReadCsv {
    schema: OperationSchema,
    workspace: Workspace,
}

impl ReadCsv {
    pub fn new(workspace: Workspace) -> Self {
        Self {
            schema: OperationSchema::new(
                "read_csv",
                CATEGORY,
                "Read data from a CSV file and return it as a list of row objects",
            )
            .param(ParamDef::required("file_path", ParamType::String, "Path to the CSV file"))
            .param(ParamDef::optional(
                "delimiter",
                ParamType::String,
                "Single-character field delimiter",
                ",",
            ))
            .returns("data: rows keyed by header, columns, row_count")
            .example("read_csv('data/sales.csv')"),
            workspace,
        }
    }
}

#[async_trait::async_trait]
impl Operation for ReadCsv {
    fn schema(&self) -> &OperationSchema {
        &self.schema
    }

    async fn invoke(&self, params: Params) -> Result<OperationOutput> {
        let path = require_str("read_csv", &params, "file_path")?;
        let delimiter = optional_str(&params, "delimiter").unwrap_or(",");
        let delimiter = match delimiter.as_bytes() {
            [b] => *b,
            _ => {
                return Ok(OperationOutput::failure(format!(
                    "delimiter must be a single byte, got {:?}",
                    delimiter
                )))
            }
        };

        let resolved = self.workspace.resolve(path);
        let content = match tokio::fs::read_to_string(&resolved).await {
            Ok(c) => c,
            Err(e) => {
                return Ok(OperationOutput::failure(format!(
                    "Failed to read {}: {}",
                    path, e
                )))
            }
        };

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .from_reader(content.as_bytes());
        let headers: Vec<String> = match reader.headers() {
            Ok(h) => h.iter().map(|s| s.trim().to_string()).collect(),
            Err(e) => return Ok(OperationOutput::failure(format!("Invalid CSV header: {}", e))),
        };

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = match record {
                Ok(r) => r,
                Err(e) => return Ok(OperationOutput::failure(format!("Invalid CSV record: {}", e))),
            };
            let row: Map<String, Value> = headers
                .iter()
                .zip(record.iter())
                .map(|(h, cell)| (h.clone(), parse_cell(cell)))
                .collect();
            rows.push(Value::Object(row));
        }

        debug!("read_csv: {} ({} rows)", path, rows.len());
        let row_count = rows.len();
        Ok(OperationOutput::data(rows)
            .with("columns", headers)
            .with("row_count", row_count))
    }
}

pub struct FilterData {
    schema: OperationSchema,
}

impl FilterData {
    pub fn new() -> Self {
        Self {
            schema: OperationSchema::new(
                "filter_data",
                CATEGORY,
                "Filter rows where a column matches a condition",
            )
            .param(ParamDef::required("data", ParamType::Array, "Rows to filter"))
            .param(ParamDef::required("column", ParamType::String, "Column to test"))
            .param(ParamDef::required(
                "operator",
                ParamType::String,
                "equals, not_equals, greater_than, less_than, or contains",
            ))
            .param(ParamDef::required("value", ParamType::Any, "Value to compare against"))
            .returns("data: matching rows, count"),
        }
    }
}

impl Default for FilterData {
    fn default() -> Self {
        Self::new()
    }
}

fn loose_eq(a: &Value, b: &Value) -> bool {
    match (as_f64(a), as_f64(b)) {
        (Some(x), Some(y)) => x == y,
        _ => value_text(a) == value_text(b),
    }
}

fn value_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[async_trait::async_trait]
impl Operation for FilterData {
    fn schema(&self) -> &OperationSchema {
        &self.schema
    }

    async fn invoke(&self, params: Params) -> Result<OperationOutput> {
        let rows = require_rows("filter_data", &params, "data")?;
        let column = require_str("filter_data", &params, "column")?;
        let operator = require_str("filter_data", &params, "operator")?;
        let value = require("filter_data", &params, "value")?;

        let mut filtered = Vec::new();
        for row in rows {
            let Some(cell) = row.get(column) else { continue };
            let keep = match operator {
                "equals" => loose_eq(cell, value),
                "not_equals" => !loose_eq(cell, value),
                "greater_than" | "less_than" => match (as_f64(cell), as_f64(value)) {
                    (Some(x), Some(y)) if operator == "greater_than" => x > y,
                    (Some(x), Some(y)) => x < y,
                    _ => {
                        return Ok(OperationOutput::failure(format!(
                            "cannot compare non-numeric values in column '{}'",
                            column
                        )))
                    }
                },
                "contains" => value_text(cell)
                    .to_lowercase()
                    .contains(&value_text(value).to_lowercase()),
                other => {
                    return Ok(OperationOutput::failure(format!("Unknown operator: {}", other)))
                }
            };
            if keep {
                filtered.push(Value::Object(row.clone()));
            }
        }

        let count = filtered.len();
        Ok(OperationOutput::data(filtered).with("count", count))
    }
}

pub struct SummarizeData {
    schema: OperationSchema,
}

impl SummarizeData {
    pub fn new() -> Self {
        Self {
            schema: OperationSchema::new(
                "summarize_data",
                CATEGORY,
                "Generate summary statistics for a numeric column",
            )
            .param(ParamDef::required("data", ParamType::Array, "Rows to summarize"))
            .param(ParamDef::required("column", ParamType::String, "Numeric column"))
            .returns("summary: count, sum, mean, min, max"),
        }
    }
}

impl Default for SummarizeData {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Operation for SummarizeData {
    fn schema(&self) -> &OperationSchema {
        &self.schema
    }

    async fn invoke(&self, params: Params) -> Result<OperationOutput> {
        let rows = require_rows("summarize_data", &params, "data")?;
        let column = require_str("summarize_data", &params, "column")?;

        let mut values = Vec::new();
        for row in rows {
            match row.get(column) {
                None | Some(Value::Null) => continue,
                Some(cell) => match as_f64(cell) {
                    Some(v) => values.push(v),
                    None => {
                        return Ok(OperationOutput::failure(format!(
                            "could not convert {} in column '{}' to a number",
                            cell, column
                        )))
                    }
                },
            }
        }

        if values.is_empty() {
            return Ok(OperationOutput::failure("No valid numerical data found"));
        }

        let sum: f64 = values.iter().sum();
        let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let summary = serde_json::json!({
            "count": values.len(),
            "sum": sum,
            "mean": sum / values.len() as f64,
            "min": min,
            "max": max,
        });
        Ok(OperationOutput::ok().with("summary", summary))
    }
}

pub struct SortData {
    schema: OperationSchema,
}

impl SortData {
    pub fn new() -> Self {
        Self {
            schema: OperationSchema::new("sort_data", CATEGORY, "Sort rows by a column")
                .param(ParamDef::required("data", ParamType::Array, "Rows to sort"))
                .param(ParamDef::required("column", ParamType::String, "Sort key"))
                .param(ParamDef::optional(
                    "ascending",
                    ParamType::Boolean,
                    "Sort direction",
                    true,
                ))
                .returns("data: sorted rows"),
        }
    }
}

impl Default for SortData {
    fn default() -> Self {
        Self::new()
    }
}

/// Total order over JSON cells: missing/null < bool < number < text.
fn compare_cells(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(v: Option<&Value>) -> u8 {
        match v {
            None | Some(Value::Null) => 0,
            Some(Value::Bool(_)) => 1,
            Some(Value::Number(_)) => 2,
            _ => 3,
        }
    }
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(x), Some(y)) if rank(a) == 3 && rank(b) == 3 => value_text(x).cmp(&value_text(y)),
        _ => rank(a).cmp(&rank(b)),
    }
}

#[async_trait::async_trait]
impl Operation for SortData {
    fn schema(&self) -> &OperationSchema {
        &self.schema
    }

    async fn invoke(&self, params: Params) -> Result<OperationOutput> {
        let mut rows = require_rows("sort_data", &params, "data")?;
        let column = require_str("sort_data", &params, "column")?;
        let ascending = bool_or(&params, "ascending", true);

        rows.sort_by(|a, b| {
            let ord = compare_cells(a.get(column), b.get(column));
            if ascending {
                ord
            } else {
                ord.reverse()
            }
        });

        let sorted: Vec<Value> = rows.into_iter().map(|r| Value::Object(r.clone())).collect();
        Ok(OperationOutput::data(sorted))
    }
}

pub struct GroupBy {
    schema: OperationSchema,
}

impl GroupBy {
    pub fn new() -> Self {
        Self {
            schema: OperationSchema::new(
                "group_by",
                CATEGORY,
                "Group rows by a column and aggregate another column",
            )
            .param(ParamDef::required("data", ParamType::Array, "Rows to group"))
            .param(ParamDef::required("group_column", ParamType::String, "Grouping key"))
            .param(ParamDef::required("agg_column", ParamType::String, "Column to aggregate"))
            .param(ParamDef::optional(
                "operation",
                ParamType::String,
                "sum, mean, count, min, or max",
                "sum",
            ))
            .returns("groups: key -> aggregate"),
        }
    }
}

impl Default for GroupBy {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Operation for GroupBy {
    fn schema(&self) -> &OperationSchema {
        &self.schema
    }

    async fn invoke(&self, params: Params) -> Result<OperationOutput> {
        let rows = require_rows("group_by", &params, "data")?;
        let group_column = require_str("group_by", &params, "group_column")?;
        let agg_column = require_str("group_by", &params, "agg_column")?;
        let operation = optional_str(&params, "operation").unwrap_or("sum");

        // Keyed by first appearance so output order follows the input.
        let mut groups: Vec<(String, Vec<f64>)> = Vec::new();
        for row in rows {
            let (Some(key), Some(cell)) = (row.get(group_column), row.get(agg_column)) else {
                continue;
            };
            let Some(v) = as_f64(cell) else {
                return Ok(OperationOutput::failure(format!(
                    "could not convert {} in column '{}' to a number",
                    cell, agg_column
                )));
            };
            let key = value_text(key);
            match groups.iter_mut().find(|(k, _)| *k == key) {
                Some((_, values)) => values.push(v),
                None => groups.push((key, vec![v])),
            }
        }

        let mut result = Map::new();
        for (key, values) in groups {
            let agg = match operation {
                "sum" => Value::from(values.iter().sum::<f64>()),
                "mean" => Value::from(values.iter().sum::<f64>() / values.len() as f64),
                "count" => Value::from(values.len()),
                "min" => Value::from(values.iter().cloned().fold(f64::INFINITY, f64::min)),
                "max" => Value::from(values.iter().cloned().fold(f64::NEG_INFINITY, f64::max)),
                other => {
                    return Ok(OperationOutput::failure(format!(
                        "Unknown aggregation: {}",
                        other
                    )))
                }
            };
            result.insert(key, agg);
        }

        let groups = Value::Object(result);
        Ok(OperationOutput::data(groups.clone()).with("groups", groups))
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
    fn cells_parse_as_numbers_when_possible() {
        assert_eq!(parse_cell("100"), json!(100));
        assert_eq!(parse_cell("2.5"), json!(2.5));
        assert_eq!(parse_cell("March"), json!("March"));
        assert_eq!(parse_cell(""), Value::Null);
    }

    #[tokio::test]
    async fn summarize_two_rows() {
        let out = SummarizeData::new()
            .invoke(params(json!({
                "data": [{"amount": 100}, {"amount": 200}],
                "column": "amount"
            })))
            .await
            .unwrap();
        assert!(out.success);
        let summary = &out.fields["summary"];
        assert_eq!(summary["sum"].as_f64(), Some(300.0));
        assert_eq!(summary["mean"].as_f64(), Some(150.0));
        assert_eq!(summary["count"], 2);
    }

    #[tokio::test]
    async fn summarize_without_numbers_fails() {
        let out = SummarizeData::new()
            .invoke(params(json!({"data": [{"name": "x"}], "column": "amount"})))
            .await
            .unwrap();
        assert!(out.is_error());
    }

    #[tokio::test]
    async fn summarize_null_data_is_invalid_parameter() {
        let err = SummarizeData::new()
            .invoke(params(json!({"data": null, "column": "amount"})))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("data"));
    }

    #[tokio::test]
    async fn filter_equals_matches_numeric_strings() {
        let out = FilterData::new()
            .invoke(params(json!({
                "data": [{"m": "March", "a": 1}, {"m": "April", "a": 2}],
                "column": "m",
                "operator": "equals",
                "value": "March"
            })))
            .await
            .unwrap();
        assert_eq!(out.fields["count"], 1);
        assert_eq!(out.fields["data"][0]["a"], 1);
    }

    #[tokio::test]
    async fn filter_unknown_operator_fails() {
        let out = FilterData::new()
            .invoke(params(json!({
                "data": [{"a": 1}],
                "column": "a",
                "operator": "between",
                "value": 1
            })))
            .await
            .unwrap();
        assert!(out.is_error());
    }

    #[tokio::test]
    async fn sort_descending() {
        let out = SortData::new()
            .invoke(params(json!({
                "data": [{"a": 2}, {"a": 10}, {"a": 1}],
                "column": "a",
                "ascending": false
            })))
            .await
            .unwrap();
        assert_eq!(out.fields["data"], json!([{"a": 10}, {"a": 2}, {"a": 1}]));
    }

    #[tokio::test]
    async fn group_by_sums_per_key() {
        let out = GroupBy::new()
            .invoke(params(json!({
                "data": [
                    {"region": "east", "amount": 10},
                    {"region": "west", "amount": 5},
                    {"region": "east", "amount": 2}
                ],
                "group_column": "region",
                "agg_column": "amount"
            })))
            .await
            .unwrap();
        assert_eq!(out.fields["groups"]["east"].as_f64(), Some(12.0));
        assert_eq!(out.fields["groups"]["west"].as_f64(), Some(5.0));
    }
}
