//! Human-readable rendering of run results, validation output, and the
//! operation catalog.

use crate::app::BatchReport;
use planchain_core::{CallResult, ExecutionResult, OperationSchema};
use planchain_engine::OrchestratorStatus;
use serde_json::Value;

pub struct ReportOptions {
    /// Print full payloads instead of a one-line preview.
    pub raw: bool,
    /// Include the resolved parameters of each call.
    pub show_params: bool,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            raw: false,
            show_params: false,
        }
    }
}

const MAX_PREVIEW_CHARS: usize = 120;

pub fn format_result(result: &ExecutionResult, opts: &ReportOptions) -> String {
    let mut out = String::new();
    let title = if result.plan.plan.is_empty() {
        "(no description)"
    } else {
        result.plan.plan.as_str()
    };
    out.push_str(&format!("═══ Plan: {} ═══\n", title));

    let status = if result.success {
        "ok"
    } else if result.is_partial() {
        "partial"
    } else {
        "failed"
    };
    out.push_str(&format!("Status: {} ({})\n", status, result.message));

    if !result.results.is_empty() {
        out.push('\n');
    }
    for call in &result.results {
        format_call(&mut out, call, opts);
    }

    // Calls skipped after a critical halt
    let skipped = result.plan.len().saturating_sub(result.results.len());
    if skipped > 0 && !result.results.is_empty() {
        out.push_str(&format!("  ... {} call(s) not run\n", skipped));
    }

    let s = &result.execution_summary;
    out.push_str(&format!(
        "\n{}/{} succeeded, {} failed in {}ms\n",
        s.successful_functions, s.total_functions, s.failed_functions, s.elapsed_ms
    ));
    out
}

fn format_call(out: &mut String, call: &CallResult, opts: &ReportOptions) {
    let mark = if call.success { "✓" } else { "✗" };
    out.push_str(&format!("[{}] {} {}", call.call_index, call.function_name, mark));
    if !call.description.is_empty() {
        out.push_str(&format!("  {}", call.description));
    }
    out.push('\n');

    if opts.show_params && !call.parameters_used.is_empty() {
        let params = serde_json::to_string(&call.parameters_used).unwrap_or_default();
        out.push_str(&format!("  params: {}\n", preview(&params, opts.raw)));
    }

    match &call.error {
        Some(err) => out.push_str(&format!("  → error: {}\n", err)),
        None => {
            let value = match call.data() {
                Some(data) => data.clone(),
                None => Value::Object(call.payload.clone()),
            };
            if !is_empty_value(&value) {
                let text = if opts.raw {
                    serde_json::to_string_pretty(&value).unwrap_or_default()
                } else {
                    serde_json::to_string(&value).unwrap_or_default()
                };
                out.push_str(&format!("  → {}\n", preview(&text, opts.raw)));
            }
        }
    }
}

/// `Plan is valid` or one line per validation error.
pub fn format_validation(valid: bool, errors: &[String]) -> String {
    if valid {
        return "Plan is valid\n".to_string();
    }
    let mut out = format!("Plan is invalid ({} error(s)):\n", errors.len());
    for e in errors {
        out.push_str(&format!("  - {}\n", e));
    }
    out
}

/// Signatures grouped by category, categories in first-seen order.
pub fn format_functions(schemas: &[OperationSchema]) -> String {
    if schemas.is_empty() {
        return "No matching functions\n".to_string();
    }
    let mut categories: Vec<&str> = Vec::new();
    for s in schemas {
        if !categories.contains(&s.category.as_str()) {
            categories.push(&s.category);
        }
    }

    let mut out = String::new();
    for category in categories {
        out.push_str(&format!("{}:\n", category));
        for s in schemas.iter().filter(|s| s.category == category) {
            out.push_str(&format!("  {}\n", s.signature()));
            out.push_str(&format!("      {}\n", s.description));
        }
        out.push('\n');
    }
    out
}

pub fn format_batch(batch: &BatchReport) -> String {
    let mut out = String::from("═══ Batch Processing Summary ═══\n");
    out.push_str(&format!("Total queries: {}\n", batch.total_queries));
    out.push_str(&format!("Successful: {}\n", batch.successful));
    out.push_str(&format!("Failed: {}\n", batch.failed));
    out.push_str(&format!("Success rate: {:.1}%\n", batch.success_rate * 100.0));
    out
}

/// One line per retained run, oldest first.
pub fn format_history(history: &[ExecutionResult]) -> String {
    let mut out = format!("Execution history ({} runs):\n", history.len());
    for (i, run) in history.iter().enumerate() {
        let mark = if run.success { "✓" } else { "✗" };
        out.push_str(&format!(
            "{:>3}. {} {} ({} functions) {}\n",
            i + 1,
            mark,
            run.plan.plan,
            run.execution_summary.total_functions,
            run.message
        ));
    }
    out
}

pub fn format_status(status: &OrchestratorStatus) -> String {
    let mut out = String::from("═══ planchain status ═══\n");
    out.push_str(&format!(
        "Registered operations: {}\n",
        status.registered_operations
    ));
    out.push_str(&format!("Categories: {}\n", status.categories.join(", ")));
    out.push_str(&format!(
        "History: {}/{} retained\n",
        status.history_len, status.history_capacity
    ));
    out
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

fn preview(text: &str, raw: bool) -> String {
    if raw || text.chars().count() <= MAX_PREVIEW_CHARS {
        return text.to_string();
    }
    let head: String = text.chars().take(MAX_PREVIEW_CHARS).collect();
    format!("{}...", head)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_truncates_on_char_boundary() {
        let text = "é".repeat(200);
        let p = preview(&text, false);
        assert!(p.ends_with("..."));
        assert_eq!(p.chars().count(), MAX_PREVIEW_CHARS + 3);
        assert_eq!(preview(&text, true), text);
    }

    #[test]
    fn validation_lines() {
        assert_eq!(format_validation(true, &[]), "Plan is valid\n");
        let out = format_validation(false, &["a".into(), "b".into()]);
        assert!(out.starts_with("Plan is invalid (2 error(s)):"));
        assert!(out.contains("  - b\n"));
    }
}
