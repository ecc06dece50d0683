//! Plan validation against the operation registry

use planchain_core::CallSpec;
use planchain_ops::OperationRegistry;

/// Check every call independently and collect all problems.
///
/// Messages use 1-based call numbers. The plan is never modified.
pub fn validate(calls: &[CallSpec], registry: &OperationRegistry) -> (bool, Vec<String>) {
    let mut errors = Vec::new();

    for (i, call) in calls.iter().enumerate() {
        let n = i + 1;
        let name = match call.function_name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => {
                errors.push(format!("Function call {}: Missing 'function_name'", n));
                continue;
            }
        };

        let Some(schema) = registry.schema(name) else {
            errors.push(format!("Function call {}: Unknown function '{}'", n, name));
            continue;
        };

        let Some(params) = &call.parameters else {
            errors.push(format!("Function call {}: Missing 'parameters'", n));
            continue;
        };

        let missing: Vec<&str> = schema
            .required_params()
            .filter(|p| !params.contains_key(&p.name))
            .map(|p| p.name.as_str())
            .collect();
        if !missing.is_empty() {
            errors.push(format!(
                "Function call {}: Missing required parameters: {}",
                n,
                missing.join(", ")
            ));
        }
    }

    (errors.is_empty(), errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use planchain_core::OpsConfig;
    use serde_json::json;

    fn registry() -> OperationRegistry {
        planchain_ops::create_default_registry(&OpsConfig::default()).unwrap()
    }

    #[test]
    fn valid_plan_has_no_errors() {
        let calls = vec![
            CallSpec::new("read_csv", json!({"file_path": "a.csv"})),
            CallSpec::new("summarize_data", json!({"data": "{{result_0}}", "column": "x"})),
        ];
        assert_eq!(validate(&calls, &registry()), (true, vec![]));
    }

    #[test]
    fn each_problem_is_reported_once_per_call() {
        let calls = vec![
            CallSpec::default(),
            CallSpec::new("launch_rocket", json!({})),
            CallSpec {
                function_name: Some("read_file".into()),
                parameters: None,
                description: String::new(),
            },
            CallSpec::new("send_email", json!({"subject": "s"})),
        ];
        let (ok, errors) = validate(&calls, &registry());
        assert!(!ok);
        assert_eq!(
            errors,
            vec![
                "Function call 1: Missing 'function_name'",
                "Function call 2: Unknown function 'launch_rocket'",
                "Function call 3: Missing 'parameters'",
                "Function call 4: Missing required parameters: to_email, body",
            ]
        );
    }

    #[test]
    fn does_not_mutate_plan() {
        let calls = vec![CallSpec::new("read_csv", json!({}))];
        let before = calls.clone();
        let _ = validate(&calls, &registry());
        assert_eq!(calls, before);
    }
}
