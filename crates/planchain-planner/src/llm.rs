//! LLM-backed planner with keyword failover

use crate::keyword::KeywordPlanner;
use crate::query::preprocess_query;
use crate::Planner;
use planchain_core::{OperationSchema, Plan, PlannerConfig};
use planchain_llm::{collect_text, LlmError, LlmProvider, LlmRequest};
use regex::Regex;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("llm request failed: {0}")]
    Llm(#[from] LlmError),

    #[error("no JSON object in response")]
    NoJson,

    #[error("response is not JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("response is not a valid plan: {0}")]
    InvalidPlan(#[from] planchain_core::Error),
}

const PROMPT_HEADER: &str = "\
You convert natural language requests into executable function call sequences.

Respond with valid JSON only, in exactly this shape:
{
  \"plan\": \"Brief description of your execution plan\",
  \"function_calls\": [
    {
      \"function_name\": \"exact_function_name\",
      \"parameters\": {\"param1\": \"value1\"},
      \"description\": \"What this call accomplishes\"
    }
  ]
}";

const PROMPT_RULES: &str = "\
RULES:
1. Use exact function names from the list above.
2. Provide every required parameter (optional ones are marked with ?).
3. Reference earlier outputs with a parameter value that is exactly one of:
   \"{{output_from_previous}}\" for the previous call's output,
   \"{{result_N}}\" for the output of call N (0-based),
   \"{{result_N.field.path}}\" for a field inside call N's result.
4. Plan sequences where outputs feed into inputs.
5. Respond only with the JSON object.

EXAMPLE:
User: \"Read invoice data and calculate March totals\"
Response: {
  \"plan\": \"Read CSV data, filter for March, calculate totals\",
  \"function_calls\": [
    {\"function_name\": \"read_csv\", \"parameters\": {\"file_path\": \"data/invoices.csv\"}, \"description\": \"Load invoice data\"},
    {\"function_name\": \"filter_data\", \"parameters\": {\"data\": \"{{output_from_previous}}\", \"column\": \"month\", \"operator\": \"equals\", \"value\": \"March\"}, \"description\": \"Filter March invoices\"},
    {\"function_name\": \"summarize_data\", \"parameters\": {\"data\": \"{{output_from_previous}}\", \"column\": \"amount\"}, \"description\": \"Calculate total amount\"}
  ]
}";

/// System prompt listing every available operation by signature and category.
pub fn build_system_prompt(schemas: &[OperationSchema]) -> String {
    let mut categories: Vec<&str> = Vec::new();
    for s in schemas {
        if !categories.contains(&s.category.as_str()) {
            categories.push(&s.category);
        }
    }

    let mut prompt = String::from(PROMPT_HEADER);
    prompt.push_str("\n\nAVAILABLE FUNCTIONS:\n");
    for category in categories {
        prompt.push_str(&format!("\n{}:\n", category.to_uppercase().replace('_', " ")));
        for s in schemas.iter().filter(|s| s.category == category) {
            prompt.push_str(&format!("- {}: {}\n", s.signature(), s.description));
        }
    }
    prompt.push('\n');
    prompt.push_str(PROMPT_RULES);
    prompt
}

/// Extract the outermost `{...}` span from model output and parse it as a Plan.
pub fn parse_plan_response(text: &str) -> Result<Plan, PlannerError> {
    let span = Regex::new(r"(?s)\{.*\}")
        .ok()
        .and_then(|re| re.find(text).map(|m| m.as_str()));
    let value: Value = match span {
        Some(json) => serde_json::from_str(json)?,
        None => serde_json::from_str(text.trim()).map_err(|_| PlannerError::NoJson)?,
    };
    Ok(Plan::from_value(value)?)
}

pub struct LlmPlanner<P> {
    provider: P,
    config: PlannerConfig,
    fallback: KeywordPlanner,
}

impl<P: LlmProvider> LlmPlanner<P> {
    pub fn new(provider: P, config: PlannerConfig) -> Self {
        Self {
            provider,
            config,
            fallback: KeywordPlanner::default(),
        }
    }

    pub fn with_fallback(mut self, fallback: KeywordPlanner) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// One attempt without failover.
    pub async fn try_plan(
        &self,
        query: &str,
        schemas: &[OperationSchema],
    ) -> Result<Plan, PlannerError> {
        let processed = preprocess_query(query);
        let mut request = LlmRequest::prompt(
            &self.config.model,
            build_system_prompt(schemas),
            format!("User Query: {}\n\nResponse (JSON only):", processed),
        );
        request.max_tokens = Some(self.config.max_tokens);
        request.temperature = Some(self.config.temperature);

        let stream = self.provider.complete_stream(request, None).await?;
        let text = collect_text(stream).await?;
        debug!("Planner response: {}", text);
        parse_plan_response(&text)
    }
}

#[async_trait::async_trait]
impl<P: LlmProvider> Planner for LlmPlanner<P> {
    fn name(&self) -> &str {
        "llm"
    }

    async fn plan(
        &self,
        query: &str,
        schemas: &[OperationSchema],
    ) -> planchain_core::Result<Plan> {
        match self.try_plan(query, schemas).await {
            Ok(plan) => {
                info!(
                    "Generated plan with {} function calls via {}",
                    plan.len(),
                    self.provider.name()
                );
                Ok(plan)
            }
            Err(e) => {
                warn!("LLM planning failed ({}), using keyword fallback", e);
                Ok(self.fallback.plan_for(query))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use planchain_core::{ParamDef, ParamType};

    #[test]
    fn extracts_json_from_chatter() {
        let text = "Sure! Here is the plan:\n{\"plan\": \"p\", \"function_calls\": [{\"function_name\": \"get_system_info\", \"parameters\": {}}]}\nHope that helps.";
        let plan = parse_plan_response(text).unwrap();
        assert_eq!(plan.plan, "p");
        assert_eq!(plan.function_calls[0].name(), "get_system_info");
    }

    #[test]
    fn no_json_is_error() {
        assert!(matches!(
            parse_plan_response("I cannot help with that."),
            Err(PlannerError::NoJson)
        ));
    }

    #[test]
    fn wrong_shape_is_invalid_plan() {
        assert!(matches!(
            parse_plan_response("{\"function_calls\": 5}"),
            Err(PlannerError::InvalidPlan(_))
        ));
    }

    #[test]
    fn prompt_lists_signatures_by_category() {
        let schemas = vec![
            OperationSchema::new("read_csv", "data_processing", "Read CSV")
                .param(ParamDef::required("file_path", ParamType::String, "path")),
            OperationSchema::new("send_email", "communication", "Send email"),
        ];
        let prompt = build_system_prompt(&schemas);
        assert!(prompt.contains("DATA PROCESSING:"));
        assert!(prompt.contains("- read_csv(file_path: string): Read CSV"));
        assert!(prompt.contains("{{output_from_previous}}"));
        assert!(prompt.find("DATA PROCESSING").unwrap() < prompt.find("COMMUNICATION").unwrap());
    }
}
