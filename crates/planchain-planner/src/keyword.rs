//! Deterministic keyword planner. Used when no LLM is configured and as the
//! failover target when LLM output cannot be used.

use crate::Planner;
use planchain_core::{CallSpec, OperationSchema, Plan, Result};
use serde_json::json;

#[derive(Debug, Clone)]
pub struct KeywordPlanner {
    recipient: String,
}

impl Default for KeywordPlanner {
    fn default() -> Self {
        Self {
            recipient: "ops@localhost".to_string(),
        }
    }
}

impl KeywordPlanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Address used for email plans.
    pub fn with_recipient(mut self, recipient: impl Into<String>) -> Self {
        self.recipient = recipient.into();
        self
    }

    /// Map a query to a fixed plan. Always produces at least one call.
    pub fn plan_for(&self, query: &str) -> Plan {
        let q = query.to_lowercase();
        let has = |word: &str| q.contains(word);

        if has("email") && has("send") {
            Plan::new(
                "Send an email based on the user request",
                vec![CallSpec::new(
                    "send_email",
                    json!({
                        "to_email": self.recipient,
                        "subject": "Automated Email",
                        "body": "This is an automated email based on your request."
                    }),
                )
                .with_description("Send email to specified recipient")],
            )
        } else if has("file") && (has("read") || has("open")) {
            Plan::new(
                "Read a file as requested",
                vec![
                    CallSpec::new("read_file", json!({"file_path": "data/sample.txt"}))
                        .with_description("Read the specified file"),
                ],
            )
        } else if has("data") && (has("analyze") || has("process")) {
            Plan::new(
                "Analyze data as requested",
                vec![
                    CallSpec::new("read_csv", json!({"file_path": "data/sample.csv"}))
                        .with_description("Read CSV data for analysis"),
                    CallSpec::new(
                        "summarize_data",
                        json!({"data": "{{output_from_previous}}", "column": "amount"}),
                    )
                    .with_description("Summarize the data"),
                ],
            )
        } else {
            Plan::new(
                "Get current system information",
                vec![CallSpec::new("get_system_info", json!({}))
                    .with_description("Get basic system information")],
            )
        }
    }
}

#[async_trait::async_trait]
impl Planner for KeywordPlanner {
    fn name(&self) -> &str {
        "keyword"
    }

    async fn plan(&self, query: &str, _schemas: &[OperationSchema]) -> Result<Plan> {
        Ok(self.plan_for(query))
    }
}
