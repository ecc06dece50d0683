//! Tests for planchain-planner: LLM planning and keyword failover

use planchain_core::{OperationSchema, ParamDef, ParamType, PlannerConfig};
use planchain_llm::{
    CancellationToken, LlmError, LlmProvider, LlmRequest, LlmResult, LlmStream, StreamDelta,
};
use planchain_planner::*;
use std::sync::Mutex;

/// Replays a fixed response and keeps the last request it saw.
struct ScriptedProvider {
    reply: Result<Vec<String>, String>,
    seen: Mutex<Option<LlmRequest>>,
}

impl ScriptedProvider {
    fn replying(chunks: &[&str]) -> Self {
        Self {
            reply: Ok(chunks.iter().map(|c| c.to_string()).collect()),
            seen: Mutex::new(None),
        }
    }

    fn failing(message: &str) -> Self {
        Self {
            reply: Err(message.to_string()),
            seen: Mutex::new(None),
        }
    }
}

#[async_trait::async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete_stream(
        &self,
        request: LlmRequest,
        _cancel: Option<CancellationToken>,
    ) -> LlmResult<LlmStream> {
        *self.seen.lock().unwrap() = Some(request);
        match &self.reply {
            Ok(chunks) => {
                let deltas: Vec<LlmResult<StreamDelta>> = chunks
                    .iter()
                    .map(|c| Ok(StreamDelta::Text(c.clone())))
                    .collect();
                Ok(Box::pin(futures::stream::iter(deltas)))
            }
            Err(message) => Err(LlmError::RequestFailed(message.clone())),
        }
    }
}

fn schemas() -> Vec<OperationSchema> {
    vec![
        OperationSchema::new("read_csv", "data_processing", "Read CSV file and return data")
            .param(ParamDef::required("file_path", ParamType::String, "Path to the CSV file")),
        OperationSchema::new("summarize_data", "data_processing", "Summarize a numeric column")
            .param(ParamDef::required("data", ParamType::Array, "Rows"))
            .param(ParamDef::required("column", ParamType::String, "Column name")),
    ]
}

fn names(plan: &planchain_core::Plan) -> Vec<&str> {
    plan.function_calls.iter().map(|c| c.name()).collect()
}

// ===========================================================================
// LLM path
// ===========================================================================

#[tokio::test]
async fn llm_plan_is_parsed_from_streamed_chunks() {
    let provider = ScriptedProvider::replying(&[
        "{\"plan\": \"load then sum\", \"function_calls\": [",
        "{\"function_name\": \"read_csv\", \"parameters\": {\"file_path\": \"a.csv\"}},",
        "{\"function_name\": \"summarize_data\", \"parameters\": {\"data\": \"{{output_from_previous}}\", \"column\": \"amount\"}}",
        "]}",
    ]);
    let planner = LlmPlanner::new(provider, PlannerConfig::default());
    let plan = planner.plan("sum the amounts in a.csv", &schemas()).await.unwrap();

    assert_eq!(plan.plan, "load then sum");
    assert_eq!(names(&plan), vec!["read_csv", "summarize_data"]);
}

#[tokio::test]
async fn fenced_response_is_accepted() {
    let provider = ScriptedProvider::replying(&[
        "Here you go:\n```json\n",
        "{\"plan\": \"p\", \"function_calls\": [{\"function_name\": \"read_csv\", \"parameters\": {\"file_path\": \"x\"}}]}",
        "\n```",
    ]);
    let planner = LlmPlanner::new(provider, PlannerConfig::default());
    let plan = planner.try_plan("read x", &schemas()).await.unwrap();
    assert_eq!(names(&plan), vec!["read_csv"]);
}

#[tokio::test]
async fn request_carries_config_and_schemas() {
    let config = PlannerConfig {
        model: "test-model".to_string(),
        max_tokens: 256,
        temperature: 0.1,
    };
    let planner = LlmPlanner::new(
        ScriptedProvider::replying(&["{\"plan\": \"p\", \"function_calls\": []}"]),
        config,
    );
    planner.try_plan("do   w/ care", &schemas()).await.unwrap();

    let seen = planner_request(&planner);
    assert_eq!(seen.model, "test-model");
    assert_eq!(seen.max_tokens, Some(256));
    assert_eq!(seen.temperature, Some(0.1));
    let system = seen.system.unwrap();
    assert!(system.contains("read_csv(file_path: string)"));
    assert!(system.contains("summarize_data(data: array, column: string)"));
    assert!(seen.messages[0].content.contains("do with care"));
}

fn planner_request(planner: &LlmPlanner<ScriptedProvider>) -> LlmRequest {
    planner.provider().seen.lock().unwrap().clone().unwrap()
}

// ===========================================================================
// Failover
// ===========================================================================

#[tokio::test]
async fn prose_only_response_fails_over_to_keywords() {
    let provider = ScriptedProvider::replying(&["I'm not sure what you mean."]);
    let planner = LlmPlanner::new(provider, PlannerConfig::default());

    assert!(matches!(
        planner.try_plan("send an email", &schemas()).await,
        Err(PlannerError::NoJson)
    ));
    let plan = planner.plan("send an email", &schemas()).await.unwrap();
    assert_eq!(names(&plan), vec!["send_email"]);
}

#[tokio::test]
async fn provider_error_fails_over_to_keywords() {
    let planner = LlmPlanner::new(ScriptedProvider::failing("boom"), PlannerConfig::default())
        .with_fallback(KeywordPlanner::new().with_recipient("team@example.com"));

    assert!(matches!(
        planner.try_plan("send email", &schemas()).await,
        Err(PlannerError::Llm(_))
    ));
    let plan = planner.plan("send email", &schemas()).await.unwrap();
    assert_eq!(
        plan.function_calls[0].parameters.as_ref().unwrap()["to_email"],
        "team@example.com"
    );
}

#[tokio::test]
async fn malformed_json_fails_over() {
    let provider = ScriptedProvider::replying(&["{\"plan\": \"p\", \"function_calls\": [ }"]);
    let planner = LlmPlanner::new(provider, PlannerConfig::default());
    let plan = planner.plan("what is this machine", &schemas()).await.unwrap();
    assert_eq!(names(&plan), vec!["get_system_info"]);
}

// ===========================================================================
// Keyword planner through the trait
// ===========================================================================

#[tokio::test]
async fn keyword_planner_ignores_schemas() {
    let planner: &dyn Planner = &KeywordPlanner::new();
    assert_eq!(planner.name(), "keyword");
    let plan = planner.plan("read the file", &[]).await.unwrap();
    assert_eq!(names(&plan), vec!["read_file"]);
}
