//! planchain planners: turn a natural-language query into a Plan
//!
//! Two implementations share one trait: a deterministic keyword matcher and
//! an LLM-backed planner that fails over to it.

pub mod keyword;
pub mod llm;
pub mod query;

pub use keyword::KeywordPlanner;
pub use llm::{build_system_prompt, parse_plan_response, LlmPlanner, PlannerError};
pub use query::preprocess_query;

use planchain_core::{OperationSchema, Plan, Result};

#[async_trait::async_trait]
pub trait Planner: Send + Sync {
    fn name(&self) -> &str;

    /// Produce a plan for `query` using only the given operations.
    async fn plan(&self, query: &str, schemas: &[OperationSchema]) -> Result<Plan>;
}
