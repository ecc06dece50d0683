//! Wiring shared by the CLI subcommands

use anyhow::Context;
use planchain_core::{ExecutionResult, PlanchainConfig};
use planchain_engine::{Orchestrator, RunMode};
use planchain_llm::AnthropicProvider;
use planchain_planner::{KeywordPlanner, LlmPlanner, Planner};
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Config from `path` (or the default location), with an optional
/// workspace override applied on top.
pub fn load_config(path: Option<&Path>, workspace: Option<PathBuf>) -> PlanchainConfig {
    let path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(PlanchainConfig::default_path);
    let mut config = PlanchainConfig::load(&path);
    if let Some(ws) = workspace {
        config.ops.workspace_root = ws;
    }
    config
}

pub fn build_orchestrator(config: &PlanchainConfig) -> anyhow::Result<Orchestrator> {
    let registry = planchain_ops::create_default_registry(&config.ops)
        .context("failed to build operation registry")?;
    info!(
        "Registered {} operations in {} categories",
        registry.len(),
        registry.categories().len()
    );
    Ok(Orchestrator::new(Arc::new(registry), config))
}

/// LLM planner when `ANTHROPIC_API_KEY` is set, keyword planner otherwise.
pub fn select_planner(config: &PlanchainConfig) -> Box<dyn Planner> {
    match AnthropicProvider::from_env() {
        Some(provider) => {
            info!("Using LLM planner ({})", config.planner.model);
            Box::new(LlmPlanner::new(provider, config.planner.clone()))
        }
        None => {
            info!("ANTHROPIC_API_KEY not set - using keyword planner");
            Box::new(KeywordPlanner::new())
        }
    }
}

/// Read a plan file as raw JSON. Shape checking is left to the engine so
/// malformed plans are reported like any other execution error.
pub fn read_plan(path: &Path) -> anyhow::Result<Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read plan file {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("{} is not valid JSON", path.display()))
}

/// One query per line; blank lines are skipped.
pub fn read_queries(path: &Path) -> anyhow::Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read query file {}", path.display()))?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect())
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub total_queries: usize,
    pub successful: usize,
    pub failed: usize,
    /// Fraction in `0.0..=1.0`; `0.0` for an empty batch.
    pub success_rate: f64,
    pub results: Vec<ExecutionResult>,
}

impl BatchReport {
    pub fn from_results(results: Vec<ExecutionResult>) -> Self {
        let successful = results.iter().filter(|r| r.success).count();
        let total = results.len();
        Self {
            total_queries: total,
            successful,
            failed: total - successful,
            success_rate: if total == 0 {
                0.0
            } else {
                successful as f64 / total as f64
            },
            results,
        }
    }
}

/// Plan and run each query in order. A failed query does not stop the batch.
pub async fn run_batch(
    orchestrator: &Orchestrator,
    queries: &[String],
    planner: &dyn Planner,
    mode: RunMode,
) -> BatchReport {
    let mut results = Vec::with_capacity(queries.len());
    for (i, query) in queries.iter().enumerate() {
        info!("Processing batch query {}/{}", i + 1, queries.len());
        results.push(orchestrator.plan_and_execute(query, planner, mode).await);
    }
    BatchReport::from_results(results)
}
