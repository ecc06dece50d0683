//! Orchestrator: validate -> repair -> execute, with a bounded run history

use crate::engine::ExecutionEngine;
use crate::repair::PlanRepairer;
use crate::validator::validate;
use planchain_core::{ExecutionResult, OperationSchema, Plan, PlanchainConfig};
use planchain_ops::OperationRegistry;
use planchain_planner::Planner;
use serde::Serialize;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Whether a run invokes operations or only describes them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RunMode {
    #[default]
    Execute,
    Simulate,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct OrchestratorStatus {
    pub registered_operations: usize,
    pub categories: Vec<String>,
    pub history_len: usize,
    pub history_capacity: usize,
}

pub struct Orchestrator {
    engine: ExecutionEngine,
    repairer: PlanRepairer,
    history: RwLock<VecDeque<ExecutionResult>>,
    capacity: usize,
}

impl Orchestrator {
    pub fn new(registry: Arc<OperationRegistry>, config: &PlanchainConfig) -> Self {
        Self::from_parts(
            ExecutionEngine::from_config(registry, config),
            PlanRepairer::new(&config.repair),
            config.history.capacity,
        )
    }

    pub fn from_parts(engine: ExecutionEngine, repairer: PlanRepairer, capacity: usize) -> Self {
        Self {
            engine,
            repairer,
            history: RwLock::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
        }
    }

    pub fn engine(&self) -> &ExecutionEngine {
        &self.engine
    }

    pub fn registry(&self) -> &OperationRegistry {
        self.engine.registry()
    }

    /// Validate, repairing once if needed. Returns the runnable plan or the
    /// errors that remain after repair.
    pub fn prepare(&self, plan: Plan) -> Result<Plan, Vec<String>> {
        let (valid, errors) = validate(&plan.function_calls, self.registry());
        if valid {
            return Ok(plan);
        }
        warn!("Invalid function calls: {}", errors.join("; "));

        let repaired = self.repairer.repair(&plan);
        let (valid, errors) = validate(&repaired.function_calls, self.registry());
        if valid {
            info!("Plan repaired with default parameters");
            Ok(repaired)
        } else {
            warn!("Plan still invalid after repair: {}", errors.join("; "));
            Err(errors)
        }
    }

    /// Run a typed plan end to end and record the outcome.
    pub async fn orchestrate(&self, plan: Plan, mode: RunMode) -> ExecutionResult {
        let result = match self.prepare(plan.clone()) {
            Ok(ready) => match mode {
                RunMode::Execute => self.engine.execute(&ready).await,
                RunMode::Simulate => self.engine.simulate(&ready),
            },
            Err(errors) => ExecutionResult::failure(
                plan,
                format!("Plan validation failed: {}", errors.join("; ")),
            ),
        };
        self.record(result.clone()).await;
        result
    }

    /// Run raw planner JSON. A shape error is recorded as an execution error.
    pub async fn orchestrate_value(&self, raw: Value, mode: RunMode) -> ExecutionResult {
        match Plan::from_value(raw) {
            Ok(plan) => self.orchestrate(plan, mode).await,
            Err(e) => {
                let result =
                    ExecutionResult::failure(Plan::default(), format!("Execution error: {}", e));
                self.record(result.clone()).await;
                result
            }
        }
    }

    /// Ask `planner` for a plan over the registry's schemas, then orchestrate it.
    pub async fn plan_and_execute(
        &self,
        query: &str,
        planner: &dyn Planner,
        mode: RunMode,
    ) -> ExecutionResult {
        info!("Processing query with {} planner: {}", planner.name(), query);
        let schemas = self.registry().export_schemas();
        match planner.plan(query, &schemas).await {
            Ok(plan) => self.orchestrate(plan, mode).await,
            Err(e) => {
                warn!("Planning failed: {}", e);
                let result = ExecutionResult::failure(
                    Plan::new(query, Vec::new()),
                    format!("Planning failed: {}", e),
                );
                self.record(result.clone()).await;
                result
            }
        }
    }

    async fn record(&self, result: ExecutionResult) {
        if self.capacity == 0 {
            return;
        }
        let mut history = self.history.write().await;
        while history.len() >= self.capacity {
            history.pop_front();
        }
        history.push_back(result);
    }

    // --- History ---

    /// Retained results, oldest first.
    pub async fn history(&self) -> Vec<ExecutionResult> {
        self.history.read().await.iter().cloned().collect()
    }

    pub async fn last_result(&self) -> Option<ExecutionResult> {
        self.history.read().await.back().cloned()
    }

    pub async fn clear_history(&self) {
        self.history.write().await.clear();
    }

    // --- Registry views ---

    pub fn search_functions(&self, keyword: &str) -> Vec<OperationSchema> {
        self.registry().search(keyword).into_iter().cloned().collect()
    }

    pub fn functions_by_category(&self, category: &str) -> Vec<OperationSchema> {
        self.registry()
            .list_by_category(category)
            .iter()
            .map(|op| op.schema().clone())
            .collect()
    }

    pub fn categories(&self) -> Vec<String> {
        self.registry()
            .categories()
            .into_iter()
            .map(String::from)
            .collect()
    }

    pub async fn status(&self) -> OrchestratorStatus {
        OrchestratorStatus {
            registered_operations: self.registry().len(),
            categories: self.categories(),
            history_len: self.history.read().await.len(),
            history_capacity: self.capacity,
        }
    }

    /// First output of `function_name` in `result`, `data` preferred.
    pub fn function_output(result: &ExecutionResult, function_name: &str) -> Option<Value> {
        result.function_output(function_name)
    }
}
