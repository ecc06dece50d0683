//! Sequential plan execution
//!
//! Each call goes through resolve -> invoke -> record, in plan order. A
//! failed call on a critical operation stops the run; everything recorded
//! up to that point is still returned.

use crate::context::ExecutionContext;
use crate::resolver::Resolver;
use futures::FutureExt;
use planchain_core::{
    CallResult, CallSpec, EngineConfig, ExecutionResult, OperationOutput, Params, Plan,
    PlanchainConfig, Result,
};
use planchain_ops::OperationRegistry;
use serde_json::Value;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

pub const NO_CALLS_MESSAGE: &str = "No function calls to execute";

pub struct ExecutionEngine {
    registry: Arc<OperationRegistry>,
    resolver: Resolver,
    critical: HashSet<String>,
}

impl ExecutionEngine {
    /// Engine with the default critical set and strict reference resolution.
    pub fn new(registry: Arc<OperationRegistry>) -> Self {
        Self {
            registry,
            resolver: Resolver::default(),
            critical: EngineConfig::default().critical_operations.into_iter().collect(),
        }
    }

    pub fn from_config(registry: Arc<OperationRegistry>, config: &PlanchainConfig) -> Self {
        Self {
            registry,
            resolver: Resolver::new(&config.resolver),
            critical: config.engine.critical_operations.iter().cloned().collect(),
        }
    }

    pub fn with_critical_operations<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.critical = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_resolver(mut self, resolver: Resolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn registry(&self) -> &Arc<OperationRegistry> {
        &self.registry
    }

    pub fn is_critical(&self, operation: &str) -> bool {
        self.critical.contains(operation)
    }

    /// Execute a typed plan. Never fails: every fault ends up in the result.
    pub async fn execute(&self, plan: &Plan) -> ExecutionResult {
        let started = Instant::now();
        match self.run(plan, started).await {
            Ok(result) => result,
            Err(e) => {
                error!("Error executing plan: {}", e);
                ExecutionResult::new(
                    plan.clone(),
                    Vec::new(),
                    format!("Execution error: {}", e),
                    false,
                    elapsed_ms(started),
                )
            }
        }
    }

    /// Execute raw planner JSON. A shape error is reported as an execution error.
    pub async fn execute_value(&self, raw: Value) -> ExecutionResult {
        match Plan::from_value(raw) {
            Ok(plan) => self.execute(&plan).await,
            Err(e) => {
                error!("Rejected raw plan: {}", e);
                ExecutionResult::failure(Plan::default(), format!("Execution error: {}", e))
            }
        }
    }

    /// Produce synthetic successful results without invoking anything.
    pub fn simulate(&self, plan: &Plan) -> ExecutionResult {
        if plan.is_empty() {
            return ExecutionResult::failure(plan.clone(), NO_CALLS_MESSAGE);
        }
        let results = plan
            .function_calls
            .iter()
            .enumerate()
            .map(|(i, call)| {
                let output = OperationOutput::ok()
                    .with("simulated", true)
                    .with("message", format!("Simulated execution of {}", call.name()));
                let params = call.parameters.clone().unwrap_or_default();
                CallResult::from_output(output, call, i, params)
            })
            .collect();
        ExecutionResult::new(plan.clone(), results, "Simulation completed", true, 0)
    }

    async fn run(&self, plan: &Plan, started: Instant) -> Result<ExecutionResult> {
        info!("Executing plan: {}", plan.plan);
        if plan.is_empty() {
            return Ok(ExecutionResult::failure(plan.clone(), NO_CALLS_MESSAGE));
        }

        let total = plan.len();
        let mut ctx = ExecutionContext::new();
        let mut halted: Option<(String, usize)> = None;

        for (i, call) in plan.function_calls.iter().enumerate() {
            info!("Executing function {}/{}: {}", i + 1, total, call.name());
            let result = self.execute_call(call, i, &ctx).await;
            let critical_failure = !result.success && self.is_critical(call.name());
            ctx.record(result)?;

            if critical_failure {
                warn!("Critical function failed: {} (call {})", call.name(), i);
                halted = Some((call.name().to_string(), i));
                break;
            }
        }

        let results = ctx.into_results();
        let success = results.iter().all(|r| r.success);
        let message = match halted {
            Some((name, i)) => format!(
                "Execution halted: critical function '{}' failed at call {}",
                name, i
            ),
            None => "Execution completed".to_string(),
        };
        let result =
            ExecutionResult::new(plan.clone(), results, message, success, elapsed_ms(started));
        info!(
            "Plan finished: {}/{} succeeded in {}ms",
            result.execution_summary.successful_functions,
            result.execution_summary.total_functions,
            result.execution_summary.elapsed_ms
        );
        Ok(result)
    }

    async fn execute_call(
        &self,
        call: &CallSpec,
        index: usize,
        ctx: &ExecutionContext,
    ) -> CallResult {
        let raw = call.parameters.clone().unwrap_or_default();
        let name = call.name();

        let Some(operation) = self.registry.lookup(name) else {
            warn!("Function '{}' not found (call {})", name, index);
            return CallResult::failed(call, index, format!("Function '{}' not found", name), raw);
        };

        let params = self.resolve_params(&raw, index, ctx);
        debug!(
            "Calling {} with parameters: {}",
            name,
            serde_json::to_string(&params).unwrap_or_default()
        );

        let outcome = AssertUnwindSafe(operation.invoke(params.clone()))
            .catch_unwind()
            .await;
        let result = match outcome {
            Ok(Ok(output)) => CallResult::from_output(output, call, index, params),
            Ok(Err(e)) => CallResult::failed(call, index, e.to_string(), params),
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!("Function {} panicked: {}", name, message);
                CallResult::failed(call, index, format!("operation panicked: {}", message), params)
            }
        };

        match &result.error {
            Some(err) => warn!("Function {} failed: {}", name, err),
            None => info!("Function {} completed with success: {}", name, result.success),
        }
        result
    }

    /// Resolve every parameter; an unresolvable reference becomes `null`.
    fn resolve_params(&self, raw: &Params, index: usize, ctx: &ExecutionContext) -> Params {
        raw.iter()
            .map(|(key, value)| {
                let resolved = match self.resolver.resolve(value, ctx) {
                    Ok(v) => v,
                    Err(e) => {
                        warn!(
                            "Call {}: could not resolve {} = {}: {}",
                            index, key, value, e
                        );
                        Value::Null
                    }
                };
                (key.clone(), resolved)
            })
            .collect()
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
