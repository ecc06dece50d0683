//! Default-parameter repair for plans that failed validation

use planchain_core::{Params, Plan, RepairConfig};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

/// Injects configured defaults for missing parameters.
///
/// Repair only fills gaps; it cannot make an unknown operation valid, so
/// the result must be validated again.
#[derive(Debug, Clone, Default)]
pub struct PlanRepairer {
    defaults: BTreeMap<String, BTreeMap<String, Value>>,
}

impl PlanRepairer {
    pub fn new(config: &RepairConfig) -> Self {
        Self {
            defaults: config.defaults.clone(),
        }
    }

    /// Add or replace the defaults for one operation.
    pub fn with_defaults(
        mut self,
        operation: impl Into<String>,
        defaults: BTreeMap<String, Value>,
    ) -> Self {
        self.defaults.insert(operation.into(), defaults);
        self
    }

    /// Return a repaired copy of `plan`. Every call gets a parameters map;
    /// calls with a default table get each missing entry filled in.
    pub fn repair(&self, plan: &Plan) -> Plan {
        let mut repaired = plan.clone();
        for (i, call) in repaired.function_calls.iter_mut().enumerate() {
            let params = call.parameters.get_or_insert_with(Params::new);
            let Some(defaults) = call
                .function_name
                .as_deref()
                .and_then(|name| self.defaults.get(name))
            else {
                continue;
            };
            for (key, value) in defaults {
                if !params.contains_key(key) {
                    debug!("repair: call {} gets default {} = {}", i + 1, key, value);
                    params.insert(key.clone(), value.clone());
                }
            }
        }
        repaired
    }
}
