//! Operation registry and trait definitions
//!
//! Each operation is a self-contained unit implementing the Operation trait.
//! The registry is filled once at startup, then shared read-only behind an
//! `Arc` by every run.

use planchain_core::{Error, OperationOutput, OperationSchema, Params, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Implement this to add a new operation.
///
/// `invoke` returns `Ok` with `success = false` for expected failures
/// (missing file, bad data). An `Err` means the call itself was unusable,
/// e.g. a required parameter had the wrong type. The engine records both
/// as a failed call.
#[async_trait::async_trait]
pub trait Operation: Send + Sync {
    /// Declared name, parameters, and category.
    fn schema(&self) -> &OperationSchema;

    fn name(&self) -> &str {
        &self.schema().name
    }

    fn category(&self) -> &str {
        &self.schema().category
    }

    /// Execute the operation with already-resolved parameters.
    async fn invoke(&self, params: Params) -> Result<OperationOutput>;
}

/// Name → operation lookup. Registration order is preserved for listings.
pub struct OperationRegistry {
    operations: Vec<Arc<dyn Operation>>,
    index: HashMap<String, usize>,
}

impl Default for OperationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self {
            operations: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Register an operation. A name that is already present is rejected.
    pub fn register(&mut self, operation: impl Operation + 'static) -> Result<()> {
        self.register_arc(Arc::new(operation))
    }

    pub fn register_arc(&mut self, operation: Arc<dyn Operation>) -> Result<()> {
        let name = operation.name().to_string();
        if self.index.contains_key(&name) {
            return Err(Error::DuplicateOperation(name));
        }
        info!("Registered operation: {} ({})", name, operation.category());
        self.index.insert(name, self.operations.len());
        self.operations.push(operation);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<dyn Operation>> {
        self.index.get(name).map(|&i| self.operations[i].clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn schema(&self, name: &str) -> Option<&OperationSchema> {
        self.index.get(name).map(|&i| self.operations[i].schema())
    }

    pub fn list_by_category(&self, category: &str) -> Vec<Arc<dyn Operation>> {
        self.operations
            .iter()
            .filter(|op| op.category() == category)
            .cloned()
            .collect()
    }

    /// Distinct categories in first-registration order.
    pub fn categories(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for op in &self.operations {
            if !seen.contains(&op.category()) {
                seen.push(op.category());
            }
        }
        seen
    }

    pub fn names(&self) -> Vec<&str> {
        self.operations.iter().map(|op| op.name()).collect()
    }

    /// Schemas of every operation, for planners and the validator.
    pub fn export_schemas(&self) -> Vec<OperationSchema> {
        self.operations.iter().map(|op| op.schema().clone()).collect()
    }

    /// Case-insensitive match on name, description, or category.
    pub fn search(&self, keyword: &str) -> Vec<&OperationSchema> {
        let needle = keyword.to_lowercase();
        self.operations
            .iter()
            .map(|op| op.schema())
            .filter(|s| {
                s.name.to_lowercase().contains(&needle)
                    || s.description.to_lowercase().contains(&needle)
                    || s.category.to_lowercase().contains(&needle)
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}
