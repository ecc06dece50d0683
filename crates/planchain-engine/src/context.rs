//! Per-run execution context: call results keyed by call index

use planchain_core::{CallResult, Error, Result};
use std::collections::BTreeMap;

/// Results recorded so far in one run. Grows monotonically: index `n` can
/// only be recorded once `0..n` are present.
#[derive(Debug, Default, Clone)]
pub struct ExecutionContext {
    results: BTreeMap<usize, CallResult>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derived lookup key for a call index, e.g. `result_2`.
    pub fn key(index: usize) -> String {
        format!("result_{}", index)
    }

    /// Record the result for the next call index.
    pub fn record(&mut self, result: CallResult) -> Result<()> {
        let expected = self.results.len();
        if result.call_index != expected {
            return Err(Error::Engine(format!(
                "out-of-order result: expected call index {}, got {}",
                expected, result.call_index
            )));
        }
        self.results.insert(result.call_index, result);
        Ok(())
    }

    pub fn get(&self, index: usize) -> Option<&CallResult> {
        self.results.get(&index)
    }

    /// Result with the highest call index.
    pub fn latest(&self) -> Option<&CallResult> {
        self.results.values().next_back()
    }

    /// `(result_<i>, result)` pairs in ascending index order.
    pub fn entries(&self) -> impl Iterator<Item = (String, &CallResult)> {
        self.results.iter().map(|(i, r)| (Self::key(*i), r))
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn into_results(self) -> Vec<CallResult> {
        self.results.into_values().collect()
    }
}
