use crate::store::{CacheError, CacheResult};

/// Outcome of an opportunistic cache operation.
///
/// Writes and evictions on the fetch path must never change the response the
/// page gets, so their failures are dropped. Dropping has to be spelled out:
/// call [`BestEffort::ignore`] (logs the failure) or inspect the result.
#[must_use = "call `.ignore()` to discard a best-effort cache outcome"]
#[derive(Debug)]
pub struct BestEffort {
    operation: &'static str,
    outcome: CacheResult<()>,
}

impl BestEffort {
    pub fn new(operation: &'static str, outcome: CacheResult<()>) -> Self {
        Self { operation, outcome }
    }

    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn error(&self) -> Option<&CacheError> {
        self.outcome.as_ref().err()
    }

    pub fn into_result(self) -> CacheResult<()> {
        self.outcome
    }

    /// Discard the outcome, logging a failure.
    pub fn ignore(self) {
        if let Err(e) = self.outcome {
            tracing::warn!("Best-effort {} failed: {}", self.operation, e);
        }
    }
}
