//! Memory admission control for attribution writes.
//!
//! Pending attribute maps live in memory until a worker persists them. A
//! write is refused while the bytes already pending, plus the incoming
//! update scaled by `headroom_factor`, would exceed 90% of the budget.

use serde::{Deserialize, Serialize};

use crate::error::{ServerError, ServerResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdmissionConfig {
    pub memory_budget_bytes: u64,
    /// Multiplier applied to an update's size to estimate its working set.
    pub headroom_factor: u64,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            memory_budget_bytes: 1024 * 1024 * 1024,
            headroom_factor: 100,
        }
    }
}

impl AdmissionConfig {
    /// Usable part of the budget.
    pub fn limit(&self) -> u64 {
        self.memory_budget_bytes / 10 * 9
    }

    pub fn check(&self, pending_bytes: usize, update_len: usize) -> ServerResult<()> {
        let needed = (pending_bytes as u64)
            .saturating_add((update_len as u64).saturating_mul(self.headroom_factor));
        if needed > self.limit() {
            return Err(ServerError::Overloaded(format!(
                "not enough memory to accept a {update_len}-byte update \
                 ({pending_bytes} bytes pending, limit {})",
                self.limit()
            )));
        }
        Ok(())
    }
}
