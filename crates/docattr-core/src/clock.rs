use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use docattr_store::Timestamp;

/// Millisecond wall clock that never repeats or goes backwards.
///
/// Every value handed out is strictly greater than the previous one, even
/// when two calls land in the same millisecond or the system clock steps
/// back. Object keys are built from these values, so two writes of the same
/// document never collide.
pub struct MonotonicClock {
    last_ms: Mutex<u64>,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            last_ms: Mutex::new(0),
        }
    }

    /// Next timestamp: `max(wall_clock, last + 1)`.
    pub fn now(&self) -> Timestamp {
        self.next_after(None)
    }

    /// Next timestamp that is also strictly greater than `floor`.
    pub fn next_after(&self, floor: Option<Timestamp>) -> Timestamp {
        let wall = Self::wall_clock_ms();
        let mut last = self.last_ms.lock().expect("clock mutex poisoned");
        let mut next = wall.max(last.saturating_add(1));
        if let Some(floor) = floor {
            next = next.max(floor.saturating_add(1));
        }
        *last = next;
        next
    }

    /// Last value handed out, or zero.
    pub fn last(&self) -> Timestamp {
        *self.last_ms.lock().expect("clock mutex poisoned")
    }

    fn wall_clock_ms() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MonotonicClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonotonicClock")
            .field("last_ms", &self.last())
            .finish()
    }
}
