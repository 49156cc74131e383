//! In-process Gemini and PureCM services.
//!
//! Both keep their state behind `Arc<RwLock<_>>`, so a clone handed to an
//! adapter and the clone kept by a test observe the same records. Mutating
//! service calls are counted, which is how idempotence is asserted: a second
//! pass over unchanged data must not raise the count.
//!
//! Helper methods (`add_*`, `edit_*`) act like a user working in the system:
//! they bump modification times but are not counted as writes.

mod gemini;
mod purecm;

pub use gemini::MemoryGemini;
pub use purecm::MemoryPureCm;

use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Duration, TimeZone, Utc};

/// Settable clock shared by the memory services of one scenario.
#[derive(Debug, Clone)]
pub struct Clock {
    now: Arc<RwLock<DateTime<Utc>>>,
}

impl Default for Clock {
    fn default() -> Self {
        let start = Utc
            .with_ymd_and_hms(2024, 1, 1, 9, 0, 0)
            .single()
            .unwrap_or_default();
        Self::at(start)
    }
}

impl Clock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(RwLock::new(now)),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        *self.now.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.write().unwrap_or_else(PoisonError::into_inner) = now;
    }

    pub fn advance(&self, seconds: i64) {
        let mut now = self.now.write().unwrap_or_else(PoisonError::into_inner);
        *now += Duration::seconds(seconds);
    }
}
