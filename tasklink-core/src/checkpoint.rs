//! Sync checkpoints.
//!
//! A checkpoint is the last modification time the engine has already
//! accounted for, stored as six integer fields at second resolution. An
//! unset checkpoint (any of year/month/day zero) reads as the Unix epoch.

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// Field order matters: the derived `Ord` is chronological.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Checkpoint {
    pub year: u32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
}

impl Checkpoint {
    pub const UNSET: Checkpoint = Checkpoint {
        year: 0,
        month: 0,
        day: 0,
        hour: 0,
        minute: 0,
        second: 0,
    };

    /// Truncates to whole seconds.
    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        Self {
            year: at.year().max(0) as u32,
            month: at.month(),
            day: at.day(),
            hour: at.hour(),
            minute: at.minute(),
            second: at.second(),
        }
    }

    pub fn is_unset(&self) -> bool {
        self.year == 0 || self.month == 0 || self.day == 0
    }

    /// The instant this checkpoint stands for. Unset or out-of-range fields
    /// read as the epoch.
    pub fn to_datetime(&self) -> DateTime<Utc> {
        if self.is_unset() {
            return DateTime::<Utc>::default();
        }
        NaiveDate::from_ymd_opt(self.year as i32, self.month, self.day)
            .and_then(|d| d.and_hms_opt(self.hour, self.minute, self.second))
            .map(|naive| Utc.from_utc_datetime(&naive))
            .unwrap_or_default()
    }

    /// True when a record modified at `modified` has already been accounted
    /// for by this checkpoint. Comparison happens at second resolution.
    pub fn covers(&self, modified: DateTime<Utc>) -> bool {
        !self.is_unset() && Checkpoint::from_datetime(modified) <= *self
    }
}

impl From<DateTime<Utc>> for Checkpoint {
    fn from(at: DateTime<Utc>) -> Self {
        Checkpoint::from_datetime(at)
    }
}
