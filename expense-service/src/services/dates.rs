//! Save-timestamp resolution for past mode.

use crate::models::YearMonth;
use chrono::{DateTime, Utc};

/// Timestamp to stamp on a batch: noon UTC on the 1st of the past-mode
/// month when one is set, otherwise `now`.
pub fn resolve_timestamp(past_month: Option<YearMonth>, now: DateTime<Utc>) -> DateTime<Utc> {
    match past_month {
        Some(month) => month.past_mode_timestamp(),
        None => now,
    }
}
