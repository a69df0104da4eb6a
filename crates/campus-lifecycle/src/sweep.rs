//! Retention sweep for archived lessons.
//!
//! Archived lessons past the retention window are eligible for permanent
//! deletion. The sweep is periodic, idempotent and externally triggered;
//! a failure on one lesson is logged and the batch continues, so a single
//! broken document never blocks the rest.

use chrono::{DateTime, Duration, Utc};

/// How long an archived lesson is kept before the sweep may delete it.
pub const RETENTION_DAYS: i64 = 30;

/// Archive timestamps strictly before this instant are expired.
pub fn retention_cutoff(now: DateTime<Utc>) -> DateTime<Utc> {
    now - Duration::days(RETENTION_DAYS)
}

/// What one sweep run did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub purged: u64,
    pub failed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cutoff_is_thirty_days_back() {
        let now = Utc::now();
        let cutoff = retention_cutoff(now);
        assert_eq!(now - cutoff, Duration::days(30));
    }
}
