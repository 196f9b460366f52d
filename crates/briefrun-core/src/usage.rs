//! Calendar-bucketed usage accounting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which quota a request ran into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuotaKind {
    Daily,
    Monthly,
}

impl QuotaKind {
    /// Bucket key for the period containing `now`.
    ///
    /// `YYYY-MM` for monthly, `YYYY-MM-DD` for daily. A new period simply
    /// produces a new key; old keys are never expired.
    pub fn period_key(&self, now: DateTime<Utc>) -> String {
        match self {
            Self::Monthly => now.format("%Y-%m").to_string(),
            Self::Daily => now.format("%Y-%m-%d").to_string(),
        }
    }
}

impl fmt::Display for QuotaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Daily => f.write_str("daily"),
            Self::Monthly => f.write_str("monthly"),
        }
    }
}

/// Usage of one quota in its current period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaUsage {
    pub period: String,
    pub used: u64,
    pub limit: u64,
}

impl QuotaUsage {
    /// Requests left before rejection begins.
    pub fn remaining(&self) -> u64 {
        self.limit.saturating_sub(self.used)
    }
}

/// Usage of both quotas at one instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageSnapshot {
    pub monthly: QuotaUsage,
    pub daily: QuotaUsage,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_period_keys() {
        let now = Utc.with_ymd_and_hms(2024, 2, 29, 23, 59, 59).unwrap();
        assert_eq!(QuotaKind::Monthly.period_key(now), "2024-02");
        assert_eq!(QuotaKind::Daily.period_key(now), "2024-02-29");
    }

    #[test]
    fn test_remaining_saturates() {
        let usage = QuotaUsage {
            period: "2024-02".into(),
            used: 12,
            limit: 10,
        };
        assert_eq!(usage.remaining(), 0);
    }
}
