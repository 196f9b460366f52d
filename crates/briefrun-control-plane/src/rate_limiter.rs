//! Monthly and daily request quotas.
//!
//! Counters are bucketed by calendar period key and live behind one mutex, so
//! checking and reserving a slot is a single atomic step. A request first
//! takes a [`UsagePermit`]; the permit is committed once the work it admits
//! has been started. Dropping an uncommitted permit gives the slot back.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use briefrun_core::{QuotaKind, QuotaUsage, UsageSnapshot};
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::warn;

/// Configured quota sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaLimits {
    pub monthly: u64,
    pub daily: u64,
}

/// Request refused because a quota for the current period is used up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{kind} limit exceeded ({limit})")]
pub struct QuotaExceeded {
    pub kind: QuotaKind,
    pub limit: u64,
}

#[derive(Debug, Default)]
struct Counters {
    monthly: HashMap<String, u64>,
    daily: HashMap<String, u64>,
}

impl Counters {
    fn bucket(&mut self, kind: QuotaKind) -> &mut HashMap<String, u64> {
        match kind {
            QuotaKind::Monthly => &mut self.monthly,
            QuotaKind::Daily => &mut self.daily,
        }
    }

    fn get(&self, kind: QuotaKind, key: &str) -> u64 {
        let bucket = match kind {
            QuotaKind::Monthly => &self.monthly,
            QuotaKind::Daily => &self.daily,
        };
        bucket.get(key).copied().unwrap_or(0)
    }

    fn add(&mut self, kind: QuotaKind, key: &str) {
        *self.bucket(kind).entry(key.to_string()).or_insert(0) += 1;
    }

    fn sub(&mut self, kind: QuotaKind, key: &str) {
        if let Some(count) = self.bucket(kind).get_mut(key) {
            *count = count.saturating_sub(1);
        }
    }
}

/// Period keys for one instant.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PeriodKeys {
    month: String,
    day: String,
}

impl PeriodKeys {
    fn at(now: DateTime<Utc>) -> Self {
        Self {
            month: QuotaKind::Monthly.period_key(now),
            day: QuotaKind::Daily.period_key(now),
        }
    }
}

/// Shared rate limiter.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    limits: QuotaLimits,
    counters: Arc<Mutex<Counters>>,
}

impl RateLimiter {
    /// Create a limiter with empty counters.
    pub fn new(limits: QuotaLimits) -> Self {
        Self {
            limits,
            counters: Arc::new(Mutex::new(Counters::default())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Counters> {
        self.counters.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn evaluate(&self, counters: &Counters, keys: &PeriodKeys) -> Result<(), QuotaExceeded> {
        // The broader quota is reported first.
        if counters.get(QuotaKind::Monthly, &keys.month) >= self.limits.monthly {
            return Err(QuotaExceeded {
                kind: QuotaKind::Monthly,
                limit: self.limits.monthly,
            });
        }
        if counters.get(QuotaKind::Daily, &keys.day) >= self.limits.daily {
            return Err(QuotaExceeded {
                kind: QuotaKind::Daily,
                limit: self.limits.daily,
            });
        }
        Ok(())
    }

    /// Read-only admission check.
    pub fn check(&self, now: DateTime<Utc>) -> Result<(), QuotaExceeded> {
        let keys = PeriodKeys::at(now);
        let counters = self.lock();
        self.evaluate(&counters, &keys)
    }

    /// Count one request against both quotas.
    pub fn increment(&self, now: DateTime<Utc>) {
        let keys = PeriodKeys::at(now);
        let mut counters = self.lock();
        counters.add(QuotaKind::Monthly, &keys.month);
        counters.add(QuotaKind::Daily, &keys.day);
    }

    /// Check and reserve a slot in one step.
    pub fn try_acquire(&self, now: DateTime<Utc>) -> Result<UsagePermit, QuotaExceeded> {
        let keys = PeriodKeys::at(now);
        let mut counters = self.lock();

        if let Err(exceeded) = self.evaluate(&counters, &keys) {
            warn!(
                kind = %exceeded.kind,
                limit = exceeded.limit,
                "Quota exceeded, rejecting request"
            );
            return Err(exceeded);
        }

        counters.add(QuotaKind::Monthly, &keys.month);
        counters.add(QuotaKind::Daily, &keys.day);
        drop(counters);

        Ok(UsagePermit {
            counters: Arc::clone(&self.counters),
            keys,
            committed: false,
        })
    }

    /// Usage of both quotas in the periods containing `now`.
    pub fn usage(&self, now: DateTime<Utc>) -> UsageSnapshot {
        let keys = PeriodKeys::at(now);
        let counters = self.lock();
        UsageSnapshot {
            monthly: QuotaUsage {
                used: counters.get(QuotaKind::Monthly, &keys.month),
                limit: self.limits.monthly,
                period: keys.month,
            },
            daily: QuotaUsage {
                used: counters.get(QuotaKind::Daily, &keys.day),
                limit: self.limits.daily,
                period: keys.day,
            },
        }
    }
}

/// A reserved quota slot.
///
/// Call [`UsagePermit::commit`] to keep the slot; dropping the permit
/// without committing releases it.
#[derive(Debug)]
#[must_use = "an uncommitted permit releases its quota slot when dropped"]
pub struct UsagePermit {
    counters: Arc<Mutex<Counters>>,
    keys: PeriodKeys,
    committed: bool,
}

impl UsagePermit {
    /// Keep the reserved slot.
    pub fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for UsagePermit {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        let mut counters = self.counters.lock().unwrap_or_else(PoisonError::into_inner);
        counters.sub(QuotaKind::Monthly, &self.keys.month);
        counters.sub(QuotaKind::Daily, &self.keys.day);
    }
}
