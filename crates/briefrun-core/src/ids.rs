//! Newtype wrappers for identifiers to ensure type safety.
//!
//! A [`TaskId`] embeds the [`RunId`] that owns it, so a result reported by a
//! worker can be routed back to its run without a lookup table. The string
//! form is `<run id>_task_<ordinal>` and only appears at the wire/storage
//! boundary; inside the crate a task id is the `(run, ordinal)` pair.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::CoreError;

/// Delimiter between the run id and the ordinal in a task id.
pub const TASK_ID_DELIMITER: &str = "_task_";

/// Width the ordinal is zero-padded to. Keeps lexicographic order of task ids
/// equal to ordinal order for every task of a run.
pub const ORDINAL_WIDTH: usize = 4;

/// Maximum number of tasks a single run may hold.
pub const MAX_TASKS_PER_RUN: usize = 10_000;

/// Length of the random suffix of a generated run id.
const RUN_SUFFIX_LEN: usize = 12;

/// Unique identifier for a Run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RunId(String);

impl RunId {
    /// Create a new RunId from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a new RunId: coarse timestamp plus a random suffix.
    pub fn generate(now: DateTime<Utc>) -> Self {
        let random = Uuid::new_v4().simple().to_string();
        let suffix = &random[..RUN_SUFFIX_LEN];
        Self(format!("{}_{}", now.timestamp(), suffix))
    }

    /// Get the inner string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume and return the inner string.
    pub fn into_inner(self) -> String {
        self.0
    }

    /// Identifier of the task at `ordinal` within this run.
    pub fn task(&self, ordinal: u32) -> TaskId {
        TaskId::new(self.clone(), ordinal)
    }

    /// Key prefix shared by every task id of this run.
    pub fn task_prefix(&self) -> String {
        format!("{}{}", self.0, TASK_ID_DELIMITER)
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for RunId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RunId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Identifier for one task of a run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId {
    run_id: RunId,
    ordinal: u32,
}

impl TaskId {
    /// Create a TaskId from its owning run and zero-based ordinal.
    pub fn new(run_id: RunId, ordinal: u32) -> Self {
        Self { run_id, ordinal }
    }

    /// Parse the wire form `<run id>_task_<ordinal>`.
    ///
    /// The run id is recovered by splitting on the last delimiter, so run ids
    /// that themselves contain `_task_` still round-trip.
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let malformed = || CoreError::MalformedTaskId(raw.to_string());

        let (run_part, ordinal_part) = raw.rsplit_once(TASK_ID_DELIMITER).ok_or_else(malformed)?;

        if run_part.is_empty()
            || ordinal_part.is_empty()
            || !ordinal_part.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(malformed());
        }

        let ordinal = ordinal_part.parse::<u32>().map_err(|_| malformed())?;

        Ok(Self {
            run_id: RunId::new(run_part),
            ordinal,
        })
    }

    /// The run this task belongs to.
    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    /// Zero-based position of the task within its run.
    pub fn ordinal(&self) -> u32 {
        self.ordinal
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{:0width$}",
            self.run_id,
            TASK_ID_DELIMITER,
            self.ordinal,
            width = ORDINAL_WIDTH
        )
    }
}

impl FromStr for TaskId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for TaskId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TaskId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
