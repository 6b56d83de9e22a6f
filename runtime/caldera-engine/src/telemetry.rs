// SPDX-License-Identifier: PMPL-1.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell

//! Per-execution telemetry records.

use crate::tier::Tier;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::sync::{Mutex, MutexGuard};

/// One completed execution, as observed by the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    /// Work unit id.
    pub unit: SmolStr,
    /// Tier that produced the result.
    pub tier: Tier,
    /// Device the work ran on, for offloaded executions.
    pub device: Option<SmolStr>,
    /// Peak device temperature observed during the execution window.
    pub peak_celsius: Option<f64>,
    /// Whether this invocation triggered the one-time offload
    /// downgrade.
    pub downgraded: bool,
    /// Wall-clock duration of the invocation.
    pub duration_ms: u64,
    /// Unix timestamp (milliseconds) when the invocation started.
    pub at_ms: u64,
}

/// Append-only log of execution records.
#[derive(Default)]
pub struct ExecutionLog {
    records: Mutex<Vec<ExecutionRecord>>,
}

impl ExecutionLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record.
    pub fn append(&self, record: ExecutionRecord) {
        self.guard().push(record);
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.guard().len()
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.guard().is_empty()
    }

    /// Copy of all records, oldest first.
    pub fn snapshot(&self) -> Vec<ExecutionRecord> {
        self.guard().clone()
    }

    /// Records for one work unit, oldest first.
    pub fn for_unit(&self, unit_id: &str) -> Vec<ExecutionRecord> {
        self.guard()
            .iter()
            .filter(|r| r.unit == unit_id)
            .cloned()
            .collect()
    }

    /// Serialize the full log to JSON for diagnostics.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&*self.guard())
    }

    fn guard(&self) -> MutexGuard<'_, Vec<ExecutionRecord>> {
        match self.records.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
