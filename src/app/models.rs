use serde::{Deserialize, Serialize};

/// Device identity captured from the agent's info query. Immutable for the
/// duration of one workflow run; re-captured after each reboot-recovery cycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceSnapshot {
    pub product_type: String,
    pub serial_number: String,
    pub unique_device_id: Option<String>,
    pub product_version: Option<String>,
    pub device_name: Option<String>,
    pub activation_state: Option<String>,
}

impl DeviceSnapshot {
    pub fn is_activated(&self) -> bool {
        self.activation_state.as_deref() == Some("Activated")
    }
}

/// One identifier-shaped match found near a marker during a raw trace scan.
/// `position` is the match offset relative to the marker occurrence
/// (negative = before the marker).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuidCandidate {
    pub value: String,
    pub position: i64,
    pub context: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ScoredGuid {
    pub value: String,
    pub score: i64,
    pub occurrences: usize,
}

/// The three resource locators the payload directory resolves for one
/// (product type, guid, serial) triple. All three are non-empty by
/// construction; resolution fails otherwise.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StageUrls {
    pub stage1: String,
    pub stage2: String,
    pub stage3: String,
}

/// One row of the payload database's asset table.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AssetRecord {
    pub pid: i64,
    pub url: String,
    pub local_path: String,
}

/// Attempt counter scoped to one acquisition strategy invocation. A fresh
/// budget is created whenever a different strategy begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget {
    pub attempt: u32,
    pub max_attempts: u32,
}

impl RetryBudget {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            attempt: 0,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Starts the next attempt, returning its 1-based number, or `None` once
    /// the budget is exhausted.
    pub fn next(&mut self) -> Option<u32> {
        if self.attempt >= self.max_attempts {
            return None;
        }
        self.attempt += 1;
        Some(self.attempt)
    }

    pub fn exhausted(&self) -> bool {
        self.attempt >= self.max_attempts
    }
}
