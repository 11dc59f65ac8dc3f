//! Audit port and the in-tree sinks
//!
//! Every command attempt produces exactly one audit record. Sinks are fire
//! and forget: they cannot fail a command.

use std::fmt;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Outcome tag written to the audit trail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditResult {
    Success,
    InvalidRange,
    NotFound,
    Unavailable,
    Error,
    BadRequest,
}

impl AuditResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::InvalidRange => "INVALID_RANGE",
            Self::NotFound => "NOT_FOUND",
            Self::Unavailable => "UNAVAILABLE",
            Self::Error => "ERROR",
            Self::BadRequest => "BAD_REQUEST",
        }
    }
}

impl fmt::Display for AuditResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receives one record per command attempt
pub trait AuditSink: Send + Sync {
    fn log_action(&self, action: &str, radio_id: &str, result: AuditResult, latency: Duration);
}

/// A single audit record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub ts: DateTime<Utc>,
    pub radio_id: String,
    pub action: String,
    pub outcome: AuditResult,
    pub latency_ms: u64,
}

impl AuditEntry {
    pub fn new(action: &str, radio_id: &str, outcome: AuditResult, latency: Duration) -> Self {
        Self {
            ts: Utc::now(),
            radio_id: radio_id.to_string(),
            action: action.to_string(),
            outcome,
            latency_ms: u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

/// Keeps audit records in memory
#[derive(Debug, Default)]
pub struct MemoryAuditLog {
    entries: Mutex<Vec<AuditEntry>>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every record so far, oldest first
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Records for one action
    pub fn entries_for(&self, action: &str) -> Vec<AuditEntry> {
        self.entries()
            .into_iter()
            .filter(|e| e.action == action)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl AuditSink for MemoryAuditLog {
    fn log_action(&self, action: &str, radio_id: &str, result: AuditResult, latency: Duration) {
        let entry = AuditEntry::new(action, radio_id, result, latency);
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry);
    }
}

/// Emits audit records as tracing events on the `audit` target
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn log_action(&self, action: &str, radio_id: &str, result: AuditResult, latency: Duration) {
        info!(
            target: "audit",
            action,
            radio_id,
            outcome = result.as_str(),
            latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
            "command audited"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_log_records_in_order() {
        let log = MemoryAuditLog::new();
        log.log_action("setPower", "r1", AuditResult::Success, Duration::from_millis(12));
        log.log_action("selectRadio", "r2", AuditResult::NotFound, Duration::ZERO);

        let entries = log.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action, "setPower");
        assert_eq!(entries[0].latency_ms, 12);
        assert_eq!(entries[1].outcome, AuditResult::NotFound);
        assert_eq!(log.entries_for("selectRadio").len(), 1);

        log.clear();
        assert!(log.is_empty());
    }

    #[test]
    fn test_entry_serializes_with_wire_tags() {
        let entry = AuditEntry::new("getState", "r1", AuditResult::BadRequest, Duration::ZERO);
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["outcome"], "BAD_REQUEST");
        assert_eq!(json["radioId"], "r1");
        assert_eq!(json["latencyMs"], 0);
    }
}
