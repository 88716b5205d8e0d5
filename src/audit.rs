// ==============================================================================
// audit.rs - Run Audit Trail
// ==============================================================================
// Description: Append-only JSON-lines record of what each similarity run read,
//              skipped and produced
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 0.1.0
// ==============================================================================

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    RunStarted,
    FileValidated,
    FileSkipped,
    PairUndefined,
    OutputWritten,
    RunCompleted,
    RunFailed,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogSeverity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: Uuid,
    pub run_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub event_type: AuditEventType,
    pub resource: Option<String>,
    pub details: serde_json::Value,
    pub severity: LogSeverity,
}

impl AuditEvent {
    pub fn new(
        run_id: Uuid,
        event_type: AuditEventType,
        resource: Option<String>,
        details: serde_json::Value,
    ) -> Self {
        let severity = match event_type {
            AuditEventType::FileSkipped | AuditEventType::PairUndefined => LogSeverity::Warning,
            AuditEventType::RunFailed => LogSeverity::Error,
            _ => LogSeverity::Info,
        };

        Self {
            id: Uuid::new_v4(),
            run_id,
            timestamp: Utc::now(),
            event_type,
            resource,
            details,
            severity,
        }
    }
}

/// Appends one JSON object per line to the audit file
#[derive(Debug, Clone)]
pub struct AuditLog {
    path: PathBuf,
    run_id: Uuid,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>, run_id: Uuid) -> Self {
        Self {
            path: path.into(),
            run_id,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn log_event(
        &self,
        event_type: AuditEventType,
        resource: Option<String>,
        details: serde_json::Value,
    ) -> Result<()> {
        let event = AuditEvent::new(self.run_id, event_type, resource, details);
        let line = serde_json::to_string(&event).context("Failed to serialize audit event")?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open audit log {}", self.path.display()))?;
        writeln!(file, "{}", line).context("Failed to write audit event")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_event_creation() {
        let run_id = Uuid::new_v4();
        let event = AuditEvent::new(
            run_id,
            AuditEventType::FileValidated,
            Some("genome.txt".to_string()),
            serde_json::json!({ "size": 5242880 }),
        );

        assert_eq!(event.run_id, run_id);
        assert_eq!(event.resource, Some("genome.txt".to_string()));
        assert!(matches!(event.severity, LogSeverity::Info));
    }

    #[test]
    fn test_event_severity() {
        let run_id = Uuid::new_v4();
        let skipped = AuditEvent::new(run_id, AuditEventType::FileSkipped, None, serde_json::json!({}));
        let failed = AuditEvent::new(run_id, AuditEventType::RunFailed, None, serde_json::json!({}));

        assert_eq!(skipped.severity, LogSeverity::Warning);
        assert_eq!(failed.severity, LogSeverity::Error);
    }

    #[test]
    fn test_log_appends_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let log = AuditLog::new(dir.path().join("audit.jsonl"), Uuid::new_v4());

        log.log_event(AuditEventType::RunStarted, None, serde_json::json!({ "files": 3 }))
            .unwrap();
        log.log_event(
            AuditEventType::PairUndefined,
            Some("A/C".to_string()),
            serde_json::json!({ "reason": "no shared markers" }),
        )
        .unwrap();

        let contents = std::fs::read_to_string(log.path()).unwrap();
        let events: Vec<serde_json::Value> = contents
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();

        assert_eq!(events.len(), 2);
        assert_eq!(events[0]["event_type"], "run_started");
        assert_eq!(events[1]["severity"], "warning");
        assert_eq!(events[1]["resource"], "A/C");
    }
}
