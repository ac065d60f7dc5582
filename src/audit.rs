use crate::model::UserId;
use anyhow::Context;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    CalloutCreated,
    CalloutCancelled,
    ShiftAccepted,
    ShiftCancelled,
    ShiftMissed,
    UserActivated,
    UserDeactivated,
    UserSuspended,
}

impl ActionType {
    pub fn label(self) -> &'static str {
        match self {
            ActionType::CalloutCreated => "Call-out Created",
            ActionType::CalloutCancelled => "Call-out Cancelled",
            ActionType::ShiftAccepted => "Shift Accepted",
            ActionType::ShiftCancelled => "Shift Cancelled",
            ActionType::ShiftMissed => "Shift Missed",
            ActionType::UserActivated => "User Activated",
            ActionType::UserDeactivated => "User Deactivated",
            ActionType::UserSuspended => "User Suspended",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub actor: UserId,
    pub action: ActionType,
    pub detail: String,
    pub at: DateTime<Utc>,
}

/// Enregistreur d'audit externe. Les erreurs sont journalisées par l'appelant, jamais remontées.
pub trait AuditRecorder: Send + Sync {
    fn record(&self, actor: &UserId, action: ActionType, detail: &str) -> anyhow::Result<()>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAuditLog;

impl AuditRecorder for NoopAuditLog {
    fn record(&self, _actor: &UserId, _action: ActionType, _detail: &str) -> anyhow::Result<()> {
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryAuditLog {
    entries: Mutex<Vec<AuditEntry>>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().clone()
    }

    pub fn count(&self, action: ActionType) -> usize {
        self.entries.lock().iter().filter(|e| e.action == action).count()
    }
}

impl AuditRecorder for MemoryAuditLog {
    fn record(&self, actor: &UserId, action: ActionType, detail: &str) -> anyhow::Result<()> {
        self.entries.lock().push(AuditEntry {
            actor: actor.clone(),
            action,
            detail: detail.to_string(),
            at: Utc::now(),
        });
        Ok(())
    }
}

/// Journal append-only, une entrée JSON par ligne.
#[derive(Debug)]
pub struct JsonlAuditLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonlAuditLog {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    pub fn read_all(&self) -> anyhow::Result<Vec<AuditEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let raw = std::fs::read_to_string(&self.path)
            .with_context(|| format!("reading {}", self.path.display()))?;
        raw.lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| serde_json::from_str(l).with_context(|| "parsing audit line"))
            .collect()
    }
}

impl AuditRecorder for JsonlAuditLog {
    fn record(&self, actor: &UserId, action: ActionType, detail: &str) -> anyhow::Result<()> {
        let entry = AuditEntry {
            actor: actor.clone(),
            action,
            detail: detail.to_string(),
            at: Utc::now(),
        };
        let mut line = serde_json::to_string(&entry)?;
        line.push('\n');

        let _guard = self.lock.lock();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("opening {}", self.path.display()))?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }
}
