use serde::{Deserialize, Serialize};

/// The ring keeps only the most recent entries so the panel stays short.
pub const NOTIFICATION_CAP: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Success,
    Info,
    Warning,
    Error,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Success => "success",
            NotificationKind::Info => "info",
            NotificationKind::Warning => "warning",
            NotificationKind::Error => "error",
        }
    }

    pub fn parse(value: &str) -> Result<Self, String> {
        match value {
            "success" => Ok(NotificationKind::Success),
            "info" => Ok(NotificationKind::Info),
            "warning" => Ok(NotificationKind::Warning),
            "error" => Ok(NotificationKind::Error),
            other => Err(format!("Unknown notification kind: {other}")),
        }
    }
}

/// User-facing record derived from a live change event. Survives restarts
/// through the local store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: String,
    pub timestamp: i64,
}

/// Capped, deduplicated list of recent notifications, most recent first.
#[derive(Debug, Clone, Default)]
pub struct NotificationRing {
    entries: Vec<Notification>,
}

impl NotificationRing {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the ring from persisted entries, re-applying cap and dedup in
    /// case the stored list predates either rule.
    pub fn from_entries(entries: Vec<Notification>) -> Self {
        let mut ring = Self::new();
        for entry in entries.into_iter().rev() {
            ring.push(entry);
        }
        ring
    }

    /// Returns false when an entry with identical `(message, timestamp)` is
    /// already present.
    pub fn push(&mut self, notification: Notification) -> bool {
        let duplicate = self
            .entries
            .iter()
            .any(|n| n.message == notification.message && n.timestamp == notification.timestamp);
        if duplicate {
            return false;
        }
        self.entries.insert(0, notification);
        self.entries.truncate(NOTIFICATION_CAP);
        true
    }

    pub fn entries(&self) -> &[Notification] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
