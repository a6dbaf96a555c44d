//! User-facing notices, confirmation prompts and the HTTP failure policy.

use std::fmt;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::NOTIFICATION_DURATION;

/// Kept notices beyond this count drop the oldest first.
const MAX_RETAINED: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeKind {
    Success,
    Error,
    Warning,
    Info,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub kind: NoticeKind,
    pub message: String,
    pub duration_ms: u64,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        let age = now.signed_duration_since(self.created_at);
        age.num_milliseconds() >= self.duration_ms as i64
    }
}

/// Collects notices raised by domain operations.
pub struct NotificationCenter {
    items: Mutex<Vec<Notification>>,
    default_duration: Duration,
}

impl Default for NotificationCenter {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationCenter {
    pub fn new() -> Self {
        Self::with_duration(NOTIFICATION_DURATION)
    }

    pub fn with_duration(default_duration: Duration) -> Self {
        Self {
            items: Mutex::new(Vec::new()),
            default_duration,
        }
    }

    pub fn success(&self, message: impl Into<String>) -> Uuid {
        self.push(NoticeKind::Success, message.into())
    }

    pub fn error(&self, message: impl Into<String>) -> Uuid {
        self.push(NoticeKind::Error, message.into())
    }

    pub fn warning(&self, message: impl Into<String>) -> Uuid {
        self.push(NoticeKind::Warning, message.into())
    }

    pub fn info(&self, message: impl Into<String>) -> Uuid {
        self.push(NoticeKind::Info, message.into())
    }

    fn push(&self, kind: NoticeKind, message: String) -> Uuid {
        let notice = Notification {
            id: Uuid::new_v4(),
            kind,
            message,
            duration_ms: self.default_duration.as_millis() as u64,
            created_at: Utc::now(),
        };
        let id = notice.id;
        match kind {
            NoticeKind::Error => tracing::warn!(message = %notice.message, "Notice"),
            _ => tracing::debug!(kind = ?kind, message = %notice.message, "Notice"),
        }
        // A poisoned list only loses notices; never propagate.
        if let Ok(mut items) = self.items.lock() {
            items.push(notice);
            if items.len() > MAX_RETAINED {
                let excess = items.len() - MAX_RETAINED;
                items.drain(..excess);
            }
        }
        id
    }

    pub fn dismiss(&self, id: Uuid) -> bool {
        match self.items.lock() {
            Ok(mut items) => {
                let before = items.len();
                items.retain(|n| n.id != id);
                items.len() != before
            }
            Err(_) => false,
        }
    }

    /// Notices still within their display duration, oldest first.
    pub fn active(&self, now: DateTime<Utc>) -> Vec<Notification> {
        self.items
            .lock()
            .map(|items| items.iter().filter(|n| !n.is_expired(now)).cloned().collect())
            .unwrap_or_default()
    }

    /// Every retained notice, oldest first.
    pub fn all(&self) -> Vec<Notification> {
        self.items.lock().map(|i| i.clone()).unwrap_or_default()
    }

    pub fn last(&self) -> Option<Notification> {
        self.items.lock().ok().and_then(|i| i.last().cloned())
    }
}

// ═══════════════════════════════════════════════════════════
// Confirmation
// ═══════════════════════════════════════════════════════════

/// Blocking yes/no prompt before destructive actions.
pub trait Confirm {
    fn confirm(&self, message: &str) -> bool;
}

/// Answers every prompt the same way. API callers confirm up front.
pub struct AutoConfirm(pub bool);

impl Confirm for AutoConfirm {
    fn confirm(&self, _message: &str) -> bool {
        self.0
    }
}

// ═══════════════════════════════════════════════════════════
// HTTP failure policy
// ═══════════════════════════════════════════════════════════

/// What the client does when a backend call fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Session is gone: drop credentials and return to login.
    ForceLogout,
    /// Permission denied: show the message and leave the data empty.
    Warn(String),
    /// Anything else: transient error toast.
    Toast(String),
}

impl FailurePolicy {
    pub fn for_status(status: u16) -> Self {
        match status {
            401 => Self::ForceLogout,
            403 => Self::Warn("You do not have permission to access this data.".into()),
            0 => Self::Toast("Cannot connect to server. Please check your connection.".into()),
            404 => Self::Toast("Data not found.".into()),
            _ => Self::Toast("An unexpected error occurred. Please try again.".into()),
        }
    }
}

/// Which facilities a request covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FacilityScope {
    National,
    Facility(String),
}

impl FacilityScope {
    /// National users carry no facility id.
    pub fn from_facility_id(id: Option<&str>) -> Self {
        match id.map(str::trim) {
            None | Some("") => Self::National,
            Some(id) => Self::Facility(id.to_string()),
        }
    }
}

impl fmt::Display for FacilityScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::National => f.write_str("NATIONAL"),
            Self::Facility(id) => f.write_str(id),
        }
    }
}
