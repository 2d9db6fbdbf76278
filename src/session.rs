//! Session data model.
//!
//! A `Session` is the authenticated identity reported by the auth backend.
//! Everything beyond the identifier is owned by the backend and carried
//! through untouched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Authenticated identity as reported by the auth backend
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Opaque backend identifier
    pub uid: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Remaining profile fields, kept as-is
    #[serde(default, flatten)]
    pub profile: serde_json::Map<String, serde_json::Value>,
}

impl Session {
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            display_name: None,
            email: None,
            created_at: None,
            profile: serde_json::Map::new(),
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Name shown in the header: display name, then email, then uid
    pub fn label(&self) -> &str {
        self.display_name
            .as_deref()
            .or(self.email.as_deref())
            .unwrap_or(&self.uid)
    }
}

/// A session-sync failure surfaced on the store's error channel
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SyncFailure {
    pub message: String,
    pub at: DateTime<Utc>,
}

impl SyncFailure {
    pub fn now(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            at: Utc::now(),
        }
    }
}
