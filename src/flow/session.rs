//! Session store — per-identity flow state and collected fields.

use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use super::state::FlowState;

/// Identity of one conversing user, as given by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Scope a user id to the channel it arrived on.
    pub fn for_channel(channel: &str, user_id: &str) -> Self {
        Self(format!("{channel}:{user_id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A value collected during the flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Category,
    Service,
    Phone,
    Name,
    ProjectName,
    TimeNeeded,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Category => "category",
            Self::Service => "service",
            Self::Phone => "phone",
            Self::Name => "name",
            Self::ProjectName => "project_name",
            Self::TimeNeeded => "time_needed",
        }
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One user's position in the flow plus the fields gathered so far.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub state: FlowState,
    pub fields: HashMap<Field, String>,
}

impl Session {
    pub fn field(&self, field: Field) -> Option<&str> {
        self.fields.get(&field).map(String::as_str)
    }

    pub fn set_field(&mut self, field: Field, value: impl Into<String>) {
        self.fields.insert(field, value.into());
    }

    /// Whether the session holds nothing worth keeping.
    pub fn is_pristine(&self) -> bool {
        self.state == FlowState::Initial && self.fields.is_empty()
    }
}

/// In-memory session storage keyed by identity.
///
/// Reads and writes are synchronous; callers serialize work per identity.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<SessionId, Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The session for `id`, or a fresh `Initial` one if none exists.
    pub fn get(&self, id: &SessionId) -> Session {
        self.sessions
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn set(&self, id: &SessionId, session: Session) {
        let mut sessions = self
            .sessions
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if session.is_pristine() {
            sessions.remove(id);
        } else {
            sessions.insert(id.clone(), session);
        }
    }

    pub fn clear(&self, id: &SessionId) {
        self.sessions
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(id);
    }

    /// Number of sessions currently mid-flow.
    pub fn len(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
