//! Task Members
//!
//! People attached to a task: who created it, who is assigned, who commented.
//! Shapes follow the backend's embedded user summaries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::RawId;

/// Compact user summary embedded in tasks, assignments and comments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: RawId,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub full_name: String,
}

impl Member {
    /// A member known only by id
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: RawId::Text(id.into()),
            username: String::new(),
            full_name: String::new(),
        }
    }

    /// Full name, else username, else id
    pub fn label(&self) -> String {
        if !self.full_name.trim().is_empty() {
            self.full_name.clone()
        } else if !self.username.is_empty() {
            self.username.clone()
        } else {
            self.id.to_string()
        }
    }
}

/// A member assigned to a task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub id: Option<RawId>,
    pub assignee: Member,
    pub assigned_at: Option<DateTime<Utc>>,
    pub assigned_by: Option<Member>,
}

impl Assignment {
    /// Assignment recorded locally before the server's copy is fetched
    pub fn local(assignee_id: &str) -> Self {
        Self {
            id: None,
            assignee: Member::with_id(assignee_id),
            assigned_at: Some(Utc::now()),
            assigned_by: None,
        }
    }

    pub fn is_for(&self, user_id: &str) -> bool {
        self.assignee.id.to_string() == user_id
    }
}

/// A comment on a task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: Option<RawId>,
    pub author: Option<Member>,
    #[serde(default)]
    pub content: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}
