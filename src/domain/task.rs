//! Task Entity
//!
//! A card on the board. `order` and `column_id` are owned by the column that
//! holds the task; everything else is descriptive.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::entity::Entity;
use super::ids::{ColumnId, TaskId};
use super::members::{Assignment, Member};

/// Task priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }

    /// Lenient parse; unknown values fall back to `Medium`
    pub fn parse(s: &str) -> Self {
        match s {
            "low" => Priority::Low,
            "high" => Priority::High,
            "urgent" => Priority::Urgent,
            _ => Priority::Medium,
        }
    }
}

/// A task card
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Display key plus backend id
    pub id: TaskId,
    /// Owning column
    pub column_id: ColumnId,
    pub title: String,
    pub description: Option<String>,
    pub priority: Priority,
    pub due_date: Option<NaiveDate>,
    /// Position within the owning column
    pub order: u32,
    pub is_blocked: bool,
    pub blocked_reason: Option<String>,
    pub estimated_hours: Option<f64>,
    pub comments_count: u32,
    pub created_by: Option<Member>,
    #[serde(default)]
    pub assignments: Vec<Assignment>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Create a task with default descriptive fields
    pub fn new(id: TaskId, column_id: ColumnId, title: impl Into<String>) -> Self {
        Self {
            id,
            column_id,
            title: title.into(),
            description: None,
            priority: Priority::default(),
            due_date: None,
            order: 0,
            is_blocked: false,
            blocked_reason: None,
            estimated_hours: None,
            comments_count: 0,
            created_by: None,
            assignments: Vec::new(),
            created_at: None,
            updated_at: None,
        }
    }

    /// True while the task waits for a server-assigned id
    pub fn is_pending(&self) -> bool {
        self.id.is_pending()
    }

    /// Copy the descriptive fields of `other`, leaving identity and placement alone
    pub fn merge_details(&mut self, other: &Task) {
        self.title = other.title.clone();
        self.description = other.description.clone();
        self.priority = other.priority;
        self.due_date = other.due_date;
        self.is_blocked = other.is_blocked;
        self.blocked_reason = other.blocked_reason.clone();
        self.estimated_hours = other.estimated_hours;
        self.comments_count = other.comments_count;
        self.assignments = other.assignments.clone();
        self.updated_at = other.updated_at;
    }

    pub fn is_assigned_to(&self, user_id: &str) -> bool {
        self.assignments.iter().any(|a| a.is_for(user_id))
    }

    /// Record an assignment unless the member already has one.
    /// Returns false if nothing changed.
    pub fn assign(&mut self, assignment: Assignment) -> bool {
        if self.is_assigned_to(&assignment.assignee.id.to_string()) {
            return false;
        }
        self.assignments.push(assignment);
        true
    }

    /// Drop a member's assignment. Returns false if there was none.
    pub fn unassign(&mut self, user_id: &str) -> bool {
        let before = self.assignments.len();
        self.assignments.retain(|a| !a.is_for(user_id));
        self.assignments.len() != before
    }
}

impl Entity for Task {
    type Id = TaskId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Fields for a task about to be created
#[derive(Debug, Clone, PartialEq)]
pub struct NewTask {
    pub column_id: ColumnId,
    pub title: String,
    pub description: Option<String>,
    pub priority: Priority,
    pub due_date: Option<NaiveDate>,
    pub is_blocked: bool,
    pub blocked_reason: Option<String>,
    pub estimated_hours: Option<f64>,
}

impl NewTask {
    pub fn new(column_id: ColumnId, title: impl Into<String>) -> Self {
        Self {
            column_id,
            title: title.into(),
            description: None,
            priority: Priority::default(),
            due_date: None,
            is_blocked: false,
            blocked_reason: None,
            estimated_hours: None,
        }
    }
}

/// Partial update of descriptive fields.
///
/// Placement (`order`, `column_id`) only changes through a move.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TaskPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_blocked: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_hours: Option<f64>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self == &TaskPatch::default()
    }
}
