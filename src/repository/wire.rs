//! Wire records
//!
//! JSON shapes exchanged with the board backend, and their conversion into
//! domain types. Conversion is where ids are normalized and where incoming
//! `order` values are turned into sequence positions.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{
    normalize, Assignment, Board, Column, ColumnId, Member, NewTask, Priority, RawId, Task,
};

use super::error::{RepositoryError, RepositoryResult};

/// Task as serialized by the backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: Option<RawId>,
    pub column: Option<RawId>,
    #[serde(default)]
    pub title: String,
    pub description: Option<String>,
    pub priority: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub order: Option<u32>,
    pub is_blocked: Option<bool>,
    pub blocked_reason: Option<String>,
    pub estimated_hours: Option<f64>,
    pub comments_count: Option<u32>,
    pub created_by: Option<Member>,
    #[serde(default)]
    pub assignments: Vec<Assignment>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl TaskRecord {
    /// Convert into a domain task; `fallback_column` is used when the record
    /// does not name its column
    pub fn into_task(self, fallback_column: &ColumnId) -> Task {
        let column_id = self
            .column
            .filter(|c| !c.is_blank())
            .map(ColumnId::from)
            .unwrap_or_else(|| fallback_column.clone());

        let mut task = Task::new(normalize(self.id), column_id, self.title);
        task.description = self.description;
        task.priority = self
            .priority
            .as_deref()
            .map(Priority::parse)
            .unwrap_or_default();
        task.due_date = self.due_date;
        task.order = self.order.unwrap_or(0);
        task.is_blocked = self.is_blocked.unwrap_or(false);
        task.blocked_reason = self.blocked_reason;
        task.estimated_hours = self.estimated_hours;
        task.comments_count = self.comments_count.unwrap_or(0);
        task.created_by = self.created_by;
        task.assignments = self.assignments;
        task.created_at = self.created_at;
        task.updated_at = self.updated_at;
        task
    }
}

/// Column as serialized by the backend. `tasks` is absent when the board
/// endpoint only returns column summaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnRecord {
    pub id: RawId,
    #[serde(default)]
    pub title: String,
    pub description: Option<String>,
    pub order: Option<u32>,
    pub tasks: Option<Vec<TaskRecord>>,
}

impl ColumnRecord {
    pub fn column_id(&self) -> ColumnId {
        ColumnId::from(self.id.clone())
    }

    fn into_column(self) -> Column {
        let id = self.column_id();
        let tasks = self
            .tasks
            .unwrap_or_default()
            .into_iter()
            .map(|t| t.into_task(&id))
            .collect();
        let mut column = Column::with_tasks(id, self.title, self.order.unwrap_or(0), tasks);
        column.description = self.description;
        column
    }
}

/// Board as returned by the workspace board endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardRecord {
    pub id: Option<RawId>,
    #[serde(default)]
    pub title: String,
    pub description: Option<String>,
    pub columns: Option<Vec<ColumnRecord>>,
}

impl BoardRecord {
    /// Reject boards without an id or a column list
    pub fn validate(&self) -> RepositoryResult<()> {
        if self.id.as_ref().map_or(true, RawId::is_blank) {
            return Err(RepositoryError::InvalidPayload(
                "board data is invalid or incomplete".to_string(),
            ));
        }
        if self.columns.is_none() {
            return Err(RepositoryError::InvalidPayload(
                "board columns are missing or invalid".to_string(),
            ));
        }
        Ok(())
    }

    pub fn into_board(self) -> RepositoryResult<Board> {
        self.validate()?;
        let id = self.id.map(|id| id.to_string()).unwrap_or_default();
        let columns = self
            .columns
            .unwrap_or_default()
            .into_iter()
            .map(ColumnRecord::into_column)
            .collect();
        let mut board = Board::new(id, self.title, columns);
        board.description = self.description;
        Ok(board)
    }
}

/// Body of the move endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRequest {
    pub target_column: String,
    pub order: usize,
}

/// Body of the create endpoint
#[derive(Debug, Serialize)]
pub(crate) struct CreateTaskRequest<'a> {
    column: &'a str,
    title: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    priority: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    due_date: Option<NaiveDate>,
    is_blocked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    blocked_reason: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    estimated_hours: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    board: Option<&'a str>,
}

impl<'a> CreateTaskRequest<'a> {
    pub(crate) fn new(draft: &'a NewTask, board: Option<&'a str>) -> Self {
        Self {
            column: draft.column_id.as_str(),
            title: &draft.title,
            description: draft.description.as_deref(),
            priority: draft.priority.as_str(),
            due_date: draft.due_date,
            is_blocked: draft.is_blocked,
            blocked_reason: draft.blocked_reason.as_deref(),
            estimated_hours: draft.estimated_hours,
            board,
        }
    }
}

/// Body of the assign endpoint
#[derive(Debug, Serialize)]
pub(crate) struct AssignRequest<'a> {
    pub assignee_id: &'a str,
}

/// Body of the comment endpoint
#[derive(Debug, Serialize)]
pub(crate) struct CommentRequest<'a> {
    pub content: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct RefreshRequest<'a> {
    pub refresh: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RefreshResponse {
    pub access: String,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    detail: Option<String>,
    message: Option<String>,
}

/// Human-readable message for a rejected request: `detail`, then `message`,
/// then the raw body, then the status reason
pub(crate) fn error_detail(status: reqwest::StatusCode, body: &str) -> String {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    parsed
        .detail
        .or(parsed.message)
        .or_else(|| {
            let trimmed = body.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        })
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        })
}
