//! Repository Layer - Core Traits
//!
//! Abstract interface to the board backend. The synchronizer only talks to
//! this trait, so tests can swap in an in-memory fake.

use async_trait::async_trait;

use crate::domain::{Assignment, Board, ColumnId, Comment, NewTask, RawId, Task, TaskPatch};

use super::error::RepositoryResult;

/// Board backend operations
///
/// Every call is a single request/response exchange; none of them touch
/// local state.
#[async_trait]
pub trait BoardRepository: Send + Sync {
    /// Fetch the full board of a workspace, columns and tasks included
    async fn fetch_board(&self, workspace_slug: &str) -> RepositoryResult<Board>;

    /// Fetch the tasks of one column.
    ///
    /// Used to check whether a create whose request failed reached the server.
    async fn list_column_tasks(&self, column: &ColumnId) -> RepositoryResult<Vec<Task>>;

    /// Persist a move; the response body is ignored
    async fn persist_move(
        &self,
        task: &RawId,
        dest_column: &ColumnId,
        dest_index: usize,
    ) -> RepositoryResult<()>;

    /// Create a task. The returned task is pending if the server did not echo an id.
    async fn create_task(&self, draft: &NewTask, board_id: Option<&str>) -> RepositoryResult<Task>;

    /// Update descriptive fields of a task
    async fn update_task(&self, task: &RawId, patch: &TaskPatch) -> RepositoryResult<Task>;

    /// Delete a task
    async fn delete_task(&self, task: &RawId) -> RepositoryResult<()>;

    /// Assign a project member. `None` when the response does not carry the
    /// assignment record.
    async fn assign_task(&self, task: &RawId, assignee_id: &str)
        -> RepositoryResult<Option<Assignment>>;

    async fn unassign_task(&self, task: &RawId, user_id: &str) -> RepositoryResult<()>;

    async fn add_comment(&self, task: &RawId, content: &str) -> RepositoryResult<Comment>;

    /// Comments of a task, oldest first
    async fn list_comments(&self, task: &RawId) -> RepositoryResult<Vec<Comment>>;
}
