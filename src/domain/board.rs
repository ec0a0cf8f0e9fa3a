//! Board aggregate
//!
//! Root of one workspace's Kanban state. Columns are kept sorted by their
//! board position.

use serde::{Deserialize, Serialize};

use super::column::Column;
use super::entity::{find_by_id, position_by_id, DomainError, DomainResult};
use super::ids::ColumnId;
use super::task::Task;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Board {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    columns: Vec<Column>,
}

impl Board {
    /// Build a board, sorting columns by their `order`
    pub fn new(id: impl Into<String>, title: impl Into<String>, mut columns: Vec<Column>) -> Self {
        columns.sort_by_key(|c| c.order);
        Self {
            id: id.into(),
            title: title.into(),
            description: None,
            columns,
        }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, id: &ColumnId) -> Option<&Column> {
        find_by_id(&self.columns, id)
    }

    pub(crate) fn column_mut(&mut self, id: &ColumnId) -> Option<&mut Column> {
        let index = position_by_id(&self.columns, id)?;
        self.columns.get_mut(index)
    }

    /// Same as [`Board::column`] but fails with `InvalidCollection`
    pub fn require_column(&self, id: &ColumnId) -> DomainResult<&Column> {
        self.column(id)
            .ok_or_else(|| DomainError::InvalidCollection(id.clone()))
    }

    /// Total number of tasks across all columns
    pub fn task_count(&self) -> usize {
        self.columns.iter().map(Column::len).sum()
    }

    /// Locate a task by display key anywhere on the board
    pub fn find_task(&self, display_id: &str) -> Option<(&Column, &Task)> {
        self.columns
            .iter()
            .find_map(|c| c.find(display_id).map(|t| (c, t)))
    }

    pub(crate) fn find_task_mut(&mut self, display_id: &str) -> Option<&mut Task> {
        self.columns.iter_mut().find_map(|c| c.find_mut(display_id))
    }

    /// Append a task to a column (`order = len`)
    pub fn append_task(&mut self, column_id: &ColumnId, task: Task) -> DomainResult<&Task> {
        let column = self
            .column_mut(column_id)
            .ok_or_else(|| DomainError::InvalidCollection(column_id.clone()))?;
        let index = column.push(task);
        Ok(&column.tasks()[index])
    }

    /// Remove a task wherever it is; the owning column is reindexed
    pub fn remove_task(&mut self, display_id: &str) -> Option<Task> {
        self.columns
            .iter_mut()
            .find_map(|c| c.remove_by_id(display_id))
    }
}
