//! Column (ordered task collection)
//!
//! Sequence order is authoritative. Each task's `order` is a cache of its
//! index and is rewritten by `reindex` after every insert or removal, so the
//! orders of a column are always exactly `0..len`.

use serde::{Deserialize, Serialize};

use super::ids::ColumnId;
use super::task::Task;
use super::entity::Entity;

/// A named, ordered sequence of tasks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub id: ColumnId,
    pub title: String,
    pub description: Option<String>,
    /// Position of the column on the board
    pub order: u32,
    tasks: Vec<Task>,
}

impl Column {
    /// Create an empty column
    pub fn new(id: ColumnId, title: impl Into<String>, order: u32) -> Self {
        Self {
            id,
            title: title.into(),
            description: None,
            order,
            tasks: Vec::new(),
        }
    }

    /// Create a column from tasks in arbitrary order.
    ///
    /// Tasks are sorted by their incoming `order` (stable, so ties keep
    /// arrival order), claimed by this column and reindexed.
    pub fn with_tasks(id: ColumnId, title: impl Into<String>, order: u32, mut tasks: Vec<Task>) -> Self {
        tasks.sort_by_key(|t| t.order);
        for task in &mut tasks {
            task.column_id = id.clone();
        }
        let mut column = Self {
            id,
            title: title.into(),
            description: None,
            order,
            tasks,
        };
        column.reindex();
        column
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Task> {
        self.tasks.get(index)
    }

    /// Index of the task with this display key
    pub fn index_of(&self, display_id: &str) -> Option<usize> {
        self.tasks.iter().position(|t| t.id().display() == display_id)
    }

    pub fn find(&self, display_id: &str) -> Option<&Task> {
        self.index_of(display_id).map(|i| &self.tasks[i])
    }

    /// Mutable access for descriptive edits only
    pub(crate) fn find_mut(&mut self, display_id: &str) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id().display() == display_id)
    }

    /// Insert at `index` (clamped to `0..=len`), claim the task, reindex.
    ///
    /// Returns the index the task actually landed at.
    pub fn insert_at(&mut self, mut task: Task, index: usize) -> usize {
        let index = index.min(self.tasks.len());
        task.column_id = self.id.clone();
        self.tasks.insert(index, task);
        self.reindex();
        index
    }

    /// Append to the end (`order = len`)
    pub fn push(&mut self, task: Task) -> usize {
        self.insert_at(task, self.tasks.len())
    }

    /// Remove a task by display key. Absent ids are a no-op.
    pub fn remove_by_id(&mut self, display_id: &str) -> Option<Task> {
        let index = self.index_of(display_id)?;
        self.remove_at(index)
    }

    /// Remove the task at `index`, reindexing the remainder
    pub fn remove_at(&mut self, index: usize) -> Option<Task> {
        if index >= self.tasks.len() {
            return None;
        }
        let task = self.tasks.remove(index);
        self.reindex();
        Some(task)
    }

    /// Move a task within this column with a single reindex.
    ///
    /// `to` is clamped after removal. Returns the final index.
    pub(crate) fn relocate(&mut self, from: usize, to: usize) -> Option<usize> {
        if from >= self.tasks.len() {
            return None;
        }
        let task = self.tasks.remove(from);
        let to = to.min(self.tasks.len());
        self.tasks.insert(to, task);
        self.reindex();
        Some(to)
    }

    /// Rewrite every task's `order` to its position
    pub(crate) fn reindex(&mut self) {
        for (position, task) in self.tasks.iter_mut().enumerate() {
            task.order = position as u32;
        }
    }
}

impl Entity for Column {
    type Id = ColumnId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
