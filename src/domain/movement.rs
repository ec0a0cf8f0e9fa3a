//! Move Transactions
//!
//! `compute_move` is the pure state transition behind a drag-and-drop
//! release: it takes the current board and a move description and returns
//! the board as it should look afterwards. It never touches the input and
//! never performs I/O; on error nothing has changed.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::board::Board;
use super::column::Column;
use super::entity::{DomainError, DomainResult};
use super::ids::{ColumnId, TaskId};

/// How a dragged id is matched against the tasks of its source column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdMatching {
    /// Exact display-key match only
    #[default]
    Strict,
    /// Exact match, then an embedded UUID, then substring containment.
    ///
    /// Migration aid for drag keys that were built from reformatted ids. Can
    /// produce false positives when ids share prefixes.
    Legacy,
}

/// One drag-release: move `task_id` from `source_column[source_index]` to
/// `dest_column[dest_index]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveTransaction {
    /// Display key reported by the drag layer
    pub task_id: String,
    pub source_column: ColumnId,
    pub dest_column: ColumnId,
    pub source_index: usize,
    pub dest_index: usize,
}

impl MoveTransaction {
    pub fn new(
        task_id: impl Into<String>,
        source_column: ColumnId,
        source_index: usize,
        dest_column: ColumnId,
        dest_index: usize,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            source_column,
            dest_column,
            source_index,
            dest_index,
        }
    }

    /// Dropped back where it started
    pub fn is_noop(&self) -> bool {
        self.source_column == self.dest_column && self.source_index == self.dest_index
    }

    pub fn is_cross_column(&self) -> bool {
        self.source_column != self.dest_column
    }
}

/// What a non-trivial move did
#[derive(Debug, Clone, PartialEq)]
pub struct MovedTask {
    /// Resolved identity of the moved task
    pub task: TaskId,
    pub from_column: ColumnId,
    pub dest_column: ColumnId,
    /// Index the task landed at after clamping
    pub dest_index: usize,
}

/// Result of [`compute_move`]
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedMove {
    pub board: Board,
    /// `None` for a no-op move
    pub change: Option<MovedTask>,
}

impl PlannedMove {
    pub fn is_noop(&self) -> bool {
        self.change.is_none()
    }
}

/// Compute the board after applying `txn`.
///
/// Both columns must exist (`InvalidCollection`). A no-op move returns an
/// identical board. Otherwise the task is resolved in the source column
/// (`EntityNotFound` if that fails), removed at its actual index and inserted
/// at `dest_index`, clamped to the destination's length.
pub fn compute_move(board: &Board, txn: &MoveTransaction, matching: IdMatching) -> DomainResult<PlannedMove> {
    let source = board.require_column(&txn.source_column)?;
    board.require_column(&txn.dest_column)?;

    if txn.is_noop() {
        return Ok(PlannedMove {
            board: board.clone(),
            change: None,
        });
    }

    let from = resolve_task(source, txn, matching).ok_or_else(|| DomainError::EntityNotFound {
        task_id: txn.task_id.clone(),
        column: txn.source_column.clone(),
    })?;
    if from != txn.source_index {
        log::debug!(
            "Task {} found at index {} of column {}, drag reported {}",
            txn.task_id,
            from,
            txn.source_column,
            txn.source_index
        );
    }

    let mut next = board.clone();
    let (task, dest_index) = if txn.is_cross_column() {
        let moved = next
            .column_mut(&txn.source_column)
            .and_then(|c| c.remove_at(from))
            .ok_or_else(|| DomainError::InvalidCollection(txn.source_column.clone()))?;
        let task = moved.id.clone();
        let dest = next
            .column_mut(&txn.dest_column)
            .ok_or_else(|| DomainError::InvalidCollection(txn.dest_column.clone()))?;
        (task, dest.insert_at(moved, txn.dest_index))
    } else {
        let column = next
            .column_mut(&txn.source_column)
            .ok_or_else(|| DomainError::InvalidCollection(txn.source_column.clone()))?;
        let task = column.tasks()[from].id.clone();
        let landed = column
            .relocate(from, txn.dest_index)
            .ok_or_else(|| DomainError::InvalidCollection(txn.source_column.clone()))?;
        (task, landed)
    };

    Ok(PlannedMove {
        board: next,
        change: Some(MovedTask {
            task,
            from_column: txn.source_column.clone(),
            dest_column: txn.dest_column.clone(),
            dest_index,
        }),
    })
}

fn resolve_task(column: &Column, txn: &MoveTransaction, matching: IdMatching) -> Option<usize> {
    if let Some(index) = column.index_of(&txn.task_id) {
        return Some(index);
    }
    match matching {
        IdMatching::Strict => None,
        IdMatching::Legacy => resolve_legacy(column, &txn.task_id),
    }
}

fn resolve_legacy(column: &Column, dragged: &str) -> Option<usize> {
    if dragged.is_empty() {
        return None;
    }

    if let Some(uuid) = uuid_pattern().find(dragged) {
        let uuid = uuid.as_str();
        let hit = column.tasks().iter().position(|t| {
            t.id.display().eq_ignore_ascii_case(uuid)
                || t.id.original().is_some_and(|o| o.to_string().eq_ignore_ascii_case(uuid))
        });
        if hit.is_some() {
            log::warn!("Matched dragged id {} by embedded UUID {}", dragged, uuid);
            return hit;
        }
    }

    let hit = column.tasks().iter().position(|t| {
        let key = t.id.display();
        key.contains(dragged) || dragged.contains(key)
    });
    if let Some(index) = hit {
        log::warn!(
            "Matched dragged id {} to task {} by containment",
            dragged,
            column.tasks()[index].id
        );
    }
    hit
}

fn uuid_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}")
            .expect("static UUID pattern compiles")
    })
}
