//! Synchronizer events
//!
//! Broadcast to subscribers so failures can be shown without blocking the
//! caller. Every failed operation produces exactly one `SyncEvent::Failure`.

use std::fmt;

use crate::domain::{MovedTask, TaskId};
use crate::repository::RepositoryError;

/// Lifecycle of one move gesture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MovePhase {
    #[default]
    Idle,
    OptimisticallyApplied,
    Confirmed,
    RolledBack,
}

/// What became of a move request
#[derive(Debug, Clone, PartialEq)]
pub enum MoveOutcome {
    /// Dropped where it started; nothing applied, nothing sent
    Unchanged,
    /// Applied locally and accepted by the server
    Confirmed(MovedTask),
    /// Applied locally, then refused by the server.
    ///
    /// `reconciled` is false when a newer reload had already replaced the
    /// optimistic state, or when the reload itself failed.
    RolledBack {
        change: MovedTask,
        error: RepositoryError,
        reconciled: bool,
    },
}

impl MoveOutcome {
    pub fn phase(&self) -> MovePhase {
        match self {
            MoveOutcome::Unchanged => MovePhase::Idle,
            MoveOutcome::Confirmed(_) => MovePhase::Confirmed,
            MoveOutcome::RolledBack { .. } => MovePhase::RolledBack,
        }
    }
}

/// Board operation a failure belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Load,
    Move,
    Create,
    Update,
    Delete,
    Assign,
    Unassign,
    Comment,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Load => "load",
            Operation::Move => "move",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::Assign => "assign",
            Operation::Unassign => "unassign",
            Operation::Comment => "comment on",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// A fresh board replaced local state
    Reconciled { generation: u64 },
    /// A move changed phase
    Move { task: TaskId, phase: MovePhase },
    TaskCreated { task: TaskId },
    TaskUpdated { task: TaskId },
    TaskDeleted { task: TaskId },
    /// User-facing failure notice
    Failure { operation: Operation, message: String },
}
