//! LinkUp Board Sync
//!
//! Layered architecture:
//! - domain: board entities, ordering rules and the pure move computation
//! - repository: backend access abstractions and the REST implementation
//! - sync: optimistic synchronizer with rollback by reload
//! - config: file and environment configuration

pub mod config;
pub mod domain;
pub mod repository;
pub mod sync;

pub use config::{BoardConfig, ConfigError};
pub use domain::{
    compute_move, normalize, Assignment, Board, Column, ColumnId, Comment, DomainError,
    IdMatching, Member, MoveTransaction, NewTask, Priority, RawId, Task, TaskId, TaskPatch,
};
pub use repository::{BoardRepository, HttpBoardRepository, RepositoryError};
pub use sync::{MoveOutcome, MovePhase, SyncError, SyncEvent, SyncOptions, Synchronizer};
