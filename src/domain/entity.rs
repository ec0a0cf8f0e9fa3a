//! Domain Layer - Core Entity Trait
//!
//! Basic contract for board entities and the errors raised by local,
//! pre-network board computations.

use super::ids::ColumnId;

/// Core trait for all board entities
pub trait Entity: Sized + Send + Sync + Clone {
    /// The type of the entity's unique identifier
    type Id: Clone + Eq + std::hash::Hash + Send + Sync;

    /// Returns the entity's unique identifier
    fn id(&self) -> &Self::Id;
}

/// Find an entity by id in a slice
pub fn find_by_id<'a, T: Entity>(items: &'a [T], id: &T::Id) -> Option<&'a T> {
    items.iter().find(|item| item.id() == id)
}

/// Position of an entity in a slice
pub fn position_by_id<T: Entity>(items: &[T], id: &T::Id) -> Option<usize> {
    items.iter().position(|item| item.id() == id)
}

/// Common result type for domain operations
pub type DomainResult<T> = Result<T, DomainError>;

/// Failures of local board computations.
///
/// All of them are raised before any state is touched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    /// A move or create referenced a column that is not on the board
    #[error("column {0} is not on the board")]
    InvalidCollection(ColumnId),
    /// The dragged task could not be located in its source column
    #[error("task {task_id} not found in column {column}")]
    EntityNotFound { task_id: String, column: ColumnId },
    /// The task is on no column of the board
    #[error("task {0} is not on the board")]
    TaskNotFound(String),
    /// The task still carries a synthesized id and cannot be addressed on the server
    #[error("task {0} has no server id yet")]
    PendingIdentity(String),
    /// A comment with no text
    #[error("comment is empty")]
    EmptyComment,
}
