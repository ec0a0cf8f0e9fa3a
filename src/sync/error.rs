use crate::domain::DomainError;
use crate::repository::RepositoryError;

pub type SyncResult<T> = Result<T, SyncError>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SyncError {
    /// No board has been loaded yet
    #[error("board not loaded")]
    NotLoaded,
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
