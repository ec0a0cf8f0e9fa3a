//! Repository errors
//!
//! Transport failures and server rejections are kept apart for reporting,
//! but the synchronizer handles both the same way.

/// Result type for backend calls
pub type RepositoryResult<T> = Result<T, RepositoryError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    /// The request never produced a response (connect, timeout, body read)
    #[error("transport error: {0}")]
    Transport(String),
    /// Non-2xx response
    #[error("server rejected request ({status}): {detail}")]
    ServerRejected { status: u16, detail: String },
    /// 2xx response whose body does not match the contract
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
    /// Credentials missing or refresh failed
    #[error("authentication failed: {0}")]
    Auth(String),
}

impl RepositoryError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, RepositoryError::ServerRejected { status: 401, .. })
    }
}

impl From<reqwest::Error> for RepositoryError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            RepositoryError::InvalidPayload(e.to_string())
        } else {
            RepositoryError::Transport(e.to_string())
        }
    }
}
