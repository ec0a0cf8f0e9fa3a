//! Repository Layer
//!
//! Access to the board REST backend: the abstract `BoardRepository` trait,
//! its reqwest implementation, wire records and credential providers.

mod credentials;
mod error;
mod http;
mod traits;
mod wire;

pub use credentials::{CredentialProvider, RefreshingCredentials, StaticToken};
pub use error::{RepositoryError, RepositoryResult};
pub use http::HttpBoardRepository;
pub use traits::BoardRepository;
pub use wire::{BoardRecord, ColumnRecord, MoveRequest, TaskRecord};
