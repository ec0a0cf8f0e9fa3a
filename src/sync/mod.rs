//! Sync Layer
//!
//! Optimistic board synchronizer: local moves are applied immediately, then
//! confirmed by a single backend request and rolled back by a full reload if
//! that request fails.

mod error;
mod events;
mod synchronizer;

pub use error::{SyncError, SyncResult};
pub use events::{MoveOutcome, MovePhase, Operation, SyncEvent};
pub use synchronizer::{SyncOptions, Synchronizer};
