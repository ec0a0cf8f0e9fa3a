//! Domain Layer
//!
//! Board aggregate, ordered columns, task identity and the pure move computation.
//! Nothing here performs I/O.

mod board;
mod column;
mod entity;
mod ids;
mod members;
mod movement;
mod task;

pub use board::Board;
pub use column::Column;
pub use entity::{find_by_id, position_by_id, DomainError, DomainResult, Entity};
pub use ids::{normalize, ColumnId, RawId, TaskId};
pub use members::{Assignment, Comment, Member};
pub use movement::{compute_move, IdMatching, MoveTransaction, MovedTask, PlannedMove};
pub use task::{NewTask, Priority, Task, TaskPatch};
