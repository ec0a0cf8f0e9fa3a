//! Board Synchronizer
//!
//! Owns the local board. Mutations are computed and committed under the
//! state lock; the lock is released before any backend request, so gestures
//! made while a request is in flight stack on the optimistic board.
//!
//! A failed move never retries. If no reload has happened since the move was
//! applied, local state falls back to the last server-confirmed board and the
//! whole board is fetched again; otherwise the failure is stale and only
//! reported.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, Mutex};

use crate::config::BoardConfig;
use crate::domain::{
    compute_move, Assignment, Board, Comment, DomainError, IdMatching, MoveTransaction, MovedTask,
    NewTask, RawId, Task, TaskPatch,
};
use crate::repository::BoardRepository;

use super::error::{SyncError, SyncResult};
use super::events::{MoveOutcome, MovePhase, Operation, SyncEvent};

/// Capacity of the event channel; slow subscribers see `Lagged`
const EVENT_CAPACITY: usize = 64;

/// Delay before reloading after a create whose response had no id
pub const DEFAULT_RECONCILE_DELAY: Duration = Duration::from_millis(2000);

/// Wait before listing a column to see whether a failed create went through
pub const DEFAULT_CREATE_CHECK_DELAY: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, PartialEq)]
pub struct SyncOptions {
    pub workspace_slug: String,
    pub reconcile_delay: Duration,
    pub create_check_delay: Duration,
    pub id_matching: IdMatching,
}

impl SyncOptions {
    pub fn new(workspace_slug: impl Into<String>) -> Self {
        Self {
            workspace_slug: workspace_slug.into(),
            reconcile_delay: DEFAULT_RECONCILE_DELAY,
            create_check_delay: DEFAULT_CREATE_CHECK_DELAY,
            id_matching: IdMatching::default(),
        }
    }

    pub fn from_config(config: &BoardConfig) -> Self {
        Self {
            workspace_slug: config.workspace_slug.clone(),
            reconcile_delay: Duration::from_millis(config.reconcile_delay_ms),
            create_check_delay: Duration::from_millis(config.create_check_delay_ms),
            id_matching: if config.legacy_id_matching {
                IdMatching::Legacy
            } else {
                IdMatching::Strict
            },
        }
    }
}

#[derive(Debug, Default)]
struct SyncState {
    board: Option<Arc<Board>>,
    /// Last fetched board plus confirmed edits; what a rejected move falls back to
    confirmed: Option<Arc<Board>>,
    /// Bumped on every successful reload
    generation: u64,
    reconcile_scheduled: bool,
}

struct Inner<R> {
    repository: R,
    options: SyncOptions,
    state: Mutex<SyncState>,
    events: broadcast::Sender<SyncEvent>,
}

/// Cheaply cloneable handle; clones share state
pub struct Synchronizer<R> {
    inner: Arc<Inner<R>>,
}

impl<R> Clone for Synchronizer<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: BoardRepository + 'static> Synchronizer<R> {
    pub fn new(repository: R, options: SyncOptions) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                repository,
                options,
                state: Mutex::new(SyncState::default()),
                events,
            }),
        }
    }

    pub fn repository(&self) -> &R {
        &self.inner.repository
    }

    pub fn options(&self) -> &SyncOptions {
        &self.inner.options
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.inner.events.subscribe()
    }

    /// Current board. Callers get an immutable snapshot; only the
    /// synchronizer replaces it.
    pub async fn snapshot(&self) -> SyncResult<Arc<Board>> {
        self.inner
            .state
            .lock()
            .await
            .board
            .clone()
            .ok_or(SyncError::NotLoaded)
    }

    pub async fn generation(&self) -> u64 {
        self.inner.state.lock().await.generation
    }

    /// Initial fetch; identical to [`Synchronizer::reconcile`]
    pub async fn load(&self) -> SyncResult<Arc<Board>> {
        self.reconcile().await
    }

    /// Fetch the authoritative board and replace local state wholesale
    pub async fn reconcile(&self) -> SyncResult<Arc<Board>> {
        let board = match self
            .inner
            .repository
            .fetch_board(&self.inner.options.workspace_slug)
            .await
        {
            Ok(board) => Arc::new(board),
            Err(e) => {
                self.notify_failure(Operation::Load, format!("Failed to load board: {}", e));
                return Err(e.into());
            }
        };

        let generation = {
            let mut state = self.inner.state.lock().await;
            state.generation += 1;
            state.board = Some(Arc::clone(&board));
            state.confirmed = Some(Arc::clone(&board));
            state.generation
        };
        log::debug!("Board reconciled (generation {})", generation);
        self.emit(SyncEvent::Reconciled { generation });
        Ok(board)
    }

    /// Reload after `reconcile_delay` in a background task.
    ///
    /// Returns false if a reload is already scheduled; concurrent requests
    /// coalesce into that one.
    pub async fn schedule_reconcile(&self) -> bool {
        {
            let mut state = self.inner.state.lock().await;
            if state.reconcile_scheduled {
                log::debug!("Reconcile already scheduled");
                return false;
            }
            state.reconcile_scheduled = true;
        }

        let sync = self.clone();
        let delay = self.inner.options.reconcile_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            sync.inner.state.lock().await.reconcile_scheduled = false;
            if let Err(e) = sync.reconcile().await {
                log::warn!("Scheduled reconcile failed: {}", e);
            }
        });
        true
    }

    /// Apply a drag-release optimistically and confirm it with one request.
    ///
    /// Domain failures leave the board untouched, emit a notice and reload
    /// before returning the error. Backend failures are reported through
    /// [`MoveOutcome::RolledBack`].
    pub async fn move_task(&self, txn: MoveTransaction) -> SyncResult<MoveOutcome> {
        let applied = match self.apply_move(&txn).await {
            Ok(Some(applied)) => applied,
            Ok(None) => return Ok(MoveOutcome::Unchanged),
            Err(SyncError::Domain(e)) => {
                log::warn!("Move of task {} rejected locally: {}", txn.task_id, e);
                self.notify_failure(Operation::Move, format!("Could not move task: {}", e));
                // the reload reports its own failure
                let _ = self.reconcile().await;
                return Err(SyncError::Domain(e));
            }
            Err(e) => return Err(e),
        };
        let (change, original, applied_generation) = applied;

        self.emit(SyncEvent::Move {
            task: change.task.clone(),
            phase: MovePhase::OptimisticallyApplied,
        });

        let confirmed = self
            .inner
            .repository
            .persist_move(&original, &change.dest_column, change.dest_index)
            .await;

        match confirmed {
            Ok(()) => {
                self.emit(SyncEvent::Move {
                    task: change.task.clone(),
                    phase: MovePhase::Confirmed,
                });
                Ok(MoveOutcome::Confirmed(change))
            }
            Err(error) => {
                log::error!("Failed to persist move of task {}: {}", change.task, error);
                self.notify_failure(
                    Operation::Move,
                    format!("Failed to move task {}: {}", change.task, error),
                );
                self.emit(SyncEvent::Move {
                    task: change.task.clone(),
                    phase: MovePhase::RolledBack,
                });

                let current = {
                    let mut state = self.inner.state.lock().await;
                    let current = state.generation == applied_generation;
                    if current {
                        state.board = state.confirmed.clone();
                    }
                    current
                };
                let reconciled = if current {
                    self.reconcile().await.is_ok()
                } else {
                    log::info!(
                        "Ignoring stale move failure for task {}; board already reloaded",
                        change.task
                    );
                    false
                };
                Ok(MoveOutcome::RolledBack {
                    change,
                    error,
                    reconciled,
                })
            }
        }
    }

    /// Compute and commit a move under the lock. `None` for a no-op.
    async fn apply_move(&self, txn: &MoveTransaction) -> SyncResult<Option<(MovedTask, RawId, u64)>> {
        let mut state = self.inner.state.lock().await;
        let board = state.board.as_ref().ok_or(SyncError::NotLoaded)?;

        let plan = compute_move(board, txn, self.inner.options.id_matching)?;
        let Some(change) = plan.change else {
            log::debug!("Move of task {} is a no-op", txn.task_id);
            return Ok(None);
        };
        let original = change
            .task
            .original()
            .cloned()
            .ok_or_else(|| DomainError::PendingIdentity(change.task.to_string()))?;

        state.board = Some(Arc::new(plan.board));
        Ok(Some((change, original, state.generation)))
    }

    /// Create a task on the server and append it to its column.
    ///
    /// If the server did not return an id the task keeps a synthesized one
    /// and a delayed reload is scheduled to pick up the real id. If the
    /// request fails, the column is listed after `create_check_delay` and a
    /// new task with the same title is adopted instead of reporting the error.
    pub async fn create_task(&self, draft: NewTask) -> SyncResult<Task> {
        let checked = {
            let state = self.inner.state.lock().await;
            let board = state.board.as_ref().ok_or(SyncError::NotLoaded)?;
            board
                .require_column(&draft.column_id)
                .map(|_| board.id.clone())
        };
        let board_id = match checked {
            Ok(id) => id,
            Err(e) => {
                self.notify_failure(Operation::Create, format!("Could not create task: {}", e));
                return Err(e.into());
            }
        };

        let task = match self.inner.repository.create_task(&draft, Some(&board_id)).await {
            Ok(task) => task,
            Err(e) => {
                log::error!("Failed to create task \"{}\": {}", draft.title, e);
                match self.find_created(&draft).await {
                    Some(task) => {
                        log::info!("Task \"{}\" was created despite the error", draft.title);
                        task
                    }
                    None => {
                        self.notify_failure(
                            Operation::Create,
                            format!("Failed to create task: {}", e),
                        );
                        return Err(e.into());
                    }
                }
            }
        };
        let pending = task.is_pending();

        let appended = {
            let mut state = self.inner.state.lock().await;
            edit_confirmed(&mut state, |board| {
                if let Some((_, existing)) = board.find_task(task.id.display()) {
                    return Ok(existing.clone());
                }
                board
                    .append_task(&draft.column_id, task.clone())
                    .map(Task::clone)
            })?
        };

        let created = match appended {
            Ok(task) => task,
            Err(e) => {
                // column vanished in a reload while the request was in flight
                self.notify_failure(Operation::Create, format!("Created task is not shown: {}", e));
                self.schedule_reconcile().await;
                return Err(e.into());
            }
        };

        log::info!("Created task {} in column {}", created.id, created.column_id);
        self.emit(SyncEvent::TaskCreated {
            task: created.id.clone(),
        });
        if pending {
            self.schedule_reconcile().await;
        }
        Ok(created)
    }

    /// Update descriptive fields; order and column are left alone
    pub async fn update_task(&self, display_id: &str, patch: TaskPatch) -> SyncResult<Task> {
        let (current, original) = self.addressable(Operation::Update, display_id).await?;
        if patch.is_empty() {
            return Ok(current);
        }

        let updated = match self.inner.repository.update_task(&original, &patch).await {
            Ok(task) => task,
            Err(e) => {
                log::error!("Failed to update task {}: {}", display_id, e);
                self.notify_failure(Operation::Update, format!("Failed to update task: {}", e));
                return Err(e.into());
            }
        };

        let merged = {
            let mut state = self.inner.state.lock().await;
            edit_confirmed(&mut state, |board| {
                board.find_task_mut(display_id).map(|task| {
                    task.merge_details(&updated);
                    task.clone()
                })
            })?
        };

        let task = match merged {
            Some(task) => task,
            None => {
                log::debug!("Updated task {} no longer on the local board", display_id);
                let mut task = current;
                task.merge_details(&updated);
                task
            }
        };
        self.emit(SyncEvent::TaskUpdated {
            task: task.id.clone(),
        });
        Ok(task)
    }

    /// Delete on the server, then remove locally and reindex the column
    pub async fn delete_task(&self, display_id: &str) -> SyncResult<Task> {
        let (current, original) = self.addressable(Operation::Delete, display_id).await?;

        if let Err(e) = self.inner.repository.delete_task(&original).await {
            log::error!("Failed to delete task {}: {}", display_id, e);
            self.notify_failure(Operation::Delete, format!("Failed to delete task: {}", e));
            return Err(e.into());
        }

        let removed = {
            let mut state = self.inner.state.lock().await;
            edit_confirmed(&mut state, |board| board.remove_task(display_id))?
        };

        log::info!("Deleted task {}", display_id);
        self.emit(SyncEvent::TaskDeleted {
            task: current.id.clone(),
        });
        Ok(removed.unwrap_or(current))
    }

    /// Assign a project member to a task
    pub async fn assign_task(&self, display_id: &str, assignee_id: &str) -> SyncResult<Task> {
        let (current, original) = self.addressable(Operation::Assign, display_id).await?;

        let assignment = match self.inner.repository.assign_task(&original, assignee_id).await {
            Ok(assignment) => assignment.unwrap_or_else(|| Assignment::local(assignee_id)),
            Err(e) => {
                log::error!("Failed to assign task {} to {}: {}", display_id, assignee_id, e);
                self.notify_failure(Operation::Assign, format!("Failed to assign member: {}", e));
                return Err(e.into());
            }
        };

        let task = self
            .edit_task(current, display_id, |task| {
                task.assign(assignment.clone());
            })
            .await?;
        log::info!("Assigned task {} to {}", display_id, assignee_id);
        Ok(task)
    }

    /// Remove a member's assignment from a task
    pub async fn unassign_task(&self, display_id: &str, user_id: &str) -> SyncResult<Task> {
        let (current, original) = self.addressable(Operation::Unassign, display_id).await?;

        if let Err(e) = self.inner.repository.unassign_task(&original, user_id).await {
            log::error!("Failed to unassign {} from task {}: {}", user_id, display_id, e);
            self.notify_failure(Operation::Unassign, format!("Failed to unassign member: {}", e));
            return Err(e.into());
        }

        self.edit_task(current, display_id, |task| {
            task.unassign(user_id);
        })
        .await
    }

    /// Post a comment and bump the task's comment count
    pub async fn add_comment(&self, display_id: &str, content: &str) -> SyncResult<Comment> {
        let content = content.trim();
        if content.is_empty() {
            let error = DomainError::EmptyComment;
            self.notify_failure(Operation::Comment, format!("Could not add comment: {}", error));
            return Err(error.into());
        }
        let (current, original) = self.addressable(Operation::Comment, display_id).await?;

        let comment = match self.inner.repository.add_comment(&original, content).await {
            Ok(comment) => comment,
            Err(e) => {
                log::error!("Failed to comment on task {}: {}", display_id, e);
                self.notify_failure(Operation::Comment, format!("Failed to add comment: {}", e));
                return Err(e.into());
            }
        };

        self.edit_task(current, display_id, |task| task.comments_count += 1)
            .await?;
        Ok(comment)
    }

    /// Fetch a task's comments; local state is not touched
    pub async fn list_comments(&self, display_id: &str) -> SyncResult<Vec<Comment>> {
        let (_, original) = self.addressable(Operation::Load, display_id).await?;
        match self.inner.repository.list_comments(&original).await {
            Ok(comments) => Ok(comments),
            Err(e) => {
                self.notify_failure(Operation::Load, format!("Failed to load comments: {}", e));
                Err(e.into())
            }
        }
    }

    /// Apply a server-confirmed change to one task and announce it. Falls
    /// back to `current` if a reload dropped the task meanwhile.
    async fn edit_task<F>(&self, current: Task, display_id: &str, change: F) -> SyncResult<Task>
    where
        F: Fn(&mut Task),
    {
        let edited = {
            let mut state = self.inner.state.lock().await;
            edit_confirmed(&mut state, |board| {
                board.find_task_mut(display_id).map(|task| {
                    change(task);
                    task.clone()
                })
            })?
        };
        let task = edited.unwrap_or_else(|| {
            let mut task = current;
            change(&mut task);
            task
        });
        self.emit(SyncEvent::TaskUpdated {
            task: task.id.clone(),
        });
        Ok(task)
    }

    /// Look for a task the server created although the create request failed.
    /// Tasks already on the local board are not candidates.
    async fn find_created(&self, draft: &NewTask) -> Option<Task> {
        tokio::time::sleep(self.inner.options.create_check_delay).await;
        let tasks = match self.inner.repository.list_column_tasks(&draft.column_id).await {
            Ok(tasks) => tasks,
            Err(e) => {
                log::warn!("Could not check whether \"{}\" was created: {}", draft.title, e);
                return None;
            }
        };

        let state = self.inner.state.lock().await;
        let board = state.board.as_ref()?;
        tasks
            .into_iter()
            .find(|t| t.title == draft.title && board.find_task(t.id.display()).is_none())
    }

    /// Look up a task that can be addressed on the server.
    ///
    /// Pending tasks fail with `PendingIdentity` and schedule a reload.
    async fn addressable(&self, operation: Operation, display_id: &str) -> SyncResult<(Task, RawId)> {
        let found = {
            let state = self.inner.state.lock().await;
            let board = state.board.as_ref().ok_or(SyncError::NotLoaded)?;
            board.find_task(display_id).map(|(_, task)| task.clone())
        };

        let error = match found {
            None => DomainError::TaskNotFound(display_id.to_string()),
            Some(task) => match task.id.original().cloned() {
                Some(original) => return Ok((task, original)),
                None => DomainError::PendingIdentity(display_id.to_string()),
            },
        };

        self.notify_failure(operation, format!("Could not {} task: {}", operation, error));
        if matches!(error, DomainError::PendingIdentity(_)) {
            self.schedule_reconcile().await;
        }
        Err(error.into())
    }

    fn notify_failure(&self, operation: Operation, message: String) {
        self.emit(SyncEvent::Failure { operation, message });
    }

    fn emit(&self, event: SyncEvent) {
        // no subscribers is fine
        let _ = self.inner.events.send(event);
    }
}

/// Apply a server-confirmed edit to the current board and to the rollback base
fn edit_confirmed<T, F>(state: &mut SyncState, edit: F) -> SyncResult<T>
where
    F: Fn(&mut Board) -> T,
{
    if let Some(confirmed) = state.confirmed.as_mut() {
        edit(Arc::make_mut(confirmed));
    }
    let board = state.board.as_mut().ok_or(SyncError::NotLoaded)?;
    Ok(edit(Arc::make_mut(board)))
}
