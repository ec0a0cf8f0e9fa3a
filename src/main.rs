//! LinkUp board command-line client
//!
//! Usage:
//!   linkup-board --workspace alumni show
//!   linkup-board move <TASK> <COLUMN> <INDEX>
//!   linkup-board create <COLUMN> <TITLE> --priority high
//!
//! Settings come from `board_config.json` and `LINKUP_*` variables.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::broadcast;

use linkup_board::{
    Board, BoardConfig, ColumnId, HttpBoardRepository, MoveOutcome, MoveTransaction, NewTask,
    Priority, SyncEvent, SyncOptions, Synchronizer, TaskPatch,
};

const APP_NAME: &str = "linkup-board";

#[derive(Parser, Debug)]
#[command(name = "linkup-board")]
#[command(about = "Inspect and rearrange a LinkUp workspace board")]
struct Cli {
    /// Configuration file (defaults to ./board_config.json when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Workspace slug, overrides the configured one
    #[arg(short, long)]
    workspace: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the board
    Show,
    /// Move a task to a position in a column
    Move {
        task: String,
        column: String,
        index: usize,
    },
    /// Create a task at the end of a column
    Create {
        column: String,
        title: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long, value_enum)]
        priority: Option<Priority>,
    },
    /// Edit a task's title, description or priority
    Update {
        task: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long, value_enum)]
        priority: Option<Priority>,
    },
    /// Delete a task
    Delete { task: String },
    /// Assign a project member to a task
    Assign { task: String, user: String },
    /// Remove a member from a task
    Unassign { task: String, user: String },
    /// Comment on a task
    Comment { task: String, text: String },
    /// List a task's comments
    Comments { task: String },
    /// Reload the board from the server and print it
    Refresh,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = BoardConfig::load(cli.config.as_deref()).context("loading configuration")?;
    if let Some(workspace) = cli.workspace {
        config.workspace_slug = workspace;
    }
    config.validate()?;

    if let Err(e) = rolling_logger::init_logger(&config.log_dir, APP_NAME) {
        eprintln!("File logging disabled: {}", e);
    }
    log::info!(
        "{} starting for workspace {} against {}",
        APP_NAME,
        config.workspace_slug,
        config.api_base_url
    );

    let repository = HttpBoardRepository::from_config(&config)?;
    let sync = Synchronizer::new(repository, SyncOptions::from_config(&config));
    let mut notices = sync.subscribe();

    let result = run(&sync, cli.command).await;
    report_failures(&mut notices);
    result
}

async fn run(sync: &Synchronizer<HttpBoardRepository>, command: Command) -> Result<()> {
    let board = sync.load().await.context("loading board")?;

    match command {
        Command::Show | Command::Refresh => print_board(&board),
        Command::Move {
            task,
            column,
            index,
        } => {
            let Some((source, current)) = board.find_task(&task) else {
                bail!("task {} is not on the board", task);
            };
            let txn = MoveTransaction::new(
                task.as_str(),
                source.id.clone(),
                current.order as usize,
                ColumnId::new(column),
                index,
            );
            match sync.move_task(txn).await? {
                MoveOutcome::Unchanged => println!("Task {} is already there", task),
                MoveOutcome::Confirmed(change) => println!(
                    "Moved {} to {} at position {}",
                    change.task, change.dest_column, change.dest_index
                ),
                MoveOutcome::RolledBack { error, .. } => {
                    bail!("move of {} was rolled back: {}", task, error)
                }
            }
        }
        Command::Create {
            column,
            title,
            description,
            priority,
        } => {
            let mut draft = NewTask::new(ColumnId::new(column), title);
            draft.description = description;
            draft.priority = priority.unwrap_or_default();
            let task = sync.create_task(draft).await?;
            if task.is_pending() {
                // the process exits before a scheduled reload would run
                let board = sync.reconcile().await?;
                let column = board.column(&task.column_id);
                match column.and_then(|c| c.tasks().iter().rev().find(|t| t.title == task.title)) {
                    Some(found) => println!("Created {} \"{}\"", found.id, found.title),
                    None => println!(
                        "Created \"{}\"; its id will show up on the next `show`",
                        task.title
                    ),
                }
            } else {
                println!("Created {} \"{}\"", task.id, task.title);
            }
        }
        Command::Update {
            task,
            title,
            description,
            priority,
        } => {
            let patch = TaskPatch {
                title,
                description,
                priority,
                ..TaskPatch::default()
            };
            if patch.is_empty() {
                bail!("nothing to update");
            }
            let updated = sync.update_task(&task, patch).await?;
            println!("Updated {} \"{}\"", updated.id, updated.title);
        }
        Command::Delete { task } => {
            let removed = sync.delete_task(&task).await?;
            println!("Deleted {} \"{}\"", removed.id, removed.title);
        }
        Command::Assign { task, user } => {
            let updated = sync.assign_task(&task, &user).await?;
            println!("Assigned {} to {}", user, updated.id);
        }
        Command::Unassign { task, user } => {
            let updated = sync.unassign_task(&task, &user).await?;
            println!("Removed {} from {}", user, updated.id);
        }
        Command::Comment { task, text } => {
            sync.add_comment(&task, &text).await?;
            println!("Commented on {}", task);
        }
        Command::Comments { task } => {
            for comment in sync.list_comments(&task).await? {
                let author = comment
                    .author
                    .map(|a| a.label())
                    .unwrap_or_else(|| "unknown".to_string());
                let when = comment
                    .created_at
                    .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_default();
                println!("{} {}: {}", when, author, comment.content);
            }
        }
    }
    Ok(())
}

fn print_board(board: &Board) {
    println!("{}", board.title);
    for column in board.columns() {
        println!();
        println!("== {} ({}) ==", column.title, column.len());
        for task in column.tasks() {
            let blocked = if task.is_blocked { " [blocked]" } else { "" };
            let assignees: Vec<String> =
                task.assignments.iter().map(|a| a.assignee.label()).collect();
            let assigned = if assignees.is_empty() {
                String::new()
            } else {
                format!(" @{}", assignees.join(", @"))
            };
            println!(
                "  {:>2}. {:<7} {} ({}){}{}",
                task.order,
                task.priority.as_str(),
                task.title,
                task.id,
                blocked,
                assigned
            );
        }
    }
}

fn report_failures(notices: &mut broadcast::Receiver<SyncEvent>) {
    while let Ok(event) = notices.try_recv() {
        if let SyncEvent::Failure { operation, message } = event {
            eprintln!("[{}] {}", operation, message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::{json, Value};

    use linkup_board::repository::StaticToken;

    async fn board(State(fetches): State<Arc<AtomicUsize>>) -> Json<Value> {
        let n = fetches.fetch_add(1, Ordering::SeqCst);
        let tasks = if n == 0 {
            json!([])
        } else {
            json!([{"id": 41, "column": "todo", "title": "Plan reunion", "order": 0}])
        };
        Json(json!({
            "id": "b-1",
            "title": "Sprint",
            "columns": [{"id": "todo", "title": "To Do", "order": 0, "tasks": tasks}]
        }))
    }

    async fn create(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
        (StatusCode::CREATED, Json(json!({"title": body["title"], "column": body["column"]})))
    }

    async fn setup() -> (Synchronizer<HttpBoardRepository>, Arc<AtomicUsize>) {
        let fetches = Arc::new(AtomicUsize::new(0));
        let app = Router::new()
            .route("/api/projects/workspace/{slug}/board/", get(board))
            .route("/api/projects/tasks/", post(create))
            .with_state(fetches.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let repository = HttpBoardRepository::new(
            format!("http://{}/api", addr),
            Arc::new(StaticToken::anonymous()),
        );
        (Synchronizer::new(repository, SyncOptions::new("alumni")), fetches)
    }

    #[test]
    fn test_priority_must_be_known() {
        let cli = Cli::try_parse_from(["linkup-board", "create", "todo", "Plan", "--priority", "high"])
            .unwrap();
        match cli.command {
            Command::Create { priority, .. } => assert_eq!(priority, Some(Priority::High)),
            other => panic!("unexpected command {:?}", other),
        }

        let err = Cli::try_parse_from(["linkup-board", "update", "t-1", "--priority", "hgih"]);
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn test_refresh_fetches_once() {
        let (sync, fetches) = setup().await;

        run(&sync, Command::Refresh).await.unwrap();

        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_create_without_id_reconciles_before_exit() {
        let (sync, fetches) = setup().await;

        let command = Command::Create {
            column: "todo".to_string(),
            title: "Plan reunion".to_string(),
            description: None,
            priority: None,
        };
        run(&sync, command).await.unwrap();

        assert_eq!(fetches.load(Ordering::SeqCst), 2);
        let snapshot = sync.snapshot().await.unwrap();
        assert_eq!(snapshot.find_task("41").unwrap().1.title, "Plan reunion");
    }
}
