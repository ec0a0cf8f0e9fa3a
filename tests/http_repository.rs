//! HTTP Repository Tests
//!
//! Runs `HttpBoardRepository` against a local axum server that mimics the
//! board REST API and records every request it receives.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::{Path, State};
use axum::http::{header::AUTHORIZATION, HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, patch, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use linkup_board::repository::{
    BoardRepository, CredentialProvider, HttpBoardRepository, RefreshingCredentials,
    RepositoryError, StaticToken,
};
use linkup_board::{
    ColumnId, MoveOutcome, MoveTransaction, NewTask, Priority, RawId, SyncOptions, Synchronizer,
    TaskPatch,
};

#[derive(Debug, Clone)]
struct Recorded {
    method: Method,
    path: String,
    query: Option<String>,
    auth: Option<String>,
    body: Value,
}

#[derive(Default)]
struct Stub {
    requests: Mutex<Vec<Recorded>>,
    required_token: Option<String>,
    reject_moves: AtomicBool,
}

impl Stub {
    fn with_token(token: &str) -> Self {
        Self {
            required_token: Some(token.to_string()),
            ..Self::default()
        }
    }

    /// Record the request; false if it lacks the required bearer token
    fn record(&self, method: Method, uri: &Uri, headers: &HeaderMap, body: Value) -> bool {
        let auth = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let authorized = match &self.required_token {
            Some(token) => auth.as_deref() == Some(format!("Bearer {}", token).as_str()),
            None => true,
        };
        self.requests.lock().unwrap().push(Recorded {
            method,
            path: uri.path().to_string(),
            query: uri.query().map(str::to_string),
            auth,
            body,
        });
        authorized
    }

    fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    fn board_fetches(&self) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.path.ends_with("/board/"))
            .count()
    }
}

fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({"detail": "Token expired"}))).into_response()
}

async fn board(
    State(stub): State<Arc<Stub>>,
    Path(_slug): Path<String>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    if !stub.record(method, &uri, &headers, Value::Null) {
        return unauthorized();
    }
    Json(json!({
        "id": "b-1",
        "title": "Sprint",
        "columns": [
            {"id": "col-todo", "title": "To Do", "order": 0, "tasks": [
                {"id": "t-2", "column": "col-todo", "title": "Review", "order": 1},
                {"id": "t-1", "column": "col-todo", "title": "Draft", "order": 0, "priority": "high"}
            ]},
            {"id": "col-done", "title": "Done", "order": 1},
            {"id": "col-broken", "title": "Broken", "order": 2}
        ]
    }))
    .into_response()
}

async fn list_tasks(State(stub): State<Arc<Stub>>, method: Method, uri: Uri, headers: HeaderMap) -> Response {
    if !stub.record(method, &uri, &headers, Value::Null) {
        return unauthorized();
    }
    match uri.query() {
        Some("column=col-done") => Json(json!([
            {"id": 7, "column": "col-done", "title": "Shipped", "order": 0}
        ]))
        .into_response(),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response(),
    }
}

async fn create_task(
    State(stub): State<Arc<Stub>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !stub.record(method, &uri, &headers, body.clone()) {
        return unauthorized();
    }
    // echo without an id, like a serializer that omits it
    let created = json!({
        "title": body["title"],
        "column": body["column"],
        "priority": body["priority"],
    });
    (StatusCode::CREATED, Json(created)).into_response()
}

async fn update_task(
    State(stub): State<Arc<Stub>>,
    Path(id): Path<String>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !stub.record(method, &uri, &headers, body.clone()) {
        return unauthorized();
    }
    Json(json!({
        "id": id,
        "column": "col-todo",
        "title": body.get("title").cloned().unwrap_or(json!("Draft")),
        "priority": body.get("priority").cloned().unwrap_or(json!("medium")),
        "order": 0
    }))
    .into_response()
}

async fn delete_task(
    State(stub): State<Arc<Stub>>,
    Path(_id): Path<String>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    if !stub.record(method, &uri, &headers, Value::Null) {
        return unauthorized();
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn move_task(
    State(stub): State<Arc<Stub>>,
    Path(_id): Path<String>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !stub.record(method, &uri, &headers, body) {
        return unauthorized();
    }
    if stub.reject_moves.load(Ordering::SeqCst) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"detail": "Invalid target column"})),
        )
            .into_response();
    }
    Json(json!({"status": "moved"})).into_response()
}

async fn assign(
    State(stub): State<Arc<Stub>>,
    Path(id): Path<String>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    stub.record(method, &uri, &headers, body.clone());
    (
        StatusCode::CREATED,
        Json(json!({
            "id": "a-9",
            "task": id,
            "assignee": {"id": body["assignee_id"], "username": "amira", "full_name": "Amira Haddad"},
            "assigned_at": "2024-04-02T08:30:00Z",
            "assigned_by": {"id": "u-1", "username": "lina"}
        })),
    )
        .into_response()
}

async fn unassign(
    State(stub): State<Arc<Stub>>,
    Path(_id): Path<String>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    stub.record(method, &uri, &headers, Value::Null);
    StatusCode::NO_CONTENT.into_response()
}

async fn comment(
    State(stub): State<Arc<Stub>>,
    Path(id): Path<String>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    stub.record(method, &uri, &headers, body.clone());
    (
        StatusCode::CREATED,
        Json(json!({
            "id": "c-1",
            "task": id,
            "author": {"id": "u-1", "username": "lina"},
            "content": body["content"],
            "created_at": "2024-04-03T09:00:00Z"
        })),
    )
        .into_response()
}

async fn comments(
    State(stub): State<Arc<Stub>>,
    Path(_id): Path<String>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    stub.record(method, &uri, &headers, Value::Null);
    Json(json!([
        {"id": "c-1", "author": {"id": "u-1", "username": "lina"}, "content": "First"},
        {"id": "c-2", "author": null, "content": "Second"}
    ]))
    .into_response()
}

async fn refresh(
    State(stub): State<Arc<Stub>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    stub.record(method, &uri, &headers, body.clone());
    if body["refresh"] == "r-good" {
        Json(json!({"access": "fresh"})).into_response()
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({"detail": "Token is invalid or expired"})),
        )
            .into_response()
    }
}

async fn spawn(stub: Arc<Stub>) -> String {
    let app = Router::new()
        .route("/api/projects/workspace/{slug}/board/", get(board))
        .route("/api/projects/tasks/", get(list_tasks).post(create_task))
        .route("/api/projects/tasks/{id}/", patch(update_task).delete(delete_task))
        .route("/api/projects/tasks/{id}/move/", patch(move_task))
        .route("/api/projects/tasks/{id}/assign/", post(assign))
        .route("/api/projects/tasks/{id}/unassign/", delete(unassign))
        .route("/api/projects/tasks/{id}/comment/", post(comment))
        .route("/api/projects/tasks/{id}/comments/", get(comments))
        .route("/api/auth/refresh/", post(refresh))
        .with_state(stub);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/api", addr)
}

fn repository(base_url: &str, credentials: impl CredentialProvider + 'static) -> HttpBoardRepository {
    HttpBoardRepository::new(base_url, Arc::new(credentials))
}

#[tokio::test]
async fn test_fetch_board_with_column_fallback() {
    let stub = Arc::new(Stub::default());
    let base = spawn(stub.clone()).await;
    let repo = repository(&base, StaticToken::new("static-token"));

    let board = repo.fetch_board("alumni").await.unwrap();

    assert_eq!(board.id, "b-1");
    let titles: Vec<&str> = board.columns().iter().map(|c| c.title.as_str()).collect();
    assert_eq!(titles, vec!["To Do", "Done", "Broken"]);

    let todo = &board.columns()[0];
    assert_eq!(todo.get(0).unwrap().id.display(), "t-1");
    assert_eq!(todo.get(0).unwrap().priority, Priority::High);
    assert_eq!(todo.get(1).unwrap().order, 1);

    let done = &board.columns()[1];
    assert_eq!(done.len(), 1);
    assert_eq!(done.get(0).unwrap().id.display(), "7");
    assert_eq!(done.get(0).unwrap().id.original(), Some(&RawId::Number(7)));
    assert!(board.columns()[2].is_empty());

    let requests = stub.requests();
    assert_eq!(requests[0].path, "/api/projects/workspace/alumni/board/");
    assert_eq!(requests[0].auth.as_deref(), Some("Bearer static-token"));
    let queries: Vec<Option<String>> = requests[1..].iter().map(|r| r.query.clone()).collect();
    assert_eq!(
        queries,
        vec![
            Some("column=col-done".to_string()),
            Some("column=col-broken".to_string())
        ]
    );
}

#[tokio::test]
async fn test_persist_move_body() {
    let stub = Arc::new(Stub::default());
    let base = spawn(stub.clone()).await;
    let repo = repository(&base, StaticToken::anonymous());

    repo.persist_move(&RawId::from("t-1"), &ColumnId::from("col-done"), 2)
        .await
        .unwrap();

    let request = stub.requests().pop().unwrap();
    assert_eq!(request.method, Method::PATCH);
    assert_eq!(request.path, "/api/projects/tasks/t-1/move/");
    assert_eq!(request.body, json!({"target_column": "col-done", "order": 2}));
    assert!(request.auth.is_none());
}

#[tokio::test]
async fn test_rejected_move_carries_detail() {
    let stub = Arc::new(Stub::default());
    stub.reject_moves.store(true, Ordering::SeqCst);
    let base = spawn(stub.clone()).await;
    let repo = repository(&base, StaticToken::anonymous());

    let err = repo
        .persist_move(&RawId::from("t-1"), &ColumnId::from("col-x"), 0)
        .await
        .unwrap_err();

    assert_eq!(
        err,
        RepositoryError::ServerRejected {
            status: 400,
            detail: "Invalid target column".to_string()
        }
    );
}

#[tokio::test]
async fn test_unauthorized_refreshes_and_retries_once() {
    let stub = Arc::new(Stub::with_token("fresh"));
    let base = spawn(stub.clone()).await;
    let repo = repository(
        &base,
        RefreshingCredentials::new(&base, Some("stale".to_string()), "r-good"),
    );

    let board = repo.fetch_board("alumni").await.unwrap();
    assert_eq!(board.id, "b-1");

    let requests = stub.requests();
    let paths: Vec<&str> = requests.iter().take(3).map(|r| r.path.as_str()).collect();
    assert_eq!(
        paths,
        vec![
            "/api/projects/workspace/alumni/board/",
            "/api/auth/refresh/",
            "/api/projects/workspace/alumni/board/"
        ]
    );
    assert_eq!(requests[0].auth.as_deref(), Some("Bearer stale"));
    assert_eq!(requests[1].body, json!({"refresh": "r-good"}));
    assert_eq!(requests[2].auth.as_deref(), Some("Bearer fresh"));
    // later requests reuse the refreshed token
    assert!(requests[3..]
        .iter()
        .all(|r| r.auth.as_deref() == Some("Bearer fresh")));
}

#[tokio::test]
async fn test_failed_refresh_is_auth_error() {
    let stub = Arc::new(Stub::with_token("fresh"));
    let base = spawn(stub.clone()).await;
    let repo = repository(
        &base,
        RefreshingCredentials::new(&base, Some("stale".to_string()), "r-bad"),
    );

    let err = repo.fetch_board("alumni").await.unwrap_err();
    assert_eq!(err, RepositoryError::Auth("Token is invalid or expired".to_string()));
    assert_eq!(stub.board_fetches(), 1);
}

#[tokio::test]
async fn test_static_token_unauthorized_is_rejected() {
    let stub = Arc::new(Stub::with_token("fresh"));
    let base = spawn(stub.clone()).await;
    let repo = repository(&base, StaticToken::new("stale"));

    let err = repo.fetch_board("alumni").await.unwrap_err();
    assert!(err.is_unauthorized());
    assert_eq!(
        err,
        RepositoryError::ServerRejected {
            status: 401,
            detail: "Token expired".to_string()
        }
    );
    assert_eq!(stub.requests().len(), 1);
}

#[tokio::test]
async fn test_create_without_id_is_pending() {
    let stub = Arc::new(Stub::default());
    let base = spawn(stub.clone()).await;
    let repo = repository(&base, StaticToken::anonymous());

    let mut draft = NewTask::new(ColumnId::from("col-todo"), "Plan reunion");
    draft.priority = Priority::Urgent;
    let task = repo.create_task(&draft, Some("b-1")).await.unwrap();

    assert!(task.is_pending());
    assert_eq!(task.title, "Plan reunion");
    assert_eq!(task.column_id.as_str(), "col-todo");
    assert_eq!(task.priority, Priority::Urgent);

    let request = stub.requests().pop().unwrap();
    assert_eq!(request.method, Method::POST);
    assert_eq!(
        request.body,
        json!({
            "column": "col-todo",
            "title": "Plan reunion",
            "priority": "urgent",
            "is_blocked": false,
            "board": "b-1"
        })
    );
}

#[tokio::test]
async fn test_update_and_delete() {
    let stub = Arc::new(Stub::default());
    let base = spawn(stub.clone()).await;
    let repo = repository(&base, StaticToken::anonymous());

    let patch = TaskPatch {
        title: Some("Final draft".to_string()),
        ..TaskPatch::default()
    };
    let updated = repo.update_task(&RawId::from("t-1"), &patch).await.unwrap();
    assert_eq!(updated.title, "Final draft");
    assert_eq!(updated.id.display(), "t-1");

    repo.delete_task(&RawId::from("t-1")).await.unwrap();

    let requests = stub.requests();
    assert_eq!(requests[0].method, Method::PATCH);
    assert_eq!(requests[0].path, "/api/projects/tasks/t-1/");
    assert_eq!(requests[0].body, json!({"title": "Final draft"}));
    assert_eq!(requests[1].method, Method::DELETE);
    assert_eq!(requests[1].path, "/api/projects/tasks/t-1/");
}

#[tokio::test]
async fn test_synchronizer_rolls_back_rejected_move() {
    let stub = Arc::new(Stub::default());
    let base = spawn(stub.clone()).await;
    let sync = Synchronizer::new(
        repository(&base, StaticToken::anonymous()),
        SyncOptions::new("alumni"),
    );
    let loaded = sync.load().await.unwrap();

    let txn = MoveTransaction::new("t-1", "col-todo".into(), 0, "col-done".into(), 0);
    let outcome = sync.move_task(txn).await.unwrap();
    assert!(matches!(outcome, MoveOutcome::Confirmed(_)));
    assert_eq!(stub.board_fetches(), 1);

    stub.reject_moves.store(true, Ordering::SeqCst);
    let txn = MoveTransaction::new("t-2", "col-todo".into(), 0, "col-done".into(), 0);
    let outcome = sync.move_task(txn).await.unwrap();

    assert!(matches!(outcome, MoveOutcome::RolledBack { reconciled: true, .. }));
    assert_eq!(stub.board_fetches(), 2);
    // the stub never applies moves, so the reload matches the first load
    assert_eq!(*sync.snapshot().await.unwrap(), *loaded);
}

#[tokio::test]
async fn test_assign_and_unassign_requests() {
    let stub = Arc::new(Stub::default());
    let base = spawn(stub.clone()).await;
    let repo = repository(&base, StaticToken::new("static-token"));

    let assignment = repo
        .assign_task(&RawId::from(12), "u-7")
        .await
        .unwrap()
        .expect("assignment record");
    assert!(assignment.is_for("u-7"));
    assert_eq!(assignment.assignee.label(), "Amira Haddad");
    assert_eq!(assignment.assigned_by.unwrap().username, "lina");

    repo.unassign_task(&RawId::from(12), "u-7").await.unwrap();

    let requests = stub.requests();
    assert_eq!(requests[0].method, Method::POST);
    assert_eq!(requests[0].path, "/api/projects/tasks/12/assign/");
    assert_eq!(requests[0].body, json!({"assignee_id": "u-7"}));
    assert_eq!(requests[1].method, Method::DELETE);
    assert_eq!(requests[1].path, "/api/projects/tasks/12/unassign/");
    assert_eq!(requests[1].query.as_deref(), Some("user_id=u-7"));
}

#[tokio::test]
async fn test_add_and_list_comments() {
    let stub = Arc::new(Stub::default());
    let base = spawn(stub.clone()).await;
    let repo = repository(&base, StaticToken::anonymous());

    let comment = repo.add_comment(&RawId::from("t-1"), "Venue booked").await.unwrap();
    assert_eq!(comment.content, "Venue booked");
    assert_eq!(comment.author.unwrap().label(), "lina");
    assert!(comment.created_at.is_some());

    let comments = repo.list_comments(&RawId::from("t-1")).await.unwrap();
    let contents: Vec<&str> = comments.iter().map(|c| c.content.as_str()).collect();
    assert_eq!(contents, vec!["First", "Second"]);
    assert!(comments[1].author.is_none());

    let requests = stub.requests();
    assert_eq!(requests[0].path, "/api/projects/tasks/t-1/comment/");
    assert_eq!(requests[0].body, json!({"content": "Venue booked"}));
    assert_eq!(requests[1].method, Method::GET);
    assert_eq!(requests[1].path, "/api/projects/tasks/t-1/comments/");
}

#[tokio::test]
async fn test_list_column_tasks_uses_column_query() {
    let stub = Arc::new(Stub::default());
    let base = spawn(stub.clone()).await;
    let repo = repository(&base, StaticToken::anonymous());

    let tasks = repo.list_column_tasks(&ColumnId::from("col-done")).await.unwrap();

    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].title, "Shipped");
    assert_eq!(tasks[0].id.display(), "7");
    let request = stub.requests().pop().unwrap();
    assert_eq!(request.path, "/api/projects/tasks/");
    assert_eq!(request.query.as_deref(), Some("column=col-done"));
}
