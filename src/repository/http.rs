//! HTTP board repository
//!
//! reqwest implementation of [`BoardRepository`] against the board REST API.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use reqwest::{Client, RequestBuilder, Response};

use crate::config::BoardConfig;
use crate::domain::{Assignment, Board, ColumnId, Comment, NewTask, RawId, Task, TaskPatch};

use super::credentials::{CredentialProvider, RefreshingCredentials, StaticToken};
use super::error::{RepositoryError, RepositoryResult};
use super::traits::BoardRepository;
use super::wire::{
    error_detail, AssignRequest, BoardRecord, CommentRequest, CreateTaskRequest, MoveRequest,
    TaskRecord,
};

/// Characters escaped inside a single path segment
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

pub struct HttpBoardRepository {
    client: Client,
    base_url: String,
    credentials: Arc<dyn CredentialProvider>,
}

impl HttpBoardRepository {
    pub fn new(base_url: impl Into<String>, credentials: Arc<dyn CredentialProvider>) -> Self {
        Self::with_client(Client::new(), base_url, credentials)
    }

    pub fn with_client(
        client: Client,
        base_url: impl Into<String>,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client,
            base_url,
            credentials,
        }
    }

    /// Build the client, timeout and credential provider from configuration.
    ///
    /// A configured refresh token selects [`RefreshingCredentials`], otherwise
    /// the access token (if any) is used as-is.
    pub fn from_config(config: &BoardConfig) -> RepositoryResult<Self> {
        let mut builder = Client::builder();
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder.build()?;

        let credentials: Arc<dyn CredentialProvider> = match &config.refresh_token {
            Some(refresh) => Arc::new(RefreshingCredentials::with_client(
                client.clone(),
                &config.api_base_url,
                config.access_token.clone(),
                refresh.clone(),
            )),
            None => match &config.access_token {
                Some(access) => Arc::new(StaticToken::new(access.clone())),
                None => Arc::new(StaticToken::anonymous()),
            },
        };

        Ok(Self::with_client(client, config.api_base_url.clone(), credentials))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn task_url(&self, task: &RawId, suffix: &str) -> String {
        let id = task.to_string();
        self.url(&format!(
            "projects/tasks/{}/{}",
            utf8_percent_encode(&id, PATH_SEGMENT),
            suffix
        ))
    }

    /// Send a request built by `build`, refreshing credentials and retrying
    /// once on a 401. Non-2xx responses become `ServerRejected`.
    async fn send<F>(&self, build: F) -> RepositoryResult<Response>
    where
        F: Fn(&Client) -> RequestBuilder + Send,
    {
        let token = self.credentials.access_token().await;
        let response = authorize(build(&self.client), token.as_deref()).send().await?;
        let rejection = match check_status(response).await {
            Err(e) if e.is_unauthorized() => e,
            checked => return checked,
        };

        log::info!("Request unauthorized, refreshing credentials");
        match self.credentials.refresh().await? {
            Some(token) => {
                let retry = authorize(build(&self.client), Some(&token)).send().await?;
                check_status(retry).await
            }
            None => Err(rejection),
        }
    }

    async fn fetch_column_records(&self, column: &ColumnId) -> RepositoryResult<Vec<TaskRecord>> {
        let url = self.url("projects/tasks/");
        let response = self
            .send(|client| client.get(&url).query(&[("column", column.as_str())]))
            .await?;
        Ok(response.json().await?)
    }
}

fn authorize(request: RequestBuilder, token: Option<&str>) -> RequestBuilder {
    match token {
        Some(token) => request.bearer_auth(token),
        None => request,
    }
}

async fn check_status(response: Response) -> RepositoryResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(RepositoryError::ServerRejected {
        status: status.as_u16(),
        detail: error_detail(status, &body),
    })
}

#[async_trait]
impl BoardRepository for HttpBoardRepository {
    async fn fetch_board(&self, workspace_slug: &str) -> RepositoryResult<Board> {
        let url = self.url(&format!(
            "projects/workspace/{}/board/",
            utf8_percent_encode(workspace_slug, PATH_SEGMENT)
        ));
        let mut record: BoardRecord = self.send(|client| client.get(&url)).await?.json().await?;
        record.validate()?;

        if let Some(columns) = record.columns.as_mut() {
            for column in columns.iter_mut().filter(|c| c.tasks.is_none()) {
                let id = column.column_id();
                match self.fetch_column_records(&id).await {
                    Ok(tasks) => column.tasks = Some(tasks),
                    Err(e) => {
                        log::warn!("Failed to fetch tasks for column {}: {}", id, e);
                        column.tasks = Some(Vec::new());
                    }
                }
            }
        }

        let board = record.into_board()?;
        log::info!(
            "Loaded board {} ({} columns, {} tasks)",
            board.id,
            board.columns().len(),
            board.task_count()
        );
        Ok(board)
    }

    async fn list_column_tasks(&self, column: &ColumnId) -> RepositoryResult<Vec<Task>> {
        let records = self.fetch_column_records(column).await?;
        Ok(records.into_iter().map(|r| r.into_task(column)).collect())
    }

    async fn persist_move(
        &self,
        task: &RawId,
        dest_column: &ColumnId,
        dest_index: usize,
    ) -> RepositoryResult<()> {
        let url = self.task_url(task, "move/");
        let body = MoveRequest {
            target_column: dest_column.to_string(),
            order: dest_index,
        };
        self.send(|client| client.patch(&url).json(&body)).await?;
        log::debug!("Persisted move of task {} to {}[{}]", task, dest_column, dest_index);
        Ok(())
    }

    async fn create_task(&self, draft: &NewTask, board_id: Option<&str>) -> RepositoryResult<Task> {
        let url = self.url("projects/tasks/");
        let body = CreateTaskRequest::new(draft, board_id);
        let record: TaskRecord = self
            .send(|client| client.post(&url).json(&body))
            .await?
            .json()
            .await?;

        let task = record.into_task(&draft.column_id);
        if task.is_pending() {
            log::warn!("Task \"{}\" created but the response carried no id", task.title);
        }
        Ok(task)
    }

    async fn update_task(&self, task: &RawId, patch: &TaskPatch) -> RepositoryResult<Task> {
        let url = self.task_url(task, "");
        let record: TaskRecord = self
            .send(|client| client.patch(&url).json(patch))
            .await?
            .json()
            .await?;
        // placement is owned locally; only descriptive fields are read back
        Ok(record.into_task(&ColumnId::new("")))
    }

    async fn delete_task(&self, task: &RawId) -> RepositoryResult<()> {
        let url = self.task_url(task, "");
        self.send(|client| client.delete(&url)).await?;
        Ok(())
    }

    async fn assign_task(
        &self,
        task: &RawId,
        assignee_id: &str,
    ) -> RepositoryResult<Option<Assignment>> {
        let url = self.task_url(task, "assign/");
        let body = AssignRequest { assignee_id };
        let response: serde_json::Value = self
            .send(|client| client.post(&url).json(&body))
            .await?
            .json()
            .await
            .unwrap_or_default();
        Ok(serde_json::from_value(response).ok())
    }

    async fn unassign_task(&self, task: &RawId, user_id: &str) -> RepositoryResult<()> {
        let url = self.task_url(task, "unassign/");
        self.send(|client| client.delete(&url).query(&[("user_id", user_id)]))
            .await?;
        Ok(())
    }

    async fn add_comment(&self, task: &RawId, content: &str) -> RepositoryResult<Comment> {
        let url = self.task_url(task, "comment/");
        let body = CommentRequest { content };
        Ok(self
            .send(|client| client.post(&url).json(&body))
            .await?
            .json()
            .await?)
    }

    async fn list_comments(&self, task: &RawId) -> RepositoryResult<Vec<Comment>> {
        let url = self.task_url(task, "comments/");
        Ok(self.send(|client| client.get(&url)).await?.json().await?)
    }
}
