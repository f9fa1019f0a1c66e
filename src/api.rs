use crate::config::{Config, CredentialPolicy};
use crate::error::{ApiError, ConfigError};
use crate::models::{
    Board, BoardId, BoardWithTasks, Credentials, NewTask, Status, Task, TaskId, TaskUpdate,
};
use async_trait::async_trait;
use reqwest::cookie::Jar;
use reqwest::header::{HeaderValue, ACCEPT};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};
use url::{form_urlencoded, Url};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Method {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    fn carries_body(self) -> bool {
        matches!(self, Method::Post | Method::Put | Method::Patch)
    }

    fn as_reqwest(self) -> reqwest::Method {
        match self {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// A successful response. `NoContent` is what a 204 (or an empty body) turns
/// into, so it never collides with a body that decodes to JSON `null`.
#[derive(Clone, Debug, PartialEq)]
pub enum ApiResponse {
    Json(Value),
    NoContent,
}

impl ApiResponse {
    pub fn into_json<T: DeserializeOwned>(self) -> Result<T, ApiError> {
        match self {
            ApiResponse::Json(value) => Ok(serde_json::from_value(value)?),
            ApiResponse::NoContent => Err(ApiError::EmptyBody),
        }
    }
}

/// The single place HTTP requests are built.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(config: &Config) -> Result<ApiClient, ConfigError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|_| ConfigError::BaseUrl(config.base_url.clone()))?;
        if base_url.cannot_be_a_base() {
            return Err(ConfigError::BaseUrl(config.base_url.clone()));
        }

        let mut builder = Client::builder();
        if config.credentials == CredentialPolicy::Include {
            let jar = Arc::new(Jar::default());
            if let Some(token) = &config.session_token {
                jar.add_cookie_str(
                    &format!("{}={}; Path=/", config.session_cookie, token),
                    &base_url,
                );
            }
            builder = builder.cookie_provider(jar);
        }

        Ok(ApiClient {
            client: builder.build()?,
            base_url,
        })
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.base_url.as_str().trim_end_matches('/'), path)
    }

    pub async fn request(
        &self,
        path: &str,
        method: Method,
        payload: Option<&Value>,
    ) -> Result<ApiResponse, ApiError> {
        let url = self.url_for(path);
        debug!(?method, %url, "api request");

        let mut request = self
            .client
            .request(method.as_reqwest(), &url)
            .header(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(body) = payload.filter(|_| method.carries_body()) {
            request = request.json(body);
        }

        let res = request.send().await.map_err(|err| {
            warn!(%url, error = %err, "api request did not complete");
            ApiError::Transport(err)
        })?;

        let status = res.status();
        let body = res.bytes().await?;

        if !status.is_success() {
            let message = error_message(status, &body);
            warn!(%url, status = status.as_u16(), %message, "api request failed");
            return Err(ApiError::Server {
                status: status.as_u16(),
                message,
            });
        }

        if status == StatusCode::NO_CONTENT || body.is_empty() {
            return Ok(ApiResponse::NoContent);
        }

        Ok(ApiResponse::Json(serde_json::from_slice(&body)?))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.request(path, Method::Get, None).await?.into_json()
    }

    async fn send<T: DeserializeOwned>(
        &self,
        path: &str,
        method: Method,
        payload: Value,
    ) -> Result<T, ApiError> {
        self.request(path, method, Some(&payload)).await?.into_json()
    }

    pub async fn list_boards(&self) -> Result<Vec<Board>, ApiError> {
        self.get("/boards/").await
    }

    pub async fn get_board(&self, board_id: BoardId) -> Result<BoardWithTasks, ApiError> {
        self.get(&format!("/boards/{}", board_id)).await
    }

    pub async fn create_board(&self, name: &str) -> Result<Board, ApiError> {
        self.send("/boards/", Method::Post, json!({ "name": name }))
            .await
    }

    pub async fn replace_board(&self, board_id: BoardId, name: &str) -> Result<Board, ApiError> {
        self.send(
            &format!("/boards/{}", board_id),
            Method::Put,
            json!({ "name": name }),
        )
        .await
    }

    pub async fn delete_board(&self, board_id: BoardId) -> Result<(), ApiError> {
        self.request(&format!("/boards/{}", board_id), Method::Delete, None)
            .await?;
        Ok(())
    }

    pub async fn list_tasks(
        &self,
        board_id: Option<BoardId>,
        status: Option<&Status>,
    ) -> Result<Vec<Task>, ApiError> {
        let mut query = form_urlencoded::Serializer::new(String::new());
        if let Some(board_id) = board_id {
            query.append_pair("board_id", &board_id.to_string());
        }
        if let Some(status) = status {
            query.append_pair("status_filter", status.as_str());
        }
        let query = query.finish();

        if query.is_empty() {
            self.get("/tasks/").await
        } else {
            self.get(&format!("/tasks/?{}", query)).await
        }
    }

    pub async fn fetch_task(&self, task_id: TaskId) -> Result<Task, ApiError> {
        self.get(&format!("/tasks/{}", task_id)).await
    }

    pub async fn create_task(&self, task: &NewTask) -> Result<Task, ApiError> {
        self.send("/tasks/", Method::Post, serde_json::to_value(task)?)
            .await
    }

    pub async fn replace_task(&self, task_id: TaskId, task: &TaskUpdate) -> Result<Task, ApiError> {
        self.send(
            &format!("/tasks/{}", task_id),
            Method::Put,
            serde_json::to_value(task)?,
        )
        .await
    }

    pub async fn patch_task_status(&self, task_id: TaskId, status: &Status) -> Result<Task, ApiError> {
        self.send(
            &format!("/tasks/{}/status", task_id),
            Method::Patch,
            json!({ "status": status }),
        )
        .await
    }

    pub async fn remove_task(&self, task_id: TaskId) -> Result<(), ApiError> {
        self.request(&format!("/tasks/{}", task_id), Method::Delete, None)
            .await?;
        Ok(())
    }

    pub async fn register(&self, credentials: &Credentials) -> Result<ApiResponse, ApiError> {
        self.request(
            "/auth/register",
            Method::Post,
            Some(&serde_json::to_value(credentials)?),
        )
        .await
    }

    pub async fn login(&self, credentials: &Credentials) -> Result<ApiResponse, ApiError> {
        self.request(
            "/auth/login",
            Method::Post,
            Some(&serde_json::to_value(credentials)?),
        )
        .await
    }

    pub async fn logout(&self) -> Result<(), ApiError> {
        self.request("/auth/logout", Method::Post, None).await?;
        Ok(())
    }

    pub async fn me(&self) -> Result<Value, ApiError> {
        self.get("/auth/me").await
    }
}

/// Builds the message for a non-success response: the server's `detail` when it
/// can be read, otherwise a generic one naming the status code.
fn error_message(status: StatusCode, body: &[u8]) -> String {
    let detail = serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|value| value.get("detail").cloned());

    match detail {
        Some(Value::String(text)) if !text.is_empty() => text,
        Some(Value::Array(items)) => {
            let messages: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(Value::as_str))
                .collect();
            if messages.is_empty() {
                format!("Request failed: {}", status.as_u16())
            } else {
                messages.join("; ")
            }
        }
        _ => format!("Request failed: {}", status.as_u16()),
    }
}

/// The slice of the API the drag controller and the task actions depend on.
#[async_trait]
pub trait TaskApi: Send + Sync {
    async fn update_task_status(&self, task_id: TaskId, status: &Status) -> Result<Task, ApiError>;
    async fn get_task(&self, task_id: TaskId) -> Result<Task, ApiError>;
    async fn delete_task(&self, task_id: TaskId) -> Result<(), ApiError>;
}

#[async_trait]
impl TaskApi for ApiClient {
    async fn update_task_status(&self, task_id: TaskId, status: &Status) -> Result<Task, ApiError> {
        self.patch_task_status(task_id, status).await
    }

    async fn get_task(&self, task_id: TaskId) -> Result<Task, ApiError> {
        self.fetch_task(task_id).await
    }

    async fn delete_task(&self, task_id: TaskId) -> Result<(), ApiError> {
        self.remove_task(task_id).await
    }
}
