use crate::api::{StatusSource, TaskApi};
use crate::error::{ClientError, Result};
use crate::model::{
    CreatedTask, ProtocolFilter, ProtocolItem, ProtocolResponse, Source, SourcesResponse,
    StatusResponse, Task, TaskFilter, TaskList, TaskParams, TaskStatus,
};
use futures::future::{BoxFuture, FutureExt};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8080";

#[derive(Serialize)]
struct IdRequest {
    id: i64,
}

#[derive(Serialize)]
struct CreateRequest<'a> {
    query: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateRequest<'a> {
    id: i64,
    #[serde(flatten)]
    params: &'a TaskParams,
}

#[derive(Deserialize, Default)]
struct ErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Thin JSON client for the crawler task service.
///
/// Every endpoint is a `POST` with a JSON body, mirroring how the service
/// routes its handlers.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeout(base_url, 10)
    }

    pub fn with_timeout(base_url: &str, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .user_agent("Taskwatch/0.1 (https://github.com/trapdoorsec/taskwatch)")
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(timeout_secs.div_ceil(2)))
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            client,
            base_url: normalize_base_url(base_url)?,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub async fn task_status(&self, task_id: i64) -> Result<TaskStatus> {
        let response: StatusResponse = self.post("get-task-status", &IdRequest { id: task_id }).await?;
        Ok(response.status)
    }

    pub async fn task(&self, task_id: i64) -> Result<Task> {
        let mut task: Task = self.post("get-task", &IdRequest { id: task_id }).await?;
        task.id = task_id;
        Ok(task)
    }

    pub async fn sources(&self, task_id: i64) -> Result<Vec<Source>> {
        let response: SourcesResponse = self.post("get-sources", &IdRequest { id: task_id }).await?;
        debug!("Task {} has {} sources", task_id, response.sources.len());
        Ok(response.sources)
    }

    pub async fn tasks(&self, filter: &TaskFilter) -> Result<TaskList> {
        self.post("get-tasks", filter).await
    }

    /// Launch history per source, newest first as the service orders it.
    pub async fn protocol(&self, filter: &ProtocolFilter) -> Result<Vec<ProtocolItem>> {
        let response: ProtocolResponse = self.post("get-protocol", filter).await?;
        debug!("Protocol query returned {} launches", response.protocol.len());
        Ok(response.protocol)
    }

    pub async fn create_task(&self, query: &str) -> Result<i64> {
        let created: CreatedTask = self.post("create-task", &CreateRequest { query }).await?;
        info!("Created task {} for query {:?}", created.id, query);
        Ok(created.id)
    }

    pub async fn update_task(&self, task_id: i64, params: &TaskParams) -> Result<()> {
        self.send("update-task", &UpdateRequest { id: task_id, params })
            .await?;
        info!("Updated parameters of task {}", task_id);
        Ok(())
    }

    pub async fn activate_task(&self, task_id: i64) -> Result<()> {
        self.send("activate-task", &IdRequest { id: task_id }).await?;
        info!("Activated task {}", task_id);
        Ok(())
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.send(path, body).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn send<B>(&self, path: &str, body: &B) -> Result<reqwest::Response>
    where
        B: Serialize + ?Sized,
    {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| ClientError::InvalidUrl(format!("{}: {}", path, e)))?;
        debug!("POST {}", url);

        let response = self.client.post(url).json(body).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        Err(api_error(status, &text))
    }
}

impl StatusSource for ApiClient {
    fn fetch_task_status(&self, task_id: i64) -> BoxFuture<'_, Result<TaskStatus>> {
        self.task_status(task_id).boxed()
    }
}

impl TaskApi for ApiClient {
    fn fetch_task_detail(&self, task_id: i64) -> BoxFuture<'_, Result<Task>> {
        self.task(task_id).boxed()
    }

    fn fetch_sources(&self, task_id: i64) -> BoxFuture<'_, Result<Vec<Source>>> {
        self.sources(task_id).boxed()
    }
}

/// Parse the base URL and make sure relative endpoint joins append to its
/// path instead of replacing the last segment.
fn normalize_base_url(base_url: &str) -> Result<Url> {
    let mut url = Url::parse(base_url)
        .map_err(|e| ClientError::InvalidUrl(format!("{}: {}", base_url, e)))?;
    if url.cannot_be_a_base() {
        return Err(ClientError::InvalidUrl(format!(
            "{}: cannot be used as a base URL",
            base_url
        )));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn api_error(status: reqwest::StatusCode, text: &str) -> ClientError {
    let body: ErrorBody = serde_json::from_str(text).unwrap_or_default();
    let message = body
        .error
        .or_else(|| (!text.trim().is_empty()).then(|| text.trim().to_string()))
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown error").to_string());

    ClientError::ApiError {
        status: status.as_u16(),
        code: body.code,
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_base_url_appends_slash() {
        let url = normalize_base_url("http://localhost:8080/api").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/api/");
        assert_eq!(
            url.join("get-task").unwrap().as_str(),
            "http://localhost:8080/api/get-task"
        );
    }

    #[test]
    fn test_normalize_base_url_root() {
        let url = normalize_base_url("http://127.0.0.1:8080").unwrap();
        assert_eq!(
            url.join("get-sources").unwrap().as_str(),
            "http://127.0.0.1:8080/get-sources"
        );
    }

    #[test]
    fn test_normalize_base_url_invalid() {
        assert!(matches!(
            normalize_base_url("not a url"),
            Err(ClientError::InvalidUrl(_))
        ));
        assert!(matches!(
            normalize_base_url("mailto:ops@example.com"),
            Err(ClientError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_api_error_business_code() {
        let err = api_error(
            reqwest::StatusCode::FORBIDDEN,
            r#"{"code":"invalid_query","error":"Invalid topic"}"#,
        );
        match err {
            ClientError::ApiError {
                status,
                code,
                message,
            } => {
                assert_eq!(status, 403);
                assert_eq!(code.as_deref(), Some("invalid_query"));
                assert_eq!(message, "Invalid topic");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_api_error_plain_body() {
        let err = api_error(reqwest::StatusCode::BAD_GATEWAY, "");
        assert!(err.is_transient());
        assert!(err.to_string().contains("Bad Gateway"));
    }
}
