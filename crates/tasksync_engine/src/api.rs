use std::path::Path;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tasksync_core::{SubmitRequest, TaskDetail, TaskSummary};
use tasksync_logging::sync_debug;
use url::Url;

use crate::{ApiError, FailureKind, SubmittedTask};

pub const SESSION_HEADER: &str = "x-mineru-session";

#[derive(Debug, Clone)]
pub struct ApiSettings {
    /// Backend root, e.g. `http://127.0.0.1:8000`.
    pub base_url: String,
    /// Opaque session id forwarded to the backend for task scoping.
    pub session: Option<String>,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            session: None,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl ApiSettings {
    /// Joins path segments onto the base url, keeping any base path prefix.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|err| ApiError::new(FailureKind::InvalidUrl, err.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| ApiError::new(FailureKind::InvalidUrl, "base url cannot have paths"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

/// Pull side of the backend: list, detail, submit and retry.
#[async_trait::async_trait]
pub trait TaskApi: Send + Sync {
    async fn fetch_task_list(&self) -> Result<Vec<TaskSummary>, ApiError>;

    async fn fetch_task_detail(
        &self,
        task_id: &str,
        include_content: bool,
    ) -> Result<TaskDetail, ApiError>;

    async fn submit_task(&self, request: &SubmitRequest) -> Result<SubmittedTask, ApiError>;

    async fn retry_task(&self, task_id: &str) -> Result<TaskDetail, ApiError>;
}

#[derive(Deserialize)]
struct TaskListBody {
    tasks: Vec<TaskSummary>,
}

#[derive(Deserialize)]
struct ErrorBody {
    detail: String,
}

#[derive(Debug, Clone)]
pub struct ReqwestTaskApi {
    settings: ApiSettings,
    client: reqwest::Client,
}

impl ReqwestTaskApi {
    pub fn new(settings: ApiSettings) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| ApiError::new(FailureKind::Network, err.to_string()))?;
        Ok(Self { settings, client })
    }

    pub fn settings(&self) -> &ApiSettings {
        &self.settings
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let request = match &self.settings.session {
            Some(session) => request.header(SESSION_HEADER, session),
            None => request,
        };
        let response = request.send().await.map_err(map_reqwest_error)?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        // FastAPI reports failures as {"detail": "..."}.
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .map(|body| body.detail)
            .unwrap_or_else(|_| status.to_string());
        Err(ApiError::new(FailureKind::HttpStatus(status.as_u16()), message))
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = self.send(request).await?;
        response
            .json::<T>()
            .await
            .map_err(|err| ApiError::new(FailureKind::Decode, err.to_string()))
    }
}

#[async_trait::async_trait]
impl TaskApi for ReqwestTaskApi {
    async fn fetch_task_list(&self) -> Result<Vec<TaskSummary>, ApiError> {
        let url = self.settings.endpoint(&["tasks"])?;
        let body: TaskListBody = self.send_json(self.client.get(url)).await?;
        Ok(body.tasks)
    }

    async fn fetch_task_detail(
        &self,
        task_id: &str,
        include_content: bool,
    ) -> Result<TaskDetail, ApiError> {
        let mut url = self.settings.endpoint(&["tasks", task_id])?;
        url.query_pairs_mut()
            .append_pair("include_content", if include_content { "true" } else { "false" });
        self.send_json(self.client.get(url)).await
    }

    async fn submit_task(&self, request: &SubmitRequest) -> Result<SubmittedTask, ApiError> {
        let url = self.settings.endpoint(&["tasks"])?;
        let form = build_submit_form(request).await?;
        sync_debug!("Submitting {} file(s) to {}", request.files.len(), url);
        self.send_json(self.client.post(url).multipart(form)).await
    }

    async fn retry_task(&self, task_id: &str) -> Result<TaskDetail, ApiError> {
        let url = self.settings.endpoint(&["tasks", task_id, "retry"])?;
        self.send_json(self.client.post(url)).await
    }
}

async fn build_submit_form(request: &SubmitRequest) -> Result<Form, ApiError> {
    let mut form = Form::new();
    for path in &request.files {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|err| ApiError::new(FailureKind::Io, format!("{}: {err}", path.display())))?;
        let part = Part::bytes(bytes).file_name(upload_name(path));
        form = form
            .part("files", part)
            .text("lang_list", request.language.clone());
    }
    Ok(form
        .text("backend_form", request.backend.clone())
        .text("parse_method_form", request.parse_method.clone())
        .text("formula_enable", request.formula_enable.to_string())
        .text("table_enable", request.table_enable.to_string())
        .text("return_md", "true")
        .text("return_images", request.return_images.to_string())
        .text("start_page_id", request.start_page_id.to_string())
        .text("end_page_id", request.end_page_id.to_string()))
}

fn upload_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string())
}

fn map_reqwest_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        return ApiError::new(FailureKind::Timeout, err.to_string());
    }
    ApiError::new(FailureKind::Network, err.to_string())
}
