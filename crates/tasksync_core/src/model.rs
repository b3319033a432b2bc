use std::cmp::Ordering;
use std::path::PathBuf;

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub type TaskId = String;

/// Lifecycle status reported by the backend for a parse task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Queued,
    Running,
    Success,
    Failed,
}

impl TaskStatus {
    /// No further transitions are expected once a task reaches these.
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Success | TaskStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Queued => "queued",
            TaskStatus::Running => "running",
            TaskStatus::Success => "success",
            TaskStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSummary {
    pub task_id: TaskId,
    pub status: TaskStatus,
    #[serde(default)]
    pub backend: String,
    #[serde(default)]
    pub parse_method: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
    #[serde(default)]
    pub error: Option<String>,
}

impl TaskSummary {
    /// Placeholder for a task first seen through a bare status event.
    pub fn observed(task_id: impl Into<TaskId>, status: TaskStatus, timestamp: &str) -> Self {
        Self {
            task_id: task_id.into(),
            status,
            backend: String::new(),
            parse_method: String::new(),
            created_at: timestamp.to_string(),
            updated_at: timestamp.to_string(),
            error: None,
        }
    }
}

/// Reference to a file produced by the backend inside the task work dir.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub exists: bool,
}

/// Result for one uploaded input file. Content fields are only present
/// when the detail was fetched with content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDocument {
    pub name: String,
    #[serde(default)]
    pub directory: String,
    #[serde(default)]
    pub files: Vec<ArtifactRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub markdown: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub middle_json: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_list: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    #[serde(default)]
    pub images: Vec<ArtifactRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDetail {
    #[serde(flatten)]
    pub summary: TaskSummary,
    #[serde(default)]
    pub params: Map<String, Value>,
    #[serde(default)]
    pub documents: Vec<TaskDocument>,
    #[serde(default)]
    pub logs: Vec<String>,
}

impl TaskDetail {
    pub fn task_id(&self) -> &str {
        &self.summary.task_id
    }
}

/// Options for a new parse task. `files` are local paths the engine uploads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitRequest {
    pub files: Vec<PathBuf>,
    pub language: String,
    pub backend: String,
    pub parse_method: String,
    pub formula_enable: bool,
    pub table_enable: bool,
    pub return_images: bool,
    pub start_page_id: u32,
    pub end_page_id: u32,
}

impl Default for SubmitRequest {
    fn default() -> Self {
        Self {
            files: Vec::new(),
            language: "ch".to_string(),
            backend: "pipeline".to_string(),
            parse_method: "auto".to_string(),
            formula_enable: true,
            table_enable: true,
            return_images: false,
            start_page_id: 0,
            end_page_id: 99_999,
        }
    }
}

/// A failed pull as seen by the core: only the message survives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullError {
    pub message: String,
}

impl PullError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Orders two backend timestamps.
///
/// RFC 3339 values are compared as instants so differing offsets order
/// correctly; anything unparsable falls back to plain string order.
pub fn compare_timestamps(a: &str, b: &str) -> Ordering {
    match (
        DateTime::parse_from_rfc3339(a),
        DateTime::parse_from_rfc3339(b),
    ) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        _ => a.cmp(b),
    }
}
