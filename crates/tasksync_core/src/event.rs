use serde::Deserialize;

use crate::{TaskDetail, TaskId, TaskStatus};

/// Typed push event received on a task's live connection.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskEvent {
    /// Authoritative replacement of a task's detail.
    Snapshot(TaskDetail),
    /// Summary-level status change.
    Status {
        task_id: TaskId,
        status: TaskStatus,
        timestamp: String,
    },
    /// One new log line.
    Log { task_id: TaskId, line: String },
    /// Backend-reported failure.
    Error {
        task_id: TaskId,
        message: String,
        timestamp: String,
    },
}

impl TaskEvent {
    pub fn task_id(&self) -> &str {
        match self {
            TaskEvent::Snapshot(detail) => detail.task_id(),
            TaskEvent::Status { task_id, .. }
            | TaskEvent::Log { task_id, .. }
            | TaskEvent::Error { task_id, .. } => task_id,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed push payload: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[derive(Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
enum WireEvent {
    Snapshot {
        task: TaskDetail,
    },
    Status {
        task_id: TaskId,
        status: TaskStatus,
        timestamp: String,
    },
    Log {
        task_id: TaskId,
        line: String,
    },
    Error {
        task_id: TaskId,
        message: String,
        #[serde(default)]
        timestamp: String,
    },
    #[serde(other)]
    Unknown,
}

/// Decodes one push frame.
///
/// Returns `Ok(None)` for a well-formed object whose `event` tag is not one
/// we know about.
pub fn decode_event(raw: &str) -> Result<Option<TaskEvent>, DecodeError> {
    let event = match serde_json::from_str::<WireEvent>(raw)? {
        WireEvent::Snapshot { task } => TaskEvent::Snapshot(task),
        WireEvent::Status {
            task_id,
            status,
            timestamp,
        } => TaskEvent::Status {
            task_id,
            status,
            timestamp,
        },
        WireEvent::Log { task_id, line } => TaskEvent::Log { task_id, line },
        WireEvent::Error {
            task_id,
            message,
            timestamp,
        } => TaskEvent::Error {
            task_id,
            message,
            timestamp,
        },
        WireEvent::Unknown => return Ok(None),
    };
    Ok(Some(event))
}
