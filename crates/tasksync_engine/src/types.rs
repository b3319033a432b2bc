use std::fmt;

use tasksync_core::{CloseKind, ConnectionId, TaskDetail, TaskEvent, TaskId, TaskSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(pub u64);

/// Everything the engine reports back to its owner, in completion order.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    PushOpened {
        connection: ConnectionId,
    },
    PushEvent {
        connection: ConnectionId,
        event: TaskEvent,
    },
    PushClosed {
        connection: ConnectionId,
        kind: CloseKind,
    },
    TimerFired {
        timer: TimerId,
    },
    TaskListFetched(Result<Vec<TaskSummary>, ApiError>),
    TaskDetailFetched {
        task_id: TaskId,
        result: Result<TaskDetail, ApiError>,
    },
    TaskSubmitted(Result<SubmittedTask, ApiError>),
    TaskRetried {
        task_id: TaskId,
        result: Result<TaskDetail, ApiError>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct SubmittedTask {
    pub task_id: TaskId,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ApiError {
    pub kind: FailureKind,
    pub message: String,
}

impl ApiError {
    pub(crate) fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    Network,
    Decode,
    Io,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Network => write!(f, "network error"),
            FailureKind::Decode => write!(f, "unexpected response body"),
            FailureKind::Io => write!(f, "io error"),
        }
    }
}
