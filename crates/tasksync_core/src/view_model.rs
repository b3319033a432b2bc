use crate::{ConnectionStatus, Notice, TaskDetail, TaskId, TaskStatus};

/// Read-only projection handed to renderers.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SyncView {
    pub tasks: Vec<TaskRowView>,
    pub selected: Option<TaskId>,
    pub detail: Option<TaskDetail>,
    pub connection: ConnectionStatus,
    pub reconnect_attempt: u32,
    pub notices: Vec<Notice>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRowView {
    pub task_id: TaskId,
    pub status: TaskStatus,
    pub backend: String,
    pub parse_method: String,
    pub updated_at: String,
    pub error: Option<String>,
    pub selected: bool,
}
