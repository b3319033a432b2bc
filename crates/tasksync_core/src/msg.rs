use crate::{
    CloseKind, ConnectionId, NoticeId, PullError, SubmitRequest, TaskDetail, TaskEvent, TaskId,
    TaskSummary,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// User picked a task in the list.
    TaskSelected { task_id: TaskId },
    /// User closed the detail pane.
    SelectionCleared,
    /// User asked for a fresh task list.
    RefreshRequested,
    /// User submitted new files for parsing.
    SubmitRequested(SubmitRequest),
    /// User asked the backend to rerun a finished task.
    RetryRequested { task_id: TaskId },
    /// User dismissed an error notice.
    NoticeDismissed { notice: NoticeId },
    /// Push transport finished its handshake.
    ConnectionOpened { connection: ConnectionId },
    /// Push transport ended, for whatever reason.
    ConnectionClosed {
        connection: ConnectionId,
        kind: CloseKind,
    },
    /// Decoded push event from a live connection.
    PushEvent {
        connection: ConnectionId,
        event: TaskEvent,
    },
    /// Reconnect backoff timer elapsed.
    ReconnectDue { after: ConnectionId },
    /// Pull results.
    TaskListLoaded(Result<Vec<TaskSummary>, PullError>),
    TaskDetailLoaded {
        task_id: TaskId,
        result: Result<TaskDetail, PullError>,
    },
    TaskSubmitted(Result<TaskId, PullError>),
    TaskRetried {
        task_id: TaskId,
        result: Result<TaskDetail, PullError>,
    },
    /// Display time for a notice ran out.
    NoticeExpired { notice: NoticeId },
}
