use std::time::Duration;

use crate::{ConnectionCommand, ConnectionId, NoticeId, Pull, SubmitRequest, TaskId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    OpenConnection {
        connection: ConnectionId,
        task_id: TaskId,
    },
    CloseConnection {
        connection: ConnectionId,
    },
    ScheduleReconnect {
        after: ConnectionId,
        delay: Duration,
    },
    CancelReconnect,
    FetchTaskList,
    FetchTaskDetail {
        task_id: TaskId,
        include_content: bool,
    },
    SubmitTask(SubmitRequest),
    RetryTask {
        task_id: TaskId,
    },
    ScheduleNoticeExpiry {
        notice: NoticeId,
        after: Duration,
    },
}

impl From<ConnectionCommand> for Effect {
    fn from(command: ConnectionCommand) -> Self {
        match command {
            ConnectionCommand::Open {
                connection,
                task_id,
            } => Effect::OpenConnection {
                connection,
                task_id,
            },
            ConnectionCommand::Close { connection } => Effect::CloseConnection { connection },
            ConnectionCommand::ScheduleRetry { after, delay } => {
                Effect::ScheduleReconnect { after, delay }
            }
            ConnectionCommand::CancelRetry => Effect::CancelReconnect,
        }
    }
}

impl From<Pull> for Effect {
    fn from(pull: Pull) -> Self {
        match pull {
            Pull::TaskList => Effect::FetchTaskList,
            Pull::TaskDetail {
                task_id,
                include_content,
            } => Effect::FetchTaskDetail {
                task_id,
                include_content,
            },
        }
    }
}
