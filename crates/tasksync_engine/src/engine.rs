use std::collections::HashMap;
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use tasksync_core::{ConnectionId, SubmitRequest, TaskId};
use tasksync_logging::{sync_debug, sync_error};
use tokio::runtime::Runtime;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::push::run_connection;
use crate::{
    ApiError, ApiSettings, EngineEvent, PushConnector, ReqwestTaskApi, TaskApi, TimerId,
    WsConnector,
};

enum EngineCommand {
    OpenPush {
        connection: ConnectionId,
        task_id: TaskId,
    },
    ClosePush {
        connection: ConnectionId,
    },
    Schedule {
        timer: TimerId,
        delay: Duration,
    },
    CancelTimer {
        timer: TimerId,
    },
    FetchTaskList,
    FetchTaskDetail {
        task_id: TaskId,
        include_content: bool,
    },
    Submit(SubmitRequest),
    Retry {
        task_id: TaskId,
    },
}

/// Command side of the engine. Commands run in the order they are sent;
/// results come back on the receiver returned by the constructor.
#[derive(Clone)]
pub struct EngineHandle {
    cmd_tx: mpsc::Sender<EngineCommand>,
}

impl EngineHandle {
    pub fn new(settings: ApiSettings) -> Result<(Self, mpsc::Receiver<EngineEvent>), ApiError> {
        let api = Arc::new(ReqwestTaskApi::new(settings.clone())?);
        let connector = Arc::new(WsConnector::new(settings));
        Ok(Self::with_backends(api, connector))
    }

    pub fn with_backends(
        api: Arc<dyn TaskApi>,
        connector: Arc<dyn PushConnector>,
    ) -> (Self, mpsc::Receiver<EngineEvent>) {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();

        thread::spawn(move || {
            let runtime = match Runtime::new() {
                Ok(runtime) => runtime,
                Err(err) => {
                    sync_error!("Failed to start engine runtime: {}", err);
                    return;
                }
            };
            let mut worker = Worker {
                api,
                connector,
                event_tx,
                connections: HashMap::new(),
                timers: HashMap::new(),
            };
            while let Ok(command) = cmd_rx.recv() {
                worker.handle(&runtime, command);
            }
            worker.shutdown();
        });

        (Self { cmd_tx }, event_rx)
    }

    pub fn open_push(&self, connection: ConnectionId, task_id: impl Into<TaskId>) {
        self.send(EngineCommand::OpenPush {
            connection,
            task_id: task_id.into(),
        });
    }

    pub fn close_push(&self, connection: ConnectionId) {
        self.send(EngineCommand::ClosePush { connection });
    }

    pub fn schedule(&self, timer: TimerId, delay: Duration) {
        self.send(EngineCommand::Schedule { timer, delay });
    }

    pub fn cancel_timer(&self, timer: TimerId) {
        self.send(EngineCommand::CancelTimer { timer });
    }

    pub fn fetch_task_list(&self) {
        self.send(EngineCommand::FetchTaskList);
    }

    pub fn fetch_task_detail(&self, task_id: impl Into<TaskId>, include_content: bool) {
        self.send(EngineCommand::FetchTaskDetail {
            task_id: task_id.into(),
            include_content,
        });
    }

    pub fn submit(&self, request: SubmitRequest) {
        self.send(EngineCommand::Submit(request));
    }

    pub fn retry(&self, task_id: impl Into<TaskId>) {
        self.send(EngineCommand::Retry {
            task_id: task_id.into(),
        });
    }

    fn send(&self, command: EngineCommand) {
        if self.cmd_tx.send(command).is_err() {
            sync_error!("Engine worker is gone; command dropped");
        }
    }
}

struct Worker {
    api: Arc<dyn TaskApi>,
    connector: Arc<dyn PushConnector>,
    event_tx: mpsc::Sender<EngineEvent>,
    connections: HashMap<ConnectionId, (CancellationToken, JoinHandle<()>)>,
    timers: HashMap<TimerId, JoinHandle<()>>,
}

impl Worker {
    fn handle(&mut self, runtime: &Runtime, command: EngineCommand) {
        match command {
            EngineCommand::OpenPush {
                connection,
                task_id,
            } => {
                self.connections.retain(|_, (_, task)| !task.is_finished());
                let cancel = CancellationToken::new();
                let task = runtime.spawn(run_connection(
                    self.connector.clone(),
                    connection,
                    task_id,
                    cancel.clone(),
                    self.event_tx.clone(),
                ));
                self.connections.insert(connection, (cancel, task));
            }
            EngineCommand::ClosePush { connection } => {
                if let Some((cancel, _)) = self.connections.remove(&connection) {
                    sync_debug!("Closing push connection {:?}", connection);
                    cancel.cancel();
                }
            }
            EngineCommand::Schedule { timer, delay } => {
                self.timers.retain(|_, task| !task.is_finished());
                let event_tx = self.event_tx.clone();
                let task = runtime.spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = event_tx.send(EngineEvent::TimerFired { timer });
                });
                if let Some(previous) = self.timers.insert(timer, task) {
                    previous.abort();
                }
            }
            EngineCommand::CancelTimer { timer } => {
                if let Some(task) = self.timers.remove(&timer) {
                    task.abort();
                }
            }
            EngineCommand::FetchTaskList => {
                let api = self.api.clone();
                let event_tx = self.event_tx.clone();
                runtime.spawn(async move {
                    let result = api.fetch_task_list().await;
                    let _ = event_tx.send(EngineEvent::TaskListFetched(result));
                });
            }
            EngineCommand::FetchTaskDetail {
                task_id,
                include_content,
            } => {
                let api = self.api.clone();
                let event_tx = self.event_tx.clone();
                runtime.spawn(async move {
                    let result = api.fetch_task_detail(&task_id, include_content).await;
                    let _ = event_tx.send(EngineEvent::TaskDetailFetched { task_id, result });
                });
            }
            EngineCommand::Submit(request) => {
                let api = self.api.clone();
                let event_tx = self.event_tx.clone();
                runtime.spawn(async move {
                    let result = api.submit_task(&request).await;
                    let _ = event_tx.send(EngineEvent::TaskSubmitted(result));
                });
            }
            EngineCommand::Retry { task_id } => {
                let api = self.api.clone();
                let event_tx = self.event_tx.clone();
                runtime.spawn(async move {
                    let result = api.retry_task(&task_id).await;
                    let _ = event_tx.send(EngineEvent::TaskRetried { task_id, result });
                });
            }
        }
    }

    fn shutdown(&mut self) {
        for (_, (cancel, _)) in self.connections.drain() {
            cancel.cancel();
        }
        for (_, task) in self.timers.drain() {
            task.abort();
        }
    }
}
