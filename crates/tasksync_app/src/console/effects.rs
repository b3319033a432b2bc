use std::collections::HashMap;
use std::time::Duration;

use tasksync_core::{Effect, Msg, PullError};
use tasksync_engine::{ApiError, EngineEvent, EngineHandle, TimerId};
use tasksync_logging::{sync_debug, sync_info, sync_warn};

/// Executes core effects on the engine and turns engine events back into
/// core messages. Owned by the message loop, so timer bookkeeping needs no
/// locking.
pub struct EffectRunner {
    engine: EngineHandle,
    next_timer: u64,
    timers: HashMap<TimerId, Msg>,
    reconnect_timer: Option<TimerId>,
}

impl EffectRunner {
    pub fn new(engine: EngineHandle) -> Self {
        Self {
            engine,
            next_timer: 0,
            timers: HashMap::new(),
            reconnect_timer: None,
        }
    }

    pub fn enqueue(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::OpenConnection {
                    connection,
                    task_id,
                } => {
                    sync_info!("OpenConnection connection={} task_id={}", connection.0, task_id);
                    self.engine.open_push(connection, task_id);
                }
                Effect::CloseConnection { connection } => {
                    sync_debug!("CloseConnection connection={}", connection.0);
                    self.engine.close_push(connection);
                }
                Effect::ScheduleReconnect { after, delay } => {
                    sync_info!(
                        "ScheduleReconnect after={} delay_ms={}",
                        after.0,
                        delay.as_millis()
                    );
                    self.cancel_reconnect();
                    let timer = self.schedule(delay, Msg::ReconnectDue { after });
                    self.reconnect_timer = Some(timer);
                }
                Effect::CancelReconnect => self.cancel_reconnect(),
                Effect::FetchTaskList => self.engine.fetch_task_list(),
                Effect::FetchTaskDetail {
                    task_id,
                    include_content,
                } => self.engine.fetch_task_detail(task_id, include_content),
                Effect::SubmitTask(request) => {
                    sync_info!("SubmitTask files={}", request.files.len());
                    self.engine.submit(request);
                }
                Effect::RetryTask { task_id } => self.engine.retry(task_id),
                Effect::ScheduleNoticeExpiry { notice, after } => {
                    self.schedule(after, Msg::NoticeExpired { notice });
                }
            }
        }
    }

    /// Maps an engine event to the message the core expects. Timers that
    /// were cancelled or never issued by this runner map to `None`.
    pub fn translate(&mut self, event: EngineEvent) -> Option<Msg> {
        let msg = match event {
            EngineEvent::PushOpened { connection } => Msg::ConnectionOpened { connection },
            EngineEvent::PushEvent { connection, event } => Msg::PushEvent { connection, event },
            EngineEvent::PushClosed { connection, kind } => {
                Msg::ConnectionClosed { connection, kind }
            }
            EngineEvent::TimerFired { timer } => {
                if self.reconnect_timer == Some(timer) {
                    self.reconnect_timer = None;
                }
                return self.timers.remove(&timer);
            }
            EngineEvent::TaskListFetched(result) => {
                Msg::TaskListLoaded(result.map_err(|err| pull_error("task list", err)))
            }
            EngineEvent::TaskDetailFetched { task_id, result } => {
                let result = result.map_err(|err| pull_error(&task_id, err));
                Msg::TaskDetailLoaded { task_id, result }
            }
            EngineEvent::TaskSubmitted(result) => Msg::TaskSubmitted(
                result
                    .map(|submitted| submitted.task_id)
                    .map_err(|err| pull_error("submit", err)),
            ),
            EngineEvent::TaskRetried { task_id, result } => {
                let result = result.map_err(|err| pull_error(&task_id, err));
                Msg::TaskRetried { task_id, result }
            }
        };
        Some(msg)
    }

    fn schedule(&mut self, delay: Duration, msg: Msg) -> TimerId {
        self.next_timer += 1;
        let timer = TimerId(self.next_timer);
        self.timers.insert(timer, msg);
        self.engine.schedule(timer, delay);
        timer
    }

    fn cancel_reconnect(&mut self) {
        if let Some(timer) = self.reconnect_timer.take() {
            self.timers.remove(&timer);
            self.engine.cancel_timer(timer);
        }
    }
}

fn pull_error(context: &str, err: ApiError) -> PullError {
    sync_warn!("Pull failed ({}): {}", context, err);
    PullError::new(err.message)
}
