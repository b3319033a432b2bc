use std::time::Duration;

use tasksync_logging::{sync_debug, sync_info};

use crate::TaskId;

/// Identifies one connection attempt. Ids only grow, so anything tagged
/// with an older id belongs to a superseded connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseKind {
    /// Server or client ended the stream on purpose; never retried.
    Normal,
    /// Transport failure, failed connect or unexpected close code.
    Abnormal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(10_000),
            max_attempts: 5,
        }
    }
}

impl ReconnectPolicy {
    /// `min(base * 2^attempt, max)`
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.min(20);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Work the connection state machine asks its executor to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionCommand {
    Open {
        connection: ConnectionId,
        task_id: TaskId,
    },
    Close {
        connection: ConnectionId,
    },
    /// Fire `on_retry_due(after)` once `delay` has elapsed.
    ScheduleRetry {
        after: ConnectionId,
        delay: Duration,
    },
    CancelRetry,
}

/// Owns the single live push connection and its reconnect policy.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConnectionManager {
    policy: ReconnectPolicy,
    current_task_id: Option<TaskId>,
    attempt: u32,
    status: ConnectionStatus,
    active: Option<ConnectionId>,
    retry_after: Option<ConnectionId>,
    next_id: u64,
}

impl ConnectionManager {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn current_task_id(&self) -> Option<&str> {
        self.current_task_id.as_deref()
    }

    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    /// True when messages tagged with `connection` may be applied.
    pub fn is_live(&self, connection: ConnectionId) -> bool {
        self.active == Some(connection)
    }

    /// Connects to `task_id`, closing any connection to another task first.
    /// A no-op while a connection to the same task is open or pending.
    pub fn connect(&mut self, task_id: &str) -> Vec<ConnectionCommand> {
        if self.current_task_id.as_deref() == Some(task_id)
            && self.status != ConnectionStatus::Disconnected
        {
            sync_debug!("Already connected to {}; connect is a no-op", task_id);
            return Vec::new();
        }

        let mut commands = self.close();
        self.current_task_id = Some(task_id.to_string());
        commands.push(self.open());
        commands
    }

    /// Tears down the connection and any pending retry, from any state.
    pub fn close(&mut self) -> Vec<ConnectionCommand> {
        let mut commands = Vec::new();
        if self.retry_after.take().is_some() {
            commands.push(ConnectionCommand::CancelRetry);
        }
        if let Some(connection) = self.active.take() {
            commands.push(ConnectionCommand::Close { connection });
        }
        self.current_task_id = None;
        self.attempt = 0;
        self.status = ConnectionStatus::Disconnected;
        commands
    }

    /// Returns false when the notification belongs to a superseded connection.
    pub fn on_opened(&mut self, connection: ConnectionId) -> bool {
        if !self.is_live(connection) || self.status != ConnectionStatus::Connecting {
            return false;
        }
        self.status = ConnectionStatus::Connected;
        self.attempt = 0;
        true
    }

    pub fn on_closed(&mut self, connection: ConnectionId, kind: CloseKind) -> Vec<ConnectionCommand> {
        if !self.is_live(connection) {
            return Vec::new();
        }
        self.active = None;

        if kind == CloseKind::Normal {
            self.status = ConnectionStatus::Disconnected;
            return Vec::new();
        }

        if self.attempt >= self.policy.max_attempts {
            sync_info!(
                "Giving up on push connection for {:?} after {} retries",
                self.current_task_id,
                self.attempt
            );
            self.status = ConnectionStatus::Disconnected;
            return Vec::new();
        }

        let delay = self.policy.delay(self.attempt);
        self.attempt += 1;
        self.status = ConnectionStatus::Reconnecting;
        self.retry_after = Some(connection);
        sync_info!(
            "Push connection {:?} dropped; retry {} in {:?}",
            connection,
            self.attempt,
            delay
        );
        vec![ConnectionCommand::ScheduleRetry {
            after: connection,
            delay,
        }]
    }

    pub fn on_retry_due(&mut self, after: ConnectionId) -> Vec<ConnectionCommand> {
        if self.status != ConnectionStatus::Reconnecting || self.retry_after != Some(after) {
            return Vec::new();
        }
        self.retry_after = None;
        vec![self.open()]
    }

    fn open(&mut self) -> ConnectionCommand {
        self.next_id += 1;
        let connection = ConnectionId(self.next_id);
        self.active = Some(connection);
        self.status = ConnectionStatus::Connecting;
        ConnectionCommand::Open {
            connection,
            task_id: self.current_task_id.clone().unwrap_or_default(),
        }
    }
}
