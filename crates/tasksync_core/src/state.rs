use std::time::Duration;

use crate::view_model::{SyncView, TaskRowView};
use crate::{
    ConnectionManager, Effect, ReconnectPolicy, Reconciler, StateChange, TaskId, TaskStore,
};

pub const DEFAULT_NOTICE_TTL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NoticeId(pub u64);

/// Entry in the user-facing error channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub id: NoticeId,
    pub task_id: Option<TaskId>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyncState {
    store: TaskStore,
    connection: ConnectionManager,
    reconciler: Reconciler,
    selected: Option<TaskId>,
    notices: Vec<Notice>,
    next_notice: u64,
    notice_ttl: Duration,
    changes: Vec<StateChange>,
}

impl Default for SyncState {
    fn default() -> Self {
        Self::with_settings(ReconnectPolicy::default(), DEFAULT_NOTICE_TTL)
    }
}

impl SyncState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(policy: ReconnectPolicy, notice_ttl: Duration) -> Self {
        Self {
            store: TaskStore::new(),
            connection: ConnectionManager::new(policy),
            reconciler: Reconciler::new(),
            selected: None,
            notices: Vec::new(),
            next_notice: 0,
            notice_ttl,
            changes: Vec::new(),
        }
    }

    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn view(&self) -> SyncView {
        let selected = self.selected.clone();
        SyncView {
            tasks: self
                .store
                .summaries()
                .iter()
                .map(|summary| TaskRowView {
                    task_id: summary.task_id.clone(),
                    status: summary.status,
                    backend: summary.backend.clone(),
                    parse_method: summary.parse_method.clone(),
                    updated_at: summary.updated_at.clone(),
                    error: summary.error.clone(),
                    selected: selected.as_deref() == Some(summary.task_id.as_str()),
                })
                .collect(),
            detail: selected
                .as_deref()
                .and_then(|task_id| self.store.detail(task_id))
                .cloned(),
            selected,
            connection: self.connection.status(),
            reconnect_attempt: self.connection.attempt(),
            notices: self.notices.clone(),
        }
    }

    /// Drains everything that changed since the last call, store included.
    pub fn take_changes(&mut self) -> Vec<StateChange> {
        let mut changes = std::mem::take(&mut self.changes);
        for change in self.store.take_changes() {
            if !changes.contains(&change) {
                changes.push(change);
            }
        }
        changes
    }

    pub(crate) fn store_mut(&mut self) -> &mut TaskStore {
        &mut self.store
    }

    pub(crate) fn connection_mut(&mut self) -> &mut ConnectionManager {
        &mut self.connection
    }

    pub(crate) fn reconcile_parts(
        &mut self,
    ) -> (&mut Reconciler, &mut TaskStore, Option<&str>) {
        (
            &mut self.reconciler,
            &mut self.store,
            self.selected.as_deref(),
        )
    }

    pub(crate) fn reconciler_mut(&mut self) -> &mut Reconciler {
        &mut self.reconciler
    }

    pub(crate) fn set_selected(&mut self, task_id: Option<TaskId>) -> bool {
        if self.selected == task_id {
            return false;
        }
        self.selected = task_id;
        self.reconciler.reset();
        self.mark(StateChange::Selection);
        true
    }

    pub(crate) fn push_notice(&mut self, task_id: Option<TaskId>, message: String) -> Effect {
        self.next_notice += 1;
        let id = NoticeId(self.next_notice);
        self.notices.push(Notice {
            id,
            task_id,
            message,
        });
        self.mark(StateChange::Notices);
        Effect::ScheduleNoticeExpiry {
            notice: id,
            after: self.notice_ttl,
        }
    }

    pub(crate) fn remove_notice(&mut self, id: NoticeId) {
        let before = self.notices.len();
        self.notices.retain(|notice| notice.id != id);
        if self.notices.len() != before {
            self.mark(StateChange::Notices);
        }
    }

    pub(crate) fn mark(&mut self, change: StateChange) {
        if !self.changes.contains(&change) {
            self.changes.push(change);
        }
    }
}
