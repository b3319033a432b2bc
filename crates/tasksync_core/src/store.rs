use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use tasksync_logging::sync_debug;

use crate::{compare_timestamps, TaskDetail, TaskId, TaskSummary};

/// What a store mutation changed, for UI observers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StateChange {
    Summaries,
    Detail(TaskId),
    Log(TaskId),
    Selection,
    Connection,
    Notices,
}

/// Outcome of a summary upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Inserted,
    Updated,
    /// Same timestamp and same content; nothing to do.
    Unchanged,
    /// Older than what the store holds; rejected.
    Stale,
}

impl Upsert {
    pub fn applied(self) -> bool {
        matches!(self, Upsert::Inserted | Upsert::Updated)
    }
}

/// Single source of truth for task summaries and task details.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskStore {
    summaries: Vec<TaskSummary>,
    details: HashMap<TaskId, TaskDetail>,
    changes: Vec<StateChange>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn summaries(&self) -> &[TaskSummary] {
        &self.summaries
    }

    pub fn summary(&self, task_id: &str) -> Option<&TaskSummary> {
        self.summaries.iter().find(|s| s.task_id == task_id)
    }

    pub fn detail(&self, task_id: &str) -> Option<&TaskDetail> {
        self.details.get(task_id)
    }

    pub fn contains(&self, task_id: &str) -> bool {
        self.summary(task_id).is_some()
    }

    /// Replaces the summary with the same id, or inserts at the front.
    pub fn upsert_summary(&mut self, summary: TaskSummary) -> Upsert {
        let outcome = self.upsert_quiet(summary);
        if outcome.applied() {
            self.record(StateChange::Summaries);
        }
        outcome
    }

    fn upsert_quiet(&mut self, summary: TaskSummary) -> Upsert {
        let Some(existing) = self
            .summaries
            .iter_mut()
            .find(|s| s.task_id == summary.task_id)
        else {
            self.summaries.insert(0, summary);
            return Upsert::Inserted;
        };

        match compare_timestamps(&summary.updated_at, &existing.updated_at) {
            Ordering::Less => {
                sync_debug!(
                    "Rejecting stale summary for {} ({} < {})",
                    summary.task_id,
                    summary.updated_at,
                    existing.updated_at
                );
                Upsert::Stale
            }
            _ if *existing == summary => Upsert::Unchanged,
            _ => {
                *existing = summary;
                Upsert::Updated
            }
        }
    }

    /// Fully replaces the detail for its task id and syncs the summary.
    ///
    /// A detail older than the stored one is rejected and returns `Stale`.
    pub fn set_detail(&mut self, detail: TaskDetail) -> Upsert {
        let task_id = detail.task_id().to_string();
        if let Some(current) = self.details.get(&task_id) {
            if compare_timestamps(&detail.summary.updated_at, &current.summary.updated_at)
                == Ordering::Less
            {
                sync_debug!("Rejecting stale detail for {}", task_id);
                return Upsert::Stale;
            }
        }

        self.upsert_summary(detail.summary.clone());
        let previous = self.details.insert(task_id.clone(), detail);
        self.record(StateChange::Detail(task_id));
        if previous.is_some() {
            Upsert::Updated
        } else {
            Upsert::Inserted
        }
    }

    /// Appends a log line. Returns false when no detail is loaded yet.
    pub fn append_log(&mut self, task_id: &str, line: impl Into<String>) -> bool {
        let Some(detail) = self.details.get_mut(task_id) else {
            sync_debug!("Dropping log line for {} (no detail loaded)", task_id);
            return false;
        };
        detail.logs.push(line.into());
        self.record(StateChange::Log(task_id.to_string()));
        true
    }

    /// Applies a full list fetch: upserts every listed summary and removes
    /// the ones the backend no longer reports.
    pub fn replace_summaries(&mut self, fetched: Vec<TaskSummary>) {
        let listed: HashSet<TaskId> = fetched.iter().map(|s| s.task_id.clone()).collect();
        let before = self.summaries.len();
        self.summaries.retain(|s| listed.contains(&s.task_id));
        let mut changed = self.summaries.len() != before;

        // Reverse so the backend's first entry ends up at the front.
        for summary in fetched.into_iter().rev() {
            let outcome = self.upsert_quiet(summary);
            changed |= outcome.applied();
        }
        if changed {
            self.record(StateChange::Summaries);
        }
    }

    fn record(&mut self, change: StateChange) {
        if !self.changes.contains(&change) {
            self.changes.push(change);
        }
    }

    /// Drains the changes recorded since the last call.
    pub fn take_changes(&mut self) -> Vec<StateChange> {
        std::mem::take(&mut self.changes)
    }
}
