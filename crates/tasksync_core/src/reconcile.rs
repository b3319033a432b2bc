use std::collections::HashSet;

use crate::{TaskEvent, TaskId, TaskStore, TaskSummary, Upsert};

/// Authoritative fetch requested by the reconciler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pull {
    TaskList,
    TaskDetail {
        task_id: TaskId,
        include_content: bool,
    },
}

/// What the caller still has to do after an event was applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    pub pulls: Vec<Pull>,
    /// Backend-reported failure for the error channel: (task id, message).
    pub notice: Option<(TaskId, String)>,
}

/// Decides whether a push event is enough on its own or needs a pull.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciler {
    terminal_reconciled: HashSet<TaskId>,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forgets every terminal-transition flag; called on selection change.
    pub fn reset(&mut self) {
        self.terminal_reconciled.clear();
    }

    pub fn forget(&mut self, task_id: &str) {
        self.terminal_reconciled.remove(task_id);
    }

    pub fn is_reconciled(&self, task_id: &str) -> bool {
        self.terminal_reconciled.contains(task_id)
    }

    pub fn apply(
        &mut self,
        event: TaskEvent,
        store: &mut TaskStore,
        selected: Option<&str>,
    ) -> Reconciliation {
        let mut outcome = Reconciliation::default();
        match event {
            TaskEvent::Snapshot(detail) => {
                store.set_detail(detail);
            }
            TaskEvent::Status {
                task_id,
                status,
                timestamp,
            } => {
                let known = store.summary(&task_id).cloned();
                let was_known = known.is_some();
                let candidate = match known {
                    Some(existing) => TaskSummary {
                        status,
                        updated_at: timestamp,
                        ..existing
                    },
                    None => TaskSummary::observed(task_id.clone(), status, &timestamp),
                };
                if store.upsert_summary(candidate) == Upsert::Stale {
                    return outcome;
                }

                if !was_known {
                    outcome.pulls.push(Pull::TaskList);
                }
                if !status.is_terminal() {
                    self.terminal_reconciled.remove(&task_id);
                } else if selected == Some(task_id.as_str())
                    && self.terminal_reconciled.insert(task_id.clone())
                {
                    outcome.pulls.push(Pull::TaskDetail {
                        task_id,
                        include_content: true,
                    });
                }
            }
            TaskEvent::Log { task_id, line } => {
                store.append_log(&task_id, line);
            }
            TaskEvent::Error {
                task_id, message, ..
            } => {
                outcome.notice = Some((task_id, message));
            }
        }
        outcome
    }
}
