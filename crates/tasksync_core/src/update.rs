use tasksync_logging::{sync_debug, sync_warn};

use crate::{Effect, Msg, StateChange, SyncState, TaskId};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: SyncState, msg: Msg) -> (SyncState, Vec<Effect>) {
    let status_before = (state.connection().status(), state.connection().attempt());

    let effects = match msg {
        Msg::TaskSelected { task_id } => select(&mut state, task_id),
        Msg::SelectionCleared => {
            state.set_selected(None);
            state
                .connection_mut()
                .close()
                .into_iter()
                .map(Effect::from)
                .collect()
        }
        Msg::RefreshRequested => vec![Effect::FetchTaskList],
        Msg::SubmitRequested(request) => {
            if request.files.is_empty() {
                vec![state.push_notice(None, "no files provided".to_string())]
            } else {
                vec![Effect::SubmitTask(request)]
            }
        }
        Msg::RetryRequested { task_id } => vec![Effect::RetryTask { task_id }],
        Msg::NoticeDismissed { notice } | Msg::NoticeExpired { notice } => {
            state.remove_notice(notice);
            Vec::new()
        }
        Msg::ConnectionOpened { connection } => {
            if !state.connection_mut().on_opened(connection) {
                sync_debug!("Ignoring open of superseded connection {:?}", connection);
            }
            Vec::new()
        }
        Msg::ConnectionClosed { connection, kind } => state
            .connection_mut()
            .on_closed(connection, kind)
            .into_iter()
            .map(Effect::from)
            .collect(),
        Msg::ReconnectDue { after } => state
            .connection_mut()
            .on_retry_due(after)
            .into_iter()
            .map(Effect::from)
            .collect(),
        Msg::PushEvent { connection, event } => {
            if !state.connection().is_live(connection) {
                sync_debug!(
                    "Dropping {} event from superseded connection {:?}",
                    event.task_id(),
                    connection
                );
                return (state, Vec::new());
            }
            let outcome = {
                let (reconciler, store, selected) = state.reconcile_parts();
                reconciler.apply(event, store, selected)
            };
            let mut effects: Vec<Effect> = outcome.pulls.into_iter().map(Effect::from).collect();
            if let Some((task_id, message)) = outcome.notice {
                effects.push(state.push_notice(Some(task_id), message));
            }
            effects
        }
        Msg::TaskListLoaded(result) => match result {
            Ok(summaries) => {
                state.store_mut().replace_summaries(summaries);
                Vec::new()
            }
            Err(err) => {
                sync_warn!("Task list refresh failed: {}", err.message);
                vec![state.push_notice(None, err.message)]
            }
        },
        Msg::TaskDetailLoaded { task_id, result } => match result {
            Ok(detail) => {
                state.store_mut().set_detail(detail);
                Vec::new()
            }
            Err(err) => {
                sync_warn!("Detail pull for {} failed: {}", task_id, err.message);
                vec![state.push_notice(Some(task_id), err.message)]
            }
        },
        Msg::TaskSubmitted(result) => match result {
            Ok(task_id) => {
                let mut effects = vec![Effect::FetchTaskList];
                effects.extend(select(&mut state, task_id));
                effects
            }
            Err(err) => vec![state.push_notice(None, err.message)],
        },
        Msg::TaskRetried { task_id, result } => match result {
            Ok(detail) => {
                state.reconciler_mut().forget(&task_id);
                state.store_mut().set_detail(detail);
                let mut effects = vec![Effect::FetchTaskList];
                // The live connection may have given up while the task sat finished.
                if state.selected() == Some(task_id.as_str()) {
                    let reconnect = state.connection_mut().connect(&task_id);
                    effects.extend(reconnect.into_iter().map(Effect::from));
                }
                effects
            }
            Err(err) => vec![state.push_notice(Some(task_id), err.message)],
        },
    };

    if status_before != (state.connection().status(), state.connection().attempt()) {
        state.mark(StateChange::Connection);
    }

    (state, effects)
}

/// Selecting closes the previous connection before opening the new one and
/// pulls the full detail. Re-selecting a task whose connection is alive is
/// a no-op.
fn select(state: &mut SyncState, task_id: TaskId) -> Vec<Effect> {
    let changed = state.set_selected(Some(task_id.clone()));
    let mut effects: Vec<Effect> = state
        .connection_mut()
        .connect(&task_id)
        .into_iter()
        .map(Effect::from)
        .collect();
    if changed || !effects.is_empty() {
        effects.push(Effect::FetchTaskDetail {
            task_id,
            include_content: true,
        });
    }
    effects
}
