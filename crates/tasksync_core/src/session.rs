use crate::dispatch::{Observers, SubscriptionId};
use crate::{update, Effect, Msg, StateChange, SyncState, SyncView, TaskId};

/// State container owned by the application root.
///
/// Every mutation goes through [`update`]; observers hear about what
/// changed once the message has been fully applied.
#[derive(Default)]
pub struct SyncSession {
    state: SyncState,
    observers: Observers<StateChange>,
}

impl SyncSession {
    pub fn new(state: SyncState) -> Self {
        Self {
            state,
            observers: Observers::new(),
        }
    }

    pub fn state(&self) -> &SyncState {
        &self.state
    }

    pub fn view(&self) -> SyncView {
        self.state.view()
    }

    pub fn subscribe(
        &mut self,
        observer: impl FnMut(&StateChange) + Send + 'static,
    ) -> SubscriptionId {
        self.observers.subscribe(observer)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.observers.unsubscribe(id)
    }

    pub fn select_task(&mut self, task_id: impl Into<TaskId>) -> Vec<Effect> {
        self.handle(Msg::TaskSelected {
            task_id: task_id.into(),
        })
    }

    pub fn clear_selection(&mut self) -> Vec<Effect> {
        self.handle(Msg::SelectionCleared)
    }

    pub fn handle(&mut self, msg: Msg) -> Vec<Effect> {
        let state = std::mem::take(&mut self.state);
        let (state, effects) = update(state, msg);
        self.state = state;
        for change in self.state.take_changes() {
            self.observers.notify(&change);
        }
        effects
    }
}
