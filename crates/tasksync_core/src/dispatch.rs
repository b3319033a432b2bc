use std::panic::{self, AssertUnwindSafe};

use tasksync_logging::{sync_error, sync_warn};

use crate::event::decode_event;
use crate::TaskEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Observer<T> = Box<dyn FnMut(&T) + Send>;

/// Ordered observer registry.
///
/// Observers run in subscription order. A panicking observer is logged and
/// skipped; the rest still see the value.
pub struct Observers<T> {
    next_id: u64,
    entries: Vec<(SubscriptionId, Observer<T>)>,
}

impl<T> Default for Observers<T> {
    fn default() -> Self {
        Self {
            next_id: 1,
            entries: Vec::new(),
        }
    }
}

impl<T> Observers<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, observer: impl FnMut(&T) + Send + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, Box::new(observer)));
        id
    }

    /// Returns false when the id was not registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry_id, _)| *entry_id != id);
        self.entries.len() != before
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn notify(&mut self, value: &T) {
        for (id, observer) in self.entries.iter_mut() {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| observer(value)));
            if outcome.is_err() {
                sync_error!("observer {:?} panicked; continuing delivery", id);
            }
        }
    }
}

/// Decodes push frames from one live connection and fans them out.
#[derive(Default)]
pub struct EventDispatcher {
    observers: Observers<TaskEvent>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(
        &mut self,
        observer: impl FnMut(&TaskEvent) + Send + 'static,
    ) -> SubscriptionId {
        self.observers.subscribe(observer)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.observers.unsubscribe(id)
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Decodes and delivers one raw frame. Malformed frames are logged and
    /// dropped; returns whether an event reached the observers.
    pub fn deliver_raw(&mut self, raw: &str) -> bool {
        match decode_event(raw) {
            Ok(Some(event)) => {
                self.deliver(&event);
                true
            }
            Ok(None) => false,
            Err(err) => {
                sync_warn!("Dropping push frame ({} bytes): {}", raw.len(), err);
                false
            }
        }
    }

    pub fn deliver(&mut self, event: &TaskEvent) {
        self.observers.notify(event);
    }

    /// Drops every observer so a superseded connection cannot reach them.
    pub fn close(&mut self) {
        self.observers.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl FnMut(&TaskEvent) + Send + 'static) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        (seen, move |event: &TaskEvent| {
            if let TaskEvent::Log { line, .. } = event {
                sink.lock().unwrap().push(line.clone());
            }
        })
    }

    fn log_frame(line: &str) -> String {
        format!(r#"{{"event":"log","task_id":"t1","line":"{line}"}}"#)
    }

    #[test]
    fn burst_is_delivered_in_arrival_order() {
        let mut dispatcher = EventDispatcher::new();
        let (seen, observer) = recorder();
        dispatcher.subscribe(observer);

        for line in ["a", "b", "c"] {
            assert!(dispatcher.deliver_raw(&log_frame(line)));
        }
        assert_eq!(*seen.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn panicking_observer_does_not_block_others() {
        let mut dispatcher = EventDispatcher::new();
        dispatcher.subscribe(|_| panic!("observer failure"));
        let (seen, observer) = recorder();
        dispatcher.subscribe(observer);

        dispatcher.deliver_raw(&log_frame("still delivered"));
        assert_eq!(*seen.lock().unwrap(), vec!["still delivered"]);
    }

    #[test]
    fn malformed_frames_are_dropped() {
        let mut dispatcher = EventDispatcher::new();
        let (seen, observer) = recorder();
        dispatcher.subscribe(observer);

        assert!(!dispatcher.deliver_raw("{oops"));
        assert!(!dispatcher.deliver_raw(r#"{"event":"progress"}"#));
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn unsubscribe_and_close_stop_delivery() {
        let mut dispatcher = EventDispatcher::new();
        let (first_seen, first) = recorder();
        let (second_seen, second) = recorder();
        let first_id = dispatcher.subscribe(first);
        dispatcher.subscribe(second);

        assert!(dispatcher.unsubscribe(first_id));
        assert!(!dispatcher.unsubscribe(first_id));
        dispatcher.deliver_raw(&log_frame("one"));

        dispatcher.close();
        assert_eq!(dispatcher.observer_count(), 0);
        dispatcher.deliver_raw(&log_frame("two"));

        assert!(first_seen.lock().unwrap().is_empty());
        assert_eq!(*second_seen.lock().unwrap(), vec!["one"]);
    }
}
