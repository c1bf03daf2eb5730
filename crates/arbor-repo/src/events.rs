//! Change notification: events, listeners, and the background dispatcher.
//!
//! Every backend publishes batches of [`ChangeEvent`]s after a mutation. The
//! [`Dispatcher`] hands them to subscribed listeners on its own thread, so a
//! listener must never assume it runs on the thread that caused the change.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

use crate::path::parent_path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    NodeAdded,
    NodeRemoved,
    PropertyAdded,
    PropertyChanged,
    PropertyRemoved,
}

/// One observed change. Node events carry the node path; property events
/// carry the property path (`<owner>/<property name>`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChangeEvent {
    pub kind: EventKind,
    pub path: String,
}

impl ChangeEvent {
    pub fn new(kind: EventKind, path: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }

    pub fn is_node_event(&self) -> bool {
        matches!(self.kind, EventKind::NodeAdded | EventKind::NodeRemoved)
    }

    /// Path of the node that owns the changed item: the parent for property
    /// events, the parent as well for node events.
    pub fn owner_path(&self) -> String {
        parent_path(&self.path).unwrap_or_else(|| "/".to_string())
    }
}

pub trait ChangeListener: Send + Sync {
    fn on_changes(&self, events: &[ChangeEvent]);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

enum Dispatch {
    Batch(Vec<ChangeEvent>),
    Barrier(mpsc::Sender<()>),
}

type Listeners = Arc<Mutex<Vec<(SubscriptionId, Arc<dyn ChangeListener>)>>>;

/// Fans published batches out to listeners on a dedicated thread.
///
/// The thread is started lazily on first publish and exits when the
/// dispatcher is dropped.
pub struct Dispatcher {
    listeners: Listeners,
    sender: Mutex<Option<mpsc::Sender<Dispatch>>>,
    next_id: AtomicU64,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            listeners: Arc::new(Mutex::new(Vec::new())),
            sender: Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn subscribe(&self, listener: Arc<dyn ChangeListener>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.lock().push((id, listener));
        id
    }

    /// Returns false when the id was not (or no longer) subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(sid, _)| *sid != id);
        listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    pub fn publish(&self, events: Vec<ChangeEvent>) {
        if events.is_empty() {
            return;
        }
        self.send(Dispatch::Batch(events));
    }

    /// Block until every batch published before this call has been delivered.
    pub fn flush(&self) {
        let (tx, rx) = mpsc::channel();
        if self.send(Dispatch::Barrier(tx)) {
            let _ = rx.recv();
        }
    }

    fn send(&self, msg: Dispatch) -> bool {
        let mut sender = self.sender.lock();
        if sender.is_none() {
            *sender = Some(self.spawn_worker());
        }
        match sender.as_ref() {
            Some(tx) => match tx.send(msg) {
                Ok(()) => true,
                Err(_) => {
                    tracing::warn!("change dispatcher thread is gone; dropping batch");
                    *sender = None;
                    false
                }
            },
            None => false,
        }
    }

    fn spawn_worker(&self) -> mpsc::Sender<Dispatch> {
        let (tx, rx) = mpsc::channel::<Dispatch>();
        let listeners = Arc::clone(&self.listeners);
        thread::Builder::new()
            .name("arbor-notify".to_string())
            .spawn(move || {
                for msg in rx {
                    match msg {
                        Dispatch::Batch(events) => {
                            // Snapshot so a listener may (un)subscribe from its callback.
                            let targets: Vec<Arc<dyn ChangeListener>> = listeners
                                .lock()
                                .iter()
                                .map(|(_, l)| Arc::clone(l))
                                .collect();
                            tracing::debug!(
                                events = events.len(),
                                listeners = targets.len(),
                                "delivering change batch"
                            );
                            for listener in targets {
                                listener.on_changes(&events);
                            }
                        }
                        Dispatch::Barrier(ack) => {
                            let _ = ack.send(());
                        }
                    }
                }
            })
            .map(|_| tx)
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "failed to spawn change dispatcher thread");
                mpsc::channel().0
            })
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Recorder {
        seen: Mutex<Vec<(ChangeEvent, thread::ThreadId)>>,
    }

    impl ChangeListener for Recorder {
        fn on_changes(&self, events: &[ChangeEvent]) {
            let mut seen = self.seen.lock();
            for e in events {
                seen.push((e.clone(), thread::current().id()));
            }
        }
    }

    #[test]
    fn batches_are_delivered_off_the_publishing_thread() {
        let dispatcher = Dispatcher::new();
        let recorder = Arc::new(Recorder {
            seen: Mutex::new(Vec::new()),
        });
        dispatcher.subscribe(recorder.clone());

        dispatcher.publish(vec![ChangeEvent::new(EventKind::NodeAdded, "/a")]);
        dispatcher.flush();

        let seen = recorder.seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0.path, "/a");
        assert_ne!(seen[0].1, thread::current().id());
    }

    #[test]
    fn unsubscribed_listeners_stop_receiving() {
        let dispatcher = Dispatcher::new();
        let recorder = Arc::new(Recorder {
            seen: Mutex::new(Vec::new()),
        });
        let id = dispatcher.subscribe(recorder.clone());
        assert!(dispatcher.unsubscribe(id));
        assert!(!dispatcher.unsubscribe(id));

        dispatcher.publish(vec![ChangeEvent::new(EventKind::NodeRemoved, "/a")]);
        dispatcher.flush();
        assert!(recorder.seen.lock().is_empty());
    }

    #[test]
    fn owner_path_of_property_event_is_the_node() {
        let e = ChangeEvent::new(EventKind::PropertyChanged, "/a/b/title");
        assert_eq!(e.owner_path(), "/a/b");
        let e = ChangeEvent::new(EventKind::NodeAdded, "/a");
        assert_eq!(e.owner_path(), "/");
    }
}
