use std::sync::{Arc, Weak};

use crate::manager::model::Shared;

pub(crate) type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// A small registry of callbacks keyed by manager-wide ids. Ids are handed
/// out by the caller so that a stale [`Subscription`] can never remove a
/// listener it does not own.
pub(crate) struct ListenerSet<T> {
    entries: Vec<(u64, Listener<T>)>,
}

impl<T> ListenerSet<T> {
    pub(crate) fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub(crate) fn add(&mut self, id: u64, listener: Listener<T>) {
        self.entries.push((id, listener));
    }

    pub(crate) fn remove(&mut self, id: u64) {
        self.entries.retain(|(entry_id, _)| *entry_id != id);
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Clones the listener handles so they can be invoked outside the lock.
    pub(crate) fn snapshot(&self) -> Vec<Listener<T>> {
        self.entries
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ListenerKind {
    ManagerState,
    TrackState(usize),
    TrackStream(usize),
}

/// Keeps a listener registered for as long as it is held. Dropping it
/// unsubscribes; an explicit [`Subscription::unsubscribe`] reads better at
/// call sites that want to be deliberate about it.
#[must_use = "dropping a Subscription immediately unsubscribes the listener"]
pub struct Subscription {
    shared: Weak<Shared>,
    kind: ListenerKind,
    id: u64,
}

impl Subscription {
    pub(crate) fn new(shared: Weak<Shared>, kind: ListenerKind, id: u64) -> Self {
        Self { shared, kind, id }
    }

    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };
        let mut inner = shared.inner.lock().unwrap();
        match self.kind {
            ListenerKind::ManagerState => inner.state_listeners.remove(self.id),
            ListenerKind::TrackState(index) => {
                if let Some(track) = inner.tracks.get_mut(index) {
                    track.state_listeners.remove(self.id);
                }
            }
            ListenerKind::TrackStream(index) => {
                if let Some(track) = inner.tracks.get_mut(index) {
                    track.stream_listeners.remove(self.id);
                }
            }
        }
    }
}
