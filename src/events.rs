//! Observer lists keyed by event kind.
//!
//! Used by views, the history log and viewports. Listeners run synchronously in subscription
//! order; subscribing returns a [`Subscription`] that removes the listener again.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::rc::{Rc, Weak};

type Listener<P> = Rc<dyn Fn(&P)>;

struct Listeners<K, P> {
    next_id: u64,
    by_kind: HashMap<K, Vec<(u64, Listener<P>)>>,
}

impl<K: Eq + Hash, P> Listeners<K, P> {
    fn contains(&self, kind: &K, id: u64) -> bool {
        self.by_kind
            .get(kind)
            .is_some_and(|list| list.iter().any(|(listener_id, _)| *listener_id == id))
    }

    fn remove(&mut self, kind: &K, id: u64) {
        if let Some(list) = self.by_kind.get_mut(kind) {
            list.retain(|(listener_id, _)| *listener_id != id);
        }
    }
}

/// A mapping from event kind to an ordered list of listeners.
pub struct Emitter<K, P> {
    listeners: Rc<RefCell<Listeners<K, P>>>,
}

impl<K, P> fmt::Debug for Emitter<K, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Emitter").finish_non_exhaustive()
    }
}

impl<K: Eq + Hash + Clone + 'static, P: 'static> Default for Emitter<K, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash + Clone + 'static, P: 'static> Emitter<K, P> {
    pub fn new() -> Self {
        Self {
            listeners: Rc::new(RefCell::new(Listeners {
                next_id: 0,
                by_kind: HashMap::new(),
            })),
        }
    }

    /// Register `listener` for `kind`.
    pub fn on(&self, kind: K, listener: impl Fn(&P) + 'static) -> Subscription {
        let id = {
            let mut listeners = self.listeners.borrow_mut();
            let id = listeners.next_id;
            listeners.next_id += 1;
            listeners
                .by_kind
                .entry(kind.clone())
                .or_default()
                .push((id, Rc::new(listener)));
            id
        };

        let weak: Weak<RefCell<Listeners<K, P>>> = Rc::downgrade(&self.listeners);
        Subscription {
            cancel: Some(Box::new(move || {
                if let Some(listeners) = weak.upgrade() {
                    listeners.borrow_mut().remove(&kind, id);
                }
            })),
        }
    }

    /// Invoke every listener registered for `kind`.
    ///
    /// Listeners may subscribe or unsubscribe while the emit is running; a listener removed
    /// before its turn is skipped.
    pub fn emit(&self, kind: &K, payload: &P) {
        let snapshot: Vec<(u64, Listener<P>)> = self
            .listeners
            .borrow()
            .by_kind
            .get(kind)
            .cloned()
            .unwrap_or_default();

        for (id, listener) in snapshot {
            if self.listeners.borrow().contains(kind, id) {
                listener(payload);
            }
        }
    }

    pub fn listener_count(&self, kind: &K) -> usize {
        self.listeners
            .borrow()
            .by_kind
            .get(kind)
            .map_or(0, Vec::len)
    }

    /// Drop every listener.
    pub fn clear(&self) {
        self.listeners.borrow_mut().by_kind.clear();
    }
}

/// Capability to remove a listener. Dropping it keeps the listener registered.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

impl Subscription {
    /// Remove the listener. Removing twice, or after the emitter is gone, is a no-op.
    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}
