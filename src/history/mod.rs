//! Navigation history.
//!
//! [`HistoryLog`] wraps a [`NativeHistory`] and tags every entry it creates with a sequential
//! `order`, which is what lets it tell backward pops from forward ones.

pub mod location;
pub mod native;

pub use location::Location;
pub use native::{MemoryHistory, NativeHistory, PopHandler};

use crate::events::{Emitter, Subscription};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cell::Cell;
use std::rc::{Rc, Weak};
use tracing::debug;

// ===== HistoryState =====

/// State payload stored in every entry created through [`HistoryLog`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryState {
    /// Caller data; `null` when none was given.
    #[serde(default)]
    pub data: Value,
    /// 0-based creation index.
    pub order: usize,
}

impl HistoryState {
    /// Parse a raw native state. Entries created elsewhere yield `None`.
    pub fn from_value(raw: &Value) -> Option<Self> {
        serde_json::from_value(raw.clone()).ok()
    }

    fn to_value(&self) -> Value {
        serde_json::json!({ "data": self.data, "order": self.order })
    }
}

// ===== Events =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HistoryEventKind {
    /// A native back/forward move happened.
    Popped,
    /// Any change: push, replace or pop.
    Changed,
}

/// Payload delivered to history listeners.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEvent {
    /// True when the pop moved to an older entry. Always false for push/replace.
    pub back: bool,
    /// Raw native state of the now-current entry.
    pub state: Option<Value>,
    pub location: Location,
}

// ===== HistoryLog =====

/// Tracks entry order on top of the native history stack.
pub struct HistoryLog {
    native: Rc<dyn NativeHistory>,
    length: Cell<usize>,
    events: Emitter<HistoryEventKind, HistoryEvent>,
}

impl std::fmt::Debug for HistoryLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryLog")
            .field("length", &self.length.get())
            .field("location", &self.native.location())
            .finish()
    }
}

impl HistoryLog {
    /// Wrap `native` and install its pop handler.
    ///
    /// If the current entry was tagged by an earlier log (e.g. after a reload), the tracked
    /// length resumes from its order.
    pub fn new(native: Rc<dyn NativeHistory>) -> Rc<Self> {
        let length = native
            .state()
            .as_ref()
            .and_then(HistoryState::from_value)
            .map_or(0, |state| state.order + 1);

        let log = Rc::new(Self {
            native: native.clone(),
            length: Cell::new(length),
            events: Emitter::new(),
        });

        let weak: Weak<HistoryLog> = Rc::downgrade(&log);
        native.set_pop_handler(Rc::new(move |state| {
            if let Some(log) = weak.upgrade() {
                log.handle_pop(state);
            }
        }));
        log
    }

    /// Number of entries this log knows about up to and including the current one.
    pub fn length(&self) -> usize {
        self.length.get()
    }

    pub fn can_go_back(&self) -> bool {
        self.length.get() > 1
    }

    pub fn location(&self) -> Location {
        self.native.location()
    }

    /// Parsed state of the current entry, if this log created it.
    pub fn state(&self) -> Option<HistoryState> {
        self.native.state().as_ref().and_then(HistoryState::from_value)
    }

    /// Create a new entry tagged with the current length.
    pub fn push(&self, url: &str, data: Option<Value>, title: Option<&str>) {
        let state = HistoryState {
            data: data.unwrap_or(Value::Null),
            order: self.length.get(),
        };
        self.native
            .push_state(state.to_value(), title.unwrap_or_default(), url);
        self.length.set(state.order + 1);
        debug!(url, order = state.order, "history push");
        self.emit_changed(false, Some(state.to_value()));
    }

    /// Overwrite the current entry. An empty log becomes one entry long.
    pub fn replace(&self, url: &str, data: Option<Value>, title: Option<&str>) {
        if self.length.get() == 0 {
            self.length.set(1);
        }
        let state = HistoryState {
            data: data.unwrap_or(Value::Null),
            order: self.length.get() - 1,
        };
        self.native
            .replace_state(state.to_value(), title.unwrap_or_default(), url);
        debug!(url, order = state.order, "history replace");
        self.emit_changed(false, Some(state.to_value()));
    }

    pub fn back(&self) {
        self.native.back();
    }

    pub fn on(&self, kind: HistoryEventKind, listener: impl Fn(&HistoryEvent) + 'static) -> Subscription {
        self.events.on(kind, listener)
    }

    /// Reconcile a native pop with the tracked length.
    fn handle_pop(&self, raw: Option<Value>) {
        let back = match raw.as_ref().and_then(HistoryState::from_value) {
            Some(state) => {
                let back = state.order + 1 < self.length.get();
                self.length.set(state.order + 1);
                back
            }
            None => {
                debug!(location = %self.native.location(), "popped entry has no order, treating as forward");
                false
            }
        };
        debug!(back, length = self.length.get(), "history pop");

        let event = HistoryEvent {
            back,
            state: raw,
            location: self.native.location(),
        };
        self.events.emit(&HistoryEventKind::Popped, &event);
        self.events.emit(&HistoryEventKind::Changed, &event);
    }

    fn emit_changed(&self, back: bool, state: Option<Value>) {
        let event = HistoryEvent {
            back,
            state,
            location: self.native.location(),
        };
        self.events.emit(&HistoryEventKind::Changed, &event);
    }
}

#[cfg(test)]
#[path = "history_tests.rs"]
mod tests;
