//! Native history primitives and an in-memory implementation.

use super::location::Location;
use serde_json::Value;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Callback invoked when the user (or code) moves through history.
pub type PopHandler = Rc<dyn Fn(Option<Value>)>;

/// The browser's `history`/`location` surface.
pub trait NativeHistory {
    fn push_state(&self, state: Value, title: &str, url: &str);
    fn replace_state(&self, state: Value, title: &str, url: &str);
    fn back(&self);
    /// State payload of the current entry.
    fn state(&self) -> Option<Value>;
    fn location(&self) -> Location;
    /// Install the single pop listener (the `popstate` handler).
    fn set_pop_handler(&self, handler: PopHandler);
}

#[derive(Debug, Clone)]
struct Entry {
    url: String,
    title: String,
    state: Option<Value>,
}

struct Stack {
    entries: Vec<Entry>,
    index: usize,
    handler: Option<PopHandler>,
}

/// History stack held in memory.
///
/// Pop handlers run synchronously from `back`, `forward` and `change_fragment`, mirroring the
/// order in which a browser would dispatch `popstate` after the move.
pub struct MemoryHistory {
    origin: String,
    stack: RefCell<Stack>,
}

impl fmt::Debug for MemoryHistory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stack = self.stack.borrow();
        f.debug_struct("MemoryHistory")
            .field("origin", &self.origin)
            .field("entries", &stack.entries)
            .field("index", &stack.index)
            .finish()
    }
}

impl MemoryHistory {
    /// Start with one untagged entry at `initial_url` (path relative to `origin`).
    pub fn new(origin: impl Into<String>, initial_url: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            stack: RefCell::new(Stack {
                entries: vec![Entry {
                    url: initial_url.into(),
                    title: String::new(),
                    state: None,
                }],
                index: 0,
                handler: None,
            }),
        }
    }

    /// Total entries, back and forward (the browser's `history.length`).
    pub fn len(&self) -> usize {
        self.stack.borrow().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.borrow().entries.is_empty()
    }

    pub fn index(&self) -> usize {
        self.stack.borrow().index
    }

    pub fn current_url(&self) -> String {
        let stack = self.stack.borrow();
        stack.entries[stack.index].url.clone()
    }

    pub fn current_title(&self) -> String {
        let stack = self.stack.borrow();
        stack.entries[stack.index].title.clone()
    }

    /// URLs from oldest to newest.
    pub fn urls(&self) -> Vec<String> {
        self.stack
            .borrow()
            .entries
            .iter()
            .map(|e| e.url.clone())
            .collect()
    }

    pub fn forward(&self) {
        let moved = {
            let mut stack = self.stack.borrow_mut();
            if stack.index + 1 < stack.entries.len() {
                stack.index += 1;
                true
            } else {
                false
            }
        };
        if moved {
            self.dispatch_pop();
        }
    }

    /// Navigate to a new fragment, creating an untagged entry and firing a pop.
    pub fn change_fragment(&self, hash: &str) {
        {
            let mut stack = self.stack.borrow_mut();
            let mut location = Location::parse(&stack.entries[stack.index].url);
            location.hash = hash.trim_start_matches('#').to_string();
            let index = stack.index;
            stack.entries.truncate(index + 1);
            stack.entries.push(Entry {
                url: location.relative(),
                title: String::new(),
                state: None,
            });
            stack.index += 1;
        }
        self.dispatch_pop();
    }

    fn dispatch_pop(&self) {
        let (handler, state) = {
            let stack = self.stack.borrow();
            (
                stack.handler.clone(),
                stack.entries[stack.index].state.clone(),
            )
        };
        if let Some(handler) = handler {
            handler(state);
        }
    }
}

impl NativeHistory for MemoryHistory {
    fn push_state(&self, state: Value, title: &str, url: &str) {
        let mut stack = self.stack.borrow_mut();
        let index = stack.index;
        stack.entries.truncate(index + 1);
        stack.entries.push(Entry {
            url: url.to_string(),
            title: title.to_string(),
            state: Some(state),
        });
        stack.index += 1;
    }

    fn replace_state(&self, state: Value, title: &str, url: &str) {
        let mut stack = self.stack.borrow_mut();
        let index = stack.index;
        stack.entries[index] = Entry {
            url: url.to_string(),
            title: title.to_string(),
            state: Some(state),
        };
    }

    fn back(&self) {
        let moved = {
            let mut stack = self.stack.borrow_mut();
            if stack.index > 0 {
                stack.index -= 1;
                true
            } else {
                false
            }
        };
        if moved {
            self.dispatch_pop();
        }
    }

    fn state(&self) -> Option<Value> {
        let stack = self.stack.borrow();
        stack.entries[stack.index].state.clone()
    }

    fn location(&self) -> Location {
        let mut location = Location::parse(&self.current_url());
        location.origin = self.origin.clone();
        location
    }

    fn set_pop_handler(&self, handler: PopHandler) {
        self.stack.borrow_mut().handler = Some(handler);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::Cell;

    #[test]
    fn push_truncates_forward_entries() {
        let history = MemoryHistory::new("https://example.test", "/");
        history.push_state(json!(1), "", "/a");
        history.push_state(json!(2), "", "/b");
        history.back();
        history.push_state(json!(3), "", "/c");

        assert_eq!(history.urls(), vec!["/", "/a", "/c"]);
        assert_eq!(history.index(), 2);
    }

    #[test]
    fn back_at_first_entry_does_not_fire() {
        let history = MemoryHistory::new("https://example.test", "/");
        let fired = Rc::new(Cell::new(0));
        let counter = fired.clone();
        history.set_pop_handler(Rc::new(move |_| counter.set(counter.get() + 1)));

        history.back();

        assert_eq!(fired.get(), 0);
        assert_eq!(history.current_url(), "/");
    }

    #[test]
    fn back_and_forward_deliver_entry_state() {
        let history = MemoryHistory::new("https://example.test", "/");
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        history.set_pop_handler(Rc::new(move |state| sink.borrow_mut().push(state)));
        history.push_state(json!({"order": 0}), "", "/a");

        history.back();
        history.forward();

        assert_eq!(*seen.borrow(), vec![None, Some(json!({"order": 0}))]);
    }

    #[test]
    fn fragment_change_creates_untagged_entry() {
        let history = MemoryHistory::new("https://example.test", "/page");
        history.change_fragment("#section");
        assert_eq!(history.current_url(), "/page#section");
        assert_eq!(history.state(), None);
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn location_carries_origin() {
        let history = MemoryHistory::new("file://", "/site/index.html");
        assert!(history.location().is_file());
    }
}
