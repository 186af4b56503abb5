//! Animated swaps between an incoming and an outgoing element.
//!
//! A [`Transition`] drives one swap through its fixed sequence: reset, unhide, layout flush,
//! next frame, apply, wait, cleanup. [`Transitions`] owns the named effect factories and the
//! per-element table that keeps two transitions from running on the same element at once.

pub mod effects;

pub use effects::{Descriptor, Direction, Effect, Fade, NoEffect, Slide, TRANSITION_STYLES};

use crate::clock::Clock;
use crate::dom::{Document, NodeId};
use futures::future::{FutureExt, LocalBoxFuture, Shared};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};
use std::time::Duration;
use tracing::{debug, warn};

/// Builds an effect from descriptor params and the reverse flag.
pub type EffectFactory = Rc<dyn Fn(&[String], bool) -> Rc<dyn Effect>>;

type Running = Shared<LocalBoxFuture<'static, ()>>;

// ===== Transition =====

/// One incoming/outgoing swap.
#[derive(Debug, Clone)]
pub struct Transition {
    pub incoming: NodeId,
    pub outgoing: Option<NodeId>,
    pub duration: Duration,
    pub reverse: bool,
    pub effect: Rc<dyn Effect>,
}

impl Transition {
    /// Run the swap to completion.
    pub async fn start(self, doc: Document, clock: Rc<dyn Clock>) {
        debug!(
            effect = self.effect.name(),
            incoming = %self.incoming,
            outgoing = ?self.outgoing,
            duration_ms = self.duration.as_millis() as u64,
            "transition start"
        );
        self.effect
            .reset(&doc, self.incoming, self.outgoing, self.duration);
        doc.set_hidden(self.incoming, false);
        doc.force_layout();

        clock.next_frame().await;
        self.effect.apply(&doc, self.incoming, self.outgoing);

        clock.sleep(self.duration).await;
        for element in std::iter::once(self.incoming).chain(self.outgoing) {
            for property in TRANSITION_STYLES {
                doc.clear_style(element, property);
            }
        }
        if let Some(outgoing) = self.outgoing {
            doc.set_hidden(outgoing, true);
        }
        debug!(incoming = %self.incoming, "transition done");
    }
}

// ===== Transitions =====

/// Effect factories plus the table of transitions currently running per element.
pub struct Transitions {
    document: Document,
    clock: Rc<dyn Clock>,
    default_name: String,
    default_duration: Duration,
    factories: RefCell<HashMap<String, EffectFactory>>,
    active: RefCell<HashMap<NodeId, (u64, Running)>>,
    next_ticket: Cell<u64>,
}

impl fmt::Debug for Transitions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.factories.borrow().keys().cloned().collect();
        names.sort();
        f.debug_struct("Transitions")
            .field("default_name", &self.default_name)
            .field("default_duration", &self.default_duration)
            .field("effects", &names)
            .field("active", &self.active.borrow().len())
            .finish()
    }
}

impl Transitions {
    /// Create the table with `none`, `fade` and `slide` registered.
    pub fn new(
        document: Document,
        clock: Rc<dyn Clock>,
        default_name: impl Into<String>,
        default_duration: Duration,
    ) -> Rc<Self> {
        let transitions = Rc::new(Self {
            document,
            clock,
            default_name: default_name.into(),
            default_duration,
            factories: RefCell::new(HashMap::new()),
            active: RefCell::new(HashMap::new()),
            next_ticket: Cell::new(0),
        });
        transitions.register("none", |_, _| Rc::new(NoEffect));
        transitions.register("fade", |_, _| Rc::new(Fade));
        transitions.register("slide", |params, reverse| Rc::new(Slide::new(params, reverse)));
        transitions
    }

    pub fn register(&self, name: &str, factory: impl Fn(&[String], bool) -> Rc<dyn Effect> + 'static) {
        self.factories
            .borrow_mut()
            .insert(name.to_string(), Rc::new(factory));
    }

    pub fn default_name(&self) -> &str {
        &self.default_name
    }

    pub fn default_duration(&self) -> Duration {
        self.default_duration
    }

    /// Resolve a descriptor. Unknown names fall back to `none`.
    pub fn init(&self, descriptor: &str, reverse: bool) -> Rc<dyn Effect> {
        let descriptor = Descriptor::parse(descriptor);
        let factory = self.factories.borrow().get(&descriptor.name).cloned();
        match factory {
            Some(factory) => factory(&descriptor.params, reverse),
            None => {
                warn!(name = %descriptor.name, "unknown transition, using none");
                Rc::new(NoEffect)
            }
        }
    }

    /// True while a transition involving `element` has not finished cleanup.
    pub fn is_running(&self, element: NodeId) -> bool {
        self.active.borrow().contains_key(&element)
    }

    /// Run `transition` once every transition already running on its elements has finished.
    pub fn run(self: &Rc<Self>, transition: Transition) -> LocalBoxFuture<'static, ()> {
        let elements: Vec<NodeId> = std::iter::once(transition.incoming)
            .chain(transition.outgoing)
            .collect();
        let previous: Vec<Running> = {
            let active = self.active.borrow();
            elements
                .iter()
                .filter_map(|element| active.get(element).map(|(_, running)| running.clone()))
                .collect()
        };

        let ticket = self.next_ticket.get();
        self.next_ticket.set(ticket + 1);

        let weak: Weak<Transitions> = Rc::downgrade(self);
        let doc = self.document.clone();
        let clock = self.clock.clone();
        let running: Running = async move {
            for earlier in previous {
                earlier.await;
            }
            transition.start(doc, clock).await;
            if let Some(table) = weak.upgrade() {
                table
                    .active
                    .borrow_mut()
                    .retain(|_, (owner, _)| *owner != ticket);
            }
        }
        .boxed_local()
        .shared();

        {
            let mut active = self.active.borrow_mut();
            for element in elements {
                active.insert(element, (ticket, running.clone()));
            }
        }
        running.boxed_local()
    }
}

#[cfg(test)]
#[path = "transition_tests.rs"]
mod tests;
