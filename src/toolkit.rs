//! Application root.
//!
//! [`Toolkit`] owns what every view and viewport shares: the document, the registries, the
//! loader and clock, the transition table, the instance cache, the history log and the task
//! spawner.

use crate::clock::Clock;
use crate::dom::{Document, NodeId};
use crate::error::RenderError;
use crate::history::{HistoryLog, NativeHistory};
use crate::loader::Loader;
use crate::registry::ViewRegistry;
use crate::transition::Transitions;
use crate::view::{Instances, View, ViewId, ViewOptions};
use futures::executor::LocalSpawner;
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;
use tracing::debug;

/// Class of the global loading indicator element.
pub const LOADING_CLASS: &str = "loading-indicator";

/// Runtime behaviour resolved from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Transition descriptor used when neither options nor the element name one.
    pub transition: String,
    pub duration: Duration,
    /// View type or template shown when a navigation fails.
    pub error_view: String,
    /// Whether top-level viewports write history entries.
    pub record_history: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            transition: "none".to_string(),
            duration: Duration::from_millis(250),
            error_view: "error".to_string(),
            record_history: true,
        }
    }
}

/// Platform services the toolkit runs on.
#[derive(Clone)]
pub struct Services {
    pub loader: Rc<dyn Loader>,
    pub clock: Rc<dyn Clock>,
    pub history: Rc<dyn NativeHistory>,
}

/// Shared, read-mostly state handed to every view.
pub struct Runtime {
    pub document: Document,
    pub registry: ViewRegistry,
    pub loader: Rc<dyn Loader>,
    pub clock: Rc<dyn Clock>,
    pub transitions: Rc<Transitions>,
    pub settings: Settings,
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("document", &self.document)
            .field("registry", &self.registry)
            .field("transitions", &self.transitions)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Runtime {
    /// True when `name` can be instantiated as a view.
    pub fn knows_view(&self, name: &str) -> bool {
        self.registry.view_type(name).is_some() || self.registry.has_template(name)
    }
}

// ===== LoadingIndicator =====

/// Global busy indicator shown while any navigation is in flight.
#[derive(Debug)]
pub struct LoadingIndicator {
    document: Document,
    element: NodeId,
    busy: Cell<usize>,
}

impl LoadingIndicator {
    fn new(document: Document) -> Self {
        let element = document.element("div", &[LOADING_CLASS]);
        document.set_hidden(element, true);
        document.append_child(document.body(), element);
        Self {
            document,
            element,
            busy: Cell::new(0),
        }
    }

    pub fn element(&self) -> NodeId {
        self.element
    }

    pub fn show(&self) {
        self.busy.set(self.busy.get() + 1);
        self.document.set_hidden(self.element, false);
    }

    /// Hide once every `show` has been matched.
    pub fn hide(&self) {
        self.busy.set(self.busy.get().saturating_sub(1));
        if self.busy.get() == 0 {
            self.document.set_hidden(self.element, true);
        }
    }

    pub fn is_visible(&self) -> bool {
        !self.document.is_hidden(self.element)
    }
}

/// Keeps the loading indicator shown until dropped.
#[must_use = "the indicator hides again as soon as the guard is dropped"]
#[derive(Debug)]
pub struct Busy(Rc<LoadingIndicator>);

impl Drop for Busy {
    fn drop(&mut self) {
        self.0.hide();
    }
}

// ===== Toolkit =====

/// Cheap handle to the application root. Clones share everything.
#[derive(Clone)]
pub struct Toolkit {
    runtime: Rc<Runtime>,
    instances: Rc<Instances>,
    history: Rc<HistoryLog>,
    loading: Rc<LoadingIndicator>,
    spawner: LocalSpawner,
}

impl fmt::Debug for Toolkit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Toolkit")
            .field("runtime", &self.runtime)
            .field("live_views", &self.instances.len())
            .field("history", &self.history)
            .finish_non_exhaustive()
    }
}

impl Toolkit {
    /// Build the root on a fresh document. Navigations spawned by history pops run on `spawner`.
    pub fn new(registry: ViewRegistry, services: Services, settings: Settings, spawner: LocalSpawner) -> Self {
        let document = Document::new();
        let transitions = Transitions::new(
            document.clone(),
            services.clock.clone(),
            settings.transition.clone(),
            settings.duration,
        );
        let loading = Rc::new(LoadingIndicator::new(document.clone()));
        debug!(?settings, "toolkit ready");
        Self {
            runtime: Rc::new(Runtime {
                document,
                registry,
                loader: services.loader,
                clock: services.clock,
                transitions,
                settings,
            }),
            instances: Rc::new(Instances::new()),
            history: HistoryLog::new(services.history),
            loading,
            spawner,
        }
    }

    pub fn runtime(&self) -> &Rc<Runtime> {
        &self.runtime
    }

    pub fn document(&self) -> &Document {
        &self.runtime.document
    }

    pub fn settings(&self) -> &Settings {
        &self.runtime.settings
    }

    pub fn history(&self) -> &Rc<HistoryLog> {
        &self.history
    }

    pub fn loading(&self) -> &LoadingIndicator {
        &self.loading
    }

    /// Show the loading indicator for the lifetime of the returned guard.
    pub fn busy(&self) -> Busy {
        self.loading.show();
        Busy(self.loading.clone())
    }

    pub fn spawner(&self) -> &LocalSpawner {
        &self.spawner
    }

    pub fn instances(&self) -> &Rc<Instances> {
        &self.instances
    }

    /// Create a top-level view by type or template name.
    pub fn create_view(&self, name: &str, options: ViewOptions) -> Result<View, RenderError> {
        View::new(&self.runtime, &self.instances, name, options, None)
    }

    /// Live view by id. Destroyed views are gone.
    pub fn view(&self, id: ViewId) -> Option<View> {
        self.instances.get(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::VirtualClock;
    use crate::history::MemoryHistory;
    use crate::loader::StaticLoader;
    use futures::executor::LocalPool;

    fn toolkit() -> Toolkit {
        let pool = LocalPool::new();
        Toolkit::new(
            ViewRegistry::new(),
            Services {
                loader: Rc::new(StaticLoader::new()),
                clock: Rc::new(VirtualClock::new()),
                history: Rc::new(MemoryHistory::new("https://example.test", "/")),
            },
            Settings::default(),
            pool.spawner(),
        )
    }

    #[test]
    fn loading_indicator_is_reference_counted() {
        let toolkit = toolkit();
        let loading = toolkit.loading();
        assert!(!loading.is_visible());

        loading.show();
        loading.show();
        loading.hide();
        assert!(loading.is_visible(), "one navigation still in flight");

        loading.hide();
        assert!(!loading.is_visible());
    }

    #[test]
    fn busy_guard_hides_indicator_when_dropped() {
        let toolkit = toolkit();
        let outer = toolkit.busy();
        let inner = toolkit.busy();
        drop(inner);
        assert!(toolkit.loading().is_visible(), "outer guard still alive");

        drop(outer);
        assert!(!toolkit.loading().is_visible());
    }

    #[test]
    fn loading_indicator_lives_in_body() {
        let toolkit = toolkit();
        let doc = toolkit.document();
        assert_eq!(doc.find_by_class(doc.body(), LOADING_CLASS), Some(toolkit.loading().element()));
    }

    #[test]
    fn unknown_view_cannot_be_created() {
        let toolkit = toolkit();
        let result = toolkit.create_view("ghost", ViewOptions::default());
        assert!(matches!(result, Err(RenderError::UnknownView { .. })));
    }
}
