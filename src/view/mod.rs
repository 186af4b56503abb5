//! Views: loadable, renderable, lifecycle-managed pieces of UI.
//!
//! A [`View`] is a cheap handle; clones refer to the same instance. Construction registers the
//! instance in the toolkit's [`Instances`] cache and [`View::destroy`] evicts it again.
//!
//! # Lifecycle
//!
//! created → loaded → rendered → attached → shown → (reloaded / hidden / shown)* → removed →
//! destroyed. Removal keeps the root for reattachment; destruction drops it.

pub mod render;

use crate::dom::visibility::{self, ToggleOptions};
use crate::dom::{NodeId, ScrollOffset};
use crate::error::{RenderError, ViewError};
use crate::events::{Emitter, Subscription};
use crate::loader::LoadOptions;
use crate::registry::{Retention, ViewType};
use crate::toolkit::Runtime;
use futures::future::{self, FutureExt, LocalBoxFuture};
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::{Rc, Weak};
use tracing::{debug, warn};

// ===== Identity =====

/// Unique id of a view instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ViewId(u64);

impl ViewId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "view-{}", self.0)
    }
}

/// Id → instance cache of live views.
#[derive(Debug, Default)]
pub struct Instances {
    next_id: Cell<u64>,
    live: RefCell<HashMap<ViewId, View>>,
}

impl Instances {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(&self) -> ViewId {
        let id = ViewId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        id
    }

    fn register(&self, view: &View) {
        self.live.borrow_mut().insert(view.id(), view.clone());
    }

    fn evict(&self, id: ViewId) {
        self.live.borrow_mut().remove(&id);
    }

    pub fn get(&self, id: ViewId) -> Option<View> {
        self.live.borrow().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.live.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.borrow().is_empty()
    }
}

// ===== Options & events =====

/// Error details handed to an error view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub message: String,
    pub status: u16,
}

/// Per-instance construction options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewOptions {
    /// Route params, also used to fill data source placeholders.
    pub params: BTreeMap<String, String>,
    /// Query parameters, forwarded to the loader.
    pub query: BTreeMap<String, String>,
    /// Path the view was opened for.
    pub path: String,
    /// Pre-supplied data; skips the loader.
    pub data: Option<Value>,
    pub error: Option<ErrorInfo>,
}

impl ViewOptions {
    pub fn with_params(params: BTreeMap<String, String>) -> Self {
        Self {
            params,
            ..Self::default()
        }
    }

    pub fn with_data(data: Value) -> Self {
        Self {
            data: Some(data),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewEvent {
    Attached,
    Shown,
    Hidden,
    Removed,
    Destroyed,
}

/// Where an included view's root goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Append as the last child of the element.
    Append(NodeId),
    /// Take the element's place.
    Replace(NodeId),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IncludeOptions {
    /// Attach with the hidden flag set.
    pub hidden: bool,
}

// ===== View =====

struct ViewInner {
    id: ViewId,
    view_type: Option<Rc<ViewType>>,
    template: Option<String>,
    parent: Option<Weak<ViewInner>>,
    runtime: Rc<Runtime>,
    instances: Weak<Instances>,
    options: RefCell<ViewOptions>,
    data: RefCell<Value>,
    root: Cell<Option<NodeId>>,
    scroll: Cell<ScrollOffset>,
    children: RefCell<Vec<View>>,
    events: Emitter<ViewEvent, View>,
    destroyed: Cell<bool>,
}

/// Handle to a view instance.
#[derive(Clone)]
pub struct View(Rc<ViewInner>);

impl PartialEq for View {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for View {}

impl fmt::Debug for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("View")
            .field("id", &self.0.id)
            .field("type", &self.type_name())
            .field("template", &self.0.template)
            .field("root", &self.0.root.get())
            .field("destroyed", &self.0.destroyed.get())
            .finish()
    }
}

impl View {
    /// Create an instance by view-type name, or an anonymous one by template name.
    pub fn new(
        runtime: &Rc<Runtime>,
        instances: &Rc<Instances>,
        name: &str,
        options: ViewOptions,
        parent: Option<&View>,
    ) -> Result<View, RenderError> {
        let registry = &runtime.registry;
        let (view_type, template) = match registry.view_type(name) {
            Some(view_type) => {
                let template = view_type
                    .template()
                    .map(String::from)
                    .or_else(|| registry.has_template(name).then(|| name.to_string()));
                (Some(view_type), template)
            }
            None if registry.has_template(name) => (None, Some(name.to_string())),
            None => {
                return Err(RenderError::UnknownView {
                    name: name.to_string(),
                })
            }
        };

        let view = View(Rc::new(ViewInner {
            id: instances.allocate(),
            view_type,
            template,
            parent: parent.map(|p| Rc::downgrade(&p.0)),
            runtime: runtime.clone(),
            instances: Rc::downgrade(instances),
            options: RefCell::new(options),
            data: RefCell::new(Value::Null),
            root: Cell::new(None),
            scroll: Cell::new(ScrollOffset::default()),
            children: RefCell::new(Vec::new()),
            events: Emitter::new(),
            destroyed: Cell::new(false),
        }));
        instances.register(&view);
        debug!(id = %view.id(), name, "view created");
        Ok(view)
    }

    pub fn id(&self) -> ViewId {
        self.0.id
    }

    /// View-type name; `None` for anonymous views.
    pub fn type_name(&self) -> Option<&str> {
        self.0.view_type.as_ref().map(|t| t.name())
    }

    pub fn view_type(&self) -> Option<&Rc<ViewType>> {
        self.0.view_type.as_ref()
    }

    pub fn template(&self) -> Option<&str> {
        self.0.template.as_deref()
    }

    pub fn retention(&self) -> Option<Retention> {
        self.0.view_type.as_ref().and_then(|t| t.retention())
    }

    pub fn parent(&self) -> Option<View> {
        self.0.parent.as_ref().and_then(Weak::upgrade).map(View)
    }

    pub fn options(&self) -> ViewOptions {
        self.0.options.borrow().clone()
    }

    /// Data from the most recent load.
    pub fn data(&self) -> Value {
        self.0.data.borrow().clone()
    }

    pub fn root(&self) -> Option<NodeId> {
        self.0.root.get()
    }

    pub fn children(&self) -> Vec<View> {
        self.0.children.borrow().clone()
    }

    pub fn is_destroyed(&self) -> bool {
        self.0.destroyed.get()
    }

    /// True while the root is in the document.
    pub fn is_attached(&self) -> bool {
        self.root()
            .is_some_and(|root| self.0.runtime.document.is_connected(root))
    }

    pub fn saved_scroll(&self) -> ScrollOffset {
        self.0.scroll.get()
    }

    pub fn on(&self, event: ViewEvent, listener: impl Fn(&View) + 'static) -> Subscription {
        self.0.events.on(event, listener)
    }

    fn emit(&self, event: ViewEvent) {
        self.0.events.emit(&event, self);
    }

    // ===== Lifecycle =====

    /// Attach the view at `placement`, loading and rendering it first if needed.
    pub fn include(&self, placement: Placement, options: IncludeOptions) -> LocalBoxFuture<'static, Result<NodeId, ViewError>> {
        if self.is_destroyed() {
            return future::ready(Err(ViewError::Destroyed { id: self.id() })).boxed_local();
        }
        if let Some(root) = self.root() {
            self.attach(root, placement, options);
            let doc = &self.0.runtime.document;
            doc.set_scroll(root, self.0.scroll.get());
            return future::ready(Ok(root)).boxed_local();
        }

        let view = self.clone();
        async move {
            view.load().await?;
            let root = match view.render().await {
                Ok(root) => root,
                Err(RenderError::Includes {
                    template,
                    root,
                    failures,
                }) => {
                    view.0.root.set(Some(root));
                    return Err(RenderError::Includes {
                        template,
                        root,
                        failures,
                    }
                    .into());
                }
                Err(err) => return Err(err.into()),
            };
            if view.is_destroyed() {
                return Err(ViewError::Destroyed { id: view.id() });
            }
            view.0.root.set(Some(root));
            view.attach(root, placement, options);
            Ok(root)
        }
        .boxed_local()
    }

    fn attach(&self, root: NodeId, placement: Placement, options: IncludeOptions) {
        let doc = &self.0.runtime.document;
        if options.hidden {
            doc.set_hidden(root, true);
        }
        match placement {
            Placement::Append(parent) => doc.append_child(parent, root),
            Placement::Replace(old) => doc.replace(old, root),
        }
        debug!(id = %self.id(), %root, "view attached");
        self.emit(ViewEvent::Attached);
    }

    /// Re-run load and render, swapping the new root in place of the old one.
    ///
    /// `options`, when given, replaces the view's options first. Children of the previous
    /// render are destroyed once the new render succeeds.
    pub fn reload(&self, options: Option<ViewOptions>) -> LocalBoxFuture<'static, Result<NodeId, ViewError>> {
        let Some(old_root) = self.root() else {
            return future::ready(Err(ViewError::NotRendered { id: self.id() })).boxed_local();
        };
        if let Some(options) = options {
            *self.0.options.borrow_mut() = options;
        }

        let view = self.clone();
        async move {
            let previous_children = std::mem::take(&mut *view.0.children.borrow_mut());
            let rendered = match view.load().await {
                Ok(()) => view.render().await.map_err(ViewError::from),
                Err(err) => Err(err),
            };
            let new_root = match rendered {
                Ok(root) => root,
                Err(err) => {
                    let failed = std::mem::replace(&mut *view.0.children.borrow_mut(), previous_children);
                    for child in failed {
                        child.destroy();
                    }
                    return Err(err);
                }
            };
            for child in previous_children {
                child.destroy();
            }

            if view.is_destroyed() {
                return Err(ViewError::Destroyed { id: view.id() });
            }
            if new_root != old_root {
                let doc = &view.0.runtime.document;
                if doc.is_hidden(old_root) {
                    doc.set_hidden(new_root, true);
                }
                doc.replace(old_root, new_root);
                view.0.root.set(Some(new_root));
            }
            debug!(id = %view.id(), root = %new_root, "view reloaded");
            Ok(new_root)
        }
        .boxed_local()
    }

    /// Show or hide the root, emitting `Shown`/`Hidden` once done.
    pub fn toggle(&self, show: bool, options: ToggleOptions) -> LocalBoxFuture<'static, Result<(), ViewError>> {
        let Some(root) = self.root() else {
            return future::ready(Err(ViewError::NotRendered { id: self.id() })).boxed_local();
        };
        let runtime = &self.0.runtime;
        let pending = visibility::toggle(&runtime.transitions, &runtime.document, root, show, &options);
        let view = self.clone();
        async move {
            pending.await;
            view.emit(if show { ViewEvent::Shown } else { ViewEvent::Hidden });
            Ok(())
        }
        .boxed_local()
    }

    /// Detach the root, remembering its scroll offsets.
    pub fn remove(&self) {
        let Some(root) = self.root() else {
            return;
        };
        let doc = &self.0.runtime.document;
        if doc.parent(root).is_none() {
            return;
        }
        self.0.scroll.set(doc.scroll(root));
        doc.detach(root);
        debug!(id = %self.id(), "view removed");
        self.emit(ViewEvent::Removed);
    }

    /// Tear the view down for good.
    pub fn destroy(&self) {
        if self.0.destroyed.replace(true) {
            return;
        }
        self.remove();
        let children = std::mem::take(&mut *self.0.children.borrow_mut());
        for child in children {
            child.destroy();
        }
        self.0.root.set(None);
        self.emit(ViewEvent::Destroyed);
        self.0.events.clear();
        if let Some(instances) = self.0.instances.upgrade() {
            instances.evict(self.id());
        }
        debug!(id = %self.id(), "view destroyed");
    }

    // ===== Load & render =====

    async fn load(&self) -> Result<(), ViewError> {
        let (preset, request) = {
            let options = self.0.options.borrow();
            let request = self.0.view_type.as_ref().and_then(|t| t.data()).map(|source| {
                (
                    source.resolve(&options.params),
                    LoadOptions {
                        query: options.query.clone(),
                    },
                )
            });
            (options.data.clone(), request)
        };

        let data = match (preset, request) {
            (Some(data), _) => data,
            (None, Some((url, load_options))) => {
                debug!(id = %self.id(), %url, "loading view data");
                let pending = self.0.runtime.loader.load(&url, &load_options);
                pending.await.inspect_err(|err| {
                    warn!(id = %self.id(), %url, error = %err, "view data failed to load");
                })?
            }
            (None, None) => Value::Null,
        };
        *self.0.data.borrow_mut() = data.clone();

        if let Some(hook) = self.0.view_type.as_ref().and_then(|t| t.on_loaded()).cloned() {
            hook(self, &data);
        }
        Ok(())
    }

    fn add_child(&self, child: View) {
        self.0.children.borrow_mut().push(child);
    }

    fn drop_child(&self, child: &View) {
        self.0.children.borrow_mut().retain(|c| c != child);
    }

    pub(crate) fn runtime(&self) -> &Rc<Runtime> {
        &self.0.runtime
    }

    pub(crate) fn instances(&self) -> Option<Rc<Instances>> {
        self.0.instances.upgrade()
    }
}

#[cfg(test)]
#[path = "view_tests.rs"]
mod tests;
