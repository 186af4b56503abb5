//! Navigation controller.
//!
//! A [`Viewport`] maps paths to view instances inside a container element. It resolves a path
//! against its route tree, reuses or creates the target view, swaps it in with a transition,
//! evicts retired instances according to their retention policy and, when top-level, keeps the
//! history log in step.
//!
//! # Navigation
//!
//! Each `open` takes a generation number. Any await may let a newer `open` start; a navigation
//! that finds its generation outdated discards what it built and resolves to
//! [`NavigationError::Superseded`].

pub mod pattern;
pub mod route;

pub use pattern::{compile, PathMatch, PathMatcher, PatternError};
pub use route::{find_path, PathNode, RouteDef, RouteHandler, RouteNode};

use crate::dom::visibility::ToggleOptions;
use crate::dom::{NodeId, ScrollOffset};
use crate::error::{NavigationError, ViewError};
use crate::events::{Emitter, Subscription};
use crate::history::{HistoryEvent, HistoryEventKind, Location};
use crate::toolkit::Toolkit;
use crate::view::{ErrorInfo, IncludeOptions, Placement, View, ViewOptions};
use futures::channel::oneshot;
use futures::future::{self, FutureExt, LocalBoxFuture};
use futures::task::LocalSpawnExt;
use serde_json::json;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};
use tracing::{debug, error, warn};

pub type NavigationResult = Result<View, NavigationError>;

// ===== Options =====

/// Per-navigation options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenOptions {
    /// Reload a cached view before showing it.
    pub reload: bool,
    /// Replace the current history entry instead of pushing.
    pub replace: bool,
    /// Backward navigation: transitions play reversed.
    pub back: bool,
    /// Record the navigation in history (top-level viewports only).
    pub history: bool,
    /// Transition descriptor overriding the element and default ones.
    pub transition: Option<String>,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            reload: false,
            replace: false,
            back: false,
            history: true,
            transition: None,
        }
    }
}

impl OpenOptions {
    pub fn reload() -> Self {
        Self {
            reload: true,
            ..Self::default()
        }
    }
}

pub struct ViewportOptions {
    pub routes: Vec<RouteNode>,
    /// Top-level viewports own the history log and react to pops.
    pub top_level: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewportEvent {
    /// A navigation completed; the report carries no error.
    Navigated,
    /// A navigation failed.
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NavigationReport {
    pub path: String,
    pub error: Option<NavigationError>,
}

// ===== State =====

#[derive(Debug, Clone)]
struct StackEntry {
    path: String,
    view: View,
}

struct BackRequest {
    target: Option<String>,
    options: OpenOptions,
    reply: oneshot::Sender<NavigationResult>,
}

struct ViewportInner {
    toolkit: Toolkit,
    container: NodeId,
    routes: Vec<RouteNode>,
    top_level: bool,
    stack: RefCell<Vec<StackEntry>>,
    current: RefCell<Option<View>>,
    path: RefCell<Option<String>>,
    generation: Cell<u64>,
    back_request: RefCell<Option<BackRequest>>,
    pop_subscription: RefCell<Option<Subscription>>,
    events: Emitter<ViewportEvent, NavigationReport>,
}

impl Drop for ViewportInner {
    fn drop(&mut self) {
        if let Some(subscription) = self.pop_subscription.get_mut().take() {
            subscription.unsubscribe();
        }
    }
}

/// Handle to a viewport. Clones share state.
#[derive(Clone)]
pub struct Viewport(Rc<ViewportInner>);

impl fmt::Debug for Viewport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Viewport")
            .field("container", &self.0.container)
            .field("top_level", &self.0.top_level)
            .field("path", &self.0.path.borrow())
            .field("stack", &self.stack_paths())
            .finish()
    }
}

impl Viewport {
    pub fn new(toolkit: &Toolkit, container: NodeId, options: ViewportOptions) -> Self {
        let viewport = Viewport(Rc::new(ViewportInner {
            toolkit: toolkit.clone(),
            container,
            routes: options.routes,
            top_level: options.top_level,
            stack: RefCell::new(Vec::new()),
            current: RefCell::new(None),
            path: RefCell::new(None),
            generation: Cell::new(0),
            back_request: RefCell::new(None),
            pop_subscription: RefCell::new(None),
            events: Emitter::new(),
        }));

        if options.top_level {
            let weak: Weak<ViewportInner> = Rc::downgrade(&viewport.0);
            let subscription = toolkit.history().on(HistoryEventKind::Popped, move |event| {
                if let Some(inner) = weak.upgrade() {
                    Viewport(inner).handle_pop(event);
                }
            });
            *viewport.0.pop_subscription.borrow_mut() = Some(subscription);
        }
        viewport
    }

    pub fn container(&self) -> NodeId {
        self.0.container
    }

    pub fn current(&self) -> Option<View> {
        self.0.current.borrow().clone()
    }

    /// Path of the active view.
    pub fn path(&self) -> Option<String> {
        self.0.path.borrow().clone()
    }

    /// Cached paths, oldest first.
    pub fn stack_paths(&self) -> Vec<String> {
        self.0
            .stack
            .borrow()
            .iter()
            .map(|entry| entry.path.clone())
            .collect()
    }

    /// Cached views, oldest first.
    pub fn stack_views(&self) -> Vec<View> {
        self.0
            .stack
            .borrow()
            .iter()
            .map(|entry| entry.view.clone())
            .collect()
    }

    pub fn on(&self, event: ViewportEvent, listener: impl Fn(&NavigationReport) + 'static) -> Subscription {
        self.0.events.on(event, listener)
    }

    // ===== open =====

    /// Navigate to `path`, resolving to the view that ends up active.
    pub fn open(&self, path: &str, options: OpenOptions) -> LocalBoxFuture<'static, NavigationResult> {
        let viewport = self.clone();
        let path = path.to_string();
        let generation = self.0.generation.get() + 1;
        self.0.generation.set(generation);

        async move {
            // Hidden again when dropped, including when the caller abandons the future.
            let busy = viewport.0.toolkit.busy();
            let result = match viewport.navigate(&path, &options, generation).await {
                Ok(view) => Ok(view),
                Err(NavigationError::Superseded { path }) => Err(NavigationError::Superseded { path }),
                Err(err) => viewport.fail(&path, err, &options, generation).await,
            };
            drop(busy);
            if result.is_ok() {
                viewport.0.events.emit(
                    &ViewportEvent::Navigated,
                    &NavigationReport {
                        path: path.clone(),
                        error: None,
                    },
                );
            }
            result
        }
        .boxed_local()
    }

    fn is_stale(&self, generation: u64) -> bool {
        self.0.generation.get() != generation
    }

    async fn navigate(&self, path: &str, options: &OpenOptions, generation: u64) -> NavigationResult {
        let location = Location::parse(path);
        let nodes = find_path(&self.0.routes, &location.path);
        let Some(view_index) = nodes.iter().position(|node| node.view.is_some()) else {
            return Err(NavigationError::NotFound {
                path: path.to_string(),
            });
        };

        let resolved = &nodes[..=view_index];
        let accumulated: String = resolved.iter().map(|node| node.matched.as_str()).collect();
        let params: BTreeMap<String, String> = resolved
            .iter()
            .flat_map(|node| node.params.clone())
            .collect();
        let remainder = location
            .path
            .get(accumulated.len()..)
            .unwrap_or_default()
            .to_string();
        debug!(path, %accumulated, %remainder, ?params, "route resolved");

        if let Some(handler) = resolved.iter().find_map(|node| node.handler.clone()) {
            if let Err(err) = handler(&params) {
                warn!(path, error = %err, "route handler failed, continuing");
            }
        }

        let view_options = ViewOptions {
            params,
            query: location.query_params(),
            path: accumulated.clone(),
            data: None,
            error: None,
        };
        let view_name = nodes[view_index].view.clone().unwrap_or_default();

        let cached = self
            .0
            .stack
            .borrow()
            .iter()
            .find(|entry| entry.path == accumulated && entry.view.options().error.is_none())
            .map(|entry| entry.view.clone());

        let view = match cached {
            Some(view) => {
                if options.reload {
                    let reloaded = view.reload(Some(view_options)).await;
                    if self.is_stale(generation) {
                        return Err(NavigationError::Superseded {
                            path: path.to_string(),
                        });
                    }
                    reloaded.map_err(|source| NavigationError::View {
                        path: path.to_string(),
                        source,
                    })?;
                }

                if self.current().as_ref() == Some(&view) {
                    debug!(path, "view already active");
                    if !remainder.is_empty() {
                        self.forward_remainder(&view, &remainder, options).await?;
                        self.commit(path, options);
                    }
                    return Ok(view);
                }

                self.move_to_top(&view);
                view.include(Placement::Append(self.0.container), IncludeOptions { hidden: true })
                    .await
                    .map_err(|source| NavigationError::View {
                        path: path.to_string(),
                        source,
                    })?;
                view
            }
            None => {
                let view = self
                    .0
                    .toolkit
                    .create_view(&view_name, view_options)
                    .map_err(|err| NavigationError::View {
                        path: path.to_string(),
                        source: ViewError::Render(err),
                    })?;
                let included = view
                    .include(Placement::Append(self.0.container), IncludeOptions { hidden: true })
                    .await;
                if self.is_stale(generation) {
                    debug!(path, "navigation superseded, discarding new view");
                    view.destroy();
                    return Err(NavigationError::Superseded {
                        path: path.to_string(),
                    });
                }
                if let Err(source) = included {
                    view.destroy();
                    return Err(NavigationError::View {
                        path: path.to_string(),
                        source,
                    });
                }
                self.push_entry(&accumulated, &view);
                view
            }
        };

        self.swap(&view, &accumulated, options).await;
        self.forward_remainder(&view, &remainder, options).await?;
        self.commit(path, options);
        Ok(view)
    }

    async fn forward_remainder(&self, view: &View, remainder: &str, options: &OpenOptions) -> Result<(), NavigationError> {
        if remainder.is_empty() {
            return Ok(());
        }
        let Some(hook) = view.view_type().and_then(|t| t.route()).cloned() else {
            debug!(%remainder, "no nested routing for remainder");
            return Ok(());
        };
        hook(view.clone(), remainder.to_string(), options.clone()).await
    }

    fn move_to_top(&self, view: &View) {
        let mut stack = self.0.stack.borrow_mut();
        if let Some(position) = stack.iter().position(|entry| entry.view == *view) {
            let entry = stack.remove(position);
            stack.push(entry);
        }
    }

    /// Push `view` for `path`, destroying whatever was cached there before.
    fn push_entry(&self, path: &str, view: &View) {
        let replaced: Vec<View> = {
            let mut stack = self.0.stack.borrow_mut();
            let replaced = stack
                .iter()
                .filter(|entry| entry.path == path && entry.view != *view)
                .map(|entry| entry.view.clone())
                .collect();
            stack.retain(|entry| entry.path != path);
            stack.push(StackEntry {
                path: path.to_string(),
                view: view.clone(),
            });
            replaced
        };
        let active = self.current();
        for old in replaced {
            if active.as_ref() != Some(&old) {
                old.destroy();
            }
        }
    }

    /// Make `view` the active one, retiring the previous view.
    async fn swap(&self, view: &View, path: &str, options: &OpenOptions) {
        let previous = self
            .0
            .current
            .replace(Some(view.clone()))
            .filter(|previous| previous != view);
        *self.0.path.borrow_mut() = Some(path.to_string());

        let toggle = ToggleOptions {
            transition: options.transition.clone(),
            replacing: previous.as_ref().and_then(View::root),
            reverse: options.back,
            ..ToggleOptions::default()
        };
        if let Err(err) = view.toggle(true, toggle).await {
            warn!(error = %err, "could not show view");
        }

        if let Some(previous) = previous {
            if !previous.is_destroyed() {
                if let Err(err) = previous.toggle(false, ToggleOptions::default()).await {
                    debug!(error = %err, "previous view was not rendered");
                }
                previous.remove();
                self.sweep(&previous);
            }
            // the replaced entry at this path may be the previous view
            if !self.0.stack.borrow().iter().any(|entry| entry.view == previous) {
                previous.destroy();
            }
        }
        self.sweep(view);
    }

    /// Evict cached instances of `view`'s type beyond its retention policy.
    ///
    /// The active view is exempt and not counted. Counting starts from the newest entry.
    fn sweep(&self, view: &View) {
        let Some(keep) = view.retention().and_then(|retention| retention.keep()) else {
            return;
        };
        let Some(type_name) = view.type_name().map(String::from) else {
            return;
        };
        let active = self.current();

        let evicted: Vec<View> = {
            let mut stack = self.0.stack.borrow_mut();
            let mut kept = 0;
            let mut evicted = Vec::new();
            for entry in stack.iter().rev() {
                if entry.view.type_name() != Some(type_name.as_str()) || active.as_ref() == Some(&entry.view) {
                    continue;
                }
                if kept < keep {
                    kept += 1;
                } else {
                    evicted.push(entry.view.clone());
                }
            }
            stack.retain(|entry| !evicted.contains(&entry.view));
            evicted
        };

        for view in evicted {
            debug!(id = %view.id(), view_type = %type_name, "evicting retired view");
            view.destroy();
        }
    }

    /// Record the navigation in history and reset document scroll.
    fn commit(&self, path: &str, options: &OpenOptions) {
        if !self.0.top_level {
            return;
        }
        let toolkit = &self.0.toolkit;
        if options.history && toolkit.settings().record_history {
            let history = toolkit.history();
            if history.location().is_file() {
                debug!(path, "file origin, not recording history");
            } else if options.replace {
                history.replace(path, Some(json!({ "path": path })), None);
            } else {
                history.push(path, Some(json!({ "path": path })), None);
            }
        }
        let doc = toolkit.document();
        doc.set_scroll(doc.body(), ScrollOffset::default());
    }

    // ===== error path =====

    async fn fail(&self, path: &str, err: NavigationError, options: &OpenOptions, generation: u64) -> NavigationResult {
        if self.is_stale(generation) {
            debug!(path, error = %err, "stale navigation failed, discarding");
            return Err(NavigationError::Superseded {
                path: path.to_string(),
            });
        }
        error!(path, error = %err, status = err.status(), "navigation failed");
        self.0.events.emit(
            &ViewportEvent::Failed,
            &NavigationReport {
                path: path.to_string(),
                error: Some(err.clone()),
            },
        );

        let toolkit = &self.0.toolkit;
        let error_view = toolkit.settings().error_view.clone();
        if !toolkit.runtime().knows_view(&error_view) {
            debug!(%error_view, "no error view registered");
            return Err(err);
        }

        let options_for_error = ViewOptions {
            path: path.to_string(),
            error: Some(ErrorInfo {
                message: err.to_string(),
                status: err.status(),
            }),
            ..ViewOptions::default()
        };
        let shown = match toolkit.create_view(&error_view, options_for_error) {
            Ok(view) => {
                let included = view
                    .include(Placement::Append(self.0.container), IncludeOptions { hidden: true })
                    .await;
                match included {
                    Ok(_) if !self.is_stale(generation) => Some(view),
                    Ok(_) => {
                        view.destroy();
                        None
                    }
                    Err(include_err) => {
                        warn!(error = %include_err, "error view failed to render");
                        view.destroy();
                        None
                    }
                }
            }
            Err(create_err) => {
                warn!(error = %create_err, "error view could not be created");
                None
            }
        };

        if let Some(view) = shown {
            let entry_path = self.entry_path(path);
            self.push_entry(&entry_path, &view);
            self.swap(&view, &entry_path, options).await;
        }
        Err(err)
    }

    /// Stack key for `path`: the route-resolved prefix when a view node matches, otherwise the
    /// path without query or fragment.
    fn entry_path(&self, path: &str) -> String {
        let location = Location::parse(path);
        let nodes = find_path(&self.0.routes, &location.path);
        match nodes.iter().position(|node| node.view.is_some()) {
            Some(index) => nodes[..=index].iter().map(|node| node.matched.as_str()).collect(),
            None => location.path,
        }
    }

    // ===== back =====

    /// Go back in history, optionally until `target` is reached.
    ///
    /// Resolves with the outcome of the navigation the pop triggers.
    pub fn back(&self, target: Option<&str>, options: OpenOptions) -> LocalBoxFuture<'static, NavigationResult> {
        let history = self.0.toolkit.history().clone();
        if !history.can_go_back() {
            return future::ready(Err(NavigationError::HistoryExhausted)).boxed_local();
        }

        let (reply, response) = oneshot::channel();
        let earlier = self.0.back_request.replace(Some(BackRequest {
            target: target.map(String::from),
            options,
            reply,
        }));
        if earlier.is_some() {
            debug!("replacing pending back request");
        }
        history.back();

        async move { response.await.unwrap_or(Err(NavigationError::Abandoned)) }.boxed_local()
    }

    fn handle_pop(&self, event: &HistoryEvent) {
        let path = event.location.relative();
        let request = self.0.back_request.borrow_mut().take();
        let mut options = OpenOptions {
            back: true,
            history: false,
            ..OpenOptions::default()
        };
        debug!(%path, reported_back = event.back, "history popped");

        let reply = match request {
            Some(request) => {
                if let Some(target) = request.target.as_deref() {
                    if target != event.location.path {
                        let history = self.0.toolkit.history().clone();
                        if history.can_go_back() {
                            *self.0.back_request.borrow_mut() = Some(request);
                            history.back();
                            return;
                        }
                        warn!(%target, "back target not found in history");
                        let _ = request.reply.send(Err(NavigationError::BackTargetMissing {
                            path: target.to_string(),
                        }));
                        self.spawn_navigation(path, options, None);
                        return;
                    }
                }
                options.reload = request.options.reload;
                options.transition = request.options.transition;
                Some(request.reply)
            }
            None => None,
        };
        self.spawn_navigation(path, options, reply);
    }

    fn spawn_navigation(&self, path: String, options: OpenOptions, reply: Option<oneshot::Sender<NavigationResult>>) {
        let navigation = self.open(&path, options);
        let task = async move {
            let result = navigation.await;
            if let Some(reply) = reply {
                let _ = reply.send(result);
            }
        };
        if let Err(err) = self.0.toolkit.spawner().spawn_local(task) {
            error!(%path, error = %err, "could not schedule pop navigation");
        }
    }
}

#[cfg(test)]
#[path = "viewport_tests.rs"]
mod tests;
