//! Route tree definitions and depth-first path resolution.

use super::pattern::{compile, PathMatcher, PatternError};
use crate::error::HandlerError;
use serde::Deserialize;
use std::cell::OnceCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use tracing::warn;

/// Side effect run with the accumulated params when a route resolves.
pub type RouteHandler = Rc<dyn Fn(&BTreeMap<String, String>) -> Result<(), HandlerError>>;

/// Serializable route definition, as found in a site manifest.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouteDef {
    pub path: String,
    #[serde(default)]
    pub view: Option<String>,
    #[serde(default)]
    pub routes: Vec<RouteDef>,
}

struct Compiled {
    matcher: Result<PathMatcher, PatternError>,
    terminal: bool,
}

/// A node of the route tree.
pub struct RouteNode {
    path: String,
    view: Option<String>,
    handler: Option<RouteHandler>,
    routes: Vec<RouteNode>,
    compiled: OnceCell<Compiled>,
}

impl fmt::Debug for RouteNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteNode")
            .field("path", &self.path)
            .field("view", &self.view)
            .field("handler", &self.handler.is_some())
            .field("routes", &self.routes)
            .finish()
    }
}

impl RouteNode {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            view: None,
            handler: None,
            routes: Vec::new(),
            compiled: OnceCell::new(),
        }
    }

    pub fn view(mut self, name: impl Into<String>) -> Self {
        self.view = Some(name.into());
        self
    }

    pub fn handler(
        mut self,
        handler: impl Fn(&BTreeMap<String, String>) -> Result<(), HandlerError> + 'static,
    ) -> Self {
        self.handler = Some(Rc::new(handler));
        self
    }

    pub fn route(mut self, child: RouteNode) -> Self {
        self.routes.push(child);
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn view_name(&self) -> Option<&str> {
        self.view.as_deref()
    }

    pub fn children(&self) -> &[RouteNode] {
        &self.routes
    }

    fn compiled(&self) -> &Compiled {
        self.compiled.get_or_init(|| {
            let terminal = self.routes.is_empty();
            let matcher = compile(&self.path, terminal);
            if let Err(err) = &matcher {
                warn!(path = %self.path, error = %err, "route pattern is invalid");
            }
            Compiled { matcher, terminal }
        })
    }

    /// A node without children must match the whole remaining path.
    pub fn is_terminal(&self) -> bool {
        self.compiled().terminal
    }

    /// The compiled matcher; invalid patterns never match.
    pub fn matcher(&self) -> Option<&PathMatcher> {
        self.compiled().matcher.as_ref().ok()
    }
}

impl From<RouteDef> for RouteNode {
    fn from(def: RouteDef) -> Self {
        let mut node = RouteNode::new(def.path);
        node.view = def.view;
        node.routes = def.routes.into_iter().map(RouteNode::from).collect();
        node
    }
}

/// One matched level of a route tree.
#[derive(Clone)]
pub struct PathNode {
    pub matched: String,
    pub params: BTreeMap<String, String>,
    pub rest: Option<String>,
    pub view: Option<String>,
    pub handler: Option<RouteHandler>,
}

impl fmt::Debug for PathNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathNode")
            .field("matched", &self.matched)
            .field("params", &self.params)
            .field("rest", &self.rest)
            .field("view", &self.view)
            .field("handler", &self.handler.is_some())
            .finish()
    }
}

/// Resolve `path` against `routes`, outermost match first.
///
/// At each level the first matching sibling wins; a non-terminal match hands its remainder to
/// its children. Resolution stops at a terminal node or when no child matches.
pub fn find_path(routes: &[RouteNode], path: &str) -> Vec<PathNode> {
    let mut found = Vec::new();
    let mut level = routes;
    let mut remaining = path.to_string();

    loop {
        let hit = level.iter().find_map(|node| {
            node.matcher()
                .and_then(|matcher| matcher.matches(&remaining))
                .map(|matched| (node, matched))
        });
        let Some((node, matched)) = hit else {
            break;
        };

        found.push(PathNode {
            matched: matched.matched,
            params: matched.params,
            rest: matched.rest.clone(),
            view: node.view.clone(),
            handler: node.handler.clone(),
        });
        if node.is_terminal() {
            break;
        }
        level = &node.routes;
        remaining = matched.rest.unwrap_or_default();
    }
    found
}
