//! Demo site manifest.
//!
//! A site is a TOML file listing page views and the route tree that reaches them:
//!
//! ```toml
//! [[views]]
//! name = "home"
//! title = "Welcome"
//! data = "home"
//!
//! [[views]]
//! name = "item"
//! keep = "single"
//! data = "items/{id}"
//! includes = ["nav"]
//!
//! [[routes]]
//! path = "/"
//! view = "home"
//! ```
//!
//! Every view renders through the built-in `page` template; failed navigations render through
//! the built-in `error` template.

use crate::dom::{Document, NodeId};
use crate::error::{RegistryError, TemplateError};
use crate::registry::{Retention, ViewRegistry, ViewTypeSpec};
use crate::view::render::RenderContext;
use crate::view::ViewOptions;
use crate::viewport::{RouteDef, RouteNode};
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use thiserror::Error;
use tracing::debug;

pub const PAGE_TEMPLATE: &str = "page";
pub const ERROR_TEMPLATE: &str = "error";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SiteError {
    #[error("Failed to read site manifest at {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    #[error("Invalid site manifest {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// A route names a view the manifest never declares.
    #[error("route '{route}' names unknown view '{view}'")]
    UnknownRouteView { route: String, view: String },

    #[error("view '{view}' includes unknown view '{include}'")]
    UnknownInclude { view: String, include: String },

    #[error("view '{0}' is declared twice")]
    Duplicate(String),
}

/// One page view in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PageDef {
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub extends: Option<String>,
    #[serde(default)]
    pub keep: Option<Retention>,
    /// Data locator, may hold `{param}` placeholders.
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub includes: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SiteManifest {
    #[serde(default)]
    pub views: Vec<PageDef>,
    #[serde(default)]
    pub routes: Vec<RouteDef>,
}

impl SiteManifest {
    pub fn parse(source: &str, path: &Path) -> Result<Self, SiteError> {
        toml::from_str(source).map_err(|e| SiteError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    pub fn load(path: &Path) -> Result<Self, SiteError> {
        let source = std::fs::read_to_string(path).map_err(|e| SiteError::Read {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::parse(&source, path)
    }

    /// Check cross references: unique names, known includes, known route views.
    pub fn validate(&self) -> Result<(), SiteError> {
        let mut names = BTreeSet::new();
        for page in &self.views {
            if !names.insert(page.name.as_str()) {
                return Err(SiteError::Duplicate(page.name.clone()));
            }
        }
        for page in &self.views {
            if let Some(include) = page.includes.iter().find(|i| !names.contains(i.as_str())) {
                return Err(SiteError::UnknownInclude {
                    view: page.name.clone(),
                    include: include.clone(),
                });
            }
        }
        let mut pending: Vec<&RouteDef> = self.routes.iter().collect();
        while let Some(route) = pending.pop() {
            if let Some(view) = &route.view {
                if !names.contains(view.as_str()) {
                    return Err(SiteError::UnknownRouteView {
                        route: route.path.clone(),
                        view: view.clone(),
                    });
                }
            }
            pending.extend(route.routes.iter());
        }
        Ok(())
    }

    /// Register every page plus the built-in templates.
    ///
    /// Bases must be declared before the views that extend them.
    pub fn registry(&self) -> Result<ViewRegistry, SiteError> {
        self.validate()?;
        let pages: Rc<BTreeMap<String, PageDef>> = Rc::new(
            self.views
                .iter()
                .map(|page| (page.name.clone(), page.clone()))
                .collect(),
        );

        let mut registry = ViewRegistry::new();
        let lookup = pages.clone();
        registry.template(PAGE_TEMPLATE, move |ctx| render_page(ctx, &lookup));
        registry.template(ERROR_TEMPLATE, render_error);

        for page in &self.views {
            let mut spec = ViewTypeSpec::new(page.name.clone()).template(PAGE_TEMPLATE);
            if let Some(base) = &page.extends {
                spec = spec.extends(base.clone());
            }
            if let Some(keep) = page.keep {
                spec = spec.retention(keep);
            }
            if let Some(data) = &page.data {
                spec = spec.data(data.clone());
            }
            registry.define(spec)?;
        }
        debug!(views = self.views.len(), routes = self.routes.len(), "site registry built");
        Ok(registry)
    }

    pub fn route_nodes(&self) -> Vec<RouteNode> {
        self.routes.iter().cloned().map(RouteNode::from).collect()
    }
}

/// Render an array item or scalar as plain text.
fn plain(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn append_text(doc: &Document, parent: NodeId, tag: &str, class: &str, text: &str) {
    let node = doc.text_element(tag, text);
    doc.add_class(node, class);
    doc.append_child(parent, node);
}

fn render_page(
    ctx: &mut RenderContext<'_>,
    pages: &BTreeMap<String, PageDef>,
) -> Result<NodeId, TemplateError> {
    let name = ctx
        .view()
        .type_name()
        .ok_or_else(|| TemplateError::new("page template needs a view type"))?
        .to_string();
    let page = pages
        .get(&name)
        .ok_or_else(|| TemplateError::new(format!("no page named '{name}'")))?;

    let data = ctx.data().clone();
    let params = ctx.options().params.clone();
    let doc = ctx.document().clone();

    let root = doc.element("section", &["page"]);
    doc.add_class(root, &format!("page-{name}"));

    let title = data["title"]
        .as_str()
        .map(str::to_string)
        .or_else(|| page.title.clone())
        .unwrap_or_else(|| name.clone());
    append_text(&doc, root, "h1", "title", &title);

    if !params.is_empty() {
        let text = params
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join(" ");
        append_text(&doc, root, "p", "params", &text);
    }

    if let Some(body) = data["body"].as_str() {
        append_text(&doc, root, "p", "body", body);
    }

    if let Some(items) = data["items"].as_array() {
        let list = doc.element("ul", &["items"]);
        for item in items {
            let li = doc.text_element("li", &plain(item));
            doc.append_child(list, li);
        }
        doc.append_child(root, list);
    }

    for include in &page.includes {
        let anchor = ctx.include(include, ViewOptions::with_params(params.clone()));
        doc.append_child(root, anchor);
    }
    Ok(root)
}

fn render_error(ctx: &mut RenderContext<'_>) -> Result<NodeId, TemplateError> {
    let doc = ctx.document().clone();
    let (status, message) = match &ctx.options().error {
        Some(info) => (info.status, info.message.clone()),
        None => (500, "unknown error".to_string()),
    };
    let root = doc.element("section", &["page", "page-error"]);
    append_text(&doc, root, "h1", "status", &status.to_string());
    append_text(&doc, root, "p", "message", &message);
    Ok(root)
}
