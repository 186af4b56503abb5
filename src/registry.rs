//! View-type and template registries.
//!
//! A view type is declared as a [`ViewTypeSpec`]: an optional base name plus an override set.
//! Registration resolves a type declaration against the already registered base into a concrete
//! [`ViewType`], so lookups never walk an inheritance chain.

use crate::error::{NavigationError, RegistryError, TemplateError};
use crate::dom::NodeId;
use crate::view::render::RenderContext;
use crate::view::View;
use crate::viewport::OpenOptions;
use futures::future::LocalBoxFuture;
use serde::de::{self, Deserializer};
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;
use tracing::debug;

/// Produces a view's root element.
pub type TemplateFn = Rc<dyn Fn(&mut RenderContext<'_>) -> Result<NodeId, TemplateError>>;

/// Runs after every successful data load.
pub type LoadedHook = Rc<dyn Fn(&View, &Value)>;

/// Nested routing: receives the unresolved remainder of a path.
pub type RouteHook =
    Rc<dyn Fn(View, String, OpenOptions) -> LocalBoxFuture<'static, Result<(), NavigationError>>>;

// ===== Retention =====

/// How many inactive instances of a view type a viewport keeps cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retention {
    /// Keep no inactive instance.
    None,
    /// Keep one inactive instance.
    Single,
    /// Never evict.
    Multiple,
    /// Keep this many inactive instances.
    Count(usize),
}

impl Retention {
    /// Parse a policy name or count. Anything unrecognised keeps one instance.
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "none" | "keep-none" => Retention::None,
            "single" | "keep-single" => Retention::Single,
            "multiple" | "keep-multiple" => Retention::Multiple,
            other => match other.parse::<usize>() {
                Ok(count) => Retention::Count(count),
                Err(_) => {
                    debug!(policy = other, "unparsable retention policy, keeping one instance");
                    Retention::Count(1)
                }
            },
        }
    }

    /// Instances to keep, or `None` when eviction never happens.
    pub fn keep(self) -> Option<usize> {
        match self {
            Retention::None => Some(0),
            Retention::Single => Some(1),
            Retention::Multiple => None,
            Retention::Count(count) => Some(count),
        }
    }
}

impl<'de> Deserialize<'de> for Retention {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Count(i64),
            Name(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Count(count) => usize::try_from(count)
                .map(Retention::Count)
                .map_err(|_| de::Error::custom(format!("retention count must be >= 0, got {count}"))),
            Raw::Name(name) => Ok(Retention::parse(&name)),
        }
    }
}

// ===== DataSource =====

/// Where a view's data comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSource {
    /// Locator passed to the loader. `{name}` placeholders are filled from route params.
    Url(String),
}

impl DataSource {
    /// Resolve placeholders against `params`. Unknown placeholders are left as-is.
    pub fn resolve(&self, params: &BTreeMap<String, String>) -> String {
        match self {
            DataSource::Url(template) => {
                let mut url = template.clone();
                for (key, value) in params {
                    url = url.replace(&format!("{{{key}}}"), value);
                }
                url
            }
        }
    }
}

// ===== ViewTypeSpec =====

/// Declaration of a view type: optional base plus the behaviour it overrides.
#[derive(Clone, Default)]
pub struct ViewTypeSpec {
    pub name: String,
    pub extends: Option<String>,
    pub template: Option<String>,
    pub retention: Option<Retention>,
    pub data: Option<DataSource>,
    pub on_loaded: Option<LoadedHook>,
    pub route: Option<RouteHook>,
}

impl ViewTypeSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn extends(mut self, base: impl Into<String>) -> Self {
        self.extends = Some(base.into());
        self
    }

    pub fn template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    pub fn retention(mut self, retention: Retention) -> Self {
        self.retention = Some(retention);
        self
    }

    pub fn data(mut self, url: impl Into<String>) -> Self {
        self.data = Some(DataSource::Url(url.into()));
        self
    }

    pub fn on_loaded(mut self, hook: impl Fn(&View, &Value) + 'static) -> Self {
        self.on_loaded = Some(Rc::new(hook));
        self
    }

    pub fn route(
        mut self,
        hook: impl Fn(View, String, OpenOptions) -> LocalBoxFuture<'static, Result<(), NavigationError>>
            + 'static,
    ) -> Self {
        self.route = Some(Rc::new(hook));
        self
    }
}

// ===== ViewType =====

/// A resolved view type.
#[derive(Clone)]
pub struct ViewType {
    name: String,
    /// This type followed by its bases, nearest first.
    lineage: Vec<String>,
    template: Option<String>,
    retention: Option<Retention>,
    data: Option<DataSource>,
    on_loaded: Option<LoadedHook>,
    route: Option<RouteHook>,
}

impl fmt::Debug for ViewType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewType")
            .field("name", &self.name)
            .field("lineage", &self.lineage)
            .field("template", &self.template)
            .field("retention", &self.retention)
            .field("data", &self.data)
            .field("on_loaded", &self.on_loaded.is_some())
            .field("route", &self.route.is_some())
            .finish()
    }
}

impl ViewType {
    fn resolve(spec: ViewTypeSpec, base: Option<&ViewType>) -> Self {
        let mut lineage = vec![spec.name.clone()];
        if let Some(base) = base {
            lineage.extend(base.lineage.iter().cloned());
        }
        Self {
            name: spec.name,
            lineage,
            template: spec.template.or_else(|| base.and_then(|b| b.template.clone())),
            retention: spec.retention.or_else(|| base.and_then(|b| b.retention)),
            data: spec.data.or_else(|| base.and_then(|b| b.data.clone())),
            on_loaded: spec.on_loaded.or_else(|| base.and_then(|b| b.on_loaded.clone())),
            route: spec.route.or_else(|| base.and_then(|b| b.route.clone())),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn template(&self) -> Option<&str> {
        self.template.as_deref()
    }

    pub fn retention(&self) -> Option<Retention> {
        self.retention
    }

    pub fn data(&self) -> Option<&DataSource> {
        self.data.as_ref()
    }

    pub fn on_loaded(&self) -> Option<&LoadedHook> {
        self.on_loaded.as_ref()
    }

    pub fn route(&self) -> Option<&RouteHook> {
        self.route.as_ref()
    }

    /// True when this type is `name` or derives from it.
    pub fn is_a(&self, name: &str) -> bool {
        self.lineage.iter().any(|ancestor| ancestor == name)
    }
}

// ===== ViewRegistry =====

/// Name → view type and name → template lookups.
#[derive(Default, Clone)]
pub struct ViewRegistry {
    types: HashMap<String, Rc<ViewType>>,
    templates: HashMap<String, TemplateFn>,
}

impl fmt::Debug for ViewRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<_> = self.types.keys().collect();
        types.sort();
        let mut templates: Vec<_> = self.templates.keys().collect();
        templates.sort();
        f.debug_struct("ViewRegistry")
            .field("types", &types)
            .field("templates", &templates)
            .finish()
    }
}

impl ViewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a view type, resolving it against its base.
    ///
    /// Redefining a name replaces the earlier type; types already derived from it keep the
    /// behaviour they were resolved with.
    pub fn define(&mut self, spec: ViewTypeSpec) -> Result<Rc<ViewType>, RegistryError> {
        if spec.name.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        let base = match &spec.extends {
            Some(base) => Some(self.types.get(base).cloned().ok_or_else(|| {
                RegistryError::UnknownBase {
                    name: spec.name.clone(),
                    base: base.clone(),
                }
            })?),
            None => None,
        };

        let resolved = Rc::new(ViewType::resolve(spec, base.as_deref()));
        debug!(name = resolved.name(), lineage = ?resolved.lineage, "view type defined");
        self.types
            .insert(resolved.name.clone(), resolved.clone());
        Ok(resolved)
    }

    /// Register a template function.
    pub fn template(
        &mut self,
        name: impl Into<String>,
        template: impl Fn(&mut RenderContext<'_>) -> Result<NodeId, TemplateError> + 'static,
    ) {
        self.templates.insert(name.into(), Rc::new(template));
    }

    pub fn view_type(&self, name: &str) -> Option<Rc<ViewType>> {
        self.types.get(name).cloned()
    }

    pub fn template_fn(&self, name: &str) -> Option<TemplateFn> {
        self.templates.get(name).cloned()
    }

    pub fn has_template(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }
}
