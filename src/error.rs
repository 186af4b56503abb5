//! Error types for viewkit.
//!
//! Errors are split by the stage that produced them, using `thiserror` so they compose via `?`
//! and `From` conversions.
//!
//! # Error Hierarchy
//!
//! - [`NavigationError`] - outcome of a failed `Viewport::open`/`back`
//!   - [`ViewError`] - a single view failed to load, render or attach
//!     - [`LoadError`] - data fetch failed (offline, non-2xx, timeout, bad payload)
//!     - [`RenderError`] - template missing/failed, or nested includes failed
//! - [`RegistryError`] - invalid view type definitions
//! - [`HandlerError`] - a route side-effect handler reported a failure
//!
//! # Recovery Strategy
//!
//! Load and render failures abort only the view being constructed. The viewport destroys the
//! partially built view and falls back to the registered error view, if any. Handler failures
//! are logged and navigation continues.

use crate::dom::NodeId;
use crate::view::ViewId;
use thiserror::Error;

/// Data loading failures reported by a [`Loader`](crate::loader::Loader).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// Connectivity is down; reported before any request is attempted.
    #[error("offline: cannot load {url}")]
    Offline {
        /// Requested locator.
        url: String,
    },

    /// The source answered with a non-success status.
    #[error("{url} returned status {status}")]
    Status {
        /// Requested locator.
        url: String,
        /// HTTP-equivalent status code.
        status: u16,
    },

    /// The request did not complete in time.
    #[error("timed out loading {url}")]
    Timeout {
        /// Requested locator.
        url: String,
    },

    /// The payload could not be decoded.
    #[error("invalid data at {url}: {reason}")]
    Decode {
        /// Requested locator.
        url: String,
        /// Decoder message.
        reason: String,
    },
}

impl LoadError {
    /// HTTP-equivalent status for display purposes.
    pub fn status(&self) -> u16 {
        match self {
            LoadError::Offline { .. } => 503,
            LoadError::Status { status, .. } => *status,
            LoadError::Timeout { .. } => 504,
            LoadError::Decode { .. } => 500,
        }
    }
}

/// A child view that failed while being included into its parent.
#[derive(Debug, Clone, PartialEq)]
pub struct IncludeFailure {
    /// View type or template name the template asked for.
    pub name: String,
    /// What went wrong with the child.
    pub error: Box<ViewError>,
}

impl std::fmt::Display for IncludeFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "could not include view '{}': {}", self.name, self.error)
    }
}

/// Template rendering failures.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RenderError {
    /// The view has no template associated with it.
    #[error("view {view} has no template")]
    NoTemplate {
        /// View that was asked to render.
        view: ViewId,
    },

    /// No template is registered under the name.
    #[error("template '{template}' is not registered")]
    TemplateMissing {
        /// Template name.
        template: String,
    },

    /// The template function returned an error.
    #[error("template '{template}' failed: {reason}")]
    Template {
        /// Template name.
        template: String,
        /// Message produced by the template.
        reason: String,
    },

    /// Neither a view type nor a template is registered under the name.
    #[error("no view type or template named '{name}'")]
    UnknownView {
        /// Requested name.
        name: String,
    },

    /// One or more nested includes failed.
    ///
    /// `root` is the partially built root; siblings that succeeded are attached to it.
    #[error("{} include(s) failed in '{template}': {}", .failures.len(), join_failures(.failures))]
    Includes {
        /// Template of the parent view.
        template: String,
        /// Partially built root element.
        root: NodeId,
        /// Every failed child, in anchor order.
        failures: Vec<IncludeFailure>,
    },
}

fn join_failures(failures: &[IncludeFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Failures of a single view's lifecycle operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ViewError {
    /// Data loading failed.
    #[error("load failed: {0}")]
    Load(#[from] LoadError),

    /// Rendering failed.
    #[error("render failed: {0}")]
    Render(#[from] RenderError),

    /// The operation needs a rendered view.
    #[error("view {id} has not been rendered")]
    NotRendered {
        /// View id.
        id: ViewId,
    },

    /// The view was destroyed while the operation was in flight.
    #[error("view {id} was destroyed")]
    Destroyed {
        /// View id.
        id: ViewId,
    },
}

impl ViewError {
    /// HTTP-equivalent status for display purposes.
    pub fn status(&self) -> u16 {
        match self {
            ViewError::Load(err) => err.status(),
            _ => 500,
        }
    }
}

/// Failures reported by viewport navigation.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum NavigationError {
    /// No route node carrying a view matched the path.
    #[error("no view found for '{path}'")]
    NotFound {
        /// Requested path.
        path: String,
    },

    /// The target view failed to load or render.
    #[error("failed to open '{path}': {source}")]
    View {
        /// Requested path.
        path: String,
        /// Underlying view failure.
        #[source]
        source: ViewError,
    },

    /// A later navigation started before this one completed.
    #[error("navigation to '{path}' was superseded")]
    Superseded {
        /// Path of the discarded navigation.
        path: String,
    },

    /// There is no earlier history entry to go back to.
    #[error("no earlier history entry")]
    HistoryExhausted,

    /// A requested back target was never reached.
    #[error("history has no entry for '{path}'")]
    BackTargetMissing {
        /// Requested back target.
        path: String,
    },

    /// The pending back request was dropped before a navigation happened.
    #[error("back navigation was abandoned")]
    Abandoned,
}

impl NavigationError {
    /// HTTP-equivalent status shown by the error view.
    pub fn status(&self) -> u16 {
        match self {
            NavigationError::NotFound { .. } | NavigationError::BackTargetMissing { .. } => 404,
            NavigationError::View { source, .. } => source.status(),
            _ => 500,
        }
    }
}

/// Invalid view type registration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The base type must be registered before a derived type names it.
    #[error("view type '{name}' extends unknown type '{base}'")]
    UnknownBase {
        /// Derived type name.
        name: String,
        /// Missing base.
        base: String,
    },

    /// View type names must be non-empty.
    #[error("view type name must not be empty")]
    EmptyName,
}

/// A route side-effect handler failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("route handler failed: {0}")]
pub struct HandlerError(pub String);

/// Failure reported by a template function.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct TemplateError(pub String);

impl TemplateError {
    /// Build from anything displayable.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}
