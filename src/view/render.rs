//! Template rendering and nested view includes.

use super::{IncludeOptions, Placement, View, ViewOptions};
use crate::dom::{Document, NodeId};
use crate::error::{IncludeFailure, RenderError, ViewError};
use futures::future::join_all;
use serde_json::Value;
use tracing::{debug, warn};

/// Tag of the placeholder element reserved for an included view.
pub const ANCHOR_TAG: &str = "view-anchor";

struct PendingInclude {
    name: String,
    anchor: NodeId,
    child: Result<View, RenderError>,
}

/// What a template function gets to work with.
pub struct RenderContext<'a> {
    view: &'a View,
    document: Document,
    data: &'a Value,
    options: &'a ViewOptions,
    pending: Vec<PendingInclude>,
}

impl<'a> RenderContext<'a> {
    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn view(&self) -> &View {
        self.view
    }

    pub fn data(&self) -> &Value {
        self.data
    }

    pub fn options(&self) -> &ViewOptions {
        self.options
    }

    /// Reserve a spot for a child view and return its placeholder element.
    ///
    /// The child is created now and loaded once the template returns. `name` is a view-type
    /// name or, for an anonymous child, a template name.
    pub fn include(&mut self, name: &str, options: ViewOptions) -> NodeId {
        let anchor = self.document.create_element(ANCHOR_TAG);
        self.document.set_attribute(anchor, "data-view", name);

        let child = match self.view.instances() {
            Some(instances) => View::new(self.view.runtime(), &instances, name, options, Some(self.view)),
            None => Err(RenderError::UnknownView {
                name: name.to_string(),
            }),
        };
        if let Ok(child) = &child {
            self.view.add_child(child.clone());
        }
        self.pending.push(PendingInclude {
            name: name.to_string(),
            anchor,
            child,
        });
        anchor
    }
}

impl View {
    /// Run the template, then resolve every queued include concurrently.
    pub(crate) async fn render(&self) -> Result<NodeId, RenderError> {
        let template = self
            .template()
            .map(String::from)
            .ok_or(RenderError::NoTemplate { view: self.id() })?;
        let render_fn = self
            .runtime()
            .registry
            .template_fn(&template)
            .ok_or_else(|| RenderError::TemplateMissing {
                template: template.clone(),
            })?;

        let data = self.data();
        let options = self.options();
        let (root, pending) = {
            let mut ctx = RenderContext {
                view: self,
                document: self.runtime().document.clone(),
                data: &data,
                options: &options,
                pending: Vec::new(),
            };
            let rendered = render_fn(&mut ctx);
            (rendered, ctx.pending)
        };
        let root = match root {
            Ok(root) => root,
            Err(err) => {
                for include in pending {
                    if let Ok(child) = include.child {
                        self.drop_child(&child);
                        child.destroy();
                    }
                }
                return Err(RenderError::Template {
                    template,
                    reason: err.to_string(),
                });
            }
        };
        debug!(id = %self.id(), %template, includes = pending.len(), "template rendered");

        let includes = pending.into_iter().map(|include| async move {
            let outcome = match &include.child {
                Ok(child) => child
                    .include(Placement::Replace(include.anchor), IncludeOptions::default())
                    .await
                    .map(|_| ()),
                Err(err) => Err(ViewError::Render(err.clone())),
            };
            (include, outcome)
        });

        let mut failures = Vec::new();
        for (include, outcome) in join_all(includes).await {
            let Err(error) = outcome else {
                continue;
            };
            warn!(id = %self.id(), child = %include.name, %error, "include failed");
            if let Ok(child) = &include.child {
                self.drop_child(child);
                child.destroy();
            }
            failures.push(IncludeFailure {
                name: include.name,
                error: Box::new(error),
            });
        }

        if failures.is_empty() {
            Ok(root)
        } else {
            Err(RenderError::Includes {
                template,
                root,
                failures,
            })
        }
    }
}
