//! Tests for the view lifecycle and nested includes.

use super::*;
use crate::clock::VirtualClock;
use crate::error::{LoadError, TemplateError};
use crate::history::MemoryHistory;
use crate::loader::StaticLoader;
use crate::registry::{ViewRegistry, ViewTypeSpec};
use crate::toolkit::{Services, Settings, Toolkit};
use futures::executor::LocalPool;
use serde_json::json;

// ===== Test Helpers =====

struct Fixture {
    toolkit: Toolkit,
    loader: Rc<StaticLoader>,
    pool: LocalPool,
}

impl Fixture {
    fn container(&self) -> NodeId {
        let doc = self.toolkit.document();
        let container = doc.create_element("main");
        doc.append_child(doc.body(), container);
        container
    }

    fn run<T>(&mut self, future: LocalBoxFuture<'static, T>) -> T {
        self.pool.run_until(future)
    }
}

fn title_template(ctx: &mut render::RenderContext<'_>) -> Result<NodeId, TemplateError> {
    let title = ctx.data()["title"].as_str().unwrap_or("untitled").to_string();
    Ok(ctx.document().text_element("h2", &title))
}

fn registry() -> ViewRegistry {
    let mut registry = ViewRegistry::new();
    registry.template("card", title_template);
    registry.template("parent", |ctx| {
        let doc = ctx.document().clone();
        let root = doc.element("section", &["parent"]);
        let left = ctx.include("left", ViewOptions::default());
        let right = ctx.include("right", ViewOptions::default());
        doc.append_child(root, left);
        doc.append_child(root, right);
        Ok(root)
    });
    registry.template("broken", |_| Err(TemplateError::new("no markup today")));
    registry
        .define(ViewTypeSpec::new("left").template("card").data("left"))
        .expect("left");
    registry
        .define(ViewTypeSpec::new("right").template("card").data("right"))
        .expect("right");
    registry
        .define(ViewTypeSpec::new("parent").template("parent"))
        .expect("parent");
    registry
        .define(ViewTypeSpec::new("item").template("card").data("items/{id}"))
        .expect("item");
    registry
}

fn fixture_with(registry: ViewRegistry) -> Fixture {
    let loader = Rc::new(StaticLoader::new());
    let pool = LocalPool::new();
    let toolkit = Toolkit::new(
        registry,
        Services {
            loader: loader.clone(),
            clock: Rc::new(VirtualClock::new()),
            history: Rc::new(MemoryHistory::new("https://example.test", "/")),
        },
        Settings::default(),
        pool.spawner(),
    );
    Fixture {
        toolkit,
        loader,
        pool,
    }
}

fn fixture() -> Fixture {
    fixture_with(registry())
}

fn item_options(id: &str) -> ViewOptions {
    ViewOptions::with_params(BTreeMap::from([("id".to_string(), id.to_string())]))
}

fn count_events(view: &View, event: ViewEvent) -> Rc<Cell<usize>> {
    let hits = Rc::new(Cell::new(0));
    let counter = hits.clone();
    let _ = view.on(event, move |_| counter.set(counter.get() + 1));
    hits
}

// ===== Construction =====

#[test]
fn construction_registers_and_destroy_evicts() {
    let fx = fixture();
    let view = fx.toolkit.create_view("item", item_options("1")).expect("create");
    assert_eq!(fx.toolkit.view(view.id()), Some(view.clone()));

    view.destroy();

    assert!(fx.toolkit.view(view.id()).is_none());
    assert!(view.is_destroyed());
}

#[test]
fn ids_are_unique() {
    let fx = fixture();
    let a = fx.toolkit.create_view("item", item_options("1")).expect("a");
    let b = fx.toolkit.create_view("item", item_options("1")).expect("b");
    assert_ne!(a.id(), b.id());
}

#[test]
fn anonymous_view_uses_template_name() {
    let fx = fixture();
    let view = fx.toolkit.create_view("card", ViewOptions::default()).expect("create");
    assert_eq!(view.type_name(), None);
    assert_eq!(view.template(), Some("card"));
}

// ===== include =====

#[test]
fn include_loads_renders_and_attaches() {
    let mut fx = fixture();
    fx.loader.insert("items/7", json!({"title": "Seven"}));
    let container = fx.container();
    let view = fx.toolkit.create_view("item", item_options("7")).expect("create");
    let attached = count_events(&view, ViewEvent::Attached);

    let root = fx
        .run(view.include(Placement::Append(container), IncludeOptions::default()))
        .expect("include");

    let doc = fx.toolkit.document();
    assert_eq!(doc.parent(root), Some(container));
    assert_eq!(doc.text_content(root), "Seven");
    assert_eq!(view.data(), json!({"title": "Seven"}));
    assert_eq!(attached.get(), 1);
    assert_eq!(fx.loader.requests(), vec!["items/7"]);
}

#[test]
fn include_hidden_sets_hidden_flag() {
    let mut fx = fixture();
    let container = fx.container();
    let view = fx
        .toolkit
        .create_view("card", ViewOptions::with_data(json!({"title": "x"})))
        .expect("create");

    let root = fx
        .run(view.include(Placement::Append(container), IncludeOptions { hidden: true }))
        .expect("include");

    assert!(fx.toolkit.document().is_hidden(root));
    assert_eq!(fx.loader.request_count("card"), 0, "pre-supplied data skips the loader");
}

#[test]
fn include_of_rendered_view_reattaches_and_restores_scroll() {
    let mut fx = fixture();
    fx.loader.insert("items/1", json!({"title": "One"}));
    let container = fx.container();
    let view = fx.toolkit.create_view("item", item_options("1")).expect("create");
    let root = fx
        .run(view.include(Placement::Append(container), IncludeOptions::default()))
        .expect("include");
    let doc = fx.toolkit.document().clone();
    doc.set_scroll(root, ScrollOffset::new(0, 120));

    view.remove();
    doc.set_scroll(root, ScrollOffset::default());
    assert!(!view.is_attached());

    let again = fx
        .run(view.include(Placement::Append(container), IncludeOptions::default()))
        .expect("reattach");

    assert_eq!(again, root);
    assert_eq!(doc.scroll(root), ScrollOffset::new(0, 120));
    assert_eq!(fx.loader.request_count("items/1"), 1, "no second load");
}

#[test]
fn load_failure_does_not_attach() {
    let mut fx = fixture();
    fx.loader.set_online(false);
    let container = fx.container();
    let view = fx.toolkit.create_view("item", item_options("1")).expect("create");

    let result = fx.run(view.include(Placement::Append(container), IncludeOptions::default()));

    assert_eq!(
        result,
        Err(ViewError::Load(LoadError::Offline {
            url: "items/1".to_string()
        }))
    );
    assert_eq!(view.root(), None);
    assert!(fx.toolkit.document().children(container).is_empty());
}

#[test]
fn template_error_is_reported() {
    let mut fx = fixture();
    let container = fx.container();
    let view = fx.toolkit.create_view("broken", ViewOptions::default()).expect("create");

    let result = fx.run(view.include(Placement::Append(container), IncludeOptions::default()));

    assert!(matches!(
        result,
        Err(ViewError::Render(RenderError::Template { ref template, .. })) if template == "broken"
    ));
}

#[test]
fn destroyed_view_cannot_be_included() {
    let mut fx = fixture();
    let container = fx.container();
    let view = fx.toolkit.create_view("card", ViewOptions::default()).expect("create");
    view.destroy();

    let result = fx.run(view.include(Placement::Append(container), IncludeOptions::default()));

    assert_eq!(result, Err(ViewError::Destroyed { id: view.id() }));
}

// ===== nested includes =====

#[test]
fn children_replace_their_anchors() {
    let mut fx = fixture();
    fx.loader.insert("left", json!({"title": "L"}));
    fx.loader.insert("right", json!({"title": "R"}));
    let container = fx.container();
    let parent = fx.toolkit.create_view("parent", ViewOptions::default()).expect("create");

    let root = fx
        .run(parent.include(Placement::Append(container), IncludeOptions::default()))
        .expect("include");

    let doc = fx.toolkit.document();
    assert_eq!(doc.text_content(root), "LR");
    assert!(doc.find(root, |d, id| d.tag(id).as_deref() == Some(render::ANCHOR_TAG)).is_none());
    let children = parent.children();
    assert_eq!(children.len(), 2);
    assert!(children.iter().all(|child| child.parent() == Some(parent.clone())));
}

#[test]
fn failing_child_is_named_and_partial_root_kept() {
    let mut fx = fixture();
    fx.loader.insert("left", json!({"title": "L"}));
    let container = fx.container();
    let parent = fx.toolkit.create_view("parent", ViewOptions::default()).expect("create");

    let result = fx.run(parent.include(Placement::Append(container), IncludeOptions::default()));

    let Err(ViewError::Render(RenderError::Includes { root, failures, .. })) = result.clone() else {
        panic!("expected include failure, got {result:?}");
    };
    assert_eq!(parent.root(), Some(root), "partial root is stored");
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].name, "right");
    assert!(failures[0].to_string().contains("'right'"));

    let doc = fx.toolkit.document();
    assert_eq!(doc.text_content(root), "L", "successful sibling is attached");
    assert_eq!(parent.children().len(), 1, "failed child is dropped");
}

#[test]
fn unknown_include_is_reported_as_failure() {
    let mut registry = registry();
    registry.template("lonely", |ctx| {
        let root = ctx.document().create_element("div");
        let anchor = ctx.include("nobody", ViewOptions::default());
        ctx.document().append_child(root, anchor);
        Ok(root)
    });
    let mut fx = fixture_with(registry);
    let container = fx.container();
    let view = fx.toolkit.create_view("lonely", ViewOptions::default()).expect("create");

    let result = fx.run(view.include(Placement::Append(container), IncludeOptions::default()));

    let Err(ViewError::Render(RenderError::Includes { failures, .. })) = result.clone() else {
        panic!("expected include failure, got {result:?}");
    };
    assert_eq!(
        *failures[0].error,
        ViewError::Render(RenderError::UnknownView {
            name: "nobody".to_string()
        })
    );
}

// ===== reload =====

#[test]
fn reload_before_render_fails() {
    let mut fx = fixture();
    let view = fx.toolkit.create_view("item", item_options("1")).expect("create");
    assert_eq!(
        fx.run(view.reload(None)),
        Err(ViewError::NotRendered { id: view.id() })
    );
}

#[test]
fn reload_replaces_root_in_place_and_destroys_old_children() {
    let mut fx = fixture();
    fx.loader.insert("left", json!({"title": "L"}));
    fx.loader.insert("right", json!({"title": "R"}));
    let container = fx.container();
    let doc = fx.toolkit.document().clone();
    let before = doc.create_element("header");
    doc.append_child(container, before);
    let parent = fx.toolkit.create_view("parent", ViewOptions::default()).expect("create");
    let old_root = fx
        .run(parent.include(Placement::Append(container), IncludeOptions::default()))
        .expect("include");
    let after = doc.create_element("footer");
    doc.append_child(container, after);
    let old_children = parent.children();

    fx.loader.insert("left", json!({"title": "L2"}));
    let new_root = fx.run(parent.reload(None)).expect("reload");

    assert_ne!(new_root, old_root);
    assert_eq!(doc.children(container), vec![before, new_root, after]);
    assert_eq!(doc.text_content(new_root), "L2R");
    assert!(old_children.iter().all(View::is_destroyed));
    assert_eq!(parent.children().len(), 2);
}

#[test]
fn on_loaded_runs_after_every_load() {
    let loads = Rc::new(Cell::new(0));
    let counter = loads.clone();
    let mut registry = registry();
    registry
        .define(
            ViewTypeSpec::new("counted")
                .template("card")
                .data("counted")
                .on_loaded(move |_, _| counter.set(counter.get() + 1)),
        )
        .expect("counted");
    let mut fx = fixture_with(registry);
    fx.loader.insert("counted", json!({"title": "C"}));
    let container = fx.container();
    let view = fx.toolkit.create_view("counted", ViewOptions::default()).expect("create");

    fx.run(view.include(Placement::Append(container), IncludeOptions::default()))
        .expect("include");
    fx.run(view.reload(None)).expect("reload");

    assert_eq!(loads.get(), 2);
}

// ===== toggle / remove / destroy =====

#[test]
fn toggle_emits_shown_and_hidden() {
    let mut fx = fixture();
    let container = fx.container();
    let view = fx
        .toolkit
        .create_view("card", ViewOptions::with_data(json!({"title": "t"})))
        .expect("create");
    let root = fx
        .run(view.include(Placement::Append(container), IncludeOptions { hidden: true }))
        .expect("include");
    let shown = count_events(&view, ViewEvent::Shown);
    let hidden = count_events(&view, ViewEvent::Hidden);

    fx.run(view.toggle(true, ToggleOptions::default())).expect("show");
    assert!(!fx.toolkit.document().is_hidden(root));
    fx.run(view.toggle(false, ToggleOptions::default())).expect("hide");
    assert!(fx.toolkit.document().is_hidden(root));

    assert_eq!((shown.get(), hidden.get()), (1, 1));
}

#[test]
fn toggle_before_render_fails() {
    let mut fx = fixture();
    let view = fx.toolkit.create_view("card", ViewOptions::default()).expect("create");
    assert_eq!(
        fx.run(view.toggle(true, ToggleOptions::default())),
        Err(ViewError::NotRendered { id: view.id() })
    );
}

#[test]
fn remove_keeps_root_for_reattachment() {
    let mut fx = fixture();
    let container = fx.container();
    let view = fx
        .toolkit
        .create_view("card", ViewOptions::with_data(json!({})))
        .expect("create");
    fx.run(view.include(Placement::Append(container), IncludeOptions::default()))
        .expect("include");
    let removed = count_events(&view, ViewEvent::Removed);

    view.remove();
    view.remove();

    assert!(view.root().is_some());
    assert!(!view.is_attached());
    assert_eq!(removed.get(), 1, "removing a detached view is a no-op");
}

#[test]
fn destroy_cascades_and_fires_once() {
    let mut fx = fixture();
    fx.loader.insert("left", json!({"title": "L"}));
    fx.loader.insert("right", json!({"title": "R"}));
    let container = fx.container();
    let parent = fx.toolkit.create_view("parent", ViewOptions::default()).expect("create");
    fx.run(parent.include(Placement::Append(container), IncludeOptions::default()))
        .expect("include");
    let children = parent.children();
    let destroyed = count_events(&parent, ViewEvent::Destroyed);

    parent.destroy();
    parent.destroy();

    assert_eq!(destroyed.get(), 1);
    assert_eq!(parent.root(), None);
    assert!(children.iter().all(|child| fx.toolkit.view(child.id()).is_none()));
    assert!(fx.toolkit.document().children(container).is_empty());
}
