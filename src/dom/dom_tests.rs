//! Tests for the headless document.

use super::*;

#[test]
fn new_document_has_connected_body() {
    let doc = Document::new();
    let body = doc.body();
    assert_eq!(doc.tag(body).as_deref(), Some("body"));
    assert!(doc.is_connected(body));
}

#[test]
fn append_child_moves_node_between_parents() {
    let doc = Document::new();
    let a = doc.create_element("div");
    let b = doc.create_element("div");
    let child = doc.create_element("span");

    doc.append_child(a, child);
    doc.append_child(b, child);

    assert!(doc.children(a).is_empty());
    assert_eq!(doc.children(b), vec![child]);
    assert_eq!(doc.parent(child), Some(b));
}

#[test]
fn append_child_refuses_cycles() {
    let doc = Document::new();
    let outer = doc.create_element("div");
    let inner = doc.create_element("div");
    doc.append_child(outer, inner);

    doc.append_child(inner, outer);

    assert_eq!(doc.parent(outer), None);
    assert_eq!(doc.parent(inner), Some(outer));
}

#[test]
fn replace_keeps_position_among_siblings() {
    let doc = Document::new();
    let list = doc.create_element("ul");
    let first = doc.create_element("li");
    let middle = doc.create_element("li");
    let last = doc.create_element("li");
    for item in [first, middle, last] {
        doc.append_child(list, item);
    }

    let replacement = doc.create_element("li");
    doc.replace(middle, replacement);

    assert_eq!(doc.children(list), vec![first, replacement, last]);
    assert_eq!(doc.parent(middle), None);
}

#[test]
fn replace_of_detached_node_is_a_no_op() {
    let doc = Document::new();
    let loose = doc.create_element("div");
    let other = doc.create_element("div");

    doc.replace(loose, other);

    assert_eq!(doc.parent(other), None);
}

#[test]
fn detached_subtree_is_not_connected() {
    let doc = Document::new();
    let section = doc.create_element("section");
    let heading = doc.create_element("h1");
    doc.append_child(doc.body(), section);
    doc.append_child(section, heading);
    assert!(doc.is_connected(heading));

    doc.detach(section);

    assert!(!doc.is_connected(heading));
    assert_eq!(doc.parent(heading), Some(section));
}

#[test]
fn classes_are_deduplicated() {
    let doc = Document::new();
    let div = doc.element("div", &["a"]);
    doc.add_class(div, "a");
    doc.add_class(div, "b");
    doc.remove_class(div, "a");

    assert!(!doc.has_class(div, "a"));
    assert!(doc.has_class(div, "b"));
}

#[test]
fn hidden_flag_round_trips_through_attribute() {
    let doc = Document::new();
    let div = doc.create_element("div");
    doc.set_hidden(div, true);
    assert!(doc.is_hidden(div));
    doc.set_hidden(div, false);
    assert!(!doc.is_hidden(div));
}

#[test]
fn text_content_concatenates_subtree() {
    let doc = Document::new();
    let p = doc.text_element("p", "hello ");
    let em = doc.text_element("em", "world");
    doc.append_child(p, em);

    assert_eq!(doc.text_content(p), "hello world");
}

#[test]
fn find_by_class_searches_depth_first() {
    let doc = Document::new();
    let root = doc.create_element("div");
    let nested = doc.element("div", &["target"]);
    let wrapper = doc.create_element("div");
    doc.append_child(root, wrapper);
    doc.append_child(wrapper, nested);

    assert_eq!(doc.find_by_class(root, "target"), Some(nested));
    assert_eq!(doc.find_by_class(root, "absent"), None);
}

#[test]
fn force_layout_is_counted() {
    let doc = Document::new();
    doc.force_layout();
    doc.force_layout();
    assert_eq!(doc.layout_flushes(), 2);
}

#[test]
fn scroll_offsets_are_per_node() {
    let doc = Document::new();
    let a = doc.create_element("div");
    doc.set_scroll(a, ScrollOffset::new(3, 40));
    assert_eq!(doc.scroll(a), ScrollOffset::new(3, 40));
    assert_eq!(doc.scroll(doc.body()), ScrollOffset::default());
}
