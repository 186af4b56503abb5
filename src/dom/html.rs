//! HTML serialization for the headless document.

use super::{NodeId, NodeKind, Tree};

/// Elements serialized without a closing tag.
const VOID_ELEMENTS: &[&str] = &["br", "hr", "img", "input", "meta", "link"];

pub(crate) fn serialize(tree: &Tree, id: NodeId) -> String {
    let mut out = String::new();
    write_node(tree, id, &mut out);
    out
}

fn write_node(tree: &Tree, id: NodeId, out: &mut String) {
    let Some(node) = tree.nodes.get(id.index()) else {
        return;
    };
    match &node.kind {
        NodeKind::Text(text) => out.push_str(&escape(text, false)),
        NodeKind::Element(element) => {
            out.push('<');
            out.push_str(&element.tag);
            if !element.classes.is_empty() {
                out.push_str(" class=\"");
                out.push_str(&escape(&element.classes.join(" "), true));
                out.push('"');
            }
            for (name, value) in &element.attributes {
                out.push(' ');
                out.push_str(name);
                if !value.is_empty() {
                    out.push_str("=\"");
                    out.push_str(&escape(value, true));
                    out.push('"');
                }
            }
            if !element.styles.is_empty() {
                let style = element
                    .styles
                    .iter()
                    .map(|(property, value)| format!("{property}: {value}"))
                    .collect::<Vec<_>>()
                    .join("; ");
                out.push_str(" style=\"");
                out.push_str(&escape(&style, true));
                out.push('"');
            }
            out.push('>');
            if VOID_ELEMENTS.contains(&element.tag.as_str()) {
                return;
            }
            for child in &node.children {
                write_node(tree, *child, out);
            }
            out.push_str("</");
            out.push_str(&element.tag);
            out.push('>');
        }
    }
}

fn escape(raw: &str, attribute: bool) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use crate::dom::Document;

    #[test]
    fn serializes_classes_attributes_and_styles_in_stable_order() {
        let doc = Document::new();
        let div = doc.element("div", &["card", "wide"]);
        doc.set_attribute(div, "data-view", "home");
        doc.set_hidden(div, true);
        doc.set_style(div, "opacity", "0");
        let text = doc.create_text("a < b");
        doc.append_child(div, text);

        assert_eq!(
            doc.to_html(div),
            "<div class=\"card wide\" data-view=\"home\" hidden style=\"opacity: 0\">a &lt; b</div>"
        );
    }

    #[test]
    fn void_elements_have_no_closing_tag() {
        let doc = Document::new();
        let hr = doc.create_element("hr");
        assert_eq!(doc.to_html(hr), "<hr>");
    }
}
