//! Built-in transition effects and descriptor parsing.

use crate::dom::{Document, NodeId};
use std::fmt;
use std::time::Duration;

/// Inline style properties a transition may leave behind.
pub const TRANSITION_STYLES: [&str; 3] = ["opacity", "transform", "transition"];

/// Visual strategy of a transition.
///
/// `reset` puts both elements in their start state before the incoming element is unhidden;
/// `apply` sets the end state one animation frame later.
pub trait Effect: fmt::Debug {
    fn name(&self) -> &str;

    fn reset(&self, doc: &Document, incoming: NodeId, outgoing: Option<NodeId>, duration: Duration);

    fn apply(&self, doc: &Document, incoming: NodeId, outgoing: Option<NodeId>);
}

/// A parsed `name:param,param` descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    pub name: String,
    pub params: Vec<String>,
}

impl Descriptor {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        let (name, params) = match raw.split_once(':') {
            Some((name, params)) => (
                name,
                params
                    .split(',')
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(String::from)
                    .collect(),
            ),
            None => (raw, Vec::new()),
        };
        Self {
            name: name.trim().to_string(),
            params,
        }
    }
}

// ===== none =====

/// No animation: the incoming element appears, the outgoing one is hidden.
#[derive(Debug, Default)]
pub struct NoEffect;

impl Effect for NoEffect {
    fn name(&self) -> &str {
        "none"
    }

    fn reset(&self, _doc: &Document, _incoming: NodeId, _outgoing: Option<NodeId>, _duration: Duration) {}

    fn apply(&self, _doc: &Document, _incoming: NodeId, _outgoing: Option<NodeId>) {}
}

fn transition_value(property: &str, duration: Duration) -> String {
    format!("{property} {}ms ease", duration.as_millis())
}

// ===== fade =====

/// Cross-fade.
#[derive(Debug, Default)]
pub struct Fade;

impl Effect for Fade {
    fn name(&self) -> &str {
        "fade"
    }

    fn reset(&self, doc: &Document, incoming: NodeId, outgoing: Option<NodeId>, duration: Duration) {
        doc.set_style(incoming, "opacity", "0");
        doc.set_style(incoming, "transition", &transition_value("opacity", duration));
        if let Some(outgoing) = outgoing {
            doc.set_style(outgoing, "opacity", "1");
            doc.set_style(outgoing, "transition", &transition_value("opacity", duration));
        }
    }

    fn apply(&self, doc: &Document, incoming: NodeId, outgoing: Option<NodeId>) {
        doc.set_style(incoming, "opacity", "1");
        if let Some(outgoing) = outgoing {
            doc.set_style(outgoing, "opacity", "0");
        }
    }
}

// ===== slide =====

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "up" => Some(Direction::Up),
            "down" => Some(Direction::Down),
            "left" => Some(Direction::Left),
            "right" => Some(Direction::Right),
            _ => None,
        }
    }

    pub fn inverted(self) -> Self {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }

    /// Offset an element enters from when content moves in this direction.
    fn entry_offset(self) -> &'static str {
        match self {
            Direction::Left => "translate(100%, 0)",
            Direction::Right => "translate(-100%, 0)",
            Direction::Up => "translate(0, 100%)",
            Direction::Down => "translate(0, -100%)",
        }
    }

    fn exit_offset(self) -> &'static str {
        self.inverted().entry_offset()
    }
}

/// Directional slide. Content moves towards `direction`.
#[derive(Debug)]
pub struct Slide {
    direction: Direction,
}

impl Slide {
    /// Build from descriptor params. Unknown directions fall back to `left`.
    pub fn new(params: &[String], reverse: bool) -> Self {
        let direction = params
            .first()
            .and_then(|p| Direction::parse(p))
            .unwrap_or(Direction::Left);
        Self {
            direction: if reverse { direction.inverted() } else { direction },
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }
}

impl Effect for Slide {
    fn name(&self) -> &str {
        "slide"
    }

    fn reset(&self, doc: &Document, incoming: NodeId, outgoing: Option<NodeId>, duration: Duration) {
        doc.set_style(incoming, "transform", self.direction.entry_offset());
        doc.set_style(incoming, "transition", &transition_value("transform", duration));
        if let Some(outgoing) = outgoing {
            doc.set_style(outgoing, "transform", "translate(0, 0)");
            doc.set_style(outgoing, "transition", &transition_value("transform", duration));
        }
    }

    fn apply(&self, doc: &Document, incoming: NodeId, outgoing: Option<NodeId>) {
        doc.set_style(incoming, "transform", "translate(0, 0)");
        if let Some(outgoing) = outgoing {
            doc.set_style(outgoing, "transform", self.direction.exit_offset());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_splits_name_and_params() {
        assert_eq!(
            Descriptor::parse("slide:up, fast"),
            Descriptor {
                name: "slide".to_string(),
                params: vec!["up".to_string(), "fast".to_string()],
            }
        );
        assert_eq!(Descriptor::parse("fade").params, Vec::<String>::new());
    }

    #[test]
    fn slide_defaults_left_and_inverts_on_reverse() {
        assert_eq!(Slide::new(&[], false).direction(), Direction::Left);
        assert_eq!(Slide::new(&[], true).direction(), Direction::Right);
        assert_eq!(Slide::new(&["up".to_string()], true).direction(), Direction::Down);
        assert_eq!(Slide::new(&["sideways".to_string()], false).direction(), Direction::Left);
    }

    #[test]
    fn fade_reset_and_apply_swap_opacity() {
        let doc = Document::new();
        let incoming = doc.create_element("div");
        let outgoing = doc.create_element("div");

        Fade.reset(&doc, incoming, Some(outgoing), Duration::from_millis(200));
        assert_eq!(doc.style(incoming, "opacity").as_deref(), Some("0"));
        assert_eq!(
            doc.style(incoming, "transition").as_deref(),
            Some("opacity 200ms ease")
        );

        Fade.apply(&doc, incoming, Some(outgoing));
        assert_eq!(doc.style(incoming, "opacity").as_deref(), Some("1"));
        assert_eq!(doc.style(outgoing, "opacity").as_deref(), Some("0"));
    }
}
