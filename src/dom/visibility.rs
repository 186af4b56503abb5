//! Show/hide with optional transitions.

use super::{Document, NodeId};
use crate::transition::{Transition, Transitions};
use futures::future::{self, FutureExt, LocalBoxFuture};
use std::rc::Rc;
use std::time::Duration;
use tracing::debug;

/// Element attribute naming the transition to use when shown.
pub const TRANSITION_ATTR: &str = "data-transition";
/// Element attribute overriding the transition duration, in milliseconds.
pub const DURATION_ATTR: &str = "data-duration";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToggleOptions {
    /// Transition descriptor; falls back to the element's `data-transition`, then the default.
    pub transition: Option<String>,
    /// Falls back to the element's `data-duration`, then the default.
    pub duration: Option<Duration>,
    /// Detach instead of hiding.
    pub remove_on_hide: bool,
    /// Element the shown one replaces; it is transitioned out and left hidden.
    pub replacing: Option<NodeId>,
    /// Play the transition backwards.
    pub reverse: bool,
}

/// Show or hide `element`.
///
/// Showing runs a transition paired with `options.replacing`. Hiding is immediate; elements
/// only animate out as the outgoing side of a show.
pub fn toggle(
    transitions: &Rc<Transitions>,
    doc: &Document,
    element: NodeId,
    show: bool,
    options: &ToggleOptions,
) -> LocalBoxFuture<'static, ()> {
    if !show {
        if options.remove_on_hide {
            doc.detach(element);
        } else {
            doc.set_hidden(element, true);
        }
        return future::ready(()).boxed_local();
    }

    let descriptor = options
        .transition
        .clone()
        .or_else(|| doc.attribute(element, TRANSITION_ATTR))
        .unwrap_or_else(|| transitions.default_name().to_string());
    let duration = options
        .duration
        .or_else(|| {
            doc.attribute(element, DURATION_ATTR)
                .and_then(|raw| raw.trim().parse::<u64>().ok())
                .map(Duration::from_millis)
        })
        .unwrap_or_else(|| transitions.default_duration());
    debug!(%element, %descriptor, duration_ms = duration.as_millis() as u64, "show");

    transitions.run(Transition {
        incoming: element,
        outgoing: options.replacing.filter(|outgoing| *outgoing != element),
        duration,
        reverse: options.reverse,
        effect: transitions.init(&descriptor, options.reverse),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::VirtualClock;
    use futures::executor::block_on;

    fn setup() -> (Document, Rc<VirtualClock>, Rc<Transitions>) {
        let doc = Document::new();
        let clock = Rc::new(VirtualClock::new());
        let transitions = Transitions::new(doc.clone(), clock.clone(), "none", Duration::from_millis(10));
        (doc, clock, transitions)
    }

    #[test]
    fn hide_is_immediate() {
        let (doc, clock, transitions) = setup();
        let element = doc.create_element("div");
        doc.append_child(doc.body(), element);

        block_on(toggle(&transitions, &doc, element, false, &ToggleOptions::default()));

        assert!(doc.is_hidden(element));
        assert_eq!(clock.frames(), 0);
    }

    #[test]
    fn hide_with_remove_detaches() {
        let (doc, _clock, transitions) = setup();
        let element = doc.create_element("div");
        doc.append_child(doc.body(), element);

        let options = ToggleOptions {
            remove_on_hide: true,
            ..ToggleOptions::default()
        };
        block_on(toggle(&transitions, &doc, element, false, &options));

        assert!(!doc.is_connected(element));
        assert!(!doc.is_hidden(element));
    }

    #[test]
    fn show_reads_duration_from_attribute() {
        let (doc, clock, transitions) = setup();
        let element = doc.create_element("div");
        doc.set_hidden(element, true);
        doc.set_attribute(element, DURATION_ATTR, "450");

        block_on(toggle(&transitions, &doc, element, true, &ToggleOptions::default()));

        assert!(!doc.is_hidden(element));
        assert_eq!(clock.elapsed(), Duration::from_millis(450));
    }

    #[test]
    fn show_option_overrides_attribute_and_hides_replaced() {
        let (doc, clock, transitions) = setup();
        let incoming = doc.create_element("div");
        let outgoing = doc.create_element("div");
        doc.set_hidden(incoming, true);
        doc.set_attribute(incoming, TRANSITION_ATTR, "slide");
        doc.set_attribute(incoming, DURATION_ATTR, "450");

        let options = ToggleOptions {
            transition: Some("fade".to_string()),
            duration: Some(Duration::from_millis(20)),
            replacing: Some(outgoing),
            ..ToggleOptions::default()
        };
        block_on(toggle(&transitions, &doc, incoming, true, &options));

        assert!(!doc.is_hidden(incoming));
        assert!(doc.is_hidden(outgoing));
        assert_eq!(clock.elapsed(), Duration::from_millis(20));
    }
}
