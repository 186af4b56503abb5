//! Tests for HistoryLog order tracking.

use super::*;
use proptest::prelude::*;
use serde_json::json;
use std::cell::RefCell;

// ===== Test Helpers =====

fn make_log() -> (Rc<MemoryHistory>, Rc<HistoryLog>) {
    let native = Rc::new(MemoryHistory::new("https://example.test", "/"));
    let log = HistoryLog::new(native.clone());
    (native, log)
}

fn record_pops(log: &HistoryLog) -> Rc<RefCell<Vec<HistoryEvent>>> {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    let _ = log.on(HistoryEventKind::Popped, move |event| {
        sink.borrow_mut().push(event.clone());
    });
    seen
}

// ===== push / replace =====

#[test]
fn push_then_state_round_trips_data_and_order() {
    let (_native, log) = make_log();
    log.push("/first", None, None);
    let pre_push_length = log.length();

    let data = json!({"widget": "slider", "tab": 2});
    log.push("/second", Some(data.clone()), Some("Slider"));

    let state = log.state().expect("entry created by the log has state");
    assert_eq!(state.data, data);
    assert_eq!(state.order, pre_push_length);
}

#[test]
fn push_increments_length_and_writes_native_entry() {
    let (native, log) = make_log();
    log.push("/a", None, Some("A"));
    log.push("/b", None, None);

    assert_eq!(log.length(), 2);
    assert_eq!(native.urls(), vec!["/", "/a", "/b"]);
    assert_eq!(native.current_url(), "/b");
}

#[test]
fn replace_on_empty_log_initializes_length() {
    let (native, log) = make_log();
    log.replace("/home", Some(json!("x")), None);

    assert_eq!(log.length(), 1);
    assert_eq!(log.state().map(|s| s.order), Some(0));
    assert_eq!(native.len(), 1, "replace must not add an entry");
}

#[test]
fn replace_keeps_order_of_current_entry() {
    let (_native, log) = make_log();
    log.push("/a", None, None);
    log.push("/b", None, None);

    log.replace("/b2", None, None);

    assert_eq!(log.length(), 2);
    assert_eq!(log.state().map(|s| s.order), Some(1));
}

#[test]
fn push_and_replace_emit_changed() {
    let (_native, log) = make_log();
    let changes = Rc::new(RefCell::new(0));
    let counter = changes.clone();
    let _ = log.on(HistoryEventKind::Changed, move |_| *counter.borrow_mut() += 1);

    log.push("/a", None, None);
    log.replace("/a", None, None);

    assert_eq!(*changes.borrow(), 2);
}

// ===== pops =====

#[test]
fn back_pop_is_reported_as_back_and_shrinks_length() {
    let (_native, log) = make_log();
    log.replace("/", None, None);
    log.push("/a", None, None);
    log.push("/b", None, None);
    let pops = record_pops(&log);

    log.back();

    let pops = pops.borrow();
    assert_eq!(pops.len(), 1);
    assert!(pops[0].back);
    assert_eq!(pops[0].location.path, "/a");
    assert_eq!(log.length(), 2);
}

#[test]
fn forward_pop_is_not_back_and_restores_length() {
    let (native, log) = make_log();
    log.replace("/", None, None);
    log.push("/a", None, None);
    log.back();
    let pops = record_pops(&log);

    native.forward();

    assert_eq!(pops.borrow().len(), 1);
    assert!(!pops.borrow()[0].back);
    assert_eq!(log.length(), 2);
}

#[test]
fn untagged_entry_is_treated_as_forward_without_error() {
    let (native, log) = make_log();
    log.push("/a", None, None);
    let pops = record_pops(&log);

    native.change_fragment("details");

    let pops = pops.borrow();
    assert_eq!(pops.len(), 1);
    assert!(!pops[0].back);
    assert_eq!(pops[0].state, None);
    assert_eq!(log.length(), 1, "untagged pops leave the tracked length alone");
}

#[test]
fn popped_is_emitted_before_changed() {
    let (_native, log) = make_log();
    log.replace("/", None, None);
    log.push("/a", None, None);
    let order = Rc::new(RefCell::new(Vec::new()));
    for (kind, label) in [
        (HistoryEventKind::Changed, "changed"),
        (HistoryEventKind::Popped, "popped"),
    ] {
        let order = order.clone();
        let _ = log.on(kind, move |_| order.borrow_mut().push(label));
    }

    log.back();

    assert_eq!(*order.borrow(), vec!["popped", "changed"]);
}

#[test]
fn unsubscribed_listener_is_not_invoked() {
    let (_native, log) = make_log();
    log.replace("/", None, None);
    log.push("/a", None, None);
    let hits = Rc::new(RefCell::new(0));
    let counter = hits.clone();
    let subscription = log.on(HistoryEventKind::Popped, move |_| *counter.borrow_mut() += 1);

    subscription.unsubscribe();
    log.back();

    assert_eq!(*hits.borrow(), 0);
}

#[test]
fn new_log_resumes_from_tagged_entry() {
    let native = Rc::new(MemoryHistory::new("https://example.test", "/"));
    native.replace_state(json!({"data": null, "order": 4}), "", "/deep");

    let log = HistoryLog::new(native);

    assert_eq!(log.length(), 5);
}

#[test]
fn can_go_back_needs_an_earlier_tracked_entry() {
    let (_native, log) = make_log();
    assert!(!log.can_go_back());
    log.replace("/", None, None);
    assert!(!log.can_go_back());
    log.push("/a", None, None);
    assert!(log.can_go_back());
}

// ===== Properties =====

proptest! {
    #[test]
    fn every_pop_after_pushes_is_back_and_length_tracks(n in 1usize..12, k_seed in 0usize..12) {
        let k = k_seed % n;
        let (_native, log) = make_log();
        log.replace("/0", None, None);
        for i in 1..n {
            log.push(&format!("/{i}"), Some(json!(i)), None);
        }
        prop_assert_eq!(log.length(), n);

        let pops = record_pops(&log);
        for _ in 0..k {
            log.back();
        }

        let pops = pops.borrow();
        prop_assert_eq!(pops.len(), k);
        prop_assert!(pops.iter().all(|event| event.back));
        prop_assert_eq!(log.length(), n - k);
    }
}
