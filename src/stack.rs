//! Call-stack tracking for nested dispatches.
//!
//! Dispatches nest: a protected operation, a callback, or a finally may run
//! another [`Dispatch`](crate::Dispatch) inside itself. This module keeps the
//! per-thread bookkeeping that makes the nesting observable without letting
//! sibling invocations contaminate each other:
//!
//! - a **frame stack**: one frame per live `execute()`, pushed on entry and
//!   popped on exit, holding the known-issue tags the matched rule resolved;
//! - an **unwind trail**: when a fault propagates out of a dispatch, that
//!   frame's tags are appended to the fault's trail entry, so an enclosing
//!   dispatcher that catches the fault sees tags accumulated inner-to-outer;
//! - an **incident registry**: faults with a live incident, registered when
//!   the incident is built and forgotten once processing finishes (even when
//!   a callback errs).
//!
//! Popping the outermost frame clears the trail and the registry, which is
//! what keeps stale tags away from later, unrelated invocations on the same
//! thread.
//!
//! Everything here is `thread_local`: dispatch is synchronous and
//! single-threaded per invocation, so threads never share frames.

use crate::fault::Fault;
use crate::support;
use std::cell::RefCell;
use std::collections::HashMap;

struct Frame {
    identity: u64,
    known: Vec<String>,
}

thread_local! {
    static STACK: RefCell<Vec<Frame>> = const { RefCell::new(Vec::new()) };
    static TRAIL: RefCell<Vec<(u64, Vec<String>)>> = const { RefCell::new(Vec::new()) };
    static INCIDENTS: RefCell<HashMap<u64, Vec<String>>> = RefCell::new(HashMap::new());
}

pub(crate) fn push_frame(identity: u64) {
    STACK.with(|stack| stack.borrow_mut().push(Frame { identity, known: Vec::new() }));
}

pub(crate) fn replace_frame_known(identity: u64, known: Vec<String>) {
    STACK.with(|stack| {
        if let Some(frame) = stack.borrow_mut().iter_mut().rev().find(|frame| frame.identity == identity) {
            frame.known = known;
        }
    });
}

pub(crate) fn pop_frame(identity: u64) {
    let emptied = STACK.with(|stack| {
        let mut stack = stack.borrow_mut();
        if let Some(position) = stack.iter().rposition(|frame| frame.identity == identity) {
            stack.remove(position);
        }
        stack.is_empty()
    });

    if emptied {
        TRAIL.with(|trail| trail.borrow_mut().clear());
        INCIDENTS.with(|incidents| incidents.borrow_mut().clear());
    }
}

/// Record that `identity`'s frame is letting a fault escape: its tags join
/// the fault's trail so outer dispatchers can pick them up after this frame
/// is gone.
pub(crate) fn note_unwind(fault_id: u64, identity: u64) {
    let known = STACK.with(|stack| {
        stack
            .borrow()
            .iter()
            .rev()
            .find(|frame| frame.identity == identity)
            .map(|frame| frame.known.clone())
            .unwrap_or_default()
    });
    if known.is_empty() {
        return;
    }

    TRAIL.with(|trail| {
        let mut trail = trail.borrow_mut();
        if let Some(entry) = trail.iter_mut().find(|(id, _)| *id == fault_id) {
            entry.1 = support::merge_distinct(std::mem::take(&mut entry.1), known);
        } else {
            trail.push((fault_id, known));
        }
    });
}

/// Known-issue tags for a fault, inner-to-outer: trail entries from already
/// unwound dispatches first, then the tags of each live frame deepest-first.
pub(crate) fn collect_known(fault_id: u64) -> Vec<String> {
    let mut tags: Vec<String> = TRAIL.with(|trail| {
        trail.borrow().iter().filter(|(id, _)| *id == fault_id).flat_map(|(_, known)| known.clone()).collect()
    });

    STACK.with(|stack| {
        for frame in stack.borrow().iter().rev() {
            tags.extend(frame.known.iter().cloned());
        }
    });

    support::merge_distinct(Vec::new(), tags)
}

pub(crate) fn register_incident(fault_id: u64, known: Vec<String>) {
    INCIDENTS.with(|incidents| incidents.borrow_mut().insert(fault_id, known));
}

pub(crate) fn forget_incident(fault_id: u64) {
    INCIDENTS.with(|incidents| incidents.borrow_mut().remove(&fault_id));
}

/// Whether a fault currently has a live (not yet forgotten) incident on this
/// thread.
pub fn has_incident(fault: &Fault) -> bool {
    INCIDENTS.with(|incidents| incidents.borrow().contains_key(&fault.id()))
}

/// The known-issue tags registered for a fault's live incident, if any.
pub fn known_for(fault: &Fault) -> Option<Vec<String>> {
    INCIDENTS.with(|incidents| incidents.borrow().get(&fault.id()).cloned())
}

/// The current dispatch nesting depth on this thread.
pub fn depth() -> usize {
    STACK.with(|stack| stack.borrow().len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn frames_push_replace_and_pop() {
        push_frame(1);
        push_frame(2);
        assert_eq!(depth(), 2);

        replace_frame_known(2, tags(&["INNER"]));
        replace_frame_known(1, tags(&["OUTER"]));
        assert_eq!(collect_known(99), tags(&["INNER", "OUTER"]));

        pop_frame(2);
        assert_eq!(collect_known(99), tags(&["OUTER"]));

        pop_frame(1);
        assert_eq!(depth(), 0);
    }

    #[test]
    fn unwind_trail_survives_the_popped_frame() {
        let fault = crate::fault!("x", "boom");

        push_frame(1);
        push_frame(2);
        replace_frame_known(2, tags(&["INNER"]));
        note_unwind(fault.id(), 2);
        pop_frame(2);

        replace_frame_known(1, tags(&["OUTER"]));
        assert_eq!(collect_known(fault.id()), tags(&["INNER", "OUTER"]));

        // A different fault never sees the trail entry.
        assert_eq!(collect_known(fault.id() + 1), tags(&["OUTER"]));

        pop_frame(1);
    }

    #[test]
    fn popping_the_outermost_frame_clears_everything() {
        let fault = crate::fault!("x", "boom");

        push_frame(1);
        replace_frame_known(1, tags(&["TAG"]));
        note_unwind(fault.id(), 1);
        register_incident(fault.id(), tags(&["TAG"]));
        pop_frame(1);

        assert!(!has_incident(&fault));
        push_frame(7);
        assert_eq!(collect_known(fault.id()), Vec::<String>::new());
        pop_frame(7);
    }

    #[test]
    fn incidents_register_and_forget() {
        let fault = crate::fault!("x", "boom");
        push_frame(1);

        register_incident(fault.id(), tags(&["KNOWN-1"]));
        assert!(has_incident(&fault));
        assert_eq!(known_for(&fault), Some(tags(&["KNOWN-1"])));

        forget_incident(fault.id());
        assert!(!has_incident(&fault));
        assert_eq!(known_for(&fault), None);

        pop_frame(1);
    }
}
