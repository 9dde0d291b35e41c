//! AND/OR combinators over events.
//!
//! A composite is itself an [`Event`]: it can be waited on, combined again,
//! or inspected like any other event. Its value is a [`ConditionValue`]
//! snapshot of every constituent, built when the composite itself is
//! processed. Because triggering always defers processing through the event
//! queue, constituents firing at the same instant (with an earlier queue
//! sequence) are all reported as fired, not just the first one.
//!
//! Losers of an `any_of` race are not auto-cancelled. Leftover registrations
//! on remaining constituents degrade to no-ops, but a pending resource
//! request stays queued until the caller cancels it explicitly.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use serde::Serialize;

use crate::event::{Event, EventId, EventValue};
use crate::state::SimulationState;

#[derive(Clone, Copy)]
enum Mode {
    All,
    Any,
}

/// Per-constituent snapshot taken when the composite is processed.
#[derive(Debug, Clone, Serialize)]
struct ConditionEntry {
    event: EventId,
    fired: bool,
    value: EventValue,
}

/// Value of a processed composite event.
///
/// Exposes, for every constituent, whether it had been processed by the time
/// the composite was, and its value if so.
#[derive(Debug, Clone, Serialize)]
pub struct ConditionValue {
    entries: Vec<ConditionEntry>,
}

impl ConditionValue {
    /// True if the given constituent had fired when the snapshot was taken.
    pub fn fired(&self, event: &Event) -> bool {
        let id = event.id();
        self.entries
            .iter()
            .any(|entry| entry.event == id && entry.fired)
    }

    /// Value of the given constituent, if it had fired.
    pub fn value_of(&self, event: &Event) -> Option<EventValue> {
        let id = event.id();
        self.entries
            .iter()
            .find(|entry| entry.event == id && entry.fired)
            .map(|entry| entry.value.clone())
    }

    /// Number of constituents that had fired.
    pub fn fired_count(&self) -> usize {
        self.entries.iter().filter(|entry| entry.fired).count()
    }

    /// Total number of constituents.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True for a composite over an empty constituent list.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Composite triggering when every constituent has fired. Empty input
/// triggers immediately.
pub(crate) fn all_of(sim: &Rc<RefCell<SimulationState>>, events: &[Event]) -> Event {
    combine(sim, events, Mode::All, "condition.all_of")
}

/// Composite triggering when the first constituent fires. Empty input
/// triggers immediately.
pub(crate) fn any_of(sim: &Rc<RefCell<SimulationState>>, events: &[Event]) -> Event {
    combine(sim, events, Mode::Any, "condition.any_of")
}

fn combine(
    sim: &Rc<RefCell<SimulationState>>,
    events: &[Event],
    mode: Mode,
    label: &'static str,
) -> Event {
    let composite = Event::new(sim, label);
    let constituents: Rc<[Event]> = Rc::from(events.to_vec());

    // First callback of the composite: attach the snapshot value. Registered
    // before any waiter can register, so waiters observe the final value.
    {
        let constituents = constituents.clone();
        composite.add_callback(move |event: &Event| {
            let entries = constituents
                .iter()
                .map(|constituent| ConditionEntry {
                    event: constituent.id(),
                    fired: constituent.is_processed(),
                    value: constituent.value(),
                })
                .collect();
            event.set_value(Some(Box::new(ConditionValue { entries })));
        });
    }

    let needed = match mode {
        Mode::All => events.len(),
        Mode::Any => events.len().min(1),
    };
    if needed == 0 {
        composite.force_trigger(None);
        return composite;
    }

    let fired = Rc::new(Cell::new(0usize));
    for constituent in events {
        let composite = composite.clone();
        let fired = fired.clone();
        constituent.add_callback(move |_: &Event| {
            fired.set(fired.get() + 1);
            if fired.get() >= needed && composite.is_pending() {
                composite.force_trigger(None);
            }
        });
    }
    composite
}
