//! Events and event payloads.
//!
//! An [`Event`] is a future occurrence that processes can wait on. It starts
//! out pending, becomes triggered when its condition fires, and is processed
//! when the scheduler pops it from the queue and runs its callbacks. Payloads
//! are arbitrary user types implementing [`EventData`].

use std::cell::RefCell;
use std::fmt;
use std::mem;
use std::rc::Rc;

use downcast_rs::{impl_downcast, Downcast};
use dyn_clone::{clone_trait_object, DynClone};
use serde::Serialize;

use crate::errors::SimError;
use crate::state::{Priority, SimulationState, PRIORITY_NORMAL};

/// Identifier of an event, unique within a simulation.
pub type EventId = u64;

/// Trait for event payloads.
///
/// Any `Clone + Serialize + Debug + 'static` type qualifies via the blanket
/// implementation. Serialization is used only by the event trace.
pub trait EventData: Downcast + erased_serde::Serialize + DynClone + fmt::Debug {}

impl_downcast!(EventData);
clone_trait_object!(EventData);
erased_serde::serialize_trait_object!(EventData);

impl<T: Serialize + DynClone + fmt::Debug + 'static> EventData for T {}

/// Optional payload carried by a triggered event.
pub type EventValue = Option<Box<dyn EventData>>;

/// Wraps a payload value into an [`EventValue`].
pub fn payload<T: EventData>(value: T) -> EventValue {
    Some(Box::new(value))
}

/// Extracts a typed payload from an [`EventValue`], consuming it.
///
/// Returns `None` if the value is absent or of a different type.
pub fn extract<T: EventData>(value: EventValue) -> Option<T> {
    value
        .and_then(|data| data.downcast::<T>().ok())
        .map(|data| *data)
}

/// Lifecycle state of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EventState {
    /// The event's condition has not fired yet.
    Pending,
    /// The condition has fired; callbacks have not run yet.
    Triggered,
    /// The callbacks have run; the value is final.
    Processed,
}

type Callback = Box<dyn FnOnce(&Event)>;

pub(crate) struct EventInner {
    id: EventId,
    label: &'static str,
    state: EventState,
    // set as soon as a queue entry exists for this event
    scheduled: bool,
    value: EventValue,
    callbacks: Vec<Callback>,
}

/// A cheap cloneable handle to a simulation event.
///
/// All clones refer to the same underlying event.
#[derive(Clone)]
pub struct Event {
    inner: Rc<RefCell<EventInner>>,
    sim: Rc<RefCell<SimulationState>>,
}

impl Event {
    pub(crate) fn new(sim: &Rc<RefCell<SimulationState>>, label: &'static str) -> Self {
        let id = sim.borrow_mut().next_event_id();
        Self {
            inner: Rc::new(RefCell::new(EventInner {
                id,
                label,
                state: EventState::Pending,
                scheduled: false,
                value: None,
                callbacks: Vec::new(),
            })),
            sim: sim.clone(),
        }
    }

    /// Identifier of this event.
    pub fn id(&self) -> EventId {
        self.inner.borrow().id
    }

    /// Short label describing the kind of event (e.g. `"timeout"`).
    pub fn label(&self) -> &'static str {
        self.inner.borrow().label
    }

    /// Current lifecycle state.
    pub fn state(&self) -> EventState {
        self.inner.borrow().state
    }

    /// True while the condition has not fired.
    pub fn is_pending(&self) -> bool {
        self.state() == EventState::Pending
    }

    /// True once the condition has fired (triggered or processed).
    pub fn is_triggered(&self) -> bool {
        self.state() != EventState::Pending
    }

    /// True once the callbacks have run and the value is final.
    pub fn is_processed(&self) -> bool {
        self.state() == EventState::Processed
    }

    /// A clone of the event's value.
    pub fn value(&self) -> EventValue {
        self.inner.borrow().value.clone()
    }

    /// Triggers the event at the current simulation time with the given value.
    ///
    /// Callbacks do not run inline; the event is enqueued and processed in
    /// FIFO order among same-time events. Fails with
    /// [`SimError::AlreadyTriggered`] if the event was triggered or scheduled
    /// before.
    pub fn trigger(&self, value: EventValue) -> Result<(), SimError> {
        {
            let mut inner = self.inner.borrow_mut();
            if inner.state != EventState::Pending || inner.scheduled {
                return Err(SimError::AlreadyTriggered);
            }
            inner.state = EventState::Triggered;
            inner.scheduled = true;
            inner.value = value;
        }
        self.sim
            .borrow_mut()
            .schedule_now(PRIORITY_NORMAL, self.clone(), None);
        Ok(())
    }

    /// Schedules the event to trigger after `delay` time units.
    ///
    /// The event stays pending until the delay elapses, then triggers with
    /// `value` and is processed. Fails with [`SimError::InvalidSchedule`] on a
    /// negative delay and [`SimError::AlreadyTriggered`] on double scheduling.
    pub fn trigger_delayed(&self, value: EventValue, delay: f64) -> Result<(), SimError> {
        self.trigger_prioritized(value, delay, PRIORITY_NORMAL)
    }

    /// Like [`Event::trigger_delayed`] with an explicit queue priority.
    ///
    /// Among same-time entries, lower priorities are processed first; ties are
    /// broken by scheduling order.
    pub fn trigger_prioritized(
        &self,
        value: EventValue,
        delay: f64,
        priority: Priority,
    ) -> Result<(), SimError> {
        if delay < 0.0 {
            return Err(SimError::InvalidSchedule);
        }
        {
            let mut inner = self.inner.borrow_mut();
            if inner.state != EventState::Pending || inner.scheduled {
                return Err(SimError::AlreadyTriggered);
            }
            inner.scheduled = true;
        }
        self.sim
            .borrow_mut()
            .schedule(delay, priority, self.clone(), value)
    }

    /// Registers a continuation to run when the event is processed.
    ///
    /// Callbacks run in registration order; this order is observable and
    /// preserved. Registering on an already processed event runs the callback
    /// immediately.
    pub fn add_callback<F: FnOnce(&Event) + 'static>(&self, f: F) {
        {
            let mut inner = self.inner.borrow_mut();
            if inner.state != EventState::Processed {
                inner.callbacks.push(Box::new(f));
                return;
            }
        }
        f(self);
    }

    /// Kernel-side trigger for events it owns (grants, completions).
    ///
    /// Degrades to a warning if the event was triggered out from under the
    /// kernel, e.g. by user code holding a clone of the handle.
    pub(crate) fn force_trigger(&self, value: EventValue) {
        if self.trigger(value).is_err() {
            log::warn!(
                target: "simproc",
                "event {} ({}) was already triggered; kernel trigger ignored",
                self.id(),
                self.label()
            );
        }
    }

    /// Overwrites the value while the event is being processed. Used by
    /// condition combinators to attach the snapshot built at processing time.
    pub(crate) fn set_value(&self, value: EventValue) {
        self.inner.borrow_mut().value = value;
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Event")
            .field("id", &inner.id)
            .field("label", &inner.label)
            .field("state", &inner.state)
            .finish()
    }
}

/// Marks the event of a popped queue entry as processed and runs its
/// callbacks in registration order.
pub(crate) fn process_entry(event: &Event, deferred_value: EventValue, time: f64) {
    let callbacks = {
        let mut inner = event.inner.borrow_mut();
        if inner.state == EventState::Pending {
            inner.state = EventState::Triggered;
            inner.value = deferred_value;
        }
        inner.state = EventState::Processed;
        mem::take(&mut inner.callbacks)
    };
    log::trace!(
        target: "simproc",
        "[{:.3}] processing event {} ({}), {} callback(s)",
        time,
        event.id(),
        event.label(),
        callbacks.len()
    );
    for callback in callbacks {
        callback(event);
    }
}
