//! The cooperative process scheduler.
//!
//! A process is a future driven by a deterministic inline executor. Exactly
//! one body runs at a time; a body suspends when it awaits an [`EventFuture`]
//! and resumes when the awaited event is processed or the process is
//! interrupted. Run-to-completion between suspension points means shared
//! kernel state never needs locking.

use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use crate::context::ProcessContext;
use crate::errors::{ProcessError, ProcessFailure, SimError};
use crate::event::{Event, EventData, EventValue};
use crate::simulation::InterruptPolicy;
use crate::state::{SimulationState, PRIORITY_URGENT};

/// Identifier of a process, unique within a simulation.
pub type ProcessId = u32;

/// Lifecycle state of a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// The body is currently executing.
    Active,
    /// The body is waiting for an event (or for its first resumption).
    Suspended,
    /// The body completed normally.
    Terminated,
    /// The body completed with an error; see [`crate::Simulation::failures`].
    Failed,
}

impl ProcessState {
    pub(crate) fn is_finished(self) -> bool {
        matches!(self, ProcessState::Terminated | ProcessState::Failed)
    }
}

type ProcessBody = Pin<Box<dyn Future<Output = Result<(), ProcessError>>>>;

pub(crate) struct ProcessSlot {
    pub name: Rc<str>,
    // taken out while the body is polled, absent once finished
    pub future: Option<ProcessBody>,
    pub state: ProcessState,
    pub interrupt: Option<Interrupt>,
    pub completion: Event,
}

/// Handle to a spawned process: identity, completion event, interruption
/// target.
#[derive(Clone)]
pub struct ProcessHandle {
    pub(crate) pid: ProcessId,
    name: Rc<str>,
    completion: Event,
}

impl ProcessHandle {
    /// Identifier of the process.
    pub fn id(&self) -> ProcessId {
        self.pid
    }

    /// Name the process was spawned with.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Event triggered when the process terminates or fails. Waiting on it is
    /// safe even for failed processes; failures are aggregated separately.
    pub fn completion(&self) -> &Event {
        &self.completion
    }
}

impl fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessHandle")
            .field("id", &self.pid)
            .field("name", &self.name)
            .finish()
    }
}

/// Cause of a forced resumption, delivered to the interrupted wait.
#[derive(Debug, Clone)]
pub struct Interrupt {
    cause: EventValue,
}

impl Interrupt {
    pub(crate) fn new(cause: EventValue) -> Self {
        Self { cause }
    }

    /// The cause payload, if any.
    pub fn cause(&self) -> &EventValue {
        &self.cause
    }

    /// Consumes the interrupt, returning the cause payload.
    pub fn into_cause(self) -> EventValue {
        self.cause
    }

    /// Borrows the cause as a concrete payload type.
    pub fn cause_as<T: EventData>(&self) -> Option<&T> {
        self.cause
            .as_deref()
            .and_then(|data| data.downcast_ref::<T>())
    }
}

pub(crate) fn spawn_process<F, Fut>(
    sim: &Rc<RefCell<SimulationState>>,
    name: &str,
    body: F,
) -> ProcessHandle
where
    F: FnOnce(ProcessContext) -> Fut,
    Fut: Future<Output = Result<(), ProcessError>> + 'static,
{
    let name: Rc<str> = Rc::from(name);
    let pid = sim.borrow_mut().next_process_id();
    let completion = Event::new(sim, "process.completion");
    let ctx = ProcessContext::new(sim.clone(), pid, name.clone());
    let future: ProcessBody = Box::pin(body(ctx));
    sim.borrow_mut().processes.insert(
        pid,
        ProcessSlot {
            name: name.clone(),
            future: Some(future),
            state: ProcessState::Suspended,
            interrupt: None,
            completion: completion.clone(),
        },
    );
    // first resumption happens at the current time, in spawn order
    let start = Event::new(sim, "process.start");
    let sim_clone = sim.clone();
    start.add_callback(move |_: &Event| poll_process(&sim_clone, pid));
    start.force_trigger(None);
    log::trace!(
        target: "simproc",
        "[{:.3}] spawned process {} ({})",
        sim.borrow().time(),
        pid,
        name
    );
    ProcessHandle {
        pid,
        name,
        completion,
    }
}

/// Resumes a process: polls its body once and records the outcome.
pub(crate) fn poll_process(sim: &Rc<RefCell<SimulationState>>, pid: ProcessId) {
    let mut future = {
        let mut state = sim.borrow_mut();
        let Some(slot) = state.processes.get_mut(&pid) else {
            return;
        };
        if slot.state.is_finished() {
            return;
        }
        let Some(future) = slot.future.take() else {
            return;
        };
        slot.state = ProcessState::Active;
        future
    };

    let waker = futures::task::noop_waker();
    let mut cx = Context::from_waker(&waker);
    match future.as_mut().poll(&mut cx) {
        Poll::Pending => {
            let mut state = sim.borrow_mut();
            if let Some(slot) = state.processes.get_mut(&pid) {
                slot.future = Some(future);
                slot.state = ProcessState::Suspended;
            }
        }
        Poll::Ready(outcome) => {
            let completion = {
                let mut state = sim.borrow_mut();
                let time = state.time();
                let Some(slot) = state.processes.get_mut(&pid) else {
                    return;
                };
                let name = slot.name.clone();
                let completion = slot.completion.clone();
                match outcome {
                    Ok(()) => {
                        slot.state = ProcessState::Terminated;
                        log::trace!(
                            target: "simproc",
                            "[{:.3}] process {} ({}) terminated",
                            time,
                            pid,
                            name
                        );
                    }
                    Err(error) => {
                        slot.state = ProcessState::Failed;
                        log::error!(
                            target: "simproc",
                            "[{:.3}] process {} ({}) failed: {}",
                            time,
                            pid,
                            name,
                            error
                        );
                        state.failures.push(ProcessFailure {
                            process: pid,
                            name: name.to_string(),
                            error,
                        });
                    }
                }
                completion
            };
            // trigger even on failure so dependents do not deadlock
            completion.force_trigger(None);
        }
    }
}

/// Delivers an interrupt to `target` with the given cause payload.
pub(crate) fn interrupt_process(
    sim: &Rc<RefCell<SimulationState>>,
    target: &ProcessHandle,
    cause: EventValue,
) -> Result<(), SimError> {
    {
        let state = sim.borrow();
        let suspended = state
            .processes
            .get(&target.pid)
            .map(|slot| slot.state == ProcessState::Suspended)
            .unwrap_or(false);
        if !suspended {
            return match state.interrupt_policy {
                InterruptPolicy::Lenient => Ok(()),
                InterruptPolicy::Strict => Err(SimError::NotInterruptible),
            };
        }
    }
    let delivery = Event::new(sim, "process.interrupt");
    let sim_clone = sim.clone();
    let pid = target.pid;
    delivery.add_callback(move |event: &Event| {
        let deliver = {
            let mut state = sim_clone.borrow_mut();
            match state.processes.get_mut(&pid) {
                Some(slot) if slot.state == ProcessState::Suspended => {
                    slot.interrupt = Some(Interrupt::new(event.value()));
                    true
                }
                // target resumed or finished in the meantime; nothing to wake
                _ => false,
            }
        };
        if deliver {
            poll_process(&sim_clone, pid);
        }
    });
    // urgent priority: the interrupt outruns same-time normal events
    sim.borrow_mut()
        .schedule_now(PRIORITY_URGENT, delivery, cause);
    Ok(())
}

/// Future resolving when an [`Event`] is processed, or earlier when the
/// waiting process is interrupted.
///
/// Created by [`ProcessContext::wait`](crate::ProcessContext::wait) and
/// [`ProcessContext::sleep`](crate::ProcessContext::sleep). Resolves to the
/// event's value, or to `Err(Interrupt)` on forced resumption; an interrupted
/// wait does not cancel the underlying request (see the resource modules).
pub struct EventFuture {
    event: Event,
    sim: Rc<RefCell<SimulationState>>,
    pid: ProcessId,
    registered: bool,
}

impl EventFuture {
    pub(crate) fn new(event: Event, sim: Rc<RefCell<SimulationState>>, pid: ProcessId) -> Self {
        Self {
            event,
            sim,
            pid,
            registered: false,
        }
    }
}

impl Future for EventFuture {
    type Output = Result<EventValue, Interrupt>;

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        {
            let mut state = this.sim.borrow_mut();
            if let Some(slot) = state.processes.get_mut(&this.pid) {
                if let Some(interrupt) = slot.interrupt.take() {
                    return Poll::Ready(Err(interrupt));
                }
            }
        }
        if this.event.is_processed() {
            return Poll::Ready(Ok(this.event.value()));
        }
        if !this.registered {
            this.registered = true;
            let sim = this.sim.clone();
            let pid = this.pid;
            this.event
                .add_callback(move |_: &Event| poll_process(&sim, pid));
        }
        Poll::Pending
    }
}
