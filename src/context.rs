//! Per-process access to the simulation: time, events, waits, spawning,
//! interrupts and the simulation-wide RNG.

use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;

use rand::distributions::uniform::{SampleRange, SampleUniform};
use rand::distributions::Distribution;

use crate::condition;
use crate::errors::{ProcessError, SimError};
use crate::event::{payload, Event, EventData, EventValue};
use crate::process::{
    interrupt_process, spawn_process, EventFuture, ProcessHandle, ProcessId,
};
use crate::state::SimulationState;

/// Context handed to each process body.
///
/// Cheap to clone; typically captured by the `async move` body and by any
/// child bodies it spawns.
#[derive(Clone)]
pub struct ProcessContext {
    sim: Rc<RefCell<SimulationState>>,
    pid: ProcessId,
    name: Rc<str>,
}

impl ProcessContext {
    pub(crate) fn new(sim: Rc<RefCell<SimulationState>>, pid: ProcessId, name: Rc<str>) -> Self {
        Self { sim, pid, name }
    }

    /// Current simulation time.
    pub fn time(&self) -> f64 {
        self.sim.borrow().time()
    }

    /// Identifier of the owning process.
    pub fn id(&self) -> ProcessId {
        self.pid
    }

    /// Name of the owning process, used in log lines.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Creates a fresh pending event, to be triggered by user code.
    pub fn event(&self) -> Event {
        Event::new(&self.sim, "event")
    }

    /// Event triggering after `delay` time units, with no payload.
    ///
    /// Panics on a negative delay; use [`Event::trigger_delayed`] for a
    /// fallible schedule.
    pub fn timeout(&self, delay: f64) -> Event {
        self.make_timeout(delay, None)
    }

    /// Event triggering after `delay` time units, delivering `value`.
    pub fn timeout_with<T: EventData>(&self, delay: f64, value: T) -> Event {
        self.make_timeout(delay, payload(value))
    }

    fn make_timeout(&self, delay: f64, value: EventValue) -> Event {
        assert!(delay >= 0.0, "negative delays are not allowed");
        let event = Event::new(&self.sim, "timeout");
        // infallible: non-negative delay, fresh event
        let scheduled = event.trigger_delayed(value, delay);
        debug_assert!(scheduled.is_ok());
        event
    }

    /// Suspends the process until `event` is processed, resolving to its
    /// value, or to `Err(Interrupt)` if the process is interrupted first.
    pub fn wait(&self, event: &Event) -> EventFuture {
        log::trace!(
            target: "simproc",
            "[{:.3}] process {} ({}) waits for event {} ({})",
            self.time(),
            self.pid,
            self.name,
            event.id(),
            event.label()
        );
        EventFuture::new(event.clone(), self.sim.clone(), self.pid)
    }

    /// Suspends the process for `delay` time units.
    pub fn sleep(&self, delay: f64) -> EventFuture {
        let timeout = self.timeout(delay);
        EventFuture::new(timeout, self.sim.clone(), self.pid)
    }

    /// Composite event firing once every listed event has fired.
    pub fn all_of(&self, events: &[Event]) -> Event {
        condition::all_of(&self.sim, events)
    }

    /// Composite event firing when the first listed event fires. The caller
    /// is responsible for cancelling losing requests; see the crate docs.
    pub fn any_of(&self, events: &[Event]) -> Event {
        condition::any_of(&self.sim, events)
    }

    /// Spawns a child process; its first resumption is scheduled at the
    /// current time.
    pub fn spawn<F, Fut>(&self, name: &str, body: F) -> ProcessHandle
    where
        F: FnOnce(ProcessContext) -> Fut,
        Fut: Future<Output = Result<(), ProcessError>> + 'static,
    {
        spawn_process(&self.sim, name, body)
    }

    /// Forcibly resumes a suspended process without a cause payload.
    ///
    /// Under [`InterruptPolicy::Strict`](crate::InterruptPolicy::Strict) this
    /// fails with [`SimError::NotInterruptible`] if the target is not
    /// suspended; under `Lenient` it is a no-op.
    pub fn interrupt(&self, target: &ProcessHandle) -> Result<(), SimError> {
        interrupt_process(&self.sim, target, None)
    }

    /// Forcibly resumes a suspended process, delivering `cause` to its
    /// current wait.
    pub fn interrupt_with<T: EventData>(
        &self,
        target: &ProcessHandle,
        cause: T,
    ) -> Result<(), SimError> {
        interrupt_process(&self.sim, target, payload(cause))
    }

    /// Uniform random float in `[0, 1)` from the simulation-wide generator.
    pub fn rand(&self) -> f64 {
        self.sim.borrow_mut().rand()
    }

    /// Random value uniformly distributed over `range`.
    pub fn gen_range<T, R>(&self, range: R) -> T
    where
        T: SampleUniform,
        R: SampleRange<T>,
    {
        self.sim.borrow_mut().gen_range(range)
    }

    /// Random value drawn from the given distribution.
    pub fn sample<T, D: Distribution<T>>(&self, dist: &D) -> T {
        self.sim.borrow_mut().sample(dist)
    }
}
