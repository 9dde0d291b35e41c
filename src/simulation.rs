//! Simulation construction and the event loop.

use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;

use rand::distributions::uniform::{SampleRange, SampleUniform};
use rand::distributions::Distribution;

use crate::condition;
use crate::errors::{ProcessError, ProcessFailure, SimError};
use crate::event::{self, Event, EventData};
use crate::process::{
    interrupt_process, spawn_process, ProcessHandle, ProcessState,
};
use crate::resources::{Container, Resource, Store};
use crate::state::SimulationState;
use crate::trace::TraceEntry;

/// Behavior of `interrupt` on a target that is not currently suspended.
///
/// The choice is explicit and documented, never silently swallowed: `Strict`
/// fails with [`SimError::NotInterruptible`], `Lenient` makes the call a
/// no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InterruptPolicy {
    /// Interrupting a non-suspended process is an error.
    #[default]
    Strict,
    /// Interrupting a non-suspended process does nothing.
    Lenient,
}

/// Simulation parameters. Passed explicitly to the constructor; there is no
/// global configuration.
#[derive(Debug, Clone, Copy)]
pub struct SimulationConfig {
    /// Initial value of the simulation clock.
    pub start_time: f64,
    /// See [`InterruptPolicy`].
    pub interrupt_policy: InterruptPolicy,
    /// Record a [`TraceEntry`] for every processed event.
    pub trace: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            start_time: 0.0,
            interrupt_policy: InterruptPolicy::default(),
            trace: false,
        }
    }
}

/// The main interface for configuring and executing a simulation.
///
/// Owns the clock, the event queue, the process table and the deterministic
/// RNG. Identical programs run with identical seeds produce identical event
/// traces.
pub struct Simulation {
    sim: Rc<RefCell<SimulationState>>,
}

impl Simulation {
    /// Creates a simulation with the given random seed and default
    /// configuration.
    pub fn new(seed: u64) -> Self {
        Self::with_config(seed, SimulationConfig::default())
    }

    /// Creates a simulation with the given random seed and configuration.
    pub fn with_config(seed: u64, config: SimulationConfig) -> Self {
        Self {
            sim: Rc::new(RefCell::new(SimulationState::new(
                seed,
                config.start_time,
                config.interrupt_policy,
                config.trace,
            ))),
        }
    }

    /// Current simulation time.
    pub fn time(&self) -> f64 {
        self.sim.borrow().time()
    }

    /// Label used by the log macros.
    pub fn name(&self) -> &str {
        "simulation"
    }

    /// Number of processed events.
    pub fn event_count(&self) -> u64 {
        self.sim.borrow().event_count()
    }

    /// Processes the next event: pops the minimum `(time, priority,
    /// sequence)` entry, advances the clock to its time and runs its
    /// callbacks. Returns `false` if the queue is empty.
    pub fn step(&mut self) -> bool {
        let entry = self.sim.borrow_mut().pop();
        let Some(entry) = entry else {
            return false;
        };
        event::process_entry(&entry.event, entry.value, entry.time);
        let mut state = self.sim.borrow_mut();
        let order = state.bump_event_count();
        if state.trace_enabled() {
            let record = TraceEntry::for_event(order, entry.time, &entry.event);
            state.record(record);
        }
        true
    }

    /// Performs at most `step_count` steps. Returns `true` if there could be
    /// more events to process.
    pub fn steps(&mut self, step_count: u64) -> bool {
        for _ in 0..step_count {
            if !self.step() {
                return false;
            }
        }
        true
    }

    /// Runs until no scheduled events remain. Processes still suspended at
    /// that point are reported at warn level: they will never resume.
    pub fn step_until_no_events(&mut self) {
        while self.step() {}
        let mut stranded: Vec<String> = {
            let state = self.sim.borrow();
            state
                .processes
                .values()
                .filter(|slot| slot.state == ProcessState::Suspended)
                .map(|slot| slot.name.to_string())
                .collect()
        };
        stranded.sort();
        for name in stranded {
            log::warn!(
                target: "simproc",
                "[{:.3}] process {} is still suspended and will never resume",
                self.time(),
                name
            );
        }
    }

    /// Processes events up to and including time `until`, then sets the
    /// clock to `until` without processing later events. A horizon earlier
    /// than the current time leaves the clock unchanged.
    pub fn step_until_time(&mut self, until: f64) {
        loop {
            match self.sim.borrow().peek_time() {
                Some(time) if time <= until => {}
                _ => break,
            }
            self.step();
        }
        self.sim.borrow_mut().advance_to(until);
    }

    /// Equivalent to [`Simulation::step_until_time`] at `now + duration`.
    pub fn step_for_duration(&mut self, duration: f64) {
        let until = self.time() + duration;
        self.step_until_time(until);
    }

    /// Spawns a root process; its first resumption is scheduled at the
    /// current time. Spawn order is preserved among same-time resumptions.
    pub fn spawn<F, Fut>(&mut self, name: &str, body: F) -> ProcessHandle
    where
        F: FnOnce(crate::ProcessContext) -> Fut,
        Fut: Future<Output = Result<(), ProcessError>> + 'static,
    {
        spawn_process(&self.sim, name, body)
    }

    /// Current state of a spawned process.
    pub fn process_state(&self, handle: &ProcessHandle) -> Option<ProcessState> {
        self.sim
            .borrow()
            .processes
            .get(&handle.pid)
            .map(|slot| slot.state)
    }

    /// Failures of completed processes, aggregated over the whole run. The
    /// kernel never masks a process death: each failure is also logged at
    /// error level when it happens.
    pub fn failures(&self) -> Vec<ProcessFailure> {
        self.sim.borrow().failures.clone()
    }

    /// Interrupts a suspended process from outside the simulation.
    pub fn interrupt(&mut self, target: &ProcessHandle) -> Result<(), SimError> {
        interrupt_process(&self.sim, target, None)
    }

    /// Interrupts a suspended process, delivering `cause` to its current
    /// wait.
    pub fn interrupt_with<T: EventData>(
        &mut self,
        target: &ProcessHandle,
        cause: T,
    ) -> Result<(), SimError> {
        interrupt_process(&self.sim, target, crate::event::payload(cause))
    }

    /// Creates a fresh pending event, to be triggered by the caller.
    pub fn event(&self) -> Event {
        Event::new(&self.sim, "event")
    }

    /// Composite event firing once every listed event has fired.
    pub fn all_of(&self, events: &[Event]) -> Event {
        condition::all_of(&self.sim, events)
    }

    /// Composite event firing when the first listed event fires.
    pub fn any_of(&self, events: &[Event]) -> Event {
        condition::any_of(&self.sim, events)
    }

    /// Creates a resource with FIFO queuing.
    pub fn create_resource(&self, name: &str, capacity: usize) -> Resource {
        Resource::new(&self.sim, name, capacity, false)
    }

    /// Creates a resource whose queue is ordered by request priority, ties
    /// broken by arrival order.
    pub fn create_priority_resource(&self, name: &str, capacity: usize) -> Resource {
        Resource::new(&self.sim, name, capacity, true)
    }

    /// Creates a continuous-level container with the given capacity and
    /// initial level.
    pub fn create_container(&self, name: &str, capacity: f64, init: f64) -> Container {
        Container::new(&self.sim, name, capacity, init)
    }

    /// Creates a bounded typed-item store.
    pub fn create_store<T: EventData + Clone>(&self, name: &str, capacity: usize) -> Store<T> {
        Store::new(&self.sim, name, capacity)
    }

    /// Recorded event trace, empty unless enabled in the configuration.
    pub fn trace(&self) -> Vec<TraceEntry> {
        self.sim.borrow().trace().to_vec()
    }

    /// Uniform random float in `[0, 1)` from the simulation-wide generator.
    pub fn rand(&mut self) -> f64 {
        self.sim.borrow_mut().rand()
    }

    /// Random value uniformly distributed over `range`.
    pub fn gen_range<T, R>(&mut self, range: R) -> T
    where
        T: SampleUniform,
        R: SampleRange<T>,
    {
        self.sim.borrow_mut().gen_range(range)
    }

    /// Random value drawn from the given distribution.
    pub fn sample<T, D: Distribution<T>>(&mut self, dist: &D) -> T {
        self.sim.borrow_mut().sample(dist)
    }
}
