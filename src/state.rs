//! Internal simulation state: clock, event queue, counters, RNG and trace.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use rand::distributions::uniform::{SampleRange, SampleUniform};
use rand::prelude::*;
use rand_pcg::Pcg64;
use rustc_hash::FxHashMap;

use crate::errors::{ProcessFailure, SimError};
use crate::event::{Event, EventValue};
use crate::process::{ProcessId, ProcessSlot};
use crate::simulation::InterruptPolicy;
use crate::trace::TraceEntry;

/// Tolerance used when comparing simulation times.
pub const EPSILON: f64 = 1e-12;

/// Queue priority of a scheduled event. Among entries with equal time, lower
/// priorities are processed first; ties are broken by scheduling order.
pub type Priority = i32;

/// Default priority of scheduled events.
pub const PRIORITY_NORMAL: Priority = 0;

// Interrupt deliveries outrun every same-time entry.
pub(crate) const PRIORITY_URGENT: Priority = i32::MIN;

pub(crate) struct ScheduledEntry {
    pub time: f64,
    pub priority: Priority,
    pub sequence: u64,
    pub event: Event,
    // applied to the event if it is still pending when the entry pops
    pub value: EventValue,
}

impl PartialEq for ScheduledEntry {
    fn eq(&self, other: &Self) -> bool {
        self.sequence == other.sequence
    }
}

impl Eq for ScheduledEntry {}

impl PartialOrd for ScheduledEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // reversed lexicographic (time, priority, sequence) for the max-heap
        other
            .time
            .total_cmp(&self.time)
            .then_with(|| other.priority.cmp(&self.priority))
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

pub(crate) struct SimulationState {
    clock: f64,
    sequence: u64,
    next_event_id: u64,
    next_process_id: ProcessId,
    events: BinaryHeap<ScheduledEntry>,
    event_count: u64,
    rng: Pcg64,
    trace: Option<Vec<TraceEntry>>,
    pub processes: FxHashMap<ProcessId, ProcessSlot>,
    pub failures: Vec<ProcessFailure>,
    pub interrupt_policy: InterruptPolicy,
}

impl SimulationState {
    pub fn new(
        seed: u64,
        start_time: f64,
        interrupt_policy: InterruptPolicy,
        trace_enabled: bool,
    ) -> Self {
        assert!(
            start_time >= 0.0,
            "simulation start time must be non-negative"
        );
        Self {
            clock: start_time,
            sequence: 0,
            next_event_id: 0,
            next_process_id: 0,
            events: BinaryHeap::new(),
            event_count: 0,
            rng: Pcg64::seed_from_u64(seed),
            trace: trace_enabled.then(Vec::new),
            processes: FxHashMap::default(),
            failures: Vec::new(),
            interrupt_policy,
        }
    }

    pub fn time(&self) -> f64 {
        self.clock
    }

    pub fn next_event_id(&mut self) -> u64 {
        let id = self.next_event_id;
        self.next_event_id += 1;
        id
    }

    pub fn next_process_id(&mut self) -> ProcessId {
        let id = self.next_process_id;
        self.next_process_id += 1;
        id
    }

    /// Inserts a queue entry `delay` time units from now.
    pub fn schedule(
        &mut self,
        delay: f64,
        priority: Priority,
        event: Event,
        value: EventValue,
    ) -> Result<(), SimError> {
        if delay < 0.0 {
            return Err(SimError::InvalidSchedule);
        }
        let time = self.clock + delay;
        self.push(time, priority, event, value);
        Ok(())
    }

    /// Inserts a queue entry at the current time. Infallible.
    pub fn schedule_now(&mut self, priority: Priority, event: Event, value: EventValue) {
        self.push(self.clock, priority, event, value);
    }

    fn push(&mut self, time: f64, priority: Priority, event: Event, value: EventValue) {
        let sequence = self.sequence;
        self.sequence += 1;
        log::trace!(
            target: "simproc",
            "[{:.3}] scheduled event {} ({}) for time {:.3}",
            self.clock,
            event.id(),
            event.label(),
            time
        );
        self.events.push(ScheduledEntry {
            time,
            priority,
            sequence,
            event,
            value,
        });
    }

    /// Time of the next entry, if any.
    pub fn peek_time(&self) -> Option<f64> {
        self.events.peek().map(|entry| entry.time)
    }

    /// Pops the minimum entry and advances the clock to its time.
    pub fn pop(&mut self) -> Option<ScheduledEntry> {
        let entry = self.events.pop()?;
        debug_assert!(entry.time + EPSILON >= self.clock);
        self.clock = entry.time;
        Some(entry)
    }

    /// Advances the clock without processing events. Never moves it backwards.
    pub fn advance_to(&mut self, time: f64) {
        if time > self.clock {
            self.clock = time;
        }
    }

    pub fn event_count(&self) -> u64 {
        self.event_count
    }

    pub fn bump_event_count(&mut self) -> u64 {
        let order = self.event_count;
        self.event_count += 1;
        order
    }

    pub fn trace_enabled(&self) -> bool {
        self.trace.is_some()
    }

    pub fn record(&mut self, entry: TraceEntry) {
        if let Some(trace) = &mut self.trace {
            trace.push(entry);
        }
    }

    pub fn trace(&self) -> &[TraceEntry] {
        self.trace.as_deref().unwrap_or(&[])
    }

    pub fn rand(&mut self) -> f64 {
        self.rng.gen()
    }

    pub fn gen_range<T, R>(&mut self, range: R) -> T
    where
        T: SampleUniform,
        R: SampleRange<T>,
    {
        self.rng.gen_range(range)
    }

    pub fn sample<T, D: Distribution<T>>(&mut self, dist: &D) -> T {
        dist.sample(&mut self.rng)
    }
}
