//! Continuous-level container (fluid, energy, bulk stock) with blocking
//! get/put.

use std::cell::RefCell;
use std::rc::Rc;

use crate::errors::SimError;
use crate::event::Event;
use crate::state::{SimulationState, EPSILON};

#[derive(Clone, Copy, PartialEq, Eq)]
enum OpKind {
    Put,
    Get,
}

struct Op {
    kind: OpKind,
    amount: f64,
    event: Event,
}

struct ContainerShared {
    name: Rc<str>,
    capacity: f64,
    level: f64,
    // puts and gets share one queue, kept in issue order
    queue: Vec<Op>,
}

impl ContainerShared {
    fn fits(&self, kind: OpKind, amount: f64) -> bool {
        match kind {
            OpKind::Put => self.level + amount <= self.capacity + EPSILON,
            OpKind::Get => amount <= self.level + EPSILON,
        }
    }

    fn apply(&mut self, kind: OpKind, amount: f64) {
        match kind {
            OpKind::Put => self.level += amount,
            OpKind::Get => self.level -= amount,
        }
        // kill float drift at the boundaries
        self.level = self.level.clamp(0.0, self.capacity);
    }

    /// Rescans the queue in issue order after every level change, granting
    /// every operation that now fits. Requests are granted whole or not at
    /// all; a full pass with no grant terminates the scan.
    fn settle(&mut self) {
        loop {
            let Some(at) = self
                .queue
                .iter()
                .position(|op| self.fits(op.kind, op.amount))
            else {
                break;
            };
            let op = self.queue.remove(at);
            self.apply(op.kind, op.amount);
            op.event.force_trigger(None);
            log::trace!(
                target: "simproc",
                "container {} granted queued {} of {:.3} (level {:.3})",
                self.name,
                match op.kind {
                    OpKind::Put => "put",
                    OpKind::Get => "get",
                },
                op.amount,
                self.level
            );
        }
    }
}

/// A continuous-level primitive with `level` in `[0, capacity]`.
///
/// `put`/`get` block (queue) until the post-condition is satisfiable; partial
/// grants never happen. Clones share the same underlying container.
#[derive(Clone)]
pub struct Container {
    shared: Rc<RefCell<ContainerShared>>,
    sim: Rc<RefCell<SimulationState>>,
}

impl Container {
    pub(crate) fn new(
        sim: &Rc<RefCell<SimulationState>>,
        name: &str,
        capacity: f64,
        init: f64,
    ) -> Self {
        assert!(capacity > 0.0, "container capacity must be positive");
        assert!(
            (0.0..=capacity).contains(&init),
            "initial level must be within [0, capacity]"
        );
        Self {
            shared: Rc::new(RefCell::new(ContainerShared {
                name: Rc::from(name),
                capacity,
                level: init,
                queue: Vec::new(),
            })),
            sim: sim.clone(),
        }
    }

    /// Adds `amount` to the level, blocking while the result would exceed the
    /// capacity. Returns the grant event.
    ///
    /// Fails eagerly with [`SimError::CapacityExceeded`] for amounts that can
    /// never be satisfied (non-positive, or larger than the capacity).
    pub fn put(&self, amount: f64) -> Result<Event, SimError> {
        self.op(OpKind::Put, amount)
    }

    /// Removes `amount` from the level, blocking while the level is too low.
    /// Returns the grant event; amounts are never partially granted.
    pub fn get(&self, amount: f64) -> Result<Event, SimError> {
        self.op(OpKind::Get, amount)
    }

    fn op(&self, kind: OpKind, amount: f64) -> Result<Event, SimError> {
        let mut shared = self.shared.borrow_mut();
        if !(amount > 0.0) || amount > shared.capacity + EPSILON {
            return Err(SimError::CapacityExceeded);
        }
        let event = Event::new(
            &self.sim,
            match kind {
                OpKind::Put => "container.put",
                OpKind::Get => "container.get",
            },
        );
        if shared.fits(kind, amount) {
            shared.apply(kind, amount);
            event.force_trigger(None);
            // a put may unblock queued gets and vice versa
            shared.settle();
        } else {
            shared.queue.push(Op {
                kind,
                amount,
                event: event.clone(),
            });
        }
        Ok(event)
    }

    /// Non-blocking put: applies immediately or fails with
    /// [`SimError::CapacityExceeded`].
    pub fn try_put(&self, amount: f64) -> Result<(), SimError> {
        self.try_op(OpKind::Put, amount)
    }

    /// Non-blocking get: applies immediately or fails with
    /// [`SimError::CapacityExceeded`].
    pub fn try_get(&self, amount: f64) -> Result<(), SimError> {
        self.try_op(OpKind::Get, amount)
    }

    fn try_op(&self, kind: OpKind, amount: f64) -> Result<(), SimError> {
        let mut shared = self.shared.borrow_mut();
        if !(amount > 0.0) || !shared.fits(kind, amount) {
            return Err(SimError::CapacityExceeded);
        }
        shared.apply(kind, amount);
        shared.settle();
        Ok(())
    }

    /// Cancels a still-queued put/get identified by its grant event. Fails
    /// with [`SimError::InvalidCancellation`] once granted.
    pub fn cancel(&self, event: &Event) -> Result<(), SimError> {
        let mut shared = self.shared.borrow_mut();
        match shared.queue.iter().position(|op| op.event.id() == event.id()) {
            Some(at) => {
                shared.queue.remove(at);
                Ok(())
            }
            None => Err(SimError::InvalidCancellation),
        }
    }

    /// Current level.
    pub fn level(&self) -> f64 {
        self.shared.borrow().level
    }

    /// Configured capacity.
    pub fn capacity(&self) -> f64 {
        self.shared.borrow().capacity
    }

    /// Number of queued operations.
    pub fn queue_len(&self) -> usize {
        self.shared.borrow().queue.len()
    }

    /// Name of the container.
    pub fn name(&self) -> String {
        self.shared.borrow().name.to_string()
    }
}
