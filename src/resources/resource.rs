//! Finite-capacity mutual-exclusion resource with a FIFO or priority wait
//! queue.

use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashSet;

use crate::errors::SimError;
use crate::event::Event;
use crate::state::{Priority, SimulationState, PRIORITY_NORMAL};

struct Waiting {
    key: u64,
    priority: Priority,
    sequence: u64,
    event: Event,
}

struct ResourceShared {
    name: Rc<str>,
    capacity: usize,
    holders: FxHashSet<u64>,
    // kept in grant order: arrival order, or (priority, arrival) in
    // priority mode
    queue: Vec<Waiting>,
    next_key: u64,
    next_sequence: u64,
    priority_mode: bool,
}

/// Handle identifying one request; used to await the grant, release the
/// resource and cancel a pending request.
#[derive(Clone)]
pub struct RequestHandle {
    key: u64,
    event: Event,
}

impl RequestHandle {
    /// The grant event: triggers when the request is granted.
    pub fn event(&self) -> &Event {
        &self.event
    }
}

/// A finite-capacity resource. `holders.len() <= capacity` holds at all
/// times; excess requests queue.
///
/// Clones share the same underlying resource.
#[derive(Clone)]
pub struct Resource {
    shared: Rc<RefCell<ResourceShared>>,
    sim: Rc<RefCell<SimulationState>>,
}

impl Resource {
    pub(crate) fn new(
        sim: &Rc<RefCell<SimulationState>>,
        name: &str,
        capacity: usize,
        priority_mode: bool,
    ) -> Self {
        Self {
            shared: Rc::new(RefCell::new(ResourceShared {
                name: Rc::from(name),
                capacity,
                holders: FxHashSet::default(),
                queue: Vec::new(),
                next_key: 0,
                next_sequence: 0,
                priority_mode,
            })),
            sim: sim.clone(),
        }
    }

    /// Requests one unit of the resource with default priority.
    ///
    /// Grants immediately (the grant event triggers at the current time) if a
    /// unit is free, otherwise the request queues. The caller must either
    /// [`release`](Resource::release) after being granted or
    /// [`cancel`](Resource::cancel) while still pending; an abandoned wait
    /// (e.g. the losing branch of an `any_of` race) is NOT cancelled
    /// automatically.
    pub fn request(&self) -> RequestHandle {
        self.request_impl(PRIORITY_NORMAL)
    }

    /// Requests one unit with an explicit priority; lower values are granted
    /// first, ties broken by arrival order. The priority is only honored by
    /// resources created in priority mode, otherwise arrival order wins.
    pub fn request_with_priority(&self, priority: Priority) -> RequestHandle {
        self.request_impl(priority)
    }

    fn request_impl(&self, priority: Priority) -> RequestHandle {
        let event = Event::new(&self.sim, "resource.request");
        let mut shared = self.shared.borrow_mut();
        let key = shared.next_key;
        shared.next_key += 1;
        let sequence = shared.next_sequence;
        shared.next_sequence += 1;
        if shared.holders.len() < shared.capacity {
            shared.holders.insert(key);
            event.force_trigger(None);
            log::trace!(
                target: "simproc",
                "resource {} granted request {} immediately ({}/{} held)",
                shared.name,
                key,
                shared.holders.len(),
                shared.capacity
            );
        } else {
            let waiting = Waiting {
                key,
                priority,
                sequence,
                event: event.clone(),
            };
            if shared.priority_mode {
                let at = shared
                    .queue
                    .partition_point(|w| (w.priority, w.sequence) <= (priority, sequence));
                shared.queue.insert(at, waiting);
            } else {
                shared.queue.push(waiting);
            }
            log::trace!(
                target: "simproc",
                "resource {} queued request {} ({} waiting)",
                shared.name,
                key,
                shared.queue.len()
            );
        }
        RequestHandle { key, event }
    }

    /// Releases a held unit and grants queued requests, in queue order, while
    /// capacity allows. Fails with [`SimError::InvalidRelease`] if the handle
    /// does not hold the resource.
    pub fn release(&self, handle: &RequestHandle) -> Result<(), SimError> {
        let mut shared = self.shared.borrow_mut();
        if !shared.holders.remove(&handle.key) {
            return Err(SimError::InvalidRelease);
        }
        while shared.holders.len() < shared.capacity && !shared.queue.is_empty() {
            let waiting = shared.queue.remove(0);
            shared.holders.insert(waiting.key);
            waiting.event.force_trigger(None);
            log::trace!(
                target: "simproc",
                "resource {} granted queued request {}",
                shared.name,
                waiting.key
            );
        }
        Ok(())
    }

    /// Cancels a still-pending request. Cancellation after the grant is
    /// invalid and fails with [`SimError::InvalidCancellation`].
    pub fn cancel(&self, handle: &RequestHandle) -> Result<(), SimError> {
        let mut shared = self.shared.borrow_mut();
        if shared.holders.contains(&handle.key) {
            return Err(SimError::InvalidCancellation);
        }
        match shared.queue.iter().position(|w| w.key == handle.key) {
            Some(at) => {
                shared.queue.remove(at);
                Ok(())
            }
            None => Err(SimError::InvalidCancellation),
        }
    }

    /// Configured capacity.
    pub fn capacity(&self) -> usize {
        self.shared.borrow().capacity
    }

    /// Number of currently held units.
    pub fn count(&self) -> usize {
        self.shared.borrow().holders.len()
    }

    /// Number of queued requests.
    pub fn queue_len(&self) -> usize {
        self.shared.borrow().queue.len()
    }

    /// Name of the resource.
    pub fn name(&self) -> String {
        self.shared.borrow().name.to_string()
    }
}
