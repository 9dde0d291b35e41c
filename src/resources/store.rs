//! Bounded typed-item inventory with blocking, filterable get/put.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::errors::SimError;
use crate::event::{payload, Event, EventData};
use crate::state::SimulationState;

type Filter<T> = Box<dyn Fn(&T) -> bool>;

struct PendingGet<T> {
    event: Event,
    filter: Option<Filter<T>>,
}

impl<T> PendingGet<T> {
    fn matches(&self, item: &T) -> bool {
        match &self.filter {
            Some(filter) => filter(item),
            None => true,
        }
    }
}

struct PendingPut<T> {
    event: Event,
    item: T,
}

struct StoreShared<T> {
    name: Rc<str>,
    capacity: usize,
    items: VecDeque<T>,
    // both queues kept in arrival order
    gets: Vec<PendingGet<T>>,
    puts: VecDeque<PendingPut<T>>,
}

impl<T: EventData + Clone> StoreShared<T> {
    /// Admits queued puts while there is room, then services queued getters
    /// strictly in arrival order. A getter whose filter matches no current
    /// item stays pending without blocking getters behind it. Repeats until a
    /// full pass makes no progress.
    fn settle(&mut self) {
        loop {
            let mut progress = false;
            while self.items.len() < self.capacity {
                let Some(put) = self.puts.pop_front() else {
                    break;
                };
                self.items.push_back(put.item);
                put.event.force_trigger(None);
                progress = true;
            }
            let mut at = 0;
            while at < self.gets.len() {
                let found = self
                    .items
                    .iter()
                    .position(|item| self.gets[at].matches(item));
                match found {
                    Some(slot) => {
                        if let Some(item) = self.items.remove(slot) {
                            let get = self.gets.remove(at);
                            get.event.force_trigger(payload(item));
                            progress = true;
                        }
                    }
                    None => at += 1,
                }
            }
            if !progress {
                break;
            }
        }
    }
}

/// A finite-capacity inventory of typed items, matched to getters in FIFO
/// order.
///
/// A filtered get only matches items satisfying its predicate; while it waits
/// it does not block later getters from taking other items (non-blocking
/// skip). Clones share the same underlying store.
pub struct Store<T: EventData + Clone> {
    shared: Rc<RefCell<StoreShared<T>>>,
    sim: Rc<RefCell<SimulationState>>,
}

impl<T: EventData + Clone> Clone for Store<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
            sim: self.sim.clone(),
        }
    }
}

impl<T: EventData + Clone> Store<T> {
    pub(crate) fn new(sim: &Rc<RefCell<SimulationState>>, name: &str, capacity: usize) -> Self {
        assert!(capacity > 0, "store capacity must be positive");
        Self {
            shared: Rc::new(RefCell::new(StoreShared {
                name: Rc::from(name),
                capacity,
                items: VecDeque::new(),
                gets: Vec::new(),
                puts: VecDeque::new(),
            })),
            sim: sim.clone(),
        }
    }

    /// Stores an item, blocking while the store is full. Returns the grant
    /// event; once it triggers, the item has been appended.
    pub fn put(&self, item: T) -> Event {
        let event = Event::new(&self.sim, "store.put");
        let mut shared = self.shared.borrow_mut();
        shared.puts.push_back(PendingPut {
            event: event.clone(),
            item,
        });
        shared.settle();
        event
    }

    /// Retrieves the oldest item, blocking while the store is empty. The
    /// grant event's value is the item.
    pub fn get(&self) -> Event {
        self.get_impl(None)
    }

    /// Retrieves the oldest item satisfying `filter`, blocking until one is
    /// available. While waiting, getters that arrived later may take other
    /// items.
    pub fn get_filtered<F: Fn(&T) -> bool + 'static>(&self, filter: F) -> Event {
        self.get_impl(Some(Box::new(filter)))
    }

    fn get_impl(&self, filter: Option<Filter<T>>) -> Event {
        let event = Event::new(&self.sim, "store.get");
        let mut shared = self.shared.borrow_mut();
        shared.gets.push(PendingGet {
            event: event.clone(),
            filter,
        });
        shared.settle();
        event
    }

    /// Non-blocking put: appends immediately or fails with
    /// [`SimError::CapacityExceeded`] when the store is full.
    pub fn try_put(&self, item: T) -> Result<(), SimError> {
        let mut shared = self.shared.borrow_mut();
        if shared.items.len() >= shared.capacity {
            return Err(SimError::CapacityExceeded);
        }
        shared.items.push_back(item);
        shared.settle();
        Ok(())
    }

    /// Cancels a still-pending get identified by its grant event. Fails with
    /// [`SimError::InvalidCancellation`] once granted.
    pub fn cancel_get(&self, event: &Event) -> Result<(), SimError> {
        let mut shared = self.shared.borrow_mut();
        match shared.gets.iter().position(|g| g.event.id() == event.id()) {
            Some(at) => {
                shared.gets.remove(at);
                Ok(())
            }
            None => Err(SimError::InvalidCancellation),
        }
    }

    /// Cancels a still-pending put identified by its grant event. Fails with
    /// [`SimError::InvalidCancellation`] once granted.
    pub fn cancel_put(&self, event: &Event) -> Result<(), SimError> {
        let mut shared = self.shared.borrow_mut();
        match shared.puts.iter().position(|p| p.event.id() == event.id()) {
            Some(at) => {
                let _ = shared.puts.remove(at);
                Ok(())
            }
            None => Err(SimError::InvalidCancellation),
        }
    }

    /// Number of stored items.
    pub fn len(&self) -> usize {
        self.shared.borrow().items.len()
    }

    /// True when no items are stored.
    pub fn is_empty(&self) -> bool {
        self.shared.borrow().items.is_empty()
    }

    /// Configured capacity.
    pub fn capacity(&self) -> usize {
        self.shared.borrow().capacity
    }

    /// Number of pending getters.
    pub fn get_queue_len(&self) -> usize {
        self.shared.borrow().gets.len()
    }

    /// Number of pending puts.
    pub fn put_queue_len(&self) -> usize {
        self.shared.borrow().puts.len()
    }

    /// Name of the store.
    pub fn name(&self) -> String {
        self.shared.borrow().name.to_string()
    }
}
