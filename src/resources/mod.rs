//! Shared resource primitives with blocking semantics.
//!
//! All three primitives hand out grant [`Event`](crate::Event)s: a request
//! that can be satisfied immediately triggers at the current time, otherwise
//! it joins a wait queue and triggers when capacity frees up. Capacity
//! violations block by default; the `try_*` variants fail with
//! [`SimError::CapacityExceeded`](crate::SimError::CapacityExceeded) instead.
//! Still-pending requests can be cancelled; cancelling a granted request
//! fails with `InvalidCancellation`.

mod container;
mod resource;
mod store;

pub use container::Container;
pub use resource::{RequestHandle, Resource};
pub use store::Store;
