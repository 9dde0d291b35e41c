//! SimProc is a process-oriented discrete event simulation kernel. It provides a deterministic
//! event scheduler, cooperative processes that suspend on events, and the classic shared-resource
//! primitives (resources, containers, stores) with blocking semantics, queuing disciplines and
//! interruption.
//!
//! ## Basic Concepts
//!
//! **Event.** An [`Event`] is a future occurrence that processes can wait on. It starts out
//! pending, becomes triggered when its condition fires, and is processed when the scheduler pops
//! it from the queue and runs its callbacks. Events may carry an arbitrary serializable payload
//! ([`EventData`]). Composite events are built with [`ProcessContext::all_of`] and
//! [`ProcessContext::any_of`].
//!
//! **Process.** A process is a cooperatively scheduled unit of simulated behavior, written as an
//! `async` body. Exactly one body executes at a time and runs uninterrupted between suspension
//! points; a body suspends exactly when it awaits an event (a timeout, a resource grant, a store
//! item) and resumes when the scheduler processes that event. Because bodies never interleave
//! mid-mutation, shared resource state needs no locks.
//!
//! **Resources.** Three primitives cover the common contention patterns: [`Resource`] (limited
//! concurrent holders with a FIFO or priority wait queue), [`Container`] (a continuous level with
//! blocking get/put), and [`Store`] (a bounded typed-item inventory with optional get filters).
//! Capacity violations block by default; `try_*` variants fail instead.
//!
//! **Determinism.** The event queue is ordered by `(time, priority, insertion sequence)`: events
//! at the same time are processed in priority order, then strictly in scheduling order. Together
//! with the seeded simulation-wide RNG this makes runs exactly reproducible; enable the event
//! trace in [`SimulationConfig`] to record and compare runs.
//!
//! ## Example
//!
//! Four cars contend for two washing machines; each wash takes five time units.
//!
//! ```rust
//! use simproc::Simulation;
//!
//! let mut sim = Simulation::new(123);
//! let machines = sim.create_resource("machines", 2);
//! for i in 0..4 {
//!     let machines = machines.clone();
//!     sim.spawn(&format!("car-{}", i), move |ctx| async move {
//!         let req = machines.request();
//!         ctx.wait(req.event()).await?;
//!         ctx.sleep(5.0).await?;
//!         machines.release(&req)?;
//!         Ok(())
//!     });
//! }
//! sim.step_until_no_events();
//! assert_eq!(sim.time(), 10.0);
//! assert!(sim.failures().is_empty());
//! ```
//!
//! ## Waiting for Multiple Events
//!
//! [`ProcessContext::all_of`] resolves once every constituent has fired; [`ProcessContext::any_of`]
//! resolves with the first. Both deliver a [`ConditionValue`] snapshot that reports, for every
//! constituent, whether it had fired; constituents firing at the same instant are all reported,
//! not just the first. The kernel does not auto-cancel the losers of an `any_of` race: a resource
//! request that lost against a timeout stays queued until the caller cancels it explicitly. This
//! is a deliberate, documented caller obligation.
//!
//! ## Interruption
//!
//! [`ProcessContext::interrupt_with`] forcibly resumes a suspended process: its current wait
//! resolves to an [`Interrupt`] carrying the cause payload, and the process decides whether to
//! react or resume its prior activity (the interrupted request itself stays pending). Interrupting
//! a process that is not suspended is governed by [`InterruptPolicy`]: an error under `Strict`
//! (the default), a no-op under `Lenient`.
//!
//! ## Failures
//!
//! A body that completes with an error terminates only that process. The failure is logged when it
//! happens and aggregated in [`Simulation::failures`] for the run caller; the process's completion
//! event still triggers so dependents waiting on it do not deadlock.

#![warn(missing_docs)]
#![allow(clippy::needless_doctest_main)]

pub mod condition;
pub mod context;
pub mod errors;
pub mod event;
pub mod log;
pub mod process;
pub mod resources;
pub mod simulation;
mod state;
pub mod trace;

pub use colored;
pub use condition::ConditionValue;
pub use context::ProcessContext;
pub use errors::{ProcessError, ProcessFailure, SimError};
pub use event::{extract, payload, Event, EventData, EventId, EventState, EventValue};
pub use process::{EventFuture, Interrupt, ProcessHandle, ProcessId, ProcessState};
pub use resources::{Container, RequestHandle, Resource, Store};
pub use simulation::{InterruptPolicy, Simulation, SimulationConfig};
pub use state::{Priority, EPSILON, PRIORITY_NORMAL};
pub use trace::TraceEntry;
