//! Resource queuing, priorities, cancellation and release semantics.

use std::cell::RefCell;
use std::rc::Rc;

use simproc::{extract, ConditionValue, SimError, Simulation};

fn init_log() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn queued_request_is_granted_on_release() {
    init_log();
    let mut sim = Simulation::new(7);
    let machine = sim.create_resource("machine", 1);
    let grants = Rc::new(RefCell::new(Vec::new()));
    for (name, hold) in [("p1", 3.0), ("p2", 2.0)] {
        let machine = machine.clone();
        let grants = grants.clone();
        sim.spawn(name, move |ctx| async move {
            let req = machine.request();
            ctx.wait(req.event()).await?;
            grants.borrow_mut().push((name, ctx.time()));
            ctx.sleep(hold).await?;
            machine.release(&req)?;
            Ok(())
        });
    }
    sim.step_until_no_events();
    assert_eq!(*grants.borrow(), vec![("p1", 0.0), ("p2", 3.0)]);
    assert_eq!(sim.time(), 5.0);
    assert_eq!(machine.count(), 0);
    assert!(sim.failures().is_empty());
}

#[test]
fn priority_queue_orders_waiters_by_priority_then_arrival() {
    init_log();
    let mut sim = Simulation::new(7);
    let machine = sim.create_priority_resource("machine", 1);
    let holder = machine.request();
    sim.step_until_no_events();
    assert!(holder.event().is_processed());

    let order = Rc::new(RefCell::new(Vec::new()));
    let waiters = [("low", 5), ("high-a", 1), ("high-b", 1)];
    let mut handles = Vec::new();
    for (name, priority) in waiters {
        let req = machine.request_with_priority(priority);
        let order = order.clone();
        req.event().add_callback(move |_| order.borrow_mut().push(name));
        handles.push(req);
    }
    assert_eq!(machine.queue_len(), 3);

    machine.release(&holder).unwrap();
    sim.step_until_no_events();
    // capacity 1: only the head of the queue was granted
    assert_eq!(*order.borrow(), vec!["high-a"]);

    for req in &handles {
        let _ = machine.release(req);
    }
    sim.step_until_no_events();
    assert_eq!(*order.borrow(), vec!["high-a", "high-b", "low"]);
}

#[test]
fn fifo_resource_ignores_request_priorities() {
    init_log();
    let mut sim = Simulation::new(7);
    let machine = sim.create_resource("machine", 1);
    let holder = machine.request();
    let order = Rc::new(RefCell::new(Vec::new()));
    let mut handles = Vec::new();
    for (name, priority) in [("first", 9), ("second", 0)] {
        let req = machine.request_with_priority(priority);
        let order = order.clone();
        req.event().add_callback(move |_| order.borrow_mut().push(name));
        handles.push(req);
    }
    machine.release(&holder).unwrap();
    sim.step_until_no_events();
    machine.release(&handles[0]).unwrap();
    sim.step_until_no_events();
    assert_eq!(*order.borrow(), vec!["first", "second"]);
}

#[test]
fn cancel_and_release_reject_invalid_handles() {
    init_log();
    let mut sim = Simulation::new(7);
    let machine = sim.create_resource("machine", 1);
    let granted = machine.request();
    let pending = machine.request();
    sim.step_until_no_events();

    // a granted request cannot be cancelled, only released
    assert_eq!(machine.cancel(&granted), Err(SimError::InvalidCancellation));
    // a pending request cannot be released
    assert_eq!(machine.release(&pending), Err(SimError::InvalidRelease));

    assert_eq!(machine.cancel(&pending), Ok(()));
    assert_eq!(machine.queue_len(), 0);
    // double cancellation
    assert_eq!(machine.cancel(&pending), Err(SimError::InvalidCancellation));

    assert_eq!(machine.release(&granted), Ok(()));
    assert_eq!(machine.release(&granted), Err(SimError::InvalidRelease));
}

#[test]
fn cancelled_request_is_skipped_on_release() {
    init_log();
    let mut sim = Simulation::new(7);
    let machine = sim.create_resource("machine", 1);
    let holder = machine.request();
    let abandoned = machine.request();
    let kept = machine.request();
    sim.step_until_no_events();

    machine.cancel(&abandoned).unwrap();
    machine.release(&holder).unwrap();
    sim.step_until_no_events();
    assert!(kept.event().is_processed());
    assert!(abandoned.event().is_pending());
    assert_eq!(machine.count(), 1);
}

#[test]
fn timed_out_request_must_be_cancelled_by_the_caller() {
    init_log();
    let mut sim = Simulation::new(7);
    // zero capacity: no request is ever granted
    let machine = sim.create_resource("machine", 0);
    let outcome = Rc::new(RefCell::new(None));
    {
        let machine = machine.clone();
        let outcome = outcome.clone();
        sim.spawn("impatient", move |ctx| async move {
            let req = machine.request();
            let deadline = ctx.timeout(4.0);
            let race = ctx.any_of(&[req.event().clone(), deadline.clone()]);
            let value = ctx.wait(&race).await?;
            let value = extract::<ConditionValue>(value)
                .ok_or_else(|| simproc::ProcessError::msg("no condition value"))?;
            if value.fired(&deadline) && !value.fired(req.event()) {
                // the loser of the race stays queued until cancelled
                machine.cancel(&req)?;
                *outcome.borrow_mut() = Some(("timed out", ctx.time()));
            } else {
                machine.release(&req)?;
                *outcome.borrow_mut() = Some(("granted", ctx.time()));
            }
            Ok(())
        });
    }
    sim.step_until_no_events();
    assert_eq!(*outcome.borrow(), Some(("timed out", 4.0)));
    assert_eq!(machine.queue_len(), 0);
    assert_eq!(machine.count(), 0);
    assert!(sim.failures().is_empty());
}
