//! Store matching, filters and blocking semantics.

use std::cell::RefCell;
use std::rc::Rc;

use serde::Serialize;
use simproc::{extract, SimError, Simulation};

fn init_log() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[derive(Clone, Debug, PartialEq, Serialize)]
enum Part {
    Bolt,
    Gear,
}

#[test]
fn items_are_served_to_getters_in_arrival_order() {
    init_log();
    let mut sim = Simulation::new(11);
    let shelf = sim.create_store::<u32>("shelf", 4);
    let first = shelf.get();
    let second = shelf.get();
    shelf.put(1);
    shelf.put(2);
    sim.step_until_no_events();
    assert_eq!(extract::<u32>(first.value()), Some(1));
    assert_eq!(extract::<u32>(second.value()), Some(2));
    assert!(shelf.is_empty());
}

#[test]
fn filtered_get_waits_without_blocking_later_getters() {
    init_log();
    let mut sim = Simulation::new(11);
    let shelf = sim.create_store::<Part>("shelf", 1);

    let want_gear = shelf.get_filtered(|part| *part == Part::Gear);
    shelf.put(Part::Bolt);
    let queued_put = shelf.put(Part::Gear);
    // the store is full with a bolt; the gear put waits
    assert!(queued_put.is_pending());
    assert_eq!(shelf.len(), 1);
    assert_eq!(shelf.put_queue_len(), 1);

    // a later unfiltered getter takes the bolt past the waiting filtered one
    let want_any = shelf.get();
    sim.step_until_no_events();
    assert_eq!(extract::<Part>(want_any.value()), Some(Part::Bolt));
    // the freed slot admitted the gear, which matched the filtered getter
    assert_eq!(extract::<Part>(want_gear.value()), Some(Part::Gear));
    assert!(queued_put.is_processed());
    assert!(shelf.is_empty());
}

#[test]
fn put_blocks_while_the_store_is_full() {
    init_log();
    let mut sim = Simulation::new(11);
    let shelf = sim.create_store::<u32>("shelf", 1);
    shelf.put(1);
    let blocked = shelf.put(2);
    assert!(blocked.is_pending());

    let done_at = Rc::new(RefCell::new(None));
    {
        let shelf = shelf.clone();
        let blocked = blocked.clone();
        let done_at = done_at.clone();
        sim.spawn("consumer", move |ctx| async move {
            ctx.sleep(3.0).await?;
            let item = ctx.wait(&shelf.get()).await?;
            assert_eq!(extract::<u32>(item), Some(1));
            ctx.wait(&blocked).await?;
            *done_at.borrow_mut() = Some(ctx.time());
            Ok(())
        });
    }
    sim.step_until_no_events();
    assert_eq!(*done_at.borrow(), Some(3.0));
    assert_eq!(shelf.len(), 1);
    assert!(sim.failures().is_empty());
}

#[test]
fn try_put_fails_when_full() {
    init_log();
    let sim = Simulation::new(11);
    let shelf = sim.create_store::<u32>("shelf", 2);
    assert_eq!(shelf.try_put(1), Ok(()));
    assert_eq!(shelf.try_put(2), Ok(()));
    assert_eq!(shelf.try_put(3), Err(SimError::CapacityExceeded));
    assert_eq!(shelf.len(), 2);
    assert_eq!(shelf.put_queue_len(), 0);
}

#[test]
fn pending_operations_can_be_cancelled() {
    init_log();
    let mut sim = Simulation::new(11);
    let shelf = sim.create_store::<u32>("shelf", 1);
    let pending_get = shelf.get();
    assert_eq!(shelf.cancel_get(&pending_get), Ok(()));
    assert_eq!(shelf.get_queue_len(), 0);
    assert_eq!(
        shelf.cancel_get(&pending_get),
        Err(SimError::InvalidCancellation)
    );

    shelf.put(1);
    let pending_put = shelf.put(2);
    assert_eq!(shelf.cancel_put(&pending_put), Ok(()));
    assert_eq!(shelf.put_queue_len(), 0);
    // granted puts are not cancellable
    let granted = shelf.get();
    sim.step_until_no_events();
    assert!(granted.is_processed());
    assert_eq!(shelf.cancel_put(&granted), Err(SimError::InvalidCancellation));
}

#[test]
fn getter_suspends_until_an_item_arrives() {
    init_log();
    let mut sim = Simulation::new(11);
    let shelf = sim.create_store::<Part>("shelf", 4);
    let received = Rc::new(RefCell::new(None));
    {
        let shelf = shelf.clone();
        let received = received.clone();
        sim.spawn("consumer", move |ctx| async move {
            let item = ctx.wait(&shelf.get()).await?;
            *received.borrow_mut() = Some((ctx.time(), extract::<Part>(item)));
            Ok(())
        });
    }
    {
        let shelf = shelf.clone();
        sim.spawn("producer", move |ctx| async move {
            ctx.sleep(1.5).await?;
            shelf.put(Part::Gear);
            Ok(())
        });
    }
    sim.step_until_no_events();
    assert_eq!(*received.borrow(), Some((1.5, Some(Part::Gear))));
}
