//! AND/OR combinator semantics.

use std::cell::RefCell;
use std::rc::Rc;

use simproc::{extract, payload, ConditionValue, Simulation};

fn init_log() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn all_of_outcome(first_delay: f64, second_delay: f64) -> (f64, bool, bool, Option<u32>, Option<u32>) {
    let mut sim = Simulation::new(1);
    let e1 = sim.event();
    let e2 = sim.event();
    e1.trigger_delayed(payload(1u32), first_delay).unwrap();
    e2.trigger_delayed(payload(2u32), second_delay).unwrap();
    let both = sim.all_of(&[e1.clone(), e2.clone()]);
    let fired_at = Rc::new(RefCell::new(None));
    {
        let fired_at = fired_at.clone();
        let both = both.clone();
        sim.spawn("observer", move |ctx| async move {
            ctx.wait(&both).await?;
            *fired_at.borrow_mut() = Some(ctx.time());
            Ok(())
        });
    }
    sim.step_until_no_events();
    let value = extract::<ConditionValue>(both.value()).unwrap();
    let v1 = value.value_of(&e1).and_then(extract::<u32>);
    let v2 = value.value_of(&e2).and_then(extract::<u32>);
    let fired_time = fired_at.borrow().unwrap();
    (
        fired_time,
        value.fired(&e1),
        value.fired(&e2),
        v1,
        v2,
    )
}

#[test]
fn all_of_triggers_after_both_regardless_of_order() {
    init_log();
    let forward = all_of_outcome(2.0, 1.0);
    let reverse = all_of_outcome(1.0, 2.0);
    assert_eq!(forward, (2.0, true, true, Some(1), Some(2)));
    assert_eq!(reverse, (2.0, true, true, Some(1), Some(2)));
}

#[test]
fn any_of_resolves_with_the_first_constituent() {
    init_log();
    let mut sim = Simulation::new(1);
    let fast = sim.event();
    let slow = sim.event();
    fast.trigger_delayed(payload("fast".to_string()), 1.0).unwrap();
    slow.trigger_delayed(payload("slow".to_string()), 4.0).unwrap();
    let race = sim.any_of(&[fast.clone(), slow.clone()]);
    let observed = Rc::new(RefCell::new(None));
    {
        let observed = observed.clone();
        let race = race.clone();
        sim.spawn("observer", move |ctx| async move {
            let value = ctx.wait(&race).await?;
            *observed.borrow_mut() = Some((ctx.time(), extract::<ConditionValue>(value).unwrap()));
            Ok(())
        });
    }
    sim.step_until_no_events();
    let (time, value) = observed.borrow_mut().take().unwrap();
    assert_eq!(time, 1.0);
    assert!(value.fired(&fast));
    assert!(!value.fired(&slow));
    assert_eq!(value.fired_count(), 1);
    assert_eq!(
        value.value_of(&fast).and_then(extract::<String>),
        Some("fast".to_string())
    );
}

#[test]
fn any_of_reports_all_constituents_fired_at_the_same_instant() {
    init_log();
    let mut sim = Simulation::new(1);
    let e1 = sim.event();
    let e2 = sim.event();
    e1.trigger_delayed(None, 5.0).unwrap();
    e2.trigger_delayed(None, 5.0).unwrap();
    let race = sim.any_of(&[e1.clone(), e2.clone()]);
    sim.step_until_no_events();
    assert!(race.is_processed());
    let value = extract::<ConditionValue>(race.value()).unwrap();
    assert_eq!(value.fired_count(), 2);
    assert!(value.fired(&e1));
    assert!(value.fired(&e2));
}

#[test]
fn empty_composites_trigger_immediately() {
    init_log();
    let mut sim = Simulation::new(1);
    let all = sim.all_of(&[]);
    let any = sim.any_of(&[]);
    sim.step_until_no_events();
    assert!(all.is_processed());
    assert!(any.is_processed());
    assert_eq!(sim.time(), 0.0);
    assert!(extract::<ConditionValue>(all.value()).unwrap().is_empty());
}

#[test]
fn all_of_over_already_processed_events_fires() {
    init_log();
    let mut sim = Simulation::new(1);
    let e1 = sim.event();
    let e2 = sim.event();
    e1.trigger_delayed(None, 1.0).unwrap();
    e2.trigger_delayed(None, 2.0).unwrap();
    sim.step_until_no_events();
    // both already processed; the composite must still fire
    let both = sim.all_of(&[e1, e2]);
    sim.step_until_no_events();
    assert!(both.is_processed());
    assert_eq!(
        extract::<ConditionValue>(both.value()).unwrap().fired_count(),
        2
    );
}

#[test]
fn composites_nest() {
    init_log();
    let mut sim = Simulation::new(1);
    let a = sim.event();
    let b = sim.event();
    let c = sim.event();
    a.trigger_delayed(None, 1.0).unwrap();
    b.trigger_delayed(None, 2.0).unwrap();
    c.trigger_delayed(None, 9.0).unwrap();
    // (a AND b) OR c resolves at t=2
    let both = sim.all_of(&[a, b]);
    let either = sim.any_of(&[both.clone(), c.clone()]);
    let resolved_at = Rc::new(RefCell::new(None));
    {
        let resolved_at = resolved_at.clone();
        let either = either.clone();
        sim.spawn("observer", move |ctx| async move {
            ctx.wait(&either).await?;
            *resolved_at.borrow_mut() = Some(ctx.time());
            Ok(())
        });
    }
    sim.step_until_no_events();
    assert_eq!(*resolved_at.borrow(), Some(2.0));
    let value = extract::<ConditionValue>(either.value()).unwrap();
    assert!(value.fired(&both));
    assert!(!value.fired(&c));
}
