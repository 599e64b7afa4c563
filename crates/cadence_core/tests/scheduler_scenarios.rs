//! Integration test for the scheduler's end-to-end behaviour:
//! tick ordering, group kills, singletons, waits and pause/resume timing.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use cadence_core::{
    delays, from_fn, Handle, Process, ProcessExt, RunOptions, Scheduler, Segment, Selector,
    Singleton, Step,
};

type Log = Rc<RefCell<Vec<String>>>;

fn new_log() -> Log {
    Rc::new(RefCell::new(Vec::new()))
}

/// Logs its name every frame, forever.
fn chatter(log: &Log, name: &str) -> impl Process + 'static {
    let log = Rc::clone(log);
    let name = name.to_string();
    from_fn(move |_| {
        log.borrow_mut().push(name.clone());
        Ok(Step::NEXT_FRAME)
    })
}

/// Runs `frames` frames then completes.
fn worker(frames: u32) -> impl Process + 'static {
    let mut left = frames;
    from_fn(move |_| {
        if left == 0 {
            return Ok(Step::Complete);
        }
        left -= 1;
        Ok(Step::NEXT_FRAME)
    })
}

#[test]
fn test_each_live_process_steps_once_in_slot_order() {
    let mut scheduler = Scheduler::default();
    let log = new_log();
    for name in ["a", "b", "c", "d"] {
        scheduler.run(chatter(&log, name), RunOptions::new());
    }
    log.borrow_mut().clear();

    scheduler.tick(Segment::Update, 0.016).unwrap();
    assert_eq!(*log.borrow(), vec!["a", "b", "c", "d"]);

    scheduler.tick(Segment::LateUpdate, 0.016).unwrap();
    assert_eq!(log.borrow().len(), 4);
}

#[test]
fn test_kill_by_tag_before_second_step() {
    let mut scheduler = Scheduler::default();
    let a = scheduler.run(delays([0.0, 1.0, 2.0]), RunOptions::new().tag("x"));
    scheduler.tick(Segment::Update, 0.5).unwrap();

    assert_eq!(scheduler.kill_group(Selector::Tag("x")), 1);
    assert!(!scheduler.is_alive(a));
    assert_eq!(scheduler.kill_group(Selector::Tag("x")), 0);
    assert_eq!(scheduler.total_count(), 0);
}

#[test]
fn test_singleton_without_overwrite_returns_existing() {
    let mut scheduler = Scheduler::default();
    let options = RunOptions::new().tag("y").singleton(Singleton::KeepExisting);

    let first = scheduler.run(worker(10), options.clone());
    let second = scheduler.run(worker(10), options);

    assert_eq!(first, second);
    assert_eq!(scheduler.total_count(), 1);
}

#[test]
fn test_killed_wait_target_reinstates_waiter_same_tick() {
    let mut scheduler = Scheduler::default();
    let resumed_at = Rc::new(Cell::new(None));
    let d = scheduler.run(worker(100), RunOptions::new());

    let resumed = Rc::clone(&resumed_at);
    let mut waited = false;
    let c = scheduler.run(
        from_fn(move |cx| {
            if std::mem::replace(&mut waited, true) {
                resumed.set(Some(cx.local_time()));
                return Ok(Step::Complete);
            }
            Ok(cx.wait_until_done(d))
        }),
        RunOptions::new(),
    );
    assert!(scheduler.is_waiting(c));

    // D is killed from inside a process during the tick at t = 0.5
    let mut killed = false;
    scheduler.run(
        from_fn(move |cx| {
            if cx.local_time() >= 0.5 && !std::mem::replace(&mut killed, true) {
                cx.scheduler().kill(d);
            }
            Ok(Step::NEXT_FRAME)
        }),
        RunOptions::new(),
    );

    scheduler.tick(Segment::Update, 0.25).unwrap();
    assert_eq!(resumed_at.get(), None);
    scheduler.tick(Segment::Update, 0.25).unwrap();
    assert_eq!(resumed_at.get(), Some(0.5));
    assert!(!scheduler.is_alive(d));
}

#[test]
fn test_waiter_resumes_in_completion_tick() {
    let mut scheduler = Scheduler::default();
    let log = new_log();
    let target = scheduler.run(worker(4), RunOptions::new().segment(Segment::FixedUpdate));

    let log_in = Rc::clone(&log);
    let mut waited = false;
    scheduler.run(
        from_fn(move |cx| {
            if std::mem::replace(&mut waited, true) {
                log_in.borrow_mut().push(format!("resumed@{:.2}", cx.local_time()));
                return Ok(Step::Complete);
            }
            Ok(cx.wait_until_done(target))
        }),
        RunOptions::new().segment(Segment::FixedUpdate),
    );

    for _ in 0..3 {
        scheduler.tick(Segment::FixedUpdate, 0.25).unwrap();
    }
    assert!(log.borrow().is_empty());
    scheduler.tick(Segment::FixedUpdate, 0.25).unwrap();
    assert_eq!(*log.borrow(), vec!["resumed@1.00"]);
}

#[test]
fn test_pause_resume_keeps_residual_delay() {
    let mut scheduler = Scheduler::default();
    let fired_at = Rc::new(RefCell::new(Vec::new()));
    let fired = Rc::clone(&fired_at);

    let handle = scheduler.run(
        from_fn(move |cx| {
            fired.borrow_mut().push(cx.local_time());
            Ok(cx.wait_for_seconds(1.0))
        }),
        RunOptions::new().tag("t").layer(2).segment(Segment::SlowUpdate),
    );

    // 0.25 s left when paused
    scheduler.tick(Segment::SlowUpdate, 0.75).unwrap();
    assert_eq!(scheduler.pause(Selector::Tag("t")), 1);
    for _ in 0..10 {
        scheduler.tick(Segment::SlowUpdate, 1.0).unwrap();
    }
    assert_eq!(scheduler.resume(Selector::Tag("t")), 1);

    assert_eq!(scheduler.segment_of(handle), Some(Segment::SlowUpdate));
    assert_eq!(scheduler.tag_of(handle), Some("t"));
    assert_eq!(scheduler.layer_of(handle), Some(2));

    scheduler.tick(Segment::SlowUpdate, 0.125).unwrap();
    assert_eq!(fired_at.borrow().len(), 1);
    scheduler.tick(Segment::SlowUpdate, 0.125).unwrap();
    assert_eq!(fired_at.borrow().len(), 2);
    assert!((fired_at.borrow()[1] - 11.0).abs() < 1e-9);
}

#[test]
fn test_pause_by_tag_and_layer() {
    let mut scheduler = Scheduler::default();
    let log = new_log();
    let hit = scheduler.run(chatter(&log, "hit"), RunOptions::new().tag("enemy").layer(1));
    let miss_layer = scheduler.run(chatter(&log, "l"), RunOptions::new().tag("enemy").layer(2));
    let miss_tag = scheduler.run(chatter(&log, "t"), RunOptions::new().tag("ally").layer(1));

    assert_eq!(scheduler.pause(Selector::TagAndLayer("enemy", 1)), 1);
    assert!(scheduler.is_paused(hit));
    assert!(scheduler.is_running(miss_layer));
    assert!(scheduler.is_running(miss_tag));
    assert_eq!(scheduler.count_paused(Selector::TagAndLayer("enemy", 1)), 1);
    assert_eq!(scheduler.count_paused(Selector::TagAndLayer("enemy", 2)), 0);
    assert_eq!(scheduler.resume(Selector::TagAndLayer("enemy", 1)), 1);
    assert!(scheduler.is_running(hit));
}

#[test]
fn test_kill_handle_variants() {
    let mut scheduler = Scheduler::default();
    let h = scheduler.run(worker(10), RunOptions::new().tag("a").layer(5));

    assert_eq!(scheduler.kill_if(h, Selector::Tag("b")), 0);
    assert_eq!(scheduler.kill_if(h, Selector::Layer(6)), 0);
    assert_eq!(scheduler.kill_if(h, Selector::TagAndLayer("a", 5)), 1);
    assert_eq!(scheduler.kill(h), 0);
    assert_eq!(scheduler.kill(Handle::from_raw(12_345)), 0);
}

#[test]
fn test_switch_segment_from_combinator_chain() {
    let mut scheduler = Scheduler::default();
    let log = new_log();
    let log_in = Rc::clone(&log);
    let mut moved = false;

    let handle = scheduler.run(
        from_fn(move |cx| {
            log_in.borrow_mut().push(cx.segment().to_string());
            if std::mem::replace(&mut moved, true) {
                Ok(Step::Complete)
            } else {
                Ok(Step::switch_to(Segment::EndOfFrame))
            }
        })
        .append(worker(1)),
        RunOptions::new(),
    );

    assert!(scheduler.has_end_of_frame_work());
    scheduler.tick(Segment::EndOfFrame, 0.1).unwrap();
    assert_eq!(*log.borrow(), vec!["Update", "EndOfFrame"]);
    assert!(scheduler.is_running(handle));
    scheduler.tick(Segment::EndOfFrame, 0.1).unwrap();
    assert!(!scheduler.is_running(handle));
}

#[test]
fn test_editor_flush_releases_waiters() {
    let mut scheduler = Scheduler::default();
    let editor = scheduler.run(worker(100), RunOptions::new().segment(Segment::EditorUpdate));
    scheduler.run(worker(100), RunOptions::new().segment(Segment::EditorSlowUpdate).tag("e"));
    scheduler.pause(Selector::Tag("e"));

    let mut waited = false;
    let waiter = scheduler.run(
        from_fn(move |cx| {
            if std::mem::replace(&mut waited, true) {
                return Ok(Step::Complete);
            }
            Ok(cx.wait_until_done(editor))
        }),
        RunOptions::new(),
    );
    assert!(scheduler.is_waiting(waiter));

    assert_eq!(scheduler.flush_editor_segments(), 2);
    assert!(scheduler.is_running(waiter));
    assert_eq!(scheduler.process_count(Segment::EditorUpdate), 0);
    assert_eq!(scheduler.count_paused(Selector::All), 0);
}
