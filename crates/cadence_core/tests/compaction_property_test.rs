//! Integration test for compaction: random workloads must keep the same live
//! handles, labels and completion order with and without forced compaction.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use cadence_core::{
    from_fn, Handle, RunOptions, Scheduler, SchedulerConfig, Segment, Selector, Step,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

type Snapshot = BTreeMap<Handle, (Option<String>, Option<i32>, Segment)>;

fn snapshot(scheduler: &Scheduler, handles: &[Handle]) -> Snapshot {
    handles
        .iter()
        .filter(|h| scheduler.is_alive(**h))
        .map(|h| {
            (
                *h,
                (
                    scheduler.tag_of(*h).map(str::to_string),
                    scheduler.layer_of(*h),
                    scheduler.segment_of(*h).unwrap_or_default(),
                ),
            )
        })
        .collect()
}

/// Drives one seeded workload, optionally compacting after every tick.
fn drive(seed: u64, compact_every_tick: bool) -> (Vec<u32>, Snapshot) {
    let config = SchedulerConfig {
        // keep automatic maintenance out of the way
        maintenance_interval: u16::MAX,
        initial_capacity: cadence_core::InitialCapacity {
            large: 4,
            medium: 4,
            small: 4,
        },
        growth_chunk: 4,
        ..SchedulerConfig::default()
    };
    let mut scheduler = Scheduler::new(config).unwrap();
    let mut rng = StdRng::seed_from_u64(seed);
    let finished = Rc::new(RefCell::new(Vec::new()));
    let mut handles = Vec::new();

    for id in 0..200u32 {
        let frames = rng.gen_range(0..6u32);
        let finished = Rc::clone(&finished);
        let mut left = frames;
        let process = from_fn(move |_| {
            if left == 0 {
                finished.borrow_mut().push(id);
                return Ok(Step::Complete);
            }
            left -= 1;
            Ok(Step::NEXT_FRAME)
        });

        let mut options = RunOptions::new().segment(if rng.gen_bool(0.7) {
            Segment::Update
        } else {
            Segment::LateUpdate
        });
        if rng.gen_bool(0.5) {
            options = options.tag(["a", "b", "c"][rng.gen_range(0..3)]);
        }
        if rng.gen_bool(0.5) {
            options = options.layer(rng.gen_range(0..3));
        }
        handles.push(scheduler.run(process, options));

        match rng.gen_range(0..10) {
            0 => {
                scheduler.pause(Selector::Tag("a"));
            }
            1 => {
                scheduler.resume(Selector::All);
            }
            2 => {
                let victim = handles[rng.gen_range(0..handles.len())];
                scheduler.kill(victim);
            }
            3 => {
                scheduler.kill_group(Selector::Layer(2));
            }
            _ => {}
        }

        if id % 4 == 0 {
            scheduler.tick(Segment::Update, 0.1).unwrap();
            scheduler.tick(Segment::LateUpdate, 0.1).unwrap();
            if compact_every_tick {
                scheduler.compact();
            }
        }
    }

    let snap = snapshot(&scheduler, &handles);
    let order = finished.borrow().clone();
    (order, snap)
}

#[test]
fn test_compaction_is_unobservable() {
    for seed in [1, 7, 42, 1234, 98_765] {
        let (plain_order, plain_snapshot) = drive(seed, false);
        let (compacted_order, compacted_snapshot) = drive(seed, true);

        assert_eq!(plain_order, compacted_order, "completion order, seed {seed}");
        assert_eq!(plain_snapshot, compacted_snapshot, "live labels, seed {seed}");
    }
}

#[test]
fn test_forced_compaction_round_trip() {
    let mut scheduler = Scheduler::default();
    let mut handles = Vec::new();
    for i in 0..50 {
        let options = RunOptions::new().tag(format!("t{}", i % 5)).layer(i % 3);
        let frames = u32::try_from(i % 4).unwrap_or(0);
        let mut left = frames;
        handles.push(scheduler.run(
            from_fn(move |_| {
                if left == 0 {
                    return Ok(Step::Complete);
                }
                left -= 1;
                Ok(Step::NEXT_FRAME)
            }),
            options,
        ));
    }
    scheduler.tick(Segment::Update, 0.1).unwrap();

    let before = snapshot(&scheduler, &handles);
    let reclaimed = scheduler.compact();
    let after = snapshot(&scheduler, &handles);

    assert!(reclaimed > 0);
    assert_eq!(before, after);

    let tagged = before
        .values()
        .filter(|(tag, _, _)| tag.as_deref() == Some("t0"))
        .count();
    assert_eq!(scheduler.kill_group(Selector::Tag("t0")), tagged);
}
