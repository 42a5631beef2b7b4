// Parallel dispatch: equivalence with the serial path over a large world,
// visited-set parity, and worker-pool plumbing.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use sparse_ecs::{jobs, Entity, Read, Registry, Write};

#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct Position {
    x: f32,
    y: f32,
    z: f32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct Velocity {
    dx: f32,
    dy: f32,
    dz: f32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct Phantom(u32);

const WORLD_SIZE: u32 = 200_000;

fn splitmix(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

fn populate(registry: &mut Registry, count: u32) {
    let mut seed = 12345u64;
    for _ in 0..count {
        let e = registry.create_entity().expect("entity range not exhausted");
        let roll = splitmix(&mut seed);
        let fx = (roll & 0xFFFF) as f32 / 65536.0;
        registry
            .add(
                e,
                Position {
                    x: fx,
                    y: fx * 2.0,
                    z: -fx,
                },
            )
            .unwrap();
        if roll % 3 != 0 {
            registry
                .add(
                    e,
                    Velocity {
                        dx: fx * 0.25,
                        dy: -fx * 0.5,
                        dz: 1.0 - fx,
                    },
                )
                .unwrap();
        }
    }
}

fn integrate((p, v): (&mut Position, &Velocity)) {
    p.x += v.dx;
    p.y += v.dy * 0.5;
    p.z -= v.dz;
}

#[test]
fn dispatch_matches_the_serial_path_bit_for_bit() {
    let mut serial_world = Registry::new();
    let mut parallel_world = Registry::new();
    populate(&mut serial_world, WORLD_SIZE);
    populate(&mut parallel_world, WORLD_SIZE);

    serial_world
        .filter::<(Write<Position>, Read<Velocity>)>()
        .unwrap()
        .run(integrate);
    parallel_world
        .filter::<(Write<Position>, Read<Velocity>)>()
        .unwrap()
        .dispatch(integrate);

    for id in 0..WORLD_SIZE {
        let e = Entity(id);
        let a = serial_world.get::<Position>(e).unwrap();
        let b = parallel_world.get::<Position>(e).unwrap();
        assert_eq!(a.x.to_bits(), b.x.to_bits());
        assert_eq!(a.y.to_bits(), b.y.to_bits());
        assert_eq!(a.z.to_bits(), b.z.to_bits());
    }
}

#[test]
fn dispatch_visits_each_matching_entity_once() {
    let mut registry = Registry::new();
    let mut expected_sum = 0u64;
    let mut expected_count = 0usize;

    for i in 0..10_000u32 {
        let e = registry.create_entity().unwrap();
        registry.add(e, Phantom(i)).unwrap();
        if i % 7 == 0 {
            registry.add(e, Velocity::default()).unwrap();
            expected_sum += i as u64;
            expected_count += 1;
        }
    }

    let sum = AtomicU64::new(0);
    let count = AtomicUsize::new(0);
    registry
        .filter::<(Read<Phantom>, Read<Velocity>)>()
        .unwrap()
        .dispatch(|(p, _)| {
            sum.fetch_add(p.0 as u64, Ordering::Relaxed);
            count.fetch_add(1, Ordering::Relaxed);
        });

    assert_eq!(count.load(Ordering::Relaxed), expected_count);
    assert_eq!(sum.load(Ordering::Relaxed), expected_sum);
}

#[test]
fn dispatch_on_an_empty_intersection_returns() {
    let mut registry = Registry::new();
    for _ in 0..100 {
        let e = registry.create_entity().unwrap();
        registry.add(e, Phantom(0)).unwrap();
    }

    let count = AtomicUsize::new(0);
    registry
        .filter::<(Read<Phantom>, Read<Position>)>()
        .unwrap()
        .dispatch(|_| {
            count.fetch_add(1, Ordering::Relaxed);
        });
    assert_eq!(count.load(Ordering::Relaxed), 0);
}

#[test]
fn dispatch_handles_groups_smaller_than_the_floor() {
    let mut registry = Registry::new();
    for i in 0..5u32 {
        let e = registry.create_entity().unwrap();
        registry.add(e, Phantom(i)).unwrap();
    }

    let count = AtomicUsize::new(0);
    registry.filter::<(Read<Phantom>,)>().unwrap().dispatch(|_| {
        count.fetch_add(1, Ordering::Relaxed);
    });
    assert_eq!(count.load(Ordering::Relaxed), 5);
}

#[test]
fn pool_lifecycle_is_observable() {
    assert!(jobs::thread_count() > 0);

    let ctx = jobs::JobContext::new();
    let total = std::sync::Arc::new(AtomicU64::new(0));
    for i in 0..8u64 {
        let total = std::sync::Arc::clone(&total);
        jobs::execute(&ctx, move || {
            total.fetch_add(i, Ordering::SeqCst);
        });
    }
    jobs::wait(&ctx);
    assert_eq!(total.load(Ordering::SeqCst), 28);
}
