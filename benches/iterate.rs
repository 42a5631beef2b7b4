use criterion::*;
use std::hint::black_box;

use sparse_ecs::{Read, Write};

mod common;
use common::*;

fn iterate_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("iterate");

    group.bench_function("run_pos_vel_200k", |b| {
        b.iter_batched(
            || make_world(AGENTS_MED),
            |mut world| {
                world
                    .filter::<(Write<Position>, Read<Velocity>)>()
                    .unwrap()
                    .run(|(p, v)| {
                        p.x += v.dx;
                        p.y += v.dy;
                        p.z += v.dz;
                    });
                black_box(world);
            },
            BatchSize::LargeInput,
        );
    });

    group.bench_function("dispatch_pos_vel_200k", |b| {
        b.iter_batched(
            || make_world(AGENTS_MED),
            |mut world| {
                world
                    .filter::<(Write<Position>, Read<Velocity>)>()
                    .unwrap()
                    .dispatch(|(p, v)| {
                        p.x += v.dx;
                        p.y += v.dy;
                        p.z += v.dz;
                    });
                black_box(world);
            },
            BatchSize::LargeInput,
        );
    });

    group.bench_function("run_three_way_filter_200k", |b| {
        b.iter_batched(
            || make_world(AGENTS_MED),
            |mut world| {
                world
                    .filter::<(Write<Velocity>, Read<Position>, Read<Collider>)>()
                    .unwrap()
                    .run(|(v, p, c)| {
                        let dist2 = p.x * p.x + p.y * p.y + p.z * p.z;
                        if dist2 < c.radius * c.radius {
                            v.dx = -v.dx;
                            v.dy = -v.dy;
                            v.dz = -v.dz;
                        }
                    });
                black_box(world);
            },
            BatchSize::LargeInput,
        );
    });

    group.bench_function("sparse_probe_10k", |b| {
        b.iter_batched(
            || make_world(AGENTS_SMALL),
            |mut world| {
                world
                    .filter::<(Write<Position>, Read<Collider>)>()
                    .unwrap()
                    .run(|(p, c)| {
                        p.x += c.radius;
                    });
                black_box(world);
            },
            BatchSize::LargeInput,
        );
    });

    group.finish();
}

criterion_group!(benches, iterate_benchmark);
criterion_main!(benches);
