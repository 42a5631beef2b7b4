// Shared setup for the criterion benches.
#![allow(dead_code)]

use sparse_ecs::Registry;

pub const AGENTS_MED: u32 = 200_000;
pub const AGENTS_SMALL: u32 = 10_000;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Velocity {
    pub dx: f32,
    pub dy: f32,
    pub dz: f32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Collider {
    pub radius: f32,
}

pub fn splitmix(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Builds a world of `count` entities: every one has a `Position`, two
/// thirds have a `Velocity`, one third a `Collider`.
pub fn make_world(count: u32) -> Registry {
    let mut registry = Registry::new();
    let mut seed = 42u64;
    for _ in 0..count {
        let entity = registry.create_entity().expect("world fits the entity range");
        let roll = splitmix(&mut seed);
        let f = (roll & 0xFFFF) as f32 / 65536.0;
        registry
            .add(entity, Position { x: f, y: -f, z: f * 2.0 })
            .unwrap();
        if roll % 3 != 0 {
            registry
                .add(entity, Velocity { dx: f, dy: f * 0.5, dz: -f })
                .unwrap();
        }
        if roll % 3 == 1 {
            registry.add(entity, Collider { radius: f + 0.1 }).unwrap();
        }
    }
    registry
}
