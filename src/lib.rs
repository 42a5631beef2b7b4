//! # sparse_ecs
//!
//! Data-oriented Entity-Component-System runtime built on sparse-set
//! storage, hierarchical membership bitmaps, and conflict-free parallel
//! scheduling.
//!
//! ## Design Goals
//! - Packed per-type storage with O(1) add/remove (swap-remove)
//! - SIMD-friendly bitmap intersections for multi-component queries
//! - Density-adaptive query execution (probe small stores, AND large ones)
//! - Parallel system execution that preserves sequential semantics under a
//!   declared read/write model
//!
//! This crate builds as both:
//! - `rlib` (for Rust usage & integration tests)
//! - `cdylib` (for FFI usage)

#![forbid(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![allow(clippy::module_inception)]

pub mod engine;

// ─────────────────────────────────────────────────────────────────────────────
// Re-exports (Public API)
// ─────────────────────────────────────────────────────────────────────────────

// Core types

pub use engine::entity::{Entity, EntityAllocator};

pub use engine::mask::{EntityMask, EntityMaskIter};

pub use engine::storage::{
    Component,
    SingletonStorage,
    SmallStorage,
    SparseStorage,
    StorageKind,
    Store,
    TypeErasedStore,
    SMALL_STORE_CAP,
};

pub use engine::registry::{
    component_id_of,
    component_type_name,
    registered_component_count,
    Registry,
};

pub use engine::query::{AccessSet, ComponentAccess, ComponentList, Filter, Read, View, ViewMut, Write};

pub use engine::scheduler::{Scheduler, SystemEntry};

pub use engine::jobs;

pub use engine::error::{
    EcsError,
    EcsResult,
    EntityExhaustedError,
    StoreCapacityError,
    TypeCapacityError,
};

pub use engine::types::{
    AccessSets,
    ComponentId,
    EntityId,
    TypeMask,
    MAX_COMPONENT_TYPES,
    MAX_ENTITIES,
};

// ─────────────────────────────────────────────────────────────────────────────
// Prelude
// ─────────────────────────────────────────────────────────────────────────────

/// Commonly used ECS types.
///
/// Import with:
/// ```rust
/// use sparse_ecs::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        component_id_of,
        Entity,
        EntityMask,
        Read,
        Registry,
        Scheduler,
        StorageKind,
        SystemEntry,
        TypeMask,
        Write,
    };
}
