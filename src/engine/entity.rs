//! Entity handles and the free-list allocator.
//!
//! ## Entity Model
//!
//! An [`Entity`] is a lightweight, opaque 32-bit handle in
//! `[0, MAX_ENTITIES)`. Equality is identifier equality: the handle itself
//! carries no generation field. Stale-handle detection lives in the sparse
//! storage layer, which versions each slot on removal.
//!
//! ## Allocation
//!
//! [`EntityAllocator`] issues handles from a fresh counter and recycles
//! destroyed ids through a LIFO free list, so the id freed most recently is
//! the next one returned. The allocator does **not** reset component stores
//! when an entity is destroyed; the registry orchestrates that sweep.
//!
//! ## Concurrency
//!
//! The allocator is single-owner: all mutating calls must come from the
//! thread that owns the registry.

use crate::engine::error::{EcsResult, EntityExhaustedError};
use crate::engine::types::{EntityId, MAX_ENTITIES};

/// Opaque identifier for an ECS entity.
///
/// Handles are cheap to copy and compare and are safe to pass across
/// threads. A destroyed handle may be reissued by a later
/// [`EntityAllocator::create`]; component state from the previous life is
/// never observable on the new one.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Entity(pub EntityId);

impl Entity {
    /// Returns the handle as a storage index.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Issues fresh entity ids and recycles destroyed ones.
///
/// ## Invariants
/// - Every id handed out is below [`MAX_ENTITIES`].
/// - Recycling is LIFO: `create` immediately after `destroy(e)` returns `e`.
#[derive(Default)]
pub struct EntityAllocator {
    free: Vec<Entity>,
    next: EntityId,
}

impl EntityAllocator {
    /// Creates an empty allocator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the most recently freed id, or the next fresh counter value.
    ///
    /// ## Errors
    /// Fails with [`EntityExhaustedError`] once the fresh counter reaches
    /// the entity range limit and no freed ids remain.
    pub fn create(&mut self) -> EcsResult<Entity> {
        if let Some(entity) = self.free.pop() {
            return Ok(entity);
        }
        if self.next >= MAX_ENTITIES {
            return Err(EntityExhaustedError { capacity: MAX_ENTITIES }.into());
        }
        let entity = Entity(self.next);
        self.next += 1;
        Ok(entity)
    }

    /// Returns `entity` to the free list.
    ///
    /// The caller must not destroy the same live handle twice; the allocator
    /// does not track liveness.
    pub fn destroy(&mut self, entity: Entity) {
        self.free.push(entity);
    }

    /// Forgets all issued and freed ids.
    pub fn clear(&mut self) {
        self.free.clear();
        self.next = 0;
    }
}
