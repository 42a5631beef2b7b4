//! Core ECS Types, Identifiers, and Bit-Level Layouts
//!
//! This module defines the **fundamental types, identifiers, bit layouts, and
//! capacity limits** shared by every subsystem of the ECS: entity management,
//! component storage, query execution, and scheduling.
//!
//! ## Design Philosophy
//!
//! The runtime is designed around:
//!
//! - **Dense packed storage** addressed through sparse pages,
//! - **Bitmap-based membership** over a fixed entity range,
//! - **Stable numeric identifiers** for component types,
//! - **Explicit access declaration** for conflict analysis.
//!
//! To support these goals, this module:
//!
//! - Fixes the entity range at compile time ([`MAX_ENTITIES`]),
//! - Fixes the component-type range at compile time ([`MAX_COMPONENT_TYPES`]),
//! - Defines the sparse-page geometry and the packed slot layout used by the
//!   sparse storage strategy,
//! - Represents component-type sets as fixed-size bit arrays ([`TypeMask`]),
//! - Avoids heap allocation in hot paths.
//!
//! ## Sparse Slot Layout
//!
//! Each sparse-page slot packs two values into a single 32-bit word:
//!
//! ```text
//! | version (12 bits) | packed index (20 bits) |
//! ```
//!
//! The all-ones index is the tombstone marking an absent component; the
//! version is incremented on every removal so recycled slots are
//! distinguishable from their previous lives.
//!
//! ## Access Control
//!
//! Scheduling relies on two related concepts:
//!
//! - [`TypeMask`] — a bitset naming *which component types* are touched,
//! - [`AccessSets`] — *how* they are touched (read vs. write).
//!
//! These enable deterministic conflict detection between systems and safe
//! parallel batch construction.
//!
//! All constants are validated with compile-time assertions.

use crate::engine::error::EcsResult;
use crate::engine::registry::component_id_of;

/// Raw integer representation of an entity handle.
pub type EntityId = u32;

/// Compact runtime identifier for a component type.
pub type ComponentId = u16;

/// Total number of addressable entities. Handles are valid in
/// `[0, MAX_ENTITIES)`.
pub const MAX_ENTITIES: u32 = 262_144;

/// Maximum number of distinct component types a process may register.
pub const MAX_COMPONENT_TYPES: usize = 128;

/// Log2 of the sparse page size.
pub const PAGE_SHIFT: u32 = 11;
/// Number of slots per sparse page.
pub const PAGE_SIZE: usize = 1 << PAGE_SHIFT;
/// Mask selecting the in-page slot index of an entity id.
pub const PAGE_MASK: usize = PAGE_SIZE - 1;

/// Number of bits holding the packed index inside a sparse slot.
pub const SLOT_INDEX_BITS: u32 = 20;
/// Mask selecting the packed index of a sparse slot.
pub const SLOT_INDEX_MASK: u32 = (1 << SLOT_INDEX_BITS) - 1;
/// Shift isolating the version of a sparse slot.
pub const SLOT_VERSION_SHIFT: u32 = SLOT_INDEX_BITS;
/// Sentinel packed index marking an absent component.
pub const TOMBSTONE: u32 = SLOT_INDEX_MASK;

/// Number of level-0 summary bits in the hierarchical membership bitmap.
pub const L0_BLOCKS: usize = 64;
/// Number of level-1 groups per block.
pub const L1_GROUPS: usize = 64;
/// Number of leaf bits per level-2 word.
pub const L2_BITS: usize = 64;

const _: [(); 1] = [(); (MAX_ENTITIES as usize == L0_BLOCKS * L1_GROUPS * L2_BITS) as usize];
const _: [(); 1] = [(); (MAX_ENTITIES as usize % PAGE_SIZE == 0) as usize];
const _: [(); 1] = [(); (MAX_ENTITIES - 1 < TOMBSTONE) as usize];
const _: [(); 1] = [(); (MAX_COMPONENT_TYPES <= ComponentId::MAX as usize) as usize];

/// Number of `u64` words required to represent a full component-type mask.
pub const TYPE_MASK_WORDS: usize = (MAX_COMPONENT_TYPES + 63) / 64;

/// Bitset over component type identifiers.
///
/// Used for system read/write declarations and batch conflict analysis.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TypeMask {
    words: [u64; TYPE_MASK_WORDS],
}

impl TypeMask {
    /// Creates an empty mask.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a mask from a list of component ids.
    pub fn from_ids(ids: &[ComponentId]) -> Self {
        let mut mask = Self::default();
        for &id in ids {
            mask.set(id);
        }
        mask
    }

    /// Sets the bit corresponding to `id`.
    #[inline]
    pub fn set(&mut self, id: ComponentId) {
        let index = (id as usize) / 64;
        let bit = (id as usize) % 64;
        self.words[index] |= 1u64 << bit;
    }

    /// Clears the bit corresponding to `id`.
    #[inline]
    pub fn unset(&mut self, id: ComponentId) {
        let index = (id as usize) / 64;
        let bit = (id as usize) % 64;
        self.words[index] &= !(1u64 << bit);
    }

    /// Returns `true` if `id` is present in this mask.
    #[inline]
    pub fn has(&self, id: ComponentId) -> bool {
        let index = (id as usize) / 64;
        let bit = (id as usize) % 64;
        (self.words[index] >> bit) & 1 == 1
    }

    /// Returns `true` if any bit is set.
    #[inline]
    pub fn any(&self) -> bool {
        self.words.iter().any(|&w| w != 0)
    }

    /// Returns `true` if this mask shares at least one bit with `other`.
    #[inline]
    pub fn intersects(&self, other: &TypeMask) -> bool {
        self.words
            .iter()
            .zip(other.words.iter())
            .any(|(a, b)| a & b != 0)
    }

    /// Removes all bits.
    #[inline]
    pub fn clear(&mut self) {
        self.words = [0; TYPE_MASK_WORDS];
    }

    /// Iterates over all component ids set in this mask.
    pub fn iter(&self) -> impl Iterator<Item = ComponentId> + '_ {
        self.words
            .iter()
            .enumerate()
            .flat_map(|(word_index, &word)| {
                let base = word_index * 64;
                let mut bits = word;
                std::iter::from_fn(move || {
                    if bits == 0 {
                        return None;
                    }
                    let tz = bits.trailing_zeros() as usize;
                    bits &= bits - 1;
                    Some((base + tz) as ComponentId)
                })
            })
    }
}

impl std::ops::BitOrAssign for TypeMask {
    fn bitor_assign(&mut self, rhs: Self) {
        for (d, s) in self.words.iter_mut().zip(rhs.words.iter()) {
            *d |= *s;
        }
    }
}

/// Declares the component access set of a system or query.
#[derive(Clone, Copy, Debug, Default)]
pub struct AccessSets {
    /// Component types read by the system.
    pub read: TypeMask,
    /// Component types written by the system.
    pub write: TypeMask,
}

impl AccessSets {
    /// Returns `true` if this access set conflicts with another.
    ///
    /// Two access sets conflict when a write overlaps any read or write on
    /// the other side; read-read overlap is permitted.
    #[inline]
    pub fn conflicts_with(&self, other: &AccessSets) -> bool {
        self.write.intersects(&other.write)
            || self.write.intersects(&other.read)
            || self.read.intersects(&other.write)
    }

    /// Merges another access set into this one.
    #[inline]
    pub fn merge(&mut self, other: &AccessSets) {
        self.read |= other.read;
        self.write |= other.write;
    }

    /// Marks component type `T` as read.
    pub fn add_read<T: 'static>(&mut self) -> EcsResult<()> {
        self.read.set(component_id_of::<T>()?);
        Ok(())
    }

    /// Marks component type `T` as written.
    pub fn add_write<T: 'static>(&mut self) -> EcsResult<()> {
        self.write.set(component_id_of::<T>()?);
        Ok(())
    }
}
