//! Error types for entity allocation, component registration, and storage.
//!
//! This module declares focused, composable error types used across the
//! entity and component storage pipeline. Each error carries enough context
//! to make failures actionable while remaining small and cheap to pass
//! around or convert into the aggregate [`EcsError`].
//!
//! ## Goals
//! * **Specificity:** Each error type models a single failure mode (entity
//!   range exhaustion, component-type table exhaustion, fixed-capacity
//!   storage overflow).
//! * **Ergonomics:** All errors implement [`std::error::Error`] and
//!   [`fmt::Display`], and provide `From<T>` conversions into [`EcsError`].
//! * **Actionability:** Structured fields (offending component type name,
//!   limiting capacity) make logs useful without reproducing the issue.
//!
//! ## Typical flow
//! Low-level allocator and storage operations return small, dedicated error
//! types. Higher-level registry code uses `?` to bubble failures into
//! [`EcsError`], which callers can match on for control flow or log with
//! user-readable messages.
//!
//! ## Absent entities
//! A missing component is deliberately *not* an error value: `remove` on an
//! absent component is a silent no-op, and `get` returns `Option`. The
//! unchecked access paths used by query execution assert membership in debug
//! builds instead.
//!
//! ## Display vs. Debug
//! * [`fmt::Display`] is optimized for operator logs (short, imperative
//!   phrasing).
//! * [`fmt::Debug`] (derived) retains full structure for diagnostics.

use std::fmt;

/// Returned when the entity allocator cannot issue another handle because
/// the fresh-id counter reached the compile-time entity range.
///
/// ### Fields
/// * `capacity` — The entity range limit that prevented the allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityExhaustedError {
    /// Entity range limit.
    pub capacity: u32,
}

impl fmt::Display for EntityExhaustedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entity range exhausted (capacity {})", self.capacity)
    }
}

impl std::error::Error for EntityExhaustedError {}

/// Returned when registering a component type would exceed the fixed
/// component-type table.
///
/// ### Fields
/// * `type_name` — Rust name of the type whose registration failed.
/// * `cap` — Maximum number of distinct component types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeCapacityError {
    /// Rust type name of the component that could not be registered.
    pub type_name: &'static str,

    /// Maximum number of distinct component types.
    pub cap: usize,
}

impl fmt::Display for TypeCapacityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "component type table exhausted registering {} (capacity {})",
            self.type_name, self.cap
        )
    }
}

impl std::error::Error for TypeCapacityError {}

/// Returned when a fixed-capacity storage strategy receives one more
/// component than it can hold.
///
/// The small-inline strategy caps the element count; the singleton strategy
/// holds at most one value, so adding for a second entity fails with a
/// capacity of one.
///
/// ### Fields
/// * `type_name` — Rust name of the component type being stored.
/// * `capacity` — The storage capacity that was exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreCapacityError {
    /// Rust type name of the component being stored.
    pub type_name: &'static str,

    /// Storage capacity that was exceeded.
    pub capacity: usize,
}

impl fmt::Display for StoreCapacityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "storage capacity exceeded adding {} (capacity {})",
            self.type_name, self.capacity
        )
    }
}

impl std::error::Error for StoreCapacityError {}

/// Aggregate error for ECS operations.
///
/// This wraps the precise, low-level failures that can occur while creating
/// entities, registering component types, or adding components to
/// fixed-capacity storage. `From<T>` conversions are implemented for the
/// low-level errors so callers can write `?` and still return a single,
/// expressive type.
///
/// ### Display
/// `Display` messages are concise and suitable for logs. For deep
/// inspection, prefer `Debug` which includes full structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EcsError {
    /// The entity allocator ran out of fresh identifiers.
    EntityExhausted(EntityExhaustedError),

    /// The component-type table is full.
    TypeCapacity(TypeCapacityError),

    /// A fixed-capacity store overflowed.
    StoreCapacity(StoreCapacityError),
}

impl fmt::Display for EcsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EcsError::EntityExhausted(e) => write!(f, "{e}"),
            EcsError::TypeCapacity(e) => write!(f, "{e}"),
            EcsError::StoreCapacity(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for EcsError {}

impl From<EntityExhaustedError> for EcsError {
    fn from(e: EntityExhaustedError) -> Self {
        EcsError::EntityExhausted(e)
    }
}

impl From<TypeCapacityError> for EcsError {
    fn from(e: TypeCapacityError) -> Self {
        EcsError::TypeCapacity(e)
    }
}

impl From<StoreCapacityError> for EcsError {
    fn from(e: StoreCapacityError) -> Self {
        EcsError::StoreCapacity(e)
    }
}

/// Convenience result alias for ECS operations.
pub type EcsResult<T> = Result<T, EcsError>;
