//! Component type registration and the world registry.
//!
//! ## Type identifiers
//!
//! Component types receive a compact [`ComponentId`] on first use, from a
//! process-global table keyed by [`TypeId`]. Identifiers are stable for the
//! lifetime of the process, so two registries in one process agree on them;
//! the assignment order depends on which type is touched first and is not
//! guaranteed across runs.
//!
//! ## Registry
//!
//! [`Registry`] is the single-owner facade over the whole runtime: it owns
//! the entity allocator, a fixed table of lazily constructed component
//! stores indexed by [`ComponentId`], and the system scheduler. All
//! structural mutation (entity lifecycle, component add/remove, storage
//! strategy swaps, `clear`) must happen on the owning thread; parallel
//! execution goes exclusively through queries (`dispatch`) and the
//! scheduler, which operate under the declared read/write contract.

use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};

use crate::engine::entity::{Entity, EntityAllocator};
use crate::engine::error::{EcsResult, TypeCapacityError};
use crate::engine::query::{AccessSet, Filter, FilterDesc, View, ViewMut};
use crate::engine::scheduler::{Scheduler, SystemEntry};
use crate::engine::storage::{Component, SparseStorage, StorageKind, Store, TypeErasedStore};
use crate::engine::types::{ComponentId, MAX_COMPONENT_TYPES};

struct TypeRegistry {
    next: ComponentId,
    by_type: HashMap<TypeId, ComponentId>,
    names: Vec<&'static str>,
}

static TYPE_REGISTRY: OnceLock<RwLock<TypeRegistry>> = OnceLock::new();

fn type_registry() -> &'static RwLock<TypeRegistry> {
    TYPE_REGISTRY.get_or_init(|| {
        RwLock::new(TypeRegistry {
            next: 0,
            by_type: HashMap::new(),
            names: Vec::new(),
        })
    })
}

/// Returns the [`ComponentId`] for `T`, assigning one on first use.
///
/// ## Errors
/// Fails with [`TypeCapacityError`] once the fixed component-type table is
/// full.
pub fn component_id_of<T: 'static>() -> EcsResult<ComponentId> {
    let type_id = TypeId::of::<T>();
    {
        let registry = type_registry().read().unwrap_or_else(|e| e.into_inner());
        if let Some(&id) = registry.by_type.get(&type_id) {
            return Ok(id);
        }
    }
    let mut registry = type_registry().write().unwrap_or_else(|e| e.into_inner());
    if let Some(&id) = registry.by_type.get(&type_id) {
        return Ok(id);
    }
    if registry.next as usize >= MAX_COMPONENT_TYPES {
        return Err(TypeCapacityError {
            type_name: type_name::<T>(),
            cap: MAX_COMPONENT_TYPES,
        }
        .into());
    }
    let id = registry.next;
    registry.next += 1;
    registry.by_type.insert(type_id, id);
    registry.names.push(type_name::<T>());
    log::debug!("assigned component id {id} to {}", type_name::<T>());
    Ok(id)
}

/// Number of component types registered so far in this process.
pub fn registered_component_count() -> usize {
    type_registry()
        .read()
        .unwrap_or_else(|e| e.into_inner())
        .next as usize
}

/// Rust name of a registered component id, for diagnostics.
pub fn component_type_name(id: ComponentId) -> Option<&'static str> {
    type_registry()
        .read()
        .unwrap_or_else(|e| e.into_inner())
        .names
        .get(id as usize)
        .copied()
}

/// Owner of entities, component stores, and the scheduler.
pub struct Registry {
    stores: [Option<Box<dyn TypeErasedStore>>; MAX_COMPONENT_TYPES],
    entities: EntityAllocator,
    entity_count: u32,
    scheduler: Scheduler,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            stores: std::array::from_fn(|_| None),
            entities: EntityAllocator::new(),
            entity_count: 0,
            scheduler: Scheduler::new(),
        }
    }

    /// Issues a new entity handle.
    ///
    /// Recycling is LIFO: the handle freed most recently by
    /// [`Registry::destroy_entity`] is the next one returned.
    ///
    /// ## Errors
    /// Fails once the entity range is exhausted.
    pub fn create_entity(&mut self) -> EcsResult<Entity> {
        let entity = self.entities.create()?;
        self.entity_count += 1;
        Ok(entity)
    }

    /// Destroys `entity` and drops its component from every store that
    /// holds one.
    pub fn destroy_entity(&mut self, entity: Entity) {
        self.entity_count = self.entity_count.saturating_sub(1);
        self.entities.destroy(entity);
        for store in self.stores.iter_mut().flatten() {
            store.remove(entity);
        }
    }

    /// Number of live entities.
    #[inline]
    pub fn entity_count(&self) -> u32 {
        self.entity_count
    }

    pub(crate) fn ensure_store<T: Component>(&mut self) -> EcsResult<(ComponentId, &mut Store<T>)> {
        let id = component_id_of::<T>()?;
        let slot = &mut self.stores[id as usize];
        if slot.is_none() {
            log::debug!("creating sparse store for {} (id {id})", type_name::<T>());
            *slot = Some(Box::new(Store::Sparse(SparseStorage::<T>::new())));
        }
        let store = slot
            .as_mut()
            .expect("store slot populated above")
            .as_any_mut()
            .downcast_mut::<Store<T>>()
            .expect("component store type mismatch");
        Ok((id, store))
    }

    /// Read-only access to the store for `T`, if it was ever touched.
    pub fn store<T: Component>(&self) -> Option<&Store<T>> {
        let id = component_id_of::<T>().ok()?;
        self.stores[id as usize]
            .as_ref()?
            .as_any()
            .downcast_ref::<Store<T>>()
    }

    fn store_mut<T: Component>(&mut self) -> Option<&mut Store<T>> {
        let id = component_id_of::<T>().ok()?;
        self.stores[id as usize]
            .as_mut()?
            .as_any_mut()
            .downcast_mut::<Store<T>>()
    }

    pub(crate) fn erased(&self, id: ComponentId) -> Option<&dyn TypeErasedStore> {
        self.stores.get(id as usize).and_then(|s| s.as_deref())
    }

    /// Raw pointer to the store for `T`, for the unchecked query paths.
    ///
    /// Mutation through the result is only sound under the scheduling
    /// contract: either the caller holds `&mut Registry`, or conflict
    /// analysis proves no concurrent writer.
    pub(crate) fn store_ptr<T: Component>(&self) -> Option<*mut Store<T>> {
        let id = component_id_of::<T>().ok()?;
        let store = self.stores[id as usize]
            .as_ref()?
            .as_any()
            .downcast_ref::<Store<T>>()
            .expect("component store type mismatch");
        Some(store as *const Store<T> as *mut Store<T>)
    }

    /// Inserts `value` as the `T` component of `entity`, creating the store
    /// on first use. Re-adding overwrites the existing value in place.
    ///
    /// ## Errors
    /// Propagates type-table exhaustion and fixed-capacity storage
    /// overflow.
    pub fn add<T: Component>(&mut self, entity: Entity, value: T) -> EcsResult<&mut T> {
        let (_, store) = self.ensure_store::<T>()?;
        let slot = store.add(entity)?;
        *slot = value;
        Ok(slot)
    }

    /// Inserts a default-constructed `T` for `entity` and returns it for
    /// in-place construction.
    pub fn emplace<T: Component>(&mut self, entity: Entity) -> EcsResult<&mut T> {
        let (_, store) = self.ensure_store::<T>()?;
        store.add(entity)
    }

    /// Returns the `T` component of `entity`, if present.
    pub fn get<T: Component>(&self, entity: Entity) -> Option<&T> {
        self.store::<T>()?.get(entity)
    }

    /// Mutable variant of [`Registry::get`].
    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        self.store_mut::<T>()?.get_mut(entity)
    }

    /// Returns `true` if `entity` owns a `T` component.
    pub fn has<T: Component>(&self, entity: Entity) -> bool {
        self.store::<T>().is_some_and(|s| s.has(entity))
    }

    /// Removes the `T` component of `entity`. Removing an absent component
    /// (or from a never-touched store) is a no-op.
    pub fn remove<T: Component>(&mut self, entity: Entity) {
        if let Some(store) = self.store_mut::<T>() {
            store.remove(entity);
        }
    }

    /// Replaces the storage strategy of `T` with a fresh store of `kind`.
    ///
    /// A strategy switch is a reset: any values previously stored for `T`
    /// are discarded, not migrated. Queries cannot be live across this call
    /// because they borrow the registry.
    pub fn set_storage_type<T: Component>(&mut self, kind: StorageKind) -> EcsResult<()> {
        let id = component_id_of::<T>()?;
        if let Some(existing) = &self.stores[id as usize] {
            if existing.len() > 0 {
                log::warn!(
                    "storage switch discards {} values of {}",
                    existing.len(),
                    type_name::<T>()
                );
            }
        }
        self.stores[id as usize] = Some(Box::new(Store::<T>::with_kind(kind)));
        Ok(())
    }

    /// Cursor over every `T` in packed order.
    pub fn view<T: Component>(&mut self) -> EcsResult<View<'_, T>> {
        let (_, store) = self.ensure_store::<T>()?;
        Ok(View::new(store))
    }

    /// Mutable cursor over every `T` in packed order.
    pub fn view_mut<T: Component>(&mut self) -> EcsResult<ViewMut<'_, T>> {
        let (_, store) = self.ensure_store::<T>()?;
        Ok(ViewMut::new(store))
    }

    /// Builds a multi-component intersection query.
    ///
    /// Access is declared with `Read<T>` / `Write<T>` markers combined in a
    /// tuple; the same component type must not appear twice.
    pub fn filter<Q: AccessSet>(&mut self) -> EcsResult<Filter<'_, Q>> {
        Q::ensure(self)?;
        let include = Q::component_ids()?;
        debug_assert!(
            include.iter().all(|id| include.iter().filter(|&&o| o == *id).count() == 1),
            "a component type may appear only once per query"
        );
        let access = Q::access()?;
        Ok(Filter::new(self, FilterDesc::new(include, access)))
    }

    /// Registers a system with the scheduler. Systems run on the next
    /// [`Registry::execute_scheduled`], grouped into conflict-free batches.
    pub fn schedule(&mut self, entry: SystemEntry) {
        self.scheduler.register(entry);
    }

    /// Direct access to the scheduler, for hand-built systems and plan
    /// inspection.
    pub fn scheduler_mut(&mut self) -> &mut Scheduler {
        &mut self.scheduler
    }

    /// Runs all registered systems once, in conflict-free parallel batches.
    ///
    /// If a system panics the panic propagates and the registered systems
    /// are dropped; the registry itself stays usable and a subsequent call
    /// runs an empty schedule rather than deadlocking.
    pub fn execute_scheduled(&mut self) {
        let mut scheduler = std::mem::take(&mut self.scheduler);
        scheduler.run_all(self);
        self.scheduler = scheduler;
    }

    /// Destroys all entities and empties every store. Registered systems
    /// are kept.
    pub fn clear(&mut self) {
        self.entities.clear();
        self.entity_count = 0;
        for store in self.stores.iter_mut().flatten() {
            store.clear();
        }
    }
}
