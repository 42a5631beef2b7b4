//! Typed query construction and execution.
//!
//! This module provides the two query shapes the registry hands out:
//!
//! * [`View`] / [`ViewMut`] — a cursor over a single store, visiting values
//!   in packed order.
//! * [`Filter`] — the intersection of several stores, with optional
//!   exclusions.
//!
//! ## Declaring access
//!
//! A filter names its components with the zero-sized [`Read`] / [`Write`]
//! markers combined in a tuple, e.g.
//! `registry.filter::<(Read<Position>, Write<Velocity>)>()`. The markers
//! state, at the type level, which stores participate and which of them
//! the callback mutates; `schedule` deduces its system masks from exactly
//! this information.
//!
//! ## Execution model
//!
//! * `run` — synchronous and density-adaptive. When the live-entity count
//!   and the smallest participating store are both small, it probes the
//!   smallest store's entity list against the other stores (`has`). Above
//!   the thresholds it ANDs all membership bitmaps (minus the excluded
//!   ones) once and walks the set bits of the joint mask.
//! * `dispatch` — always builds the joint mask, partitions its set bits
//!   into groups sized `max(32, n / (threads * 4))`, submits the groups to
//!   the worker pool, and waits for completion.
//! * `schedule` — registers the query body as a system; it runs at the
//!   next scheduled execution inside a conflict-free batch.
//!
//! ## Ordering
//!
//! The sparse path visits entities in the smallest store's packed order;
//! the dense path and `dispatch` visit in ascending entity-id order
//! (`dispatch` gives no ordering guarantee *across* groups). Both paths
//! visit the same entity set for the same component data.
//!
//! ## Safety
//!
//! Per-entity access goes through raw store pointers: either the caller
//! holds `&mut Registry` (`run`/`dispatch` from user code), or the
//! scheduler's conflict analysis proves no concurrent writer (scheduled
//! systems). A component type may appear only once per filter.

use std::marker::PhantomData;

use rayon::prelude::*;

use crate::engine::entity::Entity;
use crate::engine::error::EcsResult;
use crate::engine::jobs;
use crate::engine::registry::{component_id_of, Registry};
use crate::engine::scheduler::SystemEntry;
use crate::engine::storage::{Component, Store, TypeErasedStore};
use crate::engine::types::{AccessSets, ComponentId};

/// Declares read-only access to component `T` in a filter tuple.
pub struct Read<T>(PhantomData<T>);

/// Declares mutable access to component `T` in a filter tuple.
pub struct Write<T>(PhantomData<T>);

/// One access declaration inside a filter tuple: [`Read`] or [`Write`].
pub trait ComponentAccess: 'static {
    /// The component type behind the marker.
    type Component: Component;

    /// What the callback receives: `&T` or `&mut T`.
    type Item<'w>;

    /// Whether this access mutates the component.
    const MUTABLE: bool;

    /// Produces the callback argument for one entity.
    ///
    /// ## Safety
    /// `entity` must be a member of the store, and the caller must hold the
    /// exclusivity the marker requires.
    unsafe fn fetch<'w>(store: *mut Store<Self::Component>, entity: Entity) -> Self::Item<'w>;
}

impl<T: Component> ComponentAccess for Read<T> {
    type Component = T;
    type Item<'w> = &'w T;
    const MUTABLE: bool = false;

    #[inline]
    unsafe fn fetch<'w>(store: *mut Store<T>, entity: Entity) -> &'w T {
        unsafe { &*(*store).get_unchecked_mut(entity) }
    }
}

impl<T: Component> ComponentAccess for Write<T> {
    type Component = T;
    type Item<'w> = &'w mut T;
    const MUTABLE: bool = true;

    #[inline]
    unsafe fn fetch<'w>(store: *mut Store<T>, entity: Entity) -> &'w mut T {
        unsafe { (*store).get_unchecked_mut(entity) }
    }
}

/// A tuple of [`ComponentAccess`] declarations forming a filter's include
/// set. Implemented for tuples of arity 1 through 8.
pub trait AccessSet: 'static {
    /// The tuple of references passed to the callback.
    type Item<'w>;

    /// Raw pointers to the participating stores.
    type Ptrs: Copy;

    /// Component ids in declaration order.
    fn component_ids() -> EcsResult<Vec<ComponentId>>;

    /// Read/write masks deduced from the markers.
    fn access() -> EcsResult<AccessSets>;

    /// Creates any missing stores.
    fn ensure(registry: &mut Registry) -> EcsResult<()>;

    /// Captures the store pointers.
    ///
    /// ## Safety
    /// Every participating store must exist, and the caller must guarantee
    /// the exclusivity contract for any subsequent [`AccessSet::fetch`].
    unsafe fn ptrs(registry: &Registry) -> Self::Ptrs;

    /// Produces the callback arguments for one entity.
    ///
    /// ## Safety
    /// `entity` must be a member of every participating store.
    unsafe fn fetch<'w>(ptrs: Self::Ptrs, entity: Entity) -> Self::Item<'w>;
}

macro_rules! impl_access_set {
    ($(($param:ident, $index:tt)),+) => {
        impl<$($param: ComponentAccess),+> AccessSet for ($($param,)+) {
            type Item<'w> = ($($param::Item<'w>,)+);
            type Ptrs = ($(*mut Store<$param::Component>,)+);

            fn component_ids() -> EcsResult<Vec<ComponentId>> {
                Ok(vec![$(component_id_of::<$param::Component>()?),+])
            }

            fn access() -> EcsResult<AccessSets> {
                let mut sets = AccessSets::default();
                $(
                    if $param::MUTABLE {
                        sets.add_write::<$param::Component>()?;
                    } else {
                        sets.add_read::<$param::Component>()?;
                    }
                )+
                Ok(sets)
            }

            fn ensure(registry: &mut Registry) -> EcsResult<()> {
                $(registry.ensure_store::<$param::Component>()?;)+
                Ok(())
            }

            unsafe fn ptrs(registry: &Registry) -> Self::Ptrs {
                ($(
                    registry
                        .store_ptr::<$param::Component>()
                        .expect("filter store missing; filters must be built by the registry"),
                )+)
            }

            #[inline]
            unsafe fn fetch<'w>(ptrs: Self::Ptrs, entity: Entity) -> Self::Item<'w> {
                ($(unsafe { $param::fetch(ptrs.$index, entity) },)+)
            }
        }
    };
}

impl_access_set!((A, 0));
impl_access_set!((A, 0), (B, 1));
impl_access_set!((A, 0), (B, 1), (C, 2));
impl_access_set!((A, 0), (B, 1), (C, 2), (D, 3));
impl_access_set!((A, 0), (B, 1), (C, 2), (D, 3), (E, 4));
impl_access_set!((A, 0), (B, 1), (C, 2), (D, 3), (E, 4), (F, 5));
impl_access_set!((A, 0), (B, 1), (C, 2), (D, 3), (E, 4), (F, 5), (G, 6));
impl_access_set!((A, 0), (B, 1), (C, 2), (D, 3), (E, 4), (F, 5), (G, 6), (H, 7));

/// A tuple of plain component types, used for exclusion sets. Implemented
/// for tuples of arity 1 through 8.
pub trait ComponentList: 'static {
    /// Component ids in declaration order.
    fn component_ids() -> EcsResult<Vec<ComponentId>>;

    /// Creates any missing stores.
    fn ensure(registry: &mut Registry) -> EcsResult<()>;
}

macro_rules! impl_component_list {
    ($($param:ident),+) => {
        impl<$($param: Component),+> ComponentList for ($($param,)+) {
            fn component_ids() -> EcsResult<Vec<ComponentId>> {
                Ok(vec![$(component_id_of::<$param>()?),+])
            }

            fn ensure(registry: &mut Registry) -> EcsResult<()> {
                $(registry.ensure_store::<$param>()?;)+
                Ok(())
            }
        }
    };
}

impl_component_list!(A);
impl_component_list!(A, B);
impl_component_list!(A, B, C);
impl_component_list!(A, B, C, D);
impl_component_list!(A, B, C, D, E);
impl_component_list!(A, B, C, D, E, F);
impl_component_list!(A, B, C, D, E, F, G);
impl_component_list!(A, B, C, D, E, F, G, H);

/// Resolved, type-erased description of a filter: include and exclude ids
/// plus the deduced access sets. Owns no borrows, so scheduled systems can
/// keep it alive.
pub(crate) struct FilterDesc {
    include: Vec<ComponentId>,
    exclude: Vec<ComponentId>,
    access: AccessSets,
}

impl FilterDesc {
    pub(crate) fn new(include: Vec<ComponentId>, access: AccessSets) -> Self {
        Self {
            include,
            exclude: Vec::new(),
            access,
        }
    }
}

/// Multi-component intersection query with optional exclusions.
///
/// Produced by [`Registry::filter`]; borrows the registry for its whole
/// lifetime, which is what makes the raw-pointer access of the execution
/// paths sound for user code.
pub struct Filter<'r, Q: AccessSet> {
    registry: &'r mut Registry,
    desc: FilterDesc,
    _access: PhantomData<Q>,
}

impl<'r, Q: AccessSet> Filter<'r, Q> {
    pub(crate) fn new(registry: &'r mut Registry, desc: FilterDesc) -> Self {
        Self {
            registry,
            desc,
            _access: PhantomData,
        }
    }

    /// Excludes every entity owning any component in `E` from the visit.
    pub fn exclude<E: ComponentList>(mut self) -> EcsResult<Self> {
        E::ensure(self.registry)?;
        self.desc.exclude.extend(E::component_ids()?);
        Ok(self)
    }

    /// Runs the query synchronously on the calling thread.
    ///
    /// Chooses between the sparse probe and the dense joint-mask walk based
    /// on the live-entity count and the smallest participating store.
    pub fn run(&mut self, mut f: impl FnMut(Q::Item<'_>)) {
        // Safety: `self.registry` is an exclusive borrow for the whole call.
        unsafe { run_filter::<Q, _>(self.registry, &self.desc, &mut f) }
    }

    /// Runs the query on the worker pool and waits for completion.
    ///
    /// The set bits of the joint mask are partitioned into groups of
    /// `max(32, n / (threads * 4))` entities; groups run concurrently, so
    /// `f` must be safe to call from worker threads and must be a pure
    /// per-entity function for results to match [`Filter::run`].
    pub fn dispatch(&mut self, f: impl Fn(Q::Item<'_>) + Send + Sync) {
        // Safety: exclusive borrow; groups partition entities disjointly.
        unsafe { dispatch_filter::<Q, _>(self.registry, &self.desc, &f) }
    }

    /// Registers the query body as a system.
    ///
    /// Read/write masks are deduced from the `Read`/`Write` markers; the
    /// body runs at the next scheduled execution, possibly concurrently
    /// with non-conflicting systems.
    pub fn schedule(self, f: impl Fn(Q::Item<'_>) + Send + Sync + 'static) {
        let Filter { registry, desc, .. } = self;
        let access = desc.access;
        let task = Box::new(move |registry: &Registry| {
            // Safety: batch conflict analysis guarantees no concurrent
            // writer on any component this query touches.
            unsafe { run_filter::<Q, _>(registry, &desc, &mut |item| f(item)) }
        });
        registry
            .scheduler_mut()
            .register(SystemEntry::new(access.read, access.write, task));
    }
}

/// Density-adaptive serial execution over a resolved filter.
///
/// ## Safety
/// The caller must guarantee exclusivity for every component the access
/// set writes: either an exclusive registry borrow or scheduler conflict
/// analysis.
pub(crate) unsafe fn run_filter<'a, Q, F>(registry: &'a Registry, desc: &FilterDesc, f: &mut F)
where
    Q: AccessSet,
    F: FnMut(Q::Item<'a>),
{
    let ptrs = unsafe { Q::ptrs(registry) };

    let mut min_len = usize::MAX;
    let mut min_id = desc.include[0];
    for &id in &desc.include {
        let len = registry.erased(id).map_or(0, |s| s.len());
        if len < min_len {
            min_len = len;
            min_id = id;
        }
    }

    let live = registry.entity_count() as usize;
    let low_population = live <= 1_000;
    let medium_low_density = live > 1_000 && live <= 10_000 && min_len <= 1_500;
    let medium_high_low_density = live > 10_000 && live <= 20_000 && min_len <= 3_000;

    if low_population || medium_low_density || medium_high_low_density {
        let min_store = registry.erased(min_id).expect("include store exists");
        let others: Vec<&dyn TypeErasedStore> = desc
            .include
            .iter()
            .filter(|&&id| id != min_id)
            .map(|&id| registry.erased(id).expect("include store exists"))
            .collect();
        let excluded: Vec<&dyn TypeErasedStore> = desc
            .exclude
            .iter()
            .filter_map(|&id| registry.erased(id))
            .collect();

        // The callback mutates component values through `ptrs`; membership
        // arrays are structurally untouched, so raw indexing stays valid.
        let entities = min_store.entities();
        let base = entities.as_ptr();
        for i in 0..entities.len() {
            let entity = unsafe { *base.add(i) };
            if !others.iter().all(|s| s.has(entity)) {
                continue;
            }
            if excluded.iter().any(|s| s.has(entity)) {
                continue;
            }
            f(unsafe { Q::fetch(ptrs, entity) });
        }
    } else {
        let joint = joint_mask(registry, desc);
        for entity in joint.iter() {
            f(unsafe { Q::fetch(ptrs, entity) });
        }
    }
}

fn joint_mask(registry: &Registry, desc: &FilterDesc) -> crate::engine::mask::EntityMask {
    let mut joint = registry
        .erased(desc.include[0])
        .expect("include store exists")
        .mask()
        .clone();
    for &id in &desc.include[1..] {
        joint &= registry.erased(id).expect("include store exists").mask();
    }
    for &id in &desc.exclude {
        if let Some(store) = registry.erased(id) {
            joint -= store.mask();
        }
    }
    joint
}

#[derive(Clone, Copy)]
struct Shared<T>(T);

// Safety: the wrapped store pointers cross threads only under the dispatch
// contract, which partitions entities disjointly between groups.
unsafe impl<T> Send for Shared<T> {}
unsafe impl<T> Sync for Shared<T> {}

/// Parallel execution over a resolved filter: dense joint mask, grouped
/// set bits, worker-pool fan-out, join before return.
///
/// ## Safety
/// Same contract as [`run_filter`].
pub(crate) unsafe fn dispatch_filter<Q, F>(registry: &Registry, desc: &FilterDesc, f: &F)
where
    Q: AccessSet,
    F: for<'w> Fn(Q::Item<'w>) + Send + Sync,
{
    let ptrs = Shared(unsafe { Q::ptrs(registry) });
    let joint = joint_mask(registry, desc);
    let count = joint.count();
    if count == 0 {
        return;
    }

    let threads = jobs::thread_count().max(1);
    let group = (count / (threads * 4)).max(32);
    let entities: Vec<Entity> = joint.iter().collect();
    log::trace!("dispatching {count} entities in groups of {group}");

    jobs::install(move || {
        entities.par_chunks(group).for_each(|chunk| {
            let ptrs = ptrs;
            for &entity in chunk {
                f(unsafe { Q::fetch(ptrs.0, entity) });
            }
        });
    });
}

/// Read-only cursor over a single store, visiting values in packed order.
pub struct View<'r, T: Component> {
    store: &'r Store<T>,
}

impl<'r, T: Component> View<'r, T> {
    pub(crate) fn new(store: &'r Store<T>) -> Self {
        Self { store }
    }

    /// Invokes `f` for every live value; iteration order equals insertion
    /// order modulo swap-removes.
    pub fn for_each(&self, f: impl FnMut(&T)) {
        self.store.for_each(f);
    }

    /// Like [`View::for_each`], additionally passing the owning entity.
    pub fn for_each_with_entity(&self, f: impl FnMut(Entity, &T)) {
        self.store.for_each_with_entity(f);
    }

    /// Number of live values.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Returns `true` when the store is empty.
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

/// Mutable cursor over a single store, visiting values in packed order.
pub struct ViewMut<'r, T: Component> {
    store: &'r mut Store<T>,
}

impl<'r, T: Component> ViewMut<'r, T> {
    pub(crate) fn new(store: &'r mut Store<T>) -> Self {
        Self { store }
    }

    /// Invokes `f` for every live value; iteration order equals insertion
    /// order modulo swap-removes.
    pub fn for_each(&mut self, f: impl FnMut(&mut T)) {
        self.store.for_each_mut(f);
    }

    /// Like [`ViewMut::for_each`], additionally passing the owning entity.
    pub fn for_each_with_entity(&mut self, f: impl FnMut(Entity, &mut T)) {
        self.store.for_each_with_entity_mut(f);
    }

    /// Number of live values.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Returns `true` when the store is empty.
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}
