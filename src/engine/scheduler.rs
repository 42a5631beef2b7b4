//! System scheduling and batched parallel execution.
//!
//! This module is responsible for:
//! * grouping registered systems into conflict-free batches based on their
//!   declared read/write masks,
//! * running each batch on the worker pool while preserving the observable
//!   semantics of sequential execution in registration order,
//! * keeping the computed plan cached between runs.
//!
//! ## Batching model
//!
//! Registration order is the serialization order. Walking the systems in
//! that order, a system joins the current batch unless it conflicts with
//! the batch's accumulated masks — a write overlapping any prior write
//! (WW), a write overlapping any prior read (WR), or a read overlapping any
//! prior write (RW). On conflict the batch is sealed, the accumulated masks
//! are cleared, and a new batch opens with the conflicting system.
//!
//! Batches execute strictly in order: every task of batch *k* completes
//! before any task of batch *k + 1* begins, so the pool join between
//! batches doubles as the happens-before edge for memory effects. Within a
//! batch of one, the task runs inline on the calling thread; larger batches
//! fan out on the worker pool.
//!
//! ## Safety note
//!
//! Tasks receive a shared registry reference and rely on the batch
//! invariant for exclusivity of their writes. Systems are assumed not to
//! panic; if one does, the panic propagates out of `run_all` and the next
//! run starts from a clean plan rather than deadlocking.

use crate::engine::jobs;
use crate::engine::registry::Registry;
use crate::engine::types::{AccessSets, TypeMask};

/// A system registered with the scheduler: declared component access plus
/// the zero-argument task body.
pub struct SystemEntry {
    access: AccessSets,
    task: Box<dyn Fn(&Registry) + Send + Sync>,
}

impl SystemEntry {
    /// Creates a system descriptor from explicit masks and a task.
    ///
    /// Most systems are built through `Filter::schedule`, which deduces the
    /// masks; this constructor is for hand-assembled systems.
    pub fn new(
        read: TypeMask,
        write: TypeMask,
        task: Box<dyn Fn(&Registry) + Send + Sync>,
    ) -> Self {
        Self {
            access: AccessSets { read, write },
            task,
        }
    }

    /// The declared component access of this system.
    pub fn access(&self) -> &AccessSets {
        &self.access
    }
}

/// Groups systems into conflict-free batches and executes them.
pub struct Scheduler {
    entries: Vec<SystemEntry>,
    /// Cached batches, as indices into `entries`.
    plan: Vec<Vec<usize>>,
    /// Whether `plan` needs rebuilding.
    dirty: bool,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    /// Creates an empty scheduler.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            plan: Vec::new(),
            dirty: true,
        }
    }

    /// Number of registered systems.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no systems are registered.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Appends a system. Registration order is the order against which
    /// parallel execution is checked.
    pub fn register(&mut self, entry: SystemEntry) {
        self.entries.push(entry);
        self.dirty = true;
    }

    /// Removes all systems and the cached plan.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.plan.clear();
        self.dirty = true;
    }

    fn rebuild(&mut self) {
        if !self.dirty {
            return;
        }
        self.plan.clear();

        let mut batch_access = AccessSets::default();
        let mut current: Vec<usize> = Vec::new();

        for (index, entry) in self.entries.iter().enumerate() {
            if !current.is_empty() && entry.access.conflicts_with(&batch_access) {
                self.plan.push(std::mem::take(&mut current));
                batch_access = AccessSets::default();
            }
            current.push(index);
            batch_access.merge(&entry.access);
        }
        if !current.is_empty() {
            self.plan.push(current);
        }
        self.dirty = false;
    }

    /// The batches the next [`Scheduler::run_all`] will execute, as indices
    /// into the registration order.
    pub fn plan(&mut self) -> &[Vec<usize>] {
        self.rebuild();
        &self.plan
    }

    /// Runs every registered system once.
    ///
    /// Rebuilds the plan if needed, then executes the batches in order. A
    /// single-system batch runs inline; larger batches are submitted to the
    /// worker pool and joined before the next batch starts.
    pub fn run_all(&mut self, registry: &Registry) {
        self.rebuild();
        log::trace!(
            "running {} systems in {} batches",
            self.entries.len(),
            self.plan.len()
        );

        for batch in &self.plan {
            if batch.len() == 1 {
                (self.entries[batch[0]].task)(registry);
            } else {
                jobs::scope(|scope| {
                    for &index in batch {
                        let entry = &self.entries[index];
                        scope.spawn(move |_| (entry.task)(registry));
                    }
                });
            }
        }
    }
}
