//! Process-wide worker pool.
//!
//! The scheduler and parallel query dispatch both fan work out through this
//! module. It wraps a [`rayon::ThreadPool`] behind an explicit
//! `initialize` / `shutdown` lifecycle and exposes the two primitives the
//! core needs:
//!
//! * [`execute`] — enqueue a unit of work on a [`JobContext`],
//! * [`wait`] — block until every unit enqueued on that context finished.
//!
//! Completion tracking is a plain counter-plus-condvar: `execute` bumps the
//! counter before the job is handed to the pool, the job decrements it when
//! done and signals waiters when it reaches zero.
//!
//! Crate-internal callers that fan out *borrowed* data (query dispatch,
//! scheduler batches) use the scoped helpers instead, which delegate to the
//! pool's structured scope and join implicitly.
//!
//! If no explicit `initialize` happened, the first use builds the pool with
//! rayon's default thread count. Jobs are assumed not to panic; a panicking
//! job is fatal to the process.

use std::sync::{Arc, Condvar, Mutex, RwLock};

struct JobSystem {
    pool: rayon::ThreadPool,
}

static JOBS: RwLock<Option<Arc<JobSystem>>> = RwLock::new(None);

fn build_pool(threads: usize) -> rayon::ThreadPool {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|index| format!("ecs-worker-{index}"))
        .build()
        .expect("worker pool construction failed")
}

fn handle() -> Arc<JobSystem> {
    if let Some(system) = JOBS.read().unwrap_or_else(|e| e.into_inner()).as_ref() {
        return Arc::clone(system);
    }
    let mut slot = JOBS.write().unwrap_or_else(|e| e.into_inner());
    if let Some(system) = slot.as_ref() {
        return Arc::clone(system);
    }
    log::debug!("worker pool initialized lazily with default thread count");
    let system = Arc::new(JobSystem {
        pool: build_pool(0),
    });
    *slot = Some(Arc::clone(&system));
    system
}

/// Builds the worker pool with `threads` workers (`0` means the library
/// default). Ignored if the pool already exists.
pub fn initialize(threads: usize) {
    let mut slot = JOBS.write().unwrap_or_else(|e| e.into_inner());
    if slot.is_some() {
        log::warn!("worker pool already initialized; ignoring");
        return;
    }
    *slot = Some(Arc::new(JobSystem {
        pool: build_pool(threads),
    }));
}

/// Tears the pool down. In-flight work on outstanding handles completes
/// before the threads exit; the next use builds a fresh pool.
pub fn shutdown() {
    let taken = JOBS.write().unwrap_or_else(|e| e.into_inner()).take();
    if taken.is_some() {
        log::debug!("worker pool shut down");
    }
}

/// Number of worker threads in the pool.
pub fn thread_count() -> usize {
    handle().pool.current_num_threads()
}

struct WaitState {
    pending: Mutex<u32>,
    done: Condvar,
}

/// Completion handle for a group of jobs submitted with [`execute`].
#[derive(Clone)]
pub struct JobContext {
    state: Arc<WaitState>,
}

impl Default for JobContext {
    fn default() -> Self {
        Self::new()
    }
}

impl JobContext {
    /// Creates a context with no outstanding jobs.
    pub fn new() -> Self {
        Self {
            state: Arc::new(WaitState {
                pending: Mutex::new(0),
                done: Condvar::new(),
            }),
        }
    }
}

/// Enqueues `job` on the worker pool, tracked by `ctx`.
pub fn execute(ctx: &JobContext, job: impl FnOnce() + Send + 'static) {
    {
        let mut pending = ctx.state.pending.lock().unwrap_or_else(|e| e.into_inner());
        *pending += 1;
    }
    let state = Arc::clone(&ctx.state);
    handle().pool.spawn(move || {
        job();
        let mut pending = state.pending.lock().unwrap_or_else(|e| e.into_inner());
        *pending -= 1;
        if *pending == 0 {
            state.done.notify_all();
        }
    });
}

/// Blocks until every job enqueued on `ctx` has finished. Returns
/// immediately when none are outstanding.
pub fn wait(ctx: &JobContext) {
    let mut pending = ctx.state.pending.lock().unwrap_or_else(|e| e.into_inner());
    while *pending > 0 {
        pending = ctx.state.done.wait(pending).unwrap_or_else(|e| e.into_inner());
    }
}

/// Runs `f` inside the pool so rayon parallel iterators use the ECS
/// workers.
pub(crate) fn install<R: Send>(f: impl FnOnce() -> R + Send) -> R {
    handle().pool.install(f)
}

/// Structured fan-out over borrowed data; joins before returning.
pub(crate) fn scope<'scope, OP>(op: OP)
where
    OP: FnOnce(&rayon::Scope<'scope>) + Send,
{
    handle().pool.scope(op);
}
