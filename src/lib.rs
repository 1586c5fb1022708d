//! A generational mark-sweep garbage collector offered as a drop-in
//! dynamic allocator.
//!
//! Mutators obtain raw memory through [`Gc::allocate`] (or the free
//! functions over the process-wide singleton), optionally recording a
//! parent/child edge in an object graph. The collector periodically traces
//! reachability from explicitly flagged roots and reclaims unreachable
//! buffers, either on a background timer or when a mutator forces a cycle.
//!
//! The collector does not scan the interior of user buffers for pointers:
//! reachability is expressed solely through the edges declared at
//! allocation time and through [`Gc::reparent`]. It is a non-moving
//! collector — a surviving object's address never changes.
//!
//! # Example
//!
//! ```
//! use otter_gc::Gc;
//!
//! let gc = Gc::new();
//! let root = gc.allocate(64, true, None).unwrap();
//! let _child = gc.allocate(16, false, Some(root)).unwrap();
//! gc.force_collect(false);
//! assert_eq!(gc.young_gen_size(), 80);
//! ```

mod config;
mod error;
mod generation;
mod object;
mod scheduler;
mod tracer;
mod worker;

use std::sync::Arc;
use std::sync::OnceLock;

pub use config::Config;
pub use error::GcError;
pub use object::Address;
pub use scheduler::CycleKind;

use scheduler::Scheduler;
use worker::Worker;

/// A constructible collector instance.
///
/// Most embedders want the process-wide singleton exposed as the free
/// functions in this crate's root (`otter_gc::allocate`, etc.). `Gc` is
/// exposed separately so tests — and embedders that want more than one
/// isolated heap — can construct and tear down their own instance instead
/// of sharing global state.
pub struct Gc {
    scheduler: Arc<Scheduler>,
    worker: Worker,
}

impl Gc {
    /// Construct a collector with default thresholds and tick period,
    /// starting its background worker thread immediately.
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Construct a collector with the given configuration.
    pub fn with_config(config: Config) -> Self {
        let scheduler = Arc::new(Scheduler::new(config));
        let worker = Worker::spawn(scheduler.clone(), scheduler.tick_period());
        Self { scheduler, worker }
    }

    /// Allocate a fresh buffer of `size` bytes, returning its address.
    ///
    /// If `parent` names a live record, an edge from that record to the
    /// new one is recorded and, if the parent lives in the old generation,
    /// the new record is added to the remembered set. An unresolvable
    /// `parent` is silently ignored — allocation still succeeds.
    pub fn allocate(
        &self,
        size: usize,
        is_root: bool,
        parent: Option<Address>,
    ) -> Result<Address, GcError> {
        self.scheduler.allocate(size, is_root, parent)
    }

    /// Clear the root flag on `address`. A no-op if `address` is unknown.
    /// Does not free memory — only a later collection cycle can do that.
    pub fn free(&self, address: Address) {
        self.scheduler.free(address);
    }

    /// Reassign `address`'s incoming edge from its previous parent to
    /// `new_parent`. A no-op if `address` is unknown; if `new_parent` is
    /// unknown, the edge change is skipped (the previous edge, if any, is
    /// left untouched).
    pub fn reparent(&self, address: Address, new_parent: Address) {
        self.scheduler.reparent(address, new_parent);
    }

    /// Run a minor (`major = false`) or major (`major = true`) cycle
    /// synchronously, bypassing the threshold check. Returns `false`
    /// without doing anything if a cycle is already running.
    pub fn force_collect(&self, major: bool) -> bool {
        let kind = if major {
            CycleKind::Major
        } else {
            CycleKind::Minor
        };
        self.scheduler.force_collect(kind)
    }

    /// Replace the automatic-collection policy. Ratios are accepted as
    /// given, even out of `[0, 1]`.
    pub fn configure_thresholds(
        &self,
        young_threshold: usize,
        old_threshold: usize,
        young_ratio: f64,
        old_ratio: f64,
    ) {
        self.scheduler
            .configure(young_threshold, old_threshold, young_ratio, old_ratio);
    }

    /// Cumulative number of collection cycles completed.
    pub fn collections_count(&self) -> usize {
        self.scheduler.collections_count()
    }

    /// Current bytes live in the young generation.
    pub fn young_gen_size(&self) -> usize {
        self.scheduler.young_gen_size()
    }

    /// Current bytes live in the old generation.
    pub fn old_gen_size(&self) -> usize {
        self.scheduler.old_gen_size()
    }

    /// Stop the background worker and join its thread. Called
    /// automatically on drop; exposed for callers that want a
    /// deterministic teardown point before the collector itself is
    /// dropped.
    pub fn shutdown(&self) {
        self.worker.shutdown();
    }
}

impl Default for Gc {
    fn default() -> Self {
        Self::new()
    }
}

static GLOBAL: OnceLock<Gc> = OnceLock::new();

fn global() -> &'static Gc {
    GLOBAL.get_or_init(Gc::new)
}

/// Allocate through the process-wide singleton, constructing it on first
/// use. See [`Gc::allocate`].
pub fn allocate(size: usize, is_root: bool, parent: Option<Address>) -> Result<Address, GcError> {
    global().allocate(size, is_root, parent)
}

/// Free through the process-wide singleton. See [`Gc::free`].
pub fn free(address: Address) {
    global().free(address);
}

/// Reparent through the process-wide singleton. See [`Gc::reparent`].
pub fn reparent(address: Address, new_parent: Address) {
    global().reparent(address, new_parent);
}

/// Force a collection through the process-wide singleton. See
/// [`Gc::force_collect`].
pub fn force_collect(major: bool) -> bool {
    global().force_collect(major)
}

/// Reconfigure the process-wide singleton. See [`Gc::configure_thresholds`].
pub fn configure_thresholds(
    young_threshold: usize,
    old_threshold: usize,
    young_ratio: f64,
    old_ratio: f64,
) {
    global().configure_thresholds(young_threshold, old_threshold, young_ratio, old_ratio);
}

/// Cumulative cycles completed by the process-wide singleton.
pub fn collections_count() -> usize {
    global().collections_count()
}

/// Current young-generation byte total of the process-wide singleton.
pub fn young_gen_size() -> usize {
    global().young_gen_size()
}

/// Current old-generation byte total of the process-wide singleton.
pub fn old_gen_size() -> usize {
    global().old_gen_size()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gc_handle_round_trips_allocation_and_collection() {
        let gc = Gc::new();
        let root = gc.allocate(100, true, None).unwrap();
        let ptr = root as *mut u8;
        unsafe { std::ptr::write(ptr, 7) };

        gc.free(root);
        assert!(gc.force_collect(false));
        assert!(gc.force_collect(false));
        assert!(gc.collections_count() >= 2);
        gc.shutdown();
    }

    #[test]
    fn global_singleton_is_reachable_through_free_functions() {
        let address = allocate(8, true, None).unwrap();
        assert!(force_collect(false));
        assert!(collections_count() >= 1);
        free(address);
    }
}
