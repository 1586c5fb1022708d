//! Object record (C1): one descriptor per live allocation.

use std::alloc::Layout;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use rustc_hash::FxHashSet;

use crate::error::GcError;

/// A buffer's stable identity: the address of its first byte.
///
/// This is the value returned to callers by `allocate`, used as the key
/// into both generation tables, and embedded in `edges`/`parent` links.
pub type Address = usize;

/// A record's owned byte buffer.
///
/// Allocated directly through the global allocator rather than `Vec`/`Box`
/// so that a failed allocation surfaces as [`GcError::OutOfMemory`] instead
/// of aborting the process, matching §4.1's error condition for `allocate`.
struct Buffer {
    ptr: *mut u8,
    layout: Layout,
}

// SAFETY: the buffer is only ever reached through `Record`, which is always
// held behind `Arc` and whose own fields are already safe to share; the raw
// pointer here is never aliased mutably by the collector itself.
unsafe impl Send for Buffer {}
unsafe impl Sync for Buffer {}

impl Buffer {
    fn alloc(size: usize) -> Result<Self, GcError> {
        // A zero-size request still needs a unique, stable address; round
        // up to 1 byte so `Layout` and the allocator agree on a real allocation.
        let alloc_size = size.max(1);
        let layout = match Layout::from_size_align(alloc_size, 8) {
            Ok(layout) => layout,
            Err(_) => return Err(GcError::OutOfMemory { size }),
        };
        // SAFETY: layout has non-zero size.
        let ptr = unsafe { std::alloc::alloc_zeroed(layout) };
        if ptr.is_null() {
            return Err(GcError::OutOfMemory { size });
        }
        Ok(Self { ptr, layout })
    }

    fn address(&self) -> Address {
        self.ptr as usize
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        // SAFETY: `ptr`/`layout` came from a matching `alloc_zeroed` call
        // and are only ever freed once, here.
        unsafe { std::alloc::dealloc(self.ptr, self.layout) };
    }
}

/// The per-record state guarded by the record's own lock rather than the
/// global gc lock: the outgoing edge set and the parent back-link.
///
/// Kept together because both are mutated by `allocate`/`reparent` and
/// read together during mark, so a single lock avoids ordering two
/// independent locks at every call site.
#[derive(Default)]
pub(crate) struct RecordLinks {
    pub edges: FxHashSet<Address>,
    pub parent: Option<Address>,
}

/// One descriptor for a live allocation.
///
/// `address`, `size`, `memory` never change after construction. `is_root`
/// may transition true → false (never the reverse). `mark` is transient,
/// meaningful only during an in-progress cycle. `links` (edges + parent)
/// is mutated under its own lock, independent of the gc lock that guards
/// generation-table membership.
pub struct Record {
    address: Address,
    size: usize,
    is_root: AtomicBool,
    mark: AtomicBool,
    pub(crate) links: Mutex<RecordLinks>,
    buffer: Buffer,
}

impl Record {
    /// Allocate a fresh buffer of `size` bytes and wrap it in a new record.
    pub(crate) fn new(size: usize, is_root: bool) -> Result<Self, GcError> {
        let buffer = Buffer::alloc(size)?;
        let address = buffer.address();
        Ok(Self {
            address,
            size,
            is_root: AtomicBool::new(is_root),
            mark: AtomicBool::new(false),
            links: Mutex::new(RecordLinks::default()),
            buffer,
        })
    }

    /// The buffer's stable identity.
    pub fn address(&self) -> Address {
        self.address
    }

    /// The byte size requested at allocation.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Whether this record is currently a reachability root.
    pub fn is_root(&self) -> bool {
        self.is_root.load(Ordering::Relaxed)
    }

    pub(crate) fn set_root(&self, is_root: bool) {
        self.is_root.store(is_root, Ordering::Relaxed);
    }

    pub(crate) fn is_marked(&self) -> bool {
        self.mark.load(Ordering::Relaxed)
    }

    pub(crate) fn set_marked(&self, marked: bool) {
        self.mark.store(marked, Ordering::Relaxed);
    }

    /// Test-and-clear the mark bit in one step, as sweep needs: read
    /// whether the record survives, then reset it to false regardless.
    pub(crate) fn take_marked(&self) -> bool {
        self.mark.swap(false, Ordering::Relaxed)
    }

    pub(crate) fn parent(&self) -> Option<Address> {
        self.links.lock().parent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_record_has_unique_address_and_no_links() {
        let a = Record::new(16, true).unwrap();
        let b = Record::new(16, false).unwrap();
        assert_ne!(a.address(), b.address());
        assert!(a.is_root());
        assert!(!b.is_root());
        assert!(!a.is_marked());
        assert!(a.links.lock().edges.is_empty());
        assert!(a.links.lock().parent.is_none());
    }

    #[test]
    fn buffer_is_writable_through_its_address() {
        let record = Record::new(8, false).unwrap();
        let ptr = record.address() as *mut u8;
        unsafe {
            std::ptr::write(ptr, 0x42);
            assert_eq!(std::ptr::read(ptr), 0x42);
        }
    }

    #[test]
    fn root_flag_clears_but_mark_round_trips() {
        let record = Record::new(8, true).unwrap();
        record.set_root(false);
        assert!(!record.is_root());

        record.set_marked(true);
        assert!(record.take_marked());
        assert!(!record.is_marked());
    }
}
