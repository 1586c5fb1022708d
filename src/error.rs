//! Error kinds surfaced by the collector.

/// Failure surface for the collector's public operations.
///
/// Unknown address and cycle collision are silent no-ops rather than
/// errors here, because a live mutator cannot legitimately trigger them
/// without a use-after-free bug, and the collector favors safety over
/// diagnostics there. Only allocation failure is a typed error.
#[derive(Debug, thiserror::Error)]
pub enum GcError {
    /// The host allocator could not provide `size` bytes for a new record.
    #[error("allocation of {size} bytes failed")]
    OutOfMemory {
        /// The number of bytes that could not be allocated.
        size: usize,
    },
}
