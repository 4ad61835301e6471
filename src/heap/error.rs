//! Heap manager error types

use thiserror::Error;

use super::block::Handle;

/// Heap allocation and deallocation errors
///
/// Every failing operation leaves the manager exactly as it was; a block
/// is never half-carved and the free list is never half-relinked.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HeapError {
    /// No free block is large enough for the request
    #[error("out of memory: no free block holds {requested} payload cells")]
    OutOfMemory { requested: usize },

    /// Handle is out of range or does not name a live allocated block
    #[error("invalid handle: {handle}")]
    InvalidHandle { handle: Handle },

    /// Deallocation found no free block to link the returned block after
    #[error("invalid free: {handle} has no insertion point in the free list")]
    InvalidFree { handle: Handle },

    /// A size or link field led outside the buffer
    #[error("corrupt heap: index {index} out of bounds (capacity {capacity})")]
    OutOfBounds { index: usize, capacity: usize },

    /// Free-list links stopped ascending: a cycle or a clobbered link
    #[error("corrupt heap: free list does not terminate (link at block {at})")]
    BrokenFreeList { at: usize },

    /// Buffer cannot host even a single header plus link cell
    #[error("capacity too small: {capacity} cells (minimum 2)")]
    CapacityTooSmall { capacity: usize },

    /// Zero-sized allocation request
    #[error("allocation request must be positive")]
    InvalidRequest,
}
