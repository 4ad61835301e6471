//! Intrusive block headers over the cell buffer
//!
//! Every block, allocated or free, starts at a header cell holding the
//! block's total size in cells. The cell after the header is overloaded:
//! it is the next-free link while the block sits on the free list, and
//! the first payload cell once the block is handed out.
//!
//! ```text
//!   free block at p:            allocated block at p:
//!   ┌────────┬────────┬────┐    ┌────────┬─────────────┐
//!   │ size   │ next   │ .. │    │ size   │ payload ... │
//!   └────────┴────────┴────┘    └────────┴─────────────┘
//!     p        p+1                p        p+1 = handle
//! ```
//!
//! `BlockStart` wraps the header index and keeps every buffer access
//! bounds-checked; no other module indexes the buffer directly.

use std::fmt;

use super::error::HeapError;

/// One storage unit of the managed buffer
pub type Cell = i64;

/// Null link sentinel stored in next-free cells
pub const NULL: Cell = -1;

/// Handle to an allocated block
///
/// Points at the first payload cell, one past the block header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(pub usize);

impl Handle {
    /// Create a handle from a raw payload index
    pub fn new(value: usize) -> Self {
        Self(value)
    }

    /// Get the raw payload index
    pub fn raw(&self) -> usize {
        self.0
    }

    /// Block-start index of the block this handle belongs to
    ///
    /// Callers must have range-checked the handle first; a zero handle
    /// has no header cell.
    pub(crate) fn block_start(&self) -> BlockStart {
        BlockStart(self.0 - 1)
    }
}

impl fmt::Display for Handle {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "handle@{}", self.0)
    }
}

/// Typed block-start index
///
/// All header reads and writes go through this wrapper so that every
/// dereference is checked against the buffer before it touches a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BlockStart(pub usize);

impl BlockStart {
    /// Handle for this block's payload
    pub fn handle(self) -> Handle {
        Handle(self.0 + 1)
    }

    /// Read the block's total size in cells, header included
    ///
    /// A size that is below the two-cell minimum or runs past the end of
    /// the buffer is corruption, not a block.
    pub fn size(
        self,
        mem: &[Cell],
    ) -> Result<usize, HeapError> {
        let raw = read(mem, self.0)?;
        if raw < 2 || self.0 + raw as usize > mem.len() {
            return Err(HeapError::OutOfBounds {
                index: self.0,
                capacity: mem.len(),
            });
        }
        Ok(raw as usize)
    }

    /// Read the next-free link
    pub fn next(
        self,
        mem: &[Cell],
    ) -> Result<Option<usize>, HeapError> {
        decode_link(read(mem, self.0 + 1)?, self.0 + 1, mem.len())
    }

    /// Write the size field
    pub fn set_size(
        self,
        mem: &mut [Cell],
        size: usize,
    ) -> Result<(), HeapError> {
        write(mem, self.0, size as Cell)
    }

    /// Write the next-free link
    pub fn set_next(
        self,
        mem: &mut [Cell],
        next: Option<usize>,
    ) -> Result<(), HeapError> {
        write(mem, self.0 + 1, encode_link(next))
    }
}

fn read(
    mem: &[Cell],
    index: usize,
) -> Result<Cell, HeapError> {
    mem.get(index).copied().ok_or(HeapError::OutOfBounds {
        index,
        capacity: mem.len(),
    })
}

fn write(
    mem: &mut [Cell],
    index: usize,
    value: Cell,
) -> Result<(), HeapError> {
    let capacity = mem.len();
    let slot = mem
        .get_mut(index)
        .ok_or(HeapError::OutOfBounds { index, capacity })?;
    *slot = value;
    Ok(())
}

/// Encode an optional block-start index into a link cell
pub(crate) fn encode_link(next: Option<usize>) -> Cell {
    match next {
        Some(index) => index as Cell,
        None => NULL,
    }
}

/// Decode a link cell read at index `at`
///
/// Anything that is neither `NULL` nor a block-start with room for a
/// header pair inside the buffer is rejected as corruption.
pub(crate) fn decode_link(
    cell: Cell,
    at: usize,
    capacity: usize,
) -> Result<Option<usize>, HeapError> {
    if cell == NULL {
        return Ok(None);
    }
    if cell < 0 {
        return Err(HeapError::OutOfBounds { index: at, capacity });
    }
    let target = cell as usize;
    if target + 1 >= capacity {
        return Err(HeapError::OutOfBounds {
            index: target,
            capacity,
        });
    }
    Ok(Some(target))
}
