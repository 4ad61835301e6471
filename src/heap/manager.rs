//! First-fit free-list heap manager
//!
//! `HeapManager` owns a flat buffer of [`Cell`]s and threads a
//! singly-linked free list through the header cells of free blocks.
//! `allocate` performs a first-fit walk and carves the request from the
//! front of the winning block; `deallocate` reinserts blocks in address
//! order. Adjacent free blocks are never coalesced, so the free list only
//! ever trades blocks for smaller ones until they are freed again.
//!
//! The manager is single-threaded and non-reentrant: both operations take
//! `&mut self` and run to completion. Callers sharing one instance across
//! threads must serialize access externally.

use std::collections::BTreeSet;
use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::block::{BlockStart, Cell, Handle};
use super::error::HeapError;

/// Manager construction options
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HeapConfig {
    /// Track live handles and reject frees of anything else
    ///
    /// Off by default: the minimal contract leaves double frees and
    /// foreign handles undetected, exactly like the intrusive design
    /// implies. Turning this on trades a `BTreeSet` per heap for clean
    /// `InvalidHandle` errors on misuse.
    #[serde(default)]
    pub validate_handles: bool,
}

/// One node of the free list, as reported by [`HeapManager::free_blocks`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FreeBlock {
    /// Block-start index
    pub start: usize,
    /// Total size in cells, header included
    pub size: usize,
}

/// Snapshot of the manager state for dumps and the `stats` trace command
#[derive(Debug, Clone, Serialize)]
pub struct HeapStats {
    /// Buffer length in cells
    pub capacity: usize,
    /// Block-start index of the free-list head
    pub free_start: Option<usize>,
    /// Total free cells, headers included
    pub free_cells: usize,
    /// Size of the largest free block
    pub largest_free: usize,
    /// Free list in link order
    pub free_blocks: Vec<FreeBlock>,
    /// Live handle count when validation is enabled
    pub live_handles: Option<usize>,
}

/// Explicit free-list heap manager over a flat cell buffer
///
/// # Example
///
/// ```rust
/// use cellheap::HeapManager;
///
/// let mut heap = HeapManager::with_capacity(15).unwrap();
/// let a = heap.allocate(2).unwrap();
/// assert_eq!(a.raw(), 1);
/// heap.payload_mut(a).unwrap().fill(7);
/// heap.deallocate(a).unwrap();
/// assert_eq!(heap.free_cells().unwrap(), 15);
/// ```
#[derive(Debug)]
pub struct HeapManager {
    /// The managed buffer; blocks and the free list live inside it
    memory: Vec<Cell>,
    /// Block-start index of the first free block
    free_start: Option<usize>,
    /// Live handles, tracked only when validation is enabled
    live: Option<BTreeSet<Handle>>,
}

impl HeapManager {
    /// Take ownership of `buffer` and initialize it as one free block
    /// spanning the whole buffer
    ///
    /// Cells 0 and 1 are overwritten with the initial header; the rest of
    /// the buffer is left as supplied.
    pub fn new(buffer: Vec<Cell>) -> Result<Self, HeapError> {
        Self::with_config(buffer, HeapConfig::default())
    }

    /// [`new`](Self::new) with explicit options
    pub fn with_config(
        buffer: Vec<Cell>,
        config: HeapConfig,
    ) -> Result<Self, HeapError> {
        let capacity = buffer.len();
        if capacity < 2 {
            return Err(HeapError::CapacityTooSmall { capacity });
        }
        let mut manager = Self {
            memory: buffer,
            free_start: Some(0),
            live: config.validate_handles.then(BTreeSet::new),
        };
        BlockStart(0).set_size(&mut manager.memory, capacity)?;
        BlockStart(0).set_next(&mut manager.memory, None)?;
        debug!("heap initialized: {} cells", capacity);
        Ok(manager)
    }

    /// Fresh manager over a zeroed buffer of `capacity` cells
    pub fn with_capacity(capacity: usize) -> Result<Self, HeapError> {
        Self::new(vec![0; capacity])
    }

    /// Allocate `request` usable cells, returning a handle to the first
    /// payload cell
    ///
    /// First-fit: walks the free list from the head and takes the first
    /// block whose total size covers the request plus its header cell.
    /// When the winning block leaves more than one cell over, the request
    /// is carved from the front and the remainder replaces the block on
    /// the free list; otherwise the whole block is handed out with its
    /// size field untouched, so a one-cell remainder rides along unused
    /// until the block comes back.
    ///
    /// Fails with [`HeapError::OutOfMemory`] and no mutation when the
    /// walk exhausts the list.
    pub fn allocate(
        &mut self,
        request: usize,
    ) -> Result<Handle, HeapError> {
        if request == 0 {
            return Err(HeapError::InvalidRequest);
        }
        let needed = request + 1;

        let mut lag: Option<BlockStart> = None;
        let mut cursor = self.free_start;
        let (block, block_size) = loop {
            let Some(start) = cursor else {
                trace!("allocate({}): free list exhausted", request);
                return Err(HeapError::OutOfMemory { requested: request });
            };
            let candidate = BlockStart(start);
            let size = candidate.size(&self.memory)?;
            if size >= needed {
                break (candidate, size);
            }
            lag = Some(candidate);
            cursor = candidate.next(&self.memory)?;
        };

        // Carve from the front when the leftover can host a block of its
        // own; a one-cell leftover stays inside the handed-out block.
        let unused = block_size - needed;
        let replacement = if unused > 1 {
            let inherited = block.next(&self.memory)?;
            let fragment = BlockStart(block.0 + needed);
            fragment.set_size(&mut self.memory, unused)?;
            fragment.set_next(&mut self.memory, inherited)?;
            block.set_size(&mut self.memory, needed)?;
            Some(fragment.0)
        } else {
            block.next(&self.memory)?
        };

        match lag {
            None => self.free_start = replacement,
            Some(prev) => prev.set_next(&mut self.memory, replacement)?,
        }

        let handle = block.handle();
        if let Some(live) = &mut self.live {
            live.insert(handle);
        }
        let handed = if unused > 1 { needed } else { block_size };
        trace!(
            "allocate({}) -> {} (block {}, {} cells)",
            request,
            handle,
            block.0,
            handed
        );
        Ok(handle)
    }

    /// Return an allocated block to the free list
    ///
    /// The free list is kept in ascending address order: the block
    /// becomes the new head when it sits below the current head, and is
    /// spliced in front of the first free block above it otherwise. When
    /// every free block sits below it, the block is appended at the tail.
    /// Adjacent free blocks are never merged, and the block keeps the
    /// size field it was allocated with.
    ///
    /// Fails with [`HeapError::InvalidHandle`] on an out-of-range or
    /// (with validation on) non-live handle, and with
    /// [`HeapError::InvalidFree`] when the free list is empty: there is
    /// no node to link the block after, and the head case does not apply.
    /// Either way nothing is mutated.
    pub fn deallocate(
        &mut self,
        handle: Handle,
    ) -> Result<(), HeapError> {
        let raw = handle.raw();
        if raw < 1 || raw >= self.memory.len() {
            return Err(HeapError::InvalidHandle { handle });
        }
        if let Some(live) = &self.live {
            if !live.contains(&handle) {
                return Err(HeapError::InvalidHandle { handle });
            }
        }
        let block = handle.block_start();

        match self.free_start {
            // Below the head: the block becomes the new head.
            Some(head) if block.0 < head => {
                block.set_next(&mut self.memory, Some(head))?;
                self.free_start = Some(block.0);
            }
            _ => {
                // Find the last free block below the one being freed.
                let mut prev: Option<BlockStart> = None;
                let mut cursor = self.free_start;
                while let Some(start) = cursor {
                    if start >= block.0 {
                        break;
                    }
                    let current = BlockStart(start);
                    prev = Some(current);
                    cursor = current.next(&self.memory)?;
                }
                let Some(prev) = prev else {
                    // Empty free list: no predecessor to link from.
                    return Err(HeapError::InvalidFree { handle });
                };
                let successor = prev.next(&self.memory)?;
                block.set_next(&mut self.memory, successor)?;
                prev.set_next(&mut self.memory, Some(block.0))?;
            }
        }

        if let Some(live) = &mut self.live {
            live.remove(&handle);
        }
        trace!("deallocate({}) -> block {}", handle, block.0);
        Ok(())
    }

    /// Buffer length in cells
    pub fn capacity(&self) -> usize {
        self.memory.len()
    }

    /// Block-start index of the free-list head
    pub fn free_start(&self) -> Option<usize> {
        self.free_start
    }

    /// Read-only view of the managed buffer
    pub fn memory(&self) -> &[Cell] {
        &self.memory
    }

    /// Give the buffer back, consuming the manager
    pub fn into_memory(self) -> Vec<Cell> {
        self.memory
    }

    /// Payload cells of an allocated block
    pub fn payload(
        &self,
        handle: Handle,
    ) -> Result<&[Cell], HeapError> {
        let range = self.payload_range(handle)?;
        Ok(&self.memory[range])
    }

    /// Mutable payload cells of an allocated block
    pub fn payload_mut(
        &mut self,
        handle: Handle,
    ) -> Result<&mut [Cell], HeapError> {
        let range = self.payload_range(handle)?;
        Ok(&mut self.memory[range])
    }

    fn payload_range(
        &self,
        handle: Handle,
    ) -> Result<Range<usize>, HeapError> {
        let raw = handle.raw();
        if raw < 1 || raw >= self.memory.len() {
            return Err(HeapError::InvalidHandle { handle });
        }
        if let Some(live) = &self.live {
            if !live.contains(&handle) {
                return Err(HeapError::InvalidHandle { handle });
            }
        }
        let size = handle.block_start().size(&self.memory)?;
        Ok(raw..raw - 1 + size)
    }

    /// Free list in link order
    pub fn free_blocks(&self) -> Result<Vec<FreeBlock>, HeapError> {
        let mut blocks = Vec::new();
        let mut cursor = self.free_start;
        while let Some(start) = cursor {
            // Blocks are two cells minimum, so a healthy list can never
            // outgrow half the buffer.
            if blocks.len() > self.memory.len() / 2 {
                return Err(HeapError::BrokenFreeList { at: start });
            }
            let block = BlockStart(start);
            let size = block.size(&self.memory)?;
            blocks.push(FreeBlock { start, size });
            cursor = block.next(&self.memory)?;
        }
        Ok(blocks)
    }

    /// Total free cells, headers included
    pub fn free_cells(&self) -> Result<usize, HeapError> {
        Ok(self.free_blocks()?.iter().map(|b| b.size).sum())
    }

    /// Size of the largest free block, zero when the list is empty
    pub fn largest_free(&self) -> Result<usize, HeapError> {
        Ok(self
            .free_blocks()?
            .iter()
            .map(|b| b.size)
            .max()
            .unwrap_or(0))
    }

    /// Snapshot of the manager state
    pub fn stats(&self) -> Result<HeapStats, HeapError> {
        let free_blocks = self.free_blocks()?;
        Ok(HeapStats {
            capacity: self.memory.len(),
            free_start: self.free_start,
            free_cells: free_blocks.iter().map(|b| b.size).sum(),
            largest_free: free_blocks.iter().map(|b| b.size).max().unwrap_or(0),
            free_blocks,
            live_handles: self.live.as_ref().map(|l| l.len()),
        })
    }

    /// Validate the free list
    ///
    /// Walks the chain checking that every node is in bounds, sizes stay
    /// inside the buffer, and block addresses strictly ascend without
    /// overlapping. Ascending addresses also rule out cycles, so a
    /// passing walk always terminated at the null link.
    pub fn check(&self) -> Result<(), HeapError> {
        let mut cursor = self.free_start;
        let mut floor = 0usize;
        let mut prev: Option<usize> = None;
        while let Some(start) = cursor {
            if let Some(at) = prev {
                if start < floor {
                    return Err(HeapError::BrokenFreeList { at });
                }
            }
            let block = BlockStart(start);
            let size = block.size(&self.memory)?;
            floor = start + size;
            prev = Some(start);
            cursor = block.next(&self.memory)?;
        }
        Ok(())
    }
}

impl fmt::Display for HeapManager {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "memory = [")?;
        for (i, cell) in self.memory.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", cell)?;
        }
        write!(f, "], freeStart = ")?;
        match self.free_start {
            Some(start) => write!(f, "{}", start),
            None => write!(f, "NULL"),
        }
    }
}
