//! cellheap
//!
//! An explicit free-list heap manager over a single flat array of
//! integer-sized cells. Blocks carry their own metadata: every block
//! starts with a header cell holding its total size, and free blocks
//! thread a singly-linked list through the cell after the header.
//!
//! ```text
//!   15-cell heap after one allocation of 2 cells:
//!
//!   ┌────┬────┬────┬────┬────┬─────────────────────────┐
//!   │  3 │ ?? │ ?? │ 12 │ -1 │           ...           │
//!   └────┴────┴────┴────┴────┴─────────────────────────┘
//!     0    1    2    3    4
//!          ▲         ▲
//!          │         └ free block: 12 cells, null link, freeStart = 3
//!          └ handle = 1, payload one past the header
//! ```
//!
//! Allocation is first-fit with front carving; deallocation reinserts in
//! address order. Free blocks are never coalesced.
//!
//! # Example
//!
//! ```rust
//! use cellheap::HeapManager;
//!
//! fn main() -> cellheap::Result<()> {
//!     let mut heap = HeapManager::with_capacity(15)?;
//!     let a = heap.allocate(2)?;
//!     let b = heap.allocate(2)?;
//!     heap.deallocate(a)?;
//!     heap.deallocate(b)?;
//!     assert_eq!(heap.free_cells()?, 15);
//!     Ok(())
//! }
//! ```

#![warn(rust_2018_idioms)]

// Public modules
pub mod heap;
pub mod trace;

// Utility modules
pub mod util;

// Re-exports
pub use anyhow::{Context, Result};
pub use thiserror::Error;

pub use heap::{Cell, FreeBlock, Handle, HeapConfig, HeapError, HeapManager, HeapStats, NULL};
pub use trace::{TraceError, TraceRunner};

use tracing::debug;

use std::fs;
use std::path::Path;

use crate::util::config::{load_user_config, UserConfig};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = "cellheap";

/// Run a trace script with the user's configuration
///
/// # Example
///
/// ```no_run
/// use cellheap::{run, Result};
///
/// fn main() -> Result<()> {
///     let script = r#"
///         init 15
///         alloc a 2
///         free a
///     "#;
///     run(script)?;
///     Ok(())
/// }
/// ```
pub fn run(source: &str) -> Result<()> {
    let config = load_user_config().unwrap_or_default();
    run_with_config(source, &config)
}

/// Run a trace script with explicit configuration
pub fn run_with_config(
    source: &str,
    config: &UserConfig,
) -> Result<()> {
    debug!("running trace script ({} bytes)", source.len());
    trace::run_with_config(source, config)?;
    Ok(())
}

/// Run a trace script from a file
pub fn run_file(path: &Path) -> Result<()> {
    let source = fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;
    debug!("read trace script: {}", path.display());
    run(&source)
}

/// Replay the built-in demonstration sequence
pub fn demo() -> Result<()> {
    trace::demo()?;
    Ok(())
}
