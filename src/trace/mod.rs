//! Trace-script driver
//!
//! A line-oriented script format for exercising the heap manager and
//! printing its state after every step:
//!
//! ```text
//! # three blocks, then give them back
//! init 15
//! alloc a 2
//! alloc b 2
//! alloc c 2
//! free a
//! free b
//! free c
//! stats
//! ```
//!
//! `alloc` binds a name to the returned handle and `free` releases by
//! name, so scripts never spell out raw indices. `dump` prints the
//! buffer and free-list head; `stats` emits a JSON snapshot.

use std::collections::HashMap;

use thiserror::Error;
use tracing::debug;

use crate::heap::{Handle, HeapConfig, HeapError, HeapManager};
use crate::util::config::UserConfig;

/// The built-in demonstration sequence: a 15-cell heap, three two-cell
/// allocations, then frees in allocation order.
pub const DEMO_SCRIPT: &str = "\
init 15
alloc a 2
alloc b 2
alloc c 2
free a
free b
free c
";

/// Trace-script errors
///
/// Every variant carries the 1-based script line it was raised on.
#[derive(Debug, Error)]
pub enum TraceError {
    /// Malformed command line
    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },

    /// `free` of a name no `alloc` has bound
    #[error("line {line}: unknown name '{name}'")]
    UnknownName { line: usize, name: String },

    /// `alloc` re-using a name that is still live
    #[error("line {line}: name '{name}' is already bound")]
    DuplicateName { line: usize, name: String },

    /// Heap operation failed
    #[error("line {line}: {source}")]
    Heap {
        line: usize,
        #[source]
        source: HeapError,
    },

    /// Stats snapshot could not be serialized
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// One parsed script command
#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Init { capacity: usize },
    Alloc { name: String, size: usize },
    Free { name: String },
    Dump,
    Stats,
}

/// Script interpreter over one heap manager
///
/// Executing a script yields the lines the driver would print, so the
/// CLI streams them to stdout and tests assert on them directly.
pub struct TraceRunner {
    heap: HeapManager,
    bindings: HashMap<String, Handle>,
    heap_config: HeapConfig,
}

impl TraceRunner {
    /// Fresh runner with the configured default heap
    pub fn new(config: &UserConfig) -> Result<Self, TraceError> {
        let heap_config = HeapConfig {
            validate_handles: config.heap.validate_handles,
        };
        let heap = HeapManager::with_config(vec![0; config.heap.capacity], heap_config.clone())
            .map_err(|source| TraceError::Heap { line: 0, source })?;
        Ok(Self {
            heap,
            bindings: HashMap::new(),
            heap_config,
        })
    }

    /// Fresh runner with built-in defaults
    pub fn with_defaults() -> Result<Self, TraceError> {
        Self::new(&UserConfig::default())
    }

    /// The heap being driven
    pub fn heap(&self) -> &HeapManager {
        &self.heap
    }

    /// Execute a script, returning the driver output line by line
    ///
    /// Execution stops at the first failing command; earlier commands
    /// keep their effect on the heap.
    pub fn execute(
        &mut self,
        source: &str,
    ) -> Result<Vec<String>, TraceError> {
        let mut output = Vec::new();
        for (number, raw) in source.lines().enumerate() {
            let line = number + 1;
            let Some(command) = parse_line(line, raw)? else {
                continue;
            };
            debug!("line {}: {:?}", line, command);
            match command {
                Command::Init { capacity } => {
                    self.heap =
                        HeapManager::with_config(vec![0; capacity], self.heap_config.clone())
                            .map_err(|source| TraceError::Heap { line, source })?;
                    self.bindings.clear();
                    output.push(format!("init: {}", self.heap));
                }
                Command::Alloc { name, size } => {
                    if self.bindings.contains_key(&name) {
                        return Err(TraceError::DuplicateName { line, name });
                    }
                    let handle = self
                        .heap
                        .allocate(size)
                        .map_err(|source| TraceError::Heap { line, source })?;
                    output.push(format!("{} = {}, {}", name, handle.raw(), self.heap));
                    self.bindings.insert(name, handle);
                }
                Command::Free { name } => {
                    let handle = *self
                        .bindings
                        .get(&name)
                        .ok_or_else(|| TraceError::UnknownName {
                            line,
                            name: name.clone(),
                        })?;
                    self.heap
                        .deallocate(handle)
                        .map_err(|source| TraceError::Heap { line, source })?;
                    self.bindings.remove(&name);
                    output.push(format!("{} freed, {}", name, self.heap));
                }
                Command::Dump => {
                    output.push(format!("{}", self.heap));
                }
                Command::Stats => {
                    let stats = self
                        .heap
                        .stats()
                        .map_err(|source| TraceError::Heap { line, source })?;
                    output.push(serde_json::to_string_pretty(&stats)?);
                }
            }
        }
        Ok(output)
    }
}

/// Run a trace script with explicit configuration, printing the output
pub fn run_with_config(
    source: &str,
    config: &UserConfig,
) -> Result<(), TraceError> {
    let mut runner = TraceRunner::new(config)?;
    for line in runner.execute(source)? {
        println!("{}", line);
    }
    Ok(())
}

/// Run a trace script with default configuration
pub fn run(source: &str) -> Result<(), TraceError> {
    run_with_config(source, &UserConfig::default())
}

/// Replay the built-in demonstration sequence
pub fn demo() -> Result<(), TraceError> {
    run(DEMO_SCRIPT)
}

fn parse_line(
    line: usize,
    raw: &str,
) -> Result<Option<Command>, TraceError> {
    let text = raw.split('#').next().unwrap_or("").trim();
    if text.is_empty() {
        return Ok(None);
    }
    let mut parts = text.split_whitespace();
    let Some(word) = parts.next() else {
        return Ok(None);
    };
    let command = match word {
        "init" => Command::Init {
            capacity: parse_number(line, parts.next(), "init <capacity>")?,
        },
        "alloc" => {
            let name = parse_name(line, parts.next(), "alloc <name> <size>")?;
            let size = parse_number(line, parts.next(), "alloc <name> <size>")?;
            Command::Alloc { name, size }
        }
        "free" => Command::Free {
            name: parse_name(line, parts.next(), "free <name>")?,
        },
        "dump" => Command::Dump,
        "stats" => Command::Stats,
        other => {
            return Err(TraceError::Parse {
                line,
                message: format!("unknown command '{}'", other),
            })
        }
    };
    if let Some(extra) = parts.next() {
        return Err(TraceError::Parse {
            line,
            message: format!("unexpected argument '{}'", extra),
        });
    }
    Ok(Some(command))
}

fn parse_name(
    line: usize,
    token: Option<&str>,
    usage: &str,
) -> Result<String, TraceError> {
    match token {
        Some(name) => Ok(name.to_string()),
        None => Err(TraceError::Parse {
            line,
            message: format!("usage: {}", usage),
        }),
    }
}

fn parse_number(
    line: usize,
    token: Option<&str>,
    usage: &str,
) -> Result<usize, TraceError> {
    let Some(token) = token else {
        return Err(TraceError::Parse {
            line,
            message: format!("usage: {}", usage),
        });
    };
    token.parse().map_err(|_| TraceError::Parse {
        line,
        message: format!("'{}' is not a number (usage: {})", token, usage),
    })
}
