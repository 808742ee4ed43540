//! SETL2 Core: arena allocation shared by the compiler and the runtime
//!
//! Every pooled data structure in the workspace — AST nodes (§4.5 of the
//! design spec), suffix-tree nodes/leaves/intleaves (§4.10), and the
//! header/cell nodes of the hashed-tree containers (§3.3) — is owned by a
//! single [`Arena`] rather than by individual `Box`/`Rc` allocations. Arena
//! indices replace owning pointers: children hold a [`Handle`] (an index
//! plus a generation counter) instead of a raw pointer, so stale handles
//! from a freed slot are detected rather than followed.
//!
//! # Modules
//!
//! - `arena`: generation-checked slot arena with a free list
//! - `memory_stats`: process-wide allocation counters for diagnostics

pub mod arena;
pub mod memory_stats;

pub use arena::{Arena, Handle};
