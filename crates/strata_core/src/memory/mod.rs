//! # Memory Management
//!
//! Block-allocated pools backing entities and per-type component storage.
//!
//! ## Design Philosophy
//!
//! - Storage grows by whole blocks, never by reallocation
//! - Slots are recycled through an intrusive free list
//! - Every handle carries the revision of its slot, so reuse is always detected

mod pool;

pub use pool::{PoolHandle, SlotPool};
