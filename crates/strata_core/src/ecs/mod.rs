//! # Entity Component System
//!
//! Entities, components, families and systems.
//!
//! ## Design Philosophy
//!
//! - Components live in per-type generational pools, never behind a shared base type
//! - Component sets are interned masks, so matching is an integer compare
//! - Families are dense views, updated incrementally at each refresh
//! - Stale handles resolve to "not found", never to another entity's data

mod component;
mod context;
mod entity;
mod family;
mod mask;
mod message;
mod scene;
mod storage;
mod system;
mod table;

pub use component::{Component, ComponentSet, ComponentTypeId, DeleterEntry, DeleterTable, DestroyFn};
pub use context::SystemContext;
pub use entity::{ComponentSlot, Entity, EntityChange, EntityId};
pub use family::{Family, FamilyRow};
pub use mask::{MaskHandle, MaskStorage, RealMask, MASK_WORDS, MAX_COMPONENT_TYPES};
pub use message::{Message, MessageBatch, MessageType};
pub use scene::Scene;
pub use storage::ComponentStore;
pub use system::{System, SystemBuilder, SystemId, SystemTimer, Timeline};
pub(crate) use system::SystemRunner;
pub use table::EntityTable;
