//! # Strata Core
//!
//! Entity/component storage and scheduling core of a game runtime:
//! - Generational slot pools with safely invalidated handles
//! - Interned component masks for constant-time family matching
//! - Dense per-system families kept in step with the entity table
//! - Per-entity message inboxes with single-visibility delivery
//!
//! ## Architecture Rules
//!
//! 1. **Single-threaded ticks** - Systems run in registration order, one at a time
//! 2. **Deferred destruction** - Removals become visible at the next refresh
//! 3. **Handles, not pointers** - Every cross-reference is a generational handle
//!
//! ## Example
//!
//! ```rust
//! use strata_core::{MovementSystem, Position, Timeline, Velocity, World, WorldConfig};
//!
//! let mut world = World::new(WorldConfig::default())?;
//! world.register_component::<Position>()?;
//! world.register_component::<Velocity>()?;
//! world.add_system(Timeline::Fixed, MovementSystem)?;
//!
//! let ship = world.create_entity();
//! world.add_component(ship, Position::new(0.0, 0.0, 0.0))?;
//! world.add_component(ship, Velocity::new(0.0, 2.0, 0.0))?;
//!
//! world.on_fixed_update(1.0);
//! assert_eq!(world.get_component::<Position>(ship).map(|p| p.y), Some(2.0));
//! # Ok::<(), strata_core::EcsError>(())
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod builtin;
pub mod config;
pub mod diagnostics;
pub mod ecs;
pub mod error;
pub mod memory;
pub mod resource;
mod world;

pub use builtin::{MovementSystem, Position, Velocity};
pub use config::WorldConfig;
pub use diagnostics::{DiagnosticsHandle, DiagnosticsSnapshot, SystemStats};
pub use ecs::{
    Component, ComponentSet, ComponentTypeId, Entity, EntityId, Family, FamilyRow, MaskHandle,
    MaskStorage, Message, MessageBatch, MessageType, RealMask, Scene, System, SystemBuilder,
    SystemContext, SystemId, Timeline,
};
pub use error::{EcsError, EcsResult};
pub use memory::{PoolHandle, SlotPool};
pub use resource::{ResourceQueue, ResourceRequest};
pub use world::World;
