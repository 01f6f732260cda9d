//! # Component Storage
//!
//! One [`SlotPool`] per registered component type, held behind `dyn Any` so the
//! store itself stays untyped.
//!
//! The storage uses a per-type pool strategy:
//! - Registering a type claims the next [`ComponentTypeId`] and mask bit
//! - Typed access downcasts the pool of that type
//! - Untyped destruction goes through the [`DeleterTable`]

use std::any::{Any, TypeId};

use ahash::AHashMap;

use super::component::{Component, ComponentTypeId, DeleterEntry, DeleterTable};
use super::mask::MAX_COMPONENT_TYPES;
use crate::error::{EcsError, EcsResult};
use crate::memory::{PoolHandle, SlotPool};

/// Type-erased pools for every registered component type.
///
/// # Example
///
/// ```rust,ignore
/// let mut store = ComponentStore::new(1024);
/// let id = store.register::<Health>()?;
/// let handle = store.insert(Health(100))?;
/// assert!(store.destroy(id, handle));
/// ```
pub struct ComponentStore {
    ids: AHashMap<TypeId, ComponentTypeId>,
    pools: Vec<Box<dyn Any + Send>>,
    deleters: DeleterTable,
    block_size: usize,
}

impl ComponentStore {
    /// Creates an empty store.
    ///
    /// # Arguments
    ///
    /// * `block_size` - Slots per block in every component pool
    #[must_use]
    pub fn new(block_size: usize) -> Self {
        Self {
            ids: AHashMap::new(),
            pools: Vec::new(),
            deleters: DeleterTable::default(),
            block_size,
        }
    }

    /// Registers `T` and returns its type id.
    ///
    /// # Errors
    ///
    /// - [`EcsError::ComponentAlreadyRegistered`] if `T` is already known
    /// - [`EcsError::TooManyComponentTypes`] if every mask bit is taken
    pub fn register<T: Component>(&mut self) -> EcsResult<ComponentTypeId> {
        let key = TypeId::of::<T>();
        if self.ids.contains_key(&key) {
            return Err(EcsError::ComponentAlreadyRegistered {
                type_name: T::type_name(),
            });
        }
        if self.pools.len() >= MAX_COMPONENT_TYPES {
            return Err(EcsError::TooManyComponentTypes {
                max: MAX_COMPONENT_TYPES,
            });
        }

        let index = self.deleters.push(DeleterEntry::of::<T>());
        let id = ComponentTypeId::new(u16::try_from(index).map_err(|_| {
            EcsError::TooManyComponentTypes {
                max: MAX_COMPONENT_TYPES,
            }
        })?);
        self.pools.push(Box::new(SlotPool::<T>::new(self.block_size)));
        self.ids.insert(key, id);

        tracing::debug!(
            "Registered component {} as type {} ({} bytes)",
            T::type_name(),
            id.index(),
            std::mem::size_of::<T>()
        );
        Ok(id)
    }

    /// Returns the id of `T`, if registered.
    #[inline]
    #[must_use]
    pub fn type_id_of<T: Component>(&self) -> Option<ComponentTypeId> {
        self.id_for(TypeId::of::<T>())
    }

    /// Returns the id of a registered Rust type.
    #[inline]
    #[must_use]
    pub fn id_for(&self, key: TypeId) -> Option<ComponentTypeId> {
        self.ids.get(&key).copied()
    }

    /// Like [`type_id_of`](Self::type_id_of) but reports unregistered types.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnregisteredComponent`] if `T` is unknown.
    pub fn require<T: Component>(&self) -> EcsResult<ComponentTypeId> {
        self.type_id_of::<T>()
            .ok_or(EcsError::UnregisteredComponent {
                type_name: T::type_name(),
            })
    }

    /// Number of registered types.
    #[inline]
    #[must_use]
    pub fn type_count(&self) -> usize {
        self.pools.len()
    }

    /// The deleter table, indexed by type id.
    #[inline]
    #[must_use]
    pub fn deleters(&self) -> &DeleterTable {
        &self.deleters
    }

    /// Stores a component and returns its handle.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnregisteredComponent`] if `T` is unknown.
    pub fn insert<T: Component>(&mut self, value: T) -> EcsResult<(ComponentTypeId, PoolHandle)> {
        let id = self.require::<T>()?;
        let pool = self
            .pool_mut::<T>(id)
            .ok_or(EcsError::UnregisteredComponent {
                type_name: T::type_name(),
            })?;
        Ok((id, pool.insert(value)))
    }

    /// Gets a live component of type `T`.
    #[inline]
    #[must_use]
    pub fn get<T: Component>(&self, handle: PoolHandle) -> Option<&T> {
        let id = self.type_id_of::<T>()?;
        self.pools
            .get(id.index())?
            .downcast_ref::<SlotPool<T>>()?
            .get(handle)
    }

    /// Gets a live component of type `T` mutably.
    #[inline]
    pub fn get_mut<T: Component>(&mut self, handle: PoolHandle) -> Option<&mut T> {
        let id = self.type_id_of::<T>()?;
        self.pool_mut::<T>(id)?.get_mut(handle)
    }

    /// Destroys a component through the deleter table.
    ///
    /// Returns `false` for stale handles or unknown types.
    pub fn destroy(&mut self, id: ComponentTypeId, handle: PoolHandle) -> bool {
        let Some(entry) = self.deleters.get(id) else {
            return false;
        };
        let destroy = entry.destroy;
        match self.pools.get_mut(id.index()) {
            Some(pool) => destroy(&mut **pool, handle),
            None => false,
        }
    }

    /// Number of live components of type `T`.
    #[must_use]
    pub fn live_count<T: Component>(&self) -> usize {
        self.type_id_of::<T>()
            .and_then(|id| self.pools.get(id.index()))
            .and_then(|pool| pool.downcast_ref::<SlotPool<T>>())
            .map_or(0, SlotPool::<T>::len)
    }

    fn pool_mut<T: Component>(&mut self, id: ComponentTypeId) -> Option<&mut SlotPool<T>> {
        self.pools
            .get_mut(id.index())?
            .downcast_mut::<SlotPool<T>>()
    }
}

impl std::fmt::Debug for ComponentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentStore")
            .field("deleters", &self.deleters)
            .field("block_size", &self.block_size)
            .finish_non_exhaustive()
    }
}
