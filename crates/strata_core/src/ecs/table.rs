//! # Entity Table
//!
//! Pool of [`Entity`] records plus the list of entities waiting for the next
//! refresh.

use super::entity::{Entity, EntityId};
use crate::memory::SlotPool;

/// Owner of every entity record.
///
/// # Example
///
/// ```rust,ignore
/// let mut table = EntityTable::new(1024, 64);
///
/// let entity = table.spawn();
/// assert!(table.get(entity).is_some());
/// ```
#[derive(Debug)]
pub struct EntityTable {
    entities: SlotPool<Entity>,
    /// Entities queued for the next refresh, each at most once.
    dirty: Vec<EntityId>,
    /// Number of entities not yet destroyed.
    alive_count: usize,
}

impl EntityTable {
    /// Creates an empty table.
    ///
    /// # Arguments
    ///
    /// * `block_size` - Slots per block in the entity pool
    /// * `dirty_capacity` - Initial reservation of the dirty list
    #[must_use]
    pub fn new(block_size: usize, dirty_capacity: usize) -> Self {
        Self {
            entities: SlotPool::new(block_size),
            dirty: Vec::with_capacity(dirty_capacity),
            alive_count: 0,
        }
    }

    /// Returns the number of entities not yet destroyed.
    #[inline]
    #[must_use]
    pub const fn alive_count(&self) -> usize {
        self.alive_count
    }

    /// Returns the number of occupied slots, tombstones included.
    #[inline]
    #[must_use]
    pub const fn slot_count(&self) -> usize {
        self.entities.len()
    }

    /// Returns the number of entities waiting for a refresh.
    #[inline]
    #[must_use]
    pub fn dirty_count(&self) -> usize {
        self.dirty.len()
    }

    /// Spawns a new entity and queues it for the next refresh.
    pub fn spawn(&mut self) -> EntityId {
        let handle = self
            .entities
            .insert_with(|handle| Entity::new(EntityId::from_handle(handle)));
        let id = EntityId::from_handle(handle);
        self.alive_count += 1;
        self.mark_dirty(id);
        id
    }

    /// Gets a live entity.
    #[inline]
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities
            .get(id.handle())
            .filter(|entity| entity.is_alive())
    }

    /// Gets a live entity mutably.
    #[inline]
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities
            .get_mut(id.handle())
            .filter(|entity| entity.is_alive())
    }

    /// Gets an entity record, destroyed-but-not-reclaimed ones included.
    #[inline]
    pub(crate) fn get_any_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(id.handle())
    }

    /// Checks if `id` refers to an entity that has not been destroyed.
    #[inline]
    #[must_use]
    pub fn is_alive(&self, id: EntityId) -> bool {
        self.get(id).is_some()
    }

    /// Queues an entity for the next refresh. No-op if already queued.
    pub fn mark_dirty(&mut self, id: EntityId) -> bool {
        let newly = self
            .entities
            .get_mut(id.handle())
            .is_some_and(Entity::mark_dirty);
        if newly {
            self.dirty.push(id);
        }
        newly
    }

    /// Marks an entity destroyed. The slot stays occupied until
    /// [`reclaim`](Self::reclaim).
    pub(crate) fn kill(&mut self, id: EntityId) -> bool {
        let Some(entity) = self.get_mut(id) else {
            return false;
        };
        entity.kill();
        self.alive_count -= 1;
        self.mark_dirty(id);
        true
    }

    /// Frees the slot of a destroyed entity.
    pub(crate) fn reclaim(&mut self, id: EntityId) -> bool {
        if self.get(id).is_some() {
            return false;
        }
        self.entities.free(id.handle()).is_some()
    }

    /// Hands out the dirty list. Give it back with
    /// [`restore_dirty`](Self::restore_dirty) to keep its allocation.
    pub(crate) fn take_dirty(&mut self) -> Vec<EntityId> {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn restore_dirty(&mut self, mut dirty: Vec<EntityId>) {
        dirty.clear();
        dirty.append(&mut self.dirty);
        self.dirty = dirty;
    }

    /// Iterates over live entities, in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities
            .iter()
            .map(|(_, entity)| entity)
            .filter(|entity| entity.is_alive())
    }
}
