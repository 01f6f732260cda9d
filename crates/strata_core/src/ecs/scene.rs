//! # Scene
//!
//! The entity table, the component pools and the mask interner, bundled behind
//! one mutation API. Every mutation only marks entities dirty; families learn
//! about it at the next refresh.

use smallvec::SmallVec;

use super::component::{Component, ComponentTypeId};
use super::entity::{ComponentSlot, Entity, EntityChange, EntityId};
use super::mask::MaskStorage;
use super::storage::ComponentStore;
use super::table::EntityTable;
use crate::config::WorldConfig;
use crate::error::{EcsError, EcsResult};
use crate::memory::PoolHandle;

/// Entities and their components.
///
/// Stale ids are tolerated everywhere: lookups return `None`, mutations return
/// `false` or `Ok(false)`.
///
/// # Example
///
/// ```rust,ignore
/// let mut scene = Scene::new(&WorldConfig::default());
/// scene.register_component::<Health>()?;
///
/// let e = scene.create_entity();
/// scene.add_component(e, Health(100))?;
/// assert_eq!(scene.get_component::<Health>(e), Some(&Health(100)));
/// ```
#[derive(Debug)]
pub struct Scene {
    entities: EntityTable,
    components: ComponentStore,
    masks: MaskStorage,
}

impl Scene {
    /// Creates an empty scene.
    #[must_use]
    pub fn new(config: &WorldConfig) -> Self {
        Self {
            entities: EntityTable::new(config.entity_block_size, config.dirty_capacity),
            components: ComponentStore::new(config.component_block_size),
            masks: MaskStorage::new(),
        }
    }

    /// Registers a component type.
    ///
    /// # Errors
    ///
    /// See [`ComponentStore::register`].
    pub fn register_component<T: Component>(&mut self) -> EcsResult<ComponentTypeId> {
        self.components.register::<T>()
    }

    /// The entity table.
    #[inline]
    #[must_use]
    pub fn entities(&self) -> &EntityTable {
        &self.entities
    }

    /// The component pools.
    #[inline]
    #[must_use]
    pub fn components(&self) -> &ComponentStore {
        &self.components
    }

    /// The mask interner.
    #[inline]
    #[must_use]
    pub fn masks(&self) -> &MaskStorage {
        &self.masks
    }

    pub(crate) fn registry_parts(&mut self) -> (&ComponentStore, &mut MaskStorage) {
        (&self.components, &mut self.masks)
    }

    /// Creates an entity with no components.
    pub fn create_entity(&mut self) -> EntityId {
        self.entities.spawn()
    }

    /// Gets a live entity.
    #[inline]
    #[must_use]
    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(id)
    }

    /// Checks if `id` refers to an entity that has not been destroyed.
    #[inline]
    #[must_use]
    pub fn is_alive(&self, id: EntityId) -> bool {
        self.entities.is_alive(id)
    }

    /// Iterates over live entities.
    pub fn iter_entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter()
    }

    /// Attaches a component, replacing a live one of the same type.
    ///
    /// Returns `Ok(false)` for stale ids; the value is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnregisteredComponent`] if `T` is unknown.
    pub fn add_component<T: Component>(&mut self, id: EntityId, value: T) -> EcsResult<bool> {
        self.components.require::<T>()?;
        if !self.entities.is_alive(id) {
            return Ok(false);
        }

        let (type_id, handle) = self.components.insert(value)?;
        match self.entities.get_mut(id) {
            Some(entity) => entity.add_component_slot(ComponentSlot { type_id, handle }),
            None => {
                self.components.destroy(type_id, handle);
                return Ok(false);
            }
        }
        self.entities.mark_dirty(id);
        Ok(true)
    }

    /// Detaches the component of type `T`. It is destroyed at the next refresh.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnregisteredComponent`] if `T` is unknown.
    pub fn remove_component<T: Component>(&mut self, id: EntityId) -> EcsResult<bool> {
        let type_id = self.components.require::<T>()?;
        let removed = self
            .entities
            .get_mut(id)
            .is_some_and(|entity| entity.remove_component(type_id));
        if removed {
            self.entities.mark_dirty(id);
        }
        Ok(removed)
    }

    /// Checks if a live component of type `T` is attached.
    #[must_use]
    pub fn has_component<T: Component>(&self, id: EntityId) -> bool {
        self.component_handle::<T>(id).is_some()
    }

    /// Handle of the live component of type `T`.
    #[must_use]
    pub fn component_handle<T: Component>(&self, id: EntityId) -> Option<PoolHandle> {
        let type_id = self.components.type_id_of::<T>()?;
        self.entities.get(id)?.find(type_id)
    }

    /// Gets the live component of type `T`.
    #[must_use]
    pub fn get_component<T: Component>(&self, id: EntityId) -> Option<&T> {
        let handle = self.component_handle::<T>(id)?;
        self.components.get::<T>(handle)
    }

    /// Gets the live component of type `T` mutably.
    pub fn get_component_mut<T: Component>(&mut self, id: EntityId) -> Option<&mut T> {
        let handle = self.component_handle::<T>(id)?;
        self.components.get_mut::<T>(handle)
    }

    /// Resolves a component handle, e.g. from a family row.
    ///
    /// Components detached but not yet refreshed still resolve.
    #[inline]
    #[must_use]
    pub fn component_at<T: Component>(&self, handle: PoolHandle) -> Option<&T> {
        self.components.get::<T>(handle)
    }

    /// Resolves a component handle mutably.
    #[inline]
    pub fn component_at_mut<T: Component>(&mut self, handle: PoolHandle) -> Option<&mut T> {
        self.components.get_mut::<T>(handle)
    }

    /// Destroys an entity and, recursively, its children.
    ///
    /// The entity is detached from its parent at once. Its slot is reclaimed at
    /// the next refresh, after families have dropped it.
    pub fn destroy_entity(&mut self, id: EntityId) -> bool {
        let Some(parent) = self.entities.get(id).map(Entity::parent) else {
            return false;
        };
        if let Some(parent) = parent.and_then(|p| self.entities.get_mut(p)) {
            parent.remove_child_link(id);
        }

        let mut pending: SmallVec<[EntityId; 16]> = SmallVec::new();
        pending.push(id);
        while let Some(next) = pending.pop() {
            if let Some(entity) = self.entities.get_mut(next) {
                entity.set_parent_link(None);
                pending.extend(entity.take_children());
            }
            self.entities.kill(next);
        }
        true
    }

    /// Moves `child` under `parent`, or to the root with `None`.
    ///
    /// Returns `Ok(false)` if either id is stale.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::HierarchyCycle`] if `parent` is `child` or one of
    /// its descendants.
    pub fn set_parent(&mut self, child: EntityId, parent: Option<EntityId>) -> EcsResult<bool> {
        let Some(old_parent) = self.entities.get(child).map(Entity::parent) else {
            return Ok(false);
        };
        if let Some(parent) = parent {
            if !self.entities.is_alive(parent) {
                return Ok(false);
            }
            if self.is_ancestor_or_self(child, parent) {
                return Err(EcsError::HierarchyCycle {
                    child: child.to_bits(),
                    parent: parent.to_bits(),
                });
            }
        }

        if let Some(old) = old_parent.and_then(|p| self.entities.get_mut(p)) {
            old.remove_child_link(child);
        }
        if let Some(new) = parent.and_then(|p| self.entities.get_mut(p)) {
            new.add_child_link(child);
        }
        if let Some(entity) = self.entities.get_mut(child) {
            entity.set_parent_link(parent);
        }
        Ok(true)
    }

    /// Checks if `ancestor` is `node` or one of its ancestors.
    fn is_ancestor_or_self(&self, ancestor: EntityId, node: EntityId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.entities.get(id).and_then(Entity::parent);
        }
        false
    }

    /// Sets the hot-reload flag and queues the entity for refresh.
    pub fn mark_reloaded(&mut self, id: EntityId) -> bool {
        let Some(entity) = self.entities.get_mut(id) else {
            return false;
        };
        entity.mark_reloaded();
        self.entities.mark_dirty(id);
        true
    }

    /// Consumes the hot-reload flag of an entity.
    pub fn take_reloaded(&mut self, id: EntityId) -> bool {
        self.entities
            .get_mut(id)
            .is_some_and(Entity::take_reloaded)
    }

    pub(crate) fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(id)
    }

    /// Refreshes every dirty entity and reports what changed.
    ///
    /// Destroyed entities keep their slot until
    /// [`finish_refresh`](Self::finish_refresh), so families can still evict
    /// them by id.
    pub(crate) fn begin_refresh(&mut self) -> Vec<EntityChange> {
        let dirty = self.entities.take_dirty();
        let mut changes = Vec::with_capacity(dirty.len());
        for id in &dirty {
            if let Some(entity) = self.entities.get_any_mut(*id) {
                changes.push(entity.refresh(&mut self.components, &mut self.masks));
            }
        }
        self.entities.restore_dirty(dirty);
        changes
    }

    /// Reclaims the slots of entities destroyed in `changes`.
    pub(crate) fn finish_refresh(&mut self, changes: &[EntityChange]) -> usize {
        changes
            .iter()
            .filter(|change| !change.alive)
            .filter(|change| self.entities.reclaim(change.id))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Health(u32);
    impl Component for Health {}

    #[derive(Debug, PartialEq)]
    struct Tag;
    impl Component for Tag {}

    struct Unknown;
    impl Component for Unknown {}

    fn scene() -> Scene {
        let mut scene = Scene::new(&WorldConfig::default());
        scene.register_component::<Health>().unwrap();
        scene.register_component::<Tag>().unwrap();
        scene
    }

    fn refresh(scene: &mut Scene) -> Vec<EntityChange> {
        let changes = scene.begin_refresh();
        scene.finish_refresh(&changes);
        changes
    }

    #[test]
    fn test_add_get_remove() {
        let mut scene = scene();
        let e = scene.create_entity();

        assert_eq!(scene.add_component(e, Health(10)), Ok(true));
        assert_eq!(scene.get_component::<Health>(e), Some(&Health(10)));
        scene.get_component_mut::<Health>(e).unwrap().0 = 5;
        assert_eq!(scene.get_component::<Health>(e), Some(&Health(5)));

        assert_eq!(scene.remove_component::<Health>(e), Ok(true));
        assert!(!scene.has_component::<Health>(e));
        assert_eq!(scene.remove_component::<Health>(e), Ok(false));
    }

    #[test]
    fn test_unregistered_component() {
        let mut scene = scene();
        let e = scene.create_entity();
        assert!(matches!(
            scene.add_component(e, Unknown),
            Err(EcsError::UnregisteredComponent { .. })
        ));
        assert!(scene.remove_component::<Unknown>(e).is_err());
    }

    #[test]
    fn test_stale_id_is_noop() {
        let mut scene = scene();
        let e = scene.create_entity();
        assert!(scene.destroy_entity(e));
        refresh(&mut scene);

        assert_eq!(scene.add_component(e, Tag), Ok(false));
        assert!(!scene.destroy_entity(e));
        assert!(scene.entity(e).is_none());
        assert_eq!(scene.components().live_count::<Tag>(), 0);

        let reused = scene.create_entity();
        assert_eq!(reused.index(), e.index());
        assert!(scene.get_component::<Tag>(e).is_none());
    }

    #[test]
    fn test_refresh_destroys_detached_component() {
        let mut scene = scene();
        let e = scene.create_entity();
        scene.add_component(e, Health(1)).unwrap();
        refresh(&mut scene);

        let handle = scene.component_handle::<Health>(e).unwrap();
        scene.remove_component::<Health>(e).unwrap();
        // Still allocated until the refresh
        assert_eq!(scene.component_at::<Health>(handle), Some(&Health(1)));

        refresh(&mut scene);
        assert!(scene.component_at::<Health>(handle).is_none());
    }

    #[test]
    fn test_refresh_twice_is_idempotent() {
        let mut scene = scene();
        let e = scene.create_entity();
        scene.add_component(e, Health(1)).unwrap();
        assert_eq!(refresh(&mut scene).len(), 1);
        assert!(refresh(&mut scene).is_empty());
    }

    #[test]
    fn test_destroy_cascades_to_children() {
        let mut scene = scene();
        let root = scene.create_entity();
        let child = scene.create_entity();
        let grandchild = scene.create_entity();
        let other = scene.create_entity();
        scene.set_parent(child, Some(root)).unwrap();
        scene.set_parent(grandchild, Some(child)).unwrap();
        scene.add_component(grandchild, Health(3)).unwrap();

        assert!(scene.destroy_entity(root));
        assert!(!scene.is_alive(root));
        assert!(!scene.is_alive(child));
        assert!(!scene.is_alive(grandchild));
        assert!(scene.is_alive(other));

        refresh(&mut scene);
        assert_eq!(scene.entities().slot_count(), 1);
        assert_eq!(scene.components().live_count::<Health>(), 0);
    }

    #[test]
    fn test_destroy_detaches_from_parent() {
        let mut scene = scene();
        let parent = scene.create_entity();
        let child = scene.create_entity();
        scene.set_parent(child, Some(parent)).unwrap();

        scene.destroy_entity(child);
        assert!(scene.entity(parent).unwrap().children().is_empty());
        assert!(scene.is_alive(parent));
    }

    #[test]
    fn test_set_parent_rejects_cycles() {
        let mut scene = scene();
        let a = scene.create_entity();
        let b = scene.create_entity();
        let c = scene.create_entity();
        scene.set_parent(b, Some(a)).unwrap();
        scene.set_parent(c, Some(b)).unwrap();

        assert!(matches!(
            scene.set_parent(a, Some(c)),
            Err(EcsError::HierarchyCycle { .. })
        ));
        assert!(scene.set_parent(a, Some(a)).is_err());

        // Reparent c to the root
        assert_eq!(scene.set_parent(c, None), Ok(true));
        assert!(scene.entity(b).unwrap().children().is_empty());
        assert_eq!(scene.entity(c).unwrap().parent(), None);
    }

    #[test]
    fn test_reloaded_flag() {
        let mut scene = scene();
        let e = scene.create_entity();
        refresh(&mut scene);

        assert!(scene.mark_reloaded(e));
        assert_eq!(scene.entities().dirty_count(), 1);
        assert!(scene.take_reloaded(e));
        assert!(!scene.take_reloaded(e));
    }
}
