//! # Entity Management
//!
//! Entities are slots in the entity pool. An [`EntityId`] consists of:
//! - An index into the entity pool
//! - A generation counter for safe reuse
//!
//! The [`Entity`] record keeps its component list partitioned in place: live
//! entries form a prefix, entries pending destruction sit behind it until the
//! next refresh hands them to the deleter table.

use smallvec::SmallVec;

use super::component::ComponentTypeId;
use super::mask::{MaskHandle, MaskStorage, RealMask};
use super::message::Message;
use super::storage::ComponentStore;
use crate::memory::PoolHandle;

/// Unique identifier for an entity.
///
/// Wraps the entity's pool handle:
/// - Lower 32 bits: Index into the entity pool
/// - Upper 32 bits: Generation counter for detecting stale references
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct EntityId(PoolHandle);

impl EntityId {
    /// Null/invalid entity ID.
    pub const NULL: Self = Self(PoolHandle::NULL);

    /// Creates a new entity ID from index and generation.
    ///
    /// # Arguments
    ///
    /// * `index` - The index into the entity pool (0 to 2^32-1)
    /// * `generation` - The generation counter (0 to 2^32-1)
    #[inline]
    #[must_use]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self(PoolHandle::new(index, generation))
    }

    #[inline]
    pub(crate) const fn from_handle(handle: PoolHandle) -> Self {
        Self(handle)
    }

    /// Returns the underlying pool handle.
    #[inline]
    #[must_use]
    pub const fn handle(self) -> PoolHandle {
        self.0
    }

    /// Returns the index portion of the entity ID.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0.index()
    }

    /// Returns the generation portion of the entity ID.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.0.revision()
    }

    /// Returns the packed representation.
    #[inline]
    #[must_use]
    pub const fn to_bits(self) -> u64 {
        self.0.to_bits()
    }

    /// Checks if this entity ID is null/invalid.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0.is_null()
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::NULL
    }
}

/// One attached component: its type and its handle in the type's pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ComponentSlot {
    /// Registered type of the component.
    pub type_id: ComponentTypeId,
    /// Handle in the pool of that type.
    pub handle: PoolHandle,
}

/// What a refresh changed on one entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EntityChange {
    /// The refreshed entity.
    pub id: EntityId,
    /// Mask before the refresh.
    pub old_mask: MaskHandle,
    /// Mask after the refresh.
    pub new_mask: MaskHandle,
    /// Types added, removed or replaced since the previous refresh.
    pub changed: MaskHandle,
    /// Whether families had already seen this entity.
    pub was_visible: bool,
    /// Whether the entity is still alive.
    pub alive: bool,
}

/// Entity record stored in the entity table.
#[derive(Debug)]
pub struct Entity {
    id: EntityId,
    mask: MaskHandle,
    components: SmallVec<[ComponentSlot; 8]>,
    live_count: usize,
    parent: Option<EntityId>,
    children: SmallVec<[EntityId; 4]>,
    pub(crate) inbox: Vec<Message>,
    changed: RealMask,
    alive: bool,
    dirty: bool,
    reloaded: bool,
    visible: bool,
}

impl Entity {
    /// Creates a live entity with no components.
    #[must_use]
    pub(crate) fn new(id: EntityId) -> Self {
        Self {
            id,
            mask: MaskHandle::EMPTY,
            components: SmallVec::new(),
            live_count: 0,
            parent: None,
            children: SmallVec::new(),
            inbox: Vec::new(),
            changed: RealMask::EMPTY,
            alive: true,
            dirty: false,
            reloaded: false,
            visible: false,
        }
    }

    /// The unique identifier for this entity.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> EntityId {
        self.id
    }

    /// Interned mask of the live component set, as of the last refresh.
    #[inline]
    #[must_use]
    pub const fn mask(&self) -> MaskHandle {
        self.mask
    }

    /// Whether the entity has not been destroyed.
    #[inline]
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        self.alive
    }

    /// Whether the entity waits for the next refresh.
    #[inline]
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Whether families have absorbed this entity at least once.
    #[inline]
    #[must_use]
    pub const fn is_visible(&self) -> bool {
        self.visible
    }

    /// Parent in the hierarchy.
    #[inline]
    #[must_use]
    pub const fn parent(&self) -> Option<EntityId> {
        self.parent
    }

    /// Children in the hierarchy.
    #[inline]
    #[must_use]
    pub fn children(&self) -> &[EntityId] {
        &self.children
    }

    /// Messages currently parked on this entity.
    #[inline]
    #[must_use]
    pub fn inbox(&self) -> &[Message] {
        &self.inbox
    }

    /// Live components.
    #[inline]
    #[must_use]
    pub fn live_components(&self) -> &[ComponentSlot] {
        &self.components[..self.live_count]
    }

    /// Components removed since the last refresh, still allocated.
    #[inline]
    #[must_use]
    pub fn pending_components(&self) -> &[ComponentSlot] {
        &self.components[self.live_count..]
    }

    /// Handle of the live component of a type.
    #[must_use]
    pub fn find(&self, type_id: ComponentTypeId) -> Option<PoolHandle> {
        self.live_components()
            .iter()
            .find(|slot| slot.type_id == type_id)
            .map(|slot| slot.handle)
    }

    /// Consumes the hot-reload flag.
    pub fn take_reloaded(&mut self) -> bool {
        std::mem::take(&mut self.reloaded)
    }

    /// Sets the dirty flag.
    ///
    /// Returns `true` only on the clean-to-dirty transition, so the owner
    /// enqueues the entity once.
    pub(crate) fn mark_dirty(&mut self) -> bool {
        !std::mem::replace(&mut self.dirty, true)
    }

    pub(crate) fn mark_reloaded(&mut self) {
        self.reloaded = true;
    }

    /// Attaches a component.
    ///
    /// A live component of the same type is tombstoned first. The new entry is
    /// appended and, if dead entries exist, swapped into the first dead slot.
    pub(crate) fn add_component_slot(&mut self, slot: ComponentSlot) {
        if let Some(index) = self
            .live_components()
            .iter()
            .position(|live| live.type_id == slot.type_id)
        {
            self.remove_component_at(index);
        }

        self.components.push(slot);
        let last = self.components.len() - 1;
        if self.live_count < last {
            self.components.swap(self.live_count, last);
        }
        self.live_count += 1;
        self.changed.set(slot.type_id.index());
    }

    /// Tombstones the live component at `index`.
    ///
    /// Swaps it to the live/dead boundary; the order of live entries is not
    /// preserved.
    pub(crate) fn remove_component_at(&mut self, index: usize) -> Option<ComponentSlot> {
        if index >= self.live_count {
            return None;
        }
        let boundary = self.live_count - 1;
        self.components.swap(index, boundary);
        self.live_count = boundary;

        let slot = self.components[boundary];
        self.changed.set(slot.type_id.index());
        Some(slot)
    }

    /// Tombstones the live component of a type.
    pub(crate) fn remove_component(&mut self, type_id: ComponentTypeId) -> bool {
        self.live_components()
            .iter()
            .position(|slot| slot.type_id == type_id)
            .and_then(|index| self.remove_component_at(index))
            .is_some()
    }

    /// Marks the entity destroyed and tombstones every component.
    pub(crate) fn kill(&mut self) {
        for slot in &self.components[..self.live_count] {
            self.changed.set(slot.type_id.index());
        }
        self.live_count = 0;
        self.alive = false;
        self.inbox.clear();
    }

    pub(crate) fn set_parent_link(&mut self, parent: Option<EntityId>) {
        self.parent = parent;
    }

    pub(crate) fn add_child_link(&mut self, child: EntityId) {
        if !self.children.contains(&child) {
            self.children.push(child);
        }
    }

    pub(crate) fn remove_child_link(&mut self, child: EntityId) {
        self.children.retain(|id| *id != child);
    }

    pub(crate) fn take_children(&mut self) -> SmallVec<[EntityId; 4]> {
        std::mem::take(&mut self.children)
    }

    /// Destroys pending components, recomputes and re-interns the mask.
    ///
    /// Idempotent: a second call without intervening mutation changes nothing.
    pub(crate) fn refresh(
        &mut self,
        store: &mut ComponentStore,
        masks: &mut MaskStorage,
    ) -> EntityChange {
        let old_mask = self.mask;
        let was_visible = self.visible;

        for slot in self.components.drain(self.live_count..) {
            store.destroy(slot.type_id, slot.handle);
        }

        let live = RealMask::from_bits(self.live_components().iter().map(|s| s.type_id.index()));
        self.mask = masks.get_handle(&live);
        let changed = masks.get_handle(&std::mem::take(&mut self.changed));

        self.dirty = false;
        self.visible = self.alive;

        EntityChange {
            id: self.id,
            old_mask,
            new_mask: self.mask,
            changed,
            was_visible,
            alive: self.alive,
        }
    }
}
