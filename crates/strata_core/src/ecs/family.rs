//! # Families
//!
//! A family is the dense view a system iterates: one row per matching entity,
//! holding the entity id and one component handle per declared type. Rows are
//! kept in step with the entity table at every refresh.
//!
//! ## Layout
//!
//! ```text
//! types:  [ Position | Velocity ]
//! row 0:  e3  -> [ h(3,0) | h(7,1) ]
//! row 1:  e9  -> [ h(1,2) | h(0,0) ]
//! ```
//!
//! Removal is swap-with-last, so row order is unspecified.

use smallvec::SmallVec;

use super::component::ComponentTypeId;
use super::entity::{Entity, EntityChange, EntityId};
use super::mask::{MaskHandle, MaskStorage};
use super::table::EntityTable;
use crate::memory::PoolHandle;

/// One family row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FamilyRow {
    entity: EntityId,
    components: SmallVec<[PoolHandle; 4]>,
}

impl FamilyRow {
    /// The entity this row belongs to.
    #[inline]
    #[must_use]
    pub const fn entity(&self) -> EntityId {
        self.entity
    }

    /// Handle of the component in `column`, or [`PoolHandle::NULL`].
    #[inline]
    #[must_use]
    pub fn handle(&self, column: usize) -> PoolHandle {
        self.components
            .get(column)
            .copied()
            .unwrap_or(PoolHandle::NULL)
    }

    /// All component handles, in column order.
    #[inline]
    #[must_use]
    pub fn handles(&self) -> &[PoolHandle] {
        &self.components
    }
}

/// Dense view of every entity carrying a given set of component types.
#[derive(Debug)]
pub struct Family {
    required: MaskHandle,
    types: SmallVec<[ComponentTypeId; 8]>,
    rows: Vec<FamilyRow>,
    /// Ids to evict at the next removal pass.
    dead: Vec<EntityId>,
}

impl Family {
    /// Creates an empty family.
    ///
    /// # Arguments
    ///
    /// * `types` - Column types, in declaration order
    /// * `required` - Interned mask of `types`
    #[must_use]
    pub fn new(types: SmallVec<[ComponentTypeId; 8]>, required: MaskHandle) -> Self {
        Self {
            required,
            types,
            rows: Vec::new(),
            dead: Vec::new(),
        }
    }

    /// Interned mask every member must contain.
    #[inline]
    #[must_use]
    pub const fn required(&self) -> MaskHandle {
        self.required
    }

    /// Column types.
    #[inline]
    #[must_use]
    pub fn types(&self) -> &[ComponentTypeId] {
        &self.types
    }

    /// Number of rows.
    #[inline]
    #[must_use]
    pub fn count(&self) -> usize {
        self.rows.len()
    }

    /// Checks if the family has no rows.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Row `n`.
    #[inline]
    #[must_use]
    pub fn get_element(&self, n: usize) -> Option<&FamilyRow> {
        self.rows.get(n)
    }

    /// Iterates over the rows.
    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, FamilyRow> {
        self.rows.iter()
    }

    /// Column holding components of `type_id`.
    #[inline]
    #[must_use]
    pub fn column_of(&self, type_id: ComponentTypeId) -> Option<usize> {
        self.types.iter().position(|t| *t == type_id)
    }

    /// Checks if an entity currently has a row. O(n).
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.rows.iter().any(|row| row.entity == id)
    }

    /// Loads one row from a live entity.
    ///
    /// Returns `false`, adding nothing, if a declared type is not live on the
    /// entity.
    pub fn add_entity(&mut self, entity: &Entity) -> bool {
        let mut components = SmallVec::with_capacity(self.types.len());
        for type_id in &self.types {
            match entity.find(*type_id) {
                Some(handle) => components.push(handle),
                None => return false,
            }
        }
        self.rows.push(FamilyRow {
            entity: entity.id(),
            components,
        });
        true
    }

    /// Queues an entity for the next removal pass.
    #[inline]
    pub fn mark_for_removal(&mut self, id: EntityId) {
        self.dead.push(id);
    }

    /// Evicts every queued entity.
    ///
    /// Sorts the queue once, then makes a single pass over the rows,
    /// binary-searching each row's id. Matches are swap-removed; the row moved
    /// into place is checked before advancing.
    ///
    /// Returns the number of rows removed.
    pub fn remove_dead_entities(&mut self) -> usize {
        if self.dead.is_empty() {
            return 0;
        }
        self.dead.sort_unstable();
        self.dead.dedup();

        let before = self.rows.len();
        let mut i = 0;
        while i < self.rows.len() {
            if self.dead.binary_search(&self.rows[i].entity).is_ok() {
                self.rows.swap_remove(i);
            } else {
                i += 1;
            }
        }
        self.dead.clear();
        before - self.rows.len()
    }

    /// Brings the rows in line with one refresh pass.
    ///
    /// Entities that stopped matching, died, or had a column type replaced are
    /// evicted first; then newly matching and replaced entities are loaded.
    pub fn apply_changes(
        &mut self,
        changes: &[EntityChange],
        masks: &MaskStorage,
        entities: &EntityTable,
    ) {
        let mut reload: SmallVec<[EntityId; 16]> = SmallVec::new();

        for change in changes {
            let was = change.was_visible && masks.contains(change.old_mask, self.required);
            let is = change.alive && masks.contains(change.new_mask, self.required);

            match (was, is) {
                (true, false) => self.mark_for_removal(change.id),
                (false, true) => reload.push(change.id),
                (true, true) if masks.intersects(change.changed, self.required) => {
                    self.mark_for_removal(change.id);
                    reload.push(change.id);
                }
                _ => {}
            }
        }

        self.remove_dead_entities();
        for id in reload {
            if let Some(entity) = entities.get(id) {
                self.add_entity(entity);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::component::Component;
    use crate::ecs::mask::RealMask;
    use crate::ecs::storage::ComponentStore;

    struct A;
    impl Component for A {}
    struct B;
    impl Component for B {}

    fn row(index: u32) -> FamilyRow {
        FamilyRow {
            entity: EntityId::new(index, 0),
            components: SmallVec::new(),
        }
    }

    #[test]
    fn test_remove_dead_entities_swap_remove() {
        let mut family = Family::new(SmallVec::new(), MaskHandle::EMPTY);
        family.rows = (0..6).map(row).collect();

        family.mark_for_removal(EntityId::new(4, 0));
        family.mark_for_removal(EntityId::new(0, 0));
        family.mark_for_removal(EntityId::new(5, 0));
        family.mark_for_removal(EntityId::new(0, 0));
        family.mark_for_removal(EntityId::new(42, 0));

        assert_eq!(family.remove_dead_entities(), 3);
        let mut left: Vec<_> = family.iter().map(|r| r.entity().index()).collect();
        left.sort_unstable();
        assert_eq!(left, vec![1, 2, 3]);
        assert_eq!(family.remove_dead_entities(), 0);
    }

    #[test]
    fn test_remove_last_rows() {
        let mut family = Family::new(SmallVec::new(), MaskHandle::EMPTY);
        family.rows = (0..3).map(row).collect();
        family.mark_for_removal(EntityId::new(1, 0));
        family.mark_for_removal(EntityId::new(2, 0));

        assert_eq!(family.remove_dead_entities(), 2);
        assert_eq!(family.get_element(0).map(FamilyRow::entity), Some(EntityId::new(0, 0)));
    }

    #[test]
    fn test_row_handle_out_of_range() {
        assert!(row(0).handle(3).is_null());
    }

    #[test]
    fn test_apply_changes_tracks_membership() {
        let mut store = ComponentStore::new(8);
        let a = store.register::<A>().unwrap();
        let b = store.register::<B>().unwrap();
        let mut masks = MaskStorage::new();
        let mut table = EntityTable::new(8, 8);

        let required = masks.get_handle(&RealMask::from_bits([a.index(), b.index()]));
        let mut family = Family::new(SmallVec::from_slice(&[b, a]), required);

        let e = table.spawn();
        for slot in [store.insert(A).unwrap(), store.insert(B).unwrap()] {
            let entity = table.get_mut(e).unwrap();
            entity.add_component_slot(crate::ecs::entity::ComponentSlot {
                type_id: slot.0,
                handle: slot.1,
            });
        }

        let refresh = |table: &mut EntityTable, store: &mut ComponentStore, masks: &mut MaskStorage| {
            let dirty = table.take_dirty();
            let mut changes = Vec::new();
            for id in &dirty {
                if let Some(entity) = table.get_any_mut(*id) {
                    changes.push(entity.refresh(store, masks));
                }
            }
            table.restore_dirty(dirty);
            changes
        };

        let changes = refresh(&mut table, &mut store, &mut masks);
        family.apply_changes(&changes, &masks, &table);
        assert_eq!(family.count(), 1);
        assert_eq!(family.column_of(a), Some(1));
        let entity = table.get(e).unwrap();
        assert_eq!(family.get_element(0).unwrap().handle(1), entity.find(a).unwrap());

        table.get_mut(e).unwrap().remove_component(b);
        table.mark_dirty(e);
        let changes = refresh(&mut table, &mut store, &mut masks);
        family.apply_changes(&changes, &masks, &table);
        assert!(family.is_empty());
    }
}
