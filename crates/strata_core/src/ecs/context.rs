//! # System Context
//!
//! Everything a system may touch while it runs: the scene, its own families,
//! the message channel and the resource queue.

use std::any::Any;

use super::component::Component;
use super::entity::EntityId;
use super::family::Family;
use super::message::Message;
use super::scene::Scene;
use super::system::SystemId;
use crate::resource::ResourceQueue;

/// Borrowed view of the world handed to a running system.
pub struct SystemContext<'a> {
    scene: &'a mut Scene,
    families: &'a [Family],
    system_id: SystemId,
    messaged: &'a mut Vec<EntityId>,
    resources: &'a ResourceQueue,
    painter: Option<&'a mut (dyn Any + 'static)>,
    dt: f32,
}

impl<'a> SystemContext<'a> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        scene: &'a mut Scene,
        families: &'a [Family],
        system_id: SystemId,
        messaged: &'a mut Vec<EntityId>,
        resources: &'a ResourceQueue,
        painter: Option<&'a mut (dyn Any + 'static)>,
        dt: f32,
    ) -> Self {
        Self {
            scene,
            families,
            system_id,
            messaged,
            resources,
            painter,
            dt,
        }
    }

    /// Id of the running system.
    #[inline]
    #[must_use]
    pub const fn system_id(&self) -> SystemId {
        self.system_id
    }

    /// Time step of the current tick.
    #[inline]
    #[must_use]
    pub const fn dt(&self) -> f32 {
        self.dt
    }

    /// Family `index` of the running system.
    ///
    /// The reference outlives borrows of the context, so rows can be walked
    /// while components are mutated.
    #[inline]
    #[must_use]
    pub fn family(&self, index: usize) -> Option<&'a Family> {
        let families: &'a [Family] = self.families;
        families.get(index)
    }

    /// The first declared family.
    #[inline]
    #[must_use]
    pub fn primary_family(&self) -> Option<&'a Family> {
        self.family(0)
    }

    /// The scene.
    #[inline]
    #[must_use]
    pub fn scene(&self) -> &Scene {
        &*self.scene
    }

    /// The scene, mutably. Structural changes show up in families after the
    /// next refresh.
    #[inline]
    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut *self.scene
    }

    /// Component of type `T` in `row` of `family`.
    ///
    /// The column is resolved by type; `None` if `T` is not a column, the row
    /// does not exist or the component was destroyed.
    #[must_use]
    pub fn fetch<T: Component>(&self, family: &Family, row: usize) -> Option<&T> {
        let type_id = self.scene.components().type_id_of::<T>()?;
        let column = family.column_of(type_id)?;
        let handle = family.get_element(row)?.handle(column);
        self.scene.component_at::<T>(handle)
    }

    /// Mutable variant of [`fetch`](Self::fetch).
    pub fn fetch_mut<T: Component>(&mut self, family: &Family, row: usize) -> Option<&mut T> {
        let type_id = self.scene.components().type_id_of::<T>()?;
        let column = family.column_of(type_id)?;
        let handle = family.get_element(row)?.handle(column);
        self.scene.component_at_mut::<T>(handle)
    }

    /// Parks a message in `target`'s inbox, tagged with this system's id.
    ///
    /// Returns `false`, dropping the payload, if `target` is destroyed.
    pub fn send_message<M: Any + Send + Sync>(&mut self, target: EntityId, payload: M) -> bool {
        let Some(entity) = self.scene.entity_mut(target) else {
            return false;
        };
        entity.inbox.push(Message::new(payload, self.system_id));
        self.messaged.push(target);
        true
    }

    /// Asks the external loader for a resource on behalf of `requester`.
    pub fn request_resource(&self, name: impl Into<String>, requester: EntityId) {
        self.resources.request(name, requester);
    }

    /// The render painter, if this is a render tick and it is a `P`.
    pub fn painter<P: Any>(&mut self) -> Option<&mut P> {
        self.painter.as_deref_mut()?.downcast_mut::<P>()
    }
}
