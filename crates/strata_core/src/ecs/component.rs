//! # Component Types
//!
//! Components are plain data records. Once stored they carry no type
//! information: an entity only knows each component's [`ComponentTypeId`] and
//! pool handle, and destruction goes through the [`DeleterTable`] built at
//! registration time.

use std::any::{Any, TypeId};

use smallvec::{smallvec, SmallVec};

use crate::memory::{PoolHandle, SlotPool};

/// Marker trait for ECS components.
///
/// Components must be:
/// - `Send + Sync`: the world may be handed to another thread between frames
/// - `'static`: they are stored behind type-erased pools
///
/// # Example
///
/// ```rust,ignore
/// struct Health(u32);
///
/// impl Component for Health {}
///
/// world.register_component::<Health>()?;
/// ```
pub trait Component: Send + Sync + 'static {
    /// Human readable name, used in diagnostics and error messages.
    fn type_name() -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Dense runtime identifier of a registered component type.
///
/// Doubles as the component's bit in a [`RealMask`](super::RealMask) and as its
/// index in the deleter table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComponentTypeId(u16);

impl ComponentTypeId {
    #[inline]
    pub(crate) const fn new(index: u16) -> Self {
        Self(index)
    }

    /// Returns the dense index of this type.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Type-erased destructor: frees `handle` from the pool passed in.
pub type DestroyFn = fn(&mut (dyn Any + Send), PoolHandle) -> bool;

/// Deleter table entry for one component type.
#[derive(Clone, Copy)]
pub struct DeleterEntry {
    /// Component type name.
    pub name: &'static str,
    /// Size of one component in bytes.
    pub size: usize,
    /// Frees one component from its pool.
    pub destroy: DestroyFn,
}

impl DeleterEntry {
    /// Builds the entry for `T`.
    #[must_use]
    pub fn of<T: Component>() -> Self {
        Self {
            name: T::type_name(),
            size: std::mem::size_of::<T>(),
            destroy: destroy_erased::<T>,
        }
    }
}

impl std::fmt::Debug for DeleterEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeleterEntry")
            .field("name", &self.name)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

fn destroy_erased<T: Component>(pool: &mut (dyn Any + Send), handle: PoolHandle) -> bool {
    pool.downcast_mut::<SlotPool<T>>()
        .and_then(|pool| pool.free(handle))
        .is_some()
}

/// Destructors indexed by [`ComponentTypeId`].
#[derive(Clone, Debug, Default)]
pub struct DeleterTable {
    entries: Vec<DeleterEntry>,
}

impl DeleterTable {
    /// Appends the entry for the next type id and returns that id's index.
    pub(crate) fn push(&mut self, entry: DeleterEntry) -> usize {
        self.entries.push(entry);
        self.entries.len() - 1
    }

    /// Looks up the entry of a type.
    #[inline]
    #[must_use]
    pub fn get(&self, id: ComponentTypeId) -> Option<&DeleterEntry> {
        self.entries.get(id.index())
    }

    /// Number of registered types.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Checks if no type is registered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Static description of a component tuple a family is declared over.
///
/// Implemented for `()` and tuples of up to eight components. The order of the
/// tuple is the column order of the family rows.
pub trait ComponentSet: 'static {
    /// `(TypeId, name)` of every member, in tuple order.
    fn members() -> SmallVec<[(TypeId, &'static str); 8]>;
}

impl ComponentSet for () {
    fn members() -> SmallVec<[(TypeId, &'static str); 8]> {
        SmallVec::new()
    }
}

macro_rules! impl_component_set {
    ($($name:ident),+) => {
        impl<$($name: Component),+> ComponentSet for ($($name,)+) {
            fn members() -> SmallVec<[(TypeId, &'static str); 8]> {
                smallvec![$((TypeId::of::<$name>(), $name::type_name())),+]
            }
        }
    };
}

impl_component_set!(A);
impl_component_set!(A, B);
impl_component_set!(A, B, C);
impl_component_set!(A, B, C, D);
impl_component_set!(A, B, C, D, E);
impl_component_set!(A, B, C, D, E, F);
impl_component_set!(A, B, C, D, E, F, G);
impl_component_set!(A, B, C, D, E, F, G, H);
