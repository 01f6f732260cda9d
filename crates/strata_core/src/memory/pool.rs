//! # Generational Slot Pool
//!
//! Block allocator for objects that are frequently allocated and freed, with
//! handles that detect reuse of their slot.

/// Handle to a slot in a [`SlotPool`].
///
/// The handle is packed into a `u64`:
/// - Lower 32 bits: slot index
/// - Upper 32 bits: revision of the slot when the handle was issued
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct PoolHandle(u64);

impl PoolHandle {
    /// Null/invalid handle. Never issued by a pool.
    pub const NULL: Self = Self(u64::MAX);

    /// Creates a handle from a slot index and revision.
    #[inline]
    #[must_use]
    pub const fn new(index: u32, revision: u32) -> Self {
        Self(((revision as u64) << 32) | (index as u64))
    }

    /// Returns the slot index.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0 as u32
    }

    /// Returns the revision the handle was issued with.
    #[inline]
    #[must_use]
    pub const fn revision(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Returns the packed representation.
    #[inline]
    #[must_use]
    pub const fn to_bits(self) -> u64 {
        self.0
    }

    /// Checks if this is the null handle.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == u64::MAX
    }
}

impl Default for PoolHandle {
    fn default() -> Self {
        Self::NULL
    }
}

/// One pool slot. Vacant slots are threaded into the intrusive free list.
struct Slot<T> {
    value: Option<T>,
    revision: u32,
    next_free: Option<u32>,
}

impl<T> Slot<T> {
    const fn vacant() -> Self {
        Self {
            value: None,
            revision: 0,
            next_free: None,
        }
    }
}

/// A generational pool allocator.
///
/// Storage grows by whole blocks of `block_size` slots, appended lazily the
/// first time every existing slot is in use. Blocks are never reallocated, so a
/// value stays at the same address for as long as it lives.
///
/// Freeing a slot bumps its revision: any handle issued before the free
/// resolves to `None` from then on, even after the slot is handed out again.
///
/// # Thread Safety
///
/// This pool is NOT thread-safe. It is owned by the simulation thread.
///
/// # Example
///
/// ```rust
/// use strata_core::SlotPool;
///
/// let mut pool: SlotPool<u32> = SlotPool::new(64);
/// let old = pool.insert(1);
/// pool.free(old);
///
/// let new = pool.insert(2);
/// assert_eq!(old.index(), new.index());
/// assert!(pool.get(old).is_none());
/// assert_eq!(pool.get(new), Some(&2));
/// ```
pub struct SlotPool<T> {
    blocks: Vec<Box<[Slot<T>]>>,
    block_size: usize,
    /// Head of the intrusive free list.
    free_head: Option<u32>,
    /// Slots below this index have been handed out at least once.
    high_water: u32,
    len: usize,
}

impl<T> SlotPool<T> {
    /// Creates an empty pool. No block is allocated until the first insert.
    ///
    /// # Panics
    ///
    /// Panics if `block_size` is zero or does not fit in a `u32`.
    #[must_use]
    pub fn new(block_size: usize) -> Self {
        assert!(block_size > 0, "Block size must be greater than zero");
        assert!(
            block_size <= u32::MAX as usize,
            "Block size cannot exceed u32::MAX"
        );

        Self {
            blocks: Vec::new(),
            block_size,
            free_head: None,
            high_water: 0,
            len: 0,
        }
    }

    /// Returns the number of live values.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Checks if the pool holds no live value.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the number of slots currently backed by memory.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.blocks.len() * self.block_size
    }

    /// Returns the number of slots per block.
    #[inline]
    #[must_use]
    pub const fn block_size(&self) -> usize {
        self.block_size
    }

    /// Stores `value` and returns its handle.
    ///
    /// O(1); allocates only when a new block is needed.
    pub fn insert(&mut self, value: T) -> PoolHandle {
        self.insert_with(|_| value)
    }

    /// Claims a slot and builds the value from its handle.
    ///
    /// Useful for values that store their own handle.
    ///
    /// # Panics
    ///
    /// Panics if the pool would exceed `u32::MAX - 1` slots.
    pub fn insert_with<F>(&mut self, init: F) -> PoolHandle
    where
        F: FnOnce(PoolHandle) -> T,
    {
        let index = match self.free_head {
            Some(index) => index,
            None => {
                let index = self.high_water;
                assert!(index < u32::MAX, "Slot pool index overflow");
                if index as usize >= self.capacity() {
                    self.grow();
                }
                self.high_water += 1;
                index
            }
        };

        let block_size = self.block_size;
        let slot = &mut self.blocks[index as usize / block_size][index as usize % block_size];
        self.free_head = slot.next_free.take();

        let handle = PoolHandle::new(index, slot.revision);
        slot.value = Some(init(handle));
        self.len += 1;

        handle
    }

    /// Frees the slot behind `handle` and returns its value.
    ///
    /// Returns `None` for stale or null handles; the pool is left untouched.
    pub fn free(&mut self, handle: PoolHandle) -> Option<T> {
        let free_head = self.free_head;
        let slot = self.slot_mut(handle)?;
        let value = slot.value.take()?;

        slot.revision = slot.revision.wrapping_add(1);
        slot.next_free = free_head;
        self.free_head = Some(handle.index());
        self.len -= 1;

        Some(value)
    }

    /// Gets a reference to a live value.
    #[inline]
    #[must_use]
    pub fn get(&self, handle: PoolHandle) -> Option<&T> {
        self.slot(handle)?.value.as_ref()
    }

    /// Gets a mutable reference to a live value.
    #[inline]
    pub fn get_mut(&mut self, handle: PoolHandle) -> Option<&mut T> {
        self.slot_mut(handle)?.value.as_mut()
    }

    /// Checks whether `handle` still refers to a live value.
    #[inline]
    #[must_use]
    pub fn is_valid(&self, handle: PoolHandle) -> bool {
        self.get(handle).is_some()
    }

    /// Drops every value and invalidates every outstanding handle.
    ///
    /// Blocks are kept.
    pub fn clear(&mut self) {
        let block_size = self.block_size;
        let mut free_head = None;
        for index in (0..self.high_water).rev() {
            let slot = &mut self.blocks[index as usize / block_size][index as usize % block_size];
            if slot.value.take().is_some() {
                slot.revision = slot.revision.wrapping_add(1);
            }
            slot.next_free = free_head;
            free_head = Some(index);
        }
        self.free_head = free_head;
        self.len = 0;
    }

    /// Iterates over all live values with their handles, in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (PoolHandle, &T)> {
        self.blocks
            .iter()
            .flat_map(|block| block.iter())
            .take(self.high_water as usize)
            .enumerate()
            .filter_map(|(index, slot)| {
                let handle = PoolHandle::new(index as u32, slot.revision);
                slot.value.as_ref().map(|value| (handle, value))
            })
    }

    fn grow(&mut self) {
        let block: Vec<Slot<T>> = (0..self.block_size).map(|_| Slot::vacant()).collect();
        self.blocks.push(block.into_boxed_slice());
    }

    #[inline]
    fn slot(&self, handle: PoolHandle) -> Option<&Slot<T>> {
        let index = handle.index() as usize;
        let slot = self
            .blocks
            .get(index / self.block_size)?
            .get(index % self.block_size)?;
        (slot.revision == handle.revision()).then_some(slot)
    }

    #[inline]
    fn slot_mut(&mut self, handle: PoolHandle) -> Option<&mut Slot<T>> {
        let index = handle.index() as usize;
        let block_size = self.block_size;
        let slot = self
            .blocks
            .get_mut(index / block_size)?
            .get_mut(index % block_size)?;
        (slot.revision == handle.revision()).then_some(slot)
    }
}

impl<T> std::fmt::Debug for SlotPool<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlotPool")
            .field("len", &self.len)
            .field("capacity", &self.capacity())
            .field("block_size", &self.block_size)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_roundtrip() {
        let handle = PoolHandle::new(12345, 67890);
        assert_eq!(handle.index(), 12345);
        assert_eq!(handle.revision(), 67890);
        assert!(!handle.is_null());
        assert!(PoolHandle::default().is_null());
    }

    #[test]
    fn test_pool_insert_free() {
        let mut pool: SlotPool<u32> = SlotPool::new(8);

        let h1 = pool.insert(42);
        assert_eq!(*pool.get(h1).unwrap(), 42);
        assert_eq!(pool.len(), 1);

        assert_eq!(pool.free(h1), Some(42));
        assert_eq!(pool.len(), 0);
        assert!(pool.free(h1).is_none());
    }

    #[test]
    fn test_stale_handle_after_reuse() {
        let mut pool: SlotPool<u32> = SlotPool::new(4);

        let old = pool.insert(1);
        pool.free(old);
        let new = pool.insert(2);

        assert_eq!(old.index(), new.index()); // Same slot reused
        assert_ne!(old.revision(), new.revision());
        assert!(pool.get(old).is_none());
        assert!(pool.get_mut(old).is_none());
        assert!(pool.free(old).is_none());
        assert_eq!(*pool.get(new).unwrap(), 2);
    }

    #[test]
    fn test_lazy_block_growth() {
        let mut pool: SlotPool<u8> = SlotPool::new(2);
        assert_eq!(pool.capacity(), 0);

        let _ = pool.insert(1);
        assert_eq!(pool.capacity(), 2);
        let _ = pool.insert(2);
        assert_eq!(pool.capacity(), 2);
        let third = pool.insert(3);
        assert_eq!(pool.capacity(), 4);
        assert_eq!(third.index(), 2);
    }

    #[test]
    fn test_free_list_is_lifo() {
        let mut pool: SlotPool<u32> = SlotPool::new(16);
        let a = pool.insert(1);
        let b = pool.insert(2);
        pool.free(a);
        pool.free(b);

        assert_eq!(pool.insert(3).index(), b.index());
        assert_eq!(pool.insert(4).index(), a.index());
    }

    #[test]
    fn test_insert_with_sees_own_handle() {
        let mut pool: SlotPool<PoolHandle> = SlotPool::new(4);
        let handle = pool.insert_with(|h| h);
        assert_eq!(*pool.get(handle).unwrap(), handle);
    }

    #[test]
    fn test_clear_invalidates_handles() {
        let mut pool: SlotPool<u32> = SlotPool::new(4);
        let handles: Vec<_> = (0..6).map(|i| pool.insert(i)).collect();
        pool.clear();

        assert!(pool.is_empty());
        assert!(handles.iter().all(|h| !pool.is_valid(*h)));

        let reused = pool.insert(9);
        assert!(reused.index() < 6);
    }

    #[test]
    fn test_iter_skips_vacant() {
        let mut pool: SlotPool<u32> = SlotPool::new(4);
        let a = pool.insert(10);
        let b = pool.insert(20);
        let c = pool.insert(30);
        pool.free(b);

        let live: Vec<_> = pool.iter().collect();
        assert_eq!(live, vec![(a, &10), (c, &30)]);
    }
}
