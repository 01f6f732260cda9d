//! # Component Masks
//!
//! Every distinct set of component types is hash-consed into a small
//! [`MaskHandle`]. Two entities with the same live component set always hold
//! the same handle, so equality is a single integer compare and family matching
//! never needs to look at raw bits outside this module.

use ahash::AHashMap;

/// Number of 64-bit words in a [`RealMask`].
pub const MASK_WORDS: usize = 4;

/// Maximum number of registered component types (one bit each).
pub const MAX_COMPONENT_TYPES: usize = MASK_WORDS * 64;

/// Fixed-width component presence bitmask.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct RealMask([u64; MASK_WORDS]);

impl RealMask {
    /// The mask with no bit set.
    pub const EMPTY: Self = Self([0; MASK_WORDS]);

    /// Builds a mask from a list of bit indices.
    ///
    /// Bits past [`MAX_COMPONENT_TYPES`] are ignored.
    #[must_use]
    pub fn from_bits(bits: impl IntoIterator<Item = usize>) -> Self {
        let mut mask = Self::EMPTY;
        for bit in bits {
            mask.set(bit);
        }
        mask
    }

    /// Sets a bit.
    #[inline]
    pub fn set(&mut self, bit: usize) {
        if bit < MAX_COMPONENT_TYPES {
            self.0[bit / 64] |= 1_u64 << (bit % 64);
        }
    }

    /// Clears a bit.
    #[inline]
    pub fn clear(&mut self, bit: usize) {
        if bit < MAX_COMPONENT_TYPES {
            self.0[bit / 64] &= !(1_u64 << (bit % 64));
        }
    }

    /// Checks a bit.
    #[inline]
    #[must_use]
    pub fn test(&self, bit: usize) -> bool {
        bit < MAX_COMPONENT_TYPES && (self.0[bit / 64] >> (bit % 64)) & 1 == 1
    }

    /// Checks if no bit is set.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|word| *word == 0)
    }

    /// Number of set bits.
    #[inline]
    #[must_use]
    pub fn count(&self) -> u32 {
        self.0.iter().map(|word| word.count_ones()).sum()
    }

    /// Bitwise AND.
    #[inline]
    #[must_use]
    pub fn and(&self, other: &Self) -> Self {
        let mut out = *self;
        for (word, other) in out.0.iter_mut().zip(other.0) {
            *word &= other;
        }
        out
    }

    /// Bitwise OR.
    #[inline]
    #[must_use]
    pub fn or(&self, other: &Self) -> Self {
        let mut out = *self;
        for (word, other) in out.0.iter_mut().zip(other.0) {
            *word |= other;
        }
        out
    }

    /// Bitwise XOR.
    #[inline]
    #[must_use]
    pub fn xor(&self, other: &Self) -> Self {
        let mut out = *self;
        for (word, other) in out.0.iter_mut().zip(other.0) {
            *word ^= other;
        }
        out
    }

    /// Checks if every bit of `other` is also set in `self`.
    #[inline]
    #[must_use]
    pub fn is_superset_of(&self, other: &Self) -> bool {
        self.0.iter().zip(other.0).all(|(word, other)| word & other == other)
    }

    /// Iterates over the indices of set bits, lowest first.
    pub fn iter_bits(&self) -> impl Iterator<Item = usize> + '_ {
        self.0.iter().enumerate().flat_map(|(word_idx, &word)| {
            let mut remaining = word;
            std::iter::from_fn(move || {
                if remaining == 0 {
                    return None;
                }
                let bit = remaining.trailing_zeros() as usize;
                remaining &= remaining - 1;
                Some(word_idx * 64 + bit)
            })
        })
    }
}

/// Interned handle of a [`RealMask`].
///
/// `MaskHandle::EMPTY` (`-1`) stands for the empty mask and is resolved
/// without touching the table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MaskHandle(i32);

impl MaskHandle {
    /// Handle of the empty mask.
    pub const EMPTY: Self = Self(-1);

    /// Checks if this handle is the empty mask.
    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 < 0
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> i32 {
        self.0
    }
}

impl Default for MaskHandle {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// Hash-consing table of component masks.
///
/// Owned by the scene and passed explicitly to whatever needs mask operations.
/// Entries are never removed: the number of distinct component sets in a game
/// is small and bounded by its content.
#[derive(Debug, Default)]
pub struct MaskStorage {
    masks: Vec<RealMask>,
    lookup: AHashMap<RealMask, MaskHandle>,
}

impl MaskStorage {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct non-empty masks seen so far.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.masks.len()
    }

    /// Checks if only the empty mask has been seen.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.masks.is_empty()
    }

    /// Most distinct non-empty masks a table can hold.
    pub const CAPACITY: usize = i32::MAX as usize;

    /// Returns the canonical handle for `mask`, interning it on first sight.
    ///
    /// # Panics
    ///
    /// Panics if `mask` is new and the table already holds
    /// [`CAPACITY`](Self::CAPACITY) masks.
    pub fn get_handle(&mut self, mask: &RealMask) -> MaskHandle {
        if mask.is_empty() {
            return MaskHandle::EMPTY;
        }
        if let Some(handle) = self.lookup.get(mask) {
            return *handle;
        }

        let Some(handle) = Self::handle_for_slot(self.masks.len()) else {
            panic!("Mask table full ({} masks)", Self::CAPACITY);
        };
        self.masks.push(*mask);
        self.lookup.insert(*mask, handle);
        handle
    }

    /// Handle for the mask stored at `slot`, if it fits in a handle.
    #[inline]
    fn handle_for_slot(slot: usize) -> Option<MaskHandle> {
        i32::try_from(slot).ok().map(MaskHandle)
    }

    /// Returns the bit pattern of an interned handle.
    ///
    /// Handles from another table resolve to the empty mask.
    #[inline]
    #[must_use]
    pub fn retrieve(&self, handle: MaskHandle) -> RealMask {
        if handle.is_empty() {
            return RealMask::EMPTY;
        }
        self.masks
            .get(handle.0 as usize)
            .copied()
            .unwrap_or(RealMask::EMPTY)
    }

    /// Handle of the intersection of two masks.
    pub fn intersection(&mut self, a: MaskHandle, b: MaskHandle) -> MaskHandle {
        if a == b {
            return a;
        }
        if a.is_empty() || b.is_empty() {
            return MaskHandle::EMPTY;
        }
        let mask = self.retrieve(a).and(&self.retrieve(b));
        self.get_handle(&mask)
    }

    /// Handle of the union of two masks.
    pub fn union(&mut self, a: MaskHandle, b: MaskHandle) -> MaskHandle {
        if a == b || b.is_empty() {
            return a;
        }
        if a.is_empty() {
            return b;
        }
        let mask = self.retrieve(a).or(&self.retrieve(b));
        self.get_handle(&mask)
    }

    /// Checks if `b`'s set is a subset of `a`'s set.
    #[inline]
    #[must_use]
    pub fn contains(&self, a: MaskHandle, b: MaskHandle) -> bool {
        if a == b || b.is_empty() {
            return true;
        }
        if a.is_empty() {
            return false;
        }
        self.retrieve(a).is_superset_of(&self.retrieve(b))
    }

    /// Checks if the two masks share at least one bit.
    #[inline]
    #[must_use]
    pub fn intersects(&self, a: MaskHandle, b: MaskHandle) -> bool {
        if a.is_empty() || b.is_empty() {
            return false;
        }
        if a == b {
            return true;
        }
        !self.retrieve(a).and(&self.retrieve(b)).is_empty()
    }

    /// Checks if any bit of `filter` differs between `a` and `b`.
    #[inline]
    #[must_use]
    pub fn union_changed_between(&self, filter: MaskHandle, a: MaskHandle, b: MaskHandle) -> bool {
        if a == b || filter.is_empty() {
            return false;
        }
        let changed = self.retrieve(a).xor(&self.retrieve(b));
        !changed.and(&self.retrieve(filter)).is_empty()
    }
}
