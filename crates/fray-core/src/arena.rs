//! Generation-checked slot storage for collision volumes.
//!
//! A [`VolumeId`] is a 64-bit handle that packs a *generation* counter in the
//! high 32 bits and a slot *index* in the low 32 bits. The generation is bumped
//! every time a slot is vacated, so a handle kept by an action after its volume
//! was removed is detected immediately instead of aliasing a newer volume.
//!
//! The arena has a fixed capacity chosen at construction. Running out of slots
//! means a script is leaking volumes, which is a programming error and panics.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

// ---------------------------------------------------------------------------
// VolumeId
// ---------------------------------------------------------------------------

/// A generational volume handle.
///
/// Layout: `[generation: u32 | index: u32]`. Ordering compares the raw value,
/// which sorts first by generation and then by index.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VolumeId(u64);

impl VolumeId {
    #[inline]
    pub fn new(index: u32, generation: u32) -> Self {
        Self((generation as u64) << 32 | index as u64)
    }

    /// The slot index (low 32 bits).
    #[inline]
    pub fn index(self) -> u32 {
        self.0 as u32
    }

    /// The generation (high 32 bits).
    #[inline]
    pub fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }

    #[inline]
    pub fn to_raw(self) -> u64 {
        self.0
    }

    #[inline]
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Key used for deterministic tie-breaks: slot index first, then
    /// generation.
    #[inline]
    pub fn order_key(self) -> (u32, u32) {
        (self.index(), self.generation())
    }
}

impl fmt::Debug for VolumeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VolumeId({}v{})", self.index(), self.generation())
    }
}

impl fmt::Display for VolumeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index(), self.generation())
    }
}

// ---------------------------------------------------------------------------
// VolumeArena
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Fixed-capacity slot map keyed by [`VolumeId`].
///
/// Free slots are recycled in FIFO order so generations spread across slots
/// rather than piling up on one hot index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeArena<T> {
    slots: Vec<Slot<T>>,
    free: VecDeque<u32>,
    capacity: usize,
    len: usize,
}

impl<T> VolumeArena<T> {
    /// Create an empty arena that can hold at most `capacity` live values.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero or does not fit in a `u32` index.
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(
            capacity > 0 && capacity <= u32::MAX as usize,
            "volume arena capacity must be in 1..=u32::MAX, got {capacity}"
        );
        Self {
            slots: Vec::with_capacity(capacity),
            free: VecDeque::new(),
            capacity,
            len: 0,
        }
    }

    /// Insert a value and return its handle.
    ///
    /// # Panics
    ///
    /// Panics when the arena is full.
    pub fn insert(&mut self, value: T) -> VolumeId {
        assert!(
            self.len < self.capacity,
            "volume arena capacity exceeded ({} live volumes), a script is leaking volumes",
            self.capacity
        );
        self.len += 1;
        if let Some(index) = self.free.pop_front() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            VolumeId::new(index, slot.generation)
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                value: Some(value),
            });
            VolumeId::new(index, 0)
        }
    }

    /// Remove the value behind `id`, bumping the slot generation.
    ///
    /// Returns `None` for a stale or unknown handle.
    pub fn remove(&mut self, id: VolumeId) -> Option<T> {
        let slot = self.slots.get_mut(id.index() as usize)?;
        if slot.generation != id.generation() {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push_back(id.index());
        self.len -= 1;
        Some(value)
    }

    pub fn get(&self, id: VolumeId) -> Option<&T> {
        let slot = self.slots.get(id.index() as usize)?;
        if slot.generation != id.generation() {
            return None;
        }
        slot.value.as_ref()
    }

    pub fn get_mut(&mut self, id: VolumeId) -> Option<&mut T> {
        let slot = self.slots.get_mut(id.index() as usize)?;
        if slot.generation != id.generation() {
            return None;
        }
        slot.value.as_mut()
    }

    /// Returns `true` if `id` refers to a live value.
    pub fn contains(&self, id: VolumeId) -> bool {
        self.get(id).is_some()
    }

    /// Number of live values.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Maximum number of live values.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Iterate live values in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (VolumeId, &T)> {
        self.slots.iter().enumerate().filter_map(|(i, slot)| {
            slot.value
                .as_ref()
                .map(|v| (VolumeId::new(i as u32, slot.generation), v))
        })
    }

    /// Iterate live values mutably in slot order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (VolumeId, &mut T)> {
        self.slots.iter_mut().enumerate().filter_map(|(i, slot)| {
            let generation = slot.generation;
            slot.value
                .as_mut()
                .map(move |v| (VolumeId::new(i as u32, generation), v))
        })
    }

    /// Remove every value whose predicate returns `false`.
    pub fn retain(&mut self, mut keep: impl FnMut(VolumeId, &T) -> bool) {
        let doomed: Vec<VolumeId> = self
            .iter()
            .filter(|(id, v)| !keep(*id, v))
            .map(|(id, _)| id)
            .collect();
        for id in doomed {
            self.remove(id);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_unique_ids() {
        let mut arena = VolumeArena::with_capacity(100);
        let ids: Vec<VolumeId> = (0..100).map(|i| arena.insert(i)).collect();
        let mut indices: Vec<u32> = ids.iter().map(|id| id.index()).collect();
        indices.sort();
        indices.dedup();
        assert_eq!(indices.len(), 100);
        assert_eq!(arena.len(), 100);
    }

    #[test]
    fn generation_increments_on_recycle() {
        let mut arena = VolumeArena::with_capacity(4);
        let v0 = arena.insert("a");
        assert_eq!(v0.generation(), 0);
        assert_eq!(arena.remove(v0), Some("a"));
        let v1 = arena.insert("b");
        assert_eq!(v1.index(), v0.index());
        assert_eq!(v1.generation(), 1);
    }

    #[test]
    fn stale_handle_does_not_alias() {
        let mut arena = VolumeArena::with_capacity(4);
        let old = arena.insert(1);
        arena.remove(old);
        let _new = arena.insert(2);
        assert!(arena.get(old).is_none(), "stale handle must not see the new value");
        assert!(arena.remove(old).is_none());
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn double_remove_returns_none() {
        let mut arena = VolumeArena::with_capacity(2);
        let id = arena.insert(5u8);
        assert!(arena.remove(id).is_some());
        assert!(arena.remove(id).is_none());
        assert!(arena.is_empty());
    }

    #[test]
    #[should_panic(expected = "volume arena capacity exceeded")]
    fn exceeding_capacity_panics() {
        let mut arena = VolumeArena::with_capacity(2);
        arena.insert(0);
        arena.insert(1);
        arena.insert(2);
    }

    #[test]
    fn iter_is_slot_ordered() {
        let mut arena = VolumeArena::with_capacity(8);
        let a = arena.insert('a');
        let b = arena.insert('b');
        let c = arena.insert('c');
        arena.remove(b);
        let seen: Vec<VolumeId> = arena.iter().map(|(id, _)| id).collect();
        assert_eq!(seen, vec![a, c]);
    }

    #[test]
    fn retain_drops_rejected_values() {
        let mut arena = VolumeArena::with_capacity(8);
        for i in 0..6 {
            arena.insert(i);
        }
        arena.retain(|_, v| v % 2 == 0);
        let left: Vec<i32> = arena.iter().map(|(_, v)| *v).collect();
        assert_eq!(left, vec![0, 2, 4]);
    }

    #[test]
    fn volume_id_roundtrip() {
        let id = VolumeId::new(42, 7);
        assert_eq!(id.index(), 42);
        assert_eq!(id.generation(), 7);
        assert_eq!(VolumeId::from_raw(id.to_raw()), id);
    }
}
