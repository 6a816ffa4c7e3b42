//! The slot arena is the single owner of every bare value held by a
//! `DoubleMap`. Slots are addressed by integer index only, and the arena is
//! sized once at construction.

use std::collections::TryReserveError;

pub(crate) struct Arena<T> {
    slots: Box<[Option<T>]>,
}

impl<T> Arena<T> {
    /// Reserve `capacity` free slots. Fails only if the allocator refuses the
    /// request; the bounds on capacity are enforced by the builder.
    pub(crate) fn allocate(capacity: usize) -> Result<Self, TryReserveError> {
        let mut slots = Vec::new();
        slots.try_reserve_exact(capacity)?;
        slots.resize_with(capacity, || None);
        Ok(Arena {
            slots: slots.into_boxed_slice(),
        })
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub(crate) fn is_occupied(&self, index: usize) -> bool {
        matches!(self.slots.get(index), Some(Some(_)))
    }

    /// Store `value` in a free slot. Returns false, leaving the arena as it
    /// was, if the slot is out of range or already occupied.
    pub(crate) fn write(&mut self, index: usize, value: T) -> bool {
        match self.slots.get_mut(index) {
            Some(slot @ None) => {
                *slot = Some(value);
                true
            }
            _ => false,
        }
    }

    pub(crate) fn read(&self, index: usize) -> Option<&T> {
        self.slots.get(index).and_then(|s| s.as_ref())
    }

    /// Free an occupied slot, handing its value back.
    pub(crate) fn clear(&mut self, index: usize) -> Option<T> {
        self.slots.get_mut(index).and_then(|s| s.take())
    }

    pub(crate) fn occupied(&self) -> impl Iterator<Item = usize> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|_| i))
    }
}
