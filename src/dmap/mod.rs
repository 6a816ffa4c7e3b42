//! DoubleMap - A fixed capacity map addressed by two independent keys
//!
//! Every value stored in a `DoubleMap` embeds two keys, and can be found by
//! either of them in `O(1)` expected time. The map owns a fixed number of
//! slots, addressed by integer index, and the caller decides which free slot
//! each new value goes into. This suits flow tables in a packet processing
//! pipeline, where the slot index is usually also the index into a parallel
//! free list or expiry structure maintained by the caller.
//!
//! All memory is reserved when the map is built. Lookups, `put` and `erase`
//! never allocate, and never grow or rehash the map. When the map is full,
//! `put` fails and it is up to the caller to evict something.
//!
//! The map is a single owner structure. It is `Send` when its contents are,
//! but it has no internal synchronisation: share it between threads behind
//! your own lock, or give each worker its own map.
//!
//! Three invariants hold before and after every call:
//!
//! * A slot is occupied iff it is reachable from exactly one first key *and*
//!   exactly one second key.
//! * The keys reachable for a slot are exactly the keys extracted from the
//!   value stored in it.
//! * No two occupied slots share a first key, or a second key.

mod error;
mod packing;

pub use self::error::{AllocationFailure, DoubleMapError};
pub use self::packing::{check_round_trip, DoubleKeyed};

use crate::internals::arena::Arena;
use crate::internals::table::KeyTable;

use std::borrow::Borrow;
use std::collections::TryReserveError;
use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::mem;

use tracing::{debug, trace};

#[cfg(all(feature = "ahash", not(feature = "foldhash")))]
use ahash::RandomState;

#[cfg(feature = "foldhash")]
use foldhash::fast::RandomState;

#[cfg(all(not(feature = "ahash"), not(feature = "foldhash")))]
use std::collections::hash_map::RandomState;

/// The exclusive upper bound on the capacity of a map.
pub const MAX_CAPACITY: usize = 4096;

/// The exclusive upper bound on the size in bytes of a bare value.
pub const MAX_VALUE_SIZE: usize = 4096;

/// The hasher used by a `DoubleMap` unless another is configured. This
/// follows the crate features: `foldhash`, then `ahash`, then the std
/// `RandomState`.
pub type DefaultHashBuilder = RandomState;

/// A builder to configure a `DoubleMap` before it is allocated.
#[derive(Debug, Clone)]
pub struct DoubleMapBuilder<S = DefaultHashBuilder> {
    capacity: Option<usize>,
    build_hasher: S,
}

impl Default for DoubleMapBuilder {
    fn default() -> Self {
        DoubleMapBuilder {
            capacity: None,
            build_hasher: DefaultHashBuilder::default(),
        }
    }
}

impl DoubleMapBuilder {
    /// Create a new builder with the default hasher and no capacity set.
    pub fn new() -> Self {
        Self::default()
    }
}

impl<S> DoubleMapBuilder<S> {
    /// Set the fixed number of slots in the map. Must be in `1..4096`.
    #[must_use]
    pub fn set_capacity(self, capacity: usize) -> Self {
        DoubleMapBuilder {
            capacity: Some(capacity),
            build_hasher: self.build_hasher,
        }
    }

    /// Replace the hasher used by both key tables. The same hasher state is
    /// cloned into each table.
    #[must_use]
    pub fn set_hasher<T>(self, build_hasher: T) -> DoubleMapBuilder<T> {
        DoubleMapBuilder {
            capacity: self.capacity,
            build_hasher,
        }
    }

    /// Consume this builder, reserving all memory the map will ever use. Fails
    /// if the capacity is missing or out of range, if the bare value of `V` is
    /// zero sized or too large, or if the memory can not be reserved.
    pub fn build<V>(self) -> Result<DoubleMap<V, S>, DoubleMapError>
    where
        V: DoubleKeyed,
        S: BuildHasher + Clone,
    {
        let DoubleMapBuilder {
            capacity,
            build_hasher,
        } = self;

        let capacity = capacity.unwrap_or(0);
        if capacity == 0 || capacity >= MAX_CAPACITY {
            debug!(capacity, "rejected map capacity");
            return Err(AllocationFailure::InvalidCapacity(capacity).into());
        }

        let value_size = mem::size_of::<V::Bare>();
        if value_size == 0 || value_size >= MAX_VALUE_SIZE {
            debug!(value_size, "rejected bare value size");
            return Err(AllocationFailure::InvalidValueSize(value_size).into());
        }

        let oom = |e: TryReserveError| {
            debug!(?e, capacity, "unable to reserve map storage");
            DoubleMapError::from(AllocationFailure::OutOfMemory)
        };

        let arena = Arena::allocate(capacity).map_err(oom)?;
        let keys1 = KeyTable::allocate(capacity, build_hasher.clone()).map_err(oom)?;
        let keys2 = KeyTable::allocate(capacity, build_hasher).map_err(oom)?;

        debug!(capacity, value_size, "allocated double map");

        Ok(DoubleMap {
            arena,
            keys1,
            keys2,
        })
    }

    /// As [`build`](DoubleMapBuilder::build), but first checks that every
    /// value in `samples` is rebuilt exactly by `pack` after `extract`. A
    /// sample that is not fails the build with `BrokenPacking` and its
    /// position in `samples`.
    pub fn build_checked<V>(self, samples: &[V]) -> Result<DoubleMap<V, S>, DoubleMapError>
    where
        V: DoubleKeyed + Clone + PartialEq,
        S: BuildHasher + Clone,
    {
        if let Some(pos) = samples.iter().position(|v| !check_round_trip(v)) {
            debug!(sample = pos, "rejected packing implementation");
            return Err(AllocationFailure::BrokenPacking(pos).into());
        }
        self.build()
    }
}

/// A fixed capacity map where each value is reachable by two independent
/// keys. See the [module documentation](crate::dmap) for the invariants it keeps.
///
/// # Examples
/// ```
/// use dmap::{DoubleKeyed, DoubleMap, DoubleMapError};
///
/// #[derive(Clone, Debug, PartialEq)]
/// struct Flow {
///     internal: u16,
///     external: u16,
///     bytes: u64,
/// }
///
/// impl DoubleKeyed for Flow {
///     type Key1 = u16;
///     type Key2 = u16;
///     type Bare = u64;
///
///     fn extract(self) -> (u16, u16, u64) {
///         (self.internal, self.external, self.bytes)
///     }
///
///     fn pack(bytes: u64, internal: u16, external: u16) -> Self {
///         Flow { internal, external, bytes }
///     }
/// }
///
/// let mut map: DoubleMap<Flow> = DoubleMap::allocate(2).unwrap();
/// let flow = Flow { internal: 80, external: 40080, bytes: 0 };
///
/// map.put(&flow, 0).unwrap();
/// assert_eq!(map.get_by_key1(&80), Some(0));
/// assert_eq!(map.get_by_key2(&40080), Some(0));
/// assert_eq!(map.get_value(0), Ok(flow.clone()));
///
/// // Keys are unique on both axes.
/// let clash = Flow { internal: 81, external: 40080, bytes: 0 };
/// assert_eq!(map.put(&clash, 1), Err(DoubleMapError::DuplicateKey2));
///
/// map.erase(0).unwrap();
/// assert!(map.is_empty());
/// ```
pub struct DoubleMap<V, S = DefaultHashBuilder>
where
    V: DoubleKeyed,
{
    arena: Arena<V::Bare>,
    keys1: KeyTable<V::Key1, S>,
    keys2: KeyTable<V::Key2, S>,
}

impl<V> DoubleMap<V>
where
    V: DoubleKeyed,
{
    /// Allocate an empty map with `capacity` slots and the default hasher.
    pub fn allocate(capacity: usize) -> Result<Self, DoubleMapError> {
        DoubleMapBuilder::new().set_capacity(capacity).build()
    }
}

impl<V, S> DoubleMap<V, S>
where
    V: DoubleKeyed,
{
    /// The fixed number of slots in this map.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.arena.capacity()
    }

    /// The number of occupied slots.
    #[inline]
    pub fn size(&self) -> usize {
        self.keys1.len()
    }

    /// True if no slot is occupied.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// True if every slot is occupied, so the next `put` will fail.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.size() == self.capacity()
    }

    /// True if slot `index` holds a value. Out of range indices are never used.
    #[inline]
    pub fn is_index_used(&self, index: usize) -> bool {
        self.arena.is_occupied(index)
    }
}

impl<V, S> DoubleMap<V, S>
where
    V: DoubleKeyed,
    S: BuildHasher,
{
    /// Find the slot holding the value whose first key is `k`.
    pub fn get_by_key1<Q>(&self, k: &Q) -> Option<usize>
    where
        V::Key1: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let index = self.keys1.lookup(k)?;
        debug_assert!(self.keys2.has_index(index) && self.arena.is_occupied(index));
        Some(index)
    }

    /// Find the slot holding the value whose second key is `k`.
    pub fn get_by_key2<Q>(&self, k: &Q) -> Option<usize>
    where
        V::Key2: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let index = self.keys2.lookup(k)?;
        debug_assert!(self.keys1.has_index(index) && self.arena.is_occupied(index));
        Some(index)
    }

    /// The first key of the value in slot `index`, if it is occupied.
    pub fn get_key1_by_index(&self, index: usize) -> Option<&V::Key1> {
        self.keys1.key_at(index)
    }

    /// The second key of the value in slot `index`, if it is occupied.
    pub fn get_key2_by_index(&self, index: usize) -> Option<&V::Key2> {
        self.keys2.key_at(index)
    }

    /// The occupied slots, in ascending order.
    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.arena.occupied()
    }

    fn check_index(&self, index: usize) -> Result<(), DoubleMapError> {
        if index >= self.capacity() {
            Err(DoubleMapError::IndexOutOfRange {
                index,
                capacity: self.capacity(),
            })
        } else {
            Ok(())
        }
    }

    fn check_used(&self, index: usize) -> Result<(), DoubleMapError> {
        self.check_index(index)?;
        if self.arena.is_occupied(index) {
            Ok(())
        } else {
            Err(DoubleMapError::IndexFree(index))
        }
    }

    /// Store `value` in the free slot `index`, making it reachable by both of
    /// its keys. The value is copied; the caller keeps the original.
    ///
    /// Fails with `CapacityExceeded` if the map is full. Otherwise fails if
    /// `index` is out of range or occupied, or if either key is already
    /// present. On failure the map is unchanged.
    pub fn put(&mut self, value: &V, index: usize) -> Result<(), DoubleMapError>
    where
        V: Clone,
    {
        let r = self.put_inner(value, index);
        match &r {
            Ok(()) => trace!(index, size = self.size(), "put"),
            Err(e) => debug!(?e, index, "put rejected"),
        }
        r
    }

    fn put_inner(&mut self, value: &V, index: usize) -> Result<(), DoubleMapError>
    where
        V: Clone,
    {
        if self.is_full() {
            return Err(DoubleMapError::CapacityExceeded {
                capacity: self.capacity(),
            });
        }
        self.check_index(index)?;
        if self.arena.is_occupied(index) {
            return Err(DoubleMapError::IndexOccupied(index));
        }

        let (k1, k2, bare) = value.clone().extract();
        if self.keys1.contains(&k1) {
            return Err(DoubleMapError::DuplicateKey1);
        }
        if self.keys2.contains(&k2) {
            return Err(DoubleMapError::DuplicateKey2);
        }

        // Everything is checked, none of these can refuse. Unwind anyway so
        // a broken table can never leave a half inserted value behind.
        if !self.arena.write(index, bare) {
            return Err(DoubleMapError::IndexOccupied(index));
        }
        if self.keys1.insert(k1, index).is_err() {
            self.arena.clear(index);
            return Err(DoubleMapError::DuplicateKey1);
        }
        if self.keys2.insert(k2, index).is_err() {
            self.keys1.remove_index(index);
            self.arena.clear(index);
            return Err(DoubleMapError::DuplicateKey2);
        }

        Ok(())
    }

    /// Copy out the full value in slot `index`, with both keys packed back in.
    pub fn get_value(&self, index: usize) -> Result<V, DoubleMapError> {
        self.check_used(index)?;
        match (
            self.arena.read(index),
            self.keys1.key_at(index),
            self.keys2.key_at(index),
        ) {
            (Some(bare), Some(k1), Some(k2)) => Ok(V::pack(bare.clone(), k1.clone(), k2.clone())),
            _ => Err(DoubleMapError::IndexFree(index)),
        }
    }

    /// Vacate slot `index`, returning the full value it held. Both keys stop
    /// resolving and the slot becomes free.
    pub fn take(&mut self, index: usize) -> Result<V, DoubleMapError> {
        if let Err(e) = self.check_used(index) {
            debug!(?e, index, "erase rejected");
            return Err(e);
        }

        let k1 = self.keys1.remove_index(index);
        let k2 = self.keys2.remove_index(index);
        let bare = self.arena.clear(index);

        match (k1, k2, bare) {
            (Some(k1), Some(k2), Some(bare)) => {
                trace!(index, size = self.size(), "erase");
                Ok(V::pack(bare, k1, k2))
            }
            // Unreachable while the invariants hold.
            _ => Err(DoubleMapError::IndexFree(index)),
        }
    }

    /// Vacate slot `index`. Fails, leaving the map unchanged, if the slot
    /// is not occupied.
    pub fn erase(&mut self, index: usize) -> Result<(), DoubleMapError> {
        self.take(index).map(|_| ())
    }

    /// Vacate every slot in `indices`. Either all of them are erased, or if
    /// any is out of range, free, or listed twice, none are. A repeated slot
    /// is reported as `DuplicateIndex`. Returns how many slots were erased.
    pub fn erase_all(&mut self, indices: &[usize]) -> Result<usize, DoubleMapError> {
        for (pos, &index) in indices.iter().enumerate() {
            let checked = self.check_used(index).and_then(|()| {
                if indices[..pos].contains(&index) {
                    Err(DoubleMapError::DuplicateIndex(index))
                } else {
                    Ok(())
                }
            });
            if let Err(e) = checked {
                debug!(?e, index, "erase_all rejected");
                return Err(e);
            }
        }

        for &index in indices {
            self.erase(index)?;
        }
        Ok(indices.len())
    }

    #[cfg(test)]
    pub(crate) fn verify(&self) -> bool {
        if !(self.keys1.verify() && self.keys2.verify()) {
            return false;
        }
        let size = self.size();
        if self.keys2.len() != size || self.arena.occupied().count() != size {
            return false;
        }
        if size > self.capacity() {
            return false;
        }

        (0..self.capacity()).all(|i| {
            let used = self.arena.is_occupied(i);
            if used != self.keys1.has_index(i) || used != self.keys2.has_index(i) {
                return false;
            }
            if !used {
                return true;
            }
            match (
                self.arena.read(i),
                self.keys1.key_at(i),
                self.keys2.key_at(i),
            ) {
                (Some(bare), Some(k1), Some(k2)) => {
                    let (e1, e2, _) = V::pack(bare.clone(), k1.clone(), k2.clone()).extract();
                    e1 == *k1
                        && e2 == *k2
                        && self.keys1.lookup(k1) == Some(i)
                        && self.keys2.lookup(k2) == Some(i)
                }
                _ => false,
            }
        })
    }
}

impl<V, S> fmt::Debug for DoubleMap<V, S>
where
    V: DoubleKeyed,
    V::Key1: fmt::Debug,
    V::Key2: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("DoubleMap")
            .field("capacity", &self.arena.capacity())
            .field("size", &self.size())
            .field("keys1", &self.keys1)
            .field("keys2", &self.keys2)
            .finish()
    }
}
