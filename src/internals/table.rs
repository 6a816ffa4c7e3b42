//! A fixed capacity, open addressed table mapping a key to a slot index.
//!
//! Each bucket carries a chain counter: the number of live keys whose probe
//! sequence passes *over* that bucket to land further along. A lookup may stop
//! as soon as it reaches a non matching bucket with a zero chain count, which
//! means freed buckets never turn into tombstones that lengthen every probe.
//!
//! The table never grows. It has exactly as many buckets as the owning map
//! has slots, so it can always hold one key per slot.

use std::borrow::Borrow;
use std::collections::TryReserveError;
use std::fmt;
use std::hash::{BuildHasher, Hash};

macro_rules! hash_key {
    ($self:expr, $k:expr) => {{
        $self.build_hasher.hash_one($k)
    }};
}

struct Entry<K> {
    hash: u64,
    key: K,
    index: usize,
}

struct Bucket<K> {
    entry: Option<Entry<K>>,
    chains: u32,
}

pub(crate) struct KeyTable<K, S> {
    buckets: Box<[Bucket<K>]>,
    // slot index -> bucket currently holding the key for that slot.
    owners: Box<[Option<usize>]>,
    len: usize,
    build_hasher: S,
}

impl<K, S> KeyTable<K, S> {
    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len
    }
}

impl<K, S> KeyTable<K, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    pub(crate) fn allocate(capacity: usize, build_hasher: S) -> Result<Self, TryReserveError> {
        let mut buckets = Vec::new();
        buckets.try_reserve_exact(capacity)?;
        buckets.resize_with(capacity, || Bucket {
            entry: None,
            chains: 0,
        });

        let mut owners = Vec::new();
        owners.try_reserve_exact(capacity)?;
        owners.resize(capacity, None);

        Ok(KeyTable {
            buckets: buckets.into_boxed_slice(),
            owners: owners.into_boxed_slice(),
            len: 0,
            build_hasher,
        })
    }

    #[inline]
    fn start(&self, hash: u64) -> usize {
        (hash % self.buckets.len() as u64) as usize
    }

    #[inline]
    fn next(&self, b: usize) -> usize {
        let n = b + 1;
        if n == self.buckets.len() {
            0
        } else {
            n
        }
    }

    fn find_bucket<Q>(&self, hash: u64, k: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        let mut b = self.start(hash);
        for _ in 0..self.buckets.len() {
            let bucket = &self.buckets[b];
            if let Some(e) = &bucket.entry {
                if e.hash == hash && k.eq(e.key.borrow()) {
                    return Some(b);
                }
            }
            if bucket.chains == 0 {
                return None;
            }
            b = self.next(b);
        }
        None
    }

    /// Resolve a key to the slot index it is associated with.
    pub(crate) fn lookup<Q>(&self, k: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = hash_key!(self, k);
        self.find_bucket(hash, k)
            .and_then(|b| self.buckets[b].entry.as_ref())
            .map(|e| e.index)
    }

    pub(crate) fn contains<Q>(&self, k: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.lookup(k).is_some()
    }

    #[inline]
    pub(crate) fn has_index(&self, index: usize) -> bool {
        matches!(self.owners.get(index), Some(Some(_)))
    }

    /// The key currently associated with slot `index`.
    pub(crate) fn key_at(&self, index: usize) -> Option<&K> {
        let b = (*self.owners.get(index)?)?;
        self.buckets[b].entry.as_ref().map(|e| &e.key)
    }

    /// Associate `k` with `index`. The key must be absent and the index must
    /// not already be held by another key. On refusal the key is handed back
    /// and the table is unchanged.
    pub(crate) fn insert(&mut self, k: K, index: usize) -> Result<(), K> {
        if index >= self.owners.len() || self.has_index(index) || self.len == self.buckets.len()
        {
            return Err(k);
        }
        let hash = hash_key!(self, &k);
        if self.find_bucket(hash, &k).is_some() {
            return Err(k);
        }

        // There is at least one free bucket since len < capacity.
        let start = self.start(hash);
        let mut b = start;
        while self.buckets[b].entry.is_some() {
            b = self.next(b);
        }

        let mut p = start;
        while p != b {
            self.buckets[p].chains += 1;
            p = self.next(p);
        }

        self.buckets[b].entry = Some(Entry {
            hash,
            key: k,
            index,
        });
        self.owners[index] = Some(b);
        self.len += 1;
        Ok(())
    }

    /// Drop the association held by slot `index`, returning its key.
    pub(crate) fn remove_index(&mut self, index: usize) -> Option<K> {
        let b = self.owners.get_mut(index)?.take()?;
        let entry = self.buckets[b].entry.take()?;

        let mut p = self.start(entry.hash);
        while p != b {
            debug_assert!(self.buckets[p].chains > 0);
            self.buckets[p].chains -= 1;
            p = self.next(p);
        }

        self.len -= 1;
        Some(entry.key)
    }

    #[cfg(test)]
    pub(crate) fn verify(&self) -> bool {
        let cap = self.buckets.len();
        let mut chains = vec![0u32; cap];
        let mut live = 0;

        for (b, bucket) in self.buckets.iter().enumerate() {
            let Some(e) = &bucket.entry else {
                continue;
            };
            live += 1;
            if e.hash != hash_key!(self, &e.key) {
                return false;
            }
            if self.owners.get(e.index) != Some(&Some(b)) {
                return false;
            }
            let mut p = self.start(e.hash);
            while p != b {
                chains[p] += 1;
                p = self.next(p);
            }
        }

        let owned = self.owners.iter().filter(|o| o.is_some()).count();
        live == self.len
            && owned == self.len
            && self
                .buckets
                .iter()
                .zip(chains.iter())
                .all(|(bucket, c)| bucket.chains == *c)
    }
}

impl<K, S> fmt::Debug for KeyTable<K, S>
where
    K: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_map()
            .entries(
                self.buckets
                    .iter()
                    .filter_map(|b| b.entry.as_ref())
                    .map(|e| (&e.key, e.index)),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::KeyTable;
    use std::hash::{BuildHasher, BuildHasherDefault, Hasher};

    // Sends every key to bucket zero, forcing the longest possible chains.
    #[derive(Default)]
    struct Collide;

    impl Hasher for Collide {
        fn finish(&self) -> u64 {
            0
        }
        fn write(&mut self, _bytes: &[u8]) {}
    }

    type CollideState = BuildHasherDefault<Collide>;

    #[test]
    fn test_table_insert_lookup_remove() {
        let mut t: KeyTable<u32, _> =
            KeyTable::allocate(8, std::collections::hash_map::RandomState::new()).unwrap();
        for i in 0..8 {
            assert!(t.insert(i * 10, i as usize).is_ok());
        }
        assert_eq!(t.len(), 8);
        assert!(t.verify());

        for i in 0..8 {
            assert_eq!(t.lookup(&(i * 10)), Some(i as usize));
            assert_eq!(t.key_at(i as usize), Some(&(i * 10)));
        }
        assert_eq!(t.lookup(&5), None);

        // Full.
        assert_eq!(t.insert(99, 0), Err(99));

        assert_eq!(t.lookup(&30), Some(3));
        assert_eq!(t.remove_index(3), Some(30));
        assert_eq!(t.lookup(&30), None);
        assert_eq!(t.remove_index(4), Some(40));
        assert_eq!(t.remove_index(4), None);
        assert_eq!(t.len(), 6);
        assert!(t.verify());
    }

    #[test]
    fn test_table_rejects_duplicates() {
        let mut t: KeyTable<&'static str, _> =
            KeyTable::allocate(4, std::collections::hash_map::RandomState::new()).unwrap();
        assert!(t.insert("a", 0).is_ok());
        // Same key, different index.
        assert_eq!(t.insert("a", 1), Err("a"));
        // Different key, same index.
        assert_eq!(t.insert("b", 0), Err("b"));
        // Index out of range.
        assert_eq!(t.insert("c", 4), Err("c"));
        assert_eq!(t.len(), 1);
        assert!(t.verify());
    }

    #[test]
    fn test_table_collisions_survive_removal() {
        let state = CollideState::default();
        assert_eq!(state.hash_one(1u32), state.hash_one(2u32));

        let mut t: KeyTable<u32, CollideState> = KeyTable::allocate(6, state).unwrap();
        for i in 0..6 {
            assert!(t.insert(i, 5 - i as usize).is_ok());
        }
        assert!(t.verify());

        // Punch holes at the front of the chain, the tail must stay reachable.
        assert_eq!(t.remove_index(5), Some(0));
        assert_eq!(t.remove_index(3), Some(2));
        assert!(t.verify());
        assert_eq!(t.lookup(&5), Some(0));
        assert_eq!(t.lookup(&0), None);

        // Holes are reused.
        assert!(t.insert(100, 5).is_ok());
        assert!(t.insert(200, 3).is_ok());
        assert!(t.verify());
        for (k, i) in [(1, 4), (3, 2), (4, 1), (5, 0), (100, 5), (200, 3)] {
            assert_eq!(t.lookup(&k), Some(i));
        }

        for k in [1, 3, 4, 5, 100, 200] {
            let i = t.lookup(&k).unwrap();
            assert_eq!(t.remove_index(i), Some(k));
        }
        assert_eq!(t.len(), 0);
        assert!(t.verify());
    }

    #[test]
    fn test_table_churn_keeps_chains_bounded() {
        let mut t: KeyTable<u64, CollideState> =
            KeyTable::allocate(4, CollideState::default()).unwrap();
        for round in 0..1000u64 {
            let idx = (round % 4) as usize;
            if t.has_index(idx) {
                assert!(t.remove_index(idx).is_some());
            }
            assert!(t.insert(round, idx).is_ok());
            assert!(t.verify());
        }
        assert_eq!(t.len(), 4);
    }
}
