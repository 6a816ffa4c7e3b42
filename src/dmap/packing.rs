//! The contract that splits a full value into its two keys and a bare body,
//! and puts them back together.

use std::hash::Hash;

/// A value that embeds two independent keys.
///
/// A `DoubleMap` never stores the keys twice. On `put` the value is split
/// with [`extract`](DoubleKeyed::extract): the keys go to the two key tables
/// and only the bare body goes to the slot arena. On read the full value is
/// rebuilt with [`pack`](DoubleKeyed::pack).
///
/// Both functions must be pure and deterministic, and `pack` must be the left
/// inverse of `extract`:
///
/// ```
/// use dmap::DoubleKeyed;
///
/// #[derive(Clone, Debug, PartialEq)]
/// struct Flow {
///     src: u32,
///     dst: u32,
///     packets: u64,
/// }
///
/// impl DoubleKeyed for Flow {
///     type Key1 = u32;
///     type Key2 = u32;
///     type Bare = u64;
///
///     fn extract(self) -> (u32, u32, u64) {
///         (self.src, self.dst, self.packets)
///     }
///
///     fn pack(packets: u64, src: u32, dst: u32) -> Self {
///         Flow { src, dst, packets }
///     }
/// }
///
/// let f = Flow { src: 1, dst: 2, packets: 10 };
/// assert!(dmap::check_round_trip(&f));
/// ```
pub trait DoubleKeyed: Sized {
    /// The first key, resolved through the first key table.
    type Key1: Hash + Eq + Clone;
    /// The second key, resolved through the second key table.
    type Key2: Hash + Eq + Clone;
    /// The value with both keys stripped, as held in the slot arena.
    type Bare: Clone;

    /// Split a full value into its keys and bare body.
    fn extract(self) -> (Self::Key1, Self::Key2, Self::Bare);

    /// Rebuild the full value from a bare body and the keys that were
    /// extracted from it.
    fn pack(bare: Self::Bare, k1: Self::Key1, k2: Self::Key2) -> Self;
}

/// Check the packing law `pack(extract(v)) == v` for one value. Useful to
/// validate an implementation against sample values before building a map.
pub fn check_round_trip<V>(v: &V) -> bool
where
    V: DoubleKeyed + Clone + PartialEq,
{
    let (k1, k2, bare) = v.clone().extract();
    V::pack(bare, k1, k2) == *v
}
