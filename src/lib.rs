//! dmap - Fixed capacity double keyed maps
//!
//! A `DoubleMap` stores values that each embed two independent keys, for
//! example a flow record keyed by both its internal and its external
//! endpoint. Either key resolves to the value in `O(1)` expected time, and
//! both keys are kept unique across the map.
//!
//! The map is built for packet processing data planes, where memory and
//! latency must be predictable:
//!
//! * All memory is reserved once, when the map is built. No operation
//!   allocates afterwards, and the map never resizes or rehashes.
//! * The caller chooses the slot index for each value, so slot indices can
//!   double as handles into the caller's own free lists or expiry queues.
//! * Every operation either fully succeeds or returns an error with the map
//!   untouched.
//!
//! Values describe how to split off and restore their keys by implementing
//! [`DoubleKeyed`]. Only the bare value is kept in the slot arena, and keys
//! live once, in the key tables.
//!
//! # Features
//!
//! * `foldhash` - hash keys with the foldhash crate (default)
//! * `ahash` - hash keys with the cpu accelerated ahash crate
//! * `dhat-heap` - enable the heap profiling tests
//!
//! With neither hashing feature, the std `RandomState` is used.

#![warn(unused_extern_crates)]
#![warn(missing_docs)]

// Storage and index resolution behind the map. Not public, the map is the
// only thing allowed to mutate these.
mod internals;

pub mod dmap;

pub use crate::dmap::{
    check_round_trip, AllocationFailure, DefaultHashBuilder, DoubleKeyed, DoubleMap,
    DoubleMapBuilder, DoubleMapError, MAX_CAPACITY, MAX_VALUE_SIZE,
};
