use thiserror::Error;

/// Why a `DoubleMap` could not be constructed.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationFailure {
    /// The requested capacity is zero, or not below 4096.
    #[error("capacity {0} is outside the supported range 1..4096")]
    InvalidCapacity(usize),
    /// The bare value is zero sized, or not below 4096 bytes.
    #[error("bare value size {0} is outside the supported range 1..4096 bytes")]
    InvalidValueSize(usize),
    /// The allocator refused to reserve the arena or key tables.
    #[error("memory for the map could not be reserved")]
    OutOfMemory,
    /// A sample value did not survive `extract` followed by `pack`.
    #[error("sample value {0} is not rebuilt by pack after extract")]
    BrokenPacking(usize),
}

/// Errors returned by `DoubleMap` operations. Whenever one of these is
/// returned the map is exactly as it was before the call.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoubleMapError {
    /// Construction failed.
    #[error("allocation failed: {0}")]
    AllocationFailure(#[from] AllocationFailure),
    /// `put` on a map that already holds `capacity` entries.
    #[error("map is full with {capacity} entries")]
    CapacityExceeded {
        /// The fixed capacity of the map.
        capacity: usize,
    },
    /// The index does not address a slot of this map.
    #[error("index {index} is outside the map capacity {capacity}")]
    IndexOutOfRange {
        /// The offending index.
        index: usize,
        /// The fixed capacity of the map.
        capacity: usize,
    },
    /// `put` on a slot that already holds a value.
    #[error("index {0} is already occupied")]
    IndexOccupied(usize),
    /// A read or erase of a slot that holds no value.
    #[error("index {0} is not occupied")]
    IndexFree(usize),
    /// A batch erase that names the same slot more than once.
    #[error("index {0} is listed more than once")]
    DuplicateIndex(usize),
    /// `put` of a value whose first key is already present.
    #[error("first key is already present in the map")]
    DuplicateKey1,
    /// `put` of a value whose second key is already present.
    #[error("second key is already present in the map")]
    DuplicateKey2,
}

impl DoubleMapError {
    /// True for errors caused by calling an operation in a state its contract
    /// forbids. These indicate a caller bug rather than a runtime condition.
    pub fn is_precondition_violation(&self) -> bool {
        matches!(
            self,
            DoubleMapError::IndexOutOfRange { .. }
                | DoubleMapError::IndexOccupied(_)
                | DoubleMapError::IndexFree(_)
                | DoubleMapError::DuplicateIndex(_)
                | DoubleMapError::DuplicateKey1
                | DoubleMapError::DuplicateKey2
        )
    }
}
