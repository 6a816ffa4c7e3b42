//! The building blocks of a `DoubleMap`. Each of these is only consistent
//! with the others when driven through the map, so none of them are exposed.

pub(crate) mod arena;
pub(crate) mod table;
