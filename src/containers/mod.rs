//! Containers Module
//!
//! Typed hash map, sorted map and queue operations over a [`Backend`].
//!
//! [`Backend`]: crate::backend::Backend

mod facade;


pub use facade::ContainerFacade;

// == Operation Names ==
// Reported in retry traces, RetryFailed events and InvalidKey errors.
pub const OP_SET_HASH_MAP: &str = "SetHashMap";
pub const OP_GET_HASH_MAP: &str = "GetHashMap";
pub const OP_SET_SORTED_MAP: &str = "SetSortedMap";
pub const OP_SORTED_MAP_SIZE: &str = "SortedMapSize";
pub const OP_RANGE_SORTED_MAP: &str = "RangeSortedMap";
pub const OP_TRIM_SORTED_MAP: &str = "TrimSortedMap";
pub const OP_ENQUEUE: &str = "EnqueueQueue";
pub const OP_DEQUEUE: &str = "DequeueQueue";
pub const OP_QUEUE_LENGTH: &str = "QueueLength";
