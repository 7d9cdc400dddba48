mod caller_id;
mod command;
mod error;
mod mapped_region;
mod np_config;
mod np_heap;
mod object_key;
mod object_lock;
mod object_record;
mod object_registry;
mod storage;
mod util;

#[cfg(test)]
mod test;

pub use crate::caller_id::CallerId;
pub use crate::command::{dispatch, NPHeapCmd, Operation, TransportFault, CMD_SIZE};
pub use crate::error::HeapError;
pub use crate::mapped_region::MappedRegion;
pub use crate::np_heap::NPHeap;
pub use crate::object_key::ObjectKey;
pub use np_config::NPConfig;
pub mod modules;
