pub mod SharedMemory;
pub mod region;

pub use SharedMemory::{
    attach_shared_memory, create_shared_memory, heap_memory, HeapMemory, RawHandle,
    SharedMemoryBackend,
};
