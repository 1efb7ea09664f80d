pub mod disk;
pub mod memory;

pub use disk::DiskRateStore;
pub use memory::MemoryRateStore;
