//! Local adapters: in-process, filesystem and Redis implementations.

pub mod events;
pub mod framefile;
pub mod fs;
pub mod memory;

#[cfg(feature = "api")]
pub mod http;

#[cfg(feature = "redis")]
pub mod redis;

pub use events::EventHub;
pub use framefile::FrameFileContainer;
pub use fs::MountedStorage;
pub use memory::MemoryStore;

#[cfg(feature = "redis")]
pub use redis::RedisPool;
