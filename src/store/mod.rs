mod memory_store;
#[cfg(feature = "redis")]
mod redis_store;
mod script;
mod traits;

pub use memory_store::MemoryStore;
#[cfg(feature = "redis")]
pub use redis_store::RedisStore;
pub use script::{NativeBody, Script, parse_arg};
pub use traits::{ScoredSet, WindowStore};
