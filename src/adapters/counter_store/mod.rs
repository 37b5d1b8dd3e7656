//! Counter store adapters.
//!
//! - `InMemoryCounterStore` - process-local, for tests and single-instance use
//! - `RedisCounterStore` - shared across instances

mod in_memory;
mod redis;

pub use in_memory::InMemoryCounterStore;
pub use redis::RedisCounterStore;
