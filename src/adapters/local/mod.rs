//! Local adapters for monolith deployment.

pub mod fs;
pub mod http;
pub mod redis;

pub use fs::FsAdapter;
pub use http::{router, AppState};
pub use redis::RedisPool;
