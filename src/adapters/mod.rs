pub mod http_client;
pub mod http_handler;
pub mod memory_cache;
pub mod memory_kv;
pub mod middleware;

pub use http_client::HttpClientAdapter;
pub use http_handler::{EdgeHandler, build_router};
pub use memory_cache::InMemoryCacheStore;
pub use memory_kv::InMemoryKvStore;
