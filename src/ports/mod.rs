pub mod cache_store;
pub mod http_client;
pub mod http_server;
pub mod kv_store;
