pub mod cache;
pub mod catalog;
pub mod memory;
pub mod postgres;

pub use cache::create_redis_client;
pub use cache::Cache;
pub use cache::CacheKey;
pub use catalog::{CatalogStore, Predicate, TourFilter};
pub use memory::InMemoryCatalog;
pub use postgres::{create_pool, PgCatalog};
