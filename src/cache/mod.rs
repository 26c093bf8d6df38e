//! Cache module - named, typed caches backed by Moka.
//!
//! - `CacheRegistry` - Central registry holding all named caches
//! - `TypedCache` - Cheap-to-clone handle to one cache
//!
//! Only read-mostly data is cached (language preferences). Quota state is
//! never cached: every admission goes to the database.

mod config;
mod registry;
mod typed;

pub use config::CacheConfig;
pub use registry::CacheRegistry;
pub use typed::TypedCache;
