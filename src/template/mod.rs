//! Template cache.
//!
//! This module provides:
//! - Loaders that read raw template text (filesystem, in-memory)
//! - `${name}` substitution with bounded, cycle-safe nesting
//! - A generational store that evicts templates left untouched for a purge interval
//! - `TemplateService`, the facade tying them together
//!
//! # Example
//!
//! ```ignore
//! let config = CacheConfig::auto_purge(10, TimeUnit::Minutes);
//! let service = TemplateService::from_files(config)?;
//!
//! let mut params = ParamMap::new();
//! params.insert("name".to_string(), "World".to_string());
//!
//! // Loads templates/hello.txt once, then serves it from the cache
//! let rendered = service.render("templates/hello.txt", &params).await?;
//!
//! service.shutdown().await;
//! ```

mod loader;
mod service;
mod store;
mod substitution;
mod types;

pub use loader::{FileLoader, MemoryLoader, TemplateLoader};
pub use service::TemplateService;
pub use store::TemplateStore;
pub use substitution::{params_from_json, Substitutor};
pub use types::{ParamMap, StoreSnapshot, StoreStats, SweepReport, TemplateEntry};
