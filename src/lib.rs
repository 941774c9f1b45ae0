// Supporting modules
pub mod config;
pub mod error;
pub mod metrics;

// Template cache
pub mod template;

// Background tasks
pub mod tasks;

pub use crate::config::{CacheConfig, Settings, TimeUnit, UnresolvedPolicy};
pub use crate::error::{TemplateError, TemplateResult};
pub use crate::template::{ParamMap, TemplateService};
