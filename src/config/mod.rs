mod settings;

pub use settings::{CacheConfig, Settings, TimeUnit, UnresolvedPolicy};
