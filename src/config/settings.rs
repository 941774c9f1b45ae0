use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};
use serde::Deserialize;
use std::env;
use std::time::Duration;

use crate::error::TemplateResult;

/// Interval applied when a non-positive purge interval is configured
const DEFAULT_PURGE_INTERVAL: i64 = 60;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub cache: CacheConfig,
}

/// Unit in which `purge_interval` is expressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Nanoseconds,
    Microseconds,
    Milliseconds,
    Seconds,
    #[default]
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    /// Convert `amount` of this unit into a `Duration`
    pub fn duration(self, amount: u64) -> Duration {
        match self {
            TimeUnit::Nanoseconds => Duration::from_nanos(amount),
            TimeUnit::Microseconds => Duration::from_micros(amount),
            TimeUnit::Milliseconds => Duration::from_millis(amount),
            TimeUnit::Seconds => Duration::from_secs(amount),
            TimeUnit::Minutes => Duration::from_secs(amount.saturating_mul(60)),
            TimeUnit::Hours => Duration::from_secs(amount.saturating_mul(3_600)),
            TimeUnit::Days => Duration::from_secs(amount.saturating_mul(86_400)),
        }
    }
}

/// What to do with a `${name}` whose name has no parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnresolvedPolicy {
    /// Leave the placeholder verbatim
    #[default]
    Keep,
    /// Replace the placeholder with an empty string
    Empty,
    /// Fail the render with `UnresolvedPlaceholder`
    Error,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Run the background generational purge
    #[serde(default)]
    pub auto_purge: bool,
    /// Purge period, in `unit`; non-positive values fall back to 60
    #[serde(default = "default_purge_interval")]
    pub purge_interval: i64,
    #[serde(default)]
    pub unit: TimeUnit,
    /// How many times substituted values are rescanned for placeholders
    #[serde(default = "default_max_substitution_depth")]
    pub max_substitution_depth: usize,
    #[serde(default)]
    pub unresolved: UnresolvedPolicy,
}

fn default_purge_interval() -> i64 {
    DEFAULT_PURGE_INTERVAL
}

fn default_max_substitution_depth() -> usize {
    2
}

impl CacheConfig {
    /// Config with auto-purge enabled at the given period
    pub fn auto_purge(purge_interval: i64, unit: TimeUnit) -> Self {
        Self {
            auto_purge: true,
            purge_interval,
            unit,
            ..Default::default()
        }
    }

    /// Effective sweep period after coercing non-positive intervals
    pub fn purge_period(&self) -> Duration {
        let interval = if self.purge_interval <= 0 {
            DEFAULT_PURGE_INTERVAL
        } else {
            self.purge_interval
        };
        self.unit.duration(interval as u64)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            auto_purge: false,
            purge_interval: default_purge_interval(),
            unit: TimeUnit::default(),
            max_substitution_depth: default_max_substitution_depth(),
            unresolved: UnresolvedPolicy::default(),
        }
    }
}

impl Settings {
    pub fn new() -> TemplateResult<Self> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            .add_source(Self::environment());

        Self::from_builder(builder)
    }

    /// TEMPLATE_CACHE__AUTO_PURGE, TEMPLATE_CACHE__PURGE_INTERVAL, TEMPLATE_CACHE__UNIT, ...
    fn environment() -> Environment {
        Environment::with_prefix("TEMPLATE")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
    }

    fn from_builder(builder: ConfigBuilder<DefaultState>) -> TemplateResult<Self> {
        let settings = builder
            .set_default("cache.auto_purge", false)?
            .set_default("cache.purge_interval", DEFAULT_PURGE_INTERVAL)?
            .set_default("cache.unit", "minutes")?
            .build()?
            .try_deserialize()?;

        Ok(settings)
    }
}
