//! Template rendering facade

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use crate::config::CacheConfig;
use crate::error::{TemplateError, TemplateResult};
use crate::metrics::{CacheMetrics, LoadOutcome};
use crate::tasks::PurgeScheduler;

use super::loader::{FileLoader, TemplateLoader};
use super::store::TemplateStore;
use super::substitution::{params_from_json, Substitutor};
use super::types::{ParamMap, StoreStats, SweepReport};

/// Loads, caches and renders templates.
///
/// Construct one per process with an explicit [`CacheConfig`] and share it
/// by reference (or `Arc`). Each construction is fully independent.
pub struct TemplateService {
    config: CacheConfig,
    store: Arc<TemplateStore>,
    loader: Arc<dyn TemplateLoader>,
    substitutor: Substitutor,
    scheduler: Mutex<Option<PurgeScheduler>>,
}

impl TemplateService {
    /// Create a service backed by `loader`.
    ///
    /// With `auto_purge` enabled this spawns the purge task, so it must be
    /// called from within a tokio runtime.
    pub fn new(config: CacheConfig, loader: Arc<dyn TemplateLoader>) -> TemplateResult<Self> {
        let store = Arc::new(TemplateStore::new());

        let scheduler = if config.auto_purge {
            Some(PurgeScheduler::start(store.clone(), config.purge_period())?)
        } else {
            None
        };

        tracing::info!(
            loader = loader.name(),
            auto_purge = config.auto_purge,
            purge_interval_ms = config.purge_period().as_millis() as u64,
            "Template service initialized"
        );

        Ok(Self {
            substitutor: Substitutor::from_config(&config),
            config,
            store,
            loader,
            scheduler: Mutex::new(scheduler),
        })
    }

    /// Create a service that reads templates from the filesystem
    pub fn from_files(config: CacheConfig) -> TemplateResult<Self> {
        Self::new(config, Arc::new(FileLoader::new()))
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// The backing store
    pub fn store(&self) -> &TemplateStore {
        &self.store
    }

    /// Render template `id` with `params`.
    ///
    /// A template that is missing or cannot be read yields `NotFound` and is
    /// not cached, so the next call retries the load.
    pub async fn render(&self, id: &str, params: &ParamMap) -> TemplateResult<String> {
        let start = Instant::now();
        let result = self.render_inner(id, params).await;
        CacheMetrics::record_render_latency(start.elapsed().as_secs_f64());
        result
    }

    /// Render with parameters given as a JSON object
    pub async fn render_json(
        &self,
        id: &str,
        variables: &serde_json::Value,
    ) -> TemplateResult<String> {
        let params = params_from_json(variables)?;
        self.render(id, &params).await
    }

    async fn render_inner(&self, id: &str, params: &ParamMap) -> TemplateResult<String> {
        if let Some(entry) = self.store.get(id) {
            CacheMetrics::record_hit();
            tracing::debug!(template_id = %id, "Template cache hit");
            return self.substitutor.substitute(entry.text(), params);
        }

        CacheMetrics::record_miss();

        // Load outside the store lock
        let text = match self.loader.load(id).await {
            Ok(Some(text)) => {
                CacheMetrics::record_load(LoadOutcome::Loaded);
                text
            }
            Ok(None) => {
                CacheMetrics::record_load(LoadOutcome::NotFound);
                tracing::debug!(template_id = %id, loader = self.loader.name(), "Template not found");
                return Err(TemplateError::NotFound(id.to_string()));
            }
            Err(e) => {
                CacheMetrics::record_load(LoadOutcome::Error);
                tracing::warn!(
                    template_id = %id,
                    loader = self.loader.name(),
                    error = %e,
                    "Template load failed, reporting as not found"
                );
                return Err(TemplateError::NotFound(id.to_string()));
            }
        };

        let entry = self.store.put(id, text);
        tracing::debug!(template_id = %id, bytes = entry.text().len(), "Template cached");

        self.substitutor.substitute(entry.text(), params)
    }

    /// Drop a cached template so the next render reloads it
    pub fn invalidate(&self, id: &str) -> bool {
        self.store.remove(id)
    }

    /// Run a sweep cycle immediately
    pub fn purge_now(&self) -> SweepReport {
        self.store.sweep()
    }

    pub fn stats(&self) -> StoreStats {
        self.store.stats()
    }

    /// Whether the background purge task is running
    pub fn is_auto_purging(&self) -> bool {
        self.scheduler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Stop the background purge task, if any.
    ///
    /// Once this returns no further sweep runs. Later calls are no-ops.
    pub async fn shutdown(&self) {
        let scheduler = self
            .scheduler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(scheduler) = scheduler {
            scheduler.shutdown().await;
            tracing::info!("Template service purge stopped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{TimeUnit, UnresolvedPolicy};
    use crate::metrics::LOADS_TOTAL;
    use crate::template::MemoryLoader;
    use async_trait::async_trait;
    use lazy_static::lazy_static;
    use serde_json::json;
    use std::time::Duration;

    lazy_static! {
        /// Serializes tests that assert on the process-wide load counters
        static ref LOAD_COUNTERS: tokio::sync::Mutex<()> = tokio::sync::Mutex::new(());
    }

    fn load_count(outcome: &str) -> u64 {
        LOADS_TOTAL.with_label_values(&[outcome]).get()
    }

    fn service_with(loader: Arc<MemoryLoader>) -> TemplateService {
        TemplateService::new(CacheConfig::default(), loader).unwrap()
    }

    fn params(pairs: &[(&str, &str)]) -> ParamMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    /// Fails every load with an I/O error
    struct BrokenLoader;

    #[async_trait]
    impl TemplateLoader for BrokenLoader {
        async fn load(&self, id: &str) -> TemplateResult<Option<String>> {
            Err(TemplateError::load(
                id,
                std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
            ))
        }

        fn name(&self) -> &'static str {
            "broken"
        }
    }

    #[tokio::test]
    async fn test_render_round_trip() {
        let loader = Arc::new(MemoryLoader::new().with_template("hello", "Hello ${name}"));
        let service = service_with(loader);

        let rendered = service
            .render("hello", &params(&[("name", "World")]))
            .await
            .unwrap();
        assert_eq!(rendered, "Hello World");
    }

    #[tokio::test]
    async fn test_cache_hit_loads_once() {
        let loader = Arc::new(MemoryLoader::new().with_template("hello", "Hello ${name}"));
        let service = service_with(loader.clone());

        let first = service.render("hello", &params(&[("name", "A")])).await.unwrap();
        let second = service.render("hello", &params(&[("name", "B")])).await.unwrap();

        assert_eq!(first, "Hello A");
        assert_eq!(second, "Hello B");
        assert_eq!(loader.load_count(), 1);
    }

    #[tokio::test]
    async fn test_missing_template_never_cached() {
        let _guard = LOAD_COUNTERS.lock().await;
        let not_found_before = load_count("not_found");
        let errors_before = load_count("error");

        let loader = Arc::new(MemoryLoader::new());
        let service = service_with(loader.clone());

        for _ in 0..3 {
            let err = service.render("ghost", &ParamMap::new()).await.unwrap_err();
            assert!(err.is_not_found());
        }

        assert!(!service.store().contains("ghost"));
        assert_eq!(loader.load_count(), 3);
        assert_eq!(load_count("not_found"), not_found_before + 3);
        assert_eq!(load_count("error"), errors_before);
    }

    #[tokio::test]
    async fn test_load_error_reported_as_not_found() {
        let _guard = LOAD_COUNTERS.lock().await;
        let not_found_before = load_count("not_found");
        let errors_before = load_count("error");

        let service = TemplateService::new(CacheConfig::default(), Arc::new(BrokenLoader)).unwrap();

        let err = service.render("locked", &ParamMap::new()).await.unwrap_err();
        assert!(matches!(err, TemplateError::NotFound(ref id) if id == "locked"));
        assert!(service.store().is_empty());

        // Telemetry keeps read failures apart from genuine absence
        assert_eq!(load_count("error"), errors_before + 1);
        assert_eq!(load_count("not_found"), not_found_before);
    }

    #[tokio::test]
    async fn test_failed_load_is_retried() {
        let _guard = LOAD_COUNTERS.lock().await;
        let loader = Arc::new(MemoryLoader::new());
        let service = service_with(loader.clone());

        assert!(service.render("later", &ParamMap::new()).await.is_err());

        loader.insert("later", "now here");
        let rendered = service.render("later", &ParamMap::new()).await.unwrap();
        assert_eq!(rendered, "now here");
    }

    #[tokio::test]
    async fn test_unresolved_placeholder_kept() {
        let loader = Arc::new(MemoryLoader::new().with_template("hi", "Hi ${missing}"));
        let service = service_with(loader);

        let rendered = service.render("hi", &ParamMap::new()).await.unwrap();
        assert_eq!(rendered, "Hi ${missing}");
    }

    #[tokio::test]
    async fn test_strict_mode_fails_but_keeps_cache() {
        let loader = Arc::new(MemoryLoader::new().with_template("hi", "Hi ${missing}"));
        let config = CacheConfig {
            unresolved: UnresolvedPolicy::Error,
            ..Default::default()
        };
        let service = TemplateService::new(config, loader.clone()).unwrap();

        let err = service.render("hi", &ParamMap::new()).await.unwrap_err();
        assert!(matches!(err, TemplateError::UnresolvedPlaceholder(_)));
        assert!(service.store().contains("hi"));

        let rendered = service
            .render("hi", &params(&[("missing", "there")]))
            .await
            .unwrap();
        assert_eq!(rendered, "Hi there");
        assert_eq!(loader.load_count(), 1);
    }

    #[tokio::test]
    async fn test_render_json() {
        let loader = Arc::new(
            MemoryLoader::new().with_template("order", "Order ${order_id} x${count}"),
        );
        let service = service_with(loader);

        let rendered = service
            .render_json("order", &json!({"order_id": "ORD-1", "count": 3}))
            .await
            .unwrap();
        assert_eq!(rendered, "Order ORD-1 x3");

        assert!(matches!(
            service.render_json("order", &json!("nope")).await,
            Err(TemplateError::InvalidParams(_))
        ));
    }

    #[tokio::test]
    async fn test_invalidate_forces_reload() {
        let loader = Arc::new(MemoryLoader::new().with_template("t", "v1"));
        let service = service_with(loader.clone());

        assert_eq!(service.render("t", &ParamMap::new()).await.unwrap(), "v1");
        loader.insert("t", "v2");
        assert_eq!(service.render("t", &ParamMap::new()).await.unwrap(), "v1");

        assert!(service.invalidate("t"));
        assert_eq!(service.render("t", &ParamMap::new()).await.unwrap(), "v2");
        assert_eq!(loader.load_count(), 2);
    }

    #[tokio::test]
    async fn test_manual_purge_without_scheduler() {
        let loader = Arc::new(MemoryLoader::new().with_template("t", "x"));
        let service = service_with(loader.clone());
        assert!(!service.is_auto_purging());

        service.render("t", &ParamMap::new()).await.unwrap();
        service.purge_now();
        service.purge_now();

        assert!(!service.store().contains("t"));
        assert_eq!(service.stats().sweeps, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_generational_eviction() {
        let loader = Arc::new(
            MemoryLoader::new()
                .with_template("idle", "idle")
                .with_template("busy", "busy"),
        );
        let config = CacheConfig::auto_purge(10, TimeUnit::Seconds);
        let service = TemplateService::new(config, loader.clone()).unwrap();
        assert!(service.is_auto_purging());

        service.render("idle", &ParamMap::new()).await.unwrap();
        service.render("busy", &ParamMap::new()).await.unwrap();

        // First sweep at 10s
        tokio::time::sleep(Duration::from_secs(15)).await;
        assert!(service.store().contains("idle"));
        service.render("busy", &ParamMap::new()).await.unwrap();

        // Second sweep at 20s
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(!service.store().contains("idle"));
        assert!(service.store().contains("busy"));
        assert_eq!(loader.load_count(), 2);

        // Third sweep at 30s
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(!service.store().contains("busy"));

        service.shutdown().await;
        assert!(!service.is_auto_purging());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_sweeps_and_is_repeatable() {
        let loader = Arc::new(MemoryLoader::new().with_template("t", "x"));
        let config = CacheConfig::auto_purge(1, TimeUnit::Seconds);
        let service = TemplateService::new(config, loader).unwrap();

        tokio::time::sleep(Duration::from_millis(2_500)).await;
        service.shutdown().await;
        service.shutdown().await;

        let sweeps = service.stats().sweeps;
        assert_eq!(sweeps, 2);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(service.stats().sweeps, sweeps);
    }

    #[tokio::test]
    async fn test_independent_instances() {
        let loader = Arc::new(MemoryLoader::new().with_template("t", "x"));
        let plain = service_with(loader.clone());
        let purging =
            TemplateService::new(CacheConfig::auto_purge(5, TimeUnit::Minutes), loader).unwrap();

        assert!(!plain.is_auto_purging());
        assert!(purging.is_auto_purging());
        assert_eq!(purging.config().purge_period(), Duration::from_secs(300));

        plain.render("t", &ParamMap::new()).await.unwrap();
        assert!(plain.store().contains("t"));
        assert!(!purging.store().contains("t"));

        purging.shutdown().await;
    }

    #[test]
    fn test_auto_purge_requires_runtime() {
        let result = TemplateService::new(
            CacheConfig::auto_purge(1, TimeUnit::Seconds),
            Arc::new(MemoryLoader::new()),
        );
        assert!(matches!(result, Err(TemplateError::Runtime(_))));
    }
}
