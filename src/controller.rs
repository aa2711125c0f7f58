//! Offline cache controller: install, activate, then intercept fetches cache-first.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::{StreamExt, stream};
use reqwest::{StatusCode, Url};
use tokio_util::task::TaskTracker;

use crate::config::CacheConfig;
use crate::error::{Error, Result};
use crate::http::{Request, RequestKey, Response};
use crate::network::Fetcher;
use crate::route::{FetchOutcome, Route, classify};
use crate::storage::CacheStorage;

/// Lifecycle phase of a controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Constructed, nothing done yet.
    Parsed,
    /// Precache in progress.
    Installing,
    /// Precache finished (successfully or not); waiting to activate.
    Installed,
    /// Deleting stale stores.
    Activating,
    /// Controlling clients and intercepting fetches.
    Activated,
}

/// Trait for receiving controller notifications.
///
/// All methods have default no-op implementations.
pub trait CacheEvents: Send + Sync {
    /// Called when installation starts fetching `total` resources.
    fn on_install_start(&self, _store: &str, _total: usize) {}

    /// Called when a precache resource has been stored.
    fn on_precached(&self, _url: &str) {}

    /// Called when a precache resource could not be fetched or stored.
    fn on_precache_failed(&self, _url: &str, _error: &str) {}

    /// Called when a stale store has been deleted during activation.
    fn on_store_deleted(&self, _store: &str) {}

    /// Called once the controller starts intercepting fetches.
    fn on_clients_claimed(&self) {}

    /// Called when an image request is left to the network.
    fn on_bypass(&self, _url: &Url) {}

    /// Called when a request is answered from the store.
    fn on_hit(&self, _url: &Url) {}

    /// Called when a request missed the store and the network answered.
    fn on_miss(&self, _url: &Url, _status: StatusCode) {}

    /// Called when a background cache write completes.
    fn on_stored(&self, _url: &Url) {}

    /// Called when the network could not be reached.
    fn on_network_error(&self, _url: &Url, _error: &str) {}

    /// Called after a failed network request; `served` is whether the
    /// offline page was returned.
    fn on_fallback(&self, _url: &Url, _served: bool) {}
}

/// A null observer that ignores all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEvents;

impl CacheEvents for NoEvents {}

/// A precache entry that did not make it into the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallFailure {
    /// Entry as written in the precache list.
    pub url: String,
    /// Human-readable cause.
    pub reason: String,
}

/// Result of the install phase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallReport {
    /// Store the resources were written to.
    pub store: String,
    /// Entries stored successfully.
    pub cached: Vec<String>,
    /// Entries that failed.
    pub failed: Vec<InstallFailure>,
}

impl InstallReport {
    /// Whether every precache entry was stored.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Result of the activate phase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivationReport {
    /// Stale stores that were deleted.
    pub deleted: Vec<String>,
    /// Whether the controller took control of clients.
    pub clients_claimed: bool,
}

/// Result of [`CacheController::register`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    /// Install report, or `None` when the store for this version already existed.
    pub install: Option<InstallReport>,
    /// Activation report.
    pub activation: ActivationReport,
}

#[derive(Debug)]
struct Lifecycle {
    phase: Phase,
    skip_waiting: bool,
    controlling: bool,
}

/// Cache-first fetch interceptor over a versioned store.
///
/// Shared across concurrent requests behind an `Arc`; lifecycle state sits
/// behind a mutex that is never held across an await.
pub struct CacheController<S: CacheStorage + 'static, F: Fetcher> {
    config: CacheConfig,
    store: String,
    origin: Url,
    storage: Arc<S>,
    fetcher: F,
    events: Arc<dyn CacheEvents>,
    lifecycle: Mutex<Lifecycle>,
    writes: TaskTracker,
}

impl<S: CacheStorage + 'static, F: Fetcher> CacheController<S, F> {
    /// Creates a controller for the configured version.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration does not validate.
    pub fn new(config: CacheConfig, storage: Arc<S>, fetcher: F) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store: config.store_name(),
            origin: config.origin_url()?,
            config,
            storage,
            fetcher,
            events: Arc::new(NoEvents),
            lifecycle: Mutex::new(Lifecycle {
                phase: Phase::Parsed,
                skip_waiting: false,
                controlling: false,
            }),
            writes: TaskTracker::new(),
        })
    }

    /// Replaces the event observer.
    #[must_use]
    pub fn with_events(mut self, events: Arc<dyn CacheEvents>) -> Self {
        self.events = events;
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Name of the current store.
    #[must_use]
    pub fn store_name(&self) -> &str {
        &self.store
    }

    /// Site origin.
    #[must_use]
    pub const fn origin(&self) -> &Url {
        &self.origin
    }

    /// Returns the underlying storage.
    #[must_use]
    pub const fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    /// Returns the underlying fetcher.
    #[must_use]
    pub const fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Current lifecycle phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.lifecycle().phase
    }

    /// Whether installation asked to take over without waiting.
    #[must_use]
    pub fn skip_waiting_requested(&self) -> bool {
        self.lifecycle().skip_waiting
    }

    /// Whether fetches are being intercepted.
    #[must_use]
    pub fn is_controlling(&self) -> bool {
        self.lifecycle().controlling
    }

    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn transition(&self, expected: Phase, next: Phase) -> Result<()> {
        let mut lifecycle = self.lifecycle();
        if lifecycle.phase != expected {
            return Err(Error::Lifecycle {
                expected,
                actual: lifecycle.phase,
            });
        }
        lifecycle.phase = next;
        Ok(())
    }

    /// Fetches one precache entry and stores it.
    async fn precache_one(&self, entry: &str) -> Result<()> {
        let url = self.config.resolve(entry)?;
        let response = self.fetcher.fetch(&Request::get(url.clone())).await?;
        if !response.is_ok() {
            return Err(Error::UnexpectedStatus {
                url: url.to_string(),
                status: response.status,
            });
        }
        self.storage
            .put(&self.store, &RequestKey::get(url), &response)
            .await
    }

    /// Runs the install phase: opens the current store and precaches the
    /// configured resources.
    ///
    /// Fetch failures do not fail the phase; they are logged and listed in
    /// the report, and whatever was fetched stays stored. There is no retry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Lifecycle`] unless the controller is freshly constructed.
    pub async fn install(&self) -> Result<InstallReport> {
        self.transition(Phase::Parsed, Phase::Installing)?;

        let precache = &self.config.precache;
        let mut report = InstallReport {
            store: self.store.clone(),
            ..InstallReport::default()
        };
        self.events.on_install_start(&self.store, precache.len());

        match self.storage.open(&self.store).await {
            Ok(()) => {
                log::info!("Opened cache {}", self.store);
                let results: Vec<_> = stream::iter(precache)
                    .map(|entry| async move { (entry, self.precache_one(entry).await) })
                    .buffer_unordered(self.config.install_concurrency)
                    .collect()
                    .await;

                for (entry, result) in results {
                    match result {
                        Ok(()) => {
                            self.events.on_precached(entry);
                            report.cached.push(entry.clone());
                        }
                        Err(e) => {
                            self.events.on_precache_failed(entry, &e.to_string());
                            report.failed.push(InstallFailure {
                                url: entry.clone(),
                                reason: e.to_string(),
                            });
                        }
                    }
                }
            }
            Err(e) => {
                for entry in precache {
                    self.events.on_precache_failed(entry, &e.to_string());
                    report.failed.push(InstallFailure {
                        url: entry.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        if !report.is_complete() {
            let failed: Vec<_> = report.failed.iter().map(|f| f.url.as_str()).collect();
            log::error!(
                "Cache install failed: {} of {} resources not cached ({})",
                report.failed.len(),
                precache.len(),
                failed.join(", ")
            );
        }

        let mut lifecycle = self.lifecycle();
        lifecycle.phase = Phase::Installed;
        lifecycle.skip_waiting = true;
        Ok(report)
    }

    /// Runs the activate phase: deletes every store except the current one,
    /// then claims clients.
    ///
    /// A store that cannot be listed or deleted is logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Lifecycle`] unless installation has finished.
    pub async fn activate(&self) -> Result<ActivationReport> {
        self.transition(Phase::Installed, Phase::Activating)?;

        let mut report = ActivationReport::default();
        let names = self.storage.keys().await.unwrap_or_else(|e| {
            log::error!("Could not list caches: {e}");
            Vec::new()
        });

        for name in names.into_iter().filter(|n| *n != self.store) {
            log::info!("Deleting old cache: {name}");
            match self.storage.delete(&name).await {
                Ok(_) => {
                    self.events.on_store_deleted(&name);
                    report.deleted.push(name);
                }
                Err(e) => log::error!("Failed to delete cache {name}: {e}"),
            }
        }

        {
            let mut lifecycle = self.lifecycle();
            lifecycle.phase = Phase::Activated;
            lifecycle.controlling = true;
        }
        report.clients_claimed = true;
        self.events.on_clients_claimed();
        Ok(report)
    }

    /// Installs (unless the current store already exists) and activates.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Lifecycle`] if the controller was already used.
    pub async fn register(&self) -> Result<Registration> {
        let installed = self.storage.has(&self.store).await.unwrap_or_else(|e| {
            log::warn!("Could not check for cache {}: {e}", self.store);
            false
        });

        let install = if installed {
            self.transition(Phase::Parsed, Phase::Installed)?;
            self.lifecycle().skip_waiting = true;
            log::debug!("Cache {} already installed", self.store);
            None
        } else {
            Some(self.install().await?)
        };

        let activation = self.activate().await?;
        Ok(Registration {
            install,
            activation,
        })
    }

    /// Decides and performs the handling of one request.
    ///
    /// Requests arriving before activation, and image requests, are
    /// [`FetchOutcome::PassThrough`] and never touch the store. Everything
    /// else is answered cache-first.
    pub async fn handle_fetch(&self, request: &Request) -> FetchOutcome {
        if !self.is_controlling() {
            return FetchOutcome::PassThrough;
        }

        match classify(request) {
            Route::Bypass => {
                self.events.on_bypass(&request.url);
                FetchOutcome::PassThrough
            }
            Route::CacheFirst => FetchOutcome::Intercept(self.cache_first(request).await),
        }
    }

    async fn cache_first(&self, request: &Request) -> Option<Response> {
        let key = request.key();
        match self.storage.lookup(&self.store, &key).await {
            Ok(Some(cached)) => {
                self.events.on_hit(&request.url);
                return Some(cached);
            }
            Ok(None) => {}
            Err(e) => log::warn!("Cache lookup failed for {}: {e}", key.canonical()),
        }

        match self.fetcher.fetch(request).await {
            Ok(response) => {
                self.events.on_miss(&request.url, response.status);
                if response.status == StatusCode::OK {
                    self.store_in_background(key, response.clone());
                }
                Some(response)
            }
            Err(e) => {
                log::warn!("Network request failed for {}: {e}", request.url);
                self.events.on_network_error(&request.url, &e.to_string());
                self.offline_fallback(request).await
            }
        }
    }

    /// Cached fallback page for document requests; nothing for the rest.
    async fn offline_fallback(&self, request: &Request) -> Option<Response> {
        if !request.accepts_html() {
            self.events.on_fallback(&request.url, false);
            return None;
        }

        let fallback = match self.origin.join(&self.config.fallback_page) {
            Ok(url) => RequestKey::get(url),
            Err(e) => {
                log::error!("Invalid fallback page {}: {e}", self.config.fallback_page);
                return None;
            }
        };

        let cached = self
            .storage
            .lookup(&self.store, &fallback)
            .await
            .unwrap_or_else(|e| {
                log::warn!("Fallback lookup failed: {e}");
                None
            });
        self.events.on_fallback(&request.url, cached.is_some());
        cached
    }

    /// Writes a response without making the caller wait for it.
    fn store_in_background(&self, key: RequestKey, response: Response) {
        let storage = Arc::clone(&self.storage);
        let events = Arc::clone(&self.events);
        let store = self.store.clone();
        self.writes.spawn(async move {
            match storage.put(&store, &key, &response).await {
                Ok(()) => events.on_stored(&key.url),
                Err(e) => log::warn!("Cache write failed for {}: {e}", key.canonical()),
            }
        });
    }

    /// Waits for every background cache write spawned so far.
    pub async fn settle(&self) {
        self.writes.close();
        self.writes.wait().await;
        self.writes.reopen();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Destination;
    use crate::storage::MemoryStorage;
    use async_trait::async_trait;
    use reqwest::Method;
    use reqwest::header::{ACCEPT, HeaderValue};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    const ORIGIN: &str = "https://example.org";

    // =========================================================================
    // Test doubles
    // =========================================================================

    /// Scripted network: unknown URLs and offline mode both fail.
    #[derive(Default)]
    struct MockFetcher {
        routes: Mutex<HashMap<String, Response>>,
        calls: Mutex<Vec<String>>,
        offline: AtomicBool,
    }

    impl MockFetcher {
        fn respond(&self, url: &str, status: StatusCode, body: &'static str) {
            self.routes
                .lock()
                .unwrap()
                .insert(url.to_string(), Response::new(status, body));
        }

        fn set_offline(&self, offline: bool) {
            self.offline.store(offline, Ordering::SeqCst);
        }

        fn calls_to(&self, url: &str) -> usize {
            self.calls.lock().unwrap().iter().filter(|u| *u == url).count()
        }

        fn total_calls(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Fetcher for MockFetcher {
        async fn fetch(&self, request: &Request) -> Result<Response> {
            let url = request.url.to_string();
            self.calls.lock().unwrap().push(url.clone());
            if self.offline.load(Ordering::SeqCst) {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    "offline",
                )));
            }
            self.routes.lock().unwrap().get(&url).cloned().ok_or_else(|| {
                Error::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("no route for {url}"),
                ))
            })
        }
    }

    /// Storage wrapper that counts every read and write.
    #[derive(Default)]
    struct CountingStorage {
        inner: MemoryStorage,
        reads: AtomicUsize,
        writes: AtomicUsize,
    }

    impl CountingStorage {
        fn touches(&self) -> usize {
            self.reads.load(Ordering::SeqCst) + self.writes.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CacheStorage for CountingStorage {
        async fn open(&self, store: &str) -> Result<()> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.inner.open(store).await
        }

        async fn has(&self, store: &str) -> Result<bool> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.inner.has(store).await
        }

        async fn keys(&self) -> Result<Vec<String>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.inner.keys().await
        }

        async fn delete(&self, store: &str) -> Result<bool> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.inner.delete(store).await
        }

        async fn lookup(&self, store: &str, key: &RequestKey) -> Result<Option<Response>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.inner.lookup(store, key).await
        }

        async fn put(&self, store: &str, key: &RequestKey, response: &Response) -> Result<()> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.inner.put(store, key, response).await
        }

        async fn entries(&self, store: &str) -> Result<Vec<RequestKey>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.inner.entries(store).await
        }
    }

    /// Observer that records event names.
    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn push(&self, event: String) {
            self.events.lock().unwrap().push(event);
        }

        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }
    }

    impl CacheEvents for Recorder {
        fn on_store_deleted(&self, store: &str) {
            self.push(format!("deleted {store}"));
        }
        fn on_clients_claimed(&self) {
            self.push("claimed".to_string());
        }
        fn on_bypass(&self, url: &Url) {
            self.push(format!("bypass {}", url.path()));
        }
        fn on_hit(&self, url: &Url) {
            self.push(format!("hit {}", url.path()));
        }
        fn on_miss(&self, url: &Url, status: StatusCode) {
            self.push(format!("miss {} {}", url.path(), status.as_u16()));
        }
        fn on_fallback(&self, url: &Url, served: bool) {
            self.push(format!("fallback {} {served}", url.path()));
        }
    }

    type Controller<S> = CacheController<S, Arc<MockFetcher>>;

    fn url(path: &str) -> String {
        format!("{ORIGIN}{path}")
    }

    fn get(path: &str) -> Request {
        Request::parse_get(&url(path)).unwrap()
    }

    fn navigation(path: &str) -> Request {
        get(path)
            .with_destination(Destination::Document)
            .with_header(ACCEPT, HeaderValue::from_static("text/html,*/*;q=0.8"))
    }

    fn small_config() -> CacheConfig {
        CacheConfig::new("v5", ORIGIN).with_precache(["/", "/index.html"])
    }

    fn site_fetcher() -> Arc<MockFetcher> {
        let fetcher = Arc::new(MockFetcher::default());
        fetcher.respond(&url("/"), StatusCode::OK, "home");
        fetcher.respond(&url("/index.html"), StatusCode::OK, "index");
        fetcher.respond(&url("/about.html"), StatusCode::OK, "about");
        fetcher
    }

    async fn active<S: CacheStorage + 'static>(
        storage: Arc<S>,
        fetcher: Arc<MockFetcher>,
    ) -> Controller<S> {
        let controller = CacheController::new(small_config(), storage, fetcher).unwrap();
        controller.install().await.unwrap();
        controller.activate().await.unwrap();
        controller
    }

    // =========================================================================
    // Install
    // =========================================================================

    #[tokio::test]
    async fn install_precaches_every_entry() {
        let fetcher = Arc::new(MockFetcher::default());
        let config = CacheConfig::new("v5", ORIGIN);
        for entry in &config.precache {
            let target = config.resolve(entry).unwrap().to_string();
            fetcher.respond(&target, StatusCode::OK, "asset");
        }
        let storage = Arc::new(MemoryStorage::new());
        let controller = CacheController::new(config, Arc::clone(&storage), fetcher).unwrap();

        let report = controller.install().await.unwrap();

        assert!(report.is_complete());
        assert_eq!(report.cached.len(), 10);
        assert_eq!(report.store, "portfolio-cache-v5");
        assert_eq!(storage.entries("portfolio-cache-v5").await.unwrap().len(), 10);
        assert_eq!(controller.phase(), Phase::Installed);
        assert!(controller.skip_waiting_requested());
    }

    #[tokio::test]
    async fn install_failure_keeps_partial_store() {
        let fetcher = Arc::new(MockFetcher::default());
        fetcher.respond(&url("/"), StatusCode::OK, "home");
        fetcher.respond(&url("/index.html"), StatusCode::NOT_FOUND, "");
        let config = small_config().with_precache(["/", "/index.html", "/about.html"]);
        let storage = Arc::new(MemoryStorage::new());
        let controller = CacheController::new(config, Arc::clone(&storage), fetcher).unwrap();

        let report = controller.install().await.unwrap();

        assert!(!report.is_complete());
        assert_eq!(report.cached, vec!["/"]);
        let mut failed: Vec<_> = report.failed.iter().map(|f| f.url.as_str()).collect();
        failed.sort_unstable();
        assert_eq!(failed, vec!["/about.html", "/index.html"]);
        let not_found = report
            .failed
            .iter()
            .find(|f| f.url == "/index.html")
            .unwrap();
        assert!(not_found.reason.starts_with("Unexpected status 404"));
        assert!(!not_found.reason.contains("Storage"));
        assert_eq!(storage.entries("portfolio-cache-v5").await.unwrap().len(), 1);
        // The phase still completes and asks to skip waiting.
        assert_eq!(controller.phase(), Phase::Installed);
        assert!(controller.skip_waiting_requested());
    }

    #[tokio::test]
    async fn install_does_not_retry() {
        let fetcher = Arc::new(MockFetcher::default());
        fetcher.set_offline(true);
        let controller =
            CacheController::new(small_config(), Arc::new(MemoryStorage::new()), Arc::clone(&fetcher))
                .unwrap();

        let report = controller.install().await.unwrap();

        assert_eq!(report.failed.len(), 2);
        assert_eq!(fetcher.total_calls(), 2);
    }

    #[tokio::test]
    async fn install_twice_is_a_lifecycle_error() {
        let controller =
            CacheController::new(small_config(), Arc::new(MemoryStorage::new()), site_fetcher())
                .unwrap();
        controller.install().await.unwrap();
        assert!(matches!(
            controller.install().await,
            Err(Error::Lifecycle {
                expected: Phase::Parsed,
                actual: Phase::Installed
            })
        ));
    }

    // =========================================================================
    // Activate
    // =========================================================================

    #[tokio::test]
    async fn activate_before_install_is_a_lifecycle_error() {
        let controller =
            CacheController::new(small_config(), Arc::new(MemoryStorage::new()), site_fetcher())
                .unwrap();
        assert!(matches!(
            controller.activate().await,
            Err(Error::Lifecycle { .. })
        ));
        assert!(!controller.is_controlling());
    }

    #[tokio::test]
    async fn activate_deletes_stale_stores_and_keeps_current() {
        let storage = Arc::new(MemoryStorage::new());
        let stale = Response::new(StatusCode::OK, "old");
        let key = RequestKey::get(Url::parse(&url("/")).unwrap());
        storage.put("portfolio-cache-v3", &key, &stale).await.unwrap();
        storage.put("portfolio-cache-v4", &key, &stale).await.unwrap();
        storage.open("unrelated").await.unwrap();

        let recorder = Arc::new(Recorder::default());
        let controller = CacheController::new(small_config(), Arc::clone(&storage), site_fetcher())
            .unwrap()
            .with_events(recorder.clone());
        controller.install().await.unwrap();
        let report = controller.activate().await.unwrap();

        let mut deleted = report.deleted.clone();
        deleted.sort();
        assert_eq!(
            deleted,
            vec!["portfolio-cache-v3", "portfolio-cache-v4", "unrelated"]
        );
        assert!(report.clients_claimed);
        assert_eq!(storage.keys().await.unwrap(), vec!["portfolio-cache-v5"]);
        assert_eq!(
            storage.lookup("portfolio-cache-v5", &key).await.unwrap().unwrap().body,
            "home"
        );
        assert_eq!(controller.phase(), Phase::Activated);
        assert!(recorder.events().contains(&"claimed".to_string()));
    }

    // =========================================================================
    // Register
    // =========================================================================

    #[tokio::test]
    async fn register_installs_new_version() {
        let fetcher = site_fetcher();
        let controller =
            CacheController::new(small_config(), Arc::new(MemoryStorage::new()), Arc::clone(&fetcher))
                .unwrap();

        let registration = controller.register().await.unwrap();

        assert!(registration.install.is_some_and(|r| r.is_complete()));
        assert!(registration.activation.clients_claimed);
        assert_eq!(fetcher.total_calls(), 2);
        assert!(controller.is_controlling());
    }

    #[tokio::test]
    async fn register_skips_install_when_store_exists() {
        let storage = Arc::new(MemoryStorage::new());
        storage.open("portfolio-cache-v5").await.unwrap();
        storage.open("portfolio-cache-v4").await.unwrap();
        let fetcher = site_fetcher();
        let controller =
            CacheController::new(small_config(), storage, Arc::clone(&fetcher)).unwrap();

        let registration = controller.register().await.unwrap();

        assert_eq!(registration.install, None);
        assert_eq!(registration.activation.deleted, vec!["portfolio-cache-v4"]);
        assert_eq!(fetcher.total_calls(), 0);
        assert_eq!(controller.phase(), Phase::Activated);
    }

    // =========================================================================
    // Fetch interception
    // =========================================================================

    #[tokio::test]
    async fn requests_before_activation_pass_through() {
        let fetcher = site_fetcher();
        let controller =
            CacheController::new(small_config(), Arc::new(MemoryStorage::new()), Arc::clone(&fetcher))
                .unwrap();
        controller.install().await.unwrap();
        let calls = fetcher.total_calls();

        assert_eq!(
            controller.handle_fetch(&get("/about.html")).await,
            FetchOutcome::PassThrough
        );
        assert_eq!(fetcher.total_calls(), calls);
    }

    #[tokio::test]
    async fn about_miss_is_fetched_then_cached() {
        let storage = Arc::new(MemoryStorage::new());
        let fetcher = site_fetcher();
        let controller = active(Arc::clone(&storage), Arc::clone(&fetcher)).await;

        let outcome = controller.handle_fetch(&get("/about.html")).await;

        assert_eq!(
            outcome.response(),
            Some(&Response::new(StatusCode::OK, "about"))
        );
        assert_eq!(fetcher.calls_to(&url("/about.html")), 1);

        controller.settle().await;
        let key = get("/about.html").key();
        assert!(storage.lookup("portfolio-cache-v5", &key).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn repeated_about_is_served_from_cache() {
        let fetcher = site_fetcher();
        let recorder = Arc::new(Recorder::default());
        let controller = CacheController::new(
            small_config(),
            Arc::new(MemoryStorage::new()),
            Arc::clone(&fetcher),
        )
        .unwrap()
        .with_events(recorder.clone());
        controller.register().await.unwrap();

        let first = controller.handle_fetch(&get("/about.html")).await;
        controller.settle().await;
        let second = controller.handle_fetch(&get("/about.html")).await;

        assert_eq!(first, second);
        assert_eq!(fetcher.calls_to(&url("/about.html")), 1);
        let events = recorder.events();
        assert!(events.contains(&"miss /about.html 200".to_string()));
        assert!(events.contains(&"hit /about.html".to_string()));
    }

    #[tokio::test]
    async fn cached_entries_never_hit_the_network() {
        let fetcher = site_fetcher();
        let controller = active(Arc::new(MemoryStorage::new()), Arc::clone(&fetcher)).await;
        fetcher.set_offline(true);
        let calls = fetcher.total_calls();

        let outcome = controller.handle_fetch(&get("/index.html")).await;

        assert_eq!(outcome.response().map(|r| r.body.clone()), Some("index".into()));
        assert_eq!(fetcher.total_calls(), calls);
    }

    #[tokio::test]
    async fn image_requests_never_touch_the_store() {
        let storage = Arc::new(CountingStorage::default());
        let fetcher = site_fetcher();
        let controller = active(Arc::clone(&storage), Arc::clone(&fetcher)).await;
        // Even a stored entry for the image URL must be ignored.
        storage
            .inner
            .put(
                "portfolio-cache-v5",
                &get("/img/photo.jpg").key(),
                &Response::new(StatusCode::OK, "cached image"),
            )
            .await
            .unwrap();
        let touches = storage.touches();
        let calls = fetcher.total_calls();

        let by_path = controller.handle_fetch(&get("/img/photo.jpg")).await;
        let by_dest = controller
            .handle_fetch(&get("/avatar").with_destination(Destination::Image))
            .await;
        let upper = controller.handle_fetch(&get("/IMG/LOGO.SVG")).await;
        controller.settle().await;

        assert_eq!(by_path, FetchOutcome::PassThrough);
        assert_eq!(by_dest, FetchOutcome::PassThrough);
        assert_eq!(upper, FetchOutcome::PassThrough);
        assert_eq!(storage.touches(), touches);
        assert_eq!(fetcher.total_calls(), calls);
    }

    #[tokio::test]
    async fn non_200_responses_are_returned_but_not_cached() {
        let storage = Arc::new(MemoryStorage::new());
        let fetcher = site_fetcher();
        fetcher.respond(&url("/missing.html"), StatusCode::NOT_FOUND, "nope");
        fetcher.respond(&url("/moved"), StatusCode::MOVED_PERMANENTLY, "");
        fetcher.respond(&url("/empty"), StatusCode::NO_CONTENT, "");
        let controller = active(Arc::clone(&storage), Arc::clone(&fetcher)).await;

        for (path, status) in [
            ("/missing.html", StatusCode::NOT_FOUND),
            ("/moved", StatusCode::MOVED_PERMANENTLY),
            ("/empty", StatusCode::NO_CONTENT),
        ] {
            let outcome = controller.handle_fetch(&get(path)).await;
            assert_eq!(outcome.response().map(|r| r.status), Some(status));
        }
        controller.settle().await;

        for path in ["/missing.html", "/moved", "/empty"] {
            let cached = storage
                .lookup("portfolio-cache-v5", &get(path).key())
                .await
                .unwrap();
            assert_eq!(cached, None, "{path}");
        }
    }

    #[tokio::test]
    async fn post_responses_are_returned_but_not_cached() {
        let storage = Arc::new(MemoryStorage::new());
        let fetcher = site_fetcher();
        fetcher.respond(&url("/contact"), StatusCode::OK, "thanks");
        let controller = active(Arc::clone(&storage), fetcher).await;
        let post = Request::new(Method::POST, Url::parse(&url("/contact")).unwrap())
            .with_body("name=ada");

        let outcome = controller.handle_fetch(&post).await;
        controller.settle().await;

        assert_eq!(outcome.response().map(|r| r.status), Some(StatusCode::OK));
        assert!(storage.lookup("portfolio-cache-v5", &post.key()).await.unwrap().is_none());
        assert_eq!(storage.entries("portfolio-cache-v5").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn offline_navigation_falls_back_to_index() {
        let fetcher = site_fetcher();
        let recorder = Arc::new(Recorder::default());
        let controller = CacheController::new(
            small_config(),
            Arc::new(MemoryStorage::new()),
            Arc::clone(&fetcher),
        )
        .unwrap()
        .with_events(recorder.clone());
        controller.register().await.unwrap();
        fetcher.set_offline(true);

        let outcome = controller.handle_fetch(&navigation("/projects.html")).await;

        assert_eq!(
            outcome,
            FetchOutcome::Intercept(Some(Response::new(StatusCode::OK, "index")))
        );
        assert!(recorder.events().contains(&"fallback /projects.html true".to_string()));
    }

    #[tokio::test]
    async fn offline_navigation_without_cached_index_gets_nothing() {
        let fetcher = site_fetcher();
        let config = small_config().with_precache(["/"]);
        let controller =
            CacheController::new(config, Arc::new(MemoryStorage::new()), Arc::clone(&fetcher))
                .unwrap();
        controller.register().await.unwrap();
        fetcher.set_offline(true);

        assert_eq!(
            controller.handle_fetch(&navigation("/projects.html")).await,
            FetchOutcome::Intercept(None)
        );
    }

    #[tokio::test]
    async fn offline_non_html_request_gets_no_response() {
        let fetcher = site_fetcher();
        let controller = active(Arc::new(MemoryStorage::new()), Arc::clone(&fetcher)).await;
        fetcher.set_offline(true);
        let stylesheet = get("/assets/css/styles.css")
            .with_destination(Destination::Style)
            .with_header(ACCEPT, HeaderValue::from_static("text/css,*/*;q=0.1"));

        assert_eq!(
            controller.handle_fetch(&stylesheet).await,
            FetchOutcome::Intercept(None)
        );
    }

    #[tokio::test]
    async fn settle_with_no_writes_returns() {
        let controller = active(Arc::new(MemoryStorage::new()), site_fetcher()).await;
        controller.settle().await;
        controller.settle().await;
    }

    #[test]
    fn no_events_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<NoEvents>();
    }
}
