//! Source-key to adapter table and the routing rules in front of it.
//!
//! The [`Router`] owns the table and builds it on the first resolution,
//! exactly once even when many books start at the same moment. Resolution
//! order:
//!
//! 1. Generic downloader mode forces [`GENERIC_KEY`].
//! 2. IIIF mode, or a URL containing `.json`, forces [`IIIF_KEY`].
//! 3. A `tiles/infos.json` URL forces [`DZI_KEY`].
//! 4. Otherwise the caller's source key (host, with port) is used as is.
//! 5. Unknown keys are classified by probing the URL's `Content-Type`.
//! 6. Anything still unresolved is [`AdapterError::UnsupportedSource`].

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{Adapter, AdapterEnv, AdapterError, BerlinAdapter, DziAdapter, GenericAdapter, IiifAdapter};
use crate::config::DownloaderMode;
use crate::download::HttpClient;

/// Key of the generic batch downloader.
pub const GENERIC_KEY: &str = "bookget";

/// Key of the generic IIIF manifest adapter.
pub const IIIF_KEY: &str = "iiif.io";

/// Key of the deep-zoom tile adapter.
pub const DZI_KEY: &str = "dzicnlib";

/// Marker for a manifest-file URL.
const MANIFEST_MARKER: &str = ".json";

/// Marker for a deep-zoom tile descriptor URL.
const TILE_INFO_MARKER: &str = "tiles/infos.json";

/// Hosts served by the generic IIIF adapter.
const IIIF_HOSTS: [&str; 3] = [
    "repo.komazawa-u.ac.jp",
    "www.iiif.ku-orcas.kansai-u.ac.jp",
    "dcollections.lib.keio.ac.jp",
];

/// Picks the registry key for `raw_url`, applying the override rules.
#[must_use]
pub fn select_source_key(mode: DownloaderMode, source_key: &str, raw_url: &str) -> String {
    let mut key = match mode {
        DownloaderMode::Generic => GENERIC_KEY,
        DownloaderMode::IiifManifest => IIIF_KEY,
        DownloaderMode::Auto if raw_url.contains(MANIFEST_MARKER) => IIIF_KEY,
        DownloaderMode::Auto => source_key,
    };
    if raw_url.contains(TILE_INFO_MARKER) {
        key = DZI_KEY;
    }
    key.to_string()
}

/// Table from source key to a shared adapter instance.
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: HashMap<String, Arc<dyn Adapter>>,
}

impl AdapterRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `key` to `adapter`, replacing any previous binding.
    pub fn register(&mut self, key: impl Into<String>, adapter: Arc<dyn Adapter>) {
        let key = key.into();
        debug!(key = %key, adapter = adapter.name(), "registering adapter");
        self.adapters.insert(key, adapter);
    }

    /// Adapter bound to `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Arc<dyn Adapter>> {
        self.adapters.get(key).cloned()
    }

    /// Number of bound keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    /// True when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    /// Bound keys, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.adapters.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("keys", &self.keys())
            .finish()
    }
}

/// Builds the registry with every shipped adapter.
///
/// An adapter whose client cannot be built is logged and left out; the rest
/// stay usable.
#[must_use]
pub fn build_default_registry(env: &AdapterEnv) -> AdapterRegistry {
    let mut registry = AdapterRegistry::new();

    match IiifAdapter::new(env) {
        Ok(adapter) => {
            let adapter: Arc<dyn Adapter> = Arc::new(adapter);
            registry.register(IIIF_KEY, Arc::clone(&adapter));
            for host in IIIF_HOSTS {
                registry.register(host, Arc::clone(&adapter));
            }
        }
        Err(error) => warn!(error = %error, "IIIF adapter unavailable"),
    }

    match BerlinAdapter::new(env) {
        Ok(adapter) => registry.register(BerlinAdapter::HOST, Arc::new(adapter)),
        Err(error) => warn!(error = %error, "Berlin adapter unavailable"),
    }

    match DziAdapter::new(env) {
        Ok(adapter) => registry.register(DZI_KEY, Arc::new(adapter)),
        Err(error) => warn!(error = %error, "deep-zoom adapter unavailable"),
    }

    match GenericAdapter::new(env) {
        Ok(adapter) => registry.register(GENERIC_KEY, Arc::new(adapter)),
        Err(error) => warn!(error = %error, "generic adapter unavailable"),
    }

    registry
}

/// What a live `Content-Type` probe says about a URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentClass {
    /// A JSON document, handled as an IIIF manifest.
    Json,
    /// A file to download as is.
    Download,
}

/// Classifies a `Content-Type` header value.
#[must_use]
pub fn classify_content_type(content_type: &str) -> Option<ContentClass> {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    if mime.contains("json") {
        Some(ContentClass::Json)
    } else if mime.starts_with("image/")
        || mime == "application/pdf"
        || mime == "application/octet-stream"
        || mime.contains("zip")
    {
        Some(ContentClass::Download)
    } else {
        None
    }
}

/// Live classification of URLs the table does not know.
#[async_trait]
pub trait ContentProbe: Send + Sync {
    /// Returns the class of `url`, or `None` when it is unrecognizable or
    /// unreachable.
    async fn classify(&self, url: &str) -> Option<ContentClass>;
}

/// Probes with a `HEAD` (falling back to `GET`) request.
#[derive(Debug, Clone)]
pub struct HttpContentProbe {
    client: HttpClient,
    cancel: CancellationToken,
}

impl HttpContentProbe {
    /// Creates a probe that gives up when `cancel` fires.
    #[must_use]
    pub fn new(client: HttpClient, cancel: CancellationToken) -> Self {
        Self { client, cancel }
    }
}

#[async_trait]
impl ContentProbe for HttpContentProbe {
    async fn classify(&self, url: &str) -> Option<ContentClass> {
        match self.client.content_type(url, &self.cancel).await {
            Ok(content_type) => content_type.as_deref().and_then(classify_content_type),
            Err(error) => {
                debug!(url, error = %error, "content probe failed");
                None
            }
        }
    }
}

type RegistryBuilder = Box<dyn Fn() -> AdapterRegistry + Send + Sync>;

/// Resolves source URLs to adapters.
///
/// The table is built by `builder` on the first call to
/// [`resolve`](Self::resolve) and reused for the life of the router.
pub struct Router {
    mode: DownloaderMode,
    registry: OnceCell<AdapterRegistry>,
    builder: RegistryBuilder,
    probe: Arc<dyn ContentProbe>,
}

impl Router {
    /// Creates a router with a custom table builder and probe.
    pub fn new(
        mode: DownloaderMode,
        builder: impl Fn() -> AdapterRegistry + Send + Sync + 'static,
        probe: Arc<dyn ContentProbe>,
    ) -> Self {
        Self {
            mode,
            registry: OnceCell::new(),
            builder: Box::new(builder),
            probe,
        }
    }

    /// Router over the shipped adapters with an HTTP content probe.
    #[must_use]
    pub fn with_defaults(env: AdapterEnv, cancel: CancellationToken) -> Self {
        let mode = env.config.downloader_mode;
        let probe: Arc<dyn ContentProbe> =
            match HttpClient::new(&env.config, Arc::clone(&env.decorator)) {
                Ok(client) => Arc::new(HttpContentProbe::new(client, cancel)),
                Err(error) => {
                    warn!(error = %error, "content probe unavailable");
                    Arc::new(NoProbe)
                }
            };
        Self::new(mode, move || build_default_registry(&env), probe)
    }

    /// The adapter table, built on first access.
    pub async fn registry(&self) -> &AdapterRegistry {
        self.registry
            .get_or_init(|| async {
                let registry = (self.builder)();
                info!(adapters = registry.len(), "adapter registry initialized");
                registry
            })
            .await
    }

    /// Finds the adapter for `raw_url`.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::UnsupportedSource`] when neither the table nor
    /// the content probe can place the URL.
    pub async fn resolve(
        &self,
        source_key: &str,
        raw_url: &str,
    ) -> Result<Arc<dyn Adapter>, AdapterError> {
        let registry = self.registry().await;
        let key = select_source_key(self.mode, source_key, raw_url);

        if let Some(adapter) = registry.get(&key) {
            debug!(key = %key, adapter = adapter.name(), "source resolved");
            return Ok(adapter);
        }

        let fallback = match self.probe.classify(raw_url).await {
            Some(ContentClass::Json) => Some(IIIF_KEY),
            Some(ContentClass::Download) => Some(GENERIC_KEY),
            None => None,
        };
        if let Some(adapter) = fallback.and_then(|fallback_key| registry.get(fallback_key)) {
            info!(key = %key, adapter = adapter.name(), url = raw_url, "source classified by content type");
            return Ok(adapter);
        }

        Err(AdapterError::unsupported(key, raw_url))
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("mode", &self.mode)
            .field("registry", &self.registry.get())
            .finish_non_exhaustive()
    }
}

/// Probe used when no HTTP client could be built.
struct NoProbe;

#[async_trait]
impl ContentProbe for NoProbe {
    async fn classify(&self, _url: &str) -> Option<ContentClass> {
        None
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::adapter::{RunContext, RunSummary};

    struct Named(&'static str);

    #[async_trait]
    impl Adapter for Named {
        fn name(&self) -> &'static str {
            self.0
        }

        async fn run(&self, _raw_url: &str, _ctx: &RunContext) -> Result<RunSummary, AdapterError> {
            Ok(RunSummary::default())
        }
    }

    struct FixedProbe(Option<ContentClass>);

    #[async_trait]
    impl ContentProbe for FixedProbe {
        async fn classify(&self, _url: &str) -> Option<ContentClass> {
            self.0
        }
    }

    fn table() -> AdapterRegistry {
        let mut registry = AdapterRegistry::new();
        registry.register(GENERIC_KEY, Arc::new(Named("generic")));
        registry.register(IIIF_KEY, Arc::new(Named("iiif")));
        registry.register(DZI_KEY, Arc::new(Named("dzi")));
        registry.register("lib.example", Arc::new(Named("site")));
        registry
    }

    fn router(mode: DownloaderMode, probe: Option<ContentClass>) -> Router {
        Router::new(mode, table, Arc::new(FixedProbe(probe)))
    }

    #[test]
    fn test_select_source_key_rules() {
        let auto = DownloaderMode::Auto;
        assert_eq!(select_source_key(auto, "lib.example", "https://lib.example/b/1"), "lib.example");
        assert_eq!(select_source_key(auto, "lib.example", "https://lib.example/m.json"), IIIF_KEY);
        assert_eq!(
            select_source_key(auto, "lib.example", "https://lib.example/1/tiles/infos.json"),
            DZI_KEY
        );
        assert_eq!(
            select_source_key(DownloaderMode::Generic, "lib.example", "https://lib.example/m.json"),
            GENERIC_KEY
        );
        assert_eq!(
            select_source_key(DownloaderMode::IiifManifest, "lib.example", "https://lib.example/b"),
            IIIF_KEY
        );
    }

    #[tokio::test]
    async fn test_generic_mode_overrides_every_host() {
        let router = router(DownloaderMode::Generic, None);
        for url in ["https://lib.example/b/1", "https://other.example/x.json"] {
            let key = source_key_of(url);
            assert_eq!(router.resolve(&key, url).await.unwrap().name(), "generic");
        }
    }

    #[tokio::test]
    async fn test_json_url_resolves_to_iiif() {
        let router = router(DownloaderMode::Auto, None);
        let url = "https://unknown.example/book/manifest.json";
        let adapter = router.resolve(&source_key_of(url), url).await.unwrap();
        assert_eq!(adapter.name(), "iiif");
    }

    #[tokio::test]
    async fn test_host_lookup_and_probe_fallbacks() {
        let known = router(DownloaderMode::Auto, None);
        let adapter = known.resolve("lib.example", "https://lib.example/b/1").await.unwrap();
        assert_eq!(adapter.name(), "site");

        let json = router(DownloaderMode::Auto, Some(ContentClass::Json));
        let adapter = json.resolve("api.example", "https://api.example/m").await.unwrap();
        assert_eq!(adapter.name(), "iiif");

        let file = router(DownloaderMode::Auto, Some(ContentClass::Download));
        let adapter = file.resolve("cdn.example", "https://cdn.example/a").await.unwrap();
        assert_eq!(adapter.name(), "generic");
    }

    #[tokio::test]
    async fn test_unresolvable_source_is_unsupported() {
        let router = router(DownloaderMode::Auto, None);
        let result = router.resolve("nowhere.example", "https://nowhere.example/x").await;
        assert!(matches!(
            result,
            Err(AdapterError::UnsupportedSource { source_key, .. }) if source_key == "nowhere.example"
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_registry_built_once_under_concurrent_callers() {
        let builds = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&builds);
        let router = Arc::new(Router::new(
            DownloaderMode::Auto,
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
                table()
            },
            Arc::new(FixedProbe(None)),
        ));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let router = Arc::clone(&router);
            handles.push(tokio::spawn(async move {
                router
                    .resolve("lib.example", "https://lib.example/b")
                    .await
                    .map(|a| a.name())
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), "site");
        }
        assert_eq!(builds.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_classify_content_type() {
        assert_eq!(classify_content_type("application/ld+json;profile=x"), Some(ContentClass::Json));
        assert_eq!(classify_content_type("image/jpeg"), Some(ContentClass::Download));
        assert_eq!(classify_content_type("application/pdf"), Some(ContentClass::Download));
        assert_eq!(classify_content_type("application/x-zip-compressed"), Some(ContentClass::Download));
        assert_eq!(classify_content_type("text/html; charset=utf-8"), None);
    }

    fn source_key_of(url: &str) -> String {
        crate::adapter::source_key_for(url).unwrap()
    }
}
