//! Model Registry (§4.F): the authoritative catalog of models across every
//! registered provider adapter.
//!
//! Read operations (`list`, `get`, `get_by_capability`, `get_healthy`) are
//! lock-free `dashmap` reads; mutations (`register`, `mark_loaded`,
//! `mark_unloaded`) are serialized per model id by `dashmap`'s internal
//! sharding. `max_models` bounds how many models may be `Loaded`
//! simultaneously -- registration itself is unbounded, only the LRU-tracked
//! loaded set is capped.

use async_trait::async_trait;
use dashmap::DashMap;
use gateway_core::provider::{ModelDescriptor, ModelInfo, ProviderType};
use gateway_core::{GatewayError, HealthStatus, LLMProvider};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Lifecycle of a model entry, per §3's `registered → loaded → ready ↔
/// degraded → unloaded → evicted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelLifecycle {
    /// Known to the registry but not currently bound to runtime resources.
    Registered,
    /// Bound and serving.
    Loaded,
    /// Bound, but its provider is reporting degraded health.
    Degraded,
    /// Explicitly released; registration is retained.
    Unloaded,
    /// Evicted by the `max_models` LRU policy.
    Evicted,
}

/// A model as tracked by the registry: its declared info, which provider
/// instance serves it, and its current lifecycle state.
#[derive(Debug, Clone)]
pub struct ManagedModel {
    /// The model's declared capabilities and pricing.
    pub info: ModelInfo,
    /// Provider instance id that serves this model.
    pub provider_id: String,
    /// Provider family.
    pub provider_type: ProviderType,
    /// Current lifecycle state.
    pub lifecycle: ModelLifecycle,
    /// Monotonic counter of the last access, used for LRU eviction among
    /// `Loaded` models. Not a wall-clock timestamp.
    pub last_used: u64,
}

impl ManagedModel {
    fn descriptor(&self) -> ModelDescriptor {
        ModelDescriptor {
            info: self.info.clone(),
            provider_id: self.provider_id.clone(),
            provider_type: self.provider_type,
        }
    }
}

/// A capability flag models can be filtered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Streaming responses.
    Streaming,
    /// Tool/function calling.
    FunctionCalling,
    /// Image content parts.
    Vision,
    /// Embeddings generation.
    Embeddings,
    /// Structured JSON response format.
    JsonMode,
    /// Concurrent tool calls in one turn.
    ParallelToolCalls,
}

/// Filter applied by [`ProviderRegistry::list`].
#[derive(Debug, Clone, Default)]
pub struct ModelFilter {
    /// Restrict to a specific provider family.
    pub provider_type: Option<ProviderType>,
    /// Restrict to models exposing this capability.
    pub capability: Option<Capability>,
    /// Restrict to models whose provider currently reports usable health.
    pub healthy_only: bool,
}

/// Errors raised by registry operations.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// A model with this id is already registered.
    #[error("model '{0}' is already registered")]
    DuplicateModel(String),
    /// Registration was missing a required field.
    #[error("model registration missing required field '{0}'")]
    MissingField(&'static str),
    /// No such model.
    #[error("model '{0}' not found")]
    ModelNotFound(String),
    /// No such provider instance.
    #[error("provider '{0}' not found")]
    ProviderNotFound(String),
    /// A provider with this id is already registered.
    #[error("provider '{0}' is already registered")]
    DuplicateProvider(String),
}

impl From<RegistryError> for GatewayError {
    fn from(err: RegistryError) -> Self {
        match &err {
            RegistryError::ModelNotFound(_) | RegistryError::ProviderNotFound(_) => {
                GatewayError::not_found(err.to_string())
            }
            RegistryError::DuplicateModel(_)
            | RegistryError::DuplicateProvider(_)
            | RegistryError::MissingField(_) => GatewayError::validation(
                err.to_string(),
                None,
                "registry_validation",
            ),
        }
    }
}

/// Explicit fields required by a direct model registration (`POST
/// /models`), distinct from the implicit registration that happens when a
/// whole provider adapter is registered with its declared model list.
#[derive(Debug, Clone)]
pub struct ModelRegistration {
    /// Model id, unique within the registry.
    pub id: String,
    /// Declared format (e.g. `"gguf"`, `"api"`, `"onnx"`).
    pub format: String,
    /// Where the model comes from (a provider id, a path, a URL).
    pub source: String,
    /// Provider instance this model is served by.
    pub provider_id: String,
    /// Declared info (pricing, context length, ...).
    pub info: ModelInfo,
}

/// State-change events observers (Observability, SLA plane) subscribe to.
#[derive(Debug, Clone)]
pub enum RegistryEvent {
    /// A model was registered.
    Registered {
        /// The model's id.
        model_id: String,
    },
    /// A model was loaded.
    Loaded {
        /// The model's id.
        model_id: String,
    },
    /// A model's provider reported degraded health.
    Degraded {
        /// The model's id.
        model_id: String,
    },
    /// A model was unloaded (explicitly, or evicted by the LRU cap).
    Unloaded {
        /// The model's id.
        model_id: String,
        /// Whether this unload was an LRU eviction rather than explicit.
        evicted: bool,
    },
}

/// Durable persistence for the registry's model catalog. The in-memory
/// default never persists; `FileRegistryStore` writes JSON with a `.bak`
/// sibling on every save. A `sqlx`-backed implementation lives alongside
/// the rest of the gateway's persistence layer.
#[async_trait]
pub trait RegistryStore: Send + Sync {
    /// Persist the current set of registered models.
    async fn save(&self, models: &[ManagedModel]) -> Result<(), RegistryError>;

    /// Load a previously persisted set of models. Returns an empty vector,
    /// logged at `error`, if the persisted state is corrupt or unreadable --
    /// the registry never fails to start over a bad snapshot.
    async fn load(&self) -> Vec<ManagedModel>;
}

/// A store that persists nothing; every `load` returns empty.
#[derive(Debug, Default)]
pub struct InMemoryRegistryStore;

#[async_trait]
impl RegistryStore for InMemoryRegistryStore {
    async fn save(&self, _models: &[ManagedModel]) -> Result<(), RegistryError> {
        Ok(())
    }

    async fn load(&self) -> Vec<ManagedModel> {
        Vec::new()
    }
}

/// One entry as written to the file store.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct PersistedModel {
    info: ModelInfo,
    provider_id: String,
    provider_type: ProviderType,
}

/// A JSON-file-backed store with `.bak`-on-write durability.
pub struct FileRegistryStore {
    path: PathBuf,
}

impl FileRegistryStore {
    /// Persist to and load from `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn backup_path(&self) -> PathBuf {
        let mut backup = self.path.clone();
        let ext = backup
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("json");
        backup.set_extension(format!("{ext}.bak"));
        backup
    }
}

#[async_trait]
impl RegistryStore for FileRegistryStore {
    async fn save(&self, models: &[ManagedModel]) -> Result<(), RegistryError> {
        let persisted: Vec<PersistedModel> = models
            .iter()
            .map(|m| PersistedModel {
                info: m.info.clone(),
                provider_id: m.provider_id.clone(),
                provider_type: m.provider_type,
            })
            .collect();

        let json = serde_json::to_vec_pretty(&persisted).unwrap_or_default();

        if tokio::fs::metadata(&self.path).await.is_ok() {
            if let Err(e) = tokio::fs::copy(&self.path, self.backup_path()).await {
                warn!(error = %e, "failed to write registry .bak sibling before save");
            }
        }

        tokio::fs::write(&self.path, json)
            .await
            .map_err(|e| RegistryError::MissingField(Box::leak(e.to_string().into_boxed_str())))
    }

    async fn load(&self) -> Vec<ManagedModel> {
        load_from_file(&self.path).await.unwrap_or_else(|| {
            error!(path = %self.path.display(), "registry snapshot missing or corrupt, starting empty");
            Vec::new()
        })
    }
}

async fn load_from_file(path: &Path) -> Option<Vec<ManagedModel>> {
    let contents = tokio::fs::read(path).await.ok()?;
    let persisted: Vec<PersistedModel> = serde_json::from_slice(&contents).ok()?;
    Some(
        persisted
            .into_iter()
            .map(|p| ManagedModel {
                info: p.info,
                provider_id: p.provider_id,
                provider_type: p.provider_type,
                lifecycle: ModelLifecycle::Registered,
                last_used: 0,
            })
            .collect(),
    )
}

/// One registered provider instance plus the router-facing weight/priority
/// it was registered with.
pub struct ProviderEntry {
    /// The adapter itself.
    pub provider: Arc<dyn LLMProvider>,
    /// Relative weight for weighted routing strategies.
    pub weight: u32,
    /// Priority for failover ordering (higher serves first).
    pub priority: u32,
}

/// The Model Registry: catalog of models across every registered provider.
pub struct ProviderRegistry {
    providers: DashMap<String, ProviderEntry>,
    models: DashMap<String, ManagedModel>,
    max_models: std::sync::atomic::AtomicU32,
    access_clock: AtomicU64,
    events: broadcast::Sender<RegistryEvent>,
    store: Arc<dyn RegistryStore>,
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderRegistry {
    /// Build an empty registry with no persisted store and no loaded cap
    /// (callers should call [`ProviderRegistry::set_max_models`] before
    /// relying on eviction).
    #[must_use]
    pub fn new() -> Self {
        Self::with_store(Arc::new(InMemoryRegistryStore))
    }

    /// Build an empty registry backed by `store`.
    #[must_use]
    pub fn with_store(store: Arc<dyn RegistryStore>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            providers: DashMap::new(),
            models: DashMap::new(),
            max_models: std::sync::atomic::AtomicU32::new(u32::MAX),
            access_clock: AtomicU64::new(0),
            events,
            store,
        }
    }

    /// Set the maximum number of simultaneously `Loaded` models.
    pub fn set_max_models(&self, max_models: u32) {
        self.max_models.store(max_models, Ordering::Relaxed);
    }

    /// Subscribe to registry events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.events.subscribe()
    }

    /// Register a provider instance and every model it declares.
    ///
    /// # Errors
    /// Returns [`RegistryError::DuplicateProvider`] if `provider.id()` is
    /// already registered, or [`RegistryError::DuplicateModel`] if any of
    /// its declared models collides with an existing registration.
    pub fn register(
        &self,
        provider: Arc<dyn LLMProvider>,
        weight: u32,
        priority: u32,
    ) -> Result<(), RegistryError> {
        let provider_id = provider.id().to_string();
        if self.providers.contains_key(&provider_id) {
            return Err(RegistryError::DuplicateProvider(provider_id));
        }

        for info in provider.models() {
            if self.models.contains_key(&info.id) {
                return Err(RegistryError::DuplicateModel(info.id.clone()));
            }
        }

        for info in provider.models() {
            self.models.insert(
                info.id.clone(),
                ManagedModel {
                    info: info.clone(),
                    provider_id: provider_id.clone(),
                    provider_type: provider.provider_type(),
                    lifecycle: ModelLifecycle::Registered,
                    last_used: 0,
                },
            );
            let _ = self.events.send(RegistryEvent::Registered {
                model_id: info.id.clone(),
            });
        }

        self.providers.insert(
            provider_id,
            ProviderEntry {
                provider,
                weight,
                priority,
            },
        );
        Ok(())
    }

    /// Register a single model directly (`POST /models`), validating the
    /// required `{id, format, source}` fields and rejecting duplicates.
    ///
    /// # Errors
    /// Returns [`RegistryError::MissingField`] if `id`/`format`/`source` is
    /// empty, [`RegistryError::ProviderNotFound`] if `provider_id` isn't
    /// registered, or [`RegistryError::DuplicateModel`] on collision.
    pub fn register_model(&self, registration: ModelRegistration) -> Result<(), RegistryError> {
        if registration.id.trim().is_empty() {
            return Err(RegistryError::MissingField("id"));
        }
        if registration.format.trim().is_empty() {
            return Err(RegistryError::MissingField("format"));
        }
        if registration.source.trim().is_empty() {
            return Err(RegistryError::MissingField("source"));
        }
        if self.models.contains_key(&registration.id) {
            return Err(RegistryError::DuplicateModel(registration.id));
        }
        let Some(entry) = self.providers.get(&registration.provider_id) else {
            return Err(RegistryError::ProviderNotFound(registration.provider_id));
        };
        let provider_type = entry.provider.provider_type();
        drop(entry);

        self.models.insert(
            registration.id.clone(),
            ManagedModel {
                info: registration.info,
                provider_id: registration.provider_id,
                provider_type,
                lifecycle: ModelLifecycle::Registered,
                last_used: 0,
            },
        );
        let _ = self.events.send(RegistryEvent::Registered {
            model_id: registration.id,
        });
        Ok(())
    }

    /// Every registered provider instance id.
    #[must_use]
    pub fn provider_ids(&self) -> Vec<String> {
        self.providers.iter().map(|e| e.key().clone()).collect()
    }

    /// Look up a registered provider instance by id.
    #[must_use]
    pub fn get_provider(&self, provider_id: &str) -> Option<Arc<dyn LLMProvider>> {
        self.providers.get(provider_id).map(|e| Arc::clone(&e.provider))
    }

    /// Number of registered provider instances.
    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Whether no providers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// List every model matching `filter` (all models if `None`).
    #[must_use]
    pub fn list(&self, filter: Option<&ModelFilter>) -> Vec<ModelDescriptor> {
        self.models
            .iter()
            .filter(|entry| self.matches(entry.value(), filter))
            .map(|entry| entry.value().descriptor())
            .collect()
    }

    fn matches(&self, model: &ManagedModel, filter: Option<&ModelFilter>) -> bool {
        let Some(filter) = filter else { return true };
        if let Some(provider_type) = filter.provider_type {
            if model.provider_type != provider_type {
                return false;
            }
        }
        if let Some(capability) = filter.capability {
            let Some(entry) = self.providers.get(&model.provider_id) else {
                return false;
            };
            if !has_capability(entry.provider.capabilities(), capability) {
                return false;
            }
        }
        if filter.healthy_only && model.lifecycle == ModelLifecycle::Evicted {
            return false;
        }
        true
    }

    /// Look up a single model by id or alias.
    #[must_use]
    pub fn get(&self, model_id: &str) -> Option<ModelDescriptor> {
        self.models
            .iter()
            .find(|entry| entry.value().info.id == model_id || entry.value().info.alias.as_deref() == Some(model_id))
            .map(|entry| entry.value().descriptor())
    }

    /// Models exposing `capability`.
    #[must_use]
    pub fn get_by_capability(&self, capability: Capability) -> Vec<ModelDescriptor> {
        self.list(Some(&ModelFilter {
            capability: Some(capability),
            ..ModelFilter::default()
        }))
    }

    /// Models whose provider currently reports usable health.
    ///
    /// Unlike `list`'s `healthy_only` flag (a static lifecycle check), this
    /// probes each distinct provider live via `health_check`.
    pub async fn get_healthy(&self) -> Vec<ModelDescriptor> {
        let mut healthy_providers = std::collections::HashSet::new();
        for entry in self.providers.iter() {
            if entry.provider.health_check().await.is_usable() {
                healthy_providers.insert(entry.key().clone());
            }
        }
        self.models
            .iter()
            .filter(|e| healthy_providers.contains(&e.value().provider_id))
            .map(|e| e.value().descriptor())
            .collect()
    }

    /// Mark a model as loaded, touching its LRU recency and evicting the
    /// least-recently-used loaded model if this pushes the loaded count
    /// over `max_models`. Registration of the evicted model is preserved;
    /// only its bound adapter resources are released.
    ///
    /// # Errors
    /// Returns [`RegistryError::ModelNotFound`] if `model_id` isn't
    /// registered.
    pub async fn mark_loaded(&self, model_id: &str) -> Result<(), RegistryError> {
        let tick = self.access_clock.fetch_add(1, Ordering::Relaxed);
        {
            let mut entry = self
                .models
                .get_mut(model_id)
                .ok_or_else(|| RegistryError::ModelNotFound(model_id.to_string()))?;
            entry.lifecycle = ModelLifecycle::Loaded;
            entry.last_used = tick;
        }
        let _ = self.events.send(RegistryEvent::Loaded {
            model_id: model_id.to_string(),
        });
        self.evict_if_over_capacity().await;
        Ok(())
    }

    async fn evict_if_over_capacity(&self) {
        let max_models = self.max_models.load(Ordering::Relaxed) as usize;
        loop {
            let loaded: Vec<(String, u64)> = self
                .models
                .iter()
                .filter(|e| e.value().lifecycle == ModelLifecycle::Loaded)
                .map(|e| (e.key().clone(), e.value().last_used))
                .collect();
            if loaded.len() <= max_models {
                return;
            }
            let Some((oldest_id, _)) = loaded.iter().min_by_key(|(_, used)| *used).cloned() else {
                return;
            };
            info!(model = %oldest_id, "evicting least-recently-used loaded model");
            if let Some(mut entry) = self.models.get_mut(&oldest_id) {
                entry.lifecycle = ModelLifecycle::Evicted;
            }
            let _ = self.events.send(RegistryEvent::Unloaded {
                model_id: oldest_id,
                evicted: true,
            });
        }
    }

    /// Explicitly unload a model, releasing its adapter's runtime resources
    /// via `LLMProvider::unload`. Registration is preserved.
    ///
    /// # Errors
    /// Returns [`RegistryError::ModelNotFound`]/[`RegistryError::ProviderNotFound`]
    /// if either lookup fails, or propagates the adapter's own unload error.
    pub async fn unload(&self, model_id: &str) -> Result<(), RegistryError> {
        let provider_id = {
            let entry = self
                .models
                .get(model_id)
                .ok_or_else(|| RegistryError::ModelNotFound(model_id.to_string()))?;
            entry.provider_id.clone()
        };
        let provider = self
            .get_provider(&provider_id)
            .ok_or(RegistryError::ProviderNotFound(provider_id))?;

        if let Err(e) = provider.unload(model_id).await {
            warn!(model = %model_id, error = %e, "provider unload reported an error, marking unloaded anyway");
        }

        if let Some(mut entry) = self.models.get_mut(model_id) {
            entry.lifecycle = ModelLifecycle::Unloaded;
        }
        let _ = self.events.send(RegistryEvent::Unloaded {
            model_id: model_id.to_string(),
            evicted: false,
        });
        Ok(())
    }

    /// Mark a model degraded, e.g. after its provider's health check
    /// reports `Degraded`.
    pub fn mark_degraded(&self, model_id: &str) {
        if let Some(mut entry) = self.models.get_mut(model_id) {
            entry.lifecycle = ModelLifecycle::Degraded;
        }
        let _ = self.events.send(RegistryEvent::Degraded {
            model_id: model_id.to_string(),
        });
    }

    /// Snapshot every managed model and persist it through the configured
    /// [`RegistryStore`].
    ///
    /// # Errors
    /// Propagates the store's save error.
    pub async fn persist(&self) -> Result<(), RegistryError> {
        let snapshot: Vec<ManagedModel> = self.models.iter().map(|e| e.value().clone()).collect();
        self.store.save(&snapshot).await
    }

    /// Restore a previously persisted snapshot, registering each model
    /// under `Registered` lifecycle. Does not re-create provider instances;
    /// callers must `register` providers separately before routing traffic.
    pub async fn restore(&self) {
        for model in self.store.load().await {
            self.models.insert(model.info.id.clone(), model);
        }
    }
}

fn has_capability(capabilities: &gateway_core::ProviderCapabilities, capability: Capability) -> bool {
    match capability {
        Capability::Streaming => capabilities.streaming,
        Capability::FunctionCalling => capabilities.function_calling,
        Capability::Vision => capabilities.vision,
        Capability::Embeddings => capabilities.embeddings,
        Capability::JsonMode => capabilities.json_mode,
        Capability::ParallelToolCalls => capabilities.parallel_tool_calls,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use futures::stream::BoxStream;
    use gateway_core::{ChatChunk, GatewayRequest, GatewayResponse, ProviderCapabilities};

    struct StubProvider {
        id: String,
        models: Vec<ModelInfo>,
        capabilities: ProviderCapabilities,
        health: HealthStatus,
    }

    #[async_trait]
    impl LLMProvider for StubProvider {
        fn id(&self) -> &str {
            &self.id
        }
        fn provider_type(&self) -> ProviderType {
            ProviderType::Local
        }
        fn capabilities(&self) -> &ProviderCapabilities {
            &self.capabilities
        }
        fn models(&self) -> &[ModelInfo] {
            &self.models
        }
        fn base_url(&self) -> &str {
            "local://stub"
        }
        async fn health_check(&self) -> HealthStatus {
            self.health
        }
        async fn chat_completion(
            &self,
            _request: &GatewayRequest,
        ) -> Result<GatewayResponse, GatewayError> {
            unimplemented!("not exercised by registry tests")
        }
        async fn chat_completion_stream(
            &self,
            _request: &GatewayRequest,
        ) -> Result<BoxStream<'static, Result<ChatChunk, GatewayError>>, GatewayError> {
            unimplemented!("not exercised by registry tests")
        }
    }

    fn stub(id: &str, model_ids: &[&str], health: HealthStatus) -> Arc<dyn LLMProvider> {
        Arc::new(StubProvider {
            id: id.to_string(),
            models: model_ids.iter().map(|m| ModelInfo::new(*m)).collect(),
            capabilities: ProviderCapabilities {
                streaming: true,
                ..ProviderCapabilities::default()
            },
            health,
        })
    }

    #[test]
    fn test_register_and_list() {
        let registry = ProviderRegistry::new();
        registry
            .register(stub("p1", &["m1", "m2"], HealthStatus::Healthy), 100, 100)
            .expect("register");
        assert_eq!(registry.list(None).len(), 2);
        assert!(registry.get("m1").is_some());
    }

    #[test]
    fn test_duplicate_provider_rejected() {
        let registry = ProviderRegistry::new();
        registry
            .register(stub("p1", &["m1"], HealthStatus::Healthy), 100, 100)
            .expect("register");
        let result = registry.register(stub("p1", &["m2"], HealthStatus::Healthy), 100, 100);
        assert!(matches!(result, Err(RegistryError::DuplicateProvider(_))));
    }

    #[test]
    fn test_duplicate_model_rejected() {
        let registry = ProviderRegistry::new();
        registry
            .register(stub("p1", &["m1"], HealthStatus::Healthy), 100, 100)
            .expect("register");
        let result = registry.register(stub("p2", &["m1"], HealthStatus::Healthy), 100, 100);
        assert!(matches!(result, Err(RegistryError::DuplicateModel(_))));
    }

    #[tokio::test]
    async fn test_max_models_lru_eviction() {
        let registry = ProviderRegistry::new();
        registry.set_max_models(1);
        registry
            .register(stub("p1", &["m1", "m2"], HealthStatus::Healthy), 100, 100)
            .expect("register");

        registry.mark_loaded("m1").await.expect("load m1");
        registry.mark_loaded("m2").await.expect("load m2");

        let m1 = registry.get("m1").expect("m1 still registered");
        assert_eq!(m1.info.id, "m1");
        // m1 was evicted (LRU), m2 remains loaded; registration for m1 is
        // preserved so it still appears in `list`.
        assert_eq!(registry.list(None).len(), 2);
    }

    #[tokio::test]
    async fn test_get_healthy_filters_unhealthy_providers() {
        let registry = ProviderRegistry::new();
        registry
            .register(stub("healthy", &["m1"], HealthStatus::Healthy), 100, 100)
            .expect("register");
        registry
            .register(stub("down", &["m2"], HealthStatus::Unhealthy), 100, 100)
            .expect("register");

        let healthy = registry.get_healthy().await;
        assert_eq!(healthy.len(), 1);
        assert_eq!(healthy[0].info.id, "m1");
    }

    #[test]
    fn test_register_model_requires_fields() {
        let registry = ProviderRegistry::new();
        registry
            .register(stub("p1", &[], HealthStatus::Healthy), 100, 100)
            .expect("register");

        let result = registry.register_model(ModelRegistration {
            id: String::new(),
            format: "gguf".to_string(),
            source: "local".to_string(),
            provider_id: "p1".to_string(),
            info: ModelInfo::new("m"),
        });
        assert!(matches!(result, Err(RegistryError::MissingField("id"))));
    }

    #[tokio::test]
    async fn test_events_emitted_on_registration() {
        let registry = ProviderRegistry::new();
        let mut rx = registry.subscribe();
        registry
            .register(stub("p1", &["m1"], HealthStatus::Healthy), 100, 100)
            .expect("register");
        let event = rx.try_recv().expect("registered event");
        assert!(matches!(event, RegistryEvent::Registered { .. }));
    }
}
