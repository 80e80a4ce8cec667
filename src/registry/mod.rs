//! Model registry: version chains, the active artifact, and the hydrated
//! artifact cache.
//!
//! The registry maps `(dataset name, model type)` to a chain of persisted
//! artifact versions. Exactly one artifact per key is active: the one with
//! the highest surviving version. Versions are assigned under the registry
//! write lock, so concurrent registrations resolve by version ordering and
//! never by wall-clock time.
//!
//! Hydrated artifacts live in an explicit bounded LRU cache. Eviction only
//! drops the in-memory copy; routing metadata survives, and an evicted
//! artifact is restored from storage on the next request.

use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use crate::error::{HeraldError, Result};
use crate::ml::artifact::{ArtifactHandle, ArtifactStore, ModelArtifact};
use crate::ml::backend::ModelType;
use crate::storage::Storage;

type RegistryKey = (String, ModelType);
type CacheKey = (String, ModelType, u64);

/// Routing metadata for one registered artifact version.
#[derive(Debug, Clone)]
pub struct VersionEntry {
    pub version: u64,
    pub handle: ArtifactHandle,
}

#[derive(Debug, Default)]
struct Route {
    /// Highest version ever assigned for this key. Survives pruning so
    /// versions are never reused and handles never collide.
    last_version: u64,
    entries: Vec<VersionEntry>,
}

impl Route {
    fn active(&self) -> Option<&VersionEntry> {
        self.entries.iter().max_by_key(|entry| entry.version)
    }
}

/// Bounded LRU cache of hydrated artifacts.
///
/// Recency is a monotonic touch counter rather than wall-clock time, so
/// eviction order is deterministic and testable.
#[derive(Debug)]
struct ArtifactCache {
    capacity: usize,
    tick: u64,
    entries: AHashMap<CacheKey, (Arc<ModelArtifact>, u64)>,
}

impl ArtifactCache {
    fn new(capacity: usize) -> Self {
        ArtifactCache {
            capacity,
            tick: 0,
            entries: AHashMap::new(),
        }
    }

    fn get(&mut self, key: &CacheKey) -> Option<Arc<ModelArtifact>> {
        self.tick += 1;
        let tick = self.tick;
        self.entries.get_mut(key).map(|(artifact, touched)| {
            *touched = tick;
            artifact.clone()
        })
    }

    fn insert(&mut self, key: CacheKey, artifact: Arc<ModelArtifact>) {
        if self.capacity == 0 {
            return;
        }
        self.tick += 1;
        self.entries.insert(key, (artifact, self.tick));
        if self.entries.len() > self.capacity {
            if let Some(oldest) = self
                .entries
                .iter()
                .min_by_key(|(_, (_, touched))| *touched)
                .map(|(key, _)| key.clone())
            {
                debug!(dataset = %oldest.0, model = %oldest.1, version = oldest.2, "evicting hydrated artifact");
                self.entries.remove(&oldest);
            }
        }
    }

    fn remove(&mut self, key: &CacheKey) {
        self.entries.remove(key);
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// The model registry.
pub struct ModelRegistry {
    artifacts: ArtifactStore,
    routes: RwLock<AHashMap<RegistryKey, Route>>,
    cache: Mutex<ArtifactCache>,
}

impl std::fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("routes", &self.routes.read().len())
            .field("cached", &self.cache.lock().len())
            .finish()
    }
}

impl ModelRegistry {
    /// Create a registry persisting artifacts to `storage`, keeping at most
    /// `cache_capacity` hydrated artifacts resident.
    pub fn new(storage: Arc<dyn Storage>, cache_capacity: usize) -> Self {
        ModelRegistry {
            artifacts: ArtifactStore::new(storage),
            routes: RwLock::new(AHashMap::new()),
            cache: Mutex::new(ArtifactCache::new(cache_capacity)),
        }
    }

    /// Open a registry over existing storage, rebuilding routing metadata
    /// from the persisted artifacts found there.
    pub fn open(storage: Arc<dyn Storage>, cache_capacity: usize) -> Result<Self> {
        let registry = Self::new(storage.clone(), cache_capacity);
        {
            let mut routes = registry.routes.write();
            for name in storage.list()? {
                let Some((dataset, model_type, version)) = parse_handle_name(&name) else {
                    continue;
                };
                let route = routes.entry((dataset, model_type)).or_default();
                route.entries.push(VersionEntry {
                    version,
                    handle: ArtifactHandle::from_name(&name),
                });
                route.last_version = route.last_version.max(version);
            }
        }
        Ok(registry)
    }

    /// Register a trained artifact draft: assign the next version, persist
    /// it, and make it active.
    ///
    /// The version chain is only extended after the artifact is fully
    /// persisted, so readers never route to a partially written artifact.
    pub fn register(&self, draft: ModelArtifact) -> Result<Arc<ModelArtifact>> {
        let key: RegistryKey = (draft.dataset_name.clone(), draft.model_type);

        let version = {
            let mut routes = self.routes.write();
            let route = routes.entry(key.clone()).or_default();
            route.last_version += 1;
            route.last_version
        };

        let artifact = Arc::new(ModelArtifact { version, ..draft });
        let handle = self.artifacts.persist(&artifact)?;

        {
            let mut routes = self.routes.write();
            let route = routes.entry(key.clone()).or_default();
            route.entries.push(VersionEntry { version, handle });
        }
        self.cache
            .lock()
            .insert((key.0.clone(), key.1, version), artifact.clone());

        info!(
            dataset = %artifact.dataset_name,
            model = %artifact.model_type,
            version,
            "artifact registered as active"
        );
        Ok(artifact)
    }

    /// Get the active artifact for a key, rehydrating from storage if it was
    /// evicted.
    pub fn get_active(&self, dataset_name: &str, model_type: ModelType) -> Result<Arc<ModelArtifact>> {
        let entry = {
            let routes = self.routes.read();
            routes
                .get(&(dataset_name.to_string(), model_type))
                .and_then(|route| route.active().cloned())
        }
        .ok_or_else(|| {
            HeraldError::no_trained_model(format!("{dataset_name}/{model_type}"))
        })?;

        self.hydrate(dataset_name, model_type, &entry)
    }

    /// Get a specific retained version.
    pub fn get_version(
        &self,
        dataset_name: &str,
        model_type: ModelType,
        version: u64,
    ) -> Result<Arc<ModelArtifact>> {
        let entry = {
            let routes = self.routes.read();
            routes
                .get(&(dataset_name.to_string(), model_type))
                .and_then(|route| route.entries.iter().find(|e| e.version == version).cloned())
        }
        .ok_or_else(|| {
            HeraldError::not_found(format!("artifact {dataset_name}/{model_type} v{version}"))
        })?;

        self.hydrate(dataset_name, model_type, &entry)
    }

    fn hydrate(
        &self,
        dataset_name: &str,
        model_type: ModelType,
        entry: &VersionEntry,
    ) -> Result<Arc<ModelArtifact>> {
        let cache_key = (dataset_name.to_string(), model_type, entry.version);
        if let Some(artifact) = self.cache.lock().get(&cache_key) {
            return Ok(artifact);
        }

        let artifact = Arc::new(self.artifacts.restore(&entry.handle)?);
        self.cache.lock().insert(cache_key, artifact.clone());
        debug!(dataset = %dataset_name, model = %model_type, version = entry.version, "artifact rehydrated");
        Ok(artifact)
    }

    /// Model types with at least one trained artifact for a dataset, sorted.
    pub fn list(&self, dataset_name: &str) -> Vec<ModelType> {
        let routes = self.routes.read();
        let mut types: Vec<ModelType> = routes
            .iter()
            .filter(|((dataset, _), route)| dataset == dataset_name && !route.entries.is_empty())
            .map(|((_, model_type), _)| *model_type)
            .collect();
        types.sort();
        types
    }

    /// Retained versions for a key, ascending.
    pub fn versions(&self, dataset_name: &str, model_type: ModelType) -> Vec<u64> {
        let routes = self.routes.read();
        let mut versions: Vec<u64> = routes
            .get(&(dataset_name.to_string(), model_type))
            .map(|route| route.entries.iter().map(|e| e.version).collect())
            .unwrap_or_default();
        versions.sort_unstable();
        versions
    }

    /// Explicitly destroy one retained version.
    ///
    /// Pruning the active version re-activates the highest remaining one,
    /// which is the rollback path. Artifacts are never pruned automatically.
    pub fn prune(&self, dataset_name: &str, model_type: ModelType, version: u64) -> Result<()> {
        let key = (dataset_name.to_string(), model_type);
        let handle = {
            let mut routes = self.routes.write();
            let route = routes
                .get_mut(&key)
                .ok_or_else(|| HeraldError::not_found(format!("{dataset_name}/{model_type}")))?;
            let position = route
                .entries
                .iter()
                .position(|e| e.version == version)
                .ok_or_else(|| {
                    HeraldError::not_found(format!(
                        "artifact {dataset_name}/{model_type} v{version}"
                    ))
                })?;
            route.entries.remove(position).handle
        };

        self.cache.lock().remove(&(key.0.clone(), key.1, version));
        self.artifacts.delete(&handle)?;
        info!(dataset = %dataset_name, model = %model_type, version, "artifact pruned");
        Ok(())
    }

    /// Number of hydrated artifacts currently resident.
    pub fn cached_count(&self) -> usize {
        self.cache.lock().len()
    }
}

/// Recover `(dataset, model type, version)` from a persisted handle name.
fn parse_handle_name(name: &str) -> Option<(String, ModelType, u64)> {
    let stem = name.strip_suffix(".artifact")?;
    let (rest, version_part) = stem.rsplit_once("__")?;
    let version: u64 = version_part.strip_prefix('v')?.parse().ok()?;
    let (dataset, model_key) = rest.rsplit_once("__")?;
    let model_type: ModelType = model_key.parse().ok()?;
    Some((dataset.to_string(), model_type, version))
}
