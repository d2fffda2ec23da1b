//! Embedding cache to avoid re-embedding identical text.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::Embedding;
use crate::error::{EmbeddingError, Result};
use crate::provider::{EmbeddingProvider, EmbeddingRequest, EmbeddingResponse, TaskType};

/// A cached vector with its key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Digest of the request that produced the embedding.
    pub key: String,

    pub embedding: Embedding,

    pub model: String,

    /// Insertion order, used for eviction.
    pub sequence: u64,
}

/// Identifies a cached embedding.
///
/// The same text embedded as a query and as a document yields different
/// vectors, so the task type and output dimension are part of the key.
#[derive(Debug, Clone, Copy)]
pub struct CacheKey<'a> {
    pub text: &'a str,
    pub model: &'a str,
    pub task_type: Option<TaskType>,
    pub dimensions: Option<usize>,
}

impl<'a> CacheKey<'a> {
    /// Key for plain text under a model, with no task hint.
    pub fn new(text: &'a str, model: &'a str) -> Self {
        Self {
            text,
            model,
            task_type: None,
            dimensions: None,
        }
    }

    /// Key for a provider request resolved against `model`.
    pub fn for_request(request: &'a EmbeddingRequest, model: &'a str) -> Self {
        Self {
            text: &request.text,
            model,
            task_type: request.task_type,
            dimensions: request.dimensions,
        }
    }

    fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.model.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.task_type.map(TaskType::as_str).unwrap_or("").as_bytes());
        hasher.update([0u8]);
        hasher.update(self.dimensions.unwrap_or(0).to_le_bytes());
        hasher.update(self.text.as_bytes());
        hasher
            .finalize()
            .iter()
            .map(|byte| format!("{byte:02x}"))
            .collect()
    }
}

/// Bounded cache for embeddings, optionally persisted as JSON.
pub struct EmbeddingCache {
    cache: RwLock<HashMap<String, CacheEntry>>,

    /// JSON file written on every insert, when set.
    cache_path: Option<PathBuf>,

    /// Zero disables caching.
    max_entries: usize,

    next_sequence: AtomicU64,
}

impl EmbeddingCache {
    /// An in-memory cache holding at most `max_entries` vectors.
    pub fn new(max_entries: usize) -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
            cache_path: None,
            max_entries,
            next_sequence: AtomicU64::new(0),
        }
    }

    /// Create a cache with persistent storage, loading any existing file.
    pub async fn with_persistence(path: impl AsRef<Path>, max_entries: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let cache = Self {
            cache_path: Some(path.clone()),
            ..Self::new(max_entries)
        };

        if fs::try_exists(&path).await? {
            cache.load(&path).await?;
        }

        Ok(cache)
    }

    pub async fn get(&self, key: CacheKey<'_>) -> Option<Embedding> {
        let digest = key.digest();
        let cache = self.cache.read().await;
        cache.get(&digest).map(|e| e.embedding.clone())
    }

    /// Put an embedding in the cache, evicting the oldest entry when full.
    pub async fn put(&self, key: CacheKey<'_>, embedding: Embedding) -> Result<()> {
        if self.max_entries == 0 {
            return Ok(());
        }

        let digest = key.digest();
        let entry = CacheEntry {
            key: digest.clone(),
            embedding,
            model: key.model.to_string(),
            sequence: self.next_sequence.fetch_add(1, Ordering::Relaxed),
        };

        {
            let mut cache = self.cache.write().await;

            if !cache.contains_key(&digest) && cache.len() >= self.max_entries {
                if let Some(oldest_key) = cache
                    .values()
                    .min_by_key(|e| e.sequence)
                    .map(|e| e.key.clone())
                {
                    cache.remove(&oldest_key);
                    debug!("Evicted cached embedding {oldest_key}");
                }
            }

            cache.insert(digest, entry);
        }
        debug!("Cached embedding (model: {})", key.model);

        if self.cache_path.is_some() {
            self.save().await?;
        }

        Ok(())
    }

    pub async fn contains(&self, key: CacheKey<'_>) -> bool {
        self.cache.read().await.contains_key(&key.digest())
    }

    pub async fn remove(&self, key: CacheKey<'_>) {
        self.cache.write().await.remove(&key.digest());
    }

    pub async fn clear(&self) {
        self.cache.write().await.clear();
        debug!("Embedding cache emptied");
    }

    pub async fn stats(&self) -> CacheStats {
        let cache = self.cache.read().await;
        let mut models: Vec<String> = cache
            .values()
            .map(|e| e.model.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        models.sort();

        CacheStats {
            entries: cache.len(),
            max_entries: self.max_entries,
            models,
        }
    }

    async fn save(&self) -> Result<()> {
        let Some(path) = &self.cache_path else {
            return Ok(());
        };

        let content = {
            let cache = self.cache.read().await;
            let mut entries: Vec<&CacheEntry> = cache.values().collect();
            entries.sort_by_key(|e| e.sequence);
            serde_json::to_string(&entries)?
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        fs::write(path, content).await?;
        debug!("Saved embedding cache to {}", path.display());
        Ok(())
    }

    async fn load(&self, path: &Path) -> Result<()> {
        let content = fs::read_to_string(path).await?;
        let entries: Vec<CacheEntry> = serde_json::from_str(&content)
            .map_err(|e| EmbeddingError::Cache(format!("corrupt cache file: {e}")))?;

        let mut cache = self.cache.write().await;
        let mut next = 0;
        for entry in entries {
            next = next.max(entry.sequence + 1);
            cache.insert(entry.key.clone(), entry);
        }
        self.next_sequence.store(next, Ordering::Relaxed);

        info!("Restored {} cached embeddings from disk", cache.len());
        Ok(())
    }
}

/// Snapshot returned by [`EmbeddingCache::stats`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    pub entries: usize,

    pub max_entries: usize,

    /// Models with cached embeddings, sorted.
    pub models: Vec<String>,
}

/// A provider wrapper that serves repeated requests from an [`EmbeddingCache`].
pub struct CachedProvider<P> {
    provider: P,
    cache: EmbeddingCache,
}

impl<P> CachedProvider<P>
where
    P: EmbeddingProvider,
{
    pub fn new(provider: P, cache: EmbeddingCache) -> Self {
        Self { provider, cache }
    }

    pub fn cache(&self) -> &EmbeddingCache {
        &self.cache
    }

    pub fn inner(&self) -> &P {
        &self.provider
    }

    fn model_for(&self, request: &EmbeddingRequest) -> String {
        request
            .model
            .clone()
            .unwrap_or_else(|| self.provider.default_model().to_string())
    }
}

#[async_trait]
impl<P> EmbeddingProvider for CachedProvider<P>
where
    P: EmbeddingProvider,
{
    fn name(&self) -> &str {
        self.provider.name()
    }

    fn default_model(&self) -> &str {
        self.provider.default_model()
    }

    fn default_dimension(&self) -> usize {
        self.provider.default_dimension()
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse> {
        let model = self.model_for(&request);

        if let Some(embedding) = self.cache.get(CacheKey::for_request(&request, &model)).await {
            debug!("Embedding served from cache");
            return Ok(EmbeddingResponse::new(embedding, model));
        }

        let response = self.provider.embed(request.clone()).await?;
        self.cache
            .put(
                CacheKey::for_request(&request, &model),
                response.embedding.clone(),
            )
            .await?;

        Ok(response)
    }

    /// Hits are answered from the cache; every miss goes to the wrapped
    /// provider in a single `embed_batch` call.
    async fn embed_batch(
        &self,
        requests: Vec<EmbeddingRequest>,
    ) -> Result<Vec<EmbeddingResponse>> {
        let total = requests.len();
        let mut results: Vec<Option<EmbeddingResponse>> = Vec::with_capacity(total);
        let mut miss_slots = Vec::new();
        let mut misses = Vec::new();

        for (slot, request) in requests.into_iter().enumerate() {
            let model = self.model_for(&request);
            match self.cache.get(CacheKey::for_request(&request, &model)).await {
                Some(embedding) => results.push(Some(EmbeddingResponse::new(embedding, model))),
                None => {
                    results.push(None);
                    miss_slots.push(slot);
                    misses.push(request);
                }
            }
        }

        if !misses.is_empty() {
            debug!("{} of {total} embeddings served from cache", total - misses.len());
            let responses = self.provider.embed_batch(misses.clone()).await?;
            if responses.len() != misses.len() {
                return Err(EmbeddingError::InvalidResponse(format!(
                    "expected {} embeddings, got {}",
                    misses.len(),
                    responses.len()
                )));
            }

            for ((slot, request), response) in miss_slots.into_iter().zip(&misses).zip(responses) {
                let model = self.model_for(request);
                self.cache
                    .put(
                        CacheKey::for_request(request, &model),
                        response.embedding.clone(),
                    )
                    .await?;
                results[slot] = Some(response);
            }
        }

        results
            .into_iter()
            .map(|response| {
                response.ok_or_else(|| {
                    EmbeddingError::InvalidResponse("missing embedding in batch".to_string())
                })
            })
            .collect()
    }

    fn is_available(&self) -> bool {
        self.provider.is_available()
    }
}
