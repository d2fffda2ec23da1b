//! Similarity index for embedding lookups.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::debug;

use crate::Embedding;
use crate::error::{EmbeddingError, Result};
use crate::similarity::{
    MostSimilar, SimilarityResult, cosine_similarity, find_most_similar, find_top_k, normalize,
};

/// A stored document embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Document id.
    pub id: String,

    /// The embedding vector (normalized unless disabled on the index).
    pub embedding: Embedding,

    /// Caller data returned with search hits.
    pub metadata: Option<serde_json::Value>,
}

/// A document embedding set that outlives a single query.
///
/// Entries are kept ordered by id so searches, ties, and serialized output
/// are reproducible.
#[derive(Debug, Clone)]
pub struct SimilarityIndex {
    entries: BTreeMap<String, IndexEntry>,

    dimension: usize,

    /// Scale vectors to unit length on insert.
    normalize_embeddings: bool,
}

impl SimilarityIndex {
    /// An empty index for vectors of length `dimension`.
    pub fn new(dimension: usize) -> Self {
        Self {
            entries: BTreeMap::new(),
            dimension,
            normalize_embeddings: true,
        }
    }

    /// Store vectors exactly as given.
    pub fn without_normalization(mut self) -> Self {
        self.normalize_embeddings = false;
        self
    }

    /// Dimension every stored embedding must have.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    fn check_dimension(&self, embedding: &[f32]) -> Result<()> {
        if embedding.len() != self.dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }
        Ok(())
    }

    fn prepare(&self, mut embedding: Embedding) -> Result<Embedding> {
        self.check_dimension(&embedding)?;
        if self.normalize_embeddings {
            normalize(&mut embedding);
        }
        Ok(embedding)
    }

    /// Add an embedding to the index, replacing any entry with the same id.
    pub fn add(
        &mut self,
        id: impl Into<String>,
        embedding: Embedding,
        metadata: Option<serde_json::Value>,
    ) -> Result<()> {
        let id = id.into();
        let embedding = self.prepare(embedding)?;

        self.entries.insert(
            id.clone(),
            IndexEntry {
                id: id.clone(),
                embedding,
                metadata,
            },
        );
        debug!("Indexed {id}");

        Ok(())
    }

    /// Add an embedding only if the id is not already present.
    ///
    /// Returns `true` when the entry was inserted. Existing entries are left
    /// untouched.
    pub fn insert_if_absent(
        &mut self,
        id: impl Into<String>,
        embedding: Embedding,
        metadata: Option<serde_json::Value>,
    ) -> Result<bool> {
        let id = id.into();
        if self.entries.contains_key(&id) {
            debug!("Index already holds {id}, skipping");
            return Ok(false);
        }
        self.add(id, embedding, metadata)?;
        Ok(true)
    }

    pub fn remove(&mut self, id: &str) -> Option<IndexEntry> {
        self.entries.remove(id)
    }

    pub fn get(&self, id: &str) -> Option<&IndexEntry> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Number of stored documents.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Find the single entry most similar to `query`.
    pub fn nearest(&self, query: &[f32]) -> Result<MostSimilar> {
        self.check_dimension(query)?;
        find_most_similar(
            self.entries
                .values()
                .map(|e| (e.id.as_str(), e.embedding.as_slice())),
            query,
        )
    }

    /// Search for the `k` most similar embeddings scoring at least `min_score`.
    pub fn search(&self, query: &[f32], k: usize, min_score: f32) -> Result<Vec<SimilarityResult>> {
        let query = self.prepare(query.to_vec())?;

        let candidates: Vec<(String, Embedding)> = self
            .entries
            .values()
            .map(|e| (e.id.clone(), e.embedding.clone()))
            .collect();

        let mut results = find_top_k(&query, &candidates, k, min_score)?;

        for result in &mut results {
            if let Some(entry) = self.entries.get(&result.id) {
                result.metadata = entry.metadata.clone();
            }
        }

        Ok(results)
    }

    /// Cosine similarity between two stored documents.
    pub fn similarity(&self, id1: &str, id2: &str) -> Result<f32> {
        let entry1 = self
            .entries
            .get(id1)
            .ok_or_else(|| EmbeddingError::NotFound(id1.to_string()))?;
        let entry2 = self
            .entries
            .get(id2)
            .ok_or_else(|| EmbeddingError::NotFound(id2.to_string()))?;

        cosine_similarity(&entry1.embedding, &entry2.embedding)
    }

    /// Get all IDs in the index, in ascending order.
    pub fn ids(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        debug!("Cleared similarity index");
    }

    /// Entries as a JSON array, ordered by id.
    pub fn to_json(&self) -> Result<String> {
        let entries: Vec<&IndexEntry> = self.entries.values().collect();
        Ok(serde_json::to_string(&entries)?)
    }

    /// Rebuild an index from [`SimilarityIndex::to_json`] output.
    ///
    /// Entries are taken as stored; they are not normalized again.
    pub fn from_json(json: &str, dimension: usize) -> Result<Self> {
        let entries: Vec<IndexEntry> = serde_json::from_str(json)?;

        let mut index = Self::new(dimension);
        for entry in entries {
            index.check_dimension(&entry.embedding)?;
            index.entries.insert(entry.id.clone(), entry);
        }

        debug!("Restored {} index entries", index.len());
        Ok(index)
    }

    /// Write the index to `path` as JSON, creating parent directories.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = self.to_json()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        fs::write(path, content).await?;
        debug!("Saved {} index entries to {}", self.len(), path.display());
        Ok(())
    }

    /// Read an index previously written by [`SimilarityIndex::save`].
    pub async fn load(path: impl AsRef<Path>, dimension: usize) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).await?;
        Self::from_json(&content, dimension)
    }

    /// Move every entry of `other` into this index. Entries in `other` win.
    pub fn merge(&mut self, other: SimilarityIndex) -> Result<()> {
        if other.dimension != self.dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimension,
                actual: other.dimension,
            });
        }

        let count = other.entries.len();
        self.entries.extend(other.entries);

        debug!("Merged {count} index entries");
        Ok(())
    }
}
