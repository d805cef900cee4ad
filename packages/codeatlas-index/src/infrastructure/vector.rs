//! Vector index (cosine similarity over embedded chunks)
//!
//! Collections are keyed per `(repo_id, snapshot_id)` and auto-created on
//! first write, with an in-memory existence cache (5-minute TTL). Small
//! collections search exactly; large ones fall back to an approximate
//! scan over the highest-importance points.
//!
//! Deletes are soft: `is_active` flips off and the ids join a bounded
//! deletion queue (10 000 ids, 5-minute TTL per entry). Compaction fires
//! on a per-collection threshold, on queue saturation (forced,
//! immediate), or from the background TTL flush; it is single-flight per
//! collection, re-queues once on failure, and drops with a critical log
//! on the second failure.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use tokio::sync::{Mutex, RwLock, Semaphore};
use tracing::{debug, error, info, warn};

use codeatlas_ir::{AtlasError, Result};

use crate::domain::document::{clamp_search_limit, IndexDocument, SearchHit, SearchSource};
use crate::domain::ports::EmbeddingPort;

#[derive(Debug, Clone)]
pub struct VectorIndexConfig {
    pub upsert_batch_size: usize,
    pub upsert_concurrency: usize,
    pub enable_soft_delete: bool,
    /// Per-collection compaction threshold (queued ids)
    pub batch_delete_threshold: usize,
    pub deletion_queue_max: usize,
    pub deletion_queue_ttl: Duration,
    pub collection_cache_ttl: Duration,
    /// Collections below this size search exactly
    pub exact_search_threshold: usize,
}

impl Default for VectorIndexConfig {
    fn default() -> Self {
        Self {
            upsert_batch_size: 256,
            upsert_concurrency: 8,
            enable_soft_delete: true,
            batch_delete_threshold: 100,
            deletion_queue_max: 10_000,
            deletion_queue_ttl: Duration::from_secs(300),
            collection_cache_ttl: Duration::from_secs(300),
            exact_search_threshold: 10_000,
        }
    }
}

struct QueueEntry {
    point_ids: Vec<String>,
    created_at: Instant,
}

/// Bounded deletion queue with TTL-based auto-flush.
pub struct BoundedDeletionQueue {
    max_size: usize,
    ttl: Duration,
    queues: Mutex<HashMap<String, QueueEntry>>,
}

impl BoundedDeletionQueue {
    pub fn new(max_size: usize, ttl: Duration) -> Self {
        Self {
            max_size,
            ttl,
            queues: Mutex::new(HashMap::new()),
        }
    }

    /// Add ids; false means the queue is full and the caller should force
    /// a flush.
    pub async fn add(&self, collection: &str, point_ids: Vec<String>) -> bool {
        let mut queues = self.queues.lock().await;
        let current: usize = queues.values().map(|e| e.point_ids.len()).sum();
        if current + point_ids.len() > self.max_size {
            warn!(
                current_size = current,
                max_size = self.max_size,
                attempted = point_ids.len(),
                "deletion_queue_full"
            );
            return false;
        }
        queues
            .entry(collection.to_string())
            .or_insert_with(|| QueueEntry {
                point_ids: Vec::new(),
                created_at: Instant::now(),
            })
            .point_ids
            .extend(point_ids);
        true
    }

    pub async fn pop_all(&self, collection: &str) -> Vec<String> {
        let mut queues = self.queues.lock().await;
        queues
            .remove(collection)
            .map(|e| e.point_ids)
            .unwrap_or_default()
    }

    /// Pop every TTL-expired entry.
    pub async fn pop_expired(&self) -> HashMap<String, Vec<String>> {
        let mut queues = self.queues.lock().await;
        let expired_keys: Vec<String> = queues
            .iter()
            .filter(|(_, e)| e.created_at.elapsed() >= self.ttl)
            .map(|(k, _)| k.clone())
            .collect();
        expired_keys
            .into_iter()
            .filter_map(|k| queues.remove(&k).map(|e| (k, e.point_ids)))
            .collect()
    }

    /// Pop a collection's ids when it crossed the threshold.
    pub async fn check_threshold(&self, collection: &str, threshold: usize) -> Option<Vec<String>> {
        let mut queues = self.queues.lock().await;
        let over = queues
            .get(collection)
            .map(|e| e.point_ids.len() >= threshold)
            .unwrap_or(false);
        if over {
            queues.remove(collection).map(|e| e.point_ids)
        } else {
            None
        }
    }

    pub async fn total_count(&self) -> usize {
        let queues = self.queues.lock().await;
        queues.values().map(|e| e.point_ids.len()).sum()
    }
}

#[derive(Debug, Clone)]
struct StoredPoint {
    chunk_id: String,
    vector: Vec<f32>,
    file_path: String,
    symbol_fqn: String,
    kind: String,
    language: String,
    tags: HashMap<String, String>,
    importance_score: f64,
    content_preview: String,
    is_active: bool,
    deleted_at: Option<u64>,
}

#[derive(Default)]
struct Collection {
    points: HashMap<String, StoredPoint>,
}

/// In-process vector index.
pub struct VectorIndex {
    config: VectorIndexConfig,
    embedder: Arc<dyn EmbeddingPort>,
    collections: RwLock<HashMap<String, Collection>>,
    deletion_queue: Arc<BoundedDeletionQueue>,
    /// collection → compaction in flight
    compaction_locks: Mutex<HashSet<String>>,
    /// Existence cache: avoids listing collections on every write
    collection_cache: Mutex<(HashSet<String>, Instant)>,
    running: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl VectorIndex {
    pub fn new(embedder: Arc<dyn EmbeddingPort>, config: VectorIndexConfig) -> Arc<Self> {
        let deletion_queue = Arc::new(BoundedDeletionQueue::new(
            config.deletion_queue_max,
            config.deletion_queue_ttl,
        ));
        Arc::new(Self {
            config,
            embedder,
            collections: RwLock::new(HashMap::new()),
            deletion_queue,
            compaction_locks: Mutex::new(HashSet::new()),
            collection_cache: Mutex::new((HashSet::new(), Instant::now())),
            running: Mutex::new(None),
        })
    }

    fn collection_name(repo_id: &str, snapshot_id: &str) -> String {
        let short: String = snapshot_id.chars().take(8).collect();
        format!("code_embeddings_{}_{}", repo_id, short)
    }

    /// Create the collection if missing, consulting the TTL'd cache first.
    async fn ensure_collection(&self, name: &str) {
        {
            let mut cache = self.collection_cache.lock().await;
            if cache.1.elapsed() > self.config.collection_cache_ttl {
                cache.0.clear();
                cache.1 = Instant::now();
            }
            if cache.0.contains(name) {
                return;
            }
        }

        let mut collections = self.collections.write().await;
        if !collections.contains_key(name) {
            info!(collection = %name, "vector_collection_creating");
            collections.insert(name.to_string(), Collection::default());
        }
        drop(collections);

        let mut cache = self.collection_cache.lock().await;
        cache.0.insert(name.to_string());
    }

    /// Manual cache invalidation (tests and external collection drops).
    pub async fn invalidate_collection_cache(&self) {
        let mut cache = self.collection_cache.lock().await;
        cache.0.clear();
        cache.1 = Instant::now();
    }

    pub async fn collection_exists(&self, repo_id: &str, snapshot_id: &str) -> bool {
        let name = Self::collection_name(repo_id, snapshot_id);
        self.collections.read().await.contains_key(&name)
    }

    /// Count of active points; the cold start trigger probes this.
    pub async fn count(&self, repo_id: &str, snapshot_id: &str) -> usize {
        let name = Self::collection_name(repo_id, snapshot_id);
        let collections = self.collections.read().await;
        collections
            .get(&name)
            .map(|c| c.points.values().filter(|p| p.is_active).count())
            .unwrap_or(0)
    }

    /// Full index: embed all documents and store them as active points.
    /// Batches embed concurrently, bounded by a semaphore.
    pub async fn index(
        &self,
        repo_id: &str,
        snapshot_id: &str,
        docs: &[IndexDocument],
    ) -> Result<()> {
        let name = Self::collection_name(repo_id, snapshot_id);
        self.ensure_collection(&name).await;

        let semaphore = Arc::new(Semaphore::new(self.config.upsert_concurrency));
        let mut handles = Vec::new();

        for batch in docs.chunks(self.config.upsert_batch_size) {
            let batch: Vec<IndexDocument> = batch.to_vec();
            let embedder = self.embedder.clone();
            let semaphore = semaphore.clone();
            handles.push(tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| AtlasError::internal(format!("semaphore closed: {}", e)))?;
                let texts: Vec<String> = batch.iter().map(|d| d.content.clone()).collect();
                let vectors = embedder.embed_batch(&texts).await?;
                Ok::<_, AtlasError>((batch, vectors))
            }));
        }

        let mut points = Vec::new();
        for handle in handles {
            let (batch, vectors) = handle
                .await
                .map_err(|e| AtlasError::internal(format!("embed task panicked: {}", e)))??;
            for (doc, vector) in batch.into_iter().zip(vectors) {
                points.push(StoredPoint {
                    chunk_id: doc.chunk_id.clone(),
                    vector,
                    file_path: doc.file_path.clone(),
                    symbol_fqn: doc.symbol_fqn.clone().unwrap_or_default(),
                    kind: doc.kind.clone(),
                    language: doc.language.clone(),
                    tags: doc.tags.clone(),
                    importance_score: doc.importance_score,
                    content_preview: doc.content_preview().to_string(),
                    is_active: true,
                    deleted_at: None,
                });
            }
        }

        let count = points.len();
        let mut collections = self.collections.write().await;
        let collection = collections.entry(name.clone()).or_default();
        for point in points {
            collection.points.insert(point.chunk_id.clone(), point);
        }
        drop(collections);

        info!(
            repo_id,
            snapshot_id,
            documents = count,
            collection = %name,
            "vector_index_completed"
        );
        Ok(())
    }

    /// Incremental upsert: same as a full index over the given documents.
    pub async fn upsert(
        &self,
        repo_id: &str,
        snapshot_id: &str,
        docs: &[IndexDocument],
    ) -> Result<()> {
        self.index(repo_id, snapshot_id, docs).await
    }

    /// Soft delete with queued compaction; falls back to a hard delete
    /// once if the soft path fails.
    pub async fn delete(
        self: &Arc<Self>,
        repo_id: &str,
        snapshot_id: &str,
        doc_ids: &[String],
    ) -> Result<()> {
        let name = Self::collection_name(repo_id, snapshot_id);

        if !self.config.enable_soft_delete {
            return self.hard_delete(&name, doc_ids).await;
        }

        match self.soft_delete(&name, doc_ids).await {
            Ok(()) => {}
            Err(e) => {
                warn!(collection = %name, error = %e, "soft_delete_failed_falling_back_to_hard");
                return self.hard_delete(&name, doc_ids).await;
            }
        }

        let added = self.deletion_queue.add(&name, doc_ids.to_vec()).await;
        if !added {
            // Queue saturated: compact immediately, then retry once
            warn!(collection = %name, "deletion_queue_full_forcing_compaction");
            self.compact_collection(&name).await;
            let retried = self.deletion_queue.add(&name, doc_ids.to_vec()).await;
            if !retried {
                error!(
                    collection = %name,
                    ids = doc_ids.len(),
                    "deletion_queue_add_failed_after_compaction"
                );
                return Err(AtlasError::store_failure(
                    "deletion queue still saturated after forced compaction",
                ));
            }
        } else if let Some(ids) = self
            .deletion_queue
            .check_threshold(&name, self.config.batch_delete_threshold)
            .await
        {
            // Background compaction with re-queue on failure
            let this = Arc::clone(self);
            let collection = name.clone();
            tokio::spawn(async move {
                this.compact_ids(&collection, ids).await;
            });
        }

        Ok(())
    }

    async fn soft_delete(&self, collection_name: &str, doc_ids: &[String]) -> Result<()> {
        let mut collections = self.collections.write().await;
        let collection = collections
            .get_mut(collection_name)
            .ok_or_else(|| AtlasError::store_failure("collection does not exist"))?;
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        for id in doc_ids {
            if let Some(point) = collection.points.get_mut(id) {
                point.is_active = false;
                point.deleted_at = Some(now);
            }
        }
        info!(
            collection = %collection_name,
            deleted = doc_ids.len(),
            mode = "soft",
            "vector_delete_completed"
        );
        Ok(())
    }

    async fn hard_delete(&self, collection_name: &str, doc_ids: &[String]) -> Result<()> {
        let mut collections = self.collections.write().await;
        let Some(collection) = collections.get_mut(collection_name) else {
            return Ok(());
        };
        for id in doc_ids {
            collection.points.remove(id);
        }
        info!(
            collection = %collection_name,
            deleted = doc_ids.len(),
            mode = "hard",
            "vector_delete_completed"
        );
        Ok(())
    }

    /// Compact everything queued for one collection (single-flight).
    pub async fn compact_collection(&self, collection_name: &str) {
        {
            let mut locks = self.compaction_locks.lock().await;
            if !locks.insert(collection_name.to_string()) {
                debug!(collection = %collection_name, "compaction_already_running");
                return;
            }
        }

        let ids = self.deletion_queue.pop_all(collection_name).await;
        if !ids.is_empty() {
            if let Err(e) = self.hard_delete(collection_name, &ids).await {
                error!(collection = %collection_name, error = %e, "vector_compaction_failed");
                // Best-effort re-queue; a second failure drops the batch
                if !self.deletion_queue.add(collection_name, ids.clone()).await {
                    error!(
                        collection = %collection_name,
                        lost = ids.len(),
                        "compaction_requeue_failed_dropping_batch"
                    );
                }
            } else {
                info!(
                    collection = %collection_name,
                    compacted = ids.len(),
                    "vector_compaction_completed"
                );
            }
        }

        let mut locks = self.compaction_locks.lock().await;
        locks.remove(collection_name);
    }

    /// Compact specific ids already popped from the queue.
    async fn compact_ids(&self, collection_name: &str, ids: Vec<String>) {
        {
            let mut locks = self.compaction_locks.lock().await;
            if !locks.insert(collection_name.to_string()) {
                debug!(collection = %collection_name, "compaction_already_running");
                // Another flight owns the collection; hand the batch back
                let _ = self.deletion_queue.add(collection_name, ids).await;
                return;
            }
        }

        if let Err(e) = self.hard_delete(collection_name, &ids).await {
            error!(collection = %collection_name, error = %e, "vector_compaction_failed_requeuing");
            if !self.deletion_queue.add(collection_name, ids.clone()).await {
                error!(
                    collection = %collection_name,
                    lost = ids.len(),
                    "compaction_requeue_failed_dropping_batch"
                );
            }
        } else {
            info!(
                collection = %collection_name,
                compacted = ids.len(),
                "vector_compaction_completed"
            );
        }

        let mut locks = self.compaction_locks.lock().await;
        locks.remove(collection_name);
    }

    /// Start the background TTL flush loop (checks every 60 seconds).
    pub async fn start_ttl_flush_task(self: &Arc<Self>) {
        let mut running = self.running.lock().await;
        if running.is_some() {
            return;
        }
        let this = Arc::clone(self);
        *running = Some(tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_secs(60)).await;
                let expired = this.deletion_queue.pop_expired().await;
                for (collection, ids) in expired {
                    info!(collection = %collection, count = ids.len(), "ttl_flush_triggered");
                    this.compact_ids(&collection, ids).await;
                }
            }
        }));
        info!("ttl_flush_task_started");
    }

    pub async fn stop_ttl_flush_task(&self) {
        let mut running = self.running.lock().await;
        if let Some(handle) = running.take() {
            handle.abort();
            info!("ttl_flush_task_stopped");
        }
    }

    /// Flush the deletion queue for one collection (or all) immediately.
    pub async fn flush_deletion_queue(&self, collection_name: Option<&str>) -> usize {
        match collection_name {
            Some(name) => {
                let ids = self.deletion_queue.pop_all(name).await;
                let count = ids.len();
                if !ids.is_empty() && self.hard_delete(name, &ids).await.is_err() {
                    let _ = self.deletion_queue.add(name, ids).await;
                    return 0;
                }
                count
            }
            None => {
                let mut total = 0;
                let names: Vec<String> = {
                    let collections = self.collections.read().await;
                    collections.keys().cloned().collect()
                };
                for name in names {
                    total += Box::pin(self.flush_deletion_queue(Some(&name))).await;
                }
                total
            }
        }
    }

    pub async fn deletion_queue_size(&self) -> usize {
        self.deletion_queue.total_count().await
    }

    /// Cosine similarity search. Exact below the adaptive threshold,
    /// otherwise an approximate scan over the highest-importance points.
    pub async fn search(
        &self,
        repo_id: &str,
        snapshot_id: &str,
        query: &str,
        limit: usize,
        chunk_ids: Option<&[String]>,
        include_inactive: bool,
    ) -> Result<Vec<SearchHit>> {
        let limit = clamp_search_limit(limit);
        let name = Self::collection_name(repo_id, snapshot_id);

        let query_vector = self.embedder.embed(query).await?;

        let collections = self.collections.read().await;
        let Some(collection) = collections.get(&name) else {
            return Ok(Vec::new());
        };

        let mut candidates: Vec<&StoredPoint> = collection
            .points
            .values()
            .filter(|p| include_inactive || p.is_active)
            .filter(|p| match chunk_ids {
                Some(ids) => ids.contains(&p.chunk_id),
                None => true,
            })
            .collect();

        if candidates.len() > self.config.exact_search_threshold {
            // Approximate: restrict the scan to the most important points
            debug!(
                collection = %name,
                points = candidates.len(),
                "vector_search_approximate"
            );
            candidates.sort_by(|a, b| {
                b.importance_score
                    .partial_cmp(&a.importance_score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            candidates.truncate(self.config.exact_search_threshold);
        }

        let mut scored: Vec<SearchHit> = candidates
            .into_iter()
            .map(|p| {
                let score = cosine_similarity(&query_vector, &p.vector) as f64;
                let mut hit = SearchHit::new(&p.chunk_id, score, SearchSource::Vector)
                    .with_meta("file_path", &p.file_path)
                    .with_meta("symbol_fqn", &p.symbol_fqn)
                    .with_meta("kind", &p.kind)
                    .with_meta("language", &p.language)
                    .with_meta("content_preview", &p.content_preview);
                for (key, value) in &p.tags {
                    hit = hit.with_meta(format!("tag:{}", key), value);
                }
                hit
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        Ok(scored)
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
