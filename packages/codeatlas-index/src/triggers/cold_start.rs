//! Cold start indexing
//!
//! On boot, enumerate known repositories, probe the store for an existing
//! index (a point-count probe), and schedule a full rebuild for the rest.
//! Rebuilds run as background tasks so readers are never blocked; the
//! synchronous mode exists for CLIs and tests.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use codeatlas_ir::Result;

use crate::config::EnvConfig;
use crate::infrastructure::store::MultiIndexStore;

/// A repository known to the system
#[derive(Debug, Clone)]
pub struct RepoEntry {
    pub repo_id: String,
    pub snapshot_id: String,
    pub root_path: String,
}

/// Performs the actual full rebuild of one repository.
#[async_trait]
pub trait Reindexer: Send + Sync {
    async fn reindex(&self, repo: &RepoEntry) -> Result<usize>;
}

/// Outcome of one cold start pass
#[derive(Debug, Default)]
pub struct ColdStartReport {
    pub checked: usize,
    pub already_indexed: usize,
    pub scheduled: usize,
}

/// Explicit lifecycle object constructed at boot; no global state.
pub struct ColdStartManager {
    store: Arc<MultiIndexStore>,
    reindexer: Arc<dyn Reindexer>,
    enabled: bool,
    background: bool,
    handles: parking_lot::Mutex<Vec<JoinHandle<()>>>,
}

impl ColdStartManager {
    pub fn new(
        store: Arc<MultiIndexStore>,
        reindexer: Arc<dyn Reindexer>,
        config: &EnvConfig,
    ) -> Self {
        Self {
            store,
            reindexer,
            enabled: config.cold_start_enabled,
            background: config.cold_start_background,
            handles: parking_lot::Mutex::new(Vec::new()),
        }
    }

    /// Check every repository and index the ones the store has no points
    /// for.
    pub async fn check_and_index(&self, repos: &[RepoEntry]) -> Result<ColdStartReport> {
        let mut report = ColdStartReport {
            checked: repos.len(),
            ..Default::default()
        };

        if !self.enabled {
            info!("cold_start_disabled");
            return Ok(report);
        }

        for repo in repos {
            if self.store.is_indexed(&repo.repo_id, &repo.snapshot_id).await {
                report.already_indexed += 1;
                continue;
            }

            report.scheduled += 1;
            if self.background {
                let reindexer = self.reindexer.clone();
                let repo = repo.clone();
                let handle = tokio::spawn(async move {
                    info!(repo_id = %repo.repo_id, "cold_start_reindex_started");
                    match reindexer.reindex(&repo).await {
                        Ok(count) => {
                            info!(repo_id = %repo.repo_id, files = count, "cold_start_reindex_completed");
                        }
                        Err(e) => {
                            warn!(repo_id = %repo.repo_id, error = %e, "cold_start_reindex_failed");
                        }
                    }
                });
                self.handles.lock().push(handle);
            } else {
                let count = self.reindexer.reindex(repo).await?;
                info!(repo_id = %repo.repo_id, files = count, "cold_start_reindex_completed");
            }
        }

        info!(
            checked = report.checked,
            already_indexed = report.already_indexed,
            scheduled = report.scheduled,
            "cold_start_check_completed"
        );
        Ok(report)
    }

    /// Wait for all scheduled background rebuilds (tests and shutdown).
    pub async fn join_background(&self) {
        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.handles.lock());
        for handle in handles {
            let _ = handle.await;
        }
    }

    /// Abort any in-flight background rebuilds.
    pub fn stop(&self) {
        for handle in self.handles.lock().drain(..) {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::document::IndexDocument;
    use crate::domain::ports::IndexingPort;
    use crate::infrastructure::embedding::HashingEmbedder;
    use crate::infrastructure::vector::VectorIndexConfig;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingReindexer {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Reindexer for CountingReindexer {
        async fn reindex(&self, _repo: &RepoEntry) -> Result<usize> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(1)
        }
    }

    fn store() -> Arc<MultiIndexStore> {
        MultiIndexStore::new(
            Arc::new(HashingEmbedder::new(32)),
            VectorIndexConfig::default(),
        )
    }

    fn repo(id: &str) -> RepoEntry {
        RepoEntry {
            repo_id: id.to_string(),
            snapshot_id: "main".to_string(),
            root_path: format!("/repos/{}", id),
        }
    }

    fn config(enabled: bool, background: bool) -> EnvConfig {
        EnvConfig {
            cold_start_enabled: enabled,
            cold_start_background: background,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_unindexed_repos_scheduled() {
        let store = store();
        let reindexer = Arc::new(CountingReindexer {
            calls: AtomicUsize::new(0),
        });
        let manager = ColdStartManager::new(store, reindexer.clone(), &config(true, false));

        let report = manager
            .check_and_index(&[repo("alpha"), repo("beta")])
            .await
            .unwrap();
        assert_eq!(report.scheduled, 2);
        assert_eq!(reindexer.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_indexed_repo_skipped() {
        let store = store();
        store
            .index(
                "alpha",
                "main",
                &[IndexDocument::new("c1", "alpha", "main", "a.py", "body")],
            )
            .await
            .unwrap();

        let reindexer = Arc::new(CountingReindexer {
            calls: AtomicUsize::new(0),
        });
        let manager = ColdStartManager::new(store, reindexer.clone(), &config(true, false));

        let report = manager.check_and_index(&[repo("alpha")]).await.unwrap();
        assert_eq!(report.already_indexed, 1);
        assert_eq!(report.scheduled, 0);
        assert_eq!(reindexer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_disabled_does_nothing() {
        let manager = ColdStartManager::new(
            store(),
            Arc::new(CountingReindexer {
                calls: AtomicUsize::new(0),
            }),
            &config(false, false),
        );
        let report = manager.check_and_index(&[repo("alpha")]).await.unwrap();
        assert_eq!(report.scheduled, 0);
    }

    #[tokio::test]
    async fn test_background_mode_runs_async() {
        let reindexer = Arc::new(CountingReindexer {
            calls: AtomicUsize::new(0),
        });
        let manager = ColdStartManager::new(store(), reindexer.clone(), &config(true, true));
        let report = manager.check_and_index(&[repo("alpha")]).await.unwrap();
        assert_eq!(report.scheduled, 1);

        manager.join_background().await;
        assert_eq!(reindexer.calls.load(Ordering::SeqCst), 1);
    }
}
