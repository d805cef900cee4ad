//! Snapshot deltas and chunk update hooks
//!
//! IR entities are immutable inside a snapshot and superseded, never
//! mutated, when a new snapshot is written. Incremental refresh produces
//! a delta classifying every chunk as added, modified (same FQN, new
//! content), drifted (same content, new span), renamed (new FQN, same
//! content hash), or deleted.
//!
//! Hooks fire sequentially in registration order; per-chunk the order is
//! modified → drifted → renamed → deleted. A hook failure is logged and
//! never aborts the batch.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::shared::models::{Result, Span};

/// One persisted chunk of a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub chunk_id: String,
    pub fqn: String,
    pub file_path: String,
    pub span: Span,
    pub content_hash: String,
}

/// Classified difference between two snapshots
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotDelta {
    pub added: Vec<ChunkRecord>,
    /// (old, new) pairs with the same FQN and changed content
    pub modified: Vec<(ChunkRecord, ChunkRecord)>,
    /// (old, new) pairs with identical content at a new span
    pub drifted: Vec<(ChunkRecord, ChunkRecord)>,
    /// (old, new) pairs with a new FQN but identical content
    pub renamed: Vec<(ChunkRecord, ChunkRecord)>,
    pub deleted: Vec<ChunkRecord>,
}

impl SnapshotDelta {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
            && self.modified.is_empty()
            && self.drifted.is_empty()
            && self.renamed.is_empty()
            && self.deleted.is_empty()
    }

    /// Classify the difference between two chunk sets.
    pub fn classify(old: &[ChunkRecord], new: &[ChunkRecord]) -> Self {
        let old_by_fqn: HashMap<&str, &ChunkRecord> =
            old.iter().map(|c| (c.fqn.as_str(), c)).collect();
        let new_fqns: HashSet<&str> = new.iter().map(|c| c.fqn.as_str()).collect();

        // Old chunks whose FQN vanished, indexed by content for rename
        // detection
        let mut orphaned_by_hash: HashMap<&str, &ChunkRecord> = old
            .iter()
            .filter(|c| !new_fqns.contains(c.fqn.as_str()))
            .map(|c| (c.content_hash.as_str(), c))
            .collect();

        let mut delta = SnapshotDelta::default();
        let mut renamed_old_fqns: HashSet<String> = HashSet::new();

        for chunk in new {
            match old_by_fqn.get(chunk.fqn.as_str()) {
                Some(prev) => {
                    if prev.content_hash != chunk.content_hash {
                        delta.modified.push(((*prev).clone(), chunk.clone()));
                    } else if prev.span != chunk.span {
                        delta.drifted.push(((*prev).clone(), chunk.clone()));
                    }
                }
                None => {
                    if let Some(prev) = orphaned_by_hash.remove(chunk.content_hash.as_str()) {
                        renamed_old_fqns.insert(prev.fqn.clone());
                        delta.renamed.push((prev.clone(), chunk.clone()));
                    } else {
                        delta.added.push(chunk.clone());
                    }
                }
            }
        }

        for chunk in old {
            if !new_fqns.contains(chunk.fqn.as_str()) && !renamed_old_fqns.contains(&chunk.fqn) {
                delta.deleted.push(chunk.clone());
            }
        }

        delta
    }
}

/// Hook invoked for every chunk change. Implementations must be
/// idempotent: debounced batches can replay.
pub trait ChunkUpdateHook: Send + Sync {
    fn name(&self) -> &str;

    fn on_chunk_modified(&self, _old: &ChunkRecord, _new: &ChunkRecord) -> Result<()> {
        Ok(())
    }

    fn on_chunk_drifted(&self, _old: &ChunkRecord, _new: &ChunkRecord) -> Result<()> {
        Ok(())
    }

    fn on_chunk_renamed(&self, _old: &ChunkRecord, _new: &ChunkRecord) -> Result<()> {
        Ok(())
    }

    fn on_chunk_deleted(&self, _old: &ChunkRecord) -> Result<()> {
        Ok(())
    }
}

/// Explicit hook registration; hooks run sequentially in registration
/// order.
#[derive(Default)]
pub struct HookRegistry {
    hooks: Vec<Box<dyn ChunkUpdateHook>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, hook: Box<dyn ChunkUpdateHook>) {
        self.hooks.push(hook);
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Fire hooks for a delta: modified → drifted → renamed → deleted.
    /// Failures are logged and do not abort the batch.
    pub fn fire(&self, delta: &SnapshotDelta) {
        for hook in &self.hooks {
            for (old, new) in &delta.modified {
                if let Err(e) = hook.on_chunk_modified(old, new) {
                    warn!(hook = hook.name(), chunk = %new.chunk_id, error = %e, "hook_failed");
                }
            }
            for (old, new) in &delta.drifted {
                if let Err(e) = hook.on_chunk_drifted(old, new) {
                    warn!(hook = hook.name(), chunk = %new.chunk_id, error = %e, "hook_failed");
                }
            }
            for (old, new) in &delta.renamed {
                if let Err(e) = hook.on_chunk_renamed(old, new) {
                    warn!(hook = hook.name(), chunk = %new.chunk_id, error = %e, "hook_failed");
                }
            }
            for old in &delta.deleted {
                if let Err(e) = hook.on_chunk_deleted(old) {
                    warn!(hook = hook.name(), chunk = %old.chunk_id, error = %e, "hook_failed");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::AtlasError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn chunk(fqn: &str, hash: &str, line: u32) -> ChunkRecord {
        ChunkRecord {
            chunk_id: format!("chunk:{}", fqn),
            fqn: fqn.to_string(),
            file_path: "m.py".to_string(),
            span: Span::new(line, 0, line + 5, 0),
            content_hash: hash.to_string(),
        }
    }

    #[test]
    fn test_added_and_deleted() {
        let old = vec![chunk("m.gone", "h1", 1)];
        let new = vec![chunk("m.fresh", "h2", 1)];
        let delta = SnapshotDelta::classify(&old, &new);
        assert_eq!(delta.added.len(), 1);
        assert_eq!(delta.deleted.len(), 1);
        assert!(delta.modified.is_empty());
    }

    #[test]
    fn test_modified_same_fqn_new_content() {
        let old = vec![chunk("m.f", "h1", 1)];
        let new = vec![chunk("m.f", "h2", 1)];
        let delta = SnapshotDelta::classify(&old, &new);
        assert_eq!(delta.modified.len(), 1);
        assert!(delta.added.is_empty());
        assert!(delta.deleted.is_empty());
    }

    #[test]
    fn test_drifted_same_content_new_span() {
        let old = vec![chunk("m.f", "h1", 1)];
        let new = vec![chunk("m.f", "h1", 20)];
        let delta = SnapshotDelta::classify(&old, &new);
        assert_eq!(delta.drifted.len(), 1);
        assert!(delta.modified.is_empty());
    }

    #[test]
    fn test_renamed_new_fqn_same_content() {
        let old = vec![chunk("m.old_name", "h1", 1)];
        let new = vec![chunk("m.new_name", "h1", 1)];
        let delta = SnapshotDelta::classify(&old, &new);
        assert_eq!(delta.renamed.len(), 1);
        assert!(delta.added.is_empty());
        assert!(delta.deleted.is_empty());
        assert_eq!(delta.renamed[0].0.fqn, "m.old_name");
        assert_eq!(delta.renamed[0].1.fqn, "m.new_name");
    }

    #[test]
    fn test_unchanged_chunk_not_classified() {
        let old = vec![chunk("m.f", "h1", 1)];
        let new = vec![chunk("m.f", "h1", 1)];
        let delta = SnapshotDelta::classify(&old, &new);
        assert!(delta.is_empty());
    }

    struct CountingHook {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    impl ChunkUpdateHook for CountingHook {
        fn name(&self) -> &str {
            "counting"
        }
        fn on_chunk_modified(&self, _old: &ChunkRecord, _new: &ChunkRecord) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(AtlasError::external("enrichment provider down"));
            }
            Ok(())
        }
        fn on_chunk_deleted(&self, _old: &ChunkRecord) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_hooks_fire_and_failures_do_not_abort() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = HookRegistry::new();
        registry.register(Box::new(CountingHook {
            calls: calls.clone(),
            fail: true,
        }));
        registry.register(Box::new(CountingHook {
            calls: calls.clone(),
            fail: false,
        }));

        let old = vec![chunk("m.f", "h1", 1), chunk("m.gone", "h9", 50)];
        let new = vec![chunk("m.f", "h2", 1)];
        let delta = SnapshotDelta::classify(&old, &new);
        registry.fire(&delta);

        // Both hooks ran for the modified and the deleted chunk even
        // though the first hook failed
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_hook_idempotence_on_replay() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = HookRegistry::new();
        registry.register(Box::new(CountingHook {
            calls: calls.clone(),
            fail: false,
        }));

        let old = vec![chunk("m.f", "h1", 1)];
        let new = vec![chunk("m.f", "h2", 1)];
        let delta = SnapshotDelta::classify(&old, &new);
        registry.fire(&delta);
        registry.fire(&delta);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
