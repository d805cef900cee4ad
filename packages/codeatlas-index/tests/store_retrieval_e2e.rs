//! End-to-end store + retrieval scenarios.

use std::sync::Arc;

use codeatlas_index::{
    Engine, HashingEmbedder, IndexDocument, IndexingPort, IntentKind, MultiIndexStore,
    SearchPort, VectorIndexConfig,
};
use codeatlas_ir::SourceFile;

fn store() -> Arc<MultiIndexStore> {
    MultiIndexStore::new(
        Arc::new(HashingEmbedder::new(64)),
        VectorIndexConfig::default(),
    )
}

fn doc(id: &str, fqn: &str, kind: &str, content: &str) -> IndexDocument {
    IndexDocument::new(id, "repo", "s1", "app/code.py", content).with_symbol(fqn, kind)
}

#[tokio::test]
async fn soft_delete_then_compaction_scenario() {
    // After delete([c1, c2]), search must not return them; after the
    // compaction task runs, the queue drains back to 0.
    let store = store();
    store
        .index(
            "repo",
            "s1",
            &[
                doc("c1", "a.one", "function", "def one(): alpha"),
                doc("c2", "a.two", "function", "def two(): beta"),
                doc("c3", "a.three", "function", "def three(): gamma"),
            ],
        )
        .await
        .unwrap();

    store
        .delete("repo", "s1", &["c1".to_string(), "c2".to_string()])
        .await
        .unwrap();

    let hits = store
        .search("repo", "s1", "alpha beta gamma", 10, None, false)
        .await
        .unwrap();
    assert!(hits.iter().all(|h| h.chunk_id != "c1" && h.chunk_id != "c2"));

    store.vector.compact_collection("code_embeddings_repo_s1").await;
    assert_eq!(store.deletion_queue_size().await, 0);

    // Observationally identical to hard delete from any later search
    let after = store
        .search("repo", "s1", "alpha beta gamma", 10, None, true)
        .await
        .unwrap();
    assert!(after.iter().all(|h| h.chunk_id != "c1" && h.chunk_id != "c2"));
}

#[tokio::test]
async fn reindex_same_snapshot_is_noop_for_search() {
    let store = store();
    let docs = vec![doc("c1", "a.f", "function", "def f(): body text")];

    store.index("repo", "s1", &docs).await.unwrap();
    let first = store
        .search("repo", "s1", "body text", 10, None, false)
        .await
        .unwrap();

    store.upsert("repo", "s1", &docs).await.unwrap();
    let second = store
        .search("repo", "s1", "body text", 10, None, false)
        .await
        .unwrap();

    let ids = |hits: &[codeatlas_index::SearchHit]| -> Vec<String> {
        hits.iter().map(|h| h.chunk_id.clone()).collect::<Vec<_>>()
    };
    assert_eq!(ids(&first), ids(&second));
}

#[tokio::test]
async fn empty_repo_empty_store_zero_risk() {
    let engine = Engine::new(store());
    let summary = engine
        .index_repository("empty", "main", &[])
        .await
        .unwrap();
    assert_eq!(summary.files, 0);
    assert_eq!(summary.chunks, 0);

    let report = engine.impact("empty", &["anything.py".to_string()]).await.unwrap();
    assert_eq!(report.risk_score, 0.0);
}

#[tokio::test]
async fn hybrid_symbol_nav_definition_outranks_methods() {
    // Scenario: query "User class definition" against mixed chunks. The
    // class definition must land at rank 1 with a strictly higher score
    // than any method chunk carrying the same symbol name.
    let engine = Engine::new(store());
    engine
        .index_repository(
            "repo",
            "main",
            &[
                SourceFile {
                    path: "app/models.py".to_string(),
                    content: "class User:\n    def rename(self):\n        self.name = \"x\"\n"
                        .to_string(),
                },
                SourceFile {
                    path: "app/service.py".to_string(),
                    content: "def load_user(user_id):\n    return user_id\n".to_string(),
                },
            ],
        )
        .await
        .unwrap();

    let result = engine
        .search("repo", "User class definition", 3, None, false)
        .await
        .unwrap();

    assert_eq!(result.intent, IntentKind::SymbolNav);
    assert!(!result.hits.is_empty());
    let top = &result.hits[0];
    assert!(top.hit.chunk_id.ends_with("app.models.User"));
    for other in &result.hits[1..] {
        assert!(top.final_score > other.final_score);
    }
}

#[tokio::test]
async fn trace_follows_call_edges() {
    let engine = Engine::new(store());
    engine
        .index_repository(
            "repo",
            "main",
            &[SourceFile {
                path: "m.py".to_string(),
                content: "def inner():\n    pass\n\ndef outer():\n    inner()\n".to_string(),
            }],
        )
        .await
        .unwrap();

    let outcome = engine
        .trace("repo", "m.outer", Some("m.inner"), 10, 5_000)
        .await
        .unwrap();
    assert_eq!(outcome.paths.len(), 1);
    assert!(!outcome.truncated);
}
