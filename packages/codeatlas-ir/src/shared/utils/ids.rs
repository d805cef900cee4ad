//! Deterministic entity id generation
//!
//! Node ids hash `(repo_id, file_path, kind, fqn, span_start_line)`, so ids
//! are stable across re-parses of unchanged spans and byte-equal across
//! runs for identical inputs. Edge ids hash `(kind, source_id, target_id)`,
//! giving at most one edge of a given kind per node pair.

use sha2::{Digest, Sha256};

use crate::shared::models::{EdgeKind, NodeKind};

const ID_BYTES: usize = 16;

fn digest_parts(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        // Separator prevents ("ab","c") colliding with ("a","bc")
        hasher.update([0u8]);
    }
    let digest = hasher.finalize();
    digest[..ID_BYTES]
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// Generate a deterministic node id.
pub fn node_id(
    repo_id: &str,
    file_path: &str,
    kind: NodeKind,
    fqn: &str,
    span_start_line: u32,
) -> String {
    digest_parts(&[
        repo_id,
        file_path,
        kind.as_str(),
        fqn,
        &span_start_line.to_string(),
    ])
}

/// Generate a deterministic edge id.
pub fn edge_id(kind: EdgeKind, source_id: &str, target_id: &str) -> String {
    digest_parts(&[kind.as_str(), source_id, target_id])
}

/// Content hash of a chunk body, used for rename detection in snapshot
/// deltas (same hash + new FQN = rename).
pub fn content_hash(content: &str) -> String {
    digest_parts(&[content])
}
