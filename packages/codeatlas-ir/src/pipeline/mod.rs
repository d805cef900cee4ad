//! Pipeline orchestration
//!
//! Per-file layer ordering, snapshot builds, delta classification, and
//! chunk update hooks.

pub mod builder;
pub mod snapshot;

pub use builder::{FileAnalysis, SnapshotBuild, SnapshotBuilder, SourceFile};
pub use snapshot::{ChunkRecord, ChunkUpdateHook, HookRegistry, SnapshotDelta};
