//! Indexing triggers (cold start + watch mode)

pub mod cold_start;
pub mod debounce;
pub mod watcher;

pub use cold_start::{ColdStartManager, ColdStartReport, Reindexer, RepoEntry};
pub use debounce::{
    ChangeKind, FileChangeEvent, IntelligentDebouncer, RateLimiter, WatchConfig,
};
pub use watcher::{BatchHandler, RepoWatcher};
