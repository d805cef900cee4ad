//! Repository file watcher
//!
//! Bridges `notify` FS events into the debouncer and hands ready batches
//! to the incremental indexer. Indexing is single-flight per repo: a
//! batch arriving while one is being applied waits its turn.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use notify::{Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use tracing::{error, info, warn};

use codeatlas_ir::{AtlasError, Result};

use crate::triggers::debounce::{
    ChangeKind, FileChangeEvent, IntelligentDebouncer, RateLimiter, WatchConfig,
};

/// Receives ready batches from the watcher.
pub trait BatchHandler: Send + Sync {
    fn handle_batch(&self, events: Vec<FileChangeEvent>) -> Result<()>;
}

pub struct RepoWatcher {
    root: PathBuf,
    config: WatchConfig,
    extensions: Vec<String>,
    handler: Arc<dyn BatchHandler>,
    watcher: Option<RecommendedWatcher>,
    worker: Option<thread::JoinHandle<()>>,
    running: Arc<Mutex<bool>>,
    /// Single-flight: one batch applies at a time per repo
    indexing: Arc<Mutex<()>>,
}

impl RepoWatcher {
    pub fn new(
        root: impl Into<PathBuf>,
        config: WatchConfig,
        extensions: Vec<String>,
        handler: Arc<dyn BatchHandler>,
    ) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(AtlasError::config(format!(
                "watch root is not a directory: {}",
                root.display()
            )));
        }
        Ok(Self {
            root,
            config,
            extensions,
            handler,
            watcher: None,
            worker: None,
            running: Arc::new(Mutex::new(false)),
            indexing: Arc::new(Mutex::new(())),
        })
    }

    pub fn start(&mut self) -> Result<()> {
        if *self.running.lock() {
            return Err(AtlasError::config("watcher already running"));
        }

        let (tx, rx) = channel();
        let mut watcher = RecommendedWatcher::new(
            move |res: std::result::Result<Event, notify::Error>| match res {
                Ok(event) => {
                    let _ = tx.send(event);
                }
                Err(e) => error!(error = %e, "watch_event_error"),
            },
            NotifyConfig::default(),
        )
        .map_err(|e| AtlasError::config(format!("failed to create watcher: {}", e)))?;

        watcher
            .watch(&self.root, RecursiveMode::Recursive)
            .map_err(|e| AtlasError::config(format!("failed to watch path: {}", e)))?;
        self.watcher = Some(watcher);

        *self.running.lock() = true;
        let running = self.running.clone();
        let config = self.config.clone();
        let extensions = self.extensions.clone();
        let handler = self.handler.clone();
        let indexing = self.indexing.clone();

        self.worker = Some(thread::spawn(move || {
            Self::event_loop(rx, running, config, extensions, handler, indexing);
        }));

        info!(root = %self.root.display(), "repo_watcher_started");
        Ok(())
    }

    pub fn stop(&mut self) {
        *self.running.lock() = false;
        self.watcher = None;
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        info!(root = %self.root.display(), "repo_watcher_stopped");
    }

    fn event_loop(
        rx: Receiver<Event>,
        running: Arc<Mutex<bool>>,
        config: WatchConfig,
        extensions: Vec<String>,
        handler: Arc<dyn BatchHandler>,
        indexing: Arc<Mutex<()>>,
    ) {
        let limiter = RateLimiter::new(config.max_events_per_second);
        let debouncer = IntelligentDebouncer::new(config);

        while *running.lock() {
            match rx.recv_timeout(Duration::from_millis(50)) {
                Ok(event) => {
                    for change in convert_event(&event, &extensions) {
                        if limiter.should_allow() {
                            debouncer.add_event(change);
                        }
                    }
                }
                Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {}
                Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
            }

            let batch = debouncer.drain_ready();
            if !batch.is_empty() {
                // Single-flight per repo
                let _guard = indexing.lock();
                if let Err(e) = handler.handle_batch(batch) {
                    warn!(error = %e, "incremental_batch_failed");
                }
            }
        }
    }
}

impl Drop for RepoWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

fn convert_event(event: &Event, extensions: &[String]) -> Vec<FileChangeEvent> {
    let kind = match event.kind {
        EventKind::Create(_) => ChangeKind::Created,
        EventKind::Modify(_) => ChangeKind::Modified,
        EventKind::Remove(_) => ChangeKind::Deleted,
        _ => return Vec::new(),
    };

    event
        .paths
        .iter()
        .filter(|path| matches_extension(path, extensions))
        .map(|path| FileChangeEvent {
            path: path.clone(),
            kind,
        })
        .collect()
}

fn matches_extension(path: &Path, extensions: &[String]) -> bool {
    if extensions.is_empty() {
        return true;
    }
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| extensions.iter().any(|allowed| allowed == ext))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct CountingHandler {
        batches: AtomicUsize,
        files: AtomicUsize,
    }

    impl BatchHandler for CountingHandler {
        fn handle_batch(&self, events: Vec<FileChangeEvent>) -> Result<()> {
            self.batches.fetch_add(1, Ordering::SeqCst);
            self.files.fetch_add(events.len(), Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_watcher_requires_directory() {
        let handler = Arc::new(CountingHandler {
            batches: AtomicUsize::new(0),
            files: AtomicUsize::new(0),
        });
        let result = RepoWatcher::new(
            "/definitely/not/a/dir",
            WatchConfig::default(),
            vec![],
            handler,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_watcher_picks_up_file_writes() {
        let tmp = TempDir::new().unwrap();
        let handler = Arc::new(CountingHandler {
            batches: AtomicUsize::new(0),
            files: AtomicUsize::new(0),
        });
        let config = WatchConfig {
            debounce_delay: Duration::from_millis(50),
            batch_window: Duration::from_millis(200),
            ..Default::default()
        };
        let mut watcher = RepoWatcher::new(
            tmp.path(),
            config,
            vec!["py".to_string()],
            handler.clone(),
        )
        .unwrap();
        watcher.start().unwrap();

        std::fs::write(tmp.path().join("x.py"), "x = 1\n").unwrap();
        std::fs::write(tmp.path().join("ignored.txt"), "nope").unwrap();

        // Allow the event to propagate through debounce
        std::thread::sleep(Duration::from_millis(600));
        watcher.stop();

        assert!(handler.batches.load(Ordering::SeqCst) >= 1);
        assert!(handler.files.load(Ordering::SeqCst) >= 1);
    }

    #[test]
    fn test_extension_filter() {
        let exts = vec!["py".to_string(), "ts".to_string()];
        assert!(matches_extension(Path::new("a/b.py"), &exts));
        assert!(!matches_extension(Path::new("a/b.md"), &exts));
        assert!(matches_extension(Path::new("anything"), &[]));
    }
}
