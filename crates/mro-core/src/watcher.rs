//! File watcher for the documents directory. Sends changed paths, debounced.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify_debouncer_mini::notify::{self, RecommendedWatcher};
use notify_debouncer_mini::{new_debouncer, DebounceEventResult, Debouncer};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

const DEBOUNCE: Duration = Duration::from_millis(400);

/// Keeps the watch alive; dropping it stops the events.
pub struct DocumentWatcher {
    _debouncer: Debouncer<RecommendedWatcher>,
    root: PathBuf,
}

impl DocumentWatcher {
    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Watches `root` recursively and sends each debounced batch of changed paths
/// to `tx`. Hidden files and folders are ignored.
pub fn watch_documents(root: &Path, tx: UnboundedSender<Vec<PathBuf>>) -> Result<DocumentWatcher, WatchError> {
    if !root.is_dir() {
        return Err(WatchError::NotADirectory(root.to_path_buf()));
    }
    let root = root.canonicalize().map_err(WatchError::Canonicalize)?;
    let root_for_callback = root.clone();

    let mut debouncer = new_debouncer(DEBOUNCE, move |res: DebounceEventResult| match res {
        Ok(events) => {
            let paths: Vec<PathBuf> = events
                .into_iter()
                .map(|e| e.path)
                .filter(|p| !is_hidden(&root_for_callback, p))
                .collect();
            if paths.is_empty() {
                return;
            }
            debug!(count = paths.len(), "documents changed");
            if tx.send(paths).is_err() {
                debug!("change receiver dropped");
            }
        }
        Err(e) => warn!(error = %e, "watcher error"),
    })
    .map_err(|e| WatchError::Notify(e.to_string()))?;

    debouncer
        .watcher()
        .watch(&root, notify::RecursiveMode::Recursive)
        .map_err(|e| WatchError::Watch(e.to_string()))?;

    Ok(DocumentWatcher {
        _debouncer: debouncer,
        root,
    })
}

/// True when any component below `root` starts with a dot.
fn is_hidden(root: &Path, path: &Path) -> bool {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .any(|c| c.as_os_str().to_string_lossy().starts_with('.'))
}

#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error("failed to resolve path: {0}")]
    Canonicalize(std::io::Error),
    #[error("watcher init: {0}")]
    Notify(String),
    #[error("watch failed: {0}")]
    Watch(String),
}
