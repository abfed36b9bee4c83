//! Recursive file watching with a write-settle delay.
//!
//! Raw notify events are filtered (version control and dependency caches are
//! never interesting, plus any configured ignore globs) and then debounced:
//! a change only fires once the tree has been quiet for a short settle
//! window, so we never restart mid-write.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::event::SupervisorEvent;

/// Quiet period required before a change event fires.
const SETTLE_DELAY: Duration = Duration::from_millis(300);

/// Directories never worth watching, regardless of configuration.
const ALWAYS_IGNORED_DIRS: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    "node_modules",
    "target",
    "__pycache__",
    ".venv",
];

/// Path filter combining the built-in directory exclusions with configured
/// ignore globs, matched against the path relative to the watch root.
pub struct IgnoreFilter {
    root: PathBuf,
    patterns: Vec<glob::Pattern>,
}

impl IgnoreFilter {
    pub fn new(root: PathBuf, ignore_patterns: &[String]) -> Result<Self> {
        let patterns = ignore_patterns
            .iter()
            .map(|p| {
                glob::Pattern::new(p).with_context(|| format!("invalid ignore pattern: {p}"))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { root, patterns })
    }

    pub fn is_ignored(&self, path: &Path) -> bool {
        for component in path.components() {
            if let Some(name) = component.as_os_str().to_str() {
                if ALWAYS_IGNORED_DIRS.contains(&name) {
                    return true;
                }
            }
        }

        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        self.patterns.iter().any(|p| p.matches_path(relative))
    }
}

/// Start watching `root` recursively. Filtered, settled change events are
/// delivered to `events`; the returned watcher must be kept alive for the
/// watch to stay active (dropping it tears the watch down).
pub fn spawn(
    root: &Path,
    filter: IgnoreFilter,
    events: mpsc::UnboundedSender<SupervisorEvent>,
) -> Result<RecommendedWatcher> {
    let (raw_tx, raw_rx) = mpsc::unbounded_channel::<PathBuf>();

    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        let Ok(event) = res else { return };
        if !matches!(
            event.kind,
            EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
        ) {
            return;
        }
        for path in event.paths {
            if !filter.is_ignored(&path) {
                // Send failure means the settle task is gone; nothing to do.
                let _ = raw_tx.send(path);
            }
        }
    })
    .context("failed to create filesystem watcher")?;

    watcher
        .watch(root, RecursiveMode::Recursive)
        .with_context(|| format!("failed to watch {}", root.display()))?;

    tokio::spawn(settle_loop(raw_rx, events));

    Ok(watcher)
}

/// Coalesce bursts of raw change events: wait until no event arrives for
/// [`SETTLE_DELAY`], then report the most recent path.
async fn settle_loop(
    mut raw_rx: mpsc::UnboundedReceiver<PathBuf>,
    events: mpsc::UnboundedSender<SupervisorEvent>,
) {
    while let Some(first) = raw_rx.recv().await {
        let mut latest = first;
        loop {
            match tokio::time::timeout(SETTLE_DELAY, raw_rx.recv()).await {
                Ok(Some(path)) => latest = path,
                Ok(None) => {
                    let _ = events.send(SupervisorEvent::FileChanged(latest));
                    return;
                }
                Err(_) => break,
            }
        }
        if events.send(SupervisorEvent::FileChanged(latest)).is_err() {
            return;
        }
    }
}
