//! Project file watching.
//!
//! Watches the project root recursively, filters out build artifacts and
//! hidden paths, debounces bursts, and forwards [`FileChange`] events into
//! a channel the rebuild loop drains.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::warn;

/// A relevant filesystem change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileChange {
    Modified(PathBuf),
    Created(PathBuf),
    Removed(PathBuf),
}

impl FileChange {
    pub fn path(&self) -> &Path {
        match self {
            FileChange::Modified(p) | FileChange::Created(p) | FileChange::Removed(p) => p,
        }
    }

    /// Changes that can alter resolution outcomes, not just file content:
    /// files appearing/disappearing and any `package.json` edit.
    pub fn invalidates_resolution(&self) -> bool {
        match self {
            FileChange::Created(_) | FileChange::Removed(_) => true,
            FileChange::Modified(path) => {
                path.file_name().is_some_and(|name| name == "package.json")
            }
        }
    }
}

/// Recursive watcher with debouncing and ignore filtering.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
    root: PathBuf,
}

impl FileWatcher {
    /// Watch `root`; `ignore` entries are directory names or `*.ext`
    /// patterns. Returns the watcher (keep it alive) and the event
    /// receiver.
    pub fn new(
        root: PathBuf,
        ignore: Vec<String>,
        debounce: Duration,
    ) -> notify::Result<(Self, mpsc::Receiver<FileChange>)> {
        let (tx, rx) = mpsc::channel(256);
        let filter_root = root.clone();
        let mut last_event: Option<(PathBuf, Instant)> = None;

        let mut watcher = notify::recommended_watcher(move |result: notify::Result<Event>| {
            let event = match result {
                Ok(event) => event,
                Err(error) => {
                    warn!(%error, "watch error");
                    return;
                }
            };
            for path in &event.paths {
                if should_ignore(path, &filter_root, &ignore) {
                    continue;
                }
                let now = Instant::now();
                if let Some((last_path, last_time)) = &last_event {
                    if last_path == path && now.duration_since(*last_time) < debounce {
                        continue;
                    }
                }
                last_event = Some((path.clone(), now));

                let change = match event.kind {
                    EventKind::Create(_) => FileChange::Created(path.clone()),
                    EventKind::Modify(_) => FileChange::Modified(path.clone()),
                    EventKind::Remove(_) => FileChange::Removed(path.clone()),
                    _ => continue,
                };
                let _ = tx.blocking_send(change);
            }
        })?;

        watcher.watch(&root, RecursiveMode::Recursive)?;
        Ok((
            Self {
                _watcher: watcher,
                root,
            },
            rx,
        ))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

fn should_ignore(path: &Path, root: &Path, ignore: &[String]) -> bool {
    if !path.starts_with(root) {
        return true;
    }
    let Ok(relative) = path.strip_prefix(root) else {
        return true;
    };
    let text = relative.to_string_lossy();

    for pattern in ignore {
        if let Some(suffix) = pattern.strip_prefix('*') {
            if text.ends_with(suffix) {
                return true;
            }
        } else if text.starts_with(pattern.as_str()) || text.contains(&format!("/{pattern}")) {
            return true;
        }
    }

    // Hidden files and directories never trigger rebuilds.
    relative.components().any(|component| {
        component
            .as_os_str()
            .to_str()
            .is_some_and(|name| name.starts_with('.') && name != "." && name != "..")
    })
}
