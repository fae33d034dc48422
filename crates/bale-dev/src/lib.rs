//! # bale-dev
//!
//! The incremental dev layer: a watcher-driven rebuild loop around the
//! bundler, per-module patch computation between emissions, and the
//! HTTP/WebSocket transport that pushes patches to connected clients.
//!
//! The rebuild loop is an explicit state machine (`Idle → Building →
//! Idle`); watcher events arriving mid-build queue in the channel and are
//! drained as one batch when the build completes. A failed rebuild leaves
//! the previous emission in place and broadcasts `error`; a configuration
//! change terminates the process by design - restarting is cheaper than
//! reasoning about stale caches.

mod patch;
mod protocol;
mod server;
mod state;
mod watcher;

pub use patch::{diff, Patch};
pub use protocol::{ClientMessage, ServerMessage, UpdateItem, UpdateKind};
pub use server::{router, run as serve};
pub use state::{DevPhase, DevState};
pub use watcher::{FileChange, FileWatcher};

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use bale_bundler::Bundler;
use bale_core::{BuildError, ConfigError};

use crate::protocol::now_timestamp;

/// Failures that end a dev session.
#[derive(Debug, thiserror::Error)]
pub enum DevError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("file watcher error: {0}")]
    Watch(#[from] notify::Error),

    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

/// A running dev session: one bundler, one watcher, one server.
pub struct DevSession {
    bundler: Bundler,
    state: Arc<DevState>,
}

impl DevSession {
    pub fn new(bundler: Bundler) -> Self {
        Self {
            bundler,
            state: DevState::new(),
        }
    }

    pub fn state(&self) -> Arc<DevState> {
        self.state.clone()
    }

    /// Serve and rebuild until the watcher channel closes or the
    /// configuration changes out from under us.
    pub async fn run(self, addr: SocketAddr) -> Result<(), DevError> {
        let root = self.bundler.options().root.clone();
        let outdir_name = self
            .bundler
            .options()
            .outdir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "dist".to_string());

        tokio::spawn(server::run(self.state.clone(), addr));

        // Initial build; failure is not fatal, the next change retries.
        self.rebuild().await?;

        // node_modules is not watched: the install churn is not worth it,
        // and a dependency change warrants a restart anyway.
        let ignore = vec![outdir_name, "node_modules".to_string()];
        let (_watcher, mut events) = FileWatcher::new(root, ignore, Duration::from_millis(50))?;

        while let Some(first) = events.recv().await {
            let mut batch = vec![first];
            while let Ok(more) = events.try_recv() {
                batch.push(more);
            }

            if batch.iter().any(is_config_change) {
                error!("bale.config.json changed; restart the dev server");
                return Err(ConfigError::ChangedWhileRunning.into());
            }
            if batch.iter().any(FileChange::invalidates_resolution) {
                self.bundler.resolver().invalidate();
            }
            info!(changes = batch.len(), "rebuilding");
            self.rebuild().await?;
        }
        Ok(())
    }

    /// One `Idle → Building → Idle` transition.
    async fn rebuild(&self) -> Result<(), DevError> {
        self.state.begin_build();
        let previous = self.state.output();

        match self.bundler.build().await {
            Ok(output) => {
                let output = Arc::new(output);
                let patch = previous.as_ref().map(|p| diff(p, &output));
                self.state.finish_build(Some(output));
                match patch {
                    None | Some(Patch::Unchanged) => {}
                    Some(Patch::Update(updates)) => {
                        self.state.broadcast(ServerMessage::Update {
                            timestamp: now_timestamp(),
                            updates,
                        });
                    }
                    Some(Patch::FullReload) => {
                        self.state.broadcast(ServerMessage::FullReload {
                            timestamp: now_timestamp(),
                        });
                    }
                }
                Ok(())
            }
            Err(diagnostics) => {
                self.state.finish_build(None);
                let mut fatal = None;
                for error in diagnostics.iter() {
                    if error.is_fatal_in_dev() {
                        fatal = Some(ConfigError::ChangedWhileRunning);
                    }
                }
                warn!(%diagnostics, "rebuild failed; previous output kept");
                self.state.broadcast(error_message(&diagnostics));
                match fatal {
                    Some(config) => Err(config.into()),
                    None => Ok(()),
                }
            }
        }
    }
}

fn is_config_change(change: &FileChange) -> bool {
    change
        .path()
        .file_name()
        .is_some_and(|name| name == "bale.config.json")
}

/// Shape the first diagnostic into the protocol's `error` message.
fn error_message(diagnostics: &bale_core::Diagnostics) -> ServerMessage {
    let (file, line, column) = diagnostics
        .iter()
        .next()
        .map(|error| match error {
            BuildError::Parse(parse) => (
                Some(parse.file.display().to_string()),
                Some(parse.line),
                Some(parse.column),
            ),
            _ => (None, None, None),
        })
        .unwrap_or((None, None, None));
    ServerMessage::Error {
        message: diagnostics.to_string(),
        stack: None,
        file,
        line,
        column,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bale_core::BuildOptions;
    use std::path::Path;

    fn write(path: &Path, text: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, text).unwrap();
    }

    fn session(root: &Path, entries: &[&str]) -> DevSession {
        let mut options = BuildOptions::default();
        options.root = root.to_path_buf();
        options.entry = entries.iter().map(|e| e.into()).collect();
        DevSession::new(Bundler::new(options).unwrap())
    }

    #[tokio::test]
    async fn successful_rebuild_publishes_output() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(&root.join("main.js"), "console.log(1);\n");

        let session = session(root, &["main.js"]);
        session.rebuild().await.unwrap();
        let state = session.state();
        assert!(state.output().is_some());
        assert!(state.file("main.js").is_some());
        assert!(state.file("manifest.json").is_some());
    }

    #[tokio::test]
    async fn failed_rebuild_keeps_previous_emission_and_broadcasts_error() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(&root.join("main.js"), "console.log(1);\n");

        let session = session(root, &["main.js"]);
        session.rebuild().await.unwrap();
        let good = session.state().output().unwrap();

        // Break the module graph.
        write(&root.join("main.js"), "import './missing';\n");
        session.bundler.resolver().invalidate();

        let mut rx = session.state().subscribe();
        session.rebuild().await.unwrap();

        let kept = session.state().output().unwrap();
        assert_eq!(kept.chunks[0].code, good.chunks[0].code);
        match rx.recv().await.unwrap() {
            ServerMessage::Error { message, .. } => assert!(message.contains("missing")),
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn patched_rebuild_broadcasts_update() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(&root.join("a.js"), "export const x = 1;\n");
        write(&root.join("main.js"), "import { x } from './a.js';\nconsole.log(x);\n");

        let session = session(root, &["main.js"]);
        session.rebuild().await.unwrap();

        write(&root.join("a.js"), "export const x = 2;\n");
        session.bundler.resolver().invalidate();
        let mut rx = session.state().subscribe();
        session.rebuild().await.unwrap();

        match rx.recv().await.unwrap() {
            ServerMessage::Update { updates, .. } => {
                assert_eq!(updates[0].module_ids, vec!["a.js".to_string()]);
            }
            other => panic!("expected update, got {other:?}"),
        }
    }

    #[test]
    fn config_change_detection() {
        assert!(is_config_change(&FileChange::Modified(
            "/p/bale.config.json".into()
        )));
        assert!(!is_config_change(&FileChange::Modified("/p/a.js".into())));
    }
}
