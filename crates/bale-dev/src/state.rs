//! Shared dev-session state.
//!
//! The rebuild loop is an explicit state machine: `Idle → Building →
//! {Success | Failed} → Idle`, with watcher events queued between
//! transitions. Clients always see the last successful emission; a failed
//! rebuild changes nothing they can fetch.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast;

use bale_bundler::BuildOutput;

use crate::protocol::ServerMessage;

/// Where the rebuild loop currently is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DevPhase {
    /// Waiting for watcher events.
    Idle,
    /// A build is running; new events queue until it finishes.
    Building,
}

/// State shared between the rebuild loop and the HTTP server.
pub struct DevState {
    phase: RwLock<DevPhase>,
    /// The last successful emission; what the server serves.
    output: RwLock<Option<Arc<BuildOutput>>>,
    /// Message fan-out to connected clients.
    messages: broadcast::Sender<ServerMessage>,
}

impl DevState {
    pub fn new() -> Arc<Self> {
        let (messages, _) = broadcast::channel(64);
        Arc::new(Self {
            phase: RwLock::new(DevPhase::Idle),
            output: RwLock::new(None),
            messages,
        })
    }

    pub fn phase(&self) -> DevPhase {
        self.phase.read().clone()
    }

    pub fn begin_build(&self) {
        *self.phase.write() = DevPhase::Building;
    }

    /// A build finished; on success the emission replaces the served one.
    pub fn finish_build(&self, output: Option<Arc<BuildOutput>>) {
        if let Some(output) = output {
            *self.output.write() = Some(output);
        }
        *self.phase.write() = DevPhase::Idle;
    }

    pub fn output(&self) -> Option<Arc<BuildOutput>> {
        self.output.read().clone()
    }

    /// Serve a file from the last successful emission.
    pub fn file(&self, name: &str) -> Option<(Vec<u8>, &'static str)> {
        let output = self.output.read();
        let output = output.as_ref()?;
        if name == "manifest.json" {
            return Some((
                output.manifest.to_json().into_bytes(),
                "application/json",
            ));
        }
        for chunk in &output.chunks {
            if chunk.file_name == name {
                return Some((chunk.code.clone().into_bytes(), "application/javascript"));
            }
            if chunk.map_file_name.as_deref() == Some(name) {
                if let Some(map) = &chunk.source_map {
                    return Some((map.clone().into_bytes(), "application/json"));
                }
            }
        }
        None
    }

    pub fn broadcast(&self, message: ServerMessage) {
        // Send errors only mean no client is connected.
        let _ = self.messages.send(message);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerMessage> {
        self.messages.subscribe()
    }

    pub fn client_count(&self) -> usize {
        self.messages.receiver_count()
    }
}
