//! Shared node state for cross-task communication.

use std::sync::Arc;
use std::time::Instant;

use aegis_registry::ContentStore;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use crate::commands::NodeCommand;

/// Shared state for the running node, accessible from HTTP handlers.
///
/// Handlers never touch the registry directly; they go through
/// `command_tx` to the single event loop that owns it.
pub struct NodeState {
    /// When the node started (monotonic, for uptime).
    pub start_time: Instant,
    /// When the node started (wall clock, for status output).
    pub started_at: DateTime<Utc>,
    /// Channel to send commands to the event loop.
    pub command_tx: mpsc::Sender<NodeCommand>,
    /// Content store backing `document_ref` uploads.
    pub content: Arc<dyn ContentStore>,
}

impl NodeState {
    pub fn new(command_tx: mpsc::Sender<NodeCommand>, content: Arc<dyn ContentStore>) -> Self {
        Self {
            start_time: Instant::now(),
            started_at: Utc::now(),
            command_tx,
            content,
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
