//! The Aegis registry node.
//!
//! Owns the persistent event log and the in-memory registry rebuilt from
//! it. A single event loop applies API commands one at a time; the HTTP
//! server runs in a background task and talks to the loop over a channel.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::mpsc;

use aegis_registry::{ContentStore, DidRegistry};

use crate::commands::{
    ApplyResponse, AuditResponse, CommandError, EventsResponse, FieldResponse, NodeCommand,
    RecordField, RecordResponse, RegisteredResponse, RegistryStats,
};
use crate::config::AegisConfig;
use crate::state::NodeState;
use crate::storage::{RocksContentStore, Storage};

const SCHEMA_VERSION_KEY: &str = "schema_version";
const SCHEMA_VERSION: &[u8] = b"1";

/// Persistent single-writer host for a `DidRegistry`.
pub struct RegistryNode {
    /// Node configuration.
    config: AegisConfig,
    /// Persistent storage (opened by `start`).
    storage: Option<Arc<Storage>>,
    /// Registry state, rebuilt from the persisted log on start.
    registry: Option<DidRegistry>,
    /// Shared state accessible from HTTP handlers.
    node_state: Option<Arc<NodeState>>,
    /// Receives commands from the HTTP API.
    command_rx: Option<mpsc::Receiver<NodeCommand>>,
}

impl RegistryNode {
    /// Create a new node with the given config. Nothing is opened yet.
    pub fn new(config: AegisConfig) -> Self {
        Self {
            config,
            storage: None,
            registry: None,
            node_state: None,
            command_rx: None,
        }
    }

    /// Open storage, replay the event log, and start the HTTP API.
    pub async fn start(&mut self) -> Result<()> {
        tracing::info!("starting Aegis registry node");

        let data_dir = &self.config.storage.data_dir;
        let storage = Arc::new(
            Storage::open(data_dir)
                .with_context(|| format!("opening storage at {}", data_dir.display()))?,
        );
        tracing::info!(path = %data_dir.display(), "storage initialized");

        match storage.get_state(SCHEMA_VERSION_KEY)? {
            Some(found) if found != SCHEMA_VERSION => anyhow::bail!(
                "unsupported storage schema version {}",
                String::from_utf8_lossy(&found)
            ),
            Some(_) => {}
            None => storage.put_state(SCHEMA_VERSION_KEY, SCHEMA_VERSION)?,
        }

        let events = storage.load_events()?;
        let event_count = events.len();
        let registry = DidRegistry::replay(events).context("replaying persisted event log")?;
        tracing::info!(
            events = event_count,
            records = registry.record_count(),
            "registry restored"
        );

        let content: Arc<dyn ContentStore> = Arc::new(RocksContentStore::new(
            storage.clone(),
            self.config.content.max_blob_bytes,
        ));

        let (command_tx, command_rx) =
            mpsc::channel::<NodeCommand>(self.config.registry.command_channel_capacity);
        let node_state = Arc::new(NodeState::new(command_tx, content));

        let api_addr = self.config.api_socket_addr()?;
        let api_state = node_state.clone();
        tokio::spawn(async move {
            if let Err(e) = crate::api::start_api_server(api_addr, api_state).await {
                tracing::error!(error = %e, "HTTP API server error");
            }
        });

        self.storage = Some(storage);
        self.registry = Some(registry);
        self.node_state = Some(node_state);
        self.command_rx = Some(command_rx);

        Ok(())
    }

    /// Run the node's main event loop until the command channel closes or
    /// the event log can no longer be persisted.
    pub async fn run(&mut self) -> Result<()> {
        let mut command_rx = self
            .command_rx
            .take()
            .ok_or_else(|| anyhow::anyhow!("node not started"))?;
        let storage = self
            .storage
            .clone()
            .ok_or_else(|| anyhow::anyhow!("node not started"))?;
        let registry = self
            .registry
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("node not started"))?;

        tracing::info!("entering main event loop");

        while let Some(cmd) = command_rx.recv().await {
            Self::handle_command(registry, &storage, cmd)?;
        }

        tracing::info!("API command channel closed");
        Ok(())
    }

    /// Gracefully shut down the node.
    pub async fn shutdown(&mut self) -> Result<()> {
        tracing::info!("shutting down Aegis registry node");

        self.node_state = None;
        self.command_rx = None;

        if let Some(registry) = self.registry.take() {
            tracing::info!(
                records = registry.record_count(),
                events = registry.next_sequence(),
                "registry state released"
            );
        }

        if let Some(storage) = self.storage.take() {
            drop(storage);
            tracing::info!("storage closed");
        }

        tracing::info!("Aegis registry node shut down");
        Ok(())
    }

    /// Handle a command from the HTTP API.
    ///
    /// Returns an error only when a committed event could not be persisted;
    /// the in-memory registry is then ahead of disk and the loop must stop.
    pub(crate) fn handle_command(
        registry: &mut DidRegistry,
        storage: &Storage,
        cmd: NodeCommand,
    ) -> Result<()> {
        match cmd {
            NodeCommand::Apply {
                caller,
                call,
                revision,
                reply,
            } => {
                let op = call.op();
                let key = *call.key();
                match registry.apply_at(&caller, call, revision) {
                    Ok(record) => {
                        let record = record.clone();
                        if let Err(e) = storage.append_event(&record) {
                            tracing::error!(
                                sequence = record.sequence,
                                error = %e,
                                "failed to persist event"
                            );
                            let _ = reply.send(Err(CommandError::Internal(format!(
                                "failed to persist event {}",
                                record.sequence
                            ))));
                            return Err(e.context("event log persistence failed"));
                        }
                        let _ = reply.send(Ok(ApplyResponse { caller, record }));
                    }
                    Err(e) => {
                        tracing::debug!(op, %key, %caller, error = %e, "call rejected");
                        let _ = reply.send(Err(e.into()));
                    }
                }
            }
            NodeCommand::Lookup { key, field, reply } => {
                let value = match field {
                    RecordField::Owner => registry.get_owner(&key).map(|o| o.to_string()),
                    RecordField::PublicKey => registry.get_public_key(&key),
                    RecordField::DocumentRef => registry.get_document_ref(&key),
                };
                let _ = reply.send(
                    value
                        .map(|value| FieldResponse {
                            key,
                            field: field.as_str(),
                            value,
                        })
                        .map_err(CommandError::from),
                );
            }
            NodeCommand::GetRecord { key, reply } => {
                let result = registry
                    .get_record(&key)
                    .map(|(owner, public_key, document_ref)| RecordResponse {
                        key,
                        owner,
                        public_key,
                        document_ref,
                        revision: registry.revision(&key),
                    })
                    .map_err(CommandError::from);
                let _ = reply.send(result);
            }
            NodeCommand::IsRegistered { key, reply } => {
                let _ = reply.send(Ok(RegisteredResponse {
                    key,
                    registered: registry.is_registered(&key),
                }));
            }
            NodeCommand::Events {
                since,
                limit,
                reply,
            } => {
                let events: Vec<_> = registry
                    .events_since(since)
                    .iter()
                    .take(limit)
                    .cloned()
                    .collect();
                let next_sequence = events
                    .last()
                    .map(|r| r.sequence + 1)
                    .unwrap_or_else(|| since.min(registry.next_sequence()));
                let _ = reply.send(Ok(EventsResponse {
                    events,
                    next_sequence,
                }));
            }
            NodeCommand::Audit { reply } => {
                let result = registry
                    .audit_root()
                    .map(|root| AuditResponse {
                        root: hex::encode(root),
                        event_count: registry.next_sequence(),
                    })
                    .map_err(|e| CommandError::Internal(e.to_string()));
                let _ = reply.send(result);
            }
            NodeCommand::Status { reply } => {
                let _ = reply.send(Ok(RegistryStats {
                    records: registry.record_count(),
                    events: registry.next_sequence(),
                }));
            }
        }
        Ok(())
    }
}
