//! HTTP API server for the Aegis node.
//!
//! Mutations arrive as signed calls: the handler authenticates the signer
//! and forwards the derived identity to the registry event loop. Reads go
//! through the same loop so they always observe a committed state.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use aegis_core::DidKey;
use aegis_crypto::SignedCall;
use aegis_registry::{ContentError, ContentRef, RegistryError};

use crate::commands::{
    ApplyResponse, AuditResponse, CommandError, EventsResponse, FieldResponse, NodeCommand,
    RecordField, RecordResponse, RegisteredResponse,
};
use crate::state::NodeState;

/// Largest page returned by the events endpoint. Pages hold at least one
/// event whenever one is available, so a poller always advances.
const MAX_EVENTS_PAGE: usize = 1000;

type ApiError = (StatusCode, Json<ErrorResponse>);
type ApiResult<T> = Result<Json<T>, ApiError>;

// --- Request / response types ---

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub version: String,
    pub started_at: String,
    pub uptime_secs: u64,
    pub records: usize,
    pub events: u64,
}

#[derive(Deserialize)]
pub struct EventsQuery {
    #[serde(default)]
    pub since: u64,
    pub limit: Option<usize>,
}

#[derive(Deserialize)]
pub struct PutContentRequest {
    /// Base64-encoded blob.
    pub data: String,
}

#[derive(Serialize)]
pub struct ContentResponse {
    pub content_ref: ContentRef,
    pub size: usize,
}

#[derive(Serialize)]
pub struct ContentBody {
    pub content_ref: ContentRef,
    /// Base64-encoded blob.
    pub data: String,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn api_error(status: StatusCode, error: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
}

fn command_error_status(err: &CommandError) -> StatusCode {
    match err {
        CommandError::Registry(RegistryError::NotFound(_)) => StatusCode::NOT_FOUND,
        CommandError::Registry(
            RegistryError::AlreadyRegistered(_) | RegistryError::StaleRevision { .. },
        ) => StatusCode::CONFLICT,
        CommandError::Registry(RegistryError::Unauthorized { .. }) => StatusCode::FORBIDDEN,
        CommandError::Registry(RegistryError::Replay { .. }) | CommandError::Internal(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn content_error_status(err: &ContentError) -> StatusCode {
    match err {
        ContentError::NotFound(_) => StatusCode::NOT_FOUND,
        ContentError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        ContentError::InvalidRef(_) => StatusCode::BAD_REQUEST,
        ContentError::Corrupted(_) | ContentError::Backend(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Accept a `did:aegis:` URI or a hex key in the path.
fn parse_key(raw: &str) -> Result<DidKey, ApiError> {
    DidKey::parse_reference(raw).map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))
}

// --- Handlers ---

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
    })
}

async fn handle_status(State(state): State<Arc<NodeState>>) -> ApiResult<StatusResponse> {
    let (reply_tx, reply_rx) = oneshot::channel();
    let Json(stats) =
        send_command_and_await(&state, NodeCommand::Status { reply: reply_tx }, reply_rx).await?;

    Ok(Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        started_at: state.started_at.to_rfc3339(),
        uptime_secs: state.uptime_secs(),
        records: stats.records,
        events: stats.events,
    }))
}

async fn handle_register(
    State(state): State<Arc<NodeState>>,
    Json(signed): Json<SignedCall>,
) -> ApiResult<ApplyResponse> {
    submit_signed_call(&state, signed, "register").await
}

async fn handle_update_public_key(
    State(state): State<Arc<NodeState>>,
    Json(signed): Json<SignedCall>,
) -> ApiResult<ApplyResponse> {
    submit_signed_call(&state, signed, "update_public_key").await
}

async fn handle_update_document_ref(
    State(state): State<Arc<NodeState>>,
    Json(signed): Json<SignedCall>,
) -> ApiResult<ApplyResponse> {
    submit_signed_call(&state, signed, "update_document_ref").await
}

async fn submit_signed_call(
    state: &Arc<NodeState>,
    signed: SignedCall,
    expected_op: &str,
) -> ApiResult<ApplyResponse> {
    if signed.call.op() != expected_op {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            format!(
                "endpoint expects a {} call, got {}",
                expected_op,
                signed.call.op()
            ),
        ));
    }

    let caller = signed.authenticate().map_err(|e| {
        tracing::debug!(op = expected_op, error = %e, "call authentication failed");
        api_error(StatusCode::FORBIDDEN, format!("authentication failed: {}", e))
    })?;

    let (reply_tx, reply_rx) = oneshot::channel();
    let cmd = NodeCommand::Apply {
        caller,
        call: signed.call,
        revision: signed.revision,
        reply: reply_tx,
    };

    send_command_and_await(state, cmd, reply_rx).await
}

async fn handle_get_record(
    State(state): State<Arc<NodeState>>,
    Path(raw): Path<String>,
) -> ApiResult<RecordResponse> {
    let key = parse_key(&raw)?;
    let (reply_tx, reply_rx) = oneshot::channel();
    let cmd = NodeCommand::GetRecord {
        key,
        reply: reply_tx,
    };
    send_command_and_await(&state, cmd, reply_rx).await
}

async fn lookup_field(
    state: &Arc<NodeState>,
    raw: &str,
    field: RecordField,
) -> ApiResult<FieldResponse> {
    let key = parse_key(raw)?;
    let (reply_tx, reply_rx) = oneshot::channel();
    let cmd = NodeCommand::Lookup {
        key,
        field,
        reply: reply_tx,
    };
    send_command_and_await(state, cmd, reply_rx).await
}

async fn handle_get_owner(
    State(state): State<Arc<NodeState>>,
    Path(raw): Path<String>,
) -> ApiResult<FieldResponse> {
    lookup_field(&state, &raw, RecordField::Owner).await
}

async fn handle_get_public_key(
    State(state): State<Arc<NodeState>>,
    Path(raw): Path<String>,
) -> ApiResult<FieldResponse> {
    lookup_field(&state, &raw, RecordField::PublicKey).await
}

async fn handle_get_document_ref(
    State(state): State<Arc<NodeState>>,
    Path(raw): Path<String>,
) -> ApiResult<FieldResponse> {
    lookup_field(&state, &raw, RecordField::DocumentRef).await
}

async fn handle_is_registered(
    State(state): State<Arc<NodeState>>,
    Path(raw): Path<String>,
) -> ApiResult<RegisteredResponse> {
    let key = parse_key(&raw)?;
    let (reply_tx, reply_rx) = oneshot::channel();
    let cmd = NodeCommand::IsRegistered {
        key,
        reply: reply_tx,
    };
    send_command_and_await(&state, cmd, reply_rx).await
}

async fn handle_events(
    State(state): State<Arc<NodeState>>,
    Query(query): Query<EventsQuery>,
) -> ApiResult<EventsResponse> {
    let limit = query
        .limit
        .unwrap_or(MAX_EVENTS_PAGE)
        .clamp(1, MAX_EVENTS_PAGE);
    let (reply_tx, reply_rx) = oneshot::channel();
    let cmd = NodeCommand::Events {
        since: query.since,
        limit,
        reply: reply_tx,
    };
    send_command_and_await(&state, cmd, reply_rx).await
}

async fn handle_audit(State(state): State<Arc<NodeState>>) -> ApiResult<AuditResponse> {
    let (reply_tx, reply_rx) = oneshot::channel();
    send_command_and_await(&state, NodeCommand::Audit { reply: reply_tx }, reply_rx).await
}

async fn handle_put_content(
    State(state): State<Arc<NodeState>>,
    Json(req): Json<PutContentRequest>,
) -> ApiResult<ContentResponse> {
    let bytes = STANDARD
        .decode(req.data.as_bytes())
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, format!("invalid base64: {}", e)))?;
    let size = bytes.len();

    let content_ref = state
        .content
        .put(bytes)
        .await
        .map_err(|e| api_error(content_error_status(&e), e.to_string()))?;

    Ok(Json(ContentResponse { content_ref, size }))
}

async fn handle_get_content(
    State(state): State<Arc<NodeState>>,
    Path(raw): Path<String>,
) -> ApiResult<ContentBody> {
    let content_ref: ContentRef = raw
        .parse()
        .map_err(|e: ContentError| api_error(content_error_status(&e), e.to_string()))?;

    let bytes = state.content.get(&content_ref).await.map_err(|e| {
        if matches!(e, ContentError::Corrupted(_)) {
            tracing::error!(%content_ref, "content store returned corrupted blob");
        }
        api_error(content_error_status(&e), e.to_string())
    })?;

    Ok(Json(ContentBody {
        content_ref,
        data: STANDARD.encode(bytes),
    }))
}

/// Helper to send a command and await the reply.
async fn send_command_and_await<T: Serialize>(
    state: &Arc<NodeState>,
    cmd: NodeCommand,
    reply_rx: oneshot::Receiver<Result<T, CommandError>>,
) -> ApiResult<T> {
    state.command_tx.send(cmd).await.map_err(|_| {
        api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "node event loop not running",
        )
    })?;

    match reply_rx.await {
        Ok(Ok(resp)) => Ok(Json(resp)),
        Ok(Err(e)) => Err(api_error(command_error_status(&e), e.to_string())),
        Err(_) => Err(api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "event loop dropped the reply channel",
        )),
    }
}

// --- Server ---

pub fn build_router(state: Arc<NodeState>) -> Router {
    Router::new()
        .route("/api/v1/health", get(handle_health))
        .route("/api/v1/status", get(handle_status))
        .route("/api/v1/registry/register", post(handle_register))
        .route("/api/v1/registry/public-key", post(handle_update_public_key))
        .route(
            "/api/v1/registry/document-ref",
            post(handle_update_document_ref),
        )
        .route("/api/v1/registry/did/{key}", get(handle_get_record))
        .route("/api/v1/registry/did/{key}/owner", get(handle_get_owner))
        .route(
            "/api/v1/registry/did/{key}/public-key",
            get(handle_get_public_key),
        )
        .route(
            "/api/v1/registry/did/{key}/document-ref",
            get(handle_get_document_ref),
        )
        .route(
            "/api/v1/registry/did/{key}/registered",
            get(handle_is_registered),
        )
        .route("/api/v1/registry/events", get(handle_events))
        .route("/api/v1/registry/audit", get(handle_audit))
        .route("/api/v1/content", post(handle_put_content))
        .route("/api/v1/content/{content_ref}", get(handle_get_content))
        .with_state(state)
}

pub async fn start_api_server(
    listen_addr: SocketAddr,
    state: Arc<NodeState>,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(listen_addr).await?;
    serve(listener, state).await
}

/// Serve the API on an already-bound listener.
pub async fn serve(listener: TcpListener, state: Arc<NodeState>) -> anyhow::Result<()> {
    let app = build_router(state);
    let local_addr = listener.local_addr()?;
    tracing::info!(%local_addr, "HTTP API server started");
    axum::serve(listener, app).await?;
    Ok(())
}
