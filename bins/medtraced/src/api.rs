// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! HTTP routes for one ledger instance.
//!
//! Every route lives under `/ledger/{instance}`; a request addressed to any
//! other instance is answered with 404 `UNKNOWN_INSTANCE`. Writes take the
//! caller from the `x-medtrace-identity` header, which the session layer in
//! front of the daemon is trusted to set.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use medtrace_core::{
    BatchId, ErrorKind, FileLedger, Identity, InvalidInput, LedgerHead, LedgerInstanceId,
    ProvenanceEvent, Receipt, Registry, RegistryError,
};
use serde::{Deserialize, Serialize};
use tokio::task::JoinError;
use tower_http::trace::TraceLayer;
use tracing::error;

/// Header carrying the authenticated caller address.
pub const IDENTITY_HEADER: &str = "x-medtrace-identity";

/// Shared handler state.
#[derive(Debug, Clone)]
pub struct AppState {
    registry: Arc<Registry<FileLedger>>,
    instance: LedgerInstanceId,
}

impl AppState {
    pub fn new(registry: Registry<FileLedger>) -> Self {
        let instance = registry.store().instance_id();
        Self {
            registry: Arc::new(registry),
            instance,
        }
    }

    pub fn instance(&self) -> LedgerInstanceId {
        self.instance
    }

    fn check_instance(&self, instance: &str) -> Result<(), ApiError> {
        match LedgerInstanceId::parse(instance) {
            Ok(id) if id == self.instance => Ok(()),
            _ => Err(ApiError::UnknownInstance(instance.to_owned())),
        }
    }
}

/// Body of `POST /ledger/{instance}/batches`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBatch {
    pub id: String,
    pub name: String,
    pub manufacturer: String,
}

/// Body of `POST /ledger/{instance}/batches/{id}/transfer`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferBatch {
    pub new_owner: String,
}

/// `GET /ledger/{instance}`
#[derive(Debug, Serialize)]
pub struct InstanceInfo {
    pub instance: LedgerInstanceId,
    pub head: LedgerHead,
}

/// `GET /ledger/{instance}/batches/{id}/history`
#[derive(Debug, Serialize)]
pub struct History {
    pub id: BatchId,
    pub events: Vec<ProvenanceEvent>,
}

/// Wire shape of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

/// Everything a handler can fail with.
#[derive(Debug)]
pub enum ApiError {
    Registry(RegistryError),
    UnknownInstance(String),
    Body(JsonRejection),
    Worker(JoinError),
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        Self::Registry(err)
    }
}

impl From<InvalidInput> for ApiError {
    fn from(err: InvalidInput) -> Self {
        Self::Registry(err.into())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(err: JsonRejection) -> Self {
        Self::Body(err)
    }
}

impl From<JoinError> for ApiError {
    fn from(err: JoinError) -> Self {
        Self::Worker(err)
    }
}

/// HTTP status for a registry error kind.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::DuplicateBatch => StatusCode::CONFLICT,
        ErrorKind::BatchNotFound => StatusCode::NOT_FOUND,
        ErrorKind::Unauthorized => StatusCode::FORBIDDEN,
        ErrorKind::InvalidInput => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::Ledger => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            Self::Registry(err) => (status_for(err.kind()), err.kind().code(), err.to_string()),
            Self::UnknownInstance(instance) => (
                StatusCode::NOT_FOUND,
                "UNKNOWN_INSTANCE",
                format!("[UNKNOWN_INSTANCE] no ledger instance {instance:?} here"),
            ),
            Self::Body(rejection) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorKind::InvalidInput.code(),
                format!("[INVALID_INPUT] {}", rejection.body_text()),
            ),
            Self::Worker(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL",
                format!("[INTERNAL] write worker failed: {err}"),
            ),
        };
        if status.is_server_error() {
            error!(code, %message, "request failed");
        }
        let body = ErrorBody {
            code: code.to_owned(),
            message,
        };
        (status, Json(body)).into_response()
    }
}

fn caller(headers: &HeaderMap) -> Result<Identity, ApiError> {
    let raw = headers
        .get(IDENTITY_HEADER)
        .ok_or(InvalidInput::EmptyField(IDENTITY_HEADER))?;
    let text = raw.to_str().map_err(|_| {
        InvalidInput::MalformedIdentity(String::from_utf8_lossy(raw.as_bytes()).into_owned())
    })?;
    Ok(Identity::parse(text)?)
}

/// Build the daemon's router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ledger/{instance}", get(instance_info))
        .route("/ledger/{instance}/batches", post(create_batch))
        .route("/ledger/{instance}/batches/{id}", get(get_batch))
        .route("/ledger/{instance}/batches/{id}/transfer", post(transfer_batch))
        .route("/ledger/{instance}/batches/{id}/history", get(batch_history))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn instance_info(
    State(state): State<AppState>,
    Path(instance): Path<String>,
) -> Result<Json<InstanceInfo>, ApiError> {
    state.check_instance(&instance)?;
    Ok(Json(InstanceInfo {
        instance: state.instance,
        head: state.registry.query().head()?,
    }))
}

async fn create_batch(
    State(state): State<AppState>,
    Path(instance): Path<String>,
    headers: HeaderMap,
    body: Result<Json<CreateBatch>, JsonRejection>,
) -> Result<(StatusCode, Json<Receipt>), ApiError> {
    state.check_instance(&instance)?;
    let creator = caller(&headers)?;
    let Json(req) = body?;
    let id = BatchId::new(req.id)?;

    // The append fsyncs before returning.
    let registry = Arc::clone(&state.registry);
    let receipt = tokio::task::spawn_blocking(move || {
        registry.create(id, &req.name, &req.manufacturer, creator)
    })
    .await??;
    Ok((StatusCode::CREATED, Json(receipt)))
}

async fn transfer_batch(
    State(state): State<AppState>,
    Path((instance, id)): Path<(String, String)>,
    headers: HeaderMap,
    body: Result<Json<TransferBatch>, JsonRejection>,
) -> Result<Json<Receipt>, ApiError> {
    state.check_instance(&instance)?;
    let caller = caller(&headers)?;
    let Json(req) = body?;
    let id = BatchId::new(id)?;
    let new_owner = Identity::parse(&req.new_owner)?;

    let registry = Arc::clone(&state.registry);
    let receipt =
        tokio::task::spawn_blocking(move || registry.transfer(&id, new_owner, caller)).await??;
    Ok(Json(receipt))
}

async fn get_batch(
    State(state): State<AppState>,
    Path((instance, id)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    state.check_instance(&instance)?;
    let id = BatchId::new(id)?;
    let verification = state.registry.query().verify(&id)?;
    let status = if verification.is_found() {
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    };
    Ok((status, Json(verification)).into_response())
}

async fn batch_history(
    State(state): State<AppState>,
    Path((instance, id)): Path<(String, String)>,
) -> Result<Json<History>, ApiError> {
    state.check_instance(&instance)?;
    let id = BatchId::new(id)?;
    let events = state.registry.history(&id)?;
    Ok(Json(History { id, events }))
}
