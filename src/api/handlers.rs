//! REST API handlers over the state client

use crate::client::{ClientError, ClientSnapshot, ContractStateClient, FieldState, MutationOutcome};
use crate::contract::{Field, RemoteContractDescriptor, Value};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Shared application state for API handlers
#[derive(Clone)]
pub struct ApiState {
    pub client: Arc<ContractStateClient>,
}

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct MutateRequest {
    #[serde(default)]
    pub inputs: Vec<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<crate::client::ErrorKind>,
}

pub type ApiFailure = (StatusCode, Json<ApiError>);

fn failure(status: StatusCode, error: String) -> ApiFailure {
    (status, Json(ApiError { error, kind: None }))
}

/// Map a client error onto an HTTP status
pub fn client_failure(err: ClientError) -> ApiFailure {
    let status = match &err {
        ClientError::OperationInProgress(_) => StatusCode::CONFLICT,
        ClientError::AuthorizationDenied(_) | ClientError::AccountRejectedCall(_) => {
            StatusCode::FORBIDDEN
        }
        ClientError::RemoteRejected(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ClientError::RemoteUnavailable(_) => StatusCode::BAD_GATEWAY,
        ClientError::Cancelled(_) => StatusCode::GATEWAY_TIMEOUT,
        ClientError::UnknownOperation(_) | ClientError::UnknownField(_) => StatusCode::NOT_FOUND,
        ClientError::InvalidInputs { .. } => StatusCode::BAD_REQUEST,
    };

    (
        status,
        Json(ApiError {
            kind: err.kind(),
            error: err.to_string(),
        }),
    )
}

fn parse_field(name: &str) -> Result<Field, ApiFailure> {
    name.parse()
        .map_err(|name| client_failure(ClientError::UnknownField(name)))
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /health
pub async fn health_check() -> &'static str {
    "OK"
}

/// GET /api/contract - The contract descriptor
pub async fn get_contract(State(state): State<ApiState>) -> Json<RemoteContractDescriptor> {
    Json(state.client.descriptor().clone())
}

/// GET /api/snapshot - Everything the UI renders
pub async fn get_snapshot(State(state): State<ApiState>) -> Json<ClientSnapshot> {
    Json(state.client.snapshot())
}

/// GET /api/fields/{field} - Cached state of one field
pub async fn get_field(
    State(state): State<ApiState>,
    Path(field): Path<String>,
) -> Result<Json<FieldState<Value>>, ApiFailure> {
    let field = parse_field(&field)?;
    Ok(Json(state.client.field_state(field)))
}

/// POST /api/fields/{field}/read - Fetch one field from the contract
pub async fn read_field(
    State(state): State<ApiState>,
    Path(field): Path<String>,
) -> Result<Json<FieldState<Value>>, ApiFailure> {
    let field = parse_field(&field)?;

    // Run detached so a dropped connection does not abandon the read
    let read = state.client.request_read(field);
    read.await
        .map(Json)
        .map_err(|e| failure(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

/// POST /api/operations/{name} - Authorize and submit a state-changing call
pub async fn mutate(
    State(state): State<ApiState>,
    Path(name): Path<String>,
    Json(req): Json<MutateRequest>,
) -> Result<Json<MutationOutcome>, ApiFailure> {
    let operation = state
        .client
        .descriptor()
        .operation(&name)
        .ok_or_else(|| client_failure(ClientError::UnknownOperation(name.clone())))?;

    let inputs = operation.coerce_inputs(&req.inputs).map_err(|reason| {
        client_failure(ClientError::InvalidInputs {
            operation: name.clone(),
            reason,
        })
    })?;

    let mutation = state.client.request_mutation(&name, inputs);
    match mutation.await {
        Ok(Ok(outcome)) => Ok(Json(outcome)),
        Ok(Err(err)) => Err(client_failure(err)),
        Err(e) => Err(failure(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
    }
}
