use std::collections::BTreeMap;

use axum::Json;
use axum::Router;
use axum::extract::multipart::MultipartError;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::StatusCode;
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use serde::Deserialize;
use serde_json::json;

use crate::error::{ErrorKind, GatewayError};
use crate::http::{HttpState, require_token};
use crate::service::{DeployRequest, ExecRequest};

/// Upload ceiling for contract sources.
const MAX_SOURCE_BYTES: usize = 10 << 20;

pub fn router(state: &HttpState) -> Router<HttpState> {
    let contracts = Router::new()
        .route("/contracts/deploy", post(deploy))
        .route("/contracts/{id}/execute", post(execute))
        .route("/contracts/{id}/audit", get(audit))
        .route("/contracts/{id}/blocks", get(blocks))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_token));
    Router::new()
        .route("/health", get(health))
        .merge(contracts)
        .layer(DefaultBodyLimit::max(MAX_SOURCE_BYTES))
}

#[derive(Debug)]
pub(crate) enum ApiError {
    Gateway(GatewayError),
    Invalid(String),
    Unauthorized,
}

impl ApiError {
    fn bad_request(msg: impl Into<String>) -> Self {
        ApiError::Invalid(msg.into())
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        ApiError::Gateway(err)
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        ApiError::bad_request(format!("multipart: {err}"))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::Gateway(err) => {
                let (status, code) = match err.kind() {
                    ErrorKind::InvalidRequest => (StatusCode::BAD_REQUEST, "invalid_request"),
                    ErrorKind::NotFound => (StatusCode::NOT_FOUND, "not_found"),
                    ErrorKind::Engine => (StatusCode::UNPROCESSABLE_ENTITY, "engine_error"),
                    ErrorKind::Transport => (StatusCode::BAD_GATEWAY, "engine_unavailable"),
                    ErrorKind::Protocol => (StatusCode::BAD_GATEWAY, "protocol_error"),
                    ErrorKind::LockTimeout => (StatusCode::SERVICE_UNAVAILABLE, "lock_timeout"),
                    ErrorKind::Verification => (StatusCode::CONFLICT, "verification_failed"),
                    ErrorKind::Persistence | ErrorKind::Crypto => {
                        (StatusCode::INTERNAL_SERVER_ERROR, "internal")
                    }
                };
                if status.is_server_error() {
                    tracing::error!(code, "request failed: {err}");
                }
                (status, code, err.to_string())
            }
            ApiError::Invalid(msg) => (StatusCode::BAD_REQUEST, "invalid_request", msg),
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "missing or invalid bearer token".to_string(),
            ),
        };
        let body = json!({ "code": code, "message": message });
        (status, Json(body)).into_response()
    }
}

async fn health(State(state): State<HttpState>) -> Result<impl IntoResponse, ApiError> {
    let rtt = state.service.ping().await?;
    Ok(Json(json!({
        "status": "ok",
        "engine_rtt_ms": rtt.as_millis() as u64,
    })))
}

async fn deploy(
    State(state): State<HttpState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut source = None;
    let mut contract_name = None;
    let mut version = None;
    let mut owner = None;
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "source" => source = Some(field.bytes().await?.to_vec()),
            "contract_name" => contract_name = Some(field.text().await?),
            "version" => version = Some(field.text().await?),
            "owner" => owner = Some(field.text().await?),
            // The contract id is always computed server-side.
            "hash" => tracing::debug!("ignoring caller-supplied deploy hash"),
            other => tracing::debug!(field = other, "ignoring unknown form field"),
        }
    }
    let request = DeployRequest {
        source: source.ok_or_else(|| ApiError::bad_request("missing source file"))?,
        contract_name: contract_name
            .ok_or_else(|| ApiError::bad_request("missing contract_name"))?,
        version: version.unwrap_or_default(),
        owner: owner.ok_or_else(|| ApiError::bad_request("missing owner"))?,
    };

    let deployed = state.service.deploy(request).await?;
    let contract = deployed.contract;
    Ok(Json(json!({
        "contract_hash": contract.id,
        "contract_name": contract.name,
        "contract_owner": contract.owner,
        "contract_version": contract.version,
        "functions": deployed.functions,
    })))
}

#[derive(Debug, Deserialize)]
struct ExecBody {
    function: String,
    #[serde(default)]
    args: BTreeMap<String, serde_json::Value>,
}

async fn execute(
    State(state): State<HttpState>,
    Path(id): Path<String>,
    Json(body): Json<ExecBody>,
) -> Result<impl IntoResponse, ApiError> {
    if body.function.is_empty() {
        return Err(ApiError::bad_request("missing function"));
    }
    let executed = state
        .service
        .execute(
            &id,
            ExecRequest {
                function: body.function,
                args: body.args,
            },
        )
        .await?;
    let block = executed.block;
    Ok(Json(json!({
        "contract_id": id,
        "function": executed.result.function,
        "price": executed.result.exec_price,
        "journal": executed.result.journal,
        "block": {
            "block_index": block.block_index,
            "hash": block.hash,
            "previous_hash": block.previous_hash,
            "journal_hash": block.journal_hash,
            "timestamp": block.timestamp,
        },
    })))
}

async fn audit(
    State(state): State<HttpState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.service.audit(&id).await?))
}

async fn blocks(
    State(state): State<HttpState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.service.history(&id).await?))
}
