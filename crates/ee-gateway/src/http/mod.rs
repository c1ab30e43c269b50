pub mod api;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::service::ContractService;

#[derive(Clone)]
pub struct HttpState {
    pub service: Arc<ContractService>,
    auth_token: Option<Arc<str>>,
}

impl HttpState {
    pub fn new(service: Arc<ContractService>, auth_token: Option<String>) -> Self {
        Self {
            service,
            auth_token: auth_token.filter(|t| !t.is_empty()).map(Arc::from),
        }
    }
}

pub fn app(state: HttpState) -> Router {
    api::router(&state).with_state(state)
}

/// Reject contract routes without `Authorization: Bearer <token>` when a token is
/// configured.
pub(crate) async fn require_token(
    State(state): State<HttpState>,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected) = state.auth_token.as_deref() else {
        return next.run(request).await;
    };
    let presented = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    if presented == Some(expected) {
        next.run(request).await
    } else {
        api::ApiError::Unauthorized.into_response()
    }
}

pub async fn serve(
    addr: SocketAddr,
    app: Router,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    tracing::info!("HTTP server listening on http://{}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .with_context(|| format!("serve {addr}"))
}
