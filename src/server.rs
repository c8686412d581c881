//! HTTP front end for the row protocol.
//!
//! `POST /rows` takes a row request and answers with one page.
//! `GET /distinct/{field}` lists a column's distinct values, `GET /healthz` answers "OK".
//! Translation runs on tokio's blocking pool since polars collects synchronously.
//! Browsers on the configured origins may call every route cross-origin.

use crate::error::GridError;
use crate::model::{RowsRequest, RowsResponse, Scalar};
use crate::store::RowStore;
use crate::translator::Translator;
use axum::extract::{Path, State};
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use color_eyre::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{debug, info, warn};

/// State that's passed to all handlers.
pub struct ServerState<S> {
    pub translator: Translator<S>,
    /// Origins allowed to make cross-origin requests. `*` allows any.
    pub allowed_origins: Vec<String>,
}

impl<S: RowStore + 'static> ServerState<S> {
    pub fn new(translator: Translator<S>) -> Arc<Self> {
        Self::with_allowed_origins(translator, Vec::new())
    }

    pub fn with_allowed_origins(translator: Translator<S>, allowed_origins: Vec<String>) -> Arc<Self> {
        Arc::new(Self {
            translator,
            allowed_origins,
        })
    }
}

pub fn router<S: RowStore + 'static>(state: Arc<ServerState<S>>) -> Router {
    let cors = cors_layer(&state.allowed_origins);
    let router = Router::new()
        .route("/healthz", get(healthz::<S>))
        .route("/rows", post(rows::<S>))
        .route("/distinct/{field}", get(distinct::<S>))
        .with_state(state);
    match cors {
        Some(cors) => router.layer(cors),
        None => router,
    }
}

/// CORS for the grid's origins. None when no origin is allowed.
fn cors_layer(origins: &[String]) -> Option<CorsLayer> {
    let allow_origin = if origins.iter().any(|origin| origin == "*") {
        AllowOrigin::any()
    } else {
        let values: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!(origin = %origin, "ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        if values.is_empty() {
            return None;
        }
        AllowOrigin::list(values)
    };
    Some(
        CorsLayer::new()
            .allow_origin(allow_origin)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([header::CONTENT_TYPE]),
    )
}

/// Bind `addr` and serve until ctrl-c.
pub async fn serve<S: RowStore + 'static>(state: Arc<ServerState<S>>, addr: SocketAddr) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    serve_on(listener, state).await
}

/// Serve on an already bound listener (port 0 in tests).
pub async fn serve_on<S: RowStore + 'static>(
    listener: TcpListener,
    state: Arc<ServerState<S>>,
) -> Result<()> {
    info!(addr = %listener.local_addr()?, "serving row requests");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        // No signal handler available; run until the process is killed
        std::future::pending::<()>().await;
    }
}

async fn healthz<S: RowStore + 'static>(State(_): State<Arc<ServerState<S>>>) -> &'static str {
    "OK"
}

async fn rows<S: RowStore + 'static>(
    State(state): State<Arc<ServerState<S>>>,
    Json(request): Json<RowsRequest>,
) -> Result<Json<RowsResponse>, GridError> {
    debug!(
        start = ?request.start_row,
        end = ?request.end_row,
        depth = request.group_keys.len(),
        "row request"
    );
    let page = run_blocking(move || state.translator.get_rows(&request)).await?;
    Ok(Json(page))
}

async fn distinct<S: RowStore + 'static>(
    State(state): State<Arc<ServerState<S>>>,
    Path(field): Path<String>,
) -> Result<Json<Vec<Scalar>>, GridError> {
    let values = run_blocking(move || state.translator.distinct_values(&field)).await?;
    Ok(Json(values))
}

async fn run_blocking<T, F>(f: F) -> Result<T, GridError>
where
    F: FnOnce() -> Result<T, GridError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| GridError::query(format!("request worker failed: {}", e)))?
}

impl IntoResponse for GridError {
    fn into_response(self) -> Response {
        let status = match &self {
            GridError::Validation(_) => StatusCode::BAD_REQUEST,
            GridError::QueryExecution(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GridError::Transport(_) => StatusCode::BAD_GATEWAY,
        };
        let body = serde_json::json!({ "error": self.message() });
        (status, Json(body)).into_response()
    }
}
