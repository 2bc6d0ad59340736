use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, error};

use imgveil_core::{ChunkRequest, DeliveryService, Error, ErrorBody};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub service: DeliveryService,
}

const INDEX_HTML: &str = include_str!("assets/index.html");
const MAIN_JS: &str = include_str!("assets/main.js");

pub const ROUTE_SESSION_INIT: &str = "session-init";
pub const ROUTE_GET_CHUNK: &str = "get-chunk";

/// `?route=` selector on `/api/server`.
#[derive(Debug, Default, Deserialize)]
pub struct RouteQuery {
    #[serde(default)]
    pub route: Option<String>,
}

/// Build the application router.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(index))
        .route("/main.js", get(main_js))
        .route("/healthz", get(healthz))
        .route("/api/server", get(api).post(api))
        .layer(cors)
        .with_state(state)
}

/// `GET /`: viewer page.
pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// `GET /main.js`: browser client.
pub async fn main_js() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/javascript; charset=utf-8")],
        MAIN_JS,
    )
}

/// `GET /healthz`
pub async fn healthz() -> &'static str {
    "ok"
}

/// `GET|POST /api/server?route=...`: dispatch on the route selector.
///
/// Session init is accepted on either method; fetching a chunk needs a
/// JSON body and therefore `POST`.
pub async fn api(
    method: Method,
    Query(query): Query<RouteQuery>,
    State(state): State<AppState>,
    body: Bytes,
) -> Response {
    match query.route.as_deref() {
        Some(ROUTE_SESSION_INIT) => no_store(state.service.init_session().await),
        Some(ROUTE_GET_CHUNK) if method == Method::POST => get_chunk(&state, &body).await,
        route => {
            debug!(?route, %method, "Unknown API route");
            error_response(StatusCode::NOT_FOUND, "Not found")
        }
    }
}

async fn get_chunk(state: &AppState, body: &[u8]) -> Response {
    let request: ChunkRequest = match serde_json::from_slice(body) {
        Ok(request) => request,
        Err(e) => {
            debug!(error = %e, "Malformed chunk request");
            return error_response(StatusCode::BAD_REQUEST, format!("Malformed request: {e}"));
        }
    };

    match state.service.get_chunk(&request).await {
        Ok(chunk) => no_store(chunk),
        Err(e) => service_error(&e),
    }
}

fn service_error(e: &Error) -> Response {
    let status = if e.is_client_error() {
        debug!(error = %e, "Rejected chunk request");
        StatusCode::BAD_REQUEST
    } else {
        error!(error = %e, "Chunk request failed");
        StatusCode::INTERNAL_SERVER_ERROR
    };
    error_response(status, e.client_message())
}

fn no_store(body: impl Serialize) -> Response {
    (
        [(header::CACHE_CONTROL, HeaderValue::from_static("no-store"))],
        Json(body),
    )
        .into_response()
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(ErrorBody::new(message))).into_response()
}
