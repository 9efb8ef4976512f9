//! HTTP surface (spec §6): an axum [`Router`] wiring each endpoint to
//! the orchestration functions in [`crate::search`], [`crate::ingest`],
//! and [`crate::pcap`].
//!
//! Grounded on `examples/original_source/zqd/handlers.go` for the
//! route set and the error-to-status mapping (`errorResponse`), and on
//! `examples/Lowband21-ferrex/ferrex-server/src/errors.rs` +
//! `src/main.rs` for the idiomatic axum shape this is translated into:
//! an `AppError`/`IntoResponse` pair instead of a status+body tuple
//! threaded through every handler, and a layered `Router` (CORS, then
//! tracing) instead of hand-rolled logging calls.

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderName, HeaderValue, Request, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use futures::StreamExt;
use serde::Deserialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use zq_core::{Error, Result, SpaceId, Span};
use zq_wire::protocol::{
    ApiError, LogPostRequest, PcapPostRequest, SearchRequest, SpaceInfo, SpacePostRequest,
    SpacePutRequest, StatusResponse,
};

use crate::ingest;
use crate::pcap;
use crate::search;
use crate::space;
use crate::space_registry::SpaceRegistry;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SpaceRegistry>,
}

/// Wraps a [`zq_core::Error`] for axum's `IntoResponse`, mapping its
/// [`zq_core::Kind`] to an HTTP status the same way
/// `errorResponse` does (spec §6's kind → status table).
pub struct AppError(Error);

impl From<Error> for AppError {
    fn from(e: Error) -> Self {
        AppError(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(ApiError::from(&self.0))).into_response()
    }
}

type HandlerResult<T> = std::result::Result<T, AppError>;

static REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Per-connection incrementing counter backing [`CountingRequestId`]
/// (spec §6 "a per-connection incrementing request ID is echoed in
/// `X-Request-ID`"). A process-wide monotonic singleton rather than a
/// per-router one so ids stay unique across every `Router` built in
/// the process, matching spec §9's note on global mutable state.
static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Clone, Default)]
struct CountingRequestId;

impl MakeRequestId for CountingRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let id = NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed);
        HeaderValue::from_str(&id.to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// Build the full router: space CRUD, search, log/pcap ingest, pcap
/// query, and a bare liveness check (spec §6 endpoint table).
///
/// Layer order (outermost first): CORS, then request-id assignment,
/// then tracing (so spans carry the id), then request-id propagation
/// back onto the response. [`SetRequestIdLayer`] already leaves a
/// client-supplied `X-Request-ID` untouched rather than overwriting it
/// (spec §6's propagate-unchanged requirement).
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/status", get(status))
        .route("/space", get(list_spaces).post(create_space))
        .route(
            "/space/:id",
            get(get_space).put(update_space).delete(delete_space),
        )
        .route("/search", post(run_search))
        .route("/log/:id", post(post_log))
        .route("/pcap/:id", post(post_pcap))
        .route("/pcap", get(query_pcap))
        .layer(PropagateRequestIdLayer::new(REQUEST_ID_HEADER.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::new(
            REQUEST_ID_HEADER.clone(),
            CountingRequestId,
        ))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn status() -> Json<StatusResponse> {
    Json(StatusResponse { ok: true, version: env!("CARGO_PKG_VERSION").to_string() })
}

async fn list_spaces(State(state): State<AppState>) -> HandlerResult<Json<Vec<SpaceInfo>>> {
    let infos: Result<Vec<SpaceInfo>> = state
        .registry
        .list()
        .into_iter()
        .map(|cfg| {
            let cache = state.registry.info_cache(&cfg)?;
            Ok(space::space_info(&cfg, &cache))
        })
        .collect();
    Ok(Json(infos?))
}

async fn create_space(
    State(state): State<AppState>,
    Json(request): Json<SpacePostRequest>,
) -> HandlerResult<Json<SpaceInfo>> {
    let cfg = state.registry.create(request)?;
    let cache = state.registry.info_cache(&cfg)?;
    Ok(Json(space::space_info(&cfg, &cache)))
}

async fn get_space(
    State(state): State<AppState>,
    Path(id): Path<SpaceId>,
) -> HandlerResult<Json<SpaceInfo>> {
    let cfg = state.registry.get(&id)?;
    let cache = state.registry.info_cache(&cfg)?;
    Ok(Json(space::space_info(&cfg, &cache)))
}

async fn update_space(
    State(state): State<AppState>,
    Path(id): Path<SpaceId>,
    Json(request): Json<SpacePutRequest>,
) -> HandlerResult<Json<SpaceInfo>> {
    let cfg = state.registry.update(&id, request)?;
    let cache = state.registry.info_cache(&cfg)?;
    Ok(Json(space::space_info(&cfg, &cache)))
}

async fn delete_space(
    State(state): State<AppState>,
    Path(id): Path<SpaceId>,
) -> HandlerResult<StatusCode> {
    state.registry.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Stream the NDJSON control-frame protocol (spec §6) as the response
/// body: one `serde_json::Value` per line, flushed as it's produced
/// rather than buffered whole. The orchestration itself pulls
/// processors synchronously, so it runs on a blocking-pool thread
/// (`spawn_blocking`) and hands frames to the response body over a
/// bounded async channel rather than running it on a worker thread
/// directly.
async fn run_search(State(state): State<AppState>, Json(request): Json<SearchRequest>) -> Response {
    let registry = state.registry.clone();
    ndjson_response(move |emit| search::run_search(&registry, request, emit))
}

async fn post_log(
    State(state): State<AppState>,
    Path(id): Path<SpaceId>,
    Json(request): Json<LogPostRequest>,
) -> Response {
    ndjson_response(move |emit| ingest::ingest_log(&state.registry, &id, request, emit))
}

async fn post_pcap(
    State(state): State<AppState>,
    Path(id): Path<SpaceId>,
    Json(request): Json<PcapPostRequest>,
) -> Response {
    ndjson_response(move |emit| pcap::ingest_pcap(&state.registry, &id, request, emit))
}

/// Shared plumbing for the three NDJSON-streaming endpoints (search,
/// log-post, pcap-post, spec §6): run a blocking orchestration
/// function on the blocking thread pool, forwarding each frame it
/// emits to the response body as soon as it's produced.
fn ndjson_response(
    run: impl FnOnce(&mut dyn FnMut(serde_json::Value) -> std::io::Result<()>) -> Result<()>
        + Send
        + 'static,
) -> Response {
    let (tx, rx) = tokio::sync::mpsc::channel::<serde_json::Value>(32);

    tokio::task::spawn_blocking(move || {
        let mut emit = move |frame: serde_json::Value| {
            tx.blocking_send(frame).map_err(|_| {
                std::io::Error::new(std::io::ErrorKind::BrokenPipe, "receiver dropped")
            })
        };
        let _ = run(&mut emit);
    });

    let body_stream = tokio_stream::wrappers::ReceiverStream::new(rx).map(|frame| {
        let mut line = serde_json::to_vec(&frame).expect("protocol frames always serialize");
        line.push(b'\n');
        Ok::<_, std::io::Error>(line)
    });

    Response::builder()
        .status(StatusCode::OK)
        .header("content-type", "application/x-ndjson")
        .body(Body::from_stream(body_stream))
        .expect("a static header set never fails to build")
}

/// `GET /pcap` query parameters (spec §6). `proto`/`src_host`/
/// `dst_host`/ports are accepted, matching the wire contract, but only
/// the span fields reach [`pcap::query_pcap`] — see that module's doc
/// comment for why.
#[derive(Debug, Deserialize)]
struct PcapQueryParams {
    space: SpaceId,
    ts_sec: i64,
    ts_ns: i64,
    duration_sec: i64,
    duration_ns: i64,
    #[allow(dead_code)]
    proto: Option<String>,
    #[allow(dead_code)]
    src_host: Option<String>,
    #[allow(dead_code)]
    dst_host: Option<String>,
    #[allow(dead_code)]
    src_port: Option<u16>,
    #[allow(dead_code)]
    dst_port: Option<u16>,
}

async fn query_pcap(
    State(state): State<AppState>,
    Query(params): Query<PcapQueryParams>,
) -> HandlerResult<Response> {
    let ts = params.ts_sec * 1_000_000_000 + params.ts_ns;
    let dur = params.duration_sec * 1_000_000_000 + params.duration_ns;
    let span = Span::new(ts, dur);

    let slices = pcap::query_pcap(&state.registry, &params.space, span)?;
    let source = state.registry.source();
    let uri = zq_storage::Uri::parse(&slices.path);

    // `Source` exposes no seek capability (spec §4.1's contract is
    // read/write/remove/exists only), so the whole file is read once
    // and the byte ranges are sliced out of memory.
    let whole = zq_storage::read_all(source.as_ref(), &uri)?;
    let mut bytes = Vec::new();
    for range in &slices.ranges {
        let start = range.start as usize;
        let end = (range.end as usize).min(whole.len());
        if start < end {
            bytes.extend_from_slice(&whole[start..end]);
        }
    }

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header("content-type", "application/vnd.tcpdump.pcap")
        .body(Body::from(bytes))
        .expect("a static header set never fails to build"))
}
