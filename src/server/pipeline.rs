//! Per-request orchestration.
//!
//! Every request walks the same state machine:
//!
//! ```text
//! Received -> AdmissionChecked -> BodyConsumed -> Recorded -> ChaosEvaluated -> Responded
//! ```
//!
//! Short-circuits:
//! - admission rejection stops at AdmissionChecked (503)
//! - a body read error stops at BodyConsumed (500), nothing is recorded
//!
//! Special paths skip capture entirely. They are matched in a fixed order,
//! after the admission check:
//! 1. `/favicon.ico` (exact)
//! 2. any path containing `recordedRequests`
//! 3. any path containing `configDelay`
//! 4. `/metrics` (exact)
//! 5. everything else is captured
//!
//! `/x/recordedRequestsXYZ` is an inspection request.

use crate::capture::digest::{digest_body, DigestMode};
use crate::capture::history::{history, HistoryConsumer, HistoryView, HistoryWriter};
use crate::capture::record::{render_history, RequestRecord};
use crate::chaos::admission::AdmissionGuard;
use crate::chaos::policy::{ChaosField, ChaosPolicy};
use crate::config::ServerConfig;
use crate::error::PutterError;
use crate::metrics::registry::METRICS;
use crate::server::body::BodyReader;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Body;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Request, Response, StatusCode, Uri};
use std::convert::Infallible;
use std::error::Error as StdError;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

const FAVICON_PATH: &str = "/favicon.ico";
const INSPECTION_MARKER: &str = "recordedRequests";
const CONFIG_MARKER: &str = "configDelay";
const METRICS_PATH: &str = "/metrics";

/// Which branch of the pipeline a path takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Favicon,
    RecordedRequests,
    ConfigDelay,
    Metrics,
    Capture,
}

/// Classify a request path. First match wins.
pub fn route(path: &str) -> Route {
    if path == FAVICON_PATH {
        Route::Favicon
    } else if path.contains(INSPECTION_MARKER) {
        Route::RecordedRequests
    } else if path.contains(CONFIG_MARKER) {
        Route::ConfigDelay
    } else if path == METRICS_PATH {
        Route::Metrics
    } else {
        Route::Capture
    }
}

/// Everything a handler needs, shared across all connections.
pub struct AppState {
    pub digest_mode: DigestMode,
    pub history: HistoryWriter,
    pub view: HistoryView,
    pub chaos: ChaosPolicy,
    pub admission: AdmissionGuard,
}

impl AppState {
    /// Build shared state plus the history consumer, which the caller must spawn.
    pub fn new(config: &ServerConfig) -> Result<(Arc<Self>, HistoryConsumer), PutterError> {
        let (writer, view, consumer) = history(config.history_capacity)?;
        let state = Self {
            digest_mode: config.digest_mode(),
            history: writer,
            view,
            chaos: ChaosPolicy::with_limit(config.initial_inflight_limit),
            admission: AdmissionGuard::new(),
        };
        Ok((Arc::new(state), consumer))
    }
}

/// Serve one request.
///
/// Never fails: every error path is turned into a response.
pub async fn handle<B>(
    state: Arc<AppState>,
    req: Request<B>,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: Body<Data = Bytes> + Unpin,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    // Registered before sampling, so the count includes this request.
    let _ticket = state.admission.enter();

    if let Err(rejection) = state.admission.check(state.chaos.inflight_limit()) {
        METRICS.inc_requests_rejected();
        warn!(
            limit = rejection.limit,
            in_flight = rejection.in_flight,
            path = req.uri().path(),
            "request rejected"
        );
        return Ok(text(
            StatusCode::SERVICE_UNAVAILABLE,
            format!("{}\n", rejection),
        ));
    }

    let response = match route(req.uri().path()) {
        Route::Favicon => text(StatusCode::NOT_FOUND, "No icon for you!\n"),
        Route::RecordedRequests => inspect(&state),
        Route::ConfigDelay => configure(&state, req.uri().query()),
        Route::Metrics => text(StatusCode::OK, METRICS.export_prometheus()),
        Route::Capture => capture(&state, req).await,
    };
    Ok(response)
}

fn inspect(state: &AppState) -> Response<Full<Bytes>> {
    match state.view.snapshot() {
        Ok(records) => text(StatusCode::OK, render_history(&records)),
        Err(e) => {
            error!(error = %e, "history snapshot failed");
            text(StatusCode::INTERNAL_SERVER_ERROR, format!("{}\n", e))
        }
    }
}

/// Apply every parseable chaos parameter, report the rest, echo the result.
fn configure(state: &AppState, query: Option<&str>) -> Response<Full<Bytes>> {
    let mut output = String::new();

    for update in chaos_updates(query.unwrap_or("")) {
        match update {
            Ok((field, value)) => {
                state.chaos.configure(field, value);
                METRICS.inc_config_updates();
                info!(field = field.query_key(), value, "chaos field updated");
            }
            Err(e) => {
                warn!(error = %e, "ignoring chaos parameter");
                output.push_str(&format!("{}\n", e));
            }
        }
    }

    output.push_str(&state.chaos.snapshot().to_string());
    text(StatusCode::OK, output)
}

/// Parse chaos parameters out of a raw query string, in query order.
///
/// - Keys: `delay`, `variance`, `chance`, `limit`; any other key is ignored
/// - First occurrence of a key wins
/// - Empty values are skipped
/// - Each non-integer value yields its own error; the others still apply
pub fn chaos_updates(query: &str) -> Vec<Result<(ChaosField, i64), PutterError>> {
    let mut seen: Vec<ChaosField> = Vec::with_capacity(ChaosField::ALL.len());
    let mut updates = Vec::new();

    for (key, raw) in url::form_urlencoded::parse(query.as_bytes()) {
        let Ok(field) = key.parse::<ChaosField>() else {
            continue;
        };
        if seen.contains(&field) {
            continue;
        }
        seen.push(field);

        if raw.is_empty() {
            continue;
        }
        updates.push(
            raw.parse::<i64>()
                .map(|value| (field, value))
                .map_err(|e| PutterError::InvalidParameter {
                    name: field.query_key().to_string(),
                    value: raw.to_string(),
                    reason: e.to_string(),
                }),
        );
    }

    updates
}

/// Generic capture: digest the body, record it, maybe stall, respond.
async fn capture<B>(state: &AppState, req: Request<B>) -> Response<Full<Bytes>>
where
    B: Body<Data = Bytes> + Unpin,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    let method = req.method().to_string();
    let uri = request_uri(req.uri());
    let path = req.uri().path().to_string();

    let mut reader = BodyReader::new(req.into_body());
    let digest = match digest_body(&mut reader, state.digest_mode).await {
        Ok(digest) => digest,
        Err(e) => {
            METRICS.inc_body_read_errors();
            error!(%method, %uri, error = %e, "request body read failed");
            return text(StatusCode::INTERNAL_SERVER_ERROR, format!("{}\n", e));
        }
    };

    let size = digest.bytes_consumed;
    let record = RequestRecord::new(method, uri, size, digest.hex, digest.payload);
    if let Err(e) = state.history.ingest(record).await {
        error!(error = %e, "dropping captured request");
        return text(StatusCode::INTERNAL_SERVER_ERROR, format!("{}\n", e));
    }
    METRICS.inc_requests_captured(size);
    debug!(%path, size, "request captured");

    let response = text(StatusCode::OK, format!("{} received\n", path));

    // Stall after the response is built and before it is released.
    if let Some(stall) = state.chaos.decide() {
        let millis = u64::try_from(stall.as_millis()).unwrap_or(u64::MAX);
        METRICS.record_chaos_stall(millis);
        if !stall.is_zero() {
            debug!(%path, delay_ms = millis, "chaos stall");
            tokio::time::sleep(stall).await;
        }
    }

    response
}

/// Path plus query, as sent on the request line.
fn request_uri(uri: &Uri) -> String {
    uri.path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string())
}

fn text(status: StatusCode, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}
