//! Object API request handlers.

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, HeaderValue, Response, StatusCode};
use axum::Json;
use bytes::Bytes;
use serde::Serialize;
use tracing::info;

use till_engine::{validate_key, WriteOutcome, WriteRequest};
use till_store::ProviderKind;

use crate::error::ApiError;
use crate::AppState;

const LIFESPAN_HEADER: &str = "X-Till-Lifespan";
const SYNCHRONIZED_HEADER: &str = "X-Till-Synchronized";
const METADATA_HEADER: &str = "X-Till-Metadata";
const PROVIDERS_HEADER: &str = "X-Till-Providers";

/// Fetch a header value as an owned string.
///
/// Lookup is case-insensitive per HTTP semantics ([`HeaderMap`] keys are
/// normalized); the value bytes are taken as-is.
fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
}

/// Parse the comma-separated `X-Till-Providers` filter.
fn provider_filter(headers: &HeaderMap) -> Vec<String> {
    header_string(headers, PROVIDERS_HEADER)
        .map(|raw| {
            raw.split(',')
                .map(|token| token.trim().to_string())
                .filter(|token| !token.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

// -----------------------------------------------------------------------
// POST /api/v1/object/{key}
// -----------------------------------------------------------------------

/// Store an object.
///
/// The dispatcher performs all header validation; this handler only
/// moves the request into dispatcher form and maps the outcome to a
/// status code: `202` accepted (asynchronous or routing no-op), `201`
/// created (synchronized success), `400` validation failure, `502` with
/// a per-provider JSON report when a synchronized write fails.
pub(crate) async fn post_object(
    State(state): State<AppState>,
    Path(key): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response<Body>, ApiError> {
    validate_key(&key)?;

    let request = WriteRequest {
        value: body,
        lifespan: header_string(&headers, LIFESPAN_HEADER),
        synchronized: header_string(&headers, SYNCHRONIZED_HEADER),
        metadata: header_string(&headers, METADATA_HEADER).filter(|m| !m.is_empty()),
        providers: provider_filter(&headers),
        key,
    };
    let key = request.key.clone();
    let size = request.value.len();

    match state.dispatcher.put(request).await? {
        WriteOutcome::Accepted => {
            info!(%key, size, "post_object accepted");
            Ok(Response::builder()
                .status(StatusCode::ACCEPTED)
                .body(Body::empty())
                .unwrap())
        }
        WriteOutcome::Created => {
            info!(%key, size, "post_object created");
            Ok(Response::builder()
                .status(StatusCode::CREATED)
                .body(Body::empty())
                .unwrap())
        }
        WriteOutcome::Failed(report) => Err(ApiError::Providers(report)),
    }
}

// -----------------------------------------------------------------------
// GET /api/v1/object/{key}
// -----------------------------------------------------------------------

/// Fetch an object from the first eligible provider that holds it.
pub(crate) async fn get_object(
    State(state): State<AppState>,
    Path(key): Path<String>,
    headers: HeaderMap,
) -> Result<Response<Body>, ApiError> {
    validate_key(&key)?;

    let providers = provider_filter(&headers);
    let object = state
        .dispatcher
        .get(&key, &providers)
        .await
        .ok_or(ApiError::NotFound)?;

    info!(%key, size = object.value.len(), "get_object");

    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header("content-length", object.value.len().to_string());
    if let Some(value) = object
        .metadata
        .as_deref()
        .filter(|m| !m.is_empty())
        .and_then(|m| HeaderValue::from_str(m).ok())
    {
        builder = builder.header(METADATA_HEADER, value);
    }
    Ok(builder.body(Body::from(object.value)).unwrap())
}

// -----------------------------------------------------------------------
// GET /api/v1/stats
// -----------------------------------------------------------------------

/// Response body for `GET /api/v1/stats`.
#[derive(Serialize)]
pub(crate) struct StatsResponse {
    pub identifier: String,
    pub providers: Vec<ProviderInfo>,
}

/// One configured provider in the stats snapshot.
#[derive(Serialize)]
pub(crate) struct ProviderInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ProviderKind,
}

/// Report the node's identity and configured providers.
pub(crate) async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    let providers = state
        .dispatcher
        .registry()
        .iter()
        .map(|p| ProviderInfo {
            name: p.name().to_string(),
            kind: p.kind(),
        })
        .collect();
    Json(StatsResponse {
        identifier: state.identifier.clone(),
        providers,
    })
}
