use std::collections::BTreeMap;

use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Json, Response};
use bytes::Bytes;
use docattr_core::{UpdateAttribution, VersionDelta};
use docattr_store::{DocId, Timestamp};
use serde::Serialize;
use serde_json::{json, Value};

use crate::error::{ServerError, ServerResult};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct DeltasResponse {
    pub deltas: Vec<VersionDelta>,
}

fn parse_docid(raw: String) -> ServerResult<DocId> {
    Ok(DocId::new(raw)?)
}

fn require_body(body: &Bytes, what: &str) -> ServerResult<()> {
    if body.is_empty() {
        return Err(ServerError::Validation(format!(
            "missing {what} in request body"
        )));
    }
    Ok(())
}

/// Split the query into the attribution fields and custom tags.
fn parse_attribution(params: Vec<(String, String)>) -> ServerResult<UpdateAttribution> {
    let mut user = None;
    let mut timestamp: Option<Timestamp> = None;
    let mut custom = BTreeMap::new();
    for (key, value) in params {
        match key.as_str() {
            "user" => user = Some(value),
            "timestamp" => {
                timestamp = Some(value.parse().map_err(|_| {
                    ServerError::Validation(format!("timestamp {value:?} is not an integer"))
                })?)
            }
            "" => return Err(ServerError::Validation("empty query parameter name".into())),
            _ => {
                custom.insert(key, value);
            }
        }
    }
    let user = user
        .ok_or_else(|| ServerError::Validation("expecting parameters: user, timestamp?".into()))?;
    let timestamp = timestamp.unwrap_or_else(now_ms);
    Ok(UpdateAttribution {
        user,
        timestamp,
        custom,
    })
}

fn now_ms() -> Timestamp {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0)
}

/// `POST /attribute/:docid`
pub async fn attribute_handler(
    State(state): State<AppState>,
    Path(docid): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
    body: Bytes,
) -> ServerResult<Json<Value>> {
    let docid = parse_docid(docid)?;
    require_body(&body, "update data")?;
    let attribution = parse_attribution(params)?;
    let cache = state.pipeline.cache();
    state.admission.check(cache.pending_bytes(), body.len())?;

    let armed = state
        .pipeline
        .attributions
        .attribute(docid.clone(), &body, &attribution)?;
    tracing::debug!(%docid, user = %attribution.user, armed, "attribution scheduled");
    Ok(Json(json!({ "success": true })))
}

/// `GET /attributions/:docid`
pub async fn attributions_handler(
    State(state): State<AppState>,
    Path(docid): Path<String>,
) -> ServerResult<Response> {
    let docid = parse_docid(docid)?;
    let map = state.pipeline.attributions.get_attributions(&docid).await?;
    let encoded = map.encode().map_err(docattr_core::CoreError::from)?;
    Ok((
        [(header::CONTENT_TYPE, "application/octet-stream")],
        encoded,
    )
        .into_response())
}

/// `POST /version/:docid`
pub async fn version_handler(
    State(state): State<AppState>,
    Path(docid): Path<String>,
    body: Bytes,
) -> ServerResult<Json<Value>> {
    let docid = parse_docid(docid)?;
    require_body(&body, "document data")?;
    let timestamp = state
        .pipeline
        .versions
        .store_version(&docid, body.to_vec())
        .await?;
    Ok(Json(json!({ "success": true, "timestamp": timestamp })))
}

/// `GET /version-deltas/:docid`
pub async fn version_deltas_handler(
    State(state): State<AppState>,
    Path(docid): Path<String>,
) -> ServerResult<Json<DeltasResponse>> {
    let docid = parse_docid(docid)?;
    let deltas = state.pipeline.versions.get_all_version_deltas(&docid).await?;
    Ok(Json(DeltasResponse { deltas }))
}

/// `GET /health`
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    let cache = state.pipeline.cache();
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "queued": cache.queue_len(),
        "pending_docs": cache.pending_docs(),
        "pending_bytes": cache.pending_bytes(),
    }))
}
