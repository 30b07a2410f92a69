use axum::{
    Json, Router,
    extract::{Query, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::{
    error::RelayError,
    relay::fetcher::{DEFAULT_CONTENT_TYPE, ImageRelay, RELAY_PATH},
};

const IMMUTABLE_FOR_A_YEAR: &str = "public, max-age=31536000, immutable";

#[derive(Debug, Deserialize)]
pub struct RelayQuery {
    url: Option<String>,
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            RelayError::BadRequest => (StatusCode::BAD_REQUEST, "Missing url parameter"),
            RelayError::Upstream { .. } | RelayError::Network(_) => {
                error!("Image relay error: {}", self);
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch image")
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

pub fn router(relay: ImageRelay) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route(RELAY_PATH, get(proxy_image))
        .with_state(relay)
        .layer(TraceLayer::new_for_http())
}

async fn healthz() -> impl IntoResponse {
    "ok"
}

async fn proxy_image(
    State(relay): State<ImageRelay>,
    Query(query): Query<RelayQuery>,
) -> Result<Response, RelayError> {
    let image = relay.relay(query.url.as_deref()).await?;

    let content_type = HeaderValue::from_str(&image.content_type)
        .unwrap_or(HeaderValue::from_static(DEFAULT_CONTENT_TYPE));
    let mut response = Response::new(image.bytes.into());
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, content_type);
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(IMMUTABLE_FOR_A_YEAR),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    Ok(response)
}
