//! GitLab REST proxy.

use axum::body::Bytes;
use axum::extract::{OriginalUri, Path, State};
use axum::http::{HeaderMap, Method};
use axum::response::Response;
use axum::routing::{MethodFilter, get, on};
use axum::{Json, Router};

use crate::http::HttpMethod;
use crate::provider::{ForwardedRequest, ProviderClient};
use crate::server::error::ApiError;
use crate::server::extract::{Token, header_pairs, query_pairs, stream_response};
use crate::server::state::AppState;

pub fn routes() -> Router<AppState> {
    let proxied = MethodFilter::GET
        .or(MethodFilter::POST)
        .or(MethodFilter::PUT)
        .or(MethodFilter::DELETE)
        .or(MethodFilter::PATCH);
    Router::new()
        .route("/api/gitlab/tags", get(tags))
        .route("/api/gitlab/{*endpoint}", on(proxied, proxy))
}

/// Topic names usable as tags: neither ignored nor a category topic.
async fn tags(State(state): State<AppState>, token: Token) -> Result<Json<Vec<String>>, ApiError> {
    let topics = state.client(&token.0).get_topics().await?;
    let category_topics: Vec<&str> = state.categories.topics().collect();
    let tags = topics
        .into_iter()
        .map(|topic| topic.name)
        .filter(|name| {
            !state.ignore_topics.iter().any(|t| t == name)
                && !category_topics.contains(&name.as_str())
        })
        .collect();
    Ok(Json(tags))
}

async fn proxy(
    State(state): State<AppState>,
    token: Token,
    method: Method,
    Path(endpoint): Path<String>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let method = HttpMethod::parse(method.as_str())
        .ok_or_else(|| ApiError::BadRequest(format!("Unsupported method {method}")))?;
    let request = ForwardedRequest {
        method,
        query: query_pairs(&uri),
        headers: header_pairs(&headers),
        body: body.to_vec(),
    };
    let upstream = state
        .client(&token.0)
        .rest_proxy(&endpoint, request)
        .await?;
    Ok(stream_response(upstream))
}
