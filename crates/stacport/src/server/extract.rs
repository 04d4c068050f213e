//! Request extractors and response conversion shared by the routes.

use axum::body::Body;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use url::form_urlencoded;

use super::error::ApiError;
use super::state::AppState;
use crate::auth::{GitLabToken, TOKEN_HEADER};
use crate::gitlab::proxy::TOKEN_QUERY_PARAM;
use crate::http::{HttpHeaders, StreamingResponse};

/// Query parameters of a request, in order.
#[must_use]
pub fn query_pairs(uri: &Uri) -> Vec<(String, String)> {
    uri.query()
        .map(|query| {
            form_urlencoded::parse(query.as_bytes())
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect()
        })
        .unwrap_or_default()
}

/// Request headers as pairs; non-UTF-8 values are skipped.
#[must_use]
pub fn header_pairs(headers: &HeaderMap) -> HttpHeaders {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect()
}

/// The GitLab token the request runs with.
#[derive(Debug, Clone)]
pub struct Token(pub GitLabToken);

impl FromRequestParts<AppState> for Token {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        let query = query_pairs(&parts.uri);
        let query_token = query
            .iter()
            .find(|(k, _)| k == TOKEN_QUERY_PARAM)
            .map(|(_, v)| v.as_str());
        let header_token = parts
            .headers
            .get(TOKEN_HEADER)
            .and_then(|v| v.to_str().ok());

        GitLabToken::resolve(query_token, header_token, state.default_token.as_deref())
            .map(Token)
            .ok_or_else(|| ApiError::Forbidden("Unauthorized, no GitLab token given".to_string()))
    }
}

/// Public base URL of the API as seen by the caller, prefix included.
#[derive(Debug, Clone)]
pub struct BaseUrl(pub String);

impl FromRequestParts<AppState> for BaseUrl {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.split(',').next())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };
        let scheme = header("x-forwarded-proto")
            .or_else(|| parts.uri.scheme_str())
            .unwrap_or("http");
        let host = header("x-forwarded-host")
            .or_else(|| header("host"))
            .or_else(|| parts.uri.authority().map(|a| a.as_str()))
            .unwrap_or("localhost");
        let base = format!("{scheme}://{host}");
        Ok(BaseUrl(match state.server.prefix.trim_matches('/') {
            "" => base,
            prefix => format!("{base}/{prefix}"),
        }))
    }
}

/// Relay an upstream streaming response.
pub fn stream_response(upstream: StreamingResponse) -> Response {
    let status = StatusCode::from_u16(upstream.status).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut response = (status, Body::from_stream(upstream.body)).into_response();
    let headers = response.headers_mut();
    for (name, value) in upstream.headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(&value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.append(name, value);
            }
            _ => tracing::debug!(header = %name, "dropping invalid upstream header"),
        }
    }
    response
}
