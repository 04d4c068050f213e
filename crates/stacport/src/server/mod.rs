//! HTTP surface.
//!
//! Routes are grouped by concern and merged into one router:
//!
//! - `/api/status` - liveness
//! - `/api/stac/...` - STAC API generated from GitLab projects
//! - `/api/download/...` - repository files and archives
//! - `/api/gitlab/...` - GitLab REST proxy
//! - `/api/store/...` - presigned S3 redirects
//!
//! Every handler builds a GitLab client for the caller's token over the
//! shared transport.

use axum::error_handling::HandleErrorLayer;
use axum::extract::OriginalUri;
use axum::http::{HeaderValue, StatusCode};
use axum::{Json, Router};
use tower::ServiceBuilder;
use tower::timeout::TimeoutLayer;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod error;
mod extract;
mod routes;
pub mod state;

pub use error::{ApiError, ErrorResponse};
pub use routes::store::STORE_FEATURE;
pub use state::{AppState, ServerSettings};

/// Build the API router.
pub fn router(state: AppState) -> Router {
    let settings = std::sync::Arc::clone(&state.server);

    let api = Router::new()
        .merge(routes::status_routes())
        .merge(routes::stac::routes())
        .merge(routes::download::routes())
        .merge(routes::gitlab::routes())
        .merge(routes::store::routes());

    let prefix = settings.prefix.trim_matches('/');
    let router = if prefix.is_empty() {
        api
    } else {
        Router::new().nest(&format!("/{prefix}"), api)
    };

    let router = router
        .fallback(not_found)
        .layer(TraceLayer::new_for_http());

    let router = match cors_layer(&settings.allowed_origins) {
        Some(cors) => router.layer(cors),
        None => router,
    };

    let router = match settings.request_timeout {
        Some(timeout) => router.layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(handle_timeout_error))
                .layer(TimeoutLayer::new(timeout)),
        ),
        None => router,
    };

    router.with_state(state)
}

fn cors_layer(origins: &[String]) -> Option<CorsLayer> {
    if origins.is_empty() {
        return None;
    }
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::from(Any)
    } else {
        let origins: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(origin = %origin, "ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };
    Some(
        CorsLayer::new()
            .allow_origin(allow_origin)
            .allow_methods(Any)
            .allow_headers(Any),
    )
}

async fn not_found(uri: OriginalUri) -> ApiError {
    tracing::debug!(path = uri.0.path(), "no route");
    ApiError::NotFound("Not Found".to_string())
}

async fn handle_timeout_error(_err: tower::BoxError) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::GATEWAY_TIMEOUT,
        Json(ErrorResponse {
            detail: "Request timed out".to_string(),
        }),
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::Request;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;
    use crate::cache::Caches;
    use crate::category::tests::category;
    use crate::category::{CategoryRegistry, FeatureVal};
    use crate::http::{HttpMethod, MockTransport};
    use crate::s3::S3Settings;
    use crate::stac::StacSettings;

    const GRAPHQL: &str = "https://gitlab.example.com/api/graphql";
    const TOPICS: &str =
        "https://gitlab.example.com/api/v4/topics?per_page=100&pagination=keyset&order_by=id&sort=asc";

    fn state(transport: &MockTransport, default_token: Option<&str>) -> AppState {
        let mut store_category = category("dataset", "sharinghub:dataset");
        store_category
            .features
            .insert(STORE_FEATURE.to_string(), FeatureVal::Enable);
        let categories = CategoryRegistry::new(vec![
            category("ai-model", "sharinghub:aimodel"),
            store_category,
        ])
        .expect("registry");

        AppState {
            transport: Arc::new(transport.clone()),
            gitlab_url: "https://gitlab.example.com".to_string(),
            categories: Arc::new(categories),
            stac: Arc::new(StacSettings::default()),
            default_token: default_token.map(str::to_string),
            ignore_topics: Arc::new(vec!["internal".to_string()]),
            s3: None,
            caches: Arc::new(Caches::new(Duration::from_secs(300), Duration::from_secs(300))),
            server: Arc::new(ServerSettings::default()),
        }
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header("host", "stac.example.com")
            .body(Body::empty())
            .expect("request")
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        serde_json::from_slice(&body).expect("json body")
    }

    fn search_response(ids: &[u64], has_next: bool, count: u64) -> Value {
        let edges: Vec<Value> = ids
            .iter()
            .map(|id| {
                json!({"cursor": format!("c{id}"), "node": {
                    "id": format!("gid://gitlab/Project/{id}"),
                    "name": format!("Dataset {id}"),
                    "fullPath": format!("space/dataset-{id}"),
                    "topics": ["sharinghub:dataset"]
                }})
            })
            .collect();
        json!({"data": {"search": {
            "edges": edges,
            "pageInfo": {
                "hasPreviousPage": false,
                "hasNextPage": has_next,
                "startCursor": ids.first().map(|id| format!("c{id}")),
                "endCursor": ids.last().map(|id| format!("c{id}"))
            },
            "count": count
        }}})
    }

    fn link<'a>(doc: &'a Value, rel: &str) -> Option<&'a str> {
        doc["links"]
            .as_array()?
            .iter()
            .find(|l| l["rel"] == rel)
            .and_then(|l| l["href"].as_str())
    }

    // ─── Basics ───────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_status() {
        let app = router(state(&MockTransport::new(), None));
        let response = app.oneshot(get("/api/status")).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!([{"status": "ok"}]));
    }

    #[tokio::test]
    async fn test_unknown_route_is_not_found() {
        let app = router(state(&MockTransport::new(), None));
        let response = app.oneshot(get("/api/nope")).await.expect("response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await, json!({"detail": "Not Found"}));
    }

    #[tokio::test]
    async fn test_prefix_is_applied() {
        let mut state = state(&MockTransport::new(), None);
        state.server = Arc::new(ServerSettings {
            prefix: "/proxy/".to_string(),
            ..ServerSettings::default()
        });
        let app = router(state);
        let response = app
            .clone()
            .oneshot(get("/proxy/api/status"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let response = app.oneshot(get("/api/status")).await.expect("response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    // ─── STAC ─────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_stac_requires_a_token() {
        let app = router(state(&MockTransport::new(), None));
        let response = app.oneshot(get("/api/stac")).await.expect("response");
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_stac_root_links_carry_query_token() {
        let app = router(state(&MockTransport::new(), None));
        let response = app
            .oneshot(get("/api/stac?gitlab_token=secret"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let doc = body_json(response).await;
        assert_eq!(
            link(&doc, "child"),
            Some("http://stac.example.com/api/stac/collections/ai-model?gitlab_token=secret")
        );
    }

    #[tokio::test]
    async fn test_stac_root_honours_forwarded_proto() {
        let app = router(state(&MockTransport::new(), Some("default")));
        let request = Request::builder()
            .uri("/api/stac/")
            .header("host", "stac.example.com")
            .header("x-forwarded-proto", "https")
            .body(Body::empty())
            .expect("request");
        let doc = body_json(app.oneshot(request).await.expect("response")).await;
        assert_eq!(link(&doc, "self"), Some("https://stac.example.com/api/stac"));
    }

    #[tokio::test]
    async fn test_unknown_collection_is_not_found() {
        let app = router(state(&MockTransport::new(), Some("default")));
        let response = app
            .oneshot(get("/api/stac/collections/unknown"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_collection_items_reference_page() {
        let transport = MockTransport::new();
        transport.push_json(HttpMethod::Post, GRAPHQL, search_response(&[1, 2], true, 5));
        let app = router(state(&transport, Some("default")));

        let response = app
            .oneshot(get("/api/stac/collections/dataset/items?mode=reference&limit=2"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let doc = body_json(response).await;

        assert_eq!(doc["features"].as_array().map(Vec::len), Some(2));
        assert_eq!(doc["features"][0]["id"], "space/dataset-1");
        assert_eq!(doc["numberMatched"], 5);
        let next = link(&doc, "next").expect("next link");
        assert!(next.starts_with("http://stac.example.com/api/stac/collections/dataset/items?"));
        assert!(next.contains("after=c2"));
        assert!(next.contains("limit=2"));
        assert_eq!(link(&doc, "prev"), None);

        let body: Value = serde_json::from_slice(&transport.requests()[0].body).expect("json");
        assert_eq!(body["variables"]["topics"], json!(["sharinghub:dataset"]));
    }

    #[tokio::test]
    async fn test_search_with_several_collections_is_unprocessable() {
        let app = router(state(&MockTransport::new(), Some("default")));
        let response = app
            .oneshot(get("/api/stac/search?collections=dataset,ai-model"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_post_search_without_collection_is_empty() {
        let app = router(state(&MockTransport::new(), Some("default")));
        let request = Request::builder()
            .method("POST")
            .uri("/api/stac/search")
            .header("host", "stac.example.com")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"limit": 3}"#))
            .expect("request");
        let response = app.oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let doc = body_json(response).await;
        assert_eq!(doc["context"], json!({"limit": 3, "matched": 0, "returned": 0}));
    }

    // ─── Proxies ──────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_tags_hide_ignored_and_category_topics() {
        let transport = MockTransport::new();
        transport.push_json(
            HttpMethod::Get,
            TOPICS,
            json!([
                {"name": "eo"},
                {"name": "internal"},
                {"name": "sharinghub:dataset"},
                {"name": "flood"}
            ]),
        );
        let app = router(state(&transport, Some("default")));
        let response = app.oneshot(get("/api/gitlab/tags")).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!(["eo", "flood"]));
    }

    #[tokio::test]
    async fn test_download_requires_ref() {
        let app = router(state(&MockTransport::new(), Some("default")));
        let response = app
            .oneshot(get("/api/download/space/model/repository/a.txt"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    // ─── Store ────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_store_without_s3_is_not_found() {
        let app = router(state(&MockTransport::new(), Some("default")));
        let response = app
            .oneshot(get("/api/store/42/data/a.tif"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_store_redirects_contributors() {
        let transport = MockTransport::new();
        transport.push_json(
            HttpMethod::Post,
            GRAPHQL,
            json!({"data": {"currentUser": {"username": "alice"}}}),
        );
        transport.push_json(
            HttpMethod::Get,
            "https://gitlab.example.com/api/v4/projects/42?license=true",
            json!({"id": 42, "path_with_namespace": "space/dataset-42"}),
        );
        transport.push_json(
            HttpMethod::Post,
            GRAPHQL,
            json!({"data": {"project": {
                "id": "gid://gitlab/Project/42",
                "name": "Dataset 42",
                "fullPath": "space/dataset-42",
                "topics": ["sharinghub:dataset"],
                "createdAt": "2024-01-01T00:00:00Z",
                "lastActivityAt": "2024-06-01T00:00:00Z",
                "webUrl": "https://gitlab.example.com/space/dataset-42",
                "maxAccessLevel": {"integerValue": 30}
            }}}),
        );

        let mut state = state(&transport, Some("default"));
        state.s3 = Some(Arc::new(S3Settings {
            bucket: "bucket".to_string(),
            endpoint_url: Some("http://minio.local:9000".to_string()),
            region: "us-east-1".to_string(),
            access_key: "ak".to_string(),
            secret_key: "sk".to_string(),
            presigned_expiration: 60,
        }));
        let app = router(state);

        let response = app
            .oneshot(get("/api/store/42/data/a.tif"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        let location = response
            .headers()
            .get("location")
            .and_then(|v| v.to_str().ok())
            .expect("location");
        assert!(location.starts_with("http://minio.local:9000/bucket/42/data/a.tif?X-Amz-Algorithm="));
    }
}
