//! STAC API endpoints.

use axum::extract::{OriginalUri, Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::Value;

use crate::provider::ProviderClient;
use crate::server::error::ApiError;
use crate::server::extract::{BaseUrl, Token, query_pairs};
use crate::server::state::AppState;
use crate::stac::StacContext;
use crate::stac::build::{self, PageLinks};
use crate::stac::search::{self, SearchGetParams, SearchMode, SearchRequest, StacSearchQuery};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/stac", get(root))
        .route("/api/stac/", get(root))
        .route("/api/stac/conformance", get(conformance))
        .route("/api/stac/collections", get(collections))
        .route("/api/stac/collections/{collection_id}", get(collection))
        .route("/api/stac/collections/{collection_id}/items", get(items))
        .route(
            "/api/stac/collections/{collection_id}/items/{*feature_id}",
            get(feature),
        )
        .route("/api/stac/search", get(search_get).post(search_post))
}

fn context<'a>(
    state: &'a AppState,
    base_url: &'a BaseUrl,
    token: &'a Token,
) -> StacContext<'a> {
    StacContext {
        base_url: &base_url.0,
        token: &token.0,
        gitlab_url: &state.gitlab_url,
        settings: &state.stac,
    }
}

async fn root(State(state): State<AppState>, base_url: BaseUrl, token: Token) -> Json<Value> {
    let ctx = context(&state, &base_url, &token);
    Json(build::root(&ctx, state.categories.all()))
}

async fn conformance() -> Json<Value> {
    Json(build::conformance())
}

async fn collections(
    State(state): State<AppState>,
    base_url: BaseUrl,
    token: Token,
) -> Json<Value> {
    let ctx = context(&state, &base_url, &token);
    Json(build::collections(&ctx, state.categories.all()))
}

async fn collection(
    State(state): State<AppState>,
    base_url: BaseUrl,
    token: Token,
    Path(collection_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let category = state.categories.from_collection_id(&collection_id)?;
    let ctx = context(&state, &base_url, &token);
    Ok(Json(build::collection(&ctx, category)))
}

async fn items(
    State(state): State<AppState>,
    base_url: BaseUrl,
    token: Token,
    Path(collection_id): Path<String>,
    OriginalUri(uri): OriginalUri,
    Query(params): Query<SearchGetParams>,
) -> Result<Json<Value>, ApiError> {
    let category = state.categories.from_collection_id(&collection_id)?;
    let ctx = context(&state, &base_url, &token);

    // Only paging and spatio-temporal filters apply to collection items.
    let filters = SearchGetParams {
        limit: params.limit,
        bbox: params.bbox.clone(),
        datetime: params.datetime.clone(),
        ..SearchGetParams::default()
    };
    let mut query = StacSearchQuery::from_get(&filters)?;
    query.collections = vec![category.id.clone()];

    let request = SearchRequest {
        query: &query,
        mode: params.mode.unwrap_or_default(),
        before: params.before,
        after: params.after,
        category: Some(category),
    };
    let page = PageLinks {
        route: ctx.items_route(&category.id),
        request_query: query_pairs(&uri),
        state_query: Vec::new(),
    };
    let client = state.client(&token.0);
    let licenses = state.server.cache.then_some(&state.caches.licenses);
    let doc = search::search(&client, &state.categories, request, &ctx, page, licenses).await?;
    Ok(Json(doc))
}

async fn feature(
    State(state): State<AppState>,
    base_url: BaseUrl,
    token: Token,
    Path((collection_id, feature_id)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let category = state.categories.from_collection_id(&collection_id)?;
    let feature_id = feature_id.trim_matches('/');
    if feature_id.is_empty() {
        return Err(ApiError::BadRequest("No feature ID given".to_string()));
    }

    let client = state.client(&token.0);
    let mut project = client.get_project(feature_id).await?;
    let project_category = &project.reference().category;
    if project_category.id != category.id {
        return Err(ApiError::BadRequest(format!(
            "Category mismatch for project '{}', asked '{}' but got '{}' instead",
            project.path(),
            category.id,
            project_category.id
        )));
    }

    let licenses = state.server.cache.then_some(&state.caches.licenses);
    search::resolve_license(&client, &mut project, licenses).await?;

    let ctx = context(&state, &base_url, &token);
    Ok(Json(build::item(&ctx, &project)))
}

async fn search_get(
    State(state): State<AppState>,
    base_url: BaseUrl,
    token: Token,
    OriginalUri(uri): OriginalUri,
    Query(params): Query<SearchGetParams>,
) -> Result<Json<Value>, ApiError> {
    let query = StacSearchQuery::from_get(&params)?;
    let request = SearchRequest {
        query: &query,
        mode: params.mode.unwrap_or_default(),
        before: params.before.clone(),
        after: params.after.clone(),
        category: None,
    };
    run_search(&state, &base_url, &token, request, query_pairs(&uri)).await
}

/// Cursor and mode of a POST search, given in the query string.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SearchPostParams {
    mode: Option<SearchMode>,
    before: Option<String>,
    after: Option<String>,
}

async fn search_post(
    State(state): State<AppState>,
    base_url: BaseUrl,
    token: Token,
    OriginalUri(uri): OriginalUri,
    Query(params): Query<SearchPostParams>,
    Json(query): Json<StacSearchQuery>,
) -> Result<Json<Value>, ApiError> {
    let request = SearchRequest {
        query: &query,
        mode: params.mode.unwrap_or_default(),
        before: params.before,
        after: params.after,
        category: None,
    };
    run_search(&state, &base_url, &token, request, query_pairs(&uri)).await
}

async fn run_search(
    state: &AppState,
    base_url: &BaseUrl,
    token: &Token,
    request: SearchRequest<'_>,
    request_query: Vec<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let ctx = context(state, base_url, token);
    let page = PageLinks {
        route: ctx.search_route(),
        request_query,
        state_query: Vec::new(),
    };
    let client = state.client(&token.0);
    let licenses = state.server.cache.then_some(&state.caches.licenses);
    let doc = search::search(&client, &state.categories, request, &ctx, page, licenses).await?;
    Ok(Json(doc))
}
