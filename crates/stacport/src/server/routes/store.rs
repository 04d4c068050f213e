//! S3 store redirects.
//!
//! Objects of a project live under `{project_id}/` in the bucket. Callers
//! with at least contributor access get a temporary redirect to a presigned
//! URL; the proxy never relays object bytes itself.

use axum::Router;
use axum::extract::{Path, State};
use axum::http::Method;
use axum::response::Redirect;
use axum::routing::{MethodFilter, on};
use chrono::Utc;

use crate::auth::GitLabToken;
use crate::cache::token_key;
use crate::http::HttpMethod;
use crate::provider::{AccessLevel, ProviderClient};
use crate::s3;
use crate::server::error::ApiError;
use crate::server::extract::Token;
use crate::server::state::AppState;

/// Category feature enabling the store.
pub const STORE_FEATURE: &str = "store-s3";

pub fn routes() -> Router<AppState> {
    let methods = MethodFilter::GET
        .or(MethodFilter::HEAD)
        .or(MethodFilter::PUT);
    Router::new().route("/api/store/{project_id}/{*path}", on(methods, redirect))
}

async fn redirect(
    State(state): State<AppState>,
    token: Token,
    method: Method,
    Path((project_id, path)): Path<(u64, String)>,
) -> Result<Redirect, ApiError> {
    let Some(settings) = state.s3.clone() else {
        return Err(ApiError::NotFound("S3 store is not configured".to_string()));
    };
    check_access(&state, &token.0, project_id).await?;

    let method = if method == Method::PUT {
        HttpMethod::Put
    } else {
        HttpMethod::Get
    };
    let key = format!("{project_id}/{}", path.trim_start_matches('/'));
    let url = s3::presign(&settings, method, &key, Utc::now())?;
    Ok(Redirect::temporary(&url))
}

/// Require the store feature on the project's category and contributor
/// access for the caller. Every lookup is cached.
async fn check_access(state: &AppState, token: &GitLabToken, project_id: u64) -> Result<(), ApiError> {
    let client = state.client(token);
    let caches = &state.caches;

    let user_key = token_key(&token.value);
    let user = match caches.users.get(&user_key) {
        Some(user) => user,
        None => {
            let user = client.get_user().await?;
            caches.users.insert(user_key, user.clone());
            user
        }
    };

    let id_key = project_id.to_string();
    let path = match caches.project_paths.get(&id_key) {
        Some(path) => path,
        None => {
            let path = client.get_project_path(project_id).await?;
            caches.project_paths.insert(id_key, path.clone());
            path
        }
    };

    let access_key = format!("{user}:{path}");
    let has_access = match caches.access.get(&access_key) {
        Some(has_access) => has_access,
        None => {
            let project = client.get_project(&path).await?;
            if !project.reference().category.is_enabled(STORE_FEATURE) {
                return Err(ApiError::Forbidden(
                    "S3 store is not enabled for this project's category".to_string(),
                ));
            }
            let has_access = project.access_level >= AccessLevel::Contributor;
            caches.access.insert(access_key, has_access);
            has_access
        }
    };

    if has_access {
        Ok(())
    } else {
        tracing::debug!(user = %user, path = %path, "store access denied");
        Err(ApiError::Forbidden(
            "Insufficient access level, must be at least developer.".to_string(),
        ))
    }
}
