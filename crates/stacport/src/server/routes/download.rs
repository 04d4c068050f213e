//! Download proxy for repository files and archives.

use std::sync::LazyLock;

use axum::Router;
use axum::extract::{OriginalUri, Path, State};
use axum::http::HeaderMap;
use axum::response::Response;
use axum::routing::get;
use regex::Regex;

use crate::http::HttpMethod;
use crate::provider::{ArchiveDownload, FileDownload, ForwardedRequest, ProviderClient};
use crate::server::error::ApiError;
use crate::server::extract::{Token, header_pairs, query_pairs, stream_response};
use crate::server::state::AppState;

static ARCHIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<project>.+)/archive\.(?P<format>[A-Za-z0-9.]+)$").expect("valid regex")
});

const REPOSITORY_SEPARATOR: &str = "/repository/";

pub fn routes() -> Router<AppState> {
    Router::new().route("/api/download/{*path}", get(download))
}

/// What a download path designates.
#[derive(Debug, PartialEq, Eq)]
enum Target<'a> {
    File { project: &'a str, file: &'a str },
    Archive { project: &'a str, format: &'a str },
}

fn parse_target(path: &str) -> Option<Target<'_>> {
    let path = path.trim_start_matches('/');
    if let Some((project, file)) = path.split_once(REPOSITORY_SEPARATOR) {
        return (!project.is_empty() && !file.is_empty()).then_some(Target::File { project, file });
    }
    let caps = ARCHIVE.captures(path)?;
    Some(Target::Archive {
        project: caps.name("project")?.as_str(),
        format: caps.name("format")?.as_str(),
    })
}

async fn download(
    State(state): State<AppState>,
    token: Token,
    Path(path): Path<String>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let target = parse_target(&path)
        .ok_or_else(|| ApiError::NotFound(format!("Nothing to download at '{path}'")))?;

    let mut query = query_pairs(&uri);
    let take = |query: &mut Vec<(String, String)>, key: &str| {
        let value = query.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone());
        query.retain(|(k, _)| k != key);
        value
    };
    let git_ref = take(&mut query, "ref")
        .filter(|r| !r.is_empty())
        .ok_or_else(|| ApiError::Unprocessable("Missing 'ref' query parameter".to_string()))?;
    let cache = match take(&mut query, "cache") {
        Some(cache) => cache
            .parse::<u32>()
            .map_err(|_| ApiError::Unprocessable(format!("Invalid 'cache': {cache}")))?,
        None => 0,
    };

    let request = ForwardedRequest {
        method: HttpMethod::Get,
        query,
        headers: header_pairs(&headers),
        body: Vec::new(),
    };
    let client = state.client(&token.0);
    let upstream = match target {
        Target::File { project, file } => {
            let download = FileDownload {
                project_path: project.to_string(),
                file_path: file.to_string(),
                git_ref,
                cache: (cache > 0).then_some(cache),
            };
            client.download_file(&download, request).await?
        }
        Target::Archive { project, format } => {
            let download = ArchiveDownload {
                project_path: project.to_string(),
                git_ref,
                format: format.to_string(),
            };
            client.download_archive(&download, request).await?
        }
    };
    Ok(stream_response(upstream))
}
