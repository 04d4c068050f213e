//! Request and response rewriting for proxied REST calls.

use crate::http::{HttpHeaders, header_get, header_remove, header_set};

/// Query parameter carrying the caller's token; never sent upstream.
pub const TOKEN_QUERY_PARAM: &str = "gitlab_token";

/// Inbound headers never forwarded upstream. `x-*` headers are dropped too.
const DROPPED_REQUEST_HEADERS: [&str; 5] = [
    "host",
    "cookie",
    "authorization",
    "content-length",
    // Bodies are relayed as-is, so upstream must not compress them.
    "accept-encoding",
];

/// Response headers that describe the upstream connection rather than the
/// payload.
const HOP_BY_HOP_HEADERS: [&str; 9] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "content-encoding",
];

/// Inbound headers safe to forward.
#[must_use]
pub fn forward_headers(headers: &HttpHeaders) -> HttpHeaders {
    headers
        .iter()
        .filter(|(name, _)| {
            let name = name.to_ascii_lowercase();
            !name.starts_with("x-") && !DROPPED_REQUEST_HEADERS.contains(&name.as_str())
        })
        .cloned()
        .collect()
}

/// Inbound query parameters safe to forward.
#[must_use]
pub fn forward_query(query: &[(String, String)]) -> Vec<(String, String)> {
    query
        .iter()
        .filter(|(key, _)| key != TOKEN_QUERY_PARAM)
        .cloned()
        .collect()
}

/// `Content-Disposition` naming the file `filename`.
///
/// Existing `filename=` and `filename*=UTF-8''` parts are rewritten in place;
/// when the header names no file at all it is replaced by an attachment.
#[must_use]
pub fn rewrite_content_disposition(existing: Option<&str>, filename: &str) -> String {
    let default = format!("attachment; filename=\"{filename}\"; filename*=UTF-8''{filename}");
    let Some(existing) = existing.filter(|v| !v.trim().is_empty()) else {
        return default;
    };

    let mut filename_set = false;
    let parts: Vec<String> = existing
        .split(';')
        .map(|part| {
            let trimmed = part.trim();
            if trimmed.starts_with("filename*=UTF-8''") {
                filename_set = true;
                format!("filename*=UTF-8''{filename}")
            } else if trimmed.starts_with("filename=") {
                filename_set = true;
                format!("filename=\"{filename}\"")
            } else {
                trimmed.to_string()
            }
        })
        .collect();

    if filename_set {
        parts.join("; ")
    } else {
        default
    }
}

/// Headers of a proxied response as sent to the caller.
#[must_use]
pub fn response_headers(
    mut headers: HttpHeaders,
    filename: Option<&str>,
    cache: Option<u32>,
) -> HttpHeaders {
    for name in HOP_BY_HOP_HEADERS {
        header_remove(&mut headers, name);
    }
    if let Some(filename) = filename {
        let disposition =
            rewrite_content_disposition(header_get(&headers, "content-disposition"), filename);
        header_set(&mut headers, "Content-Disposition", disposition);

        if let Some(max_age) = cache.filter(|c| *c > 0) {
            header_set(&mut headers, "Cache-Control", format!("private, max-age={max_age}"));
        }
    }
    headers
}

/// URL of the `rel="next"` entry of a `Link` header.
///
/// GitLab keyset pagination answers with
/// `<https://gitlab.example.com/api/v4/topics?...&id_after=42>; rel="next"`.
#[must_use]
pub fn next_link(link_header: &str) -> Option<String> {
    link_header.split(',').find_map(|part| {
        let mut url = None;
        let mut rel = None;
        for segment in part.split(';') {
            let segment = segment.trim();
            if segment.starts_with('<') && segment.ends_with('>') {
                url = Some(&segment[1..segment.len() - 1]);
            } else if let Some(value) = segment.strip_prefix("rel=") {
                rel = Some(value.trim_matches('"'));
            }
        }
        match (url, rel) {
            (Some(url), Some("next")) => Some(url.to_string()),
            _ => None,
        }
    })
}
