//! Caller token resolution.

use crate::gitlab::proxy::TOKEN_QUERY_PARAM;

/// Header carrying a GitLab token.
pub const TOKEN_HEADER: &str = "X-Gitlab-Token";

/// The GitLab token a request runs with, and how generated links carry it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitLabToken {
    pub value: String,
    /// Query appended to STAC links.
    pub query: Vec<(String, String)>,
    /// Query appended to resource links (downloads, release archives).
    pub rc_query: Vec<(String, String)>,
}

impl GitLabToken {
    /// Resolve the token of a request.
    ///
    /// The query parameter wins over the header, which wins over the
    /// configured default. A query token is propagated to every generated
    /// link, a header token only to resource links so that browsers can
    /// follow them, and the default token to none.
    #[must_use]
    pub fn resolve(
        query_param: Option<&str>,
        header: Option<&str>,
        default_token: Option<&str>,
    ) -> Option<Self> {
        let pair = |value: &str| vec![(TOKEN_QUERY_PARAM.to_string(), value.to_string())];

        if let Some(value) = query_param.filter(|v| !v.is_empty()) {
            return Some(Self {
                value: value.to_string(),
                query: pair(value),
                rc_query: pair(value),
            });
        }
        if let Some(value) = header.filter(|v| !v.is_empty()) {
            return Some(Self {
                value: value.to_string(),
                query: Vec::new(),
                rc_query: pair(value),
            });
        }
        default_token.filter(|v| !v.is_empty()).map(|value| Self {
            value: value.to_string(),
            query: Vec::new(),
            rc_query: Vec::new(),
        })
    }
}
