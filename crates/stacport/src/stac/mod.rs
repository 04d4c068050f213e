//! STAC API documents generated from provider models.
//!
//! - [`build`] - Catalog, collection, feature collection and item documents
//! - [`assets`] - Asset rules applied to repository files
//! - [`search`] - STAC search parameters and the search workflow
//! - [`media`] - Media types of assets and links

use std::collections::BTreeMap;

use serde::Deserialize;
use thiserror::Error;

use crate::auth::GitLabToken;
use crate::http::{encode_path, url_add_query_params};
use crate::provider::ProviderError;

pub mod assets;
pub mod build;
pub mod media;
pub mod search;

pub const STAC_VERSION: &str = "1.0.0";

pub const CONFORMANCE: [&str; 11] = [
    "https://api.stacspec.org/v1.0.0/core",
    "https://api.stacspec.org/v1.0.0/collections",
    "https://api.stacspec.org/v1.0.0/ogcapi-features",
    "https://api.stacspec.org/v1.0.0/ogcapi-features#sort",
    "https://api.stacspec.org/v1.0.0-rc.1/ogcapi-features#free-text",
    "https://api.stacspec.org/v1.0.0/item-search",
    "https://api.stacspec.org/v1.0.0/item-search#sort",
    "https://api.stacspec.org/v1.0.0-rc.1/item-search#free-text",
    "http://www.opengis.net/spec/ogcapi-features-1/1.0/conf/core",
    "http://www.opengis.net/spec/ogcapi-features-1/1.0/conf/oas30",
    "http://www.opengis.net/spec/ogcapi-features-1/1.0/conf/geojson",
];

/// Root catalog identity.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct RootConfig {
    pub id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub logo: Option<String>,
}

impl Default for RootConfig {
    fn default() -> Self {
        Self {
            id: "gitlab-stac".to_string(),
            title: None,
            description: None,
            logo: None,
        }
    }
}

/// STAC generation settings.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct StacSettings {
    pub root: RootConfig,
    /// Archive format of release source assets, e.g. `zip`.
    pub release_source_format: String,
    /// TTL of cached per-project data, and `max-age` of README images.
    pub cache_timeout_secs: u64,
    /// Default `limit` of searches.
    pub page_size: usize,
    /// STAC extension schemas by property prefix.
    pub extensions: BTreeMap<String, String>,
}

impl Default for StacSettings {
    fn default() -> Self {
        Self {
            root: RootConfig::default(),
            release_source_format: "zip".to_string(),
            cache_timeout_secs: 300,
            page_size: 12,
            extensions: BTreeMap::new(),
        }
    }
}

impl StacSettings {
    /// Release source format without a leading dot, lowercased.
    #[must_use]
    pub fn release_format(&self) -> String {
        self.release_source_format
            .trim_start_matches('.')
            .to_lowercase()
    }
}

/// Errors of the STAC layer.
#[derive(Debug, Error)]
pub enum StacError {
    /// Syntactically valid request that cannot be processed.
    #[error("{0}")]
    Unprocessable(String),

    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl StacError {
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            StacError::Unprocessable(_) => 422,
            StacError::BadRequest(_) => 400,
            StacError::Provider(e) => e.status_code(),
        }
    }
}

/// Everything document builders need besides the models: where the API is
/// served, which token links carry, and the upstream instance.
#[derive(Debug, Clone, Copy)]
pub struct StacContext<'a> {
    /// Public base URL of the API, without trailing slash.
    pub base_url: &'a str,
    pub token: &'a GitLabToken,
    pub gitlab_url: &'a str,
    pub settings: &'a StacSettings,
}

impl StacContext<'_> {
    fn stac_url(&self, path: &str) -> String {
        format!("{}/api/stac{path}", self.base_url)
    }

    fn with_token(&self, url: &str) -> String {
        url_add_query_params(url, &self.token.query)
    }

    #[must_use]
    pub fn root_url(&self) -> String {
        self.with_token(&self.stac_url(""))
    }

    #[must_use]
    pub fn conformance_url(&self) -> String {
        self.with_token(&self.stac_url("/conformance"))
    }

    #[must_use]
    pub fn collections_url(&self) -> String {
        self.with_token(&self.stac_url("/collections"))
    }

    #[must_use]
    pub fn collection_url(&self, collection_id: &str) -> String {
        self.with_token(&self.stac_url(&format!(
            "/collections/{}",
            encode_path(collection_id)
        )))
    }

    /// Items URL without query, for pagination links.
    #[must_use]
    pub fn items_route(&self, collection_id: &str) -> String {
        self.stac_url(&format!("/collections/{}/items", encode_path(collection_id)))
    }

    #[must_use]
    pub fn items_url(&self, collection_id: &str) -> String {
        self.with_token(&self.items_route(collection_id))
    }

    /// Feature URL with `query` merged before the token.
    #[must_use]
    pub fn feature_url(
        &self,
        collection_id: &str,
        feature_id: &str,
        query: &[(String, String)],
    ) -> String {
        let url = self.stac_url(&format!(
            "/collections/{}/items/{}",
            encode_path(collection_id),
            encode_path(feature_id)
        ));
        self.with_token(&url_add_query_params(&url, query))
    }

    /// Search URL without query, for pagination links.
    #[must_use]
    pub fn search_route(&self) -> String {
        self.stac_url("/search")
    }

    #[must_use]
    pub fn search_url(&self) -> String {
        self.with_token(&self.search_route())
    }

    /// Download proxy URL of a repository file.
    #[must_use]
    pub fn download_file_url(
        &self,
        project_path: &str,
        file_path: &str,
        query: &[(String, String)],
    ) -> String {
        let url = format!(
            "{}/api/download/{}/repository/{}",
            self.base_url,
            encode_path(project_path),
            encode_path(file_path)
        );
        url_add_query_params(&url_add_query_params(&url, query), &self.token.rc_query)
    }

    /// Download proxy URL of a repository archive at `git_ref`.
    #[must_use]
    pub fn download_archive_url(&self, project_path: &str, format: &str, git_ref: &str) -> String {
        let url = format!(
            "{}/api/download/{}/archive.{format}",
            self.base_url,
            encode_path(project_path)
        );
        let query = [("ref".to_string(), git_ref.to_string())];
        url_add_query_params(&url_add_query_params(&url, &query), &self.token.rc_query)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn token(value: Option<&str>) -> GitLabToken {
        GitLabToken::resolve(value, None, Some("default")).expect("token")
    }

    pub(crate) fn context<'a>(token: &'a GitLabToken, settings: &'a StacSettings) -> StacContext<'a> {
        StacContext {
            base_url: "https://stac.example.com",
            token,
            gitlab_url: "https://gitlab.example.com",
            settings,
        }
    }

    #[test]
    fn test_urls_carry_token_query() {
        let settings = StacSettings::default();
        let token = token(Some("glpat"));
        let ctx = context(&token, &settings);

        assert_eq!(ctx.root_url(), "https://stac.example.com/api/stac?gitlab_token=glpat");
        assert_eq!(
            ctx.feature_url("dataset", "space/my data", &[]),
            "https://stac.example.com/api/stac/collections/dataset/items/space/my%20data?gitlab_token=glpat"
        );
        assert_eq!(
            ctx.download_archive_url("space/model", "zip", "v1.0"),
            "https://stac.example.com/api/download/space/model/archive.zip?ref=v1.0&gitlab_token=glpat"
        );
    }

    #[test]
    fn test_urls_without_link_token() {
        let settings = StacSettings::default();
        let token = token(None);
        let ctx = context(&token, &settings);
        assert_eq!(ctx.collections_url(), "https://stac.example.com/api/stac/collections");
        assert_eq!(
            ctx.download_file_url(
                "space/model",
                "docs/preview.png",
                &[("ref".to_string(), "main".to_string())]
            ),
            "https://stac.example.com/api/download/space/model/repository/docs/preview.png?ref=main"
        );
    }

    #[test]
    fn test_release_format_normalised() {
        let settings = StacSettings {
            release_source_format: ".TAR.GZ".to_string(),
            ..StacSettings::default()
        };
        assert_eq!(settings.release_format(), "tar.gz");
    }

    #[test]
    fn test_error_status_codes() {
        assert_eq!(StacError::Unprocessable("x".into()).status_code(), 422);
        assert_eq!(StacError::BadRequest("x".into()).status_code(), 400);
        assert_eq!(
            StacError::from(ProviderError::not_found("Not Found")).status_code(),
            404
        );
    }
}
