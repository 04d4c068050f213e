//! Shared state of request handlers.

use std::sync::Arc;
use std::time::Duration;

use crate::auth::GitLabToken;
use crate::cache::Caches;
use crate::category::CategoryRegistry;
use crate::gitlab::GitLabClient;
use crate::http::HttpTransport;
use crate::s3::S3Settings;
use crate::stac::StacSettings;

/// HTTP surface settings.
#[derive(Debug, Clone, Default)]
pub struct ServerSettings {
    /// Path prefix the API is mounted under, e.g. `/stac-proxy`.
    pub prefix: String,
    /// Origins allowed by CORS; `*` allows any.
    pub allowed_origins: Vec<String>,
    pub request_timeout: Option<Duration>,
    /// Cache project licenses across requests.
    pub cache: bool,
}

#[derive(Clone)]
pub struct AppState {
    pub transport: Arc<dyn HttpTransport>,
    /// GitLab base URL, without trailing slash.
    pub gitlab_url: String,
    pub categories: Arc<CategoryRegistry>,
    pub stac: Arc<StacSettings>,
    pub default_token: Option<String>,
    /// Topics hidden from `/api/gitlab/tags`.
    pub ignore_topics: Arc<Vec<String>>,
    pub s3: Option<Arc<S3Settings>>,
    pub caches: Arc<Caches>,
    pub server: Arc<ServerSettings>,
}

impl AppState {
    /// GitLab client acting with `token`.
    ///
    /// Clients are cheap: they share the transport and its connection pool.
    #[must_use]
    pub fn client(&self, token: &GitLabToken) -> GitLabClient {
        GitLabClient::new_with_transport(
            &self.gitlab_url,
            &token.value,
            Arc::clone(&self.categories),
            Arc::clone(&self.transport),
        )
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("gitlab_url", &self.gitlab_url)
            .field("categories", &self.categories.all().len())
            .field("s3", &self.s3.is_some())
            .field("server", &self.server)
            .finish_non_exhaustive()
    }
}
