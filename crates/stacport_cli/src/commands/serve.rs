//! The `serve` command.

use std::sync::Arc;
use std::time::Duration;

use stacport::cache::Caches;
use stacport::gitlab::clean_url;
use stacport::http::reqwest_transport::ReqwestTransport;
use stacport::server::{self, AppState};

use crate::config::Config;
use crate::shutdown;

/// Build the application state from configuration.
///
/// Fails fast on a missing or invalid GitLab URL and on inconsistent
/// categories.
pub(crate) fn app_state(config: &Config) -> Result<AppState, Box<dyn std::error::Error>> {
    let gitlab_url = clean_url(config.gitlab_url()?)?;
    let categories = config.categories()?;
    if categories.all().is_empty() {
        tracing::warn!("no category configured, every search will be empty");
    }

    let transport = ReqwestTransport::with_timeout(config.http_timeout())?;
    Ok(AppState {
        transport: Arc::new(transport),
        gitlab_url,
        categories: Arc::new(categories),
        stac: Arc::new(config.stac_settings()),
        default_token: config
            .gitlab
            .default_token
            .clone()
            .filter(|token| !token.is_empty()),
        ignore_topics: Arc::new(config.gitlab.ignore_topics.clone()),
        s3: config.s3.clone().map(Arc::new),
        caches: Arc::new(Caches::new(
            config.project_cache_ttl(),
            config.access_cache_ttl(),
        )),
        server: Arc::new(config.server_settings()),
    })
}

/// Periodically drop expired cache entries.
fn spawn_cache_eviction(caches: Arc<Caches>, every: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every.max(Duration::from_secs(1)));
        loop {
            interval.tick().await;
            let removed = caches.licenses.delete_stale()
                + caches.users.delete_stale()
                + caches.project_paths.delete_stale()
                + caches.access.delete_stale();
            if removed > 0 {
                tracing::debug!(removed, "evicted stale cache entries");
            }
        }
    });
}

/// Serve the API until a shutdown signal is received.
pub(crate) async fn handle_serve(
    config: &Config,
    host: Option<String>,
    port: Option<u16>,
) -> Result<(), Box<dyn std::error::Error>> {
    let state = app_state(config)?;
    spawn_cache_eviction(
        Arc::clone(&state.caches),
        config.project_cache_ttl().min(config.access_cache_ttl()),
    );

    let gitlab_url = state.gitlab_url.clone();
    let collections = state.categories.all().len();
    let app = server::router(state);

    let host = host.unwrap_or_else(|| config.server.host.clone());
    let port = port.unwrap_or(config.server.port);
    let address = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&address).await?;

    tracing::info!(
        address = %address,
        gitlab = %gitlab_url,
        collections,
        prefix = %config.server.prefix,
        "listening"
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown::shutdown_signal())
        .await?;
    tracing::info!("server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use config::{Config as ConfigBuilder, FileFormat};

    use super::*;

    fn parse(toml_content: &str) -> Config {
        ConfigBuilder::builder()
            .add_source(config::File::from_str(toml_content, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_app_state_requires_gitlab_url() {
        let err = app_state(&Config::default()).unwrap_err();
        assert!(err.to_string().contains("gitlab.url"));
    }

    #[test]
    fn test_app_state_rejects_invalid_url() {
        let config = parse("[gitlab]\nurl = \"gitlab.example.com\"");
        assert!(app_state(&config).is_err());
    }

    #[test]
    fn test_app_state_from_config() {
        let config = parse(
            r#"
            [server]
            prefix = "/proxy"

            [gitlab]
            url = "https://gitlab.example.com/"
            default_token = ""
            ignore_topics = ["internal"]

            [[stac.categories]]
            id = "dataset"
            title = "Datasets"
            gitlab_topic = "sharinghub:dataset"
            "#,
        );
        let state = app_state(&config).unwrap();
        assert_eq!(state.gitlab_url, "https://gitlab.example.com");
        assert!(state.default_token.is_none());
        assert_eq!(state.ignore_topics.as_slice(), ["internal".to_string()]);
        assert_eq!(state.categories.all().len(), 1);
        assert_eq!(state.server.prefix, "/proxy");
        assert!(state.s3.is_none());
    }
}
