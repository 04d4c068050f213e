//! Configuration file support for stacport.
//!
//! Configuration is loaded with the following precedence (highest to lowest):
//! 1. Environment variables (prefixed with `STACPORT_`, nested keys joined
//!    with `__`, e.g. `STACPORT_GITLAB__DEFAULT_TOKEN`)
//! 2. File given with `--config`
//! 3. `./stacport.toml`
//! 4. XDG config file (`~/.config/stacport/config.toml`)
//! 5. Built-in defaults
//!
//! A `.env` file in the current directory is loaded into the environment
//! before anything else.
//!
//! Example config file:
//! ```toml
//! [server]
//! port = 8000
//! prefix = "/stac-proxy"
//! allowed_origins = ["https://hub.example.com"]
//!
//! [gitlab]
//! url = "https://gitlab.example.com"
//! ignore_topics = ["internal"]
//!
//! [stac.root]
//! id = "my-hub"
//! title = "My Hub"
//!
//! [[stac.categories]]
//! id = "dataset"
//! title = "Datasets"
//! gitlab_topic = "sharinghub:dataset"
//! features = { store-s3 = "enable" }
//!
//! [stac.projects]
//! release_source_format = "zip"
//! cache_timeout_secs = 300
//!
//! [s3]
//! bucket = "hub-store"
//! endpoint_url = "https://minio.example.com"
//! access_key = "..."
//! secret_key = "..."
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config as ConfigBuilder, ConfigError, Environment, File, FileFormat};
use directories::ProjectDirs;
use serde::Deserialize;
use stacport::category::{Category, CategoryConfigError, CategoryRegistry};
use stacport::s3::S3Settings;
use stacport::server::ServerSettings;
use stacport::stac::{RootConfig, StacSettings};

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub gitlab: GitLabConfig,
    pub stac: StacConfig,
    /// Object store behind `/api/store`; the store is disabled when absent.
    pub s3: Option<S3Settings>,
}

/// HTTP server configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Path prefix the API is mounted under, e.g. behind a reverse proxy.
    pub prefix: String,
    /// Verbose logging when `RUST_LOG` is unset.
    pub debug: bool,
    /// CORS origins; `*` allows any.
    pub allowed_origins: Vec<String>,
    /// Per-request timeout, none when 0.
    pub request_timeout_secs: u64,
    /// Cache project licenses between requests.
    pub cache: bool,
    /// TTL of cached store access decisions.
    pub access_cache_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            prefix: String::new(),
            debug: false,
            allowed_origins: Vec::new(),
            request_timeout_secs: 0,
            cache: true,
            access_cache_timeout_secs: 300,
        }
    }
}

/// GitLab configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GitLabConfig {
    /// Instance URL, e.g. `https://gitlab.example.com`.
    pub url: Option<String>,
    /// Token used when a request carries none.
    pub default_token: Option<String>,
    /// Topics never offered as tags.
    pub ignore_topics: Vec<String>,
    /// Timeout of every upstream call.
    pub http_timeout_secs: u64,
}

impl Default for GitLabConfig {
    fn default() -> Self {
        Self {
            url: None,
            default_token: None,
            ignore_topics: Vec::new(),
            http_timeout_secs: 30,
        }
    }
}

/// STAC generation configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct StacConfig {
    pub root: RootConfig,
    /// Categories in listing and resolution order.
    pub categories: Vec<Category>,
    pub projects: ProjectsConfig,
    pub search: SearchConfig,
    /// Extension schema URLs by property prefix.
    pub extensions: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ProjectsConfig {
    pub release_source_format: String,
    pub cache_timeout_secs: u64,
}

impl Default for ProjectsConfig {
    fn default() -> Self {
        Self {
            release_source_format: "zip".to_string(),
            cache_timeout_secs: 300,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub page_size: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { page_size: 12 }
    }
}

impl Config {
    /// Load configuration using the config crate's layered approach.
    ///
    /// Sources are loaded in order (later sources override earlier):
    /// 1. Built-in defaults
    /// 2. XDG config file
    /// 3. Local config file (./stacport.toml)
    /// 4. Explicit config file, which must exist
    /// 5. Environment variables with STACPORT_ prefix
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        if let Some(xdg_config) = Self::default_config_path()
            && xdg_config.exists()
        {
            builder = builder.add_source(
                File::from(xdg_config)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        let local_config = PathBuf::from("stacport.toml");
        if local_config.exists() {
            builder = builder.add_source(
                File::from(local_config)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        if let Some(path) = explicit {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
        }

        builder
            .add_source(Self::environment())
            .build()?
            .try_deserialize()
    }

    /// `STACPORT_*` variables, e.g. `STACPORT_SERVER__PORT` -> `server.port`.
    fn environment() -> Environment {
        Environment::with_prefix("STACPORT")
            .prefix_separator("_")
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("server.allowed_origins")
            .with_list_parse_key("gitlab.ignore_topics")
            .try_parsing(true)
    }

    /// The default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "stacport").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// GitLab URL, required to serve.
    pub fn gitlab_url(&self) -> Result<&str, ConfigError> {
        self.gitlab
            .url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or_else(|| {
                ConfigError::Message(
                    "gitlab.url is not set (config file or STACPORT_GITLAB__URL)".to_string(),
                )
            })
    }

    pub fn categories(&self) -> Result<CategoryRegistry, CategoryConfigError> {
        CategoryRegistry::new(self.stac.categories.clone())
    }

    pub fn stac_settings(&self) -> StacSettings {
        StacSettings {
            root: self.stac.root.clone(),
            release_source_format: self.stac.projects.release_source_format.clone(),
            cache_timeout_secs: self.stac.projects.cache_timeout_secs,
            page_size: self.stac.search.page_size,
            extensions: self.stac.extensions.clone(),
        }
    }

    pub fn server_settings(&self) -> ServerSettings {
        ServerSettings {
            prefix: self.server.prefix.clone(),
            allowed_origins: self.server.allowed_origins.clone(),
            request_timeout: (self.server.request_timeout_secs > 0)
                .then(|| Duration::from_secs(self.server.request_timeout_secs)),
            cache: self.server.cache,
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.gitlab.http_timeout_secs)
    }

    pub fn project_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.stac.projects.cache_timeout_secs)
    }

    pub fn access_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.server.access_cache_timeout_secs)
    }

    /// Log filter used when `RUST_LOG` is unset.
    pub fn log_filter(&self) -> &'static str {
        if self.server.debug {
            "stacport=debug,stacport_cli=debug"
        } else {
            "stacport=info,stacport_cli=info"
        }
    }
}
