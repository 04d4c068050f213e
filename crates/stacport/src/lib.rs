//! Stacport - a STAC catalog served on the fly from GitLab projects.
//!
//! Projects tagged with a category topic (for example `sharinghub:dataset`)
//! become STAC items of the matching collection. Nothing is stored: every
//! request translates GitLab metadata with the caller's own token.
//!
//! # Modules
//!
//! - [`provider`] - Provider-neutral project models and the [`provider::ProviderClient`] trait
//! - [`gitlab`] - GitLab implementation over GraphQL and REST
//! - [`stac`] - STAC documents and the search workflow
//! - [`category`] - Topic-driven collections
//! - [`server`] - Axum router exposing the API
//! - [`s3`] - Presigned URLs for the per-project object store
//!
//! # Example
//!
//! ```ignore
//! use stacport::server::{self, AppState};
//!
//! let app = server::router(state);
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8000").await?;
//! axum::serve(listener, app).await?;
//! ```

pub mod auth;
pub mod cache;
pub mod category;
pub mod gitlab;
pub mod http;
pub mod markdown;
pub mod provider;
pub mod s3;
pub mod server;
pub mod spatial;
pub mod stac;

pub use auth::GitLabToken;
pub use category::{Category, CategoryRegistry};
pub use gitlab::GitLabClient;
pub use provider::{ProviderClient, ProviderError};
