//! GitLab provider.
//!
//! # Module Structure
//!
//! - [`error`] - Error types for GitLab API operations
//! - [`types`] - Wire shapes of GraphQL nodes and REST payloads
//! - [`graphql`] - Query builders and response parsing
//! - [`search`] - Cursor-window search over paginated project connections
//! - [`filter`] - Client-side predicates applied to fetched pages
//! - [`convert`] - Adaptation of wire nodes to provider models
//! - [`proxy`] - Header and query rewriting for streamed REST calls
//! - [`client`] - The [`GitLabClient`] tying the above together
//!
//! ```ignore
//! use stacport::gitlab::GitLabClient;
//! use stacport::provider::{ProviderClient, SearchParams};
//!
//! let client = GitLabClient::new(&url, &token, categories, timeout)?;
//! let mut params = SearchParams::new(10);
//! params.topics = vec!["sharinghub:dataset".to_string()];
//! let (projects, pagination) = client.search_previews(&params).await?;
//! ```

mod client;
mod convert;
mod error;
mod filter;
pub mod graphql;
pub mod proxy;
pub mod search;
mod types;

pub use client::{GitLabClient, clean_url};
pub use convert::{ParsedReadme, ReadmeMemo, access_level, spdx_license_id};
pub use error::GitLabError;
pub use types::{PageInfo, ProjectNode};
