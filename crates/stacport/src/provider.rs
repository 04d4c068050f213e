//! Provider-agnostic project model and client trait.
//!
//! The STAC layer only talks to a [`ProviderClient`]; the GitLab client in
//! [`crate::gitlab`] is the one implementation.
//!
//! # Example
//!
//! ```ignore
//! use stacport::provider::{ProviderClient, SearchParams};
//!
//! async fn first_page<C: ProviderClient>(client: &C) -> Result<(), ProviderError> {
//!     let mut params = SearchParams::new(12);
//!     params.topics.push("sharinghub:dataset".to_string());
//!     let (projects, pagination) = client.search_previews(&params).await?;
//!     for project in projects {
//!         println!("{}", project.path());
//!     }
//!     println!("next page: {:?}", pagination.end);
//!     Ok(())
//! }
//! ```

mod errors;
mod types;

pub use errors::{ProviderError, Result, short_error_message};
pub use types::{
    AccessLevel, ArchiveDownload, CursorPagination, DatetimeRange, FLAG_STARRED, FileDownload,
    ForwardedRequest, License, Project, ProjectPreview, ProjectReference, ProviderClient, Release,
    SearchParams, Sort, SortDirection, Topic,
};
