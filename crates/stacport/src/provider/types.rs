use async_trait::async_trait;
use chrono::{DateTime, Utc};
use geo::Geometry;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::category::Category;
use crate::http::{HttpHeaders, HttpMethod, StreamingResponse};

use super::errors::Result;

/// Minimal identity of a project, returned by reference-mode search.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectReference {
    pub id: u64,
    pub name: String,
    /// Full slash-separated path, unique per instance.
    pub path: String,
    pub topics: Vec<String>,
    pub category: Category,
}

/// A project with the fields needed to render a search result card.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectPreview {
    pub reference: ProjectReference,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_update: DateTime<Utc>,
    pub star_count: u64,
    pub default_branch: Option<String>,
    /// README body without its front matter.
    pub readme: String,
    /// README front matter, plus defaults such as `preview`.
    pub metadata: Map<String, Value>,
    pub extent: Option<Geometry<f64>>,
}

/// A fully detailed project.
#[derive(Debug, Clone, PartialEq)]
pub struct Project {
    pub preview: ProjectPreview,
    pub full_name: String,
    pub url: String,
    pub bug_tracker_url: String,
    pub license: Option<License>,
    pub last_commit: Option<String>,
    pub files: Option<Vec<String>>,
    pub latest_release: Option<Release>,
    pub access_level: AccessLevel,
}

impl ProjectPreview {
    #[must_use]
    pub fn path(&self) -> &str {
        &self.reference.path
    }
}

impl Project {
    #[must_use]
    pub fn reference(&self) -> &ProjectReference {
        &self.preview.reference
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.preview.reference.path
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct License {
    /// SPDX identifier.
    pub id: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    pub name: String,
    pub tag: String,
    pub description: Option<String>,
    pub commit: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Topic {
    pub name: String,
    pub title: String,
    pub total_projects_count: u64,
}

/// Caller's permissions on a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(into = "u8")]
pub enum AccessLevel {
    NoAccess = 0,
    /// Read-only.
    Visitor = 1,
    /// Modification allowed.
    Contributor = 2,
    /// Management permissions.
    Administrator = 3,
}

impl From<AccessLevel> for u8 {
    fn from(level: AccessLevel) -> Self {
        level as u8
    }
}

/// Pagination returned by every search call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CursorPagination {
    /// Total matches; `None` means unknown.
    pub total: Option<u64>,
    /// Present iff a previous page exists.
    pub start: Option<String>,
    /// Present iff a next page exists.
    pub end: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }

    #[must_use]
    pub fn parse(direction: &str) -> Option<Self> {
        match direction.trim().to_ascii_lowercase().as_str() {
            "asc" => Some(SortDirection::Asc),
            "desc" => Some(SortDirection::Desc),
            _ => None,
        }
    }
}

/// Requested ordering. The field name is free-form and normalized by the
/// provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub field: String,
    pub direction: SortDirection,
}

impl Sort {
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }
}

/// Inclusive datetime interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatetimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Flag restricting a search to the caller's starred projects.
pub const FLAG_STARRED: &str = "starred";

/// Parameters of a project search.
///
/// At most one of `prev` and `next` should be set; `prev` wins when both are.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchParams {
    /// Project paths to fetch directly, bypassing every other filter but
    /// topics.
    pub ids: Vec<String>,
    pub query: Option<String>,
    pub topics: Vec<String>,
    pub flags: Vec<String>,
    pub extent: Option<Geometry<f64>>,
    pub datetime_range: Option<DatetimeRange>,
    pub limit: usize,
    pub sort: Option<Sort>,
    pub prev: Option<String>,
    pub next: Option<String>,
}

impl SearchParams {
    /// A forward search from the beginning with no filter.
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            ids: Vec::new(),
            query: None,
            topics: Vec::new(),
            flags: Vec::new(),
            extent: None,
            datetime_range: None,
            limit,
            sort: None,
            prev: None,
            next: None,
        }
    }

    #[must_use]
    pub fn has_flag(&self, flag: &str) -> bool {
        self.flags.iter().any(|f| f == flag)
    }
}

/// The parts of an inbound request that are forwarded upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardedRequest {
    pub method: HttpMethod,
    pub query: Vec<(String, String)>,
    pub headers: HttpHeaders,
    pub body: Vec<u8>,
}

impl ForwardedRequest {
    /// A bodiless GET carrying nothing from the caller.
    #[must_use]
    pub fn get() -> Self {
        Self {
            method: HttpMethod::Get,
            query: Vec::new(),
            headers: Vec::new(),
            body: Vec::new(),
        }
    }
}

/// Repository file download parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDownload {
    pub project_path: String,
    pub file_path: String,
    pub git_ref: String,
    /// `Cache-Control` max-age in seconds, if any.
    pub cache: Option<u32>,
}

/// Repository archive download parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveDownload {
    pub project_path: String,
    pub git_ref: String,
    pub format: String,
}

/// Trait for project hosting providers.
///
/// All search operations share the same semantics and differ only in the
/// level of detail returned.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Username of the token owner.
    async fn get_user(&self) -> Result<String>;

    /// Every topic of the instance.
    async fn get_topics(&self) -> Result<Vec<Topic>>;

    /// Full path of a project given its numeric id.
    async fn get_project_path(&self, id: u64) -> Result<String>;

    /// One project by full path.
    async fn get_project(&self, path: &str) -> Result<Project>;

    /// License of a project, when it has a detected one.
    async fn get_license(&self, project: &ProjectReference) -> Result<Option<License>>;

    async fn search_references(
        &self,
        params: &SearchParams,
    ) -> Result<(Vec<ProjectReference>, CursorPagination)>;

    async fn search_previews(
        &self,
        params: &SearchParams,
    ) -> Result<(Vec<ProjectPreview>, CursorPagination)>;

    async fn search(&self, params: &SearchParams) -> Result<(Vec<Project>, CursorPagination)>;

    /// Stream a repository file.
    async fn download_file(
        &self,
        download: &FileDownload,
        request: ForwardedRequest,
    ) -> Result<StreamingResponse>;

    /// Stream a repository archive.
    async fn download_archive(
        &self,
        download: &ArchiveDownload,
        request: ForwardedRequest,
    ) -> Result<StreamingResponse>;

    /// Forward an arbitrary REST call and stream its response.
    async fn rest_proxy(
        &self,
        endpoint: &str,
        request: ForwardedRequest,
    ) -> Result<StreamingResponse>;
}
