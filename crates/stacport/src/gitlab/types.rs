//! GitLab wire types.
//!
//! GraphQL nodes are shared by the three detail levels, so every field that
//! is not part of the reference fragment is optional.

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// A `Project` node selected by one of the `projectFields` fragments.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectNode {
    /// Global id, e.g. `gid://gitlab/Project/42`.
    pub id: String,
    pub name: String,
    pub full_path: String,
    #[serde(default)]
    pub topics: Vec<String>,
    pub description: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub last_activity_at: Option<DateTime<Utc>>,
    pub star_count: Option<u64>,
    pub repository: Option<RepositoryNode>,
    pub name_with_namespace: Option<String>,
    pub web_url: Option<String>,
    pub max_access_level: Option<AccessLevelNode>,
    pub releases: Option<Nodes<ReleaseNode>>,
}

impl ProjectNode {
    /// Numeric id parsed from the global id.
    #[must_use]
    pub fn numeric_id(&self) -> Option<u64> {
        self.id.rsplit('/').next()?.parse().ok()
    }

    /// Raw README text, if the repository has one.
    #[must_use]
    pub fn raw_readme(&self) -> Option<&str> {
        let readme = self.repository.as_ref()?.readme.as_ref()?;
        readme.nodes.first()?.raw_blob.as_deref()
    }

    /// Path of the conventional preview image, if present.
    #[must_use]
    pub fn preview_path(&self) -> Option<&str> {
        let preview = self.repository.as_ref()?.preview.as_ref()?;
        Some(preview.nodes.first()?.path.as_str())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryNode {
    pub root_ref: Option<String>,
    pub readme: Option<Nodes<BlobNode>>,
    pub preview: Option<Nodes<PathNode>>,
    pub tree: Option<TreeNode>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Nodes<T> {
    #[serde(default = "Vec::new")]
    pub nodes: Vec<T>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobNode {
    pub raw_blob: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PathNode {
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeNode {
    pub last_commit: Option<CommitNode>,
    pub blobs: Option<Nodes<PathNode>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitNode {
    pub short_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessLevelNode {
    pub integer_value: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseNode {
    pub name: Option<String>,
    pub tag_name: String,
    pub description: Option<String>,
    pub commit: Option<ShaNode>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShaNode {
    pub sha: String,
}

/// `pageInfo` of a GraphQL connection.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub has_previous_page: bool,
    pub has_next_page: bool,
    pub start_cursor: Option<String>,
    pub end_cursor: Option<String>,
}

/// Project as returned by `GET /projects/:id?license=true`.
#[derive(Debug, Clone, Deserialize)]
pub struct RestProject {
    pub id: u64,
    pub path_with_namespace: String,
    pub license_url: Option<String>,
    pub license: Option<RestLicense>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RestLicense {
    pub key: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Topic as returned by `GET /topics`.
#[derive(Debug, Clone, Deserialize)]
pub struct RestTopic {
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub total_projects_count: u64,
}
