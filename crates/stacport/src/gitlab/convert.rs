//! Model conversion from GitLab wire types to provider types.

use std::collections::HashMap;
use std::sync::Arc;

use geo::Geometry;
use serde_json::{Map, Value};

use super::types::{ProjectNode, RestProject};
use crate::category::CategoryRegistry;
use crate::markdown;
use crate::provider::{
    AccessLevel, License, Project, ProjectPreview, ProjectReference, ProviderError, Release,
};
use crate::spatial;

const GUEST_ACCESS_LEVEL: i64 = 10;
const DEVELOPER_ACCESS_LEVEL: i64 = 30;
const MAINTAINER_ACCESS_LEVEL: i64 = 40;

/// GitLab license keys that differ from their SPDX identifier.
const LICENSES_SPDX: [(&str, &str); 13] = [
    ("agpl-3.0", "AGPL-3.0"),
    ("apache-2.0", "Apache-2.0"),
    ("bsd-2-clause", "BSD-2-Clause"),
    ("bsd-3-clause", "BSD-3-Clause"),
    ("bsl-1.0", "BSL-1.0"),
    ("cc0-1.0", "CC0-1.0"),
    ("epl-2.0", "EPL-2.0"),
    ("gpl-2.0", "GPL-2.0"),
    ("gpl-3.0", "GPL-3.0"),
    ("lgpl-2.1", "LGPL-2.1"),
    ("mit", "MIT"),
    ("mpl-2.0", "MPL-2.0"),
    ("unlicense", "Unlicense"),
];

/// README of a project split into body and front matter, with the spatial
/// extent it declares.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedReadme {
    pub body: String,
    pub metadata: Map<String, Value>,
    pub extent: Option<Geometry<f64>>,
}

impl ParsedReadme {
    fn from_node(node: &ProjectNode) -> Self {
        let (body, mut metadata) = node.raw_readme().map(markdown::parse).unwrap_or_default();
        if let Some(preview) = node.preview_path() {
            metadata
                .entry("preview")
                .or_insert_with(|| Value::String(preview.to_string()));
        }
        let extent = spatial_extent(&node.full_path, &metadata);
        Self {
            body,
            metadata,
            extent,
        }
    }
}

/// Per-request cache of parsed READMEs, keyed by project global id.
///
/// Filtering and conversion both need the README; the memo makes sure it is
/// parsed once per project within one search.
#[derive(Debug, Default)]
pub struct ReadmeMemo {
    entries: HashMap<String, Arc<ParsedReadme>>,
}

impl ReadmeMemo {
    pub fn get(&mut self, node: &ProjectNode) -> Arc<ParsedReadme> {
        self.entries
            .entry(node.id.clone())
            .or_insert_with(|| Arc::new(ParsedReadme::from_node(node)))
            .clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Extent declared under `extent.spatial`, as a bbox list or a WKT string.
fn spatial_extent(path: &str, metadata: &Map<String, Value>) -> Option<Geometry<f64>> {
    let source = metadata.get("extent")?.get("spatial")?;
    let parsed = match source {
        Value::Array(bbox) if bbox.len() == 4 => spatial::json_bbox2geom(bbox),
        Value::String(wkt) => spatial::wkt2geom(wkt),
        _ => return None,
    };
    match parsed {
        Ok(geometry) => Some(geometry),
        Err(e) => {
            tracing::debug!(project = %path, error = %e, "ignoring invalid spatial extent");
            None
        }
    }
}

/// Map GitLab's integer access level to ours.
#[must_use]
pub fn access_level(value: i64) -> AccessLevel {
    if value >= MAINTAINER_ACCESS_LEVEL {
        AccessLevel::Administrator
    } else if value >= DEVELOPER_ACCESS_LEVEL {
        AccessLevel::Contributor
    } else if value >= GUEST_ACCESS_LEVEL {
        AccessLevel::Visitor
    } else {
        AccessLevel::NoAccess
    }
}

/// SPDX identifier for a GitLab license key.
#[must_use]
pub fn spdx_license_id(key: &str) -> String {
    LICENSES_SPDX
        .iter()
        .find(|(gitlab, _)| *gitlab == key)
        .map_or_else(|| key.to_uppercase(), |(_, spdx)| (*spdx).to_string())
}

/// License of a REST project, when both the key and the URL are known.
#[must_use]
pub fn license_from_rest(project: &RestProject) -> Option<License> {
    let license = project.license.as_ref()?;
    let url = project.license_url.as_ref()?;
    Some(License {
        id: spdx_license_id(&license.key),
        url: url.clone(),
    })
}

pub fn adapt_reference(
    node: &ProjectNode,
    categories: &CategoryRegistry,
) -> Result<ProjectReference, ProviderError> {
    let id = node.numeric_id().ok_or_else(|| {
        ProviderError::unexpected_shape(format!("invalid project id: {}", node.id))
    })?;
    let category = categories.category_from_topics(&node.topics)?;
    Ok(ProjectReference {
        id,
        name: node.name.clone(),
        path: node.full_path.clone(),
        topics: node.topics.clone(),
        category: category.clone(),
    })
}

fn missing(node: &ProjectNode, field: &str) -> ProviderError {
    ProviderError::unexpected_shape(format!("project {} has no {field}", node.full_path))
}

pub fn adapt_preview(
    node: &ProjectNode,
    categories: &CategoryRegistry,
    memo: &mut ReadmeMemo,
) -> Result<ProjectPreview, ProviderError> {
    let reference = adapt_reference(node, categories)?;
    let readme = memo.get(node);
    Ok(ProjectPreview {
        reference,
        description: node.description.clone().filter(|d| !d.is_empty()),
        created_at: node.created_at.ok_or_else(|| missing(node, "createdAt"))?,
        last_update: node
            .last_activity_at
            .ok_or_else(|| missing(node, "lastActivityAt"))?,
        star_count: node.star_count.unwrap_or_default(),
        default_branch: node.repository.as_ref().and_then(|r| r.root_ref.clone()),
        readme: readme.body.clone(),
        metadata: readme.metadata.clone(),
        extent: readme.extent.clone(),
    })
}

pub fn adapt_project(
    node: &ProjectNode,
    categories: &CategoryRegistry,
    memo: &mut ReadmeMemo,
) -> Result<Project, ProviderError> {
    let preview = adapt_preview(node, categories, memo)?;
    let url = node.web_url.clone().ok_or_else(|| missing(node, "webUrl"))?;

    let tree = node.repository.as_ref().and_then(|r| r.tree.as_ref());
    let (last_commit, files) = match tree {
        Some(tree) => (
            tree.last_commit.as_ref().and_then(|c| c.short_id.clone()),
            Some(
                tree.blobs
                    .as_ref()
                    .map(|blobs| blobs.nodes.iter().map(|n| n.path.clone()).collect())
                    .unwrap_or_default(),
            ),
        ),
        None => (None, None),
    };

    let latest_release = node
        .releases
        .as_ref()
        .and_then(|releases| releases.nodes.first())
        .map(|release| Release {
            name: release.name.clone().unwrap_or_else(|| release.tag_name.clone()),
            tag: release.tag_name.clone(),
            description: release.description.clone(),
            commit: release
                .commit
                .as_ref()
                .map(|c| c.sha.clone())
                .unwrap_or_default(),
        });

    Ok(Project {
        full_name: node
            .name_with_namespace
            .clone()
            .unwrap_or_else(|| node.name.clone()),
        bug_tracker_url: format!("{url}/issues"),
        url,
        license: None,
        last_commit,
        files,
        latest_release,
        access_level: access_level(
            node.max_access_level
                .as_ref()
                .map_or(0, |level| level.integer_value),
        ),
        preview,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::tests::registry;
    use serde_json::json;

    fn mock_node() -> ProjectNode {
        serde_json::from_value(json!({
            "id": "gid://gitlab/Project/42",
            "name": "Flood model",
            "nameWithNamespace": "Space / Flood model",
            "fullPath": "space/flood-model",
            "description": "",
            "webUrl": "https://gitlab.example.com/space/flood-model",
            "createdAt": "2024-01-01T00:00:00Z",
            "lastActivityAt": "2024-03-01T00:00:00Z",
            "starCount": 4,
            "topics": ["sharinghub:aimodel", "flood"],
            "maxAccessLevel": {"integerValue": 30},
            "repository": {
                "rootRef": "main",
                "readme": {"nodes": [{"rawBlob": "---\nextent:\n  spatial: POINT(1 2)\n---\n# Flood model\nBody"}]},
                "preview": {"nodes": [{"path": "preview.png"}]},
                "tree": {
                    "lastCommit": {"shortId": "abc123"},
                    "blobs": {"nodes": [{"path": "README.md"}, {"path": "model.onnx"}]}
                }
            },
            "releases": {"nodes": [{"name": "First", "tagName": "v1", "description": null, "commit": {"sha": "deadbeef"}}]}
        }))
        .expect("valid node")
    }

    #[test]
    fn test_access_level_thresholds() {
        assert_eq!(access_level(50), AccessLevel::Administrator);
        assert_eq!(access_level(40), AccessLevel::Administrator);
        assert_eq!(access_level(30), AccessLevel::Contributor);
        assert_eq!(access_level(20), AccessLevel::Visitor);
        assert_eq!(access_level(10), AccessLevel::Visitor);
        assert_eq!(access_level(5), AccessLevel::NoAccess);
    }

    #[test]
    fn test_spdx_license_id() {
        assert_eq!(spdx_license_id("apache-2.0"), "Apache-2.0");
        assert_eq!(spdx_license_id("mit"), "MIT");
        assert_eq!(spdx_license_id("isc"), "ISC");
    }

    #[test]
    fn test_license_from_rest_requires_key_and_url() {
        let mut project: RestProject = serde_json::from_value(json!({
            "id": 42,
            "path_with_namespace": "space/flood-model",
            "license_url": "https://gitlab.example.com/space/flood-model/-/blob/main/LICENSE",
            "license": {"key": "bsd-3-clause", "name": "BSD 3-Clause"}
        }))
        .expect("rest project");

        let license = license_from_rest(&project).expect("license");
        assert_eq!(license.id, "BSD-3-Clause");

        project.license_url = None;
        assert!(license_from_rest(&project).is_none());
    }

    #[test]
    fn test_adapt_project_full() {
        let registry = registry();
        let mut memo = ReadmeMemo::default();
        let project = adapt_project(&mock_node(), &registry, &mut memo).expect("project");

        assert_eq!(project.reference().id, 42);
        assert_eq!(project.reference().category.id, "ai-model");
        assert_eq!(project.full_name, "Space / Flood model");
        assert_eq!(
            project.bug_tracker_url,
            "https://gitlab.example.com/space/flood-model/issues"
        );
        assert_eq!(project.access_level, AccessLevel::Contributor);
        assert_eq!(project.last_commit.as_deref(), Some("abc123"));
        assert_eq!(
            project.files,
            Some(vec!["README.md".to_string(), "model.onnx".to_string()])
        );
        let release = project.latest_release.expect("release");
        assert_eq!(release.tag, "v1");
        assert_eq!(release.commit, "deadbeef");

        let preview = &project.preview;
        assert!(preview.description.is_none());
        assert_eq!(preview.readme, "# Flood model\nBody");
        assert_eq!(preview.metadata["preview"], "preview.png");
        assert_eq!(preview.default_branch.as_deref(), Some("main"));
        assert!(preview.extent.is_some());
    }

    #[test]
    fn test_front_matter_preview_wins_over_repository_file() {
        let mut node = mock_node();
        if let Some(repo) = node.repository.as_mut()
            && let Some(readme) = repo.readme.as_mut()
        {
            readme.nodes[0].raw_blob = Some("---\npreview: docs/card.jpg\n---\ntext".to_string());
        }
        let parsed = ParsedReadme::from_node(&node);
        assert_eq!(parsed.metadata["preview"], "docs/card.jpg");
        assert!(parsed.extent.is_none());
    }

    #[test]
    fn test_bbox_extent() {
        let mut metadata = Map::new();
        metadata.insert("extent".to_string(), json!({"spatial": [0, 0, 10, 10]}));
        let extent = spatial_extent("p", &metadata).expect("bbox extent");
        assert_eq!(spatial::bounds(&extent), Some([0.0, 0.0, 10.0, 10.0]));

        metadata.insert("extent".to_string(), json!({"spatial": [0, 0, 10]}));
        assert!(spatial_extent("p", &metadata).is_none());
    }

    #[test]
    fn test_memo_parses_once_per_project() {
        let node = mock_node();
        let mut memo = ReadmeMemo::default();
        let first = memo.get(&node);
        let second = memo.get(&node);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(memo.len(), 1);
    }

    #[test]
    fn test_adapt_reference_requires_category() {
        let mut node = mock_node();
        node.topics = vec!["flood".to_string()];
        let err = adapt_reference(&node, &registry()).expect_err("no category");
        assert!(matches!(err, ProviderError::CategoryResolution { .. }));
    }

    #[test]
    fn test_adapt_preview_requires_dates() {
        let mut node = mock_node();
        node.created_at = None;
        let err = adapt_preview(&node, &registry(), &mut ReadmeMemo::default())
            .expect_err("missing createdAt");
        assert_eq!(err.status_code(), 422);
    }
}
