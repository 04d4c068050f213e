//! Category registry.
//!
//! A category groups the projects tagged with one discriminating GitLab
//! topic and is exposed as a STAC collection. Categories are configured in a
//! fixed order; that order drives both the collection listing and topic
//! resolution.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::provider::ProviderError;

/// Toggle value for a category feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureVal {
    Enable,
    Disable,
}

impl FeatureVal {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            FeatureVal::Enable => "enable",
            FeatureVal::Disable => "disable",
        }
    }
}

/// How a file of a project becomes a STAC asset.
///
/// Rules come from category configuration or from README front matter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct AssetRule {
    /// Glob matched against repository paths.
    pub glob: Option<String>,
    /// Alias of `glob`, or a single explicit path.
    pub path: Option<String>,
    /// Asset key; `{path}` is substituted.
    pub key: Option<String>,
    /// Explicit href when the rule does not match files.
    pub href: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub roles: Option<Vec<String>>,
    /// Raw media type.
    #[serde(rename = "type")]
    pub media_type: Option<String>,
    /// Short media type alias, e.g. `geotiff`.
    pub type_as: Option<String>,
}

/// Either a bare glob or a full rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AssetRuleDef {
    Glob(String),
    Rule(AssetRule),
}

impl AssetRuleDef {
    #[must_use]
    pub fn into_rule(self) -> AssetRule {
        match self {
            AssetRuleDef::Glob(glob) => AssetRule {
                glob: Some(glob),
                ..AssetRule::default()
            },
            AssetRuleDef::Rule(rule) => rule,
        }
    }
}

/// A configured category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub gitlab_topic: String,
    #[serde(default)]
    pub features: BTreeMap<String, FeatureVal>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub logo: Option<String>,
    #[serde(default)]
    pub assets: Vec<AssetRuleDef>,
}

impl Category {
    /// Whether `feature` is explicitly enabled for this category.
    #[must_use]
    pub fn is_enabled(&self, feature: &str) -> bool {
        self.features.get(feature) == Some(&FeatureVal::Enable)
    }
}

/// Invalid category configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CategoryConfigError {
    #[error("duplicate category id: {0}")]
    DuplicateId(String),

    #[error("gitlab topic '{topic}' is used by both '{first}' and '{second}'")]
    DuplicateTopic {
        topic: String,
        first: String,
        second: String,
    },

    #[error("category '{0}' has an empty gitlab topic")]
    EmptyTopic(String),
}

/// Ordered, validated set of categories.
#[derive(Debug, Clone, Default)]
pub struct CategoryRegistry {
    categories: Vec<Category>,
}

impl CategoryRegistry {
    /// Build a registry, rejecting duplicate ids and shared topics.
    pub fn new(categories: Vec<Category>) -> Result<Self, CategoryConfigError> {
        let mut ids = HashSet::new();
        for (i, category) in categories.iter().enumerate() {
            if !ids.insert(category.id.as_str()) {
                return Err(CategoryConfigError::DuplicateId(category.id.clone()));
            }
            if category.gitlab_topic.trim().is_empty() {
                return Err(CategoryConfigError::EmptyTopic(category.id.clone()));
            }
            if let Some(other) = categories[..i]
                .iter()
                .find(|c| c.gitlab_topic == category.gitlab_topic)
            {
                return Err(CategoryConfigError::DuplicateTopic {
                    topic: category.gitlab_topic.clone(),
                    first: other.id.clone(),
                    second: category.id.clone(),
                });
            }
        }
        Ok(Self { categories })
    }

    /// All categories, in configured order.
    #[must_use]
    pub fn all(&self) -> &[Category] {
        &self.categories
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.id == id)
    }

    /// Resolve a STAC collection id, failing with a 404-equivalent.
    pub fn from_collection_id(&self, id: &str) -> Result<&Category, ProviderError> {
        self.get(id).ok_or_else(|| {
            tracing::error!(
                collection = %id,
                "collection requested but its configuration is missing"
            );
            ProviderError::not_found("Collection not found")
        })
    }

    /// Resolve a project's topics to its category.
    ///
    /// Categories are scanned in configured order and the first one whose
    /// topic is present wins. No match is a configuration-level failure.
    pub fn category_from_topics<S: AsRef<str>>(
        &self,
        topics: &[S],
    ) -> Result<&Category, ProviderError> {
        let mut matches = self
            .categories
            .iter()
            .filter(|c| topics.iter().any(|t| t.as_ref() == c.gitlab_topic));

        let first = matches.next().ok_or_else(|| ProviderError::CategoryResolution {
            topics: topics.iter().map(|t| t.as_ref().to_string()).collect(),
        })?;

        if let Some(other) = matches.next() {
            tracing::warn!(
                first = %first.id,
                other = %other.id,
                "project topics match several categories, using the first"
            );
        }
        Ok(first)
    }

    /// Topics that identify categories.
    pub fn topics(&self) -> impl Iterator<Item = &str> {
        self.categories.iter().map(|c| c.gitlab_topic.as_str())
    }
}
