//! Configuration check.
//!
//! Validates what `serve` needs and prints the resulting collections.

use clap::ValueEnum;
use console::style;
use serde::Serialize;
use tabled::{Table, Tabled, settings::Style};

use stacport::category::{Category, FeatureVal};
use stacport::gitlab::clean_url;
use stacport::server::STORE_FEATURE;

use crate::config::Config;

/// Output format of the category listing.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub(crate) enum OutputFormat {
    /// Display as a formatted table (default)
    #[default]
    Table,
    /// Display as JSON
    Json,
}

/// One row of the category listing.
#[derive(Debug, Clone, Serialize, Tabled)]
struct CategoryDisplay {
    #[tabled(rename = "Collection")]
    id: String,
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "GitLab Topic")]
    topic: String,
    #[tabled(rename = "Features")]
    features: String,
    #[tabled(rename = "Asset Rules")]
    assets: usize,
}

impl From<&Category> for CategoryDisplay {
    fn from(category: &Category) -> Self {
        let features: Vec<&str> = category
            .features
            .iter()
            .filter(|(_, value)| **value == FeatureVal::Enable)
            .map(|(name, _)| name.as_str())
            .collect();
        Self {
            id: category.id.clone(),
            title: category.title.clone(),
            topic: category.gitlab_topic.clone(),
            features: if features.is_empty() {
                "-".to_string()
            } else {
                features.join(", ")
            },
            assets: category.assets.len(),
        }
    }
}

#[derive(Debug, Serialize)]
struct CheckReport {
    gitlab_url: String,
    prefix: String,
    s3_store: bool,
    categories: Vec<CategoryDisplay>,
}

/// Validate the configuration and print the configured collections.
pub(crate) fn handle_check(
    config: &Config,
    output: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let gitlab_url = clean_url(config.gitlab_url()?)?;
    let registry = config.categories()?;

    if registry.all().is_empty() {
        tracing::warn!("no category configured, every search will be empty");
    }
    if config.s3.is_none() && registry.all().iter().any(|c| c.is_enabled(STORE_FEATURE)) {
        tracing::warn!(
            feature = STORE_FEATURE,
            "categories enable the store but no [s3] section is configured"
        );
    }

    let report = CheckReport {
        gitlab_url,
        prefix: config.server.prefix.clone(),
        s3_store: config.s3.is_some(),
        categories: registry.all().iter().map(CategoryDisplay::from).collect(),
    };

    match output {
        OutputFormat::Table => {
            println!(
                "{} Configuration is valid for {}",
                style("✓").green().bold(),
                style(&report.gitlab_url).cyan()
            );
            if !report.prefix.is_empty() {
                println!("  API prefix: {}", report.prefix);
            }
            println!(
                "  S3 store: {}",
                if report.s3_store { "enabled" } else { "disabled" }
            );
            let mut table = Table::new(report.categories);
            table.with(Style::rounded());
            println!("{table}");
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }
    Ok(())
}
