//! Asset rules: which repository files become STAC assets, and how.

use regex::Regex;
use serde_json::{Map, Value, json};

use super::media;
use crate::category::{AssetRule, AssetRuleDef, Category};

/// Glob matched against repository paths from the right.
///
/// A relative pattern matches when the trailing components of a path match
/// it, so `*.tif` matches `data/a.tif`. Absolute patterns must match the
/// whole path. `*` and `**` never cross a `/`.
#[derive(Debug, Clone)]
pub struct Glob {
    components: Vec<Regex>,
    absolute: bool,
}

impl Glob {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        let absolute = pattern.starts_with('/');
        let components = pattern
            .trim_matches('/')
            .split('/')
            .filter(|c| !c.is_empty())
            .map(|component| Regex::new(&component_regex(component)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            components,
            absolute,
        })
    }

    #[must_use]
    pub fn matches(&self, path: &str) -> bool {
        let parts: Vec<&str> = path.trim_matches('/').split('/').collect();
        if self.components.is_empty()
            || parts.len() < self.components.len()
            || (self.absolute && parts.len() != self.components.len())
        {
            return false;
        }
        parts
            .iter()
            .rev()
            .zip(self.components.iter().rev())
            .all(|(part, re)| re.is_match(part))
    }
}

fn component_regex(component: &str) -> String {
    let mut out = String::from("^");
    let mut chars = component.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => {
                while chars.peek() == Some(&'*') {
                    chars.next();
                }
                out.push_str("[^/]*");
            }
            '?' => out.push_str("[^/]"),
            '[' => {
                let mut class = String::new();
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == ']' {
                        closed = true;
                        break;
                    }
                    class.push(c);
                }
                if closed && !class.is_empty() {
                    out.push('[');
                    if let Some(rest) = class.strip_prefix('!') {
                        out.push('^');
                        out.push_str(&rest.replace('\\', "\\\\"));
                    } else {
                        out.push_str(&class.replace('\\', "\\\\"));
                    }
                    out.push(']');
                } else {
                    out.push_str(&regex::escape(&format!("[{class}")));
                }
            }
            c => out.push_str(&regex::escape(&c.to_string())),
        }
    }
    out.push('$');
    out
}

/// Rules of the project's category, then those of its README `assets`.
pub fn collect_rules(category: &Category, metadata: &mut Map<String, Value>) -> Vec<AssetRule> {
    let mut rules: Vec<AssetRule> = category
        .assets
        .iter()
        .cloned()
        .map(AssetRuleDef::into_rule)
        .collect();

    if let Some(Value::Array(defs)) = metadata.remove("assets") {
        for def in defs {
            match serde_json::from_value::<AssetRuleDef>(def) {
                Ok(def) => rules.push(def.into_rule()),
                Err(e) => tracing::debug!(error = %e, "ignoring invalid asset rule"),
            }
        }
    }
    rules
}

/// Apply `rules` to the project files.
///
/// `resolve` turns a repository path or href into a public URL.
pub fn create_assets<F>(rules: &[AssetRule], files: &[String], resolve: F) -> Map<String, Value>
where
    F: Fn(&str) -> String,
{
    let mut assets = Map::new();
    for rule in rules {
        match rule.glob.as_deref().or(rule.path.as_deref()) {
            Some(pattern) => {
                let glob = match Glob::new(pattern) {
                    Ok(glob) => glob,
                    Err(e) => {
                        tracing::warn!(pattern, error = %e, "invalid asset glob");
                        continue;
                    }
                };
                for file in files.iter().filter(|f| glob.matches(f)) {
                    if let Some((key, asset)) = prepare_asset(rule, Some(file), file, &resolve) {
                        assets.insert(key, asset);
                    }
                }
            }
            None => {
                if let Some((key, asset)) = prepare_asset(rule, rule.href.as_deref(), "", &resolve)
                {
                    assets.insert(key, asset);
                }
            }
        }
    }
    assets
}

fn prepare_asset<F>(
    rule: &AssetRule,
    href: Option<&str>,
    path: &str,
    resolve: &F,
) -> Option<(String, Value)>
where
    F: Fn(&str) -> String,
{
    let href = href.filter(|h| !h.is_empty())?;
    let key = rule
        .key
        .as_deref()
        .filter(|k| !k.is_empty())
        .unwrap_or(path);
    if key.is_empty() {
        return None;
    }
    let key = key.replace("{path}", path);
    let fill = |template: &str| template.replace("{key}", &key).replace("{path}", path);

    let mut asset = Map::new();
    asset.insert("href".to_string(), json!(resolve(href)));
    asset.insert(
        "roles".to_string(),
        json!(rule.roles.clone().unwrap_or_else(|| vec!["data".to_string()])),
    );
    if let Some(title) = rule.title.as_deref().filter(|t| !t.is_empty()) {
        asset.insert("title".to_string(), json!(fill(title)));
    }
    if let Some(description) = rule.description.as_deref().filter(|d| !d.is_empty()) {
        asset.insert("description".to_string(), json!(fill(description)));
    }

    let media_type = rule
        .type_as
        .as_deref()
        .and_then(media::from_alias)
        .map(str::to_string)
        .or_else(|| rule.media_type.clone().filter(|t| !t.is_empty()))
        .or_else(|| media::guess(href).map(str::to_string));
    if let Some(media_type) = media_type {
        asset.insert("type".to_string(), json!(media_type));
    }

    Some((key, Value::Object(asset)))
}
