//! STAC documents.
//!
//! Builders are pure: every URL they emit comes from the [`StacContext`].

use std::collections::BTreeSet;
use std::sync::LazyLock;

use chrono::{DateTime, SecondsFormat, Utc};
use regex::{Captures, Regex};
use serde_json::{Map, Value, json};
use url::Url;

use super::assets;
use super::media;
use super::{CONFORMANCE, STAC_VERSION, StacContext};
use crate::category::{Category, FeatureVal};
use crate::http::is_local;
use crate::markdown as md;
use crate::provider::{License, Project, ProjectPreview, ProjectReference};
use crate::spatial;

static DOI_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https://doi.org/(?P<doi>10\.\d{4,9}/[-._;/:a-zA-Z0-9]+)").expect("valid regex")
});
static COLLECTION_HREF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?P<collection>[a-z\-]+)\+(?P<href>https?://[^)]+)").expect("valid regex")
});
static SRC_ATTRIBUTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"src=["'](?P<src>.*?)["']"#).expect("valid regex"));

const DOI_PREFIX: &str = "DOI:";
const SCIENTIFIC_EXTENSION: &str = "https://stac-extensions.github.io/scientific/v1.0.0/schema.json";
const DESCRIPTION_WRAP: usize = 150;

/// Pagination of a feature collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StacPagination {
    pub limit: usize,
    /// `None` when the number of matches is unknown.
    pub matched: Option<u64>,
    pub returned: usize,
    pub prev: Option<String>,
    pub next: Option<String>,
}

/// Where pagination links of a feature collection point to.
#[derive(Debug, Clone, Default)]
pub struct PageLinks {
    /// Route URL without query.
    pub route: String,
    /// Query of the current request.
    pub request_query: Vec<(String, String)>,
    /// Search state to carry over, overridden by the request query.
    pub state_query: Vec<(String, String)>,
}

fn rfc3339(datetime: &DateTime<Utc>) -> String {
    datetime.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn link(rel: &str, media_type: &str, href: String) -> Value {
    json!({"rel": rel, "type": media_type, "href": href})
}

pub fn conformance() -> Value {
    json!({ "conformsTo": CONFORMANCE })
}

/// Root catalog.
pub fn root(ctx: &StacContext<'_>, categories: &[Category]) -> Value {
    let config = &ctx.settings.root;
    let title = config.title.clone().unwrap_or_else(|| "GitLab STAC".to_string());
    let description = config.description.clone().unwrap_or_else(|| {
        format!("Catalog generated from your [GitLab]({}).", ctx.gitlab_url)
    });

    let mut links = vec![
        link("self", "application/json", ctx.root_url()),
        link("root", "application/json", ctx.root_url()),
        link("conformance", "application/json", ctx.conformance_url()),
        link("data", "application/json", ctx.collections_url()),
        json!({"rel": "search", "type": "application/geo+json", "href": ctx.search_url(), "method": "GET"}),
        json!({"rel": "search", "type": "application/geo+json", "href": ctx.search_url(), "method": "POST"}),
    ];
    links.extend(
        categories
            .iter()
            .map(|c| link("child", "application/geo+json", ctx.collection_url(&c.id))),
    );
    if let Some(logo) = config.logo.as_deref() {
        let mut logo_link = json!({"rel": "preview", "href": logo});
        if let Some(media_type) = media::guess(logo) {
            logo_link["type"] = json!(media_type);
        }
        links.push(logo_link);
    }

    json!({
        "stac_version": STAC_VERSION,
        "type": "Catalog",
        "id": config.id,
        "title": title,
        "description": description,
        "links": links,
        "conformsTo": CONFORMANCE,
    })
}

pub fn collections(ctx: &StacContext<'_>, categories: &[Category]) -> Value {
    let collections: Vec<Value> = categories.iter().map(|c| collection(ctx, c)).collect();
    let count = collections.len();
    json!({
        "collections": collections,
        "links": [
            link("self", "application/json", ctx.collections_url()),
            link("root", "application/json", ctx.root_url()),
        ],
        "context": {"limit": count, "matched": count, "returned": count},
        "numberMatched": count,
        "numberReturned": count,
    })
}

pub fn collection(ctx: &StacContext<'_>, category: &Category) -> Value {
    let description = category.description.clone().unwrap_or_else(|| {
        format!(
            "STAC {} generated from your [GitLab]({}).",
            category.title, ctx.gitlab_url
        )
    });

    let mut links = vec![
        link("self", "application/json", ctx.collection_url(&category.id)),
        link("parent", "application/json", ctx.root_url()),
        link("root", "application/json", ctx.root_url()),
        link("items", "application/geo+json", ctx.items_url(&category.id)),
    ];
    if let Some(logo) = category.logo.as_deref().filter(|l| !l.is_empty()) {
        let mut logo_link = json!({"rel": "preview", "href": logo});
        if let Some(media_type) = media::guess(logo) {
            logo_link["type"] = json!(media_type);
        }
        links.push(logo_link);
    }

    json!({
        "stac_version": STAC_VERSION,
        "stac_extensions": [],
        "type": "Collection",
        "id": category.id,
        "title": category.title,
        "description": description,
        "license": "other",
        "keywords": [category.id],
        "providers": [{
            "name": format!("GitLab ({})", ctx.gitlab_url),
            "roles": ["host"],
            "url": ctx.gitlab_url,
        }],
        "extent": {
            "spatial": {"bbox": [[-180, -90, 180, 90]]},
            "temporal": {"interval": [[null, null]]},
        },
        "links": links,
    })
}

/// Query of a pagination link: state overridden by the request, with the
/// opposite cursor removed and this one set.
fn page_query(
    page: &PageLinks,
    remove: &str,
    set: &str,
    cursor: &str,
) -> Vec<(String, String)> {
    let mut query = page.state_query.clone();
    for (key, value) in &page.request_query {
        match query.iter_mut().find(|(k, _)| k == key) {
            Some(existing) => existing.1.clone_from(value),
            None => query.push((key.clone(), value.clone())),
        }
    }
    query.retain(|(key, _)| key != remove && key != set);
    query.push((set.to_string(), cursor.to_string()));
    query
}

pub fn feature_collection(
    ctx: &StacContext<'_>,
    features: Vec<Value>,
    pagination: &StacPagination,
    page: &PageLinks,
    category: Option<&Category>,
) -> Value {
    let self_url = crate::http::url_add_query_params(
        &crate::http::url_add_query_params(&page.route, &page.request_query),
        &ctx.token.query,
    );
    let mut links = vec![
        link("self", "application/geo+json", self_url),
        link("root", "application/json", ctx.root_url()),
    ];
    if let Some(category) = category {
        links.push(link(
            "collection",
            "application/json",
            ctx.collection_url(&category.id),
        ));
    }
    if let Some(prev) = pagination.prev.as_deref() {
        let query = page_query(page, "after", "before", prev);
        links.push(link(
            "prev",
            "application/geo+json",
            crate::http::url_add_query_params(&page.route, &query),
        ));
    }
    if let Some(next) = pagination.next.as_deref() {
        let query = page_query(page, "before", "after", next);
        links.push(link(
            "next",
            "application/geo+json",
            crate::http::url_add_query_params(&page.route, &query),
        ));
    }

    json!({
        "type": "FeatureCollection",
        "stac_version": STAC_VERSION,
        "stac_extensions": [],
        "context": {
            "limit": pagination.limit,
            "matched": pagination.matched,
            "returned": pagination.returned,
        },
        "numberMatched": pagination.matched,
        "numberReturned": pagination.returned,
        "features": features,
        "links": links,
    })
}

/// Links every item carries.
fn default_links(ctx: &StacContext<'_>, project: &ProjectReference) -> Vec<Value> {
    let category = &project.category.id;
    vec![
        link(
            "self",
            "application/geo+json",
            ctx.feature_url(category, &project.path, &[]),
        ),
        link("parent", "application/json", ctx.collection_url(category)),
        link("root", "application/json", ctx.root_url()),
        link("collection", "application/json", ctx.collection_url(category)),
    ]
}

fn keywords(project: &ProjectReference) -> Vec<String> {
    project
        .topics
        .iter()
        .filter(|t| **t != project.category.gitlab_topic)
        .cloned()
        .collect()
}

pub fn item_reference(ctx: &StacContext<'_>, project: &ProjectReference) -> Value {
    json!({
        "stac_version": STAC_VERSION,
        "stac_extensions": [],
        "type": "Feature",
        "id": project.path,
        "geometry": null,
        "collection": project.category.id,
        "properties": {
            "title": project.name,
            "datetime": null,
        },
        "links": default_links(ctx, project),
        "assets": {},
    })
}

pub fn item_preview(ctx: &StacContext<'_>, project: &ProjectPreview) -> Value {
    let mut metadata = project.metadata.clone();
    let mut links = default_links(ctx, &project.reference);
    let mut assets = Map::new();
    if let Some((preview_link, preview_asset)) = preview(ctx, project, &mut metadata) {
        links.push(preview_link);
        assets.insert("preview".to_string(), preview_asset);
    }

    json!({
        "stac_version": STAC_VERSION,
        "stac_extensions": [],
        "type": "Feature",
        "id": project.path(),
        "geometry": null,
        "collection": project.reference.category.id,
        "properties": {
            "title": project.reference.name,
            "description": preview_description(project),
            "datetime": rfc3339(&project.last_update),
            "keywords": keywords(&project.reference),
            "sharinghub:stars": project.star_count,
        },
        "links": links,
        "assets": assets,
    })
}

/// Fully detailed item.
///
/// README front matter keys are consumed as they are interpreted; whatever
/// remains is exposed as item properties.
pub fn item(ctx: &StacContext<'_>, project: &Project) -> Value {
    let reference = project.reference();
    let mut metadata = project.preview.metadata.clone();

    let preview = preview(ctx, &project.preview, &mut metadata);
    let description = full_description(ctx, &project.preview);
    let license = license(project, &mut metadata);
    let temporal = temporal_extent(&project.preview, &mut metadata);
    let providers = providers(ctx, project, &mut metadata);
    let sharinghub = sharinghub_properties(project, &mut metadata);
    let (extensions, extension_properties) = extensions(ctx, &project.preview, &mut metadata);
    let mut links = related_links(ctx, &project.preview, &mut metadata);
    let mut item_assets = item_assets(ctx, project, &mut metadata);

    if let Some((preview_link, preview_asset)) = preview {
        links.push(preview_link);
        item_assets.insert("preview".to_string(), preview_asset);
    }

    let mut properties = Map::new();
    properties.insert("title".to_string(), json!(reference.name));
    properties.insert("description".to_string(), json!(description));
    properties.insert(
        "datetime".to_string(),
        json!(rfc3339(&project.preview.last_update)),
    );
    properties.insert("start_datetime".to_string(), temporal[0].clone());
    properties.insert("end_datetime".to_string(), temporal[1].clone());
    properties.insert("created".to_string(), temporal[0].clone());
    properties.insert("updated".to_string(), temporal[1].clone());
    properties.insert("keywords".to_string(), json!(keywords(reference)));
    properties.insert("providers".to_string(), Value::Array(providers));
    properties.extend(metadata);
    properties.extend(extension_properties.clone());
    properties.extend(sharinghub);

    if let Some(license) = license {
        properties.insert("license".to_string(), json!(license.id));
        links.push(json!({"rel": "license", "href": license.url}));
    }
    if let Some(doi) = extension_properties.get("sci:doi").and_then(Value::as_str) {
        links.push(json!({"rel": "cite-as", "href": format!("https://doi.org/{doi}")}));
    }

    let mut all_links = default_links(ctx, reference);
    all_links.push(json!({
        "rel": "bug_tracker",
        "type": "text/html",
        "href": project.bug_tracker_url,
        "title": "Bug Tracker",
    }));
    all_links.extend(links);

    let mut item = Map::new();
    item.insert("stac_version".to_string(), json!(STAC_VERSION));
    item.insert("stac_extensions".to_string(), json!(extensions));
    item.insert("type".to_string(), json!("Feature"));
    item.insert("id".to_string(), json!(reference.path));
    match project.preview.extent.as_ref() {
        Some(extent) => {
            item.insert("geometry".to_string(), spatial::to_geojson(extent));
            if let Some(bbox) = spatial::bounds(extent) {
                item.insert("bbox".to_string(), json!(bbox));
            }
        }
        None => {
            item.insert("geometry".to_string(), Value::Null);
        }
    }
    item.insert("collection".to_string(), json!(reference.category.id));
    item.insert("properties".to_string(), Value::Object(properties));
    item.insert("links".to_string(), Value::Array(all_links));
    item.insert("assets".to_string(), Value::Object(item_assets));
    Value::Object(item)
}

/// Description of a search result: the project description, else the
/// beginning of the README stripped of markdown.
fn preview_description(project: &ProjectPreview) -> String {
    if let Some(description) = project.description.as_deref().filter(|d| !d.is_empty()) {
        return description.to_string();
    }
    let body = md::remove_everything_before_first_heading(&project.readme);
    let body = md::clean_new_lines(&md::remove_links(&md::remove_images(
        &md::remove_headings(body),
    )));
    let mut description: String = body.chars().take(DESCRIPTION_WRAP).collect();
    description = description.trim().to_string();
    if description.chars().count() == DESCRIPTION_WRAP {
        description.push_str("...");
    }
    description
}

/// README with images pointing at the download proxy.
fn full_description(ctx: &StacContext<'_>, project: &ProjectPreview) -> String {
    let cache = cache_query(ctx);
    let patched = SRC_ATTRIBUTE.replace_all(&project.readme, |caps: &Captures<'_>| {
        let src = caps.name("src").map_or("", |m| m.as_str());
        format!("src=\"{}\"", resolve_href(ctx, project, src, &cache))
    });
    let patched = md::replace_images(&patched, |alt, src| {
        format!("![{alt}]({})", resolve_href(ctx, project, src, &cache))
    });
    md::clean_new_lines(&patched)
}

fn cache_query(ctx: &StacContext<'_>) -> Vec<(String, String)> {
    vec![(
        "cache".to_string(),
        ctx.settings.cache_timeout_secs.to_string(),
    )]
}

/// Normalise a repository-relative path: drop `.`, resolve `..`, strip the
/// leading slash.
fn repository_path(href: &str) -> String {
    let href = href.strip_prefix("file://").unwrap_or(href);
    let mut parts: Vec<&str> = Vec::new();
    for part in href.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            part => parts.push(part),
        }
    }
    parts.join("/")
}

/// Public URL of an href found in a README.
///
/// Repository paths go through the download proxy at the default branch;
/// `collection+https://gitlab/...` hrefs point at the STAC item of that
/// project; anything else is kept as is.
pub fn resolve_href(
    ctx: &StacContext<'_>,
    project: &ProjectPreview,
    href: &str,
    query: &[(String, String)],
) -> String {
    if is_local(href) {
        let mut href_query = vec![(
            "ref".to_string(),
            project
                .default_branch
                .clone()
                .unwrap_or_else(|| "HEAD".to_string()),
        )];
        href_query.extend(query.iter().cloned());
        return ctx.download_file_url(project.path(), &repository_path(href), &href_query);
    }

    if let Some(caps) = COLLECTION_HREF.captures(href) {
        let collection = caps.name("collection").map_or("", |m| m.as_str());
        let target = caps.name("href").map_or("", |m| m.as_str());
        if let Ok(url) = Url::parse(target) {
            let mut href_query: Vec<(String, String)> = url
                .query_pairs()
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect();
            href_query.extend(query.iter().cloned());
            return ctx.feature_url(collection, url.path().trim_start_matches('/'), &href_query);
        }
    }
    href.to_string()
}

/// Preview link and thumbnail asset, from front matter `preview` or a README
/// image whose alt text is "preview".
fn preview(
    ctx: &StacContext<'_>,
    project: &ProjectPreview,
    metadata: &mut Map<String, Value>,
) -> Option<(Value, Value)> {
    let mut preview = match metadata.remove("preview") {
        Some(Value::String(s)) if !s.is_empty() => Some(s),
        _ => None,
    };
    for (alt, src) in md::get_images(&project.readme) {
        if alt.trim().eq_ignore_ascii_case("preview") {
            preview = Some(src);
        }
    }
    let preview = preview?;

    let href = resolve_href(ctx, project, &preview, &cache_query(ctx));
    let mut asset = json!({
        "href": href,
        "title": "Preview",
        "roles": ["thumbnail"],
    });
    if let Some(media_type) = media::guess(&preview) {
        asset["type"] = json!(media_type);
    }
    Some((json!({"rel": "preview", "href": href}), asset))
}

/// `[start, end]` from front matter `extent.temporal`, else the project's
/// creation and last update.
fn temporal_extent(project: &ProjectPreview, metadata: &mut Map<String, Value>) -> [Value; 2] {
    let extent = metadata.remove("extent");
    if let Some(Value::Array(temporal)) = extent.as_ref().and_then(|e| e.get("temporal"))
        && temporal.len() == 2
    {
        return [temporal[0].clone(), temporal[1].clone()];
    }
    [
        json!(rfc3339(&project.created_at)),
        json!(rfc3339(&project.last_update)),
    ]
}

fn license(project: &Project, metadata: &mut Map<String, Value>) -> Option<License> {
    let id = match metadata.remove("license") {
        Some(value) => value.as_str().map(str::to_string),
        None => project.license.as_ref().map(|l| l.id.clone()),
    }
    .filter(|id| !id.is_empty())?;
    let url = match metadata.remove("license-url") {
        Some(value) => value.as_str().map(str::to_string),
        None => project.license.as_ref().map(|l| l.url.clone()),
    }
    .filter(|url| !url.is_empty())
    .unwrap_or_else(|| format!("https://spdx.org/licenses/{id}.html"));
    Some(License { id, url })
}

/// Front matter providers completed with a GitLab host and the owning
/// namespace as producer.
fn providers(
    ctx: &StacContext<'_>,
    project: &Project,
    metadata: &mut Map<String, Value>,
) -> Vec<Value> {
    let mut providers = match metadata.remove("providers") {
        Some(Value::Array(providers)) => providers,
        _ => Vec::new(),
    };
    let has_role = |role: &str| {
        providers.iter().any(|p| {
            p.get("roles")
                .and_then(Value::as_array)
                .is_some_and(|roles| roles.iter().any(|r| r.as_str() == Some(role)))
        })
    };
    let (has_host, has_producer) = (has_role("host"), has_role("producer"));

    if !has_host {
        providers.push(json!({
            "name": format!("GitLab ({})", ctx.gitlab_url),
            "roles": ["host"],
            "url": project.url,
        }));
    }
    if !has_producer {
        let producer = project
            .full_name
            .split('/')
            .next()
            .unwrap_or(&project.full_name)
            .trim_end();
        let namespace = project.path().split('/').next().unwrap_or(project.path());
        providers.push(json!({
            "name": producer,
            "roles": ["producer"],
            "url": format!("{}/{namespace}", ctx.gitlab_url),
        }));
    }
    providers
}

fn sharinghub_properties(project: &Project, metadata: &mut Map<String, Value>) -> Map<String, Value> {
    let dvc_init = match project.files.as_deref() {
        Some(files) if !files.is_empty() && !files.iter().any(|f| f.starts_with(".dvc/")) => {
            FeatureVal::Disable
        }
        _ => FeatureVal::Enable,
    };

    let mut props = Map::new();
    props.insert("id".to_string(), json!(project.reference().id));
    props.insert("name".to_string(), json!(project.full_name));
    props.insert("path".to_string(), json!(project.path()));
    props.insert("stars".to_string(), json!(project.preview.star_count));
    props.insert(
        "default-branch".to_string(),
        json!(project.preview.default_branch),
    );
    props.insert("access-level".to_string(), json!(project.access_level));
    props.insert("dvc-init".to_string(), json!(dvc_init.as_str()));
    for (feature, value) in &project.reference().category.features {
        props.insert(feature.clone(), json!(value.as_str()));
    }
    if let Some(Value::Object(extra)) = metadata.remove("sharinghub") {
        props.extend(extra);
    }

    props
        .into_iter()
        .map(|(key, value)| (format!("sharinghub:{key}"), value))
        .collect()
}

/// STAC extensions declared in front matter or configured, and the
/// prefixed properties they contribute, plus scientific citations found in
/// the README.
fn extensions(
    ctx: &StacContext<'_>,
    project: &ProjectPreview,
    metadata: &mut Map<String, Value>,
) -> (Vec<String>, Map<String, Value>) {
    let mut schemas = BTreeSet::new();
    let mut properties = Map::new();

    let mut declared: Vec<(String, String)> = match metadata.remove("extensions") {
        Some(Value::Object(map)) => map
            .into_iter()
            .filter_map(|(prefix, schema)| schema.as_str().map(|s| (prefix, s.to_string())))
            .collect(),
        _ => Vec::new(),
    };
    for (prefix, schema) in &ctx.settings.extensions {
        declared.retain(|(p, _)| p != prefix);
        declared.push((prefix.clone(), schema.clone()));
    }

    for (prefix, schema) in declared {
        match metadata.remove(&prefix) {
            Some(Value::Object(values)) if !values.is_empty() => {
                schemas.insert(schema);
                for (prop, value) in values {
                    properties.insert(format!("{prefix}:{prop}"), value);
                }
            }
            _ => {}
        }
    }

    let (doi, publications) = scientific_citations(&project.readme);
    if doi.is_some() || !publications.is_empty() {
        schemas.insert(SCIENTIFIC_EXTENSION.to_string());
        if let Some((doi, citation)) = doi {
            properties.insert("sci:doi".to_string(), json!(doi));
            properties.insert("sci:citation".to_string(), json!(citation));
        }
        if !publications.is_empty() {
            properties.insert("sci:publications".to_string(), json!(publications));
        }
    }

    (schemas.into_iter().collect(), properties)
}

/// The first DOI link of the README is the project's own; later ones are
/// publications. Falls back to a bare DOI URL anywhere in the text.
fn scientific_citations(readme: &str) -> (Option<(String, String)>, Vec<Value>) {
    let mut doi = None;
    let mut publications = Vec::new();

    for (text, href) in md::get_links(readme) {
        if let Some(found) = DOI_URL.captures(&href).and_then(|c| c.name("doi")) {
            let citation = text
                .strip_prefix(DOI_PREFIX)
                .unwrap_or(&text)
                .trim_start()
                .to_string();
            if doi.is_none() {
                doi = Some((found.as_str().to_string(), citation));
            } else {
                publications.push(json!({"doi": found.as_str(), "citation": citation}));
            }
        }
    }

    if doi.is_none()
        && let Some(found) = DOI_URL.captures(readme).and_then(|c| c.name("doi"))
    {
        doi = Some((found.as_str().to_string(), String::new()));
    }
    (doi, publications)
}

/// Front matter `links` with resolved hrefs, and `related` projects as
/// `derived_from` links.
fn related_links(
    ctx: &StacContext<'_>,
    project: &ProjectPreview,
    metadata: &mut Map<String, Value>,
) -> Vec<Value> {
    let mut links: Vec<Value> = match metadata.remove("links") {
        Some(Value::Array(links)) => links
            .into_iter()
            .filter_map(|mut link| {
                let href = link.get("href")?.as_str()?.to_string();
                link["href"] = json!(resolve_href(ctx, project, &href, &[]));
                Some(link)
            })
            .collect(),
        _ => Vec::new(),
    };

    let related_link = |collection: &str, project_url: &str| {
        let path = Url::parse(project_url)
            .map(|u| u.path().to_string())
            .unwrap_or_else(|_| project_url.to_string());
        let path = path.trim_start_matches('/');
        json!({
            "rel": "derived_from",
            "type": "application/geo+json",
            "title": format!("{collection}: {path}"),
            "href": ctx.feature_url(collection, path, &[]),
        })
    };

    if let Some(Value::Object(related)) = metadata.remove("related") {
        for (collection, value) in related {
            match value {
                Value::String(url) => links.push(related_link(&collection, &url)),
                Value::Array(urls) => links.extend(
                    urls.iter()
                        .filter_map(Value::as_str)
                        .map(|url| related_link(&collection, url)),
                ),
                _ => {}
            }
        }
    }
    links
}

fn item_assets(
    ctx: &StacContext<'_>,
    project: &Project,
    metadata: &mut Map<String, Value>,
) -> Map<String, Value> {
    let rules = assets::collect_rules(&project.reference().category, metadata);
    let files = project.files.as_deref().unwrap_or_default();
    let mut item_assets = assets::create_assets(&rules, files, |href| {
        resolve_href(ctx, &project.preview, href, &[])
    });

    if let Some(release) = project.latest_release.as_ref() {
        let format = ctx.settings.release_format();
        let mut asset = json!({
            "href": ctx.download_archive_url(project.path(), &format, &release.tag),
            "title": format!("Release {}: {}", release.tag, release.name),
            "roles": ["source"],
        });
        if let Some(description) = release.description.as_deref().filter(|d| !d.is_empty()) {
            asset["description"] = json!(description);
        }
        if let Some(media_type) = media::guess(&format!("archive.{format}")) {
            asset["type"] = json!(media_type);
        }
        item_assets.insert("release".to_string(), asset);
    }
    item_assets
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::category::tests::category;
    use crate::provider::{AccessLevel, Release};
    use crate::stac::StacSettings;
    use crate::stac::tests::{context, token};

    fn at(s: &str) -> DateTime<Utc> {
        s.parse().expect("valid datetime")
    }

    pub(crate) fn reference() -> ProjectReference {
        ProjectReference {
            id: 42,
            name: "Flood model".to_string(),
            path: "space/flood-model".to_string(),
            topics: vec!["sharinghub:aimodel".to_string(), "flood".to_string()],
            category: category("ai-model", "sharinghub:aimodel"),
        }
    }

    pub(crate) fn preview_project(readme: &str) -> ProjectPreview {
        let (body, metadata) = md::parse(readme);
        ProjectPreview {
            reference: reference(),
            description: None,
            created_at: at("2024-01-01T00:00:00Z"),
            last_update: at("2024-06-01T12:00:00Z"),
            star_count: 3,
            default_branch: Some("main".to_string()),
            readme: body,
            metadata,
            extent: None,
        }
    }

    pub(crate) fn full_project(readme: &str) -> Project {
        Project {
            preview: preview_project(readme),
            full_name: "Space / Flood model".to_string(),
            url: "https://gitlab.example.com/space/flood-model".to_string(),
            bug_tracker_url: "https://gitlab.example.com/space/flood-model/issues".to_string(),
            license: None,
            last_commit: Some("abc1234".to_string()),
            files: Some(vec!["README.md".to_string(), "model.onnx".to_string()]),
            latest_release: Some(Release {
                name: "First".to_string(),
                tag: "v1.0".to_string(),
                description: None,
                commit: "abc1234def".to_string(),
            }),
            access_level: AccessLevel::Contributor,
        }
    }

    fn link_href<'a>(doc: &'a Value, rel: &str) -> Option<&'a str> {
        doc["links"]
            .as_array()?
            .iter()
            .find(|l| l["rel"] == rel)
            .and_then(|l| l["href"].as_str())
    }

    // ─── Catalog and collections ──────────────────────────────────────────

    #[test]
    fn test_root_links_children_and_search() {
        let settings = StacSettings::default();
        let token = token(Some("t"));
        let ctx = context(&token, &settings);
        let categories = vec![category("ai-model", "sharinghub:aimodel")];

        let doc = root(&ctx, &categories);
        assert_eq!(doc["type"], "Catalog");
        assert_eq!(doc["id"], "gitlab-stac");
        assert_eq!(
            link_href(&doc, "child"),
            Some("https://stac.example.com/api/stac/collections/ai-model?gitlab_token=t")
        );
        let searches = doc["links"]
            .as_array()
            .expect("links")
            .iter()
            .filter(|l| l["rel"] == "search")
            .count();
        assert_eq!(searches, 2);
        assert_eq!(doc["conformsTo"].as_array().map(Vec::len), Some(11));
    }

    #[test]
    fn test_collections_context() {
        let settings = StacSettings::default();
        let token = token(None);
        let ctx = context(&token, &settings);
        let categories = vec![
            category("ai-model", "sharinghub:aimodel"),
            category("dataset", "sharinghub:dataset"),
        ];
        let doc = collections(&ctx, &categories);
        assert_eq!(doc["numberMatched"], 2);
        assert_eq!(doc["collections"][1]["id"], "dataset");
        assert_eq!(
            link_href(&doc["collections"][0], "items"),
            Some("https://stac.example.com/api/stac/collections/ai-model/items")
        );
    }

    #[test]
    fn test_feature_collection_pagination_links_swap_cursors() {
        let settings = StacSettings::default();
        let token = token(None);
        let ctx = context(&token, &settings);
        let page = PageLinks {
            route: ctx.search_route(),
            request_query: vec![
                ("collections".to_string(), "dataset".to_string()),
                ("after".to_string(), "c2".to_string()),
            ],
            state_query: vec![("limit".to_string(), "2".to_string())],
        };
        let pagination = StacPagination {
            limit: 2,
            matched: Some(5),
            returned: 2,
            prev: Some("c3".to_string()),
            next: Some("c4".to_string()),
        };
        let doc = feature_collection(&ctx, Vec::new(), &pagination, &page, None);

        assert_eq!(
            link_href(&doc, "prev"),
            Some("https://stac.example.com/api/stac/search?limit=2&collections=dataset&before=c3")
        );
        assert_eq!(
            link_href(&doc, "next"),
            Some("https://stac.example.com/api/stac/search?limit=2&collections=dataset&after=c4")
        );
        assert_eq!(doc["context"]["matched"], 5);
        assert_eq!(doc["numberReturned"], 2);
    }

    #[test]
    fn test_feature_collection_unknown_matched_is_null() {
        let settings = StacSettings::default();
        let token = token(None);
        let ctx = context(&token, &settings);
        let doc = feature_collection(
            &ctx,
            Vec::new(),
            &StacPagination::default(),
            &PageLinks::default(),
            None,
        );
        assert!(doc["numberMatched"].is_null());
        assert_eq!(link_href(&doc, "next"), None);
    }

    // ─── Items ────────────────────────────────────────────────────────────

    #[test]
    fn test_item_reference() {
        let settings = StacSettings::default();
        let token = token(None);
        let ctx = context(&token, &settings);
        let doc = item_reference(&ctx, &reference());
        assert_eq!(doc["id"], "space/flood-model");
        assert_eq!(doc["collection"], "ai-model");
        assert_eq!(doc["properties"]["title"], "Flood model");
        assert!(doc["properties"]["datetime"].is_null());
        assert_eq!(
            link_href(&doc, "self"),
            Some("https://stac.example.com/api/stac/collections/ai-model/items/space/flood-model")
        );
    }

    #[test]
    fn test_item_preview_description_from_readme() {
        let settings = StacSettings::default();
        let token = token(Some("t"));
        let ctx = context(&token, &settings);
        let long = "abcdefg ".repeat(40);
        let project = preview_project(&format!(
            "Intro before heading\n# Title\n\n![preview](docs/thumb.png)\n\n{long}"
        ));

        let doc = item_preview(&ctx, &project);
        let description = doc["properties"]["description"].as_str().expect("description");
        assert!(description.ends_with("..."));
        assert!(!description.contains("Intro"));
        assert_eq!(doc["properties"]["keywords"], json!(["flood"]));
        assert_eq!(doc["properties"]["sharinghub:stars"], 3);
        assert_eq!(doc["properties"]["datetime"], "2024-06-01T12:00:00Z");
        assert_eq!(
            doc["assets"]["preview"]["href"],
            "https://stac.example.com/api/download/space/flood-model/repository/docs/thumb.png?ref=main&cache=300&gitlab_token=t"
        );
        assert_eq!(doc["assets"]["preview"]["type"], "image/png");
    }

    #[test]
    fn test_item_full() {
        let settings = StacSettings::default();
        let token = token(None);
        let ctx = context(&token, &settings);
        let readme = "---\nlicense: MIT\nextent:\n  temporal: ['2020-01-01T00:00:00Z', null]\nsharinghub:\n  map-viewer: enable\nrelated:\n  dataset: https://gitlab.example.com/space/floods\ncustom: kept\n---\n# Flood model\n\n![img](./imgs/../fig.png)\n\n[DOI: Flood paper](https://doi.org/10.1234/flood.2024)\n";
        let mut project = full_project(readme);
        project.preview.extent = Some(spatial::bbox2geom(&[0.0, 40.0, 10.0, 50.0]).expect("bbox"));

        let doc = item(&ctx, &project);
        let props = &doc["properties"];

        assert_eq!(doc["bbox"], json!([0.0, 40.0, 10.0, 50.0]));
        assert_eq!(doc["geometry"]["type"], "Polygon");
        assert_eq!(props["license"], "MIT");
        assert_eq!(link_href(&doc, "license"), Some("https://spdx.org/licenses/MIT.html"));
        assert_eq!(props["start_datetime"], "2020-01-01T00:00:00Z");
        assert!(props["end_datetime"].is_null());
        assert_eq!(props["custom"], "kept");
        assert!(props.get("related").is_none());
        assert_eq!(props["sharinghub:map-viewer"], "enable");
        assert_eq!(props["sharinghub:access-level"], 2);
        assert_eq!(props["sharinghub:dvc-init"], "disable");
        assert_eq!(props["sci:doi"], "10.1234/flood.2024");
        assert_eq!(props["sci:citation"], "Flood paper");
        assert_eq!(
            link_href(&doc, "cite-as"),
            Some("https://doi.org/10.1234/flood.2024")
        );
        assert_eq!(
            link_href(&doc, "derived_from"),
            Some("https://stac.example.com/api/stac/collections/dataset/items/space/floods")
        );
        assert_eq!(
            link_href(&doc, "bug_tracker"),
            Some("https://gitlab.example.com/space/flood-model/issues")
        );
        assert!(
            props["description"]
                .as_str()
                .is_some_and(|d| d.contains("/repository/fig.png?ref=main&cache=300"))
        );

        let providers = props["providers"].as_array().expect("providers");
        assert_eq!(providers.len(), 2);
        assert_eq!(providers[1]["name"], "Space");
        assert_eq!(providers[1]["url"], "https://gitlab.example.com/space");

        let release = &doc["assets"]["release"];
        assert_eq!(release["title"], "Release v1.0: First");
        assert_eq!(release["type"], "application/zip");
        assert_eq!(
            release["href"],
            "https://stac.example.com/api/download/space/flood-model/archive.zip?ref=v1.0"
        );
        assert_eq!(
            doc["stac_extensions"],
            json!(["https://stac-extensions.github.io/scientific/v1.0.0/schema.json"])
        );
    }

    #[test]
    fn test_item_license_from_gitlab_and_configured_extension() {
        let mut settings = StacSettings::default();
        settings.extensions.insert(
            "ml-model".to_string(),
            "https://stac-extensions.github.io/ml-model/v1.0.0/schema.json".to_string(),
        );
        let token = token(None);
        let ctx = context(&token, &settings);
        let mut project = full_project("---\nml-model:\n  type: ml-model\n---\nbody");
        project.license = Some(License {
            id: "Apache-2.0".to_string(),
            url: "https://gitlab.example.com/space/flood-model/-/blob/main/LICENSE".to_string(),
        });

        let doc = item(&ctx, &project);
        assert_eq!(doc["properties"]["license"], "Apache-2.0");
        assert_eq!(
            link_href(&doc, "license"),
            Some("https://gitlab.example.com/space/flood-model/-/blob/main/LICENSE")
        );
        assert_eq!(doc["properties"]["ml-model:type"], "ml-model");
        assert!(doc["properties"].get("ml-model").is_none());
        assert_eq!(
            doc["stac_extensions"],
            json!(["https://stac-extensions.github.io/ml-model/v1.0.0/schema.json"])
        );
        assert!(doc["geometry"].is_null());
    }

    #[test]
    fn test_resolve_href_variants() {
        let settings = StacSettings::default();
        let token = token(None);
        let ctx = context(&token, &settings);
        let project = preview_project("body");

        assert_eq!(
            resolve_href(&ctx, &project, "/data/a.tif", &[]),
            "https://stac.example.com/api/download/space/flood-model/repository/data/a.tif?ref=main"
        );
        assert_eq!(
            resolve_href(
                &ctx,
                &project,
                "dataset+https://gitlab.example.com/space/floods?x=1",
                &[]
            ),
            "https://stac.example.com/api/stac/collections/dataset/items/space/floods?x=1"
        );
        assert_eq!(
            resolve_href(&ctx, &project, "https://example.com/a.png", &[]),
            "https://example.com/a.png"
        );
    }
}
