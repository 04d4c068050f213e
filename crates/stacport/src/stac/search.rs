//! STAC item search.
//!
//! Translates STAC search parameters (GET query or POST body) into provider
//! [`SearchParams`], runs the search at the requested level of detail and
//! renders a feature collection.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use super::build::{self, PageLinks, StacPagination};
use super::{StacContext, StacError};
use crate::cache::TtlCache;
use crate::category::{Category, CategoryRegistry};
use crate::provider::{
    CursorPagination, DatetimeRange, License, Project, ProviderClient, SearchParams, Sort,
    SortDirection,
};
use crate::spatial;

/// Level of detail of returned items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    Reference,
    Preview,
    #[default]
    Full,
}

/// One sort criterion of a POST search.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SortField {
    pub field: String,
    #[serde(default = "default_direction")]
    pub direction: String,
}

fn default_direction() -> String {
    "asc".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum SortBy {
    /// `field`, `+field` or `-field`.
    Text(String),
    Fields(Vec<SortField>),
}

/// STAC search parameters, as posted to `/search`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct StacSearchQuery {
    pub limit: Option<usize>,
    pub sortby: Option<SortBy>,
    pub bbox: Vec<f64>,
    pub datetime: Option<String>,
    pub intersects: Option<Value>,
    pub ids: Vec<String>,
    pub collections: Vec<String>,
    #[serde(deserialize_with = "one_or_many")]
    pub q: Vec<String>,
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        Some(OneOrMany::One(q)) => vec![q],
        Some(OneOrMany::Many(q)) => q,
        None => Vec::new(),
    })
}

/// Query string of `GET /search` and `GET /collections/{id}/items`; list
/// values are comma-separated.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SearchGetParams {
    pub mode: Option<SearchMode>,
    pub before: Option<String>,
    pub after: Option<String>,
    pub limit: Option<usize>,
    pub sortby: Option<String>,
    pub q: Option<String>,
    pub bbox: Option<String>,
    pub datetime: Option<String>,
    pub intersects: Option<String>,
    pub ids: Option<String>,
    pub collections: Option<String>,
}

fn split_list(value: Option<&str>) -> Vec<String> {
    value
        .filter(|v| !v.is_empty())
        .map(|v| v.split(',').map(str::to_string).collect())
        .unwrap_or_default()
}

impl StacSearchQuery {
    /// Parse GET parameters.
    pub fn from_get(params: &SearchGetParams) -> Result<Self, StacError> {
        let bbox = split_list(params.bbox.as_deref())
            .iter()
            .map(|v| v.trim().parse::<f64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| {
                StacError::BadRequest(format!(
                    "Invalid 'bbox': {}",
                    params.bbox.as_deref().unwrap_or_default()
                ))
            })?;
        let intersects = match params.intersects.as_deref().filter(|i| !i.is_empty()) {
            Some(raw) => serde_json::from_str::<Value>(raw)
                .map_err(|e| StacError::BadRequest(format!("Invalid 'intersects': {e}")))?,
            None => Value::Null,
        };

        Ok(Self {
            limit: params.limit,
            sortby: params
                .sortby
                .clone()
                .filter(|s| !s.is_empty())
                .map(SortBy::Text),
            bbox,
            datetime: params.datetime.clone().filter(|d| !d.is_empty()),
            intersects: (!intersects.is_null()).then_some(intersects),
            ids: split_list(params.ids.as_deref()),
            collections: split_list(params.collections.as_deref()),
            q: split_list(params.q.as_deref()),
        })
    }

    /// Effective limit; zero is rejected.
    pub fn limit(&self, default: usize) -> Result<usize, StacError> {
        match self.limit {
            Some(0) => Err(StacError::BadRequest(
                "'limit' must be strictly positive".to_string(),
            )),
            Some(limit) => Ok(limit),
            None => Ok(default),
        }
    }

    /// Requested sort, the first criterion only.
    #[must_use]
    pub fn sort(&self) -> Option<Sort> {
        match self.sortby.as_ref()? {
            SortBy::Text(text) => {
                let direction = if text.starts_with('-') {
                    SortDirection::Desc
                } else {
                    SortDirection::Asc
                };
                let field = normalize_sort_field(text.trim_start_matches(['-', '+']));
                (!field.is_empty()).then(|| Sort::new(field, direction))
            }
            SortBy::Fields(fields) => fields.first().map(|f| {
                Sort::new(
                    normalize_sort_field(&f.field),
                    SortDirection::parse(&f.direction).unwrap_or_default(),
                )
            }),
        }
    }

    /// Datetime filter: `start/end` with `..` or empty for open ends, or a
    /// single instant.
    pub fn datetime_range(&self) -> Result<Option<DatetimeRange>, StacError> {
        let Some(datetime) = self.datetime.as_deref().map(str::trim).filter(|d| !d.is_empty())
        else {
            return Ok(None);
        };
        let range = match datetime.split_once('/') {
            Some((start, end)) => DatetimeRange {
                start: parse_bound(start)?.unwrap_or(DateTime::<Utc>::MIN_UTC),
                end: parse_bound(end)?.unwrap_or(DateTime::<Utc>::MAX_UTC),
            },
            None => {
                let instant = parse_bound(datetime)?.ok_or_else(|| invalid_datetime(datetime))?;
                DatetimeRange {
                    start: instant,
                    end: instant,
                }
            }
        };
        Ok(Some(range))
    }

    /// Spatial filter from `intersects`, else `bbox`.
    pub fn extent(&self) -> Result<Option<geo::Geometry<f64>>, StacError> {
        if let Some(intersects) = self.intersects.as_ref() {
            return spatial::geojson2geom(intersects).map(Some).map_err(|e| {
                StacError::Unprocessable(format!("Could not process 'intersects': {e}"))
            });
        }
        if !self.bbox.is_empty() {
            return spatial::bbox2geom(&self.bbox)
                .map(Some)
                .map_err(|e| StacError::Unprocessable(format!("Could not process 'bbox': {e}")));
        }
        Ok(None)
    }
}

fn normalize_sort_field(field: &str) -> String {
    field
        .trim()
        .replace("properties.", "")
        .replace("sharinghub:", "")
}

fn invalid_datetime(value: &str) -> StacError {
    StacError::BadRequest(format!("Invalid 'datetime': {value}"))
}

fn parse_bound(value: &str) -> Result<Option<DateTime<Utc>>, StacError> {
    let value = value.trim();
    if value.is_empty() || value == ".." {
        return Ok(None);
    }
    DateTime::parse_from_rfc3339(value)
        .map(|dt| Some(dt.with_timezone(&Utc)))
        .map_err(|_| invalid_datetime(value))
}

/// Split free text into plain terms, `#topic` filters and `:flag` flags.
#[must_use]
pub fn parse_query(text: &str) -> (Option<String>, Vec<String>, Vec<String>) {
    let mut terms = Vec::new();
    let mut topics = Vec::new();
    let mut flags = Vec::new();
    for word in text.split_whitespace() {
        if let Some(topic) = word.strip_prefix('#') {
            if !topic.is_empty() {
                topics.push(topic.to_string());
            }
        } else if let Some(flag) = word.strip_prefix(':') {
            if !flag.is_empty() {
                flags.push(flag.to_lowercase());
            }
        } else {
            terms.push(word);
        }
    }
    let query = (!terms.is_empty()).then(|| terms.join(" "));
    (query, topics, flags)
}

/// Search parameters carried over by pagination links.
#[must_use]
pub fn state_query(query: &StacSearchQuery, exclude_collections: bool) -> Vec<(String, String)> {
    let mut state = Vec::new();
    let mut push = |key: &str, value: String| state.push((key.to_string(), value));

    if let Some(limit) = query.limit {
        push("limit", limit.to_string());
    }
    match query.sortby.as_ref() {
        Some(SortBy::Text(text)) => push("sortby", text.clone()),
        Some(SortBy::Fields(fields)) => {
            if let Some(first) = fields.first() {
                let sign = if SortDirection::parse(&first.direction) == Some(SortDirection::Desc) {
                    "-"
                } else {
                    ""
                };
                push("sortby", format!("{sign}{}", first.field));
            }
        }
        None => {}
    }
    if !query.bbox.is_empty() {
        let bbox: Vec<String> = query.bbox.iter().map(ToString::to_string).collect();
        push("bbox", bbox.join(","));
    }
    if let Some(datetime) = query.datetime.as_ref() {
        push("datetime", datetime.clone());
    }
    if let Some(intersects) = query.intersects.as_ref() {
        push("intersects", intersects.to_string());
    }
    if !query.ids.is_empty() {
        push("ids", query.ids.join(","));
    }
    if !exclude_collections && !query.collections.is_empty() {
        push("collections", query.collections.join(","));
    }
    if !query.q.is_empty() {
        push("q", query.q.join(","));
    }
    state
}

/// One search request as received by the API.
#[derive(Debug, Clone)]
pub struct SearchRequest<'a> {
    pub query: &'a StacSearchQuery,
    pub mode: SearchMode,
    pub before: Option<String>,
    pub after: Option<String>,
    /// Category fixed by the route, for collection items.
    pub category: Option<&'a Category>,
}

/// Run a STAC search and render its feature collection.
///
/// `page` carries the route and request query; the search state is filled
/// in here.
pub async fn search<C>(
    client: &C,
    categories: &CategoryRegistry,
    request: SearchRequest<'_>,
    ctx: &StacContext<'_>,
    mut page: PageLinks,
    licenses: Option<&TtlCache<Option<License>>>,
) -> Result<Value, StacError>
where
    C: ProviderClient + ?Sized,
{
    let query = request.query;
    let limit = query.limit(ctx.settings.page_size)?;

    let category = match (request.category, query.collections.as_slice()) {
        (Some(category), _) => category,
        (None, []) => {
            let pagination = StacPagination {
                limit,
                matched: Some(0),
                ..StacPagination::default()
            };
            return Ok(build::feature_collection(ctx, Vec::new(), &pagination, &page, None));
        }
        (None, [collection]) => categories.get(collection).ok_or_else(|| {
            StacError::Unprocessable(format!("Category not found for: {collection}"))
        })?,
        (None, collections) => {
            return Err(StacError::Unprocessable(format!(
                "Search is enabled only for one collection, got {} collections",
                collections.len()
            )));
        }
    };

    let (text, mut topics, flags) = parse_query(&query.q.join(" "));
    topics.push(category.gitlab_topic.clone());

    let params = SearchParams {
        ids: query.ids.clone(),
        query: text,
        topics,
        flags,
        extent: query.extent()?,
        datetime_range: query.datetime_range()?,
        limit,
        sort: query.sort(),
        prev: request.before.clone(),
        next: request.after.clone(),
    };
    tracing::debug!(
        collection = %category.id,
        mode = ?request.mode,
        limit,
        "stac search"
    );

    let (features, pagination) = match request.mode {
        SearchMode::Reference => {
            let (projects, pagination) = client.search_references(&params).await?;
            let features = projects
                .iter()
                .map(|p| build::item_reference(ctx, p))
                .collect::<Vec<_>>();
            (features, pagination)
        }
        SearchMode::Preview => {
            let (projects, pagination) = client.search_previews(&params).await?;
            let features = projects
                .iter()
                .map(|p| build::item_preview(ctx, p))
                .collect::<Vec<_>>();
            (features, pagination)
        }
        SearchMode::Full => {
            let (mut projects, pagination) = client.search(&params).await?;
            join_all(
                projects
                    .iter_mut()
                    .map(|project| resolve_license(client, project, licenses)),
            )
            .await
            .into_iter()
            .collect::<Result<(), _>>()?;
            let features = projects
                .iter()
                .map(|p| build::item(ctx, p))
                .collect::<Vec<_>>();
            (features, pagination)
        }
    };

    page.state_query = state_query(query, request.category.is_some());
    let pagination = stac_pagination(&pagination, limit, features.len());
    Ok(build::feature_collection(
        ctx,
        features,
        &pagination,
        &page,
        Some(category),
    ))
}

fn stac_pagination(cursor: &CursorPagination, limit: usize, returned: usize) -> StacPagination {
    StacPagination {
        limit,
        matched: cursor.total,
        returned,
        prev: cursor.start.clone(),
        next: cursor.end.clone(),
    }
}

/// Fill in the license of a project that has none yet.
///
/// Upstream failures are returned; only successful lookups are cached.
pub async fn resolve_license<C>(
    client: &C,
    project: &mut Project,
    cache: Option<&TtlCache<Option<License>>>,
) -> Result<(), StacError>
where
    C: ProviderClient + ?Sized,
{
    if project.license.is_some() {
        return Ok(());
    }
    let path = project.path().to_string();
    if let Some(cached) = cache.and_then(|c| c.get(&path)) {
        project.license = cached;
        return Ok(());
    }
    let license = client.get_license(project.reference()).await?;
    if let Some(cache) = cache {
        cache.insert(path, license.clone());
    }
    project.license = license;
    Ok(())
}
