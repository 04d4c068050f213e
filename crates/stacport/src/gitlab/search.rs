//! Cursor-window search over GitLab's project connections.
//!
//! GitLab filters by free text and topics server-side, but extent, datetime
//! and the starred flag are only applied here, after retrieval. When such a
//! filter is present the upstream page size is decoupled from the requested
//! limit: pages of [`REQUEST_MAX_SIZE`] are pulled until `limit + 1`
//! survivors are accumulated (the extra one proves a further page exists) or
//! upstream runs out of pages. Cursors of the returned window are then
//! stitched from the surviving edges and the upstream page info.

use std::collections::VecDeque;

use async_trait::async_trait;

use super::convert::ReadmeMemo;
use super::filter;
use super::graphql::{DetailLevel, Direction, Edge, Page, PageRequest, REQUEST_MAX_SIZE};
use super::types::ProjectNode;
use crate::provider::{CursorPagination, FLAG_STARRED, ProviderError, SearchParams};

/// Upstream the search loop pulls pages from.
#[async_trait]
pub trait ProjectSource: Send + Sync {
    /// Fetch one page of the browse or starred connection.
    async fn fetch_page(&self, request: &PageRequest<'_>) -> Result<Page, ProviderError>;

    /// Fetch projects by full path, in request order; unknown paths are `None`.
    async fn fetch_by_paths(
        &self,
        paths: &[String],
        detail: DetailLevel,
    ) -> Result<Vec<Option<ProjectNode>>, ProviderError>;
}

/// Result of one search: the raw nodes, their pagination and the READMEs
/// parsed while filtering.
#[derive(Debug, Default)]
pub struct SearchOutcome {
    pub nodes: Vec<ProjectNode>,
    pub pagination: CursorPagination,
    pub memo: ReadmeMemo,
}

/// Run a search against `source` at the given detail level.
///
/// Any failing page aborts the whole search.
pub async fn run_search<S>(
    source: &S,
    params: &SearchParams,
    detail: DetailLevel,
) -> Result<SearchOutcome, ProviderError>
where
    S: ProjectSource + ?Sized,
{
    if !params.ids.is_empty() {
        return search_by_paths(source, params, detail).await;
    }

    let limit = params.limit;
    if limit == 0 {
        return Err(ProviderError::invalid_query("limit must be strictly positive"));
    }

    let (direction, supplied_cursor) = match (&params.prev, &params.next) {
        (Some(prev), _) => (Direction::Backward, Some(prev.clone())),
        (None, next) => (Direction::Forward, next.clone()),
    };

    let starred = params.has_flag(FLAG_STARRED);
    let local_filtering =
        params.extent.is_some() || params.datetime_range.is_some() || !params.flags.is_empty();
    let search_size = if local_filtering { limit + 1 } else { limit };
    let request_size = if local_filtering {
        REQUEST_MAX_SIZE
    } else {
        limit
    };
    // Extent and datetime filters read dates and README of every node.
    let fetch_detail = if params.extent.is_some() || params.datetime_range.is_some() {
        detail.max(DetailLevel::Preview)
    } else {
        detail
    };

    let mut memo = ReadmeMemo::default();
    let mut accumulated: VecDeque<Edge> = VecDeque::new();
    let mut paginations: Vec<CursorPagination> = Vec::new();
    let mut cursor = supplied_cursor.clone();

    loop {
        let request = PageRequest {
            query: params.query.as_deref(),
            topics: &params.topics,
            limit: request_size,
            sort: params.sort.as_ref(),
            cursor: cursor.as_deref(),
            direction,
            starred,
            detail: fetch_detail,
        };
        let page = source.fetch_page(&request).await?;

        let fetched = page.edges.len();
        let mut survivors = Vec::with_capacity(fetched);
        for edge in page.edges {
            if keep(&edge.node, params, starred, &mut memo) {
                survivors.push(edge);
            }
        }
        tracing::debug!(
            fetched,
            kept = survivors.len(),
            direction = ?direction,
            "search page filtered"
        );

        match direction {
            Direction::Forward => {
                accumulated.extend(survivors);
                cursor = page.pagination.end.clone();
            }
            Direction::Backward => {
                for edge in survivors.into_iter().rev() {
                    accumulated.push_front(edge);
                }
                cursor = page.pagination.start.clone();
            }
        }
        paginations.push(page.pagination);

        if cursor.is_none() || accumulated.len() >= search_size {
            break;
        }
    }

    let mut edges: Vec<Edge> = accumulated.into();
    let (start, end) = if edges.is_empty() {
        tracing::debug!(
            direction = ?direction,
            cursor = ?supplied_cursor,
            query = ?params.query,
            topics = ?params.topics,
            limit,
            "could not find any project"
        );
        (None, None)
    } else {
        let first_page = paginations.first();
        let last_page = paginations.last();
        match direction {
            Direction::Forward => {
                let has_more = edges.len() > limit;
                edges.truncate(limit);
                let start = first_page
                    .and_then(|p| p.start.as_ref())
                    .and(edges.first())
                    .map(|e| e.cursor.clone());
                let end = if has_more {
                    edges.last().map(|e| e.cursor.clone())
                } else {
                    last_page.and_then(|p| p.end.clone())
                };
                (start, end)
            }
            Direction::Backward => {
                let surplus = edges.len().saturating_sub(limit);
                edges = edges.split_off(surplus);
                let start = if surplus > 0 {
                    edges.first().map(|e| e.cursor.clone())
                } else {
                    last_page.and_then(|p| p.start.clone())
                };
                let end = first_page
                    .and_then(|p| p.end.as_ref())
                    .and(edges.last())
                    .map(|e| e.cursor.clone());
                (start, end)
            }
        }
    };

    let count = edges.len();
    let total = if !local_filtering {
        paginations.first().and_then(|p| p.total)
    } else if count < limit && supplied_cursor.is_none() {
        Some(count as u64)
    } else {
        None
    };

    Ok(SearchOutcome {
        nodes: edges.into_iter().map(|e| e.node).collect(),
        pagination: CursorPagination { total, start, end },
        memo,
    })
}

fn keep(node: &ProjectNode, params: &SearchParams, starred: bool, memo: &mut ReadmeMemo) -> bool {
    // The starred connection ignores topics.
    if starred && !filter::has_topics(node, &params.topics) {
        return false;
    }
    if let Some(range) = &params.datetime_range
        && !filter::overlaps_range(node, range)
    {
        return false;
    }
    if let Some(extent) = &params.extent
        && !filter::intersects_extent(node, extent, memo)
    {
        return false;
    }
    true
}

/// Direct lookup: only the topic filter applies and pagination is moot.
async fn search_by_paths<S>(
    source: &S,
    params: &SearchParams,
    detail: DetailLevel,
) -> Result<SearchOutcome, ProviderError>
where
    S: ProjectSource + ?Sized,
{
    let nodes = source
        .fetch_by_paths(&params.ids, detail)
        .await?
        .into_iter()
        .flatten()
        .filter(|node| filter::has_topics(node, &params.topics))
        .collect();

    Ok(SearchOutcome {
        nodes,
        pagination: CursorPagination {
            total: Some(params.ids.len() as u64),
            start: None,
            end: None,
        },
        memo: ReadmeMemo::default(),
    })
}
