//! Client-side filters applied to upstream pages.

use geo::Geometry;

use super::convert::ReadmeMemo;
use super::types::ProjectNode;
use crate::provider::DatetimeRange;
use crate::spatial;

/// Whether the project carries every requested topic.
#[must_use]
pub fn has_topics(node: &ProjectNode, topics: &[String]) -> bool {
    topics.iter().all(|topic| node.topics.contains(topic))
}

/// Whether the project's lifetime overlaps `range`, bounds included.
///
/// Matches when creation or last activity falls in the range, or when the
/// project's lifetime spans the whole range. Projects without dates never
/// match.
#[must_use]
pub fn overlaps_range(node: &ProjectNode, range: &DatetimeRange) -> bool {
    let (Some(created), Some(updated)) = (node.created_at, node.last_activity_at) else {
        return false;
    };
    let in_range = |t| range.start <= t && t <= range.end;
    in_range(created)
        || in_range(updated)
        || (created <= range.start && range.start <= range.end && range.end <= updated)
}

/// Whether the project's declared extent intersects `extent`. Projects
/// without an extent never match.
pub fn intersects_extent(
    node: &ProjectNode,
    extent: &Geometry<f64>,
    memo: &mut ReadmeMemo,
) -> bool {
    memo.get(node)
        .extent
        .as_ref()
        .is_some_and(|project_extent| spatial::intersects(extent, project_extent))
}
