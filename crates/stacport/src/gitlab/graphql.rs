//! GraphQL query construction and response parsing.
//!
//! Three query shapes share one `projectFields` fragment whose selection
//! depends on the requested [`DetailLevel`]: a by-path lookup with aliased
//! sub-queries, a plain browse over `projects`, and a browse over the current
//! user's starred projects.

use serde_json::{Map, Value, json};

use super::error::GitLabError;
use super::types::{PageInfo, ProjectNode};
use crate::provider::{CursorPagination, Sort, SortDirection};

/// Largest page GitLab serves on connection fields.
pub const REQUEST_MAX_SIZE: usize = 100;

/// Sort fields understood by the `projects` connection.
pub const SORTS: [&str; 5] = ["id", "name", "created", "updated", "stars"];

/// Field used when none is requested or the requested one is unknown.
pub const DEFAULT_SORT_FIELD: &str = "id";

/// STAC-facing sort names and the GitLab field they stand for.
pub const SORT_ALIASES: [(&str, &str); 4] = [
    ("title", "name"),
    ("datetime", "updated"),
    ("start_datetime", "created"),
    ("end_datetime", "updated"),
];

const REFERENCE_FRAGMENT: &str = r#"
fragment projectFields on Project {
  id
  name
  fullPath
  topics
}
"#;

const PREVIEW_FRAGMENT: &str = r#"
fragment projectFields on Project {
  id
  name
  fullPath
  description
  createdAt
  lastActivityAt
  starCount
  topics
  repository {
    rootRef
    readme: blobs(paths: ["README.md", "readme.md"]) {
      nodes {
        rawBlob
      }
    }
    preview: blobs(paths: ["preview.png", "preview.jpg", "preview.jpeg"]) {
      nodes {
        path
      }
    }
  }
}
"#;

const FULL_FRAGMENT: &str = r#"
fragment projectFields on Project {
  id
  name
  nameWithNamespace
  fullPath
  description
  webUrl
  createdAt
  lastActivityAt
  starCount
  topics
  maxAccessLevel {
    integerValue
  }
  repository {
    rootRef
    readme: blobs(paths: ["README.md", "readme.md"]) {
      nodes {
        rawBlob
      }
    }
    preview: blobs(paths: ["preview.png", "preview.jpg", "preview.jpeg"]) {
      nodes {
        path
      }
    }
    tree(path: "/", recursive: true) {
      lastCommit {
        shortId
      }
      blobs {
        nodes {
          path
        }
      }
    }
  }
  releases(first: 1) {
    nodes {
      name
      tagName
      description
      commit {
        sha
      }
    }
  }
}
"#;

const CONNECTION_SELECTION: &str = r#"{
    edges {
      cursor
      node {
        ...projectFields
      }
    }
    pageInfo {
      hasPreviousPage
      hasNextPage
      startCursor
      endCursor
    }
    count
  }"#;

/// Amount of project data selected by a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DetailLevel {
    Reference,
    Preview,
    Full,
}

impl DetailLevel {
    #[must_use]
    pub fn fragment(self) -> &'static str {
        match self {
            DetailLevel::Reference => REFERENCE_FRAGMENT,
            DetailLevel::Preview => PREVIEW_FRAGMENT,
            DetailLevel::Full => FULL_FRAGMENT,
        }
    }
}

/// Walking direction over a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// `first` / `after`.
    Forward,
    /// `last` / `before`.
    Backward,
}

impl Direction {
    /// Names of the size and cursor arguments for this direction.
    #[must_use]
    pub fn cursor_params(self) -> (&'static str, &'static str) {
        match self {
            Direction::Forward => ("first", "after"),
            Direction::Backward => ("last", "before"),
        }
    }
}

/// One upstream page request issued by the search loop.
#[derive(Debug, Clone)]
pub struct PageRequest<'a> {
    pub query: Option<&'a str>,
    pub topics: &'a [String],
    pub limit: usize,
    pub sort: Option<&'a Sort>,
    pub cursor: Option<&'a str>,
    pub direction: Direction,
    pub starred: bool,
    pub detail: DetailLevel,
}

/// A project node and the cursor pointing at it.
#[derive(Debug, Clone)]
pub struct Edge {
    pub cursor: String,
    pub node: ProjectNode,
}

/// One parsed upstream page.
#[derive(Debug, Clone)]
pub struct Page {
    pub edges: Vec<Edge>,
    pub pagination: CursorPagination,
}

/// A query document with its variables, ready to be posted.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphQlRequest {
    pub query: String,
    pub variables: Value,
}

impl GraphQlRequest {
    #[must_use]
    pub fn body(&self) -> Value {
        json!({ "query": self.query, "variables": self.variables })
    }
}

/// GitLab sort argument, e.g. `updated_desc`.
#[must_use]
pub fn graphql_sort(sort: Option<&Sort>) -> String {
    let Some(sort) = sort else {
        return format!("{DEFAULT_SORT_FIELD}_{}", SortDirection::Asc.as_str());
    };
    let field = if SORTS.contains(&sort.field.as_str()) {
        sort.field.as_str()
    } else {
        SORT_ALIASES
            .iter()
            .find(|(alias, _)| *alias == sort.field)
            .map_or(DEFAULT_SORT_FIELD, |(_, field)| *field)
    };
    format!("{field}_{}", sort.direction.as_str())
}

/// Quoted GraphQL string literal.
fn literal(value: &str) -> String {
    Value::String(value.to_string()).to_string()
}

pub fn current_user_query() -> GraphQlRequest {
    GraphQlRequest {
        query: "query {\n  currentUser {\n    username\n  }\n}".to_string(),
        variables: Value::Null,
    }
}

pub fn project_query(path: &str, detail: DetailLevel) -> GraphQlRequest {
    let query = format!(
        "query getProject {{\n  project(fullPath: {}) {{\n    ...projectFields\n  }}\n}}\n{}",
        literal(path),
        detail.fragment()
    );
    GraphQlRequest {
        query,
        variables: Value::Null,
    }
}

/// One aliased `projectN` sub-query per path.
pub fn projects_by_paths_query(paths: &[String], detail: DetailLevel) -> GraphQlRequest {
    let selections = paths
        .iter()
        .enumerate()
        .map(|(i, path)| {
            format!(
                "  project{i}: project(fullPath: {}) {{ ...projectFields }}",
                literal(path)
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    GraphQlRequest {
        query: format!(
            "query getProjectsByIds {{\n{selections}\n}}\n{}",
            detail.fragment()
        ),
        variables: Value::Null,
    }
}

/// `searchProjects` or `searchStarredProjects` for one page.
///
/// The starred connection takes neither a sort nor topics; topics are
/// filtered by the caller.
pub fn page_query(request: &PageRequest<'_>) -> GraphQlRequest {
    let (limit_param, cursor_param) = request.direction.cursor_params();

    // (variable, type, argument)
    let mut params: Vec<(&str, &str, &str)> = vec![("limit", "Int", limit_param)];
    let mut variables = Map::new();
    variables.insert("limit".to_string(), json!(request.limit));

    if !request.starred {
        params.push(("sortby", "String", "sort"));
        variables.insert("sortby".to_string(), json!(graphql_sort(request.sort)));
    }
    params.push(("cursor", "String", cursor_param));
    variables.insert("cursor".to_string(), json!(request.cursor));

    if let Some(query) = request.query.filter(|q| !q.is_empty()) {
        params.push(("search", "String!", "search"));
        variables.insert("search".to_string(), json!(query));
    }
    if !request.starred && !request.topics.is_empty() {
        params.push(("topics", "[String!]", "topics"));
        variables.insert("topics".to_string(), json!(request.topics));
    }

    let definitions = params
        .iter()
        .map(|(var, ty, _)| format!("${var}: {ty}"))
        .collect::<Vec<_>>()
        .join(", ");
    let arguments = params
        .iter()
        .map(|(var, _, arg)| format!("{arg}: ${var}"))
        .collect::<Vec<_>>()
        .join(", ");

    let query = if request.starred {
        format!(
            "query searchStarredProjects({definitions}) {{\n  currentUser {{\n    starredProjects({arguments}) {CONNECTION_SELECTION}\n  }}\n}}\n{}",
            request.detail.fragment()
        )
    } else {
        format!(
            "query searchProjects({definitions}) {{\n  search: projects({arguments}) {CONNECTION_SELECTION}\n}}\n{}",
            request.detail.fragment()
        )
    };

    GraphQlRequest {
        query,
        variables: Value::Object(variables),
    }
}

/// Extract `data` from a GraphQL response, surfacing `errors` when it is null.
pub fn response_data(response: Value) -> Result<Value, GitLabError> {
    let Value::Object(mut response) = response else {
        return Err(GitLabError::shape("Unexpected response from GitLab"));
    };
    match response.remove("data") {
        Some(data @ Value::Object(_)) => Ok(data),
        _ => {
            let messages = response
                .get("errors")
                .and_then(Value::as_array)
                .map(|errors| {
                    errors
                        .iter()
                        .filter_map(|e| e.get("message").and_then(Value::as_str))
                        .collect::<Vec<_>>()
                        .join("; ")
                })
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| "response has no data".to_string());
            Err(GitLabError::GraphQl(messages))
        }
    }
}

/// Parse the connection of a `searchProjects`/`searchStarredProjects` answer.
pub fn parse_page(data: &Value, starred: bool) -> Result<Page, GitLabError> {
    let connection = if starred {
        data.get("currentUser")
            .and_then(|user| user.get("starredProjects"))
    } else {
        data.get("search")
    };
    let connection = connection
        .and_then(Value::as_object)
        .ok_or_else(|| GitLabError::shape("Unexpected response from GitLab: no project connection"))?;

    let edges = connection
        .get("edges")
        .and_then(Value::as_array)
        .ok_or_else(|| GitLabError::shape("Unexpected: requested API do not return a list"))?;

    let page_info: PageInfo = connection
        .get("pageInfo")
        .cloned()
        .ok_or_else(|| GitLabError::pagination("pageInfo missing from GitLab response"))
        .and_then(|v| {
            serde_json::from_value(v)
                .map_err(|e| GitLabError::pagination(format!("invalid pageInfo: {e}")))
        })?;
    let total = connection
        .get("count")
        .and_then(Value::as_u64)
        .ok_or_else(|| GitLabError::pagination("count missing from GitLab response"))?;

    let start = match (page_info.has_previous_page, page_info.start_cursor) {
        (true, Some(cursor)) => Some(cursor),
        (true, None) => {
            return Err(GitLabError::pagination(
                "hasPreviousPage without startCursor",
            ));
        }
        (false, _) => None,
    };
    let end = match (page_info.has_next_page, page_info.end_cursor) {
        (true, Some(cursor)) => Some(cursor),
        (true, None) => {
            return Err(GitLabError::pagination("hasNextPage without endCursor"));
        }
        (false, _) => None,
    };

    let edges = edges
        .iter()
        .map(|edge| {
            let cursor = edge
                .get("cursor")
                .and_then(Value::as_str)
                .ok_or_else(|| GitLabError::shape("edge without cursor"))?
                .to_string();
            let node = edge
                .get("node")
                .cloned()
                .ok_or_else(|| GitLabError::shape("edge without node"))?;
            let node: ProjectNode = serde_json::from_value(node)
                .map_err(|e| GitLabError::shape(format!("invalid project node: {e}")))?;
            Ok(Edge { cursor, node })
        })
        .collect::<Result<Vec<_>, GitLabError>>()?;

    Ok(Page {
        edges,
        pagination: CursorPagination {
            total: Some(total),
            start,
            end,
        },
    })
}

/// Parse a `getProjectsByIds` answer, keeping request order. Unknown paths
/// come back as `None`.
pub fn parse_projects_by_paths(
    data: &Value,
    count: usize,
) -> Result<Vec<Option<ProjectNode>>, GitLabError> {
    (0..count)
        .map(|i| match data.get(format!("project{i}")) {
            None | Some(Value::Null) => Ok(None),
            Some(node) => serde_json::from_value(node.clone())
                .map(Some)
                .map_err(|e| GitLabError::shape(format!("invalid project node: {e}"))),
        })
        .collect()
}

/// Parse a `getProject` answer.
pub fn parse_project(data: &Value) -> Result<Option<ProjectNode>, GitLabError> {
    match data.get("project") {
        None | Some(Value::Null) => Ok(None),
        Some(node) => serde_json::from_value(node.clone())
            .map(Some)
            .map_err(|e| GitLabError::shape(format!("invalid project node: {e}"))),
    }
}
