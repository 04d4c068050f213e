//! GitLab client: REST and GraphQL calls behind [`ProviderClient`].

use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use super::convert::{ReadmeMemo, adapt_preview, adapt_project, adapt_reference, license_from_rest};
use super::error::GitLabError;
use super::graphql::{self, DetailLevel, GraphQlRequest, Page, PageRequest};
use super::proxy;
use super::search::{ProjectSource, SearchOutcome, run_search};
use super::types::{ProjectNode, RestProject, RestTopic};
use crate::category::CategoryRegistry;
use crate::http::reqwest_transport::ReqwestTransport;
use crate::http::{
    self, HttpHeaders, HttpMethod, HttpRequest, HttpResponse, HttpTransport, StreamingResponse,
};
use crate::provider::{
    self, ArchiveDownload, CursorPagination, FileDownload, ForwardedRequest, License, Project,
    ProjectPreview, ProjectReference, ProviderClient, ProviderError, SearchParams, Topic,
};

/// Page size of REST list endpoints.
const REST_PAGE_SIZE: usize = 100;

const USER_AGENT: &str = concat!("stacport/", env!("CARGO_PKG_VERSION"));

/// GitLab API client bound to one access token.
///
/// Clients are cheap to build: the transport, and with it the connection
/// pool, is shared between every client of the process.
#[derive(Clone)]
pub struct GitLabClient {
    transport: Arc<dyn HttpTransport>,
    url: String,
    rest_url: String,
    graphql_url: String,
    token: String,
    categories: Arc<CategoryRegistry>,
}

/// Validate a GitLab base URL and strip its trailing slash.
pub fn clean_url(url: &str) -> Result<String, GitLabError> {
    let parsed = Url::parse(url).map_err(|e| GitLabError::Config(format!("'{url}': {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(GitLabError::Config(format!("Not a valid URL: '{url}'")));
    }
    Ok(url.trim_end_matches('/').to_string())
}

impl GitLabClient {
    /// Create a client with its own reqwest transport.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let client = GitLabClient::new("https://gitlab.example.com", "glpat-...", categories, Duration::from_secs(30))?;
    /// let user = client.get_user().await?;
    /// ```
    pub fn new(
        url: &str,
        token: &str,
        categories: Arc<CategoryRegistry>,
        timeout: StdDuration,
    ) -> Result<Self, GitLabError> {
        let url = clean_url(url)?;
        let transport =
            ReqwestTransport::with_timeout(timeout).map_err(|e| GitLabError::Config(e.to_string()))?;
        Ok(Self::new_with_transport(
            &url,
            token,
            categories,
            Arc::new(transport),
        ))
    }

    pub fn new_with_transport(
        url: &str,
        token: &str,
        categories: Arc<CategoryRegistry>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        let url = url.trim_end_matches('/').to_string();
        Self {
            transport,
            rest_url: format!("{url}/api/v4"),
            graphql_url: format!("{url}/api/graphql"),
            url,
            token: token.to_string(),
            categories,
        }
    }

    /// Base URL of the instance.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn categories(&self) -> &CategoryRegistry {
        &self.categories
    }

    fn auth_headers(&self) -> HttpHeaders {
        vec![
            ("User-Agent".to_string(), USER_AGENT.to_string()),
            (
                "Authorization".to_string(),
                format!("Bearer {}", self.token),
            ),
        ]
    }

    fn rest_api_url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.rest_url, endpoint.trim_start_matches('/'))
    }

    /// Send a buffered request, failing on non-2xx.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, GitLabError> {
        let method = request.method;
        let url = request.url.clone();
        tracing::debug!(method = method.as_str(), url = %url, "request");

        let response = self.transport.send(request).await?;
        if !response.is_success() {
            return Err(GitLabError::Api {
                status: response.status,
                method: method.as_str().to_string(),
                url,
                body: String::from_utf8_lossy(&response.body).to_string(),
            });
        }
        Ok(response)
    }

    /// Authenticated JSON GET.
    async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<(T, HttpResponse), GitLabError> {
        let mut headers = self.auth_headers();
        headers.push(("Accept".to_string(), "application/json".to_string()));
        let response = self
            .send(HttpRequest {
                method: HttpMethod::Get,
                url: url.to_string(),
                headers,
                body: Vec::new(),
            })
            .await?;
        let value = serde_json::from_slice(&response.body)?;
        Ok((value, response))
    }

    /// Post a GraphQL document and return its `data`.
    async fn graphql(&self, request: &GraphQlRequest) -> Result<Value, GitLabError> {
        let mut headers = self.auth_headers();
        headers.push(("Content-Type".to_string(), "application/json".to_string()));
        headers.push(("Accept".to_string(), "application/json".to_string()));
        tracing::debug!(variables = %request.variables, "graphql");

        let response = self
            .send(HttpRequest {
                method: HttpMethod::Post,
                url: self.graphql_url.clone(),
                headers,
                body: request.body().to_string().into_bytes(),
            })
            .await?;
        let body: Value = serde_json::from_slice(&response.body)?;
        graphql::response_data(body)
    }

    /// Walk a keyset-paginated REST list, following `Link: rel="next"` while
    /// pages come back full.
    async fn rest_iterate<T: DeserializeOwned>(&self, url: &str) -> Result<Vec<T>, GitLabError> {
        tracing::debug!(url = %url, "request iterate");
        let params = [
            ("per_page", REST_PAGE_SIZE.to_string()),
            ("pagination", "keyset".to_string()),
            ("order_by", "id".to_string()),
            ("sort", "asc".to_string()),
        ]
        .map(|(k, v)| (k.to_string(), v));

        let mut items = Vec::new();
        let mut next = Some(http::url_add_query_params(url, &params));
        while let Some(page_url) = next.take() {
            let (content, response): (Value, _) = self.get(&page_url).await?;
            let Value::Array(page) = content else {
                return Err(GitLabError::shape(
                    "Unexpected: requested API do not return a list",
                ));
            };
            let full = page.len() == REST_PAGE_SIZE;
            items.extend(
                page.into_iter()
                    .map(serde_json::from_value::<T>)
                    .collect::<Result<Vec<_>, _>>()?,
            );
            if full {
                next = response.header("link").and_then(proxy::next_link);
            }
        }
        Ok(items)
    }

    async fn get_project_rest(&self, path_or_id: &str) -> Result<RestProject, GitLabError> {
        let id = http::urlsafe_path(path_or_id.trim_matches('/'));
        let url = self.rest_api_url(&format!("/projects/{id}?license=true"));
        let (project, _) = self.get(&url).await?;
        Ok(project)
    }

    /// Stream a REST response back, rewriting its headers for the caller.
    async fn request_streaming(
        &self,
        url: &str,
        request: ForwardedRequest,
        filename: Option<&str>,
        cache: Option<u32>,
    ) -> Result<StreamingResponse, GitLabError> {
        let url = http::url_add_query_params(url, &proxy::forward_query(&request.query));
        let mut headers = self.auth_headers();
        headers.extend(proxy::forward_headers(&request.headers));
        let method = request.method;
        tracing::debug!(method = method.as_str(), url = %url, "streaming request");

        let response = self
            .transport
            .send_streaming(HttpRequest {
                method,
                url: url.clone(),
                headers,
                body: request.body,
            })
            .await?;

        if !response.is_success() {
            let status = response.status;
            return Err(GitLabError::Api {
                status,
                method: method.as_str().to_string(),
                url,
                body: response.read_to_string().await,
            });
        }

        Ok(StreamingResponse {
            status: response.status,
            headers: proxy::response_headers(response.headers, filename, cache),
            body: response.body,
        })
    }

    async fn search_nodes(
        &self,
        params: &SearchParams,
        detail: DetailLevel,
    ) -> provider::Result<SearchOutcome> {
        run_search(self, params, detail).await
    }
}

#[async_trait]
impl ProjectSource for GitLabClient {
    async fn fetch_page(&self, request: &PageRequest<'_>) -> Result<Page, ProviderError> {
        let gql = graphql::page_query(request);
        let data = self.graphql(&gql).await?;
        Ok(graphql::parse_page(&data, request.starred)?)
    }

    async fn fetch_by_paths(
        &self,
        paths: &[String],
        detail: DetailLevel,
    ) -> Result<Vec<Option<ProjectNode>>, ProviderError> {
        let gql = graphql::projects_by_paths_query(paths, detail);
        let data = self.graphql(&gql).await?;
        Ok(graphql::parse_projects_by_paths(&data, paths.len())?)
    }
}

#[async_trait]
impl ProviderClient for GitLabClient {
    async fn get_user(&self) -> provider::Result<String> {
        let data = self.graphql(&graphql::current_user_query()).await?;
        data.get("currentUser")
            .and_then(|user| user.get("username"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ProviderError::unexpected_shape("Unexpected response from GitLab"))
    }

    async fn get_topics(&self) -> provider::Result<Vec<Topic>> {
        let topics: Vec<RestTopic> = self.rest_iterate(&self.rest_api_url("/topics")).await?;
        Ok(topics
            .into_iter()
            .map(|t| Topic {
                title: t.title.unwrap_or_else(|| t.name.clone()),
                name: t.name,
                total_projects_count: t.total_projects_count,
            })
            .collect())
    }

    async fn get_project_path(&self, id: u64) -> provider::Result<String> {
        match self.get_project_rest(&id.to_string()).await {
            Ok(project) => Ok(project.path_with_namespace),
            Err(GitLabError::Api { status: 404, .. }) => Err(ProviderError::not_found("Not Found")),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_project(&self, path: &str) -> provider::Result<Project> {
        let path = path.trim_matches('/');
        let data = self
            .graphql(&graphql::project_query(path, DetailLevel::Full))
            .await?;
        let node = graphql::parse_project(&data)?.ok_or_else(|| ProviderError::not_found("Not Found"))?;
        let mut memo = ReadmeMemo::default();
        adapt_project(&node, &self.categories, &mut memo)
    }

    async fn get_license(&self, project: &ProjectReference) -> provider::Result<Option<License>> {
        let rest = self.get_project_rest(&project.path).await?;
        Ok(license_from_rest(&rest))
    }

    async fn search_references(
        &self,
        params: &SearchParams,
    ) -> provider::Result<(Vec<ProjectReference>, CursorPagination)> {
        let outcome = self.search_nodes(params, DetailLevel::Reference).await?;
        let projects = outcome
            .nodes
            .iter()
            .map(|node| adapt_reference(node, &self.categories))
            .collect::<provider::Result<Vec<_>>>()?;
        Ok((projects, outcome.pagination))
    }

    async fn search_previews(
        &self,
        params: &SearchParams,
    ) -> provider::Result<(Vec<ProjectPreview>, CursorPagination)> {
        let SearchOutcome {
            nodes,
            pagination,
            mut memo,
        } = self.search_nodes(params, DetailLevel::Preview).await?;
        let projects = nodes
            .iter()
            .map(|node| adapt_preview(node, &self.categories, &mut memo))
            .collect::<provider::Result<Vec<_>>>()?;
        Ok((projects, pagination))
    }

    async fn search(&self, params: &SearchParams) -> provider::Result<(Vec<Project>, CursorPagination)> {
        let SearchOutcome {
            nodes,
            pagination,
            mut memo,
        } = self.search_nodes(params, DetailLevel::Full).await?;
        let projects = nodes
            .iter()
            .map(|node| adapt_project(node, &self.categories, &mut memo))
            .collect::<provider::Result<Vec<_>>>()?;
        Ok((projects, pagination))
    }

    async fn download_file(
        &self,
        download: &FileDownload,
        request: ForwardedRequest,
    ) -> provider::Result<StreamingResponse> {
        let path = http::urlsafe_path(download.project_path.trim_matches('/'));
        let file = http::urlsafe_path(&download.file_path);
        let url = http::url_add_query_params(
            &self.rest_api_url(&format!("/projects/{path}/repository/files/{file}/raw")),
            &[
                ("ref".to_string(), download.git_ref.clone()),
                ("lfs".to_string(), "true".to_string()),
            ],
        );
        let filename = download
            .file_path
            .rsplit('/')
            .next()
            .unwrap_or(&download.file_path);
        Ok(self
            .request_streaming(&url, request, Some(filename), download.cache)
            .await?)
    }

    async fn download_archive(
        &self,
        download: &ArchiveDownload,
        request: ForwardedRequest,
    ) -> provider::Result<StreamingResponse> {
        let path = http::urlsafe_path(download.project_path.trim_matches('/'));
        let url = http::url_add_query_params(
            &self.rest_api_url(&format!(
                "/projects/{path}/repository/archive.{}",
                download.format
            )),
            &[("sha".to_string(), download.git_ref.clone())],
        );
        Ok(self.request_streaming(&url, request, None, None).await?)
    }

    async fn rest_proxy(
        &self,
        endpoint: &str,
        request: ForwardedRequest,
    ) -> provider::Result<StreamingResponse> {
        let url = self.rest_api_url(endpoint);
        Ok(self.request_streaming(&url, request, None, None).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::tests::registry;
    use crate::http::MockTransport;
    use serde_json::json;

    const GITLAB: &str = "https://gitlab.example.com";
    const GRAPHQL: &str = "https://gitlab.example.com/api/graphql";

    fn client(transport: &MockTransport) -> GitLabClient {
        GitLabClient::new_with_transport(
            "https://gitlab.example.com/",
            "glpat-test",
            Arc::new(registry()),
            Arc::new(transport.clone()),
        )
    }

    fn project_node(id: u64) -> Value {
        json!({
            "id": format!("gid://gitlab/Project/{id}"),
            "name": format!("Dataset {id}"),
            "fullPath": format!("space/dataset-{id}"),
            "topics": ["sharinghub:dataset"]
        })
    }

    fn search_response(ids: &[u64], has_next: bool, count: u64) -> Value {
        let edges: Vec<Value> = ids
            .iter()
            .map(|id| json!({"cursor": format!("c{id}"), "node": project_node(*id)}))
            .collect();
        json!({"data": {"search": {
            "edges": edges,
            "pageInfo": {
                "hasPreviousPage": false,
                "hasNextPage": has_next,
                "startCursor": ids.first().map(|id| format!("c{id}")),
                "endCursor": ids.last().map(|id| format!("c{id}"))
            },
            "count": count
        }}})
    }

    fn request_body(transport: &MockTransport, index: usize) -> Value {
        let requests = transport.requests();
        serde_json::from_slice(&requests[index].body).expect("json body")
    }

    // ─── Construction ─────────────────────────────────────────────────────

    #[test]
    fn test_client_urls() {
        let transport = MockTransport::new();
        let client = client(&transport);
        assert_eq!(client.url(), GITLAB);
        assert_eq!(client.rest_api_url("/topics"), "https://gitlab.example.com/api/v4/topics");
        assert_eq!(client.graphql_url, GRAPHQL);
    }

    #[test]
    fn test_clean_url() {
        assert_eq!(
            clean_url("https://gitlab.example.com/").expect("valid"),
            "https://gitlab.example.com"
        );
        assert!(clean_url("ftp://gitlab.example.com").is_err());
        assert!(clean_url("gitlab.example.com").is_err());
    }

    // ─── GraphQL ──────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_get_user() {
        let transport = MockTransport::new();
        transport.push_json(
            HttpMethod::Post,
            GRAPHQL,
            json!({"data": {"currentUser": {"username": "alice"}}}),
        );
        let user = client(&transport).get_user().await.expect("user");
        assert_eq!(user, "alice");

        let requests = transport.requests();
        assert!(
            requests[0]
                .headers
                .contains(&("Authorization".to_string(), "Bearer glpat-test".to_string()))
        );
    }

    #[tokio::test]
    async fn test_search_references_sends_browse_query() {
        let transport = MockTransport::new();
        transport.push_json(HttpMethod::Post, GRAPHQL, search_response(&[1, 2], true, 5));

        let mut params = SearchParams::new(2);
        params.topics = vec!["sharinghub:dataset".to_string()];
        let (projects, pagination) = client(&transport)
            .search_references(&params)
            .await
            .expect("search");

        assert_eq!(projects.len(), 2);
        assert_eq!(projects[0].category.id, "dataset");
        assert_eq!(pagination.total, Some(5));
        assert_eq!(pagination.end.as_deref(), Some("c2"));

        let body = request_body(&transport, 0);
        assert_eq!(body["variables"]["limit"], 2);
        assert_eq!(body["variables"]["sortby"], "id_asc");
        assert_eq!(body["variables"]["topics"], json!(["sharinghub:dataset"]));
    }

    #[tokio::test]
    async fn test_search_unknown_category_fails() {
        let transport = MockTransport::new();
        let mut response = search_response(&[1], false, 1);
        response["data"]["search"]["edges"][0]["node"]["topics"] = json!(["eo"]);
        transport.push_json(HttpMethod::Post, GRAPHQL, response);

        let err = client(&transport)
            .search_references(&SearchParams::new(2))
            .await
            .expect_err("no category");
        assert!(matches!(err, ProviderError::CategoryResolution { .. }));
    }

    #[tokio::test]
    async fn test_search_non_list_edges_is_unexpected_shape() {
        let transport = MockTransport::new();
        transport.push_json(
            HttpMethod::Post,
            GRAPHQL,
            json!({"data": {"search": {"edges": {}, "pageInfo": {}, "count": 0}}}),
        );
        let err = client(&transport)
            .search_references(&SearchParams::new(2))
            .await
            .expect_err("bad shape");
        assert_eq!(err.status_code(), 422);
    }

    #[tokio::test]
    async fn test_get_project_not_found() {
        let transport = MockTransport::new();
        transport.push_json(HttpMethod::Post, GRAPHQL, json!({"data": {"project": null}}));
        let err = client(&transport)
            .get_project("/space/missing/")
            .await
            .expect_err("missing");
        assert_eq!(err.status_code(), 404);

        let body = request_body(&transport, 0);
        assert!(
            body["query"]
                .as_str()
                .is_some_and(|q| q.contains("project(fullPath: \"space/missing\")"))
        );
    }

    #[tokio::test]
    async fn test_graphql_http_error_is_upstream() {
        let transport = MockTransport::new();
        transport.push_response(
            HttpMethod::Post,
            GRAPHQL,
            HttpResponse {
                status: 401,
                headers: Vec::new(),
                body: b"{\"message\":\"401 Unauthorized\"}".to_vec(),
            },
        );
        let err = client(&transport).get_user().await.expect_err("401");
        match err {
            ProviderError::Upstream { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(
                    message,
                    "HTTP 401 | POST https://gitlab.example.com/api/graphql: {\"message\":\"401 Unauthorized\"}"
                );
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    // ─── REST ─────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_get_license_maps_spdx() {
        let transport = MockTransport::new();
        transport.push_json(
            HttpMethod::Get,
            "https://gitlab.example.com/api/v4/projects/space%2Fdataset-1?license=true",
            json!({
                "id": 1,
                "path_with_namespace": "space/dataset-1",
                "license_url": "https://gitlab.example.com/space/dataset-1/-/blob/main/LICENSE",
                "license": {"key": "apache-2.0", "name": "Apache License 2.0"}
            }),
        );
        let reference = ProjectReference {
            id: 1,
            name: "Dataset 1".to_string(),
            path: "space/dataset-1".to_string(),
            topics: vec!["sharinghub:dataset".to_string()],
            category: crate::category::tests::category("dataset", "sharinghub:dataset"),
        };
        let license = client(&transport)
            .get_license(&reference)
            .await
            .expect("license")
            .expect("some license");
        assert_eq!(license.id, "Apache-2.0");
    }

    #[tokio::test]
    async fn test_get_project_path_not_found() {
        let transport = MockTransport::new();
        transport.push_response(
            HttpMethod::Get,
            "https://gitlab.example.com/api/v4/projects/99?license=true",
            HttpResponse {
                status: 404,
                headers: Vec::new(),
                body: b"{\"message\":\"404 Project Not Found\"}".to_vec(),
            },
        );
        let err = client(&transport)
            .get_project_path(99)
            .await
            .expect_err("not found");
        match err {
            ProviderError::NotFound { resource } => assert_eq!(resource, "Not Found"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_get_topics_follows_next_link_while_pages_are_full() {
        let transport = MockTransport::new();
        let first_url = "https://gitlab.example.com/api/v4/topics?per_page=100&pagination=keyset&order_by=id&sort=asc";
        let next_url = "https://gitlab.example.com/api/v4/topics?id_after=100&per_page=100";
        let full_page: Vec<Value> = (0..100)
            .map(|i| json!({"name": format!("topic-{i}"), "total_projects_count": 1}))
            .collect();
        transport.push_response(
            HttpMethod::Get,
            first_url,
            HttpResponse {
                status: 200,
                headers: vec![("Link".to_string(), format!("<{next_url}>; rel=\"next\""))],
                body: Value::Array(full_page).to_string().into_bytes(),
            },
        );
        transport.push_json(
            HttpMethod::Get,
            next_url,
            json!([{"name": "last", "title": "Last", "total_projects_count": 3}]),
        );

        let topics = client(&transport).get_topics().await.expect("topics");
        assert_eq!(topics.len(), 101);
        assert_eq!(topics[0].title, "topic-0");
        assert_eq!(topics[100].title, "Last");
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_get_topics_rejects_non_list() {
        let transport = MockTransport::new();
        transport.push_json(
            HttpMethod::Get,
            "https://gitlab.example.com/api/v4/topics?per_page=100&pagination=keyset&order_by=id&sort=asc",
            json!({"message": "nope"}),
        );
        let err = client(&transport).get_topics().await.expect_err("not a list");
        assert_eq!(err.status_code(), 422);
    }

    // ─── Streaming ────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_download_file_rewrites_headers_and_filters_request() {
        let transport = MockTransport::new();
        let url = "https://gitlab.example.com/api/v4/projects/space%2Fdataset-1/repository/files/data%2Fimage.tif/raw?ref=main&lfs=true";
        transport.push_response(
            HttpMethod::Get,
            url,
            HttpResponse {
                status: 200,
                headers: vec![
                    ("Content-Type".to_string(), "image/tiff".to_string()),
                    ("Content-Encoding".to_string(), "gzip".to_string()),
                    (
                        "Content-Disposition".to_string(),
                        "inline; filename=\"blob\"".to_string(),
                    ),
                ],
                body: b"tiff".to_vec(),
            },
        );

        let request = ForwardedRequest {
            method: HttpMethod::Get,
            query: vec![("gitlab_token".to_string(), "secret".to_string())],
            headers: vec![
                ("cookie".to_string(), "session=1".to_string()),
                ("x-gitlab-token".to_string(), "secret".to_string()),
                ("range".to_string(), "bytes=0-3".to_string()),
            ],
            body: Vec::new(),
        };
        let download = FileDownload {
            project_path: "space/dataset-1".to_string(),
            file_path: "data/image.tif".to_string(),
            git_ref: "main".to_string(),
            cache: Some(300),
        };
        let response = client(&transport)
            .download_file(&download, request)
            .await
            .expect("download");

        assert_eq!(response.header("content-encoding"), None);
        assert_eq!(
            response.header("content-disposition"),
            Some("inline; filename=\"image.tif\"")
        );
        assert_eq!(response.header("cache-control"), Some("private, max-age=300"));
        assert_eq!(response.read_to_string().await, "tiff");

        let sent = &transport.requests()[0];
        assert_eq!(sent.url, url);
        assert!(sent.headers.iter().all(|(k, _)| k != "cookie" && k != "x-gitlab-token"));
        assert!(sent.headers.contains(&("range".to_string(), "bytes=0-3".to_string())));
    }

    #[tokio::test]
    async fn test_download_archive_error_carries_status() {
        let transport = MockTransport::new();
        transport.push_response(
            HttpMethod::Get,
            "https://gitlab.example.com/api/v4/projects/space%2Fdataset-1/repository/archive.zip?sha=v1",
            HttpResponse {
                status: 404,
                headers: Vec::new(),
                body: b"missing".to_vec(),
            },
        );
        let download = ArchiveDownload {
            project_path: "space/dataset-1".to_string(),
            git_ref: "v1".to_string(),
            format: "zip".to_string(),
        };
        let err = client(&transport)
            .download_archive(&download, ForwardedRequest::get())
            .await
            .expect_err("missing archive");
        assert_eq!(err.status_code(), 404);
        assert!(err.to_string().contains("HTTP 404 | GET"));
    }
}
