//! Artifactory REST client
//!
//! Implements the engine's `Transport` and `SearchService` seams over
//! reqwest: streamed GET for downloads, streamed PUT deploys with checksum
//! headers, the storage API for existence probes and folder listings, and
//! AQL for paginated search. One client holds one connection pool, shared
//! read-only across all workers.

use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use reqwest::StatusCode;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use serde::Deserialize;

use artx_core::{
    ByteStream, Checksums, Error, FileQuery, RemoteEntry, RemoteLocation, RemoteObject, Result,
    SearchPage, SearchService, Transport,
};

use crate::aql;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Authentication scheme for one endpoint
#[derive(Debug, Clone)]
enum Auth {
    /// `Authorization: Bearer <token>`
    Bearer(String),
    /// Legacy `X-JFrog-Art-Api` header
    ApiKey(String),
    Anonymous,
}

impl Auth {
    fn apply(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self {
            Self::Bearer(token) => request.bearer_auth(token),
            Self::ApiKey(key) => request.header("X-JFrog-Art-Api", key),
            Self::Anonymous => request,
        }
    }
}

/// Builder for [`ArtifactoryClient`]
#[derive(Debug)]
pub struct ArtifactoryClientBuilder {
    base_url: String,
    token: Option<String>,
    api_key: Option<String>,
    timeout: Duration,
}

impl ArtifactoryClientBuilder {
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Timeout per network read, not per transfer unit, so large artifacts
    /// are not penalized by a single deadline
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> Result<ArtifactoryClient> {
        let base = self.base_url.trim_end_matches('/').to_string();
        url::Url::parse(&base).map_err(|e| Error::Config(format!("endpoint {base}: {e}")))?;

        let auth = match (self.token, self.api_key) {
            (Some(token), _) => Auth::Bearer(token),
            (None, Some(key)) => Auth::ApiKey(key),
            (None, None) => Auth::Anonymous,
        };

        let http = reqwest::Client::builder()
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .read_timeout(self.timeout)
            .build()
            .map_err(|e| Error::Config(format!("http client: {e}")))?;

        Ok(ArtifactoryClient { http, base, auth })
    }
}

/// One authenticated Artifactory endpoint
#[derive(Debug, Clone)]
pub struct ArtifactoryClient {
    http: reqwest::Client,
    /// Scheme, host and context root without a trailing slash
    base: String,
    auth: Auth,
}

impl ArtifactoryClient {
    /// Start building a client for a base URL such as
    /// `https://host/artifactory`
    pub fn builder(base_url: impl Into<String>) -> ArtifactoryClientBuilder {
        ArtifactoryClientBuilder {
            base_url: base_url.into(),
            token: None,
            api_key: None,
            timeout: Duration::from_secs(30 * 60),
        }
    }

    fn object_url(&self, location: &RemoteLocation) -> String {
        format!(
            "{}/{}/{}",
            self.base,
            location.repo,
            encode_path(&location.path)
        )
    }

    fn storage_url(&self, repo: &str, path: &str) -> String {
        format!("{}/api/storage/{repo}/{}", self.base, encode_path(path))
    }

    async fn send(&self, request: reqwest::RequestBuilder, context: &str) -> Result<reqwest::Response> {
        let response = self
            .auth
            .apply(request)
            .send()
            .await
            .map_err(|e| request_error(&e, context))?;

        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            Err(status_error(status, context))
        }
    }
}

/// Per-segment percent-encoding, keeping the separators
fn encode_path(path: &str) -> String {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(|s| urlencoding::encode(s).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Classify an HTTP status: auth and not-found get their own kinds, 408/429
/// and 5xx are retriable transport failures, remaining 4xx are terminal
fn status_error(status: StatusCode, context: &str) -> Error {
    match status.as_u16() {
        401 | 403 => Error::Auth(format!("{context}: {status}")),
        404 => Error::NotFound(context.to_string()),
        408 | 429 => Error::transport(format!("{context}: {status}")),
        code if code >= 500 => Error::transport(format!("{context}: {status}")),
        _ => Error::transport_terminal(format!("{context}: {status}")),
    }
}

/// A 400 from the AQL endpoint means the query itself was malformed, which
/// is a planning failure rather than a transport one
fn aql_status_error(status: StatusCode, context: &str) -> Error {
    if status == StatusCode::BAD_REQUEST {
        Error::Query(format!("{context}: {status}"))
    } else {
        status_error(status, context)
    }
}

/// Classify a connection-level failure: timeouts and connect errors are
/// retriable, everything else is terminal
fn request_error(error: &reqwest::Error, context: &str) -> Error {
    if error.is_timeout() || error.is_connect() || error.is_request() {
        Error::transport(format!("{context}: {error}"))
    } else {
        Error::transport_terminal(format!("{context}: {error}"))
    }
}

/// Storage API entry (`GET api/storage/<repo>/<path>`); folders carry a
/// `children` array, files carry `size` (as a JSON string) and `checksums`
#[derive(Debug, Deserialize)]
struct StorageEntry {
    #[serde(default)]
    size: Option<String>,
    #[serde(default)]
    checksums: Option<StorageChecksums>,
    #[serde(default, rename = "lastModified")]
    last_modified: Option<String>,
    #[serde(default)]
    children: Option<Vec<StorageChild>>,
}

#[derive(Debug, Deserialize)]
struct StorageChecksums {
    #[serde(default)]
    sha256: Option<String>,
    #[serde(default)]
    sha1: Option<String>,
    #[serde(default)]
    md5: Option<String>,
}

impl From<StorageChecksums> for Checksums {
    fn from(value: StorageChecksums) -> Self {
        Self {
            sha256: value.sha256,
            sha1: value.sha1,
            md5: value.md5,
        }
    }
}

#[derive(Debug, Deserialize)]
struct StorageChild {
    uri: String,
    #[serde(default)]
    folder: bool,
}

/// Deploy response (`PUT <repo>/<path>`), including the checksums the
/// server computed over what it received
#[derive(Debug, Deserialize)]
struct DeployResponse {
    #[serde(default)]
    size: Option<String>,
    #[serde(default)]
    checksums: Option<StorageChecksums>,
    #[serde(default)]
    created: Option<String>,
}

#[async_trait]
impl Transport for ArtifactoryClient {
    async fn stat(&self, location: &RemoteLocation) -> Result<Option<RemoteEntry>> {
        let url = self.storage_url(&location.repo, &location.path);

        let response = match self.send(self.http.get(&url), &url).await {
            Ok(response) => response,
            Err(Error::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };

        let entry: StorageEntry = response
            .json()
            .await
            .map_err(|e| Error::transport(format!("{url}: {e}")))?;

        if entry.children.is_some() {
            return Ok(Some(RemoteEntry::Folder));
        }

        Ok(Some(RemoteEntry::File(RemoteObject {
            repo: location.repo.clone(),
            path: location.path.clone(),
            size: entry.size.as_deref().and_then(|s| s.parse().ok()).unwrap_or(0),
            checksums: entry.checksums.map(Checksums::from).unwrap_or_default(),
            last_modified: entry
                .last_modified
                .as_deref()
                .and_then(|m| m.parse::<jiff::Timestamp>().ok()),
        })))
    }

    async fn get(&self, location: &RemoteLocation) -> Result<ByteStream> {
        let url = self.object_url(location);
        tracing::debug!(url = %url, "GET artifact");

        let response = self.send(self.http.get(&url), &url).await?;
        let stream = response
            .bytes_stream()
            .map_err(move |e| request_error(&e, &url));
        Ok(Box::pin(stream))
    }

    async fn put(
        &self,
        location: &RemoteLocation,
        body: ByteStream,
        len: u64,
        checksums: &Checksums,
    ) -> Result<RemoteObject> {
        let url = self.object_url(location);
        tracing::debug!(url = %url, len = len, "PUT artifact");

        let content_type = mime_guess::from_path(&location.path).first_or_octet_stream();
        let mut request = self
            .http
            .put(&url)
            .header(CONTENT_LENGTH, len)
            .header(CONTENT_TYPE, content_type.as_ref())
            .body(reqwest::Body::wrap_stream(body));

        // Declared digests let the server verify the deploy on its side
        if let Some(sha256) = &checksums.sha256 {
            request = request.header("X-Checksum-Sha256", sha256);
        }
        if let Some(sha1) = &checksums.sha1 {
            request = request.header("X-Checksum-Sha1", sha1);
        }
        if let Some(md5) = &checksums.md5 {
            request = request.header("X-Checksum-Md5", md5);
        }

        let response = self.send(request, &url).await?;
        let deployed: DeployResponse = response
            .json()
            .await
            .map_err(|e| Error::transport(format!("{url}: {e}")))?;

        Ok(RemoteObject {
            repo: location.repo.clone(),
            path: location.path.clone(),
            size: deployed
                .size
                .as_deref()
                .and_then(|s| s.parse().ok())
                .unwrap_or(len),
            checksums: deployed.checksums.map(Checksums::from).unwrap_or_default(),
            last_modified: deployed
                .created
                .as_deref()
                .and_then(|m| m.parse::<jiff::Timestamp>().ok()),
        })
    }
}

#[async_trait]
impl SearchService for ArtifactoryClient {
    async fn search_files(&self, query: &FileQuery) -> Result<SearchPage> {
        let url = format!("{}/api/search/aql", self.base);
        let expression = aql::render(query);
        tracing::debug!(aql = %expression, "search page");

        let request = self
            .http
            .post(&url)
            .header(CONTENT_TYPE, "text/plain")
            .body(expression);

        let response = self
            .auth
            .apply(request)
            .send()
            .await
            .map_err(|e| request_error(&e, &url))?;
        let status = response.status();
        if !status.is_success() {
            return Err(aql_status_error(status, &url));
        }

        let parsed: aql::Response = response
            .json()
            .await
            .map_err(|e| Error::Query(format!("{url}: {e}")))?;

        let truncated = parsed
            .range
            .as_ref()
            .is_some_and(|r| r.end_pos < r.total);
        let total = parsed.range.as_ref().map(|r| r.total);

        Ok(SearchPage {
            items: parsed.results.into_iter().map(aql::Item::into_object).collect(),
            truncated,
            total,
        })
    }

    async fn list_child_dirs(&self, repo: &str, prefix: &str) -> Result<Vec<String>> {
        let url = self.storage_url(repo, prefix);
        let response = self.send(self.http.get(&url), &url).await?;

        let entry: StorageEntry = response
            .json()
            .await
            .map_err(|e| Error::transport(format!("{url}: {e}")))?;

        Ok(entry
            .children
            .unwrap_or_default()
            .into_iter()
            .filter(|c| c.folder)
            .map(|c| c.uri.trim_matches('/').to_string())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> ArtifactoryClient {
        ArtifactoryClient::builder("https://host.example.com/artifactory/")
            .token("secret")
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder_normalizes_base() {
        let c = client();
        assert_eq!(c.base, "https://host.example.com/artifactory");
    }

    #[test]
    fn test_builder_rejects_garbage_url() {
        assert!(ArtifactoryClient::builder("not a url").build().is_err());
    }

    #[test]
    fn test_object_and_storage_urls() {
        let c = client();
        let loc = RemoteLocation::new("libs", "a/my file.txt");
        assert_eq!(
            c.object_url(&loc),
            "https://host.example.com/artifactory/libs/a/my%20file.txt"
        );
        assert_eq!(
            c.storage_url("libs", "a"),
            "https://host.example.com/artifactory/api/storage/libs/a"
        );
    }

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            status_error(StatusCode::UNAUTHORIZED, "x"),
            Error::Auth(_)
        ));
        assert!(matches!(
            status_error(StatusCode::NOT_FOUND, "x"),
            Error::NotFound(_)
        ));
        assert!(status_error(StatusCode::SERVICE_UNAVAILABLE, "x").is_retryable());
        assert!(status_error(StatusCode::TOO_MANY_REQUESTS, "x").is_retryable());
        assert!(!status_error(StatusCode::CONFLICT, "x").is_retryable());
    }

    #[test]
    fn test_aql_status_classification() {
        assert!(matches!(
            aql_status_error(StatusCode::BAD_REQUEST, "x"),
            Error::Query(_)
        ));
        assert!(aql_status_error(StatusCode::SERVICE_UNAVAILABLE, "x").is_retryable());
        // a "400" inside the URL never turns another status into a query error
        assert!(matches!(
            aql_status_error(StatusCode::NOT_FOUND, "repo/build-400/a"),
            Error::NotFound(_)
        ));
    }

    #[test]
    fn test_storage_entry_file_deserializes() {
        let raw = r#"{
            "repo": "libs",
            "path": "/a/b.txt",
            "size": "1024",
            "lastModified": "2024-03-01T10:15:30.000Z",
            "checksums": {"sha1": "aa", "md5": "bb", "sha256": "cc"}
        }"#;
        let entry: StorageEntry = serde_json::from_str(raw).unwrap();
        assert!(entry.children.is_none());
        assert_eq!(entry.size.as_deref(), Some("1024"));
        let checksums: Checksums = entry.checksums.unwrap().into();
        assert_eq!(checksums.sha256.as_deref(), Some("cc"));
    }

    #[test]
    fn test_storage_entry_folder_deserializes() {
        let raw = r#"{
            "repo": "libs",
            "path": "/a",
            "children": [
                {"uri": "/b", "folder": true},
                {"uri": "/c.txt", "folder": false}
            ]
        }"#;
        let entry: StorageEntry = serde_json::from_str(raw).unwrap();
        let children = entry.children.unwrap();
        assert_eq!(children.len(), 2);
        assert!(children[0].folder);
    }

    #[test]
    fn test_deploy_response_deserializes() {
        let raw = r#"{
            "repo": "libs",
            "path": "/incoming/c.txt",
            "created": "2024-03-01T10:15:30.000Z",
            "size": "5",
            "checksums": {"sha1": "aa", "md5": "bb", "sha256": "cc"}
        }"#;
        let deployed: DeployResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(deployed.size.as_deref(), Some("5"));
        assert!(deployed.created.is_some());
    }
}
