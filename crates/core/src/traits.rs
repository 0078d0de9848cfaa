//! Seams between the engine and its collaborators
//!
//! The engine is independent of any specific HTTP stack: the transport and
//! the search backend are trait objects, so tests drive the scheduler with
//! in-memory doubles and `artx-http` plugs in the real REST client.

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use serde::Serialize;

use crate::checksum::Checksums;
use crate::error::Result;

/// Streamed object content in bounded chunks
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// A (repository, path) coordinate relative to one endpoint
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RemoteLocation {
    pub repo: String,
    pub path: String,
}

impl RemoteLocation {
    pub fn new(repo: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            repo: repo.into(),
            path: path.into(),
        }
    }

    /// Append a `/`-separated suffix
    pub fn join(&self, suffix: &str) -> Self {
        let suffix = suffix.trim_start_matches('/');
        let path = if self.path.is_empty() {
            suffix.to_string()
        } else {
            format!("{}/{suffix}", self.path.trim_end_matches('/'))
        };
        Self::new(&self.repo, path)
    }

    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

impl fmt::Display for RemoteLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            f.write_str(&self.repo)
        } else {
            write!(f, "{}/{}", self.repo, self.path)
        }
    }
}

/// Metadata for one remote artifact, as returned by the search backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteObject {
    pub repo: String,
    pub path: String,
    pub size: u64,
    #[serde(skip_serializing_if = "Checksums::is_empty")]
    pub checksums: Checksums,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<jiff::Timestamp>,
}

impl RemoteObject {
    pub fn location(&self) -> RemoteLocation {
        RemoteLocation::new(&self.repo, &self.path)
    }

    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

/// Result of an existence probe against a remote path
#[derive(Debug, Clone)]
pub enum RemoteEntry {
    File(RemoteObject),
    Folder,
}

/// One page request against the search backend
#[derive(Debug, Clone)]
pub struct FileQuery {
    pub repo: String,
    /// Repository-relative prefix; empty means the repository root
    pub prefix: String,
    /// Recurse below the prefix; false lists only directly contained files
    pub deep: bool,
    pub offset: u64,
    pub limit: u64,
}

/// One page of search results
#[derive(Debug, Default)]
pub struct SearchPage {
    pub items: Vec<RemoteObject>,
    /// More results exist beyond this page
    pub truncated: bool,
    /// Total match count if the backend reports one
    pub total: Option<u64>,
}

/// Authenticated streamed access to one endpoint's artifacts
#[async_trait]
pub trait Transport: Send + Sync {
    /// Lightweight existence/containment probe; `None` when the path does
    /// not exist
    async fn stat(&self, location: &RemoteLocation) -> Result<Option<RemoteEntry>>;

    /// Streamed download
    async fn get(&self, location: &RemoteLocation) -> Result<ByteStream>;

    /// Streamed upload; `checksums` carries locally computed digests so the
    /// server can verify on deploy. Returns the stored object's metadata.
    async fn put(
        &self,
        location: &RemoteLocation,
        body: ByteStream,
        len: u64,
        checksums: &Checksums,
    ) -> Result<RemoteObject>;
}

/// The repository query backend (AQL or equivalent), treated as a black box
#[async_trait]
pub trait SearchService: Send + Sync {
    /// One page of files matching the query
    async fn search_files(&self, query: &FileQuery) -> Result<SearchPage>;

    /// Names of the folders directly under a prefix, for partitioned search
    async fn list_child_dirs(&self, repo: &str, prefix: &str) -> Result<Vec<String>>;
}
