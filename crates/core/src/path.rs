//! Path specification parsing and local tree expansion
//!
//! An input string is classified once, at resolution time, as Local or
//! Remote by syntactic scheme detection, and the tagged variant is carried
//! through all downstream structures. Remote paths must be well-formed URLs
//! with a repository segment after the Artifactory context root
//! (`https://host/artifactory/<repo>/<path>`).

use std::fmt;
use std::path::{Path, PathBuf};

use url::Url;

use crate::error::{Error, Result};
use crate::traits::RemoteLocation;

pub const SEPARATOR: char = '/';

/// A classified input path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSpec {
    Local(LocalSpec),
    Remote(RemoteSpec),
}

/// A file-system path on the machine running the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalSpec {
    pub path: PathBuf,
    /// The raw string ended with a separator, marking a container
    pub trailing_slash: bool,
}

impl LocalSpec {
    /// Container-ness: trailing separator, or an existing directory.
    /// Costs at most one `stat`; never touches the network.
    pub fn is_container(&self) -> bool {
        self.trailing_slash || self.path.is_dir()
    }
}

impl fmt::Display for LocalSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

/// A URL identifying a location within an Artifactory repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSpec {
    /// Scheme, host and context root, e.g. `https://host/artifactory`
    pub base: Url,
    /// Repository name (first segment after the context root)
    pub repo: String,
    /// Repository-relative path, `/`-separated, no leading separator;
    /// empty for the repository root
    pub path: String,
    /// The raw URL ended with a separator, marking a container
    pub trailing_slash: bool,
}

impl RemoteSpec {
    pub fn parse(raw: &str) -> Result<Self> {
        let url = Url::parse(raw).map_err(|e| Error::InvalidPath(format!("{raw}: {e}")))?;

        if url.host_str().is_none() {
            return Err(Error::InvalidPath(format!("{raw}: missing host")));
        }

        let segments: Vec<String> = url
            .path_segments()
            .map(|s| {
                s.filter(|seg| !seg.is_empty())
                    .map(|seg| {
                        urlencoding::decode(seg)
                            .map(|c| c.into_owned())
                            .map_err(|e| Error::InvalidPath(format!("{raw}: {e}")))
                    })
                    .collect::<Result<Vec<_>>>()
            })
            .transpose()?
            .unwrap_or_default();

        // First segment is the context root (conventionally "artifactory"),
        // second is the repository.
        if segments.len() < 2 {
            return Err(Error::InvalidPath(format!(
                "{raw}: missing repository segment"
            )));
        }

        let mut base = url.clone();
        base.set_path(&segments[0]);
        base.set_query(None);
        base.set_fragment(None);

        Ok(Self {
            base,
            repo: segments[1].clone(),
            path: segments[2..].join("/"),
            trailing_slash: url.path().ends_with(SEPARATOR),
        })
    }

    pub fn location(&self) -> RemoteLocation {
        RemoteLocation::new(&self.repo, &self.path)
    }

    /// Last path component, if any
    pub fn file_name(&self) -> Option<&str> {
        self.path.rsplit(SEPARATOR).next().filter(|s| !s.is_empty())
    }

    /// Full URL of the object or container
    pub fn url(&self) -> String {
        if self.path.is_empty() {
            format!("{}/{}", self.base, self.repo)
        } else {
            format!("{}/{}/{}", self.base, self.repo, self.path)
        }
    }
}

impl fmt::Display for RemoteSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url())
    }
}

/// Classify a raw input string as Local or Remote
pub fn parse_path(raw: &str) -> Result<PathSpec> {
    if raw.trim().is_empty() {
        return Err(Error::InvalidPath("empty path".into()));
    }

    if raw.starts_with("http://") || raw.starts_with("https://") {
        return Ok(PathSpec::Remote(RemoteSpec::parse(raw)?));
    }

    Ok(PathSpec::Local(LocalSpec {
        path: PathBuf::from(raw),
        trailing_slash: raw.ends_with(SEPARATOR) || raw.ends_with(std::path::MAIN_SEPARATOR),
    }))
}

/// Expand a local directory into a flat, sorted file list
///
/// Iterative scandir so deep trees cannot overflow the stack; symlinks are
/// not followed.
pub fn walk_local_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let file_type = entry.file_type()?;
            if file_type.is_file() {
                files.push(entry.path());
            } else if file_type.is_dir() {
                stack.push(entry.path());
            }
        }
    }

    files.sort();
    Ok(files)
}
