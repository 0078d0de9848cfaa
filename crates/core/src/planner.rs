//! Query planner: expands a remote container into a flat object list
//!
//! The search backend caps the result count per query. The planner pages
//! through results with offset/limit where the backend supports it, and
//! when the backend signals a hard result limit without pagination it
//! partitions the prefix on child folders and recurses. Results across
//! pages and partitions are merged and deduplicated by path.

use std::collections::BTreeMap;

use crate::config::RetryConfig;
use crate::error::{Error, Result};
use crate::retry::retry_with_backoff;
use crate::traits::{FileQuery, RemoteLocation, RemoteObject, SearchService};

/// Resolve every file beneath `root` into a deduplicated, path-ordered list
pub async fn resolve_remote_tree(
    search: &dyn SearchService,
    retry: &RetryConfig,
    root: &RemoteLocation,
    page_size: u64,
) -> Result<Vec<RemoteObject>> {
    let mut merged: BTreeMap<String, RemoteObject> = BTreeMap::new();
    let mut pending = vec![root.path.clone()];

    while let Some(prefix) = pending.pop() {
        match collect_prefix(search, retry, &root.repo, &prefix, page_size, true).await {
            Ok(objects) => {
                for object in objects {
                    merged.insert(object.path.clone(), object);
                }
            }
            Err(Error::QueryLimit(_)) => {
                tracing::debug!(
                    repo = %root.repo,
                    prefix = %prefix,
                    "result limit exceeded, partitioning on child folders"
                );

                // Files directly under the prefix first; a shallow overflow
                // means the partition cannot shrink further and the error is
                // terminal.
                let shallow =
                    collect_prefix(search, retry, &root.repo, &prefix, page_size, false).await?;
                for object in shallow {
                    merged.insert(object.path.clone(), object);
                }

                let dirs = retry_with_backoff(
                    retry,
                    || search.list_child_dirs(&root.repo, &prefix),
                    Error::is_retryable,
                )
                .await?;

                if dirs.is_empty() {
                    return Err(Error::Query(format!(
                        "result limit exceeded under {}/{prefix} with no child folders to partition",
                        root.repo
                    )));
                }

                for dir in dirs {
                    pending.push(join_prefix(&prefix, &dir));
                }
            }
            Err(e) => return Err(e),
        }
    }

    Ok(merged.into_values().collect())
}

/// Page through every result for one prefix
async fn collect_prefix(
    search: &dyn SearchService,
    retry: &RetryConfig,
    repo: &str,
    prefix: &str,
    page_size: u64,
    deep: bool,
) -> Result<Vec<RemoteObject>> {
    let mut out = Vec::new();
    let mut offset = 0u64;

    loop {
        let query = FileQuery {
            repo: repo.to_string(),
            prefix: prefix.to_string(),
            deep,
            offset,
            limit: page_size,
        };

        let page = retry_with_backoff(retry, || search.search_files(&query), Error::is_retryable)
            .await
            .map_err(|e| match e {
                // A backend still failing after the retry budget is a
                // planning failure, not a transfer failure
                Error::Transport { message, .. } => {
                    Error::Query(format!("search backend unavailable: {message}"))
                }
                other => other,
            })?;

        tracing::debug!(
            repo = repo,
            prefix = prefix,
            offset = offset,
            count = page.items.len(),
            truncated = page.truncated,
            "search page received"
        );

        let count = page.items.len() as u64;
        out.extend(page.items);

        if page.truncated && count > 0 {
            offset += count;
        } else {
            break;
        }
    }

    Ok(out)
}

fn join_prefix(prefix: &str, child: &str) -> String {
    let child = child.trim_matches('/');
    if prefix.is_empty() {
        child.to_string()
    } else {
        format!("{}/{child}", prefix.trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_prefix() {
        assert_eq!(join_prefix("", "a"), "a");
        assert_eq!(join_prefix("a", "b"), "a/b");
        assert_eq!(join_prefix("a/", "/b/"), "a/b");
    }
}
