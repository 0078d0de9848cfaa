//! AQL (Artifactory Query Language) request building and response parsing
//!
//! AQL is the paginated search backend behind `api/search/aql`. A file
//! query becomes an `items.find(...)` expression with a stable sort so
//! offset/limit pagination is deterministic.

use serde::Deserialize;

use artx_core::{Checksums, FileQuery, RemoteObject};

/// Render one page request as an AQL expression
pub fn render(query: &FileQuery) -> String {
    let criteria = if query.deep {
        if query.prefix.is_empty() {
            format!(r#"{{"repo":"{}"}}"#, query.repo)
        } else {
            // Matches both files directly in the prefix folder and files in
            // any folder below it
            format!(
                r#"{{"repo":"{}","$or":[{{"path":"{}"}},{{"path":{{"$match":"{}/*"}}}}]}}"#,
                query.repo, query.prefix, query.prefix
            )
        }
    } else {
        let path = if query.prefix.is_empty() {
            "."
        } else {
            &query.prefix
        };
        format!(r#"{{"repo":"{}","path":"{path}"}}"#, query.repo)
    };

    format!(
        "items.find({criteria})\
         .include(\"repo\",\"path\",\"name\",\"size\",\"actual_sha1\",\"actual_md5\",\"sha256\",\"modified\")\
         .sort({{\"$asc\":[\"path\",\"name\"]}})\
         .offset({}).limit({})",
        query.offset, query.limit
    )
}

/// Top-level AQL response envelope
#[derive(Debug, Deserialize)]
pub struct Response {
    #[serde(default)]
    pub results: Vec<Item>,
    pub range: Option<Range>,
}

#[derive(Debug, Deserialize)]
pub struct Range {
    pub start_pos: u64,
    pub end_pos: u64,
    pub total: u64,
}

/// One result row; checksum fields use AQL's flattened naming
#[derive(Debug, Deserialize)]
pub struct Item {
    pub repo: String,
    pub path: String,
    pub name: String,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub actual_sha1: Option<String>,
    #[serde(default)]
    pub actual_md5: Option<String>,
    #[serde(default)]
    pub sha256: Option<String>,
    #[serde(default)]
    pub modified: Option<String>,
}

impl Item {
    /// AQL reports the containing folder as `path` (`.` for the repository
    /// root) and the file name separately
    pub fn full_path(&self) -> String {
        if self.path == "." || self.path.is_empty() {
            self.name.clone()
        } else {
            format!("{}/{}", self.path, self.name)
        }
    }

    pub fn into_object(self) -> RemoteObject {
        let path = self.full_path();
        RemoteObject {
            path,
            repo: self.repo,
            size: self.size.unwrap_or(0),
            checksums: Checksums {
                sha256: self.sha256,
                sha1: self.actual_sha1,
                md5: self.actual_md5,
            },
            last_modified: self
                .modified
                .as_deref()
                .and_then(|m| m.parse::<jiff::Timestamp>().ok()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(prefix: &str, deep: bool) -> FileQuery {
        FileQuery {
            repo: "libs".into(),
            prefix: prefix.into(),
            deep,
            offset: 2000,
            limit: 1000,
        }
    }

    #[test]
    fn test_render_deep_query() {
        let aql = render(&query("release/a", true));
        assert!(aql.starts_with("items.find("));
        assert!(aql.contains(r#""repo":"libs""#));
        assert!(aql.contains(r#"{"path":"release/a"}"#));
        assert!(aql.contains(r#"{"path":{"$match":"release/a/*"}}"#));
        assert!(aql.contains(".offset(2000).limit(1000)"));
        assert!(aql.contains(r#".sort({"$asc":["path","name"]})"#));
    }

    #[test]
    fn test_render_shallow_query_at_root() {
        let aql = render(&query("", false));
        assert!(aql.contains(r#""path":".""#));
    }

    #[test]
    fn test_render_deep_query_at_root_matches_whole_repo() {
        let aql = render(&query("", true));
        assert!(aql.contains(r#"items.find({"repo":"libs"})"#));
    }

    #[test]
    fn test_item_full_path() {
        let root = Item {
            repo: "libs".into(),
            path: ".".into(),
            name: "c.txt".into(),
            size: Some(5),
            actual_sha1: None,
            actual_md5: None,
            sha256: None,
            modified: None,
        };
        assert_eq!(root.full_path(), "c.txt");

        let nested = Item {
            path: "a/b".into(),
            name: "2.txt".into(),
            ..root
        };
        assert_eq!(nested.full_path(), "a/b/2.txt");
    }

    #[test]
    fn test_response_deserializes() {
        let raw = r#"{
            "results": [
                {
                    "repo": "libs",
                    "path": "release/a",
                    "name": "1.jar",
                    "size": 1024,
                    "actual_sha1": "aa",
                    "actual_md5": "bb",
                    "sha256": "cc",
                    "modified": "2024-03-01T10:15:30.000Z"
                }
            ],
            "range": {"start_pos": 0, "end_pos": 1, "total": 15000}
        }"#;

        let response: Response = serde_json::from_str(raw).unwrap();
        assert_eq!(response.results.len(), 1);
        let range = response.range.unwrap();
        assert_eq!(range.total, 15_000);

        let object = response.results.into_iter().next().unwrap().into_object();
        assert_eq!(object.path, "release/a/1.jar");
        assert_eq!(object.size, 1024);
        assert_eq!(object.checksums.sha256.as_deref(), Some("cc"));
        assert!(object.last_modified.is_some());
    }
}
