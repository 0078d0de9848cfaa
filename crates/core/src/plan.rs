//! Transfer unit builder
//!
//! Pairs each resolved source object with a destination path, mirroring the
//! directory structure relative to the container root. Destination
//! collisions are detected here, before anything is scheduled, so an
//! ambiguous merge can never be discovered mid-transfer.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::checksum::ChecksumAlgorithm;
use crate::error::{Error, Result};
use crate::path::{LocalSpec, RemoteSpec};
use crate::traits::{RemoteLocation, RemoteObject};

/// Source side of one transfer unit
#[derive(Debug, Clone)]
pub enum Source {
    Local(PathBuf),
    Remote(RemoteObject),
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local(path) => write!(f, "{}", path.display()),
            Self::Remote(object) => write!(f, "{}/{}", object.repo, object.path),
        }
    }
}

/// Destination side of one transfer unit
#[derive(Debug, Clone)]
pub enum Destination {
    Local(PathBuf),
    Remote(RemoteLocation),
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local(path) => write!(f, "{}", path.display()),
            Self::Remote(location) => write!(f, "{location}"),
        }
    }
}

/// One source-to-destination copy task with its own retry and verification
/// lifecycle. Owned exclusively by the scheduler once built.
#[derive(Debug, Clone)]
pub struct TransferUnit {
    pub source: Source,
    pub destination: Destination,
    /// Fingerprint from source metadata, when available
    pub expected: Option<(ChecksumAlgorithm, String)>,
    pub size_hint: Option<u64>,
}

/// Build units for a remote container download, mirroring structure below
/// `container_prefix` under `dest_root`
pub fn build_download_units(
    objects: Vec<RemoteObject>,
    container_prefix: &str,
    dest_root: &Path,
    preference: &[ChecksumAlgorithm],
) -> Result<Vec<TransferUnit>> {
    let mut units = Vec::with_capacity(objects.len());

    for object in objects {
        let relative = object
            .path
            .strip_prefix(container_prefix)
            .unwrap_or(&object.path)
            .trim_start_matches('/');

        if relative.is_empty() {
            return Err(Error::InvalidPath(format!(
                "object path {} does not extend container prefix {container_prefix}",
                object.path
            )));
        }

        let destination = join_remote_suffix(dest_root, relative);
        let expected = object.checksums.strongest(preference);
        units.push(TransferUnit {
            size_hint: Some(object.size),
            source: Source::Remote(object),
            destination: Destination::Local(destination),
            expected,
        });
    }

    check_conflicts(&units)?;
    Ok(units)
}

/// Build the single unit for a non-container download
pub fn build_single_download(
    object: RemoteObject,
    destination: &LocalSpec,
    preference: &[ChecksumAlgorithm],
) -> TransferUnit {
    let dest_path = if destination.is_container() {
        destination.path.join(object.file_name())
    } else {
        destination.path.clone()
    };

    let expected = object.checksums.strongest(preference);
    TransferUnit {
        size_hint: Some(object.size),
        source: Source::Remote(object),
        destination: Destination::Local(dest_path),
        expected,
    }
}

/// Build units for a local directory upload, mirroring structure below
/// `local_root` under `dest_root`
pub fn build_upload_units(
    files: Vec<PathBuf>,
    local_root: &Path,
    dest_root: &RemoteLocation,
) -> Result<Vec<TransferUnit>> {
    let mut units = Vec::with_capacity(files.len());

    for file in files {
        let relative = file.strip_prefix(local_root).map_err(|_| {
            Error::InvalidPath(format!(
                "{} is not under upload root {}",
                file.display(),
                local_root.display()
            ))
        })?;
        let suffix = remote_suffix(relative)?;

        units.push(TransferUnit {
            destination: Destination::Remote(dest_root.join(&suffix)),
            source: Source::Local(file),
            expected: None, // computed from the file at transfer time
            size_hint: None,
        });
    }

    check_conflicts(&units)?;
    Ok(units)
}

/// Build the single unit for a non-container upload
pub fn build_single_upload(file: PathBuf, destination: &RemoteSpec) -> Result<TransferUnit> {
    let location = if destination.trailing_slash || destination.path.is_empty() {
        let name = file
            .file_name()
            .ok_or_else(|| Error::InvalidPath(format!("{} has no file name", file.display())))?
            .to_string_lossy()
            .into_owned();
        destination.location().join(&name)
    } else {
        destination.location()
    };

    Ok(TransferUnit {
        source: Source::Local(file),
        destination: Destination::Remote(location),
        expected: None,
        size_hint: None,
    })
}

/// Reject plans where two sources resolve to the same destination
pub fn check_conflicts(units: &[TransferUnit]) -> Result<()> {
    let mut seen: HashMap<String, &TransferUnit> = HashMap::with_capacity(units.len());

    for unit in units {
        let key = unit.destination.to_string();
        if let Some(previous) = seen.insert(key, unit) {
            return Err(Error::PathConflict(format!(
                "{} and {} both resolve to {}",
                previous.source, unit.source, unit.destination
            )));
        }
    }

    Ok(())
}

/// Join a `/`-separated remote suffix onto a local root, component-wise so
/// the result is correct on every platform
fn join_remote_suffix(root: &Path, suffix: &str) -> PathBuf {
    let mut out = root.to_path_buf();
    for component in suffix.split('/').filter(|c| !c.is_empty()) {
        out.push(component);
    }
    out
}

/// Flatten a relative local path into a `/`-separated remote suffix
fn remote_suffix(relative: &Path) -> Result<String> {
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.is_empty() {
        return Err(Error::InvalidPath("empty relative path".into()));
    }
    Ok(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::Checksums;

    fn object(path: &str, size: u64) -> RemoteObject {
        RemoteObject {
            repo: "libs".into(),
            path: path.into(),
            size,
            checksums: Checksums {
                sha256: Some(format!("{:0>64}", size)),
                ..Default::default()
            },
            last_modified: None,
        }
    }

    #[test]
    fn test_download_units_mirror_structure() {
        let objects = vec![
            object("release/a/1.txt", 10),
            object("release/a/b/2.txt", 20),
            object("release/c.txt", 5),
        ];

        let units = build_download_units(
            objects,
            "release",
            Path::new("out"),
            &ChecksumAlgorithm::PREFERENCE,
        )
        .unwrap();

        assert_eq!(units.len(), 3);
        let dests: Vec<String> = units.iter().map(|u| u.destination.to_string()).collect();
        assert!(dests.contains(&"out/a/1.txt".to_string()));
        assert!(dests.contains(&"out/a/b/2.txt".to_string()));
        assert!(dests.contains(&"out/c.txt".to_string()));
    }

    #[test]
    fn test_download_units_carry_expected_checksum() {
        let units = build_download_units(
            vec![object("release/c.txt", 5)],
            "release",
            Path::new("out"),
            &ChecksumAlgorithm::PREFERENCE,
        )
        .unwrap();

        let (algo, _) = units[0].expected.as_ref().unwrap();
        assert_eq!(*algo, ChecksumAlgorithm::Sha256);
        assert_eq!(units[0].size_hint, Some(5));
    }

    #[test]
    fn test_conflicting_destinations_rejected() {
        // Normalization maps both paths to the same relative suffix
        let objects = vec![object("release/a/x.txt", 1), object("release//a/x.txt", 2)];

        let err = build_download_units(
            objects,
            "release",
            Path::new("out"),
            &ChecksumAlgorithm::PREFERENCE,
        )
        .unwrap_err();
        assert!(matches!(err, Error::PathConflict(_)));
    }

    #[test]
    fn test_single_download_literal_destination() {
        let unit = build_single_download(
            object("release/c.txt", 5),
            &LocalSpec {
                path: PathBuf::from("renamed.txt"),
                trailing_slash: false,
            },
            &ChecksumAlgorithm::PREFERENCE,
        );
        assert_eq!(unit.destination.to_string(), "renamed.txt");
    }

    #[test]
    fn test_single_download_into_container_keeps_name() {
        let unit = build_single_download(
            object("release/c.txt", 5),
            &LocalSpec {
                path: PathBuf::from("out"),
                trailing_slash: true,
            },
            &ChecksumAlgorithm::PREFERENCE,
        );
        assert_eq!(unit.destination.to_string(), "out/c.txt");
    }

    #[test]
    fn test_upload_units_mirror_structure() {
        let root = Path::new("src");
        let files = vec![
            PathBuf::from("src/a/1.txt"),
            PathBuf::from("src/a/b/2.txt"),
            PathBuf::from("src/c.txt"),
        ];

        let units =
            build_upload_units(files, root, &RemoteLocation::new("libs", "incoming")).unwrap();

        let dests: Vec<String> = units.iter().map(|u| u.destination.to_string()).collect();
        assert_eq!(
            dests,
            vec![
                "libs/incoming/a/1.txt",
                "libs/incoming/a/b/2.txt",
                "libs/incoming/c.txt"
            ]
        );
    }

    #[test]
    fn test_upload_outside_root_rejected() {
        let err = build_upload_units(
            vec![PathBuf::from("elsewhere/c.txt")],
            Path::new("src"),
            &RemoteLocation::new("libs", ""),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidPath(_)));
    }

    #[test]
    fn test_generated_trees_produce_distinct_destinations() {
        // Pseudo-random nested trees from a fixed seed; distinct source
        // paths must always map to pairwise distinct destinations
        let mut state: u64 = 0x9e37_79b9_7f4a_7c15;
        let mut next = move |bound: u64| {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (state >> 33) % bound
        };

        for _ in 0..20 {
            let mut paths = std::collections::BTreeSet::new();
            for _ in 0..200 {
                let depth = 1 + next(4);
                let mut segments = vec!["root".to_string()];
                for _ in 0..depth {
                    segments.push(format!("d{}", next(6)));
                }
                segments.push(format!("f{}.bin", next(1000)));
                paths.insert(segments.join("/"));
            }

            let objects: Vec<RemoteObject> =
                paths.iter().map(|p| object(p, 1)).collect();
            let units = build_download_units(
                objects,
                "root",
                Path::new("out"),
                &ChecksumAlgorithm::PREFERENCE,
            )
            .unwrap();

            let dests: std::collections::BTreeSet<String> =
                units.iter().map(|u| u.destination.to_string()).collect();
            assert_eq!(dests.len(), units.len());
            assert_eq!(units.len(), paths.len());
        }
    }

    #[test]
    fn test_single_upload_to_container_appends_name() {
        let spec = RemoteSpec::parse("https://host/artifactory/libs/incoming/").unwrap();
        let unit = build_single_upload(PathBuf::from("local/c.txt"), &spec).unwrap();
        assert_eq!(unit.destination.to_string(), "libs/incoming/c.txt");
    }

    #[test]
    fn test_single_upload_literal_destination() {
        let spec = RemoteSpec::parse("https://host/artifactory/libs/incoming/renamed.txt").unwrap();
        let unit = build_single_upload(PathBuf::from("local/c.txt"), &spec).unwrap();
        assert_eq!(unit.destination.to_string(), "libs/incoming/renamed.txt");
    }
}
