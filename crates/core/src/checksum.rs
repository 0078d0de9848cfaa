//! Content fingerprints and transfer integrity verification
//!
//! Artifactory reports up to three checksums per artifact (sha256, sha1,
//! md5). Verification picks the strongest algorithm both sides know and
//! digests the transferred bytes chunk by chunk, so memory use does not
//! scale with artifact size.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use md5::Md5;
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Digest, Sha256};
use tokio::io::AsyncReadExt;

use crate::config::CHUNK_SIZE;
use crate::error::{Error, Result};

/// Digest algorithm family, ordered strongest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumAlgorithm {
    Sha256,
    Sha1,
    Md5,
}

impl ChecksumAlgorithm {
    /// Default preference order: sha256 > sha1 > md5
    pub const PREFERENCE: [Self; 3] = [Self::Sha256, Self::Sha1, Self::Md5];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Sha1 => "sha1",
            Self::Md5 => "md5",
        }
    }
}

impl fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChecksumAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sha256" => Ok(Self::Sha256),
            "sha1" => Ok(Self::Sha1),
            "md5" => Ok(Self::Md5),
            other => Err(Error::Config(format!(
                "unknown checksum algorithm: {other}"
            ))),
        }
    }
}

/// The checksum set attached to a remote object's metadata
///
/// Any subset may be present; older repository versions omit sha256.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checksums {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha1: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub md5: Option<String>,
}

impl Checksums {
    pub fn is_empty(&self) -> bool {
        self.sha256.is_none() && self.sha1.is_none() && self.md5.is_none()
    }

    pub fn get(&self, algorithm: ChecksumAlgorithm) -> Option<&str> {
        match algorithm {
            ChecksumAlgorithm::Sha256 => self.sha256.as_deref(),
            ChecksumAlgorithm::Sha1 => self.sha1.as_deref(),
            ChecksumAlgorithm::Md5 => self.md5.as_deref(),
        }
    }

    pub fn set(&mut self, algorithm: ChecksumAlgorithm, value: String) {
        match algorithm {
            ChecksumAlgorithm::Sha256 => self.sha256 = Some(value),
            ChecksumAlgorithm::Sha1 => self.sha1 = Some(value),
            ChecksumAlgorithm::Md5 => self.md5 = Some(value),
        }
    }

    /// Pick the first algorithm in `preference` that has a value
    pub fn strongest(
        &self,
        preference: &[ChecksumAlgorithm],
    ) -> Option<(ChecksumAlgorithm, String)> {
        preference
            .iter()
            .find_map(|&algo| self.get(algo).map(|v| (algo, v.to_ascii_lowercase())))
    }
}

/// Incremental digest over one algorithm
pub enum Digester {
    Sha256(Sha256),
    Sha1(Sha1),
    Md5(Md5),
}

impl Digester {
    pub fn new(algorithm: ChecksumAlgorithm) -> Self {
        match algorithm {
            ChecksumAlgorithm::Sha256 => Self::Sha256(Sha256::new()),
            ChecksumAlgorithm::Sha1 => Self::Sha1(Sha1::new()),
            ChecksumAlgorithm::Md5 => Self::Md5(Md5::new()),
        }
    }

    pub fn update(&mut self, bytes: &[u8]) {
        match self {
            Self::Sha256(h) => h.update(bytes),
            Self::Sha1(h) => h.update(bytes),
            Self::Md5(h) => h.update(bytes),
        }
    }

    /// Finalize and return the lowercase hex digest
    pub fn finish(self) -> String {
        match self {
            Self::Sha256(h) => hex::encode(h.finalize()),
            Self::Sha1(h) => hex::encode(h.finalize()),
            Self::Md5(h) => hex::encode(h.finalize()),
        }
    }
}

/// Digest a local file in bounded chunks
pub async fn hash_file(path: &Path, algorithm: ChecksumAlgorithm) -> Result<String> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut digester = Digester::new(algorithm);
    let mut buf = vec![0u8; CHUNK_SIZE];

    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        digester.update(&buf[..n]);
    }

    Ok(digester.finish())
}

/// Compare an expected fingerprint against the digest of transferred bytes
///
/// Comparison is case-insensitive; servers report hex in either case.
pub fn verify(
    path: &str,
    algorithm: ChecksumAlgorithm,
    expected: &str,
    actual: &str,
) -> Result<()> {
    if expected.eq_ignore_ascii_case(actual) {
        Ok(())
    } else {
        Err(Error::Integrity {
            path: path.to_string(),
            algorithm,
            expected: expected.to_ascii_lowercase(),
            actual: actual.to_ascii_lowercase(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digester_sha256_known_vector() {
        let mut d = Digester::new(ChecksumAlgorithm::Sha256);
        d.update(b"abc");
        assert_eq!(
            d.finish(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_digester_md5_known_vector() {
        let mut d = Digester::new(ChecksumAlgorithm::Md5);
        d.update(b"abc");
        assert_eq!(d.finish(), "900150983cd24fb0d6963f7d28e17f72");
    }

    #[test]
    fn test_digester_incremental_matches_one_shot() {
        let mut a = Digester::new(ChecksumAlgorithm::Sha1);
        a.update(b"hello ");
        a.update(b"world");

        let mut b = Digester::new(ChecksumAlgorithm::Sha1);
        b.update(b"hello world");

        assert_eq!(a.finish(), b.finish());
    }

    #[test]
    fn test_strongest_prefers_sha256() {
        let checksums = Checksums {
            sha256: Some("AA".into()),
            sha1: Some("bb".into()),
            md5: Some("cc".into()),
        };
        let (algo, value) = checksums.strongest(&ChecksumAlgorithm::PREFERENCE).unwrap();
        assert_eq!(algo, ChecksumAlgorithm::Sha256);
        assert_eq!(value, "aa"); // normalized to lowercase
    }

    #[test]
    fn test_strongest_falls_back() {
        let checksums = Checksums {
            md5: Some("cc".into()),
            ..Default::default()
        };
        let (algo, _) = checksums.strongest(&ChecksumAlgorithm::PREFERENCE).unwrap();
        assert_eq!(algo, ChecksumAlgorithm::Md5);

        assert!(Checksums::default()
            .strongest(&ChecksumAlgorithm::PREFERENCE)
            .is_none());
    }

    #[test]
    fn test_verify_case_insensitive() {
        assert!(verify("repo/a", ChecksumAlgorithm::Sha1, "ABCDEF", "abcdef").is_ok());

        let err = verify("repo/a", ChecksumAlgorithm::Sha1, "abcdef", "012345").unwrap_err();
        assert!(matches!(err, Error::Integrity { .. }));
    }

    #[test]
    fn test_algorithm_round_trip() {
        for algo in ChecksumAlgorithm::PREFERENCE {
            assert_eq!(algo.as_str().parse::<ChecksumAlgorithm>().unwrap(), algo);
        }
        assert!("crc32".parse::<ChecksumAlgorithm>().is_err());
    }

    #[tokio::test]
    async fn test_hash_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        tokio::fs::write(&path, b"abc").await.unwrap();

        let digest = hash_file(&path, ChecksumAlgorithm::Md5).await.unwrap();
        assert_eq!(digest, "900150983cd24fb0d6963f7d28e17f72");
    }
}
