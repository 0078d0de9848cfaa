//! Concurrency scheduler and the caller-facing entry point
//!
//! Resolves a source/destination pair into transfer units, runs them through
//! a bounded worker pool, verifies integrity per unit, and aggregates the
//! outcomes into a [`TransferReport`]. Planning-phase errors abort the call;
//! per-unit errors are captured into the report and never abort siblings.
//!
//! Unit lifecycle: Pending → InFlight → Succeeded | Failed | Retrying, with
//! Retrying → InFlight until the retry budget runs out. Admission is FIFO;
//! at most `max_concurrency` units are in flight at once.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use futures::{StreamExt, TryStreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::cancel::CancelToken;
use crate::checksum::{self, ChecksumAlgorithm, Checksums, Digester};
use crate::config::{CHUNK_SIZE, TransferConfig};
use crate::error::{Error, Result};
use crate::path::{self, LocalSpec, PathSpec, RemoteSpec};
use crate::plan::{self, Destination, Source, TransferUnit};
use crate::planner;
use crate::report::{OutcomeStatus, TransferOutcome, TransferReport};
use crate::retry;
use crate::traits::{ByteStream, RemoteEntry, RemoteLocation, RemoteObject, SearchService, Transport};

/// Result of one transfer attempt
enum Attempt {
    Done { bytes: u64, verified: bool },
    /// Destination already matched the expected checksum
    Unchanged,
}

/// The transfer engine
///
/// Holds shared, read-only collaborators: the transport's connection pool is
/// reused across workers and sized independently of the worker count.
pub struct Engine {
    transport: Arc<dyn Transport>,
    search: Arc<dyn SearchService>,
    config: TransferConfig,
}

impl Engine {
    pub fn new(
        transport: Arc<dyn Transport>,
        search: Arc<dyn SearchService>,
        config: TransferConfig,
    ) -> Self {
        Self {
            transport,
            search,
            config,
        }
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    /// Transfer between a local and a remote path, either direction
    pub async fn transfer(&self, source: &str, destination: &str) -> Result<TransferReport> {
        self.transfer_with_cancel(source, destination, CancelToken::new())
            .await
    }

    /// Like [`Engine::transfer`], observing an external cancellation token
    pub async fn transfer_with_cancel(
        &self,
        source: &str,
        destination: &str,
        cancel: CancelToken,
    ) -> Result<TransferReport> {
        let source_spec = path::parse_path(source)?;
        let destination_spec = path::parse_path(destination)?;

        let units = self.plan(&source_spec, &destination_spec).await?;
        tracing::info!(units = units.len(), "transfer plan ready");

        Ok(self.run(units, cancel).await)
    }

    /// Bound one network operation by the configured per-operation timeout.
    /// The deadline covers a single call or chunk read, never a whole unit,
    /// so large artifacts are not penalized by one clock.
    async fn timed<T>(
        &self,
        operation: impl std::future::Future<Output = Result<T>>,
    ) -> Result<T> {
        match tokio::time::timeout(self.config.per_operation_timeout, operation).await {
            Ok(result) => result,
            Err(_) => Err(Error::transport(format!(
                "operation timed out after {:?}",
                self.config.per_operation_timeout
            ))),
        }
    }

    /// Resolve the pair into concrete transfer units
    async fn plan(
        &self,
        source: &PathSpec,
        destination: &PathSpec,
    ) -> Result<Vec<TransferUnit>> {
        match (source, destination) {
            (PathSpec::Remote(remote), PathSpec::Local(local)) => {
                self.plan_download(remote, local).await
            }
            (PathSpec::Local(local), PathSpec::Remote(remote)) => {
                self.plan_upload(local, remote).await
            }
            _ => Err(Error::InvalidPath(
                "transfer requires one local and one remote path".into(),
            )),
        }
    }

    async fn plan_download(
        &self,
        remote: &RemoteSpec,
        local: &LocalSpec,
    ) -> Result<Vec<TransferUnit>> {
        // A trailing separator is authoritative; otherwise containment costs
        // one metadata probe
        let entry = if remote.trailing_slash {
            Some(RemoteEntry::Folder)
        } else {
            self.timed(self.transport.stat(&remote.location())).await?
        };

        match entry {
            Some(RemoteEntry::File(object)) => Ok(vec![plan::build_single_download(
                object,
                local,
                &self.config.checksum_preference,
            )]),
            Some(RemoteEntry::Folder) => {
                let objects = planner::resolve_remote_tree(
                    self.search.as_ref(),
                    &self.config.retry(),
                    &remote.location(),
                    self.config.max_query_page_size,
                )
                .await?;
                plan::build_download_units(
                    objects,
                    &remote.path,
                    &local.path,
                    &self.config.checksum_preference,
                )
            }
            None => Err(Error::NotFound(remote.url())),
        }
    }

    async fn plan_upload(
        &self,
        local: &LocalSpec,
        remote: &RemoteSpec,
    ) -> Result<Vec<TransferUnit>> {
        let metadata = std::fs::metadata(&local.path)
            .map_err(|_| Error::NotFound(local.path.display().to_string()))?;

        if metadata.is_dir() {
            let files = path::walk_local_files(&local.path)?;
            plan::build_upload_units(files, &local.path, &remote.location())
        } else {
            Ok(vec![plan::build_single_upload(local.path.clone(), remote)?])
        }
    }

    /// Fan the units out over the bounded worker pool; every unit runs to a
    /// terminal state and is recorded
    async fn run(&self, units: Vec<TransferUnit>, cancel: CancelToken) -> TransferReport {
        let started_at = jiff::Timestamp::now();
        let workers = self.config.max_concurrency.max(1);

        let outcomes: Vec<TransferOutcome> = futures::stream::iter(units)
            .map(|unit| self.run_unit(unit, cancel.clone()))
            .buffer_unordered(workers)
            .collect()
            .await;

        TransferReport {
            outcomes,
            started_at,
            finished_at: jiff::Timestamp::now(),
        }
    }

    /// Drive one unit to a terminal state; never returns an error
    async fn run_unit(&self, unit: TransferUnit, cancel: CancelToken) -> TransferOutcome {
        let source = unit.source.to_string();
        let destination = unit.destination.to_string();
        let start = Instant::now();
        let retry_config = self.config.retry();
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;

            let result = match (&unit.source, &unit.destination) {
                (Source::Remote(object), Destination::Local(dest)) => {
                    self.download(object, &unit.expected, dest, &cancel).await
                }
                (Source::Local(file), Destination::Remote(location)) => {
                    self.upload(file, location, &cancel).await
                }
                _ => Err(Error::InvalidPath(
                    "unit endpoints must be one local and one remote".into(),
                )),
            };

            match result {
                Ok(Attempt::Done { bytes, verified }) => {
                    tracing::debug!(
                        source = %source,
                        destination = %destination,
                        bytes = bytes,
                        attempts = attempts,
                        verified = verified,
                        "transfer unit succeeded"
                    );
                    return TransferOutcome {
                        source,
                        destination,
                        status: OutcomeStatus::Succeeded,
                        bytes_transferred: bytes,
                        attempts,
                        duration: start.elapsed(),
                        verified,
                        error_kind: None,
                        error: None,
                    };
                }
                Ok(Attempt::Unchanged) => {
                    tracing::debug!(destination = %destination, "destination up to date, skipping");
                    return TransferOutcome {
                        source,
                        destination,
                        status: OutcomeStatus::Skipped,
                        bytes_transferred: 0,
                        attempts,
                        duration: start.elapsed(),
                        verified: true,
                        error_kind: None,
                        error: None,
                    };
                }
                Err(Error::Cancelled) => {
                    return TransferOutcome::failure(
                        source,
                        destination,
                        attempts,
                        start.elapsed(),
                        &Error::Cancelled,
                    );
                }
                Err(e) => {
                    let retriable = e.is_retryable()
                        || (matches!(e, Error::Integrity { .. })
                            && self.config.retry_on_integrity_failure);

                    if retriable && attempts < retry_config.max_attempts && !cancel.is_cancelled()
                    {
                        let backoff = retry::backoff_for_attempt(&retry_config, attempts);
                        tracing::debug!(
                            destination = %destination,
                            attempt = attempts,
                            backoff_ms = backoff.as_millis() as u64,
                            error = %e,
                            "retrying transfer unit"
                        );
                        tokio::time::sleep(backoff).await;
                        continue;
                    }

                    tracing::warn!(
                        source = %source,
                        destination = %destination,
                        attempts = attempts,
                        error = %e,
                        "transfer unit failed"
                    );
                    return TransferOutcome::failure(
                        source,
                        destination,
                        attempts,
                        start.elapsed(),
                        &e,
                    );
                }
            }
        }
    }

    async fn download(
        &self,
        object: &RemoteObject,
        expected: &Option<(ChecksumAlgorithm, String)>,
        dest: &Path,
        cancel: &CancelToken,
    ) -> Result<Attempt> {
        if self.config.skip_unchanged
            && let Some((algo, want)) = expected
            && dest.is_file()
        {
            let have = checksum::hash_file(dest, *algo).await?;
            if want.eq_ignore_ascii_case(&have) {
                return Ok(Attempt::Unchanged);
            }
        }

        cancel.check()?;

        if let Some(parent) = dest.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Stream into a partial file, rename into place only after the
        // bytes are verified, so an interrupted download is never mistaken
        // for a complete artifact
        let tmp = partial_path(dest);
        let result = self
            .download_to_partial(object, expected, dest, &tmp, cancel)
            .await;
        if result.is_err() {
            let _ = tokio::fs::remove_file(&tmp).await;
        }
        result
    }

    async fn download_to_partial(
        &self,
        object: &RemoteObject,
        expected: &Option<(ChecksumAlgorithm, String)>,
        dest: &Path,
        tmp: &Path,
        cancel: &CancelToken,
    ) -> Result<Attempt> {
        let mut file = tokio::fs::File::create(tmp).await?;
        let mut digester = expected.as_ref().map(|(algo, _)| Digester::new(*algo));
        let mut stream = self.timed(self.transport.get(&object.location())).await?;
        let mut bytes: u64 = 0;

        while let Some(chunk) = self.timed(stream.try_next()).await? {
            cancel.check()?;
            if let Some(d) = digester.as_mut() {
                d.update(&chunk);
            }
            file.write_all(&chunk).await?;
            bytes += chunk.len() as u64;
        }
        file.flush().await?;
        drop(file);

        let verified = match (digester, expected.as_ref()) {
            (Some(digester), Some((algo, want))) => {
                let have = digester.finish();
                checksum::verify(&object.location().to_string(), *algo, want, &have)?;
                true
            }
            // Metadata carried no checksum: transfer stands, with the
            // verification caveat recorded on the outcome
            _ => false,
        };

        tokio::fs::rename(tmp, dest).await?;
        Ok(Attempt::Done { bytes, verified })
    }

    async fn upload(
        &self,
        file: &Path,
        location: &RemoteLocation,
        cancel: &CancelToken,
    ) -> Result<Attempt> {
        let metadata = tokio::fs::metadata(file).await?;
        if !metadata.is_file() {
            return Err(Error::InvalidPath(format!(
                "{} is not a regular file",
                file.display()
            )));
        }
        let len = metadata.len();

        let algo = self
            .config
            .checksum_preference
            .first()
            .copied()
            .unwrap_or(ChecksumAlgorithm::Sha256);
        let digest = checksum::hash_file(file, algo).await?;
        let mut checksums = Checksums::default();
        checksums.set(algo, digest.clone());

        if self.config.skip_unchanged
            && let Some(RemoteEntry::File(existing)) = self.timed(self.transport.stat(location)).await?
            && existing
                .checksums
                .get(algo)
                .is_some_and(|h| h.eq_ignore_ascii_case(&digest))
        {
            return Ok(Attempt::Unchanged);
        }

        cancel.check()?;

        let body = file_chunk_stream(file.to_path_buf(), cancel.clone());
        let stored = self
            .timed(self.transport.put(location, body, len, &checksums))
            .await?;

        // The server digests what it received; a mismatch against our local
        // digest means the upload was corrupted in transit
        let verified = match stored.checksums.get(algo) {
            Some(remote) => {
                checksum::verify(&location.to_string(), algo, &digest, remote)?;
                true
            }
            None => false,
        };

        Ok(Attempt::Done {
            bytes: len,
            verified,
        })
    }
}

/// Temp-file sibling used while a download is in progress
fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".artx-part");
    dest.with_file_name(name)
}

/// Stream a local file in bounded chunks, observing cancellation between
/// reads
fn file_chunk_stream(path: PathBuf, cancel: CancelToken) -> ByteStream {
    Box::pin(futures::stream::try_unfold(
        (None::<tokio::fs::File>, path),
        move |(file, path)| {
            let cancel = cancel.clone();
            async move {
                cancel.check()?;
                let mut file = match file {
                    Some(f) => f,
                    None => tokio::fs::File::open(&path).await?,
                };
                let mut buf = vec![0u8; CHUNK_SIZE];
                let n = file.read(&mut buf).await?;
                if n == 0 {
                    Ok(None)
                } else {
                    buf.truncate(n);
                    Ok(Some((Bytes::from(buf), (Some(file), path))))
                }
            }
        },
    ))
}
