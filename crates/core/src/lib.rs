//! artx-core: concurrent transfer engine for Artifactory repositories
//!
//! This crate provides the whole transfer core:
//! - Path specification parsing and resolution (local or remote, single
//!   file or container)
//! - Query planning against a paginated search backend
//! - Transfer unit building with destination conflict detection
//! - A bounded-concurrency scheduler with retry, backoff and cancellation
//! - Post-transfer integrity verification by content checksum
//!
//! The crate is independent of any specific HTTP stack: network access goes
//! through the [`traits::Transport`] and [`traits::SearchService`] seams,
//! implemented by `artx-http` for the real REST API and by in-memory
//! doubles in tests.

pub mod cancel;
pub mod checksum;
pub mod config;
pub mod engine;
pub mod error;
pub mod path;
pub mod plan;
pub mod planner;
pub mod report;
pub mod retry;
pub mod traits;

pub use cancel::CancelToken;
pub use checksum::{ChecksumAlgorithm, Checksums, Digester};
pub use config::{CHUNK_SIZE, ConfigManager, Endpoint, RetryConfig, TransferConfig};
pub use engine::Engine;
pub use error::{Error, ErrorKind, Result};
pub use path::{LocalSpec, PathSpec, RemoteSpec, parse_path, walk_local_files};
pub use plan::{Destination, Source, TransferUnit};
pub use report::{OutcomeStatus, TransferOutcome, TransferReport};
pub use traits::{
    ByteStream, FileQuery, RemoteEntry, RemoteLocation, RemoteObject, SearchPage, SearchService,
    Transport,
};
