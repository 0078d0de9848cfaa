//! artx-http: Artifactory REST adapter
//!
//! Implements the `artx-core` transport and search seams over the
//! Artifactory REST API: streamed artifact GET/PUT, the storage API for
//! existence probes and folder listings, and AQL for paginated search.

pub mod aql;
pub mod client;

pub use client::{ArtifactoryClient, ArtifactoryClientBuilder};
