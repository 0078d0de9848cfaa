//! Command implementations

pub mod cp;
pub mod endpoint;
pub mod ls;

use std::time::Duration;

use artx_core::{ConfigManager, RemoteSpec, Result};
use artx_http::ArtifactoryClient;

/// Build an authenticated client for a remote path.
///
/// Explicit credentials win; otherwise the endpoint store is searched for an
/// entry whose URL matches the host, and anonymous access is the fallback.
pub(crate) fn client_for(
    remote: &RemoteSpec,
    token: Option<String>,
    api_key: Option<String>,
    timeout_secs: u64,
) -> Result<ArtifactoryClient> {
    let mut builder = ArtifactoryClient::builder(remote.base.as_str())
        .timeout(Duration::from_secs(timeout_secs));

    match (token, api_key) {
        (Some(token), _) => builder = builder.token(token),
        (None, Some(key)) => builder = builder.api_key(key),
        (None, None) => {
            if let Some(host) = remote.base.host_str()
                && let Ok(manager) = ConfigManager::new()
                && let Some(endpoint) = manager.endpoint_for_host(host)
            {
                if let Some(token) = &endpoint.token {
                    builder = builder.token(token);
                } else if let Some(key) = &endpoint.api_key {
                    builder = builder.api_key(key);
                }
            }
        }
    }

    builder.build()
}
