// src/trust/bootstrap.rs
use super::TrustStore;
use crate::error::{KubiError, Result};
use crate::exchange::transport::{describe, TransportConfig};
use crate::types::{ProxyMode, RemoteEndpoint};
use tracing::debug;

/// Downloads the server's issuing CA.
///
/// The request deliberately skips certificate verification: the CA is what
/// would be needed to verify it. Whatever comes back is only ever added to a
/// trust store, never used to authenticate anything on its own.
pub fn fetch_ca(endpoint: &RemoteEndpoint, proxy: ProxyMode) -> Result<Vec<u8>> {
    let url = endpoint.ca_url();
    let failed = |reason: String| KubiError::TrustBootstrapFailed {
        url: url.to_string(),
        reason,
    };

    debug!("Fetching CA from {} (unverified)", url);
    let client = TransportConfig::insecure(proxy)
        .build_client()
        .map_err(|e| failed(describe(&e)))?;

    let response = client
        .get(url.clone())
        .send()
        .map_err(|e| failed(describe(&e)))?;

    let status = response.status();
    if !status.is_success() {
        return Err(failed(format!("server answered HTTP {}", status.as_u16())));
    }

    let body = response.bytes().map_err(|e| failed(describe(&e)))?;
    debug!("Received {} bytes of CA material", body.len());
    Ok(body.to_vec())
}

/// Fetches the CA and builds the store used for the verified exchange.
pub fn bootstrap(endpoint: &RemoteEndpoint, proxy: ProxyMode) -> Result<TrustStore> {
    let ca = fetch_ca(endpoint, proxy)?;
    Ok(TrustStore::build(&ca))
}
