// src/exchange/transport.rs
use crate::trust::TrustStore;
use crate::types::{CredentialRequest, ProxyMode, TrustMode};
use reqwest::blocking::Client;
use std::error::Error as _;

/// How a single request verifies the server.
#[derive(Clone)]
pub enum TlsPolicy {
    /// Accept any certificate and hostname.
    Insecure,
    Verified(TrustStore),
}

/// Immutable transport settings for one logical request.
///
/// Every call builds its own client from one of these; nothing is shared
/// between the CA fetch and the authenticated exchange.
#[derive(Clone)]
pub struct TransportConfig {
    tls: TlsPolicy,
    proxy: ProxyMode,
}

impl TransportConfig {
    pub fn insecure(proxy: ProxyMode) -> Self {
        Self {
            tls: TlsPolicy::Insecure,
            proxy,
        }
    }

    pub fn verified(store: TrustStore, proxy: ProxyMode) -> Self {
        Self {
            tls: TlsPolicy::Verified(store),
            proxy,
        }
    }

    /// Picks the policy the caller asked for in `request`.
    pub fn for_request(request: &CredentialRequest, store: &TrustStore) -> Self {
        match request.trust {
            TrustMode::Insecure => Self::insecure(request.proxy),
            TrustMode::Strict => Self::verified(store.clone(), request.proxy),
        }
    }

    pub fn is_insecure(&self) -> bool {
        matches!(self.tls, TlsPolicy::Insecure)
    }

    pub fn build_client(&self) -> Result<Client, reqwest::Error> {
        let mut builder = Client::builder().user_agent(concat!("kubi/", env!("CARGO_PKG_VERSION")));

        builder = match self.proxy {
            ProxyMode::Environment => builder,
            ProxyMode::Direct => builder.no_proxy(),
        };

        builder = match &self.tls {
            TlsPolicy::Insecure => builder
                .danger_accept_invalid_certs(true)
                .danger_accept_invalid_hostnames(true),
            TlsPolicy::Verified(store) => store.apply(builder),
        };

        builder.build()
    }
}

/// Flattens a reqwest error and its causes into one line.
pub(crate) fn describe(error: &reqwest::Error) -> String {
    let mut message = error.to_string();
    let mut current = error.source();
    while let Some(source) = current {
        message.push_str(": ");
        message.push_str(&source.to_string());
        current = source.source();
    }
    message
}
