// types.rs
use crate::error::{KubiError, Result};
use std::fmt;
use url::Url;

const CA_PATH: &str = "/ca";
const TOKEN_PATH: &str = "/token";
const BUNDLE_PATH: &str = "/config";

/// Address of a kubi server and the paths it serves, all relative to `base`.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteEndpoint {
    base: Url,
    ca_path: &'static str,
    token_path: &'static str,
    bundle_path: &'static str,
}

impl RemoteEndpoint {
    /// Parses an operator-supplied server address. A bare `host[:port]` gets an
    /// `https://` prefix; any other scheme is rejected.
    pub fn parse(address: &str) -> Result<Self> {
        let address = address.trim();
        if address.is_empty() {
            return Err(KubiError::ValidationFailed(
                "no kubi server address given, use --kubi-url https://<host>:<port>".to_string(),
            ));
        }

        let candidate = if address.contains("://") {
            address.to_string()
        } else {
            format!("https://{}", address)
        };

        let base = Url::parse(&candidate).map_err(|e| {
            KubiError::ValidationFailed(format!("invalid kubi server address '{}': {}", address, e))
        })?;

        if base.scheme() != "https" {
            return Err(KubiError::ValidationFailed(format!(
                "kubi server address '{}' must use https",
                address
            )));
        }
        if base.host_str().map_or(true, str::is_empty) {
            return Err(KubiError::ValidationFailed(format!(
                "kubi server address '{}' has no host",
                address
            )));
        }

        Ok(Self::from_base_url(base))
    }

    /// Builds an endpoint without the scheme checks of [`RemoteEndpoint::parse`].
    pub(crate) fn from_base_url(base: Url) -> Self {
        Self {
            base,
            ca_path: CA_PATH,
            token_path: TOKEN_PATH,
            bundle_path: BUNDLE_PATH,
        }
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    pub fn ca_url(&self) -> Url {
        self.join(self.ca_path)
    }

    pub fn artifact_url(&self, artifact: Artifact) -> Url {
        match artifact {
            Artifact::Token => self.join(self.token_path),
            Artifact::Bundle => self.join(self.bundle_path),
        }
    }

    fn join(&self, path: &str) -> Url {
        let mut url = self.base.clone();
        let joined = format!("{}{}", self.base.path().trim_end_matches('/'), path);
        url.set_path(&joined);
        url.set_query(None);
        url
    }
}

/// What the server is asked to issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Artifact {
    Token,
    Bundle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustMode {
    /// Platform roots plus the CA fetched from the server.
    Strict,
    /// No certificate or hostname verification at all.
    Insecure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyMode {
    /// Honor HTTPS_PROXY / HTTP_PROXY / NO_PROXY from the environment.
    Environment,
    Direct,
}

#[derive(Clone)]
pub struct CredentialRequest {
    pub username: String,
    secret: String,
    pub scope: Option<String>,
    pub trust: TrustMode,
    pub proxy: ProxyMode,
    pub artifact: Artifact,
}

impl CredentialRequest {
    pub fn new(
        username: &str,
        secret: String,
        scope: Option<String>,
        trust: TrustMode,
        proxy: ProxyMode,
        artifact: Artifact,
    ) -> Result<Self> {
        let username = username.trim();
        if username.is_empty() {
            return Err(KubiError::ValidationFailed(
                "no username given, use --username <username>".to_string(),
            ));
        }
        if secret.is_empty() {
            return Err(KubiError::ValidationFailed("empty password".to_string()));
        }

        Ok(Self {
            username: username.to_string(),
            secret,
            scope: scope.filter(|s| !s.trim().is_empty()),
            trust,
            proxy,
            artifact,
        })
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }
}

impl fmt::Debug for CredentialRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRequest")
            .field("username", &self.username)
            .field("secret", &"<redacted>")
            .field("scope", &self.scope)
            .field("trust", &self.trust)
            .field("proxy", &self.proxy)
            .field("artifact", &self.artifact)
            .finish()
    }
}
