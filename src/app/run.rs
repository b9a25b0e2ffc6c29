// src/app/run.rs
use super::Explanation;
use crate::error::{KubiError, Result};
use crate::exchange;
use crate::kubeconfig::{self, KubeConfig, Persisted};
use crate::token::inspect;
use crate::trust;
use crate::types::{Artifact, CredentialRequest, ProxyMode, RemoteEndpoint, TrustMode};
use crate::utils::prompt;
use std::{io::Write, path::Path};
use tracing::{debug, warn};
use url::Url;

/// Everything needed to talk to one kubi server as one user.
pub struct Connection {
    pub endpoint: RemoteEndpoint,
    pub username: String,
    pub password: Option<String>,
    pub trust: TrustMode,
    pub proxy: ProxyMode,
}

impl Connection {
    pub fn new(
        kubi_url: &str,
        username: &str,
        password: Option<String>,
        insecure: bool,
        use_proxy: bool,
    ) -> Result<Self> {
        if username.trim().is_empty() {
            return Err(KubiError::ValidationFailed(
                "no username given, use --username <username>".to_string(),
            ));
        }
        Ok(Self {
            endpoint: RemoteEndpoint::parse(kubi_url)?,
            username: username.trim().to_string(),
            password,
            trust: if insecure {
                TrustMode::Insecure
            } else {
                TrustMode::Strict
            },
            proxy: if use_proxy {
                ProxyMode::Environment
            } else {
                ProxyMode::Direct
            },
        })
    }

    /// Bootstraps trust, then performs the authenticated exchange.
    pub fn acquire(&self, artifact: Artifact, scope: Option<String>) -> Result<Vec<u8>> {
        let secret = match &self.password {
            Some(password) => password.clone(),
            None => prompt::read_password("Enter your LDAP password: ")?,
        };
        let request = CredentialRequest::new(
            &self.username,
            secret,
            scope,
            self.trust,
            self.proxy,
            artifact,
        )?;

        if self.trust == TrustMode::Insecure {
            warn!("Running with --insecure, the server certificate will not be checked");
        }
        debug!("Contacting kubi at {}", self.endpoint.base());
        let store = trust::bootstrap(&self.endpoint, request.proxy)?;
        debug!(
            "Trust store ready: {} fetched CA(s) [{}], platform roots {}",
            store.appended(),
            store.fingerprints().join(", "),
            if store.uses_platform_roots() { "on" } else { "off" }
        );
        exchange::exchange(&self.endpoint, &request, &store)
    }
}

/// `kubi explain`: decode a literal token, or the current context's token.
pub fn explain(token: Option<&str>, path: &Path, out: &mut dyn Write) -> Result<()> {
    let explanation = match token {
        Some(literal) => Explanation::new(inspect(literal)?, None, None),
        None => {
            let config = kubeconfig::load(path)?;
            let (context_name, context) = config.current().ok_or_else(|| {
                KubiError::ContextNotFound {
                    context: config.current_context.clone(),
                    detail: format!("no usable current-context in {}", path.display()),
                }
            })?;
            let stored = config
                .user(&context.user)
                .and_then(|u| u.token.as_deref())
                .ok_or_else(|| KubiError::ContextNotFound {
                    context: context_name.to_string(),
                    detail: format!("user '{}' has no bearer token", context.user),
                })?;

            let cluster = config
                .cluster(&context.cluster)
                .map(|c| server_host(&c.server));
            Explanation::new(inspect(stored)?, Some(context.user.as_str()), cluster)
        }
    };

    writeln!(out, "{}", explanation).map_err(stdout_failed)
}

/// `kubi token`: print a fresh token, optionally rotating it into the kubeconfig.
pub fn token(
    connection: &Connection,
    scope: Option<String>,
    rotate: Option<Option<String>>,
    path: &Path,
    out: &mut dyn Write,
) -> Result<()> {
    // Resolve the rotation target before asking for a password.
    let target = match rotate {
        Some(context) => Some(rotation_target(context, path)?),
        None => None,
    };

    let body = connection.acquire(Artifact::Token, scope)?;
    let issued = String::from_utf8(body)
        .map_err(|_| KubiError::MalformedToken("server returned a non UTF-8 token".to_string()))?;
    let issued = issued.trim();

    let written = match target {
        Some(context) => {
            inspect(issued)?;
            kubeconfig::rotate_token(path, &context, issued)?;
            writeln!(
                out,
                "Token for context '{}' updated in {}",
                context,
                path.display()
            )
        }
        None => writeln!(out, "{}", issued),
    };
    written.map_err(stdout_failed)
}

/// `kubi config`: fetch a full kubeconfig and create or merge the local file.
pub fn config(
    connection: &Connection,
    print_only: bool,
    path: &Path,
    out: &mut dyn Write,
) -> Result<()> {
    let url = connection.endpoint.artifact_url(Artifact::Bundle);
    let body = connection.acquire(Artifact::Bundle, None)?;
    let text = String::from_utf8(body).map_err(|e| {
        KubiError::ValidationFailed(format!("config returned by {} is not UTF-8: {}", url, e))
    })?;
    let bundle = KubeConfig::from_yaml(&text, &format!("config returned by {}", url))?;

    if print_only {
        return writeln!(
            out,
            "{}\n\nUse `kubi config` without --print to save it in {} next time.",
            text.trim_end(),
            path.display()
        )
        .map_err(stdout_failed);
    }

    let outcome = kubeconfig::persist_bundle(path, &bundle)?;
    let verb = match outcome {
        Persisted::Created => "saved in",
        Persisted::Merged => "merged into",
    };
    writeln!(out, "Great! Your config has been {} {}", verb, path.display())
        .map_err(stdout_failed)
}

pub fn version(out: &mut dyn Write) -> Result<()> {
    writeln!(out, "kubi {}", env!("CARGO_PKG_VERSION")).map_err(stdout_failed)
}

fn rotation_target(context: Option<String>, path: &Path) -> Result<String> {
    let config = kubeconfig::load_if_exists(path)?;
    let name = match context.filter(|c| !c.is_empty()) {
        Some(name) => name,
        None => config
            .as_ref()
            .map(|c| c.current_context.clone())
            .unwrap_or_default(),
    };

    let known = config
        .as_ref()
        .and_then(|c| c.context(&name))
        .is_some();
    if name.is_empty() || !known {
        return Err(KubiError::ContextNotFound {
            context: name,
            detail: format!("nothing to rotate in {}", path.display()),
        });
    }
    Ok(name)
}

fn server_host(server: &str) -> String {
    Url::parse(server)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| server.to_string())
}

fn stdout_failed(e: std::io::Error) -> KubiError {
    KubiError::file_io("write to", "stdout", e)
}
