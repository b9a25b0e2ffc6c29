// src/error.rs
use std::{io, path::PathBuf};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, KubiError>;

#[derive(Debug, Error)]
pub enum KubiError {
    #[error("could not fetch the server CA from {url}: {reason}")]
    TrustBootstrapFailed { url: String, reason: String },

    #[error("credential exchange with {url} failed{}: {detail}", status_suffix(.status))]
    ExchangeFailed {
        url: String,
        status: Option<u16>,
        detail: String,
    },

    #[error("malformed token: {0}")]
    MalformedToken(String),

    #[error("context '{context}' not found: {detail}")]
    ContextNotFound { context: String, detail: String },

    #[error("failed to {action} {}", .path.display())]
    FileIo {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{origin} is not a valid kubeconfig document")]
    MalformedConfig {
        origin: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("{0}")]
    ValidationFailed(String),
}

fn status_suffix(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" with HTTP {}", code),
        None => String::new(),
    }
}

impl KubiError {
    pub fn file_io(action: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        KubiError::FileIo {
            action,
            path: path.into(),
            source,
        }
    }

    /// Renders the error followed by every underlying cause, one per line.
    pub fn report(&self) -> String {
        let mut message = self.to_string();
        let mut current = std::error::Error::source(self);
        while let Some(cause) = current {
            message.push_str("\n  caused by: ");
            message.push_str(&cause.to_string());
            current = cause.source();
        }
        message
    }
}
