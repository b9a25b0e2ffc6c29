// src/app/explain.rs
use crate::token::TokenClaims;
use chrono::{DateTime, Utc};
use std::fmt;

/// What `kubi explain` prints about a token.
pub struct Explanation {
    pub user: String,
    pub cluster: Option<String>,
    pub claims: TokenClaims,
    pub now: DateTime<Utc>,
}

impl Explanation {
    pub fn new(claims: TokenClaims, fallback_user: Option<&str>, cluster: Option<String>) -> Self {
        let user = match claims.subject() {
            "" => fallback_user.unwrap_or_default().to_string(),
            subject => subject.to_string(),
        };
        Self {
            user,
            cluster,
            claims,
            now: Utc::now(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.claims.is_valid_at(self.now)
    }
}

fn section(f: &mut fmt::Formatter<'_>, title: &str, body: &str) -> fmt::Result {
    writeln!(f, "{}", title)?;
    writeln!(f, "{}", "-".repeat(title.len()))?;
    writeln!(f, "{}", body)?;
    writeln!(f)
}

impl fmt::Display for Explanation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        section(f, "User", &self.user)?;
        if let Some(cluster) = &self.cluster {
            section(f, "Cluster", cluster)?;
        }

        let namespaces = self
            .claims
            .auths
            .iter()
            .map(|grant| match grant.role.as_str() {
                "" => grant.namespace.clone(),
                role => format!("{} ({})", grant.namespace, role),
            })
            .collect::<Vec<_>>()
            .join("\n");
        section(f, "Namespaces", &namespaces)?;

        section(f, "Admin access", if self.claims.admin_access { "yes" } else { "no" })?;
        if !self.claims.iss.is_empty() {
            section(f, "Issuer", &self.claims.iss)?;
        }

        let expires = self
            .claims
            .expires_at()
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "unknown".to_string());
        let state = if self.is_valid() { "valid" } else { "expired" };
        section(f, "Expires", &format!("{} ({})", expires, state))?;

        write!(
            f,
            "Note: the token signature is not verified, validity reflects expiry only."
        )
    }
}
