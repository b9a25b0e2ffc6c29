// src/token/claims.rs
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;

/// A namespace and the role granted in it.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Grant {
    pub namespace: String,
    pub role: String,
}

/// The claims kubi puts in its tokens. Every field is optional on the wire.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TokenClaims {
    pub exp: i64,
    pub auths: Vec<Grant>,
    #[serde(rename = "adminAccess")]
    pub admin_access: bool,
    pub iss: String,
    pub user: String,
    pub sub: String,
}

impl TokenClaims {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.exp, 0).single()
    }

    /// Expiry check only. Says nothing about who signed the token.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() < self.exp
    }

    pub fn subject(&self) -> &str {
        if self.user.is_empty() {
            &self.sub
        } else {
            &self.user
        }
    }
}
