// src/token/inspect.rs
use super::TokenClaims;
use crate::error::{KubiError, Result};
use base64::{engine::general_purpose, Engine as _};

/// Decodes the claims of a `header.claims.signature` token.
///
/// This is a display helper. The signature segment is never checked, so a
/// token reported as valid here is only unexpired, not authentic.
pub fn inspect(token: &str) -> Result<TokenClaims> {
    let segments: Vec<&str> = token.trim().split('.').collect();
    if segments.len() != 3 {
        return Err(KubiError::MalformedToken(format!(
            "expected 3 dot-separated segments, found {}",
            segments.len()
        )));
    }

    let payload = decode_segment(segments[1])?;
    serde_json::from_slice(&payload)
        .map_err(|e| KubiError::MalformedToken(format!("claims are not valid JSON: {}", e)))
}

/// Right-pads a base64 string with `=` up to the next multiple of 4.
///
/// kubi emits the claims segment without padding.
pub fn pad_base64(segment: &str) -> String {
    let missing = (4 - segment.len() % 4) % 4;
    format!("{}{}", segment, "=".repeat(missing))
}

fn decode_segment(segment: &str) -> Result<Vec<u8>> {
    let padded = pad_base64(segment);
    general_purpose::STANDARD
        .decode(&padded)
        .or_else(|_| general_purpose::URL_SAFE.decode(&padded))
        .map_err(|e| KubiError::MalformedToken(format!("claims segment is not base64: {}", e)))
}
