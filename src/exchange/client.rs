// src/exchange/client.rs
use super::transport::{describe, TransportConfig};
use crate::error::{KubiError, Result};
use crate::trust::TrustStore;
use crate::types::{Artifact, CredentialRequest, RemoteEndpoint};
use reqwest::StatusCode;
use tracing::{debug, warn};
use url::Url;

const MAX_DETAIL_LEN: usize = 512;

/// Trades the operator's credentials for a token or a kubeconfig bundle.
///
/// Exactly one request is issued. Only `201 Created` counts as success.
pub fn exchange(
    endpoint: &RemoteEndpoint,
    request: &CredentialRequest,
    trust: &TrustStore,
) -> Result<Vec<u8>> {
    let url = request_url(endpoint, request);
    let failed = |status: Option<u16>, detail: String| KubiError::ExchangeFailed {
        url: url.to_string(),
        status,
        detail,
    };

    let transport = TransportConfig::for_request(request, trust);
    if transport.is_insecure() {
        warn!("TLS verification disabled for {}", url);
    }
    let client = transport
        .build_client()
        .map_err(|e| failed(None, describe(&e)))?;

    debug!("Requesting {:?} from {} as {}", request.artifact, url, request.username);
    let response = client
        .get(url.clone())
        .basic_auth(&request.username, Some(request.secret()))
        .send()
        .map_err(|e| failed(None, describe(&e)))?;

    let status = response.status();
    if status != StatusCode::CREATED {
        let body = response.text().unwrap_or_default();
        return Err(failed(Some(status.as_u16()), failure_detail(status, &body)));
    }

    let body = response
        .bytes()
        .map_err(|e| failed(Some(status.as_u16()), describe(&e)))?;
    debug!("Exchange returned {} bytes", body.len());
    Ok(body.to_vec())
}

fn request_url(endpoint: &RemoteEndpoint, request: &CredentialRequest) -> Url {
    let mut url = endpoint.artifact_url(request.artifact);
    if request.artifact == Artifact::Token {
        if let Some(scope) = &request.scope {
            url.query_pairs_mut().append_pair("scopes", scope);
        }
    }
    url
}

fn failure_detail(status: StatusCode, body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        return status
            .canonical_reason()
            .unwrap_or("no response body")
            .to_string();
    }
    if body.len() > MAX_DETAIL_LEN {
        let cut = (0..=MAX_DETAIL_LEN)
            .rev()
            .find(|i| body.is_char_boundary(*i))
            .unwrap_or(0);
        format!("{}...", &body[..cut])
    } else {
        body.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ProxyMode, TrustMode};
    use base64::{engine::general_purpose, Engine as _};
    use crate::trust::test_certs::{issuing_ca, localhost_leaf};
    use httpmock::prelude::*;
    use openssl::{
        pkey::{PKey, Private},
        ssl::{SslAcceptor, SslMethod},
        x509::X509,
    };
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;
    use std::thread;

    fn endpoint(server: &MockServer) -> RemoteEndpoint {
        RemoteEndpoint::from_base_url(Url::parse(&server.base_url()).unwrap())
    }

    fn request(artifact: Artifact, scope: Option<&str>) -> CredentialRequest {
        CredentialRequest::new(
            "alice",
            "s3cret".to_string(),
            scope.map(str::to_string),
            TrustMode::Strict,
            ProxyMode::Direct,
            artifact,
        )
        .unwrap()
    }

    fn basic(user: &str, password: &str) -> String {
        format!(
            "Basic {}",
            general_purpose::STANDARD.encode(format!("{}:{}", user, password))
        )
    }

    #[test]
    fn token_request_carries_basic_auth_and_scope() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/token")
                .query_param("scopes", "promote")
                .header("authorization", basic("alice", "s3cret"));
            then.status(201).body("aaa.bbb.ccc");
        });

        let body = exchange(
            &endpoint(&server),
            &request(Artifact::Token, Some("promote")),
            &TrustStore::platform_only(),
        )
        .unwrap();

        mock.assert();
        assert_eq!(body, b"aaa.bbb.ccc");
    }

    #[test]
    fn bundle_request_hits_config_path_without_scope() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/config")
                .header("authorization", basic("alice", "s3cret"));
            then.status(201).body("apiVersion: v1\nkind: Config\n");
        });

        let mut req = request(Artifact::Bundle, Some("ignored"));
        req.trust = TrustMode::Insecure;
        let body = exchange(&endpoint(&server), &req, &TrustStore::platform_only()).unwrap();

        mock.assert();
        assert!(String::from_utf8(body).unwrap().starts_with("apiVersion"));
        assert_eq!(
            request_url(&endpoint(&server), &req).query(),
            None,
            "scope is only sent for tokens"
        );
    }

    #[test]
    fn unauthorized_is_an_exchange_failure_with_status() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/token");
            then.status(401).body("invalid credentials");
        });

        match exchange(
            &endpoint(&server),
            &request(Artifact::Token, None),
            &TrustStore::platform_only(),
        ) {
            Err(KubiError::ExchangeFailed { status, detail, .. }) => {
                assert_eq!(status, Some(401));
                assert_eq!(detail, "invalid credentials");
            }
            other => panic!("expected ExchangeFailed, got {:?}", other.map(|b| b.len())),
        }
    }

    #[test]
    fn plain_ok_is_not_success() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/token");
            then.status(200).body("aaa.bbb.ccc");
        });

        let err = exchange(
            &endpoint(&server),
            &request(Artifact::Token, None),
            &TrustStore::platform_only(),
        )
        .unwrap_err();

        mock.assert_hits(1);
        assert!(matches!(err, KubiError::ExchangeFailed { status: Some(200), .. }));
    }

    #[test]
    fn transport_failure_has_no_status() {
        let endpoint = RemoteEndpoint::from_base_url(Url::parse("http://127.0.0.1:1").unwrap());
        let err = exchange(
            &endpoint,
            &request(Artifact::Token, None),
            &TrustStore::platform_only(),
        )
        .unwrap_err();
        assert!(matches!(err, KubiError::ExchangeFailed { status: None, .. }));
    }

    /// Serves `201 aaa.bbb.ccc` over TLS on localhost until the test exits.
    fn serve_tls(cert: X509, key: PKey<Private>) -> u16 {
        let mut acceptor = SslAcceptor::mozilla_intermediate_v5(SslMethod::tls()).unwrap();
        acceptor.set_certificate(&cert).unwrap();
        acceptor.set_private_key(&key).unwrap();
        let acceptor = acceptor.build();

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                let Ok(mut tls) = acceptor.accept(stream) else {
                    continue;
                };
                let mut reader = BufReader::new(&mut tls);
                let mut line = String::new();
                loop {
                    line.clear();
                    match reader.read_line(&mut line) {
                        Ok(0) | Err(_) => break,
                        Ok(_) if line == "\r\n" => break,
                        Ok(_) => {}
                    }
                }
                drop(reader);
                let _ = tls.write_all(
                    b"HTTP/1.1 201 Created\r\nContent-Length: 11\r\nConnection: close\r\n\r\naaa.bbb.ccc",
                );
                let _ = tls.shutdown();
            }
        });
        port
    }

    #[test]
    fn strict_mode_verifies_the_server_with_the_fetched_ca() {
        let (ca, ca_key) = issuing_ca("kubi-test-root");
        let (leaf, leaf_key) = localhost_leaf(&ca, &ca_key);
        let port = serve_tls(leaf, leaf_key);
        let endpoint = RemoteEndpoint::parse(&format!("https://localhost:{}", port)).unwrap();

        let fetched = TrustStore::build(&ca.to_pem().unwrap());
        assert_eq!(fetched.appended(), 1);
        let body = exchange(&endpoint, &request(Artifact::Token, None), &fetched).unwrap();
        assert_eq!(body, b"aaa.bbb.ccc");

        let err = exchange(
            &endpoint,
            &request(Artifact::Token, None),
            &TrustStore::platform_only(),
        )
        .unwrap_err();
        assert!(matches!(err, KubiError::ExchangeFailed { status: None, .. }));

        let mut insecure = request(Artifact::Token, None);
        insecure.trust = TrustMode::Insecure;
        let body = exchange(&endpoint, &insecure, &TrustStore::platform_only()).unwrap();
        assert_eq!(body, b"aaa.bbb.ccc");
    }

    #[test]
    fn empty_failure_body_falls_back_to_reason() {
        assert_eq!(failure_detail(StatusCode::FORBIDDEN, "  "), "Forbidden");
        let long = "x".repeat(MAX_DETAIL_LEN + 10);
        assert!(failure_detail(StatusCode::BAD_GATEWAY, &long).ends_with("..."));
    }
}
