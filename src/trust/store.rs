// src/trust/store.rs
use chrono::{TimeZone, Utc};
use openssl::{
    hash::{hash, MessageDigest},
    x509::{store::X509StoreBuilder, X509},
};
use reqwest::{blocking::ClientBuilder, Certificate};
use tracing::{debug, warn};
use x509_parser::prelude::{FromDer, X509Certificate};

/// Roots used to verify the kubi server during the credential exchange.
///
/// Built from the platform roots (when the platform store can be loaded) plus
/// whatever certificates the server handed out on its CA endpoint.
#[derive(Clone)]
pub struct TrustStore {
    platform_roots: bool,
    extra_roots: Vec<Certificate>,
    fingerprints: Vec<String>,
}

impl TrustStore {
    pub fn platform_only() -> Self {
        Self {
            platform_roots: platform_roots_available(),
            extra_roots: Vec::new(),
            fingerprints: Vec::new(),
        }
    }

    /// Starts from the platform roots and appends the fetched CA material.
    ///
    /// Material that cannot be parsed is dropped with a warning and the store
    /// stays platform-only; the exchange itself will fail on a real mismatch.
    pub fn build(ca_bytes: &[u8]) -> Self {
        let mut store = Self::platform_only();
        if !store.platform_roots {
            warn!("Platform trust roots unavailable, starting from an empty root set");
        }

        let certs = match parse_certificates(ca_bytes) {
            Ok(certs) => certs,
            Err(e) => {
                warn!("No certs appended, using system certs only: {}", e);
                return store;
            }
        };

        for cert in certs {
            let der = match cert.to_der() {
                Ok(der) => der,
                Err(e) => {
                    warn!("Skipping CA certificate that cannot be encoded: {}", e);
                    continue;
                }
            };
            match Certificate::from_der(&der) {
                Ok(root) => {
                    let fingerprint = fingerprint(&der);
                    describe(&der, &fingerprint);
                    store.extra_roots.push(root);
                    store.fingerprints.push(fingerprint);
                }
                Err(e) => warn!("Skipping CA certificate rejected by the TLS backend: {}", e),
            }
        }

        if store.extra_roots.is_empty() {
            warn!("No certs appended, using system certs only");
        }
        store
    }

    pub fn appended(&self) -> usize {
        self.extra_roots.len()
    }

    pub fn uses_platform_roots(&self) -> bool {
        self.platform_roots
    }

    /// SHA-256 fingerprints (hex) of the appended certificates.
    pub fn fingerprints(&self) -> &[String] {
        &self.fingerprints
    }

    pub(crate) fn apply(&self, builder: ClientBuilder) -> ClientBuilder {
        self.extra_roots
            .iter()
            .cloned()
            .fold(
                builder.tls_built_in_root_certs(self.platform_roots),
                ClientBuilder::add_root_certificate,
            )
    }
}

fn platform_roots_available() -> bool {
    X509StoreBuilder::new()
        .and_then(|mut builder| builder.set_default_paths())
        .is_ok()
}

/// Accepts a PEM bundle (one or more certificates) or a single DER certificate.
fn parse_certificates(bytes: &[u8]) -> Result<Vec<X509>, String> {
    if bytes.is_empty() {
        return Err("CA response was empty".to_string());
    }

    let certs = if bytes.windows(10).any(|w| w == b"-----BEGIN") {
        X509::stack_from_pem(bytes).map_err(|e| e.to_string())?
    } else {
        vec![X509::from_der(bytes).map_err(|e| e.to_string())?]
    };

    if certs.is_empty() {
        return Err("no certificate found in CA response".to_string());
    }
    Ok(certs)
}

fn fingerprint(der: &[u8]) -> String {
    hash(MessageDigest::sha256(), der)
        .map(hex::encode)
        .unwrap_or_default()
}

fn describe(der: &[u8], fingerprint: &str) {
    match X509Certificate::from_der(der) {
        Ok((_, cert)) => {
            let not_after = Utc
                .timestamp_opt(cert.validity().not_after.timestamp(), 0)
                .single()
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "unknown".to_string());
            debug!(
                "Trusting CA subject={} not_after={} sha256={}",
                cert.subject(),
                not_after,
                fingerprint
            );
        }
        Err(e) => debug!("Trusting CA sha256={} (unparsed: {})", fingerprint, e),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use openssl::{
        asn1::Asn1Time,
        bn::BigNum,
        ec::{EcGroup, EcKey},
        nid::Nid,
        pkey::{PKey, Private},
        x509::{
            extension::{BasicConstraints, KeyUsage, SubjectAlternativeName},
            X509Builder, X509Name, X509NameBuilder, X509NameRef, X509,
        },
    };

    fn key() -> PKey<Private> {
        let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
        PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap()
    }

    fn name(common_name: &str) -> X509Name {
        let mut name = X509NameBuilder::new().unwrap();
        name.append_entry_by_text("CN", common_name).unwrap();
        name.build()
    }

    fn builder(
        subject: &X509NameRef,
        issuer: &X509NameRef,
        key: &PKey<Private>,
        serial: u32,
    ) -> X509Builder {
        let mut builder = X509::builder().unwrap();
        builder.set_version(2).unwrap();
        let serial = BigNum::from_u32(serial).unwrap().to_asn1_integer().unwrap();
        builder.set_serial_number(&serial).unwrap();
        builder.set_subject_name(subject).unwrap();
        builder.set_issuer_name(issuer).unwrap();
        builder.set_pubkey(key).unwrap();
        builder
            .set_not_before(&Asn1Time::days_from_now(0).unwrap())
            .unwrap();
        builder
            .set_not_after(&Asn1Time::days_from_now(30).unwrap())
            .unwrap();
        builder
    }

    /// A root CA able to sign server certificates, with its key.
    pub(crate) fn issuing_ca(common_name: &str) -> (X509, PKey<Private>) {
        let key = key();
        let name = name(common_name);
        let mut builder = builder(&name, &name, &key, 1);
        builder
            .append_extension(BasicConstraints::new().critical().ca().build().unwrap())
            .unwrap();
        builder
            .append_extension(
                KeyUsage::new()
                    .critical()
                    .key_cert_sign()
                    .crl_sign()
                    .build()
                    .unwrap(),
            )
            .unwrap();
        builder.sign(&key, MessageDigest::sha256()).unwrap();
        (builder.build(), key)
    }

    pub(crate) fn self_signed_ca(common_name: &str) -> X509 {
        issuing_ca(common_name).0
    }

    /// A server certificate for `localhost` issued by `ca`.
    pub(crate) fn localhost_leaf(ca: &X509, ca_key: &PKey<Private>) -> (X509, PKey<Private>) {
        let key = key();
        let mut builder = builder(&name("localhost"), ca.subject_name(), &key, 2);
        let san = SubjectAlternativeName::new()
            .dns("localhost")
            .ip("127.0.0.1")
            .build(&builder.x509v3_context(Some(ca), None))
            .unwrap();
        builder.append_extension(san).unwrap();
        builder
            .append_extension(BasicConstraints::new().build().unwrap())
            .unwrap();
        builder.sign(ca_key, MessageDigest::sha256()).unwrap();
        (builder.build(), key)
    }

    #[test]
    fn appends_every_certificate_in_a_pem_bundle() {
        let mut pem = self_signed_ca("kubi-root").to_pem().unwrap();
        pem.extend(self_signed_ca("kubi-intermediate").to_pem().unwrap());

        let store = TrustStore::build(&pem);
        assert_eq!(store.appended(), 2);
        assert_eq!(store.fingerprints().len(), 2);
        assert_ne!(store.fingerprints()[0], store.fingerprints()[1]);
    }

    #[test]
    fn accepts_a_single_der_certificate() {
        let der = self_signed_ca("kubi-der").to_der().unwrap();
        let store = TrustStore::build(&der);
        assert_eq!(store.appended(), 1);
        assert_eq!(store.fingerprints()[0].len(), 64);
    }

    #[test]
    fn malformed_material_degrades_to_platform_roots() {
        let store = TrustStore::build(b"-----BEGIN CERTIFICATE-----\nnot base64\n");
        assert_eq!(store.appended(), 0);
        assert_eq!(store.uses_platform_roots(), platform_roots_available());

        let store = TrustStore::build(b"");
        assert_eq!(store.appended(), 0);
    }

    #[test]
    fn trust_store_produces_a_working_client_builder() {
        let pem = self_signed_ca("kubi-client").to_pem().unwrap();
        let store = TrustStore::build(&pem);
        assert!(store.apply(reqwest::blocking::Client::builder()).build().is_ok());
    }
}
