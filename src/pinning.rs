//! TLS certificate pinning against provider-supplied pin sets
//!
//! Pins are SHA-256 digests of the leaf certificate's SubjectPublicKeyInfo
//! in DER form, base64-encoded, exactly as the attestation provider emits
//! them. Certificate chains are validated normally first; the pin check is
//! an additional constraint on hosts that appear in the pin map.

use std::collections::HashMap;
use std::sync::Arc;

use base64::Engine;
use der::Encode;
use rustls::pki_types::CertificateDer;
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::provider::PinSet;

/// Compute the SHA-256 digest of a certificate's SubjectPublicKeyInfo.
///
/// The full SPKI DER encoding is hashed (algorithm identifier plus public
/// key bits), matching how the provider computes pin digests.
pub fn spki_sha256(cert_der: &CertificateDer<'_>) -> Result<[u8; 32]> {
    use der::Decode;
    use x509_cert::Certificate;

    let cert = Certificate::from_der(cert_der.as_ref())
        .map_err(|e| Error::Pinning(format!("failed to parse certificate: {}", e)))?;

    let spki_der = cert
        .tbs_certificate
        .subject_public_key_info
        .to_der()
        .map_err(|e| Error::Pinning(format!("failed to encode SPKI: {}", e)))?;

    Ok(Sha256::digest(&spki_der).into())
}

/// Decode a provider pin into digest bytes.
///
/// Accepts the raw base64 form the provider emits and the `"sha256/"`
/// prefixed form some pinning libraries expect. Digests that are not
/// 32 bytes are rejected.
fn decode_pin(pin: &str) -> Option<[u8; 32]> {
    let encoded = pin.strip_prefix("sha256/").unwrap_or(pin);
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .ok()?;
    bytes.try_into().ok()
}

/// Certificate verifier that pins listed domains to their SPKI digests
///
/// Chain validation (CA signatures, expiry, hostname) runs first through the
/// standard webpki verifier. When the server name has an entry in the pin
/// map, the leaf certificate's SPKI digest must additionally match one of
/// the listed pins. Hosts absent from the map pass on chain validation
/// alone.
#[derive(Debug)]
pub struct PinnedCertVerifier {
    pins: HashMap<String, Vec<[u8; 32]>>,
    inner: Arc<rustls::client::WebPkiServerVerifier>,
}

impl PinnedCertVerifier {
    /// Build a verifier from provider pin material.
    pub fn new(pin_set: &PinSet) -> Result<Self> {
        // reqwest may have compiled in a second crypto provider; make the
        // choice unambiguous before the webpki builder consults the default.
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

        let root_store = rustls::RootCertStore {
            roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
        };

        let inner = rustls::client::WebPkiServerVerifier::builder(Arc::new(root_store))
            .build()
            .map_err(|e| Error::Pinning(format!("failed to build verifier: {}", e)))?;

        let mut pins: HashMap<String, Vec<[u8; 32]>> = HashMap::new();
        for (domain, digests) in pin_set {
            let mut decoded = Vec::with_capacity(digests.len());
            for pin in digests {
                match decode_pin(pin) {
                    Some(digest) => decoded.push(digest),
                    None => tracing::warn!("Approov pin for {} is malformed, skipped", domain),
                }
            }
            pins.insert(domain.clone(), decoded);
        }

        Ok(PinnedCertVerifier { pins, inner })
    }

    /// Whether a pin list is configured for `host` (may be empty).
    pub fn pins_host(&self, host: &str) -> bool {
        self.pins.contains_key(host)
    }

    fn check_pin(
        &self,
        host: &str,
        end_entity: &CertificateDer<'_>,
    ) -> std::result::Result<(), rustls::Error> {
        let Some(expected) = self.pins.get(host) else {
            return Ok(());
        };
        let digest = spki_sha256(end_entity)
            .map_err(|e| rustls::Error::General(format!("pin digest computation failed: {}", e)))?;
        if expected.contains(&digest) {
            Ok(())
        } else {
            Err(rustls::Error::General(format!(
                "certificate pin mismatch for {}: sha256/{}",
                host,
                base64::engine::general_purpose::STANDARD.encode(digest)
            )))
        }
    }
}

impl rustls::client::danger::ServerCertVerifier for PinnedCertVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &rustls::pki_types::ServerName<'_>,
        ocsp_response: &[u8],
        now: rustls::pki_types::UnixTime,
    ) -> std::result::Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        self.inner
            .verify_server_cert(end_entity, intermediates, server_name, ocsp_response, now)?;

        if let rustls::pki_types::ServerName::DnsName(dns) = server_name {
            self.check_pin(dns.as_ref(), end_entity)?;
        }

        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        self.inner.supported_verify_schemes()
    }
}

/// Build a rustls client config enforcing the given pin set.
pub fn pinned_tls_config(pin_set: &PinSet) -> Result<rustls::ClientConfig> {
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let verifier = PinnedCertVerifier::new(pin_set)?;

    let config = rustls::ClientConfig::builder()
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(verifier))
        .with_no_client_auth();

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn self_signed(host: &str) -> (CertificateDer<'static>, Vec<u8>) {
        let key = rcgen::KeyPair::generate().unwrap();
        let cert = rcgen::CertificateParams::new(vec![host.to_string()])
            .unwrap()
            .self_signed(&key)
            .unwrap();
        use rcgen::PublicKeyData;
        (cert.der().clone(), key.subject_public_key_info())
    }

    fn pin_of(spki_der: &[u8]) -> String {
        base64::engine::general_purpose::STANDARD.encode(Sha256::digest(spki_der))
    }

    #[test]
    fn decode_pin_accepts_both_forms() {
        let digest = [7u8; 32];
        let b64 = base64::engine::general_purpose::STANDARD.encode(digest);
        assert_eq!(decode_pin(&b64), Some(digest));
        assert_eq!(decode_pin(&format!("sha256/{}", b64)), Some(digest));
    }

    #[test]
    fn decode_pin_rejects_garbage() {
        assert_eq!(decode_pin("not base64!!"), None);
        // valid base64 of the wrong digest length
        let short = base64::engine::general_purpose::STANDARD.encode([1u8; 16]);
        assert_eq!(decode_pin(&short), None);
    }

    #[test]
    fn spki_digest_matches_public_key_der() {
        let (cert_der, spki_der) = self_signed("api.example.com");
        let digest = spki_sha256(&cert_der).unwrap();
        let expected: [u8; 32] = Sha256::digest(&spki_der).into();
        assert_eq!(digest, expected);
    }

    #[test]
    fn pin_check_on_listed_host() {
        let (cert_der, spki_der) = self_signed("api.example.com");
        let mut pin_set = PinSet::new();
        pin_set.insert("api.example.com".into(), vec![pin_of(&spki_der)]);
        let verifier = PinnedCertVerifier::new(&pin_set).unwrap();

        assert!(verifier.check_pin("api.example.com", &cert_der).is_ok());
    }

    #[test]
    fn pin_mismatch_rejected() {
        let (cert_der, _) = self_signed("api.example.com");
        let (_, other_spki) = self_signed("api.example.com");
        let mut pin_set = PinSet::new();
        pin_set.insert("api.example.com".into(), vec![pin_of(&other_spki)]);
        let verifier = PinnedCertVerifier::new(&pin_set).unwrap();

        assert!(verifier.check_pin("api.example.com", &cert_der).is_err());
    }

    #[test]
    fn unlisted_host_is_not_pinned() {
        let (cert_der, spki_der) = self_signed("api.example.com");
        let mut pin_set = PinSet::new();
        pin_set.insert("api.example.com".into(), vec![pin_of(&spki_der)]);
        let verifier = PinnedCertVerifier::new(&pin_set).unwrap();

        assert!(!verifier.pins_host("images.cdn.example"));
        assert!(verifier.check_pin("images.cdn.example", &cert_der).is_ok());
    }

    #[test]
    fn malformed_pins_are_skipped() {
        let (cert_der, spki_der) = self_signed("api.example.com");
        let mut pin_set = PinSet::new();
        pin_set.insert(
            "api.example.com".into(),
            vec!["!!garbage!!".into(), pin_of(&spki_der)],
        );
        let verifier = PinnedCertVerifier::new(&pin_set).unwrap();

        assert!(verifier.check_pin("api.example.com", &cert_der).is_ok());
    }

    #[test]
    fn pinned_config_builds() {
        let mut pin_set = PinSet::new();
        pin_set.insert("api.example.com".into(), vec![pin_of(&[1, 2, 3])]);
        assert!(pinned_tls_config(&pin_set).is_ok());
    }
}
