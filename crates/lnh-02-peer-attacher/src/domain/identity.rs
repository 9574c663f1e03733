//! # Ephemeral Identity
//!
//! A throwaway self-signed certificate and key, generated per attachment and
//! never persisted. The harness presents it during the TLS upgrade and signs
//! its IP claim with it. [`verify_signature`] checks a peer's claim against
//! the certificate that peer presented.

use std::fmt;
use std::sync::Arc;

use rcgen::{generate_simple_self_signed, CertifiedKey};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::sign::{Signer as _, SigningKey};
use rustls::SignatureScheme;
use shared_types::NodeId;
use thiserror::Error;
use x509_parser::prelude::{FromDer, X509Certificate};

/// Subject alternative name carried by every ephemeral certificate.
const SUBJECT_ALT_NAME: &str = "localhost";

/// Schemes an identity may sign with, in order of preference.
const SIGNING_SCHEMES: [SignatureScheme; 4] = [
    SignatureScheme::ECDSA_NISTP256_SHA256,
    SignatureScheme::ECDSA_NISTP384_SHA384,
    SignatureScheme::ED25519,
    SignatureScheme::RSA_PSS_SHA256,
];

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("certificate generation failed: {0}")]
    Generate(String),

    #[error("unsupported private key: {0}")]
    UnsupportedKey(String),

    #[error("no signature scheme available for key")]
    NoScheme,

    #[error("signing failed: {0}")]
    Sign(String),

    #[error("malformed certificate: {0}")]
    Certificate(String),

    #[error("signature does not match certificate key")]
    BadSignature,
}

/// Certificate, private key and derived node identity of one attachment.
pub struct EphemeralIdentity {
    cert: CertificateDer<'static>,
    key: PrivatePkcs8KeyDer<'static>,
    node_id: NodeId,
}

impl EphemeralIdentity {
    /// Generate a fresh identity.
    pub fn generate() -> Result<Self, IdentityError> {
        let CertifiedKey { cert, key_pair } =
            generate_simple_self_signed(vec![SUBJECT_ALT_NAME.to_string()])
                .map_err(|e| IdentityError::Generate(e.to_string()))?;

        let cert = cert.der().clone();
        let key = PrivatePkcs8KeyDer::from(key_pair.serialize_der());
        let node_id = NodeId::from_cert(cert.as_ref());

        Ok(Self { cert, key, node_id })
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    pub fn certificate(&self) -> &CertificateDer<'static> {
        &self.cert
    }

    /// Copy of the private key in the form rustls consumes.
    pub fn private_key(&self) -> PrivateKeyDer<'static> {
        PrivateKeyDer::Pkcs8(self.key.clone_key())
    }

    /// Signing handle over the identity's private key.
    pub fn signer(&self) -> Result<IdentitySigner, IdentityError> {
        let key = rustls::crypto::ring::sign::any_supported_type(&self.private_key())
            .map_err(|e| IdentityError::UnsupportedKey(e.to_string()))?;
        Ok(IdentitySigner { key })
    }
}

impl fmt::Debug for EphemeralIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EphemeralIdentity")
            .field("node_id", &self.node_id)
            .finish_non_exhaustive()
    }
}

/// Signs messages with an identity's private key.
#[derive(Clone)]
pub struct IdentitySigner {
    key: Arc<dyn SigningKey>,
}

impl IdentitySigner {
    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>, IdentityError> {
        let signer = self
            .key
            .choose_scheme(&SIGNING_SCHEMES)
            .ok_or(IdentityError::NoScheme)?;
        signer
            .sign(message)
            .map_err(|e| IdentityError::Sign(e.to_string()))
    }
}

impl fmt::Debug for IdentitySigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentitySigner")
            .field("algorithm", &self.key.algorithm())
            .finish()
    }
}

/// Check that `signature` over `message` was made with the key of `cert`.
pub fn verify_signature(
    cert: &CertificateDer<'_>,
    message: &[u8],
    signature: &[u8],
) -> Result<(), IdentityError> {
    let (_, parsed) = X509Certificate::from_der(cert.as_ref())
        .map_err(|e| IdentityError::Certificate(e.to_string()))?;
    let public_key = parsed.public_key().subject_public_key.data.as_ref();

    let algorithms = rustls::crypto::ring::default_provider().signature_verification_algorithms;
    let verified = algorithms
        .mapping
        .iter()
        .filter(|(scheme, _)| SIGNING_SCHEMES.contains(scheme))
        .flat_map(|(_, candidates)| candidates.iter())
        .any(|algorithm| {
            algorithm
                .verify_signature(public_key, message, signature)
                .is_ok()
        });

    if verified {
        Ok(())
    } else {
        Err(IdentityError::BadSignature)
    }
}
