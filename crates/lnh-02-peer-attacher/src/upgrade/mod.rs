//! # TLS Upgrade
//!
//! Upgrades a raw peer connection to mutually authenticated TLS 1.3.
//!
//! Peers are identified by the certificate they present, not by a CA chain:
//! any well-formed certificate is accepted, handshake signatures are still
//! checked against it, and the peer's [`NodeId`] is derived from its leaf
//! certificate.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{verify_tls12_signature, verify_tls13_signature, CryptoProvider};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::server::danger::{ClientCertVerified, ClientCertVerifier};
use rustls::{ClientConfig, DigitallySignedStruct, DistinguishedName, ServerConfig, SignatureScheme};
use shared_types::NodeId;
use thiserror::Error;
use tokio_rustls::{TlsAcceptor, TlsConnector};
use tracing::debug;

use crate::domain::EphemeralIdentity;
use crate::ports::BoxedStream;

/// Server name sent in the client hello. Never verified.
const PEER_SERVER_NAME: &str = "localhost";

#[derive(Debug, Error)]
pub enum UpgradeError {
    #[error("tls configuration failed: {0}")]
    Config(#[from] rustls::Error),

    #[error("invalid server name {0:?}")]
    ServerName(String),

    #[error("tls handshake failed: {0}")]
    Io(#[from] io::Error),

    #[error("peer presented no certificate")]
    NoPeerCertificate,

    #[error("tls handshake timed out after {0:?}")]
    Timeout(Duration),
}

/// An upgraded connection and the identity of the peer on the other end.
pub struct Upgraded {
    pub stream: BoxedStream,
    pub peer_id: NodeId,
    pub cert: CertificateDer<'static>,
}

impl std::fmt::Debug for Upgraded {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Upgraded")
            .field("peer_id", &self.peer_id)
            .finish_non_exhaustive()
    }
}

fn provider() -> Arc<CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}

fn leaf(certs: Option<&[CertificateDer<'static>]>) -> Result<CertificateDer<'static>, UpgradeError> {
    certs
        .and_then(|certs| certs.first())
        .cloned()
        .ok_or(UpgradeError::NoPeerCertificate)
}

// =============================================================================
// Client
// =============================================================================

/// Dialing side of the upgrade, presenting an ephemeral identity.
#[derive(Clone)]
pub struct TlsClientUpgrader {
    connector: TlsConnector,
}

impl TlsClientUpgrader {
    pub fn new(identity: &EphemeralIdentity) -> Result<Self, UpgradeError> {
        let provider = provider();
        let config = ClientConfig::builder_with_provider(provider.clone())
            .with_protocol_versions(&[&rustls::version::TLS13])?
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyServerCert { provider }))
            .with_client_auth_cert(vec![identity.certificate().clone()], identity.private_key())?;

        Ok(Self {
            connector: TlsConnector::from(Arc::new(config)),
        })
    }

    /// Run the TLS handshake over `stream`.
    ///
    /// On error the connection is dropped, which closes it.
    pub async fn upgrade(&self, stream: BoxedStream) -> Result<Upgraded, UpgradeError> {
        let server_name = ServerName::try_from(PEER_SERVER_NAME)
            .map_err(|_| UpgradeError::ServerName(PEER_SERVER_NAME.to_string()))?;

        let tls = self.connector.connect(server_name, stream).await?;
        let cert = leaf(tls.get_ref().1.peer_certificates())?;
        let peer_id = NodeId::from_cert(cert.as_ref());
        debug!(%peer_id, "tls client upgrade complete");

        Ok(Upgraded {
            stream: Box::new(tls),
            peer_id,
            cert,
        })
    }
}

// =============================================================================
// Server
// =============================================================================

/// Accepting side of the upgrade. Requires a client certificate.
#[derive(Clone)]
pub struct TlsServerUpgrader {
    acceptor: TlsAcceptor,
}

impl TlsServerUpgrader {
    pub fn new(identity: &EphemeralIdentity) -> Result<Self, UpgradeError> {
        let provider = provider();
        let config = ServerConfig::builder_with_provider(provider.clone())
            .with_protocol_versions(&[&rustls::version::TLS13])?
            .with_client_cert_verifier(Arc::new(AcceptAnyClientCert { provider }))
            .with_single_cert(vec![identity.certificate().clone()], identity.private_key())?;

        Ok(Self {
            acceptor: TlsAcceptor::from(Arc::new(config)),
        })
    }

    pub async fn upgrade(&self, stream: BoxedStream) -> Result<Upgraded, UpgradeError> {
        let tls = self.acceptor.accept(stream).await?;
        let cert = leaf(tls.get_ref().1.peer_certificates())?;
        let peer_id = NodeId::from_cert(cert.as_ref());
        debug!(%peer_id, "tls server upgrade complete");

        Ok(Upgraded {
            stream: Box::new(tls),
            peer_id,
            cert,
        })
    }
}

// =============================================================================
// Verifiers
// =============================================================================

/// Accepts any server certificate; still checks handshake signatures.
#[derive(Debug)]
struct AcceptAnyServerCert {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for AcceptAnyServerCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

/// Requires and accepts any client certificate; still checks handshake
/// signatures.
#[derive(Debug)]
struct AcceptAnyClientCert {
    provider: Arc<CryptoProvider>,
}

impl ClientCertVerifier for AcceptAnyClientCert {
    fn client_auth_mandatory(&self) -> bool {
        true
    }

    fn root_hint_subjects(&self) -> &[DistinguishedName] {
        &[]
    }

    fn verify_client_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _now: UnixTime,
    ) -> Result<ClientCertVerified, rustls::Error> {
        Ok(ClientCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}
