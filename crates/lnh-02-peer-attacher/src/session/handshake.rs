//! Validation of a peer's `Version` message.

use std::time::{SystemTime, UNIX_EPOCH};

use rustls::pki_types::CertificateDer;
use thiserror::Error;

use crate::config::PeerConfig;
use crate::domain::{ip_claim_bytes, verify_signature, ApplicationVersion, Message, VersionError};

/// Why a peer was refused during the handshake.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectReason {
    #[error("peer is on network {theirs}, expected {ours}")]
    NetworkMismatch { ours: u32, theirs: u32 },

    #[error("peer clock differs by {difference_secs}s, limit is {limit_secs}s")]
    ClockSkew { difference_secs: u64, limit_secs: u64 },

    #[error("incompatible version: {0}")]
    Version(#[from] VersionError),

    #[error("peer sent an unsigned ip claim")]
    UnsignedIpClaim,

    #[error("ip claim signature does not match the peer certificate")]
    InvalidIpClaimSignature,

    #[error("peer sent a second version message")]
    DuplicateVersion,

    #[error("peer is not allowed to connect")]
    NotAllowed,

    #[error("expected a version message, got {0}")]
    NotVersion(&'static str),
}

/// Current wall clock, unix seconds.
pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Check a received `Version` from the holder of `peer_cert` against our
/// configuration at time `now`.
///
/// Returns the peer's parsed application version.
pub(crate) fn validate_version(
    config: &PeerConfig,
    message: &Message,
    peer_cert: &CertificateDer<'_>,
    now: u64,
) -> Result<ApplicationVersion, RejectReason> {
    let Message::Version {
        network_id,
        my_time,
        ip,
        my_version,
        sig,
        ..
    } = message
    else {
        return Err(RejectReason::NotVersion(message.op().as_str()));
    };

    if *network_id != config.network_id {
        return Err(RejectReason::NetworkMismatch {
            ours: config.network_id,
            theirs: *network_id,
        });
    }

    let difference_secs = my_time.abs_diff(now);
    let limit_secs = config.max_clock_difference.as_secs();
    if difference_secs > limit_secs {
        return Err(RejectReason::ClockSkew {
            difference_secs,
            limit_secs,
        });
    }

    let version = config.version_parser.parse(my_version)?;
    config.version_compatibility.compatible(&version)?;

    if sig.is_empty() {
        return Err(RejectReason::UnsignedIpClaim);
    }
    verify_signature(peer_cert, &ip_claim_bytes(ip, *my_time), sig)
        .map_err(|_| RejectReason::InvalidIpClaimSignature)?;

    Ok(version)
}
