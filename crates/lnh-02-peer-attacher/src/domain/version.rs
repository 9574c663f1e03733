//! # Application Versions
//!
//! Versions travel as `app/major.minor.patch` strings inside the `Version`
//! message. A [`VersionParser`] turns them back into [`ApplicationVersion`]s
//! and a [`VersionCompatibility`] policy decides whether a peer is accepted.

use std::cmp::Ordering;
use std::fmt;

use shared_types::KOPERNIKUS_ID;
use thiserror::Error;

/// Application name advertised by the node binary.
pub const APP_NAME: &str = "camino";

/// Version advertised by the harness.
pub fn current_version() -> ApplicationVersion {
    ApplicationVersion::new(APP_NAME, 1, 4, 10)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    #[error("malformed version string {0:?}")]
    Malformed(String),

    #[error("peer application {peer:?} differs from {ours:?}")]
    ApplicationMismatch { peer: String, ours: String },

    #[error("peer major version {peer} differs from {ours}")]
    MajorMismatch { peer: u32, ours: u32 },

    #[error("peer version {peer} is older than minimum compatible {minimum}")]
    TooOld { peer: String, minimum: String },
}

/// A semantic version tagged with its application name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ApplicationVersion {
    pub app: String,
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl ApplicationVersion {
    pub fn new(app: impl Into<String>, major: u32, minor: u32, patch: u32) -> Self {
        Self {
            app: app.into(),
            major,
            minor,
            patch,
        }
    }

    /// Numeric ordering, ignoring the application name.
    pub fn compare(&self, other: &ApplicationVersion) -> Ordering {
        (self.major, self.minor, self.patch).cmp(&(other.major, other.minor, other.patch))
    }

    pub fn before(&self, other: &ApplicationVersion) -> bool {
        self.compare(other) == Ordering::Less
    }
}

impl fmt::Display for ApplicationVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}.{}.{}", self.app, self.major, self.minor, self.patch)
    }
}

/// Parses advertised version strings.
pub trait VersionParser: Send + Sync {
    fn parse(&self, value: &str) -> Result<ApplicationVersion, VersionError>;
}

/// Parser for the `app/major.minor.patch` format.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultVersionParser;

impl VersionParser for DefaultVersionParser {
    fn parse(&self, value: &str) -> Result<ApplicationVersion, VersionError> {
        let malformed = || VersionError::Malformed(value.to_string());

        let (app, numbers) = value.split_once('/').ok_or_else(malformed)?;
        if app.is_empty() {
            return Err(malformed());
        }

        let mut parts = numbers.split('.');
        let mut next = || -> Result<u32, VersionError> {
            parts
                .next()
                .and_then(|p| p.parse::<u32>().ok())
                .ok_or_else(malformed)
        };
        let major = next()?;
        let minor = next()?;
        let patch = next()?;
        if parts.next().is_some() {
            return Err(malformed());
        }

        Ok(ApplicationVersion::new(app, major, minor, patch))
    }
}

/// Decides which peer versions a session accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionCompatibility {
    current: ApplicationVersion,
    min_compatible: ApplicationVersion,
}

impl VersionCompatibility {
    pub fn new(current: ApplicationVersion, min_compatible: ApplicationVersion) -> Self {
        Self {
            current,
            min_compatible,
        }
    }

    /// Policy used on `network_id`.
    ///
    /// Kopernikus still runs nodes from the previous minor release line.
    pub fn for_network(network_id: u32) -> Self {
        let min_compatible = if network_id == KOPERNIKUS_ID {
            ApplicationVersion::new(APP_NAME, 1, 3, 0)
        } else {
            ApplicationVersion::new(APP_NAME, 1, 4, 0)
        };
        Self::new(current_version(), min_compatible)
    }

    pub fn current(&self) -> &ApplicationVersion {
        &self.current
    }

    pub fn min_compatible(&self) -> &ApplicationVersion {
        &self.min_compatible
    }

    pub fn compatible(&self, peer: &ApplicationVersion) -> Result<(), VersionError> {
        if peer.app != self.current.app {
            return Err(VersionError::ApplicationMismatch {
                peer: peer.app.clone(),
                ours: self.current.app.clone(),
            });
        }
        if peer.major != self.current.major {
            return Err(VersionError::MajorMismatch {
                peer: peer.major,
                ours: self.current.major,
            });
        }
        if peer.before(&self.min_compatible) {
            return Err(VersionError::TooOld {
                peer: peer.to_string(),
                minimum: self.min_compatible.to_string(),
            });
        }
        Ok(())
    }
}
