//! Enumerations for AARQ/AARE APDUs
//!
//! Reference: DLMS Green Book Ed. 12, Section 11

use std::fmt;

use derive_try_from_primitive::TryFromPrimitive;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Authentication mechanism, the last arc of the mechanism-name OID
/// `2.16.756.5.8.2.x`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, TryFromPrimitive)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum AuthenticationMechanism {
    /// No authentication
    #[default]
    Lowest = 0,
    /// Password
    Lls = 1,
    /// Manufacturer specific
    Hls = 2,
    HlsMd5 = 3,
    HlsSha1 = 4,
    HlsGmac = 5,
    HlsSha256 = 6,
    HlsEcdsa = 7,
}

const MECHANISM_NAME_PREFIX: [u8; 6] = [0x60, 0x85, 0x74, 0x05, 0x08, 0x02];

impl AuthenticationMechanism {
    /// Whether the association needs the second challenge round trip.
    pub const fn is_high_level(self) -> bool {
        !matches!(self, Self::Lowest | Self::Lls)
    }

    /// The encoded mechanism-name OID.
    pub fn oid_bytes(self) -> [u8; 7] {
        let [a, b, c, d, e, f] = MECHANISM_NAME_PREFIX;
        [a, b, c, d, e, f, self as u8]
    }

    pub fn from_oid_bytes(bytes: &[u8]) -> Option<Self> {
        match bytes {
            [prefix @ .., last] if prefix == MECHANISM_NAME_PREFIX => Self::try_from(*last).ok(),
            _ => None,
        }
    }
}

impl fmt::Display for AuthenticationMechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Lowest => "lowest",
            Self::Lls => "LLS",
            Self::Hls => "HLS",
            Self::HlsMd5 => "HLS-MD5",
            Self::HlsSha1 => "HLS-SHA1",
            Self::HlsGmac => "HLS-GMAC",
            Self::HlsSha256 => "HLS-SHA256",
            Self::HlsEcdsa => "HLS-ECDSA",
        };
        f.write_str(name)
    }
}

/// Security suite applied to the association.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SecurityContext {
    #[default]
    None,
    Authentication,
    Encryption,
    AuthenticatedEncryption,
}

impl SecurityContext {
    pub const fn is_active(self) -> bool {
        !matches!(self, Self::None)
    }
}

/// Application context name, `2.16.756.5.8.1.x`. Only logical-name
/// referencing is supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplicationContextName {
    /// `...1.1`
    LogicalName,
    /// `...1.3`
    LogicalNameWithCiphering,
}

impl ApplicationContextName {
    pub const fn for_security(security: SecurityContext) -> Self {
        if security.is_active() { Self::LogicalNameWithCiphering } else { Self::LogicalName }
    }

    pub fn oid_bytes(self) -> &'static [u8] {
        match self {
            Self::LogicalName => &[0x60, 0x85, 0x74, 0x05, 0x08, 0x01, 0x01],
            Self::LogicalNameWithCiphering => &[0x60, 0x85, 0x74, 0x05, 0x08, 0x01, 0x03],
        }
    }

    pub fn from_oid_bytes(bytes: &[u8]) -> Option<Self> {
        match bytes {
            [0x60, 0x85, 0x74, 0x05, 0x08, 0x01, 0x01] => Some(Self::LogicalName),
            [0x60, 0x85, 0x74, 0x05, 0x08, 0x01, 0x03] => Some(Self::LogicalNameWithCiphering),
            _ => None,
        }
    }
}

/// Association result carried in the AARE.
///
/// Reference: Green Book Table 138
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[cfg_attr(feature = "serde", derive(Serialize))]
#[repr(u8)]
pub enum AssociationResult {
    Accepted = 0,
    RejectedPermanent = 1,
    RejectedTransient = 2,
}

impl fmt::Display for AssociationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Accepted => write!(f, "accepted"),
            Self::RejectedPermanent => write!(f, "rejected (permanent)"),
            Self::RejectedTransient => write!(f, "rejected (transient)"),
        }
    }
}

/// ACSE service-user diagnostic, the reason a server gives for rejecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum AcseServiceUserDiagnostic {
    Null,
    NoReasonGiven,
    ApplicationContextNameNotSupported,
    CallingApTitleNotRecognized,
    AuthenticationMechanismNameNotRecognised,
    AuthenticationMechanismNameRequired,
    AuthenticationFailure,
    AuthenticationRequired,
    Other(u8),
}

impl From<u8> for AcseServiceUserDiagnostic {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::Null,
            1 => Self::NoReasonGiven,
            2 => Self::ApplicationContextNameNotSupported,
            3 => Self::CallingApTitleNotRecognized,
            11 => Self::AuthenticationMechanismNameNotRecognised,
            12 => Self::AuthenticationMechanismNameRequired,
            13 => Self::AuthenticationFailure,
            14 => Self::AuthenticationRequired,
            other => Self::Other(other),
        }
    }
}

/// Result-source-diagnostic: which side of the ACSE produced the verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum SourceDiagnostic {
    ServiceUser(AcseServiceUserDiagnostic),
    /// 0 null, 1 no reason given, 2 no common ACSE version
    ServiceProvider(u8),
}

impl fmt::Display for SourceDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ServiceUser(diagnostic) => write!(f, "service user: {diagnostic:?}"),
            Self::ServiceProvider(code) => write!(f, "service provider: {code}"),
        }
    }
}
