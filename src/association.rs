//! Association Layer - AARQ/AARE APDUs for DLMS/COSEM
//!
//! Application association establishment using the ACSE APDUs:
//! - AARQ (A-Associate Request): the client proposes context, mechanism and
//!   xDLMS parameters
//! - AARE (A-Associate Response): the server accepts or rejects
//!
//! AARQ/AARE are BER encoded with context-specific tags. The xDLMS
//! InitiateRequest/Response inside user-information is A-XDR encoded.
//!
//! Reference: DLMS Green Book Ed. 12, Section 11

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub use self::{
    aare::AareApdu,
    aarq::AarqApdu,
    conformance::Conformance,
    enums::*,
    initiate::{InitiateRequest, InitiateResponse},
};

mod aare;
mod aarq;
mod ber;
mod conformance;
mod enums;
mod initiate;

use self::ber::{TagClass, TagType, tag};

/// ASN.1 BER tag for AARQ APDU (`[APPLICATION 0]`)
pub const AARQ_TAG: u8 = tag(TagClass::Application, TagType::Constructed, 0);

/// ASN.1 BER tag for AARE APDU (`[APPLICATION 1]`)
pub const AARE_TAG: u8 = tag(TagClass::Application, TagType::Constructed, 1);

/// Proposed DLMS version number
pub const DLMS_VERSION: u8 = 6;

/// Caller-supplied parameters for one association attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CosemSettings {
    pub mechanism: AuthenticationMechanism,
    pub security: SecurityContext,
    /// Client system title (ST_C)
    pub system_title: [u8; 8],
    /// LLS password or HLS-MD5/SHA-1/SHA-256 shared secret
    pub secret: Vec<u8>,
    /// Authentication key (AK), used by HLS-GMAC
    pub authentication_key: Vec<u8>,
    /// Global unicast encryption key (EK), used by HLS-GMAC
    pub encryption_key: Vec<u8>,
    /// Length of the client challenge (CtoS), 8 to 64 bytes
    pub challenge_length: usize,
    /// Frame counter sent with the GMAC reply
    pub invocation_counter: u32,
    pub max_pdu_size: u16,
}

impl Default for CosemSettings {
    fn default() -> Self {
        Self {
            mechanism: AuthenticationMechanism::Lowest,
            security: SecurityContext::None,
            system_title: [0; 8],
            secret: Vec::new(),
            authentication_key: vec![0; 16],
            encryption_key: vec![0; 16],
            challenge_length: 8,
            invocation_counter: 0,
            max_pdu_size: 0xFFFF,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = CosemSettings::default();
        assert_eq!(settings.mechanism, AuthenticationMechanism::Lowest);
        assert!(!settings.security.is_active());
        assert_eq!(settings.challenge_length, 8);
        assert_eq!(settings.max_pdu_size, 0xFFFF);
        assert_eq!(settings.encryption_key.len(), 16);
    }

    #[test]
    fn test_aarq_aare_exchange_shape() {
        let settings = CosemSettings::default();
        let aarq = AarqApdu::from_settings(&settings, &[]).encode();
        assert_eq!((AARQ_TAG, AARE_TAG), (0x60, 0x61));
        assert_eq!(aarq[0], AARQ_TAG);

        let aare = AareApdu::accepted(InitiateResponse {
            negotiated_quality_of_service: None,
            negotiated_dlms_version_number: DLMS_VERSION,
            negotiated_conformance: Conformance::CLIENT_DEFAULT & Conformance::GET,
            server_max_receive_pdu_size: 0x0100,
            vaa_name: 0x0007,
        })
        .encode();
        assert_eq!(aare[0], AARE_TAG);
        let (_, parsed) = AareApdu::parse(&aare).unwrap();
        assert!(parsed.is_accepted());
        assert_eq!(
            parsed.initiate_response.map(|r| r.negotiated_conformance),
            Some(Conformance::GET)
        );
    }
}
