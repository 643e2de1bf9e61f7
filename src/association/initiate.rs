//! xDLMS InitiateRequest / InitiateResponse
//!
//! Carried A-XDR encoded inside the user-information field of AARQ/AARE.
//!
//! Reference: DLMS Green Book Ed. 12, Section 9.5

use std::fmt;

use nom::number::complete::{be_u16, u8 as nom_u8};

use super::{Conformance, DLMS_VERSION};
use crate::data::{DecodeError, DecodeResult, reject, take_bytes};

pub const INITIATE_REQUEST_TAG: u8 = 0x01;
pub const INITIATE_RESPONSE_TAG: u8 = 0x08;
pub const CONFIRMED_SERVICE_ERROR_TAG: u8 = 0x0E;
const CONFORMANCE_TAG: u8 = 0x5F;
const CONFORMANCE_TAG_EXTENSION: u8 = 0x1F;

/// xDLMS InitiateRequest
///
/// ```text
/// 01 00 00 00 06 5F 04 00 B8 38 00 FF FF
/// │  │  │  │  │  └──────────────────┘ └── client max receive PDU size
/// │  │  │  │  │  conformance
/// │  │  │  │  └── DLMS version
/// │  │  │  └───── proposed QoS absent
/// │  │  └──────── response-allowed (default TRUE)
/// │  └─────────── dedicated key absent
/// └────────────── tag
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct InitiateRequest {
    pub dedicated_key: Option<Vec<u8>>,
    pub response_allowed: bool,
    pub proposed_quality_of_service: Option<u8>,
    pub proposed_dlms_version_number: u8,
    pub proposed_conformance: Conformance,
    pub client_max_receive_pdu_size: u16,
}

impl InitiateRequest {
    pub fn new(conformance: Conformance, max_pdu_size: u16) -> Self {
        Self {
            dedicated_key: None,
            response_allowed: true,
            proposed_quality_of_service: None,
            proposed_dlms_version_number: DLMS_VERSION,
            proposed_conformance: conformance,
            client_max_receive_pdu_size: max_pdu_size,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![INITIATE_REQUEST_TAG];

        match &self.dedicated_key {
            Some(key) => {
                buf.push(0x01);
                buf.push(key.len() as u8);
                buf.extend_from_slice(key);
            }
            None => buf.push(0x00),
        }

        // BOOLEAN DEFAULT TRUE: only FALSE is written out.
        if self.response_allowed {
            buf.push(0x00);
        } else {
            buf.extend_from_slice(&[0x01, 0x00]);
        }

        match self.proposed_quality_of_service {
            Some(qos) => buf.extend_from_slice(&[0x01, qos]),
            None => buf.push(0x00),
        }

        buf.push(self.proposed_dlms_version_number);
        encode_conformance(&mut buf, self.proposed_conformance);
        buf.extend_from_slice(&self.client_max_receive_pdu_size.to_be_bytes());
        buf
    }
}

/// xDLMS InitiateResponse
#[derive(Debug, Clone, PartialEq)]
pub struct InitiateResponse {
    pub negotiated_quality_of_service: Option<u8>,
    pub negotiated_dlms_version_number: u8,
    pub negotiated_conformance: Conformance,
    pub server_max_receive_pdu_size: u16,
    pub vaa_name: u16,
}

impl InitiateResponse {
    pub fn parse(input: &[u8]) -> DecodeResult<'_, Self> {
        let (input, tag) = nom_u8(input)?;
        if tag != INITIATE_RESPONSE_TAG {
            return reject(DecodeError::TagMismatch { expected: INITIATE_RESPONSE_TAG, found: tag });
        }
        let (input, negotiated_quality_of_service) = parse_optional_u8(input)?;
        let (input, negotiated_dlms_version_number) = nom_u8(input)?;
        let (input, negotiated_conformance) = parse_conformance(input)?;
        let (input, server_max_receive_pdu_size) = be_u16(input)?;
        let (input, vaa_name) = be_u16(input)?;
        Ok((
            input,
            Self {
                negotiated_quality_of_service,
                negotiated_dlms_version_number,
                negotiated_conformance,
                server_max_receive_pdu_size,
                vaa_name,
            },
        ))
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![INITIATE_RESPONSE_TAG];
        match self.negotiated_quality_of_service {
            Some(qos) => buf.extend_from_slice(&[0x01, qos]),
            None => buf.push(0x00),
        }
        buf.push(self.negotiated_dlms_version_number);
        encode_conformance(&mut buf, self.negotiated_conformance);
        buf.extend_from_slice(&self.server_max_receive_pdu_size.to_be_bytes());
        buf.extend_from_slice(&self.vaa_name.to_be_bytes());
        buf
    }
}

impl fmt::Display for InitiateResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DLMS v{}, max PDU {}, {}",
            self.negotiated_dlms_version_number,
            self.server_max_receive_pdu_size,
            self.negotiated_conformance
        )
    }
}

fn encode_conformance(buf: &mut Vec<u8>, conformance: Conformance) {
    buf.push(CONFORMANCE_TAG);
    buf.push(4);
    buf.extend_from_slice(&conformance.to_bytes());
}

/// Accepts both `5F 04 ...` and the two-byte tag form `5F 1F 04 ...`.
fn parse_conformance(input: &[u8]) -> DecodeResult<'_, Conformance> {
    let (input, tag) = nom_u8(input)?;
    if tag != CONFORMANCE_TAG {
        return reject(DecodeError::TagMismatch { expected: CONFORMANCE_TAG, found: tag });
    }
    let input = match input.first() {
        Some(&CONFORMANCE_TAG_EXTENSION) => &input[1..],
        _ => input,
    };
    let (input, len) = nom_u8(input)?;
    if len != 4 {
        return reject(DecodeError::InvalidLengthPrefix(len));
    }
    let (input, bytes) = take_bytes(input, 4)?;
    Ok((input, Conformance::from_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])))
}

fn parse_optional_u8(input: &[u8]) -> DecodeResult<'_, Option<u8>> {
    let (input, present) = nom_u8(input)?;
    match present {
        0x00 => Ok((input, None)),
        0x01 => {
            let (input, value) = nom_u8(input)?;
            Ok((input, Some(value)))
        }
        value => reject(DecodeError::UnexpectedChoice { field: "optional", value }),
    }
}
