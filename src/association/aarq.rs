//! AARQ APDU (A-Associate Request)
//!
//! Reference: DLMS Green Book Ed. 12, Section 11.3 and Table 136-137

use super::ber::{
    OBJECT_IDENTIFIER, OCTET_STRING, TagClass, TagType, encode_constructed, encode_tlv, tag,
};
use super::{
    AARQ_TAG, ApplicationContextName, AuthenticationMechanism, Conformance, CosemSettings,
    InitiateRequest,
};

const PROTOCOL_VERSION: u8 = tag(TagClass::ContextSpecific, TagType::Primitive, 0);
const APPLICATION_CONTEXT_NAME: u8 = tag(TagClass::ContextSpecific, TagType::Constructed, 1);
const CALLING_AP_TITLE: u8 = tag(TagClass::ContextSpecific, TagType::Constructed, 6);
const SENDER_ACSE_REQUIREMENTS: u8 = tag(TagClass::ContextSpecific, TagType::Primitive, 10);
const MECHANISM_NAME: u8 = tag(TagClass::ContextSpecific, TagType::Primitive, 11);
const CALLING_AUTHENTICATION_VALUE: u8 = tag(TagClass::ContextSpecific, TagType::Constructed, 12);
const CHARSTRING: u8 = tag(TagClass::ContextSpecific, TagType::Primitive, 0);
const USER_INFORMATION: u8 = tag(TagClass::ContextSpecific, TagType::Constructed, 30);

/// BIT STRING `{version1}`: one unused bit, value 0x80.
const PROTOCOL_VERSION_1: [u8; 2] = [0x07, 0x80];
/// BIT STRING `{authentication}`
const ACSE_REQUIREMENTS_AUTHENTICATION: [u8; 2] = [0x07, 0x80];

/// AARQ APDU, tag 0x60
///
/// Golden encoding for LLS with secret `"12345678"`:
///
/// ```text
/// 60 39
///    80 02 07 80                             protocol-version
///    A1 09 06 07 60 85 74 05 08 01 01        application-context-name
///    8A 02 07 80                             sender-acse-requirements
///    8B 07 60 85 74 05 08 02 01              mechanism-name
///    AC 0A 80 08 31 32 33 34 35 36 37 38     calling-authentication-value
///    BE 0F 04 0D 01 00 00 00 06 5F 04 ...    user-information
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct AarqApdu {
    pub application_context_name: ApplicationContextName,
    pub calling_ap_title: Option<Vec<u8>>,
    pub mechanism: AuthenticationMechanism,
    /// The LLS secret or the HLS client challenge (CtoS).
    pub calling_authentication_value: Option<Vec<u8>>,
    pub user_information: InitiateRequest,
}

impl AarqApdu {
    /// Builds the request for `settings`. `challenge` is only used by the
    /// high-level mechanisms and must already hold the client challenge.
    pub fn from_settings(settings: &CosemSettings, challenge: &[u8]) -> Self {
        let mechanism = settings.mechanism;
        let gmac = mechanism == AuthenticationMechanism::HlsGmac;
        let calling_ap_title =
            (settings.security.is_active() || gmac).then(|| settings.system_title.to_vec());
        let calling_authentication_value = match mechanism {
            AuthenticationMechanism::Lowest => None,
            AuthenticationMechanism::Lls => Some(settings.secret.clone()),
            _ => Some(challenge.to_vec()),
        };

        Self {
            application_context_name: ApplicationContextName::for_security(settings.security),
            calling_ap_title,
            mechanism,
            calling_authentication_value,
            user_information: InitiateRequest::new(
                Conformance::CLIENT_DEFAULT,
                settings.max_pdu_size,
            ),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut body = Vec::new();
        let authenticated = self.mechanism != AuthenticationMechanism::Lowest;

        if authenticated {
            encode_tlv(&mut body, PROTOCOL_VERSION, &PROTOCOL_VERSION_1);
        }

        encode_constructed(&mut body, APPLICATION_CONTEXT_NAME, |inner| {
            encode_tlv(inner, OBJECT_IDENTIFIER, self.application_context_name.oid_bytes())
        });

        if let Some(title) = &self.calling_ap_title {
            encode_constructed(&mut body, CALLING_AP_TITLE, |inner| {
                encode_tlv(inner, OCTET_STRING, title)
            });
        }

        if authenticated {
            encode_tlv(&mut body, SENDER_ACSE_REQUIREMENTS, &ACSE_REQUIREMENTS_AUTHENTICATION);
            encode_tlv(&mut body, MECHANISM_NAME, &self.mechanism.oid_bytes());
            if let Some(value) = &self.calling_authentication_value {
                encode_constructed(&mut body, CALLING_AUTHENTICATION_VALUE, |inner| {
                    encode_tlv(inner, CHARSTRING, value)
                });
            }
        }

        let initiate = self.user_information.encode();
        encode_constructed(&mut body, USER_INFORMATION, |inner| {
            encode_tlv(inner, OCTET_STRING, &initiate)
        });

        let mut out = Vec::with_capacity(body.len() + 3);
        encode_tlv(&mut out, AARQ_TAG, &body);
        out
    }
}
