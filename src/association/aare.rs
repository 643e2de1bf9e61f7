//! AARE APDU (A-Associate Response)
//!
//! Reference: DLMS Green Book Ed. 12, Section 11.4 and Table 138-139

use std::fmt;

use super::ber::{
    INTEGER, OBJECT_IDENTIFIER, OCTET_STRING, TagClass, TagType, encode_constructed, encode_tlv,
    parse_length, parse_small_integer, parse_tagged, parse_tlv, tag,
};
use super::{
    AARE_TAG, AcseServiceUserDiagnostic, ApplicationContextName, AssociationResult,
    AuthenticationMechanism, InitiateResponse, SourceDiagnostic,
};
use crate::association::initiate::{CONFIRMED_SERVICE_ERROR_TAG, INITIATE_RESPONSE_TAG};
use crate::data::{DecodeError, DecodeResult, reject};

const APPLICATION_CONTEXT_NAME: u8 = tag(TagClass::ContextSpecific, TagType::Constructed, 1);
const RESULT: u8 = tag(TagClass::ContextSpecific, TagType::Constructed, 2);
const RESULT_SOURCE_DIAGNOSTIC: u8 = tag(TagClass::ContextSpecific, TagType::Constructed, 3);
const RESPONDING_AP_TITLE: u8 = tag(TagClass::ContextSpecific, TagType::Constructed, 4);
const RESPONDER_ACSE_REQUIREMENTS: u8 = tag(TagClass::ContextSpecific, TagType::Primitive, 8);
const MECHANISM_NAME: u8 = tag(TagClass::ContextSpecific, TagType::Primitive, 9);
const RESPONDING_AUTHENTICATION_VALUE: u8 =
    tag(TagClass::ContextSpecific, TagType::Constructed, 10);
const USER_INFORMATION: u8 = tag(TagClass::ContextSpecific, TagType::Constructed, 30);

const SERVICE_USER: u8 = tag(TagClass::ContextSpecific, TagType::Constructed, 1);
const SERVICE_PROVIDER: u8 = tag(TagClass::ContextSpecific, TagType::Constructed, 2);
const CHARSTRING: u8 = tag(TagClass::ContextSpecific, TagType::Primitive, 0);

/// AARE APDU, tag 0x61
///
/// ```text
/// 61 29
///    A1 09 06 07 60 85 74 05 08 01 01       application-context-name
///    A2 03 02 01 00                         result: accepted
///    A3 05 A1 03 02 01 00                   diagnostic: service-user null
///    BE 10 04 0E 08 00 06 5F 1F 04 ...      user-information
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct AareApdu {
    pub application_context_name: Option<ApplicationContextName>,
    pub result: AssociationResult,
    pub diagnostic: Option<SourceDiagnostic>,
    /// Server system title, needed by the SHA-256 and GMAC mechanisms.
    pub responding_ap_title: Option<Vec<u8>>,
    pub mechanism_name: Option<AuthenticationMechanism>,
    /// Server challenge (StoC).
    pub responding_authentication_value: Option<Vec<u8>>,
    pub initiate_response: Option<InitiateResponse>,
}

impl AareApdu {
    /// An accepting response without authentication fields.
    pub fn accepted(initiate_response: InitiateResponse) -> Self {
        Self {
            application_context_name: Some(ApplicationContextName::LogicalName),
            result: AssociationResult::Accepted,
            diagnostic: Some(SourceDiagnostic::ServiceUser(AcseServiceUserDiagnostic::Null)),
            responding_ap_title: None,
            mechanism_name: None,
            responding_authentication_value: None,
            initiate_response: Some(initiate_response),
        }
    }

    /// A rejecting response carrying a service-user diagnostic.
    pub fn rejected(result: AssociationResult, diagnostic: AcseServiceUserDiagnostic) -> Self {
        Self {
            application_context_name: Some(ApplicationContextName::LogicalName),
            result,
            diagnostic: Some(SourceDiagnostic::ServiceUser(diagnostic)),
            responding_ap_title: None,
            mechanism_name: None,
            responding_authentication_value: None,
            initiate_response: None,
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.result == AssociationResult::Accepted
    }

    /// Parse a complete AARE. The declared outer length must cover exactly
    /// the remaining input, and the result field is mandatory.
    pub fn parse(input: &[u8]) -> DecodeResult<'_, Self> {
        let input = match input.split_first() {
            Some((&AARE_TAG, rest)) => rest,
            Some(_) => return reject(malformed("not an AARE")),
            None => return reject(DecodeError::UnexpectedEndOfData),
        };

        let (mut body, len) = parse_length(input).map_err(invalid("bad outer length"))?;
        if len != body.len() {
            return reject(malformed("declared length does not match"));
        }

        let mut application_context_name = None;
        let mut result = None;
        let mut diagnostic = None;
        let mut responding_ap_title = None;
        let mut mechanism_name = None;
        let mut responding_authentication_value = None;
        let mut initiate_response = None;

        while !body.is_empty() {
            let (rest, (field, content)) = parse_tlv(body).map_err(invalid("truncated field"))?;
            body = rest;

            match field {
                APPLICATION_CONTEXT_NAME => {
                    let (_, oid) = parse_tagged(content, OBJECT_IDENTIFIER)
                        .map_err(invalid("bad context name"))?;
                    application_context_name = ApplicationContextName::from_oid_bytes(oid);
                    if application_context_name.is_none() {
                        return reject(malformed("unsupported application context"));
                    }
                }
                RESULT => {
                    let (_, value) = parse_small_integer(content).map_err(invalid("bad result"))?;
                    match AssociationResult::try_from(value) {
                        Ok(value) => result = Some(value),
                        Err(_) => return reject(malformed("unknown association result")),
                    }
                }
                RESULT_SOURCE_DIAGNOSTIC => {
                    diagnostic =
                        Some(parse_diagnostic(content).map_err(invalid("bad diagnostic"))?);
                }
                RESPONDING_AP_TITLE => {
                    let (_, title) =
                        parse_tagged(content, OCTET_STRING).map_err(invalid("bad AP title"))?;
                    responding_ap_title = Some(title.to_vec());
                }
                MECHANISM_NAME => {
                    mechanism_name = AuthenticationMechanism::from_oid_bytes(content);
                    if mechanism_name.is_none() {
                        return reject(malformed("unknown mechanism name"));
                    }
                }
                RESPONDING_AUTHENTICATION_VALUE => {
                    let (_, value) = parse_tagged(content, CHARSTRING)
                        .map_err(invalid("bad authentication value"))?;
                    responding_authentication_value = Some(value.to_vec());
                }
                USER_INFORMATION => {
                    initiate_response = parse_user_information(content)
                        .map_err(invalid("bad user information"))?;
                }
                // protocol-version, responder-acse-requirements, implementation data
                _ => {}
            }
        }

        let Some(result) = result else {
            return reject(malformed("missing association result"));
        };

        Ok((
            body,
            Self {
                application_context_name,
                result,
                diagnostic,
                responding_ap_title,
                mechanism_name,
                responding_authentication_value,
                initiate_response,
            },
        ))
    }

    /// Encode the response as a server would send it.
    pub fn encode(&self) -> Vec<u8> {
        let mut body = Vec::new();

        if let Some(context) = self.application_context_name {
            encode_constructed(&mut body, APPLICATION_CONTEXT_NAME, |inner| {
                encode_tlv(inner, OBJECT_IDENTIFIER, context.oid_bytes())
            });
        }

        encode_constructed(&mut body, RESULT, |inner| {
            encode_tlv(inner, INTEGER, &[self.result as u8])
        });

        if let Some(diagnostic) = self.diagnostic {
            let (choice, value) = match diagnostic {
                SourceDiagnostic::ServiceUser(user) => (SERVICE_USER, diagnostic_code(user)),
                SourceDiagnostic::ServiceProvider(code) => (SERVICE_PROVIDER, code),
            };
            encode_constructed(&mut body, RESULT_SOURCE_DIAGNOSTIC, |inner| {
                encode_constructed(inner, choice, |inner| encode_tlv(inner, INTEGER, &[value]))
            });
        }

        if let Some(title) = &self.responding_ap_title {
            encode_constructed(&mut body, RESPONDING_AP_TITLE, |inner| {
                encode_tlv(inner, OCTET_STRING, title)
            });
        }

        if let Some(mechanism) = self.mechanism_name {
            encode_tlv(&mut body, RESPONDER_ACSE_REQUIREMENTS, &[0x07, 0x80]);
            encode_tlv(&mut body, MECHANISM_NAME, &mechanism.oid_bytes());
        }

        if let Some(value) = &self.responding_authentication_value {
            encode_constructed(&mut body, RESPONDING_AUTHENTICATION_VALUE, |inner| {
                encode_tlv(inner, CHARSTRING, value)
            });
        }

        if let Some(initiate) = &self.initiate_response {
            let initiate = initiate.encode();
            encode_constructed(&mut body, USER_INFORMATION, |inner| {
                encode_tlv(inner, OCTET_STRING, &initiate)
            });
        }

        let mut out = Vec::with_capacity(body.len() + 3);
        encode_tlv(&mut out, AARE_TAG, &body);
        out
    }
}

impl fmt::Display for AareApdu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AARE {}", self.result)?;
        if let Some(diagnostic) = &self.diagnostic {
            write!(f, ", {diagnostic}")?;
        }
        if let Some(initiate) = &self.initiate_response {
            write!(f, ", {initiate}")?;
        }
        Ok(())
    }
}

fn malformed(reason: &'static str) -> DecodeError {
    DecodeError::MalformedAssociationResponse(reason)
}

fn invalid(reason: &'static str) -> impl FnOnce(nom::Err<DecodeError>) -> nom::Err<DecodeError> {
    move |err| {
        log::debug!("AARE field rejected: {}", DecodeError::from(err));
        nom::Err::Error(malformed(reason))
    }
}

fn parse_diagnostic(content: &[u8]) -> Result<SourceDiagnostic, nom::Err<DecodeError>> {
    let (_, (choice, inner)) = parse_tlv(content)?;
    let (_, value) = parse_small_integer(inner)?;
    match choice {
        SERVICE_USER => Ok(SourceDiagnostic::ServiceUser(AcseServiceUserDiagnostic::from(value))),
        SERVICE_PROVIDER => Ok(SourceDiagnostic::ServiceProvider(value)),
        _ => Err(nom::Err::Error(malformed("unknown diagnostic source"))),
    }
}

/// The user-information octet string holds either an InitiateResponse or a
/// ConfirmedServiceError; only the former is decoded.
fn parse_user_information(
    content: &[u8],
) -> Result<Option<InitiateResponse>, nom::Err<DecodeError>> {
    let (_, xdlms) = parse_tagged(content, OCTET_STRING)?;
    match xdlms.first() {
        Some(&INITIATE_RESPONSE_TAG) => {
            let (_, response) = InitiateResponse::parse(xdlms)?;
            Ok(Some(response))
        }
        Some(&CONFIRMED_SERVICE_ERROR_TAG) => {
            log::debug!("AARE carries ConfirmedServiceError {}", hex::encode(xdlms));
            Ok(None)
        }
        _ => Ok(None),
    }
}

fn diagnostic_code(diagnostic: AcseServiceUserDiagnostic) -> u8 {
    match diagnostic {
        AcseServiceUserDiagnostic::Null => 0,
        AcseServiceUserDiagnostic::NoReasonGiven => 1,
        AcseServiceUserDiagnostic::ApplicationContextNameNotSupported => 2,
        AcseServiceUserDiagnostic::CallingApTitleNotRecognized => 3,
        AcseServiceUserDiagnostic::AuthenticationMechanismNameNotRecognised => 11,
        AcseServiceUserDiagnostic::AuthenticationMechanismNameRequired => 12,
        AcseServiceUserDiagnostic::AuthenticationFailure => 13,
        AcseServiceUserDiagnostic::AuthenticationRequired => 14,
        AcseServiceUserDiagnostic::Other(code) => code,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::association::Conformance;
    use hex_literal::hex;

    const ACCEPTED: [u8; 43] = hex!(
        "61 29 A1 09 06 07 60 85 74 05 08 01 01"
        "A2 03 02 01 00"
        "A3 05 A1 03 02 01 00"
        "BE 10 04 0E 08 00 06 5F 1F 04 00 00 50 1F 01 F4 00 07"
    );

    fn parse_err(input: &[u8]) -> DecodeError {
        DecodeError::from(AareApdu::parse(input).unwrap_err())
    }

    #[test]
    fn test_parse_accepted() {
        let (rest, aare) = AareApdu::parse(&ACCEPTED).unwrap();
        assert!(rest.is_empty());
        assert!(aare.is_accepted());
        assert_eq!(aare.application_context_name, Some(ApplicationContextName::LogicalName));
        assert_eq!(
            aare.diagnostic,
            Some(SourceDiagnostic::ServiceUser(AcseServiceUserDiagnostic::Null))
        );
        let initiate = aare.initiate_response.unwrap();
        assert_eq!(initiate.server_max_receive_pdu_size, 500);
        assert_eq!(initiate.negotiated_conformance.bits(), 0x501F);
    }

    #[test]
    fn test_parse_hls_fields() {
        let input = hex!(
            "61 4E A1 09 06 07 60 85 74 05 08 01 01"
            "A2 03 02 01 00"
            "A3 05 A1 03 02 01 0E"
            "A4 0A 04 08 4D 4D 4D 00 00 BC 61 4E"
            "88 02 07 80"
            "89 07 60 85 74 05 08 02 05"
            "AA 0A 80 08 50 36 77 52 48 32 41 46"
            "BE 10 04 0E 08 00 06 5F 1F 04 00 00 50 1F 01 F4 00 07"
        );
        let (_, aare) = AareApdu::parse(&input).unwrap();
        assert_eq!(
            aare.diagnostic,
            Some(SourceDiagnostic::ServiceUser(AcseServiceUserDiagnostic::AuthenticationRequired))
        );
        assert_eq!(aare.responding_ap_title, Some(hex!("4D4D4D0000BC614E").to_vec()));
        assert_eq!(aare.mechanism_name, Some(AuthenticationMechanism::HlsGmac));
        assert_eq!(aare.responding_authentication_value, Some(hex!("5036775248324146").to_vec()));
    }

    #[test]
    fn test_parse_rejected_by_provider() {
        let input = hex!("61 0C A2 03 02 01 01 A3 05 A2 03 02 01 02");
        let (_, aare) = AareApdu::parse(&input).unwrap();
        assert_eq!(aare.result, AssociationResult::RejectedPermanent);
        assert_eq!(aare.diagnostic, Some(SourceDiagnostic::ServiceProvider(2)));
        assert_eq!(aare.initiate_response, None);
        assert!(!aare.is_accepted());
    }

    #[test]
    fn test_parse_skips_unknown_fields() {
        let input = hex!("61 09 80 02 07 80 A2 03 02 01 00");
        assert!(AareApdu::parse(&input).unwrap().1.is_accepted());

        let input = hex!("61 08 9D 01 FF A2 03 02 01 00");
        assert!(AareApdu::parse(&input).unwrap().1.is_accepted());
    }

    #[test]
    fn test_parse_bad_result_field() {
        let input = hex!("61 05 A2 03 04 01 00");
        assert_eq!(parse_err(&input), DecodeError::MalformedAssociationResponse("bad result"));
    }

    #[test]
    fn test_parse_get_response_is_malformed() {
        assert!(matches!(
            parse_err(&hex!("C4 01 C1 01 04")),
            DecodeError::MalformedAssociationResponse(_)
        ));
    }

    #[test]
    fn test_parse_length_mismatch() {
        let mut input = ACCEPTED.to_vec();
        let mismatch = DecodeError::MalformedAssociationResponse("declared length does not match");
        input.pop();
        assert_eq!(parse_err(&input), mismatch);

        input.extend_from_slice(&[0x07, 0x00]);
        assert_eq!(parse_err(&input), mismatch);
    }

    #[test]
    fn test_parse_missing_result() {
        let input = hex!("61 0B A1 09 06 07 60 85 74 05 08 01 01");
        assert_eq!(
            parse_err(&input),
            DecodeError::MalformedAssociationResponse("missing association result")
        );
    }

    #[test]
    fn test_parse_unknown_result_value() {
        let input = hex!("61 05 A2 03 02 01 07");
        assert_eq!(
            parse_err(&input),
            DecodeError::MalformedAssociationResponse("unknown association result")
        );
    }

    #[test]
    fn test_parse_confirmed_service_error() {
        let input = hex!("61 0C A2 03 02 01 01 BE 05 04 03 0E 01 06");
        let (_, aare) = AareApdu::parse(&input).unwrap();
        assert_eq!(aare.result, AssociationResult::RejectedPermanent);
        assert_eq!(aare.initiate_response, None);
    }

    #[test]
    fn test_encode_accepted() {
        let aare = AareApdu::accepted(InitiateResponse {
            negotiated_quality_of_service: None,
            negotiated_dlms_version_number: 6,
            negotiated_conformance: Conformance::from_bits(0x501F),
            server_max_receive_pdu_size: 500,
            vaa_name: 7,
        });
        let encoded = aare.encode();
        // The encoder writes the short conformance tag form.
        assert_eq!(
            encoded,
            hex!(
                "61 28 A1 09 06 07 60 85 74 05 08 01 01"
                "A2 03 02 01 00"
                "A3 05 A1 03 02 01 00"
                "BE 0F 04 0D 08 00 06 5F 04 00 00 50 1F 01 F4 00 07"
            )
        );
        assert_eq!(AareApdu::parse(&encoded).unwrap().1, aare);
    }

    #[test]
    fn test_display() {
        let aare = AareApdu::rejected(
            AssociationResult::RejectedPermanent,
            AcseServiceUserDiagnostic::AuthenticationFailure,
        );
        assert_eq!(
            aare.to_string(),
            "AARE rejected (permanent), service user: AuthenticationFailure"
        );
    }
}
