//! Types shared by the xDLMS GET, SET and ACTION services
//!
//! Only logical-name referencing is supported: every object is addressed by
//! its interface class and OBIS code.
//!
//! Reference: DLMS Green Book Ed. 12, Section 9.3.6

use std::fmt;

use nom::number::complete::{be_u16, i8 as nom_i8, u8 as nom_u8};
#[cfg(feature = "serde")]
use serde::Serialize;

use crate::data::{Data, DecodeResult};
use crate::obis_code::ObisCode;

/// Well-known COSEM interface class ids.
pub mod class_id {
    pub const DATA: u16 = 1;
    pub const REGISTER: u16 = 3;
    pub const EXTENDED_REGISTER: u16 = 4;
    pub const DEMAND_REGISTER: u16 = 5;
    pub const PROFILE_GENERIC: u16 = 7;
    pub const CLOCK: u16 = 8;
    pub const ASSOCIATION_LN: u16 = 15;
}

/// Identifies one attribute (GET/SET) or one method (ACTION) of a COSEM object.
///
/// ```text
/// 00 03  01 00 01 08 00 FF  02
/// └───┘  └───────────────┘  └── index
/// class  logical name
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct CosemAttributeDescriptor {
    pub class_id: u16,
    pub logical_name: ObisCode,
    pub index: i8,
}

/// ACTION addresses methods with the same layout.
pub type CosemMethodDescriptor = CosemAttributeDescriptor;

impl CosemAttributeDescriptor {
    pub const fn new(class_id: u16, logical_name: ObisCode, index: i8) -> Self {
        Self { class_id, logical_name, index }
    }

    pub fn encode_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.class_id.to_be_bytes());
        out.extend_from_slice(&self.logical_name.to_bytes());
        out.push(self.index as u8);
    }

    pub fn parse(input: &[u8]) -> DecodeResult<'_, Self> {
        let (input, class_id) = be_u16(input)?;
        let (input, logical_name) = ObisCode::parse(input)?;
        let (input, index) = nom_i8(input)?;
        Ok((input, Self { class_id, logical_name, index }))
    }
}

impl fmt::Display for CosemAttributeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.class_id, self.logical_name, self.index)
    }
}

/// Invoke-Id-And-Priority byte.
///
/// ```text
/// bit 7    priority (1 = high)
/// bit 6    service class (1 = confirmed)
/// bit 0-3  invoke id
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct InvokeIdAndPriority(u8);

impl InvokeIdAndPriority {
    const PRIORITY_HIGH: u8 = 0x80;
    const SERVICE_CLASS_CONFIRMED: u8 = 0x40;
    const INVOKE_ID_MASK: u8 = 0x0F;

    /// A confirmed, high priority request with the low four bits of `invoke_id`.
    pub const fn new(invoke_id: u8) -> Self {
        let flags = Self::SERVICE_CLASS_CONFIRMED | Self::PRIORITY_HIGH;
        Self((invoke_id & Self::INVOKE_ID_MASK) | flags)
    }

    pub const fn from_byte(byte: u8) -> Self {
        Self(byte)
    }

    pub const fn byte(self) -> u8 {
        self.0
    }

    pub const fn invoke_id(self) -> u8 {
        self.0 & Self::INVOKE_ID_MASK
    }

    pub const fn is_confirmed(self) -> bool {
        self.0 & Self::SERVICE_CLASS_CONFIRMED != 0
    }

    pub const fn is_high_priority(self) -> bool {
        self.0 & Self::PRIORITY_HIGH != 0
    }

    pub fn parse(input: &[u8]) -> DecodeResult<'_, Self> {
        let (input, byte) = nom_u8(input)?;
        Ok((input, Self(byte)))
    }
}

impl From<InvokeIdAndPriority> for u8 {
    fn from(value: InvokeIdAndPriority) -> Self {
        value.0
    }
}

/// Selective access descriptor appended to GET and SET requests.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct AccessSelector {
    pub selector: u8,
    pub parameters: Data,
}

impl AccessSelector {
    /// Writes the optional access-selection field (`00`, or `01` + descriptor).
    pub(crate) fn encode_optional(selector: Option<&Self>, out: &mut Vec<u8>) {
        match selector {
            Some(access) => {
                out.push(0x01);
                out.push(access.selector);
                access.parameters.encode_into(out);
            }
            None => out.push(0x00),
        }
    }
}

/// Data-Access-Result returned by GET and SET.
///
/// Codes outside the defined set (the standard leaves gaps) decode as
/// [`UnknownReason`](DataAccessResult::UnknownReason).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize))]
#[repr(u8)]
pub enum DataAccessResult {
    Success = 0,
    HardwareFault = 1,
    TemporaryFailure = 2,
    ReadWriteDenied = 3,
    ObjectUndefined = 4,
    ObjectClassInconsistent = 9,
    ObjectUnavailable = 11,
    TypeUnmatched = 12,
    ScopeOfAccessViolated = 13,
    DataBlockUnavailable = 14,
    LongGetAborted = 15,
    NoLongGetInProgress = 16,
    LongSetAborted = 17,
    NoLongSetInProgress = 18,
    DataBlockNumberInvalid = 19,
    OtherReason = 250,
    UnknownReason = 255,
}

impl From<u8> for DataAccessResult {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::Success,
            1 => Self::HardwareFault,
            2 => Self::TemporaryFailure,
            3 => Self::ReadWriteDenied,
            4 => Self::ObjectUndefined,
            9 => Self::ObjectClassInconsistent,
            11 => Self::ObjectUnavailable,
            12 => Self::TypeUnmatched,
            13 => Self::ScopeOfAccessViolated,
            14 => Self::DataBlockUnavailable,
            15 => Self::LongGetAborted,
            16 => Self::NoLongGetInProgress,
            17 => Self::LongSetAborted,
            18 => Self::NoLongSetInProgress,
            19 => Self::DataBlockNumberInvalid,
            250 => Self::OtherReason,
            _ => Self::UnknownReason,
        }
    }
}

impl DataAccessResult {
    pub fn parse(input: &[u8]) -> DecodeResult<'_, Self> {
        let (input, code) = nom_u8(input)?;
        Ok((input, Self::from(code)))
    }

    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

impl fmt::Display for DataAccessResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} ({})", self, *self as u8)
    }
}

/// Action-Result returned by ACTION.
///
/// Same normalization as [`DataAccessResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize))]
#[repr(u8)]
pub enum ActionResult {
    Success = 0,
    HardwareFault = 1,
    TemporaryFailure = 2,
    ReadWriteDenied = 3,
    ObjectUndefined = 4,
    ObjectClassInconsistent = 9,
    ObjectUnavailable = 11,
    TypeUnmatched = 12,
    ScopeOfAccessViolated = 13,
    DataBlockUnavailable = 14,
    LongActionAborted = 15,
    NoLongActionInProgress = 16,
    OtherReason = 250,
    UnknownReason = 255,
}

impl From<u8> for ActionResult {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::Success,
            1 => Self::HardwareFault,
            2 => Self::TemporaryFailure,
            3 => Self::ReadWriteDenied,
            4 => Self::ObjectUndefined,
            9 => Self::ObjectClassInconsistent,
            11 => Self::ObjectUnavailable,
            12 => Self::TypeUnmatched,
            13 => Self::ScopeOfAccessViolated,
            14 => Self::DataBlockUnavailable,
            15 => Self::LongActionAborted,
            16 => Self::NoLongActionInProgress,
            250 => Self::OtherReason,
            _ => Self::UnknownReason,
        }
    }
}

impl ActionResult {
    pub fn parse(input: &[u8]) -> DecodeResult<'_, Self> {
        let (input, code) = nom_u8(input)?;
        Ok((input, Self::from(code)))
    }

    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

impl fmt::Display for ActionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} ({})", self, *self as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;
    use proptest::prelude::*;

    #[test]
    fn test_descriptor_encode() {
        let descriptor =
            CosemAttributeDescriptor::new(class_id::REGISTER, ObisCode::new(1, 0, 1, 8, 0, 255), 2);
        let mut out = Vec::new();
        descriptor.encode_into(&mut out);
        assert_eq!(out, hex!("00 03 01 00 01 08 00 FF 02"));
    }

    #[test]
    fn test_descriptor_parse() {
        let (rest, descriptor) =
            CosemAttributeDescriptor::parse(&hex!("00 0F 00 00 28 00 00 FF 01 AA")).unwrap();
        assert_eq!(rest, &[0xAA]);
        assert_eq!(descriptor.class_id, class_id::ASSOCIATION_LN);
        assert_eq!(descriptor.logical_name, ObisCode::new(0, 0, 40, 0, 0, 255));
        assert_eq!(descriptor.index, 1);
    }

    #[test]
    fn test_descriptor_negative_index() {
        let descriptor =
            CosemAttributeDescriptor::new(class_id::DATA, ObisCode::new(0, 0, 1, 0, 0, 255), -1);
        let mut out = Vec::new();
        descriptor.encode_into(&mut out);
        assert_eq!(out[8], 0xFF);
    }

    #[test]
    fn test_descriptor_truncated() {
        assert!(CosemAttributeDescriptor::parse(&hex!("00 03 01 00")).is_err());
    }

    #[test]
    fn test_invoke_id_and_priority() {
        let iip = InvokeIdAndPriority::new(1);
        assert_eq!(iip.byte(), 0xC1);
        assert_eq!(iip.invoke_id(), 1);
        assert!(iip.is_confirmed());
        assert!(iip.is_high_priority());

        assert_eq!(InvokeIdAndPriority::new(0x1F).byte(), 0xCF);
        assert_eq!(u8::from(InvokeIdAndPriority::new(0)), 0xC0);

        let low = InvokeIdAndPriority::from_byte(0x03);
        assert!(!low.is_confirmed());
        assert!(!low.is_high_priority());
    }

    #[test]
    fn test_access_selection_field() {
        let mut absent = Vec::new();
        AccessSelector::encode_optional(None, &mut absent);
        assert_eq!(absent, [0x00]);

        let access = AccessSelector {
            selector: 2,
            parameters: Data::Structure(vec![Data::DoubleLongUnsigned(1)]),
        };
        let mut present = Vec::new();
        AccessSelector::encode_optional(Some(&access), &mut present);
        assert_eq!(present, hex!("01 02 02 01 06 00 00 00 01"));
    }

    #[test]
    fn test_data_access_result_known_codes() {
        assert_eq!(DataAccessResult::from(0), DataAccessResult::Success);
        assert_eq!(DataAccessResult::from(3), DataAccessResult::ReadWriteDenied);
        assert_eq!(DataAccessResult::from(19), DataAccessResult::DataBlockNumberInvalid);
        assert_eq!(DataAccessResult::from(250), DataAccessResult::OtherReason);
        assert!(DataAccessResult::Success.is_success());
        assert!(!DataAccessResult::ObjectUndefined.is_success());
    }

    #[test]
    fn test_data_access_result_gaps_normalize() {
        for code in [5u8, 6, 7, 8, 10, 20, 100, 249, 251, 254] {
            let result = DataAccessResult::from(code);
            assert_eq!(result, DataAccessResult::UnknownReason, "code {code}");
        }
    }

    #[test]
    fn test_action_result_gaps_normalize() {
        assert_eq!(ActionResult::from(16), ActionResult::NoLongActionInProgress);
        // 17..19 are GET/SET only
        assert_eq!(ActionResult::from(17), ActionResult::UnknownReason);
        assert_eq!(ActionResult::from(19), ActionResult::UnknownReason);
        assert_eq!(ActionResult::from(250), ActionResult::OtherReason);
    }

    #[test]
    fn test_result_display() {
        assert_eq!(DataAccessResult::ObjectUndefined.to_string(), "ObjectUndefined (4)");
        assert_eq!(ActionResult::UnknownReason.to_string(), "UnknownReason (255)");
    }

    proptest! {
        #[test]
        fn prop_data_access_result_is_total(code in any::<u8>()) {
            let result = DataAccessResult::from(code);
            prop_assert!(result as u8 == code || result == DataAccessResult::UnknownReason);
        }

        #[test]
        fn prop_invoke_id_keeps_low_nibble(id in any::<u8>()) {
            let iip = InvokeIdAndPriority::new(id);
            prop_assert_eq!(iip.invoke_id(), id & 0x0F);
            prop_assert_eq!(iip.byte() & 0xC0, 0xC0);
        }
    }
}
