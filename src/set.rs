//! SET service
//!
//! Writes one attribute of a COSEM object.
//!
//! # APDU Tags
//! - SET-Request: 0xC1 (193)
//! - SET-Response: 0xC5 (197)
//!
//! Reference: DLMS Green Book Ed. 12, Table 72

use nom::number::complete::u8 as nom_u8;
#[cfg(feature = "serde")]
use serde::Serialize;

use crate::cosem::{AccessSelector, CosemAttributeDescriptor, DataAccessResult, InvokeIdAndPriority};
use crate::data::{Data, DecodeError, DecodeResult, expect_tag, reject};
use crate::get::CHOICE_NORMAL;

pub const SET_REQUEST_TAG: u8 = 0xC1;
pub const SET_RESPONSE_TAG: u8 = 0xC5;

/// SET-Request-Normal
///
/// ```text
/// C1 01 C1 00 01 01 00 01 08 00 FF 02 00 06 0A 00 11 22
///          └───────────────────────┘  │  └────────────┘ value
///          attribute descriptor       └── access selection absent
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct SetRequest {
    pub invoke_id: InvokeIdAndPriority,
    pub descriptor: CosemAttributeDescriptor,
    pub access_selection: Option<AccessSelector>,
    pub value: Data,
}

impl SetRequest {
    pub fn new(
        invoke_id: InvokeIdAndPriority,
        descriptor: CosemAttributeDescriptor,
        value: Data,
    ) -> Self {
        Self { invoke_id, descriptor, access_selection: None, value }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![SET_REQUEST_TAG, CHOICE_NORMAL, self.invoke_id.byte()];
        self.descriptor.encode_into(&mut buf);
        AccessSelector::encode_optional(self.access_selection.as_ref(), &mut buf);
        self.value.encode_into(&mut buf);
        buf
    }
}

/// SET-Response-Normal: `C5 01 <invoke-id> <data-access-result>`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct SetResponse {
    pub invoke_id: InvokeIdAndPriority,
    pub result: DataAccessResult,
}

impl SetResponse {
    pub fn parse(input: &[u8]) -> DecodeResult<'_, Self> {
        let (input, ()) = expect_tag(input, SET_RESPONSE_TAG)?;
        let (input, choice) = nom_u8(input)?;
        if choice != CHOICE_NORMAL {
            return reject(DecodeError::UnexpectedChoice { field: "set-response", value: choice });
        }
        let (input, invoke_id) = InvokeIdAndPriority::parse(input)?;
        let (input, result) = DataAccessResult::parse(input)?;
        Ok((input, Self { invoke_id, result }))
    }

    pub fn encode(&self) -> Vec<u8> {
        vec![SET_RESPONSE_TAG, CHOICE_NORMAL, self.invoke_id.byte(), self.result as u8]
    }
}
