//! GET service
//!
//! Reads one attribute of a COSEM object.
//!
//! # APDU Tags
//! - GET-Request: 0xC0 (192)
//! - GET-Response: 0xC4 (196)
//!
//! Only the `normal` choice is supported. A response using block transfer
//! (`with-datablock`) or `with-list` is rejected rather than truncated.
//!
//! Reference: DLMS Green Book Ed. 12, Table 70

use nom::number::complete::u8 as nom_u8;
#[cfg(feature = "serde")]
use serde::Serialize;

use crate::cosem::{AccessSelector, CosemAttributeDescriptor, DataAccessResult, InvokeIdAndPriority};
use crate::data::{Data, DecodeError, DecodeResult, DlmsType, expect_tag, reject};

pub const GET_REQUEST_TAG: u8 = 0xC0;
pub const GET_RESPONSE_TAG: u8 = 0xC4;
pub(crate) const CHOICE_NORMAL: u8 = 0x01;

/// GET-Request-Normal
///
/// ```text
/// C0 01 C1 00 01 01 00 01 08 00 FF 02 00
/// │  │  │  └───────────────────────┘  └── access selection absent
/// │  │  │  attribute descriptor
/// │  │  └── invoke-id-and-priority
/// │  └───── choice: normal
/// └──────── tag
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct GetRequest {
    pub invoke_id: InvokeIdAndPriority,
    pub descriptor: CosemAttributeDescriptor,
    pub access_selection: Option<AccessSelector>,
}

impl GetRequest {
    pub fn new(invoke_id: InvokeIdAndPriority, descriptor: CosemAttributeDescriptor) -> Self {
        Self { invoke_id, descriptor, access_selection: None }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![GET_REQUEST_TAG, CHOICE_NORMAL, self.invoke_id.byte()];
        self.descriptor.encode_into(&mut buf);
        AccessSelector::encode_optional(self.access_selection.as_ref(), &mut buf);
        buf
    }
}

/// Get-Data-Result: the value, or the reason it could not be read.
///
/// Never carries both.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum GetDataResult {
    /// Choice 0x00
    Data(Data),
    /// Choice 0x01
    DataAccessError(DataAccessResult),
}

impl GetDataResult {
    pub fn parse(input: &[u8]) -> DecodeResult<'_, Self> {
        let (input, choice) = nom_u8(input)?;
        match choice {
            0x00 => {
                let (input, data) = Data::parse(input)?;
                Ok((input, Self::Data(data)))
            }
            0x01 => {
                let (input, result) = DataAccessResult::parse(input)?;
                Ok((input, Self::DataAccessError(result)))
            }
            value => reject(DecodeError::UnexpectedChoice { field: "get-data-result", value }),
        }
    }

    pub fn encode_into(&self, out: &mut Vec<u8>) {
        match self {
            Self::Data(data) => {
                out.push(0x00);
                data.encode_into(out);
            }
            Self::DataAccessError(result) => {
                out.push(0x01);
                out.push(*result as u8);
            }
        }
    }

    /// The access result this outcome stands for.
    pub fn access_result(&self) -> DataAccessResult {
        match self {
            Self::Data(_) => DataAccessResult::Success,
            Self::DataAccessError(result) => *result,
        }
    }

    /// Demands a body of type `T`.
    ///
    /// The outer `Result` is a decode failure (the meter sent something else),
    /// the inner one is the meter's own verdict.
    pub fn decode_as<T: DlmsType>(&self) -> Result<Result<T, DataAccessResult>, DecodeError> {
        match self {
            Self::Data(data) => data.decode_as::<T>().map(Ok),
            Self::DataAccessError(result) => Ok(Err(*result)),
        }
    }

    pub fn into_result(self) -> Result<Data, DataAccessResult> {
        match self {
            Self::Data(data) => Ok(data),
            Self::DataAccessError(result) => Err(result),
        }
    }
}

/// GET-Response-Normal
///
/// ```text
/// C4 01 C1 00 0A 06 30 2E 31 2E 31 00
/// │  │  │  │  └─────────────────────┘ visible-string "0.1.1", NUL padded
/// │  │  │  └── result choice: data
/// │  │  └───── invoke-id-and-priority
/// │  └──────── choice: normal
/// └─────────── tag
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct GetResponse {
    pub invoke_id: InvokeIdAndPriority,
    pub result: GetDataResult,
}

impl GetResponse {
    pub fn parse(input: &[u8]) -> DecodeResult<'_, Self> {
        let (input, ()) = expect_tag(input, GET_RESPONSE_TAG)?;
        let (input, choice) = nom_u8(input)?;
        if choice != CHOICE_NORMAL {
            return reject(DecodeError::UnexpectedChoice { field: "get-response", value: choice });
        }
        let (input, invoke_id) = InvokeIdAndPriority::parse(input)?;
        let (input, result) = GetDataResult::parse(input)?;
        Ok((input, Self { invoke_id, result }))
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![GET_RESPONSE_TAG, CHOICE_NORMAL, self.invoke_id.byte()];
        self.result.encode_into(&mut buf);
        buf
    }
}
