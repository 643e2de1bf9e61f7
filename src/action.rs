//! ACTION service
//!
//! Invokes one method of a COSEM object.
//!
//! # APDU Tags
//! - ACTION-Request: 0xC3 (195)
//! - ACTION-Response: 0xC7 (199)
//!
//! Reference: DLMS Green Book Ed. 12, Table 74

use nom::number::complete::u8 as nom_u8;
#[cfg(feature = "serde")]
use serde::Serialize;

use crate::cosem::{ActionResult, CosemMethodDescriptor, InvokeIdAndPriority};
use crate::data::{Data, DecodeError, DecodeResult, expect_tag, reject};
use crate::get::{CHOICE_NORMAL, GetDataResult};

pub const ACTION_REQUEST_TAG: u8 = 0xC3;
pub const ACTION_RESPONSE_TAG: u8 = 0xC7;

/// ACTION-Request-Normal
///
/// ```text
/// C3 01 C1 00 0F 00 00 28 00 00 FF 01 01 09 10 ...
///          └───────────────────────┘  │  └───────── parameters
///          method descriptor          └── parameters present
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct ActionRequest {
    pub invoke_id: InvokeIdAndPriority,
    pub descriptor: CosemMethodDescriptor,
    pub parameters: Option<Data>,
}

impl ActionRequest {
    pub fn new(
        invoke_id: InvokeIdAndPriority,
        descriptor: CosemMethodDescriptor,
        parameters: Option<Data>,
    ) -> Self {
        Self { invoke_id, descriptor, parameters }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![ACTION_REQUEST_TAG, CHOICE_NORMAL, self.invoke_id.byte()];
        self.descriptor.encode_into(&mut buf);
        match &self.parameters {
            Some(parameters) => {
                buf.push(0x01);
                parameters.encode_into(&mut buf);
            }
            None => buf.push(0x00),
        }
        buf
    }
}

/// ACTION-Response-Normal
///
/// ```text
/// C7 01 C1 00 01 00 09 10 ...
///          │  │  └────────── Get-Data-Result
///          │  └── return parameters present
///          └───── action result
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct ActionResponse {
    pub invoke_id: InvokeIdAndPriority,
    pub result: ActionResult,
    pub return_parameters: Option<GetDataResult>,
}

impl ActionResponse {
    pub fn parse(input: &[u8]) -> DecodeResult<'_, Self> {
        let (input, ()) = expect_tag(input, ACTION_RESPONSE_TAG)?;
        let (input, choice) = nom_u8(input)?;
        if choice != CHOICE_NORMAL {
            return reject(DecodeError::UnexpectedChoice {
                field: "action-response",
                value: choice,
            });
        }
        let (input, invoke_id) = InvokeIdAndPriority::parse(input)?;
        let (input, result) = ActionResult::parse(input)?;

        // Some meters end the APDU right after the result.
        if input.is_empty() {
            return Ok((input, Self { invoke_id, result, return_parameters: None }));
        }

        let (input, present) = nom_u8(input)?;
        let (input, return_parameters) = match present {
            0x00 => (input, None),
            0x01 => {
                let (input, parameters) = GetDataResult::parse(input)?;
                (input, Some(parameters))
            }
            value => {
                return reject(DecodeError::UnexpectedChoice { field: "return-parameters", value });
            }
        };
        Ok((input, Self { invoke_id, result, return_parameters }))
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf =
            vec![ACTION_RESPONSE_TAG, CHOICE_NORMAL, self.invoke_id.byte(), self.result as u8];
        match &self.return_parameters {
            Some(parameters) => {
                buf.push(0x01);
                parameters.encode_into(&mut buf);
            }
            None => buf.push(0x00),
        }
        buf
    }

    /// The returned data, if the method succeeded and returned any.
    pub fn return_data(&self) -> Option<&Data> {
        match &self.return_parameters {
            Some(GetDataResult::Data(data)) => Some(data),
            _ => None,
        }
    }
}
