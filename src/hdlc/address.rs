//! HDLC address fields.
//!
//! Every address byte carries seven address bits shifted left by one; the low
//! bit is the extension bit and is set only on the last byte of the field.
//!
//! | size | layout                                      | range            |
//! |------|---------------------------------------------|------------------|
//! | 1    | logical                                     | logical <= 0x7F  |
//! | 2    | logical, physical                           | both <= 0x7F     |
//! | 4    | logical hi, logical lo, physical hi, phys lo | both <= 0x3FFF   |

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::HdlcError;

/// Number of bytes of the server address field.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AddressSize {
    One,
    Two,
    #[default]
    Four,
}

impl AddressSize {
    pub const fn len(self) -> usize {
        match self {
            AddressSize::One => 1,
            AddressSize::Two => 2,
            AddressSize::Four => 4,
        }
    }
}

/// Appends the server address. With [`AddressSize::One`] only the logical
/// address is carried.
pub(crate) fn encode_server(
    out: &mut Vec<u8>,
    logical: u16,
    physical: u16,
    size: AddressSize,
) -> Result<(), HdlcError> {
    match size {
        AddressSize::One => {
            if logical > 0x7F {
                return Err(HdlcError::AddressOutOfRange);
            }
            out.push(((logical << 1) | 1) as u8);
        }
        AddressSize::Two => {
            if logical > 0x7F || physical > 0x7F {
                return Err(HdlcError::AddressOutOfRange);
            }
            out.push(((logical << 1) & 0xFE) as u8);
            out.push(((physical << 1) | 1) as u8);
        }
        AddressSize::Four => {
            if logical > 0x3FFF || physical > 0x3FFF {
                return Err(HdlcError::AddressOutOfRange);
            }
            out.extend_from_slice(&[
                ((logical >> 6) & 0xFE) as u8,
                ((logical << 1) & 0xFE) as u8,
                ((physical >> 6) & 0xFE) as u8,
                (((physical << 1) & 0xFE) | 1) as u8,
            ]);
        }
    }
    Ok(())
}

pub(crate) fn encode_client(out: &mut Vec<u8>, client: u8) -> Result<(), HdlcError> {
    if client > 0x7F {
        return Err(HdlcError::AddressOutOfRange);
    }
    out.push((client << 1) | 1);
    Ok(())
}

/// Splits one address field off `input`: every byte up to and including the
/// first one with the extension bit set.
pub(crate) fn split_field(input: &[u8]) -> Result<(&[u8], &[u8]), HdlcError> {
    let end = input
        .iter()
        .take(4)
        .position(|b| b & 1 == 1)
        .ok_or(HdlcError::InvalidFraming("unterminated address field"))?;
    let (field, rest) = input.split_at(end + 1);
    Ok((field, rest))
}

/// Decodes a server address field into `(logical, physical, size)`.
pub(crate) fn decode_server(field: &[u8]) -> Result<(u16, u16, AddressSize), HdlcError> {
    match *field {
        [a] => Ok(((a >> 1) as u16, 0, AddressSize::One)),
        [a, b] => Ok(((a >> 1) as u16, (b >> 1) as u16, AddressSize::Two)),
        [a, b, c, d] => {
            let word = u32::from_be_bytes([a, b, c, d]);
            let logical = ((word >> 18) & 0x3F80) | ((word >> 17) & 0x7F);
            let physical = ((word >> 2) & 0x3F80) | ((word >> 1) & 0x7F);
            Ok((logical as u16, physical as u16, AddressSize::Four))
        }
        _ => Err(HdlcError::InvalidFraming("server address must be 1, 2 or 4 bytes")),
    }
}

pub(crate) fn decode_client(field: &[u8]) -> Result<u8, HdlcError> {
    match *field {
        [a] => Ok(a >> 1),
        _ => Err(HdlcError::InvalidFraming("client address must be 1 byte")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_server_four_bytes() {
        let mut out = Vec::new();
        encode_server(&mut out, 1, 0x3FFF, AddressSize::Four).unwrap();
        assert_eq!(out, [0x00, 0x02, 0xFE, 0xFF]);
    }

    #[test]
    fn test_encode_server_two_bytes() {
        let mut out = Vec::new();
        encode_server(&mut out, 1, 0x11, AddressSize::Two).unwrap();
        assert_eq!(out, [0x02, 0x23]);
    }

    #[test]
    fn test_encode_server_one_byte() {
        let mut out = Vec::new();
        encode_server(&mut out, 1, 0, AddressSize::One).unwrap();
        assert_eq!(out, [0x03]);
    }

    #[test]
    fn test_encode_server_out_of_range() {
        let mut out = Vec::new();
        assert_eq!(
            encode_server(&mut out, 0x80, 0, AddressSize::One),
            Err(HdlcError::AddressOutOfRange)
        );
        assert_eq!(
            encode_server(&mut out, 1, 0x80, AddressSize::Two),
            Err(HdlcError::AddressOutOfRange)
        );
        assert_eq!(
            encode_server(&mut out, 0x4000, 1, AddressSize::Four),
            Err(HdlcError::AddressOutOfRange)
        );
        assert_eq!(encode_client(&mut out, 0x80), Err(HdlcError::AddressOutOfRange));
    }

    #[test]
    fn test_decode_server_roundtrip() {
        for (logical, physical) in [(0, 0), (1, 0x3FFF), (0x3FFF, 0x10), (0x1234, 0x2ABC)] {
            let mut out = Vec::new();
            encode_server(&mut out, logical, physical, AddressSize::Four).unwrap();
            assert_eq!(decode_server(&out).unwrap(), (logical, physical, AddressSize::Four));
        }
    }

    #[test]
    fn test_extension_bits() {
        let mut out = Vec::new();
        encode_server(&mut out, 0x3FFF, 0x3FFF, AddressSize::Four).unwrap();
        assert_eq!(out.iter().map(|b| b & 1).collect::<Vec<_>>(), [0, 0, 0, 1]);
    }

    #[test]
    fn test_split_field() {
        let (field, rest) = split_field(&[0x00, 0x02, 0xFE, 0xFF, 0x03, 0x93]).unwrap();
        assert_eq!(field, &[0x00, 0x02, 0xFE, 0xFF]);
        assert_eq!(rest, &[0x03, 0x93]);

        let (field, rest) = split_field(rest).unwrap();
        assert_eq!(field, &[0x03]);
        assert_eq!(decode_client(field).unwrap(), 1);
        assert_eq!(rest, &[0x93]);
    }

    #[test]
    fn test_split_field_unterminated() {
        assert!(split_field(&[0x00, 0x02, 0xFE, 0xFE, 0x03]).is_err());
        assert!(split_field(&[0x00, 0x02]).is_err());
    }

    #[test]
    fn test_decode_server_three_bytes_rejected() {
        assert!(decode_server(&[0x00, 0x02, 0x03]).is_err());
    }
}
