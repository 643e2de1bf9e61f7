use std::fmt::{self, Debug, Display};
use std::str::FromStr;

use nom::{Parser, number::complete::u8};
#[cfg(feature = "serde")]
use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::data::DecodeResult;

/// An OBIS code, the six-byte logical name of a COSEM object.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObisCode {
    pub a: u8,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
    pub f: u8,
}

/// Error returned when a textual OBIS code cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid OBIS code {0:?}")]
pub struct ParseObisCodeError(String);

impl ObisCode {
    pub const fn new(a: u8, b: u8, c: u8, d: u8, e: u8, f: u8) -> Self {
        Self { a, b, c, d, e, f }
    }

    pub const fn from_bytes(bytes: [u8; 6]) -> Self {
        let [a, b, c, d, e, f] = bytes;
        Self::new(a, b, c, d, e, f)
    }

    pub const fn to_bytes(&self) -> [u8; 6] {
        [self.a, self.b, self.c, self.d, self.e, self.f]
    }

    pub fn parse(input: &[u8]) -> DecodeResult<'_, Self> {
        let (input, (a, b, c, d, e, f)) = (u8, u8, u8, u8, u8, u8).parse(input)?;
        Ok((input, Self::new(a, b, c, d, e, f)))
    }
}

impl Display for ObisCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}-{}:{}.{}.{}*{}", self.a, self.b, self.c, self.d, self.e, self.f)
    }
}

impl Debug for ObisCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ObisCode({})", self)
    }
}

/// Accepts both the dotted form `1.0.1.8.0.255` and the reduced-ID form
/// `1-0:1.8.0*255`.
impl FromStr for ObisCode {
    type Err = ParseObisCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseObisCodeError(s.to_owned());

        let groups = s
            .split(['.', '-', ':', '*'])
            .map(|group| group.trim().parse::<u8>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| err())?;

        let bytes: [u8; 6] = groups.try_into().map_err(|_| err())?;
        Ok(Self::from_bytes(bytes))
    }
}

impl From<[u8; 6]> for ObisCode {
    fn from(bytes: [u8; 6]) -> Self {
        Self::from_bytes(bytes)
    }
}

#[cfg(feature = "serde")]
impl Serialize for ObisCode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::DecodeError;

    #[test]
    fn test_parse_with_remaining() {
        let input = [1, 0, 1, 8, 0, 255, 0x02];
        let (remaining, code) = ObisCode::parse(&input).unwrap();

        assert_eq!(remaining, &[0x02]);
        assert_eq!(code, ObisCode::new(1, 0, 1, 8, 0, 255));
    }

    #[test]
    fn test_parse_insufficient_input() {
        let err = ObisCode::parse(&[1, 2, 3, 4, 5]).unwrap_err();
        assert_eq!(DecodeError::from(err), DecodeError::UnexpectedEndOfData);
    }

    #[test]
    fn test_bytes_roundtrip() {
        let code = ObisCode::from_bytes([0, 0, 40, 0, 0, 255]);
        assert_eq!(code.to_bytes(), [0, 0, 40, 0, 0, 255]);
        assert_eq!(ObisCode::from([0, 0, 40, 0, 0, 255]), code);
    }

    #[test]
    fn test_display_format() {
        assert_eq!(ObisCode::new(1, 0, 1, 8, 0, 255).to_string(), "1-0:1.8.0*255");
        assert_eq!(ObisCode::new(0, 0, 40, 0, 0, 255).to_string(), "0-0:40.0.0*255");
    }

    #[test]
    fn test_debug_format() {
        let debug = format!("{:?}", ObisCode::new(1, 0, 32, 7, 0, 255));
        assert_eq!(debug, "ObisCode(1-0:32.7.0*255)");
    }

    #[test]
    fn test_from_str_dotted() {
        let code: ObisCode = "1.0.1.8.0.255".parse().unwrap();
        assert_eq!(code, ObisCode::new(1, 0, 1, 8, 0, 255));
    }

    #[test]
    fn test_from_str_reduced_id() {
        let code: ObisCode = "0-0:40.0.0*255".parse().unwrap();
        assert_eq!(code, ObisCode::new(0, 0, 40, 0, 0, 255));
    }

    #[test]
    fn test_from_str_display_roundtrip() {
        let code = ObisCode::new(1, 0, 99, 1, 0, 255);
        assert_eq!(code.to_string().parse::<ObisCode>().unwrap(), code);
    }

    #[test]
    fn test_from_str_invalid() {
        assert!("1.0.1.8.0".parse::<ObisCode>().is_err());
        assert!("1.0.1.8.0.255.1".parse::<ObisCode>().is_err());
        assert!("1.0.1.8.0.256".parse::<ObisCode>().is_err());
        assert!("a.b.c.d.e.f".parse::<ObisCode>().is_err());
        assert!("".parse::<ObisCode>().is_err());
    }

    #[test]
    fn test_ordering() {
        let code1 = ObisCode::new(1, 0, 1, 8, 0, 255);
        let code2 = ObisCode::new(1, 0, 1, 8, 1, 255);
        let code3 = ObisCode::new(1, 0, 2, 8, 0, 255);

        assert!(code1 < code2);
        assert!(code2 < code3);
    }
}
