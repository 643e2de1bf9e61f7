//! DLMS "common data" codec
//!
//! Every value on the wire is a tag byte followed by the value. Variable-length
//! types (octet-string, visible-string, bit-string) and the array/structure
//! count headers carry a length prefix:
//!
//! ```text
//! len <= 0x80          -> [len]
//! len <= 0xFF          -> [0x81, len]
//! len <= 0xFFFF        -> [0x82, len_hi, len_lo]
//! len <= 0xFFFFFF      -> [0x83, ...3 bytes]
//! len <= 0xFFFFFFFF    -> [0x84, ...4 bytes]
//! ```
//!
//! All multi-byte numbers are big-endian.
//!
//! Reference: DLMS Green Book Ed. 12, Section 9.5 (Data)

use std::fmt;

use derive_try_from_primitive::TryFromPrimitive;
use nom::{
    IResult,
    error::{ErrorKind, ParseError},
    number::complete::{
        be_f32, be_f64, be_i16, be_i32, be_i64, be_u16, be_u32, be_u64, i8 as nom_i8, u8 as nom_u8,
    },
};
#[cfg(feature = "serde")]
use serde::Serialize;
use thiserror::Error;

/// Tags of the DLMS common data types this crate understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
#[rustfmt::skip]
pub enum DataType {
  Null               =  0,
  Array              =  1,
  Structure          =  2,
  Boolean            =  3,
  BitString          =  4,
  DoubleLong         =  5,
  DoubleLongUnsigned =  6,
  OctetString        =  9,
  VisibleString      = 10,
  Integer            = 15,
  Long               = 16,
  Unsigned           = 17,
  LongUnsigned       = 18,
  Long64             = 20,
  Long64Unsigned     = 21,
  Enum               = 22,
  Float32            = 23,
  Float64            = 24,
}

// ============================================================================
// Errors
// ============================================================================

/// Errors raised while decoding DLMS data or COSEM APDUs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("tag mismatch: expected {expected:#04x}, found {found:#04x}")]
    TagMismatch { expected: u8, found: u8 },
    #[error("unexpected end of data")]
    UnexpectedEndOfData,
    #[error("unknown data type {0:#04x}")]
    UnknownDataType(u8),
    #[error("invalid length prefix {0:#04x}")]
    InvalidLengthPrefix(u8),
    #[error("visible-string contains non-ASCII bytes")]
    InvalidString,
    #[error("unexpected choice {value:#04x} for {field}")]
    UnexpectedChoice { field: &'static str, value: u8 },
    #[error("malformed association response: {0}")]
    MalformedAssociationResponse(&'static str),
    #[error("parser error: {0:?}")]
    Parser(ErrorKind),
}

impl<'a> ParseError<&'a [u8]> for DecodeError {
    fn from_error_kind(_input: &'a [u8], kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::Eof | ErrorKind::Complete => DecodeError::UnexpectedEndOfData,
            kind => DecodeError::Parser(kind),
        }
    }

    fn append(_input: &'a [u8], _kind: ErrorKind, other: Self) -> Self {
        other
    }
}

impl From<nom::Err<DecodeError>> for DecodeError {
    fn from(err: nom::Err<DecodeError>) -> Self {
        match err {
            nom::Err::Incomplete(_) => DecodeError::UnexpectedEndOfData,
            nom::Err::Error(e) | nom::Err::Failure(e) => e,
        }
    }
}

/// Result type of every decoder in this crate.
pub type DecodeResult<'a, T> = IResult<&'a [u8], T, DecodeError>;

/// Reject the current parse with `err`.
pub(crate) fn reject<'a, T>(err: DecodeError) -> DecodeResult<'a, T> {
    Err(nom::Err::Error(err))
}

/// Split `n` bytes off the front of `input`.
pub(crate) fn take_bytes(input: &[u8], n: usize) -> DecodeResult<'_, &[u8]> {
    if input.len() < n {
        return reject(DecodeError::UnexpectedEndOfData);
    }
    let (head, rest) = input.split_at(n);
    Ok((rest, head))
}

/// Read one byte and require it to equal `expected`.
pub(crate) fn expect_tag(input: &[u8], expected: u8) -> DecodeResult<'_, ()> {
    let (input, found) = nom_u8(input)?;
    if found != expected {
        return reject(DecodeError::TagMismatch { expected, found });
    }
    Ok((input, ()))
}

// ============================================================================
// Length prefix
// ============================================================================

/// Largest length a prefix can carry.
pub const MAX_LENGTH: usize = u32::MAX as usize;

/// Append the length prefix for `len`, which must not exceed [`MAX_LENGTH`].
pub fn encode_length(out: &mut Vec<u8>, len: usize) {
    debug_assert!(len <= MAX_LENGTH, "length {len} does not fit a 0x84 prefix");
    if len <= 0x80 {
        out.push(len as u8);
        return;
    }
    let bytes = (len as u32).to_be_bytes();
    let skip = bytes.iter().take_while(|b| **b == 0).count();
    out.push(0x80 | (bytes.len() - skip) as u8);
    out.extend_from_slice(&bytes[skip..]);
}

/// Parse a length prefix written by [`encode_length`].
pub fn parse_length(input: &[u8]) -> DecodeResult<'_, usize> {
    let (input, first) = nom_u8(input)?;
    match first {
        0..=0x80 => Ok((input, first as usize)),
        0x81..=0x84 => {
            let (input, bytes) = take_bytes(input, (first & 0x7F) as usize)?;
            let len = bytes.iter().fold(0usize, |acc, b| (acc << 8) | *b as usize);
            Ok((input, len))
        }
        _ => reject(DecodeError::InvalidLengthPrefix(first)),
    }
}

// ============================================================================
// Statically typed values
// ============================================================================

/// A DLMS type with a fixed tag.
///
/// [`encode`] and [`decode`] wrap the value codec with the tag byte; decoding
/// fails with [`DecodeError::TagMismatch`] when the tag on the wire differs.
pub trait DlmsType: Sized {
    const TAG: DataType;

    /// Append the value without its tag.
    fn encode_value(&self, out: &mut Vec<u8>);

    /// Parse the value that follows the tag.
    fn decode_value(input: &[u8]) -> DecodeResult<'_, Self>;
}

/// Append `value` with its tag.
pub fn encode_into<T: DlmsType>(value: &T, out: &mut Vec<u8>) {
    out.push(T::TAG as u8);
    value.encode_value(out);
}

/// Encode `value` with its tag.
pub fn encode<T: DlmsType>(value: &T) -> Vec<u8> {
    let mut out = Vec::new();
    encode_into(value, &mut out);
    out
}

/// Decode a `T`, requiring its tag first.
pub fn decode<T: DlmsType>(input: &[u8]) -> DecodeResult<'_, T> {
    let (input, ()) = expect_tag(input, T::TAG as u8)?;
    T::decode_value(input)
}

macro_rules! impl_numeric {
    ($($ty:ty => $tag:ident, $parse:expr;)*) => {
        $(
            impl DlmsType for $ty {
                const TAG: DataType = DataType::$tag;

                fn encode_value(&self, out: &mut Vec<u8>) {
                    out.extend_from_slice(&self.to_be_bytes());
                }

                fn decode_value(input: &[u8]) -> DecodeResult<'_, Self> {
                    $parse(input)
                }
            }
        )*
    };
}

impl_numeric! {
    i8 => Integer, nom_i8;
    u8 => Unsigned, nom_u8;
    i16 => Long, be_i16;
    u16 => LongUnsigned, be_u16;
    i32 => DoubleLong, be_i32;
    u32 => DoubleLongUnsigned, be_u32;
    i64 => Long64, be_i64;
    u64 => Long64Unsigned, be_u64;
    f32 => Float32, be_f32;
    f64 => Float64, be_f64;
}

impl DlmsType for bool {
    const TAG: DataType = DataType::Boolean;

    fn encode_value(&self, out: &mut Vec<u8>) {
        out.push(u8::from(*self));
    }

    fn decode_value(input: &[u8]) -> DecodeResult<'_, Self> {
        let (input, b) = nom_u8(input)?;
        Ok((input, b != 0))
    }
}

/// `enum` value.
#[cfg_attr(feature = "serde", derive(Serialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Enum(pub u8);

impl DlmsType for Enum {
    const TAG: DataType = DataType::Enum;

    fn encode_value(&self, out: &mut Vec<u8>) {
        out.push(self.0);
    }

    fn decode_value(input: &[u8]) -> DecodeResult<'_, Self> {
        let (input, b) = nom_u8(input)?;
        Ok((input, Enum(b)))
    }
}

/// `octet-string` value.
#[cfg_attr(feature = "serde", derive(Serialize))]
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OctetString(pub Vec<u8>);

impl DlmsType for OctetString {
    const TAG: DataType = DataType::OctetString;

    fn encode_value(&self, out: &mut Vec<u8>) {
        encode_length(out, self.0.len());
        out.extend_from_slice(&self.0);
    }

    fn decode_value(input: &[u8]) -> DecodeResult<'_, Self> {
        let (input, len) = parse_length(input)?;
        let (input, bytes) = take_bytes(input, len)?;
        Ok((input, OctetString(bytes.to_vec())))
    }
}

/// `visible-string` value (ASCII).
///
/// Trailing NULs are not part of the value: decoding strips them and
/// encoding leaves them out. Characters outside ASCII are sent as `?`.
#[cfg_attr(feature = "serde", derive(Serialize))]
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VisibleString(pub String);

impl VisibleString {
    /// Checked constructor; rejects non-ASCII text.
    pub fn new(s: impl Into<String>) -> Result<Self, DecodeError> {
        let s = s.into();
        if !s.is_ascii() {
            return Err(DecodeError::InvalidString);
        }
        Ok(Self(s.trim_end_matches('\0').to_owned()))
    }
}

fn encode_visible(out: &mut Vec<u8>, s: &str) {
    let s = s.trim_end_matches('\0');
    encode_length(out, s.chars().count());
    out.extend(s.chars().map(|c| if c.is_ascii() { c as u8 } else { b'?' }));
}

impl DlmsType for VisibleString {
    const TAG: DataType = DataType::VisibleString;

    fn encode_value(&self, out: &mut Vec<u8>) {
        encode_visible(out, &self.0);
    }

    fn decode_value(input: &[u8]) -> DecodeResult<'_, Self> {
        let (input, len) = parse_length(input)?;
        let (input, bytes) = take_bytes(input, len)?;
        if !bytes.is_ascii() {
            return reject(DecodeError::InvalidString);
        }
        // Meters often NUL-terminate fixed-size strings.
        let end = bytes.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
        let s = String::from_utf8(bytes[..end].to_vec())
            .map_err(|_| nom::Err::Error(DecodeError::InvalidString))?;
        Ok((input, VisibleString(s)))
    }
}

/// `bit-string` value. The length prefix counts bits, the payload is
/// `ceil(bits / 8)` bytes, most significant bit first.
#[cfg_attr(feature = "serde", derive(Serialize))]
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BitString {
    pub bits: usize,
    pub bytes: Vec<u8>,
}

impl BitString {
    /// Zero-pads or truncates `bytes` to `ceil(bits / 8)`.
    pub fn new(bits: usize, mut bytes: Vec<u8>) -> Self {
        bytes.resize(bits.div_ceil(8), 0);
        Self { bits, bytes }
    }
}

impl DlmsType for BitString {
    const TAG: DataType = DataType::BitString;

    fn encode_value(&self, out: &mut Vec<u8>) {
        let len = self.bits.div_ceil(8);
        encode_length(out, self.bits);
        out.extend(self.bytes.iter().copied().chain(std::iter::repeat(0)).take(len));
    }

    fn decode_value(input: &[u8]) -> DecodeResult<'_, Self> {
        let (input, bits) = parse_length(input)?;
        let (input, bytes) = take_bytes(input, bits.div_ceil(8))?;
        Ok((input, BitString::new(bits, bytes.to_vec())))
    }
}

/// Append an `array` header announcing `count` elements.
pub fn encode_array_header(out: &mut Vec<u8>, count: usize) {
    out.push(DataType::Array as u8);
    encode_length(out, count);
}

/// Append a `structure` header announcing `count` elements.
pub fn encode_structure_header(out: &mut Vec<u8>, count: usize) {
    out.push(DataType::Structure as u8);
    encode_length(out, count);
}

/// Parse an `array` header, returning the element count.
pub fn decode_array_header(input: &[u8]) -> DecodeResult<'_, usize> {
    let (input, ()) = expect_tag(input, DataType::Array as u8)?;
    parse_length(input)
}

/// Parse a `structure` header, returning the element count.
pub fn decode_structure_header(input: &[u8]) -> DecodeResult<'_, usize> {
    let (input, ()) = expect_tag(input, DataType::Structure as u8)?;
    parse_length(input)
}

// ============================================================================
// Self-describing values
// ============================================================================

/// A DLMS value whose type is taken from the tag on the wire.
#[cfg_attr(feature = "serde", derive(Serialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
#[derive(Debug, Clone, PartialEq)]
pub enum Data {
    Null,
    Array(Vec<Data>),
    Structure(Vec<Data>),
    Boolean(bool),
    BitString(BitString),
    DoubleLong(i32),
    DoubleLongUnsigned(u32),
    OctetString(Vec<u8>),
    VisibleString(String),
    Integer(i8),
    Long(i16),
    Unsigned(u8),
    LongUnsigned(u16),
    Long64(i64),
    Long64Unsigned(u64),
    Enum(u8),
    Float32(f32),
    Float64(f64),
}

impl Data {
    pub fn data_type(&self) -> DataType {
        match self {
            Data::Null => DataType::Null,
            Data::Array(_) => DataType::Array,
            Data::Structure(_) => DataType::Structure,
            Data::Boolean(_) => DataType::Boolean,
            Data::BitString(_) => DataType::BitString,
            Data::DoubleLong(_) => DataType::DoubleLong,
            Data::DoubleLongUnsigned(_) => DataType::DoubleLongUnsigned,
            Data::OctetString(_) => DataType::OctetString,
            Data::VisibleString(_) => DataType::VisibleString,
            Data::Integer(_) => DataType::Integer,
            Data::Long(_) => DataType::Long,
            Data::Unsigned(_) => DataType::Unsigned,
            Data::LongUnsigned(_) => DataType::LongUnsigned,
            Data::Long64(_) => DataType::Long64,
            Data::Long64Unsigned(_) => DataType::Long64Unsigned,
            Data::Enum(_) => DataType::Enum,
            Data::Float32(_) => DataType::Float32,
            Data::Float64(_) => DataType::Float64,
        }
    }

    /// Append the tagged encoding, recursing into arrays and structures.
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        match self {
            Data::Null => out.push(DataType::Null as u8),
            Data::Array(items) => {
                encode_array_header(out, items.len());
                items.iter().for_each(|item| item.encode_into(out));
            }
            Data::Structure(items) => {
                encode_structure_header(out, items.len());
                items.iter().for_each(|item| item.encode_into(out));
            }
            Data::Boolean(v) => encode_into(v, out),
            Data::BitString(v) => encode_into(v, out),
            Data::DoubleLong(v) => encode_into(v, out),
            Data::DoubleLongUnsigned(v) => encode_into(v, out),
            Data::OctetString(v) => {
                out.push(DataType::OctetString as u8);
                encode_length(out, v.len());
                out.extend_from_slice(v);
            }
            Data::VisibleString(v) => {
                out.push(DataType::VisibleString as u8);
                encode_visible(out, v);
            }
            Data::Integer(v) => encode_into(v, out),
            Data::Long(v) => encode_into(v, out),
            Data::Unsigned(v) => encode_into(v, out),
            Data::LongUnsigned(v) => encode_into(v, out),
            Data::Long64(v) => encode_into(v, out),
            Data::Long64Unsigned(v) => encode_into(v, out),
            Data::Enum(v) => encode_into(&Enum(*v), out),
            Data::Float32(v) => encode_into(v, out),
            Data::Float64(v) => encode_into(v, out),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode_into(&mut out);
        out
    }

    pub fn parse(input: &[u8]) -> DecodeResult<'_, Self> {
        let (input, tag) = nom_u8(input)?;
        let data_type = DataType::try_from(tag)
            .map_err(|_| nom::Err::Error(DecodeError::UnknownDataType(tag)))?;

        match data_type {
            DataType::Null => Ok((input, Data::Null)),
            DataType::Array => {
                let (input, items) = Self::parse_items(input)?;
                Ok((input, Data::Array(items)))
            }
            DataType::Structure => {
                let (input, items) = Self::parse_items(input)?;
                Ok((input, Data::Structure(items)))
            }
            DataType::Boolean => map(bool::decode_value(input), Data::Boolean),
            DataType::BitString => map(BitString::decode_value(input), Data::BitString),
            DataType::DoubleLong => map(i32::decode_value(input), Data::DoubleLong),
            DataType::DoubleLongUnsigned => map(u32::decode_value(input), Data::DoubleLongUnsigned),
            DataType::OctetString => {
                map(OctetString::decode_value(input), |s| Data::OctetString(s.0))
            }
            DataType::VisibleString => {
                map(VisibleString::decode_value(input), |s| Data::VisibleString(s.0))
            }
            DataType::Integer => map(i8::decode_value(input), Data::Integer),
            DataType::Long => map(i16::decode_value(input), Data::Long),
            DataType::Unsigned => map(u8::decode_value(input), Data::Unsigned),
            DataType::LongUnsigned => map(u16::decode_value(input), Data::LongUnsigned),
            DataType::Long64 => map(i64::decode_value(input), Data::Long64),
            DataType::Long64Unsigned => map(u64::decode_value(input), Data::Long64Unsigned),
            DataType::Enum => map(Enum::decode_value(input), |e| Data::Enum(e.0)),
            DataType::Float32 => map(f32::decode_value(input), Data::Float32),
            DataType::Float64 => map(f64::decode_value(input), Data::Float64),
        }
    }

    fn parse_items(input: &[u8]) -> DecodeResult<'_, Vec<Data>> {
        let (mut input, count) = parse_length(input)?;
        // Each element takes at least one byte.
        let mut items = Vec::with_capacity(count.min(input.len()));
        for _ in 0..count {
            let (rest, item) = Self::parse(input)?;
            items.push(item);
            input = rest;
        }
        Ok((input, items))
    }

    /// Reinterpret this value as the statically typed `T`.
    ///
    /// Fails with [`DecodeError::TagMismatch`] when the value has another type.
    pub fn decode_as<T: DlmsType>(&self) -> Result<T, DecodeError> {
        let encoded = self.encode();
        let (_, value) = decode::<T>(&encoded)?;
        Ok(value)
    }
}

fn map<'a, T>(result: DecodeResult<'a, T>, f: impl FnOnce(T) -> Data) -> DecodeResult<'a, Data> {
    result.map(|(input, value)| (input, f(value)))
}

impl fmt::Display for Data {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Data::Null => write!(f, "null"),
            Data::Array(items) | Data::Structure(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Data::Boolean(v) => write!(f, "{v}"),
            Data::BitString(v) => write!(f, "{}/{}", hex::encode(&v.bytes), v.bits),
            Data::DoubleLong(v) => write!(f, "{v}"),
            Data::DoubleLongUnsigned(v) => write!(f, "{v}"),
            Data::OctetString(v) => write!(f, "{}", hex::encode(v)),
            Data::VisibleString(v) => write!(f, "{v:?}"),
            Data::Integer(v) => write!(f, "{v}"),
            Data::Long(v) => write!(f, "{v}"),
            Data::Unsigned(v) => write!(f, "{v}"),
            Data::LongUnsigned(v) => write!(f, "{v}"),
            Data::Long64(v) => write!(f, "{v}"),
            Data::Long64Unsigned(v) => write!(f, "{v}"),
            Data::Enum(v) => write!(f, "enum({v})"),
            Data::Float32(v) => write!(f, "{v}"),
            Data::Float64(v) => write!(f, "{v}"),
        }
    }
}
