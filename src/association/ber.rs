//! ASN.1 BER helpers
//!
//! The minimal subset of BER needed for AARQ/AARE: single-byte tags and
//! definite lengths.
//!
//! Reference: ISO/IEC 8825-1:2015, DLMS Green Book Ed. 12 Section 11

use nom::number::complete::u8 as nom_u8;

use crate::data::{DecodeError, DecodeResult, reject, take_bytes};

// ============================================================================
// Tags
// ============================================================================

/// BER tag class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagClass {
    Universal,
    Application,
    ContextSpecific,
}

impl TagClass {
    const fn bits(self) -> u8 {
        match self {
            TagClass::Universal => 0b00_000000,
            TagClass::Application => 0b01_000000,
            TagClass::ContextSpecific => 0b10_000000,
        }
    }
}

/// Primitive or constructed (bit 5)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagType {
    Primitive,
    Constructed,
}

impl TagType {
    const fn bit(self) -> u8 {
        match self {
            TagType::Primitive => 0b0000_0000,
            TagType::Constructed => 0b0010_0000,
        }
    }
}

/// Builds a single-byte tag; `number` must be below 31.
pub const fn tag(class: TagClass, tag_type: TagType, number: u8) -> u8 {
    class.bits() | tag_type.bit() | (number & 0x1F)
}

/// Universal INTEGER
pub const INTEGER: u8 = tag(TagClass::Universal, TagType::Primitive, 2);
/// Universal OCTET STRING
pub const OCTET_STRING: u8 = tag(TagClass::Universal, TagType::Primitive, 4);
/// Universal OBJECT IDENTIFIER
pub const OBJECT_IDENTIFIER: u8 = tag(TagClass::Universal, TagType::Primitive, 6);

// ============================================================================
// Length
// ============================================================================

/// Longest length the long form is allowed to carry.
pub const MAX_LENGTH: usize = u32::MAX as usize;

/// Append a definite-form length.
///
/// - 0-127: `[len]`
/// - otherwise `[0x80 | n, n big-endian octets]` with `n` between 1 and 4
///
/// `len` must not exceed [`MAX_LENGTH`].
pub fn encode_length(out: &mut Vec<u8>, len: usize) {
    debug_assert!(len <= MAX_LENGTH, "BER length {len} does not fit four octets");
    if len < 0x80 {
        out.push(len as u8);
        return;
    }
    let bytes = (len as u32).to_be_bytes();
    let skip = bytes.iter().take_while(|b| **b == 0).count();
    out.push(0x80 | (bytes.len() - skip) as u8);
    out.extend_from_slice(&bytes[skip..]);
}

/// Parse a definite-form length (up to four length octets).
pub fn parse_length(input: &[u8]) -> DecodeResult<'_, usize> {
    let (input, first) = nom_u8(input)?;
    if first & 0x80 == 0 {
        return Ok((input, first as usize));
    }

    let octets = (first & 0x7F) as usize;
    if octets == 0 || octets > 4 {
        return reject(DecodeError::InvalidLengthPrefix(first));
    }
    let (input, bytes) = take_bytes(input, octets)?;
    let len = bytes.iter().fold(0usize, |acc, &b| (acc << 8) | b as usize);
    Ok((input, len))
}

// ============================================================================
// TLV
// ============================================================================

/// Append `tag`, the length of `content` and `content`.
pub fn encode_tlv(out: &mut Vec<u8>, tag: u8, content: &[u8]) {
    out.push(tag);
    encode_length(out, content.len());
    out.extend_from_slice(content);
}

/// Append `tag` wrapping a nested TLV built by `inner`.
pub fn encode_constructed(out: &mut Vec<u8>, tag: u8, inner: impl FnOnce(&mut Vec<u8>)) {
    let mut content = Vec::new();
    inner(&mut content);
    encode_tlv(out, tag, &content);
}

/// Split one TLV off the front of `input`, returning `(tag, content)`.
pub fn parse_tlv(input: &[u8]) -> DecodeResult<'_, (u8, &[u8])> {
    let (input, tag) = nom_u8(input)?;
    let (input, len) = parse_length(input)?;
    let (input, content) = take_bytes(input, len)?;
    Ok((input, (tag, content)))
}

/// Like [`parse_tlv`] but requires `expected` as the tag.
pub fn parse_tagged(input: &[u8], expected: u8) -> DecodeResult<'_, &[u8]> {
    let (input, (found, content)) = parse_tlv(input)?;
    if found != expected {
        return reject(DecodeError::TagMismatch { expected, found });
    }
    Ok((input, content))
}

/// A single-byte INTEGER (`02 01 xx`), as used for AARE result fields.
pub fn parse_small_integer(input: &[u8]) -> DecodeResult<'_, u8> {
    let (input, content) = parse_tagged(input, INTEGER)?;
    match content {
        [value] => Ok((input, *value)),
        _ => reject(DecodeError::MalformedAssociationResponse("integer wider than one byte")),
    }
}
