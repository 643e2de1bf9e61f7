//! HDLC frame codec for DLMS/COSEM (IEC 62056-46, ISO/IEC 13239 frame format type 3).
//!
//! ```text
//! +------+--------+--------+-------+-------+------+-----+-----+------+-----+------+
//! | Flag | Format | Length | Dest  | Src   | Ctrl | HCS | LLC | Info | FCS | Flag |
//! | 0x7E |  (4b)  | (11b)  | (1-4) | (1-4) | (1)  | (2) | (3) | (n)  | (2) | 0x7E |
//! +------+--------+--------+-------+-------+------+-----+-----+------+-----+------+
//! ```
//!
//! - **Format/Length**: `1010 S LLL LLLLLLLL`; `S` is the segmentation bit and
//!   the 11-bit length counts every byte between the two flags.
//! - **Dest/Src**: the server address for commands, the client address for
//!   responses. The low bit of the last byte of each address is set.
//! - **HCS**: present only when an information field follows.
//! - **LLC**: `E6 E6 00` from the client, `E6 E7 00` from the server, carried
//!   by I and UI frames only.
//!
//! Both check sequences are the CRC-16/X.25 of the bytes between the opening
//! flag and the check sequence itself, stored little-endian.
//!
//! This module is pure: building and parsing frames never touches a transport.
//! The stateful side of the link lives in [`crate::transport::hdlc`].

mod address;
mod fcs;
mod frame;

pub use address::AddressSize;
pub use fcs::fcs16;
pub use frame::{Command, Direction, HdlcFrame, frame_length, is_frame_complete};

use thiserror::Error;

/// HDLC frame delimiter.
pub const HDLC_FLAG: u8 = 0x7E;

/// LLC header sent by the client.
pub const LLC_COMMAND: [u8; 3] = [0xE6, 0xE6, 0x00];

/// LLC header sent by the server.
pub const LLC_RESPONSE: [u8; 3] = [0xE6, 0xE7, 0x00];

/// Maximum information field length assumed when nothing else is negotiated.
pub const DEFAULT_MAX_INFO_LENGTH: u16 = 128;

/// Largest value the 11-bit frame length field can hold.
pub const MAX_FRAME_LENGTH: usize = 0x7FF;

/// Errors raised while building or parsing a single HDLC frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HdlcError {
    #[error("invalid HDLC framing: {0}")]
    InvalidFraming(&'static str),
    #[error("frame length field says {declared} bytes, frame has {actual}")]
    LengthMismatch { declared: usize, actual: usize },
    #[error("{field} mismatch: frame carries {expected:#06x}, computed {computed:#06x}")]
    ChecksumMismatch { field: &'static str, expected: u16, computed: u16 },
    #[error("segmented HDLC frames are not supported")]
    UnsupportedSegmentation,
    #[error("address does not fit the configured address size")]
    AddressOutOfRange,
    #[error("information field of {0} bytes does not fit in a frame")]
    PayloadTooLarge(usize),
    #[error("invalid control field {0:#04x}")]
    InvalidControl(u8),
    #[error("invalid or missing LLC header")]
    InvalidLlc,
}
