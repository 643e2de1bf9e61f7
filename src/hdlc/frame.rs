use super::address::{self, AddressSize};
use super::{HDLC_FLAG, HdlcError, LLC_COMMAND, LLC_RESPONSE, MAX_FRAME_LENGTH, fcs16};

/// Frame format type 3.
const FORMAT_TYPE_3: u8 = 0xA0;
/// Segmentation bit of the format field.
const FORMAT_SEGMENTED: u8 = 0x08;
/// Poll/final bit of the control field.
const POLL_FINAL: u8 = 0x10;

/// Flags, format/length, one-byte addresses, control and FCS.
const MIN_FRAME_SIZE: usize = 9;

/// HDLC commands and responses used by DLMS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[rustfmt::skip]
pub enum Command {
    /// Information
    I,
    /// Receive ready
    RR,
    /// Receive not ready
    RNR,
    /// Set normal response mode
    SNRM,
    /// Disconnect
    DISC,
    /// Unnumbered information
    UI,
    /// Unnumbered acknowledge
    UA,
    /// Disconnected mode
    DM,
    /// Frame reject
    FRMR,
}

impl Command {
    /// Control byte without the poll/final bit and sequence numbers.
    const fn tag(self) -> u8 {
        match self {
            Command::I => 0x00,
            Command::RR => 0x01,
            Command::RNR => 0x05,
            Command::SNRM => 0x83,
            Command::DISC => 0x43,
            Command::UI => 0x03,
            Command::UA => 0x63,
            Command::DM => 0x0F,
            Command::FRMR => 0x87,
        }
    }

    /// Builds the control byte. Sequence numbers are taken modulo 8.
    pub const fn control(self, send_seq: u8, recv_seq: u8) -> u8 {
        match self {
            Command::I => ((recv_seq & 7) << 5) | POLL_FINAL | ((send_seq & 7) << 1),
            Command::RR | Command::RNR => ((recv_seq & 7) << 5) | POLL_FINAL | self.tag(),
            _ => self.tag() | POLL_FINAL,
        }
    }

    /// Decodes a control byte into `(command, send_seq, recv_seq)`.
    ///
    /// Frames without the poll/final bit belong to a segmented transfer.
    pub fn from_control(control: u8) -> Result<(Self, u8, u8), HdlcError> {
        if control & POLL_FINAL == 0 {
            return Err(HdlcError::UnsupportedSegmentation);
        }

        if control & 0x01 == 0 {
            return Ok((Command::I, (control >> 1) & 7, control >> 5));
        }

        if control & 0x03 == 0x01 {
            let command = match control & 0x0F {
                0x01 => Command::RR,
                0x05 => Command::RNR,
                _ => return Err(HdlcError::InvalidControl(control)),
            };
            return Ok((command, 0, control >> 5));
        }

        let command = match control & !POLL_FINAL {
            0x83 => Command::SNRM,
            0x43 => Command::DISC,
            0x03 => Command::UI,
            0x63 => Command::UA,
            0x0F => Command::DM,
            0x87 => Command::FRMR,
            _ => return Err(HdlcError::InvalidControl(control)),
        };
        Ok((command, 0, 0))
    }

    /// Whether the information field starts with an LLC header.
    pub const fn carries_llc(self) -> bool {
        matches!(self, Command::I | Command::UI)
    }
}

/// Who sent the frame. Decides the address order and the LLC header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Client to server: server address first.
    Command,
    /// Server to client: client address first.
    Response,
}

impl Direction {
    const fn llc(self) -> [u8; 3] {
        match self {
            Direction::Command => LLC_COMMAND,
            Direction::Response => LLC_RESPONSE,
        }
    }
}

/// One HDLC frame.
///
/// `payload` is the information field without the LLC header. Sequence
/// numbers are only meaningful for I frames (both) and RR/RNR (`recv_seq`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HdlcFrame {
    pub command: Command,
    pub direction: Direction,
    pub client_address: u8,
    pub logical_address: u16,
    pub physical_address: u16,
    pub address_size: AddressSize,
    pub send_seq: u8,
    pub recv_seq: u8,
    pub payload: Vec<u8>,
}

impl HdlcFrame {
    /// Encodes the frame including both flags.
    pub fn serialize(&self) -> Result<Vec<u8>, HdlcError> {
        let llc_len = if self.command.carries_llc() { 3 } else { 0 };
        let info_len = llc_len + self.payload.len();

        let mut out = Vec::with_capacity(16 + info_len);
        out.extend_from_slice(&[HDLC_FLAG, FORMAT_TYPE_3, 0x00]);

        match self.direction {
            Direction::Command => {
                address::encode_server(
                    &mut out,
                    self.logical_address,
                    self.physical_address,
                    self.address_size,
                )?;
                address::encode_client(&mut out, self.client_address)?;
            }
            Direction::Response => {
                address::encode_client(&mut out, self.client_address)?;
                address::encode_server(
                    &mut out,
                    self.logical_address,
                    self.physical_address,
                    self.address_size,
                )?;
            }
        }
        out.push(self.command.control(self.send_seq, self.recv_seq));

        // Header so far plus HCS, information field and FCS, without flags.
        let header_len = out.len() - 1;
        let frame_len = if info_len > 0 { header_len + 2 + info_len + 2 } else { header_len + 2 };
        if frame_len > MAX_FRAME_LENGTH {
            return Err(HdlcError::PayloadTooLarge(self.payload.len()));
        }
        out[1] = FORMAT_TYPE_3 | ((frame_len >> 8) as u8 & 0x07);
        out[2] = frame_len as u8;

        if info_len > 0 {
            let hcs = fcs16(&out[1..]);
            out.extend_from_slice(&hcs.to_le_bytes());
            if self.command.carries_llc() {
                out.extend_from_slice(&self.direction.llc());
            }
            out.extend_from_slice(&self.payload);
        }

        let fcs = fcs16(&out[1..]);
        out.extend_from_slice(&fcs.to_le_bytes());
        out.push(HDLC_FLAG);

        Ok(out)
    }

    /// Parses one complete frame sent in `direction`.
    ///
    /// Both check sequences are verified before any field is trusted.
    pub fn parse(bytes: &[u8], direction: Direction) -> Result<Self, HdlcError> {
        if bytes.first() != Some(&HDLC_FLAG) {
            return Err(HdlcError::InvalidFraming("missing opening flag"));
        }
        if bytes.len() < 2 || bytes.last() != Some(&HDLC_FLAG) {
            return Err(HdlcError::InvalidFraming("missing closing flag"));
        }
        if bytes.len() < MIN_FRAME_SIZE {
            return Err(HdlcError::InvalidFraming("frame too short"));
        }

        let fcs_pos = bytes.len() - 3;
        let expected = u16::from_le_bytes([bytes[fcs_pos], bytes[fcs_pos + 1]]);
        let computed = fcs16(&bytes[1..fcs_pos]);
        if expected != computed {
            return Err(HdlcError::ChecksumMismatch { field: "FCS", expected, computed });
        }

        let format = bytes[1];
        if format & 0xF0 != FORMAT_TYPE_3 {
            return Err(HdlcError::InvalidFraming("not a type 3 frame"));
        }
        if format & FORMAT_SEGMENTED != 0 {
            return Err(HdlcError::UnsupportedSegmentation);
        }
        let declared = (((format & 0x07) as usize) << 8) | bytes[2] as usize;
        let actual = bytes.len() - 2;
        if declared != actual {
            return Err(HdlcError::LengthMismatch { declared, actual });
        }

        let body = &bytes[3..fcs_pos];
        let (first, body) = address::split_field(body)?;
        let (second, body) = address::split_field(body)?;
        let (server, client) = match direction {
            Direction::Command => (first, second),
            Direction::Response => (second, first),
        };
        let (logical_address, physical_address, address_size) = address::decode_server(server)?;
        let client_address = address::decode_client(client)?;

        let (&control, info) =
            body.split_first().ok_or(HdlcError::InvalidFraming("missing control field"))?;
        let (command, send_seq, recv_seq) = Command::from_control(control)?;

        let payload = match info {
            [] => Vec::new(),
            [_] => return Err(HdlcError::InvalidFraming("truncated header check sequence")),
            [hcs_lo, hcs_hi, info @ ..] => {
                let hcs_pos = fcs_pos - info.len() - 2;
                let expected = u16::from_le_bytes([*hcs_lo, *hcs_hi]);
                let computed = fcs16(&bytes[1..hcs_pos]);
                if expected != computed {
                    return Err(HdlcError::ChecksumMismatch { field: "HCS", expected, computed });
                }
                info.to_vec()
            }
        };

        let payload = if command.carries_llc() {
            match payload.strip_prefix(&direction.llc()[..]) {
                Some(apdu) => apdu.to_vec(),
                None => return Err(HdlcError::InvalidLlc),
            }
        } else {
            payload
        };

        Ok(Self {
            command,
            direction,
            client_address,
            logical_address,
            physical_address,
            address_size,
            send_seq,
            recv_seq,
            payload,
        })
    }
}

/// Total frame size announced by the header at the start of `buf`, flags
/// included. Needs the opening flag and the format/length field.
pub fn frame_length(buf: &[u8]) -> Option<usize> {
    match buf {
        [HDLC_FLAG, format, len, ..] if format & 0xF0 == FORMAT_TYPE_3 => {
            Some(((((format & 0x07) as usize) << 8) | *len as usize) + 2)
        }
        _ => None,
    }
}

/// Whether `buf` starts with one complete frame: opening flag, declared
/// length fully received and a closing flag where the length says.
pub fn is_frame_complete(buf: &[u8]) -> bool {
    match frame_length(buf) {
        Some(len) => len >= MIN_FRAME_SIZE && buf.len() >= len && buf[len - 1] == HDLC_FLAG,
        None => false,
    }
}
