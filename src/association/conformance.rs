//! Conformance block
//!
//! Declares which xDLMS services the client proposes and the server grants.
//! Bits are numbered as in Green Book Table 133 and bit `n` is carried as
//! `1 << n` of the big-endian 32-bit block on the wire.

use std::fmt;

/// Conformance bits indicating supported xDLMS services
///
/// ```
/// use dlms_cosem_client::association::Conformance;
///
/// let proposed = Conformance::GET | Conformance::SET | Conformance::ACTION;
/// assert!(proposed.contains(Conformance::GET));
/// assert!(!proposed.contains(Conformance::SELECTIVE_ACCESS));
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Conformance {
    bits: u32,
}

impl Conformance {
    pub const GENERAL_PROTECTION: Self = Self::bit(1);
    pub const GENERAL_BLOCK_TRANSFER: Self = Self::bit(2);
    pub const DELTA_VALUE_ENCODING: Self = Self::bit(6);
    pub const ATTRIBUTE_0_SUPPORTED_WITH_SET: Self = Self::bit(8);
    pub const PRIORITY_MGMT_SUPPORTED: Self = Self::bit(9);
    pub const ATTRIBUTE_0_SUPPORTED_WITH_GET: Self = Self::bit(10);
    pub const BLOCK_TRANSFER_WITH_GET_OR_READ: Self = Self::bit(11);
    pub const BLOCK_TRANSFER_WITH_SET_OR_WRITE: Self = Self::bit(12);
    pub const BLOCK_TRANSFER_WITH_ACTION: Self = Self::bit(13);
    pub const MULTIPLE_REFERENCES: Self = Self::bit(14);
    pub const DATA_NOTIFICATION: Self = Self::bit(16);
    pub const ACCESS: Self = Self::bit(17);
    pub const GET: Self = Self::bit(19);
    pub const SET: Self = Self::bit(20);
    pub const SELECTIVE_ACCESS: Self = Self::bit(21);
    pub const EVENT_NOTIFICATION: Self = Self::bit(22);
    pub const ACTION: Self = Self::bit(23);

    pub const EMPTY: Self = Self { bits: 0 };

    /// What this client proposes in every AARQ (`00 B8 38 00` on the wire).
    pub const CLIENT_DEFAULT: Self = Self {
        bits: Self::GET.bits
            | Self::SET.bits
            | Self::ACTION.bits
            | Self::SELECTIVE_ACCESS.bits
            | Self::BLOCK_TRANSFER_WITH_GET_OR_READ.bits
            | Self::BLOCK_TRANSFER_WITH_SET_OR_WRITE.bits
            | Self::BLOCK_TRANSFER_WITH_ACTION.bits,
    };

    const NAMES: [(Self, &'static str); 17] = [
        (Self::GENERAL_PROTECTION, "general-protection"),
        (Self::GENERAL_BLOCK_TRANSFER, "general-block-transfer"),
        (Self::DELTA_VALUE_ENCODING, "delta-value-encoding"),
        (Self::ATTRIBUTE_0_SUPPORTED_WITH_SET, "attribute0-supported-with-set"),
        (Self::PRIORITY_MGMT_SUPPORTED, "priority-mgmt-supported"),
        (Self::ATTRIBUTE_0_SUPPORTED_WITH_GET, "attribute0-supported-with-get"),
        (Self::BLOCK_TRANSFER_WITH_GET_OR_READ, "block-transfer-with-get-or-read"),
        (Self::BLOCK_TRANSFER_WITH_SET_OR_WRITE, "block-transfer-with-set-or-write"),
        (Self::BLOCK_TRANSFER_WITH_ACTION, "block-transfer-with-action"),
        (Self::MULTIPLE_REFERENCES, "multiple-references"),
        (Self::DATA_NOTIFICATION, "data-notification"),
        (Self::ACCESS, "access"),
        (Self::GET, "get"),
        (Self::SET, "set"),
        (Self::SELECTIVE_ACCESS, "selective-access"),
        (Self::EVENT_NOTIFICATION, "event-notification"),
        (Self::ACTION, "action"),
    ];

    const fn bit(n: u32) -> Self {
        Self { bits: 1 << n }
    }

    pub const fn from_bits(bits: u32) -> Self {
        Self { bits }
    }

    pub const fn bits(self) -> u32 {
        self.bits
    }

    pub const fn from_bytes(bytes: [u8; 4]) -> Self {
        Self { bits: u32::from_be_bytes(bytes) }
    }

    pub const fn to_bytes(self) -> [u8; 4] {
        self.bits.to_be_bytes()
    }

    pub const fn contains(self, other: Self) -> bool {
        self.bits & other.bits == other.bits
    }

    pub const fn is_empty(self) -> bool {
        self.bits == 0
    }

    pub const fn union(self, other: Self) -> Self {
        Self { bits: self.bits | other.bits }
    }

    pub const fn intersection(self, other: Self) -> Self {
        Self { bits: self.bits & other.bits }
    }
}

impl Default for Conformance {
    fn default() -> Self {
        Self::CLIENT_DEFAULT
    }
}

impl std::ops::BitOr for Conformance {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl std::ops::BitOrAssign for Conformance {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = self.union(rhs);
    }
}

impl std::ops::BitAnd for Conformance {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        self.intersection(rhs)
    }
}

impl fmt::Debug for Conformance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Conformance({:#010x})", self.bits)
    }
}

impl fmt::Display for Conformance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names =
            Self::NAMES.iter().filter(|(flag, _)| self.contains(*flag)).map(|(_, name)| *name);
        match names.next() {
            Some(first) => {
                f.write_str(first)?;
                for name in names {
                    write!(f, " | {name}")?;
                }
                Ok(())
            }
            None => f.write_str("(none)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_default_wire_bytes() {
        assert_eq!(Conformance::CLIENT_DEFAULT.to_bytes(), [0x00, 0xB8, 0x38, 0x00]);
        assert_eq!(Conformance::from_bytes([0x00, 0xB8, 0x38, 0x00]), Conformance::CLIENT_DEFAULT);
        assert_eq!(Conformance::default(), Conformance::CLIENT_DEFAULT);
    }

    #[test]
    fn test_set_operations() {
        let granted =
            Conformance::CLIENT_DEFAULT & (Conformance::GET | Conformance::MULTIPLE_REFERENCES);
        assert_eq!(granted, Conformance::GET);
        assert!(granted.contains(Conformance::GET));
        assert!(!granted.contains(Conformance::SET));

        let mut flags = Conformance::EMPTY;
        assert!(flags.is_empty());
        flags |= Conformance::ACTION;
        assert_eq!(flags.bits(), 0x0080_0000);
    }

    #[test]
    fn test_display() {
        assert_eq!((Conformance::GET | Conformance::ACTION).to_string(), "get | action");
        assert_eq!(Conformance::EMPTY.to_string(), "(none)");
        assert_eq!(format!("{:?}", Conformance::GET), "Conformance(0x00080000)");
    }
}
