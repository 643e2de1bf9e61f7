//! CRC-16/X.25 frame check sequence (reflected polynomial 0x8408, seed 0xFFFF,
//! final one's complement).

const POLYNOMIAL: u16 = 0x8408;

const fn build_table() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u16;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 1 != 0 { (crc >> 1) ^ POLYNOMIAL } else { crc >> 1 };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

static FCS16_TABLE: [u16; 256] = build_table();

/// Computes the HCS/FCS over `data`.
///
/// The result is written to the frame little-endian (`fcs.to_le_bytes()`).
pub fn fcs16(data: &[u8]) -> u16 {
    !data.iter().fold(0xFFFF_u16, |fcs, &byte| {
        (fcs >> 8) ^ FCS16_TABLE[((fcs ^ byte as u16) & 0xFF) as usize]
    })
}
