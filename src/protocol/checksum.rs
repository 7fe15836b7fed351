//! Frame checksum
//!
//! CRC-8 with polynomial 0x07, register seeded with 0xB5, computed bit by bit
//! (MSB first) over the region from the length byte through the last payload
//! byte, augmented with eight zero bits and finally XORed with 0x02.

const POLYNOMIAL: u8 = 0x07;
const INITIAL: u8 = 0xB5;
const FINAL_XOR: u8 = 0x02;

#[inline]
fn shift_in(crc: u8, bit: u8) -> u8 {
    let carry = crc & 0x80 != 0;
    let next = (crc << 1) | bit;
    if carry {
        next ^ POLYNOMIAL
    } else {
        next
    }
}

/// Computes the checksum of `data` (length byte through last payload byte)
pub fn crc8(data: &[u8]) -> u8 {
    let mut crc = INITIAL;
    for &byte in data {
        for i in (0..8).rev() {
            crc = shift_in(crc, (byte >> i) & 1);
        }
    }
    for _ in 0..8 {
        crc = shift_in(crc, 0);
    }
    crc ^ FINAL_XOR
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_button_press_vectors() {
        // 7E 06 10 BF 17 <code> <chk> 7E
        let cases: [(u8, u8); 8] = [
            (0x01, 0x7C),
            (0x02, 0x75),
            (0x04, 0x67),
            (0x05, 0x60),
            (0x1E, 0x21),
            (0x0F, 0x56),
            (0x11, 0x0C),
            (0x12, 0x05),
        ];
        for (code, expected) in cases {
            assert_eq!(crc8(&[0x06, 0x10, 0xBF, 0x17, code]), expected, "button 0x{:02X}", code);
        }
    }

    #[test]
    fn test_arbitration_vectors() {
        assert_eq!(crc8(&[0x08, 0xFE, 0xBF, 0x01, 0x02, 0xF1, 0x73]), 0xB9);
        assert_eq!(crc8(&[0x05, 0x07, 0xBF, 0x03]), 0xF3);
        assert_eq!(crc8(&[0x05, 0x10, 0xBF, 0x06]), 0x5C);
        assert_eq!(crc8(&[0x08, 0x10, 0xBF, 0x05, 0x04, 0x08, 0x00]), 0x73);
    }

    #[test]
    fn test_captured_status_frame() {
        let frame = [
            0x0B, 0x0A, 0xBF, 0x2E, 0x0A, 0x00, 0x01, 0x50, 0x00, 0x00,
        ];
        assert_eq!(crc8(&frame), 0xBF);
    }
}
