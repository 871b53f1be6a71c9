//! Byte-exact command encoding for the ST-Link/V2 v2 API (§4.2).
//!
//! A [`CommandBuilder`] assembles the short, fixed-schema command strings;
//! reply decoding is a handful of free functions next to it, since every
//! reply format in §4.2's table is a fixed byte layout with no framing to
//! speak of.

use scroll::{Pread, LE};

/// Assembles a command byte string: an opcode prefix followed by typed
/// little-endian fields. Mirrors the teacher's hand-rolled byte arrays
/// (`&[commands::DEBUG_COMMAND, commands::DEBUG_READMEM_32BIT, ...]`)
/// but as a small reusable builder, per the design note in spec.md §9.
#[derive(Debug, Default)]
pub struct CommandBuilder {
    bytes: Vec<u8>,
}

impl CommandBuilder {
    pub fn new() -> Self {
        Self { bytes: Vec::new() }
    }

    pub fn push_u8(mut self, byte: u8) -> Self {
        self.bytes.push(byte);
        self
    }

    pub fn push_u32_le(mut self, value: u32) -> Self {
        self.bytes.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Decodes the `GET_TARGET_VOLTAGE` reply: two little-endian u32 values
/// `(an0, an1)`. Voltage is `2 * an1 * 1.2 / an0`, rounded to 2 decimals;
/// `None` (undefined) when `an0 == 0`.
pub fn decode_target_voltage(reply: &[u8]) -> Option<f64> {
    let an0: u32 = reply.pread_with(0, LE).expect("reply is 8 bytes");
    let an1: u32 = reply.pread_with(4, LE).expect("reply is 8 bytes");

    if an0 == 0 {
        return None;
    }

    let voltage = 2.0 * f64::from(an1) * 1.2 / f64::from(an0);
    Some((voltage * 100.0).round() / 100.0)
}

/// Decodes a little-endian u32 at a given byte offset, as used by the
/// IDCODE, register-read and single mem32-read replies.
pub fn decode_u32_at(reply: &[u8], offset: usize) -> u32 {
    reply
        .pread_with(offset, LE)
        .expect("reply too short for u32 field")
}

/// Decodes the big-endian 16-bit version word from the first two bytes of
/// the `GET_VERSION` reply.
pub fn decode_version_word(reply: &[u8]) -> u16 {
    reply
        .pread_with(0, scroll::BE)
        .expect("reply too short for version word")
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn builds_command_with_mixed_fields() {
        let cmd = CommandBuilder::new()
            .push_u8(0xF2)
            .push_u8(0x34)
            .push_u8(0x05)
            .push_u32_le(0xDEADBEEF)
            .into_bytes();

        assert_eq!(cmd, vec![0xF2, 0x34, 0x05, 0xEF, 0xBE, 0xAD, 0xDE]);
    }

    #[test]
    fn decodes_voltage_normally() {
        // an0 = 1000, an1 = 600 -> 2 * 600 * 1.2 / 1000 = 1.44
        let mut reply = [0u8; 8];
        reply[0..4].copy_from_slice(&1000u32.to_le_bytes());
        reply[4..8].copy_from_slice(&600u32.to_le_bytes());

        assert_eq!(decode_target_voltage(&reply), Some(1.44));
    }

    #[test]
    fn voltage_is_undefined_when_reference_is_zero() {
        let mut reply = [0u8; 8];
        reply[4..8].copy_from_slice(&600u32.to_le_bytes());
        assert_eq!(decode_target_voltage(&reply), None);
    }

    #[test]
    fn decodes_idcode_offset() {
        let mut reply = [0u8; 12];
        reply[4..8].copy_from_slice(&0x2BA0_1477u32.to_le_bytes());
        assert_eq!(decode_u32_at(&reply, 4), 0x2BA0_1477);
    }

    #[test]
    fn decodes_big_endian_version_word() {
        let reply = [0x12, 0x34, 0, 0, 0, 0];
        assert_eq!(decode_version_word(&reply), 0x1234);
    }
}
