//! [`ProbeVersion`], decoded once from the 6-byte `GET_VERSION` reply and
//! immutable thereafter.

use crate::transport::HwVariant;
use std::fmt;

/// Either the SWIM or the mass-storage firmware field, depending on the
/// probe's hardware variant. Only one of the two is ever present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwimOrMass {
    Swim(u8),
    Mass(u8),
}

/// Decoded ST-Link/V2 firmware identity. Constructed once on session open
/// from the 6-byte `GET_VERSION` reply; immutable thereafter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeVersion {
    /// Major firmware nibble (0-15).
    pub stlink: u8,
    /// JTAG/SWD firmware minor (0-63).
    pub jtag: u8,
    /// SWIM firmware minor (hw_variant == V2) or mass-storage firmware
    /// minor (hw_variant == V2-1).
    pub swim_or_mass: SwimOrMass,
    /// Hardware variant, from the transport's USB descriptors.
    pub hw_variant: HwVariant,
}

impl ProbeVersion {
    /// Decodes a `ProbeVersion` from the big-endian 16-bit version word
    /// returned in the first two bytes of the `GET_VERSION` reply.
    pub fn from_version_word(ver: u16, hw_variant: HwVariant) -> Self {
        let stlink = ((ver >> 12) & 0xF) as u8;
        let jtag = ((ver >> 6) & 0x3F) as u8;
        let last_field = (ver & 0x3F) as u8;

        let swim_or_mass = match hw_variant {
            HwVariant::V2 => SwimOrMass::Swim(last_field),
            HwVariant::V2_1 => SwimOrMass::Mass(last_field),
        };

        Self {
            stlink,
            jtag,
            swim_or_mass,
            hw_variant,
        }
    }

    /// The API generation in effect: 2 when `jtag > 11`, else 1.
    pub fn api(&self) -> u8 {
        if self.jtag > 11 {
            2
        } else {
            1
        }
    }
}

impl fmt::Display for ProbeVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let variant = match self.hw_variant {
            HwVariant::V2 => "V2",
            HwVariant::V2_1 => "V2-1",
        };
        write!(f, "ST-Link/{variant} V{}J{}", self.stlink, self.jtag)?;
        match self.swim_or_mass {
            SwimOrMass::Swim(n) => write!(f, "S{n}"),
            SwimOrMass::Mass(n) => write!(f, "M{n}"),
        }
    }
}
