//! ST-Link/V2 probe driver core.
//!
//! Speaks the ST-Link/V2 USB command set and, through it, Serial Wire
//! Debug (SWD) to an ARM Cortex-M target: version discovery, mode
//! management, bus-frequency negotiation, register and memory access, and
//! a transfer planner that decomposes arbitrary memory requests into
//! legal 8-bit/32-bit primitive sequences.
//!
//! This crate does not own a USB transport by default; callers provide
//! one implementing [`Transport`], or enable the `usb` feature for
//! [`UsbTransport`], a `rusb`-backed implementation.

mod codec;
mod constants;
mod error;
mod planner;
mod primitives;
mod session;
mod transport;
mod version;

#[cfg(feature = "usb")]
mod usb_interface;

pub use constants::ProbeMode;
pub use error::Error;
pub use planner::{collect_read, ReadMem};
pub use session::Session;
pub use transport::{HwVariant, Transport};
pub use version::{ProbeVersion, SwimOrMass};

#[cfg(feature = "usb")]
pub use usb_interface::{list_stlink_devices, UsbTransport};
