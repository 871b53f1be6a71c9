//! Concrete USB-backed [`Transport`], gated behind the `usb` feature.
//!
//! Implements exactly the contract spec.md §6 asks for: a command phase,
//! an optional outbound payload phase, and an optional inbound reply
//! phase, each a bulk transfer on the probe's in/out endpoints.

use crate::transport::{HwVariant, Transport};
use once_cell::sync::Lazy;
use rusb::{Context, Device, DeviceHandle, UsbContext};
use std::collections::HashMap;
use std::time::Duration;

/// Every ST-Link command is padded to this length before being sent.
const CMD_LEN: usize = 16;

/// The USB VendorID shared by every ST-Link probe.
pub const USB_VID: u16 = 0x0483;

const TIMEOUT: Duration = Duration::from_millis(1000);

/// Per-PID endpoint and hardware-variant table. Only the V2/V2-1 variants
/// this crate's `HwVariant` distinguishes are listed; V3 probes are out
/// of scope.
#[derive(Clone, Copy)]
pub struct StLinkInfo {
    pub hw_variant: HwVariant,
    ep_out: u8,
    ep_in: u8,
}

static USB_PID_EP_MAP: Lazy<HashMap<u16, StLinkInfo>> = Lazy::new(|| {
    let mut m = HashMap::new();
    m.insert(
        0x3748,
        StLinkInfo {
            hw_variant: HwVariant::V2,
            ep_out: 0x02,
            ep_in: 0x81,
        },
    );
    m.insert(
        0x374b,
        StLinkInfo {
            hw_variant: HwVariant::V2_1,
            ep_out: 0x01,
            ep_in: 0x81,
        },
    );
    m.insert(
        0x374a,
        StLinkInfo {
            hw_variant: HwVariant::V2_1,
            ep_out: 0x01,
            ep_in: 0x81,
        },
    );
    m
});

/// A USB bulk-transport connection to one ST-Link probe.
pub struct UsbTransport {
    handle: DeviceHandle<Context>,
    info: StLinkInfo,
}

impl UsbTransport {
    /// Opens the first ST-Link device found, or the one matching
    /// `serial_number` if given.
    #[tracing::instrument(skip(serial_number))]
    pub fn open(serial_number: Option<&str>) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let context = Context::new()?;
        let device = context
            .devices()?
            .iter()
            .find(|device| matches_stlink(device, serial_number))
            .ok_or("no matching ST-Link device found")?;

        let descriptor = device.device_descriptor()?;
        let info = *USB_PID_EP_MAP
            .get(&descriptor.product_id())
            .ok_or("unrecognized ST-Link product id")?;

        let mut handle = device.open()?;
        handle.claim_interface(0)?;

        Ok(Self { handle, info })
    }
}

impl Transport for UsbTransport {
    #[tracing::instrument(skip(self, command, data))]
    fn xfer(
        &mut self,
        command: &[u8],
        rx_length: usize,
        data: Option<&[u8]>,
    ) -> Result<Vec<u8>, Box<dyn std::error::Error + Send + Sync>> {
        let mut padded = command.to_vec();
        padded.resize(CMD_LEN, 0);

        let written = self.handle.write_bulk(self.info.ep_out, &padded, TIMEOUT)?;
        if written != CMD_LEN {
            return Err("short write on command phase".into());
        }

        if let Some(payload) = data {
            if !payload.is_empty() {
                let written = self.handle.write_bulk(self.info.ep_out, payload, TIMEOUT)?;
                if written != payload.len() {
                    return Err("short write on data phase".into());
                }
            }
        }

        if rx_length == 0 {
            return Ok(Vec::new());
        }

        let mut reply = vec![0u8; rx_length];
        let read = self.handle.read_bulk(self.info.ep_in, &mut reply, TIMEOUT)?;
        if read != rx_length {
            return Err("short read on reply phase".into());
        }
        Ok(reply)
    }

    fn version(&self) -> HwVariant {
        self.info.hw_variant
    }
}

fn matches_stlink<T: UsbContext>(device: &Device<T>, serial_number: Option<&str>) -> bool {
    let Ok(descriptor) = device.device_descriptor() else {
        return false;
    };
    if descriptor.vendor_id() != USB_VID || !USB_PID_EP_MAP.contains_key(&descriptor.product_id()) {
        return false;
    }
    match serial_number {
        None => true,
        Some(wanted) => read_serial_number(device, &descriptor)
            .map(|found| found == wanted)
            .unwrap_or(false),
    }
}

/// Reads a device's serial number, normalizing the binary 12-byte form
/// some ST-Link/V2 units report into a printable hex string.
fn read_serial_number<T: UsbContext>(
    device: &Device<T>,
    descriptor: &rusb::DeviceDescriptor,
) -> Result<String, rusb::Error> {
    let timeout = Duration::from_millis(100);
    let handle = device.open()?;
    let language = handle
        .read_languages(timeout)?
        .first()
        .copied()
        .ok_or(rusb::Error::BadDescriptor)?;
    let sn = handle.read_serial_number_string(language, descriptor, timeout)?;
    Ok(if sn.len() < 24 {
        sn.as_bytes().iter().map(|b| format!("{b:02X}")).collect()
    } else {
        sn
    })
}

/// Enumerates connected ST-Link devices without opening them.
#[tracing::instrument]
pub fn list_stlink_devices() -> Vec<(u16, u16, Option<String>)> {
    let Ok(context) = Context::new() else {
        return Vec::new();
    };
    let Ok(devices) = context.devices() else {
        return Vec::new();
    };

    devices
        .iter()
        .filter_map(|device| {
            let descriptor = device.device_descriptor().ok()?;
            if descriptor.vendor_id() != USB_VID || !USB_PID_EP_MAP.contains_key(&descriptor.product_id()) {
                return None;
            }
            let serial = match read_serial_number(&device, &descriptor) {
                Ok(sn) => Some(sn),
                Err(e) => {
                    tracing::debug!(
                        "failed to read serial number of {:04x}:{:04x}: {e}",
                        descriptor.vendor_id(),
                        descriptor.product_id()
                    );
                    None
                }
            };
            Some((descriptor.vendor_id(), descriptor.product_id(), serial))
        })
        .collect()
}
