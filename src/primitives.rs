//! Versioned (v2) primitive operations (§4.3): one probe command each,
//! validated against the transfer limits of §3 before any bytes hit the
//! wire.

use crate::codec::{decode_target_voltage, decode_u32_at, CommandBuilder};
use crate::constants::{commands, Status};
use crate::error::Error;
use crate::session::Session;

/// Maximum bytes per 8-bit bulk primitive.
pub const MAX_8BIT_TRANSFER: usize = 64;
/// Maximum bytes per 32-bit bulk primitive.
pub const MAX_32BIT_TRANSFER: usize = 1024;

fn require_aligned(value: u32) -> Result<(), Error> {
    if value % 4 != 0 {
        return Err(Error::AlignmentError(value));
    }
    Ok(())
}

fn require_within(requested: usize, max: usize) -> Result<(), Error> {
    if requested > max {
        return Err(Error::SizeError { requested, max });
    }
    Ok(())
}

impl Session {
    /// `get_target_voltage() → float | absent`.
    #[tracing::instrument(skip(self))]
    pub fn get_target_voltage(&mut self) -> Result<Option<f64>, Error> {
        let cmd = [commands::GET_TARGET_VOLTAGE];
        let reply = self.transport.xfer(&cmd, 8, None)?;
        Ok(decode_target_voltage(&reply))
    }

    /// `get_idcode() → u32`.
    #[tracing::instrument(skip(self))]
    pub fn get_idcode(&mut self) -> Result<u32, Error> {
        let cmd = CommandBuilder::new()
            .push_u8(commands::DEBUG_COMMAND)
            .push_u8(commands::DEBUG_READ_IDCODES)
            .into_bytes();
        let reply = self.transport.xfer(&cmd, 12, None)?;
        Ok(decode_u32_at(&reply, 4))
    }

    /// `get_reg(id) → u32`.
    #[tracing::instrument(skip(self))]
    pub fn get_reg(&mut self, id: u8) -> Result<u32, Error> {
        let cmd = CommandBuilder::new()
            .push_u8(commands::DEBUG_COMMAND)
            .push_u8(commands::DEBUG_READREG)
            .push_u8(id)
            .into_bytes();
        let reply = self.transport.xfer(&cmd, 8, None)?;
        Ok(decode_u32_at(&reply, 4))
    }

    /// `set_reg(id, value)`.
    #[tracing::instrument(skip(self))]
    pub fn set_reg(&mut self, id: u8, value: u32) -> Result<(), Error> {
        let cmd = CommandBuilder::new()
            .push_u8(commands::DEBUG_COMMAND)
            .push_u8(commands::DEBUG_WRITEREG)
            .push_u8(id)
            .push_u32_le(value)
            .into_bytes();
        let reply = self.transport.xfer(&cmd, 2, None)?;
        check_status(&reply)
    }

    /// `get_mem32(addr) → u32`. Requires `addr % 4 == 0`.
    #[tracing::instrument(skip(self))]
    pub fn get_mem32(&mut self, addr: u32) -> Result<u32, Error> {
        require_aligned(addr)?;
        let cmd = CommandBuilder::new()
            .push_u8(commands::DEBUG_COMMAND)
            .push_u8(commands::DEBUG_READMEM_32BIT)
            .push_u32_le(addr)
            .into_bytes();
        let reply = self.transport.xfer(&cmd, 8, None)?;
        Ok(decode_u32_at(&reply, 4))
    }

    /// `set_mem32(addr, value)`. Requires `addr % 4 == 0`.
    #[tracing::instrument(skip(self))]
    pub fn set_mem32(&mut self, addr: u32, value: u32) -> Result<(), Error> {
        require_aligned(addr)?;
        let cmd = CommandBuilder::new()
            .push_u8(commands::DEBUG_COMMAND)
            .push_u8(commands::DEBUG_WRITEMEM_32BIT)
            .push_u32_le(addr)
            .push_u32_le(value)
            .into_bytes();
        let reply = self.transport.xfer(&cmd, 2, None)?;
        check_status(&reply)
    }

    /// Bulk 8-bit memory read: `≤ 64` bytes, no alignment requirement.
    #[tracing::instrument(skip(self))]
    pub(crate) fn read_mem8(&mut self, addr: u32, len: u32) -> Result<Vec<u8>, Error> {
        require_within(len as usize, MAX_8BIT_TRANSFER)?;
        let cmd = CommandBuilder::new()
            .push_u8(commands::DEBUG_COMMAND)
            .push_u8(commands::DEBUG_READMEM_8BIT)
            .push_u32_le(addr)
            .push_u32_le(len)
            .into_bytes();
        Ok(self.transport.xfer(&cmd, len as usize, None)?)
    }

    /// Bulk 8-bit memory write: `≤ 64` bytes, no alignment requirement.
    #[tracing::instrument(skip(self, data))]
    pub(crate) fn write_mem8(&mut self, addr: u32, data: &[u8]) -> Result<(), Error> {
        require_within(data.len(), MAX_8BIT_TRANSFER)?;
        let cmd = CommandBuilder::new()
            .push_u8(commands::DEBUG_COMMAND)
            .push_u8(commands::DEBUG_WRITEMEM_8BIT)
            .push_u32_le(addr)
            .push_u32_le(data.len() as u32)
            .into_bytes();
        self.transport.xfer(&cmd, 0, Some(data))?;
        Ok(())
    }

    /// Bulk 32-bit memory read: `≤ 1024` bytes, address and length both
    /// multiples of 4.
    #[tracing::instrument(skip(self))]
    pub(crate) fn read_mem32(&mut self, addr: u32, len: u32) -> Result<Vec<u8>, Error> {
        require_aligned(addr)?;
        require_aligned(len)?;
        require_within(len as usize, MAX_32BIT_TRANSFER)?;
        let cmd = CommandBuilder::new()
            .push_u8(commands::DEBUG_COMMAND)
            .push_u8(commands::DEBUG_READMEM_32BIT_BULK)
            .push_u32_le(addr)
            .push_u32_le(len)
            .into_bytes();
        Ok(self.transport.xfer(&cmd, len as usize, None)?)
    }

    /// Bulk 32-bit memory write: `≤ 1024` bytes, address and length both
    /// multiples of 4.
    #[tracing::instrument(skip(self, data))]
    pub(crate) fn write_mem32(&mut self, addr: u32, data: &[u8]) -> Result<(), Error> {
        require_aligned(addr)?;
        require_aligned(data.len() as u32)?;
        require_within(data.len(), MAX_32BIT_TRANSFER)?;
        let cmd = CommandBuilder::new()
            .push_u8(commands::DEBUG_COMMAND)
            .push_u8(commands::DEBUG_WRITEMEM_32BIT_BULK)
            .push_u32_le(addr)
            .push_u32_le(data.len() as u32)
            .into_bytes();
        self.transport.xfer(&cmd, 0, Some(data))?;
        Ok(())
    }
}

fn check_status(reply: &[u8]) -> Result<(), Error> {
    match Status::from(reply[0]) {
        Status::JtagOk => Ok(()),
        other => Err(Error::ProbeStatus(other)),
    }
}
