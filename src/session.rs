//! Probe session lifecycle: §4.1 of the specification.

use crate::codec::{decode_version_word, CommandBuilder};
use crate::constants::{commands, find_swd_divisor, ProbeMode, Status, MIN_JTAG_VERSION_FOR_FREQUENCY};
use crate::error::Error;
use crate::transport::Transport;
use crate::version::ProbeVersion;

/// An open logical session on an ST-Link/V2 probe. Owns the [`Transport`]
/// exclusively: the public contract requires callers to serialize access
/// (§5), so every method here takes `&mut self`.
pub struct Session {
    pub(crate) transport: Box<dyn Transport>,
    version: ProbeVersion,
    bus_hz: u32,
    api: u8,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("version", &self.version)
            .field("bus_hz", &self.bus_hz)
            .field("api", &self.api)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Opens a session: queries the probe's firmware version, leaves
    /// whatever mode it was previously in, negotiates the SWD bus
    /// frequency (if the firmware supports it), and enters Debug/SWD.
    #[tracing::instrument(skip(transport))]
    pub fn open(requested_hz: u32, mut transport: Box<dyn Transport>) -> Result<Self, Error> {
        let version = Self::query_version(transport.as_mut())?;
        tracing::debug!("probe version: {version}");

        Self::leave_prior_mode(transport.as_mut())?;

        let mut bus_hz = requested_hz;
        if version.jtag >= MIN_JTAG_VERSION_FOR_FREQUENCY {
            bus_hz = Self::set_swd_frequency(transport.as_mut(), requested_hz)?;
        } else {
            tracing::debug!(
                "firmware jtag={} predates programmable frequency; leaving probe at its default",
                version.jtag
            );
        }

        Self::enter_debug_swd(transport.as_mut())?;

        let api = version.api();
        Ok(Self {
            transport,
            version,
            bus_hz,
            api,
        })
    }

    fn query_version(transport: &mut dyn Transport) -> Result<ProbeVersion, Error> {
        let cmd = CommandBuilder::new()
            .push_u8(commands::GET_VERSION)
            .push_u8(0x80)
            .into_bytes();
        let reply = transport.xfer(&cmd, 6, None)?;
        let ver = decode_version_word(&reply);
        Ok(ProbeVersion::from_version_word(ver, transport.version()))
    }

    fn leave_prior_mode(transport: &mut dyn Transport) -> Result<(), Error> {
        let cmd = [commands::GET_CURRENT_MODE];
        let reply = transport.xfer(&cmd, 2, None)?;

        let exit_cmd: Option<[u8; 2]> = match ProbeMode::try_from(reply[0]) {
            Ok(ProbeMode::Dfu) => Some([commands::DFU_COMMAND, commands::DFU_EXIT]),
            Ok(ProbeMode::Debug) => Some([commands::DEBUG_COMMAND, commands::DEBUG_EXIT]),
            Ok(ProbeMode::Swim) => Some([commands::SWIM_COMMAND, commands::SWIM_EXIT]),
            // BOOTLOADER and MASS are left untouched: the probe is assumed
            // to never be found in those modes on entry, or to tolerate a
            // debug command regardless.
            Ok(ProbeMode::Mass) | Ok(ProbeMode::Bootloader) | Err(_) => None,
        };

        if let Some(cmd) = exit_cmd {
            transport.xfer(&cmd, 0, None)?;
        }

        Ok(())
    }

    fn set_swd_frequency(transport: &mut dyn Transport, requested_hz: u32) -> Result<u32, Error> {
        let divisor = find_swd_divisor(requested_hz)
            .ok_or(Error::FrequencyError("requested frequency too low"))?;

        let cmd = CommandBuilder::new()
            .push_u8(commands::DEBUG_COMMAND)
            .push_u8(commands::DEBUG_SWD_SET_FREQ)
            .push_u8(divisor)
            .into_bytes();
        let reply = transport.xfer(&cmd, 2, None)?;

        if Status::from(reply[0]) != Status::JtagOk {
            return Err(Error::FrequencyError("frequency switch refused"));
        }

        Ok(requested_hz)
    }

    fn enter_debug_swd(transport: &mut dyn Transport) -> Result<(), Error> {
        let cmd = CommandBuilder::new()
            .push_u8(commands::DEBUG_COMMAND)
            .push_u8(commands::DEBUG_ENTER2)
            .push_u8(commands::DEBUG_ENTER_SWD)
            .into_bytes();
        transport.xfer(&cmd, 2, None)?;
        Ok(())
    }

    /// The probe's decoded firmware identity.
    pub fn version(&self) -> ProbeVersion {
        self.version
    }

    /// The negotiated SWD bus frequency in Hz.
    pub fn bus_frequency_hz(&self) -> u32 {
        self.bus_hz
    }

    /// The API generation in effect (1 or 2).
    pub fn api(&self) -> u8 {
        self.api
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::transport::mock::MockTransport;
    use crate::transport::HwVariant;

    fn version_reply(stlink: u8, jtag: u8, last: u8) -> Vec<u8> {
        let ver: u16 = ((stlink as u16) << 12) | ((jtag as u16) << 6) | (last as u16);
        vec![(ver >> 8) as u8, ver as u8, 0, 0, 0, 0]
    }

    #[test]
    fn opens_full_sequence_for_modern_firmware_in_debug_mode() {
        let mut mock = MockTransport::new(HwVariant::V2);
        mock.queue_reply(version_reply(2, 30, 5)); // GET_VERSION
        mock.queue_reply(vec![ProbeMode::Debug as u8, 0]); // GET_CURRENT_MODE
        mock.queue_reply(vec![]); // DEBUG_EXIT (rx_length 0)
        mock.queue_reply(vec![0x80, 0]); // SWD_SET_FREQ ack
        mock.queue_reply(vec![0x80, 0]); // ENTER2 ack

        let session = Session::open(500_000, Box::new(mock)).unwrap();

        assert_eq!(session.version().jtag, 30);
        assert_eq!(session.bus_frequency_hz(), 500_000);
        assert_eq!(session.api(), 2);
    }

    #[test]
    fn rejects_frequency_below_table_floor() {
        let mut mock = MockTransport::new(HwVariant::V2);
        mock.queue_reply(version_reply(2, 30, 5));
        mock.queue_reply(vec![ProbeMode::Debug as u8, 0]);
        mock.queue_reply(vec![]);

        let err = Session::open(1_000, Box::new(mock)).unwrap_err();
        assert!(matches!(err, Error::FrequencyError(_)));
    }

    #[test]
    fn rejects_frequency_switch_when_probe_refuses() {
        let mut mock = MockTransport::new(HwVariant::V2);
        mock.queue_reply(version_reply(2, 30, 5));
        mock.queue_reply(vec![ProbeMode::Debug as u8, 0]);
        mock.queue_reply(vec![]);
        mock.queue_reply(vec![0x01, 0]); // non-OK status

        let err = Session::open(500_000, Box::new(mock)).unwrap_err();
        assert!(matches!(err, Error::FrequencyError("frequency switch refused")));
    }

    #[test]
    fn skips_frequency_negotiation_on_old_firmware() {
        let mut mock = MockTransport::new(HwVariant::V2);
        mock.queue_reply(version_reply(2, 10, 5)); // jtag < 22
        mock.queue_reply(vec![ProbeMode::Dfu as u8, 0]);
        mock.queue_reply(vec![]); // DFU_EXIT
        mock.queue_reply(vec![0x80, 0]); // ENTER2 ack, no freq-set reply queued

        let session = Session::open(500_000, Box::new(mock)).unwrap();
        assert_eq!(session.bus_frequency_hz(), 500_000);
    }

    #[test]
    fn leaves_mass_and_bootloader_modes_untouched() {
        for starting_mode in [ProbeMode::Mass, ProbeMode::Bootloader] {
            let mut mock = MockTransport::new(HwVariant::V2);
            mock.queue_reply(version_reply(2, 30, 5));
            mock.queue_reply(vec![starting_mode as u8, 0]);
            // No mode-exit command is expected; next reply belongs to
            // SWD_SET_FREQ.
            mock.queue_reply(vec![0x80, 0]);
            mock.queue_reply(vec![0x80, 0]);

            Session::open(500_000, Box::new(mock)).unwrap();
        }
    }
}
