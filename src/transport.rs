//! The contract this crate expects from the USB layer (§6 of the
//! specification). Everything above this trait is written and tested
//! against it directly; the `usb` feature provides one real
//! implementation, [`crate::usb_interface::UsbTransport`].

/// Hardware variant, derived from USB descriptors, that decides whether
/// the low 6 bits of the version word are SWIM or mass-storage firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwVariant {
    V2,
    V2_1,
}

/// Issues a command byte-string to the probe and receives an optional
/// reply of declared length, optionally sending an outbound data payload
/// first.
pub trait Transport {
    /// Sends `command`, then `data` (if any), then reads back `rx_length`
    /// bytes and returns them. `rx_length == 0` means no reply is read.
    fn xfer(
        &mut self,
        command: &[u8],
        rx_length: usize,
        data: Option<&[u8]>,
    ) -> Result<Vec<u8>, Box<dyn std::error::Error + Send + Sync>>;

    /// The probe's hardware variant, derived from USB descriptors.
    fn version(&self) -> HwVariant;
}

#[cfg(test)]
pub(crate) mod mock {
    use super::{HwVariant, Transport};
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    /// One recorded call: the command bytes and the outbound payload, if
    /// any, that accompanied it.
    pub type SentCall = (Vec<u8>, Option<Vec<u8>>);

    /// A scripted, in-memory [`Transport`] used throughout this crate's
    /// test suite. Replies are queued in the order they are expected to
    /// be consumed. The sent-call log lives behind an `Rc<RefCell<_>>` so
    /// a test can grab a handle with [`MockTransport::sent_log`] before
    /// handing the transport's ownership to a `Session`.
    #[derive(Debug, Default)]
    pub struct MockTransport {
        pub variant: Option<HwVariant>,
        pub replies: VecDeque<Vec<u8>>,
        sent: Rc<RefCell<Vec<SentCall>>>,
    }

    impl MockTransport {
        pub fn new(variant: HwVariant) -> Self {
            Self {
                variant: Some(variant),
                replies: VecDeque::new(),
                sent: Rc::new(RefCell::new(Vec::new())),
            }
        }

        pub fn queue_reply(&mut self, reply: impl Into<Vec<u8>>) {
            self.replies.push_back(reply.into());
        }

        /// A shared handle to the sent-call log, readable after the
        /// `MockTransport` itself has been moved into a `Session`.
        pub fn sent_log(&self) -> Rc<RefCell<Vec<SentCall>>> {
            self.sent.clone()
        }
    }

    impl Transport for MockTransport {
        fn xfer(
            &mut self,
            command: &[u8],
            rx_length: usize,
            data: Option<&[u8]>,
        ) -> Result<Vec<u8>, Box<dyn std::error::Error + Send + Sync>> {
            self.sent
                .borrow_mut()
                .push((command.to_vec(), data.map(|d| d.to_vec())));

            let reply = self.replies.pop_front().unwrap_or_default();
            assert_eq!(
                reply.len(),
                rx_length,
                "queued reply length does not match rx_length for command {command:?}"
            );
            Ok(reply)
        }

        fn version(&self) -> HwVariant {
            self.variant.expect("MockTransport.variant not set")
        }
    }
}
