//! The crate's error taxonomy.
//!
//! `AlignmentError` and `SizeError` are raised before any bytes hit the
//! wire; `FrequencyError` and `ProbeStatus` come back from the probe;
//! `Transport` wraps whatever the underlying USB layer reports.

use crate::constants::Status;

/// Errors produced by this crate.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Address or length was not a multiple of 4 where the primitive or
    /// plan requires it.
    #[error("address or length {0:#x} is not aligned to 4 bytes")]
    AlignmentError(u32),

    /// A transfer exceeded the primitive's maximum size.
    #[error("transfer of {requested} bytes exceeds the {max}-byte limit for this primitive")]
    SizeError {
        /// Bytes the caller asked to transfer.
        requested: usize,
        /// Maximum the primitive supports.
        max: usize,
    },

    /// The requested SWD frequency is below the minimum the frequency
    /// table supports, or the probe refused to switch to it.
    #[error("{0}")]
    FrequencyError(&'static str),

    /// The probe replied with a non-OK JTAG/SWD status byte to a command
    /// that reports one.
    #[error("probe command failed with status {0:?}")]
    ProbeStatus(Status),

    /// An error surfaced unchanged from the underlying transport.
    #[error(transparent)]
    Transport(#[from] Box<dyn std::error::Error + Send + Sync>),
}
