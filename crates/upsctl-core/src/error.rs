//! Error types for upsctl-core
//!
//! This module provides a no_std compatible error type that can be used
//! throughout the crate. Every variant is `Copy` and carries the register,
//! index and expected/actual values an operator needs to decide between
//! retrying with a more patient [`RetryPolicy`](crate::retry::RetryPolicy)
//! and declaring the device unresponsive.

use core::fmt;

/// Which half of an upload step failed to converge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStage {
    /// The payload byte written to the push register was never echoed back
    Push,
    /// The code pointer was never acknowledged with its complement
    CodePointer,
}

/// Core error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    // Transport errors
    /// The bus transaction failed (after all retries when raised by the channel)
    Transport {
        /// 7-bit slave address
        addr: u8,
        /// Register the transaction targeted
        reg: u8,
    },
    /// A byte step of an upload or drain failed at the transport level
    TransferInterrupted {
        /// Offset of the byte being transferred
        index: u16,
        /// 7-bit slave address
        addr: u8,
        /// Register the failed transaction targeted
        reg: u8,
    },
    /// A transaction was requested with a length the bus cannot carry
    InvalidLength {
        /// Requested length in bytes
        len: usize,
        /// Largest length supported in a single transaction
        max: usize,
    },

    // Device errors
    /// The identity register did not hold the expected signature
    DeviceIdentityMismatch {
        /// Signature the protocol requires
        expected: u8,
        /// Value actually read
        actual: u8,
    },

    // Upload errors
    /// Script exceeds the device buffer; rejected before any I/O
    PayloadTooLarge {
        /// Payload length in bytes
        len: usize,
        /// Device buffer capacity in bytes
        max: usize,
    },
    /// A byte could not be transferred; the whole upload must be restarted
    UploadFailed {
        /// Offset of the byte that failed
        index: u16,
        /// Which register of the step did not converge
        stage: UploadStage,
        /// Read-back the device should have produced
        expected: u16,
        /// Last read-back actually observed
        actual: u16,
    },
    /// The device still reported a load in progress after a bulk load
    BulkLoadFailed {
        /// CR1 as read after the load settled
        cr1: u8,
    },
    /// The execute bit in CR1 was never acknowledged
    ExecutionTriggerFailed {
        /// CR1 value the device should have echoed (the value before the write)
        expected: u8,
        /// Last CR1 value actually observed
        actual: u8,
    },

    // Output errors
    /// The output pointer could not be positioned
    OutputPointerFailed {
        /// Offset the drain was trying to select
        index: u16,
        /// Read-back the device should have produced
        expected: u16,
        /// Last read-back actually observed
        actual: u16,
    },
    /// The output buffer could not be cleared after draining
    OutputClearFailed {
        /// Last read-back observed instead of the clear acknowledgement
        actual: u16,
    },

    // Firmware errors
    /// Firmware image has no bytes
    EmptyImage,
    /// A firmware block was not accepted by the bootloader
    FirmwareWriteFailed {
        /// Index of the 1 KiB block
        block: usize,
    },
    /// The bootloader did not report ready after a block
    FirmwareNotReady {
        /// Index of the 1 KiB block just written
        block: usize,
        /// Last control byte observed
        ctrl: u8,
    },
}

impl Error {
    /// Attach the byte offset to a transport failure inside a byte step
    pub(crate) fn at_index(self, index: u16) -> Self {
        match self {
            Self::Transport { addr, reg } => Self::TransferInterrupted { index, addr, reg },
            other => other,
        }
    }
}

impl fmt::Display for UploadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Push => write!(f, "push"),
            Self::CodePointer => write!(f, "code pointer"),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport { addr, reg } => write!(
                f,
                "bus transaction failed (device 0x{:02X}, register 0x{:02X})",
                addr, reg
            ),
            Self::TransferInterrupted { index, addr, reg } => write!(
                f,
                "bus transaction failed at byte {} (device 0x{:02X}, register 0x{:02X})",
                index, addr, reg
            ),
            Self::InvalidLength { len, max } => write!(
                f,
                "transaction length {} exceeds bus limit of {} bytes",
                len, max
            ),
            Self::DeviceIdentityMismatch { expected, actual } => write!(
                f,
                "device verification failed: expected WHO_AM_I 0x{:02X}, got 0x{:02X}",
                expected, actual
            ),
            Self::PayloadTooLarge { len, max } => write!(
                f,
                "payload of {} bytes exceeds device buffer of {} bytes",
                len, max
            ),
            Self::UploadFailed {
                index,
                stage,
                expected,
                actual,
            } => write!(
                f,
                "upload failed at byte {} ({} read-back: expected 0x{:04X}, got 0x{:04X})",
                index, stage, expected, actual
            ),
            Self::BulkLoadFailed { cr1 } => write!(
                f,
                "bulk load not accepted: CR1 still 0x{:02X} with the load flag set",
                cr1
            ),
            Self::ExecutionTriggerFailed { expected, actual } => write!(
                f,
                "execution trigger not acknowledged: expected CR1 echo 0x{:02X}, got 0x{:02X}",
                expected, actual
            ),
            Self::OutputPointerFailed {
                index,
                expected,
                actual,
            } => write!(
                f,
                "failed to set output pointer to {} (expected 0x{:04X}, got 0x{:04X})",
                index, expected, actual
            ),
            Self::OutputClearFailed { actual } => write!(
                f,
                "failed to clear output buffer (expected 0x00AA, got 0x{:04X})",
                actual
            ),
            Self::EmptyImage => write!(f, "firmware image is empty"),
            Self::FirmwareWriteFailed { block } => {
                write!(f, "bootloader rejected firmware block {}", block)
            }
            Self::FirmwareNotReady { block, ctrl } => write!(
                f,
                "bootloader not ready after block {} (control 0x{:02X})",
                block, ctrl
            ),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;
