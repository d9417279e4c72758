//! Script upload and execution trigger
//!
//! The device has no bulk write path that survives a lossy bus, so a script
//! is moved one byte at a time:
//!
//! 1. the byte is written to [`PUSH`] and must read back unchanged
//! 2. its offset is written to [`CODE_PTR`] as `offset | 0x8000`; the device
//!    commits the pushed byte at that offset and acknowledges with
//!    `!(offset | 0x8000) & 0x7FFF`
//!
//! Once every byte is committed, the execute bit in [`CR1`] is set. CR1
//! acknowledges a write by echoing its value from *before* the write.
//!
//! A failed step aborts the upload. Nothing is resumed: the caller restarts
//! from byte zero.
//!
//! Adapters that can issue plain I2C transfers may use
//! [`bulk_load_and_execute`] instead, which sends the whole script in one
//! combined transfer behind a CR1 write with the load flag set.

use core::time::Duration;

use crate::bus::{RegisterBus, Width};
use crate::channel::{RegisterChannel, Verification};
use crate::error::{Error, Result, UploadStage};
use crate::progress::TransferProgress;
use crate::regs::{
    pointer_ack, pointer_value, Cr1, CODE_PTR, CR1, DEVICE_SIGNATURE, MAX_PAYLOAD_LEN, PUSH,
    WHO_AM_I,
};

/// Time the firmware is given to take a bulk-loaded script
pub const LOAD_SETTLE: Duration = Duration::from_secs(1);

/// Summary of a successful upload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadReport {
    /// Number of script bytes committed on the device
    pub bytes: usize,
    /// CR1 before the execute bit was set
    pub cr1_before: Cr1,
    /// CR1 value written to trigger execution
    pub cr1_written: Cr1,
}

/// Check that the device at `addr` is the UPS microcontroller
///
/// Reads the identity register and compares it with [`DEVICE_SIGNATURE`].
pub fn verify_identity<B: RegisterBus>(channel: &mut RegisterChannel<B>, addr: u8) -> Result<()> {
    let who_am_i = channel.read_byte(addr, WHO_AM_I)?;
    if who_am_i != DEVICE_SIGNATURE {
        log::error!(
            "Device verification failed: got 0x{:02X}, expected 0x{:02X}",
            who_am_i,
            DEVICE_SIGNATURE
        );
        return Err(Error::DeviceIdentityMismatch {
            expected: DEVICE_SIGNATURE,
            actual: who_am_i,
        });
    }

    log::debug!("Device 0x{:02X} verified", addr);
    Ok(())
}

/// Upload `payload` to the device and start executing it
///
/// The payload length is checked before any bus traffic. The device
/// identity is checked before anything is written.
///
/// # Errors
///
/// - [`Error::PayloadTooLarge`] if `payload` exceeds [`MAX_PAYLOAD_LEN`]
/// - [`Error::DeviceIdentityMismatch`] if the device does not identify itself
/// - [`Error::UploadFailed`] if a byte or its pointer was never acknowledged
/// - [`Error::TransferInterrupted`] if the bus failed persistently during a
///   byte step
/// - [`Error::ExecutionTriggerFailed`] if CR1 never acknowledged the execute bit
/// - [`Error::Transport`] if the bus failed persistently outside a byte step
pub fn upload_and_execute<B: RegisterBus, P: TransferProgress>(
    channel: &mut RegisterChannel<B>,
    addr: u8,
    payload: &[u8],
    progress: &mut P,
) -> Result<UploadReport> {
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(Error::PayloadTooLarge {
            len: payload.len(),
            max: MAX_PAYLOAD_LEN,
        });
    }

    verify_identity(channel, addr)?;

    log::info!("Uploading {} bytes", payload.len());
    progress.uploading(payload.len());

    for (index, &byte) in payload.iter().enumerate() {
        // Bounded by MAX_PAYLOAD_LEN
        let index = index as u16;
        if let Err(e) = transfer_byte(channel, addr, index, byte) {
            log::error!("Upload aborted at byte {}: {}", index, e);
            return Err(e.at_index(index));
        }
        progress.upload_progress(index as usize + 1);
    }

    log::info!("Upload complete: {} bytes transferred", payload.len());

    let (cr1_before, cr1_written) = trigger_execution(channel, addr)?;
    progress.complete();

    Ok(UploadReport {
        bytes: payload.len(),
        cr1_before,
        cr1_written,
    })
}

/// Upload `payload` in one combined transfer and start executing it
///
/// CR1 is written with [`Cr1::PYTHON_LOAD`] set and the script follows in
/// the same transfer. The firmware clears the flag once it has taken the
/// script; after [`LOAD_SETTLE`] the flag is checked and execution is
/// triggered as for a byte-wise upload.
///
/// # Errors
///
/// - [`Error::PayloadTooLarge`] if `payload` exceeds [`MAX_PAYLOAD_LEN`]
/// - [`Error::DeviceIdentityMismatch`] if the device does not identify itself
/// - [`Error::BulkLoadFailed`] if the load flag was still set after settling
/// - [`Error::ExecutionTriggerFailed`] if CR1 never acknowledged the execute bit
/// - [`Error::Transport`] if the bus failed persistently
pub fn bulk_load_and_execute<B: RegisterBus, P: TransferProgress>(
    channel: &mut RegisterChannel<B>,
    addr: u8,
    payload: &[u8],
    progress: &mut P,
) -> Result<UploadReport> {
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(Error::PayloadTooLarge {
            len: payload.len(),
            max: MAX_PAYLOAD_LEN,
        });
    }

    verify_identity(channel, addr)?;

    let original = Cr1::from_bits_retain(channel.read_byte(addr, CR1)?);
    let load = original | Cr1::PYTHON_LOAD;

    log::info!("Loading {} bytes in one transfer", payload.len());
    progress.uploading(payload.len());

    channel.write_then_stream(addr, CR1, load.bits(), payload)?;
    channel.delay(LOAD_SETTLE);

    let after = channel.read_byte(addr, CR1)?;
    if Cr1::from_bits_retain(after).contains(Cr1::PYTHON_LOAD) {
        log::error!("Load flag still set after loading (CR1 0x{:02X})", after);
        return Err(Error::BulkLoadFailed { cr1: after });
    }
    progress.upload_progress(payload.len());
    log::info!("Bulk load complete: {} bytes", payload.len());

    let (cr1_before, cr1_written) = trigger_execution(channel, addr)?;
    progress.complete();

    Ok(UploadReport {
        bytes: payload.len(),
        cr1_before,
        cr1_written,
    })
}

/// Push one byte and latch it at `index`
fn transfer_byte<B: RegisterBus>(
    channel: &mut RegisterChannel<B>,
    addr: u8,
    index: u16,
    byte: u8,
) -> Result<()> {
    let value = u16::from(byte);
    if let Verification::Mismatch { last } =
        channel.write_verified(addr, PUSH, value, value, Width::Byte)?
    {
        return Err(Error::UploadFailed {
            index,
            stage: UploadStage::Push,
            expected: value,
            actual: last,
        });
    }

    let pointer = pointer_value(index);
    let ack = pointer_ack(pointer);
    if let Verification::Mismatch { last } =
        channel.write_verified(addr, CODE_PTR, pointer, ack, Width::Word)?
    {
        return Err(Error::UploadFailed {
            index,
            stage: UploadStage::CodePointer,
            expected: ack,
            actual: last,
        });
    }

    Ok(())
}

/// Set the execute bit in CR1, preserving the other bits
///
/// Returns the CR1 value before and after the change.
fn trigger_execution<B: RegisterBus>(
    channel: &mut RegisterChannel<B>,
    addr: u8,
) -> Result<(Cr1, Cr1)> {
    let before = channel.read_byte(addr, CR1)?;
    let cr1_before = Cr1::from_bits_retain(before);
    let cr1_written = cr1_before | Cr1::PYTHON_EXEC;

    log::debug!(
        "CR1 0x{:02X} -> 0x{:02X} (execute)",
        cr1_before.bits(),
        cr1_written.bits()
    );

    match channel.write_verified(
        addr,
        CR1,
        u16::from(cr1_written.bits()),
        u16::from(before),
        Width::Byte,
    )? {
        Verification::Matched => {
            log::info!("Execution triggered");
            Ok((cr1_before, cr1_written))
        }
        Verification::Mismatch { last } => Err(Error::ExecutionTriggerFailed {
            expected: before,
            actual: last as u8,
        }),
    }
}
