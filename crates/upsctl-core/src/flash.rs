//! Firmware flashing through the bootloader
//!
//! After [`enable_ota`](crate::ota::enable_ota) the microcontroller reboots
//! into a bootloader answering on [`BOOTLOADER_ADDRESS`](crate::regs::BOOTLOADER_ADDRESS).
//! The application image (encrypted, opaque to the host) is sent in blocks
//! of [`FIRMWARE_BLOCK_LEN`] bytes. Each block is zero-padded to a multiple
//! of [`FIRMWARE_ALIGN`] and written together with the control byte in one
//! plain I2C write to [`BOOT_CTRL`]. After each block the host polls the
//! control byte until the bootloader reports ready. Writing
//! [`BootCtrl::BOOT`] starts the new application.
//!
//! Block writes are not retried: a block the bootloader took without
//! acknowledging it would be programmed twice.

use alloc::vec::Vec;
use core::time::Duration;

use crate::bus::RegisterBus;
use crate::channel::RegisterChannel;
use crate::error::{Error, Result};
use crate::progress::TransferProgress;
use crate::regs::{BootCtrl, BOOT_CTRL, FIRMWARE_ALIGN, FIRMWARE_BLOCK_LEN};
use crate::upload::verify_identity;

/// Control byte polls after each block before giving up
pub const READY_POLLS: u32 = 5;
/// Delay before each control byte poll
pub const READY_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Summary of a successful flash
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashReport {
    /// Image length in bytes
    pub image_len: usize,
    /// Firmware bytes sent, padding included
    pub bytes_sent: usize,
    /// Number of blocks written
    pub blocks: usize,
}

/// `len` rounded up to a multiple of [`FIRMWARE_ALIGN`]
pub const fn padded_len(len: usize) -> usize {
    len.div_ceil(FIRMWARE_ALIGN) * FIRMWARE_ALIGN
}

/// Write `image` through the bootloader at `addr` and boot it
///
/// # Errors
///
/// - [`Error::EmptyImage`] if `image` is empty; nothing is sent
/// - [`Error::DeviceIdentityMismatch`] if the bootloader does not identify itself
/// - [`Error::FirmwareWriteFailed`] if a block write was not acknowledged
/// - [`Error::FirmwareNotReady`] if the bootloader stayed busy after a block
/// - [`Error::Transport`] if polling or the boot command failed persistently
pub fn flash_firmware<B: RegisterBus, P: TransferProgress>(
    channel: &mut RegisterChannel<B>,
    addr: u8,
    image: &[u8],
    progress: &mut P,
) -> Result<FlashReport> {
    if image.is_empty() {
        return Err(Error::EmptyImage);
    }

    verify_identity(channel, addr)?;

    let ctrl = BootCtrl::from_bits_retain(channel.read_byte(addr, BOOT_CTRL)?)
        | BootCtrl::WRITE_ENABLE;
    log::debug!("Bootloader control: 0x{:02X}", ctrl.bits());

    let total: usize = image
        .chunks(FIRMWARE_BLOCK_LEN)
        .map(|chunk| padded_len(chunk.len()))
        .sum();
    let blocks = image.len().div_ceil(FIRMWARE_BLOCK_LEN);
    log::info!("Flashing {} bytes in {} blocks", image.len(), blocks);
    progress.uploading(total);

    let mut frame = Vec::with_capacity(FIRMWARE_BLOCK_LEN + 1);
    let mut sent = 0;

    for (block, chunk) in image.chunks(FIRMWARE_BLOCK_LEN).enumerate() {
        frame.clear();
        frame.push(ctrl.bits());
        frame.extend_from_slice(chunk);
        frame.resize(1 + padded_len(chunk.len()), 0);

        if let Err(e) = channel.bus_mut().write_block(addr, BOOT_CTRL, &frame) {
            log::error!("Block {} not accepted: {}", block, e);
            return Err(Error::FirmwareWriteFailed { block });
        }
        sent += frame.len() - 1;

        wait_ready(channel, addr, block)?;
        progress.upload_progress(sent);
    }

    log::info!("Sending boot command");
    channel.write_byte(addr, BOOT_CTRL, BootCtrl::BOOT.bits())?;
    progress.complete();

    Ok(FlashReport {
        image_len: image.len(),
        bytes_sent: sent,
        blocks,
    })
}

fn wait_ready<B: RegisterBus>(
    channel: &mut RegisterChannel<B>,
    addr: u8,
    block: usize,
) -> Result<()> {
    let mut ctrl = 0;
    for poll in 1..=READY_POLLS {
        channel.delay(READY_POLL_INTERVAL);
        ctrl = channel.read_byte(addr, BOOT_CTRL)?;
        if BootCtrl::from_bits_retain(ctrl).is_ready() {
            log::debug!("Block {} programmed after {} polls", block, poll);
            return Ok(());
        }
    }

    log::error!(
        "Bootloader not ready after block {} (control 0x{:02X})",
        block,
        ctrl
    );
    Err(Error::FirmwareNotReady { block, ctrl })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockBus, Op};
    use crate::progress::NoProgress;
    use crate::regs::{BOOTLOADER_ADDRESS, DEVICE_SIGNATURE, WHO_AM_I};
    use crate::retry::RetryPolicy;
    use alloc::vec;

    fn bootloader(ctrl: u8) -> RegisterChannel<MockBus> {
        let mut bus = MockBus::new();
        bus.set(WHO_AM_I, DEVICE_SIGNATURE as u16);
        bus.set(BOOT_CTRL, ctrl as u16);
        RegisterChannel::new(bus, RetryPolicy::new(3, 1))
    }

    #[test]
    fn test_padded_len() {
        assert_eq!(padded_len(1), 16);
        assert_eq!(padded_len(16), 16);
        assert_eq!(padded_len(17), 32);
        assert_eq!(padded_len(FIRMWARE_BLOCK_LEN), FIRMWARE_BLOCK_LEN);
    }

    #[test]
    fn test_blocks_padded_then_boot() {
        let mut ch = bootloader(0x04);
        let image: Vec<u8> = (0..1030u32).map(|i| i as u8).collect();

        let report = flash_firmware(&mut ch, BOOTLOADER_ADDRESS, &image, &mut NoProgress).unwrap();
        assert_eq!(
            report,
            FlashReport {
                image_len: 1030,
                bytes_sent: 1040,
                blocks: 2
            }
        );

        let bus = ch.bus();
        let writes: Vec<_> = bus
            .ops
            .iter()
            .filter(|op| matches!(op, Op::WriteBlock { .. } | Op::WriteByte { .. }))
            .copied()
            .collect();
        assert_eq!(
            writes,
            vec![
                Op::WriteBlock {
                    reg: BOOT_CTRL,
                    len: 1025
                },
                Op::WriteBlock {
                    reg: BOOT_CTRL,
                    len: 17
                },
                Op::WriteByte {
                    reg: BOOT_CTRL,
                    value: 0x80
                },
            ]
        );

        // Control byte with write enable, then data, then zero padding
        let last = &bus.blocks[1];
        assert_eq!(last[0], 0x05);
        assert_eq!(&last[1..7], &image[1024..]);
        assert!(last[7..].iter().all(|&b| b == 0));
        assert_eq!(bus.slept, READY_POLL_INTERVAL * 2);
    }

    #[test]
    fn test_busy_bootloader_times_out() {
        let mut ch = bootloader(0x06);

        assert_eq!(
            flash_firmware(&mut ch, BOOTLOADER_ADDRESS, &[0xAA; 32], &mut NoProgress),
            Err(Error::FirmwareNotReady {
                block: 0,
                ctrl: 0x06
            })
        );

        let bus = ch.bus();
        // Initial control read plus one per poll
        assert_eq!(
            bus.count(|op| matches!(op, Op::ReadByte { reg: BOOT_CTRL })) as u32,
            1 + READY_POLLS
        );
        assert_eq!(bus.slept, READY_POLL_INTERVAL * READY_POLLS);
        assert!(!bus.ops.iter().any(|op| matches!(op, Op::WriteByte { .. })));
    }

    #[test]
    fn test_block_write_is_not_retried() {
        let mut ch = bootloader(0x04);
        ch.bus_mut().fail_next_writes(1);

        assert_eq!(
            flash_firmware(&mut ch, BOOTLOADER_ADDRESS, &[0x11; 64], &mut NoProgress),
            Err(Error::FirmwareWriteFailed { block: 0 })
        );
        assert_eq!(ch.bus().count(|op| matches!(op, Op::WriteBlock { .. })), 1);
    }

    #[test]
    fn test_empty_image_sends_nothing() {
        let mut ch = bootloader(0x04);

        assert_eq!(
            flash_firmware(&mut ch, BOOTLOADER_ADDRESS, &[], &mut NoProgress),
            Err(Error::EmptyImage)
        );
        assert!(ch.bus().ops.is_empty());
    }
}
