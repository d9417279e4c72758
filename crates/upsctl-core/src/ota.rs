//! Bootloader entry

use crate::bus::RegisterBus;
use crate::channel::RegisterChannel;
use crate::error::Result;
use crate::regs::{OTA_MAGIC, OTA_REQUEST};
use crate::upload::verify_identity;

/// Ask the device at `addr` to reboot into its bootloader
///
/// The device drops off the bus while it reboots, so the request is written
/// without read-back.
pub fn enable_ota<B: RegisterBus>(channel: &mut RegisterChannel<B>, addr: u8) -> Result<()> {
    verify_identity(channel, addr)?;
    channel.write_word(addr, OTA_REQUEST, OTA_MAGIC)?;
    log::info!("OTA requested, device is rebooting into its bootloader");
    Ok(())
}
