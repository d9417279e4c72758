//! Flash-firmware command implementation

use std::fs;
use std::path::Path;
use std::time::Duration;

use upsctl_core::bus::RegisterBus;
use upsctl_core::channel::RegisterChannel;
use upsctl_core::{flash, ota};

use super::progress::IndicatifProgress;

/// Time the device needs to come back up as the bootloader
const REBOOT_WAIT: Duration = Duration::from_secs(1);

/// Read a firmware image, rejecting an empty file
pub fn load_image(path: &Path) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let image = fs::read(path).map_err(|e| format!("Failed to read {:?}: {}", path, e))?;

    if image.is_empty() {
        return Err(format!("{:?} is empty", path).into());
    }

    log::info!("Read {} byte firmware image from {:?}", image.len(), path);
    Ok(image)
}

/// Flash `image` through the bootloader at `boot_addr`
///
/// With `enable_ota` the application at `addr` is first asked to reboot
/// into its bootloader.
pub fn run_flash_firmware<B: RegisterBus>(
    channel: &mut RegisterChannel<B>,
    addr: u8,
    boot_addr: u8,
    image: &[u8],
    enable_ota: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if enable_ota {
        ota::enable_ota(channel, addr)?;
        log::info!("Waiting {} ms for the bootloader", REBOOT_WAIT.as_millis());
        channel.delay(REBOOT_WAIT);
    }

    let mut progress = IndicatifProgress::flashing();
    let report = flash::flash_firmware(channel, boot_addr, image, &mut progress)?;

    println!(
        "Flashed {} bytes in {} blocks ({} bytes padded), new firmware is booting",
        report.image_len, report.blocks, report.bytes_sent
    );
    Ok(())
}
