//! OTA command implementation

use upsctl_core::bus::RegisterBus;
use upsctl_core::channel::RegisterChannel;
use upsctl_core::ota;

/// Put the device into its bootloader
pub fn run_enable_ota<B: RegisterBus>(
    channel: &mut RegisterChannel<B>,
    addr: u8,
) -> Result<(), Box<dyn std::error::Error>> {
    ota::enable_ota(channel, addr)?;
    println!("OTA mode requested; the device is rebooting into its bootloader");
    Ok(())
}
