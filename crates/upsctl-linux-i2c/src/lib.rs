//! upsctl-linux-i2c - Linux i2c-dev transport
//!
//! This crate talks to the UPS microcontroller through the kernel's
//! `/dev/i2c-N` character devices. Register access uses the SMBus ioctl;
//! the bulk script loader and the bootloader need an adapter that also
//! supports plain I2C transfers.
//!
//! # Example
//!
//! ```no_run
//! use upsctl_linux_i2c::{LinuxI2c, LinuxI2cConfig};
//! use upsctl_core::bus::RegisterBus;
//!
//! let mut i2c = LinuxI2c::open(&LinuxI2cConfig::for_bus(1))?;
//! let who_am_i = i2c.read_byte(0x17, 0x00)?;
//! println!("WHO_AM_I: 0x{:02X}", who_am_i);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Usage with upsctl CLI
//!
//! ```bash
//! # Header bus of a Raspberry Pi
//! upsctl --bus linux_i2c:dev=/dev/i2c-1 status
//!
//! # Adapter by number
//! upsctl --bus linux_i2c:bus=3 read-output
//! ```
//!
//! # System Requirements
//!
//! - Linux kernel with i2c-dev loaded (`CONFIG_I2C_CHARDEV`)
//! - Read/write access to `/dev/i2c-N` (usually the `i2c` group)

pub mod device;
pub mod error;

// Re-exports
pub use device::{parse_options, LinuxI2c, LinuxI2cConfig, DEFAULT_DEVICE};
pub use error::{LinuxI2cError, Result};

/// Open a Linux I2C adapter and return a boxed RegisterBus
///
/// This is a convenience function for use in the CLI bus dispatch.
///
/// # Example Options
///
/// - `dev=/dev/i2c-1` - device path (default)
/// - `bus=3` - shorthand for `dev=/dev/i2c-3`
pub fn open_linux_i2c(
    options: &[(&str, &str)],
) -> std::result::Result<Box<dyn upsctl_core::bus::RegisterBus>, Box<dyn std::error::Error>> {
    let config = parse_options(options)?;
    let i2c = LinuxI2c::open(&config)?;
    Ok(Box::new(i2c))
}
