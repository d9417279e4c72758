//! upsctl-core - Register transfer protocol for the UPS HAT microcontroller
//!
//! The UPS microcontroller exposes a register map over SMBus. Besides
//! telemetry, it hosts a small script interpreter: a script is pushed in one
//! byte at a time through a push register and a code pointer register, run
//! by setting a bit in CR1, and its captured output is drained back through
//! an output pointer register and a pop register. Scripts can also be
//! loaded in one combined I2C transfer and output read back as a stream.
//! Once OTA mode is requested, [`flash`] writes a new application image
//! through the bootloader.
//!
//! This crate implements that protocol on top of any [`bus::RegisterBus`].
//! It is `no_std` (with `alloc`) so it can be driven from a bridge MCU as
//! well as from Linux.
//!
//! # Features
//!
//! - `std` - Implement `std::error::Error` for [`Error`]
//!
//! # Example
//!
//! ```ignore
//! use upsctl_core::{channel::RegisterChannel, drain, progress::NoProgress,
//!                   regs::DEFAULT_ADDRESS, retry::RetryPolicy, upload};
//!
//! fn run<B: upsctl_core::bus::RegisterBus>(bus: B, script: &[u8]) -> upsctl_core::Result<()> {
//!     let mut channel = RegisterChannel::new(bus, RetryPolicy::default());
//!     upload::upload_and_execute(&mut channel, DEFAULT_ADDRESS, script, &mut NoProgress)?;
//!     let output = drain::read_output(&mut channel, DEFAULT_ADDRESS, &mut NoProgress)?;
//!     println!("{}", output.text());
//!     Ok(())
//! }
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod bus;
pub mod channel;
pub mod drain;
pub mod error;
pub mod flash;
pub mod ota;
pub mod progress;
pub mod regs;
pub mod retry;
pub mod status;
pub mod upload;

#[cfg(test)]
mod mock;

pub use error::{Error, Result};
