//! Bus transport abstraction
//!
//! This module defines the transactions a transport must offer so the
//! channel can drive the device's register map: SMBus byte and word
//! register access and short block reads, plus the two plain I2C writes the
//! bulk loaders need.

mod traits;

pub use traits::*;
