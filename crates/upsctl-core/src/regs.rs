//! Register map of the UPS microcontroller
//!
//! Addresses are firmware constants. The first [`STATUS_BLOCK_LEN`] bytes of
//! the map mirror the device status structure (see [`crate::status`]); the
//! script host registers follow it.

use bitflags::bitflags;

/// Default 7-bit slave address of the UPS microcontroller
pub const DEFAULT_ADDRESS: u8 = 0x17;

/// Identity register (WHO_AM_I)
pub const WHO_AM_I: u8 = 0x00;
/// Value the identity register must hold
pub const DEVICE_SIGNATURE: u8 = 0xA6;

/// Control register 1
pub const CR1: u8 = 0x1D;
/// Output length register (word): bytes of captured output ready to drain
pub const OUTPUT_LEN: u8 = 0x27;
/// OTA request register (word)
pub const OTA_REQUEST: u8 = 0x29;
/// Magic written to [`OTA_REQUEST`] to enter the bootloader
pub const OTA_MAGIC: u16 = 0xA5A5;

/// Code pointer register (word)
pub const CODE_PTR: u8 = 54;
/// Output ("puts") pointer register (word)
pub const OUTPUT_PTR: u8 = 56;
/// Push register: one script byte per write
pub const PUSH: u8 = 58;
/// Pop register: one output byte per read
pub const POP: u8 = 59;

/// Output stream register
///
/// While [`Cr1::PYTHON_READ_RETURN`] is set, block reads here return
/// successive bytes of the captured output instead of the status block.
pub const OUTPUT_STREAM: u8 = 0x00;

/// Length of the status block at the start of the register map
pub const STATUS_BLOCK_LEN: usize = 54;

/// Largest script the device buffer accepts
pub const MAX_PAYLOAD_LEN: usize = 4096;

/// Pointer value that clears the output buffer when written to [`OUTPUT_PTR`]
pub const OUTPUT_CLEAR: u16 = 0xFFFF;
/// Acknowledgement of [`OUTPUT_CLEAR`]
pub const OUTPUT_CLEAR_ACK: u16 = 0x00AA;

/// 7-bit slave address the bootloader answers on in OTA mode
pub const BOOTLOADER_ADDRESS: u8 = 0x18;
/// Bootloader control register, written together with each firmware block
pub const BOOT_CTRL: u8 = 0x10;
/// Firmware bytes carried by one bootloader write
pub const FIRMWARE_BLOCK_LEN: usize = 1024;
/// Firmware blocks are padded to a multiple of this many bytes
pub const FIRMWARE_ALIGN: usize = 16;

/// Flag marking a pointer write as a latch request
const POINTER_LATCH: u16 = 0x8000;
/// Bits of a pointer acknowledgement
const POINTER_ACK_MASK: u16 = 0x7FFF;

/// Encode a buffer offset as a pointer register value
///
/// Offsets are 15 bits wide; the high bit requests the latch.
pub const fn pointer_value(offset: u16) -> u16 {
    offset | POINTER_LATCH
}

/// Read-back the device produces once it has latched `pointer`
///
/// The firmware acknowledges with the bitwise complement of the written
/// value, high bit cleared.
pub const fn pointer_ack(pointer: u16) -> u16 {
    !pointer & POINTER_ACK_MASK
}

bitflags! {
    /// Control register 1 bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Cr1: u8 {
        /// Power on automatically when input power returns
        const AUTO_START         = 1 << 0;
        /// Script load in progress (bulk-transfer loader)
        const PYTHON_LOAD        = 1 << 1;
        /// Run the uploaded script
        const PYTHON_EXEC        = 1 << 2;
        /// Expose captured output for bulk reading
        const PYTHON_READ_RETURN = 1 << 3;
    }
}

bitflags! {
    /// Status register 1 bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Sr1: u8 {
        /// 5V output enabled
        const OUTPUT_ON     = 1 << 0;
        /// Charger in slow mode (clear: fast charge)
        const SLOW_CHARGE   = 1 << 1;
        /// Battery discharging (clear: charging)
        const DISCHARGING   = 1 << 2;
        /// Input voltage low
        const INPUT_LOW     = 1 << 3;
        /// Output voltage low
        const OUTPUT_LOW    = 1 << 4;
        /// Battery voltage low
        const BATTERY_LOW   = 1 << 5;
        /// ADC reading out of tolerance
        const ADC_ERROR     = 1 << 6;
        /// Battery fault detected
        const BATTERY_FAULT = 1 << 7;
    }
}

bitflags! {
    /// Status register 2 bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Sr2: u8 {
        /// Last uploaded script did not fit the buffer
        const SCRIPT_TOO_LARGE = 1 << 0;
    }
}

bitflags! {
    /// LED control bits: conditions under which the status LED lights
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct LedCtl: u8 {
        /// Bus traffic
        const I2C_ACTIVITY = 1 << 0;
        /// Battery charging
        const CHARGING     = 1 << 1;
        /// Battery discharging
        const DISCHARGING  = 1 << 2;
        /// Fault present
        const FAULT        = 1 << 3;
        /// Normal operation
        const NORMAL       = 1 << 4;
    }
}

bitflags! {
    /// Bootloader control register bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BootCtrl: u8 {
        /// Host is writing firmware
        const WRITE_ENABLE = 1 << 0;
        /// Block is being programmed
        const BUSY         = 1 << 1;
        /// Ready for the next block
        const READY        = 1 << 2;
        /// Leave the bootloader and start the application
        const BOOT         = 1 << 7;
    }
}

impl BootCtrl {
    /// Whether the bootloader will accept the next block
    pub fn is_ready(self) -> bool {
        self.contains(Self::READY) && !self.contains(Self::BUSY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pointer_ack_boundaries() {
        assert_eq!(pointer_value(0), 0x8000);
        assert_eq!(pointer_ack(pointer_value(0)), 0x7FFF);

        assert_eq!(pointer_value(0x7FFF), 0xFFFF);
        assert_eq!(pointer_ack(pointer_value(0x7FFF)), 0x0000);
    }

    #[test]
    fn test_pointer_ack_is_complement_of_offset() {
        for offset in [0u16, 1, 2, 0x00FF, 0x0FFF, 0x1234, 0x7FFE, 0x7FFF] {
            let ack = pointer_ack(pointer_value(offset));
            assert_eq!(ack & 0x8000, 0);
            assert_eq!(ack ^ offset, 0x7FFF);
        }
    }

    #[test]
    fn test_clear_sentinel_is_not_an_offset_ack() {
        // 0xFFFF would acknowledge as 0x0000 under the pointer law; the
        // firmware answers the clear command with its own marker instead.
        assert_ne!(pointer_ack(OUTPUT_CLEAR), OUTPUT_CLEAR_ACK);
    }

    #[test]
    fn test_register_layout() {
        assert_eq!(CODE_PTR as usize, STATUS_BLOCK_LEN);
        assert_eq!(OUTPUT_PTR, CODE_PTR + 2);
        assert_eq!(PUSH, OUTPUT_PTR + 2);
        assert_eq!(POP, PUSH + 1);
    }

    #[test]
    fn test_boot_ctrl_ready_needs_idle() {
        assert!(BootCtrl::from_bits_retain(0x05).is_ready());
        assert!(!BootCtrl::from_bits_retain(0x06).is_ready());
        assert!(!BootCtrl::from_bits_retain(0x01).is_ready());
    }

    #[test]
    fn test_cr1_exec_bit() {
        let cr1 = Cr1::from_bits_retain(0x01) | Cr1::PYTHON_EXEC;
        assert_eq!(cr1.bits(), 0x05);
    }
}
