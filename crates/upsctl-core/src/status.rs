//! Telemetry status block
//!
//! The first [`STATUS_BLOCK_LEN`] registers mirror the firmware's status
//! structure: packed, little-endian.

use alloc::vec::Vec;
use core::ops::Range;

use zerocopy::byteorder::little_endian::{I16, U16, U32, U64};
use zerocopy::{FromBytes, Immutable, KnownLayout, Unaligned};

use crate::bus::RegisterBus;
use crate::channel::RegisterChannel;
use crate::error::Result;
use crate::regs::{Cr1, LedCtl, Sr1, Sr2, STATUS_BLOCK_LEN, WHO_AM_I};

/// Wire layout of the status block
#[derive(FromBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
struct RawStatus {
    who_am_i: u8,
    version: u8,
    uuid: [U32; 3],
    output_voltage: U16,
    input_voltage: U16,
    battery_voltage: U16,
    mcu_voltage: U16,
    output_current: U16,
    input_current: U16,
    battery_current: I16,
    temperature: i8,
    cr1: u8,
    cr2: u8,
    sr1: u8,
    sr2: u8,
    battery_protection_voltage: U16,
    shutdown_countdown: U16,
    auto_start_voltage: U16,
    output_len: U16,
    ota_request: U16,
    runtime: U64,
    charge_detect_interval: U16,
    led_ctl: u8,
}

const _: () = assert!(core::mem::size_of::<RawStatus>() == STATUS_BLOCK_LEN);

/// Decoded device status
///
/// Voltages are in millivolts, currents in milliamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceStatus {
    /// Identity register
    pub who_am_i: u8,
    /// Firmware version
    pub version: u8,
    /// Microcontroller unique ID
    pub uuid: [u32; 3],
    /// 5V output voltage
    pub output_voltage: u16,
    /// Input (USB-C) voltage
    pub input_voltage: u16,
    /// Battery voltage
    pub battery_voltage: u16,
    /// Microcontroller supply voltage
    pub mcu_voltage: u16,
    /// Output current
    pub output_current: u16,
    /// Input current
    pub input_current: u16,
    /// Battery current, negative while discharging
    pub battery_current: i16,
    /// Temperature in degrees Celsius
    pub temperature: i8,
    /// Control register 1
    pub cr1: Cr1,
    /// Control register 2, undocumented bits
    pub cr2: u8,
    /// Status register 1
    pub sr1: Sr1,
    /// Status register 2
    pub sr2: Sr2,
    /// Battery voltage below which the output is cut
    pub battery_protection_voltage: u16,
    /// Seconds until a requested shutdown, 0 if none
    pub shutdown_countdown: u16,
    /// Battery voltage above which the output restarts
    pub auto_start_voltage: u16,
    /// Bytes of captured script output waiting to be drained
    pub output_len: u16,
    /// OTA request word
    pub ota_request: u16,
    /// Milliseconds since the microcontroller booted
    pub runtime: u64,
    /// Seconds between charger presence checks
    pub charge_detect_interval: u16,
    /// Conditions under which the status LED lights
    pub led_ctl: LedCtl,
}

impl DeviceStatus {
    /// Decode a status block
    ///
    /// Returns `None` unless `bytes` is exactly [`STATUS_BLOCK_LEN`] long.
    /// Unknown flag bits are retained.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        let raw = RawStatus::read_from_bytes(bytes).ok()?;

        Some(Self {
            who_am_i: raw.who_am_i,
            version: raw.version,
            uuid: raw.uuid.map(|w| w.get()),
            output_voltage: raw.output_voltage.get(),
            input_voltage: raw.input_voltage.get(),
            battery_voltage: raw.battery_voltage.get(),
            mcu_voltage: raw.mcu_voltage.get(),
            output_current: raw.output_current.get(),
            input_current: raw.input_current.get(),
            battery_current: raw.battery_current.get(),
            temperature: raw.temperature,
            cr1: Cr1::from_bits_retain(raw.cr1),
            cr2: raw.cr2,
            sr1: Sr1::from_bits_retain(raw.sr1),
            sr2: Sr2::from_bits_retain(raw.sr2),
            battery_protection_voltage: raw.battery_protection_voltage.get(),
            shutdown_countdown: raw.shutdown_countdown.get(),
            auto_start_voltage: raw.auto_start_voltage.get(),
            output_len: raw.output_len.get(),
            ota_request: raw.ota_request.get(),
            runtime: raw.runtime.get(),
            charge_detect_interval: raw.charge_detect_interval.get(),
            led_ctl: LedCtl::from_bits_retain(raw.led_ctl),
        })
    }

    /// Whether the battery is currently being charged
    pub fn is_charging(&self) -> bool {
        !self.sr1.contains(Sr1::DISCHARGING)
    }
}

/// A status read, possibly with gaps
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReading {
    /// The decoded status; fields in missing ranges read as zero
    pub status: DeviceStatus,
    /// Byte ranges of the block that could not be read
    pub missing: Vec<Range<usize>>,
}

impl StatusReading {
    /// Whether the whole block was read
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Read and decode the status block of the device at `addr`
///
/// Chunks that fail persistently are zero-filled and reported in
/// [`StatusReading::missing`].
pub fn read_status<B: RegisterBus>(
    channel: &mut RegisterChannel<B>,
    addr: u8,
) -> Result<StatusReading> {
    let block = channel.read_block(addr, WHO_AM_I, STATUS_BLOCK_LEN)?;
    if !block.is_complete() {
        log::warn!("Status block incomplete, missing {:?}", block.missing());
    }

    let missing = block.missing().to_vec();
    let status = DeviceStatus::decode(block.data()).ok_or(crate::Error::InvalidLength {
        len: block.data().len(),
        max: STATUS_BLOCK_LEN,
    })?;

    Ok(StatusReading { status, missing })
}
