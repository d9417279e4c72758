//! upsctl-dummy - In-memory UPS microcontroller emulator for testing
//!
//! This crate provides a [`RegisterBus`] that behaves like the UPS firmware:
//! a status block at the start of the register map, the byte-wise script
//! loader, a minimal script runner and the output buffer. It's useful for
//! testing and development without real hardware.
//!
//! Writes are acknowledged the way the firmware acknowledges them:
//!
//! - the push register and plain registers echo the written value
//! - pointer registers answer `!(pointer) & 0x7FFF`
//! - the output pointer answers a clear (`0xFFFF`) with `0x00AA`
//! - CR1 echoes its value from before the write; repeating the same CR1
//!   write keeps the first acknowledgement
//!
//! A script runs when the execute bit in CR1 goes from clear to set. The
//! bit stays set until the host addresses another register, so a re-sent
//! trigger does not run the script twice. The runner only understands
//! `print(...)` lines: each appends its argument and a newline to the output
//! buffer.
//!
//! The bulk paths are emulated too: a combined transfer to CR1 with the
//! load flag replaces the script, and while the read-return flag is set
//! block reads of register 0 stream the output buffer.
//!
//! Writing the OTA magic moves the device to its bootloader address, where
//! it takes firmware blocks until it is told to boot.

#![no_std]

extern crate alloc;

use alloc::format;
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;
use core::time::Duration;

use upsctl_core::bus::{RegisterBus, Width, MAX_BLOCK_LEN};
use upsctl_core::error::{Error, Result};
use upsctl_core::regs::{
    pointer_ack, BootCtrl, Cr1, Sr2, BOOTLOADER_ADDRESS, BOOT_CTRL, CODE_PTR, CR1,
    DEFAULT_ADDRESS, DEVICE_SIGNATURE, FIRMWARE_ALIGN, FIRMWARE_BLOCK_LEN, MAX_PAYLOAD_LEN,
    OTA_MAGIC, OTA_REQUEST, OUTPUT_CLEAR, OUTPUT_CLEAR_ACK, OUTPUT_LEN, OUTPUT_PTR, OUTPUT_STREAM,
    POP, PUSH, STATUS_BLOCK_LEN, WHO_AM_I,
};

/// Capacity of the emulated output buffer
pub const OUTPUT_CAPACITY: usize = 4096;

// Status block field offsets
const VERSION: usize = 1;
const UUID: usize = 2;
const OUTPUT_VOLTAGE: usize = 14;
const INPUT_VOLTAGE: usize = 16;
const BATTERY_VOLTAGE: usize = 18;
const MCU_VOLTAGE: usize = 20;
const OUTPUT_CURRENT: usize = 22;
const INPUT_CURRENT: usize = 24;
const BATTERY_CURRENT: usize = 26;
const TEMPERATURE: usize = 28;
const SR1: usize = 31;
const SR2: usize = 32;
const BATTERY_PROTECTION_VOLTAGE: usize = 33;
const AUTO_START_VOLTAGE: usize = 37;
const RUNTIME: usize = 43;
const CHARGE_DETECT_INTERVAL: usize = 51;
const LED_CTL: usize = 53;

/// Configuration for the emulated device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DummyConfig {
    /// Slave address the device answers on
    pub address: u8,
    /// Identity register value
    pub who_am_i: u8,
    /// Firmware version
    pub version: u8,
    /// Microcontroller unique ID
    pub uuid: [u32; 3],
    /// Output voltage in mV
    pub output_voltage: u16,
    /// Input voltage in mV
    pub input_voltage: u16,
    /// Battery voltage in mV
    pub battery_voltage: u16,
    /// MCU supply voltage in mV
    pub mcu_voltage: u16,
    /// Output current in mA
    pub output_current: u16,
    /// Input current in mA
    pub input_current: u16,
    /// Battery current in mA, negative while discharging
    pub battery_current: i16,
    /// Temperature in degrees Celsius
    pub temperature: i8,
    /// Status register 1
    pub sr1: u8,
    /// Uptime in ms
    pub runtime: u64,
    /// Reads of a register that still return the old value after a write
    pub ack_latency: u32,
    /// Fail every Nth transaction (0 disables fault injection)
    pub fail_every: u32,
    /// Slave address of the bootloader
    pub bootloader_address: u8,
    /// Start in the bootloader instead of the application
    pub in_bootloader: bool,
    /// Control reads that report busy after each firmware block
    pub flash_busy_polls: u32,
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS,
            who_am_i: DEVICE_SIGNATURE,
            version: 3,
            uuid: [0x0034_0021, 0x3431_5107, 0x2036_3950],
            output_voltage: 5120,
            input_voltage: 5050,
            battery_voltage: 4012,
            mcu_voltage: 3300,
            output_current: 820,
            input_current: 1450,
            battery_current: 610,
            temperature: 31,
            sr1: 0x01, // output on, charging
            runtime: 3_600_000,
            ack_latency: 0,
            fail_every: 0,
            bootloader_address: BOOTLOADER_ADDRESS,
            in_bootloader: false,
            flash_busy_polls: 1,
        }
    }
}

/// A transaction seen by the emulator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transaction {
    /// Register read and the value returned
    Read { reg: u8, width: Width, value: u16 },
    /// Register write
    Write { reg: u8, width: Width, value: u16 },
    /// Block read
    ReadBlock { reg: u8, len: usize },
    /// Plain I2C write of `len` bytes after the register
    WriteBlock { reg: u8, len: usize },
    /// Register byte followed by `len` payload bytes in one transfer
    Stream { reg: u8, value: u8, len: usize },
    /// Transaction that was not acknowledged
    Failed { reg: u8 },
}

/// Acknowledgement of the last write
struct Latch {
    reg: u8,
    value: u16,
    stale: u16,
    hidden_reads: u32,
}

/// Which firmware answered a transaction
#[derive(Clone, Copy, PartialEq, Eq)]
enum Target {
    App,
    Bootloader,
}

/// Emulated UPS microcontroller
pub struct DummyUps {
    config: DummyConfig,
    status: [u8; STATUS_BLOCK_LEN],
    code: Vec<u8>,
    code_len: usize,
    pushed: u8,
    output: Vec<u8>,
    output_cursor: usize,
    stream_cursor: usize,
    latch: Option<Latch>,
    executions: usize,
    ota_requested: bool,
    in_bootloader: bool,
    boot_ctrl: BootCtrl,
    busy_polls: u32,
    firmware: Vec<u8>,
    booted: bool,
    transactions: u32,
    log: Vec<Transaction>,
    elapsed: Duration,
}

impl DummyUps {
    /// Create a new emulated device with the given configuration
    pub fn new(config: DummyConfig) -> Self {
        let mut ups = Self {
            status: [0; STATUS_BLOCK_LEN],
            code: vec![0; MAX_PAYLOAD_LEN],
            code_len: 0,
            pushed: 0,
            output: Vec::new(),
            output_cursor: 0,
            stream_cursor: 0,
            latch: None,
            executions: 0,
            ota_requested: false,
            in_bootloader: config.in_bootloader,
            boot_ctrl: BootCtrl::empty(),
            busy_polls: 0,
            firmware: Vec::new(),
            booted: false,
            transactions: 0,
            log: Vec::new(),
            elapsed: Duration::ZERO,
            config,
        };
        ups.load_status();
        ups
    }

    /// Create a new emulated device with default configuration
    pub fn new_default() -> Self {
        Self::new(DummyConfig::default())
    }

    /// Create a device whose output buffer already holds `output`
    pub fn with_output(config: DummyConfig, output: &[u8]) -> Self {
        let mut ups = Self::new(config);
        ups.emit(output);
        ups
    }

    /// Get the configuration
    pub fn config(&self) -> &DummyConfig {
        &self.config
    }

    /// The raw status block
    pub fn status_block(&self) -> &[u8; STATUS_BLOCK_LEN] {
        &self.status
    }

    /// The script currently committed in the code buffer
    pub fn script(&self) -> &[u8] {
        &self.code[..self.code_len]
    }

    /// Bytes waiting in the output buffer
    pub fn output(&self) -> &[u8] {
        &self.output
    }

    /// How many times a script was run
    pub fn executions(&self) -> usize {
        self.executions
    }

    /// Whether the OTA magic was written
    pub fn ota_requested(&self) -> bool {
        self.ota_requested
    }

    /// Whether the bootloader is answering instead of the application
    pub fn in_bootloader(&self) -> bool {
        self.in_bootloader
    }

    /// Firmware received by the bootloader, padding included
    pub fn firmware(&self) -> &[u8] {
        &self.firmware
    }

    /// Whether the bootloader was told to start the new application
    pub fn booted(&self) -> bool {
        self.booted
    }

    /// Every transaction issued so far
    pub fn log(&self) -> &[Transaction] {
        &self.log
    }

    /// Writes issued so far, in order, as `(register, value)`
    pub fn writes(&self) -> Vec<(u8, u16)> {
        self.log
            .iter()
            .filter_map(|t| match *t {
                Transaction::Write { reg, value, .. } => Some((reg, value)),
                _ => None,
            })
            .collect()
    }

    /// Time the host spent in [`RegisterBus::delay`]
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    fn load_status(&mut self) {
        let c = self.config.clone();
        self.status[0] = c.who_am_i;
        self.status[VERSION] = c.version;
        for (i, word) in c.uuid.iter().enumerate() {
            self.put(UUID + i * 4, &word.to_le_bytes());
        }
        self.put(OUTPUT_VOLTAGE, &c.output_voltage.to_le_bytes());
        self.put(INPUT_VOLTAGE, &c.input_voltage.to_le_bytes());
        self.put(BATTERY_VOLTAGE, &c.battery_voltage.to_le_bytes());
        self.put(MCU_VOLTAGE, &c.mcu_voltage.to_le_bytes());
        self.put(OUTPUT_CURRENT, &c.output_current.to_le_bytes());
        self.put(INPUT_CURRENT, &c.input_current.to_le_bytes());
        self.put(BATTERY_CURRENT, &c.battery_current.to_le_bytes());
        self.status[TEMPERATURE] = c.temperature as u8;
        self.status[CR1 as usize] = Cr1::AUTO_START.bits();
        self.status[SR1] = c.sr1;
        self.put(BATTERY_PROTECTION_VOLTAGE, &3300u16.to_le_bytes());
        self.put(AUTO_START_VOLTAGE, &3600u16.to_le_bytes());
        self.put(RUNTIME, &c.runtime.to_le_bytes());
        self.put(CHARGE_DETECT_INTERVAL, &60u16.to_le_bytes());
        self.status[LED_CTL] = 0x1F;
    }

    fn put(&mut self, offset: usize, bytes: &[u8]) {
        self.status[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    fn sync_output_len(&mut self) {
        let len = self.output.len() as u16;
        self.put(OUTPUT_LEN as usize, &len.to_le_bytes());
    }

    fn emit(&mut self, bytes: &[u8]) {
        let room = OUTPUT_CAPACITY - self.output.len();
        self.output
            .extend_from_slice(&bytes[..bytes.len().min(room)]);
        self.sync_output_len();
    }

    /// Run the committed script
    fn execute(&mut self) {
        self.executions += 1;
        let script = String::from_utf8_lossy(&self.code[..self.code_len]).into_owned();
        log::debug!("dummy: Running {} byte script", self.code_len);

        for line in script.lines() {
            let Some(arg) = line
                .trim()
                .strip_prefix("print(")
                .and_then(|rest| rest.strip_suffix(')'))
            else {
                continue;
            };
            let arg = arg.trim();
            let text = arg
                .strip_prefix('"')
                .and_then(|a| a.strip_suffix('"'))
                .or_else(|| arg.strip_prefix('\'').and_then(|a| a.strip_suffix('\'')))
                .unwrap_or(arg);
            self.emit(text.as_bytes());
            self.emit(b"\n");
        }
    }

    /// The script is done once the host moves on to another register
    fn finish_execution(&mut self) {
        self.status[CR1 as usize] &= !Cr1::PYTHON_EXEC.bits();
    }

    fn cr1(&self) -> Cr1 {
        Cr1::from_bits_retain(self.status[CR1 as usize])
    }

    /// Replace the script with a bulk-loaded one
    fn load_script(&mut self, script: &[u8]) {
        if script.len() > self.code.len() {
            self.status[SR2] |= Sr2::SCRIPT_TOO_LARGE.bits();
            log::warn!("dummy: {} byte script does not fit", script.len());
            return;
        }
        self.code[..script.len()].copy_from_slice(script);
        self.code_len = script.len();
        self.status[SR2] &= !Sr2::SCRIPT_TOO_LARGE.bits();
        log::debug!("dummy: Loaded {} byte script", script.len());
    }

    /// Register contents as seen by a plain read, without side effects
    fn peek(&self, reg: u8, width: Width) -> u16 {
        let byte = |r: usize| -> u8 {
            if r < STATUS_BLOCK_LEN {
                self.status[r]
            } else if r == POP as usize {
                self.output.get(self.output_cursor).copied().unwrap_or(0)
            } else {
                0
            }
        };

        let reg = reg as usize;
        match width {
            Width::Byte => u16::from(byte(reg)),
            Width::Word => u16::from_le_bytes([byte(reg), byte(reg + 1)]),
        }
    }

    fn read(&mut self, reg: u8, width: Width) -> u16 {
        let value = match &mut self.latch {
            Some(latch) if latch.reg == reg => {
                if latch.hidden_reads > 0 {
                    latch.hidden_reads -= 1;
                    latch.stale
                } else {
                    latch.value
                }
            }
            _ => self.peek(reg, width),
        };
        value & width.mask()
    }

    fn write(&mut self, reg: u8, width: Width, value: u16) {
        let stale = self.read_quiet(reg, width);

        let ack = match reg {
            PUSH => {
                self.pushed = value as u8;
                value
            }
            CODE_PTR => self.commit_code(value),
            OUTPUT_PTR if value == OUTPUT_CLEAR => {
                self.output.clear();
                self.output_cursor = 0;
                self.sync_output_len();
                log::debug!("dummy: Output buffer cleared");
                OUTPUT_CLEAR_ACK
            }
            OUTPUT_PTR if value & 0x8000 != 0 => {
                self.output_cursor = usize::from(value & 0x7FFF);
                pointer_ack(value)
            }
            CR1 => {
                let previous = self.status[CR1 as usize];
                let value = value as u8;
                if value == previous && matches!(&self.latch, Some(latch) if latch.reg == CR1) {
                    // Repeated write, keep the first acknowledgement
                    return;
                }

                self.status[CR1 as usize] = value;
                let set = Cr1::from_bits_retain(value & !previous);
                if set.contains(Cr1::PYTHON_EXEC) {
                    self.execute();
                }
                if !self.cr1().contains(Cr1::PYTHON_READ_RETURN) {
                    self.stream_cursor = 0;
                }
                u16::from(previous)
            }
            OTA_REQUEST if width == Width::Word => {
                self.put(OTA_REQUEST as usize, &value.to_le_bytes());
                if value == OTA_MAGIC {
                    log::info!("dummy: OTA requested, entering bootloader");
                    self.ota_requested = true;
                    self.enter_bootloader();
                }
                value
            }
            r if (r as usize) < STATUS_BLOCK_LEN && r != 0 => {
                match width {
                    Width::Byte => self.status[r as usize] = value as u8,
                    Width::Word => {
                        let end = (r as usize + 2).min(STATUS_BLOCK_LEN);
                        let bytes = value.to_le_bytes();
                        let n = end - r as usize;
                        self.put(r as usize, &bytes[..n]);
                    }
                }
                value
            }
            _ => value,
        };

        self.latch = Some(Latch {
            reg,
            value: ack & width.mask(),
            stale,
            hidden_reads: self.config.ack_latency,
        });
    }

    /// Read-back a host would currently observe, without consuming latency
    fn read_quiet(&self, reg: u8, width: Width) -> u16 {
        match &self.latch {
            Some(latch) if latch.reg == reg => {
                if latch.hidden_reads > 0 {
                    latch.stale
                } else {
                    latch.value
                }
            }
            _ => self.peek(reg, width),
        }
    }

    /// Latch the pushed byte at the offset in `pointer`
    fn commit_code(&mut self, pointer: u16) -> u16 {
        if pointer & 0x8000 == 0 {
            return pointer;
        }

        let offset = usize::from(pointer & 0x7FFF);
        if offset >= self.code.len() {
            self.status[SR2] |= Sr2::SCRIPT_TOO_LARGE.bits();
            log::warn!("dummy: Code offset {} beyond buffer", offset);
            return pointer;
        }

        if offset == 0 {
            // A new upload starts from the first byte
            self.code_len = 0;
            self.status[SR2] &= !Sr2::SCRIPT_TOO_LARGE.bits();
        }
        self.code[offset] = self.pushed;
        self.code_len = self.code_len.max(offset + 1);
        pointer_ack(pointer)
    }

    fn enter_bootloader(&mut self) {
        self.in_bootloader = true;
        self.boot_ctrl = BootCtrl::empty();
        self.busy_polls = 0;
        self.firmware.clear();
        self.booted = false;
        self.latch = None;
    }

    fn boot_read(&mut self, reg: u8) -> u8 {
        match reg {
            WHO_AM_I => self.config.who_am_i,
            BOOT_CTRL => {
                let state = if self.busy_polls > 0 {
                    self.busy_polls -= 1;
                    BootCtrl::BUSY
                } else {
                    BootCtrl::READY
                };
                (self.boot_ctrl | state).bits()
            }
            _ => 0,
        }
    }

    fn boot_write(&mut self, reg: u8, value: u8) {
        if reg != BOOT_CTRL {
            return;
        }
        let ctrl = BootCtrl::from_bits_retain(value);
        if ctrl.contains(BootCtrl::BOOT) {
            log::info!("dummy: Booting {} byte image", self.firmware.len());
            self.booted = true;
            self.in_bootloader = false;
            return;
        }
        self.boot_ctrl = ctrl & BootCtrl::WRITE_ENABLE;
    }

    /// Take one firmware block; `false` if the bootloader refuses it
    fn boot_write_block(&mut self, reg: u8, data: &[u8]) -> bool {
        let Some((&ctrl, block)) = data.split_first() else {
            return false;
        };
        let enabled = BootCtrl::from_bits_retain(ctrl).contains(BootCtrl::WRITE_ENABLE);
        let aligned = !block.is_empty()
            && block.len() <= FIRMWARE_BLOCK_LEN
            && block.len() % FIRMWARE_ALIGN == 0;
        if reg != BOOT_CTRL || !enabled || !aligned {
            log::warn!(
                "dummy: Refusing {} byte block (control 0x{:02X})",
                block.len(),
                ctrl
            );
            return false;
        }

        self.firmware.extend_from_slice(block);
        self.busy_polls = self.config.flash_busy_polls;
        true
    }

    fn refuse(&mut self, addr: u8, reg: u8) -> Error {
        self.log.push(Transaction::Failed { reg });
        Error::Transport { addr, reg }
    }

    /// Account for one transaction; returns an error if it is not acknowledged
    fn transact(&mut self, addr: u8, reg: u8) -> Result<Target> {
        self.transactions += 1;
        let injected =
            self.config.fail_every != 0 && self.transactions % self.config.fail_every == 0;

        let target = if self.in_bootloader {
            (addr == self.config.bootloader_address).then_some(Target::Bootloader)
        } else {
            (addr == self.config.address).then_some(Target::App)
        };

        match target {
            Some(target) if !injected => {
                if target == Target::App && reg != CR1 {
                    self.finish_execution();
                }
                Ok(target)
            }
            _ => Err(self.refuse(addr, reg)),
        }
    }
}

impl RegisterBus for DummyUps {
    fn read_byte(&mut self, addr: u8, reg: u8) -> Result<u8> {
        let value = match self.transact(addr, reg)? {
            Target::App => self.read(reg, Width::Byte),
            Target::Bootloader => u16::from(self.boot_read(reg)),
        };
        self.log.push(Transaction::Read {
            reg,
            width: Width::Byte,
            value,
        });
        Ok(value as u8)
    }

    fn read_word(&mut self, addr: u8, reg: u8) -> Result<u16> {
        let value = match self.transact(addr, reg)? {
            Target::App => self.read(reg, Width::Word),
            Target::Bootloader => u16::from(self.boot_read(reg)),
        };
        self.log.push(Transaction::Read {
            reg,
            width: Width::Word,
            value,
        });
        Ok(value)
    }

    fn write_byte(&mut self, addr: u8, reg: u8, value: u8) -> Result<()> {
        let target = self.transact(addr, reg)?;
        self.log.push(Transaction::Write {
            reg,
            width: Width::Byte,
            value: u16::from(value),
        });
        match target {
            Target::App => self.write(reg, Width::Byte, u16::from(value)),
            Target::Bootloader => self.boot_write(reg, value),
        }
        Ok(())
    }

    fn write_word(&mut self, addr: u8, reg: u8, value: u16) -> Result<()> {
        let target = self.transact(addr, reg)?;
        self.log.push(Transaction::Write {
            reg,
            width: Width::Word,
            value,
        });
        match target {
            Target::App => self.write(reg, Width::Word, value),
            Target::Bootloader => self.boot_write(reg, value as u8),
        }
        Ok(())
    }

    fn read_block(&mut self, addr: u8, reg: u8, buf: &mut [u8]) -> Result<()> {
        if buf.len() > MAX_BLOCK_LEN {
            return Err(Error::InvalidLength {
                len: buf.len(),
                max: MAX_BLOCK_LEN,
            });
        }
        let target = self.transact(addr, reg)?;
        self.log.push(Transaction::ReadBlock {
            reg,
            len: buf.len(),
        });

        match target {
            Target::App
                if reg == OUTPUT_STREAM && self.cr1().contains(Cr1::PYTHON_READ_RETURN) =>
            {
                for byte in buf.iter_mut() {
                    *byte = self.output.get(self.stream_cursor).copied().unwrap_or(0);
                    self.stream_cursor += 1;
                }
            }
            Target::App => {
                for (i, byte) in buf.iter_mut().enumerate() {
                    *byte = self.peek(reg.wrapping_add(i as u8), Width::Byte) as u8;
                }
            }
            Target::Bootloader => {
                for (i, byte) in buf.iter_mut().enumerate() {
                    *byte = self.boot_read(reg.wrapping_add(i as u8));
                }
            }
        }
        Ok(())
    }

    fn write_block(&mut self, addr: u8, reg: u8, data: &[u8]) -> Result<()> {
        if self.transact(addr, reg)? == Target::App {
            log::debug!("dummy: Application does not take plain writes");
            return Err(self.refuse(addr, reg));
        }
        if !self.boot_write_block(reg, data) {
            return Err(self.refuse(addr, reg));
        }
        self.log.push(Transaction::WriteBlock {
            reg,
            len: data.len(),
        });
        Ok(())
    }

    fn write_then_stream(&mut self, addr: u8, reg: u8, value: u8, payload: &[u8]) -> Result<()> {
        let target = self.transact(addr, reg)?;
        let load = Cr1::from_bits_retain(value).contains(Cr1::PYTHON_LOAD);
        if target != Target::App || reg != CR1 || !load {
            log::debug!("dummy: Unexpected combined transfer to 0x{:02X}", reg);
            return Err(self.refuse(addr, reg));
        }
        self.log.push(Transaction::Stream {
            reg,
            value,
            len: payload.len(),
        });

        self.load_script(payload);
        // The firmware drops the load flag once it has taken the script
        self.status[CR1 as usize] = value & !Cr1::PYTHON_LOAD.bits();
        self.latch = None;
        Ok(())
    }

    fn delay(&mut self, duration: Duration) {
        // No sleeping for an in-memory device
        self.elapsed += duration;
    }
}

/// Parse bus options from a list of key-value pairs
pub fn parse_options(options: &[(&str, &str)]) -> core::result::Result<DummyConfig, String> {
    let mut config = DummyConfig::default();

    for (key, value) in options {
        match *key {
            "latency" => {
                config.ack_latency = value
                    .parse()
                    .map_err(|_| format!("Invalid latency value: {}", value))?;
            }
            "fail_every" => {
                config.fail_every = value
                    .parse()
                    .map_err(|_| format!("Invalid fail_every value: {}", value))?;
            }
            "bootloader" => {
                config.in_bootloader = match *value {
                    "1" | "true" | "yes" => true,
                    "0" | "false" | "no" => false,
                    _ => return Err(format!("Invalid bootloader value: {}", value)),
                };
            }
            "busy_polls" => {
                config.flash_busy_polls = value
                    .parse()
                    .map_err(|_| format!("Invalid busy_polls value: {}", value))?;
            }
            "output" => {
                // Handled by the caller, which preloads the output buffer
            }
            _ => {
                log::warn!("dummy: Unknown option: {}={}", key, value);
            }
        }
    }

    Ok(config)
}
