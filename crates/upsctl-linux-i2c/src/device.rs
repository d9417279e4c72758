//! Linux I2C device implementation
//!
//! This module provides the `LinuxI2c` struct that implements the
//! `RegisterBus` trait using the kernel's i2c-dev SMBus ioctl. Plain writes
//! go through `write(2)` and combined transfers through `I2C_RDWR`.

use crate::error::{LinuxI2cError, Result};

use upsctl_core::bus::{RegisterBus, MAX_BLOCK_LEN};
use upsctl_core::error::{Error as CoreError, Result as CoreResult};

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::os::unix::io::AsRawFd;
use std::time::Duration;

/// Default adapter on a Raspberry Pi header
pub const DEFAULT_DEVICE: &str = "/dev/i2c-1";

/// i2c-dev ioctl definitions (linux/i2c-dev.h, linux/i2c.h)
mod ioctl {
    use nix::{ioctl_read_bad, ioctl_write_int_bad, ioctl_write_ptr_bad};

    const I2C_SLAVE: u16 = 0x0703;
    const I2C_FUNCS: u16 = 0x0705;
    const I2C_RDWR: u16 = 0x0707;
    const I2C_SMBUS: u16 = 0x0720;

    pub const I2C_SMBUS_WRITE: u8 = 0;
    pub const I2C_SMBUS_READ: u8 = 1;

    pub const I2C_SMBUS_BYTE_DATA: u32 = 2;
    pub const I2C_SMBUS_WORD_DATA: u32 = 3;
    pub const I2C_SMBUS_I2C_BLOCK_DATA: u32 = 8;

    pub const I2C_FUNC_I2C: libc::c_ulong = 0x0000_0001;
    pub const I2C_FUNC_SMBUS_READ_BYTE_DATA: libc::c_ulong = 0x0008_0000;
    pub const I2C_FUNC_SMBUS_WRITE_BYTE_DATA: libc::c_ulong = 0x0010_0000;
    pub const I2C_FUNC_SMBUS_READ_WORD_DATA: libc::c_ulong = 0x0020_0000;
    pub const I2C_FUNC_SMBUS_WRITE_WORD_DATA: libc::c_ulong = 0x0040_0000;
    pub const I2C_FUNC_SMBUS_READ_I2C_BLOCK: libc::c_ulong = 0x0400_0000;

    /// Length byte plus 32 data bytes plus PEC
    pub const I2C_SMBUS_BLOCK_MAX: usize = 32;

    #[repr(C)]
    pub union I2cSmbusData {
        pub byte: u8,
        pub word: u16,
        pub block: [u8; I2C_SMBUS_BLOCK_MAX + 2],
    }

    #[repr(C)]
    pub struct I2cSmbusIoctlData {
        pub read_write: u8,
        pub command: u8,
        pub size: u32,
        pub data: *mut I2cSmbusData,
    }

    /// One segment of a combined transfer
    #[repr(C)]
    pub struct I2cMsg {
        pub addr: u16,
        pub flags: u16,
        pub len: u16,
        pub buf: *mut u8,
    }

    #[repr(C)]
    pub struct I2cRdwrIoctlData {
        pub msgs: *mut I2cMsg,
        pub nmsgs: u32,
    }

    ioctl_write_int_bad!(i2c_slave, I2C_SLAVE);
    ioctl_read_bad!(i2c_funcs, I2C_FUNCS, libc::c_ulong);
    ioctl_write_ptr_bad!(i2c_rdwr, I2C_RDWR, I2cRdwrIoctlData);
    ioctl_write_ptr_bad!(i2c_smbus, I2C_SMBUS, I2cSmbusIoctlData);
}

/// Longest message a single `I2C_RDWR` segment can carry
pub const MAX_MESSAGE_LEN: usize = u16::MAX as usize;

use ioctl::I2cSmbusData;

/// Configuration for opening a Linux I2C adapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinuxI2cConfig {
    /// Device path (e.g., "/dev/i2c-1")
    pub device: String,
}

impl Default for LinuxI2cConfig {
    fn default() -> Self {
        Self {
            device: DEFAULT_DEVICE.to_string(),
        }
    }
}

impl LinuxI2cConfig {
    /// Create a new configuration with the given device path
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
        }
    }

    /// Create a configuration for adapter number `bus`
    pub fn for_bus(bus: u32) -> Self {
        Self::new(format!("/dev/i2c-{}", bus))
    }
}

/// Linux I2C adapter using the i2c-dev interface
pub struct LinuxI2c {
    /// File handle for the i2c-dev node
    file: File,
    /// Device path, for diagnostics
    path: String,
    /// Slave address currently selected with I2C_SLAVE
    selected: Option<u8>,
    /// Whether the adapter can do I2C block reads
    block_reads: bool,
    /// Whether the adapter can do plain I2C transfers
    plain_i2c: bool,
}

impl LinuxI2c {
    /// Open a Linux I2C adapter with the given configuration
    pub fn open(config: &LinuxI2cConfig) -> Result<Self> {
        if config.device.is_empty() {
            return Err(LinuxI2cError::NoDevice);
        }

        log::debug!("linux_i2c: Opening device {}", config.device);

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&config.device)
            .map_err(|e| LinuxI2cError::OpenFailed {
                path: config.device.clone(),
                source: e,
            })?;

        let mut funcs: libc::c_ulong = 0;
        unsafe {
            ioctl::i2c_funcs(file.as_raw_fd(), &mut funcs).map_err(|e| {
                LinuxI2cError::FunctionalityFailed(std::io::Error::from_raw_os_error(e as i32))
            })?;
        }

        for (flag, name) in [
            (ioctl::I2C_FUNC_SMBUS_READ_BYTE_DATA, "SMBus read byte data"),
            (ioctl::I2C_FUNC_SMBUS_WRITE_BYTE_DATA, "SMBus write byte data"),
            (ioctl::I2C_FUNC_SMBUS_READ_WORD_DATA, "SMBus read word data"),
            (ioctl::I2C_FUNC_SMBUS_WRITE_WORD_DATA, "SMBus write word data"),
        ] {
            if funcs & flag == 0 {
                return Err(LinuxI2cError::Unsupported(name));
            }
        }

        let block_reads = funcs & ioctl::I2C_FUNC_SMBUS_READ_I2C_BLOCK != 0;
        if !block_reads {
            log::warn!(
                "linux_i2c: {} has no I2C block reads, falling back to byte reads",
                config.device
            );
        }

        // Only the bulk paths and the bootloader need these
        let plain_i2c = funcs & ioctl::I2C_FUNC_I2C != 0;
        if !plain_i2c {
            log::debug!("linux_i2c: {} is SMBus only", config.device);
        }

        log::info!("linux_i2c: Opened {}", config.device);

        Ok(Self {
            file,
            path: config.device.clone(),
            selected: None,
            block_reads,
            plain_i2c,
        })
    }

    /// Open a device node with default settings
    pub fn open_device(device: &str) -> Result<Self> {
        Self::open(&LinuxI2cConfig::new(device))
    }

    /// Device path this adapter was opened from
    pub fn path(&self) -> &str {
        &self.path
    }

    fn select(&mut self, addr: u8) -> Result<()> {
        if self.selected == Some(addr) {
            return Ok(());
        }

        unsafe {
            ioctl::i2c_slave(self.file.as_raw_fd(), libc::c_int::from(addr)).map_err(|e| {
                LinuxI2cError::SetAddressFailed {
                    addr,
                    source: std::io::Error::from_raw_os_error(e as i32),
                }
            })?;
        }
        self.selected = Some(addr);
        log::debug!("linux_i2c: Selected slave 0x{:02X}", addr);
        Ok(())
    }

    /// Issue one SMBus transaction
    fn smbus(
        &mut self,
        kind: &'static str,
        addr: u8,
        read_write: u8,
        reg: u8,
        size: u32,
        data: &mut I2cSmbusData,
    ) -> Result<()> {
        self.select(addr)?;

        let args = ioctl::I2cSmbusIoctlData {
            read_write,
            command: reg,
            size,
            data,
        };

        unsafe {
            ioctl::i2c_smbus(self.file.as_raw_fd(), &args).map_err(|e| {
                LinuxI2cError::TransferFailed {
                    kind,
                    addr,
                    reg,
                    source: std::io::Error::from_raw_os_error(e as i32),
                }
            })?;
        }
        Ok(())
    }

    /// SMBus "read byte data"
    pub fn smbus_read_byte(&mut self, addr: u8, reg: u8) -> Result<u8> {
        let mut data = I2cSmbusData { word: 0 };
        self.smbus(
            "read byte",
            addr,
            ioctl::I2C_SMBUS_READ,
            reg,
            ioctl::I2C_SMBUS_BYTE_DATA,
            &mut data,
        )?;
        Ok(unsafe { data.byte })
    }

    /// SMBus "read word data"
    pub fn smbus_read_word(&mut self, addr: u8, reg: u8) -> Result<u16> {
        let mut data = I2cSmbusData { word: 0 };
        self.smbus(
            "read word",
            addr,
            ioctl::I2C_SMBUS_READ,
            reg,
            ioctl::I2C_SMBUS_WORD_DATA,
            &mut data,
        )?;
        Ok(unsafe { data.word })
    }

    /// SMBus "write byte data"
    pub fn smbus_write_byte(&mut self, addr: u8, reg: u8, value: u8) -> Result<()> {
        let mut data = I2cSmbusData { byte: value };
        self.smbus(
            "write byte",
            addr,
            ioctl::I2C_SMBUS_WRITE,
            reg,
            ioctl::I2C_SMBUS_BYTE_DATA,
            &mut data,
        )
    }

    /// SMBus "write word data"
    pub fn smbus_write_word(&mut self, addr: u8, reg: u8, value: u16) -> Result<()> {
        let mut data = I2cSmbusData { word: value };
        self.smbus(
            "write word",
            addr,
            ioctl::I2C_SMBUS_WRITE,
            reg,
            ioctl::I2C_SMBUS_WORD_DATA,
            &mut data,
        )
    }

    /// I2C block read of `buf.len()` registers starting at `reg`
    ///
    /// Adapters without block support are read one register at a time.
    pub fn i2c_read_block(&mut self, addr: u8, reg: u8, buf: &mut [u8]) -> Result<()> {
        if buf.len() > MAX_BLOCK_LEN {
            return Err(LinuxI2cError::BlockTooLong(buf.len()));
        }

        if !self.block_reads {
            for (i, byte) in buf.iter_mut().enumerate() {
                *byte = self.smbus_read_byte(addr, reg.wrapping_add(i as u8))?;
            }
            return Ok(());
        }

        // The first block byte carries the requested length
        let mut block = [0u8; ioctl::I2C_SMBUS_BLOCK_MAX + 2];
        block[0] = buf.len() as u8;
        let mut data = I2cSmbusData { block };
        self.smbus(
            "block read",
            addr,
            ioctl::I2C_SMBUS_READ,
            reg,
            ioctl::I2C_SMBUS_I2C_BLOCK_DATA,
            &mut data,
        )?;

        let block = unsafe { data.block };
        let received = block[0] as usize;
        if received < buf.len() {
            return Err(LinuxI2cError::TransferFailed {
                kind: "block read",
                addr,
                reg,
                source: std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    format!("short block: {} of {} bytes", received, buf.len()),
                ),
            });
        }
        buf.copy_from_slice(&block[1..=buf.len()]);
        Ok(())
    }

    /// Plain I2C write of `reg` followed by `data`
    pub fn i2c_write(&mut self, addr: u8, reg: u8, data: &[u8]) -> Result<()> {
        if !self.plain_i2c {
            return Err(LinuxI2cError::Unsupported("plain I2C transfers"));
        }
        if data.len() >= MAX_MESSAGE_LEN {
            return Err(LinuxI2cError::MessageTooLong(data.len()));
        }
        self.select(addr)?;

        let mut frame = Vec::with_capacity(data.len() + 1);
        frame.push(reg);
        frame.extend_from_slice(data);

        let written = self
            .file
            .write(&frame)
            .map_err(|source| LinuxI2cError::TransferFailed {
                kind: "write",
                addr,
                reg,
                source,
            })?;
        if written != frame.len() {
            return Err(LinuxI2cError::TransferFailed {
                kind: "write",
                addr,
                reg,
                source: std::io::Error::new(
                    std::io::ErrorKind::WriteZero,
                    format!("short write: {} of {} bytes", written, frame.len()),
                ),
            });
        }
        Ok(())
    }

    /// Write `value` to `reg`, then send `payload` after a repeated start
    ///
    /// Both messages go out in one `I2C_RDWR` transfer, so no other master
    /// can slip in between the register write and the payload.
    pub fn i2c_write_then_stream(
        &mut self,
        addr: u8,
        reg: u8,
        value: u8,
        payload: &[u8],
    ) -> Result<()> {
        if !self.plain_i2c {
            return Err(LinuxI2cError::Unsupported("plain I2C transfers"));
        }
        let payload_len = u16::try_from(payload.len())
            .map_err(|_| LinuxI2cError::MessageTooLong(payload.len()))?;

        // The kernel only reads from write segments
        let mut head = [reg, value];
        let mut body = payload.to_vec();
        let mut msgs = [
            ioctl::I2cMsg {
                addr: u16::from(addr),
                flags: 0,
                len: head.len() as u16,
                buf: head.as_mut_ptr(),
            },
            ioctl::I2cMsg {
                addr: u16::from(addr),
                flags: 0,
                len: payload_len,
                buf: body.as_mut_ptr(),
            },
        ];
        let args = ioctl::I2cRdwrIoctlData {
            msgs: msgs.as_mut_ptr(),
            nmsgs: msgs.len() as u32,
        };

        unsafe {
            ioctl::i2c_rdwr(self.file.as_raw_fd(), &args).map_err(|e| {
                LinuxI2cError::TransferFailed {
                    kind: "combined write",
                    addr,
                    reg,
                    source: std::io::Error::from_raw_os_error(e as i32),
                }
            })?;
        }
        log::trace!(
            "linux_i2c: Sent 0x{:02X} to 0x{:02X} then {} bytes",
            value,
            reg,
            payload.len()
        );
        Ok(())
    }
}

/// Map a transport failure onto the core error, keeping the detail in the log
fn transport(addr: u8, reg: u8) -> impl FnOnce(LinuxI2cError) -> CoreError {
    move |e| {
        log::debug!("linux_i2c: {}", e);
        match e {
            LinuxI2cError::BlockTooLong(len) => CoreError::InvalidLength {
                len,
                max: MAX_BLOCK_LEN,
            },
            LinuxI2cError::MessageTooLong(len) => CoreError::InvalidLength {
                len,
                max: MAX_MESSAGE_LEN,
            },
            _ => CoreError::Transport { addr, reg },
        }
    }
}

impl RegisterBus for LinuxI2c {
    fn read_byte(&mut self, addr: u8, reg: u8) -> CoreResult<u8> {
        self.smbus_read_byte(addr, reg).map_err(transport(addr, reg))
    }

    fn read_word(&mut self, addr: u8, reg: u8) -> CoreResult<u16> {
        self.smbus_read_word(addr, reg).map_err(transport(addr, reg))
    }

    fn write_byte(&mut self, addr: u8, reg: u8, value: u8) -> CoreResult<()> {
        self.smbus_write_byte(addr, reg, value)
            .map_err(transport(addr, reg))
    }

    fn write_word(&mut self, addr: u8, reg: u8, value: u16) -> CoreResult<()> {
        self.smbus_write_word(addr, reg, value)
            .map_err(transport(addr, reg))
    }

    fn read_block(&mut self, addr: u8, reg: u8, buf: &mut [u8]) -> CoreResult<()> {
        self.i2c_read_block(addr, reg, buf)
            .map_err(transport(addr, reg))
    }

    fn write_block(&mut self, addr: u8, reg: u8, data: &[u8]) -> CoreResult<()> {
        self.i2c_write(addr, reg, data)
            .map_err(transport(addr, reg))
    }

    fn write_then_stream(
        &mut self,
        addr: u8,
        reg: u8,
        value: u8,
        payload: &[u8],
    ) -> CoreResult<()> {
        self.i2c_write_then_stream(addr, reg, value, payload)
            .map_err(transport(addr, reg))
    }

    fn delay(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Parse bus options from a list of key-value pairs
pub fn parse_options(options: &[(&str, &str)]) -> std::result::Result<LinuxI2cConfig, String> {
    let mut config = LinuxI2cConfig::default();

    for (key, value) in options {
        match *key {
            "dev" => {
                config.device = value.to_string();
            }
            "bus" => {
                let bus: u32 = value
                    .parse()
                    .map_err(|_| format!("Invalid bus number: {}", value))?;
                config = LinuxI2cConfig::for_bus(bus);
            }
            _ => {
                log::warn!("linux_i2c: Unknown option: {}={}", key, value);
            }
        }
    }

    if config.device.is_empty() {
        return Err("No device specified. Use dev=/dev/i2c-N or bus=N".to_string());
    }

    Ok(config)
}
