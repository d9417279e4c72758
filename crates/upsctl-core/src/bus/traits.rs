//! Register bus trait definitions

use alloc::boxed::Box;
use core::time::Duration;

use crate::error::Result;

/// Largest block a single SMBus transaction can carry
pub const MAX_BLOCK_LEN: usize = 32;

/// Width of a register access
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    /// 8-bit access
    Byte,
    /// 16-bit little-endian access
    Word,
}

impl Width {
    /// Mask of the bits a value of this width can carry
    pub const fn mask(self) -> u16 {
        match self {
            Width::Byte => 0x00FF,
            Width::Word => 0xFFFF,
        }
    }
}

/// Register-level bus transport
///
/// Every transaction is a single bus transfer that may fail. Implementations
/// must not retry internally; retrying is the channel's job so that the
/// policy is applied uniformly.
///
/// Errors should be reported as [`Error::Transport`](crate::Error::Transport)
/// carrying the address and register of the failed transaction.
///
/// ## Example: in-memory register file
///
/// ```ignore
/// impl RegisterBus for Registers {
///     fn read_byte(&mut self, _addr: u8, reg: u8) -> Result<u8> {
///         Ok(self.regs[reg as usize])
///     }
///     // ...
///     fn delay(&mut self, _duration: Duration) {}
/// }
/// ```
pub trait RegisterBus {
    /// Read one byte register (SMBus "read byte data")
    fn read_byte(&mut self, addr: u8, reg: u8) -> Result<u8>;

    /// Read one word register (SMBus "read word data", little-endian)
    fn read_word(&mut self, addr: u8, reg: u8) -> Result<u16>;

    /// Write one byte register (SMBus "write byte data")
    fn write_byte(&mut self, addr: u8, reg: u8, value: u8) -> Result<()>;

    /// Write one word register (SMBus "write word data", little-endian)
    fn write_word(&mut self, addr: u8, reg: u8, value: u16) -> Result<()>;

    /// Read `buf.len()` consecutive registers starting at `reg`
    ///
    /// `buf` is at most [`MAX_BLOCK_LEN`] bytes; longer requests should be
    /// rejected with [`Error::InvalidLength`](crate::Error::InvalidLength).
    fn read_block(&mut self, addr: u8, reg: u8, buf: &mut [u8]) -> Result<()>;

    /// Write `data` to consecutive registers starting at `reg`
    ///
    /// A plain I2C write (register byte followed by `data`), not an SMBus
    /// transaction, so `data` is not limited to [`MAX_BLOCK_LEN`].
    fn write_block(&mut self, addr: u8, reg: u8, data: &[u8]) -> Result<()>;

    /// Write `value` to `reg`, then send `payload` in the same combined
    /// transfer
    ///
    /// The payload message follows a repeated start and carries no register
    /// byte. The firmware's bulk script loader relies on both messages
    /// arriving in one transfer.
    fn write_then_stream(&mut self, addr: u8, reg: u8, value: u8, payload: &[u8]) -> Result<()>;

    /// Block for the given duration
    ///
    /// Emulated buses may account for the delay without sleeping.
    fn delay(&mut self, duration: Duration);

    /// Read a register of the given width, widened to `u16`
    fn read(&mut self, addr: u8, reg: u8, width: Width) -> Result<u16> {
        match width {
            Width::Byte => self.read_byte(addr, reg).map(u16::from),
            Width::Word => self.read_word(addr, reg),
        }
    }

    /// Write a register of the given width; bytes use the low 8 bits of `value`
    fn write(&mut self, addr: u8, reg: u8, width: Width, value: u16) -> Result<()> {
        match width {
            Width::Byte => self.write_byte(addr, reg, value as u8),
            Width::Word => self.write_word(addr, reg, value),
        }
    }
}

impl<B: RegisterBus + ?Sized> RegisterBus for Box<B> {
    fn read_byte(&mut self, addr: u8, reg: u8) -> Result<u8> {
        (**self).read_byte(addr, reg)
    }

    fn read_word(&mut self, addr: u8, reg: u8) -> Result<u16> {
        (**self).read_word(addr, reg)
    }

    fn write_byte(&mut self, addr: u8, reg: u8, value: u8) -> Result<()> {
        (**self).write_byte(addr, reg, value)
    }

    fn write_word(&mut self, addr: u8, reg: u8, value: u16) -> Result<()> {
        (**self).write_word(addr, reg, value)
    }

    fn read_block(&mut self, addr: u8, reg: u8, buf: &mut [u8]) -> Result<()> {
        (**self).read_block(addr, reg, buf)
    }

    fn write_block(&mut self, addr: u8, reg: u8, data: &[u8]) -> Result<()> {
        (**self).write_block(addr, reg, data)
    }

    fn write_then_stream(&mut self, addr: u8, reg: u8, value: u8, payload: &[u8]) -> Result<()> {
        (**self).write_then_stream(addr, reg, value, payload)
    }

    fn delay(&mut self, duration: Duration) {
        (**self).delay(duration)
    }
}
