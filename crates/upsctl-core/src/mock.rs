//! Scripted register bus for unit tests

use alloc::vec::Vec;
use core::time::Duration;

use crate::bus::RegisterBus;
use crate::error::{Error, Result};

/// A transaction issued against the mock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    ReadByte { reg: u8 },
    ReadWord { reg: u8 },
    WriteByte { reg: u8, value: u8 },
    WriteWord { reg: u8, value: u16 },
    ReadBlock { reg: u8, len: usize },
    WriteBlock { reg: u8, len: usize },
    WriteStream { reg: u8, value: u8, len: usize },
}

/// Register file with a configurable acknowledgement rule
///
/// A write stores `ack(reg, previous, value)` as the register's read-back.
/// The new read-back becomes visible on the `ack_after`-th read of that
/// register. Block writes are only recorded, data included. A stream register hands out
/// successive bytes of its data on each block read.
pub struct MockBus {
    pub regs: [u16; 256],
    pub ops: Vec<Op>,
    pub slept: Duration,
    pub blocks: Vec<Vec<u8>>,
    ack: fn(u8, u16, u16) -> u16,
    ack_after: u32,
    pending: Option<(u8, u16, u32)>,
    never_ack: Option<u16>,
    fail_reads: u32,
    fail_writes: u32,
    writes_before_failure: Option<u32>,
    fail_block_at: Option<u8>,
    stream: Option<(u8, Vec<u8>, usize)>,
}

impl MockBus {
    pub fn new() -> Self {
        Self {
            regs: [0; 256],
            ops: Vec::new(),
            slept: Duration::ZERO,
            blocks: Vec::new(),
            ack: |_, _, value| value,
            ack_after: 1,
            pending: None,
            never_ack: None,
            fail_reads: 0,
            fail_writes: 0,
            writes_before_failure: None,
            fail_block_at: None,
            stream: None,
        }
    }

    pub fn set(&mut self, reg: u8, value: u16) {
        self.regs[reg as usize] = value;
    }

    pub fn with_ack(&mut self, ack: fn(u8, u16, u16) -> u16) {
        self.ack = ack;
    }

    pub fn ack_after_polls(&mut self, polls: u32) {
        self.ack_after = polls;
    }

    pub fn never_ack(&mut self, readback: u16) {
        self.never_ack = Some(readback);
    }

    pub fn fail_next_reads(&mut self, count: u32) {
        self.fail_reads = count;
    }

    pub fn fail_next_writes(&mut self, count: u32) {
        self.fail_writes = count;
    }

    /// Let `count` writes through, then fail every write
    pub fn fail_writes_after(&mut self, count: u32) {
        self.writes_before_failure = Some(count);
    }

    pub fn with_stream(&mut self, reg: u8, data: &[u8]) {
        self.stream = Some((reg, data.to_vec(), 0));
    }

    pub fn fail_block_at(&mut self, reg: u8) {
        self.fail_block_at = Some(reg);
    }

    pub fn count(&self, pred: impl Fn(&Op) -> bool) -> usize {
        self.ops.iter().filter(|op| pred(op)).count()
    }

    fn read(&mut self, addr: u8, reg: u8) -> Result<u16> {
        if self.fail_reads > 0 {
            self.fail_reads -= 1;
            return Err(Error::Transport { addr, reg });
        }
        if let Some(readback) = self.never_ack {
            return Ok(readback);
        }
        if let Some((pending_reg, value, polls)) = self.pending {
            if pending_reg == reg {
                if polls + 1 >= self.ack_after {
                    self.regs[reg as usize] = value;
                    self.pending = None;
                } else {
                    self.pending = Some((pending_reg, value, polls + 1));
                }
            }
        }
        Ok(self.regs[reg as usize])
    }

    fn check_write(&mut self, addr: u8, reg: u8) -> Result<()> {
        if self.fail_writes > 0 {
            self.fail_writes -= 1;
            return Err(Error::Transport { addr, reg });
        }
        match self.writes_before_failure {
            Some(0) => return Err(Error::Transport { addr, reg }),
            Some(n) => self.writes_before_failure = Some(n - 1),
            None => {}
        }
        Ok(())
    }

    fn write(&mut self, addr: u8, reg: u8, value: u16) -> Result<()> {
        self.check_write(addr, reg)?;
        let previous = self.regs[reg as usize];
        self.pending = Some((reg, (self.ack)(reg, previous, value), 0));
        Ok(())
    }
}

impl RegisterBus for MockBus {
    fn read_byte(&mut self, addr: u8, reg: u8) -> Result<u8> {
        self.ops.push(Op::ReadByte { reg });
        self.read(addr, reg).map(|v| v as u8)
    }

    fn read_word(&mut self, addr: u8, reg: u8) -> Result<u16> {
        self.ops.push(Op::ReadWord { reg });
        self.read(addr, reg)
    }

    fn write_byte(&mut self, addr: u8, reg: u8, value: u8) -> Result<()> {
        self.ops.push(Op::WriteByte { reg, value });
        self.write(addr, reg, value as u16)
    }

    fn write_word(&mut self, addr: u8, reg: u8, value: u16) -> Result<()> {
        self.ops.push(Op::WriteWord { reg, value });
        self.write(addr, reg, value)
    }

    fn read_block(&mut self, addr: u8, reg: u8, buf: &mut [u8]) -> Result<()> {
        self.ops.push(Op::ReadBlock {
            reg,
            len: buf.len(),
        });
        if self.fail_block_at == Some(reg) {
            return Err(Error::Transport { addr, reg });
        }
        if let Some((stream_reg, data, pos)) = &mut self.stream {
            if *stream_reg == reg {
                for byte in buf.iter_mut() {
                    *byte = data.get(*pos).copied().unwrap_or(0);
                    *pos += 1;
                }
                return Ok(());
            }
        }
        for (i, byte) in buf.iter_mut().enumerate() {
            *byte = self.regs[reg as usize + i] as u8;
        }
        Ok(())
    }

    fn write_block(&mut self, addr: u8, reg: u8, data: &[u8]) -> Result<()> {
        self.ops.push(Op::WriteBlock {
            reg,
            len: data.len(),
        });
        self.check_write(addr, reg)?;
        self.blocks.push(data.to_vec());
        Ok(())
    }

    fn write_then_stream(&mut self, addr: u8, reg: u8, value: u8, payload: &[u8]) -> Result<()> {
        self.ops.push(Op::WriteStream {
            reg,
            value,
            len: payload.len(),
        });
        self.write(addr, reg, value as u16)
    }

    fn delay(&mut self, duration: Duration) {
        self.slept += duration;
    }
}
