//! Retrying register access with read-back verification
//!
//! The bus between the host and the UPS microcontroller is lossy: the
//! firmware services SMBus from an interrupt that competes with its ADC and
//! charger work, so individual transactions are dropped and writes are
//! acknowledged asynchronously. [`RegisterChannel`] wraps a
//! [`RegisterBus`] and applies one [`RetryPolicy`] to every transaction.
//!
//! Two kinds of failure are kept apart:
//!
//! - a **transport fault** (the transaction itself failed) is retried and,
//!   once the policy is exhausted, returned as an [`Error`]
//! - a **read-back mismatch** (the write went through but the device has not
//!   converged on the expected acknowledgement) is returned as
//!   [`Verification::Mismatch`], a value the caller escalates with context

use alloc::vec;
use alloc::vec::Vec;
use core::ops::Range;
use core::time::Duration;

use crate::bus::{RegisterBus, Width, MAX_BLOCK_LEN};
use crate::error::{Error, Result};
use crate::retry::RetryPolicy;

/// Outcome of a verified write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    /// The device acknowledged with the expected read-back
    Matched,
    /// All attempts were exhausted without the expected read-back
    Mismatch {
        /// Last value read back from the register
        last: u16,
    },
}

impl Verification {
    /// Whether the write was acknowledged
    pub fn is_matched(&self) -> bool {
        matches!(self, Verification::Matched)
    }
}

/// Result of a chunked block read
///
/// Chunks that could not be read are zero-filled and listed in
/// [`missing`](Self::missing). Partial telemetry is preferred over none; the
/// consumer decides whether the gaps matter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockRead {
    data: Vec<u8>,
    missing: Vec<Range<usize>>,
}

impl BlockRead {
    /// The bytes read, in register order, with failed chunks zero-filled
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Byte ranges (relative to the start register) that were zero-filled
    pub fn missing(&self) -> &[Range<usize>] {
        &self.missing
    }

    /// Whether every chunk was read successfully
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }

    /// Consume the result, returning the data
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }
}

/// Session-scoped register channel to one device
///
/// Owns the transport exclusively. Coordinators borrow the channel mutably
/// for the whole of an upload or drain, so two protocol sequences can never
/// interleave on the same device.
pub struct RegisterChannel<B> {
    bus: B,
    policy: RetryPolicy,
}

impl<B: RegisterBus> RegisterChannel<B> {
    /// Create a channel over `bus` using `policy` for every transaction
    pub fn new(bus: B, policy: RetryPolicy) -> Self {
        Self { bus, policy }
    }

    /// The retry policy in use
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Get a reference to the underlying bus
    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Get a mutable reference to the underlying bus
    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    /// Release the underlying bus
    pub fn into_inner(self) -> B {
        self.bus
    }

    /// Read a byte register, retrying transport failures
    pub fn read_byte(&mut self, addr: u8, reg: u8) -> Result<u8> {
        self.with_retry("read", reg, |bus| bus.read_byte(addr, reg))
    }

    /// Read a word register, retrying transport failures
    pub fn read_word(&mut self, addr: u8, reg: u8) -> Result<u16> {
        self.with_retry("read", reg, |bus| bus.read_word(addr, reg))
    }

    /// Write a byte register without read-back, retrying transport failures
    pub fn write_byte(&mut self, addr: u8, reg: u8, value: u8) -> Result<()> {
        self.with_retry("write", reg, |bus| bus.write_byte(addr, reg, value))
    }

    /// Write a word register without read-back, retrying transport failures
    pub fn write_word(&mut self, addr: u8, reg: u8, value: u16) -> Result<()> {
        self.with_retry("write", reg, |bus| bus.write_word(addr, reg, value))
    }

    /// Fill `buf` with one block transaction at `reg`, retrying transport
    /// failures
    ///
    /// Unlike [`read_block`](Self::read_block), a persistent failure is an
    /// error rather than a zero-filled gap.
    pub fn read_chunk(&mut self, addr: u8, reg: u8, buf: &mut [u8]) -> Result<()> {
        self.with_retry("block read", reg, |bus| bus.read_block(addr, reg, buf))
    }

    /// Set `reg` to `value` and stream `payload` in one combined transfer,
    /// retrying transport failures
    pub fn write_then_stream(
        &mut self,
        addr: u8,
        reg: u8,
        value: u8,
        payload: &[u8],
    ) -> Result<()> {
        self.with_retry("combined write", reg, |bus| {
            bus.write_then_stream(addr, reg, value, payload)
        })
    }

    /// Block for `duration` on the underlying bus
    pub fn delay(&mut self, duration: Duration) {
        self.bus.delay(duration);
    }

    /// Write a register and wait for the device to acknowledge it
    ///
    /// Each attempt writes `value`, then polls the register up to
    /// `max_sub_attempts` times (sleeping `attempt_delay` between polls)
    /// until it reads `expected`. An attempt whose polls never match, or
    /// whose transactions fail, is followed by `attempt_delay` and a fresh
    /// write, up to `max_attempts` attempts.
    ///
    /// Returns [`Verification::Mismatch`] if the read-back never converged.
    /// Returns an error only if the final attempt failed at the transport
    /// level.
    pub fn write_verified(
        &mut self,
        addr: u8,
        reg: u8,
        value: u16,
        expected: u16,
        width: Width,
    ) -> Result<Verification> {
        let max_attempts = self.policy.max_attempts();
        let delay = self.policy.attempt_delay();

        // Overwritten on the first attempt; max_attempts is at least 1
        let mut outcome = Err(Error::Transport { addr, reg });

        for attempt in 1..=max_attempts {
            outcome = self.write_and_poll(addr, reg, value, expected, width);
            match outcome {
                Ok(Verification::Matched) => {
                    if attempt > 1 {
                        log::debug!(
                            "reg 0x{:02X}: write 0x{:04X} acknowledged on attempt {}",
                            reg,
                            value,
                            attempt
                        );
                    }
                    return outcome;
                }
                Ok(Verification::Mismatch { last }) => {
                    log::debug!(
                        "reg 0x{:02X}: read-back mismatch after write 0x{:04X} \
                         (expected 0x{:04X}, got 0x{:04X}), attempt {}/{}",
                        reg,
                        value,
                        expected,
                        last,
                        attempt,
                        max_attempts
                    );
                }
                Err(e) => {
                    log::warn!(
                        "reg 0x{:02X}: write attempt {}/{} failed: {}",
                        reg,
                        attempt,
                        max_attempts,
                        e
                    );
                }
            }

            if attempt < max_attempts {
                self.bus.delay(delay);
            }
        }

        if let Ok(Verification::Mismatch { last }) = outcome {
            log::warn!(
                "reg 0x{:02X}: write 0x{:04X} never acknowledged \
                 (expected 0x{:04X}, last 0x{:04X})",
                reg,
                value,
                expected,
                last
            );
        }

        outcome
    }

    /// Read `length` consecutive registers starting at `start`
    ///
    /// The read is split into transactions of at most [`MAX_BLOCK_LEN`]
    /// bytes. A chunk that still fails after retrying is zero-filled and
    /// reported in [`BlockRead::missing`] instead of aborting the read.
    ///
    /// Fails only if the range runs past the end of the 8-bit register space.
    pub fn read_block(&mut self, addr: u8, start: u8, length: usize) -> Result<BlockRead> {
        let available = 0x100 - start as usize;
        if length > available {
            return Err(Error::InvalidLength {
                len: length,
                max: available,
            });
        }

        let mut data = vec![0u8; length];
        let mut missing = Vec::new();

        for (i, chunk) in data.chunks_mut(MAX_BLOCK_LEN).enumerate() {
            let offset = i * MAX_BLOCK_LEN;
            let reg = start + offset as u8;
            let len = chunk.len();

            match self.with_retry("block read", reg, |bus| bus.read_block(addr, reg, chunk)) {
                Ok(()) => {
                    log::debug!("Read {} bytes from register 0x{:02X}", len, reg);
                }
                Err(e) => {
                    log::warn!(
                        "Block read at register 0x{:02X} failed ({}); zero-filling {} bytes",
                        reg,
                        e,
                        len
                    );
                    chunk.fill(0);
                    missing.push(offset..offset + len);
                }
            }
        }

        Ok(BlockRead { data, missing })
    }

    /// Write a register and poll its read-back once per sub-attempt
    fn write_and_poll(
        &mut self,
        addr: u8,
        reg: u8,
        value: u16,
        expected: u16,
        width: Width,
    ) -> Result<Verification> {
        let polls = self.policy.max_sub_attempts();
        let delay = self.policy.attempt_delay();

        self.bus.write(addr, reg, width, value)?;

        let mut readback = 0;
        for poll in 1..=polls {
            readback = self.bus.read(addr, reg, width)?;
            if readback == expected {
                return Ok(Verification::Matched);
            }
            if poll < polls {
                self.bus.delay(delay);
            }
        }

        Ok(Verification::Mismatch { last: readback })
    }

    /// Run `op` until it succeeds or the policy's attempts are exhausted
    fn with_retry<T>(
        &mut self,
        what: &str,
        reg: u8,
        mut op: impl FnMut(&mut B) -> Result<T>,
    ) -> Result<T> {
        let max_attempts = self.policy.max_attempts();
        let mut attempt = 1;

        loop {
            match op(&mut self.bus) {
                Ok(value) => return Ok(value),
                Err(e) if attempt >= max_attempts => {
                    log::warn!(
                        "reg 0x{:02X}: {} failed after {} attempts: {}",
                        reg,
                        what,
                        max_attempts,
                        e
                    );
                    return Err(e);
                }
                Err(e) => {
                    log::warn!(
                        "reg 0x{:02X}: {} attempt {}/{} failed ({}), retrying",
                        reg,
                        what,
                        attempt,
                        max_attempts,
                        e
                    );
                    self.bus.delay(self.policy.attempt_delay());
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockBus, Op};

    fn channel(bus: MockBus, attempts: i64) -> RegisterChannel<MockBus> {
        RegisterChannel::new(bus, RetryPolicy::new(attempts, 10))
    }

    #[test]
    fn test_read_byte_retries_transient_failures() {
        let mut bus = MockBus::new();
        bus.set(0x10, 0x42);
        bus.fail_next_reads(2);
        let mut ch = channel(bus, 5);

        assert_eq!(ch.read_byte(0x17, 0x10), Ok(0x42));
        assert_eq!(ch.bus().count(|op| matches!(op, Op::ReadByte { .. })), 3);
        assert_eq!(ch.bus().slept, Duration::from_millis(20));
    }

    #[test]
    fn test_read_byte_propagates_final_failure() {
        let mut bus = MockBus::new();
        bus.fail_next_reads(u32::MAX);
        let mut ch = channel(bus, 4);

        assert_eq!(
            ch.read_byte(0x17, 0x10),
            Err(Error::Transport {
                addr: 0x17,
                reg: 0x10
            })
        );
        assert_eq!(ch.bus().count(|op| matches!(op, Op::ReadByte { .. })), 4);
    }

    #[test]
    fn test_write_verified_matches_on_nth_poll() {
        // 30 attempts -> 3 polls per write; the device converges on poll 3
        let mut bus = MockBus::new();
        bus.ack_after_polls(3);
        let mut ch = channel(bus, 30);

        let outcome = ch.write_verified(0x17, 0x3A, 0x55, 0x55, Width::Byte);
        assert_eq!(outcome, Ok(Verification::Matched));

        let bus = ch.bus();
        assert_eq!(bus.count(|op| matches!(op, Op::WriteByte { .. })), 1);
        assert_eq!(bus.count(|op| matches!(op, Op::ReadByte { .. })), 3);
        assert_eq!(bus.slept, Duration::from_millis(20));
    }

    #[test]
    fn test_write_verified_exhausts_polls_without_error() {
        let mut bus = MockBus::new();
        bus.never_ack(0x00);
        let mut ch = channel(bus, 20);

        let outcome = ch.write_verified(0x17, 0x3A, 0x55, 0x55, Width::Byte);
        assert_eq!(outcome, Ok(Verification::Mismatch { last: 0x00 }));

        let policy = *ch.policy();
        let bus = ch.bus();
        let polls = bus.count(|op| matches!(op, Op::ReadByte { .. }));
        assert_eq!(
            polls as u32,
            policy.max_attempts() * policy.max_sub_attempts()
        );
        assert_eq!(
            bus.count(|op| matches!(op, Op::WriteByte { .. })) as u32,
            policy.max_attempts()
        );
    }

    #[test]
    fn test_write_verified_resends_after_dropped_write() {
        let mut bus = MockBus::new();
        bus.fail_next_writes(1);
        let mut ch = channel(bus, 10);

        let outcome = ch.write_verified(0x17, 0x27, 0x1234, 0x1234, Width::Word);
        assert_eq!(outcome, Ok(Verification::Matched));
        assert_eq!(ch.bus().count(|op| matches!(op, Op::WriteWord { .. })), 2);
    }

    #[test]
    fn test_write_verified_persistent_transport_fault_is_error() {
        let mut bus = MockBus::new();
        bus.fail_next_writes(u32::MAX);
        let mut ch = channel(bus, 3);

        let outcome = ch.write_verified(0x17, 0x1D, 0x04, 0x00, Width::Byte);
        assert_eq!(
            outcome,
            Err(Error::Transport {
                addr: 0x17,
                reg: 0x1D
            })
        );
        assert_eq!(ch.bus().count(|op| matches!(op, Op::WriteByte { .. })), 3);
    }

    #[test]
    fn test_read_block_chunks_in_register_order() {
        let mut bus = MockBus::new();
        for reg in 0..54u8 {
            bus.set(reg, reg as u16);
        }
        let mut ch = channel(bus, 3);

        let block = ch.read_block(0x17, 0x00, 54).unwrap();
        assert!(block.is_complete());
        assert_eq!(block.data().len(), 54);
        assert!(block.data().iter().enumerate().all(|(i, &b)| b == i as u8));

        let reads: Vec<_> = ch
            .bus()
            .ops
            .iter()
            .filter_map(|op| match op {
                Op::ReadBlock { reg, len } => Some((*reg, *len)),
                _ => None,
            })
            .collect();
        assert_eq!(reads, vec![(0x00, 32), (0x20, 22)]);
    }

    #[test]
    fn test_read_block_zero_fills_failed_chunk() {
        let mut bus = MockBus::new();
        for reg in 0..40u8 {
            bus.set(reg, 0xEE);
        }
        bus.fail_block_at(0x20);
        let mut ch = channel(bus, 2);

        let block = ch.read_block(0x17, 0x00, 40).unwrap();
        assert!(!block.is_complete());
        assert_eq!(block.missing(), &[32..40]);
        assert!(block.data()[..32].iter().all(|&b| b == 0xEE));
        assert!(block.data()[32..].iter().all(|&b| b == 0x00));
    }

    #[test]
    fn test_read_chunk_propagates_persistent_failure() {
        let mut bus = MockBus::new();
        bus.fail_block_at(0x00);
        let mut ch = channel(bus, 3);

        let mut buf = [0u8; 8];
        assert_eq!(
            ch.read_chunk(0x17, 0x00, &mut buf),
            Err(Error::Transport {
                addr: 0x17,
                reg: 0x00
            })
        );
        assert_eq!(ch.bus().count(|op| matches!(op, Op::ReadBlock { .. })), 3);
    }

    #[test]
    fn test_write_then_stream_retries() {
        let mut bus = MockBus::new();
        bus.fail_next_writes(1);
        let mut ch = channel(bus, 3);

        ch.write_then_stream(0x17, 0x1D, 0x03, b"print(1)").unwrap();
        assert_eq!(
            ch.bus().count(|op| matches!(op, Op::WriteStream { reg: 0x1D, value: 0x03, len: 8 })),
            2
        );
    }

    #[test]
    fn test_read_block_rejects_range_past_register_space() {
        let mut ch = channel(MockBus::new(), 1);
        assert_eq!(
            ch.read_block(0x17, 0xF0, 32),
            Err(Error::InvalidLength { len: 32, max: 16 })
        );
        assert!(ch.bus().ops.is_empty());
    }
}
