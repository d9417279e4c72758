//! Captured output readback
//!
//! Output printed by a script is buffered on the device. The host drains it
//! with the same pointer convention used for uploads: select byte `i` by
//! writing `i | 0x8000` to [`OUTPUT_PTR`] (acknowledged with the
//! complement), then read it from [`POP`]. Writing [`OUTPUT_CLEAR`] to the
//! pointer register empties the buffer.
//!
//! [`read_output_bulk`] reads the same buffer through [`OUTPUT_STREAM`] in
//! block transactions while CR1 has the read-return flag set.

use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use crate::bus::{RegisterBus, Width, MAX_BLOCK_LEN};
use crate::channel::{RegisterChannel, Verification};
use crate::error::{Error, Result};
use crate::progress::TransferProgress;
use crate::regs::{
    pointer_ack, pointer_value, Cr1, CR1, OUTPUT_CLEAR, OUTPUT_CLEAR_ACK, OUTPUT_LEN, OUTPUT_PTR,
    OUTPUT_STREAM, POP,
};
use crate::upload::verify_identity;

/// Longest output the pointer protocol can drain
///
/// Offset `0x7FFF` would encode as `0xFFFF`, which the device takes as
/// [`OUTPUT_CLEAR`], so the last selectable offset is `0x7FFE`.
pub const MAX_OUTPUT_LEN: usize = 0x7FFF;

/// Output drained from the device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrainedOutput {
    bytes: Vec<u8>,
    clear_error: Option<Error>,
}

impl DrainedOutput {
    /// The drained bytes, in device order
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consume the output, returning the bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Render the bytes as characters, one per byte, in device order
    pub fn text(&self) -> String {
        self.bytes.iter().map(|&b| char::from(b)).collect()
    }

    /// Whether the device buffer was left empty
    ///
    /// An empty drain never touches the buffer and counts as cleared.
    pub fn is_cleared(&self) -> bool {
        self.clear_error.is_none()
    }

    /// Why the buffer could not be cleared, if it could not
    ///
    /// This does not invalidate [`bytes`](Self::bytes).
    pub fn clear_error(&self) -> Option<Error> {
        self.clear_error
    }
}

/// Drain the captured output buffer of the device at `addr`
///
/// Verifies the device identity, reads the pending length, then pops each
/// byte. After a non-empty drain the buffer is cleared; a failed clear is
/// reported through [`DrainedOutput::clear_error`] rather than as an error.
///
/// # Errors
///
/// - [`Error::DeviceIdentityMismatch`] if the device does not identify itself
/// - [`Error::InvalidLength`] if the reported length exceeds the pointer range
/// - [`Error::OutputPointerFailed`] if a byte could not be selected; bytes
///   already popped are discarded
/// - [`Error::TransferInterrupted`] if the bus failed persistently while
///   selecting or popping a byte
/// - [`Error::Transport`] if the bus failed persistently otherwise
pub fn read_output<B: RegisterBus, P: TransferProgress>(
    channel: &mut RegisterChannel<B>,
    addr: u8,
    progress: &mut P,
) -> Result<DrainedOutput> {
    verify_identity(channel, addr)?;

    let expected_length = channel.read_word(addr, OUTPUT_LEN)?;
    log::info!("Output length: {} bytes", expected_length);

    if expected_length == 0 {
        return Ok(DrainedOutput {
            bytes: Vec::new(),
            clear_error: None,
        });
    }

    if expected_length as usize > MAX_OUTPUT_LEN {
        return Err(Error::InvalidLength {
            len: expected_length as usize,
            max: MAX_OUTPUT_LEN,
        });
    }

    progress.draining(expected_length as usize);

    let mut collected = Vec::with_capacity(expected_length as usize);
    for index in 0..expected_length {
        let byte = select_output_byte(channel, addr, index)
            .and_then(|()| channel.read_byte(addr, POP))
            .map_err(|e| e.at_index(index))?;
        collected.push(byte);
        progress.drain_progress(collected.len());
    }

    Ok(finish_drain(channel, addr, collected, progress))
}

/// Drain the captured output through the output stream register
///
/// Reads the pending length, sets [`Cr1::PYTHON_READ_RETURN`], reads the
/// output from [`OUTPUT_STREAM`] in transactions of at most
/// [`MAX_BLOCK_LEN`] bytes and writes the original CR1 back. The buffer is
/// then cleared as in [`read_output`]. CR1 is restored even when the read
/// fails; if the restore itself fails the buffer is left uncleared.
///
/// # Errors
///
/// - [`Error::DeviceIdentityMismatch`] if the device does not identify itself
/// - [`Error::TransferInterrupted`] if a block read failed persistently
/// - [`Error::Transport`] if CR1 could not be read, set or restored
pub fn read_output_bulk<B: RegisterBus, P: TransferProgress>(
    channel: &mut RegisterChannel<B>,
    addr: u8,
    progress: &mut P,
) -> Result<DrainedOutput> {
    verify_identity(channel, addr)?;

    let expected_length = channel.read_word(addr, OUTPUT_LEN)? as usize;
    log::info!("Output length: {} bytes", expected_length);

    if expected_length == 0 {
        return Ok(DrainedOutput {
            bytes: Vec::new(),
            clear_error: None,
        });
    }

    let original = channel.read_byte(addr, CR1)?;
    let streaming = Cr1::from_bits_retain(original) | Cr1::PYTHON_READ_RETURN;
    channel.write_byte(addr, CR1, streaming.bits())?;

    progress.draining(expected_length);
    let streamed = read_stream(channel, addr, expected_length, progress);

    let restored = channel.write_byte(addr, CR1, original);
    if let Err(e) = &restored {
        log::error!("Failed to restore CR1 to 0x{:02X}: {}", original, e);
    }

    let collected = streamed?;
    restored?;

    Ok(finish_drain(channel, addr, collected, progress))
}

fn read_stream<B: RegisterBus, P: TransferProgress>(
    channel: &mut RegisterChannel<B>,
    addr: u8,
    len: usize,
    progress: &mut P,
) -> Result<Vec<u8>> {
    let mut collected = vec![0u8; len];
    let mut done = 0;

    for chunk in collected.chunks_mut(MAX_BLOCK_LEN) {
        // len came from a 16-bit register
        channel
            .read_chunk(addr, OUTPUT_STREAM, chunk)
            .map_err(|e| e.at_index(done as u16))?;
        done += chunk.len();
        progress.drain_progress(done);
    }

    Ok(collected)
}

/// Clear the device buffer and wrap up the drained bytes
fn finish_drain<B: RegisterBus, P: TransferProgress>(
    channel: &mut RegisterChannel<B>,
    addr: u8,
    collected: Vec<u8>,
    progress: &mut P,
) -> DrainedOutput {
    let clear_error = match clear_output(channel, addr) {
        Ok(()) => None,
        Err(e) => {
            log::warn!("Output drained but buffer not cleared: {}", e);
            Some(e)
        }
    };

    progress.complete();

    DrainedOutput {
        bytes: collected,
        clear_error,
    }
}

/// Empty the device's output buffer
///
/// # Errors
///
/// - [`Error::OutputClearFailed`] if the clear was never acknowledged
/// - [`Error::Transport`] if the bus failed persistently
pub fn clear_output<B: RegisterBus>(channel: &mut RegisterChannel<B>, addr: u8) -> Result<()> {
    let outcome =
        channel.write_verified(addr, OUTPUT_PTR, OUTPUT_CLEAR, OUTPUT_CLEAR_ACK, Width::Word)?;
    match outcome {
        Verification::Matched => {
            log::debug!("Output buffer cleared");
            Ok(())
        }
        Verification::Mismatch { last } => Err(Error::OutputClearFailed { actual: last }),
    }
}

fn select_output_byte<B: RegisterBus>(
    channel: &mut RegisterChannel<B>,
    addr: u8,
    index: u16,
) -> Result<()> {
    let pointer = pointer_value(index);
    let ack = pointer_ack(pointer);

    match channel.write_verified(addr, OUTPUT_PTR, pointer, ack, Width::Word)? {
        Verification::Matched => Ok(()),
        Verification::Mismatch { last } => {
            log::error!("Failed to set output pointer to 0x{:04X}", pointer);
            Err(Error::OutputPointerFailed {
                index,
                expected: ack,
                actual: last,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockBus, Op};
    use crate::progress::NoProgress;
    use crate::regs::{DEFAULT_ADDRESS, DEVICE_SIGNATURE, WHO_AM_I};
    use crate::retry::RetryPolicy;
    use alloc::vec;

    fn output_ack(reg: u8, _previous: u16, value: u16) -> u16 {
        match (reg, value) {
            (OUTPUT_PTR, OUTPUT_CLEAR) => OUTPUT_CLEAR_ACK,
            (OUTPUT_PTR, _) => pointer_ack(value),
            _ => value,
        }
    }

    fn device(output_len: u16) -> MockBus {
        let mut bus = MockBus::new();
        bus.set(WHO_AM_I, DEVICE_SIGNATURE as u16);
        bus.set(OUTPUT_LEN, output_len);
        bus.with_ack(output_ack);
        bus
    }

    fn channel(bus: MockBus) -> RegisterChannel<MockBus> {
        RegisterChannel::new(bus, RetryPolicy::new(10, 1))
    }

    #[test]
    fn test_empty_output_touches_no_pointer() {
        let mut ch = channel(device(0));

        let output = read_output(&mut ch, DEFAULT_ADDRESS, &mut NoProgress).unwrap();
        assert!(output.bytes().is_empty());
        assert!(output.is_cleared());
        assert_eq!(
            ch.bus().ops,
            vec![
                Op::ReadByte { reg: WHO_AM_I },
                Op::ReadWord { reg: OUTPUT_LEN }
            ]
        );
    }

    #[test]
    fn test_drain_selects_pops_then_clears() {
        let mut bus = device(3);
        bus.set(POP, b'x' as u16);
        let mut ch = channel(bus);

        let output = read_output(&mut ch, DEFAULT_ADDRESS, &mut NoProgress).unwrap();
        assert_eq!(output.text(), "xxx");
        assert!(output.is_cleared());

        let traffic: Vec<_> = ch
            .bus()
            .ops
            .iter()
            .filter(|op| matches!(op, Op::WriteWord { .. } | Op::ReadByte { reg: POP }))
            .copied()
            .collect();
        assert_eq!(
            traffic,
            vec![
                Op::WriteWord { reg: OUTPUT_PTR, value: 0x8000 },
                Op::ReadByte { reg: POP },
                Op::WriteWord { reg: OUTPUT_PTR, value: 0x8001 },
                Op::ReadByte { reg: POP },
                Op::WriteWord { reg: OUTPUT_PTR, value: 0x8002 },
                Op::ReadByte { reg: POP },
                Op::WriteWord { reg: OUTPUT_PTR, value: OUTPUT_CLEAR },
            ]
        );
    }

    #[test]
    fn test_identity_mismatch() {
        let mut bus = device(5);
        bus.set(WHO_AM_I, 0x00);
        let mut ch = channel(bus);

        assert_eq!(
            read_output(&mut ch, DEFAULT_ADDRESS, &mut NoProgress),
            Err(Error::DeviceIdentityMismatch {
                expected: 0xA6,
                actual: 0x00
            })
        );
        assert_eq!(ch.bus().ops.len(), 1);
    }

    #[test]
    fn test_pointer_failure_discards_output() {
        let mut bus = device(3);
        bus.with_ack(|reg, _, value| match reg {
            OUTPUT_PTR if value == 0x8001 => 0x1234,
            OUTPUT_PTR => pointer_ack(value),
            _ => value,
        });
        let mut ch = channel(bus);

        assert_eq!(
            read_output(&mut ch, DEFAULT_ADDRESS, &mut NoProgress),
            Err(Error::OutputPointerFailed {
                index: 1,
                expected: 0x7FFE,
                actual: 0x1234
            })
        );
    }

    #[test]
    fn test_failed_clear_keeps_output() {
        let mut bus = device(2);
        bus.set(POP, b'o' as u16);
        // Pointer acks work, the clear command is never acknowledged
        bus.with_ack(|reg, _, value| match reg {
            OUTPUT_PTR => pointer_ack(value),
            _ => value,
        });
        let mut ch = channel(bus);

        let output = read_output(&mut ch, DEFAULT_ADDRESS, &mut NoProgress).unwrap();
        assert_eq!(output.bytes(), b"oo");
        assert_eq!(output.text(), "oo");
        assert!(!output.is_cleared());
        assert_eq!(
            output.clear_error(),
            Some(Error::OutputClearFailed { actual: 0x0000 })
        );
    }

    #[test]
    fn test_oversized_length_rejected() {
        let mut ch = channel(device(0x8000));

        assert_eq!(
            read_output(&mut ch, DEFAULT_ADDRESS, &mut NoProgress),
            Err(Error::InvalidLength {
                len: 0x8000,
                max: MAX_OUTPUT_LEN
            })
        );
        assert!(!ch
            .bus()
            .ops
            .iter()
            .any(|op| matches!(op, Op::WriteWord { .. })));
    }

    #[test]
    fn test_longest_output_is_drained() {
        let len = MAX_OUTPUT_LEN as u16;
        let mut bus = device(len);
        bus.set(POP, b'z' as u16);
        let mut ch = channel(bus);

        let output = read_output(&mut ch, DEFAULT_ADDRESS, &mut NoProgress).unwrap();
        assert_eq!(output.bytes().len(), MAX_OUTPUT_LEN);
        assert!(output.is_cleared());

        let pointers: Vec<u16> = ch
            .bus()
            .ops
            .iter()
            .filter_map(|op| match op {
                Op::WriteWord {
                    reg: OUTPUT_PTR,
                    value,
                } => Some(*value),
                _ => None,
            })
            .collect();
        assert_eq!(pointers[pointers.len() - 2..], [0xFFFE, OUTPUT_CLEAR]);
    }

    #[test]
    fn test_offset_past_limit_encodes_clear() {
        assert_ne!(pointer_value((MAX_OUTPUT_LEN - 1) as u16), OUTPUT_CLEAR);
        assert_eq!(pointer_value(MAX_OUTPUT_LEN as u16), OUTPUT_CLEAR);
    }

    #[test]
    fn test_transport_fault_carries_byte_index() {
        // The pointer for byte 0 goes through, the one for byte 1 does not
        let mut bus = device(3);
        bus.fail_writes_after(1);
        let mut ch = RegisterChannel::new(bus, RetryPolicy::new(3, 1));

        assert_eq!(
            read_output(&mut ch, DEFAULT_ADDRESS, &mut NoProgress),
            Err(Error::TransferInterrupted {
                index: 1,
                addr: DEFAULT_ADDRESS,
                reg: OUTPUT_PTR
            })
        );
        assert!(!ch.bus().ops.contains(&Op::WriteWord {
            reg: OUTPUT_PTR,
            value: OUTPUT_CLEAR
        }));
    }

    fn streaming_device(output: &[u8]) -> MockBus {
        let mut bus = device(output.len() as u16);
        bus.set(CR1, 0x01);
        bus.with_stream(OUTPUT_STREAM, output);
        bus
    }

    #[test]
    fn test_bulk_drain_streams_then_restores_cr1() {
        let text: Vec<u8> = (0..40).map(|i| b'a' + (i % 26) as u8).collect();
        let mut ch = channel(streaming_device(&text));

        let output = read_output_bulk(&mut ch, DEFAULT_ADDRESS, &mut NoProgress).unwrap();
        assert_eq!(output.bytes(), &text[..]);
        assert!(output.is_cleared());

        let traffic: Vec<_> = ch
            .bus()
            .ops
            .iter()
            .filter(|op| {
                matches!(
                    op,
                    Op::WriteByte { .. } | Op::WriteWord { .. } | Op::ReadBlock { .. }
                )
            })
            .copied()
            .collect();
        assert_eq!(
            traffic,
            vec![
                Op::WriteByte { reg: CR1, value: 0x09 },
                Op::ReadBlock { reg: OUTPUT_STREAM, len: 32 },
                Op::ReadBlock { reg: OUTPUT_STREAM, len: 8 },
                Op::WriteByte { reg: CR1, value: 0x01 },
                Op::WriteWord { reg: OUTPUT_PTR, value: OUTPUT_CLEAR },
            ]
        );
    }

    #[test]
    fn test_bulk_drain_restores_cr1_after_failed_read() {
        let mut bus = streaming_device(b"lost");
        bus.fail_block_at(OUTPUT_STREAM);
        let mut ch = RegisterChannel::new(bus, RetryPolicy::new(2, 1));

        assert_eq!(
            read_output_bulk(&mut ch, DEFAULT_ADDRESS, &mut NoProgress),
            Err(Error::TransferInterrupted {
                index: 0,
                addr: DEFAULT_ADDRESS,
                reg: OUTPUT_STREAM
            })
        );
        let ops = &ch.bus().ops;
        assert_eq!(ops.last(), Some(&Op::WriteByte { reg: CR1, value: 0x01 }));
        assert!(!ops.iter().any(|op| matches!(op, Op::WriteWord { .. })));
    }

    #[test]
    fn test_bulk_drain_empty_leaves_cr1_alone() {
        let mut ch = channel(streaming_device(b""));

        let output = read_output_bulk(&mut ch, DEFAULT_ADDRESS, &mut NoProgress).unwrap();
        assert!(output.bytes().is_empty());
        assert!(!ch
            .bus()
            .ops
            .iter()
            .any(|op| matches!(op, Op::WriteByte { .. } | Op::ReadByte { reg: CR1 })));
    }

    #[test]
    fn test_text_maps_bytes_to_chars() {
        let output = DrainedOutput {
            bytes: vec![72, 105, 0xB0],
            clear_error: None,
        };
        assert_eq!(output.text(), "Hi\u{B0}");
    }
}
