//! Read-output command implementation

use std::io::Write;

use upsctl_core::bus::RegisterBus;
use upsctl_core::channel::RegisterChannel;
use upsctl_core::drain;

use super::progress::IndicatifProgress;

/// Drain the captured script output and print it
///
/// With `bulk` the output is streamed with block reads.
pub fn run_read_output<B: RegisterBus>(
    channel: &mut RegisterChannel<B>,
    addr: u8,
    bulk: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut progress = IndicatifProgress::new();
    let output = if bulk {
        drain::read_output_bulk(channel, addr, &mut progress)?
    } else {
        drain::read_output(channel, addr, &mut progress)?
    };

    if output.bytes().is_empty() {
        println!("No output pending");
        return Ok(());
    }

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(output.text().as_bytes())?;
    if !output.bytes().ends_with(b"\n") {
        writeln!(stdout)?;
    }
    stdout.flush()?;

    if let Some(e) = output.clear_error() {
        log::warn!("Output buffer was not cleared ({}); it will be read again", e);
    }

    Ok(())
}
