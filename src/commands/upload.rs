//! Upload command implementation

use std::fs;
use std::path::Path;
use std::thread;
use std::time::Duration;

use upsctl_core::bus::RegisterBus;
use upsctl_core::channel::RegisterChannel;
use upsctl_core::regs::MAX_PAYLOAD_LEN;
use upsctl_core::upload;

use super::output::run_read_output;
use super::progress::IndicatifProgress;

/// Read a script file, rejecting it if the device cannot hold it
pub fn load_script(path: &Path) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let script = fs::read(path).map_err(|e| format!("Failed to read {:?}: {}", path, e))?;

    if script.len() > MAX_PAYLOAD_LEN {
        return Err(format!(
            "{:?} is {} bytes, the device holds at most {} bytes",
            path,
            script.len(),
            MAX_PAYLOAD_LEN
        )
        .into());
    }

    log::info!("Read {} bytes from {:?}", script.len(), path);
    Ok(script)
}

/// How `run_upload` sends the script and what it does afterwards
#[derive(Debug, Clone, Copy)]
pub struct UploadOptions {
    /// Print the script output once it has run
    pub read: bool,
    /// Time to let the script run before reading
    pub wait: Duration,
    /// Use the combined-transfer loader and the output stream
    pub bulk: bool,
}

/// Upload `script`, start it and optionally print its output
pub fn run_upload<B: RegisterBus>(
    channel: &mut RegisterChannel<B>,
    addr: u8,
    script: &[u8],
    options: UploadOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut progress = IndicatifProgress::new();
    let report = if options.bulk {
        upload::bulk_load_and_execute(channel, addr, script, &mut progress)?
    } else {
        upload::upload_and_execute(channel, addr, script, &mut progress)?
    };

    println!(
        "Uploaded {} bytes, script started (CR1 0x{:02X} -> 0x{:02X})",
        report.bytes,
        report.cr1_before.bits(),
        report.cr1_written.bits()
    );

    if options.read {
        log::info!("Waiting {} ms for the script to run", options.wait.as_millis());
        thread::sleep(options.wait);
        run_read_output(channel, addr, options.bulk)?;
    }

    Ok(())
}
