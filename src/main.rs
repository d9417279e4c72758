//! upsctl - Script loader and monitor for the UPS HAT
//!
//! The UPS microcontroller hosts a small script interpreter reachable over
//! SMBus. upsctl pushes scripts to it, starts them, drains their output and
//! reads the telemetry block.
//!
//! # Architecture
//!
//! Every command runs over a `RegisterChannel` from `upsctl-core`, which
//! owns the bus selected with `--bus` and applies one retry policy to every
//! transaction:
//! - **linux_i2c** - `/dev/i2c-N` through the kernel SMBus ioctl
//! - **dummy** - an in-memory emulation of the firmware

mod buses;
mod cli;
mod commands;

use std::time::Duration;

use clap::Parser;
use cli::{Cli, Commands};
use log::LevelFilter;
use upsctl_core::channel::RegisterChannel;
use upsctl_core::retry::RetryPolicy;

/// Log level for the number of `-v` flags
fn log_level(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

fn logger(verbose: u8) -> env_logger::Builder {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(log_level(verbose));
    builder
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // RUST_LOG still overrides the level picked with -v
    logger(cli.verbose).parse_default_env().init();

    if let Commands::ListBuses = cli.command {
        commands::list_buses();
        return Ok(());
    }

    // Reject a bad script or image before touching the bus
    let payload = match &cli.command {
        Commands::Upload { file, .. } => Some(commands::load_script(file)?),
        Commands::FlashFirmware { file, .. } => Some(commands::load_image(file)?),
        _ => None,
    };

    let policy = RetryPolicy::new(cli.max_retry, cli.retry_delay);
    log::debug!(
        "Retry policy: {} attempts, {:?} delay, {} polls per write",
        policy.max_attempts(),
        policy.attempt_delay(),
        policy.max_sub_attempts()
    );

    let bus = buses::open_bus(&cli.bus)?;
    let mut channel = RegisterChannel::new(bus, policy);
    let addr = cli.addr;

    match cli.command {
        Commands::Upload {
            read,
            wait_ms,
            bulk,
            ..
        } => commands::run_upload(
            &mut channel,
            addr,
            payload.as_deref().unwrap_or_default(),
            commands::UploadOptions {
                read,
                wait: Duration::from_millis(wait_ms),
                bulk,
            },
        ),
        Commands::ReadOutput { bulk } => commands::run_read_output(&mut channel, addr, bulk),
        Commands::Status => commands::run_status(&mut channel, addr),
        Commands::EnableOta => commands::run_enable_ota(&mut channel, addr),
        Commands::FlashFirmware {
            boot_addr,
            enable_ota,
            ..
        } => commands::run_flash_firmware(
            &mut channel,
            addr,
            boot_addr,
            payload.as_deref().unwrap_or_default(),
            enable_ota,
        ),
        Commands::ListBuses => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_sets_level() {
        assert_eq!(logger(0).build().filter(), LevelFilter::Info);
        assert_eq!(logger(1).build().filter(), LevelFilter::Debug);
        assert_eq!(logger(2).build().filter(), LevelFilter::Trace);
        assert_eq!(logger(5).build().filter(), LevelFilter::Trace);
    }

    #[test]
    fn test_filter_spec_overrides_verbosity() {
        let logger = logger(0).parse_filters("upsctl_core=trace").build();
        assert_eq!(logger.filter(), LevelFilter::Trace);
    }
}
