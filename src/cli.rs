//! CLI argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Parse a string as a hex or decimal u8
fn parse_hex_u8(s: &str) -> Result<u8, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u8::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u8>().map_err(|e| format!("Invalid number: {}", e))
    }
}

#[derive(Parser)]
#[command(name = "upsctl")]
#[command(author, version, about = "UPS HAT script loader and monitor", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Bus to use: linux_i2c:dev=/dev/i2c-N, linux_i2c:bus=N or dummy
    #[arg(short, long, global = true, default_value = "linux_i2c:dev=/dev/i2c-1")]
    pub bus: String,

    /// Slave address of the UPS microcontroller
    #[arg(short, long, global = true, default_value = "0x17", value_parser = parse_hex_u8)]
    pub addr: u8,

    /// Attempts per bus transaction (values below 1 count as 1)
    #[arg(long, global = true, default_value_t = 30, allow_negative_numbers = true)]
    pub max_retry: i64,

    /// Delay between attempts in milliseconds (values below 1 count as 1)
    #[arg(long, global = true, default_value_t = 10, allow_negative_numbers = true)]
    pub retry_delay: i64,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Upload a script and start it
    Upload {
        /// Script file (at most 4096 bytes)
        file: PathBuf,

        /// Read the script output after it has run
        #[arg(short, long)]
        read: bool,

        /// Time to let the script run before reading its output
        #[arg(long, default_value_t = 1000, requires = "read")]
        wait_ms: u64,

        /// Load the script in one combined transfer (needs plain I2C support)
        #[arg(long)]
        bulk: bool,
    },

    /// Read and clear the captured script output
    ReadOutput {
        /// Stream the output with block reads instead of byte by byte
        #[arg(long)]
        bulk: bool,
    },

    /// Show the telemetry status block
    Status,

    /// Reboot the device into its bootloader
    EnableOta,

    /// Write a firmware image through the bootloader and boot it
    FlashFirmware {
        /// Encrypted application image
        file: PathBuf,

        /// Slave address of the bootloader
        #[arg(long, default_value = "0x18", value_parser = parse_hex_u8)]
        boot_addr: u8,

        /// Request OTA mode at --addr first
        #[arg(long)]
        enable_ota: bool,
    },

    /// List available buses
    ListBuses,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_u8() {
        assert_eq!(parse_hex_u8("0x17"), Ok(0x17));
        assert_eq!(parse_hex_u8("0X2a"), Ok(0x2A));
        assert_eq!(parse_hex_u8("23"), Ok(23));
        assert!(parse_hex_u8("0x100").is_err());
        assert!(parse_hex_u8("bus").is_err());
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["upsctl", "status"]).unwrap();
        assert_eq!(cli.bus, "linux_i2c:dev=/dev/i2c-1");
        assert_eq!(cli.addr, 0x17);
        assert_eq!(cli.max_retry, 30);
        assert_eq!(cli.retry_delay, 10);
        assert!(matches!(cli.command, Commands::Status));
    }

    #[test]
    fn test_negative_retry_values_accepted() {
        let cli = Cli::try_parse_from([
            "upsctl",
            "--max-retry",
            "-5",
            "--retry-delay",
            "0",
            "read-output",
        ])
        .unwrap();
        assert_eq!(cli.max_retry, -5);
        assert_eq!(cli.retry_delay, 0);
    }

    #[test]
    fn test_upload_args() {
        let cli =
            Cli::try_parse_from(["upsctl", "-b", "dummy", "upload", "main.py", "--read"]).unwrap();
        match cli.command {
            Commands::Upload {
                file,
                read,
                wait_ms,
                bulk,
            } => {
                assert_eq!(file, PathBuf::from("main.py"));
                assert!(read);
                assert_eq!(wait_ms, 1000);
                assert!(!bulk);
            }
            _ => panic!("expected upload"),
        }
    }

    #[test]
    fn test_bulk_flags() {
        let cli = Cli::try_parse_from(["upsctl", "upload", "main.py", "--bulk"]).unwrap();
        assert!(matches!(cli.command, Commands::Upload { bulk: true, .. }));

        let cli = Cli::try_parse_from(["upsctl", "read-output", "--bulk"]).unwrap();
        assert!(matches!(cli.command, Commands::ReadOutput { bulk: true }));
    }

    #[test]
    fn test_flash_firmware_args() {
        let cli = Cli::try_parse_from(["upsctl", "flash-firmware", "app.bin"]).unwrap();
        match cli.command {
            Commands::FlashFirmware {
                file,
                boot_addr,
                enable_ota,
            } => {
                assert_eq!(file, PathBuf::from("app.bin"));
                assert_eq!(boot_addr, 0x18);
                assert!(!enable_ota);
            }
            _ => panic!("expected flash-firmware"),
        }

        let cli = Cli::try_parse_from([
            "upsctl",
            "flash-firmware",
            "app.bin",
            "--boot-addr",
            "0x19",
            "--enable-ota",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Commands::FlashFirmware {
                boot_addr: 0x19,
                enable_ota: true,
                ..
            }
        ));
    }

    #[test]
    fn test_cli_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
