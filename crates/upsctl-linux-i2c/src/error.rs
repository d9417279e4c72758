//! Error types for Linux I2C operations

use thiserror::Error;

/// Linux I2C specific errors
#[derive(Debug, Error)]
pub enum LinuxI2cError {
    /// Failed to open device
    #[error("Failed to open {path}: {source}")]
    OpenFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to query adapter functionality
    #[error("Failed to query adapter functionality: {0}")]
    FunctionalityFailed(#[source] std::io::Error),

    /// Adapter lacks a transaction type the protocol needs
    #[error("Adapter does not support {0}")]
    Unsupported(&'static str),

    /// Failed to select the slave address
    #[error("Failed to select slave address 0x{addr:02X}: {source}")]
    SetAddressFailed {
        addr: u8,
        #[source]
        source: std::io::Error,
    },

    /// SMBus transaction failed
    #[error("SMBus {kind} at 0x{addr:02X} register 0x{reg:02X} failed: {source}")]
    TransferFailed {
        kind: &'static str,
        addr: u8,
        reg: u8,
        #[source]
        source: std::io::Error,
    },

    /// Block transfer longer than SMBus allows
    #[error("Block length {0} exceeds the SMBus limit of 32 bytes")]
    BlockTooLong(usize),

    /// Message longer than an I2C_RDWR segment can carry
    #[error("Message length {0} exceeds the I2C limit of 65535 bytes")]
    MessageTooLong(usize),

    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Device not specified
    #[error("No device specified. Use dev=/dev/i2c-N or bus=N")]
    NoDevice,
}

/// Result type for Linux I2C operations
pub type Result<T> = std::result::Result<T, LinuxI2cError>;
