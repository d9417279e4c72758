//! Bus registration and dispatch
//!
//! This module provides a registry of the transports compiled into the
//! binary and opens them from a bus string.

use thiserror::Error;
use upsctl_core::bus::RegisterBus;

/// Information about a bus
pub struct BusInfo {
    /// Primary name (used for matching)
    pub name: &'static str,
    /// Alternative names/aliases
    pub aliases: &'static [&'static str],
    /// Short description
    pub description: &'static str,
}

/// Errors raised while selecting or opening a bus
#[derive(Debug, Error)]
pub enum BusError {
    /// Bus string names no compiled-in transport
    #[error("Unknown bus: {name}\n\n{help}\nUse 'upsctl list-buses' for more details")]
    Unknown { name: String, help: String },

    /// Malformed bus parameter
    #[error("Invalid parameter format: '{0}' (expected key=value)")]
    InvalidParameter(String),

    /// Transport-specific option error
    #[error("Invalid {bus} parameters: {message}")]
    InvalidOptions { bus: &'static str, message: String },

    /// Transport failed to open
    #[error("Failed to open {bus}: {message}")]
    Open { bus: &'static str, message: String },
}

/// Get information about all available buses (enabled at compile time)
#[allow(unused_mut, clippy::vec_init_then_push)]
pub fn available_buses() -> Vec<BusInfo> {
    let mut buses = Vec::new();

    #[cfg(feature = "linux-i2c")]
    buses.push(BusInfo {
        name: "linux_i2c",
        aliases: &["linux-i2c", "i2c"],
        description: "Linux i2c-dev interface (dev=/dev/i2c-N or bus=N)",
    });

    #[cfg(feature = "dummy")]
    buses.push(BusInfo {
        name: "dummy",
        aliases: &[],
        description: "Emulated UPS for testing (latency=<reads>,fail_every=<n>,output=<text>,\
                      bootloader=<bool>,busy_polls=<n>)",
    });

    buses
}

/// Generate help text listing all available buses
pub fn bus_help() -> String {
    let buses = available_buses();

    if buses.is_empty() {
        return "No buses available (recompile with bus features enabled)".to_string();
    }

    let mut help = String::from("Available buses:\n");
    for b in &buses {
        help.push_str(&format!("  {:12} - {}\n", b.name, b.description));
    }
    help
}

/// Parsed bus parameters
#[derive(Debug, PartialEq, Eq)]
pub struct BusParams {
    /// Bus name as given
    pub name: String,
    /// Key-value parameters, in order
    pub params: Vec<(String, String)>,
}

impl BusParams {
    /// Parameters as borrowed pairs, the form transport crates take
    pub fn options(&self) -> Vec<(&str, &str)> {
        self.params
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect()
    }

    #[allow(dead_code)] // Used in feature-gated code
    fn get(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Parse a bus string into name and parameters
///
/// Format: "name" or "name:key1=value1,key2=value2"
pub fn parse_bus_params(s: &str) -> Result<BusParams, BusError> {
    let (name, opts_str) = s.split_once(':').unwrap_or((s, ""));

    let mut params = Vec::new();
    if !opts_str.is_empty() {
        for opt in opts_str.split(',') {
            let (key, value) = opt
                .split_once('=')
                .ok_or_else(|| BusError::InvalidParameter(opt.to_string()))?;
            params.push((key.to_string(), value.to_string()));
        }
    }

    Ok(BusParams {
        name: name.to_string(),
        params,
    })
}

/// Open a bus from its bus string
pub fn open_bus(bus: &str) -> Result<Box<dyn RegisterBus>, BusError> {
    let params = parse_bus_params(bus)?;

    match params.name.as_str() {
        #[cfg(feature = "linux-i2c")]
        "linux_i2c" | "linux-i2c" | "i2c" => open_linux_i2c(&params),

        #[cfg(feature = "dummy")]
        "dummy" => open_dummy(&params),

        _ => Err(BusError::Unknown {
            name: params.name.clone(),
            help: bus_help(),
        }),
    }
}

#[cfg(feature = "linux-i2c")]
fn open_linux_i2c(params: &BusParams) -> Result<Box<dyn RegisterBus>, BusError> {
    use upsctl_linux_i2c::{parse_options, LinuxI2c};

    let config = parse_options(&params.options()).map_err(|message| BusError::InvalidOptions {
        bus: "linux_i2c",
        message,
    })?;

    log::info!("Opening Linux I2C bus {}...", config.device);

    let i2c = LinuxI2c::open(&config).map_err(|e| BusError::Open {
        bus: "linux_i2c",
        message: format!(
            "{}\nMake sure i2c-dev is loaded and you have read/write permissions.\n\
             You may need to: sudo usermod -aG i2c $USER",
            e
        ),
    })?;

    Ok(Box::new(i2c))
}

#[cfg(feature = "dummy")]
fn open_dummy(params: &BusParams) -> Result<Box<dyn RegisterBus>, BusError> {
    use upsctl_dummy::{parse_options, DummyUps};

    let config = parse_options(&params.options()).map_err(|message| BusError::InvalidOptions {
        bus: "dummy",
        message,
    })?;

    let ups = match params.get("output") {
        Some(text) => DummyUps::with_output(config, text.as_bytes()),
        None => DummyUps::new(config),
    };

    log::info!("Using emulated UPS");
    Ok(Box::new(ups))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bus_params() {
        let params = parse_bus_params("linux_i2c:dev=/dev/i2c-3").unwrap();
        assert_eq!(params.name, "linux_i2c");
        assert_eq!(params.options(), vec![("dev", "/dev/i2c-3")]);

        let params = parse_bus_params("dummy").unwrap();
        assert_eq!(params.name, "dummy");
        assert!(params.params.is_empty());
    }

    #[test]
    fn test_parse_bus_params_rejects_bare_option() {
        assert!(matches!(
            parse_bus_params("linux_i2c:dev"),
            Err(BusError::InvalidParameter(opt)) if opt == "dev"
        ));
    }

    #[test]
    fn test_unknown_bus() {
        assert!(matches!(
            open_bus("spidev:dev=/dev/spidev0.0"),
            Err(BusError::Unknown { name, .. }) if name == "spidev"
        ));
    }

    #[cfg(feature = "dummy")]
    #[test]
    fn test_open_dummy_with_output() {
        use upsctl_core::channel::RegisterChannel;
        use upsctl_core::drain::read_output;
        use upsctl_core::progress::NoProgress;
        use upsctl_core::regs::DEFAULT_ADDRESS;
        use upsctl_core::retry::RetryPolicy;

        let bus = open_bus("dummy:latency=1,output=hi").unwrap();
        let mut channel = RegisterChannel::new(bus, RetryPolicy::default());
        let output = read_output(&mut channel, DEFAULT_ADDRESS, &mut NoProgress).unwrap();
        assert_eq!(output.text(), "hi");
    }

    #[cfg(feature = "dummy")]
    #[test]
    fn test_open_dummy_bad_option() {
        assert!(matches!(
            open_bus("dummy:latency=soon"),
            Err(BusError::InvalidOptions { bus: "dummy", .. })
        ));
    }
}
