//! Status command implementation

use upsctl_core::bus::RegisterBus;
use upsctl_core::channel::RegisterChannel;
use upsctl_core::regs::{Cr1, LedCtl, Sr1, Sr2};
use upsctl_core::status::{self, DeviceStatus};

/// Read the telemetry block and print it
pub fn run_status<B: RegisterBus>(
    channel: &mut RegisterChannel<B>,
    addr: u8,
) -> Result<(), Box<dyn std::error::Error>> {
    let reading = status::read_status(channel, addr)?;

    for range in &reading.missing {
        log::warn!(
            "Bytes 0x{:02X}..0x{:02X} could not be read and show as zero",
            range.start,
            range.end
        );
    }

    print_status(&reading.status);
    Ok(())
}

fn flag(set: bool) -> &'static str {
    if set {
        "yes"
    } else {
        "no"
    }
}

fn print_status(s: &DeviceStatus) {
    println!("WHO_AM_I:                 0x{:02X}", s.who_am_i);
    println!("Version:                  0x{:02X}", s.version);
    println!(
        "UUID:                     0x{:08X} 0x{:08X} 0x{:08X}",
        s.uuid[0], s.uuid[1], s.uuid[2]
    );
    println!("Output voltage:           {} mV", s.output_voltage);
    println!("Input voltage:            {} mV", s.input_voltage);
    println!("Battery voltage:          {} mV", s.battery_voltage);
    println!("MCU voltage:              {} mV", s.mcu_voltage);
    println!("Output current:           {} mA", s.output_current);
    println!("Input current:            {} mA", s.input_current);
    println!("Battery current:          {} mA", s.battery_current);
    println!("Temperature:              {} °C", s.temperature);

    println!("CR1:                      0x{:02X}", s.cr1.bits());
    println!("    Auto start            : {}", flag(s.cr1.contains(Cr1::AUTO_START)));
    println!("    Script loading        : {}", flag(s.cr1.contains(Cr1::PYTHON_LOAD)));
    println!("    Script running        : {}", flag(s.cr1.contains(Cr1::PYTHON_EXEC)));
    println!(
        "    Output readable       : {}",
        flag(s.cr1.contains(Cr1::PYTHON_READ_RETURN))
    );
    println!("CR2:                      0x{:02X}", s.cr2);

    println!("SR1:                      0x{:02X}", s.sr1.bits());
    println!(
        "    5V output             : {}",
        if s.sr1.contains(Sr1::OUTPUT_ON) { "on" } else { "off" }
    );
    println!(
        "    Charge mode           : {}",
        if s.sr1.contains(Sr1::SLOW_CHARGE) { "slow" } else { "fast" }
    );
    println!(
        "    Battery               : {}",
        if s.is_charging() { "charging" } else { "discharging" }
    );
    println!("    Input voltage low     : {}", flag(s.sr1.contains(Sr1::INPUT_LOW)));
    println!("    Output voltage low    : {}", flag(s.sr1.contains(Sr1::OUTPUT_LOW)));
    println!("    Battery voltage low   : {}", flag(s.sr1.contains(Sr1::BATTERY_LOW)));
    println!("    ADC error             : {}", flag(s.sr1.contains(Sr1::ADC_ERROR)));
    println!("    Battery fault         : {}", flag(s.sr1.contains(Sr1::BATTERY_FAULT)));

    println!("SR2:                      0x{:02X}", s.sr2.bits());
    println!(
        "    Script too large      : {}",
        flag(s.sr2.contains(Sr2::SCRIPT_TOO_LARGE))
    );

    println!("Battery protection:       {} mV", s.battery_protection_voltage);
    println!("Shutdown countdown:       {} s", s.shutdown_countdown);
    println!("Auto start voltage:       {} mV", s.auto_start_voltage);
    println!("Pending output:           {} B", s.output_len);
    println!("OTA request:              0x{:04X}", s.ota_request);
    println!("Runtime:                  {} ms", s.runtime);
    println!("Charge detect interval:   {} s", s.charge_detect_interval);

    println!("LED control:              0x{:02X}", s.led_ctl.bits());
    println!(
        "    On bus activity       : {}",
        flag(s.led_ctl.contains(LedCtl::I2C_ACTIVITY))
    );
    println!("    While charging        : {}", flag(s.led_ctl.contains(LedCtl::CHARGING)));
    println!(
        "    While discharging     : {}",
        flag(s.led_ctl.contains(LedCtl::DISCHARGING))
    );
    println!("    On fault              : {}", flag(s.led_ctl.contains(LedCtl::FAULT)));
    println!("    In normal operation   : {}", flag(s.led_ctl.contains(LedCtl::NORMAL)));
}
