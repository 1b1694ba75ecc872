//! Device configuration
//!
//! The tables below are generated by build.rs from device.toml, which is
//! validated at compile time. Edit device.toml and rebuild to change the
//! parameter set, telemetry channels or profiles.

use cardash_core::{ParamDef, ParamKind, ParamValue, Profile, TelemetryDef};
use cardash_hal::uart::{DataBits, Parity, StopBits};
use cardash_hal::UartConfig;
use embassy_rp::uart;

/// What a telemetry channel samples
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Source {
    /// VSYS rail through the on-board 1/3 divider (GPIO29)
    Vsys,
    /// RP2040 internal temperature sensor
    CoreTemp,
    /// Seconds since boot
    Uptime,
}

include!(concat!(env!("OUT_DIR"), "/device_config.rs"));

/// Convert the configured line settings to the RP2040 UART config
pub fn uart_config(config: &UartConfig) -> uart::Config {
    let mut out = uart::Config::default();
    out.baudrate = config.baudrate;
    out.data_bits = match config.data_bits {
        DataBits::Seven => uart::DataBits::DataBits7,
        DataBits::Eight => uart::DataBits::DataBits8,
    };
    out.parity = match config.parity {
        Parity::None => uart::Parity::ParityNone,
        Parity::Even => uart::Parity::ParityEven,
        Parity::Odd => uart::Parity::ParityOdd,
    };
    out.stop_bits = match config.stop_bits {
        StopBits::One => uart::StopBits::STOP1,
        StopBits::Two => uart::StopBits::STOP2,
    };
    out
}
