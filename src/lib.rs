//! Driver for the AS3935 Franklin lightning sensor over I2C
//!
//! Every setting is a bit field in a one-byte register; [`Field`] names the
//! register and mask, and the drivers read or read-modify-write it. The
//! antenna tuning procedure in [`calibration`] counts LCO pulses on the IRQ
//! pin through an [`EdgeInterrupt`] supplied by the application.

#![no_std]
#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]

pub mod calibration;
mod driver;
mod driver_async;
pub mod register;
pub mod settings;
mod utils;

pub use calibration::{CalibrationReport, EdgeInterrupt, PulseCounter};
pub use driver::As3935;
pub use driver_async::As3935Async;
pub use register::{Field, Register};
pub use settings::{
    AfeGain, Distance, InterruptSource, LcoDivider, OscillatorOutput, SensorConfig,
};
pub use utils::{extract_field, insert_field, lowest_set_bit_position};

/// I2C address with ADD0 and ADD1 both pulled high
pub const ADDRESS_DEFAULT: u8 = 0x03;
/// I2C address with ADD0 high and ADD1 low
pub const ADDRESS_ADD0: u8 = 0x01;
/// I2C address with ADD1 high and ADD0 low
pub const ADDRESS_ADD1: u8 = 0x02;
