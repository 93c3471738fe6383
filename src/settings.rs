//! Typed values for AS3935 register fields

/// Analog front-end gain boost
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AfeGain {
    /// Gain for a sensor placed indoors (`0b10010`)
    Indoor,
    /// Gain for a sensor placed outdoors (`0b01110`)
    Outdoor,
    /// Any other pattern found in the `AFE_GB` field
    Custom(u8),
}

impl AfeGain {
    /// Raw `AFE_GB` value for indoor use
    pub const INDOOR: u8 = 0x12;
    /// Raw `AFE_GB` value for outdoor use
    pub const OUTDOOR: u8 = 0x0E;
}

impl From<u8> for AfeGain {
    fn from(raw: u8) -> Self {
        match raw {
            Self::INDOOR => Self::Indoor,
            Self::OUTDOOR => Self::Outdoor,
            other => Self::Custom(other),
        }
    }
}

impl From<AfeGain> for u8 {
    fn from(gain: AfeGain) -> u8 {
        match gain {
            AfeGain::Indoor => AfeGain::INDOOR,
            AfeGain::Outdoor => AfeGain::OUTDOOR,
            AfeGain::Custom(raw) => raw,
        }
    }
}

/// Cause of the last IRQ, decoded from the `INT` field
///
/// The sensor clears the field when it is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InterruptSource {
    /// Distance estimation changed after statistics were purged
    DistancePurged,
    /// Noise level too high
    NoiseTooHigh,
    /// Disturber detected
    Disturber,
    /// Lightning interrupt
    Lightning,
    /// Undocumented bit pattern
    Unknown(u8),
}

impl From<u8> for InterruptSource {
    fn from(raw: u8) -> Self {
        match raw {
            0b0000 => Self::DistancePurged,
            0b0001 => Self::NoiseTooHigh,
            0b0100 => Self::Disturber,
            0b1000 => Self::Lightning,
            other => Self::Unknown(other),
        }
    }
}

/// Distance to the head of the storm
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Distance {
    /// Storm is out of range (`0x3F`)
    OutOfRange,
    /// Storm is overhead (`0x01`)
    Overhead,
    /// Estimated distance in kilometres
    Km(u8),
}

impl Distance {
    /// Raw distance value meaning out of range
    pub const OUT_OF_RANGE: u8 = 0x3F;
    /// Raw distance value meaning overhead
    pub const OVERHEAD: u8 = 0x01;
}

impl From<u8> for Distance {
    fn from(raw: u8) -> Self {
        match raw {
            Self::OUT_OF_RANGE => Self::OutOfRange,
            Self::OVERHEAD => Self::Overhead,
            km => Self::Km(km),
        }
    }
}

/// Frequency division ratio applied to the LCO before it is shown on IRQ
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum LcoDivider {
    /// Divide by 16 (default)
    Div16 = 0b00,
    /// Divide by 32
    Div32 = 0b01,
    /// Divide by 64
    Div64 = 0b10,
    /// Divide by 128
    Div128 = 0b11,
}

impl LcoDivider {
    /// Division ratio as a number
    #[must_use]
    pub const fn ratio(self) -> u16 {
        16 << (self as u16)
    }
}

impl From<u8> for LcoDivider {
    fn from(raw: u8) -> Self {
        match raw & 0b11 {
            0b00 => Self::Div16,
            0b01 => Self::Div32,
            0b10 => Self::Div64,
            _ => Self::Div128,
        }
    }
}

impl From<LcoDivider> for u8 {
    fn from(divider: LcoDivider) -> u8 {
        divider as u8
    }
}

/// Oscillator routed to the IRQ pin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OscillatorOutput {
    /// IRQ carries interrupts only
    None,
    /// Antenna LC oscillator, divided by [`LcoDivider`]
    Lco,
    /// System RC oscillator
    Srco,
    /// Timer RC oscillator
    Trco,
}

impl OscillatorOutput {
    /// Value of the three display bits, normalized to bit 0
    #[must_use]
    pub const fn bits(self) -> u8 {
        match self {
            Self::None => 0b000,
            Self::Lco => 0b100,
            Self::Srco => 0b010,
            Self::Trco => 0b001,
        }
    }
}

/// Sensitivity profile written by `configure`
///
/// Values wider than their field are truncated, not rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SensorConfig {
    /// AFE gain boost
    pub afe_gain: AfeGain,
    /// Noise floor level, 0-7
    pub noise_floor: u8,
    /// Watchdog threshold, 0-15
    pub watchdog_threshold: u8,
    /// Spike rejection, 0-15
    pub spike_rejection: u8,
    /// Minimum lightnings before an interrupt, 0-3 (1, 5, 9 or 16 events)
    pub minimum_lightnings: u8,
    /// Suppress disturber interrupts
    pub mask_disturbers: bool,
}

impl Default for SensorConfig {
    /// Power-on defaults of the chip
    fn default() -> Self {
        Self {
            afe_gain: AfeGain::Indoor,
            noise_floor: 0b010,
            watchdog_threshold: 0b0010,
            spike_rejection: 0b0010,
            minimum_lightnings: 0b00,
            mask_disturbers: false,
        }
    }
}
