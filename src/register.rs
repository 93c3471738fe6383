//! Register map for the AS3935 sensor.

/// Register addresses for AS3935
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
#[repr(u8)]
pub enum Register {
    /// AFE gain boost and power down
    AfeGain = 0x00,
    /// Noise floor level and watchdog threshold
    Threshold = 0x01,
    /// Statistics clear, minimum lightnings and spike rejection
    Lightning = 0x02,
    /// LCO divider, disturber mask and interrupt source
    Interrupt = 0x03,
    /// Energy of the single lightning, LSB
    EnergyLsb = 0x04,
    /// Energy of the single lightning, MSB
    EnergyMsb = 0x05,
    /// Energy of the single lightning, MMSB (5 bits)
    EnergyMmsb = 0x06,
    /// Distance estimation
    Distance = 0x07,
    /// Oscillator display on IRQ and tuning capacitors
    Tuning = 0x08,
    /// Direct command: restore all registers to their defaults
    PresetDefault = 0x3C,
    /// Direct command: calibrate the internal RC oscillators
    CalibRco = 0x3D,
}

impl From<Register> for u8 {
    fn from(reg: Register) -> u8 {
        reg as u8
    }
}

/// Value written to [`Register::PresetDefault`] and [`Register::CalibRco`]
/// to trigger the command
pub const DIRECT_COMMAND: u8 = 0x96;

/// A bit field inside a one-byte register
///
/// The mask must be a single contiguous run of bits. A zero mask stands
/// for the whole register with no field extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Field {
    /// Register holding the field
    pub register: Register,
    /// Bits of the register occupied by the field
    pub mask: u8,
}

impl Field {
    /// AFE gain boost (indoor / outdoor)
    pub const AFE_GB: Self = Self::new(Register::AfeGain, 0b0011_1110);
    /// Power down
    pub const PWD: Self = Self::new(Register::AfeGain, 0b0000_0001);
    /// Noise floor level
    pub const NF_LEV: Self = Self::new(Register::Threshold, 0b0111_0000);
    /// Watchdog threshold
    pub const WDTH: Self = Self::new(Register::Threshold, 0b0000_1111);
    /// Clear statistics
    pub const CL_STAT: Self = Self::new(Register::Lightning, 0b0100_0000);
    /// Minimum number of lightnings
    pub const MIN_NUM_LIGH: Self = Self::new(Register::Lightning, 0b0011_0000);
    /// Spike rejection
    pub const SREJ: Self = Self::new(Register::Lightning, 0b0000_1111);
    /// Frequency division ratio for antenna tuning
    pub const LCO_FDIV: Self = Self::new(Register::Interrupt, 0b1100_0000);
    /// Mask disturber events
    pub const MASK_DIST: Self = Self::new(Register::Interrupt, 0b0010_0000);
    /// Interrupt source
    pub const INT: Self = Self::new(Register::Interrupt, 0b0000_1111);
    /// Lightning energy, LSB
    pub const S_LIG_L: Self = Self::new(Register::EnergyLsb, 0b1111_1111);
    /// Lightning energy, MSB
    pub const S_LIG_M: Self = Self::new(Register::EnergyMsb, 0b1111_1111);
    /// Lightning energy, MMSB
    pub const S_LIG_MM: Self = Self::new(Register::EnergyMmsb, 0b0001_1111);
    /// Distance estimation in km
    pub const DISTANCE: Self = Self::new(Register::Distance, 0b0011_1111);
    /// Display LCO on IRQ pin
    pub const DISP_LCO: Self = Self::new(Register::Tuning, 0b1000_0000);
    /// Display SRCO on IRQ pin
    pub const DISP_SRCO: Self = Self::new(Register::Tuning, 0b0100_0000);
    /// Display TRCO on IRQ pin
    pub const DISP_TRCO: Self = Self::new(Register::Tuning, 0b0010_0000);
    /// Oscillator display bits as one group
    pub const DISP_ALL: Self = Self::new(Register::Tuning, 0b1110_0000);
    /// Internal tuning capacitors, 8 pF steps
    pub const TUN_CAP: Self = Self::new(Register::Tuning, 0b0000_1111);

    /// Describe the field occupying `mask` in `register`
    #[must_use]
    pub const fn new(register: Register, mask: u8) -> Self {
        Self { register, mask }
    }

    /// The whole of `register`, read and written as a raw byte
    #[must_use]
    pub const fn whole(register: Register) -> Self {
        Self { register, mask: 0 }
    }

    /// Largest value the field can hold once normalized
    #[must_use]
    pub const fn max_value(&self) -> u8 {
        crate::utils::extract_field(0xFF, self.mask)
    }
}
