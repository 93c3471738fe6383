//! Blocking driver for the AS3935 lightning sensor

use embedded_hal::{delay::DelayNs, i2c::I2c};

use crate::{
    calibration::{
        CalibrationReport, EdgeInterrupt, MEASUREMENT_WINDOW_MS, PulseCounter,
        RCO_CALIBRATION_MS, SETTLE_MS, Sweep,
    },
    register::{DIRECT_COMMAND, Field, Register},
    settings::{AfeGain, Distance, InterruptSource, LcoDivider, OscillatorOutput, SensorConfig},
    utils,
};

/// Settle time after restoring register defaults, in milliseconds
const PRESET_DEFAULT_MS: u32 = 2;

/// AS3935 driver instance (blocking)
///
/// Owns the I2C bus handle. The IRQ pin is only named here; registering a
/// handler on it is left to an [`EdgeInterrupt`] implementation.
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct As3935<I2C> {
    i2c: I2C,
    address: u8,
    irq_pin: u8,
    tune: u8,
}

impl<I2C, E> As3935<I2C>
where
    I2C: I2c<Error = E>,
{
    /// Create a new AS3935 driver instance
    ///
    /// `irq_pin` identifies the sensor's IRQ line to the interrupt
    /// controller, `address` is the 7-bit I2C address selected by the
    /// ADD0/ADD1 pins (see [`crate::ADDRESS_DEFAULT`]).
    pub fn new(i2c: I2C, irq_pin: u8, address: u8) -> Self {
        Self {
            i2c,
            address,
            irq_pin,
            tune: 0,
        }
    }

    /// Release the I2C bus, consuming the driver
    pub fn release(self) -> I2C {
        self.i2c
    }

    /// I2C address of the sensor
    #[must_use]
    pub fn address(&self) -> u8 {
        self.address
    }

    /// Interrupt pin index of the sensor's IRQ line
    #[must_use]
    pub fn irq_pin(&self) -> u8 {
        self.irq_pin
    }

    /// Read a whole register
    ///
    /// # Errors
    ///
    /// Returns the bus error if the I2C transaction fails
    pub fn read_register(&mut self, register: Register) -> Result<u8, E> {
        let mut data = [0u8; 1];
        self.i2c
            .write_read(self.address, &[register.into()], &mut data)?;

        #[cfg(feature = "defmt")]
        defmt::trace!("Register 0x{:02X} value: 0x{:02X}", u8::from(register), data[0]);

        Ok(data[0])
    }

    /// Write a whole register without reading it first
    ///
    /// This is how the direct commands are issued.
    ///
    /// # Errors
    ///
    /// Returns the bus error if the I2C transaction fails
    pub fn write_register(&mut self, register: Register, value: u8) -> Result<(), E> {
        #[cfg(feature = "defmt")]
        defmt::trace!("Writing 0x{:02X} to register 0x{:02X}", value, u8::from(register));

        self.i2c.write(self.address, &[register.into(), value])
    }

    /// Read a field, normalized so its lowest bit is bit 0
    ///
    /// One bus read. A zero mask returns the raw register byte.
    ///
    /// # Errors
    ///
    /// Returns the bus error if the I2C transaction fails
    pub fn read_field(&mut self, field: Field) -> Result<u8, E> {
        let raw = self.read_register(field.register)?;
        Ok(utils::extract_field(raw, field.mask))
    }

    /// Read-modify-write a field
    ///
    /// One bus read followed by one bus write. Bits outside the field keep
    /// their current value; a `value` wider than the field is truncated. A
    /// zero mask replaces the whole byte.
    ///
    /// # Errors
    ///
    /// Returns the bus error if either I2C transaction fails
    pub fn write_field(&mut self, field: Field, value: u8) -> Result<(), E> {
        let current = self.read_register(field.register)?;
        let updated = utils::insert_field(current, field.mask, value);
        self.write_register(field.register, updated)
    }

    /// Restore every register to its power-on default
    ///
    /// # Errors
    ///
    /// Returns the bus error if the I2C transaction fails
    pub fn reset<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), E> {
        #[cfg(feature = "defmt")]
        defmt::debug!("Restoring register defaults");

        self.write_register(Register::PresetDefault, DIRECT_COMMAND)?;
        delay.delay_ms(PRESET_DEFAULT_MS);
        Ok(())
    }

    /// Calibrate the internal RC oscillators (TRCO and SRCO)
    ///
    /// # Errors
    ///
    /// Returns the bus error if the I2C transaction fails
    pub fn calibrate_rco<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), E> {
        self.write_register(Register::CalibRco, DIRECT_COMMAND)?;
        delay.delay_ms(RCO_CALIBRATION_MS);
        Ok(())
    }

    /// Put the sensor into power-down mode
    ///
    /// # Errors
    ///
    /// Returns the bus error if the I2C transaction fails
    pub fn power_down(&mut self) -> Result<(), E> {
        self.write_field(Field::PWD, 1)
    }

    /// Leave power-down mode
    ///
    /// The RC oscillators must be recalibrated after power-down, so this
    /// also issues [`Self::calibrate_rco`].
    ///
    /// # Errors
    ///
    /// Returns the bus error if an I2C transaction fails
    pub fn power_up<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), E> {
        self.write_field(Field::PWD, 0)?;
        self.calibrate_rco(delay)
    }

    /// Whether the sensor is in power-down mode
    ///
    /// # Errors
    ///
    /// Returns the bus error if the I2C transaction fails
    pub fn is_powered_down(&mut self) -> Result<bool, E> {
        Ok(self.read_field(Field::PWD)? != 0)
    }

    /// Last trim capacitance applied by [`Self::set_tune`] or calibration
    #[must_use]
    pub fn tune(&self) -> u8 {
        self.tune
    }

    /// Apply a trim capacitance value (0-15, 8 pF per step)
    ///
    /// Only the low four bits are used. The value is cached once the write
    /// succeeds; then the oscillator settles and the sensor is powered up.
    ///
    /// # Errors
    ///
    /// Returns the bus error if an I2C transaction fails
    pub fn set_tune<D: DelayNs>(&mut self, tune: u8, delay: &mut D) -> Result<(), E> {
        #[cfg(feature = "defmt")]
        defmt::debug!("Setting tuning capacitors to {}", tune);

        let tune = tune & Field::TUN_CAP.max_value();
        self.write_field(Field::TUN_CAP, tune)?;
        self.tune = tune;
        delay.delay_ms(SETTLE_MS);
        self.power_up(delay)
    }

    /// Raw value of the interrupt source field
    ///
    /// The sensor clears the field when it is read. Wait 2 ms after the IRQ
    /// rises before calling this.
    ///
    /// # Errors
    ///
    /// Returns the bus error if the I2C transaction fails
    pub fn interrupt_source_raw(&mut self) -> Result<u8, E> {
        self.read_field(Field::INT)
    }

    /// Decoded interrupt source
    ///
    /// # Errors
    ///
    /// Returns the bus error if the I2C transaction fails
    pub fn interrupt_source(&mut self) -> Result<InterruptSource, E> {
        self.interrupt_source_raw().map(InterruptSource::from)
    }

    /// Stop reporting disturber events on IRQ
    ///
    /// # Errors
    ///
    /// Returns the bus error if an I2C transaction fails
    pub fn mask_disturbers(&mut self) -> Result<(), E> {
        self.write_field(Field::MASK_DIST, 1)
    }

    /// Report disturber events on IRQ
    ///
    /// # Errors
    ///
    /// Returns the bus error if an I2C transaction fails
    pub fn unmask_disturbers(&mut self) -> Result<(), E> {
        self.write_field(Field::MASK_DIST, 0)
    }

    /// Whether disturber events are masked
    ///
    /// # Errors
    ///
    /// Returns the bus error if the I2C transaction fails
    pub fn disturbers_masked(&mut self) -> Result<bool, E> {
        Ok(self.read_field(Field::MASK_DIST)? != 0)
    }

    /// Minimum number of lightnings field (0-3 for 1, 5, 9 or 16 events)
    ///
    /// # Errors
    ///
    /// Returns the bus error if the I2C transaction fails
    pub fn minimum_lightnings(&mut self) -> Result<u8, E> {
        self.read_field(Field::MIN_NUM_LIGH)
    }

    /// Set the minimum number of lightnings and return the value read back
    ///
    /// # Errors
    ///
    /// Returns the bus error if an I2C transaction fails
    pub fn set_minimum_lightnings(&mut self, value: u8) -> Result<u8, E> {
        self.write_field(Field::MIN_NUM_LIGH, value)?;
        self.minimum_lightnings()
    }

    /// Raw distance estimate in km
    ///
    /// # Errors
    ///
    /// Returns the bus error if the I2C transaction fails
    pub fn lightning_distance_km(&mut self) -> Result<u8, E> {
        self.read_field(Field::DISTANCE)
    }

    /// Decoded distance estimate
    ///
    /// # Errors
    ///
    /// Returns the bus error if the I2C transaction fails
    pub fn lightning_distance(&mut self) -> Result<Distance, E> {
        self.lightning_distance_km().map(Distance::from)
    }

    /// Energy of the last lightning (21 bits, no physical unit)
    ///
    /// # Errors
    ///
    /// Returns the bus error if an I2C transaction fails
    pub fn lightning_energy(&mut self) -> Result<u32, E> {
        let low = self.read_field(Field::S_LIG_L)?;
        let mid = self.read_field(Field::S_LIG_M)?;
        let high = self.read_field(Field::S_LIG_MM)?;
        Ok(u32::from_le_bytes([low, mid, high, 0]))
    }

    /// Configure the analog front end for indoor use
    ///
    /// # Errors
    ///
    /// Returns the bus error if an I2C transaction fails
    pub fn set_indoors(&mut self) -> Result<(), E> {
        self.set_afe_gain(AfeGain::Indoor)
    }

    /// Configure the analog front end for outdoor use
    ///
    /// # Errors
    ///
    /// Returns the bus error if an I2C transaction fails
    pub fn set_outdoors(&mut self) -> Result<(), E> {
        self.set_afe_gain(AfeGain::Outdoor)
    }

    /// Write the AFE gain boost field
    ///
    /// # Errors
    ///
    /// Returns the bus error if an I2C transaction fails
    pub fn set_afe_gain(&mut self, gain: AfeGain) -> Result<(), E> {
        self.write_field(Field::AFE_GB, gain.into())
    }

    /// Current AFE gain boost setting
    ///
    /// # Errors
    ///
    /// Returns the bus error if the I2C transaction fails
    pub fn afe_gain(&mut self) -> Result<AfeGain, E> {
        self.read_field(Field::AFE_GB).map(AfeGain::from)
    }

    /// Noise floor level (0-7)
    ///
    /// # Errors
    ///
    /// Returns the bus error if the I2C transaction fails
    pub fn noise_floor(&mut self) -> Result<u8, E> {
        self.read_field(Field::NF_LEV)
    }

    /// Set the noise floor level and return the value read back
    ///
    /// # Errors
    ///
    /// Returns the bus error if an I2C transaction fails
    pub fn set_noise_floor(&mut self, level: u8) -> Result<u8, E> {
        self.write_field(Field::NF_LEV, level)?;
        self.noise_floor()
    }

    /// Spike rejection (0-15)
    ///
    /// # Errors
    ///
    /// Returns the bus error if the I2C transaction fails
    pub fn spike_rejection(&mut self) -> Result<u8, E> {
        self.read_field(Field::SREJ)
    }

    /// Set spike rejection and return the value read back
    ///
    /// # Errors
    ///
    /// Returns the bus error if an I2C transaction fails
    pub fn set_spike_rejection(&mut self, srej: u8) -> Result<u8, E> {
        self.write_field(Field::SREJ, srej)?;
        self.spike_rejection()
    }

    /// Watchdog threshold (0-15)
    ///
    /// # Errors
    ///
    /// Returns the bus error if the I2C transaction fails
    pub fn watchdog_threshold(&mut self) -> Result<u8, E> {
        self.read_field(Field::WDTH)
    }

    /// Set the watchdog threshold and return the value read back
    ///
    /// # Errors
    ///
    /// Returns the bus error if an I2C transaction fails
    pub fn set_watchdog_threshold(&mut self, wdth: u8) -> Result<u8, E> {
        self.write_field(Field::WDTH, wdth)?;
        self.watchdog_threshold()
    }

    /// Clear the lightning distance statistics
    ///
    /// The chip clears on a high-low-high toggle of `CL_STAT`.
    ///
    /// # Errors
    ///
    /// Returns the bus error if an I2C transaction fails
    pub fn clear_statistics(&mut self) -> Result<(), E> {
        self.write_field(Field::CL_STAT, 1)?;
        self.write_field(Field::CL_STAT, 0)?;
        self.write_field(Field::CL_STAT, 1)
    }

    /// Division ratio applied to the LCO on the IRQ pin
    ///
    /// # Errors
    ///
    /// Returns the bus error if the I2C transaction fails
    pub fn lco_divider(&mut self) -> Result<LcoDivider, E> {
        self.read_field(Field::LCO_FDIV).map(LcoDivider::from)
    }

    /// Set the division ratio applied to the LCO on the IRQ pin
    ///
    /// # Errors
    ///
    /// Returns the bus error if an I2C transaction fails
    pub fn set_lco_divider(&mut self, divider: LcoDivider) -> Result<(), E> {
        self.write_field(Field::LCO_FDIV, divider.into())
    }

    /// Route one oscillator (or none) to the IRQ pin
    ///
    /// # Errors
    ///
    /// Returns the bus error if an I2C transaction fails
    pub fn set_oscillator_output(&mut self, output: OscillatorOutput) -> Result<(), E> {
        self.write_field(Field::DISP_ALL, output.bits())
    }

    /// Apply a sensitivity profile, one field write per setting
    ///
    /// # Errors
    ///
    /// Returns the bus error if an I2C transaction fails
    pub fn configure(&mut self, config: &SensorConfig) -> Result<(), E> {
        #[cfg(feature = "defmt")]
        defmt::debug!("Applying {}", config);

        self.set_afe_gain(config.afe_gain)?;
        self.write_field(Field::NF_LEV, config.noise_floor)?;
        self.write_field(Field::WDTH, config.watchdog_threshold)?;
        self.write_field(Field::SREJ, config.spike_rejection)?;
        self.write_field(Field::MIN_NUM_LIGH, config.minimum_lightnings)?;
        self.write_field(Field::MASK_DIST, u8::from(config.mask_disturbers))
    }

    /// Tune the antenna and report whether it landed inside ±3.5%
    ///
    /// See [`Self::calibrate_with_report`].
    ///
    /// # Errors
    ///
    /// Returns the bus error if an I2C transaction fails
    pub fn calibrate<'c, IRQ, D>(
        &mut self,
        irq: &mut IRQ,
        counter: &'c PulseCounter,
        delay: &mut D,
    ) -> Result<bool, E>
    where
        IRQ: EdgeInterrupt<'c>,
        D: DelayNs,
    {
        self.calibrate_with_report(irq, counter, delay)
            .map(|report| report.in_tolerance())
    }

    /// Tune the antenna by sweeping every trim capacitor value
    ///
    /// Routes the LCO divided by 16 to IRQ, counts rising edges into
    /// `counter` for 100 ms at each trim value, and applies the value whose
    /// count is closest to the target. The best value is applied and cached
    /// even when it is out of tolerance. Finishes with an RC oscillator
    /// calibration. Blocks for roughly 1.7 s.
    ///
    /// # Errors
    ///
    /// Returns the bus error if an I2C transaction fails. The interrupt is
    /// detached before returning in every case.
    pub fn calibrate_with_report<'c, IRQ, D>(
        &mut self,
        irq: &mut IRQ,
        counter: &'c PulseCounter,
        delay: &mut D,
    ) -> Result<CalibrationReport, E>
    where
        IRQ: EdgeInterrupt<'c>,
        D: DelayNs,
    {
        self.set_lco_divider(LcoDivider::Div16)?;
        self.set_oscillator_output(OscillatorOutput::Lco)?;

        irq.attach_rising(self.irq_pin, counter);
        let sweep = self.sweep(counter, delay);
        irq.detach(self.irq_pin);
        let report = sweep?.finish();

        self.write_field(Field::TUN_CAP, report.tune)?;
        delay.delay_ms(SETTLE_MS);
        self.set_oscillator_output(OscillatorOutput::None)?;
        self.calibrate_rco(delay)?;
        self.tune = report.tune;

        #[cfg(feature = "defmt")]
        {
            if report.in_tolerance() {
                defmt::info!(
                    "Antenna tuned to {} (deviation {})",
                    report.tune,
                    report.deviation
                );
            } else {
                defmt::warn!(
                    "Antenna out of tolerance, best tune {} (deviation {})",
                    report.tune,
                    report.deviation
                );
            }
        }

        Ok(report)
    }

    fn sweep<D: DelayNs>(&mut self, counter: &PulseCounter, delay: &mut D) -> Result<Sweep, E> {
        let mut sweep = Sweep::new();

        for tune in 0..=Field::TUN_CAP.max_value() {
            self.write_field(Field::TUN_CAP, tune)?;
            delay.delay_ms(SETTLE_MS);
            counter.reset();
            delay.delay_ms(MEASUREMENT_WINDOW_MS);
            let count = counter.take();

            #[cfg(feature = "defmt")]
            defmt::debug!("Tune {}: {} pulses", tune, count);

            sweep.record(tune, count);
        }

        Ok(sweep)
    }
}
