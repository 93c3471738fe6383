//! Asynchronous driver for the AS3935 lightning sensor
//!
//! Same register semantics as [`crate::As3935`], on top of
//! `embedded-hal-async`. Settle times await the delay instead of blocking.

use embedded_hal_async::{delay::DelayNs, i2c::I2c};

use crate::{
    calibration::{
        CalibrationReport, EdgeInterrupt, MEASUREMENT_WINDOW_MS, PulseCounter,
        RCO_CALIBRATION_MS, SETTLE_MS, Sweep,
    },
    register::{DIRECT_COMMAND, Field, Register},
    settings::{AfeGain, Distance, InterruptSource, LcoDivider, OscillatorOutput, SensorConfig},
    utils,
};

const PRESET_DEFAULT_MS: u32 = 2;

/// AS3935 driver instance (asynchronous)
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct As3935Async<I2C> {
    i2c: I2C,
    address: u8,
    irq_pin: u8,
    tune: u8,
}

impl<I2C, E> As3935Async<I2C>
where
    I2C: I2c<Error = E>,
{
    /// Create a new AS3935 driver instance
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
    pub async fn read_register(&mut self, register: Register) -> Result<u8, E> {
        let mut data = [0u8; 1];
        self.i2c
            .write_read(self.address, &[register.into()], &mut data)
            .await?;

        #[cfg(feature = "defmt")]
        defmt::trace!("Register 0x{:02X} value: 0x{:02X}", u8::from(register), data[0]);

        Ok(data[0])
    }

    /// Write a whole register without reading it first
    ///
    /// # Errors
    ///
    /// Returns the bus error if the I2C transaction fails
    pub async fn write_register(&mut self, register: Register, value: u8) -> Result<(), E> {
        #[cfg(feature = "defmt")]
        defmt::trace!("Writing 0x{:02X} to register 0x{:02X}", value, u8::from(register));

        self.i2c
            .write(self.address, &[register.into(), value])
            .await
    }

    /// Read a field, normalized so its lowest bit is bit 0
    ///
    /// # Errors
    ///
    /// Returns the bus error if the I2C transaction fails
    pub async fn read_field(&mut self, field: Field) -> Result<u8, E> {
        let raw = self.read_register(field.register).await?;
        Ok(utils::extract_field(raw, field.mask))
    }

    /// Read-modify-write a field
    ///
    /// # Errors
    ///
    /// Returns the bus error if either I2C transaction fails
    pub async fn write_field(&mut self, field: Field, value: u8) -> Result<(), E> {
        let current = self.read_register(field.register).await?;
        let updated = utils::insert_field(current, field.mask, value);
        self.write_register(field.register, updated).await
    }

    /// Restore every register to its power-on default
    ///
    /// # Errors
    ///
    /// Returns the bus error if the I2C transaction fails
    pub async fn reset<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), E> {
        #[cfg(feature = "defmt")]
        defmt::debug!("Restoring register defaults");

        self.write_register(Register::PresetDefault, DIRECT_COMMAND)
            .await?;
        delay.delay_ms(PRESET_DEFAULT_MS).await;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns the bus error if the I2C transaction fails
    pub async fn calibrate_rco<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), E> {
        self.write_register(Register::CalibRco, DIRECT_COMMAND)
            .await?;
        delay.delay_ms(RCO_CALIBRATION_MS).await;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns the bus error if an I2C transaction fails
    pub async fn power_down(&mut self) -> Result<(), E> {
        self.write_field(Field::PWD, 1).await
    }

    /// Leave power-down mode and recalibrate the RC oscillators
    ///
    /// # Errors
    ///
    /// Returns the bus error if an I2C transaction fails
    pub async fn power_up<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), E> {
        self.write_field(Field::PWD, 0).await?;
        self.calibrate_rco(delay).await
    }

    /// # Errors
    ///
    /// Returns the bus error if the I2C transaction fails
    pub async fn is_powered_down(&mut self) -> Result<bool, E> {
        Ok(self.read_field(Field::PWD).await? != 0)
    }

    /// Last trim capacitance applied by [`Self::set_tune`] or calibration
    #[must_use]
    pub fn tune(&self) -> u8 {
        self.tune
    }

    /// Apply a trim capacitance value, then power the sensor up
    ///
    /// Only the low four bits are used, cached once the write succeeds.
    ///
    /// # Errors
    ///
    /// Returns the bus error if an I2C transaction fails
    pub async fn set_tune<D: DelayNs>(&mut self, tune: u8, delay: &mut D) -> Result<(), E> {
        #[cfg(feature = "defmt")]
        defmt::debug!("Setting tuning capacitors to {}", tune);

        let tune = tune & Field::TUN_CAP.max_value();
        self.write_field(Field::TUN_CAP, tune).await?;
        self.tune = tune;
        delay.delay_ms(SETTLE_MS).await;
        self.power_up(delay).await
    }

    /// # Errors
    ///
    /// Returns the bus error if the I2C transaction fails
    pub async fn interrupt_source_raw(&mut self) -> Result<u8, E> {
        self.read_field(Field::INT).await
    }

    /// # Errors
    ///
    /// Returns the bus error if the I2C transaction fails
    pub async fn interrupt_source(&mut self) -> Result<InterruptSource, E> {
        self.interrupt_source_raw().await.map(InterruptSource::from)
    }

    /// # Errors
    ///
    /// Returns the bus error if an I2C transaction fails
    pub async fn mask_disturbers(&mut self) -> Result<(), E> {
        self.write_field(Field::MASK_DIST, 1).await
    }

    /// # Errors
    ///
    /// Returns the bus error if an I2C transaction fails
    pub async fn unmask_disturbers(&mut self) -> Result<(), E> {
        self.write_field(Field::MASK_DIST, 0).await
    }

    /// # Errors
    ///
    /// Returns the bus error if the I2C transaction fails
    pub async fn disturbers_masked(&mut self) -> Result<bool, E> {
        Ok(self.read_field(Field::MASK_DIST).await? != 0)
    }

    /// # Errors
    ///
    /// Returns the bus error if the I2C transaction fails
    pub async fn minimum_lightnings(&mut self) -> Result<u8, E> {
        self.read_field(Field::MIN_NUM_LIGH).await
    }

    /// Set the minimum number of lightnings and return the value read back
    ///
    /// # Errors
    ///
    /// Returns the bus error if an I2C transaction fails
    pub async fn set_minimum_lightnings(&mut self, value: u8) -> Result<u8, E> {
        self.write_field(Field::MIN_NUM_LIGH, value).await?;
        self.minimum_lightnings().await
    }

    /// # Errors
    ///
    /// Returns the bus error if the I2C transaction fails
    pub async fn lightning_distance_km(&mut self) -> Result<u8, E> {
        self.read_field(Field::DISTANCE).await
    }

    /// # Errors
    ///
    /// Returns the bus error if the I2C transaction fails
    pub async fn lightning_distance(&mut self) -> Result<Distance, E> {
        self.lightning_distance_km().await.map(Distance::from)
    }

    /// Energy of the last lightning (21 bits, no physical unit)
    ///
    /// # Errors
    ///
    /// Returns the bus error if an I2C transaction fails
    pub async fn lightning_energy(&mut self) -> Result<u32, E> {
        let low = self.read_field(Field::S_LIG_L).await?;
        let mid = self.read_field(Field::S_LIG_M).await?;
        let high = self.read_field(Field::S_LIG_MM).await?;
        Ok(u32::from_le_bytes([low, mid, high, 0]))
    }

    /// # Errors
    ///
    /// Returns the bus error if an I2C transaction fails
    pub async fn set_indoors(&mut self) -> Result<(), E> {
        self.set_afe_gain(AfeGain::Indoor).await
    }

    /// # Errors
    ///
    /// Returns the bus error if an I2C transaction fails
    pub async fn set_outdoors(&mut self) -> Result<(), E> {
        self.set_afe_gain(AfeGain::Outdoor).await
    }

    /// Write the AFE gain boost field
    ///
    /// # Errors
    ///
    /// Returns the bus error if an I2C transaction fails
    pub async fn set_afe_gain(&mut self, gain: AfeGain) -> Result<(), E> {
        self.write_field(Field::AFE_GB, gain.into()).await
    }

    /// Current AFE gain boost setting
    ///
    /// # Errors
    ///
    /// Returns the bus error if the I2C transaction fails
    pub async fn afe_gain(&mut self) -> Result<AfeGain, E> {
        self.read_field(Field::AFE_GB).await.map(AfeGain::from)
    }

    /// # Errors
    ///
    /// Returns the bus error if the I2C transaction fails
    pub async fn noise_floor(&mut self) -> Result<u8, E> {
        self.read_field(Field::NF_LEV).await
    }

    /// # Errors
    ///
    /// Returns the bus error if an I2C transaction fails
    pub async fn set_noise_floor(&mut self, level: u8) -> Result<u8, E> {
        self.write_field(Field::NF_LEV, level).await?;
        self.noise_floor().await
    }

    /// # Errors
    ///
    /// Returns the bus error if the I2C transaction fails
    pub async fn spike_rejection(&mut self) -> Result<u8, E> {
        self.read_field(Field::SREJ).await
    }

    /// # Errors
    ///
    /// Returns the bus error if an I2C transaction fails
    pub async fn set_spike_rejection(&mut self, srej: u8) -> Result<u8, E> {
        self.write_field(Field::SREJ, srej).await?;
        self.spike_rejection().await
    }

    /// # Errors
    ///
    /// Returns the bus error if the I2C transaction fails
    pub async fn watchdog_threshold(&mut self) -> Result<u8, E> {
        self.read_field(Field::WDTH).await
    }

    /// # Errors
    ///
    /// Returns the bus error if an I2C transaction fails
    pub async fn set_watchdog_threshold(&mut self, wdth: u8) -> Result<u8, E> {
        self.write_field(Field::WDTH, wdth).await?;
        self.watchdog_threshold().await
    }

    /// Clear the lightning distance statistics (`CL_STAT` high-low-high)
    ///
    /// # Errors
    ///
    /// Returns the bus error if an I2C transaction fails
    pub async fn clear_statistics(&mut self) -> Result<(), E> {
        self.write_field(Field::CL_STAT, 1).await?;
        self.write_field(Field::CL_STAT, 0).await?;
        self.write_field(Field::CL_STAT, 1).await
    }

    /// Division ratio applied to the LCO on the IRQ pin
    ///
    /// # Errors
    ///
    /// Returns the bus error if the I2C transaction fails
    pub async fn lco_divider(&mut self) -> Result<LcoDivider, E> {
        self.read_field(Field::LCO_FDIV).await.map(LcoDivider::from)
    }

    /// Set the division ratio applied to the LCO on the IRQ pin
    ///
    /// # Errors
    ///
    /// Returns the bus error if an I2C transaction fails
    pub async fn set_lco_divider(&mut self, divider: LcoDivider) -> Result<(), E> {
        self.write_field(Field::LCO_FDIV, divider.into()).await
    }

    /// # Errors
    ///
    /// Returns the bus error if an I2C transaction fails
    pub async fn set_oscillator_output(&mut self, output: OscillatorOutput) -> Result<(), E> {
        self.write_field(Field::DISP_ALL, output.bits()).await
    }

    /// Apply a sensitivity profile, one field write per setting
    ///
    /// # Errors
    ///
    /// Returns the bus error if an I2C transaction fails
    pub async fn configure(&mut self, config: &SensorConfig) -> Result<(), E> {
        self.set_afe_gain(config.afe_gain).await?;
        self.write_field(Field::NF_LEV, config.noise_floor).await?;
        self.write_field(Field::WDTH, config.watchdog_threshold)
            .await?;
        self.write_field(Field::SREJ, config.spike_rejection).await?;
        self.write_field(Field::MIN_NUM_LIGH, config.minimum_lightnings)
            .await?;
        self.write_field(Field::MASK_DIST, u8::from(config.mask_disturbers))
            .await
    }

    /// Tune the antenna and report whether it landed inside ±3.5%
    ///
    /// # Errors
    ///
    /// Returns the bus error if an I2C transaction fails
    pub async fn calibrate<'c, IRQ, D>(
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
            .await
            .map(|report| report.in_tolerance())
    }

    /// Tune the antenna by sweeping every trim capacitor value
    ///
    /// See [`crate::As3935::calibrate_with_report`] for the procedure.
    ///
    /// # Errors
    ///
    /// Returns the bus error if an I2C transaction fails. The interrupt is
    /// detached before returning in every case.
    pub async fn calibrate_with_report<'c, IRQ, D>(
        &mut self,
        irq: &mut IRQ,
        counter: &'c PulseCounter,
        delay: &mut D,
    ) -> Result<CalibrationReport, E>
    where
        IRQ: EdgeInterrupt<'c>,
        D: DelayNs,
    {
        self.set_lco_divider(LcoDivider::Div16).await?;
        self.set_oscillator_output(OscillatorOutput::Lco).await?;

        irq.attach_rising(self.irq_pin, counter);
        let sweep = self.sweep(counter, delay).await;
        irq.detach(self.irq_pin);
        let report = sweep?.finish();

        self.write_field(Field::TUN_CAP, report.tune).await?;
        delay.delay_ms(SETTLE_MS).await;
        self.set_oscillator_output(OscillatorOutput::None).await?;
        self.calibrate_rco(delay).await?;
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

    async fn sweep<D: DelayNs>(
        &mut self,
        counter: &PulseCounter,
        delay: &mut D,
    ) -> Result<Sweep, E> {
        let mut sweep = Sweep::new();

        for tune in 0..=Field::TUN_CAP.max_value() {
            self.write_field(Field::TUN_CAP, tune).await?;
            delay.delay_ms(SETTLE_MS).await;
            counter.reset();
            delay.delay_ms(MEASUREMENT_WINDOW_MS).await;
            let count = counter.take();

            #[cfg(feature = "defmt")]
            defmt::debug!("Tune {}: {} pulses", tune, count);

            sweep.record(tune, count);
        }

        Ok(sweep)
    }
}
