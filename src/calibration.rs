//! Antenna tuning calibration
//!
//! The AS3935 antenna must resonate at 500 kHz ±3.5%. With the LCO routed
//! to IRQ and divided by 16 the pin toggles at 31.25 kHz, so a 100 ms
//! window at the right trim should hold [`TARGET_PULSES`] rising edges.
//! Calibration sweeps every trim value, counts edges through an
//! [`EdgeInterrupt`] handler and keeps the value closest to the target.

use core::cell::Cell;

use critical_section::Mutex;

/// Settle time after a trim or oscillator change, in milliseconds
pub const SETTLE_MS: u32 = 2;
/// Length of one pulse counting window, in milliseconds
pub const MEASUREMENT_WINDOW_MS: u32 = 100;
/// Settle time after the RC oscillator calibration command, in milliseconds
pub const RCO_CALIBRATION_MS: u32 = 3;
/// Expected pulses in one window: 500 kHz / 16 over 100 ms
pub const TARGET_PULSES: u32 = 3125;
/// Largest deviation from [`TARGET_PULSES`] inside the ±3.5% window
pub const TOLERANCE_PULSES: u32 = 109;
/// Number of trim capacitor settings
pub const TUNE_STEPS: usize = 16;

/// Rising edge counter shared with an interrupt handler
///
/// Every access runs inside a critical section, so a count is never torn
/// between the handler and the calibration loop.
pub struct PulseCounter {
    count: Mutex<Cell<u32>>,
}

impl PulseCounter {
    /// Create a counter at zero
    ///
    /// `const` so a handler that needs `'static` access can keep one in a
    /// `static`.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            count: Mutex::new(Cell::new(0)),
        }
    }

    /// Count one rising edge. Call this from the interrupt handler.
    pub fn record_pulse(&self) {
        critical_section::with(|cs| {
            let count = self.count.borrow(cs);
            count.set(count.get().wrapping_add(1));
        });
    }

    /// Reset the count to zero
    pub fn reset(&self) {
        critical_section::with(|cs| self.count.borrow(cs).set(0));
    }

    /// Current count
    #[must_use]
    pub fn count(&self) -> u32 {
        critical_section::with(|cs| self.count.borrow(cs).get())
    }

    /// Read the count and reset it to zero in one critical section
    pub fn take(&self) -> u32 {
        critical_section::with(|cs| self.count.borrow(cs).replace(0))
    }
}

impl core::fmt::Debug for PulseCounter {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PulseCounter")
            .field("count", &self.count())
            .finish()
    }
}

impl Default for PulseCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// Rising edge interrupt registration for the sensor's IRQ line
///
/// While attached, the implementor calls [`PulseCounter::record_pulse`] on
/// the given counter for every rising edge on `pin`. `'a` is the lifetime
/// of the calibration session owning the counter; the driver always
/// detaches before that session ends.
pub trait EdgeInterrupt<'a> {
    /// Start counting rising edges on `pin` into `counter`
    fn attach_rising(&mut self, pin: u8, counter: &'a PulseCounter);

    /// Stop counting on `pin`
    fn detach(&mut self, pin: u8);
}

impl<'a, T: EdgeInterrupt<'a> + ?Sized> EdgeInterrupt<'a> for &mut T {
    fn attach_rising(&mut self, pin: u8, counter: &'a PulseCounter) {
        T::attach_rising(self, pin, counter);
    }

    fn detach(&mut self, pin: u8) {
        T::detach(self, pin);
    }
}

/// Best-fit search over trim values
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Sweep {
    best: Option<(u8, u32)>,
    counts: [u32; TUNE_STEPS],
}

impl Sweep {
    /// Start an empty sweep
    #[must_use]
    pub const fn new() -> Self {
        Self {
            best: None,
            counts: [0; TUNE_STEPS],
        }
    }

    /// Record the pulse count measured at `tune`
    ///
    /// Only a strictly smaller deviation replaces the best so far, so ties
    /// keep the value recorded first.
    pub fn record(&mut self, tune: u8, count: u32) {
        if let Some(slot) = self.counts.get_mut(usize::from(tune)) {
            *slot = count;
        }
        let deviation = count.abs_diff(TARGET_PULSES);
        match self.best {
            Some((_, best)) if best <= deviation => {}
            _ => self.best = Some((tune, deviation)),
        }
    }

    /// Best trim value and its deviation, if anything was recorded
    #[must_use]
    pub const fn best(&self) -> Option<(u8, u32)> {
        self.best
    }

    /// Finish the sweep
    #[must_use]
    pub fn finish(self) -> CalibrationReport {
        let (tune, deviation) = self.best.unwrap_or((0, TARGET_PULSES));
        CalibrationReport {
            tune,
            deviation,
            counts: self.counts,
        }
    }
}

impl Default for Sweep {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of an antenna calibration
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CalibrationReport {
    /// Trim value applied to `TUN_CAP`
    pub tune: u8,
    /// Distance of the chosen trim's count from [`TARGET_PULSES`]
    pub deviation: u32,
    /// Pulse count measured at each trim value
    pub counts: [u32; TUNE_STEPS],
}

impl CalibrationReport {
    /// Whether the chosen trim is inside the ±3.5% tolerance
    ///
    /// The trim is applied either way; out of tolerance is advisory.
    #[must_use]
    pub const fn in_tolerance(&self) -> bool {
        self.deviation <= TOLERANCE_PULSES
    }
}
