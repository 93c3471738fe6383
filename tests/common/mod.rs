//! Simulated AS3935 for tests: a register file behind I2C, a delay that
//! advances simulated time, and an IRQ line that emits LCO pulses.

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use as3935::{ADDRESS_DEFAULT, EdgeInterrupt, PulseCounter};
use embedded_hal::i2c::{ErrorKind, ErrorType, NoAcknowledgeSource, Operation};

/// Bus operation seen by the simulator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusOp {
    Read { register: u8, value: u8 },
    Write { register: u8, value: u8 },
}

#[derive(Debug)]
struct State<'a> {
    registers: [u8; 0x40],
    pointer: u8,
    ops: Vec<BusOp>,
    delays_ms: Vec<u32>,
    pulses_per_tune: [u32; 16],
    counter: Option<&'a PulseCounter>,
    attached_pin: Option<u8>,
    attach_calls: usize,
    detach_calls: usize,
    fail_after: Option<usize>,
}

/// Shared handle to the simulated sensor
#[derive(Debug, Clone)]
pub struct Simulator<'a> {
    state: Rc<RefCell<State<'a>>>,
}

impl<'a> Simulator<'a> {
    pub fn new() -> Self {
        let mut registers = [0u8; 0x40];
        // power-on defaults
        registers[0x00] = 0x24;
        registers[0x01] = 0x22;
        registers[0x02] = 0xC2;
        registers[0x07] = 0x3F;
        Self {
            state: Rc::new(RefCell::new(State {
                registers,
                pointer: 0,
                ops: Vec::new(),
                delays_ms: Vec::new(),
                pulses_per_tune: [0; 16],
                counter: None,
                attached_pin: None,
                attach_calls: 0,
                detach_calls: 0,
                fail_after: None,
            })),
        }
    }

    /// Pulses the IRQ line produces in one 100 ms window at each trim value
    pub fn with_pulses(self, pulses_per_tune: [u32; 16]) -> Self {
        self.state.borrow_mut().pulses_per_tune = pulses_per_tune;
        self
    }

    /// Fail every bus operation after `ops` successful ones
    pub fn fail_after(&self, ops: usize) {
        self.state.borrow_mut().fail_after = Some(ops);
    }

    pub fn bus(&self) -> SimBus<'a> {
        SimBus(self.clone())
    }

    pub fn delay(&self) -> SimDelay<'a> {
        SimDelay(self.clone())
    }

    pub fn irq(&self) -> SimIrq<'a> {
        SimIrq(self.clone())
    }

    pub fn register(&self, register: u8) -> u8 {
        self.state.borrow().registers[usize::from(register)]
    }

    pub fn set_register(&self, register: u8, value: u8) {
        self.state.borrow_mut().registers[usize::from(register)] = value;
    }

    pub fn ops(&self) -> Vec<BusOp> {
        self.state.borrow().ops.clone()
    }

    pub fn writes(&self) -> Vec<(u8, u8)> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                BusOp::Write { register, value } => Some((register, value)),
                BusOp::Read { .. } => None,
            })
            .collect()
    }

    pub fn delays_ms(&self) -> Vec<u32> {
        self.state.borrow().delays_ms.clone()
    }

    pub fn attach_calls(&self) -> usize {
        self.state.borrow().attach_calls
    }

    pub fn detach_calls(&self) -> usize {
        self.state.borrow().detach_calls
    }

    pub fn attached_pin(&self) -> Option<u8> {
        self.state.borrow().attached_pin
    }

    fn transfer(&self, address: u8, operations: &mut [Operation<'_>]) -> Result<(), ErrorKind> {
        let mut state = self.state.borrow_mut();
        if address != ADDRESS_DEFAULT {
            return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
        }
        for operation in operations {
            if state.fail_after.is_some_and(|limit| state.ops.len() >= limit) {
                return Err(ErrorKind::Other);
            }
            match operation {
                Operation::Write(bytes) => {
                    let Some((&register, data)) = bytes.split_first() else {
                        continue;
                    };
                    state.pointer = register;
                    for &value in data {
                        let register = state.pointer;
                        state.registers[usize::from(register)] = value;
                        state.ops.push(BusOp::Write { register, value });
                        state.pointer = register.wrapping_add(1) & 0x3F;
                    }
                }
                Operation::Read(buffer) => {
                    for byte in buffer.iter_mut() {
                        let register = state.pointer;
                        let value = state.registers[usize::from(register)];
                        *byte = value;
                        state.ops.push(BusOp::Read { register, value });
                        state.pointer = register.wrapping_add(1) & 0x3F;
                    }
                }
            }
        }
        Ok(())
    }

    fn elapse_ms(&self, ms: u32) {
        let mut state = self.state.borrow_mut();
        state.delays_ms.push(ms);
        let lco_on_irq = state.registers[0x08] & 0x80 != 0;
        let tune = usize::from(state.registers[0x08] & 0x0F);
        if let (Some(counter), true) = (state.counter, lco_on_irq) {
            // pulses scale with the window; settle delays see a few
            let pulses = state.pulses_per_tune[tune] * ms / 100;
            for _ in 0..pulses {
                counter.record_pulse();
            }
        }
    }
}

pub struct SimBus<'a>(Simulator<'a>);

impl ErrorType for SimBus<'_> {
    type Error = ErrorKind;
}

impl embedded_hal::i2c::I2c for SimBus<'_> {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        self.0.transfer(address, operations)
    }
}

impl embedded_hal_async::i2c::I2c for SimBus<'_> {
    async fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        self.0.transfer(address, operations)
    }
}

pub struct SimDelay<'a>(Simulator<'a>);

impl embedded_hal::delay::DelayNs for SimDelay<'_> {
    fn delay_ns(&mut self, ns: u32) {
        self.0.elapse_ms(ns / 1_000_000);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.0.elapse_ms(ms);
    }
}

impl embedded_hal_async::delay::DelayNs for SimDelay<'_> {
    async fn delay_ns(&mut self, ns: u32) {
        self.0.elapse_ms(ns / 1_000_000);
    }

    async fn delay_ms(&mut self, ms: u32) {
        self.0.elapse_ms(ms);
    }
}

pub struct SimIrq<'a>(Simulator<'a>);

impl<'a> EdgeInterrupt<'a> for SimIrq<'a> {
    fn attach_rising(&mut self, pin: u8, counter: &'a PulseCounter) {
        let mut state = self.0.state.borrow_mut();
        state.counter = Some(counter);
        state.attached_pin = Some(pin);
        state.attach_calls += 1;
    }

    fn detach(&mut self, pin: u8) {
        let mut state = self.0.state.borrow_mut();
        assert_eq!(state.attached_pin, Some(pin), "detached a pin never attached");
        state.counter = None;
        state.attached_pin = None;
        state.detach_calls += 1;
    }
}

/// Pulse profile that peaks at `best` with `step` pulses per trim away from it
pub fn pulses_centered_on(best: usize, at_best: u32, step: u32) -> [u32; 16] {
    let mut pulses = [0u32; 16];
    for (tune, slot) in pulses.iter_mut().enumerate() {
        let distance = u32::try_from(tune.abs_diff(best)).unwrap();
        *slot = at_best.saturating_sub(distance * step);
    }
    pulses
}
