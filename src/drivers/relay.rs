//! Relay output with configurable trigger polarity.

use embedded_hal::digital::OutputPin;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerType {
    /// Energised by a high level.
    High,
    /// Energised by a low level (most opto-isolated relay boards).
    Low,
}

pub struct Relay<P> {
    pin: P,
    trigger: TriggerType,
    state: bool,
}

impl<P: OutputPin> Relay<P> {
    /// Takes the pin and drives it to the off level.
    pub fn new(pin: P, trigger: TriggerType) -> Self {
        let mut relay = Self {
            pin,
            trigger,
            state: false,
        };
        relay.drive(false);
        relay
    }

    pub fn on(&mut self) {
        self.drive(true);
    }

    pub fn off(&mut self) {
        self.drive(false);
    }

    pub fn set(&mut self, on: bool) {
        self.drive(on);
    }

    pub fn state(&self) -> bool {
        self.state
    }

    fn drive(&mut self, on: bool) {
        let high = on ^ (self.trigger == TriggerType::Low);
        let res = if high { self.pin.set_high() } else { self.pin.set_low() };
        if res.is_err() {
            log::warn!("relay: pin write failed");
        }
        self.state = on;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::gpio::NativePin;
    use crate::drivers::hw_init::{sim_pin, sim_set_pin};

    #[test]
    fn high_trigger_follows_state() {
        sim_set_pin(8, true);
        let mut r = Relay::new(NativePin::new(8), TriggerType::High);
        assert!(!sim_pin(8));
        r.on();
        assert!(r.state());
        assert!(sim_pin(8));
        r.off();
        assert!(!sim_pin(8));
    }

    #[test]
    fn low_trigger_inverts_level() {
        let mut r = Relay::new(NativePin::new(9), TriggerType::Low);
        assert!(sim_pin(9));
        assert!(!r.state());
        r.on();
        assert!(!sim_pin(9));
        r.off();
        assert!(sim_pin(9));
    }
}
