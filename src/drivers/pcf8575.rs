//! PCF8575 16-bit I²C port expander.
//!
//! The chip has no direction register: every pin is quasi-bidirectional.
//! Writing a 1 releases the pin (weak pull-up, usable as input), writing a
//! 0 sinks it.  We keep a shadow of the last written word so single-pin
//! writes don't clobber their neighbours, and keep input pins high in it.

use core::cell::RefCell;
use std::rc::Rc;

use embedded_hal::i2c::I2c;

use crate::error::GpioError;
use crate::pins;

pub struct Pcf8575<I2C> {
    bus: I2C,
    address: u8,
    shadow: u16,
}

/// One expander shared by every pin that lives on it.
pub type SharedExpander<I2C> = Rc<RefCell<Pcf8575<I2C>>>;

impl<I2C: I2c> Pcf8575<I2C> {
    /// All pins released (inputs / off-level high).
    pub fn new(bus: I2C, address: u8) -> Self {
        Self {
            bus,
            address,
            shadow: 0xFFFF,
        }
    }

    pub fn with_default_address(bus: I2C) -> Self {
        Self::new(bus, pins::EXPANDER_I2C_ADDR)
    }

    pub fn into_shared(self) -> SharedExpander<I2C> {
        Rc::new(RefCell::new(self))
    }

    fn check(pin: u8) -> Result<u16, GpioError> {
        if pin >= pins::EXPANDER_PIN_COUNT {
            return Err(GpioError::PinOutOfRange(pin));
        }
        Ok(1u16 << pin)
    }

    pub fn write_pin(&mut self, pin: u8, high: bool) -> Result<(), GpioError> {
        let mask = Self::check(pin)?;
        let next = if high { self.shadow | mask } else { self.shadow & !mask };
        self.write_word(next)
    }

    pub fn read_pin(&mut self, pin: u8) -> Result<bool, GpioError> {
        let mask = Self::check(pin)?;
        Ok(self.read_word()? & mask != 0)
    }

    /// Mark `pin` as an input by releasing it in the shadow word.
    pub fn release_pin(&mut self, pin: u8) -> Result<(), GpioError> {
        self.write_pin(pin, true)
    }

    pub fn shadow(&self) -> u16 {
        self.shadow
    }

    fn write_word(&mut self, word: u16) -> Result<(), GpioError> {
        let [lo, hi] = word.to_le_bytes();
        self.bus
            .write(self.address, &[lo, hi])
            .map_err(|_| GpioError::Bus)?;
        self.shadow = word;
        Ok(())
    }

    fn read_word(&mut self) -> Result<u16, GpioError> {
        let mut buf = [0u8; 2];
        self.bus
            .read(self.address, &mut buf)
            .map_err(|_| GpioError::Bus)?;
        Ok(u16::from_le_bytes(buf))
    }
}
