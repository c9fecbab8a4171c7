//! Uniform digital pin type over native GPIO and the PCF8575 expander.
//!
//! Drivers (relays, switches, the dimmer gate) are generic over the
//! `embedded_hal` pin traits; [`GpioPin`] is the concrete type the board
//! wiring hands them.  Pin numbers come from config or [`crate::pins`];
//! numbers at or above [`pins::EXPANDER_BASE_PIN`] address the expander.

use embedded_hal::digital::{ErrorType, InputPin, OutputPin};
use embedded_hal::i2c::I2c;
use log::warn;

use crate::drivers::hw_init;
use crate::drivers::pcf8575::SharedExpander;
use crate::error::GpioError;
use crate::pins;

// ---------------------------------------------------------------------------
// Native pin
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativePin {
    pin: u8,
}

impl NativePin {
    pub fn new(pin: u8) -> Self {
        Self { pin }
    }

    pub fn number(&self) -> u8 {
        self.pin
    }
}

impl ErrorType for NativePin {
    type Error = GpioError;
}

impl OutputPin for NativePin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        hw_init::gpio_write(self.pin.into(), false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        hw_init::gpio_write(self.pin.into(), true);
        Ok(())
    }
}

impl InputPin for NativePin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(hw_init::gpio_read(self.pin.into()))
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!hw_init::gpio_read(self.pin.into()))
    }
}

// ---------------------------------------------------------------------------
// Expander pin
// ---------------------------------------------------------------------------

pub struct ExpanderPin<I2C> {
    expander: SharedExpander<I2C>,
    index: u8,
}

impl<I2C: I2c> ExpanderPin<I2C> {
    pub fn new(expander: SharedExpander<I2C>, index: u8) -> Result<Self, GpioError> {
        if index >= pins::EXPANDER_PIN_COUNT {
            warn!("gpio: expander pin index {} out of range", index);
            return Err(GpioError::PinOutOfRange(index));
        }
        Ok(Self { expander, index })
    }

    pub fn index(&self) -> u8 {
        self.index
    }
}

impl<I2C: I2c> ErrorType for ExpanderPin<I2C> {
    type Error = GpioError;
}

impl<I2C: I2c> OutputPin for ExpanderPin<I2C> {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.expander.borrow_mut().write_pin(self.index, false)
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.expander.borrow_mut().write_pin(self.index, true)
    }
}

impl<I2C: I2c> InputPin for ExpanderPin<I2C> {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        self.expander.borrow_mut().read_pin(self.index)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        self.is_high().map(|high| !high)
    }
}

// ---------------------------------------------------------------------------
// GpioPin
// ---------------------------------------------------------------------------

pub enum GpioPin<I2C> {
    Native(NativePin),
    Expander(ExpanderPin<I2C>),
}

impl<I2C: I2c> GpioPin<I2C> {
    /// Resolve a board pin number.  Expander pins need `expander` to be set.
    pub fn from_number(pin: u8, expander: Option<&SharedExpander<I2C>>) -> Result<Self, GpioError> {
        if pin < pins::EXPANDER_BASE_PIN {
            return Ok(Self::Native(NativePin::new(pin)));
        }
        let expander = expander.ok_or(GpioError::ExpanderMissing)?;
        ExpanderPin::new(expander.clone(), pin - pins::EXPANDER_BASE_PIN).map(Self::Expander)
    }

    /// Same as [`from_number`](Self::from_number) but releases an expander
    /// pin so it can be read.
    pub fn input(pin: u8, expander: Option<&SharedExpander<I2C>>) -> Result<Self, GpioError> {
        let mut gpio = Self::from_number(pin, expander)?;
        if let Self::Expander(p) = &mut gpio {
            p.set_high()?;
        }
        Ok(gpio)
    }
}

impl<I2C: I2c> ErrorType for GpioPin<I2C> {
    type Error = GpioError;
}

impl<I2C: I2c> OutputPin for GpioPin<I2C> {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        match self {
            Self::Native(p) => p.set_low(),
            Self::Expander(p) => p.set_low(),
        }
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        match self {
            Self::Native(p) => p.set_high(),
            Self::Expander(p) => p.set_high(),
        }
    }
}

impl<I2C: I2c> InputPin for GpioPin<I2C> {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        match self {
            Self::Native(p) => p.is_high(),
            Self::Expander(p) => p.is_high(),
        }
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        match self {
            Self::Native(p) => p.is_low(),
            Self::Expander(p) => p.is_low(),
        }
    }
}
