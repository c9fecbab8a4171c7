//! Unified error types for the brewctl firmware.
//!
//! A single `Error` enum that every subsystem converts into, keeping the
//! top-level loop's error handling uniform.  All variants are `Copy` so
//! they can be passed around the control core without allocation.

use core::fmt;

pub use crate::app::ports::{ConfigError, StorageError};
pub use crate::drivers::hw_init::HwInitError;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A parameter could not be read or written.
    Config(ConfigError),
    /// The persisted parameter tree could not be loaded or saved.
    Storage(StorageError),
    /// The brew profile catalog could not be loaded.
    Profile(ProfileError),
    /// A GPIO or port-expander access failed.
    Gpio(GpioError),
    /// Peripheral initialisation failed.
    Init(HwInitError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Storage(e) => write!(f, "storage: {e}"),
            Self::Profile(e) => write!(f, "profile: {e}"),
            Self::Gpio(e) => write!(f, "gpio: {e}"),
            Self::Init(e) => write!(f, "init: {e}"),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

impl From<HwInitError> for Error {
    fn from(e: HwInitError) -> Self {
        Self::Init(e)
    }
}

// ---------------------------------------------------------------------------
// Profile catalog errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileError {
    /// The catalog document is not valid JSON or does not match the schema.
    Malformed,
    /// More profiles than the catalog can hold.
    TooManyProfiles,
    /// A profile or phase name exceeds the fixed name capacity.
    NameTooLong,
    /// The catalog contains no profiles.
    Empty,
    /// No profile at the requested index.
    UnknownProfile,
}

impl fmt::Display for ProfileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed => write!(f, "catalog malformed"),
            Self::TooManyProfiles => write!(f, "too many profiles"),
            Self::NameTooLong => write!(f, "name too long"),
            Self::Empty => write!(f, "catalog empty"),
            Self::UnknownProfile => write!(f, "no such profile"),
        }
    }
}

impl From<ProfileError> for Error {
    fn from(e: ProfileError) -> Self {
        Self::Profile(e)
    }
}

// ---------------------------------------------------------------------------
// GPIO errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpioError {
    /// Pin number maps to the I²C expander but none was configured.
    ExpanderMissing,
    /// Expander pin index outside 0..16.
    PinOutOfRange(u8),
    /// I²C transaction with the expander failed.
    Bus,
}

impl fmt::Display for GpioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExpanderMissing => write!(f, "port expander not configured"),
            Self::PinOutOfRange(pin) => write!(f, "expander pin {pin} out of range"),
            Self::Bus => write!(f, "I2C bus error"),
        }
    }
}

impl From<GpioError> for Error {
    fn from(e: GpioError) -> Self {
        Self::Gpio(e)
    }
}

impl embedded_hal::digital::Error for GpioError {
    fn kind(&self) -> embedded_hal::digital::ErrorKind {
        embedded_hal::digital::ErrorKind::Other
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
