//! Pin-level vocabulary shared by the quiescer and the supply controller.
//!
//! Hardware access goes through [`PinControl`]; the board catalog in
//! [`catalog`] names every MCU pin the firmware is allowed to touch and
//! records what each one should look like while the node sleeps.

use core::fmt;

pub mod catalog;
pub mod quiesce;

pub use catalog::{BOARD_PINS, BoardPin, LowPowerPlan, Signal, board_pin, pin_for};
pub use quiesce::{BusPin, PeripheralBus, PinConflict, PinQuiescer, QuiesceMode};

/// GPIO port on the MCU.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Port {
    A,
    B,
}

/// A single MCU pin, identified by port and bit index.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PinId {
    pub port: Port,
    pub index: u8,
}

impl PinId {
    #[must_use]
    pub const fn new(port: Port, index: u8) -> Self {
        Self { port, index }
    }

    /// Single-bit mask for this pin inside its port registers.
    #[must_use]
    pub const fn mask(self) -> u32 {
        1 << self.index
    }
}

impl fmt::Display for PinId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let port = match self.port {
            Port::A => 'A',
            Port::B => 'B',
        };
        write!(f, "PT{port}{}", self.index)
    }
}

/// Pin multiplexer selection.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MuxMode {
    /// Pin function disabled (analog / high impedance).
    Disabled,
    /// Plain GPIO.
    Gpio,
    /// Alternate peripheral function number.
    Alt(u8),
}

/// Logic level of a driven output.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Level {
    Low,
    High,
}

impl Level {
    #[must_use]
    pub const fn from_bit(bit: bool) -> Self {
        if bit { Level::High } else { Level::Low }
    }

    #[must_use]
    pub const fn is_high(self) -> bool {
        matches!(self, Level::High)
    }
}

/// Internal pull resistor selection.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Pull {
    #[default]
    None,
    Down,
    Up,
}

/// Complete configuration of one pin.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PinState {
    pub mux: MuxMode,
    /// Output latch; `None` leaves it untouched.
    pub level: Option<Level>,
    pub pull: Pull,
}

impl PinState {
    #[must_use]
    pub const fn new(mux: MuxMode, level: Option<Level>) -> Self {
        Self {
            mux,
            level,
            pull: Pull::None,
        }
    }
}

/// Hardware abstraction over the MCU's port control and GPIO blocks.
///
/// Implementations apply the request immediately. None of the operations can
/// fail at the register level, so the trait stays infallible.
pub trait PinControl {
    /// Selects the pin multiplexer function.
    fn set_mux(&mut self, pin: PinId, mux: MuxMode);

    /// Configures the internal pull resistor.
    fn set_pull(&mut self, pin: PinId, pull: Pull);

    /// Drives the output latch. GPIO pins also switch to output direction.
    fn drive(&mut self, pin: PinId, level: Level);
}

impl<T> PinControl for &mut T
where
    T: PinControl + ?Sized,
{
    fn set_mux(&mut self, pin: PinId, mux: MuxMode) {
        (**self).set_mux(pin, mux);
    }

    fn set_pull(&mut self, pin: PinId, pull: Pull) {
        (**self).set_pull(pin, pull);
    }

    fn drive(&mut self, pin: PinId, level: Level) {
        (**self).drive(pin, level);
    }
}

/// Pin controller that discards every request.
#[cfg(test)]
#[derive(Default)]
pub(crate) struct NoopPinControl;

#[cfg(test)]
impl PinControl for NoopPinControl {
    fn set_mux(&mut self, _pin: PinId, _mux: MuxMode) {}

    fn set_pull(&mut self, _pin: PinId, _pull: Pull) {}

    fn drive(&mut self, _pin: PinId, _level: Level) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pin_names_follow_board_convention() {
        let mut buf = heapless::String::<8>::new();
        fmt::write(&mut buf, format_args!("{}", PinId::new(Port::B, 13))).unwrap();
        assert_eq!(buf.as_str(), "PTB13");
    }

    #[test]
    fn masks_select_single_bit() {
        assert_eq!(PinId::new(Port::A, 0).mask(), 0b1);
        assert_eq!(PinId::new(Port::B, 11).mask(), 1 << 11);
    }
}
