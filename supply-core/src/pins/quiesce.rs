//! Low-power pin quiescing and peripheral bus ownership.
//!
//! Quiescing runs in two passes over [`BOARD_PINS`]: every pin gets its
//! multiplexer and pull configured first, then the output latches are
//! written. Splitting the passes keeps a pin from glitching high while its
//! function is still being switched away from a peripheral.

use core::fmt;

use super::catalog::{BOARD_PINS, Signal, pin_for};
use super::{Level, MuxMode, PinControl};

/// Board-level quiesce options.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct QuiesceMode {
    /// Hold the ADC supply pin as a high GPIO instead of disabling it.
    pub disable_adc_on_sleep: bool,
}

impl QuiesceMode {
    pub const DEFAULT: Self = Self {
        disable_adc_on_sleep: true,
    };
}

impl Default for QuiesceMode {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Serial peripherals that borrow board pins while attached.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PeripheralBus {
    Spi,
    I2c,
    Lpuart,
}

/// Pin claimed by a bus and the mux function it needs.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BusPin {
    pub signal: Signal,
    pub function: MuxMode,
}

impl BusPin {
    const fn new(signal: Signal, alt: u8) -> Self {
        Self {
            signal,
            function: MuxMode::Alt(alt),
        }
    }
}

const SPI_PINS: [BusPin; 3] = [
    BusPin::new(Signal::SpiMiso, 3),
    BusPin::new(Signal::SpiMosi, 3),
    BusPin::new(Signal::SpiSck, 3),
];

const I2C_PINS: [BusPin; 2] = [
    BusPin::new(Signal::I2cScl, 2),
    BusPin::new(Signal::I2cSda, 2),
];

// LPUART shares PTB3/PTB4 with I2C: TX on the SCL pin, RX on SDA.
const LPUART_PINS: [BusPin; 2] = [
    BusPin::new(Signal::I2cScl, 3),
    BusPin::new(Signal::I2cSda, 3),
];

impl PeripheralBus {
    pub const ALL: [PeripheralBus; 3] = [
        PeripheralBus::Spi,
        PeripheralBus::I2c,
        PeripheralBus::Lpuart,
    ];

    /// Pins routed to this bus while it is attached.
    #[must_use]
    pub const fn pins(self) -> &'static [BusPin] {
        match self {
            PeripheralBus::Spi => &SPI_PINS,
            PeripheralBus::I2c => &I2C_PINS,
            PeripheralBus::Lpuart => &LPUART_PINS,
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            PeripheralBus::Spi => "spi",
            PeripheralBus::I2c => "i2c",
            PeripheralBus::Lpuart => "lpuart",
        }
    }

    const fn bit(self) -> u8 {
        match self {
            PeripheralBus::Spi => 0b001,
            PeripheralBus::I2c => 0b010,
            PeripheralBus::Lpuart => 0b100,
        }
    }

    /// Returns `true` when both buses need at least one common pin.
    #[must_use]
    pub fn shares_pins_with(self, other: PeripheralBus) -> bool {
        self.pins()
            .iter()
            .any(|mine| other.pins().iter().any(|theirs| theirs.signal == mine.signal))
    }
}

impl fmt::Display for PeripheralBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Attach refused because another bus already owns a shared pin.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PinConflict {
    pub requested: PeripheralBus,
    pub owner: PeripheralBus,
}

impl fmt::Display for PinConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} pins are held by {}", self.requested, self.owner)
    }
}

impl core::error::Error for PinConflict {}

/// Drives every non-critical pin to its low-power plan and tracks which
/// peripheral buses currently own board pins.
#[derive(Debug, Default)]
pub struct PinQuiescer {
    attached: u8,
}

impl PinQuiescer {
    #[must_use]
    pub const fn new() -> Self {
        Self { attached: 0 }
    }

    /// Applies the low-power plan to every catalogued pin that is not
    /// boot-critical. Debug and crystal pins are never written.
    ///
    /// Any attached bus is considered detached afterwards, since its pins no
    /// longer carry the peripheral function. Returns the number of pins
    /// reconfigured. Running it again yields the same pin state.
    pub fn quiesce_all<C>(&mut self, pins: &mut C, mode: QuiesceMode) -> usize
    where
        C: PinControl + ?Sized,
    {
        let mut configured = 0;
        for entry in &BOARD_PINS {
            if let Some(state) = entry.low_power_state(mode) {
                pins.set_mux(entry.pin, state.mux);
                pins.set_pull(entry.pin, state.pull);
                configured += 1;
            }
        }

        for entry in &BOARD_PINS {
            if let Some(level) = entry.low_power_state(mode).and_then(|state| state.level) {
                pins.drive(entry.pin, level);
            }
        }

        self.attached = 0;
        configured
    }

    /// Routes `bus` pins to their peripheral function.
    ///
    /// Re-attaching an already attached bus is accepted.
    ///
    /// # Errors
    ///
    /// Returns [`PinConflict`] when an attached bus needs one of the same
    /// pins. No pin is touched in that case.
    pub fn attach<C>(&mut self, pins: &mut C, bus: PeripheralBus) -> Result<(), PinConflict>
    where
        C: PinControl + ?Sized,
    {
        if let Some(owner) = PeripheralBus::ALL
            .into_iter()
            .filter(|other| *other != bus && self.is_attached(*other))
            .find(|other| other.shares_pins_with(bus))
        {
            return Err(PinConflict {
                requested: bus,
                owner,
            });
        }

        for bus_pin in bus.pins() {
            pins.set_mux(pin_for(bus_pin.signal), bus_pin.function);
        }
        self.attached |= bus.bit();
        Ok(())
    }

    /// Returns `bus` pins to GPIO driven low.
    pub fn detach<C>(&mut self, pins: &mut C, bus: PeripheralBus)
    where
        C: PinControl + ?Sized,
    {
        for bus_pin in bus.pins() {
            let pin = pin_for(bus_pin.signal);
            pins.set_mux(pin, MuxMode::Gpio);
            pins.drive(pin, Level::Low);
        }
        self.attached &= !bus.bit();
    }

    #[must_use]
    pub const fn is_attached(&self, bus: PeripheralBus) -> bool {
        self.attached & bus.bit() != 0
    }
}
