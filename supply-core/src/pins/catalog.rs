//! Board pin catalog.
//!
//! One entry per MCU pin the firmware knows about, in a fixed order indexed
//! by [`Signal::as_index`]. Each entry carries the low-power plan applied by
//! the quiescer. Debug and crystal pins are listed so they can be recognised
//! and skipped, never so they can be driven.

use super::quiesce::QuiesceMode;
use super::{Level, MuxMode, PinId, PinState, Port};

/// Logical board signals routed to MCU pins.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Signal {
    SwdClk,
    SwdReset,
    SwdDio,
    Extal32k,
    Xtal32k,
    SpareA5,
    SpiMiso,
    SpiMosi,
    PotChipSelect,
    RadioReset,
    ClkOut32k,
    SpiSck,
    AdcSupply,
    SupplySwitchSelect,
    I2cScl,
    I2cSda,
    RegulatorAEnable,
    RegulatorBEnable,
    VoltageSelect1,
    VoltageSelect2,
    VoltageSelect3,
    SpareB13,
}

impl Signal {
    /// Deterministic index for lookups into [`BOARD_PINS`].
    #[must_use]
    pub const fn as_index(self) -> usize {
        self as usize
    }

    /// The three VSEL lines, VSEL1 first.
    pub const VOLTAGE_SELECT: [Signal; 3] = [
        Signal::VoltageSelect1,
        Signal::VoltageSelect2,
        Signal::VoltageSelect3,
    ];
}

/// What a pin should look like while the node sleeps.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LowPowerPlan {
    /// Debug or crystal pin; never reconfigured.
    Untouched,
    /// Function disabled. `latch` optionally clears the output register so
    /// the pin comes back low when a driver next claims it.
    Disabled { latch: Option<Level> },
    /// GPIO output held at a fixed level.
    Drive(Level),
    /// ADC supply sense pin; its treatment depends on [`QuiesceMode`].
    AdcSupply,
}

impl LowPowerPlan {
    /// Concrete pin state for this plan, or `None` when the pin is left alone.
    #[must_use]
    pub const fn resolve(self, mode: QuiesceMode) -> Option<PinState> {
        match self {
            LowPowerPlan::Untouched => None,
            LowPowerPlan::Disabled { latch } => Some(PinState::new(MuxMode::Disabled, latch)),
            LowPowerPlan::Drive(level) => Some(PinState::new(MuxMode::Gpio, Some(level))),
            LowPowerPlan::AdcSupply => {
                if mode.disable_adc_on_sleep {
                    Some(PinState::new(MuxMode::Gpio, Some(Level::High)))
                } else {
                    Some(PinState::new(MuxMode::Disabled, None))
                }
            }
        }
    }
}

/// Catalog entry for one board pin.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BoardPin {
    pub signal: Signal,
    pub pin: PinId,
    pub name: &'static str,
    pub plan: LowPowerPlan,
}

impl BoardPin {
    pub const fn new(signal: Signal, pin: PinId, name: &'static str, plan: LowPowerPlan) -> Self {
        Self {
            signal,
            pin,
            name,
            plan,
        }
    }

    /// Debug and crystal pins must keep working across every sleep.
    #[must_use]
    pub const fn is_boot_critical(&self) -> bool {
        matches!(
            self.signal,
            Signal::SwdClk | Signal::SwdReset | Signal::SwdDio | Signal::Extal32k | Signal::Xtal32k
        )
    }

    /// State the quiescer writes to this pin, or `None` when it must be left
    /// alone. Boot-critical pins resolve to `None` whatever their plan says.
    #[must_use]
    pub const fn low_power_state(&self, mode: QuiesceMode) -> Option<PinState> {
        if self.is_boot_critical() {
            None
        } else {
            self.plan.resolve(mode)
        }
    }
}

const fn pa(index: u8) -> PinId {
    PinId::new(Port::A, index)
}

const fn pb(index: u8) -> PinId {
    PinId::new(Port::B, index)
}

const LOW: LowPowerPlan = LowPowerPlan::Drive(Level::Low);
const HIGH: LowPowerPlan = LowPowerPlan::Drive(Level::High);

/// Compile-time catalog of every board pin, in [`Signal`] order.
pub const BOARD_PINS: [BoardPin; 22] = [
    BoardPin::new(Signal::SwdClk, pa(0), "SWD_CLK", LowPowerPlan::Untouched),
    BoardPin::new(Signal::SwdReset, pa(1), "SWD_RESET", LowPowerPlan::Untouched),
    BoardPin::new(Signal::SwdDio, pa(2), "SWD_DIO", LowPowerPlan::Untouched),
    BoardPin::new(Signal::Extal32k, pa(3), "EXTAL32K", LowPowerPlan::Untouched),
    BoardPin::new(Signal::Xtal32k, pa(4), "XTAL32K", LowPowerPlan::Untouched),
    BoardPin::new(Signal::SpareA5, pa(5), "PTA5", LOW),
    BoardPin::new(Signal::SpiMiso, pa(6), "SPI_MISO", LOW),
    BoardPin::new(Signal::SpiMosi, pa(7), "SPI_MOSI", LOW),
    BoardPin::new(Signal::PotChipSelect, pa(8), "ISL23415_nCS", HIGH),
    BoardPin::new(Signal::RadioReset, pa(9), "SI4705_nRST", LOW),
    BoardPin::new(Signal::ClkOut32k, pa(12), "CLKOUT32K", LOW),
    BoardPin::new(Signal::SpiSck, pb(0), "SPI_SCK", LOW),
    BoardPin::new(Signal::AdcSupply, pb(1), "KL03_VDD_ADC", LowPowerPlan::AdcSupply),
    BoardPin::new(Signal::SupplySwitchSelect, pb(2), "TS5A3154_IN", LOW),
    BoardPin::new(
        Signal::I2cScl,
        pb(3),
        "I2C0_SCL",
        LowPowerPlan::Disabled {
            latch: Some(Level::Low),
        },
    ),
    BoardPin::new(
        Signal::I2cSda,
        pb(4),
        "I2C0_SDA",
        LowPowerPlan::Disabled {
            latch: Some(Level::Low),
        },
    ),
    BoardPin::new(Signal::RegulatorAEnable, pb(5), "TPS82740A_CTLEN", LOW),
    BoardPin::new(Signal::RegulatorBEnable, pb(6), "TPS82740B_CTLEN", LOW),
    BoardPin::new(Signal::VoltageSelect1, pb(7), "TPS82740_VSEL1", LOW),
    BoardPin::new(Signal::VoltageSelect2, pb(10), "TPS82740_VSEL2", LOW),
    BoardPin::new(Signal::VoltageSelect3, pb(11), "TPS82740_VSEL3", LOW),
    BoardPin::new(Signal::SpareB13, pb(13), "PTB13", LOW),
];

/// Retrieve pin metadata by signal.
#[must_use]
pub const fn board_pin(signal: Signal) -> BoardPin {
    BOARD_PINS[signal.as_index()]
}

/// Physical pin carrying `signal`.
#[must_use]
pub const fn pin_for(signal: Signal) -> PinId {
    board_pin(signal).pin
}

const fn catalog_is_ordered() -> bool {
    let mut index = 0;
    while index < BOARD_PINS.len() {
        if BOARD_PINS[index].signal.as_index() != index {
            return false;
        }
        index += 1;
    }
    true
}

const _: () = assert!(catalog_is_ordered(), "BOARD_PINS out of Signal order");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pins_are_unique() {
        for (i, a) in BOARD_PINS.iter().enumerate() {
            for b in &BOARD_PINS[i + 1..] {
                assert_ne!(a.pin, b.pin, "{} and {} share a pin", a.name, b.name);
            }
        }
    }

    #[test]
    fn boot_critical_pins_have_no_low_power_state() {
        for entry in BOARD_PINS.iter().filter(|entry| entry.is_boot_critical()) {
            for mode in [
                QuiesceMode::default(),
                QuiesceMode {
                    disable_adc_on_sleep: false,
                },
            ] {
                assert_eq!(entry.plan.resolve(mode), None, "{}", entry.name);
                assert_eq!(entry.low_power_state(mode), None, "{}", entry.name);
            }
        }
    }

    #[test]
    fn boot_critical_pins_override_a_planned_state() {
        let mut crystal = board_pin(Signal::Extal32k);
        crystal.plan = LowPowerPlan::Disabled { latch: None };
        assert_eq!(crystal.low_power_state(QuiesceMode::default()), None);

        let mut spare = board_pin(Signal::SpareA5);
        spare.plan = LowPowerPlan::Disabled { latch: None };
        assert_eq!(
            spare.low_power_state(QuiesceMode::default()),
            Some(PinState::new(MuxMode::Disabled, None))
        );
    }

    #[test]
    fn adc_supply_plan_depends_on_mode() {
        let plan = board_pin(Signal::AdcSupply).plan;
        let held = plan.resolve(QuiesceMode::default()).unwrap();
        assert_eq!(held.mux, MuxMode::Gpio);
        assert_eq!(held.level, Some(Level::High));

        let released = plan
            .resolve(QuiesceMode {
                disable_adc_on_sleep: false,
            })
            .unwrap();
        assert_eq!(released.mux, MuxMode::Disabled);
        assert_eq!(released.level, None);
    }

    #[test]
    fn lookup_by_signal_matches_catalog() {
        assert_eq!(pin_for(Signal::VoltageSelect2), PinId::new(Port::B, 10));
        assert_eq!(board_pin(Signal::SupplySwitchSelect).name, "TS5A3154_IN");
    }
}
