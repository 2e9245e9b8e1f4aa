//! Regulator enable and voltage-select sequencing.

use core::time::Duration;

use embedded_hal::delay::DelayNs;

use super::{Regulator, SupplyError, SwitchPosition, VoltageSelectCode, select_code};
use crate::pins::{Level, LowPowerPlan, PinControl, Signal, board_pin, pin_for};

/// Worst-case output ramp of the TPS82740 after an enable or VSEL change.
pub const REGULATOR_RAMP_MAX: Duration = Duration::from_micros(800);

/// Settling wait applied after every supply change unless configured otherwise.
pub const DEFAULT_SETTLE: Duration = Duration::from_millis(1);

/// Supply controller tuning.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SupplyConfig {
    settle: Duration,
}

impl SupplyConfig {
    /// Settle waits shorter than [`REGULATOR_RAMP_MAX`] are raised to it, so
    /// the rail is always up before the caller samples.
    #[must_use]
    pub const fn new(settle: Duration) -> Self {
        let settle = if settle.as_nanos() < REGULATOR_RAMP_MAX.as_nanos() {
            REGULATOR_RAMP_MAX
        } else {
            settle
        };
        Self { settle }
    }

    #[must_use]
    pub const fn settle(&self) -> Duration {
        self.settle
    }
}

impl Default for SupplyConfig {
    fn default() -> Self {
        Self::new(DEFAULT_SETTLE)
    }
}

/// Last state written to the supply control lines.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SupplyState {
    /// Enabled regulator and its select code, if any.
    pub active: Option<(Regulator, VoltageSelectCode)>,
    pub switch: SwitchPosition,
}

impl SupplyState {
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.active.is_some()
    }

    /// Voltage currently presented on the sensor rail.
    #[must_use]
    pub fn millivolts(&self) -> Option<u16> {
        self.active.map(|(regulator, code)| regulator.millivolts(code))
    }

    /// Returns `true` when the analog switch routes the enabled regulator.
    #[must_use]
    pub fn is_coherent(&self) -> bool {
        self.active
            .is_none_or(|(regulator, _)| regulator.switch_position() == self.switch)
    }
}

/// Owns the regulator enables, VSEL lines and analog switch select.
///
/// At most one regulator is enabled at any time. Switching regulators always
/// deasserts the other enable before asserting the target.
#[derive(Debug)]
pub struct RegulatorController {
    config: SupplyConfig,
    state: SupplyState,
}

impl RegulatorController {
    /// Creates a controller that assumes both regulators are off.
    ///
    /// The switch is recorded at its disabled position; nothing is written to
    /// the hardware until the first [`enable`](Self::enable) or
    /// [`disable`](Self::disable).
    #[must_use]
    pub const fn new(config: SupplyConfig) -> Self {
        Self {
            config,
            state: SupplyState {
                active: None,
                switch: SwitchPosition::UseB,
            },
        }
    }

    #[must_use]
    pub const fn config(&self) -> SupplyConfig {
        self.config
    }

    #[must_use]
    pub const fn state(&self) -> SupplyState {
        self.state
    }

    /// Enables `regulator` at `code` and routes it to the sensor rail.
    ///
    /// Writes the VSEL lines, deasserts the other regulator, asserts the
    /// target, moves the switch, then waits the configured settle time.
    pub fn enable<C, D>(
        &mut self,
        pins: &mut C,
        delay: &mut D,
        regulator: Regulator,
        code: VoltageSelectCode,
    ) -> SupplyState
    where
        C: PinControl + ?Sized,
        D: DelayNs + ?Sized,
    {
        for (signal, level) in Signal::VOLTAGE_SELECT.into_iter().zip(code.lines()) {
            pins.drive(pin_for(signal), level);
        }

        pins.drive(pin_for(enable_signal(regulator.other())), Level::Low);
        pins.drive(pin_for(enable_signal(regulator)), Level::High);

        let switch = regulator.switch_position();
        pins.drive(pin_for(Signal::SupplySwitchSelect), switch.select_level());

        self.state = SupplyState {
            active: Some((regulator, code)),
            switch,
        };
        self.settle(delay);
        self.state
    }

    /// Resolves `millivolts` and enables the matching regulator.
    ///
    /// # Errors
    ///
    /// Propagates [`select_code`] failures. Hardware lines are left
    /// untouched when the request is rejected.
    pub fn enable_millivolts<C, D>(
        &mut self,
        pins: &mut C,
        delay: &mut D,
        millivolts: u16,
    ) -> Result<SupplyState, SupplyError>
    where
        C: PinControl + ?Sized,
        D: DelayNs + ?Sized,
    {
        let (regulator, code) = select_code(millivolts)?;
        Ok(self.enable(pins, delay, regulator, code))
    }

    /// Turns both regulators off and parks the switch on regulator B.
    ///
    /// Safe to repeat; every call drives the same lines and settles again.
    pub fn disable<C, D>(&mut self, pins: &mut C, delay: &mut D) -> SupplyState
    where
        C: PinControl + ?Sized,
        D: DelayNs + ?Sized,
    {
        pins.drive(pin_for(Signal::RegulatorAEnable), Level::Low);
        pins.drive(pin_for(Signal::RegulatorBEnable), Level::Low);

        let switch = SwitchPosition::UseB;
        pins.drive(pin_for(Signal::SupplySwitchSelect), switch.select_level());

        self.state = SupplyState {
            active: None,
            switch,
        };
        self.settle(delay);
        self.state
    }

    /// Records that the pin quiescer has rewritten the supply lines.
    ///
    /// Quiescing clears both enables and the switch select, so the tracked
    /// state follows the level the catalog assigns to the switch pin.
    pub fn mark_lines_quiesced(&mut self) {
        let switch = match board_pin(Signal::SupplySwitchSelect).plan {
            LowPowerPlan::Drive(level) => SwitchPosition::from_select_level(level),
            _ => self.state.switch,
        };
        self.state = SupplyState {
            active: None,
            switch,
        };
    }

    fn settle<D>(&self, delay: &mut D)
    where
        D: DelayNs + ?Sized,
    {
        let micros = u32::try_from(self.config.settle.as_micros()).unwrap_or(u32::MAX);
        delay.delay_us(micros);
    }
}

const fn enable_signal(regulator: Regulator) -> Signal {
    match regulator {
        Regulator::A => Signal::RegulatorAEnable,
        Regulator::B => Signal::RegulatorBEnable,
    }
}
