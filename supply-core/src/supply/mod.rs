//! Switched sensor supply: regulator bands and voltage-select encoding.
//!
//! The board carries two TPS82740 step-down regulators whose outputs are
//! muxed onto the scaled sensor supply by a TS5A3154 analog switch. Each
//! regulator covers an 800 mV band in 100 mV steps chosen by three shared
//! VSEL lines, so a requested voltage maps to exactly one regulator and one
//! 3-bit select code. Everything in this module is pure; the controller in
//! [`controller`] owns the hardware side.

use core::fmt;

use crate::pins::Level;

pub mod controller;

pub use controller::{
    DEFAULT_SETTLE, REGULATOR_RAMP_MAX, RegulatorController, SupplyConfig, SupplyState,
};

/// Granularity of both regulator bands.
pub const VOLTAGE_STEP_MV: u16 = 100;
/// Lowest output of regulator A (VSEL = `000`).
pub const BAND_A_MIN_MV: u16 = 1_800;
/// Highest output of regulator A (VSEL = `111`).
pub const BAND_A_MAX_MV: u16 = 2_500;
/// Lowest output of regulator B (VSEL = `000`).
pub const BAND_B_MIN_MV: u16 = 2_600;
/// Highest output of regulator B (VSEL = `111`).
pub const BAND_B_MAX_MV: u16 = 3_300;

/// One of the two mutually exclusive step-down regulators.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Regulator {
    /// TPS82740A, 1.8 V to 2.5 V.
    A,
    /// TPS82740B, 2.6 V to 3.3 V.
    B,
}

impl Regulator {
    /// Both regulators, A first.
    pub const ALL: [Regulator; 2] = [Regulator::A, Regulator::B];

    /// Returns the regulator that must be off whenever `self` is on.
    #[must_use]
    pub const fn other(self) -> Self {
        match self {
            Regulator::A => Regulator::B,
            Regulator::B => Regulator::A,
        }
    }

    /// Output voltage when all select lines are low.
    #[must_use]
    pub const fn floor_mv(self) -> u16 {
        match self {
            Regulator::A => BAND_A_MIN_MV,
            Regulator::B => BAND_B_MIN_MV,
        }
    }

    /// Output voltage when all select lines are high.
    #[must_use]
    pub const fn ceiling_mv(self) -> u16 {
        match self {
            Regulator::A => BAND_A_MAX_MV,
            Regulator::B => BAND_B_MAX_MV,
        }
    }

    /// Returns `true` when `millivolts` lies inside this regulator's band.
    #[must_use]
    pub const fn covers(self, millivolts: u16) -> bool {
        millivolts >= self.floor_mv() && millivolts <= self.ceiling_mv()
    }

    /// Absolute output produced by applying `code` to this regulator.
    #[must_use]
    pub const fn millivolts(self, code: VoltageSelectCode) -> u16 {
        self.floor_mv() + code.raw() as u16 * VOLTAGE_STEP_MV
    }

    /// Analog switch position that routes this regulator to the sensor rail.
    #[must_use]
    pub const fn switch_position(self) -> SwitchPosition {
        match self {
            Regulator::A => SwitchPosition::UseA,
            Regulator::B => SwitchPosition::UseB,
        }
    }

    /// Part name as printed in the board schematic.
    #[must_use]
    pub const fn part(self) -> &'static str {
        match self {
            Regulator::A => "TPS82740A",
            Regulator::B => "TPS82740B",
        }
    }
}

impl fmt::Display for Regulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.part())
    }
}

/// Three-bit VSEL value selecting one of eight steps inside a band.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct VoltageSelectCode(u8);

impl VoltageSelectCode {
    /// Band floor.
    pub const MIN: Self = Self(0b000);
    /// Band ceiling.
    pub const MAX: Self = Self(0b111);

    /// Builds a code from its raw value, rejecting anything wider than 3 bits.
    #[must_use]
    pub const fn new(raw: u8) -> Option<Self> {
        if raw <= Self::MAX.0 {
            Some(Self(raw))
        } else {
            None
        }
    }

    /// Raw 3-bit value.
    #[must_use]
    pub const fn raw(self) -> u8 {
        self.0
    }

    /// Levels for VSEL1, VSEL2 and VSEL3, in that order.
    ///
    /// VSEL1 carries the least significant bit, matching the regulator
    /// datasheet table (`000` is the band floor, `111` the ceiling).
    #[must_use]
    pub const fn lines(self) -> [Level; 3] {
        [
            Level::from_bit(self.0 & 0b001 != 0),
            Level::from_bit(self.0 & 0b010 != 0),
            Level::from_bit(self.0 & 0b100 != 0),
        ]
    }
}

/// Position of the TS5A3154 select input.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SwitchPosition {
    /// IN low, regulator A drives the sensor rail.
    UseA,
    /// IN high, regulator B drives the sensor rail.
    UseB,
}

impl SwitchPosition {
    /// Level of the switch select input for this position.
    #[must_use]
    pub const fn select_level(self) -> Level {
        match self {
            SwitchPosition::UseA => Level::Low,
            SwitchPosition::UseB => Level::High,
        }
    }

    /// Position implied by a select input level.
    #[must_use]
    pub const fn from_select_level(level: Level) -> Self {
        match level {
            Level::Low => SwitchPosition::UseA,
            Level::High => SwitchPosition::UseB,
        }
    }
}

/// Failures reported while resolving a supply request.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SupplyError {
    /// Requested voltage lies outside both bands or between 100 mV steps.
    UnsupportedVoltage(u16),
    /// A voltage inside a band produced no 3-bit code.
    SanityCheckFailure(u16),
}

impl SupplyError {
    /// Millivolt value carried by the failed request.
    #[must_use]
    pub const fn millivolts(self) -> u16 {
        match self {
            SupplyError::UnsupportedVoltage(mv) | SupplyError::SanityCheckFailure(mv) => mv,
        }
    }
}

impl fmt::Display for SupplyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SupplyError::UnsupportedVoltage(mv) => write!(f, "invalid supply voltage [{mv}] mV"),
            SupplyError::SanityCheckFailure(mv) => {
                write!(f, "sanity check failed selecting {mv} mV")
            }
        }
    }
}

impl core::error::Error for SupplyError {}

/// Resolves a requested output voltage to a regulator and select code.
///
/// # Errors
///
/// Returns [`SupplyError::UnsupportedVoltage`] for anything outside
/// 1800..=2500 or 2600..=3300 mV, or not on a 100 mV step.
pub fn select_code(millivolts: u16) -> Result<(Regulator, VoltageSelectCode), SupplyError> {
    let regulator = Regulator::ALL
        .into_iter()
        .find(|regulator| regulator.covers(millivolts))
        .ok_or(SupplyError::UnsupportedVoltage(millivolts))?;

    let offset = millivolts - regulator.floor_mv();
    if offset % VOLTAGE_STEP_MV != 0 {
        return Err(SupplyError::UnsupportedVoltage(millivolts));
    }

    u8::try_from(offset / VOLTAGE_STEP_MV)
        .ok()
        .and_then(VoltageSelectCode::new)
        .map(|code| (regulator, code))
        .ok_or(SupplyError::SanityCheckFailure(millivolts))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_edges_resolve_to_adjacent_regulators() {
        assert_eq!(select_code(2_500), Ok((Regulator::A, VoltageSelectCode::MAX)));
        assert_eq!(select_code(2_600), Ok((Regulator::B, VoltageSelectCode::MIN)));
        assert_eq!(select_code(1_800), Ok((Regulator::A, VoltageSelectCode::MIN)));
        assert_eq!(select_code(3_300), Ok((Regulator::B, VoltageSelectCode::MAX)));
    }

    #[test]
    fn matching_steps_share_a_code_across_bands() {
        for step in 0..8u16 {
            let (a, code_a) = select_code(BAND_A_MIN_MV + step * 100).unwrap();
            let (b, code_b) = select_code(BAND_B_MIN_MV + step * 100).unwrap();
            assert_eq!(a, Regulator::A);
            assert_eq!(b, Regulator::B);
            assert_eq!(code_a, code_b);
            assert_eq!(u16::from(code_a.raw()), step);
        }
    }

    #[test]
    fn rejects_values_outside_bands_or_steps() {
        for mv in [0, 1_700, 1_799, 1_850, 2_550, 2_599, 3_301, 3_400, u16::MAX] {
            assert_eq!(select_code(mv), Err(SupplyError::UnsupportedVoltage(mv)));
        }
    }

    #[test]
    fn select_lines_follow_datasheet_table() {
        use Level::{High, Low};

        let cases = [
            (1_800, [Low, Low, Low]),
            (1_900, [High, Low, Low]),
            (2_000, [Low, High, Low]),
            (2_100, [High, High, Low]),
            (2_200, [Low, Low, High]),
            (2_300, [High, Low, High]),
            (2_400, [Low, High, High]),
            (2_500, [High, High, High]),
        ];

        for (mv, lines) in cases {
            let (_, code) = select_code(mv).unwrap();
            assert_eq!(code.lines(), lines, "VSEL lines for {mv} mV");
        }
    }

    #[test]
    fn code_constructor_rejects_wide_values() {
        assert!(VoltageSelectCode::new(7).is_some());
        assert!(VoltageSelectCode::new(8).is_none());
    }

    #[test]
    fn switch_position_tracks_regulator() {
        assert_eq!(Regulator::A.switch_position(), SwitchPosition::UseA);
        assert_eq!(Regulator::B.switch_position(), SwitchPosition::UseB);
        assert_eq!(SwitchPosition::UseB.select_level(), Level::High);
        assert_eq!(
            SwitchPosition::from_select_level(Level::Low),
            SwitchPosition::UseA
        );
    }
}
