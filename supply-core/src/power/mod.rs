//! Processor power modes, the vendor mode table and the platform seam.
//!
//! The vendor power manager indexes its configuration table by position, so
//! [`ModeTable`] fixes that order at compile time and re-checks it before the
//! table is handed over. Only Run, VLPR and VLPS are ever requested at
//! runtime; the remaining entries exist because the vendor layer expects a
//! complete table.

use core::fmt;

use crate::telemetry::TelemetryInstant;

pub mod sequencer;
pub mod timer;

pub use sequencer::{
    ModeTransitionFault, PowerModeSequencer, SequencerError, SleepRequest, WakeReport,
};
pub use timer::SleepTimer;

/// Processor power modes exposed by the vendor power manager.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerMode {
    Run,
    Wait,
    Stop,
    /// Very-low-power run.
    Vlpr,
    /// Very-low-power wait.
    Vlpw,
    /// Very-low-power stop.
    Vlps,
    Vlls0,
    Vlls1,
    Vlls3,
}

impl PowerMode {
    /// Modes the sequencer is allowed to request.
    #[must_use]
    pub const fn is_sequenced(self) -> bool {
        matches!(self, PowerMode::Run | PowerMode::Vlpr | PowerMode::Vlps)
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            PowerMode::Run => "RUN",
            PowerMode::Wait => "WAIT",
            PowerMode::Stop => "STOP",
            PowerMode::Vlpr => "VLPR",
            PowerMode::Vlpw => "VLPW",
            PowerMode::Vlps => "VLPS",
            PowerMode::Vlls0 => "VLLS0",
            PowerMode::Vlls1 => "VLLS1",
            PowerMode::Vlls3 => "VLLS3",
        }
    }

    /// Position of this mode inside [`ModeTable`].
    #[must_use]
    pub const fn table_index(self) -> usize {
        match self {
            PowerMode::Wait => ModeTable::WAIT,
            PowerMode::Stop => ModeTable::STOP,
            PowerMode::Vlpr => ModeTable::VLPR,
            PowerMode::Vlpw => ModeTable::VLPW,
            PowerMode::Vlps => ModeTable::VLPS,
            PowerMode::Vlls0 => ModeTable::VLLS0,
            PowerMode::Vlls1 => ModeTable::VLLS1,
            PowerMode::Vlls3 => ModeTable::VLLS3,
            PowerMode::Run => ModeTable::RUN,
        }
    }
}

impl fmt::Display for PowerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Per-mode configuration handed to the vendor power manager.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ModeConfig {
    pub mode: PowerMode,
    pub sleep_on_exit_value: bool,
    pub sleep_on_exit_option: bool,
}

impl ModeConfig {
    /// Configuration with sleep-on-exit disabled.
    #[must_use]
    pub const fn new(mode: PowerMode) -> Self {
        Self {
            mode,
            sleep_on_exit_value: false,
            sleep_on_exit_option: false,
        }
    }

    /// Copy of this configuration targeting a different mode.
    #[must_use]
    pub const fn with_mode(self, mode: PowerMode) -> Self {
        Self { mode, ..self }
    }
}

/// Number of entries the vendor power manager expects.
pub const MODE_TABLE_LEN: usize = 9;

/// Vendor-mandated table order.
pub const MODE_TABLE_ORDER: [PowerMode; MODE_TABLE_LEN] = [
    PowerMode::Wait,
    PowerMode::Stop,
    PowerMode::Vlpr,
    PowerMode::Vlpw,
    PowerMode::Vlps,
    PowerMode::Vlls0,
    PowerMode::Vlls1,
    PowerMode::Vlls3,
    PowerMode::Run,
];

/// Reported when a mode table does not follow [`MODE_TABLE_ORDER`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ModeTableError {
    pub index: usize,
    pub expected: PowerMode,
    pub found: PowerMode,
}

impl fmt::Display for ModeTableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "mode table slot {} holds {} (expected {})",
            self.index, self.found, self.expected
        )
    }
}

impl core::error::Error for ModeTableError {}

/// Position-indexed mode configuration table.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ModeTable {
    entries: [ModeConfig; MODE_TABLE_LEN],
}

impl ModeTable {
    pub const WAIT: usize = 0;
    pub const STOP: usize = 1;
    pub const VLPR: usize = 2;
    pub const VLPW: usize = 3;
    pub const VLPS: usize = 4;
    pub const VLLS0: usize = 5;
    pub const VLLS1: usize = 6;
    pub const VLLS3: usize = 7;
    pub const RUN: usize = 8;

    /// Board table: every entry derived from the VLPR template.
    #[must_use]
    pub const fn new() -> Self {
        let template = ModeConfig::new(PowerMode::Vlpr);
        Self {
            entries: [
                template.with_mode(PowerMode::Wait),
                template.with_mode(PowerMode::Stop),
                template,
                template.with_mode(PowerMode::Vlpw),
                template.with_mode(PowerMode::Vlps),
                template.with_mode(PowerMode::Vlls0),
                template.with_mode(PowerMode::Vlls1),
                template.with_mode(PowerMode::Vlls3),
                template.with_mode(PowerMode::Run),
            ],
        }
    }

    /// Builds a table from caller-supplied entries.
    ///
    /// # Errors
    ///
    /// Returns [`ModeTableError`] for the first slot out of vendor order.
    pub fn from_entries(entries: [ModeConfig; MODE_TABLE_LEN]) -> Result<Self, ModeTableError> {
        let table = Self { entries };
        table.validate()?;
        Ok(table)
    }

    /// Checks the table against [`MODE_TABLE_ORDER`].
    ///
    /// # Errors
    ///
    /// Returns [`ModeTableError`] for the first slot out of vendor order.
    pub fn validate(&self) -> Result<(), ModeTableError> {
        match self
            .entries
            .iter()
            .zip(MODE_TABLE_ORDER)
            .position(|(entry, expected)| entry.mode != expected)
        {
            Some(index) => Err(ModeTableError {
                index,
                expected: MODE_TABLE_ORDER[index],
                found: self.entries[index].mode,
            }),
            None => Ok(()),
        }
    }

    const fn is_ordered(&self) -> bool {
        let mut index = 0;
        while index < MODE_TABLE_LEN {
            if self.entries[index].mode as u8 != MODE_TABLE_ORDER[index] as u8 {
                return false;
            }
            index += 1;
        }
        true
    }

    /// Table entry for `mode`, with its vendor index.
    #[must_use]
    pub const fn entry(&self, mode: PowerMode) -> ModeEntry {
        let index = mode.table_index();
        ModeEntry {
            index,
            config: self.entries[index],
        }
    }

    #[must_use]
    pub fn entries(&self) -> &[ModeConfig] {
        &self.entries
    }
}

impl Default for ModeTable {
    fn default() -> Self {
        Self::new()
    }
}

const _: () = assert!(ModeTable::new().is_ordered(), "mode table out of vendor order");

/// A mode table slot as handed to the platform.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ModeEntry {
    pub index: usize,
    pub config: ModeConfig,
}

/// Phase of a power transition reported to observers.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Notification {
    Before,
    After,
    Recover,
    /// Any phase this firmware does not know about.
    Other(u8),
}

/// Observer verdict for a transition phase.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HookStatus {
    Success,
    Failure,
}

/// Receives notifications around each power mode change.
pub trait TransitionObserver {
    fn notify(&mut self, notification: Notification) -> HookStatus;
}

/// Power-manager callback: accepts Before and After, counts anything else.
#[derive(Debug, Default)]
pub struct PowerTransitionHook {
    errors: u32,
}

impl PowerTransitionHook {
    #[must_use]
    pub const fn new() -> Self {
        Self { errors: 0 }
    }

    /// Notifications rejected so far.
    #[must_use]
    pub const fn errors(&self) -> u32 {
        self.errors
    }
}

impl TransitionObserver for PowerTransitionHook {
    fn notify(&mut self, notification: Notification) -> HookStatus {
        match notification {
            Notification::Before | Notification::After => HookStatus::Success,
            Notification::Recover | Notification::Other(_) => {
                self.errors = self.errors.saturating_add(1);
                HookStatus::Failure
            }
        }
    }
}

/// Clock-manager callback: accepts Before, After and Recover.
#[derive(Debug, Default)]
pub struct ClockTransitionHook;

impl TransitionObserver for ClockTransitionHook {
    fn notify(&mut self, notification: Notification) -> HookStatus {
        match notification {
            Notification::Before | Notification::After | Notification::Recover => {
                HookStatus::Success
            }
            Notification::Other(_) => HookStatus::Failure,
        }
    }
}

/// Why the processor left its low-power stop.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WakeSource {
    /// RTC seconds tick.
    Tick,
    /// RTC alarm.
    Alarm,
    /// Any other interrupt.
    External,
}

impl fmt::Display for WakeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WakeSource::Tick => f.write_str("tick"),
            WakeSource::Alarm => f.write_str("alarm"),
            WakeSource::External => f.write_str("external"),
        }
    }
}

/// Errors raised by the platform power layer.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PlatformError {
    /// The mode table was refused at registration.
    TableRejected,
    /// A transition observer returned [`HookStatus::Failure`].
    CallbackFailed(Notification),
    /// The hardware did not reach the requested mode.
    TransitionRejected(PowerMode),
}

impl fmt::Display for PlatformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

impl core::error::Error for PlatformError {}

/// Hardware seam for power mode control.
pub trait PowerPlatform {
    type Instant: TelemetryInstant;

    /// Monotonic timestamp used for telemetry.
    fn now(&self) -> Self::Instant;

    /// Applies the run-mode clock configuration, notifying `observer`.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::CallbackFailed`] when the observer refuses.
    fn apply_run_clocks(
        &mut self,
        observer: &mut dyn TransitionObserver,
    ) -> Result<(), PlatformError>;

    /// Hands the mode table to the vendor power manager.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::TableRejected`] when the table cannot be used.
    fn register_modes(&mut self, table: &ModeTable) -> Result<(), PlatformError>;

    /// Switches to the mode in `entry`, notifying `observer` around the change.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError`] when the observer or the hardware refuses.
    fn set_mode(
        &mut self,
        entry: ModeEntry,
        observer: &mut dyn TransitionObserver,
    ) -> Result<(), PlatformError>;

    /// Halts the core until the next wake event.
    fn suspend(&mut self) -> WakeSource;
}
