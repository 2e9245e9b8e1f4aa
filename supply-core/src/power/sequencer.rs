//! Power mode sequencing and the timed low-power wait.

use core::fmt;

use heapless::Vec;

use super::{
    ClockTransitionHook, ModeTable, ModeTableError, PlatformError, PowerMode, PowerPlatform,
    PowerTransitionHook, SleepTimer, WakeSource,
};
use crate::pins::{PinControl, PinQuiescer, QuiesceMode};

/// Transitions attempted per low-power cycle (VLPR, then VLPS).
pub const MAX_CYCLE_FAULTS: usize = 2;

/// A requested mode the platform failed to enter.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ModeTransitionFault {
    pub mode: PowerMode,
    pub error: PlatformError,
}

impl fmt::Display for ModeTransitionFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entering {} failed: {}", self.mode, self.error)
    }
}

/// Failures reported by [`PowerModeSequencer`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SequencerError {
    /// The mode table is out of vendor order.
    Table(ModeTableError),
    /// The platform refused the mode table.
    Registration(PlatformError),
    /// A transition was requested before the table was registered.
    NotRegistered,
    /// Only Run, VLPR and VLPS may be requested.
    UnsupportedMode(PowerMode),
    /// The run-mode clock configuration was refused.
    Clock(PlatformError),
    Transition(ModeTransitionFault),
}

impl fmt::Display for SequencerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SequencerError::Table(err) => write!(f, "{err}"),
            SequencerError::Registration(err) => write!(f, "mode table rejected: {err}"),
            SequencerError::NotRegistered => f.write_str("mode table not registered"),
            SequencerError::UnsupportedMode(mode) => write!(f, "mode {mode} is not sequenced"),
            SequencerError::Clock(err) => write!(f, "run clocks rejected: {err}"),
            SequencerError::Transition(fault) => write!(f, "{fault}"),
        }
    }
}

impl core::error::Error for SequencerError {}

impl From<ModeTableError> for SequencerError {
    fn from(err: ModeTableError) -> Self {
        SequencerError::Table(err)
    }
}

/// Parameters for one low-power wait.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SleepRequest {
    /// Seconds to stay in VLPS. Zero returns on the first wake event.
    pub seconds: u32,
    /// Quiesce board pins before leaving run mode.
    pub quiesce_pins: bool,
}

/// Outcome of a low-power wait.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct WakeReport {
    /// Event that ended the wait; `None` when VLPS was never entered.
    pub source: Option<WakeSource>,
    pub requested_seconds: u32,
    /// Seconds counted during the wait. The counter is cleared on return.
    pub elapsed_seconds: u32,
    pub pins_quiesced: bool,
    pub faults: Vec<ModeTransitionFault, MAX_CYCLE_FAULTS>,
}

impl WakeReport {
    /// Returns `true` when the wait ran to its requested length.
    #[must_use]
    pub fn completed(&self) -> bool {
        self.source == Some(WakeSource::Tick) && self.elapsed_seconds >= self.requested_seconds
    }
}

/// Drives processor power mode changes through a [`PowerPlatform`].
///
/// The sequencer owns the mode table, the power-manager transition hook and
/// the pin quiescer, and borrows the seconds counter the RTC interrupt
/// advances.
pub struct PowerModeSequencer<'t> {
    table: ModeTable,
    timer: &'t SleepTimer,
    mode: PowerMode,
    hook: PowerTransitionHook,
    clock_hook: ClockTransitionHook,
    quiescer: PinQuiescer,
    quiesce_mode: QuiesceMode,
    registered: bool,
    transition_faults: u32,
}

impl<'t> PowerModeSequencer<'t> {
    /// Creates a sequencer in run mode.
    ///
    /// # Errors
    ///
    /// Returns [`SequencerError::Table`] when `table` is out of vendor order.
    pub fn new(
        table: ModeTable,
        timer: &'t SleepTimer,
        quiesce_mode: QuiesceMode,
    ) -> Result<Self, SequencerError> {
        table.validate()?;
        Ok(Self {
            table,
            timer,
            mode: PowerMode::Run,
            hook: PowerTransitionHook::new(),
            clock_hook: ClockTransitionHook,
            quiescer: PinQuiescer::new(),
            quiesce_mode,
            registered: false,
            transition_faults: 0,
        })
    }

    /// Applies the run-mode clock configuration through the clock hook.
    ///
    /// # Errors
    ///
    /// Returns [`SequencerError::Clock`] when the platform refuses it.
    pub fn apply_run_clocks<P>(&mut self, platform: &mut P) -> Result<(), SequencerError>
    where
        P: PowerPlatform + ?Sized,
    {
        platform
            .apply_run_clocks(&mut self.clock_hook)
            .map_err(SequencerError::Clock)
    }

    /// Registers the mode table with the platform.
    ///
    /// # Errors
    ///
    /// Returns [`SequencerError::Registration`] when the platform refuses it.
    pub fn register<P>(&mut self, platform: &mut P) -> Result<(), SequencerError>
    where
        P: PowerPlatform + ?Sized,
    {
        self.table.validate()?;
        platform
            .register_modes(&self.table)
            .map_err(SequencerError::Registration)?;
        self.registered = true;
        Ok(())
    }

    /// Switches the processor to `mode`.
    ///
    /// The current mode is only updated when the platform reports success.
    ///
    /// # Errors
    ///
    /// Rejects modes other than Run, VLPR and VLPS, requests made before
    /// [`register`](Self::register), and platform failures.
    pub fn set_mode<P>(&mut self, platform: &mut P, mode: PowerMode) -> Result<(), SequencerError>
    where
        P: PowerPlatform + ?Sized,
    {
        if !mode.is_sequenced() {
            return Err(SequencerError::UnsupportedMode(mode));
        }
        if !self.registered {
            return Err(SequencerError::NotRegistered);
        }

        match platform.set_mode(self.table.entry(mode), &mut self.hook) {
            Ok(()) => {
                self.mode = mode;
                Ok(())
            }
            Err(error) => {
                self.transition_faults = self.transition_faults.saturating_add(1);
                Err(SequencerError::Transition(ModeTransitionFault { mode, error }))
            }
        }
    }

    /// Sleeps in VLPS for `request.seconds`, then resumes in VLPR.
    ///
    /// Pins are optionally quiesced first. The seconds counter is reset
    /// before VLPS is armed and read back (and cleared) on wake. A failed VLPR
    /// entry is recorded and the wait continues; a failed VLPS entry returns
    /// immediately without blocking.
    ///
    /// # Errors
    ///
    /// Returns [`SequencerError::NotRegistered`] before any pin is touched
    /// when the mode table has not been registered. Platform refusals are not
    /// errors here; they land in [`WakeReport::faults`].
    pub fn enter_low_power<P, C>(
        &mut self,
        platform: &mut P,
        pins: &mut C,
        request: SleepRequest,
    ) -> Result<WakeReport, SequencerError>
    where
        P: PowerPlatform + ?Sized,
        C: PinControl + ?Sized,
    {
        if !self.registered {
            return Err(SequencerError::NotRegistered);
        }
        if request.quiesce_pins {
            self.quiescer.quiesce_all(pins, self.quiesce_mode);
        }

        // One slot per transition attempted below.
        let mut attempts: [Option<ModeTransitionFault>; MAX_CYCLE_FAULTS] =
            [None; MAX_CYCLE_FAULTS];
        attempts[0] = transition_fault(self.set_mode(platform, PowerMode::Vlpr))?;

        self.timer.reset();
        let vlps = self.set_mode(platform, PowerMode::Vlps);
        attempts[1] = transition_fault(vlps)?;
        let source = if vlps.is_ok() {
            let source = self.wait_for_wake(platform, request.seconds);
            // The core resumes in VLPR when it leaves VLPS.
            self.mode = PowerMode::Vlpr;
            Some(source)
        } else {
            None
        };

        Ok(WakeReport {
            source,
            requested_seconds: request.seconds,
            elapsed_seconds: self.timer.take(),
            pins_quiesced: request.quiesce_pins,
            faults: attempts.into_iter().flatten().collect(),
        })
    }

    fn wait_for_wake<P>(&mut self, platform: &mut P, seconds: u32) -> WakeSource
    where
        P: PowerPlatform + ?Sized,
    {
        loop {
            match platform.suspend() {
                WakeSource::Tick if !self.timer.has_reached(seconds) => {}
                source => return source,
            }
        }
    }

    #[must_use]
    pub const fn mode(&self) -> PowerMode {
        self.mode
    }

    #[must_use]
    pub const fn is_registered(&self) -> bool {
        self.registered
    }

    #[must_use]
    pub const fn table(&self) -> &ModeTable {
        &self.table
    }

    /// Notifications the power-manager hook has rejected.
    #[must_use]
    pub const fn callback_errors(&self) -> u32 {
        self.hook.errors()
    }

    /// Mode changes the platform has refused since creation.
    #[must_use]
    pub const fn transition_faults(&self) -> u32 {
        self.transition_faults
    }

    #[must_use]
    pub const fn quiesce_mode(&self) -> QuiesceMode {
        self.quiesce_mode
    }

    #[must_use]
    pub const fn quiescer(&self) -> &PinQuiescer {
        &self.quiescer
    }

    pub fn quiescer_mut(&mut self) -> &mut PinQuiescer {
        &mut self.quiescer
    }
}

/// Separates a platform refusal, which a cycle records and survives, from
/// errors that stop the cycle.
fn transition_fault(
    result: Result<(), SequencerError>,
) -> Result<Option<ModeTransitionFault>, SequencerError> {
    match result {
        Ok(()) => Ok(None),
        Err(SequencerError::Transition(fault)) => Ok(Some(fault)),
        Err(error) => Err(error),
    }
}
