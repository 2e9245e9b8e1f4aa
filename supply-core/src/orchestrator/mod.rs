//! Board-level power orchestration.
//!
//! [`PowerOrchestrator`] wires the supply controller, the power-mode
//! sequencer and the telemetry ring to one pin backend, one power platform
//! and one delay provider. Component errors are returned to the caller and
//! recorded. Only a sleep that cannot start ends the idle loop.

use core::{fmt, time::Duration};

use embedded_hal::delay::DelayNs;

use crate::pins::{Level, PeripheralBus, PinConflict, PinControl, QuiesceMode, Signal, pin_for};
use crate::power::{
    ModeTable, PlatformError, PowerMode, PowerModeSequencer, PowerPlatform, SequencerError,
    SleepRequest, SleepTimer, WakeReport,
};
use crate::supply::{RegulatorController, SupplyConfig, SupplyError, SupplyState};
use crate::telemetry::{
    EventId, FaultTelemetry, TelemetryEventKind, TelemetryPayload, TelemetryRecorder,
};

/// Sleep length used by the idle loop.
pub const IDLE_SLEEP_SECONDS: u32 = 60;

/// Opaque sensor collaborator powered from the switched supply.
pub trait SensorSubsystem {
    /// Called once the supply has settled.
    fn power_up(&mut self);

    fn sample(&mut self);

    /// Called before the supply is removed.
    fn power_down(&mut self);
}

/// Orchestrator tuning.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct OrchestratorConfig {
    pub idle_sleep_seconds: u32,
    pub quiesce_before_sleep: bool,
    pub supply: SupplyConfig,
    pub quiesce_mode: QuiesceMode,
    /// Status LED blinks at the end of boot.
    pub status_blinks: u8,
    pub status_blink_period: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            idle_sleep_seconds: IDLE_SLEEP_SECONDS,
            quiesce_before_sleep: true,
            supply: SupplyConfig::default(),
            quiesce_mode: QuiesceMode::DEFAULT,
            status_blinks: 3,
            status_blink_period: Duration::from_millis(200),
        }
    }
}

/// Failures that leave the board unable to sleep.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BootError {
    /// Run-mode clocks could not be applied.
    Clocks(PlatformError),
    /// The mode table was invalid or refused.
    ModeTable(SequencerError),
}

impl From<SequencerError> for BootError {
    fn from(err: SequencerError) -> Self {
        match err {
            SequencerError::Clock(inner) => BootError::Clocks(inner),
            other => BootError::ModeTable(other),
        }
    }
}

impl fmt::Display for BootError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BootError::Clocks(err) => write!(f, "clock setup failed: {err}"),
            BootError::ModeTable(err) => write!(f, "power setup failed: {err}"),
        }
    }
}

impl core::error::Error for BootError {}

/// Failures that end a sensor duty cycle early.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CycleError {
    /// The supply request was refused; nothing was sampled.
    Supply(SupplyError),
    /// Sampling finished but the low-power wait could not start.
    Sleep(SequencerError),
}

impl From<SupplyError> for CycleError {
    fn from(err: SupplyError) -> Self {
        CycleError::Supply(err)
    }
}

impl From<SequencerError> for CycleError {
    fn from(err: SequencerError) -> Self {
        CycleError::Sleep(err)
    }
}

impl fmt::Display for CycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleError::Supply(err) => write!(f, "supply: {err}"),
            CycleError::Sleep(err) => write!(f, "sleep: {err}"),
        }
    }
}

impl core::error::Error for CycleError {}

/// Owns the board's supply and power-mode state.
pub struct PowerOrchestrator<'t, C, P, D>
where
    C: PinControl,
    P: PowerPlatform,
    D: DelayNs,
{
    pins: C,
    platform: P,
    delay: D,
    supply: RegulatorController,
    sequencer: PowerModeSequencer<'t>,
    telemetry: TelemetryRecorder<P::Instant>,
    config: OrchestratorConfig,
}

impl<'t, C, P, D> PowerOrchestrator<'t, C, P, D>
where
    C: PinControl,
    P: PowerPlatform,
    D: DelayNs,
{
    /// Builds an orchestrator around the board mode table.
    ///
    /// # Errors
    ///
    /// Returns [`SequencerError::Table`] if the mode table is out of order.
    pub fn new(
        pins: C,
        platform: P,
        delay: D,
        timer: &'t SleepTimer,
        config: OrchestratorConfig,
    ) -> Result<Self, SequencerError> {
        let sequencer = PowerModeSequencer::new(ModeTable::new(), timer, config.quiesce_mode)?;
        Ok(Self {
            pins,
            platform,
            delay,
            supply: RegulatorController::new(config.supply),
            sequencer,
            telemetry: TelemetryRecorder::new(),
            config,
        })
    }

    /// Brings the board to its idle state.
    ///
    /// Applies run clocks, registers the mode table, drops to VLPR, quiesces
    /// every pin, blinks the status LED and turns the switched supply off. A
    /// refused VLPR transition is recorded and boot continues in run mode.
    ///
    /// # Errors
    ///
    /// Returns [`BootError`] when clocks or the mode table are refused.
    pub fn boot(&mut self) -> Result<(), BootError> {
        self.sequencer.apply_run_clocks(&mut self.platform)?;
        self.sequencer.register(&mut self.platform)?;

        match self.sequencer.set_mode(&mut self.platform, PowerMode::Vlpr) {
            Ok(()) => {
                self.record(
                    TelemetryEventKind::ModeEntered(PowerMode::Vlpr),
                    TelemetryPayload::None,
                );
            }
            Err(SequencerError::Transition(fault)) => {
                let now = self.platform.now();
                let counters = self.fault_counters();
                self.telemetry.record_transition_fault(fault, counters, now);
            }
            Err(other) => return Err(other.into()),
        }

        self.quiesce_pins();
        self.blink_status();
        self.disable_supply();

        self.record(TelemetryEventKind::BootComplete, TelemetryPayload::None);
        Ok(())
    }

    /// Enables the regulator that produces `millivolts`.
    ///
    /// # Errors
    ///
    /// Returns [`SupplyError`] for unsupported voltages. The rejection is
    /// recorded and the supply keeps its previous state.
    pub fn enable_supply(&mut self, millivolts: u16) -> Result<SupplyState, SupplyError> {
        let now = self.platform.now();
        match self
            .supply
            .enable_millivolts(&mut self.pins, &mut self.delay, millivolts)
        {
            Ok(state) => {
                self.telemetry.record_supply(state, now);
                Ok(state)
            }
            Err(err) => {
                self.telemetry.record_supply_error(err, now);
                Err(err)
            }
        }
    }

    /// Turns the switched supply off.
    pub fn disable_supply(&mut self) -> SupplyState {
        let state = self.supply.disable(&mut self.pins, &mut self.delay);
        let now = self.platform.now();
        self.telemetry.record_supply(state, now);
        state
    }

    /// Routes `bus` pins to their peripheral.
    ///
    /// # Errors
    ///
    /// Returns [`PinConflict`] when another attached bus owns a shared pin.
    pub fn attach_bus(&mut self, bus: PeripheralBus) -> Result<(), PinConflict> {
        match self.sequencer.quiescer_mut().attach(&mut self.pins, bus) {
            Ok(()) => {
                self.record(TelemetryEventKind::BusAttached(bus), TelemetryPayload::None);
                Ok(())
            }
            Err(conflict) => {
                self.record(TelemetryEventKind::BusConflict(bus), TelemetryPayload::None);
                Err(conflict)
            }
        }
    }

    /// Returns `bus` pins to GPIO driven low.
    pub fn detach_bus(&mut self, bus: PeripheralBus) {
        self.sequencer.quiescer_mut().detach(&mut self.pins, bus);
        self.record(TelemetryEventKind::BusDetached(bus), TelemetryPayload::None);
    }

    /// Quiesces every board pin and records it.
    pub fn quiesce_pins(&mut self) {
        let mode = self.sequencer.quiesce_mode();
        self.sequencer.quiescer_mut().quiesce_all(&mut self.pins, mode);
        self.supply.mark_lines_quiesced();
        self.record(TelemetryEventKind::PinsQuiesced, TelemetryPayload::None);
    }

    /// Sleeps in VLPS for `seconds` and returns in VLPR.
    ///
    /// # Errors
    ///
    /// Returns [`SequencerError::NotRegistered`] when called before
    /// [`boot`](Self::boot). The refusal is recorded and no pin is touched.
    pub fn enter_low_power(
        &mut self,
        seconds: u32,
        quiesce_pins: bool,
    ) -> Result<WakeReport, SequencerError> {
        let slept_at = self.platform.now();
        let report = match self.sequencer.enter_low_power(
            &mut self.platform,
            &mut self.pins,
            SleepRequest {
                seconds,
                quiesce_pins,
            },
        ) {
            Ok(report) => report,
            Err(err) => {
                self.record(TelemetryEventKind::SleepRefused, TelemetryPayload::None);
                return Err(err);
            }
        };

        if report.pins_quiesced {
            self.supply.mark_lines_quiesced();
            self.telemetry.record(
                TelemetryEventKind::PinsQuiesced,
                TelemetryPayload::None,
                slept_at,
            );
        }

        let now = self.platform.now();
        let counters = self.fault_counters();
        for fault in &report.faults {
            self.telemetry.record_transition_fault(*fault, counters, now);
        }
        self.telemetry.record_wake(&report, slept_at, now);
        Ok(report)
    }

    /// Powers the sensors at `millivolts`, samples once, then sleeps.
    ///
    /// # Errors
    ///
    /// Returns [`CycleError::Supply`] without sampling or sleeping when the
    /// voltage is unsupported, and [`CycleError::Sleep`] when the wait after
    /// sampling cannot start.
    pub fn duty_cycle<S>(
        &mut self,
        millivolts: u16,
        sensors: &mut S,
        sleep_seconds: u32,
    ) -> Result<WakeReport, CycleError>
    where
        S: SensorSubsystem + ?Sized,
    {
        self.enable_supply(millivolts)?;
        sensors.power_up();
        sensors.sample();
        sensors.power_down();
        self.disable_supply();
        self.enter_low_power(sleep_seconds, self.config.quiesce_before_sleep)
            .map_err(CycleError::Sleep)
    }

    /// One iteration of the idle loop.
    ///
    /// # Errors
    ///
    /// See [`enter_low_power`](Self::enter_low_power).
    pub fn run_idle_cycle(&mut self) -> Result<WakeReport, SequencerError> {
        self.enter_low_power(
            self.config.idle_sleep_seconds,
            self.config.quiesce_before_sleep,
        )
    }

    /// Sleeps cycle after cycle, calling `on_wake` after every wait.
    ///
    /// Only returns when a cycle cannot start, with the reason.
    pub fn sleep_until_reset<F>(&mut self, mut on_wake: F) -> SequencerError
    where
        F: FnMut(&WakeReport, &TelemetryRecorder<P::Instant>),
    {
        loop {
            match self.run_idle_cycle() {
                Ok(report) => on_wake(&report, &self.telemetry),
                Err(err) => return err,
            }
        }
    }

    #[must_use]
    pub fn supply_state(&self) -> SupplyState {
        self.supply.state()
    }

    #[must_use]
    pub fn mode(&self) -> PowerMode {
        self.sequencer.mode()
    }

    #[must_use]
    pub fn sequencer(&self) -> &PowerModeSequencer<'t> {
        &self.sequencer
    }

    #[must_use]
    pub fn telemetry(&self) -> &TelemetryRecorder<P::Instant> {
        &self.telemetry
    }

    #[must_use]
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn pins(&self) -> &C {
        &self.pins
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }

    fn blink_status(&mut self) {
        let pin = pin_for(Signal::RadioReset);
        let period =
            u32::try_from(self.config.status_blink_period.as_millis()).unwrap_or(u32::MAX);
        for _ in 0..self.config.status_blinks {
            self.pins.drive(pin, Level::High);
            self.delay.delay_ms(period);
            self.pins.drive(pin, Level::Low);
            self.delay.delay_ms(period);
        }
    }

    fn fault_counters(&self) -> FaultTelemetry {
        FaultTelemetry {
            callback_errors: self.sequencer.callback_errors(),
            transition_faults: self.sequencer.transition_faults(),
        }
    }

    fn record(&mut self, event: TelemetryEventKind, payload: TelemetryPayload) -> EventId {
        let now = self.platform.now();
        self.telemetry.record(event, payload, now)
    }
}
