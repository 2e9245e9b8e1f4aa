#![allow(dead_code)]

use std::collections::BTreeMap;
use std::time::Duration;

use embedded_hal::delay::DelayNs;
use supply_core::pins::{Level, MuxMode, PinControl, PinId, Pull, Signal, pin_for};
use supply_core::power::{
    HookStatus, ModeEntry, ModeTable, Notification, PlatformError, PowerMode, PowerPlatform,
    SleepTimer, TransitionObserver, WakeSource,
};
use supply_core::telemetry::TelemetryInstant;

/// Last configuration written to one simulated pin.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct SimPin {
    pub mux: Option<MuxMode>,
    pub level: Option<Level>,
    pub pull: Option<Pull>,
}

/// Pin write as seen by the simulated bank, in call order.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PinWrite {
    Mux(PinId, MuxMode),
    Pull(PinId, Pull),
    Drive(PinId, Level),
}

#[derive(Default)]
pub struct SimPinBank {
    pub pins: BTreeMap<PinId, SimPin>,
    pub log: Vec<PinWrite>,
}

impl SimPinBank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pin(&self, signal: Signal) -> SimPin {
        self.pins.get(&pin_for(signal)).copied().unwrap_or_default()
    }

    pub fn level(&self, signal: Signal) -> Option<Level> {
        self.pin(signal).level
    }

    pub fn clear_log(&mut self) {
        self.log.clear();
    }

    /// Checks the regulator enables as they stood after every logged write.
    pub fn never_both_enabled(&self) -> bool {
        let a = pin_for(Signal::RegulatorAEnable);
        let b = pin_for(Signal::RegulatorBEnable);
        let mut a_on = false;
        let mut b_on = false;
        for write in &self.log {
            if let PinWrite::Drive(pin, level) = *write {
                if pin == a {
                    a_on = level.is_high();
                } else if pin == b {
                    b_on = level.is_high();
                }
            }
            if a_on && b_on {
                return false;
            }
        }
        true
    }
}

impl PinControl for SimPinBank {
    fn set_mux(&mut self, pin: PinId, mux: MuxMode) {
        self.pins.entry(pin).or_default().mux = Some(mux);
        self.log.push(PinWrite::Mux(pin, mux));
    }

    fn set_pull(&mut self, pin: PinId, pull: Pull) {
        self.pins.entry(pin).or_default().pull = Some(pull);
        self.log.push(PinWrite::Pull(pin, pull));
    }

    fn drive(&mut self, pin: PinId, level: Level) {
        self.pins.entry(pin).or_default().level = Some(level);
        self.log.push(PinWrite::Drive(pin, level));
    }
}

/// Delay provider that only accumulates requested time.
#[derive(Default)]
pub struct SimDelay {
    pub waited_ns: u64,
    pub calls: u32,
}

impl SimDelay {
    pub fn waited(&self) -> Duration {
        Duration::from_nanos(self.waited_ns)
    }
}

impl DelayNs for SimDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.waited_ns += u64::from(ns);
        self.calls += 1;
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd)]
pub struct SimInstant(pub u64);

impl TelemetryInstant for SimInstant {
    fn saturating_duration_since(&self, earlier: Self) -> Duration {
        Duration::from_millis(self.0.saturating_sub(earlier.0))
    }
}

/// Power platform whose `suspend` fires the RTC tick itself.
pub struct SimPlatform<'t> {
    timer: &'t SleepTimer,
    pub now_ms: u64,
    pub registered: Option<Vec<PowerMode>>,
    pub transitions: Vec<(usize, PowerMode)>,
    pub suspends: u32,
    pub clock_updates: u32,
    /// Mode the platform refuses to enter.
    pub refuse: Option<PowerMode>,
    /// Extra notification sent to the observer during each transition.
    pub inject: Option<Notification>,
    /// Suspend count at which an external interrupt wakes the core.
    pub external_wake_at: Option<u32>,
    pub reject_table: bool,
}

impl<'t> SimPlatform<'t> {
    pub fn new(timer: &'t SleepTimer) -> Self {
        Self {
            timer,
            now_ms: 0,
            registered: None,
            transitions: Vec::new(),
            suspends: 0,
            clock_updates: 0,
            refuse: None,
            inject: None,
            external_wake_at: None,
            reject_table: false,
        }
    }

    pub fn modes_entered(&self) -> Vec<PowerMode> {
        self.transitions.iter().map(|(_, mode)| *mode).collect()
    }
}

impl PowerPlatform for SimPlatform<'_> {
    type Instant = SimInstant;

    fn now(&self) -> SimInstant {
        SimInstant(self.now_ms)
    }

    fn apply_run_clocks(
        &mut self,
        observer: &mut dyn TransitionObserver,
    ) -> Result<(), PlatformError> {
        for notification in [Notification::Before, Notification::After] {
            if observer.notify(notification) == HookStatus::Failure {
                return Err(PlatformError::CallbackFailed(notification));
            }
        }
        self.clock_updates += 1;
        Ok(())
    }

    fn register_modes(&mut self, table: &ModeTable) -> Result<(), PlatformError> {
        if self.reject_table {
            return Err(PlatformError::TableRejected);
        }
        self.registered = Some(table.entries().iter().map(|entry| entry.mode).collect());
        Ok(())
    }

    fn set_mode(
        &mut self,
        entry: ModeEntry,
        observer: &mut dyn TransitionObserver,
    ) -> Result<(), PlatformError> {
        let mut phases = vec![Notification::Before];
        phases.extend(self.inject);
        phases.push(Notification::After);

        for notification in phases {
            if observer.notify(notification) == HookStatus::Failure {
                return Err(PlatformError::CallbackFailed(notification));
            }
        }

        if self.refuse == Some(entry.config.mode) {
            return Err(PlatformError::TransitionRejected(entry.config.mode));
        }

        self.transitions.push((entry.index, entry.config.mode));
        Ok(())
    }

    fn suspend(&mut self) -> WakeSource {
        self.suspends += 1;
        self.now_ms += 1_000;
        if self.external_wake_at == Some(self.suspends) {
            return WakeSource::External;
        }
        self.timer.tick();
        WakeSource::Tick
    }
}
