//! Telemetry event catalog and the in-memory ring recorder.
//!
//! Supply changes, pin quiescing, bus ownership and power transitions are
//! recorded as small `Copy` records in a fixed-size history buffer. The
//! firmware drains the ring to its log transport; host tests inspect it
//! directly.

use core::{fmt, time::Duration};

use heapless::{HistoryBuf, OldestOrdered};

use crate::pins::PeripheralBus;
use crate::power::{ModeTransitionFault, PowerMode, WakeReport, WakeSource};
use crate::supply::{Regulator, SupplyError, SupplyState};

/// Identifier assigned to each telemetry record.
pub type EventId = u32;

/// Total number of telemetry entries retained in memory.
pub const TELEMETRY_RING_CAPACITY: usize = 64;

/// Discriminated telemetry events.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TelemetryEventKind {
    SupplyEnabled(Regulator),
    SupplyDisabled,
    SupplyRejected,
    SanityCheckFailure,
    PinsQuiesced,
    BusAttached(PeripheralBus),
    BusDetached(PeripheralBus),
    BusConflict(PeripheralBus),
    ModeEntered(PowerMode),
    ModeTransitionFault(PowerMode),
    Woke(WakeSource),
    /// A low-power wait was requested before the mode table was registered.
    SleepRefused,
    BootComplete,
}

impl fmt::Display for TelemetryEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryEventKind::SupplyEnabled(regulator) => {
                write!(f, "supply-enabled {regulator}")
            }
            TelemetryEventKind::SupplyDisabled => f.write_str("supply-disabled"),
            TelemetryEventKind::SupplyRejected => f.write_str("supply-rejected"),
            TelemetryEventKind::SanityCheckFailure => f.write_str("sanity-check-failure"),
            TelemetryEventKind::PinsQuiesced => f.write_str("pins-quiesced"),
            TelemetryEventKind::BusAttached(bus) => write!(f, "bus-attached {bus}"),
            TelemetryEventKind::BusDetached(bus) => write!(f, "bus-detached {bus}"),
            TelemetryEventKind::BusConflict(bus) => write!(f, "bus-conflict {bus}"),
            TelemetryEventKind::ModeEntered(mode) => write!(f, "mode-entered {mode}"),
            TelemetryEventKind::ModeTransitionFault(mode) => {
                write!(f, "mode-transition-fault {mode}")
            }
            TelemetryEventKind::Woke(source) => write!(f, "woke {source}"),
            TelemetryEventKind::SleepRefused => f.write_str("sleep-refused"),
            TelemetryEventKind::BootComplete => f.write_str("boot-complete"),
        }
    }
}

/// Payloads carried alongside telemetry events.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TelemetryPayload {
    /// No additional metadata accompanies the event.
    None,
    Supply(SupplyTelemetry),
    Sleep(SleepTelemetry),
    Fault(FaultTelemetry),
}

impl fmt::Display for TelemetryPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryPayload::None => Ok(()),
            TelemetryPayload::Supply(supply) => write!(f, "{} mV", supply.millivolts),
            TelemetryPayload::Sleep(sleep) => write!(
                f,
                "{}/{} s faults={}",
                sleep.elapsed_seconds, sleep.requested_seconds, sleep.faults
            ),
            TelemetryPayload::Fault(fault) => write!(
                f,
                "callback_errors={} transition_faults={}",
                fault.callback_errors, fault.transition_faults
            ),
        }
    }
}

/// Supply change details.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SupplyTelemetry {
    pub millivolts: u16,
    /// Raw VSEL code, when a regulator was selected.
    pub code: Option<u8>,
}

impl SupplyTelemetry {
    #[must_use]
    pub const fn new(millivolts: u16, code: Option<u8>) -> Self {
        Self { millivolts, code }
    }
}

/// Summary of one low-power wait.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SleepTelemetry {
    pub requested_seconds: u32,
    pub elapsed_seconds: u32,
    pub faults: u8,
    /// Platform clock time spent between sleep entry and wake.
    pub slept_for: Option<Duration>,
}

/// Running fault counters at the time of a transition failure.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FaultTelemetry {
    pub callback_errors: u32,
    pub transition_faults: u32,
}

/// Trait implemented by monotonic instant wrappers used for telemetry tracking.
pub trait TelemetryInstant: Copy {
    /// Returns the saturating duration from `earlier` to `self`.
    fn saturating_duration_since(&self, earlier: Self) -> Duration;
}

/// Telemetry record stored in the ring buffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TelemetryRecord<TInstant>
where
    TInstant: Copy,
{
    pub id: EventId,
    pub timestamp: TInstant,
    pub event: TelemetryEventKind,
    pub details: TelemetryPayload,
}

impl<TInstant> fmt::Display for TelemetryRecord<TInstant>
where
    TInstant: Copy,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {}", self.id, self.event)?;
        if self.details != TelemetryPayload::None {
            write!(f, " ({})", self.details)?;
        }
        Ok(())
    }
}

/// Telemetry ring buffer type alias.
pub type TelemetryRing<TInstant, const CAPACITY: usize = TELEMETRY_RING_CAPACITY> =
    HistoryBuf<TelemetryRecord<TInstant>, CAPACITY>;

/// Records telemetry events into a fixed-size ring buffer.
pub struct TelemetryRecorder<TInstant, const CAPACITY: usize = TELEMETRY_RING_CAPACITY>
where
    TInstant: Copy,
{
    ring: TelemetryRing<TInstant, CAPACITY>,
    next_event_id: EventId,
}

impl<TInstant, const CAPACITY: usize> TelemetryRecorder<TInstant, CAPACITY>
where
    TInstant: Copy + TelemetryInstant,
{
    /// Creates a new telemetry recorder with an empty history.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            next_event_id: 0,
        }
    }

    /// Returns an iterator over the recorded telemetry in chronological order.
    pub fn oldest_first(&self) -> OldestOrdered<'_, TelemetryRecord<TInstant>> {
        self.ring.oldest_ordered()
    }

    /// Returns the most recent telemetry record, if available.
    pub fn latest(&self) -> Option<&TelemetryRecord<TInstant>> {
        self.ring.recent()
    }

    /// Records with an id at or after `first`, oldest first.
    pub fn since(&self, first: EventId) -> impl Iterator<Item = &TelemetryRecord<TInstant>> {
        self.oldest_first()
            .filter(move |record| record.id.wrapping_sub(first) < EventId::MAX / 2)
    }

    /// Id the next record will receive.
    pub const fn next_id(&self) -> EventId {
        self.next_event_id
    }

    /// Returns the number of records currently stored.
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// Returns `true` when no telemetry records are stored.
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Records a supply enable or disable.
    pub fn record_supply(&mut self, state: SupplyState, timestamp: TInstant) -> EventId {
        match state.active {
            Some((regulator, code)) => self.record(
                TelemetryEventKind::SupplyEnabled(regulator),
                TelemetryPayload::Supply(SupplyTelemetry::new(
                    regulator.millivolts(code),
                    Some(code.raw()),
                )),
                timestamp,
            ),
            None => self.record(
                TelemetryEventKind::SupplyDisabled,
                TelemetryPayload::None,
                timestamp,
            ),
        }
    }

    /// Records a rejected supply request.
    pub fn record_supply_error(&mut self, error: SupplyError, timestamp: TInstant) -> EventId {
        let event = match error {
            SupplyError::UnsupportedVoltage(_) => TelemetryEventKind::SupplyRejected,
            SupplyError::SanityCheckFailure(_) => TelemetryEventKind::SanityCheckFailure,
        };
        self.record(
            event,
            TelemetryPayload::Supply(SupplyTelemetry::new(error.millivolts(), None)),
            timestamp,
        )
    }

    /// Records a transition failure with the running fault counters.
    pub fn record_transition_fault(
        &mut self,
        fault: ModeTransitionFault,
        counters: FaultTelemetry,
        timestamp: TInstant,
    ) -> EventId {
        self.record(
            TelemetryEventKind::ModeTransitionFault(fault.mode),
            TelemetryPayload::Fault(counters),
            timestamp,
        )
    }

    /// Records the end of a low-power wait.
    pub fn record_wake(
        &mut self,
        report: &WakeReport,
        slept_at: TInstant,
        timestamp: TInstant,
    ) -> EventId {
        let payload = TelemetryPayload::Sleep(SleepTelemetry {
            requested_seconds: report.requested_seconds,
            elapsed_seconds: report.elapsed_seconds,
            faults: truncate_count(report.faults.len()),
            slept_for: report
                .source
                .map(|_| timestamp.saturating_duration_since(slept_at)),
        });

        match report.source {
            Some(source) => self.record(TelemetryEventKind::Woke(source), payload, timestamp),
            None => self.record(
                TelemetryEventKind::ModeTransitionFault(PowerMode::Vlps),
                payload,
                timestamp,
            ),
        }
    }
}

impl<TInstant, const CAPACITY: usize> Default for TelemetryRecorder<TInstant, CAPACITY>
where
    TInstant: Copy + TelemetryInstant,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<TInstant, const CAPACITY: usize> TelemetryRecorder<TInstant, CAPACITY>
where
    TInstant: Copy + TelemetryInstant,
{
    /// Records an arbitrary telemetry event with the supplied payload.
    pub fn record(
        &mut self,
        event: TelemetryEventKind,
        payload: TelemetryPayload,
        timestamp: TInstant,
    ) -> EventId {
        let id = self.next_event_id;
        self.next_event_id = self.next_event_id.wrapping_add(1);

        self.ring.write(TelemetryRecord {
            id,
            timestamp,
            event,
            details: payload,
        });

        id
    }
}

fn truncate_count(count: usize) -> u8 {
    match u8::try_from(count) {
        Ok(value) => value,
        Err(_) => u8::MAX,
    }
}
