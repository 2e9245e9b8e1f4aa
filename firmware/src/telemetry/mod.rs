//! Log transport for the power telemetry ring.
//!
//! `supply-core` only stores records. This module timestamps them with the
//! embassy monotonic clock and mirrors every new record to defmt on the target
//! or stdout on host builds, using the same line layout for both.

#![cfg_attr(not(target_os = "none"), allow(dead_code))]

use core::time::Duration;

use embassy_time::Instant;
use supply_core::orchestrator::BootError;
use supply_core::power::{SequencerError, WakeReport, WakeSource};
use supply_core::telemetry::{EventId, TelemetryInstant, TelemetryRecord, TelemetryRecorder};

/// Firmware timestamp backed by [`embassy_time::Instant`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct FirmwareInstant(Instant);

impl FirmwareInstant {
    #[must_use]
    pub const fn from_micros(micros: u64) -> Self {
        Self(Instant::from_micros(micros))
    }

    #[must_use]
    pub fn as_micros(self) -> u64 {
        self.0.as_micros()
    }

    /// Shifts the instant forward by time the monotonic clock did not see.
    #[must_use]
    pub fn offset_by(self, stopped: Duration) -> Self {
        let micros = u64::try_from(stopped.as_micros()).unwrap_or(u64::MAX);
        Self(Instant::from_micros(self.0.as_micros().saturating_add(micros)))
    }
}

impl From<Instant> for FirmwareInstant {
    fn from(value: Instant) -> Self {
        Self(value)
    }
}

impl TelemetryInstant for FirmwareInstant {
    fn saturating_duration_since(&self, earlier: Self) -> Duration {
        Duration::from_micros(self.0.as_micros().saturating_sub(earlier.0.as_micros()))
    }
}

pub type FirmwareTelemetry = TelemetryRecorder<FirmwareInstant>;

/// Tracks which records have already been written to the log.
#[derive(Debug, Default)]
pub struct TelemetryLog {
    next: EventId,
}

impl TelemetryLog {
    #[must_use]
    pub const fn new() -> Self {
        Self { next: 0 }
    }

    /// Emits every record newer than the previous drain.
    ///
    /// Records overwritten in the ring before they were drained are skipped.
    pub fn drain(&mut self, recorder: &FirmwareTelemetry) -> usize {
        let mut emitted = 0;
        for record in recorder.since(self.next) {
            emit_record(record);
            emitted += 1;
        }
        self.next = recorder.next_id();
        emitted
    }

    #[must_use]
    pub const fn next(&self) -> EventId {
        self.next
    }
}

/// Logs the outcome of one idle cycle.
pub fn log_wake(report: &WakeReport) {
    let source = match report.source {
        Some(source) => wake_label(source),
        None => "none",
    };
    emit_wake(
        source,
        report.elapsed_seconds,
        report.requested_seconds,
        report.faults.len(),
    );
}

const fn wake_label(source: WakeSource) -> &'static str {
    match source {
        WakeSource::Tick => "tick",
        WakeSource::Alarm => "alarm",
        WakeSource::External => "external",
    }
}

#[cfg(target_os = "none")]
fn emit_record(record: &TelemetryRecord<FirmwareInstant>) {
    defmt::info!(
        "telemetry:power {} t={}us",
        defmt::Display2Format(record),
        record.timestamp.as_micros()
    );
}

#[cfg(not(target_os = "none"))]
fn emit_record(record: &TelemetryRecord<FirmwareInstant>) {
    println!(
        "telemetry:power {} t={}us",
        record,
        record.timestamp.as_micros()
    );
}

#[cfg(target_os = "none")]
fn emit_wake(source: &'static str, elapsed: u32, requested: u32, faults: usize) {
    if faults == 0 {
        defmt::info!("power:wake {} {}/{}s", source, elapsed, requested);
    } else {
        defmt::warn!(
            "power:wake {} {}/{}s faults={}",
            source,
            elapsed,
            requested,
            faults
        );
    }
}

#[cfg(not(target_os = "none"))]
fn emit_wake(source: &'static str, elapsed: u32, requested: u32, faults: usize) {
    if faults == 0 {
        println!("power:wake {source} {elapsed}/{requested}s");
    } else {
        println!("power:wake {source} {elapsed}/{requested}s faults={faults}");
    }
}

#[cfg(target_os = "none")]
pub fn log_boot_error(error: BootError) {
    defmt::error!("power:boot failed {}", defmt::Display2Format(&error));
}

#[cfg(not(target_os = "none"))]
pub fn log_boot_error(error: BootError) {
    println!("power:boot failed {error}");
}

#[cfg(target_os = "none")]
pub fn log_sleep_error(error: SequencerError) {
    defmt::error!("power:sleep refused {}", defmt::Display2Format(&error));
}

#[cfg(not(target_os = "none"))]
pub fn log_sleep_error(error: SequencerError) {
    println!("power:sleep refused {error}");
}
