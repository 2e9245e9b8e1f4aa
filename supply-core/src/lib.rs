#![no_std]

// Supply sequencing and power-mode orchestration for the sensor node.
//
// Everything here stays portable across the MCU firmware and host tests: the
// hardware sits behind the `PinControl` and `PowerPlatform` traits and the
// settling delay comes from `embedded_hal::delay::DelayNs`.

pub mod orchestrator;
pub mod pins;
pub mod power;
pub mod supply;
pub mod telemetry;
