//! STM32G0 register encodings for the board pin and power abstractions.
//!
//! The field encodings are plain functions so host builds can test them; the
//! register access itself lives in the target-only [`gpio`] and [`power`]
//! modules.

#![cfg_attr(not(target_os = "none"), allow(dead_code))]

use supply_core::pins::{Level, MuxMode, PinId, Pull};
use supply_core::power::{
    HookStatus, Notification, PlatformError, TransitionObserver, WakeSource,
};

#[cfg(target_os = "none")]
pub mod gpio;
#[cfg(target_os = "none")]
pub mod power;

/// MODER field value for a general purpose output.
pub const MODER_OUTPUT: u8 = 0b01;

/// MODER field value selected by a mux request on a pin that is not yet driven.
///
/// GPIO selects input; [`supply_core::pins::PinControl::drive`] switches the
/// pin to output once its latch holds the requested level.
#[must_use]
pub const fn moder_bits(mux: MuxMode) -> u8 {
    match mux {
        MuxMode::Gpio => 0b00,
        MuxMode::Alt(_) => 0b10,
        MuxMode::Disabled => 0b11,
    }
}

/// MODER field value after applying `mux` to a pin currently in `current`.
///
/// A pin that is already an output stays one when re-muxed to GPIO, so a
/// quiesce pass never floats a driven line between its mux and level writes.
#[must_use]
pub const fn next_moder(current: u8, mux: MuxMode) -> u8 {
    match mux {
        MuxMode::Gpio if current == MODER_OUTPUT => MODER_OUTPUT,
        _ => moder_bits(mux),
    }
}

#[must_use]
pub const fn pupdr_bits(pull: Pull) -> u8 {
    match pull {
        Pull::None => 0b00,
        Pull::Up => 0b01,
        Pull::Down => 0b10,
    }
}

/// BSRR word that sets or resets `pin` without touching the rest of the port.
#[must_use]
pub const fn bsrr_word(pin: PinId, level: Level) -> u32 {
    match level {
        Level::High => pin.mask(),
        Level::Low => pin.mask() << 16,
    }
}

/// AFR register (low/high) and nibble slot holding `pin`'s function.
#[must_use]
pub const fn afr_slot(pin: PinId) -> (usize, usize) {
    let index = pin.index as usize;
    (index / 8, index % 8)
}

/// Pending-wake bit set by the RTC wakeup-timer interrupt.
pub const WAKE_TICK: u8 = 1 << 0;
/// Pending-wake bit set by the RTC alarm interrupt.
pub const WAKE_ALARM: u8 = 1 << 1;

/// Classifies a wake from the flags the RTC handler left behind.
///
/// An alarm outranks a coincident tick. With no flag set the core was woken
/// by some other interrupt line.
#[must_use]
pub const fn wake_source(flags: u8) -> WakeSource {
    if flags & WAKE_ALARM != 0 {
        WakeSource::Alarm
    } else if flags & WAKE_TICK != 0 {
        WakeSource::Tick
    } else {
        WakeSource::External
    }
}

/// Passes `notification` to the observer, mapping a rejection to an error.
pub fn notify(
    observer: &mut dyn TransitionObserver,
    notification: Notification,
) -> Result<(), PlatformError> {
    match observer.notify(notification) {
        HookStatus::Success => Ok(()),
        HookStatus::Failure => Err(PlatformError::CallbackFailed(notification)),
    }
}

/// Reports the register-level `outcome` of a transition to the observer.
///
/// A hardware failure is announced with [`Notification::Recover`] and
/// returned unchanged; the observer's verdict on Recover cannot replace it.
/// On success the observer gets [`Notification::After`] and may still reject
/// the transition.
pub fn finish_transition(
    observer: &mut dyn TransitionObserver,
    outcome: Result<(), PlatformError>,
) -> Result<(), PlatformError> {
    match outcome {
        Ok(()) => notify(observer, Notification::After),
        Err(error) => {
            observer.notify(Notification::Recover);
            Err(error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use supply_core::pins::{BOARD_PINS, Port, Signal, pin_for};
    use supply_core::power::{ClockTransitionHook, PowerMode, PowerTransitionHook};

    #[test]
    fn bsrr_targets_set_and_reset_halves() {
        let pin = PinId::new(Port::B, 13);
        assert_eq!(bsrr_word(pin, Level::High), 1 << 13);
        assert_eq!(bsrr_word(pin, Level::Low), 1 << 29);
    }

    #[test]
    fn disabled_pins_become_analog() {
        assert_eq!(moder_bits(MuxMode::Disabled), 0b11);
        assert_eq!(moder_bits(MuxMode::Alt(3)), 0b10);
        assert_ne!(moder_bits(MuxMode::Gpio), MODER_OUTPUT);
    }

    #[test]
    fn driven_outputs_survive_gpio_remux() {
        assert_eq!(next_moder(MODER_OUTPUT, MuxMode::Gpio), MODER_OUTPUT);
        assert_eq!(next_moder(0b11, MuxMode::Gpio), moder_bits(MuxMode::Gpio));
        assert_eq!(next_moder(MODER_OUTPUT, MuxMode::Disabled), 0b11);
    }

    #[test]
    fn afr_slots_split_at_pin_eight() {
        assert_eq!(afr_slot(pin_for(Signal::SpiMiso)), (0, 6));
        assert_eq!(afr_slot(pin_for(Signal::PotChipSelect)), (1, 0));
        assert!(
            BOARD_PINS
                .iter()
                .all(|entry| afr_slot(entry.pin).0 < 2)
        );
    }

    #[test]
    fn wake_flags_classify_source() {
        assert_eq!(wake_source(WAKE_TICK), WakeSource::Tick);
        assert_eq!(wake_source(WAKE_TICK | WAKE_ALARM), WakeSource::Alarm);
        assert_eq!(wake_source(0), WakeSource::External);
    }

    #[test]
    fn pulls_map_to_pupdr() {
        assert_eq!(pupdr_bits(Pull::None), 0);
        assert_eq!(pupdr_bits(Pull::Up), 1);
        assert_eq!(pupdr_bits(Pull::Down), 2);
    }

    #[test]
    fn hardware_failure_survives_rejected_recover() {
        let mut hook = PowerTransitionHook::new();
        let error = PlatformError::TransitionRejected(PowerMode::Vlpr);

        assert_eq!(finish_transition(&mut hook, Err(error)), Err(error));
        assert_eq!(hook.errors(), 1);
    }

    #[test]
    fn hardware_failure_survives_accepted_recover() {
        let mut hook = ClockTransitionHook;
        let error = PlatformError::TransitionRejected(PowerMode::Run);

        assert_eq!(finish_transition(&mut hook, Err(error)), Err(error));
    }

    #[test]
    fn completed_transition_reports_after() {
        let mut hook = PowerTransitionHook::new();

        assert_eq!(finish_transition(&mut hook, Ok(())), Ok(()));
        assert_eq!(hook.errors(), 0);
    }

    #[test]
    fn rejected_before_is_a_callback_failure() {
        let mut hook = PowerTransitionHook::new();

        assert_eq!(
            notify(&mut hook, Notification::Other(4)),
            Err(PlatformError::CallbackFailed(Notification::Other(4)))
        );
        assert_eq!(notify(&mut hook, Notification::Before), Ok(()));
    }
}
