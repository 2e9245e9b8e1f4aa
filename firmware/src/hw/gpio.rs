//! PAC-backed [`PinControl`] for GPIOA/GPIOB.

use embassy_stm32::pac;
use embassy_stm32::pac::gpio::{Gpio, regs, vals};
use supply_core::pins::{Level, MuxMode, PinControl, PinId, Port, Pull};

use super::{MODER_OUTPUT, afr_slot, bsrr_word, moder_bits, next_moder, pupdr_bits};

/// Register-level pin bank.
///
/// Embassy's typed pins cannot be switched between analog, alternate and
/// output at runtime without being consumed, so the bank writes the port
/// registers directly. `hal::init` has already clocked both ports.
pub struct GpioBank {
    _private: (),
}

impl GpioBank {
    /// # Safety
    ///
    /// The caller must not hand the board pins to any embassy driver while
    /// the bank is alive.
    pub unsafe fn new() -> Self {
        Self { _private: () }
    }

    fn port(pin: PinId) -> Gpio {
        match pin.port {
            Port::A => pac::GPIOA,
            Port::B => pac::GPIOB,
        }
    }
}

impl PinControl for GpioBank {
    fn set_mux(&mut self, pin: PinId, mux: MuxMode) {
        let port = Self::port(pin);
        let index = usize::from(pin.index);
        if let MuxMode::Alt(function) = mux {
            let (register, slot) = afr_slot(pin);
            port.afr(register).modify(|w| w.set_afr(slot, function));
        }
        port.moder().modify(|w| {
            let current = w.moder(index).to_bits();
            w.set_moder(index, vals::Moder::from_bits(next_moder(current, mux)));
        });
    }

    fn set_pull(&mut self, pin: PinId, pull: Pull) {
        Self::port(pin).pupdr().modify(|w| {
            w.set_pupdr(usize::from(pin.index), vals::Pupdr::from_bits(pupdr_bits(pull)));
        });
    }

    fn drive(&mut self, pin: PinId, level: Level) {
        let port = Self::port(pin);
        let index = usize::from(pin.index);
        port.bsrr().write_value(regs::Bsrr(bsrr_word(pin, level)));

        // Only GPIO-muxed pins turn into outputs; analog and alternate pins
        // just latch the level for later.
        if port.moder().read().moder(index).to_bits() == moder_bits(MuxMode::Gpio) {
            port.moder()
                .modify(|w| w.set_moder(index, vals::Moder::from_bits(MODER_OUTPUT)));
        }
    }
}
