//! STM32G0 power platform: low-power run, Stop 1 and the RTC seconds tick.
//!
//! VLPR maps to the PWR low-power run regulator (system clock at HSISYS/8,
//! 2 MHz) and VLPS to Stop 1 entered through SLEEPDEEP + WFI. The RTC wakeup
//! timer fires once per second from the LSI; its interrupt advances
//! [`SLEEP_TIMER`] and wakes the core out of Stop.

use core::time::Duration;

use cortex_m::peripheral::{NVIC, SCB};
use embassy_stm32::pac;
use embassy_stm32::pac::interrupt;
use embassy_stm32::pac::pwr::vals::Lpms;
use embassy_stm32::pac::rcc::vals::{Hsidiv, Sw};
use embassy_stm32::pac::rtc::vals::Wucksel;
use embassy_time::Instant as EmbassyInstant;
use portable_atomic::{AtomicU8, Ordering};
use supply_core::power::{
    ModeEntry, ModeTable, Notification, PlatformError, PowerMode, PowerPlatform, SleepTimer,
    TransitionObserver, WakeSource,
};

use super::{WAKE_ALARM, WAKE_TICK, finish_transition, notify, wake_source};
use crate::telemetry::FirmwareInstant;

/// Seconds counter fed by the RTC wakeup interrupt.
pub static SLEEP_TIMER: SleepTimer = SleepTimer::new();

/// Wake causes latched by the RTC handler since the last suspend.
static WAKE_FLAGS: AtomicU8 = AtomicU8::new(0);

/// EXTI line carrying the RTC wakeup event.
const RTC_WAKEUP_EXTI_LINE: usize = 19;

/// Polls allowed while waiting for the regulator or clock switch to settle.
const SETTLE_POLLS: u32 = 10_000;

pub struct Stm32PowerPlatform {
    scb: SCB,
    table: Option<ModeTable>,
    stopped_seconds: u64,
}

impl Stm32PowerPlatform {
    /// Takes the system control block and starts the RTC seconds tick.
    ///
    /// The RTC must already be clocked; `hal::init` does this when the LSI is
    /// selected as the RTC source.
    pub fn new(scb: SCB) -> Self {
        pac::RCC.apbenr1().modify(|w| w.set_pwren(true));
        pac::PWR.cr1().modify(|w| w.set_dbp(true));
        start_rtc_tick();
        Self {
            scb,
            table: None,
            stopped_seconds: 0,
        }
    }

    fn enter_low_power_run(&mut self, enable: bool) -> Result<(), PlatformError> {
        let pwr = pac::PWR;
        pwr.cr1().modify(|w| w.set_lpr(enable));
        self.scb.clear_sleepdeep();

        let mode = if enable {
            PowerMode::Vlpr
        } else {
            PowerMode::Run
        };
        if poll_until(|| pwr.sr2().read().reglpf() == enable) {
            Ok(())
        } else {
            Err(PlatformError::TransitionRejected(mode))
        }
    }

    fn arm_stop(&mut self, sleep_on_exit: bool) {
        pac::PWR.cr1().modify(|w| w.set_lpms(Lpms::STOP1));
        if sleep_on_exit {
            self.scb.set_sleeponexit();
        } else {
            self.scb.clear_sleeponexit();
        }
        WAKE_FLAGS.store(0, Ordering::Release);
        self.scb.set_sleepdeep();
    }
}

impl PowerPlatform for Stm32PowerPlatform {
    type Instant = FirmwareInstant;

    fn now(&self) -> FirmwareInstant {
        // TIM1 halts in Stop 1, so add back the seconds the RTC counted.
        FirmwareInstant::from(EmbassyInstant::now())
            .offset_by(Duration::from_secs(self.stopped_seconds))
    }

    fn apply_run_clocks(
        &mut self,
        observer: &mut dyn TransitionObserver,
    ) -> Result<(), PlatformError> {
        notify(observer, Notification::Before)?;

        let rcc = pac::RCC;
        rcc.cr().modify(|w| w.set_hsidiv(Hsidiv::DIV8));
        rcc.cfgr().modify(|w| w.set_sw(Sw::HSISYS));
        let outcome = if poll_until(|| rcc.cfgr().read().sws() == Sw::HSISYS) {
            Ok(())
        } else {
            Err(PlatformError::TransitionRejected(PowerMode::Run))
        };

        finish_transition(observer, outcome)
    }

    fn register_modes(&mut self, table: &ModeTable) -> Result<(), PlatformError> {
        table
            .validate()
            .map_err(|_| PlatformError::TableRejected)?;
        self.table = Some(*table);
        Ok(())
    }

    fn set_mode(
        &mut self,
        entry: ModeEntry,
        observer: &mut dyn TransitionObserver,
    ) -> Result<(), PlatformError> {
        let registered = self
            .table
            .and_then(|table| table.entries().get(entry.index).copied());
        if registered != Some(entry.config) {
            return Err(PlatformError::TableRejected);
        }

        notify(observer, Notification::Before)?;

        let outcome = match entry.config.mode {
            PowerMode::Run => self.enter_low_power_run(false),
            PowerMode::Vlpr => self.enter_low_power_run(true),
            PowerMode::Vlps => {
                self.arm_stop(entry.config.sleep_on_exit_value);
                Ok(())
            }
            other => Err(PlatformError::TransitionRejected(other)),
        };

        let result = finish_transition(observer, outcome);
        if result.is_err() {
            // A refused Stop entry must not turn the next WFI into a deep sleep.
            self.scb.clear_sleepdeep();
            self.scb.clear_sleeponexit();
        }
        result
    }

    fn suspend(&mut self) -> WakeSource {
        cortex_m::asm::dsb();
        cortex_m::asm::wfi();

        let flags = WAKE_FLAGS.swap(0, Ordering::AcqRel);
        if flags & WAKE_TICK != 0 {
            self.stopped_seconds = self.stopped_seconds.saturating_add(1);
        }
        wake_source(flags)
    }
}

fn poll_until(mut ready: impl FnMut() -> bool) -> bool {
    (0..SETTLE_POLLS).any(|_| ready())
}

fn start_rtc_tick() {
    let rtc = pac::RTC;
    rtc.wpr().write(|w| w.set_key(0xCA));
    rtc.wpr().write(|w| w.set_key(0x53));

    rtc.cr().modify(|w| w.set_wute(false));
    // WUTWF only rises once the wakeup timer is disabled, which happens
    // within two RTCCLK cycles.
    while !rtc.icsr().read().wutwf() {}

    // Reset prescalers divide the 32 kHz LSI down to a ~1 Hz ck_spre; a
    // reload of zero fires on every ck_spre edge.
    rtc.wutr().write(|w| w.set_wut(0));
    rtc.cr().modify(|w| {
        w.set_wucksel(Wucksel::CLOCK_SPARE);
        w.set_wutie(true);
        w.set_wute(true);
    });
    rtc.wpr().write(|w| w.set_key(0xFF));

    pac::EXTI
        .imr(0)
        .modify(|w| w.set_line(RTC_WAKEUP_EXTI_LINE, true));

    NVIC::unpend(embassy_stm32::interrupt::RTC_TAMP);
    unsafe {
        NVIC::unmask(embassy_stm32::interrupt::RTC_TAMP);
    }
}

#[interrupt]
fn RTC_TAMP() {
    let rtc = pac::RTC;
    let status = rtc.sr().read();
    let mut flags = 0;

    if status.wutf() {
        rtc.scr().write(|w| w.set_cwutf(true));
        SLEEP_TIMER.tick();
        flags |= WAKE_TICK;
    }
    if status.alrf(0) {
        rtc.scr().write(|w| w.set_calrf(0, true));
        flags |= WAKE_ALARM;
    }

    WAKE_FLAGS.fetch_or(flags, Ordering::AcqRel);
}
