use cortex_m::interrupt;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_stm32 as hal;
use embassy_stm32::rcc;
use embassy_time::Delay;
use supply_core::orchestrator::{BootError, OrchestratorConfig, PowerOrchestrator};

use crate::hw::gpio::GpioBank;
use crate::hw::power::{SLEEP_TIMER, Stm32PowerPlatform};
use crate::telemetry::{self, TelemetryLog};

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        interrupt::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                interrupt::enable();
            }
        }
    }
}

#[embassy_executor::main]
pub async fn main(_spawner: Spawner) {
    let mut config = hal::Config::default();
    // Low-power run caps SYSCLK at 2 MHz.
    config.rcc.hsi = Some(rcc::Hsi {
        sys_div: rcc::HsiSysDiv::DIV8,
    });
    config.rcc.sys = rcc::Sysclk::HSISYS;
    config.rcc.ls = rcc::LsConfig::default_lsi();
    let _peripherals = hal::init(config);

    let Some(core) = cortex_m::Peripherals::take() else {
        defmt::error!("power:boot core peripherals unavailable");
        park();
    };

    // SAFETY: the board pins are only ever touched through this bank.
    let pins = unsafe { GpioBank::new() };
    let platform = Stm32PowerPlatform::new(core.SCB);

    let mut node = match PowerOrchestrator::new(
        pins,
        platform,
        Delay,
        &SLEEP_TIMER,
        OrchestratorConfig::default(),
    ) {
        Ok(node) => node,
        Err(error) => {
            telemetry::log_boot_error(BootError::from(error));
            park();
        }
    };

    let mut log = TelemetryLog::new();
    let booted = node.boot();
    log.drain(node.telemetry());
    if let Err(error) = booted {
        telemetry::log_boot_error(error);
        park();
    }

    let error = node.sleep_until_reset(|report, recorder| {
        log.drain(recorder);
        telemetry::log_wake(report);
    });
    log.drain(node.telemetry());
    telemetry::log_sleep_error(error);
    park();
}

fn park() -> ! {
    loop {
        cortex_m::asm::wfi();
    }
}
