mod common;

use common::{PinWrite, SimPinBank};
use supply_core::pins::{
    BOARD_PINS, Level, MuxMode, PeripheralBus, PinConflict, PinQuiescer, Pull, QuiesceMode,
    Signal, pin_for,
};

#[test]
fn quiescing_twice_leaves_identical_state() {
    let mut pins = SimPinBank::new();
    let mut quiescer = PinQuiescer::new();

    quiescer.quiesce_all(&mut pins, QuiesceMode::default());
    let first = pins.pins.clone();
    quiescer.quiesce_all(&mut pins, QuiesceMode::default());

    assert_eq!(pins.pins, first);
}

#[test]
fn boot_critical_pins_are_never_touched() {
    let mut pins = SimPinBank::new();
    let mut quiescer = PinQuiescer::new();
    quiescer.quiesce_all(&mut pins, QuiesceMode::default());
    quiescer.quiesce_all(
        &mut pins,
        QuiesceMode {
            disable_adc_on_sleep: false,
        },
    );

    for entry in BOARD_PINS.iter().filter(|entry| entry.is_boot_critical()) {
        assert!(!pins.pins.contains_key(&entry.pin), "{}", entry.name);
        assert!(
            !pins.log.iter().any(|write| match *write {
                PinWrite::Mux(pin, _) | PinWrite::Pull(pin, _) | PinWrite::Drive(pin, _) =>
                    pin == entry.pin,
            }),
            "{} was written",
            entry.name
        );
    }
    for signal in [
        Signal::SwdClk,
        Signal::SwdReset,
        Signal::SwdDio,
        Signal::Extal32k,
        Signal::Xtal32k,
    ] {
        assert!(!pins.pins.contains_key(&pin_for(signal)), "{signal:?}");
    }
}

#[test]
fn safe_levels_follow_board_wiring() {
    let mut pins = SimPinBank::new();
    let mut quiescer = PinQuiescer::new();
    quiescer.quiesce_all(&mut pins, QuiesceMode::default());

    assert_eq!(pins.level(Signal::PotChipSelect), Some(Level::High));
    assert_eq!(pins.level(Signal::AdcSupply), Some(Level::High));
    assert_eq!(pins.pin(Signal::AdcSupply).mux, Some(MuxMode::Gpio));
    for signal in [
        Signal::RegulatorAEnable,
        Signal::RegulatorBEnable,
        Signal::VoltageSelect1,
        Signal::VoltageSelect2,
        Signal::VoltageSelect3,
        Signal::SupplySwitchSelect,
        Signal::ClkOut32k,
        Signal::RadioReset,
        Signal::SpiMiso,
        Signal::SpiMosi,
        Signal::SpiSck,
    ] {
        assert_eq!(pins.level(signal), Some(Level::Low), "{signal:?}");
        assert_eq!(pins.pin(signal).mux, Some(MuxMode::Gpio), "{signal:?}");
    }
    for signal in [Signal::I2cScl, Signal::I2cSda] {
        assert_eq!(pins.pin(signal).mux, Some(MuxMode::Disabled), "{signal:?}");
        assert_eq!(pins.level(signal), Some(Level::Low), "{signal:?}");
    }
    assert!(
        pins.pins.values().all(|pin| pin.pull == Some(Pull::None)),
        "every configured pin has its pull released"
    );
}

#[test]
fn adc_supply_left_analog_when_mode_disabled() {
    let mut pins = SimPinBank::new();
    let mut quiescer = PinQuiescer::new();
    quiescer.quiesce_all(
        &mut pins,
        QuiesceMode {
            disable_adc_on_sleep: false,
        },
    );

    let adc = pins.pin(Signal::AdcSupply);
    assert_eq!(adc.mux, Some(MuxMode::Disabled));
    assert_eq!(adc.level, None);
}

#[test]
fn mux_pass_completes_before_any_level_is_written() {
    let mut pins = SimPinBank::new();
    let mut quiescer = PinQuiescer::new();
    let configured = quiescer.quiesce_all(&mut pins, QuiesceMode::default());

    let first_drive = pins
        .log
        .iter()
        .position(|write| matches!(write, PinWrite::Drive(..)))
        .expect("levels written");
    let last_mux = pins
        .log
        .iter()
        .rposition(|write| matches!(write, PinWrite::Mux(..)))
        .expect("muxes written");

    assert!(last_mux < first_drive);
    assert_eq!(
        configured,
        BOARD_PINS
            .iter()
            .filter(|entry| !entry.is_boot_critical())
            .filter(|entry| entry.plan.resolve(QuiesceMode::default()).is_some())
            .count()
    );
}

#[test]
fn bus_attach_and_detach_route_pins() {
    let mut pins = SimPinBank::new();
    let mut quiescer = PinQuiescer::new();

    quiescer.attach(&mut pins, PeripheralBus::Spi).unwrap();
    assert_eq!(pins.pin(Signal::SpiSck).mux, Some(MuxMode::Alt(3)));

    quiescer.attach(&mut pins, PeripheralBus::I2c).unwrap();
    assert_eq!(pins.pin(Signal::I2cSda).mux, Some(MuxMode::Alt(2)));

    assert_eq!(
        quiescer.attach(&mut pins, PeripheralBus::Lpuart),
        Err(PinConflict {
            requested: PeripheralBus::Lpuart,
            owner: PeripheralBus::I2c,
        })
    );
    assert_eq!(pins.pin(Signal::I2cSda).mux, Some(MuxMode::Alt(2)));

    quiescer.detach(&mut pins, PeripheralBus::Spi);
    for signal in [Signal::SpiMiso, Signal::SpiMosi, Signal::SpiSck] {
        assert_eq!(pins.pin(signal).mux, Some(MuxMode::Gpio));
        assert_eq!(pins.level(signal), Some(Level::Low));
    }
    assert!(!quiescer.is_attached(PeripheralBus::Spi));
    assert!(quiescer.is_attached(PeripheralBus::I2c));
}
