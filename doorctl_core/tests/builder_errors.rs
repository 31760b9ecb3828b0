use std::sync::Arc;

use doorctl_core::error::BuildError;
use doorctl_core::mocks::{FixedRangePins, NullHub, RecordingActuator};
use doorctl_core::{CalibrationRecord, Controller, PositionRange, RangingCfg};
use doorctl_traits::{EchoCell, ManualClock};
use rstest::rstest;

fn pins() -> (FixedRangePins, Arc<EchoCell>) {
    let echo = Arc::new(EchoCell::new());
    (FixedRangePins::new(ManualClock::new(), Arc::clone(&echo), 58), echo)
}

#[rstest]
fn missing_ranging_pins_yields_typed_build_error() {
    let err = Controller::builder()
        .with_actuator(RecordingActuator::new())
        .with_hub(NullHub)
        .try_build()
        .err()
        .expect("should fail with MissingRangingPins");

    match err.downcast_ref::<BuildError>() {
        Some(BuildError::MissingRangingPins) => {}
        other => panic!("expected MissingRangingPins, got: {other:?}"),
    }
}

#[rstest]
fn missing_hub_yields_typed_build_error() {
    let (p, echo) = pins();
    let err = Controller::builder()
        .with_ranging_pins(p, echo)
        .with_actuator(RecordingActuator::new())
        .build()
        .err()
        .expect("should fail with MissingHub");
    assert!(matches!(
        err.downcast_ref::<BuildError>(),
        Some(BuildError::MissingHub)
    ));
}

#[rstest]
fn invalid_default_markers_rejected() {
    let (p, echo) = pins();
    let overlapping = CalibrationRecord {
        open: PositionRange::new(10, 200),
        closed: PositionRange::new(150, 300),
        ..CalibrationRecord::default()
    };
    let err = Controller::builder()
        .with_ranging_pins(p, echo)
        .with_actuator(RecordingActuator::new())
        .with_hub(NullHub)
        .with_default_calibration(overlapping)
        .build()
        .err()
        .expect("should reject");
    assert!(matches!(
        err.downcast_ref::<BuildError>(),
        Some(BuildError::InvalidConfig(_))
    ));
}

#[rstest]
#[case(RangingCfg { us_per_cm: 0, ..RangingCfg::default() })]
#[case(RangingCfg { stressed_hz: 0, ..RangingCfg::default() })]
#[case(RangingCfg { min_valid_cm: 500, ..RangingCfg::default() })]
fn invalid_ranging_rejected(#[case] ranging: RangingCfg) {
    let (p, echo) = pins();
    let res = Controller::builder()
        .with_ranging_pins(p, echo)
        .with_actuator(RecordingActuator::new())
        .with_hub(NullHub)
        .with_ranging(ranging)
        .build();
    assert!(res.is_err());
}

#[rstest]
fn standard_stack_order() {
    let (p, echo) = pins();
    let ctl = Controller::builder()
        .with_ranging_pins(p, echo)
        .with_actuator(RecordingActuator::new())
        .with_hub(NullHub)
        .build()
        .expect("build");
    assert_eq!(
        ctl.unit_names(),
        vec!["motor_trigger", "range_finder", "door_control", "event_recorder"]
    );
}
