use std::sync::Arc;
use std::time::Duration;

use doorctl_core::learning::try_get_stop_position_range;
use doorctl_core::mocks::{FixedRangePins, HubPush, RecordingActuator, RecordingHub};
use doorctl_core::{
    CalibrationRecord, Controller, DoorState, EventCode, EventLog, EventLogCfg, LearnCfg,
    MotorState, PositionRange, PositionStats,
};
use doorctl_traits::{EchoCell, ManualClock};
use proptest::prelude::*;

// Log operations: a position (raw or filtered) or a motor transition.
#[derive(Debug, Clone)]
enum Op {
    Position(u16, bool),
    Motor(u8),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (1u16..400, any::<bool>()).prop_map(|(p, raw)| Op::Position(p, raw)),
        (0u8..4).prop_map(Op::Motor),
    ]
}

// Expected classification for a constant distance under the default markers.
fn expected_state(cm: u16) -> DoorState {
    let rec = CalibrationRecord::default();
    if !(2..=400).contains(&cm) {
        DoorState::Unknown
    } else if rec.open.contains(cm) {
        DoorState::Open
    } else if rec.closed.contains(cm) {
        DoorState::Closed
    } else if rec.is_between(cm) {
        DoorState::MovingOrStopped
    } else {
        DoorState::Failed
    }
}

proptest! {
    #[test]
    fn event_log_stays_bounded(
        ops in prop::collection::vec(op_strategy(), 0..300),
        capacity in 1usize..64,
        transition_capacity in 4usize..16,
    ) {
        let mut log = EventLog::new(&EventLogCfg { capacity, transition_capacity });
        let mut transitions = 0usize;
        for (i, op) in ops.iter().enumerate() {
            let now = i as u16;
            match *op {
                Op::Position(p, raw) => log.add_position(now, p, raw),
                Op::Motor(code) => {
                    let state = MotorState::from_code(code).unwrap_or_default();
                    log.add_event(now, EventCode::Motor(state));
                    transitions += 1;
                }
            }
        }
        prop_assert!(log.entries().len() <= capacity);
        prop_assert_eq!(log.entries().len(), ops.len().min(capacity));
        prop_assert_eq!(log.transitions().len(), transitions.min(transition_capacity));
        if let Some(last) = log.entries().iter().last() {
            prop_assert_eq!(usize::from(last.timestamp_cs), ops.len() - 1);
        }
    }

    #[test]
    fn learned_range_covers_the_mean(mean in 1.0f32..1_000.0, sigma in 0.0f32..7.9) {
        let stats = PositionStats { mean, sigma, count: 20 };
        let range = try_get_stop_position_range(&stats, &LearnCfg::default()).expect("quiet enough");
        prop_assert!(range.is_valid());
        prop_assert!(range.contains(mean.round() as u16));
    }

    #[test]
    fn accepted_markers_never_overlap(a in 1u16..500, b in 1u16..500, c in 1u16..500, d in 1u16..500) {
        let rec = CalibrationRecord {
            open: PositionRange::new(a, b),
            closed: PositionRange::new(c, d),
            ..CalibrationRecord::default()
        };
        if rec.validate().is_ok() {
            for pos in [a, b, c, d] {
                prop_assert!(!(rec.open.contains(pos) && rec.closed.contains(pos)));
            }
        } else {
            prop_assert!(a > b || c > d || rec.open.intersects(&rec.closed));
        }
    }

    #[test]
    fn decode_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..64)) {
        let _ = CalibrationRecord::decode(&bytes);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn steady_distance_classifies_consistently(cm in 1u16..450) {
        let clock = ManualClock::new();
        let echo = Arc::new(EchoCell::new());
        let pins = FixedRangePins::new(clock.clone(), Arc::clone(&echo), 58);
        pins.set_distance(cm);
        let hub = RecordingHub::new();
        let actuator = RecordingActuator::new();
        let mut ctl = Controller::builder()
            .with_ranging_pins(pins, echo)
            .with_actuator(actuator.clone())
            .with_hub(hub.clone())
            .with_clock(Box::new(clock))
            .build()
            .expect("build");
        ctl.run_for(Duration::from_millis(3_000));

        prop_assert_eq!(ctl.door_state(), Some(expected_state(cm)));
        // classification alone never pulses the opener
        prop_assert_eq!(actuator.pulses(), 0);
        // only changed values are pushed
        let pushes = hub.pushes();
        for kind in 0..3 {
            let of_kind: Vec<HubPush> = pushes
                .iter()
                .copied()
                .filter(|p| match (kind, p) {
                    (0, HubPush::Current(_)) | (1, HubPush::Target(_)) | (2, HubPush::Obstruction(_)) => true,
                    _ => false,
                })
                .collect();
            for w in of_kind.windows(2) {
                prop_assert_ne!(w[0], w[1]);
            }
        }
    }
}
