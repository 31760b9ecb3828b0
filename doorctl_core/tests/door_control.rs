//! End-to-end behaviour of the standard unit stack on simulated time.
//!
//! Timeline used throughout: the range finder samples every 125 ms and relaxes
//! to 1 s once it knows the motor is idle; the door controller runs every
//! 500 ms. Distances: 250 cm sits in the closed range, 120 cm between the
//! ranges, 30 cm in the open range (sensor mounted above the door).

use std::sync::Arc;
use std::time::Duration;

use doorctl_core::builder::DEFAULT_STORE_KEY;
use doorctl_core::dispatch::{Link, Request, Unit};
use doorctl_core::mocks::{FixedRangePins, RecordingActuator, RecordingHub};
use doorctl_core::{
    CalibrationRecord, Controller, DoorState, HubCommand, HubMessage, MemoryStore, MotorState,
    OperatorCommand, PositionRange, TravelInfo,
};
use doorctl_traits::{CurrentDoorState, EchoCell, ManualClock, TargetDoorState};

struct Rig {
    ctl: Controller,
    pins: FixedRangePins,
    hub: RecordingHub,
    actuator: RecordingActuator,
    store: MemoryStore,
}

impl Rig {
    fn run(&mut self, ms: u64) {
        self.ctl.run_for(Duration::from_millis(ms));
    }

    fn motor(&mut self) -> MotorState {
        self.ctl.motor_info().expect("motor info").state
    }
}

fn rig_with(record: CalibrationRecord, store: MemoryStore) -> Rig {
    let clock = ManualClock::new();
    let echo = Arc::new(EchoCell::new());
    let pins = FixedRangePins::new(clock.clone(), Arc::clone(&echo), 58);
    pins.set_distance(250);
    let hub = RecordingHub::new();
    let actuator = RecordingActuator::new();
    let ctl = Controller::builder()
        .with_ranging_pins(pins.clone(), echo)
        .with_actuator(actuator.clone())
        .with_hub(hub.clone())
        .with_store(store.clone())
        .with_clock(Box::new(clock))
        .with_default_calibration(record)
        .build()
        .expect("build");
    Rig {
        ctl,
        pins,
        hub,
        actuator,
        store,
    }
}

fn rig() -> Rig {
    rig_with(CalibrationRecord::default(), MemoryStore::new())
}

/// Closed and settled: cooldown from the first classification is spent.
fn settled_closed() -> Rig {
    let mut r = rig();
    r.run(3_000);
    assert_eq!(r.ctl.door_state(), Some(DoorState::Closed));
    r
}

#[test]
fn first_cycle_classifies_and_reports_once() {
    let mut r = rig();
    r.run(400);
    assert_eq!(r.ctl.door_state(), Some(DoorState::Unknown));
    assert!(r.hub.pushes().is_empty());

    r.run(2_600);
    assert_eq!(r.ctl.door_state(), Some(DoorState::Closed));
    assert_eq!(r.hub.currents(), vec![CurrentDoorState::Closed]);
    assert_eq!(r.hub.targets(), vec![TargetDoorState::Closed]);
    assert_eq!(r.hub.obstructions(), vec![false]);
    assert_eq!(r.motor(), MotorState::Stopped);
}

#[test]
fn cooldown_holds_classification() {
    let mut r = rig();
    r.run(500);
    assert_eq!(r.ctl.door_state(), Some(DoorState::Closed));
    // door leaves right after classification; the trigger speeds up sampling
    r.pins.set_distance(120);
    r.ctl.trigger();
    r.run(2_000);
    assert_eq!(r.ctl.door_state(), Some(DoorState::Closed));
    r.run(500);
    assert_eq!(r.ctl.door_state(), Some(DoorState::MovingOrStopped));
}

#[test]
fn wall_button_run_is_tracked_to_open() {
    let mut r = settled_closed();
    r.pins.set_distance(120);
    r.ctl.trigger();
    assert_eq!(r.actuator.pulses(), 1);

    r.run(500);
    assert_eq!(r.ctl.door_state(), Some(DoorState::MovingOrStopped));
    assert_eq!(r.motor(), MotorState::Opening);

    r.run(500);
    r.pins.set_distance(30);
    r.run(500);
    assert_eq!(r.ctl.door_state(), Some(DoorState::Open));
    let info = r.ctl.motor_info().expect("motor info");
    assert_eq!(info.state, MotorState::Stopped);
    assert_eq!(info.last_direction, MotorState::Opening);

    assert_eq!(
        r.hub.currents(),
        vec![
            CurrentDoorState::Closed,
            CurrentDoorState::Opening,
            CurrentDoorState::Open
        ]
    );
    assert_eq!(
        r.hub.targets(),
        vec![TargetDoorState::Closed, TargetDoorState::Open]
    );
    assert_eq!(r.hub.obstructions(), vec![false]);
    assert_eq!(r.actuator.pulses(), 1);
}

#[test]
fn target_change_pulses_once_and_learns_travel() {
    let mut r = settled_closed();
    r.pins.set_distance(120);
    r.ctl.set_target(TargetDoorState::Open);
    assert_eq!(r.actuator.pulses(), 1);
    assert_eq!(r.motor(), MotorState::Opening);

    r.run(1_000);
    r.pins.set_distance(30);
    r.run(500);
    assert_eq!(r.ctl.door_state(), Some(DoorState::Open));
    assert_eq!(r.motor(), MotorState::Stopped);
    // the hub set the target itself; it is never echoed back
    assert_eq!(r.hub.targets(), vec![TargetDoorState::Closed]);

    assert!(r.ctl.command(OperatorCommand::LearnTravelTimes));
    assert_eq!(
        r.ctl.markers_summary().as_deref(),
        Some("5;50;180;300;1.50;0.50;0.00")
    );
}

#[test]
fn wall_button_run_learns_travel_from_the_press() {
    let mut r = settled_closed();
    r.ctl.trigger();
    // the opener takes a second before the door leaves the closed range
    r.run(1_000);
    assert_eq!(r.ctl.door_state(), Some(DoorState::Closed));
    assert_eq!(r.motor(), MotorState::Stopped);

    r.pins.set_distance(120);
    r.run(1_000);
    assert_eq!(r.motor(), MotorState::Opening);
    r.pins.set_distance(30);
    r.run(1_000);
    assert_eq!(r.ctl.door_state(), Some(DoorState::Open));

    assert!(r.ctl.command(OperatorCommand::LearnTravelTimes));
    // press at 3.0 s, left the closed range at 4.5 s, open at 5.5 s
    assert_eq!(
        r.ctl.markers_summary().as_deref(),
        Some("5;50;180;300;2.50;1.50;0.00")
    );
}

#[test]
fn door_parked_between_ranges_waits_for_a_trigger() {
    let mut r = rig();
    r.pins.set_distance(120);
    r.run(3_000);
    assert_eq!(r.ctl.door_state(), Some(DoorState::MovingOrStopped));
    assert_eq!(r.motor(), MotorState::Stopped);
    assert_eq!(r.hub.currents(), vec![CurrentDoorState::Stopped]);

    r.ctl.trigger();
    r.run(500);
    assert_eq!(r.motor(), MotorState::Opening);
    assert_eq!(r.hub.currents().last(), Some(&CurrentDoorState::Opening));
}

#[test]
fn target_already_reached_does_nothing() {
    let mut r = settled_closed();
    r.ctl.set_target(TargetDoorState::Closed);
    assert_eq!(r.actuator.pulses(), 0);
    assert_eq!(r.motor(), MotorState::Stopped);
    r.run(1_000);
    assert_eq!(r.hub.targets(), vec![TargetDoorState::Closed]);
}

#[test]
fn reversal_while_moving_pulses_again() {
    let mut r = settled_closed();
    r.pins.set_distance(120);
    r.ctl.set_target(TargetDoorState::Open);
    r.run(1_000);
    r.ctl.set_target(TargetDoorState::Open);
    assert_eq!(r.actuator.pulses(), 1);

    r.ctl.set_target(TargetDoorState::Closed);
    assert_eq!(r.actuator.pulses(), 2);
    assert_eq!(r.motor(), MotorState::Closing);
}

#[test]
fn door_that_never_leaves_is_force_stopped() {
    let mut r = settled_closed();
    r.ctl.set_target(TargetDoorState::Open);
    assert_eq!(r.motor(), MotorState::Opening);

    r.run(9_900);
    assert_eq!(r.motor(), MotorState::Opening);
    assert_eq!(r.ctl.door_state(), Some(DoorState::Closed));

    r.run(200);
    assert_eq!(r.motor(), MotorState::Stopped);
    assert_eq!(r.actuator.pulses(), 1);
    // target reverts to where the door actually is
    assert_eq!(
        r.hub.targets(),
        vec![TargetDoorState::Closed, TargetDoorState::Closed]
    );
}

#[test]
fn stall_reports_obstruction() {
    let record = CalibrationRecord {
        travel: TravelInfo {
            total_cs: 500,
            ..TravelInfo::default()
        },
        ..CalibrationRecord::default()
    };
    let mut r = rig_with(record, MemoryStore::new());
    r.run(3_000);
    r.pins.set_distance(120);
    r.ctl.set_target(TargetDoorState::Open);

    r.run(4_600);
    assert_eq!(r.ctl.door_state(), Some(DoorState::MovingOrStopped));
    assert_eq!(r.motor(), MotorState::Opening);

    r.run(1_500);
    assert_eq!(r.ctl.door_state(), Some(DoorState::Stalled));
    assert_eq!(r.motor(), MotorState::Stopped);
    assert_eq!(r.hub.obstructions(), vec![false, true]);
    assert_eq!(r.hub.currents().last(), Some(&CurrentDoorState::Stopped));

    r.run(2_000);
    assert_eq!(r.ctl.door_state(), Some(DoorState::Stalled));
    assert_eq!(r.hub.obstructions(), vec![false, true]);
}

#[test]
fn position_outside_ranges_fails() {
    let mut r = settled_closed();
    r.pins.set_distance(350);
    r.run(3_000);
    assert_eq!(r.ctl.door_state(), Some(DoorState::Failed));
    assert_eq!(r.motor(), MotorState::Stopped);
    assert_eq!(r.hub.currents().last(), Some(&CurrentDoorState::Stopped));
}

#[test]
fn learn_closed_range_and_save() {
    let mut r = rig();
    r.run(11_000);
    assert!(r.ctl.command(OperatorCommand::LearnClosedRange));
    assert_eq!(
        r.ctl.markers_summary().as_deref(),
        Some("5;50;245;255;0.00;0.00;0.00")
    );

    assert!(r.store.get(DEFAULT_STORE_KEY).is_none());
    assert!(r.ctl.command(OperatorCommand::SaveCalibration));
    let saved = r.store.get(DEFAULT_STORE_KEY).expect("saved record");
    let decoded = CalibrationRecord::decode(&saved).expect("decode");
    assert_eq!(Some(decoded), r.ctl.calibration());
}

#[test]
fn learning_without_positions_keeps_markers() {
    let mut r = rig();
    assert!(r.ctl.command(OperatorCommand::LearnOpenRange));
    assert_eq!(r.ctl.calibration(), Some(CalibrationRecord::default()));
}

#[test]
fn stored_record_wins_over_default() {
    let stored = CalibrationRecord {
        open: PositionRange::new(10, 40),
        closed: PositionRange::new(200, 260),
        travel: TravelInfo {
            total_cs: 1_200,
            opening_lead_cs: 80,
            closing_lead_cs: 60,
        },
    };
    let store = MemoryStore::new();
    store.insert(DEFAULT_STORE_KEY, &stored.encode());
    let mut r = rig_with(CalibrationRecord::default(), store);
    r.run(100);
    assert_eq!(r.ctl.calibration(), Some(stored));
}

#[test]
fn corrupt_record_falls_back_to_default() {
    let store = MemoryStore::new();
    store.insert(DEFAULT_STORE_KEY, b"garbage");
    let mut r = rig_with(CalibrationRecord::default(), store);
    r.run(100);
    assert_eq!(r.ctl.calibration(), Some(CalibrationRecord::default()));
}

#[test]
fn overlapping_markers_are_rejected() {
    let mut r = settled_closed();
    let bad = CalibrationRecord {
        open: PositionRange::new(5, 200),
        ..CalibrationRecord::default()
    };
    assert!(r.ctl.write_calibration(bad).is_err());
    assert_eq!(r.ctl.calibration(), Some(CalibrationRecord::default()));

    let good = CalibrationRecord {
        closed: PositionRange::new(100, 140),
        ..CalibrationRecord::default()
    };
    r.ctl.write_calibration(good).expect("accepted");
    r.run(500);
    assert_eq!(r.ctl.calibration(), Some(good));
    // 250 cm is now beyond the closed range
    assert_eq!(r.ctl.door_state(), Some(DoorState::Failed));
}

#[test]
fn event_log_dump_and_clear() {
    let mut r = rig();
    r.run(1_000);
    // the 1 s cycle sees the same measurement as the 0.5 s cycle
    assert_eq!(
        r.ctl.event_log_dump().as_deref(),
        Some("0;0;11\n1;250;0\n2;0;22\n")
    );
    assert!(r.ctl.command(OperatorCommand::ClearEventLog));
    assert_eq!(r.ctl.event_log_dump().as_deref(), Some(""));
}

#[test]
fn repeated_sensor_queries_log_one_position() {
    let mut r = rig();
    r.run(1_000);
    let before = r.ctl.event_log_dump();
    for _ in 0..3 {
        assert_eq!(r.ctl.sensor_data().and_then(|s| s.filtered), Some(250));
    }
    assert_eq!(r.ctl.event_log_dump(), before);

    // the next measurement is logged
    r.run(500);
    let log = r.ctl.event_log().expect("event log");
    let positions = log
        .borrow()
        .entries()
        .iter()
        .filter(|e| e.position == 250)
        .count();
    assert_eq!(positions, 2);
}

#[test]
fn queued_commands_are_applied_on_poll() {
    let mut r = settled_closed();
    let tx = r.ctl.command_sender();
    r.pins.set_distance(120);
    tx.send(HubCommand::SetTarget(TargetDoorState::Open))
        .expect("queue");
    assert_eq!(r.actuator.pulses(), 0);
    r.ctl.poll();
    assert_eq!(r.actuator.pulses(), 1);
    assert_eq!(r.motor(), MotorState::Opening);
}

/// Top-of-chain unit that answers hub message queries itself.
struct ForceObstruction;

impl Unit for ForceObstruction {
    fn name(&self) -> &'static str {
        "force_obstruction"
    }

    fn query_next_message(&mut self, req: &mut Request<Option<HubMessage>>, _link: &mut Link<'_>) {
        req.answer(Some(HubMessage {
            current: CurrentDoorState::Stopped,
            target: TargetDoorState::Closed,
            obstruction: true,
        }));
    }
}

#[test]
fn extra_unit_can_override_hub_message() {
    let clock = ManualClock::new();
    let echo = Arc::new(EchoCell::new());
    let pins = FixedRangePins::new(clock.clone(), Arc::clone(&echo), 58);
    pins.set_distance(250);
    let hub = RecordingHub::new();
    let mut ctl = Controller::builder()
        .with_ranging_pins(pins, echo)
        .with_actuator(RecordingActuator::new())
        .with_hub(hub.clone())
        .with_clock(Box::new(clock))
        .with_unit(ForceObstruction)
        .build()
        .expect("build");
    assert_eq!(ctl.unit_names().last(), Some(&"force_obstruction"));
    ctl.run_for(Duration::from_millis(500));
    assert_eq!(hub.obstructions(), vec![true]);
    assert_eq!(hub.currents(), vec![CurrentDoorState::Stopped]);
    assert_eq!(ctl.next_message().map(|m| m.obstruction), Some(true));
}
